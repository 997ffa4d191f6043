//! Read-only projections of a card collection: timeline, folders, search.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::models::{Card, Category};

/// First `YYYY` in a date range, optionally followed by a separator and month.
static DATE_RANGE_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})[.\-/년]?\s*(\d{1,2})?").expect("static pattern"));

/// Group key used for cards whose date range has no year.
pub const UNKNOWN_PERIOD: &str = "Unknown";

/// `(year, month)` at the start of a free-form date range. Missing month is 1.
pub fn parse_period(date_range: &str) -> Option<(i32, u32)> {
    let caps = DATE_RANGE_START.captures(date_range)?;
    let year = caps.get(1)?.as_str().parse().ok()?;
    let month = caps
        .get(2)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(1);
    Some((year, month))
}

/// Sort key: `year * 100 + month`, or 0 when unparsable.
pub fn period_sort_key(date_range: &str) -> i64 {
    parse_period(date_range)
        .map(|(y, m)| i64::from(y) * 100 + i64::from(m))
        .unwrap_or(0)
}

fn period_label(date_range: &str) -> String {
    match parse_period(date_range) {
        Some((y, m)) => format!("{:04}.{:02}", y, m),
        None => UNKNOWN_PERIOD.to_string(),
    }
}

/// Cards sharing one `YYYY.MM` start period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineGroup {
    pub period: String,
    pub cards: Vec<Card>,
}

/// Newest-first timeline. With `favorites_only`, non-favorite cards are hidden.
///
/// Groups are ordered by descending period label, so `Unknown` sorts first,
/// matching a plain descending string comparison.
pub fn timeline(cards: &[Card], favorites_only: bool) -> Vec<TimelineGroup> {
    let mut sorted: Vec<&Card> = cards
        .iter()
        .filter(|c| !favorites_only || c.is_favorite)
        .collect();
    sorted.sort_by_key(|c| std::cmp::Reverse(period_sort_key(&c.date_range)));

    let mut groups: Vec<TimelineGroup> = Vec::new();
    for card in sorted {
        let period = period_label(&card.date_range);
        match groups.iter_mut().find(|g| g.period == period) {
            Some(group) => group.cards.push(card.clone()),
            None => groups.push(TimelineGroup {
                period,
                cards: vec![card.clone()],
            }),
        }
    }
    groups.sort_by(|a, b| b.period.cmp(&a.period));
    groups
}

/// One folder of the storage view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Folder {
    pub category: Category,
    pub count: usize,
    pub cards: Vec<Card>,
}

/// All twelve folders in display order, including empty ones.
pub fn folders(cards: &[Card]) -> Vec<Folder> {
    Category::ALL
        .iter()
        .map(|&category| {
            let members: Vec<Card> = cards
                .iter()
                .filter(|c| c.category == category)
                .cloned()
                .collect();
            Folder {
                category,
                count: members.len(),
                cards: members,
            }
        })
        .collect()
}

/// Case-insensitive substring search over title, keywords, and summary.
/// A blank term matches nothing.
pub fn search(cards: &[Card], term: &str) -> Vec<Card> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    cards
        .iter()
        .filter(|c| {
            c.title.to_lowercase().contains(&needle)
                || c.keywords.iter().any(|k| k.to_lowercase().contains(&needle))
                || c.summary.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::sample_cards;

    fn card(title: &str, date_range: &str, favorite: bool) -> Card {
        let mut c = sample_cards().remove(0);
        c.id = Some(title.to_string());
        c.title = title.to_string();
        c.date_range = date_range.to_string();
        c.is_favorite = favorite;
        c
    }

    #[test]
    fn test_parse_period_formats() {
        assert_eq!(parse_period("2024.05"), Some((2024, 5)));
        assert_eq!(parse_period("2023.07 - 2023.08"), Some((2023, 7)));
        assert_eq!(parse_period("2022년 3월"), Some((2022, 3)));
        assert_eq!(parse_period("2021-11"), Some((2021, 11)));
        assert_eq!(parse_period("2020"), Some((2020, 1)));
        assert_eq!(parse_period("작년 여름"), None);
    }

    #[test]
    fn test_sort_key() {
        assert_eq!(period_sort_key("2024.05"), 202405);
        assert_eq!(period_sort_key("미정"), 0);
    }

    #[test]
    fn test_timeline_orders_and_groups() {
        let cards = vec![
            card("a", "2023.07 - 2023.08", true),
            card("b", "2024.05", true),
            card("c", "2024.5", true),
            card("d", "언젠가", true),
        ];
        let groups = timeline(&cards, false);
        let periods: Vec<_> = groups.iter().map(|g| g.period.as_str()).collect();
        assert_eq!(periods, vec!["Unknown", "2024.05", "2023.07"]);
        assert_eq!(groups[1].cards.len(), 2);
    }

    #[test]
    fn test_timeline_favorites_only() {
        let cards = vec![card("a", "2024.01", true), card("b", "2024.02", false)];
        let groups = timeline(&cards, true);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].cards[0].title, "a");
        assert_eq!(timeline(&cards, false).len(), 2);
    }

    #[test]
    fn test_folders_cover_all_categories() {
        let folders = folders(&sample_cards());
        assert_eq!(folders.len(), 12);
        let competition = folders
            .iter()
            .find(|f| f.category == Category::Competition)
            .unwrap();
        assert_eq!(competition.count, 1);
        let club = folders.iter().find(|f| f.category == Category::Club).unwrap();
        assert_eq!(club.count, 0);
    }

    #[test]
    fn test_search_fields_case_insensitive() {
        let cards = sample_cards();
        assert_eq!(search(&cards, "sql").len(), 1);
        assert_eq!(search(&cards, "해커톤").len(), 1);
        assert_eq!(search(&cards, "데이터 분석").len(), 1);
        assert!(search(&cards, "   ").is_empty());
        assert!(search(&cards, "블록체인").is_empty());
    }
}
