//! Server settings read from the environment.

use std::str::FromStr;

use axum::http::HeaderValue;

use condot_core::defaults::SERVER_PORT;
use condot_core::{Error, Result};

/// Origins allowed when `ALLOWED_ORIGINS` is unset or blank.
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

/// Where documents are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(Error::Config(format!(
                "STORE_BACKEND must be memory or postgres, got {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub allowed_origins: Vec<HeaderValue>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: SERVER_PORT,
            store_backend: StoreBackend::Memory,
            database_url: None,
            allowed_origins: parse_allowed_origins(DEFAULT_ALLOWED_ORIGINS),
        }
    }
}

impl ServerConfig {
    /// Read `HOST`, `PORT`, `STORE_BACKEND`, `DATABASE_URL` and
    /// `ALLOWED_ORIGINS`.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| Error::Config(format!("PORT {:?}: {}", raw, e)))?,
            Err(_) => defaults.port,
        };
        let store_backend = match std::env::var("STORE_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.store_backend,
        };
        let database_url = std::env::var("DATABASE_URL").ok().filter(|u| !u.is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(Error::Config(
                "DATABASE_URL is required when STORE_BACKEND=postgres".to_string(),
            ));
        }
        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .map(|raw| parse_allowed_origins(&raw))
            .unwrap_or(defaults.allowed_origins);

        Ok(Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port,
            store_backend,
            database_url,
            allowed_origins,
        })
    }
}

/// Split a comma-separated origin list, dropping entries that are not valid
/// header values. A blank list yields the defaults.
pub fn parse_allowed_origins(raw: &str) -> Vec<HeaderValue> {
    let source = if raw.trim().is_empty() {
        DEFAULT_ALLOWED_ORIGINS
    } else {
        raw
    };
    source
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}
