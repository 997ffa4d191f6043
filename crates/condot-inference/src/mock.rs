//! Scripted generation backend for deterministic testing.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use condot_inference::mock::MockGenerationBackend;
//!
//! let backend = MockGenerationBackend::new()
//!     .with_fixed_response(r#"{"ok": true}"#)
//!     .with_latency_ms(10);
//! backend.push_response("first answer");
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;

use condot_core::{Error, GenerationBackend, OutputSchema, Result};

/// One scripted reply.
#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Fail(String),
}

#[derive(Debug, Clone)]
struct MockConfig {
    fixed_responses: HashMap<String, String>,
    default_response: String,
    latency_ms: u64,
    failure_rate: f64,
    model: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            fixed_responses: HashMap::new(),
            default_response: String::new(),
            latency_ms: 0,
            failure_rate: 0.0,
            model: "mock".to_string(),
        }
    }
}

/// A recorded backend call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
    /// Schema name for structured calls.
    pub schema: Option<String>,
    pub timestamp: std::time::Instant,
}

/// Generation backend answering from a script.
///
/// Replies are taken from the queue first, then from exact-prompt mappings,
/// then the fixed default. A paused backend holds every call until resumed.
#[derive(Clone)]
pub struct MockGenerationBackend {
    config: Arc<MockConfig>,
    queue: Arc<Mutex<VecDeque<MockReply>>>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
    gate: Arc<watch::Sender<bool>>,
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            config: Arc::new(MockConfig::default()),
            queue: Arc::new(Mutex::new(VecDeque::new())),
            call_log: Arc::new(Mutex::new(Vec::new())),
            gate: Arc::new(gate),
        }
    }

    /// Reply used when nothing is queued or mapped.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Reply for one exact prompt.
    pub fn with_response_mapping(
        mut self,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .fixed_responses
            .insert(input.into(), output.into());
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Fraction of calls (0.0 - 1.0) failing with a backend error.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        Arc::make_mut(&mut self.config).failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).model = model.into();
        self
    }

    /// Queue a reply for the next call.
    pub fn push_response(&self, response: impl Into<String>) {
        self.lock_queue().push_back(MockReply::Text(response.into()));
    }

    /// Queue a backend failure for the next call.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.lock_queue().push_back(MockReply::Fail(message.into()));
    }

    /// Hold calls until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.gate.send_replace(false);
    }

    pub fn resume(&self) {
        self.gate.send_replace(true);
    }

    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut log) = self.call_log.lock() {
            log.clear();
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_log.lock().map(|log| log.len()).unwrap_or(0)
    }

    pub fn structured_call_count(&self) -> usize {
        self.call_log
            .lock()
            .map(|log| log.iter().filter(|c| c.schema.is_some()).count())
            .unwrap_or(0)
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<MockReply>> {
        match self.queue.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn log_call(&self, operation: &str, input: &str, schema: Option<&str>) {
        if let Ok(mut log) = self.call_log.lock() {
            log.push(MockCall {
                operation: operation.to_string(),
                input: input.to_string(),
                schema: schema.map(str::to_string),
                timestamp: std::time::Instant::now(),
            });
        }
    }

    fn should_fail(&self) -> bool {
        use rand::Rng;
        if self.config.failure_rate > 0.0 {
            rand::thread_rng().gen::<f64>() < self.config.failure_rate
        } else {
            false
        }
    }

    async fn wait_for_gate(&self) {
        let mut rx = self.gate.subscribe();
        // The sender lives in self, so wait_for only errors if it is dropped.
        let _ = rx.wait_for(|open| *open).await;
    }

    async fn reply(&self, operation: &str, prompt: &str, schema: Option<&str>) -> Result<String> {
        self.log_call(operation, prompt, schema);
        self.wait_for_gate().await;
        if self.config.latency_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.config.latency_ms)).await;
        }

        if self.should_fail() {
            return Err(Error::Inference("Simulated failure for testing".to_string()));
        }

        let queued = self.lock_queue().pop_front();
        match queued {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Fail(message)) => Err(Error::Inference(message)),
            None => Ok(self
                .config
                .fixed_responses
                .get(prompt)
                .cloned()
                .unwrap_or_else(|| self.config.default_response.clone())),
        }
    }
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.reply("generate", prompt, None).await
    }

    async fn generate_structured(&self, prompt: &str, schema: &OutputSchema) -> Result<String> {
        self.reply("generate_structured", prompt, Some(&schema.name))
            .await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> OutputSchema {
        OutputSchema {
            name: "experience_card".to_string(),
            schema: json!({"type": "object"}),
        }
    }

    #[tokio::test]
    async fn test_queue_takes_priority() {
        let backend = MockGenerationBackend::new().with_fixed_response("default");
        backend.push_response("first");
        assert_eq!(backend.generate("x").await.unwrap(), "first");
        assert_eq!(backend.generate("x").await.unwrap(), "default");
    }

    #[tokio::test]
    async fn test_response_mapping() {
        let backend = MockGenerationBackend::new()
            .with_response_mapping("hello", "world")
            .with_fixed_response("other");
        assert_eq!(backend.generate("hello").await.unwrap(), "world");
        assert_eq!(backend.generate("bye").await.unwrap(), "other");
    }

    #[tokio::test]
    async fn test_queued_failure() {
        let backend = MockGenerationBackend::new();
        backend.push_failure("timeout");
        let err = backend.generate_structured("p", &schema()).await.unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[tokio::test]
    async fn test_call_logging() {
        let backend = MockGenerationBackend::new();
        backend.generate("a").await.unwrap();
        backend.generate_structured("b", &schema()).await.unwrap();
        assert_eq!(backend.call_count(), 2);
        assert_eq!(backend.structured_call_count(), 1);
        assert_eq!(
            backend.get_calls()[1].schema.as_deref(),
            Some("experience_card")
        );
        backend.clear_calls();
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_simulation() {
        let backend = MockGenerationBackend::new().with_failure_rate(1.0);
        assert!(backend.generate("x").await.is_err());
    }

    #[tokio::test]
    async fn test_pause_holds_calls() {
        let backend = MockGenerationBackend::new().with_fixed_response("done");
        backend.pause();
        let pending = {
            let backend = backend.clone();
            tokio::spawn(async move { backend.generate("x").await })
        };
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());
        backend.resume();
        assert_eq!(pending.await.unwrap().unwrap(), "done");
    }

    #[tokio::test]
    async fn test_latency_simulation() {
        let backend = MockGenerationBackend::new().with_latency_ms(30);
        let start = std::time::Instant::now();
        backend.generate("x").await.unwrap();
        assert!(start.elapsed().as_millis() >= 30);
    }
}
