/*!
 * Common test utilities for the streamlate test suite
 */

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, Once};

use streamlate::{
    BackendAdapter, BackendError, BatchItem, BatchRequest, BatchResponse, OriginalUnit,
    PipelineConfig, TextHolder,
};

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging once; honors RUST_LOG
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Build original units from a slice of texts
pub fn units(texts: &[&str]) -> Vec<OriginalUnit> {
    texts
        .iter()
        .enumerate()
        .map(|(i, t)| OriginalUnit::new(i, *t))
        .collect()
}

/// Pipeline configuration with timeouts shortened for tests
pub fn fast_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.coordinator.fallback_delay_ms = 10;
    config.coordinator.item_timeout_ms = 500;
    config.coordinator.cancel_poll_ms = 10;
    config
}

/// Simple in-memory destination holder
#[derive(Debug, Clone)]
pub struct TestHolder {
    text: String,
}

impl TestHolder {
    pub fn new(text: &str) -> Self {
        Self { text: text.to_string() }
    }
}

impl TextHolder for TestHolder {
    fn current_text(&self) -> String {
        self.text.clone()
    }

    fn write(&mut self, text: &str) {
        self.text = text.to_string();
    }
}

/// One scripted backend response
#[derive(Debug, Clone, Copy)]
pub enum ScriptStep {
    /// Translate every item, prefixing it with `T:`
    Succeed,
    /// Fail with a network error
    Fail,
}

/// Backend that plays back a fixed script of outcomes, one per request.
/// Once the script runs out, every further request fails.
#[derive(Debug)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<ScriptStep>>,
}

impl ScriptedBackend {
    pub fn new(steps: &[ScriptStep]) -> Self {
        Self {
            script: Mutex::new(steps.iter().copied().collect()),
        }
    }
}

#[async_trait]
impl BackendAdapter for ScriptedBackend {
    async fn translate_batch(&self, request: BatchRequest) -> Result<BatchResponse, BackendError> {
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ScriptStep::Fail);

        match step {
            ScriptStep::Succeed => Ok(BatchResponse {
                items: request
                    .items
                    .iter()
                    .map(|item| BatchItem::new(item.id, format!("T:{}", item.text)))
                    .collect(),
            }),
            ScriptStep::Fail => Err(BackendError::Network("scripted failure".to_string())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
