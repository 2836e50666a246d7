/*!
 * Mock backend implementations for testing.
 *
 * This module provides mock backends that simulate different behaviors:
 * - `MockBackend::working()` - Always succeeds with translated text
 * - `MockBackend::failing()` - Always fails with an error
 * - `MockBackend::batch_failing()` - Fails multi-item requests but
 *   succeeds on single items, exercising the per-segment fallback path
 */

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::backends::{BackendAdapter, BatchItem, BatchRequest, BatchResponse};
use crate::errors::BackendError;

/// Behavior mode for the mock backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a proper translation
    Working,
    /// Always fails with an error
    Failing,
    /// Fails requests with more than one item, succeeds on single items
    BatchFailing,
    /// Fails intermittently (every Nth request)
    Intermittent {
        /// Every Nth request fails
        fail_every: usize,
    },
    /// Drops the last N items from every response
    Miscounted {
        /// Number of trailing items to drop
        drop: usize,
    },
    /// Returns an empty item list
    Empty,
    /// Simulates slow responses (for timeout testing)
    Slow {
        /// Delay before responding, in milliseconds
        delay_ms: u64,
    },
}

/// Mock backend for testing coordinator behavior
#[derive(Debug)]
pub struct MockBackend {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter for intermittent failures
    request_count: Arc<AtomicUsize>,
    /// Custom translation generator (optional)
    transform: Option<fn(&str) -> String>,
}

impl MockBackend {
    /// Create a new mock backend with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            transform: None,
        }
    }

    /// Create a working mock backend that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a working mock backend that returns each text unchanged
    pub fn identity() -> Self {
        Self::new(MockBehavior::Working).with_transform(|text| text.to_string())
    }

    /// Create a failing mock backend that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that fails combined batches but accepts single items
    pub fn batch_failing() -> Self {
        Self::new(MockBehavior::BatchFailing)
    }

    /// Create an intermittently failing mock backend
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    /// Create a mock that drops trailing items from responses
    pub fn miscounted(drop: usize) -> Self {
        Self::new(MockBehavior::Miscounted { drop })
    }

    /// Create a mock that returns empty responses
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Create a mock that responds after a fixed delay
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Set a custom translation generator
    pub fn with_transform(mut self, transform: fn(&str) -> String) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Number of requests observed so far
    pub fn requests_seen(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    fn translate_item(&self, item: &BatchItem, target_language: &str) -> BatchItem {
        let text = if let Some(transform) = self.transform {
            transform(&item.text)
        } else {
            format!("[{}] {}", target_language, item.text)
        };
        BatchItem::new(item.id, text)
    }
}

impl Clone for MockBackend {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior,
            request_count: Arc::clone(&self.request_count),
            transform: self.transform,
        }
    }
}

#[async_trait]
impl BackendAdapter for MockBackend {
    async fn translate_batch(&self, request: BatchRequest) -> Result<BatchResponse, BackendError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            MockBehavior::Working => Ok(BatchResponse {
                items: request
                    .items
                    .iter()
                    .map(|item| self.translate_item(item, &request.target_language))
                    .collect(),
            }),

            MockBehavior::Failing => Err(BackendError::Network(
                "simulated backend failure".to_string(),
            )),

            MockBehavior::BatchFailing => {
                if request.items.len() > 1 {
                    Err(BackendError::MalformedResponse(
                        "simulated combined-batch failure".to_string(),
                    ))
                } else {
                    Ok(BatchResponse {
                        items: request
                            .items
                            .iter()
                            .map(|item| self.translate_item(item, &request.target_language))
                            .collect(),
                    })
                }
            }

            MockBehavior::Intermittent { fail_every } => {
                let fail_every = fail_every.max(1);
                if count % fail_every == fail_every - 1 {
                    Err(BackendError::QuotaExceeded(format!(
                        "simulated intermittent failure (request #{})",
                        count + 1
                    )))
                } else {
                    Ok(BatchResponse {
                        items: request
                            .items
                            .iter()
                            .map(|item| self.translate_item(item, &request.target_language))
                            .collect(),
                    })
                }
            }

            MockBehavior::Miscounted { drop } => {
                let keep = request.items.len().saturating_sub(drop);
                Ok(BatchResponse {
                    items: request
                        .items
                        .iter()
                        .take(keep)
                        .map(|item| self.translate_item(item, &request.target_language))
                        .collect(),
                })
            }

            MockBehavior::Empty => Ok(BatchResponse { items: Vec::new() }),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                Ok(BatchResponse {
                    items: request
                        .items
                        .iter()
                        .map(|item| self.translate_item(item, &request.target_language))
                        .collect(),
                })
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
