/*!
 * Backend adapter boundary.
 *
 * The pipeline never speaks a wire format itself; it hands a batch of
 * segments to a [`BackendAdapter`] and gets back a structured list of
 * translations in submission order. Concrete HTTP clients live outside
 * this crate and implement the trait; [`mock`] provides test doubles.
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::BackendError;

/// One segment inside a batch request or response.
///
/// The `id` echoes the segment index and lets the coordinator realign
/// responses whose item count does not match the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    /// Segment index this item covers
    pub id: usize,
    /// Segment text (original on request, translated on response)
    pub text: String,
}

impl BatchItem {
    /// Create a new batch item
    pub fn new(id: usize, text: impl Into<String>) -> Self {
        Self { id, text: text.into() }
    }
}

/// Translation mode hint passed through to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranslationMode {
    /// Ordinary translation
    #[default]
    Standard,
    /// The destination is length-sensitive; keep output compact
    LengthSensitive,
}

/// A single backend call covering one batch
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Items to translate, in segment order
    pub items: Vec<BatchItem>,
    /// Source language code
    pub source_language: String,
    /// Target language code
    pub target_language: String,
    /// Mode hint
    pub mode: TranslationMode,
}

/// Structured backend response, items in submission order
#[derive(Debug, Clone)]
pub struct BatchResponse {
    /// Translated items with ids echoed from the request
    pub items: Vec<BatchItem>,
}

/// Common trait for all translation backends
///
/// This trait defines the interface that all backend implementations must
/// follow, allowing them to be used interchangeably by the coordinator.
#[async_trait]
pub trait BackendAdapter: Send + Sync + Debug {
    /// Translate one batch of segments
    ///
    /// # Arguments
    /// * `request` - The batch to translate
    ///
    /// # Returns
    /// * `Result<BatchResponse, BackendError>` - Translations in submission
    ///   order, or a classified error
    async fn translate_batch(&self, request: BatchRequest) -> Result<BatchResponse, BackendError>;

    /// Human-readable backend name, used in logs
    fn name(&self) -> &str;
}

pub mod mock;
