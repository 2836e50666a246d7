/*!
 * # streamlate
 *
 * A Rust library implementing a segmented, streaming translation pipeline
 * over pluggable backends.
 *
 * ## Features
 *
 * - Split arbitrary text units into translatable atomic segments while
 *   recording how to reassemble them
 * - Group segments into backend-appropriate batches (single, smart
 *   complexity-based, fixed, character-budget strategies)
 * - Dispatch batches as an incremental stream with per-job lifecycle
 *   tracking and cooperative cancellation
 * - Recover from batch failures by falling back to per-segment dispatch
 * - Reassemble per-segment results into per-unit translations preserving
 *   line structure, even while results are still arriving
 * - Bind translations back onto destination text holders using tiered
 *   exact/fuzzy matching with a partial-vs-final authority policy
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `config`: Configuration management
 * - `backends`: The backend adapter contract and mock implementations
 * - `pipeline`: The pipeline components:
 *   - `pipeline::segmenter`: Splitting units into segments
 *   - `pipeline::planner`: Batch planning strategies
 *   - `pipeline::registry`: Job lifecycle state machine and admission
 *   - `pipeline::coordinator`: Streaming dispatch, timeouts and recovery
 *   - `pipeline::reassembler`: Structure-preserving reassembly
 *   - `pipeline::matcher`: Match-and-apply onto destination holders
 * - `events`: Job progress events for subscribers
 * - `errors`: Classified error types for the pipeline
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]

// Public modules
pub mod backends;
pub mod config;
pub mod errors;
pub mod events;
pub mod pipeline;

// Re-export main types for easier usage
pub use backends::{BackendAdapter, BatchItem, BatchRequest, BatchResponse, TranslationMode};
pub use config::{BatchStrategy, BatchingConfig, CoordinatorConfig, MatcherConfig, PipelineConfig};
pub use errors::{BackendError, ErrorClass, PipelineError, ValidationError};
pub use events::{ChannelSink, EventSink, NullSink, StreamUpdate};
pub use pipeline::coordinator::StreamingCoordinator;
pub use pipeline::matcher::{ApplyReport, Authority, MatchAndApplyEngine, MatchTier, TextHolder};
pub use pipeline::planner::Batch;
pub use pipeline::reassembler::ReassembledUnit;
pub use pipeline::registry::{JobId, JobRegistry, JobState};
pub use pipeline::segmenter::{ExpandedSegment, OriginalUnit, Segmentation};
pub use pipeline::{TranslationPipeline, TranslationRequest};
