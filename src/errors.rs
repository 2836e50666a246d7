/*!
 * Error types for the streamlate pipeline.
 *
 * This module contains custom error types for the different parts of the
 * pipeline, using the thiserror crate for ergonomic error definitions.
 * Every error carries a stable [`ErrorClass`] tag so callers can decide
 * presentation without inspecting message text; in particular, user
 * cancellation and host invalidation are classifications rather than
 * failures that need to be string-matched.
 */

use thiserror::Error;

/// Stable classification tag attached to every propagated error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed input rejected before any network activity
    Validation,
    /// Unrecoverable backend failure (auth, quota, malformed response, network)
    Backend,
    /// Per-batch or per-job timeout
    Timeout,
    /// Cooperative user cancellation, not a failure
    Cancelled,
    /// Hosting environment went away, treated like cancellation
    HostInvalidated,
    /// Job admission rejected for the surface
    Admission,
    /// Internal bookkeeping error (unknown job, poisoned task)
    Internal,
}

impl ErrorClass {
    /// Whether this class represents a real failure that should be
    /// surfaced to the user, as opposed to a graceful stop.
    pub fn is_failure(self) -> bool {
        !matches!(self, Self::Cancelled | Self::HostInvalidated)
    }
}

/// Errors raised for malformed input to the segmenter or planner
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No units were supplied for translation
    #[error("no original units supplied")]
    NoUnits,

    /// A unit's declared index does not match its position
    #[error("unit at position {position} carries index {index}")]
    IndexMismatch {
        /// Position of the unit in the input sequence
        position: usize,
        /// Index the unit declared
        index: usize,
    },

    /// A configuration value is out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Classified errors returned by backend adapters
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    /// Error with authentication against the backend
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The backend rejected the request for quota reasons
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The backend returned a response that could not be parsed
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Error establishing or maintaining a connection
    #[error("network error: {0}")]
    Network(String),

    /// The backend itself reported a timeout
    #[error("backend timeout: {0}")]
    Timeout(String),
}

/// Main pipeline error type that wraps all other errors
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Malformed input, surfaced synchronously before any dispatch
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Unrecoverable backend failure, after fallback was attempted
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// A batch ran past its computed timeout and fallback also failed
    #[error("batch {batch_index} timed out")]
    BatchTimeout {
        /// Index of the batch that timed out
        batch_index: usize,
    },

    /// The job made no progress within the configured window
    #[error("job made no progress within the timeout window")]
    JobTimeout,

    /// The job was cancelled cooperatively; not a failure
    #[error("job cancelled")]
    Cancelled,

    /// The hosting environment is no longer valid; not a failure
    #[error("host invalidated")]
    HostInvalidated,

    /// Another job is already active for the same surface
    #[error("a translation job is already active for surface '{surface}'")]
    JobAlreadyActive {
        /// Surface that attempted to start a second job
        surface: String,
    },

    /// The referenced job does not exist in the registry
    #[error("unknown job: {0}")]
    UnknownJob(String),

    /// Any other error
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// The stable classification tag for this error
    pub fn classification(&self) -> ErrorClass {
        match self {
            Self::Validation(_) => ErrorClass::Validation,
            Self::Backend(_) => ErrorClass::Backend,
            Self::BatchTimeout { .. } | Self::JobTimeout => ErrorClass::Timeout,
            Self::Cancelled => ErrorClass::Cancelled,
            Self::HostInvalidated => ErrorClass::HostInvalidated,
            Self::JobAlreadyActive { .. } => ErrorClass::Admission,
            Self::UnknownJob(_) | Self::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Whether this error represents a real failure rather than a graceful stop
    pub fn is_failure(&self) -> bool {
        self.classification().is_failure()
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(error: anyhow::Error) -> Self {
        Self::Internal(error.to_string())
    }
}
