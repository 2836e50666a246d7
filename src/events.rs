/*!
 * Job events exposed by the pipeline.
 *
 * Callers (UI, logging) subscribe to these for progress reporting; the
 * pipeline does not depend on anything consuming them. The default sink
 * discards everything, and [`ChannelSink`] forwards stream updates into a
 * tokio mpsc channel for streaming consumers.
 */

use tokio::sync::mpsc;

use crate::pipeline::registry::{JobId, JobState};

/// Incremental result covering one batch (or one fallback item)
#[derive(Debug, Clone)]
pub struct StreamUpdate {
    /// Job this update belongs to
    pub job_id: JobId,

    /// Index of the batch the update covers
    pub batch_index: usize,

    /// Whether the covered batch or item succeeded
    pub success: bool,

    /// Translated texts, in submission order
    pub translated_texts: Vec<String>,

    /// Original texts paired with the translations
    pub original_texts: Vec<String>,

    /// Error description when `success` is false
    pub error: Option<String>,
}

/// Subscriber contract for job progress events
pub trait EventSink: Send + Sync {
    /// Called for every completed batch or fallback item
    fn on_stream_update(&self, _update: &StreamUpdate) {}

    /// Called on every accepted job state transition
    fn on_job_state_change(&self, _job_id: &JobId, _old: JobState, _new: JobState) {}
}

/// Event sink that discards everything
#[derive(Debug, Default, Clone)]
pub struct NullSink;

impl EventSink for NullSink {}

/// Event sink forwarding stream updates into an unbounded mpsc channel.
///
/// The receiver half is handed to the consumer; a closed receiver is not
/// an error, updates are simply dropped from then on.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StreamUpdate>,
}

impl ChannelSink {
    /// Create a sink together with the receiving half
    pub fn unbounded() -> (Self, mpsc::UnboundedReceiver<StreamUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn on_stream_update(&self, update: &StreamUpdate) {
        let _ = self.tx.send(update.clone());
    }
}
