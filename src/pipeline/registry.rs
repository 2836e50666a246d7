/*!
 * In-flight translation job bookkeeping.
 *
 * The registry owns the lifecycle state machine of every translation job
 * and is the only shared mutable state in the pipeline. All mutation goes
 * through the transition rules, which are idempotent against out-of-order
 * or duplicate updates: an illegal transition is a logged no-op, never an
 * error for the caller. Late results for a job that already reached a
 * final state are discarded.
 */

use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use uuid::Uuid;

use crate::backends::TranslationMode;
use crate::errors::PipelineError;
use crate::events::{EventSink, NullSink};
use crate::pipeline::planner::Batch;
use crate::pipeline::reassembler::{self, ReassembledUnit};
use crate::pipeline::segmenter::Segmentation;

/// Unique identifier of one translation job
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh job id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a translation job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Created, not yet dispatching
    Pending,
    /// Batches are being dispatched
    Streaming,
    /// All batches succeeded; the reassembly is authoritative
    Completed,
    /// Cooperatively cancelled, or the host went away
    Cancelled,
    /// An unrecoverable failure ended the job
    Error,
    /// No progress within the window; a late result may still complete it
    Timeout,
}

impl JobState {
    /// Whether no further transition out of this state is accepted
    pub fn is_final(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Error)
    }

    /// Whether the state machine accepts a transition to `to`
    pub fn can_transition(self, to: JobState) -> bool {
        match self {
            Self::Pending => matches!(to, Self::Streaming | Self::Cancelled),
            Self::Streaming => {
                matches!(to, Self::Completed | Self::Cancelled | Self::Error | Self::Timeout)
            }
            Self::Timeout => matches!(to, Self::Completed | Self::Error),
            Self::Completed | Self::Cancelled | Self::Error => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
            Self::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// Parameters for creating a new translation job
#[derive(Debug, Clone)]
pub struct JobCreateParams {
    /// Caller-side surface requesting the job (UI pane, tab, document)
    pub surface: String,
    /// Source language code
    pub source_language: String,
    /// Target language code
    pub target_language: String,
    /// Mode hint forwarded to the backend
    pub mode: TranslationMode,
    /// Segmentation of the request
    pub segmentation: Segmentation,
    /// Planned batches over the segmentation
    pub batches: Vec<Batch>,
}

/// One in-flight translation job, owned exclusively by the registry
#[derive(Debug)]
struct TranslationJob {
    surface: String,
    state: JobState,
    source_language: String,
    target_language: String,
    mode: TranslationMode,
    segmentation: Segmentation,
    batches: Vec<Batch>,
    translated: HashMap<usize, String>,
    has_errors: bool,
    #[allow(dead_code)]
    created_at: Instant,
    last_progress: Instant,
    cancel: Arc<AtomicBool>,
}

/// Everything the coordinator needs to drive a job, cloned out of the lock
#[derive(Debug, Clone)]
pub struct DispatchSnapshot {
    /// Segmentation of the request
    pub segmentation: Segmentation,
    /// Planned batches
    pub batches: Vec<Batch>,
    /// Source language code
    pub source_language: String,
    /// Target language code
    pub target_language: String,
    /// Mode hint
    pub mode: TranslationMode,
    /// Shared cooperative-cancellation flag
    pub cancel: Arc<AtomicBool>,
}

/// Registry owning the lifecycle of all in-flight jobs
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, TranslationJob>>,
    events: Arc<dyn EventSink>,
}

impl fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobRegistry({} jobs)", self.jobs.lock().len())
    }
}

impl JobRegistry {
    /// Create a registry with no event subscribers
    pub fn new() -> Self {
        Self::with_events(Arc::new(NullSink))
    }

    /// Create a registry publishing state changes to the given sink
    pub fn with_events(events: Arc<dyn EventSink>) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Create a new job for a surface.
    ///
    /// Admission control: while another job for the same surface is
    /// pending or streaming, creation is rejected.
    pub fn create_job(&self, params: JobCreateParams) -> Result<JobId, PipelineError> {
        let mut jobs = self.jobs.lock();

        let active = jobs
            .values()
            .any(|job| job.surface == params.surface && !job.state.is_final() && job.state != JobState::Timeout);
        if active {
            return Err(PipelineError::JobAlreadyActive {
                surface: params.surface,
            });
        }

        let id = JobId::new();
        let now = Instant::now();
        jobs.insert(
            id.clone(),
            TranslationJob {
                surface: params.surface,
                state: JobState::Pending,
                source_language: params.source_language,
                target_language: params.target_language,
                mode: params.mode,
                segmentation: params.segmentation,
                batches: params.batches,
                translated: HashMap::new(),
                has_errors: false,
                created_at: now,
                last_progress: now,
                cancel: Arc::new(AtomicBool::new(false)),
            },
        );
        Ok(id)
    }

    /// Attempt a state transition. Illegal transitions are idempotent
    /// no-ops, logged at debug level. Returns whether the transition was
    /// accepted.
    pub fn transition(&self, id: &JobId, to: JobState) -> bool {
        let (old, accepted) = {
            let mut jobs = self.jobs.lock();
            match jobs.get_mut(id) {
                Some(job) => {
                    let old = job.state;
                    if old.can_transition(to) {
                        job.state = to;
                        (old, true)
                    } else {
                        (old, false)
                    }
                }
                None => {
                    debug!("transition for unknown job {} to {} ignored", id, to);
                    return false;
                }
            }
        };

        if accepted {
            debug!("job {} transitioned {} -> {}", id, old, to);
            self.events.on_job_state_change(id, old, to);
        } else {
            debug!("job {} discarded transition {} -> {}", id, old, to);
        }
        accepted
    }

    /// Current state of a job
    pub fn state(&self, id: &JobId) -> Option<JobState> {
        self.jobs.lock().get(id).map(|job| job.state)
    }

    /// The active (pending or streaming) job for a surface, if any
    pub fn active_job_for(&self, surface: &str) -> Option<JobId> {
        self.jobs
            .lock()
            .iter()
            .find(|(_, job)| job.surface == surface && matches!(job.state, JobState::Pending | JobState::Streaming))
            .map(|(id, _)| id.clone())
    }

    /// Set the cooperative-cancellation flag and transition the job.
    /// Returns whether cancellation took effect.
    pub fn cancel(&self, id: &JobId) -> bool {
        {
            let jobs = self.jobs.lock();
            match jobs.get(id) {
                Some(job) => job.cancel.store(true, Ordering::SeqCst),
                None => return false,
            }
        }
        self.transition(id, JobState::Cancelled)
    }

    /// Clone out everything the coordinator needs to drive the job
    pub fn dispatch_snapshot(&self, id: &JobId) -> Option<DispatchSnapshot> {
        let jobs = self.jobs.lock();
        jobs.get(id).map(|job| DispatchSnapshot {
            segmentation: job.segmentation.clone(),
            batches: job.batches.clone(),
            source_language: job.source_language.clone(),
            target_language: job.target_language.clone(),
            mode: job.mode,
            cancel: Arc::clone(&job.cancel),
        })
    }

    /// Merge per-segment translations into the job. Updates for jobs in a
    /// final state are dropped and logged. Returns whether the update was
    /// accepted.
    pub fn record_segments(&self, id: &JobId, pairs: &[(usize, String)]) -> bool {
        let mut jobs = self.jobs.lock();
        match jobs.get_mut(id) {
            Some(job) => {
                if job.state.is_final() {
                    warn!("dropping late segment results for {} job {}", job.state, id);
                    return false;
                }
                for (index, text) in pairs {
                    job.translated.insert(*index, text.clone());
                }
                job.last_progress = Instant::now();
                true
            }
            None => {
                warn!("dropping segment results for unknown job {}", id);
                false
            }
        }
    }

    /// Record that the job saw at least one recoverable failure
    pub fn mark_errors(&self, id: &JobId) {
        if let Some(job) = self.jobs.lock().get_mut(id) {
            job.has_errors = true;
        }
    }

    /// Whether the job recorded any recoverable failures
    pub fn has_errors(&self, id: &JobId) -> bool {
        self.jobs.lock().get(id).map(|j| j.has_errors).unwrap_or(false)
    }

    /// Instant of the last accepted progress update
    pub fn last_progress(&self, id: &JobId) -> Option<Instant> {
        self.jobs.lock().get(id).map(|job| job.last_progress)
    }

    /// Reassemble the job's current (possibly partial) translations
    pub fn reassemble_current(&self, id: &JobId) -> Option<Vec<ReassembledUnit>> {
        let jobs = self.jobs.lock();
        jobs.get(id)
            .map(|job| reassembler::reassemble(&job.segmentation, &job.translated))
    }

    /// Evict a job once it is terminal (or timed out) and consumed.
    /// Returns whether a job was removed.
    pub fn evict(&self, id: &JobId) -> bool {
        let mut jobs = self.jobs.lock();
        match jobs.get(id) {
            Some(job) if job.state.is_final() || job.state == JobState::Timeout => {
                jobs.remove(id);
                true
            }
            Some(job) => {
                debug!("refusing to evict {} job {}", job.state, id);
                false
            }
            None => false,
        }
    }

    /// Number of jobs currently tracked
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Whether the registry tracks no jobs
    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
