/*!
 * Streaming batch dispatch.
 *
 * Drives the batches of one job against the backend adapter, strictly in
 * index order, emitting a stream update for every completed batch (or
 * fallback item). Owns the recovery ladder: per-batch timeout, positional
 * realignment of miscounted responses, fallback to serialized per-segment
 * translation, and the job-level "no progress" watchdog. Cancellation is
 * cooperative: a shared flag and the caller-supplied probes are checked
 * before each dispatch and polled while a call is in flight; in-flight
 * results for a job that is no longer streaming are discarded on arrival.
 */

use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::sleep;

use crate::backends::{BackendAdapter, BatchItem, BatchRequest, BatchResponse};
use crate::config::CoordinatorConfig;
use crate::errors::{BackendError, PipelineError};
use crate::events::{EventSink, NullSink, StreamUpdate};
use crate::pipeline::reassembler::ReassembledUnit;
use crate::pipeline::registry::{DispatchSnapshot, JobId, JobRegistry, JobState};

/// Boolean probe supplied by the caller, polled cooperatively
pub type LivenessProbe = Arc<dyn Fn() -> bool + Send + Sync>;

/// Why a dispatch was interrupted before the backend answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interruption {
    Cancelled,
    HostInvalidated,
}

impl From<Interruption> for PipelineError {
    fn from(value: Interruption) -> Self {
        match value {
            Interruption::Cancelled => PipelineError::Cancelled,
            Interruption::HostInvalidated => PipelineError::HostInvalidated,
        }
    }
}

/// Outcome of racing one backend call against timeout and cancellation
enum DispatchOutcome {
    Answered(Result<BatchResponse, BackendError>),
    TimedOut,
    Interrupted(Interruption),
}

/// Coordinates batch dispatch for translation jobs
pub struct StreamingCoordinator {
    backend: Arc<dyn BackendAdapter>,
    registry: Arc<JobRegistry>,
    config: CoordinatorConfig,
    events: Arc<dyn EventSink>,
    cancellation_probe: Option<LivenessProbe>,
    host_probe: Option<LivenessProbe>,
}

impl Clone for StreamingCoordinator {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
            events: Arc::clone(&self.events),
            cancellation_probe: self.cancellation_probe.clone(),
            host_probe: self.host_probe.clone(),
        }
    }
}

impl StreamingCoordinator {
    /// Create a coordinator over a backend and registry
    pub fn new(
        backend: Arc<dyn BackendAdapter>,
        registry: Arc<JobRegistry>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            backend,
            registry,
            config,
            events: Arc::new(NullSink),
            cancellation_probe: None,
            host_probe: None,
        }
    }

    /// Publish stream updates and state changes to the given sink
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Install a caller-supplied cancellation probe (true = cancelled)
    pub fn with_cancellation_probe(mut self, probe: LivenessProbe) -> Self {
        self.cancellation_probe = Some(probe);
        self
    }

    /// Install a host-liveness probe (false = host gone)
    pub fn with_host_probe(mut self, probe: LivenessProbe) -> Self {
        self.host_probe = Some(probe);
        self
    }

    /// Drive one job to a terminal state and return its authoritative
    /// reassembly. Cancellation and host invalidation come back as their
    /// own error classifications, never as backend failures.
    pub async fn run_job(&self, job_id: &JobId) -> Result<Vec<ReassembledUnit>, PipelineError> {
        let snapshot = self
            .registry
            .dispatch_snapshot(job_id)
            .ok_or_else(|| PipelineError::UnknownJob(job_id.to_string()))?;

        if let Some(interruption) = self.check_interruption(&snapshot.cancel) {
            self.registry.transition(job_id, JobState::Cancelled);
            return Err(interruption.into());
        }
        if !self.registry.transition(job_id, JobState::Streaming) {
            let state = self.registry.state(job_id);
            return match state {
                Some(JobState::Cancelled) => Err(PipelineError::Cancelled),
                other => Err(PipelineError::Internal(format!(
                    "job {} cannot start from state {:?}",
                    job_id, other
                ))),
            };
        }

        let watchdog = tokio::spawn(no_progress_watchdog(
            Arc::clone(&self.registry),
            job_id.clone(),
            Duration::from_millis(self.config.no_progress_timeout_ms),
        ));

        let result = self.drive_batches(job_id, &snapshot).await;
        watchdog.abort();

        match result {
            Ok(()) => {
                // A timed-out job may still complete on this late success
                self.registry.transition(job_id, JobState::Completed);
                self.registry
                    .reassemble_current(job_id)
                    .ok_or_else(|| PipelineError::UnknownJob(job_id.to_string()))
            }
            Err(err) => Err(err),
        }
    }

    async fn drive_batches(
        &self,
        job_id: &JobId,
        snapshot: &DispatchSnapshot,
    ) -> Result<(), PipelineError> {
        let total_batches = snapshot.batches.len();

        for (batch_index, batch) in snapshot.batches.iter().enumerate() {
            if let Some(interruption) = self.check_interruption(&snapshot.cancel) {
                info!("job {} interrupted before batch {}", job_id, batch_index);
                self.registry.transition(job_id, JobState::Cancelled);
                return Err(interruption.into());
            }

            let payload: Vec<BatchItem> = batch
                .indices
                .iter()
                .map(|&i| &snapshot.segmentation.segments[i])
                .filter(|seg| seg.is_translatable())
                .map(|seg| BatchItem::new(seg.index, seg.text.clone()))
                .collect();

            if payload.is_empty() {
                // Nothing translatable; the batch still counts as progress
                self.registry.record_segments(job_id, &[]);
                self.emit_success(job_id, batch_index, &[], &[]);
                continue;
            }

            debug!(
                "job {} dispatching batch {}/{} ({} items) to {}",
                job_id,
                batch_index + 1,
                total_batches,
                payload.len(),
                self.backend.name()
            );

            let timeout = Duration::from_millis(
                self.config.batch_timeout_base_ms
                    + self.config.batch_timeout_per_item_ms * payload.len() as u64,
            );
            let request = self.request_for(snapshot, payload.clone());
            let outcome = self.dispatch(request, timeout, &snapshot.cancel).await;

            match outcome {
                DispatchOutcome::Answered(Ok(response)) => {
                    match align_response(&payload, response) {
                        Some(items) => {
                            self.accept_items(job_id, batch_index, &payload, &items)?;
                            continue;
                        }
                        None => {
                            warn!(
                                "job {} batch {} returned an unusable response, falling back",
                                job_id, batch_index
                            );
                        }
                    }
                }
                DispatchOutcome::Answered(Err(err)) => {
                    warn!(
                        "job {} batch {} failed ({}), falling back to per-item translation",
                        job_id, batch_index, err
                    );
                }
                DispatchOutcome::TimedOut => {
                    warn!(
                        "job {} batch {} timed out after {:?}, falling back to per-item translation",
                        job_id, batch_index, timeout
                    );
                }
                DispatchOutcome::Interrupted(interruption) => {
                    info!("job {} interrupted during batch {}", job_id, batch_index);
                    self.registry.transition(job_id, JobState::Cancelled);
                    return Err(interruption.into());
                }
            }

            // Hard failure of the combined request: translate each segment
            // of the batch individually, serialized with a fixed delay.
            self.fallback_per_item(job_id, batch_index, snapshot, &payload)
                .await?;
        }

        Ok(())
    }

    /// Serialized per-segment recovery for one failed batch
    async fn fallback_per_item(
        &self,
        job_id: &JobId,
        batch_index: usize,
        snapshot: &DispatchSnapshot,
        payload: &[BatchItem],
    ) -> Result<(), PipelineError> {
        let item_timeout = Duration::from_millis(self.config.item_timeout_ms);

        for (position, item) in payload.iter().enumerate() {
            if position > 0 {
                sleep(Duration::from_millis(self.config.fallback_delay_ms)).await;
            }
            if let Some(interruption) = self.check_interruption(&snapshot.cancel) {
                self.registry.transition(job_id, JobState::Cancelled);
                return Err(interruption.into());
            }

            let request = self.request_for(snapshot, vec![item.clone()]);
            let outcome = self.dispatch(request, item_timeout, &snapshot.cancel).await;

            let failure: PipelineError = match outcome {
                DispatchOutcome::Answered(Ok(response)) => {
                    let translated = response
                        .items
                        .into_iter()
                        .next()
                        .map(|i| i.text)
                        .unwrap_or_else(|| item.text.clone());
                    self.accept_items(
                        job_id,
                        batch_index,
                        std::slice::from_ref(item),
                        &[BatchItem::new(item.id, translated)],
                    )?;
                    continue;
                }
                DispatchOutcome::Answered(Err(err)) => {
                    error!(
                        "job {} fallback item {} (segment {}) failed: {}",
                        job_id, position, item.id, err
                    );
                    PipelineError::Backend(err)
                }
                DispatchOutcome::TimedOut => {
                    error!(
                        "job {} fallback item {} (segment {}) timed out",
                        job_id, position, item.id
                    );
                    PipelineError::BatchTimeout { batch_index }
                }
                DispatchOutcome::Interrupted(interruption) => {
                    self.registry.transition(job_id, JobState::Cancelled);
                    return Err(interruption.into());
                }
            };

            if self.config.fail_fast {
                // One unrecoverable segment aborts the remainder of the job
                self.emit_failure(job_id, batch_index, item, &failure);
                self.registry.transition(job_id, JobState::Error);
                return Err(failure);
            }

            // Skip-and-continue: the segment keeps its original text and
            // reassembly falls back to it.
            self.registry.mark_errors(job_id);
            self.emit_failure(job_id, batch_index, item, &failure);
        }

        Ok(())
    }

    /// Record accepted translations and stream them out. If the registry
    /// refuses the update the job left the streaming state underneath us;
    /// stop with the matching classification.
    fn accept_items(
        &self,
        job_id: &JobId,
        batch_index: usize,
        requested: &[BatchItem],
        translated: &[BatchItem],
    ) -> Result<(), PipelineError> {
        let pairs: Vec<(usize, String)> = translated
            .iter()
            .map(|item| (item.id, item.text.clone()))
            .collect();

        if !self.registry.record_segments(job_id, &pairs) {
            debug!("job {} no longer accepts results, stopping", job_id);
            return match self.registry.state(job_id) {
                Some(JobState::Cancelled) => Err(PipelineError::Cancelled),
                Some(JobState::Error) => Err(PipelineError::Internal(
                    "job entered error state during dispatch".to_string(),
                )),
                _ => Err(PipelineError::Cancelled),
            };
        }

        self.emit_success(job_id, batch_index, requested, translated);
        Ok(())
    }

    fn emit_success(
        &self,
        job_id: &JobId,
        batch_index: usize,
        requested: &[BatchItem],
        translated: &[BatchItem],
    ) {
        self.events.on_stream_update(&StreamUpdate {
            job_id: job_id.clone(),
            batch_index,
            success: true,
            translated_texts: translated.iter().map(|i| i.text.clone()).collect(),
            original_texts: requested.iter().map(|i| i.text.clone()).collect(),
            error: None,
        });
    }

    fn emit_failure(
        &self,
        job_id: &JobId,
        batch_index: usize,
        item: &BatchItem,
        failure: &PipelineError,
    ) {
        self.events.on_stream_update(&StreamUpdate {
            job_id: job_id.clone(),
            batch_index,
            success: false,
            translated_texts: Vec::new(),
            original_texts: vec![item.text.clone()],
            error: Some(failure.to_string()),
        });
    }

    fn request_for(&self, snapshot: &DispatchSnapshot, items: Vec<BatchItem>) -> BatchRequest {
        BatchRequest {
            items,
            source_language: snapshot.source_language.clone(),
            target_language: snapshot.target_language.clone(),
            mode: snapshot.mode,
        }
    }

    fn check_interruption(&self, cancel: &AtomicBool) -> Option<Interruption> {
        if cancel.load(Ordering::SeqCst) {
            return Some(Interruption::Cancelled);
        }
        if let Some(probe) = &self.cancellation_probe {
            if probe() {
                return Some(Interruption::Cancelled);
            }
        }
        if let Some(probe) = &self.host_probe {
            if !probe() {
                return Some(Interruption::HostInvalidated);
            }
        }
        None
    }

    /// Race one backend call against its timeout and the cancellation
    /// poll. The call itself is never pre-empted; an interrupted or
    /// timed-out call keeps running in the backend but its result is
    /// discarded on arrival.
    async fn dispatch(
        &self,
        request: BatchRequest,
        timeout: Duration,
        cancel: &AtomicBool,
    ) -> DispatchOutcome {
        let poll = Duration::from_millis(self.config.cancel_poll_ms);
        let call = self.backend.translate_batch(request);
        tokio::pin!(call);
        let deadline = sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                result = &mut call => return DispatchOutcome::Answered(result),
                () = &mut deadline => return DispatchOutcome::TimedOut,
                () = sleep(poll) => {
                    if let Some(interruption) = self.check_interruption(cancel) {
                        return DispatchOutcome::Interrupted(interruption);
                    }
                }
            }
        }
    }
}

/// Realign a structured response with its request.
///
/// When the item count matches, ids are trusted positionally. Otherwise
/// responses are matched by id, missing entries are padded with the
/// original text, and extras are dropped. An empty response is unusable.
fn align_response(requested: &[BatchItem], response: BatchResponse) -> Option<Vec<BatchItem>> {
    if response.items.is_empty() {
        return None;
    }
    if response.items.len() == requested.len() {
        return Some(
            requested
                .iter()
                .zip(response.items)
                .map(|(req, resp)| BatchItem::new(req.id, resp.text))
                .collect(),
        );
    }

    warn!(
        "response item count {} does not match request {}, realigning by id",
        response.items.len(),
        requested.len()
    );
    let by_id: HashMap<usize, String> = response
        .items
        .into_iter()
        .map(|item| (item.id, item.text))
        .collect();

    Some(
        requested
            .iter()
            .map(|req| {
                let text = by_id.get(&req.id).cloned().unwrap_or_else(|| req.text.clone());
                BatchItem::new(req.id, text)
            })
            .collect(),
    )
}

/// Move a silent streaming job to `Timeout` without discarding partials.
/// A late batch result may still complete the job afterwards.
async fn no_progress_watchdog(registry: Arc<JobRegistry>, job_id: JobId, window: Duration) {
    let poll = window.checked_div(4).unwrap_or(window).max(Duration::from_millis(50));
    loop {
        sleep(poll).await;
        match registry.state(&job_id) {
            Some(JobState::Pending) => continue,
            Some(JobState::Streaming) => {
                let stalled = registry
                    .last_progress(&job_id)
                    .map(|at| at.elapsed() >= window)
                    .unwrap_or(false);
                if stalled {
                    warn!("job {} made no progress for {:?}", job_id, window);
                    registry.transition(&job_id, JobState::Timeout);
                    return;
                }
            }
            _ => return,
        }
    }
}
