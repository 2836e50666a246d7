/*!
 * The segmented translation pipeline.
 *
 * Data flow: segmenter → planner → coordinator (reads/writes the job
 * registry, calls the backend adapter) → stream updates → reassembler →
 * match-and-apply engine → caller-owned destination holders.
 *
 * [`TranslationPipeline`] is the thin composer over the components; each
 * component is also usable on its own behind its narrow contract.
 */

use log::info;
use std::sync::Arc;

use crate::backends::{BackendAdapter, TranslationMode};
use crate::config::{BatchStrategy, PipelineConfig};
use crate::errors::PipelineError;
use crate::events::{ChannelSink, EventSink};

pub mod coordinator;
pub mod matcher;
pub mod planner;
pub mod reassembler;
pub mod registry;
pub mod segmenter;

use coordinator::{LivenessProbe, StreamingCoordinator};
use matcher::{ApplyReport, Authority, MatchAndApplyEngine, TextHolder};
use reassembler::ReassembledUnit;
use registry::{JobCreateParams, JobId, JobRegistry};
use segmenter::OriginalUnit;

/// A translation request for one surface
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    /// Caller-side surface the request originates from
    pub surface: String,
    /// Source language code
    pub source_language: String,
    /// Target language code
    pub target_language: String,
    /// The text units to translate
    pub units: Vec<OriginalUnit>,
}

/// Thin composer wiring the pipeline components together
pub struct TranslationPipeline {
    backend: Arc<dyn BackendAdapter>,
    registry: Arc<JobRegistry>,
    config: PipelineConfig,
    events: Arc<dyn EventSink>,
    cancellation_probe: Option<LivenessProbe>,
    host_probe: Option<LivenessProbe>,
}

impl TranslationPipeline {
    /// Create a pipeline over a backend adapter
    pub fn new(backend: Arc<dyn BackendAdapter>, config: PipelineConfig) -> Self {
        Self {
            backend,
            registry: Arc::new(JobRegistry::new()),
            config,
            events: Arc::new(crate::events::NullSink),
            cancellation_probe: None,
            host_probe: None,
        }
    }

    /// Publish job events to the given sink
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.registry = Arc::new(JobRegistry::with_events(Arc::clone(&events)));
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

    /// The shared job registry, for callers that track jobs themselves
    pub fn registry(&self) -> Arc<JobRegistry> {
        Arc::clone(&self.registry)
    }

    /// Translate a request to completion and return the reassembled
    /// per-unit translations. The job is evicted before returning.
    pub async fn translate(
        &self,
        request: TranslationRequest,
    ) -> Result<Vec<ReassembledUnit>, PipelineError> {
        let job_id = self.start_job(&request)?;
        let coordinator = self.coordinator(Arc::clone(&self.events));
        let result = coordinator.run_job(&job_id).await;
        self.registry.evict(&job_id);
        result
    }

    /// Translate a request and bind results onto the caller's holders as
    /// they arrive: every successful stream update re-applies the current
    /// partial reassembly with partial authority, and the completed job is
    /// applied once more with final authority.
    pub async fn translate_and_apply<H: TextHolder>(
        &self,
        request: TranslationRequest,
        holders: &mut [H],
    ) -> Result<ApplyReport, PipelineError> {
        let job_id = self.start_job(&request)?;
        let (sink, mut updates) = ChannelSink::unbounded();
        // The coordinator owns the only sender; moving it into the task
        // closes the update channel when the job ends.
        let coordinator = self.coordinator(Arc::new(sink));
        let driver = {
            let job_id = job_id.clone();
            tokio::spawn(async move { coordinator.run_job(&job_id).await })
        };

        let mut engine = MatchAndApplyEngine::new(self.config.matcher.clone());
        while let Some(update) = updates.recv().await {
            if !update.success {
                continue;
            }
            if let Some(partial) = self.registry.reassemble_current(&job_id) {
                engine.apply(&partial, holders, Authority::Partial);
            }
        }

        let outcome = driver
            .await
            .map_err(|err| PipelineError::Internal(format!("job task failed: {}", err)))?;
        let result = match outcome {
            Ok(final_units) => {
                let report = engine.apply(&final_units, holders, Authority::Final);
                info!(
                    "job {} applied {} holders, {} unmatched",
                    job_id,
                    report.applied.len(),
                    report.unmatched.len()
                );
                Ok(report)
            }
            Err(err) => Err(err),
        };
        self.registry.evict(&job_id);
        result
    }

    /// Cooperatively cancel the active job for a surface, if any.
    /// Returns whether a job was cancelled.
    pub fn cancel(&self, surface: &str) -> bool {
        match self.registry.active_job_for(surface) {
            Some(job_id) => self.registry.cancel(&job_id),
            None => false,
        }
    }

    fn start_job(&self, request: &TranslationRequest) -> Result<JobId, PipelineError> {
        self.config
            .validate()
            .map_err(|err| crate::errors::ValidationError::InvalidConfig(err.to_string()))?;
        let segmentation = segmenter::segment(&request.units)?;
        let batches = planner::plan(&segmentation.segments, &self.config.batching);
        let mode = match self.config.batching.strategy {
            BatchStrategy::CharacterBudget => TranslationMode::LengthSensitive,
            _ => TranslationMode::Standard,
        };

        info!(
            "starting job for surface '{}': {} units, {} segments, {} batches",
            request.surface,
            request.units.len(),
            segmentation.segments.len(),
            batches.len()
        );

        self.registry.create_job(JobCreateParams {
            surface: request.surface.clone(),
            source_language: request.source_language.clone(),
            target_language: request.target_language.clone(),
            mode,
            segmentation,
            batches,
        })
    }

    fn coordinator(&self, events: Arc<dyn EventSink>) -> StreamingCoordinator {
        let mut coordinator = StreamingCoordinator::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.registry),
            self.config.coordinator.clone(),
        )
        .with_events(events);

        if let Some(probe) = &self.cancellation_probe {
            coordinator = coordinator.with_cancellation_probe(Arc::clone(probe));
        }
        if let Some(probe) = &self.host_probe {
            coordinator = coordinator.with_host_probe(Arc::clone(probe));
        }
        coordinator
    }
}
