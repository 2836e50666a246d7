/*!
 * End-to-end pipeline tests against mock backends
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use streamlate::backends::mock::MockBackend;
use streamlate::pipeline::registry::{JobCreateParams, JobRegistry};
use streamlate::pipeline::segmenter::segment;
use streamlate::{
    Authority, BatchStrategy, ChannelSink, ErrorClass, JobState, StreamingCoordinator,
    TranslationMode, TranslationPipeline, TranslationRequest, TextHolder,
};

use crate::common::{ScriptStep, ScriptedBackend, TestHolder, fast_config, init_logging, units};

fn request(texts: &[&str]) -> TranslationRequest {
    TranslationRequest {
        surface: "test-surface".to_string(),
        source_language: "en".to_string(),
        target_language: "fr".to_string(),
        units: units(texts),
    }
}

/// Create a job directly on a registry, with one batch per unit
fn one_batch_per_unit_job(
    registry: &JobRegistry,
    texts: &[&str],
) -> streamlate::JobId {
    let segmentation = segment(&units(texts)).unwrap();
    let batches = streamlate::pipeline::planner::plan(
        &segmentation.segments,
        &streamlate::BatchingConfig {
            strategy: BatchStrategy::Fixed,
            optimal_size: 1,
            ..streamlate::BatchingConfig::default()
        },
    );
    registry
        .create_job(JobCreateParams {
            surface: "s".to_string(),
            source_language: "en".to_string(),
            target_language: "fr".to_string(),
            mode: TranslationMode::Standard,
            segmentation,
            batches,
        })
        .unwrap()
}

#[tokio::test]
async fn test_translate_identityBackend_shouldRoundTripStructure() {
    init_logging();
    let pipeline = TranslationPipeline::new(Arc::new(MockBackend::identity()), fast_config());

    let out = pipeline
        .translate(request(&["Hello\n\nWorld", "Second unit."]))
        .await
        .unwrap();

    assert_eq!(out[0].text, "Hello\n\nWorld");
    assert_eq!(out[1].text, "Second unit.");
    assert!(out.iter().all(|u| u.complete));
}

#[tokio::test]
async fn test_translate_workingBackend_shouldTranslateEveryUnit() {
    let pipeline = TranslationPipeline::new(Arc::new(MockBackend::working()), fast_config());

    let out = pipeline.translate(request(&["Hello", "World"])).await.unwrap();
    assert_eq!(out[0].text, "[fr] Hello");
    assert_eq!(out[1].text, "[fr] World");
}

#[tokio::test]
async fn test_translate_batchFailure_shouldRecoverPerItem() {
    // The combined batch fails; every item then succeeds individually
    let mut config = fast_config();
    config.batching.strategy = BatchStrategy::Single;
    let (sink, mut updates) = ChannelSink::unbounded();
    let pipeline = TranslationPipeline::new(Arc::new(MockBackend::batch_failing()), config)
        .with_events(Arc::new(sink));

    let out = pipeline
        .translate(request(&["Alpha", "Beta", "Gamma"]))
        .await
        .unwrap();

    assert_eq!(out[0].text, "[fr] Alpha");
    assert_eq!(out[2].text, "[fr] Gamma");

    // Fallback streams one update per item, all for batch 0
    let mut seen = 0;
    while let Ok(update) = updates.try_recv() {
        assert_eq!(update.batch_index, 0);
        assert!(update.success);
        assert_eq!(update.translated_texts.len(), 1);
        seen += 1;
    }
    assert_eq!(seen, 3);
}

#[tokio::test]
async fn test_translate_miscountedResponse_shouldPadWithOriginalText() {
    let mut config = fast_config();
    config.batching.strategy = BatchStrategy::Single;
    let pipeline = TranslationPipeline::new(Arc::new(MockBackend::miscounted(1)), config);

    let out = pipeline
        .translate(request(&["Alpha", "Beta", "Gamma"]))
        .await
        .unwrap();

    assert_eq!(out[0].text, "[fr] Alpha");
    assert_eq!(out[1].text, "[fr] Beta");
    // The dropped trailing item is padded with its original text
    assert_eq!(out[2].text, "Gamma");
}

#[tokio::test]
async fn test_translate_cancellationBetweenBatches_shouldStopBeforeNextBatch() {
    // Probe flips to cancelled as soon as the backend has served one request
    let backend = MockBackend::identity();
    let counter = backend.clone();
    let probe: Arc<dyn Fn() -> bool + Send + Sync> =
        Arc::new(move || counter.requests_seen() >= 1);

    let mut config = fast_config();
    config.batching.strategy = BatchStrategy::Fixed;
    config.batching.optimal_size = 1;

    let (sink, mut updates) = ChannelSink::unbounded();
    let pipeline = TranslationPipeline::new(Arc::new(backend), config)
        .with_events(Arc::new(sink))
        .with_cancellation_probe(probe);

    let err = pipeline
        .translate(request(&["First", "Second", "Third"]))
        .await
        .unwrap_err();

    assert_eq!(err.classification(), ErrorClass::Cancelled);
    assert!(!err.is_failure());

    // Only batch 0 ever streamed
    while let Ok(update) = updates.try_recv() {
        assert_eq!(update.batch_index, 0);
    }
}

#[tokio::test]
async fn test_coordinator_hardFailureOnSecondBatch_shouldFailFastAndSkipThird() {
    // Batch 0 succeeds; batch 1 fails both combined and in fallback;
    // batch 2 would succeed but must never be attempted.
    init_logging();
    let backend = Arc::new(ScriptedBackend::new(&[
        ScriptStep::Succeed,
        ScriptStep::Fail,
        ScriptStep::Fail,
        ScriptStep::Succeed,
    ]));
    let registry = Arc::new(JobRegistry::new());
    let job_id = one_batch_per_unit_job(&registry, &["First", "Second", "Third"]);

    let (sink, mut updates) = ChannelSink::unbounded();
    let coordinator =
        StreamingCoordinator::new(backend, Arc::clone(&registry), fast_config().coordinator)
            .with_events(Arc::new(sink));

    let err = coordinator.run_job(&job_id).await.unwrap_err();
    assert_eq!(err.classification(), ErrorClass::Backend);
    assert_eq!(registry.state(&job_id), Some(JobState::Error));

    let mut failure_seen = false;
    while let Ok(update) = updates.try_recv() {
        assert_ne!(update.batch_index, 2, "batch 2 must not stream after fail-fast");
        if !update.success {
            failure_seen = true;
        }
    }
    assert!(failure_seen);
}

#[tokio::test]
async fn test_coordinator_skipAndContinue_shouldKeepOriginalForFailedSegment() {
    // Same failure shape, but fail_fast disabled: the failed segment keeps
    // its original text and the job completes with errors recorded.
    let backend = Arc::new(ScriptedBackend::new(&[
        ScriptStep::Succeed,
        ScriptStep::Fail,
        ScriptStep::Fail,
        ScriptStep::Succeed,
    ]));
    let registry = Arc::new(JobRegistry::new());
    let job_id = one_batch_per_unit_job(&registry, &["First", "Second", "Third"]);

    let mut config = fast_config().coordinator;
    config.fail_fast = false;
    let coordinator = StreamingCoordinator::new(backend, Arc::clone(&registry), config);

    let out = coordinator.run_job(&job_id).await.unwrap();
    assert_eq!(out[0].text, "T:First");
    assert_eq!(out[1].text, "Second");
    assert_eq!(out[2].text, "T:Third");
    assert!(!out[1].complete);
    assert!(registry.has_errors(&job_id));
    assert_eq!(registry.state(&job_id), Some(JobState::Completed));
}

#[tokio::test]
async fn test_coordinator_noProgressWindow_shouldTimeOutThenStillComplete() {
    // The backend answers well after the no-progress window; the watchdog
    // moves the job to timeout, and the late result still completes it.
    let registry = Arc::new(JobRegistry::new());
    let job_id = one_batch_per_unit_job(&registry, &["slow text"]);

    let mut config = fast_config().coordinator;
    config.no_progress_timeout_ms = 100;
    let slow = Arc::new(MockBackend::slow(400).with_transform(|t| t.to_uppercase()));
    let coordinator = StreamingCoordinator::new(slow, Arc::clone(&registry), config);

    let out = coordinator.run_job(&job_id).await.unwrap();
    assert_eq!(out[0].text, "SLOW TEXT");
    assert_eq!(registry.state(&job_id), Some(JobState::Completed));
}

#[tokio::test]
async fn test_coordinator_invalidHost_shouldAbortGracefully() {
    let registry = Arc::new(JobRegistry::new());
    let job_id = one_batch_per_unit_job(&registry, &["Hello"]);

    let host_gone: Arc<dyn Fn() -> bool + Send + Sync> = Arc::new(|| false);
    let coordinator = StreamingCoordinator::new(
        Arc::new(MockBackend::working()),
        Arc::clone(&registry),
        fast_config().coordinator,
    )
    .with_host_probe(host_gone);

    let err = coordinator.run_job(&job_id).await.unwrap_err();
    assert_eq!(err.classification(), ErrorClass::HostInvalidated);
    assert!(!err.is_failure());
}

#[tokio::test]
async fn test_pipeline_secondJobOnBusySurface_shouldBeRejected() {
    let pipeline = Arc::new(TranslationPipeline::new(
        Arc::new(MockBackend::slow(300)),
        fast_config(),
    ));

    let first = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.translate(request(&["Hello"])).await })
    };
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    let second = pipeline.translate(request(&["World"])).await;
    assert!(matches!(
        second.unwrap_err().classification(),
        ErrorClass::Admission
    ));

    assert!(first.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_pipeline_cancelSurface_shouldCancelActiveJob() {
    let pipeline = Arc::new(TranslationPipeline::new(
        Arc::new(MockBackend::slow(2_000)),
        fast_config(),
    ));

    let running = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.translate(request(&["Hello"])).await })
    };
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    assert!(pipeline.cancel("test-surface"));
    let err = running.await.unwrap().unwrap_err();
    assert_eq!(err.classification(), ErrorClass::Cancelled);
}

#[tokio::test]
async fn test_translateAndApply_shouldBindFinalTranslationsOntoHolders() {
    let pipeline = TranslationPipeline::new(
        Arc::new(MockBackend::working().with_transform(|t| format!("<{}>", t))),
        fast_config(),
    );
    let mut holders = vec![TestHolder::new("Hello"), TestHolder::new("World")];

    let report = pipeline
        .translate_and_apply(request(&["Hello", "World"]), &mut holders)
        .await
        .unwrap();

    assert_eq!(holders[0].current_text(), "<Hello>");
    assert_eq!(holders[1].current_text(), "<World>");
    assert!(report.unmatched.is_empty());
    assert!(
        report
            .applied
            .iter()
            .all(|entry| entry.authority == Authority::Final)
    );
}

#[tokio::test]
async fn test_translateAndApply_streamedBatches_shouldApplyPartialsAlongTheWay() {
    // Two batches; after the job ends both holders carry final text even
    // though they were first written from streaming partials.
    let mut config = fast_config();
    config.batching.strategy = BatchStrategy::Fixed;
    config.batching.optimal_size = 1;
    let pipeline = TranslationPipeline::new(
        Arc::new(MockBackend::working().with_transform(|t| format!("{}!", t))),
        config,
    );
    let mut holders = vec![TestHolder::new("First"), TestHolder::new("Second")];

    let report = pipeline
        .translate_and_apply(request(&["First", "Second"]), &mut holders)
        .await
        .unwrap();

    assert_eq!(holders[0].current_text(), "First!");
    assert_eq!(holders[1].current_text(), "Second!");
    assert_eq!(report.applied.len(), 2);
}

#[tokio::test]
async fn test_translate_zeroCharacterBudget_shouldFailValidationNotPanic() {
    let mut config = fast_config();
    config.batching.strategy = BatchStrategy::CharacterBudget;
    config.batching.character_budget = 0;
    let pipeline = TranslationPipeline::new(Arc::new(MockBackend::working()), config);

    let err = pipeline.translate(request(&["Hello"])).await.unwrap_err();
    assert_eq!(err.classification(), ErrorClass::Validation);
}

#[tokio::test]
async fn test_translate_emptyUnits_shouldFailValidationSynchronously() {
    let pipeline = TranslationPipeline::new(Arc::new(MockBackend::working()), fast_config());
    let err = pipeline.translate(request(&[])).await.unwrap_err();
    assert_eq!(err.classification(), ErrorClass::Validation);
}

#[tokio::test]
async fn test_registry_lateCancel_discardsInFlightResults() {
    // Cancel while the only batch is in flight: the job ends cancelled and
    // the backend's eventual answer is dropped.
    let registry = Arc::new(JobRegistry::new());
    let job_id = one_batch_per_unit_job(&registry, &["Hello"]);

    let cancelled = Arc::new(AtomicBool::new(false));
    let flip = Arc::clone(&cancelled);
    let probe: Arc<dyn Fn() -> bool + Send + Sync> =
        Arc::new(move || flip.load(Ordering::SeqCst));

    let coordinator = StreamingCoordinator::new(
        Arc::new(MockBackend::slow(500)),
        Arc::clone(&registry),
        fast_config().coordinator,
    )
    .with_cancellation_probe(probe);

    let driver = {
        let coordinator = coordinator.clone();
        let job_id = job_id.clone();
        tokio::spawn(async move { coordinator.run_job(&job_id).await })
    };
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    cancelled.store(true, Ordering::SeqCst);

    let err = driver.await.unwrap().unwrap_err();
    assert_eq!(err.classification(), ErrorClass::Cancelled);
    assert_eq!(registry.state(&job_id), Some(JobState::Cancelled));

    let out = registry.reassemble_current(&job_id).unwrap();
    assert_eq!(out[0].text, "Hello");
    assert!(!out[0].complete);
}
