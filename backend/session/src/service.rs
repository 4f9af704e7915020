//! The intake service: routes transport events into sessions, runs
//! validation and extraction, and emits structured events back out.

use std::sync::Arc;
use std::time::Duration;

use docintake_config::IntakeConfig;
use docintake_core::{
    InboundEvent, IntakeError, ModelLoader, OutboundEvent, SessionEvent, SubmissionStatus, WorkbookSink,
};
use docintake_logging::EventLogger;
use docintake_media::ImageValidator;
use docintake_understanding::{global_cell, AdapterSet, EngineCell, EngineSettings, SharedInferenceEngine};
use tokio::sync::{mpsc, OwnedMutexGuard};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::registry::{SessionHandle, SessionRegistry};
use crate::session::{DocumentSession, SessionInput, SessionPolicy};
use crate::state::SessionState;

const NOTHING_TO_SUBMIT: &str = "no document was extracted";

pub struct IntakeService {
    registry: SessionRegistry,
    validator: ImageValidator,
    adapters: AdapterSet,
    engine: &'static EngineCell,
    loader: Arc<dyn ModelLoader>,
    settings: EngineSettings,
    sink: Arc<dyn WorkbookSink>,
    outbound: mpsc::Sender<OutboundEvent>,
    idle_timeout: Duration,
}

impl IntakeService {
    pub fn new(
        config: &IntakeConfig,
        loader: Arc<dyn ModelLoader>,
        sink: Arc<dyn WorkbookSink>,
        outbound: mpsc::Sender<OutboundEvent>,
    ) -> Self {
        let session = config.session();
        Self {
            registry: SessionRegistry::new(SessionPolicy::from_config(&session)),
            validator: ImageValidator::from_config(&config.image()),
            adapters: AdapterSet::from_config(&config.prompts()),
            engine: global_cell(),
            loader,
            settings: EngineSettings::from_config(&config.inference()),
            sink,
            outbound,
            idle_timeout: session.idle_timeout(),
        }
    }

    /// Use `cell` instead of the process-wide engine.
    pub fn with_engine_cell(mut self, cell: &'static EngineCell) -> Self {
        self.engine = cell;
        self
    }

    pub fn with_validator(mut self, validator: ImageValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_policy(mut self, policy: SessionPolicy) -> Self {
        self.registry = SessionRegistry::new(policy);
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Load the model ahead of the first image.
    pub async fn warm_up(&self) -> Result<Arc<SharedInferenceEngine>, IntakeError> {
        self.engine.get_or_load(self.loader.as_ref(), self.settings).await
    }

    /// Handle one transport event to completion.
    ///
    /// Only a model that cannot be loaded, or has been released, is an `Err`;
    /// everything else is reported to the user as a `SessionEvent`.
    pub async fn handle(&self, event: InboundEvent) -> Result<(), IntakeError> {
        let session_id = event.session_id().to_string();

        if let InboundEvent::CancelRequested { .. } = event {
            return self.cancel(&session_id).await;
        }

        let (handle, mut session, created) = self.lock_live(&session_id).await;
        let mut events = Vec::new();
        if created {
            events.extend(session.apply(SessionInput::Start));
        }

        let mut pending = None;
        match event {
            InboundEvent::SessionStart { .. } => {
                if !created {
                    events.extend(session.apply(SessionInput::Start));
                }
            }
            InboundEvent::TextReceived { text, .. } => {
                events.extend(session.apply(SessionInput::Text(text)));
            }
            InboundEvent::ImageReceived { kind_hint, image, .. } => {
                events.extend(session.apply(SessionInput::ImageArrived { hint: kind_hint }));
                if let SessionState::Validating(kind) = session.state() {
                    let outcome = self.validator.validate(&image);
                    debug!(session = %session_id, %kind, outcome = %outcome, bytes = image.byte_size(), "Image validated");
                    if !outcome.is_accepted() {
                        events.extend(session.apply(SessionInput::Validated(outcome)));
                    } else {
                        // A first load takes as long as inference, so it also runs unlocked.
                        self.emit_all(&session_id, std::mem::take(&mut events)).await;
                        drop(session);
                        let loaded = self.warm_up().await;
                        session = handle.clone().lock_owned().await;

                        if session.state() != SessionState::Validating(kind) {
                            debug!(session = %session_id, state = %session.state(), "Session moved on while the model loaded");
                            self.settle(&session_id, &handle, session).await?;
                            return loaded.map(|_| ());
                        }
                        let engine = match loaded {
                            Ok(engine) => engine,
                            Err(err) => {
                                events.extend(session.apply(SessionInput::ModelUnavailable { message: err.to_string() }));
                                self.emit_all(&session_id, events).await;
                                return Err(err);
                            }
                        };
                        events.extend(session.apply(SessionInput::Validated(outcome)));
                        pending = session.in_flight().map(|ticket| (ticket, engine, image));
                    }
                }
            }
            InboundEvent::CancelRequested { .. } => {}
        }
        self.emit_all(&session_id, events).await;

        let Some((ticket, engine, image)) = pending else {
            return self.settle(&session_id, &handle, session).await;
        };

        // The model runs without the session lock so cancels and
        // "still working" replies are not blocked behind inference.
        drop(session);
        let adapter = self.adapters.get(ticket.kind);
        let attempt = adapter.extract(&engine, image).await;
        let mut session = handle.clone().lock_owned().await;

        match attempt {
            Ok(result) => {
                let events = session.apply(SessionInput::Extracted { ticket, result });
                self.emit_all(&session_id, events).await;
                self.settle(&session_id, &handle, session).await
            }
            Err(err) => {
                if session.in_flight() == Some(ticket) {
                    let events = session.apply(SessionInput::ModelUnavailable { message: err.to_string() });
                    self.emit_all(&session_id, events).await;
                }
                Err(err)
            }
        }
    }

    async fn cancel(&self, session_id: &str) -> Result<(), IntakeError> {
        let Some(handle) = self.registry.get(session_id).await else {
            self.emit(session_id, SessionEvent::NotExpected { detail: "there is no active session to cancel".into() })
                .await;
            return Ok(());
        };
        let mut session = handle.clone().lock_owned().await;
        let events = session.apply(SessionInput::Cancel);
        self.emit_all(session_id, events).await;
        self.settle(session_id, &handle, session).await
    }

    /// Lock the live session for `session_id`, creating one if needed.
    async fn lock_live(&self, session_id: &str) -> (SessionHandle, OwnedMutexGuard<DocumentSession>, bool) {
        loop {
            let (handle, created) = self.registry.get_or_create(session_id).await;
            let guard = handle.clone().lock_owned().await;
            if !guard.is_terminal() {
                return (handle, guard, created);
            }
            // Finished while we waited for the lock.
            self.registry.remove_if_same(session_id, &handle).await;
        }
    }

    /// Drop terminal sessions from the registry and hand completed ones to
    /// the workbook.
    async fn settle(
        &self,
        session_id: &str,
        handle: &SessionHandle,
        session: OwnedMutexGuard<DocumentSession>,
    ) -> Result<(), IntakeError> {
        match session.state() {
            SessionState::Cancelled => {
                self.registry.remove_if_same(session_id, handle).await;
                Ok(())
            }
            SessionState::Completed => {
                self.registry.remove_if_same(session_id, handle).await;
                let results = session.results().clone();
                let details = session.details().clone();
                let submission = session.submission();
                drop(session);

                let status = if submission.documents.is_empty() {
                    SubmissionStatus::Failed { message: NOTHING_TO_SUBMIT.into() }
                } else {
                    match self.sink.submit(session_id, &submission).await {
                        Ok(()) => {
                            info!(session = %session_id, sink = self.sink.name(), documents = submission.documents.len(), "Session submitted");
                            SubmissionStatus::Submitted
                        }
                        Err(e) => {
                            let err = IntakeError::IntegrationFailure(format!("{e:#}"));
                            warn!(session = %session_id, sink = self.sink.name(), error = %err, "Workbook submission failed");
                            SubmissionStatus::Failed { message: err.to_string() }
                        }
                    }
                };
                self.emit(session_id, SessionEvent::SessionCompleted { results, details, submission: status }).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Expire idle sessions and tell their users. Returns how many expired.
    pub async fn reap_idle(&self) -> usize {
        let expired = self.registry.reap_idle(self.idle_timeout).await;
        let count = expired.len();
        for (session_id, event) in expired {
            self.emit(&session_id, event).await;
        }
        count
    }

    /// Consume inbound events until the channel closes.
    ///
    /// Each event runs on its own task so one slow extraction does not hold
    /// up other users. A fatal error stops intake and is returned.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<InboundEvent>) -> Result<(), IntakeError> {
        info!(required = ?self.registry.policy().required_kinds, "Intake service started");
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(event) => {
                        let service = self.clone();
                        tasks.spawn(async move { service.handle(event).await });
                    }
                    None => break,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(err) = check_joined(joined) {
                        tasks.shutdown().await;
                        return Err(err);
                    }
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            check_joined(joined)?;
        }
        info!("Intake service stopped");
        Ok(())
    }

    /// Release the model. Later extractions fail with `ModelUnavailable`.
    pub async fn shutdown(&self) -> Result<(), IntakeError> {
        match self.engine.get() {
            Some(engine) => engine.release_resources().await,
            None => Ok(()),
        }
    }

    async fn emit_all(&self, session_id: &str, events: Vec<SessionEvent>) {
        for event in events {
            self.emit(session_id, event).await;
        }
    }

    async fn emit(&self, session_id: &str, event: SessionEvent) {
        let outbound = OutboundEvent::new(session_id, event);
        EventLogger::log_event(&outbound);
        if self.outbound.send(outbound).await.is_err() {
            warn!(session = %session_id, "Outbound channel closed; event dropped");
        }
    }
}

/// Fatal errors end the loop; anything else is logged.
fn check_joined(joined: Result<Result<(), IntakeError>, JoinError>) -> Result<(), IntakeError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) if err.is_fatal() => {
            error!(error = %err, "Fatal intake error; stopping");
            Err(err)
        }
        Ok(Err(err)) => {
            warn!(error = %err, "Event handling failed");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Event task panicked");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use docintake_core::{DocumentKind, KindOutcome, RawImage, Submission};
    use docintake_media::ImageLimits;
    use docintake_understanding::{CountingLoader, MockReply, MockVisionModel};
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;
    use std::sync::Mutex as StdMutex;

    const ID_TEXT: &str = "Name: TAN AH KOW\nDate of birth: 27-11-1985\nSex: M";
    const LOG_TEXT: &str = "Vehicle No: SBA1234A\nMake/Model: TOYOTA / COROLLA";

    #[derive(Default)]
    struct RecordingSink {
        submitted: StdMutex<Vec<(String, Submission)>>,
        fail: bool,
    }

    #[async_trait]
    impl WorkbookSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn submit(&self, session_id: &str, submission: &Submission) -> Result<()> {
            if self.fail {
                bail!("board not found");
            }
            self.submitted.lock().unwrap().push((session_id.to_string(), submission.clone()));
            Ok(())
        }
    }

    fn png(side: u32) -> RawImage {
        let img = ImageBuffer::from_fn(side, side, |x, y| {
            let v = (x.wrapping_mul(31) ^ y.wrapping_mul(17)).wrapping_mul(2654435761) >> 24;
            Rgb([v as u8, (v >> 1) as u8, (v >> 2) as u8])
        });
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        RawImage::new(out.into_inner(), "image/png")
    }

    fn validator() -> ImageValidator {
        ImageValidator::new(ImageLimits {
            min_width: 32,
            min_height: 32,
            min_bytes: 16,
            max_bytes: 4 * 1024 * 1024,
            allowed: vec![ImageFormat::Png, ImageFormat::Jpeg],
        })
    }

    struct Harness {
        service: Arc<IntakeService>,
        rx: mpsc::Receiver<OutboundEvent>,
        sink: Arc<RecordingSink>,
        loader: Arc<CountingLoader>,
    }

    impl Harness {
        fn new(kinds: &[DocumentKind], max_retries: u32, model: MockVisionModel) -> Self {
            Self::with_loader(kinds, max_retries, CountingLoader::new(Arc::new(model)), RecordingSink::default())
        }

        fn with_loader(kinds: &[DocumentKind], max_retries: u32, loader: CountingLoader, sink: RecordingSink) -> Self {
            let (tx, rx) = mpsc::channel(256);
            let loader = Arc::new(loader);
            let sink = Arc::new(sink);
            let cell: &'static EngineCell = Box::leak(Box::new(EngineCell::new()));
            let service = IntakeService::new(&IntakeConfig::default(), loader.clone(), sink.clone(), tx)
                .with_engine_cell(cell)
                .with_validator(validator())
                .with_policy(SessionPolicy::new(kinds.to_vec(), max_retries));
            Self { service: Arc::new(service), rx, sink, loader }
        }

        fn drain(&mut self) -> Vec<SessionEvent> {
            let mut out = Vec::new();
            while let Ok(outbound) = self.rx.try_recv() {
                out.push(outbound.event);
            }
            out
        }

        async fn image(&self, id: &str, image: RawImage) -> Result<(), IntakeError> {
            self.service
                .handle(InboundEvent::ImageReceived { session_id: id.into(), kind_hint: None, image })
                .await
        }
    }

    fn completed(events: &[SessionEvent]) -> Option<&SessionEvent> {
        events.iter().find(|e| matches!(e, SessionEvent::SessionCompleted { .. }))
    }

    #[tokio::test]
    async fn small_image_then_valid_image_advances() {
        let model = MockVisionModel::new("m").with_replies([MockReply::Text(ID_TEXT.into())]);
        let mut h = Harness::new(&[DocumentKind::IdentityCard, DocumentKind::LogCard], 2, model);

        h.service.handle(InboundEvent::SessionStart { session_id: "u1".into() }).await.unwrap();
        h.image("u1", png(8)).await.unwrap();
        h.image("u1", png(64)).await.unwrap();

        let events = h.drain();
        assert_eq!(events[0], SessionEvent::DocumentRequested { kind: DocumentKind::IdentityCard });
        assert!(matches!(
            events[1],
            SessionEvent::ValidationRejected { kind: DocumentKind::IdentityCard, attempts_remaining: 2, .. }
        ));
        assert!(matches!(events[2], SessionEvent::ExtractionSucceeded { kind: DocumentKind::IdentityCard, .. }));
        assert_eq!(events[3], SessionEvent::DocumentRequested { kind: DocumentKind::LogCard });
        assert_eq!(h.loader.loads(), 1);
    }

    #[tokio::test]
    async fn repeated_failures_complete_with_partial_results() {
        let model = MockVisionModel::new("m").with_replies([
            MockReply::Text(ID_TEXT.into()),
            MockReply::Error("cuda oom".into()),
            MockReply::Text(String::new()),
            MockReply::Text("Vehicle No: SBA1234A".into()),
        ]);
        let mut h = Harness::new(&[DocumentKind::IdentityCard, DocumentKind::LogCard], 2, model);

        for _ in 0..4 {
            h.image("u1", png(64)).await.unwrap();
        }

        let events = h.drain();
        let Some(SessionEvent::SessionCompleted { results, submission, .. }) = completed(&events) else {
            panic!("session did not complete: {events:?}");
        };
        assert_eq!(results.len(), 2);
        assert!(results[&DocumentKind::IdentityCard].is_success());
        assert!(matches!(results[&DocumentKind::LogCard], KindOutcome::PermanentlyFailed { attempts: 3, .. }));
        assert_eq!(*submission, SubmissionStatus::Submitted);
        assert!(events.contains(&SessionEvent::KindPermanentlyFailed { kind: DocumentKind::LogCard, attempts: 3 }));

        let submitted = h.sink.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].1.documents.len(), 1);
        assert!(h.service.registry().is_empty().await);
    }

    #[tokio::test]
    async fn cancel_while_extracting_discards_result() {
        let model = MockVisionModel::new("m")
            .with_replies([MockReply::Text(LOG_TEXT.into())])
            .with_delay(Duration::from_millis(200));
        let mut h = Harness::new(&[DocumentKind::LogCard], 2, model);

        let service = h.service.clone();
        let extraction = tokio::spawn(async move {
            service
                .handle(InboundEvent::ImageReceived { session_id: "u1".into(), kind_hint: None, image: png(64) })
                .await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        h.service.handle(InboundEvent::CancelRequested { session_id: "u1".into() }).await.unwrap();
        extraction.await.unwrap().unwrap();

        let events = h.drain();
        assert!(events.contains(&SessionEvent::SessionCancelled));
        assert!(!events.iter().any(|e| matches!(e, SessionEvent::ExtractionSucceeded { .. })));
        assert!(completed(&events).is_none());
        assert!(h.sink.submitted.lock().unwrap().is_empty());
        assert!(h.service.registry().is_empty().await);
    }

    #[tokio::test]
    async fn image_during_extraction_is_refused() {
        let model = MockVisionModel::new("m")
            .with_replies([MockReply::Text(LOG_TEXT.into())])
            .with_delay(Duration::from_millis(150));
        let mut h = Harness::new(&[DocumentKind::LogCard], 2, model);

        let service = h.service.clone();
        let first = tokio::spawn(async move {
            service
                .handle(InboundEvent::ImageReceived { session_id: "u1".into(), kind_hint: None, image: png(64) })
                .await
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        h.image("u1", png(64)).await.unwrap();
        first.await.unwrap().unwrap();

        let events = h.drain();
        assert!(events.contains(&SessionEvent::ExtractionInProgress { kind: DocumentKind::LogCard }));
        assert!(completed(&events).is_some());
    }

    #[tokio::test]
    async fn unloadable_model_is_fatal_and_never_extracts() {
        let mut h = Harness::with_loader(
            &[DocumentKind::IdentityCard],
            2,
            CountingLoader::failing("weights not found"),
            RecordingSink::default(),
        );

        let err = h.image("u1", png(64)).await.unwrap_err();
        assert!(err.is_fatal());
        let err = h.image("u2", png(64)).await.unwrap_err();
        assert!(matches!(err, IntakeError::ModelUnavailable(_)));
        assert_eq!(h.loader.loads(), 1);

        for id in ["u1", "u2"] {
            let handle = h.service.registry().get(id).await.unwrap();
            let session = handle.lock().await;
            assert_eq!(session.state(), SessionState::AwaitingImage(DocumentKind::IdentityCard));
            assert_eq!(session.retry_count(), 0);
        }
        let events = h.drain();
        assert_eq!(events.iter().filter(|e| matches!(e, SessionEvent::ModelUnavailable { .. })).count(), 2);
    }

    #[tokio::test]
    async fn run_stops_on_fatal_error() {
        let h = Harness::with_loader(
            &[DocumentKind::IdentityCard],
            2,
            CountingLoader::failing("weights not found"),
            RecordingSink::default(),
        );
        let (tx, rx) = mpsc::channel(8);
        let runner = tokio::spawn(h.service.clone().run(rx));
        tx.send(InboundEvent::ImageReceived { session_id: "u1".into(), kind_hint: None, image: png(64) })
            .await
            .unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), runner).await.unwrap().unwrap();
        assert!(matches!(result, Err(IntakeError::ModelUnavailable(_))));
    }

    #[tokio::test]
    async fn run_drains_when_channel_closes() {
        let model = MockVisionModel::new("m").with_fallback(LOG_TEXT);
        let mut h = Harness::new(&[DocumentKind::LogCard], 1, model);
        let (tx, rx) = mpsc::channel(8);
        let runner = tokio::spawn(h.service.clone().run(rx));
        for id in ["a", "b", "c"] {
            tx.send(InboundEvent::ImageReceived { session_id: id.into(), kind_hint: None, image: png(64) })
                .await
                .unwrap();
        }
        drop(tx);
        runner.await.unwrap().unwrap();

        let events = h.drain();
        let completions = events.iter().filter(|e| matches!(e, SessionEvent::SessionCompleted { .. })).count();
        assert_eq!(completions, 3);
        assert_eq!(h.sink.submitted.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn sink_failure_is_reported_not_raised() {
        let model = MockVisionModel::new("m").with_fallback(LOG_TEXT);
        let mut h = Harness::with_loader(
            &[DocumentKind::LogCard],
            1,
            CountingLoader::new(Arc::new(model)),
            RecordingSink { fail: true, ..Default::default() },
        );
        h.image("u1", png(64)).await.unwrap();

        let events = h.drain();
        match completed(&events) {
            Some(SessionEvent::SessionCompleted { submission: SubmissionStatus::Failed { message }, results, .. }) => {
                assert!(message.contains("board not found"));
                assert_eq!(results.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn all_kinds_failed_skips_sink() {
        let model = MockVisionModel::new("m").with_fallback("nothing legible");
        let mut h = Harness::new(&[DocumentKind::LogCard], 0, model);
        h.image("u1", png(64)).await.unwrap();

        let events = h.drain();
        let Some(SessionEvent::SessionCompleted { submission, .. }) = completed(&events) else {
            panic!("not completed");
        };
        assert_eq!(*submission, SubmissionStatus::Failed { message: NOTHING_TO_SUBMIT.into() });
        assert!(h.sink.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_is_not_blocked_by_model_load() {
        let model = Arc::new(MockVisionModel::new("m").with_fallback(LOG_TEXT));
        let mut h = Harness::with_loader(
            &[DocumentKind::LogCard],
            1,
            CountingLoader::new(model.clone()).with_delay(Duration::from_millis(600)),
            RecordingSink::default(),
        );

        let service = h.service.clone();
        let upload = tokio::spawn(async move {
            service
                .handle(InboundEvent::ImageReceived { session_id: "u1".into(), kind_hint: None, image: png(64) })
                .await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        let cancel = h.service.handle(InboundEvent::CancelRequested { session_id: "u1".into() });
        tokio::time::timeout(Duration::from_millis(300), cancel)
            .await
            .expect("cancel waited for the model load")
            .unwrap();
        upload.await.unwrap().unwrap();

        let events = h.drain();
        assert!(events.contains(&SessionEvent::SessionCancelled));
        assert!(!events.iter().any(|e| matches!(e, SessionEvent::ExtractionSucceeded { .. })));
        assert_eq!(model.calls(), 0);
        assert_eq!(h.loader.loads(), 1);
        assert!(h.service.registry().is_empty().await);
    }

    #[tokio::test]
    async fn text_from_new_user_is_not_expected() {
        let mut h = Harness::new(&[DocumentKind::LogCard], 1, MockVisionModel::new("m"));
        h.service
            .handle(InboundEvent::TextReceived { session_id: "u1".into(), text: "hello".into() })
            .await
            .unwrap();

        let events = h.drain();
        assert_eq!(events[0], SessionEvent::DocumentRequested { kind: DocumentKind::LogCard });
        assert!(matches!(events[1], SessionEvent::NotExpected { .. }));
        assert_eq!(events.len(), 2);
        let handle = h.service.registry().get("u1").await.unwrap();
        assert_eq!(handle.lock().await.state(), SessionState::AwaitingImage(DocumentKind::LogCard));
    }

    #[tokio::test]
    async fn cancel_without_session_creates_nothing() {
        let mut h = Harness::new(&[DocumentKind::LogCard], 1, MockVisionModel::new("m"));
        h.service.handle(InboundEvent::CancelRequested { session_id: "ghost".into() }).await.unwrap();
        let events = h.drain();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], SessionEvent::NotExpected { .. }));
        assert!(h.service.registry().is_empty().await);
    }

    #[tokio::test]
    async fn shutdown_releases_model_once() {
        let model = Arc::new(MockVisionModel::new("m"));
        let h = Harness::with_loader(
            &[DocumentKind::LogCard],
            1,
            CountingLoader::new(model.clone()),
            RecordingSink::default(),
        );
        h.service.shutdown().await.unwrap();
        assert_eq!(model.releases(), 0);

        h.service.warm_up().await.unwrap();
        h.service.shutdown().await.unwrap();
        h.service.shutdown().await.unwrap();
        assert_eq!(model.releases(), 1);
    }
}
