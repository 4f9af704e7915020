//! The process-wide vision model.
//!
//! `SharedInferenceEngine` owns the single loaded `VisionModel`. It is built
//! through an `EngineCell`: the first caller runs the loader while every
//! concurrent caller waits on the same initialisation, so the model is loaded
//! exactly once. A failed load is cached too, and later callers get the same
//! `ModelUnavailable` without retrying.
//!
//! Backends that are not reentrant run one generation at a time behind a
//! single-permit semaphore; reentrant ones get `max_concurrent` permits.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use docintake_config::InferenceConfig;
use docintake_core::{
    ExtractionRequest, ExtractionResult, InferenceFailure, IntakeError, ModelLoader, VisionModel,
};
use docintake_logging::redact_sensitive_data;
use tokio::sync::{OnceCell, Semaphore};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub timeout: Duration,
    pub max_concurrent: usize,
}

impl EngineSettings {
    pub fn from_config(config: &InferenceConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_concurrent: config.max_concurrent(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&InferenceConfig::default())
    }
}

pub struct SharedInferenceEngine {
    model: Arc<dyn VisionModel>,
    permits: Semaphore,
    permit_count: u32,
    timeout: Duration,
    released: AtomicBool,
}

impl std::fmt::Debug for SharedInferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedInferenceEngine")
            .field("model", &self.model.name())
            .field("timeout", &self.timeout)
            .field("released", &self.released.load(Ordering::Relaxed))
            .finish()
    }
}

impl SharedInferenceEngine {
    /// Wrap an already-loaded model.
    pub fn new(model: Arc<dyn VisionModel>, settings: EngineSettings) -> Self {
        let permit_count = if model.is_reentrant() { settings.max_concurrent.max(1) as u32 } else { 1 };
        Self {
            model,
            permits: Semaphore::new(permit_count as usize),
            permit_count,
            timeout: settings.timeout,
            released: AtomicBool::new(false),
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Number of generations allowed to run at once.
    pub fn parallelism(&self) -> usize {
        self.permit_count as usize
    }

    /// Run one extraction attempt against the model.
    ///
    /// The returned result carries the raw text only; field parsing belongs to
    /// the kind's adapter. Timeouts and backend errors come back as a failed
    /// result. `Err` is reserved for a released engine.
    pub async fn infer(&self, request: &ExtractionRequest) -> Result<ExtractionResult, IntakeError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| IntakeError::ModelUnavailable("inference engine has been released".into()))?;
        if self.released.load(Ordering::Acquire) {
            return Err(IntakeError::ModelUnavailable("inference engine has been released".into()));
        }

        let kind = request.kind;
        let start = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.model.generate(&request.prompt, &request.image)).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Err(_) => {
                warn!(%kind, latency_ms, "Inference timed out");
                ExtractionResult::failed(kind, "", InferenceFailure::Timeout { after_secs: self.timeout.as_secs() })
            }
            Ok(Err(e)) => {
                warn!(%kind, latency_ms, error = %redact_sensitive_data(&format!("{e:#}")), "Inference backend error");
                ExtractionResult::failed(kind, "", InferenceFailure::Backend { message: format!("{e:#}") })
            }
            Ok(Ok(text)) if text.trim().is_empty() => {
                warn!(%kind, latency_ms, "Model returned empty output");
                ExtractionResult::failed(kind, text, InferenceFailure::EmptyOutput)
            }
            Ok(Ok(text)) => {
                debug!(%kind, latency_ms, raw = %redact_sensitive_data(&text), "Model output");
                ExtractionResult::succeeded(kind, Default::default(), text)
            }
        };
        Ok(result)
    }

    /// Free the model. Only meant for process shutdown; later `infer` calls
    /// fail with `ModelUnavailable`. Waits for in-flight generations.
    pub async fn release_resources(&self) -> Result<(), IntakeError> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        // Holding every permit means nothing is running.
        if let Ok(all) = self.permits.acquire_many(self.permit_count).await {
            all.forget();
        }
        self.permits.close();
        info!(model = self.model.name(), "Releasing inference engine");
        self.model.release().await.map_err(IntakeError::Other)
    }
}

/// Exactly-once holder for the engine.
pub struct EngineCell {
    cell: OnceCell<Result<Arc<SharedInferenceEngine>, String>>,
}

impl EngineCell {
    pub const fn new() -> Self {
        Self { cell: OnceCell::const_new() }
    }

    /// Return the engine, loading it on the first call.
    pub async fn get_or_load(
        &self,
        loader: &dyn ModelLoader,
        settings: EngineSettings,
    ) -> Result<Arc<SharedInferenceEngine>, IntakeError> {
        let slot = self
            .cell
            .get_or_init(|| async move {
                info!(model = loader.model_name(), "Loading vision model");
                let start = Instant::now();
                match loader.load().await {
                    Ok(model) => {
                        info!(
                            model = model.name(),
                            reentrant = model.is_reentrant(),
                            load_ms = start.elapsed().as_millis() as u64,
                            "Vision model loaded"
                        );
                        Ok(Arc::new(SharedInferenceEngine::new(model, settings)))
                    }
                    Err(e) => {
                        error!(model = loader.model_name(), error = %format!("{e:#}"), "Vision model failed to load");
                        Err(format!("{}: {e:#}", loader.model_name()))
                    }
                }
            })
            .await;
        slot.clone().map_err(IntakeError::ModelUnavailable)
    }

    /// The engine if a load has already succeeded.
    pub fn get(&self) -> Option<Arc<SharedInferenceEngine>> {
        self.cell.get().and_then(|slot| slot.as_ref().ok().cloned())
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

impl Default for EngineCell {
    fn default() -> Self {
        Self::new()
    }
}

static INSTANCE: EngineCell = EngineCell::new();

/// The process-wide engine, loaded with `loader` on first use.
pub async fn get_instance(
    loader: &dyn ModelLoader,
    settings: EngineSettings,
) -> Result<Arc<SharedInferenceEngine>, IntakeError> {
    INSTANCE.get_or_load(loader, settings).await
}

/// The process-wide cell, for owners that hand it to services.
pub fn global_cell() -> &'static EngineCell {
    &INSTANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{CountingLoader, MockReply, MockVisionModel};
    use docintake_core::{DocumentKind, RawImage};

    fn request(kind: DocumentKind) -> ExtractionRequest {
        ExtractionRequest {
            kind,
            image: RawImage::new(vec![0u8; 16], "image/png"),
            prompt: "Extract".into(),
        }
    }

    fn settings(timeout_ms: u64) -> EngineSettings {
        EngineSettings { timeout: Duration::from_millis(timeout_ms), max_concurrent: 4 }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_calls_load_once() {
        let cell = Arc::new(EngineCell::new());
        let loader = Arc::new(
            CountingLoader::new(Arc::new(MockVisionModel::new("smolvlm"))).with_delay(Duration::from_millis(50)),
        );

        let mut handles = Vec::new();
        for _ in 0..32 {
            let cell = cell.clone();
            let loader = loader.clone();
            handles.push(tokio::spawn(async move { cell.get_or_load(loader.as_ref(), settings(1000)).await }));
        }
        let mut engines = Vec::new();
        for h in handles {
            engines.push(h.await.unwrap().unwrap());
        }

        assert_eq!(loader.loads(), 1);
        assert!(engines.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn failed_load_is_sticky() {
        let cell = EngineCell::new();
        let loader = CountingLoader::failing("weights not found");

        let first = cell.get_or_load(&loader, settings(1000)).await.unwrap_err();
        let second = cell.get_or_load(&loader, settings(1000)).await.unwrap_err();

        assert!(first.is_fatal());
        assert!(second.to_string().contains("weights not found"));
        assert_eq!(loader.loads(), 1);
        assert!(cell.get().is_none());
        assert!(cell.is_initialized());
    }

    #[tokio::test]
    async fn timeout_becomes_inference_failure() {
        let model = MockVisionModel::new("slow").with_replies([MockReply::Hang]);
        let engine = SharedInferenceEngine::new(Arc::new(model), settings(20));
        let result = engine.infer(&request(DocumentKind::LogCard)).await.unwrap();
        assert!(!result.success);
        assert!(matches!(result.failure, Some(InferenceFailure::Timeout { .. })));
    }

    #[tokio::test]
    async fn backend_error_and_empty_output() {
        let model = MockVisionModel::new("flaky").with_replies([MockReply::Error("CUDA out of memory".into()), MockReply::Text("   ".into())]);
        let engine = SharedInferenceEngine::new(Arc::new(model), settings(1000));

        let first = engine.infer(&request(DocumentKind::IdentityCard)).await.unwrap();
        assert!(matches!(first.failure, Some(InferenceFailure::Backend { ref message }) if message.contains("CUDA")));

        let second = engine.infer(&request(DocumentKind::IdentityCard)).await.unwrap();
        assert_eq!(second.failure, Some(InferenceFailure::EmptyOutput));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn non_reentrant_model_is_serialized() {
        let model = Arc::new(MockVisionModel::new("local").with_delay(Duration::from_millis(20)).with_fallback("Name: A"));
        let engine = Arc::new(SharedInferenceEngine::new(model.clone(), settings(1000)));
        assert_eq!(engine.parallelism(), 1);

        let mut handles = Vec::new();
        for _ in 0..6 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move { engine.infer(&request(DocumentKind::IdentityCard)).await }));
        }
        for h in handles {
            assert!(h.await.unwrap().unwrap().success);
        }
        assert_eq!(model.max_in_flight(), 1);
        assert_eq!(model.calls(), 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn reentrant_model_runs_in_parallel() {
        let model = Arc::new(
            MockVisionModel::new("remote").reentrant().with_delay(Duration::from_millis(50)).with_fallback("Name: A"),
        );
        let engine = Arc::new(SharedInferenceEngine::new(model.clone(), settings(1000)));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move { engine.infer(&request(DocumentKind::LogCard)).await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert!(model.max_in_flight() > 1);
        assert!(model.max_in_flight() <= 4);
    }

    #[tokio::test]
    async fn released_engine_is_unavailable() {
        let model = Arc::new(MockVisionModel::new("m").with_fallback("x"));
        let engine = SharedInferenceEngine::new(model.clone(), settings(1000));
        engine.release_resources().await.unwrap();
        engine.release_resources().await.unwrap();

        let err = engine.infer(&request(DocumentKind::LogCard)).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(model.releases(), 1);
    }

    #[tokio::test]
    async fn global_instance_is_shared() {
        let loader = CountingLoader::new(Arc::new(MockVisionModel::new("global")));
        let a = get_instance(&loader, settings(1000)).await.unwrap();
        let b = get_instance(&loader, settings(1000)).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &global_cell().get().unwrap()));
        assert_eq!(loader.loads(), 1);
    }
}
