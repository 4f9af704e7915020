//! Turning document images into fields: the shared vision model, its HTTP
//! backends and the per-kind adapters.

pub mod adapter;
pub mod engine;
pub mod mock;
pub mod vision;

pub use adapter::{AdapterSet, ExtractionAdapter};
pub use engine::{EngineCell, EngineSettings, SharedInferenceEngine, get_instance, global_cell};
pub use mock::{CountingLoader, MockReply, MockVisionModel};
pub use vision::{HttpModelLoader, HttpVisionModel, VisionProvider, loader_from_config};
