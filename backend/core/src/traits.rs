use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{RawImage, Submission};

/// A loaded vision-language model able to answer a prompt about one image.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Model identifier, for logs.
    fn name(&self) -> &str;

    /// Whether `generate` may run concurrently on this instance. Backends that
    /// share accelerator state must return `false` so callers serialize.
    fn is_reentrant(&self) -> bool {
        false
    }

    /// Run the model on one image and return its raw text output.
    async fn generate(&self, prompt: &str, image: &RawImage) -> Result<String>;

    /// Free any accelerator or remote resources. Called once at shutdown.
    async fn release(&self) -> Result<()> {
        Ok(())
    }
}

/// Constructs the process's single `VisionModel`. Invoked at most once.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    fn model_name(&self) -> &str;

    async fn load(&self) -> Result<Arc<dyn VisionModel>>;
}

/// Downstream workbook / CRM system receiving completed sessions.
#[async_trait]
pub trait WorkbookSink: Send + Sync {
    fn name(&self) -> &str;

    async fn submit(&self, session_id: &str, submission: &Submission) -> Result<()>;
}
