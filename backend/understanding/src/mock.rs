//! Scripted model and loader for tests and dry runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use docintake_core::{ModelLoader, RawImage, VisionModel};

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Error(String),
    /// Never answers; exercises timeouts.
    Hang,
}

/// A `VisionModel` that replays scripted replies in order, then repeats the
/// fallback text if one is set.
pub struct MockVisionModel {
    name: String,
    replies: Mutex<VecDeque<MockReply>>,
    fallback: Option<String>,
    delay: Duration,
    reentrant: bool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    releases: AtomicUsize,
}

impl MockVisionModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replies: Mutex::new(VecDeque::new()),
            fallback: None,
            delay: Duration::ZERO,
            reentrant: false,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        }
    }

    pub fn with_replies(self, replies: impl IntoIterator<Item = MockReply>) -> Self {
        if let Ok(mut queue) = self.replies.lock() {
            queue.extend(replies);
        }
        self
    }

    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn reentrant(mut self) -> Self {
        self.reentrant = true;
        self
    }

    /// Queue another reply after construction.
    pub fn push_reply(&self, reply: MockReply) {
        if let Ok(mut queue) = self.replies.lock() {
            queue.push_back(reply);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping `generate` calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> Option<MockReply> {
        let scripted = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        scripted.or_else(|| self.fallback.clone().map(MockReply::Text))
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl VisionModel for MockVisionModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_reentrant(&self) -> bool {
        self.reentrant
    }

    async fn generate(&self, _prompt: &str, _image: &RawImage) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let reply = self.next_reply();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match reply {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Error(message)) => Err(anyhow!(message)),
            Some(MockReply::Hang) => std::future::pending().await,
            None => bail!("mock model {} has no scripted reply left", self.name),
        }
    }

    async fn release(&self) -> Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A loader that counts how many times it was asked to load.
pub struct CountingLoader {
    model: Option<Arc<dyn VisionModel>>,
    failure: Option<String>,
    delay: Duration,
    loads: AtomicUsize,
}

impl CountingLoader {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self { model: Some(model), failure: None, delay: Duration::ZERO, loads: AtomicUsize::new(0) }
    }

    /// A loader whose every load fails, as when weights are missing.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { model: None, failure: Some(message.into()), delay: Duration::ZERO, loads: AtomicUsize::new(0) }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelLoader for CountingLoader {
    fn model_name(&self) -> &str {
        self.model.as_ref().map(|m| m.name()).unwrap_or("mock")
    }

    async fn load(&self) -> Result<Arc<dyn VisionModel>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match (&self.model, &self.failure) {
            (_, Some(message)) => bail!("{message}"),
            (Some(model), None) => Ok(model.clone()),
            (None, None) => bail!("no model configured"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_script_then_fallback() {
        let model = MockVisionModel::new("m")
            .with_replies([MockReply::Error("boom".into())])
            .with_fallback("Name: TAN");
        let image = RawImage::new(vec![1u8], "image/png");

        assert!(model.generate("p", &image).await.is_err());
        assert_eq!(model.generate("p", &image).await.unwrap(), "Name: TAN");
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn exhausted_script_errors() {
        let model = MockVisionModel::new("m");
        model.push_reply(MockReply::Text("once".into()));
        let image = RawImage::new(vec![1u8], "image/png");
        assert_eq!(model.generate("p", &image).await.unwrap(), "once");
        assert!(model.generate("p", &image).await.is_err());
    }
}
