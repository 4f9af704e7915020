//! HTTP vision backends.
//!
//! Two wire formats cover the servers this runs against: OpenAI-style
//! `/v1/chat/completions` (vLLM, LM Studio, hosted OpenAI) and Ollama's
//! `/api/chat`. Both receive the image base64-encoded inline.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use docintake_config::{InferenceConfig, ProviderConfig};
use docintake_core::{IntakeError, ModelLoader, RawImage, VisionModel};
use docintake_media::mime_for_format;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

/// Supported vision providers.
#[derive(Debug, Clone)]
pub enum VisionProvider {
    OpenAiCompatible {
        base_url: String,
        model: String,
        api_key: Option<String>,
        max_tokens: u32,
    },
    Ollama {
        base_url: String,
        model: String,
    },
}

const DEFAULT_MAX_TOKENS: u32 = 512;

impl VisionProvider {
    pub fn from_config(config: &ProviderConfig) -> Self {
        match config {
            ProviderConfig::OpenaiCompatible { base_url, model, api_key, max_tokens } => Self::OpenAiCompatible {
                base_url: base_url.trim_end_matches('/').to_string(),
                model: model.clone(),
                api_key: api_key.clone().filter(|k| !k.is_empty()),
                max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            },
            ProviderConfig::Ollama { base_url, model } => Self::Ollama {
                base_url: base_url.trim_end_matches('/').to_string(),
                model: model.clone(),
            },
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::OpenAiCompatible { model, .. } | Self::Ollama { model, .. } => model,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::OpenAiCompatible { .. } => "openai_compatible",
            Self::Ollama { .. } => "ollama",
        }
    }
}

/// A model served over HTTP. Remote servers queue requests themselves, so
/// this backend is reentrant.
pub struct HttpVisionModel {
    client: Client,
    provider: VisionProvider,
}

impl HttpVisionModel {
    pub fn new(provider: VisionProvider) -> Self {
        Self { client: Client::new(), provider }
    }

    async fn generate_openai(
        &self,
        base_url: &str,
        model: &str,
        api_key: Option<&str>,
        max_tokens: u32,
        prompt: &str,
        image: &RawImage,
    ) -> Result<String> {
        let body = serde_json::json!({
            "model": model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url",
                      "image_url": { "url": data_url(image) } }
                ]
            }],
            "max_tokens": max_tokens,
            "temperature": 0.0
        });

        let mut request = self.client.post(format!("{base_url}/v1/chat/completions")).json(&body);
        if let Some(key) = api_key {
            request = request.bearer_auth(key);
        }
        let resp = request.send().await.context("vision HTTP request failed")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("vision server returned {}: {}", status, resp.text().await.unwrap_or_default());
        }
        let json: serde_json::Value = resp.json().await.context("Failed to parse chat completion")?;
        Ok(json["choices"][0]["message"]["content"].as_str().unwrap_or("").to_string())
    }

    async fn generate_ollama(&self, base_url: &str, model: &str, prompt: &str, image: &RawImage) -> Result<String> {
        let body = serde_json::json!({
            "model": model,
            "messages": [{
                "role": "user",
                "content": prompt,
                "images": [STANDARD.encode(&image.data)]
            }],
            "stream": false,
            "options": { "temperature": 0.0 }
        });

        let resp = self
            .client
            .post(format!("{base_url}/api/chat"))
            .json(&body)
            .send()
            .await
            .context("Ollama HTTP request failed")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("Ollama returned {}: {}", status, resp.text().await.unwrap_or_default());
        }
        let json: serde_json::Value = resp.json().await.context("Failed to parse Ollama response")?;
        Ok(json["message"]["content"].as_str().unwrap_or("").to_string())
    }
}

/// The sniffed format wins over what the transport declared.
fn data_url(image: &RawImage) -> String {
    let mime = match image::guess_format(&image.data) {
        Ok(format) => mime_for_format(format),
        Err(_) if image.declared_format.starts_with("image/") => image.declared_format.as_str(),
        Err(_) => "image/jpeg",
    };
    format!("data:{mime};base64,{}", STANDARD.encode(&image.data))
}

#[async_trait]
impl VisionModel for HttpVisionModel {
    fn name(&self) -> &str {
        self.provider.model()
    }

    fn is_reentrant(&self) -> bool {
        true
    }

    async fn generate(&self, prompt: &str, image: &RawImage) -> Result<String> {
        let start = Instant::now();
        let text = match &self.provider {
            VisionProvider::OpenAiCompatible { base_url, model, api_key, max_tokens } => {
                self.generate_openai(base_url, model, api_key.as_deref(), *max_tokens, prompt, image)
                    .await?
            }
            VisionProvider::Ollama { base_url, model } => self.generate_ollama(base_url, model, prompt, image).await?,
        };
        debug!(
            provider = self.provider.kind(),
            model = self.provider.model(),
            bytes = image.byte_size(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Vision generation finished"
        );
        Ok(text)
    }
}

#[derive(Deserialize)]
struct OpenAiModelList {
    data: Vec<OpenAiModel>,
}

#[derive(Deserialize)]
struct OpenAiModel {
    id: String,
}

#[derive(Deserialize)]
struct OllamaTags {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

/// Loads an `HttpVisionModel` after checking the server lists the model.
pub struct HttpModelLoader {
    client: Client,
    provider: VisionProvider,
}

impl HttpModelLoader {
    pub fn new(provider: VisionProvider) -> Self {
        Self { client: Client::new(), provider }
    }

    async fn listed_models(&self) -> Result<Vec<String>> {
        match &self.provider {
            VisionProvider::OpenAiCompatible { base_url, api_key, .. } => {
                let mut request = self.client.get(format!("{base_url}/v1/models"));
                if let Some(key) = api_key {
                    request = request.bearer_auth(key);
                }
                let resp = request.send().await.context("model listing request failed")?;
                if !resp.status().is_success() {
                    bail!("model listing returned {}", resp.status());
                }
                let list: OpenAiModelList = resp.json().await.context("Failed to parse model listing")?;
                Ok(list.data.into_iter().map(|m| m.id).collect())
            }
            VisionProvider::Ollama { base_url, .. } => {
                let resp = self
                    .client
                    .get(format!("{base_url}/api/tags"))
                    .send()
                    .await
                    .context("Ollama tag listing failed")?;
                if !resp.status().is_success() {
                    bail!("Ollama tag listing returned {}", resp.status());
                }
                let tags: OllamaTags = resp.json().await.context("Failed to parse Ollama tags")?;
                Ok(tags.models.into_iter().map(|m| m.name).collect())
            }
        }
    }
}

/// Ollama lists `llava:latest` for a model requested as `llava`.
fn model_listed(listed: &[String], wanted: &str) -> bool {
    listed
        .iter()
        .any(|name| name == wanted || name.strip_suffix(":latest") == Some(wanted))
}

#[async_trait]
impl ModelLoader for HttpModelLoader {
    fn model_name(&self) -> &str {
        self.provider.model()
    }

    async fn load(&self) -> Result<Arc<dyn VisionModel>> {
        let listed = self.listed_models().await?;
        if !model_listed(&listed, self.provider.model()) {
            bail!(
                "model '{}' is not served by the {} endpoint (available: {})",
                self.provider.model(),
                self.provider.kind(),
                listed.join(", ")
            );
        }
        info!(provider = self.provider.kind(), model = self.provider.model(), "Vision endpoint ready");
        Ok(Arc::new(HttpVisionModel::new(self.provider.clone())))
    }
}

/// Build the loader named by the inference config.
pub fn loader_from_config(config: &InferenceConfig) -> Result<Arc<dyn ModelLoader>, IntakeError> {
    let provider = config
        .provider
        .as_ref()
        .ok_or_else(|| IntakeError::Config("inference.provider is not configured".into()))?;
    Ok(Arc::new(HttpModelLoader::new(VisionProvider::from_config(provider))))
}
