use std::time::{Duration, Instant};

use async_trait::async_trait;
use mcqgen_core::config::LlmConfig;
use mcqgen_core::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// A text-completion model. Any error returned is treated as the model
/// being unreachable for that attempt.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str, system: &str) -> Result<String>;
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    temperature: f32,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Client for an Ollama-compatible `/api/generate` endpoint.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint_url.clone(),
            model: config.model_name.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn generate(&self, prompt: &str, system: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
            temperature: self.temperature,
            options: GenerateOptions { temperature: self.temperature },
        };
        let start = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::ModelUnreachable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ModelUnreachable(format!("HTTP {status}: {body}")));
        }
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::ModelUnreachable(format!("unreadable response body: {e}")))?;
        let text = body.response.ok_or_else(|| {
            Error::ModelUnreachable("'response' key missing from model output".into())
        })?;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(elapsed_ms, chars = text.len(), "model responded");
        Ok(text)
    }
}
