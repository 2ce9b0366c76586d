//! OpenAI-compatible embeddings over HTTP
//!
//! Talks to `POST {base_url}/embeddings`. The same client serves OpenAI and
//! Ollama's OpenAI-compatible endpoint; only the base URL and key differ.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::EmbeddingProvider;
use crate::embeddings::retry::{Attempt, RetryConfig, with_retry};
use crate::error::{MnemeError, Result};

/// Default OpenAI API base URL
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Ollama OpenAI-compatible base URL
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Embedding provider for OpenAI-compatible APIs
#[derive(Debug, Clone)]
pub struct OpenAIEmbeddings {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    dimension: usize,
    send_dimensions: bool,
    retry: RetryConfig,
    name: &'static str,
}

impl OpenAIEmbeddings {
    /// Create a provider for the OpenAI API.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            api_key: Some(api_key.into()),
            model: model.into(),
            base_url: OPENAI_BASE_URL.to_string(),
            dimension,
            send_dimensions: true,
            retry: RetryConfig::default(),
            name: "openai",
        })
    }

    /// Create a provider for a local Ollama server.
    ///
    /// Ollama ignores the `dimensions` request field, so it is not sent.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn ollama(model: impl Into<String>, dimension: usize, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            api_key: None,
            model: model.into(),
            base_url: OLLAMA_BASE_URL.to_string(),
            dimension,
            send_dimensions: false,
            retry: RetryConfig::default(),
            name: "ollama",
        })
    }

    /// Use a different base URL (proxies, self-hosted gateways)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Configured model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Endpoint requests are sent to
    pub fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }

    async fn send_once(&self, texts: &[&str]) -> Attempt<Vec<Vec<f32>>, MnemeError> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.send_dimensions.then_some(self.dimension),
        };

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return Attempt::Transient(MnemeError::Embedding(format!(
                    "request to {} failed: {}",
                    self.name, e
                )));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            let error = MnemeError::Embedding(format!(
                "{} returned HTTP {}: {}",
                self.name, status, message
            ));
            return if self.retry.is_retryable_status(status.as_u16()) {
                Attempt::Transient(error)
            } else {
                Attempt::Done(Err(error))
            };
        }

        let parsed = match response.json::<EmbeddingResponse>().await {
            Ok(parsed) => parsed,
            Err(e) => {
                return Attempt::Done(Err(MnemeError::Embedding(format!(
                    "invalid response from {}: {}",
                    self.name, e
                ))));
            }
        };

        Attempt::Done(order_embeddings(parsed, texts.len()))
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| MnemeError::Configuration(format!("Failed to build HTTP client: {}", e)))
}

/// Put response vectors back in request order
fn order_embeddings(response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    if response.data.len() != expected {
        return Err(MnemeError::Embedding(format!(
            "expected {} embeddings, got {}",
            expected,
            response.data.len()
        )));
    }

    let mut data = response.data;
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MnemeError::Embedding("empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        with_retry(&self.retry, || self.send_once(texts)).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        self.name
    }
}
