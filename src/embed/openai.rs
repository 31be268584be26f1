//! Blocking client for OpenAI-compatible `/embeddings` endpoints.
//!
//! One request per batch and no retries: a failed call fails the run.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use super::TitleEmbedder;
use crate::{AtlasError, Result};

/// Connection settings for [`OpenAiEmbedder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiEmbedderConfig {
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub model: String,
    /// Expected vector width; sent as `dimensions` when the model supports it.
    pub dimension: usize,
    #[serde(default)]
    pub send_dimensions: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl OpenAiEmbedderConfig {
    /// Read `OPENAI_API_KEY` (and optionally `OPENAI_BASE_URL`) from the environment.
    pub fn from_env(model: impl Into<String>, dimension: usize) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| AtlasError::InvalidOptions {
            reason: "OPENAI_API_KEY is not set".into(),
        })?;
        Ok(Self {
            api_key,
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| default_base_url()),
            model: model.into(),
            dimension,
            send_dimensions: false,
            timeout_secs: default_timeout_secs(),
        })
    }
}

pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
    send_dimensions: bool,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiEmbedderConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AtlasError::InvalidOptions {
                reason: "missing OpenAI API key".into(),
            });
        }
        if config.model.trim().is_empty() {
            return Err(AtlasError::InvalidOptions {
                reason: "missing embedding model name".into(),
            });
        }
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|_| AtlasError::InvalidOptions {
                reason: "invalid OpenAI API key".into(),
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|err| AtlasError::EmbeddingFailed {
                reason: format!("failed to build HTTP client: {err}"),
            })?;
        let endpoint = format!("{}/embeddings", config.base_url.trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            model: config.model,
            dimension: config.dimension,
            send_dimensions: config.send_dimensions,
        })
    }
}

impl TitleEmbedder for OpenAiEmbedder {
    fn embed_titles(&self, titles: &[&str]) -> Result<Vec<Vec<f32>>> {
        if titles.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbeddingRequest {
            model: &self.model,
            input: titles,
            dimensions: self.send_dimensions.then_some(self.dimension),
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(|err| AtlasError::EmbeddingFailed {
                reason: err.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(AtlasError::EmbeddingFailed {
                reason: format!("embeddings request failed ({status}): {body}"),
            });
        }
        let mut parsed: EmbeddingResponse =
            response.json().map_err(|err| AtlasError::EmbeddingFailed {
                reason: format!("failed to parse embedding response: {err}"),
            })?;
        parsed.data.sort_by_key(|entry| entry.index);
        tracing::debug!(
            target = "pubatlas::embed",
            inputs = titles.len(),
            outputs = parsed.data.len(),
            "embedding batch returned"
        );
        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}
