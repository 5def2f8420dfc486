//! OpenAI embeddings API client.
//!
//! Only compiled when the `openai` feature is enabled.
//!
//! # Request
//!
//! `POST https://api.openai.com/v1/embeddings` with bearer auth and a body
//! of `{ "model", "input", "dimensions"? }`. `dimensions` is only sent for
//! models that accept it (see
//! [`EmbeddingModel::requested_dimensions`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::EmbeddingProvider;
use crate::config::EmbeddingModel;
use crate::error::{NoteVecError, Result};
use crate::types::Embedding;

/// Default API endpoint.
pub const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// OpenAI embedding provider.
#[derive(Clone)]
pub struct OpenAiEmbedding {
    client: reqwest::Client,
    api_key: String,
    model: EmbeddingModel,
    endpoint: String,
}

impl std::fmt::Debug for OpenAiEmbedding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedding")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'static str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Embedding,
    #[serde(default)]
    index: usize,
}

impl OpenAiEmbedding {
    /// Creates a client for `model`.
    ///
    /// # Errors
    ///
    /// Returns `NoteVecError::Config` if the HTTP client cannot be built.
    pub fn new(model: EmbeddingModel, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| NoteVecError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model,
            endpoint: OPENAI_EMBEDDINGS_URL.to_string(),
        })
    }

    /// Points the client at a different endpoint (proxies, test servers).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    #[instrument(skip(self, texts), fields(model = self.model.api_name(), count = texts.len()))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let body = EmbeddingRequest {
            model: self.model.api_name(),
            input: texts,
            dimensions: self.model.requested_dimensions(),
        };

        debug!(endpoint = %self.endpoint, "Requesting embeddings");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| NoteVecError::embedding(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!(%status, "Embedding request rejected");
            return Err(NoteVecError::embedding(format!(
                "OpenAI returned {}: {}",
                status, error_text
            )));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| NoteVecError::embedding(format!("Invalid response body: {}", e)))?;

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn model(&self) -> EmbeddingModel {
        self.model
    }
}
