//! Embedding provider abstractions for notevec.
//!
//! This module provides the trait and implementations for embedding generation.
//! Embeddings are dense vector representations of note text used for
//! similarity search.
//!
//! # Providers
//!
//! - `OpenAiEmbedding` - OpenAI embeddings API (requires `openai` feature)
//! - Any caller type implementing [`EmbeddingProvider`]
//!
//! The index only ever sends one text per request (see [`embed_one`]).
//! Batching is left to providers that want it.
//!
//! # Example
//!
//! ```rust,ignore
//! use notevec::embedding::create_embedding_provider;
//! use notevec::EmbeddingModel;
//!
//! let provider = create_embedding_provider(EmbeddingModel::default(), Some("sk-..."))?;
//! assert_eq!(provider.dimension(), 256);
//! ```

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "openai")]
pub use openai::OpenAiEmbedding;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{EmbeddingModel, ModelProvider};
use crate::error::{NoteVecError, Result, ValidationError};
use crate::types::Embedding;

/// Embedding provider trait for generating vector representations of text.
///
/// Implementations must be thread-safe (`Send + Sync`); batch indexing calls
/// `embed` from several tasks at once.
///
/// # Implementing a Custom Provider
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use notevec::embedding::EmbeddingProvider;
/// use notevec::{Embedding, EmbeddingModel, Result};
///
/// struct MyProvider { client: MyApiClient }
///
/// #[async_trait]
/// impl EmbeddingProvider for MyProvider {
///     async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
///         Ok(self.client.get_embeddings(texts).await?)
///     }
///
///     fn model(&self) -> EmbeddingModel {
///         EmbeddingModel::TextEmbedding3Small
///     }
/// }
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generates embeddings for `texts`, in the same order.
    ///
    /// # Errors
    ///
    /// Returns `NoteVecError::Embedding` on transport, auth, or rate-limit
    /// failures.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Returns the model this provider serves.
    fn model(&self) -> EmbeddingModel;

    /// Returns the length of the vectors this provider produces.
    fn dimension(&self) -> usize {
        self.model().dimension()
    }

    /// Validates that an embedding has the correct dimension.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::DimensionMismatch` if dimensions don't match.
    fn validate_embedding(&self, embedding: &Embedding) -> Result<()> {
        let expected = self.dimension();
        let actual = embedding.len();

        if actual != expected {
            return Err(ValidationError::dimension_mismatch(expected, actual).into());
        }

        Ok(())
    }
}

/// Embeds a single text.
///
/// Sends a one-element request and takes the first vector of the response.
///
/// # Errors
///
/// Propagates provider errors. Returns `NoteVecError::Embedding` if the
/// provider answers with no vectors and a validation error if the vector
/// has the wrong length.
pub async fn embed_one(provider: &dyn EmbeddingProvider, text: &str) -> Result<Embedding> {
    let mut vectors = provider.embed(&[text.to_string()]).await?;
    if vectors.is_empty() {
        return Err(NoteVecError::embedding("provider returned no embeddings"));
    }
    let embedding = vectors.swap_remove(0);
    provider.validate_embedding(&embedding)?;
    Ok(embedding)
}

/// Creates the provider for `model`.
///
/// # Arguments
///
/// * `model` - The embedding model the index is built with
/// * `api_key` - Credentials for the model's service
///
/// # Errors
///
/// Returns `NoteVecError::Config` if:
/// - No API key is available
/// - The provider's feature is not enabled
pub fn create_embedding_provider(
    model: EmbeddingModel,
    api_key: Option<&str>,
) -> Result<Arc<dyn EmbeddingProvider>> {
    match model.provider() {
        ModelProvider::OpenAi => {
            let Some(key) = api_key.filter(|k| !k.trim().is_empty()) else {
                return Err(NoteVecError::config("OpenAI API key is not set"));
            };
            debug!(model = model.api_name(), "Creating OpenAI embedding provider");
            open_ai(model, key)
        }
    }
}

#[cfg(feature = "openai")]
fn open_ai(model: EmbeddingModel, api_key: &str) -> Result<Arc<dyn EmbeddingProvider>> {
    Ok(Arc::new(OpenAiEmbedding::new(model, api_key)?))
}

#[cfg(not(feature = "openai"))]
fn open_ai(_model: EmbeddingModel, _api_key: &str) -> Result<Arc<dyn EmbeddingProvider>> {
    Err(NoteVecError::config(
        "OpenAI embeddings require the 'openai' feature. \
         Enable it in Cargo.toml: notevec = { features = [\"openai\"] }",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        vectors: Vec<Embedding>,
    }

    #[async_trait]
    impl EmbeddingProvider for Fixed {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Embedding>> {
            Ok(self.vectors.clone())
        }

        fn model(&self) -> EmbeddingModel {
            EmbeddingModel::TextEmbedding3Small
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn test_embed_one_takes_first_vector() {
        let provider = Fixed {
            vectors: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        };
        let embedding = embed_one(&provider, "text").await.unwrap();
        assert_eq!(embedding, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_embed_one_empty_response() {
        let provider = Fixed { vectors: vec![] };
        let err = embed_one(&provider, "text").await.unwrap_err();
        assert!(err.is_embedding());
    }

    #[tokio::test]
    async fn test_embed_one_wrong_dimension() {
        let provider = Fixed {
            vectors: vec![vec![1.0, 0.0, 0.0]],
        };
        let err = embed_one(&provider, "text").await.unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let result = create_embedding_provider(EmbeddingModel::default(), None);
        assert!(result.err().is_some_and(|e| e.is_config()));

        let result = create_embedding_provider(EmbeddingModel::default(), Some("  "));
        assert!(result.err().is_some_and(|e| e.is_config()));
    }

    #[cfg(not(feature = "openai"))]
    #[test]
    fn test_provider_requires_feature() {
        let result = create_embedding_provider(EmbeddingModel::default(), Some("sk-test"));
        assert!(result.err().is_some_and(|e| e.is_config()));
    }
}
