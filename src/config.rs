//! Configuration types for notevec.
//!
//! Two kinds of configuration exist:
//! - [`Config`]: how this process runs the index (model for new stores,
//!   concurrency, credentials override). Supplied by the caller on open.
//! - [`Preferences`]: user settings persisted in the host's settings blob
//!   (content marker, allow pattern, note groups, API keys).
//!
//! # Example
//! ```rust
//! use notevec::{Config, EmbeddingModel};
//!
//! // Use defaults (text-embedding-3-small, 3 requests in flight)
//! let config = Config::default();
//!
//! // Customize
//! let config = Config {
//!     default_model: EmbeddingModel::Ada002,
//!     concurrency_limit: 2,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::note_group::{default_note_groups, NoteGroup};

/// Default number of embedding requests in flight during batch indexing.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 3;

/// Upper bound on `concurrency_limit`.
pub const MAX_CONCURRENCY_LIMIT: usize = 16;

/// Runtime configuration options.
///
/// All fields have sensible defaults. Use struct update syntax to override
/// specific settings.
#[derive(Clone, Debug)]
pub struct Config {
    /// Model used when the settings blob holds no vectors and no model label.
    ///
    /// Existing stores keep the model they were built with; see
    /// [`EmbeddingModel::LEGACY`] for unlabelled stores.
    pub default_model: EmbeddingModel,

    /// Maximum embedding requests in flight during batch indexing.
    ///
    /// Default: 3
    pub concurrency_limit: usize,

    /// OpenAI API key. Overrides the key stored in [`Preferences`] when set.
    pub openai_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_model: EmbeddingModel::default(),
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            openai_api_key: None,
        }
    }
}

impl Config {
    /// Creates a new Config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the configuration.
    ///
    /// Called automatically by `NoteIndex::open()`.
    ///
    /// # Errors
    /// Returns `ValidationError` if `concurrency_limit` is 0 or greater
    /// than [`MAX_CONCURRENCY_LIMIT`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.concurrency_limit == 0 {
            return Err(ValidationError::invalid_field(
                "concurrency_limit",
                "must be greater than 0",
            ));
        }

        if self.concurrency_limit > MAX_CONCURRENCY_LIMIT {
            return Err(ValidationError::invalid_field(
                "concurrency_limit",
                format!("must not exceed {}", MAX_CONCURRENCY_LIMIT),
            ));
        }

        Ok(())
    }

    /// Returns the API key to use, preferring the one in this config.
    pub fn resolve_api_key<'a>(&'a self, preferences: &'a Preferences) -> Option<&'a str> {
        self.openai_api_key
            .as_deref()
            .or(Some(preferences.openai_api_key.as_str()))
            .filter(|key| !key.trim().is_empty())
    }
}

/// Service that serves a given embedding model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelProvider {
    /// OpenAI embeddings API.
    OpenAi,
}

/// Supported embedding models.
///
/// Resolved once when the index is opened; everything downstream matches
/// on the variant instead of comparing model names.
///
/// The settings blob stores the short label (`"v2"`, `"v3_small"`).
/// The API model names are accepted too, since some host versions wrote
/// those instead.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmbeddingModel {
    /// `text-embedding-ada-002`, 1536 dimensions.
    #[serde(rename = "v2", alias = "text-embedding-ada-002")]
    Ada002,

    /// `text-embedding-3-small`, shortened to 256 dimensions.
    #[default]
    #[serde(rename = "v3_small", alias = "text-embedding-3-small")]
    TextEmbedding3Small,
}

impl EmbeddingModel {
    /// Model assumed for stores written before the model label existed.
    pub const LEGACY: Self = Self::Ada002;

    /// All supported models.
    pub const ALL: [Self; 2] = [Self::Ada002, Self::TextEmbedding3Small];

    /// Returns the vector length this model produces.
    ///
    /// # Example
    /// ```rust
    /// use notevec::EmbeddingModel;
    ///
    /// assert_eq!(EmbeddingModel::Ada002.dimension(), 1536);
    /// assert_eq!(EmbeddingModel::TextEmbedding3Small.dimension(), 256);
    /// ```
    #[inline]
    pub const fn dimension(&self) -> usize {
        match self {
            Self::Ada002 => 1536,
            Self::TextEmbedding3Small => 256,
        }
    }

    /// Returns the model name sent to the provider API.
    #[inline]
    pub const fn api_name(&self) -> &'static str {
        match self {
            Self::Ada002 => "text-embedding-ada-002",
            Self::TextEmbedding3Small => "text-embedding-3-small",
        }
    }

    /// Returns the short label stored in the settings blob.
    #[inline]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Ada002 => "v2",
            Self::TextEmbedding3Small => "v3_small",
        }
    }

    /// Returns the `dimensions` request parameter, if the model takes one.
    ///
    /// Ada-002 has a fixed output size and rejects the parameter.
    #[inline]
    pub const fn requested_dimensions(&self) -> Option<usize> {
        match self {
            Self::Ada002 => None,
            Self::TextEmbedding3Small => Some(256),
        }
    }

    /// Returns the service that serves this model.
    #[inline]
    pub const fn provider(&self) -> ModelProvider {
        match self {
            Self::Ada002 | Self::TextEmbedding3Small => ModelProvider::OpenAi,
        }
    }
}

/// User preferences persisted in the host settings blob.
///
/// Field names on the wire follow the host's camelCase settings keys.
/// Missing fields take their defaults, so older blobs load cleanly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    /// OpenAI API key entered by the user.
    #[serde(rename = "openaiAPIKey")]
    pub openai_api_key: String,

    /// Anthropic API key. Owned by the chat feature; round-tripped untouched.
    #[serde(rename = "anthropicAPIKey")]
    pub anthropic_api_key: String,

    /// Comma-separated include pattern for [`AllowPattern`](crate::AllowPattern).
    pub allow_pattern: String,

    /// Configured note groups; one of them is the active indexing scope.
    pub note_groups: Vec<NoteGroup>,

    /// Heading that marks where note content starts. Empty uses the whole note.
    pub content_marker: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            anthropic_api_key: String::new(),
            allow_pattern: ".*".to_string(),
            note_groups: default_note_groups(),
            content_marker: String::new(),
        }
    }
}
