//! Settings blob schema.
//!
//! The blob is one JSON object. Preference keys sit at the top level next
//! to the index keys:
//!
//! ```text
//! {
//!   "openaiAPIKey": "...",
//!   "anthropicAPIKey": "...",
//!   "allowPattern": ".*",
//!   "noteGroups": [ { "name", "notesFolder", "copilotPrompt" } ],
//!   "contentMarker": "",
//!   "vectors": [ { "linktext", "path", "embedding", "sha" } ],
//!   "embeddingsModelVersion": "v3_small",
//!   "indexedNoteGroup": 0
//! }
//! ```
//!
//! # Migration
//!
//! Blobs written before `embeddingsModelVersion` existed were built with the
//! legacy model. A blob without the label but with vectors is therefore
//! read as [`EmbeddingModel::LEGACY`]; a blob with neither takes the
//! configured default.

use redb::TableDefinition;
use serde::{Deserialize, Serialize};

use crate::config::{EmbeddingModel, Preferences};
use crate::error::{Result, StorageError};
use crate::types::StoredVector;

/// Table holding the settings blob.
///
/// Key: fixed string [`SETTINGS_KEY`]
/// Value: UTF-8 JSON
pub const SETTINGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("settings");

/// Key of the blob in [`SETTINGS_TABLE`].
pub const SETTINGS_KEY: &str = "plugin_settings";

/// Decoded settings blob.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDocument {
    /// User preferences.
    #[serde(flatten)]
    pub preferences: Preferences,

    /// Flat vector list, in insertion order.
    #[serde(default)]
    pub vectors: Vec<StoredVector>,

    /// Model the vectors were built with. Absent in legacy blobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embeddings_model_version: Option<EmbeddingModel>,

    /// Index into `preferences.note_groups` of the active scope.
    #[serde(default)]
    pub indexed_note_group: usize,
}

impl SettingsDocument {
    /// Decodes a blob.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupted`] if the blob is not a valid
    /// settings object.
    pub fn from_blob(blob: &[u8]) -> Result<Self> {
        serde_json::from_slice(blob)
            .map_err(|e| StorageError::corrupted(format!("Invalid settings blob: {}", e)).into())
    }

    /// Encodes the document.
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self).map_err(StorageError::from)?)
    }

    /// Resolves which model the stored vectors belong to.
    pub fn resolve_model(&self, default: EmbeddingModel) -> EmbeddingModel {
        match self.embeddings_model_version {
            Some(model) => model,
            None if !self.vectors.is_empty() => EmbeddingModel::LEGACY,
            None => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Digest;

    #[test]
    fn test_empty_object_loads_defaults() {
        let doc = SettingsDocument::from_blob(b"{}").unwrap();
        assert!(doc.vectors.is_empty());
        assert_eq!(doc.indexed_note_group, 0);
        assert_eq!(doc.preferences, Preferences::default());
    }

    #[test]
    fn test_garbage_is_corrupted() {
        let err = SettingsDocument::from_blob(b"not json").unwrap_err();
        assert!(err.is_storage());
    }

    #[test]
    fn test_legacy_blob_resolves_to_legacy_model() {
        let blob = br#"{"vectors":[{"linktext":"A","path":"A.md","embedding":[1.0],"sha":"x"}]}"#;
        let doc = SettingsDocument::from_blob(blob).unwrap();
        assert_eq!(
            doc.resolve_model(EmbeddingModel::TextEmbedding3Small),
            EmbeddingModel::LEGACY
        );
    }

    #[test]
    fn test_fresh_blob_resolves_to_default_model() {
        let doc = SettingsDocument::default();
        assert_eq!(
            doc.resolve_model(EmbeddingModel::TextEmbedding3Small),
            EmbeddingModel::TextEmbedding3Small
        );
    }

    #[test]
    fn test_labelled_blob_keeps_its_model() {
        let doc = SettingsDocument::from_blob(br#"{"embeddingsModelVersion":"v2"}"#).unwrap();
        assert_eq!(
            doc.resolve_model(EmbeddingModel::TextEmbedding3Small),
            EmbeddingModel::Ada002
        );
    }

    #[test]
    fn test_blob_keys_are_flat() {
        let doc = SettingsDocument {
            vectors: vec![StoredVector::new("A", "A.md", vec![0.0], Digest::from_encoded("h"))],
            embeddings_model_version: Some(EmbeddingModel::TextEmbedding3Small),
            indexed_note_group: 2,
            ..Default::default()
        };
        let json: serde_json::Value = serde_json::from_slice(&doc.to_blob().unwrap()).unwrap();
        assert_eq!(json["embeddingsModelVersion"], "v3_small");
        assert_eq!(json["indexedNoteGroup"], 2);
        assert_eq!(json["vectors"][0]["linktext"], "A");
        assert_eq!(json["allowPattern"], ".*");
        assert!(json.get("preferences").is_none());
    }
}
