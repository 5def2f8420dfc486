//! Note groups and document scoping.
//!
//! A **note group** is a named, folder-bounded subset of the host's notes.
//! Exactly one group is the active indexing scope at a time; which one is
//! recorded in the settings blob as `indexedNoteGroup`.
//!
//! Independently of groups, an [`AllowPattern`] selects notes by path
//! substrings for whole-vault indexing.

use serde::{Deserialize, Serialize};

use crate::document::DocumentRef;

/// Prompt the copilot feature uses for the default group.
pub const DEFAULT_COPILOT_PROMPT: &str = "The following is a Zettelkasten note written by the user. The note should have 1. a clear title, 2. a single, clear thought stated briefly, 3. links to relevant ideas.\nSuggest revisions for this note. Be very brief and concise. Imitate their writing style. If you show an example of the suggested edits, wrap them in a <note></note> tag. If you want to suggest splitting into multiple notes, use more than one <note></note> tag.";

/// A named scope of notes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteGroup {
    /// Display name.
    pub name: String,

    /// Folder whose notes belong to the group. `None` selects nothing.
    pub notes_folder: Option<String>,

    /// System prompt for the copilot feature. Not used by indexing.
    #[serde(default)]
    pub copilot_prompt: String,
}

impl NoteGroup {
    /// Creates a group with the default copilot prompt.
    pub fn new(name: impl Into<String>, notes_folder: Option<String>) -> Self {
        Self {
            name: name.into(),
            notes_folder,
            copilot_prompt: DEFAULT_COPILOT_PROMPT.to_string(),
        }
    }

    /// Returns true if `path` falls under this group's folder.
    ///
    /// Case-insensitive prefix match.
    pub fn contains(&self, path: &str) -> bool {
        match &self.notes_folder {
            Some(folder) => path.to_lowercase().starts_with(&folder.to_lowercase()),
            None => false,
        }
    }

    /// Returns the documents that belong to this group.
    pub fn documents_in(&self, documents: &[DocumentRef]) -> Vec<DocumentRef> {
        if self.notes_folder.is_none() {
            return Vec::new();
        }
        documents
            .iter()
            .filter(|doc| self.contains(&doc.path))
            .cloned()
            .collect()
    }
}

/// Groups a fresh settings blob starts with.
pub fn default_note_groups() -> Vec<NoteGroup> {
    vec![NoteGroup::new("Permanent Notes", None)]
}

/// Path include pattern, e.g. `"zettel*md,inbox"`.
///
/// Comma separates alternatives; `*` separates substrings that must all
/// occur in the lower-cased path. A path matches if any alternative
/// matches.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllowPattern {
    alternatives: Vec<Vec<String>>,
}

impl AllowPattern {
    /// Parses a pattern string.
    pub fn parse(pattern: &str) -> Self {
        let alternatives = pattern
            .to_lowercase()
            .split(',')
            .filter(|alt| !alt.is_empty())
            .map(|alt| {
                alt.split('*')
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .collect();
        Self { alternatives }
    }

    /// Returns true if `path` matches any alternative.
    pub fn matches(&self, path: &str) -> bool {
        let path = path.to_lowercase();
        self.alternatives
            .iter()
            .any(|parts| parts.iter().all(|part| path.contains(part.as_str())))
    }

    /// Returns the documents whose paths match.
    pub fn filter(&self, documents: &[DocumentRef]) -> Vec<DocumentRef> {
        documents
            .iter()
            .filter(|doc| self.matches(&doc.path))
            .cloned()
            .collect()
    }
}
