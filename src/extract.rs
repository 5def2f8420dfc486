//! Content extraction.
//!
//! Notes carry metadata (YAML front matter, header sections) that should not
//! influence their embedding. [`ContentFilter`] reduces a note to the text
//! that gets hashed and embedded.
//!
//! # Rules
//!
//! - A leading YAML front matter block (`---` ... `---`) is always dropped.
//! - With no content marker, everything else is kept.
//! - With a marker such as `## Body`, only the lines inside the marked
//!   section are kept. The section starts after the marker line and ends at
//!   the next heading of the same or shallower depth. Deeper headings inside
//!   the section are kept.
//! - The result is trimmed. An empty result is an extraction failure.

use crate::error::{NoteVecError, Result};

/// Filters note text down to the part that is indexed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentFilter {
    /// Marker heading, e.g. `"## Body"`. `None` keeps the whole note.
    marker: Option<String>,

    /// Number of leading `#` in the marker.
    marker_depth: usize,
}

impl ContentFilter {
    /// Creates a filter for the given content marker.
    ///
    /// A blank marker keeps the whole note.
    pub fn new(content_marker: &str) -> Self {
        let marker = content_marker.trim();
        if marker.is_empty() {
            return Self::default();
        }

        Self {
            marker: Some(marker.to_string()),
            marker_depth: heading_depth(marker),
        }
    }

    /// Returns the configured marker, if any.
    pub fn marker(&self) -> Option<&str> {
        self.marker.as_deref()
    }

    /// Applies the filter and returns the trimmed content.
    ///
    /// The result may be empty; see [`extract`](Self::extract) for the
    /// failing variant.
    pub fn filter(&self, text: &str) -> String {
        let body = strip_front_matter(text);

        let Some(marker) = self.marker.as_deref() else {
            return body.trim().to_string();
        };

        let mut recording = false;
        let mut kept: Vec<&str> = Vec::new();

        for line in body.lines() {
            if line.starts_with(marker) {
                recording = true;
                continue;
            }

            let depth = heading_depth(line);
            if depth > 0 && depth <= self.marker_depth && recording {
                recording = false;
                continue;
            }

            if recording {
                kept.push(line);
            }
        }

        kept.join("\n").trim().to_string()
    }

    /// Applies the filter, failing if nothing is left.
    ///
    /// # Errors
    ///
    /// Returns [`NoteVecError::Extraction`] naming `identity` when the
    /// filtered text is empty.
    pub fn extract(&self, identity: &str, text: &str) -> Result<String> {
        let content = self.filter(text);
        if content.is_empty() {
            return Err(NoteVecError::extraction(identity));
        }
        Ok(content)
    }
}

/// Number of leading `#` if the line is a Markdown heading, else 0.
fn heading_depth(line: &str) -> usize {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if hashes == 0 {
        return 0;
    }
    // "#tag" is a tag, not a heading
    match line[hashes..].chars().next() {
        None | Some(' ') | Some('\t') => hashes,
        Some(_) => 0,
    }
}

fn strip_front_matter(text: &str) -> &str {
    let mut lines = text.split_inclusive('\n');
    let mut offset = match lines.next() {
        Some(first) if is_fence(first) => first.len(),
        _ => return text,
    };

    for line in lines {
        offset += line.len();
        if is_fence(line) {
            return &text[offset..];
        }
    }
    text
}

/// A line that is exactly `---`, with an optional `\r\n` or `\n` ending.
fn is_fence(line: &str) -> bool {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);
    line == "---"
}
