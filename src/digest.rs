//! Content addressing.
//!
//! A note's digest is the Base64 (standard alphabet, padded) encoding of the
//! SHA-256 of its filtered text. The encoding matches what the host has
//! always persisted, so digests in existing settings blobs stay comparable.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest as _, Sha256};

use crate::types::Digest;

/// Computes the content digest of `text`.
///
/// Deterministic and infallible. The empty string is legal input, but
/// callers reject empty extracted text before hashing (see
/// [`ContentFilter::extract`](crate::ContentFilter::extract)).
///
/// # Example
/// ```
/// use notevec::digest;
///
/// assert_eq!(
///     digest("hello world").as_str(),
///     "uU0nuZNNPgilLlLX2n2r+sSE7+N6U4DukIj3rOLvzek="
/// );
/// ```
pub fn digest(text: &str) -> Digest {
    let hash = Sha256::digest(text.as_bytes());
    Digest::from_encoded(STANDARD.encode(hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_digests() {
        assert_eq!(
            digest("hello world").as_str(),
            "uU0nuZNNPgilLlLX2n2r+sSE7+N6U4DukIj3rOLvzek="
        );
        assert_eq!(
            digest("goodbye").as_str(),
            "guNaY866N+lkZDTF3UEupXcUfx5KQczeFhQlMYfj2/k="
        );
    }

    #[test]
    fn test_empty_string_has_fixed_digest() {
        assert_eq!(
            digest("").as_str(),
            "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
    }

    #[test]
    fn test_whitespace_is_significant() {
        assert_ne!(digest("hello world"), digest("hello world\n"));
    }

    proptest! {
        #[test]
        fn prop_digest_is_deterministic(text in ".*") {
            prop_assert_eq!(digest(&text), digest(&text));
        }

        #[test]
        fn prop_digest_is_padded_base64_of_32_bytes(text in ".*") {
            // 32 bytes -> 44 Base64 chars with one '=' of padding
            let d = digest(&text);
            prop_assert_eq!(d.as_str().len(), 44);
            prop_assert!(d.as_str().ends_with('='));
        }
    }
}
