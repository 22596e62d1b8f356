//! Request fingerprinting.
//!
//! A fingerprint identifies an equivalence class of requests for caching and
//! in-flight deduplication. It is a pure function of the normalized prompt
//! text, the request kind and the locale; the same text asked in a different
//! locale produces a different fingerprint.

use crate::types::{Locale, RequestKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Content-addressed request identity (hex-encoded SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestFingerprint(String);

impl RequestFingerprint {
    /// Compute the fingerprint of `(kind, locale, normalized prompt)`.
    pub fn compute(kind: RequestKind, text: &str, locale: Locale) -> Self {
        let payload = format!(
            "{}:{}:{}",
            kind.as_str(),
            locale.as_str(),
            normalize_prompt(text)
        );
        let mut hasher = Sha256::new();
        hasher.update(payload.as_bytes());
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalize a prompt for cache equivalence: trim, lowercase, collapse runs
/// of whitespace to single spaces.
pub fn normalize_prompt(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Short stable hash of a user identifier for pseudonymous accounting.
pub fn hash_identity(id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    let digest = hasher.finalize();
    digest
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_collapses_whitespace_and_case() {
        assert_eq!(
            normalize_prompt("  Мне   ТРЕВОЖНО\n сегодня "),
            "мне тревожно сегодня"
        );
        assert_eq!(normalize_prompt(""), "");
    }

    #[test]
    fn fingerprint_is_pure() {
        let a = RequestFingerprint::compute(RequestKind::MoodReply, "I feel tense", Locale::En);
        let b = RequestFingerprint::compute(RequestKind::MoodReply, "  i FEEL   tense ", Locale::En);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_is_locale_sensitive() {
        let en = RequestFingerprint::compute(RequestKind::MoodReply, "same text", Locale::En);
        let ru = RequestFingerprint::compute(RequestKind::MoodReply, "same text", Locale::Ru);
        assert_ne!(en, ru);
    }

    #[test]
    fn fingerprint_is_kind_sensitive() {
        let a = RequestFingerprint::compute(RequestKind::MoodReply, "same text", Locale::En);
        let b = RequestFingerprint::compute(RequestKind::DeepInsight, "same text", Locale::En);
        assert_ne!(a, b);
    }

    #[test]
    fn identity_hash_is_short_and_stable() {
        let h = hash_identity("tg:123456");
        assert_eq!(h.len(), 16);
        assert_eq!(h, hash_identity("tg:123456"));
        assert_ne!(h, hash_identity("tg:654321"));
    }
}
