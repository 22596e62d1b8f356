//! Core request and response types shared across the router.

use serde::{Deserialize, Serialize};

/// Supported response locales. Anything unrecognized collapses to Russian,
/// the product's primary language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    Ru,
    En,
}

impl Locale {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "en" => Locale::En,
            _ => Locale::Ru,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::Ru => "ru",
            Locale::En => "en",
        }
    }
}

impl Default for Locale {
    fn default() -> Self {
        Locale::Ru
    }
}

/// Classified request kind. Drives template matching and base tier selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    QuickTip,
    BreathingHint,
    MoodReply,
    DeepInsight,
    WeeklyReview,
    /// Free-form companion chat with no special handling.
    Freeform,
}

impl RequestKind {
    /// Parse an over-the-wire kind string; unknown kinds become [`Freeform`].
    ///
    /// [`Freeform`]: RequestKind::Freeform
    pub fn parse(kind: &str) -> Self {
        match kind {
            "quick_tip" => RequestKind::QuickTip,
            "breathing_hint" => RequestKind::BreathingHint,
            "mood_reply" => RequestKind::MoodReply,
            "deep_insight" => RequestKind::DeepInsight,
            "weekly_review" => RequestKind::WeeklyReview,
            _ => RequestKind::Freeform,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::QuickTip => "quick_tip",
            RequestKind::BreathingHint => "breathing_hint",
            RequestKind::MoodReply => "mood_reply",
            RequestKind::DeepInsight => "deep_insight",
            RequestKind::WeeklyReview => "weekly_review",
            RequestKind::Freeform => "freeform",
        }
    }

    /// Kinds that warrant the deeper (turbo) model when the budget allows.
    pub fn is_deep(&self) -> bool {
        matches!(self, RequestKind::DeepInsight | RequestKind::WeeklyReview)
    }
}

/// Resolved identity of the requester, as supplied by the session layer.
///
/// The router never sees raw credentials; `id` is expected to be a stable,
/// possibly hashed identifier. Unauthenticated identities are ineligible for
/// paid tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub authenticated: bool,
}

impl Identity {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            authenticated: true,
        }
    }

    pub fn anonymous(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            authenticated: false,
        }
    }
}

/// A companion request entering the router.
#[derive(Debug, Clone)]
pub struct AskRequest {
    /// `None` means the session layer could not resolve any identity; the
    /// router rejects such requests before they reach the resolver.
    pub identity: Option<Identity>,
    pub kind: RequestKind,
    pub text: String,
    pub locale: Locale,
}

impl AskRequest {
    pub fn new(identity: Identity, kind: RequestKind, text: impl Into<String>) -> Self {
        Self {
            identity: Some(identity),
            kind,
            text: text.into(),
            locale: Locale::Ru,
        }
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }
}

/// Per-call knobs.
#[derive(Debug, Clone)]
pub struct AskOptions {
    /// Consult and populate the response cache. Batch jobs disable this to
    /// avoid cross-user reuse of personalized digests.
    pub use_cache: bool,
}

impl Default for AskOptions {
    fn default() -> Self {
        Self { use_cache: true }
    }
}

/// The tier (or derived source) that produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Template,
    Cache,
    Mini,
    Turbo,
    Local,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Template => "template",
            Source::Cache => "cache",
            Source::Mini => "mini",
            Source::Turbo => "turbo",
            Source::Local => "local",
        }
    }
}

/// A fully resolved companion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutedResponse {
    pub text: String,
    pub source: Source,
    pub model: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub usd_cost: f64,
    pub cached: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_normalizes_unknown_tags() {
        assert_eq!(Locale::from_tag("en"), Locale::En);
        assert_eq!(Locale::from_tag("EN "), Locale::En);
        assert_eq!(Locale::from_tag("de"), Locale::Ru);
        assert_eq!(Locale::from_tag(""), Locale::Ru);
    }

    #[test]
    fn kind_roundtrip_and_deep_flag() {
        for kind in [
            RequestKind::QuickTip,
            RequestKind::BreathingHint,
            RequestKind::MoodReply,
            RequestKind::DeepInsight,
            RequestKind::WeeklyReview,
        ] {
            assert_eq!(RequestKind::parse(kind.as_str()), kind);
        }
        assert_eq!(RequestKind::parse("journal_reply"), RequestKind::Freeform);
        assert!(RequestKind::DeepInsight.is_deep());
        assert!(!RequestKind::MoodReply.is_deep());
    }
}
