//! Fixed template replies.
//!
//! Quick-tip and breathing-hint requests need no free-form generation; they
//! resolve instantly from a fixed catalog at zero cost, taking priority over
//! the cache and every generation tier.

use crate::types::{Locale, RequestKind};

/// Catalog of pre-written replies keyed by request kind and locale.
pub struct TemplateCatalog;

impl TemplateCatalog {
    pub fn new() -> Self {
        Self
    }

    /// Whether `kind` resolves from a template.
    pub fn matches(&self, kind: RequestKind) -> bool {
        matches!(kind, RequestKind::QuickTip | RequestKind::BreathingHint)
    }

    /// Pick the reply for a kind/locale pair. Kinds without a dedicated
    /// entry fall back to a universal grounding line.
    pub fn choose(&self, kind: RequestKind, locale: Locale) -> &'static str {
        match (kind, locale) {
            (RequestKind::QuickTip, Locale::Ru) => {
                "Я рядом. Сначала выдох — медленно, чтобы плечи опустились."
            }
            (RequestKind::QuickTip, Locale::En) => {
                "I'm here. First, let the breath out softly until your shoulders settle."
            }
            (RequestKind::BreathingHint, Locale::Ru) => {
                "Хочешь — сделаем цикл дыхания вместе: 1∕3 вдох, 2∕3 пауза, 3∕3 выдох."
            }
            (RequestKind::BreathingHint, Locale::En) => {
                "Let's take one soft cycle: 1⁄3 inhale, 2⁄3 pause, 3⁄3 exhale all the way out."
            }
            (_, Locale::Ru) => "Я рядом. Если нужно — тихо повторим дыхание и зафиксируем ощущение.",
            (_, Locale::En) => {
                "I'm here. We can repeat the quiet breath and note the feeling whenever you like."
            }
        }
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_fixed_kinds_match() {
        let catalog = TemplateCatalog::new();
        assert!(catalog.matches(RequestKind::QuickTip));
        assert!(catalog.matches(RequestKind::BreathingHint));
        assert!(!catalog.matches(RequestKind::MoodReply));
        assert!(!catalog.matches(RequestKind::DeepInsight));
        assert!(!catalog.matches(RequestKind::Freeform));
    }

    #[test]
    fn choose_respects_locale() {
        let catalog = TemplateCatalog::new();
        let ru = catalog.choose(RequestKind::QuickTip, Locale::Ru);
        let en = catalog.choose(RequestKind::QuickTip, Locale::En);
        assert_ne!(ru, en);
        assert!(en.starts_with("I'm here."));
    }

    #[test]
    fn unmatched_kind_gets_fallback_line() {
        let catalog = TemplateCatalog::new();
        let text = catalog.choose(RequestKind::MoodReply, Locale::En);
        assert!(text.contains("quiet breath"));
    }
}
