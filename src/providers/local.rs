//! Offline fallback tier.

use super::{Generation, GenerationProvider, GenerationRequest};
use crate::types::{Locale, RequestKind};
use crate::Result;
use async_trait::async_trait;

/// Deterministic local responder of last resort.
///
/// Always free and never refused for budget reasons; the router falls back
/// here whenever paid tiers are blocked or exhausted.
pub struct LocalProvider;

impl LocalProvider {
    pub fn new() -> Self {
        Self
    }

    /// The fallback text for a kind/locale pair, also used by the router to
    /// replace empty upstream completions.
    pub fn respond(kind: RequestKind, locale: Locale) -> &'static str {
        match (kind, locale) {
            (RequestKind::BreathingHint | RequestKind::QuickTip, Locale::Ru) => {
                "Сначала выдох. Давай мягко пройдём цикл дыхания: 1∕3 вдох, 2∕3 пауза, 3∕3 выдох. Три круга."
            }
            (RequestKind::BreathingHint | RequestKind::QuickTip, Locale::En) => {
                "First, exhale. Move through a breath cycle: 1⁄3 inhale, 2⁄3 pause, 3⁄3 exhale. Three calm rounds."
            }
            (RequestKind::WeeklyReview, Locale::Ru) => {
                "Сохраним наблюдения как серию снимков и мягко подведём итоги завтра."
            }
            (RequestKind::WeeklyReview, Locale::En) => {
                "We'll keep these notes as gentle snapshots and reflect together tomorrow."
            }
            (RequestKind::DeepInsight, Locale::Ru) => {
                "Запиши одну тёплую мысль, что поддерживает сейчас. Затем снова мягкий вдох."
            }
            (RequestKind::DeepInsight, Locale::En) => {
                "Write a warm note of what holds you now, then return to a soft breath."
            }
            (_, Locale::Ru) => "Я рядом. Сначала выдох, затем один спокойный шаг вперёд.",
            (_, Locale::En) => "I'm here. Start with an exhale, then a single gentle step forward.",
        }
    }
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationProvider for LocalProvider {
    fn model(&self) -> &str {
        "local"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        Ok(Generation {
            text: Self::respond(request.kind, request.locale).to_string(),
            tokens_in: 0,
            tokens_out: 0,
            usd_cost: 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_generation_is_free_and_deterministic() {
        let provider = LocalProvider::new();
        let request = GenerationRequest {
            prompt: "не могу уснуть".into(),
            kind: RequestKind::MoodReply,
            locale: Locale::Ru,
            max_tokens: 120,
        };
        let first = provider.generate(&request).await.unwrap();
        let second = provider.generate(&request).await.unwrap();
        assert_eq!(first.text, second.text);
        assert_eq!(first.usd_cost, 0.0);
        assert_eq!(first.tokens_out, 0);
    }

    #[test]
    fn every_kind_and_locale_has_text() {
        for kind in [
            RequestKind::QuickTip,
            RequestKind::BreathingHint,
            RequestKind::MoodReply,
            RequestKind::DeepInsight,
            RequestKind::WeeklyReview,
            RequestKind::Freeform,
        ] {
            for locale in [Locale::Ru, Locale::En] {
                assert!(!LocalProvider::respond(kind, locale).is_empty());
            }
        }
    }
}
