use crate::types::Locale;
use thiserror::Error;

/// Unified error type for the companion router.
///
/// The first four variants form the closed, user-visible taxonomy; the caller
/// maps them to stable messages via [`RouterError::user_message`]. The
/// remaining variants are internal plumbing and are absorbed by the router
/// before a response leaves the resolution path.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("rate limit exceeded for identity {identity}")]
    RateLimited { identity: String },

    #[error("request is not authenticated")]
    Unauthenticated,

    #[error("daily budget exhausted and the local tier is unavailable")]
    OverBudget,

    #[error("all generation tiers failed: {message}")]
    UpstreamFailure { message: String },

    #[error("invalid configuration: {message}")]
    ConfigInvalid { message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RouterError {
    pub fn upstream(message: impl Into<String>) -> Self {
        RouterError::UpstreamFailure {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        RouterError::ConfigInvalid {
            message: message.into(),
        }
    }

    /// Whether this error belongs to the user-visible taxonomy.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            RouterError::RateLimited { .. }
                | RouterError::Unauthenticated
                | RouterError::OverBudget
                | RouterError::UpstreamFailure { .. }
        )
    }

    /// Stable, pre-defined user-facing message for this error.
    ///
    /// Raw upstream error strings are never exposed here; internal variants
    /// collapse to the generic unavailable message.
    pub fn user_message(&self, locale: Locale) -> &'static str {
        match (self, locale) {
            (RouterError::RateLimited { .. }, Locale::Ru) => {
                "Слишком много запросов подряд. Сделай паузу и попробуй чуть позже."
            }
            (RouterError::RateLimited { .. }, Locale::En) => {
                "Too many requests in a row. Take a short pause and try again."
            }
            (RouterError::Unauthenticated, Locale::Ru) => {
                "Не удалось подтвердить сессию. Открой приложение заново."
            }
            (RouterError::Unauthenticated, Locale::En) => {
                "We could not verify your session. Please reopen the app."
            }
            (RouterError::OverBudget, Locale::Ru) => {
                "Дневной лимит ИИ исчерпан. Попробуйте снова завтра."
            }
            (RouterError::OverBudget, Locale::En) => {
                "The daily AI budget is spent. Please try again tomorrow."
            }
            (_, Locale::Ru) => "Помощник сейчас недоступен. Сначала выдох — и попробуем позже.",
            (_, Locale::En) => "The companion is unavailable right now. Exhale first, then retry.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_visibility_split() {
        assert!(RouterError::OverBudget.is_user_visible());
        assert!(RouterError::Unauthenticated.is_user_visible());
        assert!(RouterError::upstream("x").is_user_visible());
        assert!(!RouterError::config("soft >= hard").is_user_visible());
    }

    #[test]
    fn internal_errors_collapse_to_generic_message() {
        let err = RouterError::config("anything");
        assert_eq!(
            err.user_message(Locale::En),
            "The companion is unavailable right now. Exhale first, then retry."
        );
    }

    #[test]
    fn over_budget_message_is_stable() {
        assert_eq!(
            RouterError::OverBudget.user_message(Locale::Ru),
            "Дневной лимит ИИ исчерпан. Попробуйте снова завтра."
        );
    }
}
