//! Daily digest batch job.
//!
//! Once a day the companion summarizes each active user's recent emotions
//! and journal entries into a short personal observation. The job drives the
//! regular router with kind `weekly_review`, so digests respect the same
//! budget, mode and rate rules as interactive traffic. Caching is disabled
//! for digests: the prompts embed per-user activity and reuse across users
//! would be wrong even on a fingerprint collision.

use crate::router::Router;
use crate::types::{AskOptions, AskRequest, Identity, Locale, RequestKind};
use crate::Result;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Longest journal excerpt quoted into a digest prompt, in characters.
const MAX_NOTE_CHARS: usize = 200;

/// One user's recent activity, as aggregated by the storage layer.
#[derive(Debug, Clone, Default)]
pub struct UserActivity {
    pub user_id: String,
    /// Emotion code to occurrence count over the digest window.
    pub emotion_counts: BTreeMap<String, u32>,
    pub journal_count: u32,
    /// Most recent journal text, if any.
    pub last_journal: Option<String>,
}

impl UserActivity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    fn is_empty(&self) -> bool {
        self.emotion_counts.is_empty() && self.journal_count == 0 && self.last_journal.is_none()
    }

    fn emotion_total(&self) -> u32 {
        self.emotion_counts.values().sum()
    }

    fn top_emotions(&self) -> String {
        if self.emotion_counts.is_empty() {
            return "нет".to_string();
        }
        self.emotion_counts
            .iter()
            .map(|(code, count)| format!("{code}:{count}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// One produced digest.
#[derive(Debug, Clone)]
pub struct DigestEntry {
    pub user_id: String,
    pub text: String,
}

/// Builds and routes digest prompts for a batch of users.
pub struct DigestJob {
    router: Router,
    locale: Locale,
}

impl DigestJob {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            locale: Locale::Ru,
        }
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Produce digests for every user with activity.
    ///
    /// Users without any activity are skipped. A failed generation for one
    /// user is logged and skipped so the rest of the batch still runs; the
    /// budget ledger naturally throttles the tail of a large batch.
    pub async fn run(&self, activities: &[UserActivity]) -> Result<Vec<DigestEntry>> {
        if !self.router.batch_enabled() {
            info!("digest batch disabled, skipping {} users", activities.len());
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for activity in activities {
            if activity.is_empty() {
                debug!(user = %activity.user_id, "no recent activity, skipping digest");
                continue;
            }
            let prompt = build_prompt(activity, self.locale);
            let request = AskRequest::new(
                Identity::user(&activity.user_id),
                RequestKind::WeeklyReview,
                prompt,
            )
            .with_locale(self.locale);
            match self
                .router
                .ask_with_options(request, AskOptions { use_cache: false })
                .await
            {
                Ok(response) => entries.push(DigestEntry {
                    user_id: activity.user_id.clone(),
                    text: response.text,
                }),
                Err(err) => {
                    warn!(user = %activity.user_id, error = %err, "digest generation failed");
                }
            }
        }
        info!(created = entries.len(), "digest batch finished");
        Ok(entries)
    }
}

fn build_prompt(activity: &UserActivity, locale: Locale) -> String {
    let mut prompt = match locale {
        Locale::Ru => {
            "Сформируй короткое (<=80 слов) человеческое наблюдение за последними 24 часами. \
             Укажи ключевые эмоции и поддерживающую мысль."
                .to_string()
        }
        Locale::En => {
            "Write a short (<=80 words) human observation about the last 24 hours. \
             Mention the key emotions and one supportive thought."
                .to_string()
        }
    };
    match locale {
        Locale::Ru => prompt.push_str(&format!(
            "\nЭмоций: {}, журналов: {}, топ эмоции: {}.",
            activity.emotion_total(),
            activity.journal_count,
            activity.top_emotions()
        )),
        Locale::En => prompt.push_str(&format!(
            "\nEmotions: {}, journal entries: {}, top emotions: {}.",
            activity.emotion_total(),
            activity.journal_count,
            activity.top_emotions()
        )),
    }
    if let Some(note) = &activity.last_journal {
        let excerpt: String = note.chars().take(MAX_NOTE_CHARS).collect();
        match locale {
            Locale::Ru => prompt.push_str(&format!("\nПоследняя запись: {excerpt}")),
            Locale::En => prompt.push_str(&format!("\nLatest entry: {excerpt}")),
        }
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::RouterConfig;
    use crate::providers::{Generation, GenerationProvider, GenerationRequest};
    use crate::types::Source;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedProvider {
        model: String,
        text: String,
    }

    #[async_trait]
    impl GenerationProvider for FixedProvider {
        fn model(&self) -> &str {
            &self.model
        }

        async fn generate(&self, _request: &GenerationRequest) -> crate::Result<Generation> {
            Ok(Generation {
                text: self.text.clone(),
                tokens_in: 40,
                tokens_out: 50,
                usd_cost: 0.01,
            })
        }
    }

    fn digest_router(batch_enabled: bool) -> Router {
        let provider = Arc::new(FixedProvider {
            model: "gpt-4-turbo".into(),
            text: "Последние сутки были напряжёнными, но ты заметил радость в мелочах. \
                   Это хороший знак."
                .into(),
        });
        Router::builder(RouterConfig::default().with_batch_enabled(batch_enabled))
            .with_clock(Arc::new(ManualClock::fixed()))
            .with_turbo_provider(provider)
            .build()
            .unwrap()
    }

    fn activity(user: &str) -> UserActivity {
        let mut activity = UserActivity::new(user);
        activity.emotion_counts.insert("joy".into(), 3);
        activity.emotion_counts.insert("calm".into(), 1);
        activity.journal_count = 2;
        activity.last_journal = Some("Сегодня всё спокойно".into());
        activity
    }

    #[tokio::test]
    async fn disabled_batch_produces_nothing() {
        let job = DigestJob::new(digest_router(false));
        let entries = job.run(&[activity("u1")]).await.unwrap();
        assert!(entries.is_empty());
        assert_eq!(job.router.stats().requests, 0);
    }

    #[tokio::test]
    async fn digests_route_through_the_turbo_tier() {
        let router = digest_router(true);
        let job = DigestJob::new(router.clone());
        let entries = job
            .run(&[activity("u1"), UserActivity::new("idle"), activity("u2")])
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].text.contains("радость"));

        // Idle user skipped entirely; two records, both turbo-resolved.
        let stats = router.stats();
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.by_source.get(&Source::Turbo), Some(&2));
        assert!((router.budget_info().spend_usd - 0.02).abs() < 1e-9);
    }

    #[test]
    fn prompt_includes_activity_summary() {
        let prompt = build_prompt(&activity("u1"), Locale::Ru);
        assert!(prompt.contains("Эмоций: 4"));
        assert!(prompt.contains("журналов: 2"));
        assert!(prompt.contains("calm:1, joy:3"));
        assert!(prompt.contains("Последняя запись: Сегодня всё спокойно"));
    }
}
