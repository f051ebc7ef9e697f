use std::time::Duration;

use rand::Rng;
use rand::prelude::IndexedRandom;
use serde::Deserialize;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36 Edg/130.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
];

/// Randomized delays and fingerprint rotation shared by every stage that
/// touches the target site.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Politeness {
    pub user_agents: Vec<String>,
    pub page_delay_ms: [u64; 2],
    pub detail_delay_ms: [u64; 2],
    pub keystroke_delay_ms: [u64; 2],
    /// Taken from `scraping.delayBetweenKeywords`.
    #[serde(skip)]
    pub keyword_delay_ms: u64,
}

impl Default for Politeness {
    fn default() -> Self {
        Self {
            user_agents: USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            page_delay_ms: [2000, 4000],
            detail_delay_ms: [1000, 2500],
            keystroke_delay_ms: [50, 150],
            keyword_delay_ms: 5000,
        }
    }
}

impl Politeness {
    /// No waiting at all; the user-agent pool is kept.
    #[cfg(test)]
    pub fn disabled() -> Self {
        Self {
            page_delay_ms: [0, 0],
            detail_delay_ms: [0, 0],
            keystroke_delay_ms: [0, 0],
            keyword_delay_ms: 0,
            ..Default::default()
        }
    }

    pub fn user_agent(&self) -> &str {
        self.user_agents
            .choose(&mut rand::rng())
            .map(String::as_str)
            .unwrap_or(USER_AGENTS[0])
    }

    pub fn page_delay(&self) -> Duration {
        jitter(self.page_delay_ms)
    }

    pub fn detail_delay(&self) -> Duration {
        jitter(self.detail_delay_ms)
    }

    pub fn keystroke_delay(&self) -> Duration {
        jitter(self.keystroke_delay_ms)
    }

    pub fn keyword_delay(&self) -> Duration {
        Duration::from_millis(self.keyword_delay_ms)
    }

    pub async fn pause(delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Uniform pick within `[min, max]`; an inverted range collapses to `min`.
fn jitter([min, max]: [u64; 2]) -> Duration {
    if max <= min {
        return Duration::from_millis(min);
    }
    Duration::from_millis(rand::rng().random_range(min..=max))
}
