// Scraping pipeline: browser session, listing pagination, detail enrichment
// and the pure extraction/matching functions they share.

pub mod detail;
pub mod extract;
pub mod paginator;
pub mod politeness;
pub mod runner;
pub mod selectors;
pub mod session;
pub mod skills;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::Credentials;
use crate::error::ScrapeError;

/// A single browser tab the pipeline can drive.
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// Navigate and wait for the page to settle, bounded by `timeout`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), ScrapeError>;

    /// Snapshot of the rendered document.
    async fn html(&self) -> Result<String, ScrapeError>;

    async fn close(self: Box<Self>);
}

/// Source of fresh, isolated pages.
#[async_trait]
pub trait PageFactory: Send + Sync {
    async fn open_page(&self, user_agent: &str) -> Result<Box<dyn PageHandle>, ScrapeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    NotAttempted,
    Authenticated,
    Failed,
}

/// Lifecycle of the browser behind a scrape run. `shutdown` must be safe to
/// call in any state, including after a failed `initialize`.
#[async_trait]
pub trait BrowserSession: PageFactory {
    async fn initialize(&mut self) -> Result<(), ScrapeError>;

    /// Never fails the run; problems degrade to [`AuthOutcome::Failed`].
    async fn authenticate(&self, credentials: Option<&Credentials>, login_url: &str) -> AuthOutcome;

    /// The shared listing page.
    fn primary_page(&self) -> Result<&dyn PageHandle, ScrapeError>;

    async fn shutdown(&mut self);
}

/// Bounds for every wait in the pipeline, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Timeouts {
    pub navigation_ms: u64,
    pub content_wait_ms: u64,
    pub poll_interval_ms: u64,
    pub login_marker_ms: u64,
    pub network_idle_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 30_000,
            content_wait_ms: 10_000,
            poll_interval_ms: 500,
            login_marker_ms: 15_000,
            network_idle_ms: 5_000,
        }
    }
}

impl Timeouts {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn content_wait(&self) -> Duration {
        Duration::from_millis(self.content_wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn login_marker(&self) -> Duration {
        Duration::from_millis(self.login_marker_ms)
    }

    pub fn network_idle(&self) -> Duration {
        Duration::from_millis(self.network_idle_ms)
    }
}

#[cfg(test)]
pub mod fake {
    //! In-memory site used to drive the pipeline without a browser.

    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    struct SiteState {
        pages: HashMap<String, String>,
        failing: HashSet<String>,
        visits: Vec<String>,
        opened: usize,
        closed: usize,
    }

    /// Serves canned HTML by URL. Unknown URLs fail navigation.
    #[derive(Clone, Default)]
    pub struct FakeSite {
        state: Arc<Mutex<SiteState>>,
    }

    impl FakeSite {
        pub fn serve(&self, url: &str, html: impl Into<String>) {
            self.state
                .lock()
                .unwrap()
                .pages
                .insert(url.to_string(), html.into());
        }

        pub fn fail(&self, url: &str) {
            self.state.lock().unwrap().failing.insert(url.to_string());
        }

        pub fn visits(&self) -> Vec<String> {
            self.state.lock().unwrap().visits.clone()
        }

        /// (pages opened, pages closed) through the factory.
        pub fn open_close_counts(&self) -> (usize, usize) {
            let s = self.state.lock().unwrap();
            (s.opened, s.closed)
        }

        pub fn page(&self) -> FakePage {
            FakePage {
                site: self.clone(),
                current: Mutex::new(None),
                tracked: false,
            }
        }
    }

    pub struct FakePage {
        site: FakeSite,
        current: Mutex<Option<String>>,
        tracked: bool,
    }

    #[async_trait]
    impl PageHandle for FakePage {
        async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), ScrapeError> {
            let mut state = self.site.state.lock().unwrap();
            state.visits.push(url.to_string());
            if state.failing.contains(url) || !state.pages.contains_key(url) {
                return Err(ScrapeError::Timeout {
                    url: url.to_string(),
                });
            }
            *self.current.lock().unwrap() = Some(url.to_string());
            Ok(())
        }

        async fn html(&self) -> Result<String, ScrapeError> {
            let current = self.current.lock().unwrap().clone();
            let state = self.site.state.lock().unwrap();
            Ok(current
                .and_then(|url| state.pages.get(&url).cloned())
                .unwrap_or_default())
        }

        async fn close(self: Box<Self>) {
            if self.tracked {
                self.site.state.lock().unwrap().closed += 1;
            }
        }
    }

    #[async_trait]
    impl PageFactory for FakeSite {
        async fn open_page(&self, _user_agent: &str) -> Result<Box<dyn PageHandle>, ScrapeError> {
            self.state.lock().unwrap().opened += 1;
            let mut page = self.page();
            page.tracked = true;
            Ok(Box::new(page))
        }
    }
}
