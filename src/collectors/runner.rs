use std::future::Future;

use serde::Serialize;
use tracing::Instrument;

use crate::collectors::paginator::{KeywordReport, Paginator};
use crate::collectors::politeness::Politeness;
use crate::collectors::session::Session;
use crate::collectors::{BrowserSession, PageFactory, PageHandle};
use crate::config::{Credentials, ScrapeConfig};
use crate::models::store::{JobStore, SaveSummary};

/// Totals for one scrape run.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub keywords: Vec<KeywordReport>,
    pub failed_keywords: Vec<String>,
    #[serde(flatten)]
    pub totals: SaveSummary,
}

impl RunSummary {
    pub fn log(&self) {
        tracing::info!(
            keywords = self.keywords.len(),
            failed = self.failed_keywords.len(),
            found = self.totals.found,
            saved = self.totals.saved,
            duplicates = self.totals.duplicates,
            "Scrape run finished"
        );
        if !self.failed_keywords.is_empty() {
            tracing::warn!("Keywords that failed: {}", self.failed_keywords.join(", "));
        }
    }
}

/// Run every configured keyword through one headless (or headed) Chromium
/// session, stopping early on Ctrl-C.
pub async fn run(
    config: &ScrapeConfig,
    credentials: Option<Credentials>,
    headless: bool,
    store: &dyn JobStore,
) -> anyhow::Result<RunSummary> {
    let mut session = Session::new(headless, &config.politeness, &config.timeouts);
    run_with(&mut session, config, credentials.as_ref(), store, ctrl_c()).await
}

/// Resolves on the first Ctrl-C. If the signal cannot be watched, it never resolves.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

/// Drive `session` until the keywords are done or `stop` resolves.
/// The session is shut down on every exit path.
pub async fn run_with<S: BrowserSession>(
    session: &mut S,
    config: &ScrapeConfig,
    credentials: Option<&Credentials>,
    store: &dyn JobStore,
    stop: impl Future<Output = ()>,
) -> anyhow::Result<RunSummary> {
    let outcome = tokio::select! {
        biased;
        _ = stop => {
            tracing::info!("Shutdown signal received, stopping scrape");
            Err(anyhow::anyhow!("scrape interrupted"))
        }
        result = scrape_with_session(&mut *session, config, credentials, store) => result,
    };

    session.shutdown().await;
    outcome
}

async fn scrape_with_session<S: BrowserSession>(
    session: &mut S,
    config: &ScrapeConfig,
    credentials: Option<&Credentials>,
    store: &dyn JobStore,
) -> anyhow::Result<RunSummary> {
    session.initialize().await?;
    let auth = session.authenticate(credentials, &config.site.login_url).await;
    tracing::info!(?auth, "Authentication step done");

    let session = &*session;
    let page = session.primary_page()?;
    Ok(scrape_keywords(config, page, session, store).await)
}

/// Keywords run strictly in order; one failing keyword never stops the rest.
async fn scrape_keywords(
    config: &ScrapeConfig,
    page: &dyn PageHandle,
    pages: &dyn PageFactory,
    store: &dyn JobStore,
) -> RunSummary {
    let paginator = Paginator::new(config, page, pages, store);
    let mut summary = RunSummary::default();

    for (i, keyword) in config.keywords.iter().enumerate() {
        if i > 0 {
            Politeness::pause(config.politeness.keyword_delay()).await;
        }

        let span = tracing::info_span!("keyword", keyword = %keyword);
        match paginator.scrape_keyword(keyword).instrument(span).await {
            Ok(report) => {
                tracing::info!(
                    keyword = %keyword,
                    pages = report.pages_visited,
                    stop_reason = ?report.stop_reason,
                    found = report.summary.found,
                    saved = report.summary.saved,
                    duplicates = report.summary.duplicates,
                    "Keyword finished"
                );
                summary.totals += report.summary;
                summary.keywords.push(report);
            }
            Err(e) => {
                tracing::error!(keyword = %keyword, "Keyword failed: {e}");
                summary.failed_keywords.push(keyword.clone());
            }
        }
    }

    summary
}
