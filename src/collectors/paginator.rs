use std::sync::LazyLock;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;
use serde::Serialize;
use tokio::time::Instant;

use crate::collectors::detail::DetailEnricher;
use crate::collectors::politeness::Politeness;
use crate::collectors::skills::match_skills;
use crate::collectors::{PageFactory, PageHandle, extract};
use crate::config::{Experience, ScrapeConfig};
use crate::error::ScrapeError;
use crate::models::job::{EnrichedJob, JobListing};
use crate::models::store::{JobStore, SaveSummary};

/// Characters that encodeURIComponent does NOT encode.
/// RFC 3986 unreserved: A-Z a-z 0-9 - _ . ! ~ * ' ( )
const ENCODE_URI_COMPONENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, ENCODE_URI_COMPONENT_SET).to_string()
}

/// Search URL in the target site's own routing scheme:
/// `{origin}/{slug}-jobs[-{page}]?k={keyword}[&niyoMinExp={min}][&niyoMaxExp={max}]`.
pub fn search_url(origin: &str, keyword: &str, page: u32, experience: Option<&Experience>) -> String {
    let slug = WHITESPACE.replace_all(&keyword.to_lowercase(), "-").into_owned();
    let mut url = format!("{}/{}-jobs", origin.trim_end_matches('/'), encode_component(&slug));
    if page > 1 {
        url.push_str(&format!("-{page}"));
    }
    url.push_str(&format!("?k={}", encode_component(keyword)));
    if let Some(experience) = experience {
        if let Some(min) = experience.min {
            url.push_str(&format!("&niyoMinExp={min}"));
        }
        if let Some(max) = experience.max {
            url.push_str(&format!("&niyoMaxExp={max}"));
        }
    }
    url
}

/// Why a keyword's page loop ended. None of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    PageCap,
    NoContent,
    NoCards,
    NavigationFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordReport {
    pub keyword: String,
    pub pages_visited: u32,
    pub stop_reason: StopReason,
    #[serde(flatten)]
    pub summary: SaveSummary,
}

/// Drives one keyword through the paginated search flow on the shared
/// listing page, handing each page's batch to the store.
pub struct Paginator<'a> {
    config: &'a ScrapeConfig,
    page: &'a dyn PageHandle,
    pages: &'a dyn PageFactory,
    store: &'a dyn JobStore,
}

impl<'a> Paginator<'a> {
    pub fn new(
        config: &'a ScrapeConfig,
        page: &'a dyn PageHandle,
        pages: &'a dyn PageFactory,
        store: &'a dyn JobStore,
    ) -> Self {
        Self {
            config,
            page,
            pages,
            store,
        }
    }

    /// Fails only when the first page cannot be loaded.
    pub async fn scrape_keyword(&self, keyword: &str) -> Result<KeywordReport, ScrapeError> {
        let cap = self.config.scraping.pages_per_keyword;
        let timeouts = &self.config.timeouts;
        let mut pages_visited = 0;
        let mut summary = SaveSummary::default();
        let mut page_no = 1;

        let stop_reason = loop {
            if page_no > cap {
                break StopReason::PageCap;
            }

            let url = search_url(
                &self.config.site.origin,
                keyword,
                page_no,
                self.config.experience.as_ref(),
            );
            tracing::info!(page = page_no, %url, "Loading results page");
            if let Err(e) = self.page.goto(&url, timeouts.navigation()).await {
                if page_no == 1 {
                    return Err(e);
                }
                tracing::info!(page = page_no, "Stopping pagination, page did not load: {e}");
                break StopReason::NavigationFailed;
            }
            pages_visited += 1;

            let Some(html) = self.wait_for_cards().await else {
                tracing::info!(page = page_no, "No listing cards appeared, end of results");
                break StopReason::NoContent;
            };

            let listings = extract::listings(
                &html,
                &self.config.selectors.listing,
                &self.config.site.origin,
                keyword,
            );
            if listings.is_empty() {
                tracing::info!(page = page_no, "No usable cards extracted, end of results");
                break StopReason::NoCards;
            }

            let batch = self.enrich(listings).await;
            let saved = self.store.save_batch(&batch).await;
            tracing::info!(
                page = page_no,
                found = saved.found,
                saved = saved.saved,
                duplicates = saved.duplicates,
                "Page stored"
            );
            summary += saved;

            if page_no >= cap {
                break StopReason::PageCap;
            }
            Politeness::pause(self.config.politeness.page_delay()).await;
            page_no += 1;
        };

        Ok(KeywordReport {
            keyword: keyword.to_string(),
            pages_visited,
            stop_reason,
            summary,
        })
    }

    /// Poll the rendered page until a listing card shows up or time runs out.
    async fn wait_for_cards(&self) -> Option<String> {
        let timeouts = &self.config.timeouts;
        let deadline = Instant::now() + timeouts.content_wait();
        loop {
            match self.page.html().await {
                Ok(html) if extract::has_cards(&html, &self.config.selectors.listing) => {
                    return Some(html);
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("Snapshot failed while waiting for cards: {e}"),
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(timeouts.poll_interval()).await;
        }
    }

    /// Detail pass (when enabled) and skill matching, one card at a time.
    async fn enrich(&self, listings: Vec<JobListing>) -> Vec<EnrichedJob> {
        let label = self.config.experience_label();
        let enricher = self.config.scraping.scrape_job_details.then(|| {
            DetailEnricher::new(
                self.pages,
                &self.config.selectors.detail,
                &self.config.politeness,
                &self.config.timeouts,
            )
        });

        let total = listings.len();
        let mut batch = Vec::with_capacity(total);
        for (i, listing) in listings.into_iter().enumerate() {
            let mut job = EnrichedJob::new(listing, &label);
            if let Some(enricher) = &enricher {
                tracing::debug!(job = i + 1, total, url = job.job_url(), "Fetching details");
                job.detail = enricher.enrich(job.job_url()).await;
            }
            job.matched_skills = match_skills(&job.skill_pool(), &self.config.skills);
            batch.push(job);
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::fake::FakeSite;
    use crate::models::job::JobDetail;
    use crate::models::store::memory::MemoryStore;

    const ORIGIN: &str = "https://jobs.example";

    #[test]
    fn first_page_url() {
        assert_eq!(
            search_url("https://www.naukri.com", "Node JS Developer", 1, None),
            "https://www.naukri.com/node-js-developer-jobs?k=Node%20JS%20Developer"
        );
    }

    #[test]
    fn later_pages_use_a_path_suffix() {
        let url = search_url(ORIGIN, "Node JS Developer", 3, None);
        assert_eq!(url, "https://jobs.example/node-js-developer-jobs-3?k=Node%20JS%20Developer");
    }

    #[test]
    fn experience_bounds_become_query_parameters() {
        let both = Experience {
            min: Some(2),
            max: Some(5),
        };
        assert_eq!(
            search_url(ORIGIN, "Node JS Developer", 1, Some(&both)),
            "https://jobs.example/node-js-developer-jobs?k=Node%20JS%20Developer&niyoMinExp=2&niyoMaxExp=5"
        );

        let max_only = Experience {
            min: None,
            max: Some(3),
        };
        assert!(search_url(ORIGIN, "go", 2, Some(&max_only)).ends_with("jobs-2?k=go&niyoMaxExp=3"));
    }

    #[test]
    fn slug_is_percent_encoded() {
        assert_eq!(
            search_url(ORIGIN, "C++  Developer", 1, None),
            "https://jobs.example/c%2B%2B-developer-jobs?k=C%2B%2B%20%20Developer"
        );
    }

    fn card(i: usize) -> String {
        format!(
            r#"<div class="srp-jobtuple-wrapper">
                 <a class="title" href="/job/{i}">Engineer {i}</a>
                 <a class="comp-name">Company {i}</a>
                 <ul class="tags-gt"><li>Rust</li><li>Excel</li></ul>
               </div>"#
        )
    }

    fn results(count: usize) -> String {
        let cards: Vec<String> = (1..=count).map(card).collect();
        format!("<html><body>{}</body></html>", cards.join(""))
    }

    const DETAIL: &str = r#"<div class="key-skill"><a>Tokio</a><a>Rust</a></div>
        <label>Openings:</label><span>2</span>"#;

    fn config(pages: u32, details: bool) -> ScrapeConfig {
        let mut config = ScrapeConfig::from_json(&format!(
            r#"{{
                "skills": ["rust", "tokio"],
                "experience": {{"min": 1, "max": 4}},
                "site": {{"origin": "{ORIGIN}"}},
                "scraping": {{"pagesPerKeyword": {pages}, "scrapeJobDetails": {details}}},
                "timeouts": {{"contentWaitMs": 20, "pollIntervalMs": 5}}
            }}"#
        ))
        .unwrap();
        config.politeness = Politeness::disabled();
        config
    }

    fn page_url(config: &ScrapeConfig, keyword: &str, page: u32) -> String {
        search_url(ORIGIN, keyword, page, config.experience.as_ref())
    }

    fn serve_details(site: &FakeSite, count: usize) {
        for i in 1..=count {
            site.serve(&format!("{ORIGIN}/job/{i}"), DETAIL);
        }
    }

    #[tokio::test]
    async fn stops_after_an_empty_second_page() {
        let config = config(2, true);
        let site = FakeSite::default();
        site.serve(&page_url(&config, "test", 1), results(10));
        site.serve(&page_url(&config, "test", 2), "<html><body>No jobs found</body></html>");
        serve_details(&site, 10);
        let store = MemoryStore::default();
        let page = site.page();

        let report = Paginator::new(&config, &page, &site, &store)
            .scrape_keyword("test")
            .await
            .unwrap();

        assert_eq!(report.pages_visited, 2);
        assert_eq!(report.stop_reason, StopReason::NoContent);
        assert_eq!(report.summary, SaveSummary { found: 10, saved: 10, duplicates: 0 });
        assert_eq!(store.rows().len(), 10);
        assert_eq!(store.batch_sizes(), vec![10]);

        let job = &store.rows()[0];
        assert_eq!(job.listing.search_keyword, "test");
        assert_eq!(job.experience_filter_label, "1-4 years");
        assert_eq!(job.detail.total_vacancy, "2");
        assert_eq!(job.matched_skills, vec!["Rust", "Tokio"]);
    }

    #[tokio::test]
    async fn cards_without_gate_fields_end_pagination() {
        let config = config(3, false);
        let site = FakeSite::default();
        site.serve(&page_url(&config, "test", 1), results(4));
        site.serve(
            &page_url(&config, "test", 2),
            r#"<div class="srp-jobtuple-wrapper"><span>ad slot</span></div>"#,
        );
        let store = MemoryStore::default();
        let page = site.page();

        let report = Paginator::new(&config, &page, &site, &store)
            .scrape_keyword("test")
            .await
            .unwrap();

        assert_eq!(report.stop_reason, StopReason::NoCards);
        assert_eq!(report.pages_visited, 2);
        assert_eq!(store.rows().len(), 4);
    }

    #[tokio::test]
    async fn one_failing_detail_page_does_not_abort_the_keyword() {
        let config = config(1, true);
        let site = FakeSite::default();
        site.serve(&page_url(&config, "test", 1), results(10));
        serve_details(&site, 10);
        site.fail(&format!("{ORIGIN}/job/3"));
        let store = MemoryStore::default();
        let page = site.page();

        let report = Paginator::new(&config, &page, &site, &store)
            .scrape_keyword("test")
            .await
            .unwrap();

        assert_eq!(report.stop_reason, StopReason::PageCap);
        let rows = store.rows();
        assert_eq!(rows.len(), 10);
        for job in &rows {
            if job.job_url() == format!("{ORIGIN}/job/3") {
                assert_eq!(job.detail, JobDetail::default());
                assert_eq!(job.matched_skills, vec!["Rust"]);
            } else {
                assert_eq!(job.detail.key_skills, vec!["Tokio", "Rust"]);
                assert_eq!(job.detail.total_vacancy, "2");
            }
        }
        assert_eq!(site.open_close_counts(), (10, 10));
    }

    #[tokio::test]
    async fn first_page_failure_is_an_error() {
        let config = config(2, false);
        let site = FakeSite::default();
        let store = MemoryStore::default();
        let page = site.page();

        let result = Paginator::new(&config, &page, &site, &store)
            .scrape_keyword("test")
            .await;

        assert!(matches!(result, Err(ScrapeError::Timeout { .. })));
        assert!(store.rows().is_empty());
    }

    #[tokio::test]
    async fn later_page_failure_ends_cleanly() {
        let config = config(3, false);
        let site = FakeSite::default();
        site.serve(&page_url(&config, "test", 1), results(5));
        site.fail(&page_url(&config, "test", 2));
        let store = MemoryStore::default();
        let page = site.page();

        let report = Paginator::new(&config, &page, &site, &store)
            .scrape_keyword("test")
            .await
            .unwrap();

        assert_eq!(report.stop_reason, StopReason::NavigationFailed);
        assert_eq!(report.pages_visited, 1);
        assert_eq!(report.summary.found, 5);
        assert_eq!(site.visits().len(), 2);
    }

    #[tokio::test]
    async fn page_cap_is_respected_and_details_can_be_skipped() {
        let config = config(2, false);
        let site = FakeSite::default();
        site.serve(&page_url(&config, "test", 1), results(3));
        site.serve(&page_url(&config, "test", 2), results(3));
        site.serve(&page_url(&config, "test", 3), results(3));
        let store = MemoryStore::default();
        let page = site.page();

        let report = Paginator::new(&config, &page, &site, &store)
            .scrape_keyword("test")
            .await
            .unwrap();

        assert_eq!(report.stop_reason, StopReason::PageCap);
        assert_eq!(report.pages_visited, 2);
        // Same cards on both pages: the second batch is all duplicates.
        assert_eq!(report.summary, SaveSummary { found: 6, saved: 3, duplicates: 3 });
        assert_eq!(site.open_close_counts(), (0, 0));
        assert_eq!(store.rows()[0].matched_skills, vec!["Rust"]);
        assert_eq!(store.rows()[0].detail, JobDetail::default());
    }
}
