use crate::collectors::politeness::Politeness;
use crate::collectors::selectors::DetailSelectors;
use crate::collectors::{PageFactory, PageHandle, Timeouts, extract};
use crate::error::ScrapeError;
use crate::models::job::JobDetail;

/// Second extraction pass over a job's own page, in a page separate from
/// the listing tab.
pub struct DetailEnricher<'a> {
    pages: &'a dyn PageFactory,
    selectors: &'a DetailSelectors,
    politeness: &'a Politeness,
    timeouts: &'a Timeouts,
}

impl<'a> DetailEnricher<'a> {
    pub fn new(
        pages: &'a dyn PageFactory,
        selectors: &'a DetailSelectors,
        politeness: &'a Politeness,
        timeouts: &'a Timeouts,
    ) -> Self {
        Self {
            pages,
            selectors,
            politeness,
            timeouts,
        }
    }

    /// Never fails: any fault yields the all-default detail record.
    pub async fn enrich(&self, url: &str) -> JobDetail {
        let page = match self.pages.open_page(self.politeness.user_agent()).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(job_url = url, "Could not open detail page: {e}");
                return JobDetail::default();
            }
        };

        let result = self.fetch(page.as_ref(), url).await;
        page.close().await;

        match result {
            Ok(detail) => detail,
            Err(e) => {
                tracing::warn!(job_url = url, "Detail scrape failed, keeping defaults: {e}");
                JobDetail::default()
            }
        }
    }

    async fn fetch(&self, page: &dyn PageHandle, url: &str) -> Result<JobDetail, ScrapeError> {
        page.goto(url, self.timeouts.navigation()).await?;
        Politeness::pause(self.politeness.detail_delay()).await;
        let html = page.html().await?;
        Ok(extract::detail(&html, self.selectors))
    }
}
