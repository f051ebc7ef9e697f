//! Ordered locator lists for every extracted field.
//!
//! The target's markup differs between cohorts, so each field is tried
//! against several structural hypotheses in order. All lists can be replaced
//! from the `selectors` section of the scrape configuration; update the
//! defaults here when the site changes.

use serde::Deserialize;

/// Where to read a value from, relative to the current scope.
///
/// In configuration a bare string is a CSS selector whose trimmed text is
/// used; `{"selector": ..., "attr": ...}` reads an attribute instead.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Locator {
    Text(String),
    Attr { selector: String, attr: String },
}

impl Locator {
    pub fn selector(&self) -> &str {
        match self {
            Locator::Text(selector) => selector,
            Locator::Attr { selector, .. } => selector,
        }
    }
}

fn text(selectors: &[&str]) -> Vec<Locator> {
    selectors.iter().map(|s| Locator::Text(s.to_string())).collect()
}

fn href(selectors: &[&str]) -> Vec<Locator> {
    selectors
        .iter()
        .map(|s| Locator::Attr {
            selector: s.to_string(),
            attr: "href".to_string(),
        })
        .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SelectorSet {
    pub listing: ListingSelectors,
    pub detail: DetailSelectors,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListingSelectors {
    /// Card containers; the first selector matching anything wins.
    pub card: Vec<String>,
    pub title: Vec<Locator>,
    pub company: Vec<Locator>,
    pub url: Vec<Locator>,
    pub location: Vec<Locator>,
    pub experience: Vec<Locator>,
    pub salary: Vec<Locator>,
    pub posted: Vec<Locator>,
    /// Each entry selects one item per skill tag.
    pub skills: Vec<String>,
    pub description: Vec<Locator>,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            card: strings(&[
                "div.srp-jobtuple-wrapper",
                "article.jobTuple",
                "div.cust-job-tuple",
                "div[data-job-id]",
            ]),
            title: text(&["a.title", "h2 a", ".jobTupleHeader .title", "[class*='title']"]),
            company: text(&["a.comp-name", ".comp-name", "a.subTitle", ".companyInfo .subTitle"]),
            url: href(&["a.title", "h2 a", "a[href*='job-listings']"]),
            location: text(&[".locWdth", ".loc-wrap .ellipsis", ".location .ellipsis", ".loc span"]),
            experience: text(&[
                ".expwdth",
                ".exp-wrap .ellipsis",
                ".experience .ellipsis",
                ".exp span",
            ]),
            salary: text(&[".sal-wrap span", ".salary .ellipsis", ".sal span"]),
            posted: text(&[".job-post-day", ".jobTupleFooter .postedDate", ".type br + span"]),
            skills: strings(&["ul.tags-gt li", "ul.tags li", ".tags .tag"]),
            description: text(&[".job-desc", ".job-description", ".ellipsis.job-description"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetailSelectors {
    pub description: Vec<Locator>,
    /// Shorter candidates are treated as empty containers.
    pub min_description_length: usize,
    /// Groups tried in order; the first group yielding any skill is used alone.
    pub key_skills: Vec<String>,
    pub salary: Vec<Locator>,
    /// Elements whose text names the value that follows them.
    pub labels: Vec<String>,
    pub industry_labels: Vec<String>,
    pub vacancy_labels: Vec<String>,
    pub posted_labels: Vec<String>,
    /// Scanned over short text nodes; its first capture group is the count.
    pub vacancy_pattern: String,
    pub short_text: Vec<String>,
    pub short_text_max: usize,
}

impl Default for DetailSelectors {
    fn default() -> Self {
        Self {
            description: text(&[
                "div[class*='dang-inner-html']",
                "section[class*='job-desc']",
                ".job-desc",
                ".jd-container",
                "#job_description",
            ]),
            min_description_length: 50,
            key_skills: strings(&[
                "div[class*='key-skill'] a",
                "div[class*='key-skill'] span",
                ".key-skill a",
                ".chip-container .chip",
            ]),
            salary: text(&["div[class*='salary'] span", ".salary", ".sal"]),
            labels: strings(&["label", "dt", "strong"]),
            industry_labels: strings(&["industry"]),
            vacancy_labels: strings(&["opening", "vacanc"]),
            posted_labels: strings(&["posted"]),
            vacancy_pattern: r"(?i)(\d+)\s+openings?".to_string(),
            short_text: strings(&["span"]),
            short_text_max: 60,
        }
    }
}
