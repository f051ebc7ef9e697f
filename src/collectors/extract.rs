//! Pure extraction over rendered page snapshots.

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

use crate::collectors::selectors::{DetailSelectors, ListingSelectors, Locator};
use crate::models::job::{JobDetail, JobListing, NOT_DISCLOSED, NOT_SPECIFIED};

fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(sel) => Some(sel),
        Err(e) => {
            tracing::warn!(selector, "Skipping invalid selector: {e:?}");
            None
        }
    }
}

/// Element text with runs of whitespace collapsed.
fn clean_text(el: ElementRef<'_>) -> String {
    collapse(&el.text().collect::<Vec<_>>().join(" "))
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First value, across locators in order, longer than `min_len` characters.
fn resolve(scope: ElementRef<'_>, locators: &[Locator], min_len: usize) -> Option<String> {
    for locator in locators {
        let Some(sel) = parse_selector(locator.selector()) else {
            continue;
        };
        for el in scope.select(&sel) {
            let value = match locator {
                Locator::Text(_) => clean_text(el),
                Locator::Attr { attr, .. } => {
                    el.value().attr(attr).map(str::trim).unwrap_or("").to_string()
                }
            };
            if value.chars().count() > min_len {
                return Some(value);
            }
        }
    }
    None
}

/// Items of the first group that yields anything; groups are never merged.
fn first_group(scope: ElementRef<'_>, groups: &[String], dedupe: bool) -> Vec<String> {
    for group in groups {
        let Some(sel) = parse_selector(group) else {
            continue;
        };
        let mut items: Vec<String> = Vec::new();
        for value in scope.select(&sel).map(clean_text) {
            if value.is_empty() || (dedupe && items.contains(&value)) {
                continue;
            }
            items.push(value);
        }
        if !items.is_empty() {
            return items;
        }
    }
    Vec::new()
}

fn card_selector(document: &Html, cards: &[String]) -> Option<Selector> {
    cards
        .iter()
        .filter_map(|s| parse_selector(s))
        .find(|sel| document.select(sel).next().is_some())
}

/// Whether the snapshot contains at least one recognizable listing card.
pub fn has_cards(html: &str, selectors: &ListingSelectors) -> bool {
    let document = Html::parse_document(html);
    card_selector(&document, &selectors.card).is_some()
}

/// Resolve a card link against the site origin.
pub fn absolutize(origin: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    if let Some(rest) = href.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    let origin = origin.trim_end_matches('/');
    match href.strip_prefix('/') {
        Some(path) => Some(format!("{origin}/{path}")),
        None => Some(format!("{origin}/{href}")),
    }
}

/// Listing pass. Cards lacking a title, company or resolvable URL are dropped.
pub fn listings(
    html: &str,
    selectors: &ListingSelectors,
    origin: &str,
    keyword: &str,
) -> Vec<JobListing> {
    let document = Html::parse_document(html);
    let Some(card_sel) = card_selector(&document, &selectors.card) else {
        return Vec::new();
    };

    let mut jobs = Vec::new();
    let mut discarded = 0usize;
    for card in document.select(&card_sel) {
        let title = resolve(card, &selectors.title, 0);
        let company = resolve(card, &selectors.company, 0);
        let url = resolve(card, &selectors.url, 0).and_then(|href| absolutize(origin, &href));

        let (Some(title), Some(company), Some(url)) = (title, company, url) else {
            discarded += 1;
            continue;
        };

        let mut job = JobListing::new(title, company, url, keyword);
        let or_sentinel = |rules: &[Locator], sentinel: &str| {
            resolve(card, rules, 0).unwrap_or_else(|| sentinel.to_string())
        };
        job.location = or_sentinel(&selectors.location, NOT_SPECIFIED);
        job.experience_range = or_sentinel(&selectors.experience, NOT_SPECIFIED);
        job.salary_disclosed = or_sentinel(&selectors.salary, NOT_DISCLOSED);
        job.posted_date = or_sentinel(&selectors.posted, NOT_SPECIFIED);
        job.skills = first_group(card, &selectors.skills, false);
        job.description = resolve(card, &selectors.description, 0).unwrap_or_default();
        jobs.push(job);
    }

    if discarded > 0 {
        tracing::debug!(discarded, kept = jobs.len(), "Dropped incomplete listing cards");
    }
    jobs
}

/// Value paired with a label element: text after a colon inside the label,
/// otherwise the nearest following sibling with any text.
fn label_value(label: ElementRef<'_>) -> Option<String> {
    let own = clean_text(label);
    if let Some((_, after)) = own.split_once(':') {
        let after = after.trim();
        if !after.is_empty() {
            return Some(after.to_string());
        }
    }

    label.next_siblings().find_map(|node| {
        let value = match node.value() {
            Node::Element(_) => ElementRef::wrap(node).map(clean_text)?,
            Node::Text(text) => collapse(text),
            _ => return None,
        };
        (!value.is_empty()).then_some(value)
    })
}

fn label_matches(label: &str, keys: &[String]) -> bool {
    keys.iter().any(|k| label.contains(&k.to_lowercase()))
}

/// Detail pass. Never rejects: unresolved fields keep their defaults.
pub fn detail(html: &str, selectors: &DetailSelectors) -> JobDetail {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let mut detail = JobDetail::default();

    if let Some(text) = resolve(root, &selectors.description, selectors.min_description_length) {
        detail.full_description = text;
    }
    detail.key_skills = first_group(root, &selectors.key_skills, true);
    if let Some(salary) = resolve(root, &selectors.salary, 0) {
        detail.salary_offered = salary;
    }

    let mut industry: Option<String> = None;
    let mut vacancy: Option<String> = None;
    let mut posted: Option<String> = None;
    for label_sel in selectors.labels.iter().filter_map(|s| parse_selector(s)) {
        for label in root.select(&label_sel) {
            let name = clean_text(label).to_lowercase();
            let slot = if label_matches(&name, &selectors.industry_labels) {
                &mut industry
            } else if label_matches(&name, &selectors.vacancy_labels) {
                &mut vacancy
            } else if label_matches(&name, &selectors.posted_labels) {
                &mut posted
            } else {
                continue;
            };
            if slot.is_none() {
                *slot = label_value(label);
            }
        }
    }

    // Secondary vacancy source; any hit here replaces the label-pair value.
    match Regex::new(&selectors.vacancy_pattern) {
        Ok(pattern) => {
            for sel in selectors.short_text.iter().filter_map(|s| parse_selector(s)) {
                for el in root.select(&sel) {
                    let text = clean_text(el);
                    if text.chars().count() > selectors.short_text_max {
                        continue;
                    }
                    if let Some(count) = pattern.captures(&text).and_then(|c| c.get(1)) {
                        vacancy = Some(count.as_str().to_string());
                    }
                }
            }
        }
        Err(e) => tracing::warn!(pattern = %selectors.vacancy_pattern, "Invalid vacancy pattern: {e}"),
    }

    if let Some(industry) = industry {
        detail.industry_types = industry
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(vacancy) = vacancy {
        detail.total_vacancy = vacancy;
    }
    if let Some(posted) = posted {
        detail.job_posted_at = posted;
    }
    detail
}
