use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::ScrapeError;

pub const NOT_SPECIFIED: &str = "Not specified";
pub const NOT_DISCLOSED: &str = "Not disclosed";

/// One search-result card, as read off a listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListing {
    pub title: String,
    pub company: String,
    pub location: String,
    pub experience_range: String,
    pub salary_disclosed: String,
    pub posted_date: String,
    pub skills: Vec<String>,
    pub description: String,
    pub job_url: String,
    pub search_keyword: String,
    pub scraped_at: DateTime<Utc>,
}

impl JobListing {
    /// A listing with only its validity-gate fields set; the rest hold sentinels.
    pub fn new(title: String, company: String, job_url: String, search_keyword: &str) -> Self {
        Self {
            title,
            company,
            location: NOT_SPECIFIED.to_string(),
            experience_range: NOT_SPECIFIED.to_string(),
            salary_disclosed: NOT_DISCLOSED.to_string(),
            posted_date: NOT_SPECIFIED.to_string(),
            skills: Vec::new(),
            description: String::new(),
            job_url,
            search_keyword: search_keyword.to_string(),
            scraped_at: Utc::now(),
        }
    }
}

/// Fields only the detail page carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    pub full_description: String,
    pub key_skills: Vec<String>,
    pub industry_types: Vec<String>,
    pub job_posted_at: String,
    pub salary_offered: String,
    pub total_vacancy: String,
}

impl Default for JobDetail {
    fn default() -> Self {
        Self {
            full_description: String::new(),
            key_skills: Vec::new(),
            industry_types: Vec::new(),
            job_posted_at: NOT_SPECIFIED.to_string(),
            salary_offered: NOT_DISCLOSED.to_string(),
            total_vacancy: NOT_SPECIFIED.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedJob {
    #[serde(flatten)]
    pub listing: JobListing,
    #[serde(flatten)]
    pub detail: JobDetail,
    pub matched_skills: Vec<String>,
    pub experience_filter_label: String,
}

impl EnrichedJob {
    pub fn new(listing: JobListing, experience_filter_label: &str) -> Self {
        Self {
            listing,
            detail: JobDetail::default(),
            matched_skills: Vec::new(),
            experience_filter_label: experience_filter_label.to_string(),
        }
    }

    /// Listing skills followed by any detail key skills not already present.
    pub fn skill_pool(&self) -> Vec<String> {
        let mut pool = self.listing.skills.clone();
        for skill in &self.detail.key_skills {
            if !pool.contains(skill) {
                pool.push(skill.clone());
            }
        }
        pool
    }

    pub fn job_url(&self) -> &str {
        &self.listing.job_url
    }

    /// Insert or update by `job_url`. Returns whether the row was newly inserted.
    pub async fn upsert(&self, pool: &PgPool) -> Result<bool, ScrapeError> {
        let l = &self.listing;
        let d = &self.detail;
        let (inserted,): (bool,) = sqlx::query_as(
            "INSERT INTO jobs (job_url, title, company, location, experience_range, salary_disclosed, posted_date, skills, description, search_keyword, scraped_at, full_description, key_skills, industry_types, job_posted_at, salary_offered, total_vacancy, matched_skills, experience_filter_label)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
             ON CONFLICT (job_url) DO UPDATE SET
                 title = EXCLUDED.title,
                 company = EXCLUDED.company,
                 location = EXCLUDED.location,
                 experience_range = EXCLUDED.experience_range,
                 salary_disclosed = EXCLUDED.salary_disclosed,
                 posted_date = EXCLUDED.posted_date,
                 skills = EXCLUDED.skills,
                 description = EXCLUDED.description,
                 search_keyword = EXCLUDED.search_keyword,
                 scraped_at = EXCLUDED.scraped_at,
                 full_description = EXCLUDED.full_description,
                 key_skills = EXCLUDED.key_skills,
                 industry_types = EXCLUDED.industry_types,
                 job_posted_at = EXCLUDED.job_posted_at,
                 salary_offered = EXCLUDED.salary_offered,
                 total_vacancy = EXCLUDED.total_vacancy,
                 matched_skills = EXCLUDED.matched_skills,
                 experience_filter_label = EXCLUDED.experience_filter_label,
                 updated_at = NOW()
             RETURNING (xmax = 0)",
        )
        .bind(&l.job_url)
        .bind(&l.title)
        .bind(&l.company)
        .bind(&l.location)
        .bind(&l.experience_range)
        .bind(&l.salary_disclosed)
        .bind(&l.posted_date)
        .bind(&l.skills)
        .bind(&l.description)
        .bind(&l.search_keyword)
        .bind(l.scraped_at)
        .bind(&d.full_description)
        .bind(&d.key_skills)
        .bind(&d.industry_types)
        .bind(&d.job_posted_at)
        .bind(&d.salary_offered)
        .bind(&d.total_vacancy)
        .bind(&self.matched_skills)
        .bind(&self.experience_filter_label)
        .fetch_one(pool)
        .await?;
        Ok(inserted)
    }
}

/// Row shape used by the `stats` command.
#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StoredJobSummary {
    pub title: String,
    pub company: String,
    pub job_url: String,
    pub matched_skills: Vec<String>,
    pub scraped_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordCount {
    pub keyword: String,
    pub jobs: i64,
}

/// Everything the `stats` command reports.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total: i64,
    pub by_keyword: Vec<KeywordCount>,
    pub recent: Vec<StoredJobSummary>,
}

impl StoreStats {
    pub async fn load(pool: &PgPool, recent_limit: i64) -> Result<Self, ScrapeError> {
        let by_keyword = count_by_keyword(pool)
            .await?
            .into_iter()
            .map(|(keyword, jobs)| KeywordCount { keyword, jobs })
            .collect();
        Ok(Self {
            total: count(pool).await?,
            by_keyword,
            recent: recent(pool, recent_limit.max(0)).await?,
        })
    }
}

pub async fn count(pool: &PgPool) -> Result<i64, ScrapeError> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

pub async fn count_by_keyword(pool: &PgPool) -> Result<Vec<(String, i64)>, ScrapeError> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT search_keyword, COUNT(*) FROM jobs GROUP BY search_keyword ORDER BY COUNT(*) DESC, search_keyword",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<StoredJobSummary>, ScrapeError> {
    let jobs = sqlx::query_as::<_, StoredJobSummary>(
        "SELECT title, company, job_url, matched_skills, scraped_at FROM jobs ORDER BY scraped_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> JobListing {
        JobListing::new(
            "Backend Engineer".to_string(),
            "Acme".to_string(),
            "https://example.com/job-1".to_string(),
            "rust",
        )
    }

    #[test]
    fn fresh_records_hold_sentinels_not_blanks() {
        let job = EnrichedJob::new(listing(), "Any");
        assert_eq!(job.listing.location, NOT_SPECIFIED);
        assert_eq!(job.listing.salary_disclosed, NOT_DISCLOSED);
        assert_eq!(job.detail.total_vacancy, NOT_SPECIFIED);
        assert_eq!(job.detail.salary_offered, NOT_DISCLOSED);
        assert_eq!(job.experience_filter_label, "Any");
    }

    #[test]
    fn skill_pool_unions_without_repeats() {
        let mut job = EnrichedJob::new(listing(), "Any");
        job.listing.skills = vec!["Rust".to_string(), "SQL".to_string()];
        job.detail.key_skills = vec!["SQL".to_string(), "Kafka".to_string()];
        assert_eq!(job.skill_pool(), vec!["Rust", "SQL", "Kafka"]);
    }

    #[test]
    fn serializes_as_one_flat_camel_case_record() {
        let job = EnrichedJob::new(listing(), "2-5 years");
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["jobUrl"], "https://example.com/job-1");
        assert_eq!(value["experienceFilterLabel"], "2-5 years");
        assert_eq!(value["totalVacancy"], NOT_SPECIFIED);
        assert!(value.get("listing").is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn upsert_same_url_twice_keeps_one_row_with_latest_values(pool: PgPool) {
        let mut job = EnrichedJob::new(listing(), "Any");
        job.matched_skills = vec!["Rust".to_string()];
        assert!(job.upsert(&pool).await.unwrap());

        job.listing.title = "Staff Backend Engineer".to_string();
        job.detail.total_vacancy = "4".to_string();
        job.matched_skills = vec!["Rust".to_string(), "SQL".to_string()];
        assert!(!job.upsert(&pool).await.unwrap());

        assert_eq!(count(&pool).await.unwrap(), 1);
        let (title, vacancy, matched): (String, String, Vec<String>) = sqlx::query_as(
            "SELECT title, total_vacancy, matched_skills FROM jobs WHERE job_url = $1",
        )
        .bind(job.job_url())
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(title, "Staff Backend Engineer");
        assert_eq!(vacancy, "4");
        assert_eq!(matched, vec!["Rust", "SQL"]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn stats_queries_reflect_stored_rows(pool: PgPool) {
        let rows = [
            ("https://example.com/a", "rust"),
            ("https://example.com/b", "rust"),
            ("https://example.com/c", "go"),
        ];
        for (url, keyword) in rows {
            let listing =
                JobListing::new("Engineer".to_string(), "Acme".to_string(), url.to_string(), keyword);
            EnrichedJob::new(listing, "Any").upsert(&pool).await.unwrap();
        }

        assert_eq!(count(&pool).await.unwrap(), 3);
        assert_eq!(
            count_by_keyword(&pool).await.unwrap(),
            vec![("rust".to_string(), 2), ("go".to_string(), 1)]
        );
        assert_eq!(recent(&pool, 2).await.unwrap().len(), 2);

        let stats = StoreStats::load(&pool, 5).await.unwrap();
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["total"], 3);
        assert_eq!(value["byKeyword"][0]["keyword"], "rust");
        assert_eq!(value["byKeyword"][0]["jobs"], 2);
        assert_eq!(value["recent"].as_array().unwrap().len(), 3);
        assert!(value["recent"][0]["jobUrl"].is_string());
        assert!(value["recent"][0]["matchedSkills"].is_array());
    }
}
