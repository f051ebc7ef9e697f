use std::ops::AddAssign;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;

use crate::models::job::EnrichedJob;

/// Counts reported back by the store for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SaveSummary {
    pub found: usize,
    pub saved: usize,
    pub duplicates: usize,
}

impl AddAssign for SaveSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.found += rhs.found;
        self.saved += rhs.saved;
        self.duplicates += rhs.duplicates;
    }
}

/// Persistence collaborator: upserts by `job_url` and decides new vs duplicate.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn save_batch(&self, jobs: &[EnrichedJob]) -> SaveSummary;
}

#[async_trait]
impl JobStore for PgPool {
    async fn save_batch(&self, jobs: &[EnrichedJob]) -> SaveSummary {
        let mut summary = SaveSummary {
            found: jobs.len(),
            ..Default::default()
        };

        for job in jobs {
            match job.upsert(self).await {
                Ok(true) => summary.saved += 1,
                Ok(false) => summary.duplicates += 1,
                Err(e) if e.is_duplicate() => summary.duplicates += 1,
                Err(e) => {
                    tracing::warn!(job_url = job.job_url(), "Failed to upsert job: {e}");
                }
            }
        }

        summary
    }
}

#[cfg(test)]
pub mod memory {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Keeps records in insertion order, keyed by `job_url`.
    #[derive(Default)]
    pub struct MemoryStore {
        rows: Mutex<Vec<EnrichedJob>>,
        batches: Mutex<Vec<usize>>,
    }

    impl MemoryStore {
        pub fn rows(&self) -> Vec<EnrichedJob> {
            self.rows.lock().unwrap().clone()
        }

        pub fn batch_sizes(&self) -> Vec<usize> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobStore for MemoryStore {
        async fn save_batch(&self, jobs: &[EnrichedJob]) -> SaveSummary {
            let mut rows = self.rows.lock().unwrap();
            self.batches.lock().unwrap().push(jobs.len());
            let index: HashMap<String, usize> = rows
                .iter()
                .enumerate()
                .map(|(i, j)| (j.job_url().to_string(), i))
                .collect();

            let mut summary = SaveSummary {
                found: jobs.len(),
                ..Default::default()
            };
            for job in jobs {
                match index.get(job.job_url()) {
                    Some(&i) => {
                        rows[i] = job.clone();
                        summary.duplicates += 1;
                    }
                    None => {
                        rows.push(job.clone());
                        summary.saved += 1;
                    }
                }
            }
            summary
        }
    }
}
