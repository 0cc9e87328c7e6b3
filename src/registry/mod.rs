//! In-memory registry of wagers awaiting settlement.
//!
//! Keyed by the unordered pair of participant tokens. Insert is atomic per
//! key (DashMap entry lock), so concurrent discovery of the same wager by
//! overlapping polls registers it exactly once.

use crate::prices::{quote_legs, PriceError, PriceSource};
use crate::wager::outcome::{self, LegChange, OutcomeError};
use crate::wager::{Job, JobKey, Leg, PriceQuote, TokenRef};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum DetailError {
    #[error("price fetch failed: {0}")]
    Price(#[from] PriceError),
    #[error(transparent)]
    Outcome(#[from] OutcomeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// Live view of a registered wager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDetail {
    pub amount: String,
    pub expires_at: DateTime<Utc>,
    pub wagers: [Leg; 2],
    pub prev_prices: [PriceQuote; 2],
    pub current_prices: [PriceQuote; 2],
    pub change: [LegChange; 2],
    pub current_winner: Option<TokenRef>,
}

/// Thread-safe job registry. Clones share the same map.
#[derive(Clone)]
pub struct JobRegistry {
    jobs: Arc<DashMap<JobKey, Job>>,
    prices: Arc<dyn PriceSource>,
}

impl JobRegistry {
    pub fn new(prices: Arc<dyn PriceSource>) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            prices,
        }
    }

    /// Register a job unless one already exists for its key.
    pub fn insert(&self, job: Job) -> InsertOutcome {
        match self.jobs.entry(job.key().clone()) {
            Entry::Occupied(existing) => {
                debug!(job = %existing.key(), "job already registered");
                InsertOutcome::AlreadyExists
            }
            Entry::Vacant(slot) => {
                slot.insert(job);
                InsertOutcome::Inserted
            }
        }
    }

    pub fn contains(&self, key: &JobKey) -> bool {
        self.jobs.contains_key(key)
    }

    /// The job one of whose participants is `token_id`.
    pub fn lookup(&self, token_id: u64) -> Option<Job> {
        self.jobs
            .iter()
            .find(|entry| entry.key().contains_token(token_id))
            .map(|entry| entry.value().clone())
    }

    /// Remove a job. Absent keys are ignored.
    pub fn delete(&self, key: &JobKey) -> Option<Job> {
        self.jobs.remove(key).map(|(_, job)| job)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Snapshot of all registered jobs.
    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Live projection for the job containing `token_id`, with fresh prices.
    pub async fn detail(&self, token_id: u64) -> Result<Option<JobDetail>, DetailError> {
        match self.lookup(token_id) {
            Some(job) => self.project(&job).await.map(Some),
            None => Ok(None),
        }
    }

    /// Projections for every job. Jobs whose prices cannot be fetched are skipped.
    pub async fn list(&self) -> Vec<JobDetail> {
        let jobs = self.jobs();
        let details = join_all(jobs.iter().map(|job| self.project(job))).await;

        jobs.iter()
            .zip(details)
            .filter_map(|(job, detail)| match detail {
                Ok(detail) => Some(detail),
                Err(e) => {
                    warn!(job = %job.key(), error = %e, "job detail unavailable");
                    None
                }
            })
            .collect()
    }

    async fn project(&self, job: &Job) -> Result<JobDetail, DetailError> {
        let terms = job.terms();
        let current = quote_legs(self.prices.as_ref(), terms).await?;
        let outcome = outcome::decide(terms, job.baseline(), &current)?;

        Ok(JobDetail {
            amount: terms.amount.to_string(),
            expires_at: terms.expires_at,
            wagers: terms.legs.clone(),
            prev_prices: job.baseline().clone(),
            current_prices: current,
            change: outcome.changes,
            current_winner: outcome.winner,
        })
    }
}
