//! Delayed settlement timers.
//!
//! Each job gets one tokio task that sleeps until `expires_at + grace` and then
//! hands the job to the settler. Pending timers are tracked by key so they can
//! be cancelled and so a key never has two timers at once. A timer stops
//! being pending the moment it fires, before settlement runs.

use crate::wager::{Job, JobKey};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::AbortHandle;
use tracing::{debug, info};

/// Past-due fire times are pushed this far into the future.
const MIN_DELAY_SECS: i64 = 1;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("settlement already pending for {0}")]
    AlreadyPending(JobKey),
}

/// Receives jobs when their timer fires.
#[async_trait]
pub trait JobSettler: Send + Sync {
    async fn settle_job(&self, job: Job);
}

/// `expires_at + grace`, or `now + 1s` when that has already passed.
pub fn fire_time(
    expires_at: DateTime<Utc>,
    grace: chrono::Duration,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let fire_at = expires_at + grace;
    if fire_at <= now {
        now + chrono::Duration::seconds(MIN_DELAY_SECS)
    } else {
        fire_at
    }
}

#[derive(Clone)]
pub struct SettlementScheduler {
    settler: Arc<dyn JobSettler>,
    grace: chrono::Duration,
    pending: Arc<DashMap<JobKey, AbortHandle>>,
}

impl SettlementScheduler {
    pub fn new(settler: Arc<dyn JobSettler>, grace: Duration) -> Self {
        Self {
            settler,
            grace: chrono::Duration::from_std(grace).unwrap_or(chrono::Duration::zero()),
            pending: Arc::new(DashMap::new()),
        }
    }

    pub fn schedule(&self, job: Job) -> Result<DateTime<Utc>, ScheduleError> {
        self.schedule_at(job, Utc::now())
    }

    /// Start the timer for `job` as of `now`. Returns the fire time.
    pub fn schedule_at(&self, job: Job, now: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
        let fire_at = fire_time(job.terms().expires_at, self.grace, now);
        let delay = (fire_at - now)
            .to_std()
            .unwrap_or(Duration::from_secs(MIN_DELAY_SECS as u64));
        let key = job.key().clone();

        let slot = match self.pending.entry(key.clone()) {
            Entry::Occupied(_) => {
                debug!(job = %key, "settlement timer already pending");
                return Err(ScheduleError::AlreadyPending(key));
            }
            Entry::Vacant(slot) => slot,
        };

        let settler = self.settler.clone();
        let pending = self.pending.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Fired timers are no longer pending; the registry entry guards the
            // key until the settler deletes it.
            pending.remove(&task_key);
            settler.settle_job(job).await;
        });
        slot.insert(handle.abort_handle());

        info!(
            job = %key,
            fire_at = %fire_at,
            delay_secs = delay.as_secs(),
            "settlement scheduled"
        );
        Ok(fire_at)
    }

    /// Abort a pending timer. Returns false if none was pending.
    pub fn cancel(&self, key: &JobKey) -> bool {
        match self.pending.remove(key) {
            Some((_, handle)) => {
                handle.abort();
                info!(job = %key, "settlement timer cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, key: &JobKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
