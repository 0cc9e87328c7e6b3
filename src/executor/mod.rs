//! Settlement executor.
//!
//! At fire time: re-quote both legs (with backoff), decide the winner, submit
//! `set_winner`, and only once the chain accepted it drop the job and post the
//! result notification. A failed submission leaves the job registered.

use crate::chain::{ChainError, SetWinnerMsg, SettlementSubmitter, TxReceipt, WagerReader};
use crate::notify::{settlement_message, FeeSplit, MessageStyle, Notifier};
use crate::prices::{quote_legs, PriceError, PriceSource};
use crate::registry::JobRegistry;
use crate::scheduler::JobSettler;
use crate::wager::outcome::{self, Outcome, OutcomeError};
use crate::wager::{Job, JobKey, PriceQuote};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum SettleError {
    #[error("price fetch failed after {attempts} attempts: {source}")]
    Prices {
        attempts: u32,
        #[source]
        source: PriceError,
    },
    #[error(transparent)]
    Outcome(#[from] OutcomeError),
    #[error("settlement submission failed: {0}")]
    Submit(#[from] ChainError),
    #[error("settlement submission timed out after {0:?}")]
    Timeout(Duration),
}

/// Exponential backoff for price fetches at settlement time.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// A settlement the chain accepted.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub key: JobKey,
    pub outcome: Outcome,
    pub current: [PriceQuote; 2],
    pub receipt: TxReceipt,
}

pub struct SettlementExecutor {
    prices: Arc<dyn PriceSource>,
    reader: Arc<dyn WagerReader>,
    submitter: Arc<dyn SettlementSubmitter>,
    registry: JobRegistry,
    notifier: Option<(Arc<dyn Notifier>, MessageStyle)>,
    retry: RetryPolicy,
    submit_timeout: Duration,
}

impl SettlementExecutor {
    pub fn new(
        prices: Arc<dyn PriceSource>,
        reader: Arc<dyn WagerReader>,
        submitter: Arc<dyn SettlementSubmitter>,
        registry: JobRegistry,
        retry: RetryPolicy,
        submit_timeout: Duration,
    ) -> Self {
        Self {
            prices,
            reader,
            submitter,
            registry,
            notifier: None,
            retry,
            submit_timeout,
        }
    }

    /// Post a result message after each accepted settlement.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>, style: MessageStyle) -> Self {
        self.notifier = Some((notifier, style));
        self
    }

    pub async fn settle(&self, job: &Job) -> Result<Settlement, SettleError> {
        let current = self.quote_with_retry(job).await?;
        let outcome = outcome::decide(job.terms(), job.baseline(), &current)?;
        let msg = SetWinnerMsg::new(job, &current);

        let receipt = tokio::time::timeout(self.submit_timeout, self.submitter.set_winner(&msg))
            .await
            .map_err(|_| SettleError::Timeout(self.submit_timeout))??;

        self.registry.delete(job.key());

        info!(
            job = %job.key(),
            tx = %receipt.tx_hash,
            winner = ?outcome.winner.as_ref().map(|t| t.to_string()),
            prev = ?msg.prev_prices,
            current = ?msg.current_prices,
            "wager settled"
        );

        self.spawn_notification(job, &outcome);

        Ok(Settlement {
            key: job.key().clone(),
            outcome,
            current,
            receipt,
        })
    }

    async fn quote_with_retry(&self, job: &Job) -> Result<[PriceQuote; 2], SettleError> {
        let attempts = self.retry.attempts.max(1);
        let mut delay = self.retry.base_delay;
        let mut attempt = 1;

        loop {
            match quote_legs(self.prices.as_ref(), job.terms()).await {
                Ok(quotes) => return Ok(quotes),
                Err(e) if attempt < attempts => {
                    warn!(job = %job.key(), error = %e, attempt, "settlement price fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(SettleError::Prices {
                        attempts,
                        source: e,
                    })
                }
            }
        }
    }

    /// Fire-and-forget: the contract config is read now so the fee split uses
    /// the percentages in effect at settlement.
    fn spawn_notification(&self, job: &Job, outcome: &Outcome) {
        let Some((notifier, style)) = self.notifier.clone() else {
            return;
        };
        let reader = self.reader.clone();
        let terms = job.terms().clone();
        let winner = outcome.winner.clone();
        let key = job.key().clone();

        tokio::spawn(async move {
            let config = match reader.config().await {
                Ok(config) => config,
                Err(e) => {
                    warn!(job = %key, error = %e, "contract config unavailable, result not posted");
                    return;
                }
            };
            let Some(split) = FeeSplit::compute(terms.amount, &config) else {
                warn!(job = %key, amount = %terms.amount, "fee split overflow, result not posted");
                return;
            };

            let msg = settlement_message(&terms, winner.as_ref(), &split, &style);
            match notifier.post(&msg).await {
                Ok(()) => info!(job = %key, "result posted"),
                Err(e) => warn!(job = %key, error = %e, "result notification failed"),
            }
        });
    }
}

#[async_trait]
impl JobSettler for SettlementExecutor {
    async fn settle_job(&self, job: Job) {
        if let Err(e) = self.settle(&job).await {
            error!(job = %job.key(), error = %e, "settlement failed, job kept");
        }
    }
}
