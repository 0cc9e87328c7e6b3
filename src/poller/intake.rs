//! Handlers for accepted events.
//!
//! `WagerIntake` turns a wager event into a registered, scheduled job.
//! `MatchmakeAnnouncer` posts a "seeking an opponent" message for a matchmake
//! event.

use crate::chain::{ChainError, WagerReader};
use crate::notify::{matchmaking_message, MessageStyle, Notifier, NotifyError};
use crate::prices::{quote_legs, PriceError, PriceSource};
use crate::registry::{InsertOutcome, JobRegistry};
use crate::scheduler::{ScheduleError, SettlementScheduler};
use crate::wager::{Job, JobKey, TokenRef};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("chain read failed: {0}")]
    Chain(#[from] ChainError),
    #[error("baseline price fetch failed: {0}")]
    Prices(#[from] PriceError),
    #[error("baseline price for {symbol} is {price}, not positive")]
    InvalidBaseline { symbol: String, price: Decimal },
    #[error("announcement failed: {0}")]
    Notify(#[from] NotifyError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    Opened { key: JobKey, fire_at: DateTime<Utc> },
    AlreadyTracked(JobKey),
}

pub struct WagerIntake {
    reader: Arc<dyn WagerReader>,
    prices: Arc<dyn PriceSource>,
    registry: JobRegistry,
    scheduler: SettlementScheduler,
}

impl WagerIntake {
    pub fn new(
        reader: Arc<dyn WagerReader>,
        prices: Arc<dyn PriceSource>,
        registry: JobRegistry,
        scheduler: SettlementScheduler,
    ) -> Self {
        Self {
            reader,
            prices,
            registry,
            scheduler,
        }
    }

    /// Read the wager `token` participates in, capture baseline prices and
    /// register + schedule it. A wager that is already tracked is left alone.
    pub async fn open_job(&self, token: &TokenRef) -> Result<IntakeOutcome, IntakeError> {
        let terms = self.reader.wager(token).await?;
        let key = JobKey::for_terms(&terms);

        if self.registry.contains(&key) {
            info!(job = %key, "wager already tracked");
            return Ok(IntakeOutcome::AlreadyTracked(key));
        }

        let baseline = quote_legs(self.prices.as_ref(), &terms).await?;
        // No percentage change can be computed against a zero baseline, so such
        // a job could never settle.
        if let Some(bad) = baseline.iter().find(|q| q.price <= Decimal::ZERO) {
            return Err(IntakeError::InvalidBaseline {
                symbol: bad.symbol.clone(),
                price: bad.price,
            });
        }
        let job = Job::new(terms, baseline);

        // A concurrent intake may have won the race since the check above.
        if self.registry.insert(job.clone()) == InsertOutcome::AlreadyExists {
            info!(job = %key, "wager already tracked");
            return Ok(IntakeOutcome::AlreadyTracked(key));
        }

        match self.scheduler.schedule(job.clone()) {
            Ok(fire_at) => {
                let baseline = job.baseline();
                info!(
                    job = %key,
                    amount = %job.terms().amount,
                    expires_at = %job.terms().expires_at,
                    fire_at = %fire_at,
                    baseline_a = %baseline[0].price,
                    baseline_b = %baseline[1].price,
                    "job opened"
                );
                Ok(IntakeOutcome::Opened { key, fire_at })
            }
            Err(ScheduleError::AlreadyPending(key)) => {
                debug!(job = %key, "timer already pending");
                Ok(IntakeOutcome::AlreadyTracked(key))
            }
        }
    }
}

pub struct MatchmakeAnnouncer {
    reader: Arc<dyn WagerReader>,
    notifier: Option<Arc<dyn Notifier>>,
    style: MessageStyle,
}

impl MatchmakeAnnouncer {
    /// Without a notifier, announcements are skipped.
    pub fn new(
        reader: Arc<dyn WagerReader>,
        notifier: Option<Arc<dyn Notifier>>,
        style: MessageStyle,
    ) -> Self {
        Self {
            reader,
            notifier,
            style,
        }
    }

    /// Returns false when announcements are disabled.
    pub async fn announce(&self, token: &TokenRef) -> Result<bool, IntakeError> {
        let Some(notifier) = &self.notifier else {
            debug!(token = %token, "no webhook configured, matchmake not announced");
            return Ok(false);
        };

        let status = self.reader.token_status(token).await?;
        let msg = matchmaking_message(token, &status, &self.style, Utc::now());
        notifier.post(&msg).await?;

        info!(
            token = %token,
            currency = %status.currency,
            amount = %status.amount,
            "matchmake announced"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MatchmakingStatus;
    use crate::test_support::{
        terms, FakePrices, FakeReader, RecordingNotifier, RecordingSettler, COLLECTION,
    };
    use rust_decimal_macros::dec;
    use std::time::Duration;

    struct Harness {
        reader: Arc<FakeReader>,
        prices: Arc<FakePrices>,
        registry: JobRegistry,
        scheduler: SettlementScheduler,
        intake: Arc<WagerIntake>,
    }

    fn harness() -> Harness {
        let reader = FakeReader::new();
        let prices = FakePrices::new(&[("ATOM", dec!(10)), ("OSMO", dec!(20))]);
        let registry = JobRegistry::new(prices.clone());
        let scheduler = SettlementScheduler::new(RecordingSettler::new(), Duration::from_secs(12));
        let intake = Arc::new(WagerIntake::new(
            reader.clone(),
            prices.clone(),
            registry.clone(),
            scheduler.clone(),
        ));
        Harness {
            reader,
            prices,
            registry,
            scheduler,
            intake,
        }
    }

    fn style() -> MessageStyle {
        MessageStyle {
            display_name: "Wizard".to_string(),
            avatar_base_url: "https://img.example.org".to_string(),
            matchmake_url: "https://duel.example.org/wager".to_string(),
            coin: "STARS".to_string(),
        }
    }

    #[tokio::test]
    async fn test_open_job_registers_and_schedules() {
        let h = harness();
        h.reader.add_wager(terms(5, 9));

        let outcome = h.intake.open_job(&TokenRef::new(COLLECTION, 5)).await.unwrap();

        let key = match outcome {
            IntakeOutcome::Opened { key, .. } => key,
            other => panic!("expected a new job, got {other:?}"),
        };
        let job = h.registry.lookup(9).unwrap();
        assert_eq!(job.key(), &key);
        assert_eq!(job.baseline()[0].price, dec!(10));
        assert_eq!(job.baseline()[1].price, dec!(20));
        assert!(h.scheduler.is_pending(&key));
    }

    #[tokio::test]
    async fn test_second_open_is_a_noop() {
        let h = harness();
        h.reader.add_wager(terms(5, 9));

        h.intake.open_job(&TokenRef::new(COLLECTION, 5)).await.unwrap();
        // Discovered again through the other participant.
        let outcome = h.intake.open_job(&TokenRef::new(COLLECTION, 9)).await.unwrap();

        assert!(matches!(outcome, IntakeOutcome::AlreadyTracked(_)));
        assert_eq!(h.registry.len(), 1);
        assert_eq!(h.scheduler.pending(), 1);
        // Baseline is captured once.
        assert_eq!(h.prices.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_discovery_registers_once() {
        let h = harness();
        h.reader.add_wager(terms(5, 9));

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let intake = h.intake.clone();
                let token = TokenRef::new(COLLECTION, if i % 2 == 0 { 5 } else { 9 });
                tokio::spawn(async move { intake.open_job(&token).await.unwrap() })
            })
            .collect();

        let mut opened = 0;
        for task in tasks {
            if matches!(task.await.unwrap(), IntakeOutcome::Opened { .. }) {
                opened += 1;
            }
        }

        assert_eq!(opened, 1);
        assert_eq!(h.registry.len(), 1);
        assert_eq!(h.scheduler.pending(), 1);
    }

    #[tokio::test]
    async fn test_price_failure_creates_no_job() {
        let h = harness();
        h.reader.add_wager(terms(5, 9));
        h.prices.fail_next(1);

        let err = h.intake.open_job(&TokenRef::new(COLLECTION, 5)).await.unwrap_err();

        assert!(matches!(err, IntakeError::Prices(_)));
        assert!(h.registry.is_empty());
        assert_eq!(h.scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn test_zero_baseline_creates_no_job() {
        let h = harness();
        h.reader.add_wager(terms(5, 9));
        h.prices.set("atom", dec!(0));

        let err = h.intake.open_job(&TokenRef::new(COLLECTION, 5)).await.unwrap_err();

        assert!(matches!(
            err,
            IntakeError::InvalidBaseline { ref symbol, .. } if symbol == "ATOM"
        ));
        assert!(h.registry.is_empty());
        assert_eq!(h.scheduler.pending(), 0);

        // A later event with a sane quote opens the job.
        h.prices.set("atom", dec!(10));
        let outcome = h.intake.open_job(&TokenRef::new(COLLECTION, 9)).await.unwrap();
        assert!(matches!(outcome, IntakeOutcome::Opened { .. }));
    }

    #[tokio::test]
    async fn test_unknown_wager_is_a_chain_error() {
        let h = harness();
        let err = h.intake.open_job(&TokenRef::new(COLLECTION, 77)).await.unwrap_err();
        assert!(matches!(err, IntakeError::Chain(_)));
    }

    #[tokio::test]
    async fn test_announce_posts_matchmaking_message() {
        let reader = FakeReader::new();
        reader.add_status(
            42,
            MatchmakingStatus {
                currency: "atom".to_string(),
                against_currencies: vec!["osmo".to_string()],
                amount: 1_000_000,
                expiry: 600,
            },
        );
        let notifier = RecordingNotifier::new();
        let announcer = MatchmakeAnnouncer::new(reader, Some(notifier.clone() as Arc<dyn Notifier>), style());

        assert!(announcer.announce(&TokenRef::new(COLLECTION, 42)).await.unwrap());

        let posted = notifier.posted();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].embeds[0].title, "I am seeking an opponent!");
        assert_eq!(posted[0].embeds[0].fields[3].value, "10 minutes");
    }

    #[tokio::test]
    async fn test_announce_without_webhook_is_skipped() {
        let announcer = MatchmakeAnnouncer::new(FakeReader::new(), None, style());
        assert!(!announcer.announce(&TokenRef::new(COLLECTION, 42)).await.unwrap());
    }
}
