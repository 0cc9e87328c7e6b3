//! Indexer event poller.
//!
//! Every tick fetches the newest contract events and accepts an event only if
//! its id is unseen, it was emitted by the wager contract, and it is younger
//! than the freshness horizon. Accepted wager events open jobs; accepted
//! matchmake events are announced. Each event is handled on its own task so
//! one failure never affects the rest of the batch.
//!
//! Ticks never overlap: the interval skips missed ticks, and a tick that
//! starts while another is still running returns `TickReport::Skipped`.

pub mod dedup;
pub mod intake;

use crate::indexer::{EventAction, EventPayload, EventSource, IndexerEvent};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub use dedup::RecentEventCache;
pub use intake::{IntakeError, IntakeOutcome, MatchmakeAnnouncer, WagerIntake};

#[derive(Debug)]
pub enum TickReport {
    /// A previous tick still held the cache.
    Skipped,
    /// The indexer query failed; nothing was accepted.
    Failed,
    Polled {
        fetched: usize,
        accepted: Vec<String>,
        /// Handler tasks spawned for accepted events.
        tasks: Vec<JoinHandle<()>>,
    },
}

pub struct EventPoller {
    source: Arc<dyn EventSource>,
    intake: Arc<WagerIntake>,
    announcer: Arc<MatchmakeAnnouncer>,
    cache: Mutex<RecentEventCache>,
    contract: String,
    freshness: chrono::Duration,
}

impl EventPoller {
    pub fn new(
        source: Arc<dyn EventSource>,
        intake: Arc<WagerIntake>,
        announcer: Arc<MatchmakeAnnouncer>,
        contract: String,
        freshness: Duration,
    ) -> Self {
        Self {
            source,
            intake,
            announcer,
            cache: Mutex::new(RecentEventCache::default()),
            contract,
            freshness: chrono::Duration::from_std(freshness).unwrap_or(chrono::Duration::zero()),
        }
    }

    /// Spawn the polling loop.
    pub fn start(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(
                period_secs = period.as_secs(),
                contract = %self.contract,
                "event poller started"
            );

            loop {
                ticker.tick().await;
                if let TickReport::Polled { accepted, .. } = self.tick().await {
                    if !accepted.is_empty() {
                        debug!(accepted = accepted.len(), "events accepted");
                    }
                }
            }
        })
    }

    pub async fn tick(&self) -> TickReport {
        self.tick_at(Utc::now()).await
    }

    pub async fn tick_at(&self, now: DateTime<Utc>) -> TickReport {
        let Ok(mut cache) = self.cache.try_lock() else {
            debug!("previous poll still running, tick skipped");
            return TickReport::Skipped;
        };

        let events = match self.source.recent_events().await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "indexer poll failed");
                return TickReport::Failed;
            }
        };

        let horizon = now - self.freshness;
        let mut accepted = Vec::new();
        let mut tasks = Vec::new();

        for event in &events {
            if accepted.contains(&event.id) || !self.is_acceptable(&cache, event, horizon) {
                continue;
            }
            accepted.push(event.id.clone());

            match event.payload() {
                Ok(payload) => tasks.extend(self.dispatch(&event.id, payload)),
                Err(e) => warn!(event = %event.id, error = %e, "unparsable event payload"),
            }
        }

        let oldest = cache.oldest().map(str::to_string);
        if cache.record_batch(accepted.iter().map(String::as_str)) {
            info!(
                oldest = ?oldest,
                kept = cache.len(),
                "recent event cache full, cleared"
            );
        }

        TickReport::Polled {
            fetched: events.len(),
            accepted,
            tasks,
        }
    }

    fn is_acceptable(
        &self,
        cache: &RecentEventCache,
        event: &IndexerEvent,
        horizon: DateTime<Utc>,
    ) -> bool {
        if cache.contains(&event.id) {
            return false;
        }
        if event.contract_addr != self.contract {
            debug!(event = %event.id, contract = %event.contract_addr, "event from other contract");
            return false;
        }
        match event.created_at() {
            Some(created_at) => created_at > horizon,
            None => {
                warn!(event = %event.id, created_at = %event.created_at, "unparsable event timestamp");
                false
            }
        }
    }

    fn dispatch(&self, event_id: &str, payload: EventPayload) -> Option<JoinHandle<()>> {
        let event_id = event_id.to_string();
        let token = payload.token;

        match payload.action {
            EventAction::Wager => {
                info!(event = %event_id, token = %token, "wager event accepted");
                let intake = self.intake.clone();
                Some(tokio::spawn(async move {
                    if let Err(e) = intake.open_job(&token).await {
                        warn!(event = %event_id, token = %token, error = %e, "wager intake failed");
                    }
                }))
            }
            EventAction::Matchmake => {
                info!(event = %event_id, token = %token, "matchmake event accepted");
                let announcer = self.announcer.clone();
                Some(tokio::spawn(async move {
                    if let Err(e) = announcer.announce(&token).await {
                        warn!(event = %event_id, token = %token, error = %e, "matchmake announcement failed");
                    }
                }))
            }
            EventAction::Other => {
                debug!(event = %event_id, "ignoring event action");
                None
            }
        }
    }
}
