//! In-memory fakes for the external collaborators, shared by unit tests.

use crate::chain::{
    ChainError, ContractConfig, MatchmakingStatus, SetWinnerMsg, SettlementSubmitter, TxReceipt,
    WagerReader,
};
use crate::indexer::{EventSource, IndexerError, IndexerEvent};
use crate::notify::{Notifier, NotifyError, WebhookMessage};
use crate::prices::{PriceError, PriceSource};
use crate::scheduler::JobSettler;
use crate::wager::{Job, JobKey, Leg, PriceQuote, TokenRef, WagerTerms};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const COLLECTION: &str = "stars1wizards";

pub fn terms_with(a: u64, b: u64, currencies: [&str; 2]) -> WagerTerms {
    WagerTerms {
        amount: 5_000_000,
        expires_at: Utc::now() + Duration::seconds(30),
        legs: [
            Leg {
                currency: currencies[0].to_string(),
                token: TokenRef::new(COLLECTION, a),
            },
            Leg {
                currency: currencies[1].to_string(),
                token: TokenRef::new(COLLECTION, b),
            },
        ],
    }
}

/// Wager between tokens `a` (atom) and `b` (osmo).
pub fn terms(a: u64, b: u64) -> WagerTerms {
    terms_with(a, b, ["atom", "osmo"])
}

pub fn quote(symbol: &str, price: Decimal) -> PriceQuote {
    PriceQuote {
        symbol: symbol.to_uppercase(),
        price,
        observed_at: Utc::now(),
    }
}

pub fn job_with(a: u64, b: u64, currencies: [&str; 2], pa: Decimal, pb: Decimal) -> Job {
    Job::new(
        terms_with(a, b, currencies),
        [quote(currencies[0], pa), quote(currencies[1], pb)],
    )
}

pub fn job(a: u64, b: u64, pa: Decimal, pb: Decimal) -> Job {
    job_with(a, b, ["atom", "osmo"], pa, pb)
}

pub fn contract_config() -> ContractConfig {
    ContractConfig {
        fee_percent: dec!(3),
        fairburn_percent: dec!(2),
        fee_address: "stars1fees".to_string(),
        collection_address: COLLECTION.to_string(),
        matchmaking_expiry: 3600,
    }
}

/// Price source backed by a symbol map. Symbols are matched upper-cased.
#[derive(Default)]
pub struct FakePrices {
    prices: Mutex<HashMap<String, Decimal>>,
    fail_next: AtomicUsize,
    calls: AtomicUsize,
}

impl FakePrices {
    pub fn new(prices: &[(&str, Decimal)]) -> Arc<Self> {
        let fake = Self::default();
        for (symbol, price) in prices {
            fake.set(symbol, *price);
        }
        Arc::new(fake)
    }

    pub fn set(&self, symbol: &str, price: Decimal) {
        self.prices
            .lock()
            .unwrap()
            .insert(symbol.to_uppercase(), price);
    }

    /// Fail the next `n` quote calls regardless of symbol.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for FakePrices {
    async fn quote(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let symbol = symbol.to_uppercase();

        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PriceError::Unavailable(symbol));
        }

        let price = self.prices.lock().unwrap().get(&symbol).copied();
        match price {
            Some(price) => Ok(quote(&symbol, price)),
            None => Err(PriceError::Unavailable(symbol)),
        }
    }
}

/// Chain reader answering from fixed tables.
#[derive(Default)]
pub struct FakeReader {
    wagers: Mutex<HashMap<u64, WagerTerms>>,
    statuses: Mutex<HashMap<u64, MatchmakingStatus>>,
    config: Mutex<Option<ContractConfig>>,
    wager_reads: AtomicUsize,
}

impl FakeReader {
    pub fn new() -> Arc<Self> {
        let fake = Self::default();
        *fake.config.lock().unwrap() = Some(contract_config());
        Arc::new(fake)
    }

    /// Make `terms` readable through either participant.
    pub fn add_wager(&self, terms: WagerTerms) {
        let mut wagers = self.wagers.lock().unwrap();
        for token in terms.tokens() {
            wagers.insert(token.token_id, terms.clone());
        }
    }

    pub fn add_status(&self, token_id: u64, status: MatchmakingStatus) {
        self.statuses.lock().unwrap().insert(token_id, status);
    }

    /// Make `config()` fail from now on.
    pub fn drop_config(&self) {
        *self.config.lock().unwrap() = None;
    }

    pub fn wager_reads(&self) -> usize {
        self.wager_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WagerReader for FakeReader {
    async fn wager(&self, token: &TokenRef) -> Result<WagerTerms, ChainError> {
        self.wager_reads.fetch_add(1, Ordering::SeqCst);
        self.wagers
            .lock()
            .unwrap()
            .get(&token.token_id)
            .cloned()
            .ok_or_else(|| ChainError::Decode(format!("no wager for {token}")))
    }

    async fn config(&self) -> Result<ContractConfig, ChainError> {
        self.config
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ChainError::Decode("no config".to_string()))
    }

    async fn token_status(&self, token: &TokenRef) -> Result<MatchmakingStatus, ChainError> {
        self.statuses
            .lock()
            .unwrap()
            .get(&token.token_id)
            .cloned()
            .ok_or_else(|| ChainError::Decode(format!("no matchmaking for {token}")))
    }
}

/// Submitter that records every `set_winner` it receives.
#[derive(Default)]
pub struct RecordingSubmitter {
    submitted: Mutex<Vec<SetWinnerMsg>>,
    reject: AtomicBool,
}

impl RecordingSubmitter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn submitted(&self) -> Vec<SetWinnerMsg> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl SettlementSubmitter for RecordingSubmitter {
    async fn set_winner(&self, msg: &SetWinnerMsg) -> Result<TxReceipt, ChainError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(ChainError::Rejected("out of gas".to_string()));
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(msg.clone());
        Ok(TxReceipt {
            tx_hash: format!("tx-{}", submitted.len()),
            height: Some(100),
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    posted: Mutex<Vec<WebhookMessage>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn posted(&self) -> Vec<WebhookMessage> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn post(&self, msg: &WebhookMessage) -> Result<(), NotifyError> {
        self.posted.lock().unwrap().push(msg.clone());
        Ok(())
    }
}

/// Indexer returning the same batch on every call.
#[derive(Default)]
pub struct FakeEventSource {
    events: Mutex<Vec<IndexerEvent>>,
    fail: AtomicBool,
}

impl FakeEventSource {
    pub fn new(events: Vec<IndexerEvent>) -> Arc<Self> {
        let fake = Self::default();
        *fake.events.lock().unwrap() = events;
        Arc::new(fake)
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventSource for FakeEventSource {
    async fn recent_events(&self) -> Result<Vec<IndexerEvent>, IndexerError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(IndexerError::Status(503));
        }
        Ok(self.events.lock().unwrap().clone())
    }
}

/// Indexer event for the wager contract `stars1wager`.
pub fn event(id: &str, created_at: DateTime<Utc>, data: serde_json::Value) -> IndexerEvent {
    IndexerEvent {
        id: id.to_string(),
        contract_addr: "stars1wager".to_string(),
        created_at: created_at.to_rfc3339(),
        data,
    }
}

/// Settler that records the keys it was handed.
#[derive(Default)]
pub struct RecordingSettler {
    settled: Mutex<Vec<JobKey>>,
}

impl RecordingSettler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn settled(&self) -> Vec<JobKey> {
        self.settled.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobSettler for RecordingSettler {
    async fn settle_job(&self, job: Job) {
        self.settled.lock().unwrap().push(job.key().clone());
    }
}
