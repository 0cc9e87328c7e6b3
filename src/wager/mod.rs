//! Wager domain types shared by the poller, registry, scheduler and executor.
//!
//! A wager always has exactly two legs. Each leg pairs a tracked currency with
//! the participant token that backs it. Jobs are keyed by the unordered pair of
//! participant tokens so either side can be used to find them.

pub mod outcome;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// On-chain identity of a participant token (`{collection, token_id}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenRef {
    pub collection: String,
    pub token_id: u64,
}

impl TokenRef {
    pub fn new(collection: impl Into<String>, token_id: u64) -> Self {
        Self {
            collection: collection.into(),
            token_id,
        }
    }
}

impl std::fmt::Display for TokenRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.token_id)
    }
}

/// One side of a wager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leg {
    pub currency: String,
    pub token: TokenRef,
}

/// Terms of a wager as read from the contract. Never mutated after the read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WagerTerms {
    /// Stake per side, in micro-denom units.
    pub amount: u128,
    pub expires_at: DateTime<Utc>,
    pub legs: [Leg; 2],
}

impl WagerTerms {
    pub fn tokens(&self) -> [&TokenRef; 2] {
        [&self.legs[0].token, &self.legs[1].token]
    }
}

/// A price observation for one currency symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    #[serde(rename = "denom")]
    pub symbol: String,
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
}

/// Order-independent key over the two participant tokens of a wager.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    low: TokenRef,
    high: TokenRef,
}

impl JobKey {
    pub fn new(a: TokenRef, b: TokenRef) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn for_terms(terms: &WagerTerms) -> Self {
        Self::new(terms.legs[0].token.clone(), terms.legs[1].token.clone())
    }

    pub fn contains_token(&self, token_id: u64) -> bool {
        self.low.token_id == token_id || self.high.token_id == token_id
    }

    pub fn tokens(&self) -> [&TokenRef; 2] {
        [&self.low, &self.high]
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.low, self.high)
    }
}

/// A wager awaiting settlement, with the baseline prices captured when it was
/// discovered. Fields are read-only once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    key: JobKey,
    terms: WagerTerms,
    baseline: [PriceQuote; 2],
}

impl Job {
    /// `baseline` is in leg order.
    pub fn new(terms: WagerTerms, baseline: [PriceQuote; 2]) -> Self {
        Self {
            key: JobKey::for_terms(&terms),
            terms,
            baseline,
        }
    }

    pub fn key(&self) -> &JobKey {
        &self.key
    }

    pub fn terms(&self) -> &WagerTerms {
        &self.terms
    }

    pub fn baseline(&self) -> &[PriceQuote; 2] {
        &self.baseline
    }
}
