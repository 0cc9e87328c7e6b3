//! Wager contract access.
//!
//! Reads go through `WagerReader` (smart queries: `wager`, `config`,
//! `token_status`). The settlement write goes through `SettlementSubmitter`
//! so the operator's signing identity stays behind one seam.
//!
//! Architecture:
//! - `lcd`: `WagerReader` over the CosmWasm LCD REST gateway
//! - `paper`: `SettlementSubmitter` that logs instead of broadcasting

pub mod lcd;
pub mod paper;

use crate::wager::{Job, Leg, PriceQuote, TokenRef, WagerTerms};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

pub use lcd::LcdWagerClient;
pub use paper::PaperSubmitter;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("chain request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("chain returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed contract response: {0}")]
    Decode(String),
    #[error("settlement rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait WagerReader: Send + Sync {
    /// Current terms of the wager the given token participates in.
    async fn wager(&self, token: &TokenRef) -> Result<WagerTerms, ChainError>;

    /// Contract configuration. Never cached: fees may change between calls.
    async fn config(&self) -> Result<ContractConfig, ChainError>;

    /// Matchmaking status of a token seeking an opponent.
    async fn token_status(&self, token: &TokenRef) -> Result<MatchmakingStatus, ChainError>;
}

#[async_trait]
pub trait SettlementSubmitter: Send + Sync {
    /// Submit `set_winner`. Returns only once the chain accepted the tx.
    async fn set_winner(&self, msg: &SetWinnerMsg) -> Result<TxReceipt, ChainError>;
}

/// Fixed fee attached to every settlement: zero amount, fixed gas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeSchedule {
    pub amount: u128,
    pub denom: String,
    pub gas: u64,
}

impl FeeSchedule {
    pub fn fixed(denom: impl Into<String>, gas: u64) -> Self {
        Self {
            amount: 0,
            denom: denom.into(),
            gas,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub height: Option<u64>,
}

// --- Query messages ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMsg {
    Wager { token: (String, u64) },
    Config {},
    TokenStatus { token: (String, u64) },
}

impl QueryMsg {
    pub fn wager(token: &TokenRef) -> Self {
        Self::Wager {
            token: (token.collection.clone(), token.token_id),
        }
    }

    pub fn token_status(token: &TokenRef) -> Self {
        Self::TokenStatus {
            token: (token.collection.clone(), token.token_id),
        }
    }
}

// --- Execute messages ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteMsg {
    SetWinner(SetWinnerMsg),
}

/// `set_winner` payload. Prices are decimal strings, all arrays in leg order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetWinnerMsg {
    pub wager_key: [(String, u64); 2],
    pub prev_prices: [String; 2],
    pub current_prices: [String; 2],
}

impl SetWinnerMsg {
    pub fn new(job: &Job, current: &[PriceQuote; 2]) -> Self {
        let [first, second] = job.terms().tokens();
        let baseline = job.baseline();
        Self {
            wager_key: [
                (first.collection.clone(), first.token_id),
                (second.collection.clone(), second.token_id),
            ],
            prev_prices: [baseline[0].price.to_string(), baseline[1].price.to_string()],
            current_prices: [current[0].price.to_string(), current[1].price.to_string()],
        }
    }

    pub fn into_execute(self) -> ExecuteMsg {
        ExecuteMsg::SetWinner(self)
    }
}

// --- Response wire types ---

#[derive(Debug, Deserialize)]
pub struct WagerResponse {
    pub wager: WagerExport,
}

#[derive(Debug, Deserialize)]
pub struct WagerExport {
    /// Uint128 as a string.
    pub amount: String,
    /// Timestamp in nanoseconds, as a string.
    pub expires_at: String,
    pub wagers: [WagerInfo; 2],
}

#[derive(Debug, Deserialize)]
pub struct WagerInfo {
    pub currency: String,
    pub token: TokenRef,
}

impl TryFrom<WagerExport> for WagerTerms {
    type Error = ChainError;

    fn try_from(export: WagerExport) -> Result<Self, Self::Error> {
        let amount = export
            .amount
            .parse::<u128>()
            .map_err(|e| ChainError::Decode(format!("amount {:?}: {e}", export.amount)))?;
        let expires_at = parse_timestamp_nanos(&export.expires_at)?;
        let [first, second] = export.wagers;
        Ok(WagerTerms {
            amount,
            expires_at,
            legs: [
                Leg {
                    currency: first.currency,
                    token: first.token,
                },
                Leg {
                    currency: second.currency,
                    token: second.token,
                },
            ],
        })
    }
}

fn parse_timestamp_nanos(raw: &str) -> Result<DateTime<Utc>, ChainError> {
    let nanos = raw
        .parse::<u64>()
        .map_err(|e| ChainError::Decode(format!("timestamp {raw:?}: {e}")))?;
    let secs = (nanos / 1_000_000_000) as i64;
    let subsec = (nanos % 1_000_000_000) as u32;
    DateTime::<Utc>::from_timestamp(secs, subsec)
        .ok_or_else(|| ChainError::Decode(format!("timestamp {raw:?} out of range")))
}

#[derive(Debug, Deserialize)]
pub struct ConfigResponse {
    pub config: ConfigExport,
}

#[derive(Debug, Deserialize)]
pub struct ConfigExport {
    pub fee_percent: String,
    pub fairburn_percent: String,
    #[serde(default)]
    pub fee_address: String,
    #[serde(default)]
    pub collection_address: String,
    #[serde(default)]
    pub max_currencies: u32,
    #[serde(default)]
    pub amounts: Vec<u128>,
    #[serde(default)]
    pub expiries: Vec<u64>,
    #[serde(default)]
    pub matchmaking_expiry: u64,
}

/// Contract configuration relevant to payouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractConfig {
    /// Percent of the pot taken as fee (e.g. 3 == 3%).
    pub fee_percent: Decimal,
    /// Percent of the pot burned.
    pub fairburn_percent: Decimal,
    pub fee_address: String,
    pub collection_address: String,
    pub matchmaking_expiry: u64,
}

impl TryFrom<ConfigExport> for ContractConfig {
    type Error = ChainError;

    fn try_from(export: ConfigExport) -> Result<Self, Self::Error> {
        let percent = |raw: &str| {
            Decimal::from_str(raw).map_err(|e| ChainError::Decode(format!("percent {raw:?}: {e}")))
        };
        Ok(ContractConfig {
            fee_percent: percent(&export.fee_percent)?,
            fairburn_percent: percent(&export.fairburn_percent)?,
            fee_address: export.fee_address,
            collection_address: export.collection_address,
            matchmaking_expiry: export.matchmaking_expiry,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenStatusResponse {
    pub matchmaking: MatchmakingExport,
}

#[derive(Debug, Deserialize)]
pub struct MatchmakingExport {
    pub currency: String,
    pub against_currencies: Vec<String>,
    pub amount: String,
    pub expiry: u64,
}

/// A token's open matchmaking request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchmakingStatus {
    pub currency: String,
    pub against_currencies: Vec<String>,
    pub amount: u128,
    /// Wager duration in seconds.
    pub expiry: u64,
}

impl TryFrom<MatchmakingExport> for MatchmakingStatus {
    type Error = ChainError;

    fn try_from(export: MatchmakingExport) -> Result<Self, Self::Error> {
        let amount = export
            .amount
            .parse::<u128>()
            .map_err(|e| ChainError::Decode(format!("amount {:?}: {e}", export.amount)))?;
        Ok(MatchmakingStatus {
            currency: export.currency,
            against_currencies: export.against_currencies,
            amount,
            expiry: export.expiry,
        })
    }
}
