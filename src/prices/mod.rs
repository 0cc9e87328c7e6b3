//! Spot price lookups for wager currencies.
//!
//! The price service answers `GET {base}/{SYMBOL}` with `{symbol, price}`.
//! Symbols are upper-cased before the request.

use crate::wager::{PriceQuote, WagerTerms};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PriceError {
    #[error("price request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("price API returned status {status} for {symbol}")]
    Status { symbol: String, status: u16 },
    #[error("unparsable price {raw:?} for {symbol}")]
    InvalidPrice { symbol: String, raw: String },
    #[error("no price available for {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn quote(&self, symbol: &str) -> Result<PriceQuote, PriceError>;
}

/// Fetch quotes for both legs of a wager, in leg order.
pub async fn quote_legs(
    source: &dyn PriceSource,
    terms: &WagerTerms,
) -> Result<[PriceQuote; 2], PriceError> {
    let (first, second) = tokio::try_join!(
        source.quote(&terms.legs[0].currency),
        source.quote(&terms.legs[1].currency),
    )?;
    Ok([first, second])
}

/// Wire format of the price API.
#[derive(Debug, Deserialize)]
struct PriceResponse {
    symbol: String,
    price: serde_json::Number,
}

/// HTTP client for the price API.
#[derive(Clone)]
pub struct HttpPriceSource {
    base_url: String,
    http: Client,
}

impl HttpPriceSource {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, PriceError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn quote(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
        let symbol = symbol.to_uppercase();
        let url = format!("{}/{}", self.base_url, symbol);
        let resp = self.http.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(PriceError::Status {
                symbol,
                status: resp.status().as_u16(),
            });
        }

        let body: PriceResponse = resp.json().await?;
        let price = parse_price(&body.price).ok_or_else(|| PriceError::InvalidPrice {
            symbol: symbol.clone(),
            raw: body.price.to_string(),
        })?;

        debug!(symbol = %body.symbol, price = %price, "price quote");

        Ok(PriceQuote {
            symbol: body.symbol,
            price,
            observed_at: Utc::now(),
        })
    }
}

/// JSON numbers may come back in exponent form for very small prices.
fn parse_price(raw: &serde_json::Number) -> Option<Decimal> {
    let text = raw.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}
