//! Winner determination.
//!
//! Both the dashboard projection and the on-chain settlement use this module,
//! so a wager can never show one leader and settle with another.
//!
//! Each leg's change is `current / baseline - 1`. The leg with the strictly
//! greater change leads; equal changes mean no winner.

use crate::wager::{PriceQuote, TokenRef, WagerTerms};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutcomeError {
    #[error("baseline price for {0} is zero")]
    ZeroBaseline(String),
    #[error("price change for {0} overflows")]
    Overflow(String),
}

/// Relative change of one leg since its baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegChange {
    #[serde(rename = "denom")]
    pub symbol: String,
    pub change: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub changes: [LegChange; 2],
    pub winner: Option<TokenRef>,
}

/// Fractional change from `baseline` to `current` (0.1 == +10%).
pub fn relative_change(baseline: Decimal, current: Decimal) -> Option<Decimal> {
    if baseline.is_zero() {
        return None;
    }
    current
        .checked_div(baseline)
        .and_then(|ratio| ratio.checked_sub(Decimal::ONE))
}

/// Compare baseline and current quotes (both in leg order) and pick a leader.
pub fn decide(
    terms: &WagerTerms,
    baseline: &[PriceQuote; 2],
    current: &[PriceQuote; 2],
) -> Result<Outcome, OutcomeError> {
    let first = leg_change(&baseline[0], &current[0])?;
    let second = leg_change(&baseline[1], &current[1])?;

    let winner = if first.change > second.change {
        Some(terms.legs[0].token.clone())
    } else if second.change > first.change {
        Some(terms.legs[1].token.clone())
    } else {
        None
    };

    Ok(Outcome {
        changes: [first, second],
        winner,
    })
}

fn leg_change(baseline: &PriceQuote, current: &PriceQuote) -> Result<LegChange, OutcomeError> {
    if baseline.price.is_zero() {
        return Err(OutcomeError::ZeroBaseline(baseline.symbol.clone()));
    }
    let change = relative_change(baseline.price, current.price)
        .ok_or_else(|| OutcomeError::Overflow(current.symbol.clone()))?;
    Ok(LegChange {
        symbol: current.symbol.clone(),
        change,
    })
}
