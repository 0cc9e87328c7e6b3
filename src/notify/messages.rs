//! Webhook message builders for settlement results and matchmaking requests.

use crate::chain::{ContractConfig, MatchmakingStatus};
use crate::notify::{Embed, EmbedAuthor, EmbedField, EmbedFooter, WebhookMessage};
use crate::wager::{TokenRef, WagerTerms};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

const SETTLED_COLOR: u32 = 65392;
const MATCHMAKING_COLOR: u32 = 4276735;

/// Micro-denom to display units.
const DENOM_SCALE: u32 = 6;

/// Presentation settings shared by all messages.
#[derive(Debug, Clone)]
pub struct MessageStyle {
    /// Display name prefix for participant tokens, e.g. "Wizard".
    pub display_name: String,
    /// Base URL of the token images; `{base}/{token_id}.png`.
    pub avatar_base_url: String,
    /// Front-end page that opens a pre-filled wager.
    pub matchmake_url: String,
    /// Coin ticker shown next to amounts.
    pub coin: String,
}

/// How a settled pot is distributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
    pub pot: Decimal,
    pub fee: Decimal,
    pub burn: Decimal,
    pub payout: Decimal,
}

impl FeeSplit {
    /// `amount` is the per-side stake in micro-denom. Percentages come from the
    /// contract config read at settlement time.
    pub fn compute(amount: u128, config: &ContractConfig) -> Option<Self> {
        let hundred = Decimal::ONE_HUNDRED;
        let pot = to_display(amount)?.checked_mul(Decimal::TWO)?;
        let burn = config.fairburn_percent.checked_div(hundred)?.checked_mul(pot)?;
        let fee = config.fee_percent.checked_div(hundred)?.checked_mul(pot)?;
        let payout = pot.checked_sub(burn)?.checked_sub(fee)?;
        Some(Self {
            pot,
            fee,
            burn,
            payout,
        })
    }
}

fn to_display(amount: u128) -> Option<Decimal> {
    let amount = i128::try_from(amount).ok()?;
    Decimal::try_from_i128_with_scale(amount, DENOM_SCALE).ok()
}

fn coins(value: Decimal, coin: &str) -> String {
    format!("{} ${}", value.normalize(), coin)
}

pub fn settlement_message(
    terms: &WagerTerms,
    winner: Option<&TokenRef>,
    split: &FeeSplit,
    style: &MessageStyle,
) -> WebhookMessage {
    let [first, second] = terms.tokens();
    let winner = winner
        .map(|token| token.to_string())
        .unwrap_or_else(|| "Draw".to_string());

    WebhookMessage {
        username: None,
        avatar_url: None,
        embeds: vec![Embed {
            title: format!("A duel between {first} and {second} is over"),
            color: SETTLED_COLOR,
            fields: vec![
                EmbedField::new("Winner", winner),
                EmbedField::inline("Wager", coins(split.payout, &style.coin)),
                EmbedField::inline("Fee", coins(split.fee, &style.coin)),
                EmbedField::inline("Fair Burn", coins(split.burn, &style.coin)),
            ],
            author: Some(EmbedAuthor {
                name: "MATCH CONCLUDED  ✅".to_string(),
                url: None,
            }),
            footer: None,
            timestamp: None,
        }],
    }
}

pub fn matchmaking_message(
    token: &TokenRef,
    status: &MatchmakingStatus,
    style: &MessageStyle,
    now: DateTime<Utc>,
) -> WebhookMessage {
    let ticker = |currency: &str| format!("${}", currency.to_uppercase());
    let versus = status
        .against_currencies
        .iter()
        .map(|c| ticker(c.as_str()))
        .collect::<Vec<_>>()
        .join(" ");
    let opponent = status
        .against_currencies
        .first()
        .map(String::as_str)
        .unwrap_or_default();
    let minutes = (Decimal::from(status.expiry) / Decimal::from(60)).normalize();
    let amount = to_display(status.amount)
        .map(|amount| coins(amount, &style.coin))
        .unwrap_or_else(|| format!("{} micro-${}", status.amount, style.coin));

    WebhookMessage {
        username: Some(format!("{} {}", style.display_name, token)),
        avatar_url: Some(format!(
            "{}/{}.png",
            style.avatar_base_url.trim_end_matches('/'),
            token.token_id
        )),
        embeds: vec![Embed {
            title: "I am seeking an opponent!".to_string(),
            color: MATCHMAKING_COLOR,
            fields: vec![
                EmbedField::new("Wizard's token", ticker(status.currency.as_str())),
                EmbedField::inline("Versus", versus),
                EmbedField::inline("💰", amount),
                EmbedField::inline("⏰", format!("{minutes} minutes")),
            ],
            author: Some(EmbedAuthor {
                name: "CLICK HERE TO MATCHMAKE 🪄".to_string(),
                url: Some(format!(
                    "{}?currency={}&amount={}&expiry={}&wizard_currency={}",
                    style.matchmake_url, status.currency, status.amount, status.expiry, opponent
                )),
            }),
            footer: Some(EmbedFooter {
                text: "I dare you  🫵".to_string(),
            }),
            timestamp: Some(now),
        }],
    }
}
