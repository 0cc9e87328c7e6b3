//! Paper-mode settlement submitter.
//!
//! Logs the `set_winner` message and fee it would broadcast and reports
//! success. A signing submitter for the operator wallet plugs in behind the
//! same `SettlementSubmitter` trait.

use crate::chain::{ChainError, FeeSchedule, SetWinnerMsg, SettlementSubmitter, TxReceipt};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

pub struct PaperSubmitter {
    contract: String,
    sender: String,
    fee: FeeSchedule,
    submitted: AtomicU64,
}

impl PaperSubmitter {
    pub fn new(contract: String, sender: String, fee: FeeSchedule) -> Self {
        Self {
            contract,
            sender,
            fee,
            submitted: AtomicU64::new(0),
        }
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettlementSubmitter for PaperSubmitter {
    async fn set_winner(&self, msg: &SetWinnerMsg) -> Result<TxReceipt, ChainError> {
        let execute = serde_json::to_string(&msg.clone().into_execute())
            .map_err(|e| ChainError::Decode(e.to_string()))?;
        let n = self.submitted.fetch_add(1, Ordering::SeqCst) + 1;

        info!(
            contract = %self.contract,
            sender = %self.sender,
            msg = %execute,
            fee_amount = %self.fee.amount,
            fee_denom = %self.fee.denom,
            gas = self.fee.gas,
            "SETTLEMENT PAPER TX"
        );

        Ok(TxReceipt {
            tx_hash: format!("paper-{n}"),
            height: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_paper_submitter_counts_submissions() {
        let submitter = PaperSubmitter::new(
            "stars1wager".to_string(),
            "stars1operator".to_string(),
            FeeSchedule::fixed("ustars", 666_666),
        );
        let msg = SetWinnerMsg {
            wager_key: [("c".to_string(), 1), ("c".to_string(), 2)],
            prev_prices: ["1".to_string(), "2".to_string()],
            current_prices: ["1".to_string(), "3".to_string()],
        };

        let receipt = submitter.set_winner(&msg).await.unwrap();
        assert_eq!(receipt.tx_hash, "paper-1");
        let receipt = submitter.set_winner(&msg).await.unwrap();
        assert_eq!(receipt.tx_hash, "paper-2");
        assert_eq!(submitter.submitted(), 2);
    }
}
