//! Wager settlement agent.
//!
//! Watches the chain indexer for wager events, captures baseline prices,
//! schedules settlement at expiry and submits the winner on-chain.
//!
//! Architecture:
//! - `poller`: indexer polling, dedup and event intake
//! - `registry`: in-memory jobs keyed by participant pair
//! - `scheduler`: one delayed timer per job
//! - `executor`: price re-read, winner decision, `set_winner` submission
//! - `chain`, `prices`, `indexer`, `notify`: external collaborators
//! - `dashboard`: read-only HTTP views

pub mod chain;
pub mod config;
pub mod dashboard;
pub mod executor;
pub mod indexer;
pub mod notify;
pub mod poller;
pub mod prices;
pub mod registry;
pub mod scheduler;
pub mod wager;

#[cfg(test)]
mod test_support;
