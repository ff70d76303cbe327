//! Exchange-rate window aggregator.
//!
//! Pulls PrivatBank archive rates for each day of a bounded window and serves
//! the folded result either as a one-shot JSON dump or over a WebSocket chat
//! (`exchange <N> [CCY...]`).

pub mod aggregator;
pub mod chat_log;
pub mod command;
pub mod config;
pub mod error;
pub mod metrics;
pub mod server;
pub mod source;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;
