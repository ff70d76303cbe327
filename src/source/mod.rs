//! Upstream exchange-rate sources.
//!
//! A source answers one question: what were the bank's rates on a given
//! date. Fan-out across a window and folding the answers live in
//! [`crate::aggregator`].

pub mod privatbank;

use chrono::NaiveDate;

use crate::error::Result;
use crate::types::DayRates;

/// Trait implemented by each upstream adapter.
pub trait RateSource: Send + Sync + 'static {
    /// Fetch the full rate list for `date`.
    ///
    /// One request per call. Implementations must not retry; any transport,
    /// status or decode failure is returned as an error for that date only.
    fn fetch_day(&self, date: NaiveDate) -> impl std::future::Future<Output = Result<DayRates>> + Send;
}
