//! Date-window rate aggregation.
//!
//! Fans out one upstream request per date, waits for all of them, and folds
//! each answer into an [`ExchangeResult`]. Every request's outcome is captured
//! on its own: a date that fails lands in [`Aggregation::failures`] and the
//! remaining dates still make it into the result.
//!
//! Each date is folded into a fresh map. Nothing from one date's answer (or
//! one query's selector) can bleed into another.

use std::sync::atomic::Ordering::Relaxed;
use std::time::Instant;

use chrono::{Local, NaiveDate};
use futures_util::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::metrics::Metrics;
use crate::source::RateSource;
use crate::types::{
    CurrencySelector, DATE_FORMAT, DateWindow, DayRates, DayRecords, ExchangeResult, RateRecord,
    RateValue,
};

/// Why a requested date produced no entry in the result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// The upstream answered, but for a date outside the requested window.
    #[error("upstream answered for unrequested date {returned:?}")]
    UnexpectedDate { returned: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFailure {
    /// The date that was asked for.
    pub date: NaiveDate,
    pub reason: FailureReason,
}

/// Output of one window query: the rates plus a per-date failure report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub rates: ExchangeResult,
    pub failures: Vec<DateFailure>,
}

impl Aggregation {
    /// True when dates were requested and none of them produced rates.
    #[must_use]
    pub fn is_total_failure(&self) -> bool {
        self.rates.is_empty() && !self.failures.is_empty()
    }
}

/// `num_days + 1` consecutive dates ending today (local time), oldest first.
///
/// Callers enforce the day-count policy; this only does the calendar math.
#[must_use]
pub fn compute_window(num_days: u32) -> DateWindow {
    DateWindow::ending_on(Local::now().date_naive(), num_days)
}

/// Fetch every date of `window` concurrently and fold the answers.
pub async fn fetch_rates_for_window<S: RateSource>(
    source: &S,
    window: &DateWindow,
    currencies: &CurrencySelector,
    metrics: &Metrics,
) -> Aggregation {
    let started = Instant::now();

    let requests = window.iter().map(|date| async move {
        let t0 = Instant::now();
        let outcome = source.fetch_day(date).await;
        metrics.upstream_latency.record(t0.elapsed());
        (date, outcome)
    });
    let responses = join_all(requests).await;

    let mut aggregation = Aggregation::default();
    for (date, outcome) in responses {
        metrics.upstream_requests.fetch_add(1, Relaxed);

        let folded = match outcome {
            Ok(day) => fold_day(&day, window, currencies),
            Err(e) => Err(FailureReason::Upstream(e.to_string())),
        };

        match folded {
            Ok((answered, records)) => aggregation.rates.insert_day(answered, records),
            Err(reason) => {
                metrics.upstream_errors.fetch_add(1, Relaxed);
                warn!(date = %date.format(DATE_FORMAT), %reason, "no rates for date");
                aggregation.failures.push(DateFailure { date, reason });
            }
        }
    }

    info!(
        requested = window.len(),
        dates = aggregation.rates.len(),
        failures = aggregation.failures.len(),
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "window fetched"
    );
    aggregation
}

/// Fold one upstream answer into a fresh per-date map.
///
/// The answer is keyed by the date the upstream reports, which must be one of
/// the window's dates. Rows for currencies outside the selector, rows missing a
/// code, and rows without a usable sale or purchase rate are skipped. An empty
/// or missing rate list yields an empty map for that date.
pub fn fold_day(
    day: &DayRates,
    window: &DateWindow,
    currencies: &CurrencySelector,
) -> Result<(NaiveDate, DayRecords), FailureReason> {
    let answered = NaiveDate::parse_from_str(day.date.trim(), DATE_FORMAT)
        .ok()
        .filter(|d| window.contains(d))
        .ok_or_else(|| FailureReason::UnexpectedDate {
            returned: day.date.clone(),
        })?;

    let mut records = DayRecords::new();
    for entry in day.entries() {
        let Some(code) = entry.currency.as_deref() else {
            continue;
        };
        if !currencies.contains(code) {
            continue;
        }

        let sale = entry.sale_rate.as_ref().and_then(RateValue::as_f64);
        let purchase = entry.purchase_rate.as_ref().and_then(RateValue::as_f64);
        let (Some(sale), Some(purchase)) = (sale, purchase) else {
            debug!(date = %day.date, currency = code, "skipping row without sale/purchase rate");
            continue;
        };
        records.insert(code.to_owned(), RateRecord { sale, purchase });
    }

    Ok((answered, records))
}
