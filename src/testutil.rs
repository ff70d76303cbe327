//! Shared test fixtures and helpers.
//!
//! Provides a scripted [`RateSource`] and PrivatBank JSON fixtures so unit
//! tests across modules don't each roll their own.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};

use chrono::{Days, NaiveDate};

use crate::error::{Error, Result};
use crate::source::RateSource;
use crate::types::{DATE_FORMAT, DayRates, RateEntry, RateValue};

/// `DayRates` for `date` with `(currency, sale, purchase)` rows.
pub(crate) fn day_rates(date: &str, rows: &[(&str, f64, f64)]) -> DayRates {
    DayRates {
        date: date.to_owned(),
        exchange_rate: Some(
            rows.iter()
                .map(|&(currency, sale, purchase)| RateEntry {
                    currency: Some(currency.to_owned()),
                    sale_rate: Some(RateValue::Number(sale)),
                    purchase_rate: Some(RateValue::Number(purchase)),
                })
                .collect(),
        ),
    }
}

/// Answers every date with fixed USD/EUR/GBP rates unless told otherwise.
#[derive(Default)]
pub(crate) struct StubSource {
    failing: HashSet<NaiveDate>,
    empty: HashSet<NaiveDate>,
    misdated: HashSet<NaiveDate>,
    calls: AtomicUsize,
}

impl StubSource {
    /// Requests for `date` fail at the transport layer.
    pub(crate) fn failing_on(mut self, date: NaiveDate) -> Self {
        self.failing.insert(date);
        self
    }

    /// `date` answers with no `exchangeRate` list.
    pub(crate) fn empty_on(mut self, date: NaiveDate) -> Self {
        self.empty.insert(date);
        self
    }

    /// `date` answers claiming to be a year later.
    pub(crate) fn misdated_on(mut self, date: NaiveDate) -> Self {
        self.misdated.insert(date);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Relaxed)
    }
}

impl RateSource for StubSource {
    async fn fetch_day(&self, date: NaiveDate) -> Result<DayRates> {
        self.calls.fetch_add(1, Relaxed);

        if self.failing.contains(&date) {
            return Err(Error::Io(std::io::Error::other("connection reset")));
        }
        let mut answered = date;
        if self.misdated.contains(&date) {
            answered = date + Days::new(365);
        }
        let label = answered.format(DATE_FORMAT).to_string();
        if self.empty.contains(&date) {
            return Ok(DayRates {
                date: label,
                exchange_rate: None,
            });
        }
        Ok(day_rates(
            &label,
            &[("USD", 39.5, 38.9), ("EUR", 42.3, 41.5), ("GBP", 49.0, 48.1)],
        ))
    }
}

// ---------------------------------------------------------------------------
// Shared JSON fixtures
// ---------------------------------------------------------------------------

/// Trimmed archive body (real field layout: a UAH base row, NB-only rows).
pub(crate) const PRIVATBANK_JSON: &str = r#"{"date":"01.12.2014","bank":"PB","baseCurrency":980,"baseCurrencyLit":"UAH","exchangeRate":[{"baseCurrency":"UAH","saleRateNB":12.8319250,"purchaseRateNB":12.8319250},{"baseCurrency":"UAH","currency":"CHF","saleRateNB":15.6389750,"purchaseRateNB":15.6389750},{"baseCurrency":"UAH","currency":"EUR","saleRateNB":18.7949200,"purchaseRateNB":18.7949200,"saleRate":20.0000000,"purchaseRate":19.2000000},{"baseCurrency":"UAH","currency":"USD","saleRateNB":15.0564130,"purchaseRateNB":15.0564130,"saleRate":15.7000000,"purchaseRate":15.3500000}]}"#;
