//! Core domain types for windowed exchange-rate queries.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Largest day count a single query may cover.
pub const MAX_DAYS: u32 = 10;

/// Date format used both on the wire and as result keys (`DD.MM.YYYY`).
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// Inclusive run of calendar dates, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateWindow {
    dates: Vec<NaiveDate>,
}

impl DateWindow {
    /// `num_days + 1` consecutive dates ending on `today`.
    ///
    /// Dates that would fall before the start of the calendar are skipped,
    /// which cannot happen for any realistic `today`.
    #[must_use]
    pub fn ending_on(today: NaiveDate, num_days: u32) -> Self {
        let dates = (0..=u64::from(num_days))
            .rev()
            .filter_map(|back| today.checked_sub_days(Days::new(back)))
            .collect();
        Self { dates }
    }

    #[must_use]
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    #[must_use]
    pub fn contains(&self, date: &NaiveDate) -> bool {
        self.dates.contains(date)
    }

    pub fn iter(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.dates.iter().copied()
    }
}

/// Set of currency codes a caller wants pulled out of each day's rate list.
///
/// Membership only: codes are not checked against any known-currency list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencySelector(BTreeSet<String>);

impl CurrencySelector {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(codes.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromStr for CurrencySelector {
    type Err = String;

    /// Parses a comma-separated list such as `USD,EUR`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let selector = Self::new(
            s.split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty()),
        );
        if selector.is_empty() {
            return Err(format!("no currency codes in {s:?}"));
        }
        Ok(selector)
    }
}

impl fmt::Display for CurrencySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<&str> = self.iter().collect();
        f.write_str(&codes.join(","))
    }
}

/// Sale and purchase rate of one currency on one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateRecord {
    pub sale: f64,
    pub purchase: f64,
}

/// Rates for one date, keyed by currency code.
pub type DayRecords = BTreeMap<String, RateRecord>;

/// Date → currency → rates. Serializes with `DD.MM.YYYY` keys, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeResult(BTreeMap<NaiveDate, DayRecords>);

impl ExchangeResult {
    /// Store one date's rates, replacing anything already held for that date.
    pub fn insert_day(&mut self, date: NaiveDate, records: DayRecords) {
        self.0.insert(date, records);
    }

    #[must_use]
    pub fn get(&self, date: &NaiveDate) -> Option<&DayRecords> {
        self.0.get(date)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.0.keys().copied()
    }

    /// JSON with 2-space indentation.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for ExchangeResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (date, records) in &self.0 {
            map.serialize_entry(&date.format(DATE_FORMAT).to_string(), records)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Upstream wire format
// ---------------------------------------------------------------------------

/// One day's body from the exchange-rate endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DayRates {
    /// Date the upstream actually answered for, `DD.MM.YYYY`.
    #[serde(default)]
    pub date: String,
    /// Missing or `null` is treated as an empty list.
    #[serde(rename = "exchangeRate", default)]
    pub exchange_rate: Option<Vec<RateEntry>>,
}

impl DayRates {
    pub fn entries(&self) -> &[RateEntry] {
        self.exchange_rate.as_deref().unwrap_or_default()
    }
}

/// A single currency row. Every field is optional upstream.
#[derive(Debug, Clone, Deserialize)]
pub struct RateEntry {
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(rename = "saleRate", default)]
    pub sale_rate: Option<RateValue>,
    #[serde(rename = "purchaseRate", default)]
    pub purchase_rate: Option<RateValue>,
}

/// Rates show up as JSON numbers, occasionally as numeric strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RateValue {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl RateValue {
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Other(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32, m: u32, y: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_spans_num_days_plus_one() {
        let today = date(3, 3, 2024);
        for n in 0..=MAX_DAYS {
            let window = DateWindow::ending_on(today, n);
            assert_eq!(window.len(), n as usize + 1);
            assert_eq!(*window.dates().last().unwrap(), today);
            for pair in window.dates().windows(2) {
                assert_eq!(pair[0].succ_opt().unwrap(), pair[1]);
            }
        }
    }

    #[test]
    fn window_crosses_month_and_leap_day() {
        let window = DateWindow::ending_on(date(1, 3, 2024), 2);
        assert_eq!(
            window.dates(),
            &[date(28, 2, 2024), date(29, 2, 2024), date(1, 3, 2024)]
        );
    }

    #[test]
    fn selector_parses_comma_list() {
        let selector: CurrencySelector = "USD, EUR,,GBP".parse().unwrap();
        assert!(selector.contains("USD"));
        assert!(selector.contains("EUR"));
        assert!(selector.contains("GBP"));
        assert!(!selector.contains("usd"));
        assert_eq!(selector.to_string(), "EUR,GBP,USD");
    }

    #[test]
    fn selector_rejects_empty_list() {
        assert!(" , ".parse::<CurrencySelector>().is_err());
    }

    #[test]
    fn result_serializes_with_dotted_dates_oldest_first() {
        let mut result = ExchangeResult::default();
        let mut day = DayRecords::new();
        day.insert("USD".into(), RateRecord { sale: 39.5, purchase: 38.9 });
        result.insert_day(date(2, 1, 2024), day.clone());
        result.insert_day(date(31, 12, 2023), day);

        let json = result.to_json_pretty().unwrap();
        let first = json.find("31.12.2023").unwrap();
        let second = json.find("02.01.2024").unwrap();
        assert!(first < second);
        assert!(json.contains("\n  \"31.12.2023\": {\n    \"USD\": {\n      \"sale\": 39.5,"));
    }

    #[test]
    fn day_rates_tolerates_missing_fields() {
        let day: DayRates = serde_json::from_str(
            r#"{"date":"01.12.2014","exchangeRate":[
                {"baseCurrency":"UAH","saleRateNB":15.05},
                {"currency":"USD","saleRate":"15.7","purchaseRate":15.35},
                {"currency":"CHF","saleRateNB":15.6}
            ]}"#,
        )
        .unwrap();
        let entries = day.entries();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].currency.is_none());
        assert_eq!(entries[1].sale_rate.as_ref().and_then(RateValue::as_f64), Some(15.7));
        assert_eq!(entries[1].purchase_rate.as_ref().and_then(RateValue::as_f64), Some(15.35));
        assert!(entries[2].sale_rate.is_none());

        let empty: DayRates = serde_json::from_str(r#"{"date":"01.12.2014","exchangeRate":null}"#).unwrap();
        assert!(empty.entries().is_empty());
    }

    #[test]
    fn rate_value_rejects_non_numeric() {
        let v: RateValue = serde_json::from_str("true").unwrap();
        assert_eq!(v.as_f64(), None);
        let v: RateValue = serde_json::from_str("\"n/a\"").unwrap();
        assert_eq!(v.as_f64(), None);
    }
}
