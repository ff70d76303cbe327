//! PrivatBank archive rates adapter (`p24api/exchange_rates`).

use std::time::Duration;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::Result;
use crate::types::{DATE_FORMAT, DayRates};

use super::RateSource;

pub const DEFAULT_API_URL: &str = "https://api.privatbank.ua/p24api/exchange_rates";

/// HTTP client for the PrivatBank archive endpoint.
///
/// The inner `reqwest::Client` pools connections, so one instance serves
/// every request of every query.
pub struct PrivatBank {
    client: reqwest::Client,
    api_url: String,
}

impl PrivatBank {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_url))
    }

    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    /// `{api_url}?json&date=DD.MM.YYYY`
    #[must_use]
    pub fn day_url(&self, date: NaiveDate) -> String {
        format!("{}?json&date={}", self.api_url, date.format(DATE_FORMAT))
    }
}

impl RateSource for PrivatBank {
    async fn fetch_day(&self, date: NaiveDate) -> Result<DayRates> {
        let url = self.day_url(date);
        debug!(source = "privatbank", %url, "fetching day");

        let day = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<DayRates>()
            .await?;
        Ok(day)
    }
}
