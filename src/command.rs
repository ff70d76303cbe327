//! `exchange <N> [CCY...]` command handling.
//!
//! Every outcome is a reply string: rendered JSON on success, a readable
//! message for bad input, policy violations and total upstream failure.
//! Nothing here returns an error to the transport.

use std::num::IntErrorKind;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::aggregator::{compute_window, fetch_rates_for_window};
use crate::metrics::Metrics;
use crate::source::RateSource;
use crate::types::{CurrencySelector, DATE_FORMAT, MAX_DAYS};

/// Leading word that routes a message to [`ExchangeService`].
pub const COMMAND_PREFIX: &str = "exchange";

/// Reply for anything that isn't an exchange command.
pub const UNKNOWN_COMMAND: &str = "Unknown command";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Please give me a number! Error: {0}")]
    BadDayCount(String),

    #[error("Please give me a number! Error: missing day count")]
    MissingDayCount,

    #[error("Please give me a number! Error: day count can't be negative")]
    NegativeDayCount,

    #[error("Too much days, max is 10 days")]
    TooManyDays,
}

/// A parsed `exchange` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub num_days: u32,
    /// `None` means "use the configured defaults".
    pub currencies: Option<CurrencySelector>,
}

impl Command {
    /// Parse whitespace-separated `exchange <N> [CCY...]`.
    ///
    /// The leading word is not checked here; routing on it is the caller's job.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let mut tokens = text.split_whitespace().skip(1);

        let requested = match tokens.next().ok_or(CommandError::MissingDayCount)?.parse::<i64>() {
            Ok(n) => n,
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => return Err(CommandError::TooManyDays),
            Err(e) if *e.kind() == IntErrorKind::NegOverflow => return Err(CommandError::NegativeDayCount),
            Err(e) => return Err(CommandError::BadDayCount(e.to_string())),
        };
        if requested < 0 {
            return Err(CommandError::NegativeDayCount);
        }
        let num_days = u32::try_from(requested)
            .ok()
            .filter(|&n| n <= MAX_DAYS)
            .ok_or(CommandError::TooManyDays)?;

        let codes: Vec<&str> = tokens.collect();
        let currencies = (!codes.is_empty()).then(|| CurrencySelector::new(codes));

        Ok(Self { num_days, currencies })
    }
}

/// Whether `text` should be handled as an exchange command.
#[must_use]
pub fn is_exchange_command(text: &str) -> bool {
    text.starts_with(COMMAND_PREFIX)
}

/// Front end over the aggregator. Holds no per-query state.
pub struct ExchangeService<S> {
    source: S,
    default_currencies: CurrencySelector,
    metrics: Arc<Metrics>,
}

impl<S: RateSource> ExchangeService<S> {
    pub fn new(source: S, default_currencies: CurrencySelector, metrics: Arc<Metrics>) -> Self {
        Self {
            source,
            default_currencies,
            metrics,
        }
    }

    pub fn default_currencies(&self) -> &CurrencySelector {
        &self.default_currencies
    }

    /// Run one `exchange` command and produce its reply.
    pub async fn handle_exchange_command(&self, text: &str) -> String {
        let command = match Command::parse(text) {
            Ok(command) => command,
            Err(e) => {
                debug!(command = text, error = %e, "rejected command");
                return e.to_string();
            }
        };

        let window = compute_window(command.num_days);
        let currencies = command.currencies.as_ref().unwrap_or(&self.default_currencies);
        debug!(days = command.num_days, %currencies, "handling exchange command");

        let aggregation = fetch_rates_for_window(&self.source, &window, currencies, &self.metrics).await;

        if aggregation.is_total_failure() {
            let reasons: Vec<String> = aggregation
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.date.format(DATE_FORMAT), f.reason))
                .collect();
            warn!(command = text, "every date failed");
            return format!("Failed to fetch exchange rates: {}", reasons.join("; "));
        }

        match aggregation.rates.to_json_pretty() {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "failed to encode result");
                format!("Failed to encode exchange rates: {e}")
            }
        }
    }
}
