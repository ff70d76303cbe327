//! CLI configuration via clap.

use std::time::Duration;

use clap::Parser;

use crate::chat_log::DEFAULT_LOG_FILE;
use crate::source::privatbank::DEFAULT_API_URL;
use crate::types::CurrencySelector;

/// What the process does once configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Run the WebSocket chat listener until terminated.
    Listen,
    /// Print one query for the given day count and exit.
    Once(u32),
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    if s == "exchange" {
        return Ok(Mode::Listen);
    }
    s.parse::<u32>()
        .map(Mode::Once)
        .map_err(|e| format!("expected `exchange` or a day count, got {s:?}: {e}"))
}

#[derive(Parser, Debug, Clone)]
#[command(name = "rate-aggregator")]
#[command(about = "Fetches PrivatBank exchange rates for the last N days, once or over a WebSocket chat")]
pub struct Config {
    /// `exchange` to start the chat listener, or a day count for a one-shot query
    #[arg(value_name = "MODE", default_value = "5", value_parser = parse_mode)]
    pub mode: Mode,

    /// Listener host
    #[arg(long, env = "RATES_HOST", default_value = "localhost")]
    pub host: String,

    /// Listener port
    #[arg(short, long, env = "RATES_PORT", default_value = "8765")]
    pub port: u16,

    /// Exchange-rate endpoint; `?json&date=DD.MM.YYYY` is appended per request
    #[arg(long, env = "RATES_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Comma-separated currency codes used when a command names none
    #[arg(short, long, env = "RATES_CURRENCIES", default_value = "USD,EUR")]
    pub currencies: CurrencySelector,

    /// Append-only log of handled commands
    #[arg(long, env = "RATES_LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    pub log_file: String,

    /// Serve /health and /metrics on this port (listener mode only)
    #[arg(long, env = "RATES_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, env = "RATES_REQUEST_TIMEOUT_SECS", default_value = "10")]
    pub request_timeout_secs: u64,
}

impl Config {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_five_day_query() {
        let config = Config::try_parse_from(["rate-aggregator"]).unwrap();
        assert_eq!(config.mode, Mode::Once(5));
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 8765);
        assert_eq!(config.currencies, CurrencySelector::new(["USD", "EUR"]));
        assert_eq!(config.log_file, "chat_log.txt");
        assert_eq!(config.metrics_port, None);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn exchange_selects_listener() {
        let config = Config::try_parse_from(["rate-aggregator", "exchange"]).unwrap();
        assert_eq!(config.mode, Mode::Listen);
    }

    #[test]
    fn day_count_and_overrides() {
        let config = Config::try_parse_from([
            "rate-aggregator",
            "3",
            "--currencies",
            "GBP,PLN",
            "--metrics-port",
            "9100",
        ])
        .unwrap();
        assert_eq!(config.mode, Mode::Once(3));
        assert!(config.currencies.contains("PLN"));
        assert!(!config.currencies.contains("USD"));
        assert_eq!(config.metrics_port, Some(9100));
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(Config::try_parse_from(["rate-aggregator", "listen"]).is_err());
        assert!(Config::try_parse_from(["rate-aggregator", "-2"]).is_err());
    }
}
