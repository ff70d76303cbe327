//! Lightweight metrics collection with Prometheus text exposition and health endpoint.
//!
//! Atomic counters rendered directly as Prometheus text format; no external
//! metrics crate. Upstream latency uses a 1-2-5 bucket ladder from 5ms to 10s,
//! which covers a healthy bank API and a request that runs into the client
//! timeout.

use std::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering::Relaxed};
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::routing::get;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Prometheus histogram
// ---------------------------------------------------------------------------

const NUM_BUCKETS: usize = 11;

/// Upper bounds in milliseconds + Prometheus `le` label strings.
const BUCKETS: [(u64, &str); NUM_BUCKETS] = [
    (5, "0.005"),
    (10, "0.01"),
    (25, "0.025"),
    (50, "0.05"),
    (100, "0.1"),
    (250, "0.25"),
    (500, "0.5"),
    (1_000, "1"),
    (2_500, "2.5"),
    (5_000, "5"),
    (10_000, "10"),
];

pub struct PromHistogram {
    /// Cumulative bucket counters. Index i counts observations <= BUCKETS[i].
    buckets: [AtomicU64; NUM_BUCKETS],
    sum_us: AtomicU64,
    count: AtomicU64,
}

impl Default for PromHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl PromHistogram {
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            sum_us: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a duration observation. Increments all cumulative buckets
    /// whose upper bound >= the observed value.
    #[allow(clippy::cast_possible_truncation)] // u64 micros covers ~584k years.
    pub fn record(&self, duration: Duration) {
        let micros = duration.as_micros() as u64;

        for (i, &(bound_ms, _)) in BUCKETS.iter().enumerate() {
            if micros <= bound_ms * 1_000 {
                for bucket in &self.buckets[i..] {
                    bucket.fetch_add(1, Relaxed);
                }
                break;
            }
        }

        self.sum_us.fetch_add(micros, Relaxed);
        self.count.fetch_add(1, Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Relaxed)
    }

    #[allow(clippy::cast_precision_loss)]
    fn render(&self, name: &str, out: &mut String) {
        for (i, &(_, le)) in BUCKETS.iter().enumerate() {
            let count = self.buckets[i].load(Relaxed);
            let _ = writeln!(out, "{name}_bucket{{le=\"{le}\"}} {count}");
        }
        let total = self.count.load(Relaxed);
        let _ = writeln!(out, "{name}_bucket{{le=\"+Inf\"}} {total}");

        let sum_secs = self.sum_us.load(Relaxed) as f64 / 1_000_000.0;
        let _ = writeln!(out, "{name}_sum {sum_secs}");
        let _ = writeln!(out, "{name}_count {total}");
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

pub struct Metrics {
    // Counters
    pub commands: AtomicU64,
    pub unknown_commands: AtomicU64,
    pub upstream_requests: AtomicU64,
    pub upstream_errors: AtomicU64,

    // Gauges
    pub connections: AtomicI64,
    start_time: Instant,

    pub upstream_latency: PromHistogram,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            commands: AtomicU64::new(0),
            unknown_commands: AtomicU64::new(0),
            upstream_requests: AtomicU64::new(0),
            upstream_errors: AtomicU64::new(0),
            connections: AtomicI64::new(0),
            start_time: Instant::now(),
            upstream_latency: PromHistogram::new(),
        }
    }
}

impl Metrics {
    /// Render all metrics in Prometheus text exposition format.
    pub fn to_prometheus(&self) -> String {
        let mut out = String::with_capacity(2048);

        counter(&mut out, "rates_commands_total", "Exchange commands handled", self.commands.load(Relaxed));
        counter(
            &mut out,
            "rates_unknown_commands_total",
            "Messages answered with Unknown command",
            self.unknown_commands.load(Relaxed),
        );
        counter(
            &mut out,
            "rates_upstream_requests_total",
            "Per-date upstream requests issued",
            self.upstream_requests.load(Relaxed),
        );
        counter(
            &mut out,
            "rates_upstream_errors_total",
            "Per-date upstream requests that produced no rates",
            self.upstream_errors.load(Relaxed),
        );

        let _ = writeln!(out, "# HELP rates_connections Open WebSocket connections");
        let _ = writeln!(out, "# TYPE rates_connections gauge");
        let _ = writeln!(out, "rates_connections {}", self.connections.load(Relaxed));

        let _ = writeln!(out, "# HELP rates_uptime_seconds Seconds since process start");
        let _ = writeln!(out, "# TYPE rates_uptime_seconds gauge");
        let _ = writeln!(out, "rates_uptime_seconds {}", self.start_time.elapsed().as_secs());

        let _ = writeln!(out, "# HELP rates_upstream_duration_seconds Per-date upstream request latency");
        let _ = writeln!(out, "# TYPE rates_upstream_duration_seconds histogram");
        self.upstream_latency.render("rates_upstream_duration_seconds", &mut out);

        out
    }
}

fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} counter");
    let _ = writeln!(out, "{name} {value}");
}

// ---------------------------------------------------------------------------
// HTTP server
// ---------------------------------------------------------------------------

/// Serve `/health` and `/metrics` on the given port until cancelled.
pub async fn serve_http(port: u16, metrics: Arc<Metrics>, cancel: CancellationToken) {
    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(prom_metrics))
        .with_state(metrics);

    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            warn!(port, error = %e, "failed to bind metrics port, metrics disabled");
            return;
        }
    };

    info!(port, "metrics/health HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .ok();
}

async fn health() -> &'static str {
    "OK\n"
}

async fn prom_metrics(State(m): State<Arc<Metrics>>) -> String {
    m.to_prometheus()
}
