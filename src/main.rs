use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use rate_aggregator::chat_log::ChatLog;
use rate_aggregator::command::ExchangeService;
use rate_aggregator::config::{Config, Mode};
use rate_aggregator::metrics::{self, Metrics};
use rate_aggregator::server::ChatServer;
use rate_aggregator::source::privatbank::PrivatBank;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stderr keeps one-shot stdout pure JSON.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    let metrics = Arc::new(Metrics::default());
    let source = PrivatBank::new(config.api_url.clone(), config.request_timeout())?;
    let service = ExchangeService::new(source, config.currencies.clone(), Arc::clone(&metrics));

    match config.mode {
        Mode::Once(days) => run_once(&service, days).await,
        Mode::Listen => run_listener(&config, service, metrics).await?,
    }
    Ok(())
}

async fn run_once(service: &ExchangeService<PrivatBank>, days: u32) {
    let reply = service.handle_exchange_command(&format!("exchange {days}")).await;
    println!("{reply}");
}

async fn run_listener(
    config: &Config,
    service: ExchangeService<PrivatBank>,
    metrics: Arc<Metrics>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        host = %config.host,
        port = config.port,
        currencies = %service.default_currencies(),
        log_file = %config.log_file,
        "starting chat listener"
    );

    // Bind eagerly so a taken port fails before anything is spawned.
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;

    let cancel = CancellationToken::new();

    let metrics_handle = config.metrics_port.map(|port| {
        let cancel = cancel.clone();
        let metrics = Arc::clone(&metrics);
        tokio::spawn(async move {
            metrics::serve_http(port, metrics, cancel).await;
        })
    });

    // Shutdown signal handler (SIGINT + SIGTERM).
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {},
                        _ = sigterm.recv() => {},
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to register SIGTERM handler");
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
        shutdown_cancel.cancel();
    });

    let server = Arc::new(ChatServer::new(service, ChatLog::new(&config.log_file), metrics));
    server.run(listener, cancel).await;

    if let Some(handle) = metrics_handle {
        let _ = handle.await;
    }
    info!("shutdown complete");
    Ok(())
}
