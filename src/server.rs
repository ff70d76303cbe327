//! WebSocket chat listener.
//!
//! Each accepted connection gets its own task. Messages on one connection are
//! answered strictly in order; connections run independently. Exactly one
//! reply is sent per text message.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering::Relaxed;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chat_log::ChatLog;
use crate::command::{ExchangeService, UNKNOWN_COMMAND, is_exchange_command};
use crate::error::Result;
use crate::metrics::Metrics;
use crate::source::RateSource;

/// Pause after a failed `accept()` (e.g. fd exhaustion) before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Everything a connection needs, shared across all of them.
pub struct ChatServer<S> {
    service: ExchangeService<S>,
    log: ChatLog,
    metrics: Arc<Metrics>,
}

impl<S: RateSource> ChatServer<S> {
    pub fn new(service: ExchangeService<S>, log: ChatLog, metrics: Arc<Metrics>) -> Self {
        Self {
            service,
            log,
            metrics,
        }
    }

    /// Produce the reply for one inbound message.
    ///
    /// Exchange commands are logged after they are handled; a log write
    /// failure is reported but never costs the peer its reply.
    pub async fn respond(&self, text: &str) -> String {
        if !is_exchange_command(text) {
            self.metrics.unknown_commands.fetch_add(1, Relaxed);
            return UNKNOWN_COMMAND.to_owned();
        }

        self.metrics.commands.fetch_add(1, Relaxed);
        let reply = self.service.handle_exchange_command(text).await;
        if let Err(e) = self.log.append(text).await {
            warn!(path = %self.log.path().display(), error = %e, "failed to write chat log");
        }
        reply
    }

    /// Accept connections on `listener` until `cancel` fires.
    pub async fn run(self: Arc<Self>, listener: TcpListener, cancel: CancellationToken) {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "chat listener accepting connections");
        }

        loop {
            let (stream, peer) = tokio::select! {
                () = cancel.cancelled() => {
                    info!("chat listener shutting down");
                    return;
                }
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                }
            };

            let server = Arc::clone(&self);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                server.handle_connection(stream, peer, cancel).await;
            });
        }
    }

    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr, cancel: CancellationToken) {
        if let Err(e) = self.serve_connection(stream, peer, cancel).await {
            warn!(%peer, error = %e, "connection closed with error");
        }
    }

    /// Run the handshake and answer messages until the peer leaves, the
    /// stream fails, or `cancel` fires.
    async fn serve_connection(&self, stream: TcpStream, peer: SocketAddr, cancel: CancellationToken) -> Result<()> {
        let ws = accept_async(stream).await?;
        info!(%peer, "peer connected");
        self.metrics.connections.fetch_add(1, Relaxed);

        let (mut write, mut read) = ws.split();
        let outcome = loop {
            let text = tokio::select! {
                () = cancel.cancelled() => break Ok(()),
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(t))) => t,
                    Some(Ok(Message::Close(_))) | None => break Ok(()),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break Err(e.into()),
                }
            };

            debug!(%peer, message = text.as_str(), "received");
            let reply = self.respond(text.as_str()).await;
            if let Err(e) = write.send(Message::text(reply)).await {
                break Err(e.into());
            }
        };

        self.metrics.connections.fetch_sub(1, Relaxed);
        info!(%peer, "peer disconnected");
        outcome
    }
}
