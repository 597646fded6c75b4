//! Relay server: listener loop and connection pairing.
//!
//! Accepts inbound TCP connections and pairs each one with a fresh backend
//! connection, spawning an isolated session per client.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};

use crate::common::format_duration;
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::session::Session;

/// Default backend connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default session idle timeout in seconds.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;

/// Per-relay settings shared by all sessions.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Backend dial address, e.g. `127.0.0.1:8080`.
    pub backend_addr: String,
    /// Bound on each backend connect attempt.
    pub connect_timeout: Duration,
    /// Tear down sessions with no traffic for this long; `None` disables.
    pub idle_timeout: Option<Duration>,
}

/// A bound relay, ready to accept client connections.
#[derive(Debug)]
pub struct Relay {
    listener: TcpListener,
    config: Arc<RelayConfig>,
    metrics: Arc<Metrics>,
}

impl Relay {
    /// Binds the listening socket. Failure here is fatal to the process.
    pub async fn bind(
        listen_addr: SocketAddr,
        config: RelayConfig,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(listen_addr)
            .await
            .map_err(|e| Error::ListenFailed(format!("failed to bind {}: {}", listen_addr, e)))?;

        Ok(Self {
            listener,
            config: Arc::new(config),
            metrics,
        })
    }

    /// Returns the bound listening address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs the accept loop until a fatal accept error or Ctrl-C.
    ///
    /// Transient accept errors are logged and counted; a failed client never
    /// terminates the loop. Spawned sessions run independently and never
    /// block the next accept.
    pub async fn run(self) -> Result<()> {
        let idle = self
            .config
            .idle_timeout
            .map(format_duration)
            .unwrap_or_else(|| "disabled".to_string());
        tracing::info!(
            listen = %self.listener.local_addr()?,
            backend = %self.config.backend_addr,
            connect_timeout = %format_duration(self.config.connect_timeout),
            idle_timeout = %idle,
            "relay listening"
        );

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((client, peer)) => {
                            tracing::debug!(%peer, "client connection accepted");
                            let config = Arc::clone(&self.config);
                            let metrics = Arc::clone(&self.metrics);
                            tokio::spawn(handle_client(client, peer, config, metrics));
                        }
                        Err(e) if is_transient_accept_error(&e) => {
                            self.metrics.record_accept_error();
                            tracing::warn!(error = %e, "transient accept error");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "listening socket failed");
                            return Err(Error::ListenFailed(e.to_string()));
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("received SIGINT, shutting down");
                    break;
                }
            }
        }

        let snap = self.metrics.snapshot();
        tracing::info!(
            total_sessions = snap.total_sessions,
            bytes_client_to_backend = snap.bytes_client_to_backend,
            bytes_backend_to_client = snap.bytes_backend_to_client,
            "relay stopped"
        );

        Ok(())
    }
}

/// Pairs an accepted client with a backend connection and runs the session.
///
/// Every failure is contained here: the client connection is dropped (and so
/// closed) on any pairing or relay error, with nothing sent on its behalf.
async fn handle_client(
    client: TcpStream,
    peer: SocketAddr,
    config: Arc<RelayConfig>,
    metrics: Arc<Metrics>,
) {
    let backend = match connect_backend(&config, &metrics).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(%peer, backend = %config.backend_addr, error = %e, "backend unavailable, closing client");
            return;
        }
    };

    let session = Session::new(client, backend, peer, config.idle_timeout, metrics);
    if let Err(e) = session.run().await {
        tracing::debug!(%peer, error = %e, "session ended with error");
    }
}

/// Opens the outbound backend connection, bounded by the connect timeout.
///
/// Exactly one attempt per client connection; no retry happens inside the
/// engine.
async fn connect_backend(config: &RelayConfig, metrics: &Metrics) -> io::Result<TcpStream> {
    let attempt = TcpStream::connect(config.backend_addr.as_str());
    match tokio::time::timeout(config.connect_timeout, attempt).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => {
            metrics.record_backend_unavailable();
            Err(e)
        }
        Err(_) => {
            metrics.record_backend_unavailable();
            Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!(
                    "backend connect timed out after {}",
                    format_duration(config.connect_timeout)
                ),
            ))
        }
    }
}

/// Accept errors that leave the listening socket usable.
fn is_transient_accept_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}
