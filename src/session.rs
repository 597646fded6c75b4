//! Session management for trelay.
//!
//! A session couples one accepted client connection with its backend
//! connection and runs the two byte pumps concurrently until both reach a
//! terminal state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::{JoinError, JoinHandle};

use crate::error::PumpError;
use crate::metrics::Metrics;
use crate::pump::{pump, Activity, Direction};

/// Bytes relayed by a completed session, per direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub client_to_backend: u64,
    pub backend_to_client: u64,
}

/// One proxied client/backend pairing.
///
/// Owns both connections exclusively; they are closed exactly once, when the
/// session tears down. Sessions share no mutable state with each other beyond
/// the aggregate [`Metrics`].
#[derive(Debug)]
pub struct Session {
    client: TcpStream,
    backend: TcpStream,
    peer: SocketAddr,
    idle_timeout: Option<Duration>,
    metrics: Arc<Metrics>,
}

impl Session {
    /// Creates a session from an accepted client connection and an
    /// established backend connection.
    pub fn new(
        client: TcpStream,
        backend: TcpStream,
        peer: SocketAddr,
        idle_timeout: Option<Duration>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            client,
            backend,
            peer,
            idle_timeout,
            metrics,
        }
    }

    /// Relays traffic in both directions until the session terminates.
    ///
    /// Termination rules:
    /// - Both pumps finishing with EOF (after half-close propagation) ends
    ///   the session normally with the per-direction byte counts.
    /// - A pump error aborts the other pump and force-closes both
    ///   connections immediately.
    /// - No traffic in either direction for the idle timeout tears the
    ///   session down with [`PumpError::IdleTimeout`].
    pub async fn run(self) -> Result<SessionStats, PumpError> {
        let Session {
            client,
            backend,
            peer,
            idle_timeout,
            metrics,
        } = self;

        let (client_read, client_write) = client.into_split();
        let (backend_read, backend_write) = backend.into_split();
        let activity = Arc::new(Activity::new());

        metrics.session_started();
        tracing::debug!(%peer, "session started");

        let mut inbound = spawn_pump(
            client_read,
            backend_write,
            Direction::ClientToBackend,
            Arc::clone(&activity),
            Arc::clone(&metrics),
        );
        let mut outbound = spawn_pump(
            backend_read,
            client_write,
            Direction::BackendToClient,
            Arc::clone(&activity),
            Arc::clone(&metrics),
        );

        let mut client_to_backend: Option<u64> = None;
        let mut backend_to_client: Option<u64> = None;

        let outcome = loop {
            tokio::select! {
                res = &mut inbound, if client_to_backend.is_none() => {
                    match flatten(res) {
                        Ok(n) => {
                            client_to_backend = Some(n);
                            if backend_to_client.is_some() {
                                break Ok(());
                            }
                        }
                        Err(e) => {
                            outbound.abort();
                            metrics.record_pump_error(Direction::ClientToBackend);
                            tracing::warn!(%peer, direction = %Direction::ClientToBackend, error = %e, "pump failed");
                            break Err(e);
                        }
                    }
                }
                res = &mut outbound, if backend_to_client.is_none() => {
                    match flatten(res) {
                        Ok(n) => {
                            backend_to_client = Some(n);
                            if client_to_backend.is_some() {
                                break Ok(());
                            }
                        }
                        Err(e) => {
                            inbound.abort();
                            metrics.record_pump_error(Direction::BackendToClient);
                            tracing::warn!(%peer, direction = %Direction::BackendToClient, error = %e, "pump failed");
                            break Err(e);
                        }
                    }
                }
                _ = idle_expired(&activity, idle_timeout) => {
                    inbound.abort();
                    outbound.abort();
                    metrics.record_idle_timeout();
                    let timeout = idle_timeout.unwrap_or_default();
                    tracing::warn!(%peer, ?timeout, "session idle timeout");
                    break Err(PumpError::IdleTimeout(timeout));
                }
            }
        };

        metrics.session_finished();

        outcome.map(|()| {
            let stats = SessionStats {
                client_to_backend: client_to_backend.unwrap_or(0),
                backend_to_client: backend_to_client.unwrap_or(0),
            };
            tracing::debug!(
                %peer,
                client_to_backend = stats.client_to_backend,
                backend_to_client = stats.backend_to_client,
                "session finished"
            );
            stats
        })
    }
}

/// Spawns one pump direction as an independent task.
fn spawn_pump<R, W>(
    src: R,
    dst: W,
    direction: Direction,
    activity: Arc<Activity>,
    metrics: Arc<Metrics>,
) -> JoinHandle<Result<u64, PumpError>>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move { pump(src, dst, direction, &activity, &metrics).await })
}

/// Collapses a task join result into the pump result.
fn flatten(res: Result<Result<u64, PumpError>, JoinError>) -> Result<u64, PumpError> {
    match res {
        Ok(inner) => inner,
        Err(e) => Err(PumpError::Task(e.to_string())),
    }
}

/// Resolves once the session has seen no traffic for `timeout`.
///
/// Never resolves when no timeout is configured.
async fn idle_expired(activity: &Activity, timeout: Option<Duration>) {
    let Some(timeout) = timeout else {
        return std::future::pending::<()>().await;
    };
    loop {
        let idle = activity.idle_for();
        if idle >= timeout {
            return;
        }
        tokio::time::sleep(timeout - idle).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Returns a connected (client, server) loopback socket pair.
    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (connected, accepted) =
            tokio::join!(TcpStream::connect(addr), async {
                listener.accept().await.unwrap().0
            });
        (connected.unwrap(), accepted)
    }

    #[tokio::test]
    async fn test_session_relays_both_directions() {
        let metrics = Arc::new(Metrics::new());
        let (mut client, client_side) = socket_pair().await;
        let (backend_side, mut backend) = socket_pair().await;
        let peer = client_side.peer_addr().unwrap();

        let session = Session::new(client_side, backend_side, peer, None, Arc::clone(&metrics));
        let session_task = tokio::spawn(session.run());

        // Backend echoes everything, then closes.
        let echo = tokio::spawn(async move {
            let mut buf = Vec::new();
            backend.read_to_end(&mut buf).await.unwrap();
            backend.write_all(&buf).await.unwrap();
            backend.shutdown().await.unwrap();
        });

        let request = b"hello through the relay".to_vec();
        client.write_all(&request).await.unwrap();
        client.shutdown().await.unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert_eq!(response, request);

        echo.await.unwrap();
        let stats = session_task.await.unwrap().unwrap();
        assert_eq!(stats.client_to_backend, request.len() as u64);
        assert_eq!(stats.backend_to_client, request.len() as u64);

        let snap = metrics.snapshot();
        assert_eq!(snap.bytes_client_to_backend, request.len() as u64);
        assert_eq!(snap.bytes_backend_to_client, request.len() as u64);
        assert_eq!(snap.active_sessions, 0);
        assert_eq!(snap.total_sessions, 1);
    }

    #[tokio::test]
    async fn test_session_idle_timeout_tears_down() {
        let metrics = Arc::new(Metrics::new());
        let (mut client, client_side) = socket_pair().await;
        let (backend_side, _backend) = socket_pair().await;
        let peer = client_side.peer_addr().unwrap();

        let session = Session::new(
            client_side,
            backend_side,
            peer,
            Some(Duration::from_millis(100)),
            Arc::clone(&metrics),
        );
        let result = session.run().await;
        assert!(matches!(result, Err(PumpError::IdleTimeout(_))));

        // Both connections are closed: the client observes EOF.
        let mut buf = Vec::new();
        let n = client.read_to_end(&mut buf).await.unwrap();
        assert_eq!(n, 0);

        let snap = metrics.snapshot();
        assert_eq!(snap.idle_timeouts, 1);
        assert_eq!(snap.active_sessions, 0);
    }

    #[tokio::test]
    async fn test_session_activity_defers_idle_timeout() {
        let metrics = Arc::new(Metrics::new());
        let (mut client, client_side) = socket_pair().await;
        let (backend_side, mut backend) = socket_pair().await;
        let peer = client_side.peer_addr().unwrap();

        let session = Session::new(
            client_side,
            backend_side,
            peer,
            Some(Duration::from_millis(500)),
            Arc::clone(&metrics),
        );
        let session_task = tokio::spawn(session.run());

        // Trickle traffic more often than the timeout; the session must
        // survive well past a single idle period.
        for _ in 0..5 {
            client.write_all(b"tick").await.unwrap();
            let mut buf = [0u8; 4];
            backend.read_exact(&mut buf).await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(metrics.snapshot().idle_timeouts, 0);

        // Then go silent and let the watchdog fire.
        let result = session_task.await.unwrap();
        assert!(matches!(result, Err(PumpError::IdleTimeout(_))));
        assert_eq!(metrics.snapshot().idle_timeouts, 1);
    }

    #[tokio::test]
    async fn test_half_close_keeps_reverse_direction_open() {
        let metrics = Arc::new(Metrics::new());
        let (mut client, client_side) = socket_pair().await;
        let (backend_side, mut backend) = socket_pair().await;
        let peer = client_side.peer_addr().unwrap();

        let session = Session::new(client_side, backend_side, peer, None, Arc::clone(&metrics));
        let session_task = tokio::spawn(session.run());

        // Client half-closes immediately; the backend still streams a
        // response afterwards.
        client.shutdown().await.unwrap();

        let mut buf = Vec::new();
        backend.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty());

        let response = vec![0xa5u8; 200_000];
        backend.write_all(&response).await.unwrap();
        backend.shutdown().await.unwrap();

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, response);

        let stats = session_task.await.unwrap().unwrap();
        assert_eq!(stats.client_to_backend, 0);
        assert_eq!(stats.backend_to_client, response.len() as u64);
    }
}
