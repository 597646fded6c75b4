//! Unidirectional byte pump.
//!
//! The atomic unit of relay work: a streaming copy loop that moves bytes from
//! one connection half to the other until EOF or error, holding at most one
//! in-flight chunk.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::common::READ_BUFFER_SIZE;
use crate::error::PumpError;
use crate::metrics::Metrics;

/// Relay direction within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToBackend,
    BackendToClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ClientToBackend => write!(f, "client->backend"),
            Direction::BackendToClient => write!(f, "backend->client"),
        }
    }
}

/// Last-traffic tracker shared by both pumps of a session.
///
/// Stores elapsed milliseconds since the session epoch so both pumps and the
/// idle watchdog can update/read it without locking.
#[derive(Debug)]
pub struct Activity {
    epoch: Instant,
    last_millis: AtomicU64,
}

impl Activity {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            last_millis: AtomicU64::new(0),
        }
    }

    /// Marks traffic as having just occurred.
    pub fn touch(&self) {
        let elapsed = self.epoch.elapsed().as_millis() as u64;
        self.last_millis.store(elapsed, Ordering::Relaxed);
    }

    /// Returns how long the session has been without traffic.
    pub fn idle_for(&self) -> Duration {
        let now = self.epoch.elapsed().as_millis() as u64;
        let last = self.last_millis.load(Ordering::Relaxed);
        Duration::from_millis(now.saturating_sub(last))
    }
}

impl Default for Activity {
    fn default() -> Self {
        Self::new()
    }
}

/// Relays bytes from `src` to `dst` until `src` reaches EOF.
///
/// On EOF the destination's write side is shut down (half-close) so the
/// reverse-direction pump is unaffected; the total byte count is returned.
/// A read or write error terminates the pump with [`PumpError::Io`] and is
/// never retried: bytes already delivered cannot be rolled back.
///
/// Every successful chunk write bumps the aggregate byte counter for
/// `direction` and touches the session activity tracker.
pub async fn pump<R, W>(
    mut src: R,
    mut dst: W,
    direction: Direction,
    activity: &Activity,
    metrics: &Metrics,
) -> Result<u64, PumpError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let mut total: u64 = 0;

    loop {
        let n = src.read(&mut buf).await?;
        if n == 0 {
            // Source EOF: half-close the destination. The peer may already be
            // gone, in which case the reverse pump reports the failure.
            let _ = dst.shutdown().await;
            return Ok(total);
        }

        dst.write_all(&buf[..n]).await?;

        total += n as u64;
        metrics.add_bytes(direction, n as u64);
        activity.touch();
    }
}
