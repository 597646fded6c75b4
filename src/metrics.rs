//! Process-wide relay counters.
//!
//! The engine's only observability surface: aggregate counters updated by
//! every session and readable as a consistent-enough snapshot by an external
//! exporter. No export protocol is defined here.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::pump::Direction;

/// Aggregate counters shared by the listener loop and all sessions.
///
/// All fields are independent atomics; increments use relaxed ordering since
/// no counter value guards any other memory.
#[derive(Debug, Default)]
pub struct Metrics {
    active_sessions: AtomicU64,
    total_sessions: AtomicU64,
    bytes_client_to_backend: AtomicU64,
    bytes_backend_to_client: AtomicU64,
    accept_errors: AtomicU64,
    backend_unavailable: AtomicU64,
    pump_errors_client_to_backend: AtomicU64,
    pump_errors_backend_to_client: AtomicU64,
    idle_timeouts: AtomicU64,
}

impl Metrics {
    /// Creates a zeroed metrics set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a session entering relay.
    pub fn session_started(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
        self.total_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a session having fully torn down.
    pub fn session_finished(&self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    /// Adds relayed bytes for one direction.
    pub fn add_bytes(&self, direction: Direction, n: u64) {
        match direction {
            Direction::ClientToBackend => {
                self.bytes_client_to_backend.fetch_add(n, Ordering::Relaxed)
            }
            Direction::BackendToClient => {
                self.bytes_backend_to_client.fetch_add(n, Ordering::Relaxed)
            }
        };
    }

    /// Records a transient accept failure.
    pub fn record_accept_error(&self) {
        self.accept_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed or timed-out backend connect.
    pub fn record_backend_unavailable(&self) {
        self.backend_unavailable.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a mid-stream relay failure for one direction.
    pub fn record_pump_error(&self, direction: Direction) {
        match direction {
            Direction::ClientToBackend => self
                .pump_errors_client_to_backend
                .fetch_add(1, Ordering::Relaxed),
            Direction::BackendToClient => self
                .pump_errors_backend_to_client
                .fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Records a session torn down by the idle timeout.
    pub fn record_idle_timeout(&self) {
        self.idle_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            total_sessions: self.total_sessions.load(Ordering::Relaxed),
            bytes_client_to_backend: self.bytes_client_to_backend.load(Ordering::Relaxed),
            bytes_backend_to_client: self.bytes_backend_to_client.load(Ordering::Relaxed),
            accept_errors: self.accept_errors.load(Ordering::Relaxed),
            backend_unavailable: self.backend_unavailable.load(Ordering::Relaxed),
            pump_errors_client_to_backend: self
                .pump_errors_client_to_backend
                .load(Ordering::Relaxed),
            pump_errors_backend_to_client: self
                .pump_errors_backend_to_client
                .load(Ordering::Relaxed),
            idle_timeouts: self.idle_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Plain-value copy of [`Metrics`] for scraping and logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub active_sessions: u64,
    pub total_sessions: u64,
    pub bytes_client_to_backend: u64,
    pub bytes_backend_to_client: u64,
    pub accept_errors: u64,
    pub backend_unavailable: u64,
    pub pump_errors_client_to_backend: u64,
    pub pump_errors_backend_to_client: u64,
    pub idle_timeouts: u64,
}
