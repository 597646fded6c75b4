//! trelay - Transparent TCP reverse proxy.
//!
//! This crate relays inbound TCP connections to a single fixed backend
//! address, treating the payload as an opaque byte stream. Each accepted
//! client gets its own backend connection and an isolated session running
//! one byte pump per direction.

pub mod cli;
pub mod common;
pub mod error;
pub mod metrics;
pub mod pump;
pub mod server;
pub mod session;

pub use cli::{Cli, DEFAULT_LISTEN_PORT};
pub use common::{backend_addr, format_duration, READ_BUFFER_SIZE};
pub use error::{Error, ExitCode, PumpError, Result};
pub use metrics::{Metrics, MetricsSnapshot};
pub use pump::{pump, Activity, Direction};
pub use server::{Relay, RelayConfig, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_IDLE_TIMEOUT_SECS};
pub use session::{Session, SessionStats};
