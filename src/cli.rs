//! CLI definitions for trelay.

use clap::{builder::PossibleValuesParser, Parser};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::common::backend_addr;
use crate::server::RelayConfig;

/// Default listen port.
pub const DEFAULT_LISTEN_PORT: u16 = 80;

/// Parse a duration from a human-readable string.
fn parse_duration(s: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(s)
}

/// Transparent TCP reverse proxy relaying to a single fixed backend.
#[derive(Debug, Parser)]
#[command(name = "trelay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log level (debug|info|warn|error)
    #[arg(long, default_value = "info", value_parser = PossibleValuesParser::new(["debug", "info", "warn", "error"]))]
    pub log_level: String,

    /// Address to listen on
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub listen_address: IpAddr,

    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_LISTEN_PORT)]
    pub listen_port: u16,

    /// Backend host (IP or hostname)
    #[arg(long)]
    pub backend_host: String,

    /// Backend port
    #[arg(long)]
    pub backend_port: u16,

    /// Backend connect timeout
    #[arg(long, value_parser = parse_duration, default_value = "5s")]
    pub connect_timeout: Duration,

    /// Session idle timeout (0 to disable)
    #[arg(long, value_parser = parse_duration, default_value = "60s")]
    pub idle_timeout: Duration,
}

impl Cli {
    /// Returns the socket address to bind.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_address, self.listen_port)
    }

    /// Builds the relay configuration from the parsed arguments.
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            backend_addr: backend_addr(&self.backend_host, self.backend_port),
            connect_timeout: self.connect_timeout,
            idle_timeout: if self.idle_timeout.is_zero() {
                None
            } else {
                Some(self.idle_timeout)
            },
        }
    }
}
