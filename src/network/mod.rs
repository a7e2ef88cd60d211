//! Network module - The two transports to the game server
//!
//! Provides:
//! - Control channel client for session lifecycle queries (TCP)
//! - State stream receiver for object position snapshots (UDP)
//! - Session orchestrator tying both together for one round

mod control;
mod stream;
mod session;

pub use control::*;
pub use stream::*;
pub use session::*;

use std::net::SocketAddr;

/// Resolve a hostname to a socket address
pub async fn resolve_host(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    use tokio::net::lookup_host;

    let addr_string = format!("{}:{}", host, port);
    let mut addrs = lookup_host(&addr_string).await?;

    addrs.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Could not resolve host: {}", host),
        )
    })
}
