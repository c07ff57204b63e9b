//! Loopback ports for tests that need a listener, or need the absence of one.

use std::net::{SocketAddr, TcpListener};

/// Returns a loopback port that nothing is listening on at the time of the call.
///
/// The OS picks the port; the probe listener is dropped before returning, so a
/// connection attempt to it is refused unless something else binds it first.
///
/// # Panics
///
/// Panics if the loopback interface cannot be bound at all.
#[must_use]
pub fn unused_local_port() -> u16 {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .unwrap_or_else(|e| panic!("failed to bind loopback: {e}"));
    listener
        .local_addr()
        .unwrap_or_else(|e| panic!("failed to read local address: {e}"))
        .port()
}
