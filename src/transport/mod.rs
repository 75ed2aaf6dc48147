//! Transport layer abstraction.
//!
//! [`Transport`] is the seam between the session layer and the network:
//! an owned, connected datagram channel to one agent. [`UdpTransport`]
//! is the production implementation; [`MockTransport`] is a
//! programmable stand-in for tests.

mod mock;
mod udp;

pub use mock::{MockResponse, MockTransport, ResponseBuilder};
pub use udp::UdpTransport;

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// Client-side transport abstraction.
///
/// The `Clone` bound exists because walk streams own a clone of the
/// session (and thus the transport); implementations hold their state
/// behind an `Arc` so cloning is a reference-count bump.
pub trait Transport: Send + Sync + Clone {
    /// Send one encoded message to the peer.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Receive the next datagram, waiting at most `timeout`.
    ///
    /// `request_id` is not used for correlation here (the socket is
    /// connected to a single peer); it is carried into the timeout
    /// error so callers can attribute the loss. Matching responses to
    /// requests is the session's job.
    ///
    /// Returns the payload and the source address.
    fn recv(
        &self,
        request_id: i32,
        timeout: Duration,
    ) -> impl Future<Output = Result<(Bytes, SocketAddr)>> + Send;

    /// The remote address this transport sends to.
    fn peer_addr(&self) -> SocketAddr;

    /// Local bind address.
    fn local_addr(&self) -> SocketAddr;

    /// Whether this transport guarantees delivery or failure.
    ///
    /// Datagram transports return `false` and the session retries on
    /// timeout; a stream transport would return `true` to disable
    /// retries.
    fn is_stream(&self) -> bool;
}
