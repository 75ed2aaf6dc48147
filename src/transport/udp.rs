//! Owned UDP transport.
//!
//! One connected socket per target. Connecting the socket lets the
//! kernel filter datagrams from other sources and surface ICMP errors
//! as send/recv failures.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use super::Transport;
use crate::error::{Error, Result};

/// Largest possible UDP payload (65535 minus IP and UDP headers).
const MAX_DATAGRAM_SIZE: usize = 65507;

struct Inner {
    socket: UdpSocket,
    target: SocketAddr,
    local_addr: SocketAddr,
}

/// UDP transport bound to an ephemeral port and connected to one agent.
///
/// Clones share the underlying socket.
#[derive(Clone)]
pub struct UdpTransport {
    inner: Arc<Inner>,
}

impl UdpTransport {
    /// Bind an ephemeral socket and connect it to `target`.
    pub async fn connect(target: SocketAddr) -> Result<Self> {
        let bind_addr: SocketAddr = if target.is_ipv6() {
            "[::]:0".parse().expect("valid address")
        } else {
            "0.0.0.0:0".parse().expect("valid address")
        };

        let socket = bind_udp_socket(bind_addr).map_err(|source| Error::Io {
            target: Some(target),
            source,
        })?;
        socket.connect(target).await.map_err(|source| Error::Io {
            target: Some(target),
            source,
        })?;
        let local_addr = socket.local_addr().map_err(|source| Error::Io {
            target: Some(target),
            source,
        })?;

        tracing::debug!(
            snmp.target = %target,
            local = %local_addr,
            "udp transport connected"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                socket,
                target,
                local_addr,
            }),
        })
    }

    /// Like [`connect`](Self::connect), bounded by `timeout`.
    pub async fn connect_timeout(target: SocketAddr, timeout: Duration) -> Result<Self> {
        tokio::time::timeout(timeout, Self::connect(target))
            .await
            .map_err(|_| Error::Timeout {
                target: Some(target),
                elapsed: timeout,
                request_id: 0,
                retries: 0,
            })?
    }
}

impl Transport for UdpTransport {
    async fn send(&self, data: &[u8]) -> Result<()> {
        let inner = &self.inner;
        tracing::trace!(
            snmp.target = %inner.target,
            len = data.len(),
            "sending datagram"
        );
        inner.socket.send(data).await.map_err(|source| Error::Io {
            target: Some(inner.target),
            source,
        })?;
        Ok(())
    }

    async fn recv(&self, request_id: i32, timeout: Duration) -> Result<(Bytes, SocketAddr)> {
        let inner = &self.inner;
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        let len = tokio::time::timeout(timeout, inner.socket.recv(&mut buf))
            .await
            .map_err(|_| Error::Timeout {
                target: Some(inner.target),
                elapsed: timeout,
                request_id,
                retries: 0,
            })?
            .map_err(|source| Error::Io {
                target: Some(inner.target),
                source,
            })?;

        buf.truncate(len);
        tracing::trace!(
            snmp.target = %inner.target,
            len,
            "received datagram"
        );
        Ok((Bytes::from(buf), inner.target))
    }

    fn peer_addr(&self) -> SocketAddr {
        self.inner.target
    }

    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    fn is_stream(&self) -> bool {
        false
    }
}

/// Create a non-blocking UDP socket bound to `addr`.
///
/// IPv6 sockets are opened dual-stack (`IPV6_V6ONLY = false`) so a
/// `[::]` bind also carries IPv4-mapped traffic.
fn bind_udp_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}
