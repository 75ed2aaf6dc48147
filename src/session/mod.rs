//! SNMP session: request orchestration over a transport.
//!
//! A [`Session`] owns a transport, a version/credential configuration,
//! and a request-id counter. It encodes request PDUs, matches responses
//! by request-id, maps agent error-status to typed errors, and retries
//! timeouts according to its [`Retry`] policy. SNMPv3 sessions also
//! handle engine discovery, signing, and encryption transparently.

mod retry;
mod v3;
mod walk;

pub use retry::{Backoff, Retry, RetryBuilder};
pub use v3::V3SecurityConfig;
pub use walk::{BulkWalk, Walk};

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::RwLock;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::time::sleep;

use crate::error::{EncodeErrorKind, Error, ProtocolErrorKind, Result};
use crate::message::{CommunityMessage, Message};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::transport::{Transport, UdpTransport};
use crate::usm::EngineCache;
use crate::varbind::VarBind;
use crate::version::Version;

use v3::DerivedKeys;

/// Hard ceiling on results yielded by one walk, guarding against
/// agents that never terminate a subtree.
pub const DEFAULT_MAX_WALK_ITERATIONS: usize = 1_000_000;

/// Session configuration.
///
/// Usually built through [`Session::v1`], [`Session::v2c`], or
/// [`Session::v3`] rather than filled in directly.
#[derive(Clone)]
pub struct SessionConfig {
    /// SNMP version (default: V2c).
    pub version: Version,
    /// Community string for v1/v2c (default: "public").
    pub community: Bytes,
    /// Per-attempt response timeout (default: 5 seconds).
    pub timeout: Duration,
    /// Retry policy for timeouts (default: 3 immediate retries).
    pub retry: Retry,
    /// Maximum results from a single walk (default: 1,000,000).
    pub max_walk_iterations: usize,
    /// SNMPv3 credentials; `None` for community versions.
    pub v3_security: Option<V3SecurityConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            version: Version::V2c,
            community: Bytes::from_static(b"public"),
            timeout: Duration::from_secs(5),
            retry: Retry::default(),
            max_walk_iterations: DEFAULT_MAX_WALK_ITERATIONS,
            v3_security: None,
        }
    }
}

struct SessionInner<T: Transport> {
    transport: T,
    config: SessionConfig,
    request_id: AtomicI32,
    /// Discovered engine state (v3).
    engine: RwLock<Option<crate::usm::EngineState>>,
    /// Keys localized to the discovered engine (v3).
    keys: RwLock<Option<DerivedKeys>>,
    /// Shared discovery cache (v3, optional).
    engine_cache: Option<Arc<EngineCache>>,
}

/// An SNMP session bound to one agent.
///
/// Cheap to clone; clones share the transport and v3 engine state.
#[derive(Clone)]
pub struct Session<T: Transport> {
    inner: Arc<SessionInner<T>>,
}

impl Session<UdpTransport> {
    /// Start building an SNMPv1 session.
    pub fn v1(target: impl Into<String>) -> CommunitySessionBuilder {
        CommunitySessionBuilder::new(target, Version::V1)
    }

    /// Start building an SNMPv2c session.
    pub fn v2c(target: impl Into<String>) -> CommunitySessionBuilder {
        CommunitySessionBuilder::new(target, Version::V2c)
    }

    /// Start building an SNMPv3 session for `username` (noAuthNoPriv
    /// until `.auth()` / `.privacy()` are added).
    pub fn v3(target: impl Into<String>, username: impl Into<Bytes>) -> V3SessionBuilder {
        V3SessionBuilder::new(target, username)
    }
}

impl<T: Transport> Session<T> {
    /// Create a session over an existing transport.
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self::build(transport, config, None)
    }

    /// Create a v3 session sharing a discovery cache with other sessions.
    pub fn with_engine_cache(transport: T, config: SessionConfig, cache: Arc<EngineCache>) -> Self {
        Self::build(transport, config, Some(cache))
    }

    fn build(transport: T, config: SessionConfig, engine_cache: Option<Arc<EngineCache>>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                transport,
                config,
                request_id: AtomicI32::new(initial_request_id()),
                engine: RwLock::new(None),
                keys: RwLock::new(None),
                engine_cache,
            }),
        }
    }

    /// The agent address this session talks to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.transport.peer_addr()
    }

    pub(crate) fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub(crate) fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Allocate the next request id, wrapping within the non-negative
    /// i32 range.
    fn next_request_id(&self) -> i32 {
        self.inner
            .request_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| {
                Some(if id == i32::MAX { 0 } else { id + 1 })
            })
            .unwrap_or(0)
    }

    /// GET the given OIDs.
    ///
    /// The agent must answer with exactly one varbind per requested OID;
    /// anything else is a protocol error.
    pub async fn get(&self, oids: &[Oid]) -> Result<Vec<VarBind>> {
        if oids.is_empty() {
            return Ok(Vec::new());
        }
        let pdu = Pdu::get_request(self.next_request_id(), oids);
        let response = self.transact(pdu).await?;
        self.expect_varbind_count(oids.len(), &response.varbinds)?;
        Ok(response.varbinds)
    }

    /// GET a single OID.
    pub async fn get_one(&self, oid: &Oid) -> Result<VarBind> {
        let mut varbinds = self.get(std::slice::from_ref(oid)).await?;
        Ok(varbinds.remove(0))
    }

    /// SET the given varbinds.
    pub async fn set(&self, varbinds: Vec<VarBind>) -> Result<Vec<VarBind>> {
        if varbinds.is_empty() {
            return Ok(Vec::new());
        }
        let expected = varbinds.len();
        let pdu = Pdu::set_request(self.next_request_id(), varbinds);
        let response = self.transact(pdu).await?;
        self.expect_varbind_count(expected, &response.varbinds)?;
        Ok(response.varbinds)
    }

    /// GETNEXT: the lexicographic successor of each given OID.
    pub async fn get_next(&self, oids: &[Oid]) -> Result<Vec<VarBind>> {
        if oids.is_empty() {
            return Ok(Vec::new());
        }
        let pdu = Pdu::get_next_request(self.next_request_id(), oids);
        let response = self.transact(pdu).await?;
        self.expect_varbind_count(oids.len(), &response.varbinds)?;
        Ok(response.varbinds)
    }

    /// GETBULK (SNMPv2c/v3).
    ///
    /// The first `non_repeaters` OIDs get a single GETNEXT each; the
    /// rest are repeated up to `max_repetitions` times.
    pub async fn get_bulk(
        &self,
        oids: &[Oid],
        non_repeaters: i32,
        max_repetitions: i32,
    ) -> Result<Vec<VarBind>> {
        if !self.inner.config.version.supports_bulk() {
            return Err(Error::encode(EncodeErrorKind::BulkRequiresV2c));
        }
        let pdu = Pdu::get_bulk_request(
            self.next_request_id(),
            non_repeaters,
            max_repetitions,
            oids,
        );
        let response = self.transact(pdu).await?;
        Ok(response.varbinds)
    }

    /// Walk the subtree under `root` using GETNEXT.
    ///
    /// Returns a stream of varbinds in lexicographic order; see
    /// [`Walk`] for termination rules.
    pub fn walk(&self, root: Oid) -> Walk<T>
    where
        T: 'static,
    {
        Walk::new(self.clone(), root, self.inner.config.max_walk_iterations)
    }

    /// Walk the subtree under `root` using GETBULK batches.
    pub fn bulk_walk(&self, root: Oid, max_repetitions: i32) -> BulkWalk<T>
    where
        T: 'static,
    {
        BulkWalk::new(
            self.clone(),
            root,
            max_repetitions,
            self.inner.config.max_walk_iterations,
        )
    }

    /// Send a request PDU and return the validated response PDU.
    pub(crate) async fn transact(&self, pdu: Pdu) -> Result<Pdu> {
        if self.inner.config.version == Version::V3 {
            return self.transact_v3(pdu).await;
        }

        let request_id = pdu.request_id;
        tracing::debug!(
            snmp.target = %self.peer_addr(),
            snmp.pdu_type = %pdu.pdu_type,
            snmp.request_id = request_id,
            snmp.varbind_count = pdu.varbinds.len(),
            "sending request"
        );
        let data = CommunityMessage::new(
            self.inner.config.version,
            self.inner.config.community.clone(),
            pdu,
        )
        .encode();

        let start = Instant::now();
        let max_attempts = self.max_attempts();
        let mut last_error = None;

        for attempt in 0..=max_attempts {
            if attempt > 0 {
                let delay = self.inner.config.retry.compute_delay(attempt - 1);
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                tracing::debug!(attempt, "retrying request");
            }

            self.inner.transport.send(&data).await?;

            match self.recv_response(request_id).await {
                Ok(pdu) => return self.check_response(pdu),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(self.exhausted(last_error, request_id, start.elapsed(), max_attempts))
    }

    /// Receive datagrams until one decodes to a response matching
    /// `request_id` or the attempt deadline passes.
    ///
    /// A well-formed response with the wrong request id is a stale
    /// retransmission answer; it is skipped, not an error.
    async fn recv_response(&self, request_id: i32) -> Result<Pdu> {
        let timeout = self.inner.config.timeout;
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout {
                    target: Some(self.peer_addr()),
                    elapsed: timeout,
                    request_id,
                    retries: 0,
                });
            }

            let (data, _source) = self.inner.transport.recv(request_id, remaining).await?;
            let message = Message::decode(data)?;

            let version = message.version();
            if version != self.inner.config.version {
                return Err(Error::VersionMismatch {
                    expected: self.inner.config.version,
                    actual: version,
                });
            }

            let Some(pdu) = message.into_pdu() else {
                continue;
            };
            if pdu.request_id != request_id {
                tracing::debug!(
                    expected = request_id,
                    actual = pdu.request_id,
                    "skipping response with stale request id"
                );
                continue;
            }
            return Ok(pdu);
        }
    }

    /// Validate PDU type and agent error-status.
    fn check_response(&self, pdu: Pdu) -> Result<Pdu> {
        if pdu.pdu_type != PduType::Response {
            return Err(Error::protocol(
                Some(self.peer_addr()),
                ProtocolErrorKind::UnexpectedPduType(pdu.pdu_type.tag()),
            ));
        }
        if pdu.is_error() {
            return Err(Error::Snmp {
                target: Some(self.peer_addr()),
                status: pdu.error_status_enum(),
                index: pdu.error_index.max(0) as u32,
                oid: pdu.error_varbind().map(|vb| vb.oid.clone()),
            });
        }
        tracing::debug!(
            snmp.target = %self.peer_addr(),
            snmp.varbind_count = pdu.varbinds.len(),
            "received response"
        );
        Ok(pdu)
    }

    fn expect_varbind_count(&self, expected: usize, varbinds: &[VarBind]) -> Result<()> {
        if varbinds.len() != expected {
            return Err(Error::protocol(
                Some(self.peer_addr()),
                ProtocolErrorKind::VarBindCountMismatch {
                    expected,
                    actual: varbinds.len(),
                },
            ));
        }
        Ok(())
    }

    fn max_attempts(&self) -> u32 {
        if self.inner.transport.is_stream() {
            0
        } else {
            self.inner.config.retry.max_attempts
        }
    }

    /// Final error after all attempts timed out.
    fn exhausted(
        &self,
        last_error: Option<Error>,
        request_id: i32,
        elapsed: Duration,
        retries: u32,
    ) -> Error {
        tracing::debug!(
            snmp.target = %self.peer_addr(),
            snmp.request_id = request_id,
            ?elapsed,
            retries,
            "request timed out"
        );
        match last_error {
            Some(Error::Timeout { target, .. }) => Error::Timeout {
                target,
                elapsed,
                request_id,
                retries,
            },
            Some(other) => other,
            None => Error::Timeout {
                target: Some(self.peer_addr()),
                elapsed,
                request_id,
                retries,
            },
        }
    }
}

/// Seed for the per-session request-id counter.
fn initial_request_id() -> i32 {
    let mut bytes = [0u8; 4];
    if getrandom::fill(&mut bytes).is_err() {
        return 0;
    }
    i32::from_be_bytes(bytes) & i32::MAX
}

fn resolve(target: &str) -> Result<SocketAddr> {
    target
        .to_socket_addrs()
        .map_err(|source| Error::Io {
            target: None,
            source,
        })?
        .next()
        .ok_or_else(|| Error::Io {
            target: None,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "could not resolve address"),
        })
}

macro_rules! impl_common_builder_methods {
    ($builder:ty) => {
        impl $builder {
            /// Per-attempt response timeout.
            pub fn timeout(mut self, timeout: Duration) -> Self {
                self.config.timeout = timeout;
                self
            }

            /// Full retry policy.
            pub fn retry(mut self, retry: Retry) -> Self {
                self.config.retry = retry;
                self
            }

            /// Number of immediate retries on timeout.
            pub fn retries(mut self, retries: u32) -> Self {
                self.config.retry.max_attempts = retries;
                self
            }

            /// Cap on results from a single walk.
            pub fn max_walk_iterations(mut self, max: usize) -> Self {
                self.config.max_walk_iterations = max;
                self
            }

            /// Connect over UDP.
            pub async fn connect(self) -> Result<Session<UdpTransport>> {
                let addr = resolve(&self.target)?;
                let transport = UdpTransport::connect(addr).await?;
                Ok(self.build(transport))
            }
        }
    };
}

/// Builder for v1/v2c sessions. Created by [`Session::v1`] / [`Session::v2c`].
pub struct CommunitySessionBuilder {
    target: String,
    config: SessionConfig,
}

impl CommunitySessionBuilder {
    fn new(target: impl Into<String>, version: Version) -> Self {
        Self {
            target: target.into(),
            config: SessionConfig {
                version,
                ..SessionConfig::default()
            },
        }
    }

    /// Community string (default "public").
    pub fn community(mut self, community: impl Into<Bytes>) -> Self {
        self.config.community = community.into();
        self
    }

    /// Build over a pre-supplied transport.
    pub fn build<T: Transport>(self, transport: T) -> Session<T> {
        Session::new(transport, self.config)
    }
}

impl_common_builder_methods!(CommunitySessionBuilder);

/// Builder for v3 sessions. Created by [`Session::v3`].
pub struct V3SessionBuilder {
    target: String,
    config: SessionConfig,
    engine_cache: Option<Arc<EngineCache>>,
}

impl V3SessionBuilder {
    fn new(target: impl Into<String>, username: impl Into<Bytes>) -> Self {
        Self {
            target: target.into(),
            config: SessionConfig {
                version: Version::V3,
                v3_security: Some(V3SecurityConfig::new(username)),
                ..SessionConfig::default()
            },
            engine_cache: None,
        }
    }

    /// Enable authentication (authNoPriv, or authPriv with `.privacy()`).
    pub fn auth(
        mut self,
        protocol: crate::usm::AuthProtocol,
        password: impl Into<Vec<u8>>,
    ) -> Self {
        if let Some(security) = self.config.v3_security.take() {
            self.config.v3_security = Some(security.auth(protocol, password));
        }
        self
    }

    /// Enable encryption (requires `.auth()`).
    pub fn privacy(
        mut self,
        protocol: crate::usm::PrivProtocol,
        password: impl Into<Vec<u8>>,
    ) -> Self {
        if let Some(security) = self.config.v3_security.take() {
            self.config.v3_security = Some(security.privacy(protocol, password));
        }
        self
    }

    /// Share engine discovery state across sessions polling the same
    /// agents.
    pub fn engine_cache(mut self, cache: Arc<EngineCache>) -> Self {
        self.engine_cache = Some(cache);
        self
    }

    /// Build over a pre-supplied transport.
    pub fn build<T: Transport>(self, transport: T) -> Session<T> {
        match self.engine_cache {
            Some(cache) => Session::with_engine_cache(transport, self.config, cache),
            None => Session::new(transport, self.config),
        }
    }
}

impl_common_builder_methods!(V3SessionBuilder);
