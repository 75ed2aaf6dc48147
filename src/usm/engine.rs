//! Authoritative engine discovery and time synchronization
//! (RFC 3414 Sections 2.3 and 4).
//!
//! Before an authenticated exchange, the client must learn the agent's
//! engine ID, boot counter, and engine time. Discovery sends an
//! unauthenticated probe; the agent answers with a Report PDU whose USM
//! parameters carry all three. The client then tracks the engine clock
//! locally and rejects responses outside the 150-second time window.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::RwLock;
use std::time::Instant;

use bytes::Bytes;

use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::usm::UsmSecurityParams;

/// Replay window in seconds (RFC 3414 Section 2.2.3).
pub const TIME_WINDOW: u32 = 150;

/// snmpEngineTime and snmpEngineBoots are 31-bit values; when boots
/// latches at this maximum the engine refuses authenticated traffic.
pub const MAX_ENGINE_TIME: u32 = 2_147_483_647;

/// usmStats counters reported by agents (RFC 3414 Section 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    UnsupportedSecLevel,
    NotInTimeWindow,
    UnknownUserName,
    UnknownEngineId,
    WrongDigest,
    DecryptionError,
}

impl ReportKind {
    /// The usmStats instance OID for this counter.
    pub fn oid(self) -> Oid {
        let leaf = match self {
            Self::UnsupportedSecLevel => 1,
            Self::NotInTimeWindow => 2,
            Self::UnknownUserName => 3,
            Self::UnknownEngineId => 4,
            Self::WrongDigest => 5,
            Self::DecryptionError => 6,
        };
        Oid::from([1, 3, 6, 1, 6, 3, 15, 1, 1, leaf, 0])
    }

    /// Classify a Report PDU by its usmStats varbind.
    ///
    /// Returns `None` for non-Report PDUs and for reports carrying an
    /// OID outside the usmStats subtree.
    pub fn classify(pdu: &Pdu) -> Option<Self> {
        if pdu.pdu_type != PduType::Report {
            return None;
        }
        const ALL: [ReportKind; 6] = [
            ReportKind::UnsupportedSecLevel,
            ReportKind::NotInTimeWindow,
            ReportKind::UnknownUserName,
            ReportKind::UnknownEngineId,
            ReportKind::WrongDigest,
            ReportKind::DecryptionError,
        ];
        pdu.varbinds
            .iter()
            .find_map(|vb| ALL.into_iter().find(|kind| kind.oid() == vb.oid))
    }
}

/// Discovered state of one authoritative engine.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub engine_id: Bytes,
    pub engine_boots: u32,
    /// Engine time at the moment of the last sync.
    pub engine_time: u32,
    /// Local instant of the last sync; estimated_time() adds the
    /// elapsed wall time to engine_time.
    synced_at: Instant,
    /// Highest engine time seen, for replay rejection
    /// (RFC 3414 Section 3.2 step 7b).
    latest_received_time: u32,
}

impl EngineState {
    pub fn new(engine_id: Bytes, engine_boots: u32, engine_time: u32) -> Self {
        Self {
            engine_id,
            engine_boots,
            engine_time,
            synced_at: Instant::now(),
            latest_received_time: engine_time,
        }
    }

    /// Current estimate of the engine clock, capped at the 31-bit maximum.
    pub fn estimated_time(&self) -> u32 {
        let elapsed = self.synced_at.elapsed().as_secs() as u32;
        self.engine_time
            .saturating_add(elapsed)
            .min(MAX_ENGINE_TIME)
    }

    /// Advance the local clock estimate from a received message.
    ///
    /// Only moves forward: a higher boot count always wins; within the
    /// same boot cycle the received time must exceed the highest seen so
    /// far. Returns whether the state changed.
    pub fn update_time(&mut self, msg_boots: u32, msg_time: u32) -> bool {
        let newer = msg_boots > self.engine_boots
            || (msg_boots == self.engine_boots && msg_time > self.latest_received_time);
        if newer {
            self.engine_boots = msg_boots;
            self.engine_time = msg_time;
            self.synced_at = Instant::now();
            self.latest_received_time = msg_time;
        }
        newer
    }

    /// Whether a message clock is acceptable (RFC 3414 Section 2.2.3).
    ///
    /// Fails when the local boot counter has latched at its maximum,
    /// when the boot counters differ, or when the times diverge by more
    /// than [`TIME_WINDOW`] seconds.
    pub fn is_in_time_window(&self, msg_boots: u32, msg_time: u32) -> bool {
        self.engine_boots != MAX_ENGINE_TIME
            && msg_boots == self.engine_boots
            && msg_time.abs_diff(self.estimated_time()) <= TIME_WINDOW
    }
}

/// Thread-safe map of discovered engine state, keyed by agent address.
///
/// Share one cache across sessions polling the same agents to skip
/// re-discovery.
#[derive(Debug, Default)]
pub struct EngineCache {
    engines: RwLock<HashMap<SocketAddr, EngineState>>,
}

impl EngineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, target: &SocketAddr) -> Option<EngineState> {
        self.engines.read().ok()?.get(target).cloned()
    }

    pub fn insert(&self, target: SocketAddr, state: EngineState) {
        if let Ok(mut engines) = self.engines.write() {
            engines.insert(target, state);
        }
    }

    /// Advance the clock estimate for a cached engine.
    pub fn update_time(&self, target: &SocketAddr, msg_boots: u32, msg_time: u32) -> bool {
        if let Ok(mut engines) = self.engines.write()
            && let Some(state) = engines.get_mut(target)
        {
            return state.update_time(msg_boots, msg_time);
        }
        false
    }

    pub fn remove(&self, target: &SocketAddr) -> Option<EngineState> {
        self.engines.write().ok()?.remove(target)
    }

    pub fn len(&self) -> usize {
        self.engines.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Clone for EngineCache {
    fn clone(&self) -> Self {
        let engines = self.engines.read().map(|e| e.clone()).unwrap_or_default();
        Self {
            engines: RwLock::new(engines),
        }
    }
}

/// Extract engine state from a discovery response's security parameters.
pub fn parse_discovery_response(security_params: Bytes) -> Result<EngineState> {
    let usm = UsmSecurityParams::decode(security_params)?;
    if usm.engine_id.is_empty() {
        return Err(Error::decode(0, DecodeErrorKind::MissingEngineId));
    }
    Ok(EngineState::new(
        usm.engine_id,
        usm.engine_boots,
        usm.engine_time,
    ))
}
