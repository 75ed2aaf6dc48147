//! SNMPv3 request path: engine discovery, signing, encryption, and
//! Report handling.
//!
//! Discovery runs lazily before the first request (RFC 3414 Section 4):
//! an unauthenticated probe returns the agent's engine ID, boots, and
//! time, from which the session derives its localized keys. Responses
//! are MAC-verified, window-checked, and decrypted before the PDU is
//! handed back to the operation layer. A usmStatsNotInTimeWindows
//! Report triggers exactly one transparent resync retry.

use std::time::Instant;

use bytes::Bytes;

use crate::ber::Decoder;
use crate::error::{
    AuthErrorKind, CryptoErrorKind, EncodeErrorKind, Error, ProtocolErrorKind, Result,
};
use crate::message::{
    DEFAULT_MSG_MAX_SIZE, MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message,
    V3MessageData,
};
use crate::pdu::{Pdu, PduType};
use crate::transport::Transport;
use crate::usm::{
    AuthKey, AuthProtocol, EngineState, PrivKey, PrivProtocol, ReportKind, UsmSecurityParams,
    parse_discovery_response,
};

use super::Session;

/// SNMPv3 USM credentials.
///
/// The security level follows from what is configured: no auth means
/// noAuthNoPriv, auth alone means authNoPriv, auth plus privacy means
/// authPriv. Privacy without authentication is not a valid level and
/// is ignored.
#[derive(Clone)]
pub struct V3SecurityConfig {
    /// USM user name.
    pub username: Bytes,
    /// Authentication protocol and password.
    pub auth: Option<(AuthProtocol, Vec<u8>)>,
    /// Privacy protocol and password.
    pub privacy: Option<(PrivProtocol, Vec<u8>)>,
}

impl V3SecurityConfig {
    /// noAuthNoPriv credentials for `username`.
    pub fn new(username: impl Into<Bytes>) -> Self {
        Self {
            username: username.into(),
            auth: None,
            privacy: None,
        }
    }

    pub fn auth(mut self, protocol: AuthProtocol, password: impl Into<Vec<u8>>) -> Self {
        self.auth = Some((protocol, password.into()));
        self
    }

    pub fn privacy(mut self, protocol: PrivProtocol, password: impl Into<Vec<u8>>) -> Self {
        self.privacy = Some((protocol, password.into()));
        self
    }

    pub fn security_level(&self) -> SecurityLevel {
        match (&self.auth, &self.privacy) {
            (None, _) => SecurityLevel::NoAuthNoPriv,
            (Some(_), None) => SecurityLevel::AuthNoPriv,
            (Some(_), Some(_)) => SecurityLevel::AuthPriv,
        }
    }

    /// Localize keys to a discovered engine ID.
    pub(crate) fn derive_keys(&self, engine_id: &[u8]) -> DerivedKeys {
        let auth_key = self
            .auth
            .as_ref()
            .map(|(protocol, password)| AuthKey::from_password(*protocol, password, engine_id));

        let priv_key = match (&self.auth, &self.privacy) {
            (Some((auth_protocol, _)), Some((priv_protocol, password))) => Some(
                PrivKey::from_password(*auth_protocol, *priv_protocol, password, engine_id),
            ),
            _ => None,
        };

        DerivedKeys { auth_key, priv_key }
    }
}

impl std::fmt::Debug for V3SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V3SecurityConfig")
            .field("username", &String::from_utf8_lossy(&self.username))
            .field("auth", &self.auth.as_ref().map(|(p, _)| p))
            .field("privacy", &self.privacy.as_ref().map(|(p, _)| p))
            .finish()
    }
}

/// Keys localized to one engine ID.
pub(crate) struct DerivedKeys {
    pub(crate) auth_key: Option<AuthKey>,
    pub(crate) priv_key: Option<PrivKey>,
}

/// A decoded, verified, decrypted v3 exchange result.
struct V3Response {
    pdu: Pdu,
    usm: UsmSecurityParams,
}

impl<T: Transport> Session<T> {
    pub(super) async fn transact_v3(&self, pdu: Pdu) -> Result<Pdu> {
        self.ensure_discovered().await?;

        let level = self
            .config()
            .v3_security
            .as_ref()
            .ok_or_else(|| Error::encode(EncodeErrorKind::NoSecurityConfig))?
            .security_level();
        let request_id = pdu.request_id;

        let start = Instant::now();
        let max_attempts = self.v3_max_attempts();
        let mut resynced = false;
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                let delay = self.config().retry.compute_delay(attempt - 1);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                tracing::debug!(attempt, "retrying v3 request");
            }

            // Rebuilt each attempt so boots/time reflect the latest sync.
            let data = self.build_v3_message(&pdu, level)?;
            self.transport().send(&data).await?;

            match self.recv_v3(request_id, level).await {
                Ok(response) => {
                    if response.pdu.pdu_type == PduType::Report {
                        match self.handle_report(&response, &mut resynced) {
                            ReportAction::Resync => continue,
                            ReportAction::Fail(err) => return Err(err),
                        }
                    }

                    if level.requires_auth() {
                        if !self.engine_in_window(&response.usm) {
                            return Err(Error::NotInTimeWindow {
                                target: Some(self.peer_addr()),
                            });
                        }
                        self.update_engine_time(&response.usm);
                    }

                    return self.check_response(response.pdu);
                }
                Err(e) if e.is_retryable() => {
                    if attempt >= max_attempts {
                        return Err(self.exhausted(
                            Some(e),
                            request_id,
                            start.elapsed(),
                            max_attempts,
                        ));
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Discover the agent's engine if this session hasn't yet.
    pub(super) async fn ensure_discovered(&self) -> Result<()> {
        if self.engine_snapshot().is_some() {
            return Ok(());
        }

        // Shared cache may already know this agent.
        if let Some(cache) = &self.inner.engine_cache
            && let Some(state) = cache.get(&self.peer_addr())
        {
            tracing::debug!(
                snmp.target = %self.peer_addr(),
                "using cached engine state"
            );
            self.adopt_engine(state, false);
            return Ok(());
        }

        let msg_id = self.next_request_id();
        let probe = V3Message::discovery_request(msg_id).encode();

        let max_attempts = self.v3_max_attempts();
        let start = Instant::now();
        let mut last_error = None;

        for attempt in 0..=max_attempts {
            if attempt > 0 {
                let delay = self.config().retry.compute_delay(attempt - 1);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            self.transport().send(&probe).await?;
            match self.recv_discovery(msg_id).await {
                Ok(state) => {
                    tracing::debug!(
                        snmp.target = %self.peer_addr(),
                        snmp.engine_boots = state.engine_boots,
                        snmp.engine_time = state.engine_time,
                        "discovered engine"
                    );
                    self.adopt_engine(state, true);
                    return Ok(());
                }
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(self.exhausted(last_error, msg_id, start.elapsed(), max_attempts))
    }

    /// Receive until a discovery Report matching `msg_id` arrives or the
    /// attempt deadline passes.
    async fn recv_discovery(&self, msg_id: i32) -> Result<EngineState> {
        let timeout = self.config().timeout;
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout {
                    target: Some(self.peer_addr()),
                    elapsed: timeout,
                    request_id: msg_id,
                    retries: 0,
                });
            }

            let (data, _source) = self.transport().recv(msg_id, remaining).await?;
            let message = V3Message::decode(data)?;
            if message.msg_id() != msg_id {
                continue;
            }
            return parse_discovery_response(message.security_params);
        }
    }

    /// Encode, optionally encrypt, and sign one outgoing message.
    fn build_v3_message(&self, pdu: &Pdu, level: SecurityLevel) -> Result<Vec<u8>> {
        let security = self
            .config()
            .v3_security
            .as_ref()
            .ok_or_else(|| Error::encode(EncodeErrorKind::NoSecurityConfig))?;
        let engine = self
            .engine_snapshot()
            .ok_or_else(|| Error::encode(EncodeErrorKind::EngineNotDiscovered))?;
        let keys = self.inner.keys.read().expect("keys lock poisoned");

        let msg_id = pdu.request_id;
        let engine_boots = engine.engine_boots;
        let engine_time = engine.estimated_time();
        let scoped_pdu = ScopedPdu::new(engine.engine_id.clone(), Bytes::new(), pdu.clone());

        let (data, priv_params) = if level.requires_priv() {
            let priv_key = keys
                .as_ref()
                .and_then(|k| k.priv_key.as_ref())
                .ok_or_else(|| Error::encode(EncodeErrorKind::NoPrivKey))?;
            let (ciphertext, salt) =
                priv_key.encrypt(&scoped_pdu.encode_to_bytes(), engine_boots, engine_time)?;
            (V3MessageData::Encrypted(ciphertext), salt)
        } else {
            (V3MessageData::Plaintext(scoped_pdu), Bytes::new())
        };

        let mut usm = UsmSecurityParams::new(
            engine.engine_id.clone(),
            engine_boots,
            engine_time,
            security.username.clone(),
        );
        let auth_key = if level.requires_auth() {
            let key = keys
                .as_ref()
                .and_then(|k| k.auth_key.as_ref())
                .ok_or_else(|| Error::encode(EncodeErrorKind::MissingAuthKey))?;
            usm = usm.with_auth_placeholder(key.mac_len());
            Some(key)
        } else {
            None
        };
        if level.requires_priv() {
            usm = usm.with_priv_params(priv_params);
        }

        let global_data = MsgGlobalData::new(msg_id, DEFAULT_MSG_MAX_SIZE, MsgFlags::new(level, true));
        let message = V3Message {
            global_data,
            security_params: usm.encode(),
            data,
        };
        let mut encoded = message.encode().to_vec();

        if let Some(key) = auth_key {
            let (offset, _len) = UsmSecurityParams::locate_auth_params(&encoded)
                .ok_or_else(|| Error::encode(EncodeErrorKind::MissingAuthParams))?;
            key.sign_message(&mut encoded, offset);
        }

        Ok(encoded)
    }

    /// Receive datagrams until a verified message matching `request_id`
    /// arrives or the attempt deadline passes.
    ///
    /// Reports pass through with any request id; they answer the
    /// exchange as a whole. Stale response ids are skipped.
    async fn recv_v3(&self, request_id: i32, level: SecurityLevel) -> Result<V3Response> {
        let timeout = self.config().timeout;
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

            let (data, _source) = self.transport().recv(request_id, remaining).await?;
            let message = V3Message::decode(data.clone())?;
            if message.msg_id() != request_id {
                tracing::debug!(
                    expected = request_id,
                    actual = message.msg_id(),
                    "skipping v3 message with stale msg id"
                );
                continue;
            }

            let usm = UsmSecurityParams::decode(message.security_params.clone())?;
            let is_report = matches!(message.pdu(), Some(pdu) if pdu.pdu_type == PduType::Report);

            // Agents answer engine-id and time-window failures with
            // unauthenticated Reports; everything else must carry a MAC.
            if level.requires_auth() && !(is_report && usm.auth_params.is_empty()) {
                self.verify_auth(&data, &usm)?;
            }

            let pdu = match message.data {
                V3MessageData::Plaintext(scoped) => scoped.pdu,
                V3MessageData::Encrypted(ciphertext) => self.decrypt_scoped_pdu(
                    &ciphertext,
                    &usm,
                )?,
            };

            if pdu.pdu_type != PduType::Report && pdu.request_id != request_id {
                tracing::debug!(
                    expected = request_id,
                    actual = pdu.request_id,
                    "skipping v3 response with stale request id"
                );
                continue;
            }

            return Ok(V3Response { pdu, usm });
        }
    }

    fn verify_auth(&self, data: &[u8], usm: &UsmSecurityParams) -> Result<()> {
        let keys = self.inner.keys.read().expect("keys lock poisoned");
        let key = keys
            .as_ref()
            .and_then(|k| k.auth_key.as_ref())
            .ok_or_else(|| Error::auth(Some(self.peer_addr()), AuthErrorKind::NoAuthKey))?;

        if usm.auth_params.len() != key.mac_len() {
            return Err(Error::auth(
                Some(self.peer_addr()),
                AuthErrorKind::WrongMacLength {
                    expected: key.mac_len(),
                    actual: usm.auth_params.len(),
                },
            ));
        }
        let (offset, _len) = UsmSecurityParams::locate_auth_params(data)
            .ok_or_else(|| Error::auth(Some(self.peer_addr()), AuthErrorKind::AuthParamsNotFound))?;
        if !key.verify_message(data, offset) {
            return Err(Error::auth(
                Some(self.peer_addr()),
                AuthErrorKind::HmacMismatch,
            ));
        }
        Ok(())
    }

    fn decrypt_scoped_pdu(&self, ciphertext: &[u8], usm: &UsmSecurityParams) -> Result<Pdu> {
        let keys = self.inner.keys.read().expect("keys lock poisoned");
        let key = keys
            .as_ref()
            .and_then(|k| k.priv_key.as_ref())
            .ok_or_else(|| Error::decrypt(Some(self.peer_addr()), CryptoErrorKind::NoPrivKey))?;

        let plaintext = key.decrypt(
            ciphertext,
            usm.engine_boots,
            usm.engine_time,
            &usm.priv_params,
        )?;
        let mut decoder = Decoder::new(plaintext);
        Ok(ScopedPdu::decode(&mut decoder)?.pdu)
    }

    /// Map a Report PDU to a resync or a typed error.
    fn handle_report(&self, response: &V3Response, resynced: &mut bool) -> ReportAction {
        let target = Some(self.peer_addr());
        match ReportKind::classify(&response.pdu) {
            Some(ReportKind::NotInTimeWindow) => {
                self.resync_engine(&response.usm);
                if !*resynced {
                    *resynced = true;
                    tracing::debug!(
                        snmp.target = %self.peer_addr(),
                        "engine clock out of window, resyncing"
                    );
                    ReportAction::Resync
                } else {
                    ReportAction::Fail(Error::NotInTimeWindow { target })
                }
            }
            Some(ReportKind::UnknownEngineId) => {
                // Force rediscovery on the next request.
                self.clear_engine();
                ReportAction::Fail(Error::UnknownEngineId { target })
            }
            Some(ReportKind::WrongDigest) => {
                ReportAction::Fail(Error::auth(target, AuthErrorKind::WrongDigestReport))
            }
            Some(ReportKind::UnknownUserName) => {
                ReportAction::Fail(Error::auth(target, AuthErrorKind::UnknownUserReport))
            }
            Some(ReportKind::UnsupportedSecLevel) => ReportAction::Fail(Error::auth(
                target,
                AuthErrorKind::UnsupportedSecurityLevelReport,
            )),
            Some(ReportKind::DecryptionError) => ReportAction::Fail(Error::decrypt(
                target,
                CryptoErrorKind::DecryptionErrorReport,
            )),
            None => ReportAction::Fail(Error::protocol(
                target,
                ProtocolErrorKind::UnrecognizedReport,
            )),
        }
    }

    fn engine_snapshot(&self) -> Option<EngineState> {
        self.inner.engine.read().expect("engine lock poisoned").clone()
    }

    /// Install engine state and derive keys for it.
    fn adopt_engine(&self, state: EngineState, publish: bool) {
        if let Some(security) = &self.config().v3_security {
            let keys = security.derive_keys(&state.engine_id);
            *self.inner.keys.write().expect("keys lock poisoned") = Some(keys);
        }
        if publish && let Some(cache) = &self.inner.engine_cache {
            cache.insert(self.peer_addr(), state.clone());
        }
        *self.inner.engine.write().expect("engine lock poisoned") = Some(state);
    }

    fn clear_engine(&self) {
        *self.inner.engine.write().expect("engine lock poisoned") = None;
        *self.inner.keys.write().expect("keys lock poisoned") = None;
        if let Some(cache) = &self.inner.engine_cache {
            cache.remove(&self.peer_addr());
        }
    }

    fn engine_in_window(&self, usm: &UsmSecurityParams) -> bool {
        self.engine_snapshot()
            .is_some_and(|engine| engine.is_in_time_window(usm.engine_boots, usm.engine_time))
    }

    fn update_engine_time(&self, usm: &UsmSecurityParams) {
        let mut engine = self.inner.engine.write().expect("engine lock poisoned");
        if let Some(state) = engine.as_mut() {
            state.update_time(usm.engine_boots, usm.engine_time);
        }
        drop(engine);
        if let Some(cache) = &self.inner.engine_cache {
            cache.update_time(&self.peer_addr(), usm.engine_boots, usm.engine_time);
        }
    }

    /// Adopt the clock a NotInTimeWindows Report carries.
    fn resync_engine(&self, usm: &UsmSecurityParams) {
        let mut engine = self.inner.engine.write().expect("engine lock poisoned");
        if let Some(state) = engine.as_mut() {
            // A resync must also accept a clock that moved backwards
            // relative to our estimate, so replace rather than merge.
            *state = EngineState::new(
                state.engine_id.clone(),
                usm.engine_boots,
                usm.engine_time,
            );
        }
        drop(engine);
        if let Some(cache) = &self.inner.engine_cache {
            cache.update_time(&self.peer_addr(), usm.engine_boots, usm.engine_time);
        }
    }

    fn v3_max_attempts(&self) -> u32 {
        if self.transport().is_stream() {
            0
        } else {
            self.config().retry.max_attempts
        }
    }
}

enum ReportAction {
    /// Rebuild with the resynced clock and resend.
    Resync,
    Fail(Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::session::{Retry, SessionConfig};
    use crate::transport::MockTransport;
    use crate::value::Value;
    use crate::varbind::VarBind;
    use crate::version::Version;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const ENGINE_ID: &[u8] = b"engine-7";
    const USERNAME: &[u8] = b"admin";
    const AUTH_PASSWORD: &[u8] = b"authpass123";
    const PRIV_PASSWORD: &[u8] = b"privpass123";

    /// Session with a known request-id counter so scripted responses can
    /// carry the exact ids the session will use.
    fn v3_session(mock: MockTransport, security: V3SecurityConfig) -> Session<MockTransport> {
        let config = SessionConfig {
            version: Version::V3,
            timeout: Duration::from_millis(100),
            retry: Retry::none(),
            v3_security: Some(security),
            ..SessionConfig::default()
        };
        let session = Session::new(mock, config);
        session.inner.request_id.store(100, Ordering::Relaxed);
        session
    }

    fn auth_config() -> V3SecurityConfig {
        V3SecurityConfig::new(Bytes::from_static(USERNAME))
            .auth(AuthProtocol::Sha1, AUTH_PASSWORD.to_vec())
    }

    /// An unauthenticated Report, as agents send for discovery and
    /// engine-state failures.
    fn report(msg_id: i32, kind: ReportKind, boots: u32, time: u32) -> Bytes {
        let pdu = Pdu {
            pdu_type: PduType::Report,
            request_id: msg_id,
            error_status: 0,
            error_index: 0,
            varbinds: vec![VarBind::new(kind.oid(), Value::Counter32(1))],
        };
        let usm = UsmSecurityParams::new(ENGINE_ID, boots, time, Bytes::new());
        V3Message::new(
            MsgGlobalData::new(
                msg_id,
                DEFAULT_MSG_MAX_SIZE,
                MsgFlags::new(SecurityLevel::NoAuthNoPriv, false),
            ),
            usm.encode(),
            ScopedPdu::new(ENGINE_ID, Bytes::new(), pdu),
        )
        .encode()
    }

    fn sys_descr_response(request_id: i32) -> Pdu {
        Pdu {
            pdu_type: PduType::Response,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds: vec![VarBind::new(
                oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
                Value::OctetString("Linux agent 6.1".into()),
            )],
        }
    }

    fn plaintext_response(msg_id: i32, boots: u32, time: u32) -> Bytes {
        let usm = UsmSecurityParams::new(ENGINE_ID, boots, time, Bytes::from_static(USERNAME));
        V3Message::new(
            MsgGlobalData::new(
                msg_id,
                DEFAULT_MSG_MAX_SIZE,
                MsgFlags::new(SecurityLevel::NoAuthNoPriv, false),
            ),
            usm.encode(),
            ScopedPdu::new(ENGINE_ID, Bytes::new(), sys_descr_response(msg_id)),
        )
        .encode()
    }

    /// An authNoPriv Response signed with keys derived from `password`.
    fn signed_response(msg_id: i32, boots: u32, time: u32, password: &[u8]) -> Bytes {
        let key = AuthKey::from_password(AuthProtocol::Sha1, password, ENGINE_ID);
        let usm = UsmSecurityParams::new(ENGINE_ID, boots, time, Bytes::from_static(USERNAME))
            .with_auth_placeholder(key.mac_len());
        let message = V3Message::new(
            MsgGlobalData::new(
                msg_id,
                DEFAULT_MSG_MAX_SIZE,
                MsgFlags::new(SecurityLevel::AuthNoPriv, false),
            ),
            usm.encode(),
            ScopedPdu::new(ENGINE_ID, Bytes::new(), sys_descr_response(msg_id)),
        );
        let mut encoded = message.encode().to_vec();
        let (offset, _len) = UsmSecurityParams::locate_auth_params(&encoded).unwrap();
        key.sign_message(&mut encoded, offset);
        Bytes::from(encoded)
    }

    #[tokio::test]
    async fn noauth_get_discovers_engine_first() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        // Probe answer (msg id 101), then the response to the GET (100).
        mock.queue_raw_response(report(101, ReportKind::UnknownEngineId, 3, 1000));
        mock.queue_raw_response(plaintext_response(100, 3, 1000));

        let security = V3SecurityConfig::new(Bytes::from_static(USERNAME));
        let session = v3_session(mock.clone(), security);

        let vb = session.get_one(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await.unwrap();
        assert_eq!(vb.value, Value::OctetString("Linux agent 6.1".into()));
        assert_eq!(mock.requests().len(), 2);

        let engine = session.inner.engine.read().unwrap();
        let engine = engine.as_ref().unwrap();
        assert_eq!(engine.engine_id.as_ref(), ENGINE_ID);
        assert_eq!(engine.engine_boots, 3);
    }

    #[tokio::test]
    async fn authenticated_get_verifies_mac() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_raw_response(report(101, ReportKind::UnknownEngineId, 3, 1000));
        mock.queue_raw_response(signed_response(100, 3, 1005, AUTH_PASSWORD));

        let session = v3_session(mock, auth_config());
        let vb = session.get_one(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await.unwrap();
        assert_eq!(vb.value, Value::OctetString("Linux agent 6.1".into()));
    }

    #[tokio::test]
    async fn bad_mac_is_rejected() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_raw_response(report(101, ReportKind::UnknownEngineId, 3, 1000));
        mock.queue_raw_response(signed_response(100, 3, 1005, b"wrongpassword"));

        let session = v3_session(mock, auth_config());
        let err = session.get(&[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]).await.unwrap_err();
        assert!(matches!(
            err,
            Error::AuthenticationFailed {
                kind: AuthErrorKind::HmacMismatch,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn response_outside_time_window_is_rejected() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_raw_response(report(101, ReportKind::UnknownEngineId, 3, 1000));
        // Boots went backwards: a replayed message from a previous boot.
        mock.queue_raw_response(signed_response(100, 2, 1005, AUTH_PASSWORD));

        let session = v3_session(mock, auth_config());
        let err = session.get(&[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]).await.unwrap_err();
        assert!(matches!(err, Error::NotInTimeWindow { .. }));
    }

    #[tokio::test]
    async fn time_window_report_triggers_one_resync() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_raw_response(report(101, ReportKind::UnknownEngineId, 3, 1000));
        // Agent rejects the first attempt and supplies its real clock.
        mock.queue_raw_response(report(100, ReportKind::NotInTimeWindow, 9, 500));
        mock.queue_raw_response(signed_response(100, 9, 502, AUTH_PASSWORD));

        let session = v3_session(mock.clone(), auth_config());
        let vb = session.get_one(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await.unwrap();
        assert_eq!(vb.value, Value::OctetString("Linux agent 6.1".into()));
        // Probe, first attempt, resynced attempt.
        assert_eq!(mock.requests().len(), 3);

        let engine = session.inner.engine.read().unwrap();
        assert_eq!(engine.as_ref().unwrap().engine_boots, 9);
    }

    #[tokio::test]
    async fn second_time_window_report_is_an_error() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_raw_response(report(101, ReportKind::UnknownEngineId, 3, 1000));
        mock.queue_raw_response(report(100, ReportKind::NotInTimeWindow, 9, 500));
        mock.queue_raw_response(report(100, ReportKind::NotInTimeWindow, 9, 500));

        let session = v3_session(mock, auth_config());
        let err = session.get(&[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]).await.unwrap_err();
        assert!(matches!(err, Error::NotInTimeWindow { .. }));
    }

    #[tokio::test]
    async fn unknown_engine_report_clears_state() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_raw_response(report(101, ReportKind::UnknownEngineId, 3, 1000));
        mock.queue_raw_response(report(100, ReportKind::UnknownEngineId, 0, 0));

        let session = v3_session(mock, auth_config());
        let err = session.get(&[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]).await.unwrap_err();
        assert!(matches!(err, Error::UnknownEngineId { .. }));
        assert!(session.inner.engine.read().unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_user_report_maps_to_auth_error() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_raw_response(report(101, ReportKind::UnknownEngineId, 3, 1000));
        mock.queue_raw_response(report(100, ReportKind::UnknownUserName, 3, 1000));

        let session = v3_session(mock, auth_config());
        let err = session.get(&[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]).await.unwrap_err();
        assert!(matches!(
            err,
            Error::AuthenticationFailed {
                kind: AuthErrorKind::UnknownUserReport,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn encrypted_response_round_trips() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_raw_response(report(101, ReportKind::UnknownEngineId, 3, 1000));

        // Encrypt and sign the response the way the agent would.
        let auth_key = AuthKey::from_password(AuthProtocol::Sha1, AUTH_PASSWORD, ENGINE_ID);
        let priv_key = PrivKey::from_password(
            AuthProtocol::Sha1,
            PrivProtocol::Aes128,
            PRIV_PASSWORD,
            ENGINE_ID,
        );
        let scoped = ScopedPdu::new(ENGINE_ID, Bytes::new(), sys_descr_response(100));
        let (ciphertext, priv_params) = priv_key
            .encrypt(&scoped.encode_to_bytes(), 3, 1005)
            .unwrap();
        let usm = UsmSecurityParams::new(ENGINE_ID, 3, 1005, Bytes::from_static(USERNAME))
            .with_auth_placeholder(auth_key.mac_len())
            .with_priv_params(priv_params);
        let message = V3Message::new_encrypted(
            MsgGlobalData::new(
                100,
                DEFAULT_MSG_MAX_SIZE,
                MsgFlags::new(SecurityLevel::AuthPriv, false),
            ),
            usm.encode(),
            ciphertext,
        );
        let mut encoded = message.encode().to_vec();
        let (offset, _len) = UsmSecurityParams::locate_auth_params(&encoded).unwrap();
        auth_key.sign_message(&mut encoded, offset);
        mock.queue_raw_response(Bytes::from(encoded));

        let security = auth_config().privacy(PrivProtocol::Aes128, PRIV_PASSWORD.to_vec());
        let session = v3_session(mock, security);
        let vb = session.get_one(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await.unwrap();
        assert_eq!(vb.value, Value::OctetString("Linux agent 6.1".into()));
    }

    #[tokio::test]
    async fn stale_msg_id_is_skipped() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_raw_response(report(101, ReportKind::UnknownEngineId, 3, 1000));
        // Answer to some other request, then the real one.
        mock.queue_raw_response(plaintext_response(77, 3, 1000));
        mock.queue_raw_response(plaintext_response(100, 3, 1000));

        let security = V3SecurityConfig::new(Bytes::from_static(USERNAME));
        let session = v3_session(mock, security);
        let vb = session.get_one(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await.unwrap();
        assert_eq!(vb.value, Value::OctetString("Linux agent 6.1".into()));
    }

    #[tokio::test]
    async fn exhausted_retries_report_final_timeout() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        // Discovery succeeds; every GET attempt then times out.
        mock.queue_raw_response(report(101, ReportKind::UnknownEngineId, 3, 1000));

        let config = SessionConfig {
            version: Version::V3,
            timeout: Duration::from_millis(10),
            retry: Retry::fixed(2, Duration::ZERO),
            v3_security: Some(V3SecurityConfig::new(Bytes::from_static(USERNAME))),
            ..SessionConfig::default()
        };
        let session = Session::new(mock.clone(), config);
        session.inner.request_id.store(100, Ordering::Relaxed);

        let err = session.get(&[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { retries: 2, .. }));
        // One probe plus the original send and two retries.
        assert_eq!(mock.requests().len(), 4);
    }

    #[test]
    fn security_level_follows_credentials() {
        let config = V3SecurityConfig::new(Bytes::from_static(b"user"));
        assert_eq!(config.security_level(), SecurityLevel::NoAuthNoPriv);

        let config = config.auth(AuthProtocol::Sha256, b"authpass".to_vec());
        assert_eq!(config.security_level(), SecurityLevel::AuthNoPriv);

        let config = config.privacy(PrivProtocol::Aes128, b"privpass".to_vec());
        assert_eq!(config.security_level(), SecurityLevel::AuthPriv);
    }

    #[test]
    fn privacy_without_auth_is_noauthnopriv() {
        let config = V3SecurityConfig::new(Bytes::from_static(b"user"))
            .privacy(PrivProtocol::Des, b"privpass".to_vec());
        assert_eq!(config.security_level(), SecurityLevel::NoAuthNoPriv);
    }

    #[test]
    fn derived_keys_match_credentials() {
        let engine_id = b"engine-1";

        let keys = V3SecurityConfig::new(Bytes::from_static(b"user")).derive_keys(engine_id);
        assert!(keys.auth_key.is_none());
        assert!(keys.priv_key.is_none());

        let keys = V3SecurityConfig::new(Bytes::from_static(b"user"))
            .auth(AuthProtocol::Sha1, b"authpass".to_vec())
            .privacy(PrivProtocol::Aes128, b"privpass".to_vec())
            .derive_keys(engine_id);
        let auth_key = keys.auth_key.unwrap();
        assert_eq!(auth_key.protocol(), AuthProtocol::Sha1);
        assert_eq!(auth_key.as_bytes().len(), 20);
        assert_eq!(keys.priv_key.unwrap().protocol(), PrivProtocol::Aes128);
    }

    #[test]
    fn debug_redacts_passwords() {
        let config = V3SecurityConfig::new(Bytes::from_static(b"admin"))
            .auth(AuthProtocol::Md5, b"supersecret".to_vec());
        let text = format!("{config:?}");
        assert!(text.contains("admin"));
        assert!(!text.contains("supersecret"));
    }
}
