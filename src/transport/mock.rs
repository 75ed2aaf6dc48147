//! Programmable in-memory transport for tests.

use std::collections::VecDeque;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use super::Transport;
use crate::error::{Error, Result};
use crate::message::Message;

/// A scripted reaction to the next `recv` call.
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Return this data with its request_id patched to match the last
    /// request sent.
    Data(Bytes),
    /// Return this data untouched, for mismatch scenarios.
    RawData(Bytes),
    /// Simulate a receive timeout.
    Timeout,
    /// Simulate an IO error.
    IoError(String),
}

/// A request recorded by [`MockTransport::send`].
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub data: Bytes,
    /// Request ID decoded from the message, when it parses.
    pub request_id: Option<i32>,
}

struct MockInner {
    target: SocketAddr,
    responses: VecDeque<MockResponse>,
    requests: Vec<RecordedRequest>,
    default_response: Option<MockResponse>,
    last_request_id: Option<i32>,
}

/// Mock transport with a scripted response queue.
///
/// Each `send` is recorded; each `recv` pops the next queued response.
/// An empty queue behaves like a timeout unless a default response is
/// set.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockInner>>,
}

impl MockTransport {
    pub fn new(target: SocketAddr) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockInner {
                target,
                responses: VecDeque::new(),
                requests: Vec::new(),
                default_response: None,
                last_request_id: None,
            })),
        }
    }

    /// Queue a response; its request_id is patched to match the request
    /// it answers. Use [`queue_raw_response`](Self::queue_raw_response)
    /// to skip the patching.
    pub fn queue_response(&self, data: impl Into<Bytes>) {
        self.push(MockResponse::Data(data.into()));
    }

    /// Queue a response returned byte-for-byte as given.
    pub fn queue_raw_response(&self, data: impl Into<Bytes>) {
        self.push(MockResponse::RawData(data.into()));
    }

    pub fn queue_timeout(&self) {
        self.push(MockResponse::Timeout);
    }

    pub fn queue_io_error(&self, msg: impl Into<String>) {
        self.push(MockResponse::IoError(msg.into()));
    }

    fn push(&self, response: MockResponse) {
        self.inner.lock().unwrap().responses.push_back(response);
    }

    /// Response used whenever the queue runs dry.
    pub fn set_default_response(&self, response: MockResponse) {
        self.inner.lock().unwrap().default_response = Some(response);
    }

    /// Every request sent so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.lock().unwrap().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.inner.lock().unwrap().requests.clear();
    }

    pub fn queued_response_count(&self) -> usize {
        self.inner.lock().unwrap().responses.len()
    }

    /// Best-effort request ID extraction for recording.
    fn extract_request_id(data: &[u8]) -> Option<i32> {
        let msg = Message::decode(Bytes::copy_from_slice(data)).ok()?;
        msg.pdu().map(|pdu| pdu.request_id)
    }

    /// Rewrite a community response's request_id.
    ///
    /// V3 responses pass through unchanged: rewriting them would break
    /// the MAC, so V3 tests script exact request IDs instead.
    fn patch_request_id(data: Bytes, new_id: i32) -> Bytes {
        match Message::decode(data.clone()) {
            Ok(Message::Community(mut msg)) => {
                msg.pdu.request_id = new_id;
                msg.encode()
            }
            _ => data,
        }
    }
}

impl Transport for MockTransport {
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<()>> + Send {
        let data = Bytes::copy_from_slice(data);
        let request_id = Self::extract_request_id(&data);

        let mut inner = self.inner.lock().unwrap();
        inner.requests.push(RecordedRequest { data, request_id });
        inner.last_request_id = request_id;

        async { Ok(()) }
    }

    fn recv(
        &self,
        request_id: i32,
        timeout: Duration,
    ) -> impl Future<Output = Result<(Bytes, SocketAddr)>> + Send {
        let (response, target, last_request_id) = {
            let mut inner = self.inner.lock().unwrap();
            let response = inner
                .responses
                .pop_front()
                .or_else(|| inner.default_response.clone());
            (response, inner.target, inner.last_request_id)
        };

        async move {
            match response {
                Some(MockResponse::Data(data)) => {
                    let patched = match last_request_id {
                        Some(id) => Self::patch_request_id(data, id),
                        None => data,
                    };
                    Ok((patched, target))
                }
                Some(MockResponse::RawData(data)) => Ok((data, target)),
                Some(MockResponse::IoError(msg)) => Err(Error::Io {
                    target: Some(target),
                    source: std::io::Error::other(msg),
                }),
                Some(MockResponse::Timeout) | None => Err(Error::Timeout {
                    target: Some(target),
                    elapsed: timeout,
                    request_id,
                    retries: 0,
                }),
            }
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.inner.lock().unwrap().target
    }

    fn local_addr(&self) -> SocketAddr {
        "127.0.0.1:0".parse().expect("valid address")
    }

    fn is_stream(&self) -> bool {
        false
    }
}

/// Builder for community response messages used in tests.
pub struct ResponseBuilder {
    request_id: i32,
    varbinds: Vec<crate::varbind::VarBind>,
    error_status: i32,
    error_index: i32,
}

impl ResponseBuilder {
    pub fn new(request_id: i32) -> Self {
        Self {
            request_id,
            varbinds: Vec::new(),
            error_status: 0,
            error_index: 0,
        }
    }

    pub fn varbind(mut self, oid: crate::Oid, value: impl Into<crate::Value>) -> Self {
        self.varbinds.push(crate::varbind::VarBind::new(oid, value));
        self
    }

    pub fn error_status(mut self, status: i32) -> Self {
        self.error_status = status;
        self
    }

    pub fn error_index(mut self, index: i32) -> Self {
        self.error_index = index;
        self
    }

    fn build(self, version: crate::Version, community: &[u8]) -> Bytes {
        use crate::message::CommunityMessage;
        use crate::pdu::{Pdu, PduType};

        let pdu = Pdu {
            pdu_type: PduType::Response,
            request_id: self.request_id,
            error_status: self.error_status,
            error_index: self.error_index,
            varbinds: self.varbinds,
        };
        CommunityMessage::new(version, Bytes::copy_from_slice(community), pdu).encode()
    }

    pub fn build_v1(self, community: &[u8]) -> Bytes {
        self.build(crate::Version::V1, community)
    }

    pub fn build_v2c(self, community: &[u8]) -> Bytes {
        self.build(crate::Version::V2c, community)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Value, oid};

    fn mock() -> MockTransport {
        MockTransport::new("127.0.0.1:161".parse().unwrap())
    }

    #[tokio::test]
    async fn queued_response_is_returned_with_patched_id() {
        let mock = mock();
        let response = ResponseBuilder::new(999)
            .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::OctetString("x".into()))
            .build_v2c(b"public");
        mock.queue_response(response);

        // A real v2c GET so the mock can read the request_id.
        let request = crate::message::CommunityMessage::v2c(
            Bytes::from_static(b"public"),
            crate::pdu::Pdu::get_request(42, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]),
        )
        .encode();
        mock.send(&request).await.unwrap();

        let (data, _) = mock.recv(42, Duration::from_secs(1)).await.unwrap();
        let msg = Message::decode(data).unwrap();
        assert_eq!(msg.pdu().unwrap().request_id, 42);
    }

    #[tokio::test]
    async fn raw_response_is_not_patched() {
        let mock = mock();
        let response = ResponseBuilder::new(999).build_v2c(b"public");
        mock.queue_raw_response(response);

        let request = crate::message::CommunityMessage::v2c(
            Bytes::from_static(b"public"),
            crate::pdu::Pdu::get_request(42, &[oid!(1, 3, 6, 1)]),
        )
        .encode();
        mock.send(&request).await.unwrap();

        let (data, _) = mock.recv(42, Duration::from_secs(1)).await.unwrap();
        let msg = Message::decode(data).unwrap();
        assert_eq!(msg.pdu().unwrap().request_id, 999);
    }

    #[tokio::test]
    async fn empty_queue_times_out() {
        let mock = mock();
        let err = mock.recv(5, Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { request_id: 5, .. }));
    }

    #[tokio::test]
    async fn io_error_is_surfaced() {
        let mock = mock();
        mock.queue_io_error("connection refused");
        let err = mock.recv(1, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[tokio::test]
    async fn requests_are_recorded() {
        let mock = mock();
        mock.send(b"one").await.unwrap();
        mock.send(b"two").await.unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].data.as_ref(), b"one");
        // Unparseable bytes record no request_id.
        assert_eq!(requests[0].request_id, None);

        mock.clear_requests();
        assert!(mock.requests().is_empty());
    }
}
