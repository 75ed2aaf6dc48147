//! Walk streams over an OID subtree.
//!
//! [`Walk`] issues one GETNEXT per result; [`BulkWalk`] fetches
//! GETBULK batches and drains them. Both terminate on EndOfMibView or
//! on the first OID outside the walked subtree, error on a
//! non-increasing OID, and enforce the session's iteration bound so a
//! misbehaving agent cannot produce an unbounded stream.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::error::{Error, ProtocolErrorKind, Result};
use crate::oid::Oid;
use crate::transport::Transport;
use crate::value::Value;
use crate::varbind::VarBind;

use super::Session;

/// Outcome of checking one varbind against the walk's termination and
/// ordering rules.
enum Step {
    Yield(VarBind),
    Finished,
    Fail(Error),
}

/// Shared per-varbind bookkeeping for both walk flavors.
struct WalkState {
    base_oid: Oid,
    /// Last OID yielded to the caller, for non-increasing detection.
    last_oid: Option<Oid>,
    yielded: usize,
    max_iterations: usize,
}

impl WalkState {
    fn new(base_oid: Oid, max_iterations: usize) -> Self {
        Self {
            base_oid,
            last_oid: None,
            yielded: 0,
            max_iterations,
        }
    }

    fn check(&mut self, vb: VarBind) -> Step {
        if matches!(vb.value, Value::EndOfMibView) {
            return Step::Finished;
        }
        if !vb.oid.starts_with(&self.base_oid) {
            return Step::Finished;
        }
        // A repeated or decreasing OID would walk forever.
        if let Some(last_oid) = self.last_oid.take()
            && vb.oid <= last_oid
        {
            return Step::Fail(Error::NonIncreasingOid {
                previous: last_oid,
                current: vb.oid,
            });
        }
        if self.yielded >= self.max_iterations {
            return Step::Fail(Error::protocol(
                None,
                ProtocolErrorKind::WalkLimitExceeded {
                    limit: self.max_iterations,
                },
            ));
        }

        self.yielded += 1;
        self.last_oid = Some(vb.oid.clone());
        Step::Yield(vb)
    }
}

/// Async stream walking an OID subtree with GETNEXT.
///
/// Created by [`Session::walk`]. Yields varbinds in lexicographic
/// order, one request per item.
pub struct Walk<T: Transport> {
    session: Session<T>,
    current_oid: Oid,
    state: WalkState,
    done: bool,
    pending: Option<Pin<Box<dyn Future<Output = Result<VarBind>> + Send>>>,
}

impl<T: Transport> Walk<T> {
    pub(super) fn new(session: Session<T>, root: Oid, max_iterations: usize) -> Self {
        Self {
            session,
            current_oid: root.clone(),
            state: WalkState::new(root, max_iterations),
            done: false,
            pending: None,
        }
    }
}

impl<T: Transport + 'static> Stream for Walk<T> {
    type Item = Result<VarBind>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        if self.pending.is_none() {
            let session = self.session.clone();
            let oid = self.current_oid.clone();
            self.pending = Some(Box::pin(async move {
                session
                    .get_next(std::slice::from_ref(&oid))
                    .await
                    .map(|mut vbs| vbs.remove(0))
            }));
        }

        let pending = self.pending.as_mut().expect("pending future set above");
        match pending.as_mut().poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(result) => {
                self.pending = None;
                match result {
                    Ok(vb) => match self.state.check(vb) {
                        Step::Yield(vb) => {
                            self.current_oid = vb.oid.clone();
                            Poll::Ready(Some(Ok(vb)))
                        }
                        Step::Finished => {
                            self.done = true;
                            Poll::Ready(None)
                        }
                        Step::Fail(e) => {
                            self.done = true;
                            Poll::Ready(Some(Err(e)))
                        }
                    },
                    Err(e) => {
                        self.done = true;
                        Poll::Ready(Some(Err(e)))
                    }
                }
            }
        }
    }
}

/// Async stream walking an OID subtree with GETBULK batches.
///
/// Created by [`Session::bulk_walk`]. A batch is truncated at its
/// first varbind outside the subtree.
pub struct BulkWalk<T: Transport> {
    session: Session<T>,
    current_oid: Oid,
    max_repetitions: i32,
    state: WalkState,
    done: bool,
    buffer: Vec<VarBind>,
    buffer_idx: usize,
    pending: Option<Pin<Box<dyn Future<Output = Result<Vec<VarBind>>> + Send>>>,
}

impl<T: Transport> BulkWalk<T> {
    pub(super) fn new(
        session: Session<T>,
        root: Oid,
        max_repetitions: i32,
        max_iterations: usize,
    ) -> Self {
        Self {
            session,
            current_oid: root.clone(),
            max_repetitions,
            state: WalkState::new(root, max_iterations),
            done: false,
            buffer: Vec::new(),
            buffer_idx: 0,
            pending: None,
        }
    }
}

impl<T: Transport + 'static> Stream for BulkWalk<T> {
    type Item = Result<VarBind>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.done {
                return Poll::Ready(None);
            }

            // Drain the current batch first.
            if self.buffer_idx < self.buffer.len() {
                let vb = self.buffer[self.buffer_idx].clone();
                self.buffer_idx += 1;

                match self.state.check(vb) {
                    Step::Yield(vb) => {
                        self.current_oid = vb.oid.clone();
                        return Poll::Ready(Some(Ok(vb)));
                    }
                    Step::Finished => {
                        self.done = true;
                        return Poll::Ready(None);
                    }
                    Step::Fail(e) => {
                        self.done = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                }
            }

            if self.pending.is_none() {
                let session = self.session.clone();
                let oid = self.current_oid.clone();
                let max_rep = self.max_repetitions;
                self.pending =
                    Some(Box::pin(
                        async move { session.get_bulk(&[oid], 0, max_rep).await },
                    ));
            }

            let pending = self.pending.as_mut().expect("pending future set above");
            match pending.as_mut().poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(result) => {
                    self.pending = None;
                    match result {
                        Ok(varbinds) => {
                            // An agent with nothing under the subtree may
                            // answer with no varbinds at all.
                            if varbinds.is_empty() {
                                self.done = true;
                                return Poll::Ready(None);
                            }
                            self.buffer = varbinds;
                            self.buffer_idx = 0;
                        }
                        Err(e) => {
                            self.done = true;
                            return Poll::Ready(Some(Err(e)));
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::session::{Retry, SessionConfig};
    use crate::transport::{MockTransport, ResponseBuilder};
    use futures::StreamExt;
    use std::time::Duration;

    fn mock_session(mock: MockTransport) -> Session<MockTransport> {
        mock_session_with_limit(mock, super::super::DEFAULT_MAX_WALK_ITERATIONS)
    }

    fn mock_session_with_limit(mock: MockTransport, limit: usize) -> Session<MockTransport> {
        let config = SessionConfig {
            timeout: Duration::from_millis(100),
            retry: Retry::none(),
            max_walk_iterations: limit,
            ..SessionConfig::default()
        };
        Session::new(mock, config)
    }

    async fn collect<S>(stream: &mut S, limit: usize) -> Vec<Result<VarBind>>
    where
        S: Stream<Item = Result<VarBind>> + Unpin,
    {
        let mut results = Vec::new();
        while results.len() < limit {
            match stream.next().await {
                Some(result) => results.push(result),
                None => break,
            }
        }
        results
    }

    #[tokio::test]
    async fn walk_terminates_on_end_of_mib_view() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_response(
            ResponseBuilder::new(0)
                .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::OctetString("x".into()))
                .build_v2c(b"public"),
        );
        mock.queue_response(
            ResponseBuilder::new(0)
                .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::EndOfMibView)
                .build_v2c(b"public"),
        );

        let session = mock_session(mock);
        let mut walk = session.walk(oid!(1, 3, 6, 1, 2, 1, 1));
        let results = collect(&mut walk, 10).await;

        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }

    #[tokio::test]
    async fn walk_terminates_when_leaving_subtree() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        // First answer is already outside the system subtree.
        mock.queue_response(
            ResponseBuilder::new(0)
                .varbind(oid!(1, 3, 6, 1, 2, 1, 2, 1, 0), Value::Integer(1))
                .build_v2c(b"public"),
        );

        let session = mock_session(mock);
        let mut walk = session.walk(oid!(1, 3, 6, 1, 2, 1, 1));
        let results = collect(&mut walk, 10).await;

        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn walk_yields_increasing_oids() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_response(
            ResponseBuilder::new(0)
                .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::OctetString("desc".into()))
                .build_v2c(b"public"),
        );
        mock.queue_response(
            ResponseBuilder::new(0)
                .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(12345))
                .build_v2c(b"public"),
        );
        mock.queue_response(
            ResponseBuilder::new(0)
                .varbind(oid!(1, 3, 6, 1, 2, 1, 2, 1, 0), Value::Integer(1))
                .build_v2c(b"public"),
        );

        let session = mock_session(mock);
        let mut walk = session.walk(oid!(1, 3, 6, 1, 2, 1, 1));
        let results = collect(&mut walk, 10).await;

        assert_eq!(results.len(), 2);
        let oids: Vec<_> = results
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .map(|vb| &vb.oid)
            .collect();
        for pair in oids.windows(2) {
            assert!(pair[1] > pair[0], "OIDs must be strictly increasing");
        }
    }

    #[tokio::test]
    async fn walk_propagates_errors() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_response(
            ResponseBuilder::new(0)
                .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::OctetString("x".into()))
                .build_v2c(b"public"),
        );
        mock.queue_timeout();

        let session = mock_session(mock);
        let mut walk = session.walk(oid!(1, 3, 6, 1, 2, 1, 1));
        let results = collect(&mut walk, 10).await;

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::Timeout { .. })));
        // The stream is fused after an error.
        assert!(walk.next().await.is_none());
    }

    #[tokio::test]
    async fn walk_errors_on_decreasing_oid() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_response(
            ResponseBuilder::new(0)
                .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::OctetString("host1".into()))
                .build_v2c(b"public"),
        );
        // Goes backwards.
        mock.queue_response(
            ResponseBuilder::new(0)
                .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 4, 0), Value::OctetString("admin".into()))
                .build_v2c(b"public"),
        );

        let session = mock_session(mock);
        let mut walk = session.walk(oid!(1, 3, 6, 1, 2, 1, 1));
        let results = collect(&mut walk, 10).await;

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            &results[1],
            Err(Error::NonIncreasingOid { previous, current })
            if *previous == oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)
               && *current == oid!(1, 3, 6, 1, 2, 1, 1, 4, 0)
        ));
    }

    #[tokio::test]
    async fn walk_errors_on_repeated_oid() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        for _ in 0..2 {
            mock.queue_response(
                ResponseBuilder::new(0)
                    .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::OctetString("desc".into()))
                    .build_v2c(b"public"),
            );
        }

        let session = mock_session(mock);
        let mut walk = session.walk(oid!(1, 3, 6, 1, 2, 1, 1));
        let results = collect(&mut walk, 10).await;

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            &results[1],
            Err(Error::NonIncreasingOid { previous, current })
            if previous == current
        ));
    }

    #[tokio::test]
    async fn walk_stops_at_iteration_limit() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        for i in 1u32..=5 {
            mock.queue_response(
                ResponseBuilder::new(0)
                    .varbind(oid!(1, 3, 6, 1, 2, 1, 1, i, 0), Value::Integer(i as i32))
                    .build_v2c(b"public"),
            );
        }

        let session = mock_session_with_limit(mock, 3);
        let mut walk = session.walk(oid!(1, 3, 6, 1, 2, 1, 1));
        let results = collect(&mut walk, 10).await;

        assert_eq!(results.len(), 4);
        assert!(results[..3].iter().all(|r| r.is_ok()));
        assert!(matches!(
            results[3],
            Err(Error::Protocol {
                kind: ProtocolErrorKind::WalkLimitExceeded { limit: 3 },
                ..
            })
        ));
    }

    #[tokio::test]
    async fn bulk_walk_terminates_on_end_of_mib_view() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_response(
            ResponseBuilder::new(0)
                .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::OctetString("desc".into()))
                .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(1))
                .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::EndOfMibView)
                .build_v2c(b"public"),
        );

        let session = mock_session(mock);
        let mut walk = session.bulk_walk(oid!(1, 3, 6, 1, 2, 1, 1), 10);
        let results = collect(&mut walk, 20).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_ok()));
    }

    #[tokio::test]
    async fn bulk_walk_truncates_batch_at_subtree_boundary() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        // Third varbind leaves the system subtree; it and everything
        // after it must be discarded.
        mock.queue_response(
            ResponseBuilder::new(0)
                .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::OctetString("desc".into()))
                .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(1))
                .varbind(oid!(1, 3, 6, 1, 2, 1, 2, 1, 0), Value::Integer(3))
                .varbind(oid!(1, 3, 6, 1, 2, 1, 2, 2, 0), Value::Integer(4))
                .build_v2c(b"public"),
        );

        let session = mock_session(mock);
        let mut walk = session.bulk_walk(oid!(1, 3, 6, 1, 2, 1, 1), 10);
        let results = collect(&mut walk, 20).await;

        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn bulk_walk_handles_empty_response() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_response(ResponseBuilder::new(0).build_v2c(b"public"));

        let session = mock_session(mock);
        let mut walk = session.bulk_walk(oid!(1, 3, 6, 1, 2, 1, 1), 10);
        let results = collect(&mut walk, 20).await;

        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn bulk_walk_walks_a_table_across_batches() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        // ifDescr for three interfaces, two GETBULK batches.
        mock.queue_response(
            ResponseBuilder::new(0)
                .varbind(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 1), Value::OctetString("lo".into()))
                .varbind(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 2), Value::OctetString("eth0".into()))
                .build_v2c(b"public"),
        );
        mock.queue_response(
            ResponseBuilder::new(0)
                .varbind(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 3), Value::OctetString("eth1".into()))
                .varbind(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 3, 1), Value::Integer(24))
                .build_v2c(b"public"),
        );

        let session = mock_session(mock);
        let mut walk = session.bulk_walk(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2), 2);
        let results = collect(&mut walk, 20).await;

        let names: Vec<_> = results
            .iter()
            .map(|r| r.as_ref().unwrap().value.clone())
            .collect();
        assert_eq!(
            names,
            vec![
                Value::OctetString("lo".into()),
                Value::OctetString("eth0".into()),
                Value::OctetString("eth1".into()),
            ]
        );
    }

    #[tokio::test]
    async fn bulk_walk_errors_on_non_increasing_oid() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_response(
            ResponseBuilder::new(0)
                .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::OctetString("desc".into()))
                .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(1))
                // Goes backwards within the batch.
                .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 2, 0), Value::Integer(2))
                .build_v2c(b"public"),
        );

        let session = mock_session(mock);
        let mut walk = session.bulk_walk(oid!(1, 3, 6, 1, 2, 1, 1), 10);
        let results = collect(&mut walk, 20).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(matches!(
            &results[2],
            Err(Error::NonIncreasingOid { previous, current })
            if *previous == oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
               && *current == oid!(1, 3, 6, 1, 2, 1, 1, 2, 0)
        ));
    }

    #[tokio::test]
    async fn bulk_walk_stops_at_iteration_limit() {
        let mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
        mock.queue_response(
            ResponseBuilder::new(0)
                .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::Integer(1))
                .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 2, 0), Value::Integer(2))
                .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::Integer(3))
                .build_v2c(b"public"),
        );

        let session = mock_session_with_limit(mock, 2);
        let mut walk = session.bulk_walk(oid!(1, 3, 6, 1, 2, 1, 1), 10);
        let results = collect(&mut walk, 20).await;

        assert_eq!(results.len(), 3);
        assert!(matches!(
            results[2],
            Err(Error::Protocol {
                kind: ProtocolErrorKind::WalkLimitExceeded { limit: 2 },
                ..
            })
        ));
    }
}
