//! # Outstanding-Call Tracker
//!
//! Per-connection map from sequence number to the call awaiting its Response.
//!
//! The issuing path (`begin`/`reserve`) and the decode path (`resolve`) may run
//! on different tasks; the map is a `DashMap`, so each operation is atomic per
//! sequence number. Every pending call owns a one-shot sender, so it resolves
//! at most once. Dropping a `PendingCall` without completing it closes the
//! caller's receiver.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::trace;

use crate::arg::Arg;
use crate::arg::ArgFactory;
use crate::error::Error;
use crate::error::RemoteError;
use crate::error::Result;
use crate::kind::SeqNo;

/// What the caller of a pending call eventually receives.
pub type CallOutcome = std::result::Result<Option<Box<dyn Arg>>, RemoteError>;

/// A call that has been sent and not yet answered.
pub struct PendingCall {
    method: String,
    result: Option<Arc<dyn ArgFactory>>,
    tx: oneshot::Sender<CallOutcome>,
}

impl PendingCall {
    /// Creates the record and the receiver its caller awaits.
    ///
    /// `result` is the decode target factory for the Response's result field;
    /// `None` skips the field.
    pub fn new(
        method: impl Into<String>,
        result: Option<Arc<dyn ArgFactory>>,
    ) -> (Self, oneshot::Receiver<CallOutcome>) {
        let (tx, rx) = oneshot::channel();
        (Self { method: method.into(), result, tx }, rx)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn make_result(&self) -> Option<Box<dyn Arg>> {
        self.result.as_ref().map(|factory| factory.make_arg())
    }

    /// True once the caller has dropped its receiver.
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }

    /// Delivers the outcome. Returns false if nobody was waiting.
    pub fn complete(self, outcome: CallOutcome) -> bool {
        self.tx.send(outcome).is_ok()
    }
}

impl std::fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCall")
            .field("method", &self.method)
            .field("typed_result", &self.result.is_some())
            .finish()
    }
}

/// Sequence number to `PendingCall`.
pub struct Tracker {
    pending: DashMap<SeqNo, PendingCall>,
    next: AtomicU64,
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracker {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// A tracker whose `begin` hands out sequence numbers from `seqno` upward.
    pub fn starting_at(seqno: SeqNo) -> Self {
        Self { pending: DashMap::new(), next: AtomicU64::new(seqno) }
    }

    /// Registers `call` under a caller-chosen sequence number.
    ///
    /// Fails with `DuplicateSeqNo` if that number is still in flight.
    pub fn reserve(&self, seqno: SeqNo, call: PendingCall) -> Result<()> {
        match self.pending.entry(seqno) {
            Entry::Occupied(_) => Err(Error::DuplicateSeqNo(seqno)),
            Entry::Vacant(slot) => {
                trace!(seqno, method = call.method(), "reserved call");
                slot.insert(call);
                Ok(())
            }
        }
    }

    /// Allocates the next free sequence number and registers a call under it.
    pub fn begin(
        &self,
        method: impl Into<String>,
        result: Option<Arc<dyn ArgFactory>>,
    ) -> (SeqNo, oneshot::Receiver<CallOutcome>) {
        let (call, rx) = PendingCall::new(method, result);
        loop {
            let seqno = self.next.fetch_add(1, Ordering::Relaxed);
            // Skip numbers still held by long-running or manually reserved calls.
            if let Entry::Vacant(slot) = self.pending.entry(seqno) {
                trace!(seqno, method = call.method(), "began call");
                slot.insert(call);
                return (seqno, rx);
            }
        }
    }

    /// Removes and returns the pending call for `seqno`.
    ///
    /// Fails with `CallNotFound` if it was never sent, already answered, or
    /// cancelled.
    pub fn resolve(&self, seqno: SeqNo) -> Result<PendingCall> {
        match self.pending.remove(&seqno) {
            Some((_, call)) => {
                trace!(seqno, method = call.method(), "resolved call");
                Ok(call)
            }
            None => Err(Error::CallNotFound(seqno)),
        }
    }

    /// Removes a pending call without resolving it. Absent entries are not an error.
    pub fn cancel(&self, seqno: SeqNo) -> Option<PendingCall> {
        let removed = self.pending.remove(&seqno).map(|(_, call)| call);
        if removed.is_some() {
            trace!(seqno, "cancelled call");
        }
        removed
    }

    /// Removes every pending call, in sequence order.
    ///
    /// Dropping the returned records closes their receivers.
    pub fn cancel_all(&self) -> Vec<(SeqNo, PendingCall)> {
        let mut seqnos: Vec<SeqNo> = self.pending.iter().map(|entry| *entry.key()).collect();
        seqnos.sort_unstable();

        let cancelled: Vec<_> = seqnos
            .into_iter()
            .filter_map(|seqno| self.pending.remove(&seqno))
            .collect();

        debug!(count = cancelled.len(), "cancelled all pending calls");
        cancelled
    }

    pub fn contains(&self, seqno: SeqNo) -> bool {
        self.pending.contains_key(&seqno)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_rejects_in_flight_seqno() {
        let tracker = Tracker::new();
        let (first, _rx1) = PendingCall::new("abc.hello", None);
        let (second, _rx2) = PendingCall::new("abc.hello", None);

        tracker.reserve(7, first).unwrap();
        let err = tracker.reserve(7, second).unwrap_err();
        assert_eq!(err, Error::DuplicateSeqNo(7));
        assert_eq!(err.to_string(), "call already pending for sequence number 7");
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_resolve_succeeds_at_most_once() {
        let tracker = Tracker::new();
        let (call, _rx) = PendingCall::new("abc.hello", None);
        tracker.reserve(3, call).unwrap();

        assert_eq!(tracker.resolve(3).unwrap().method(), "abc.hello");
        let err = tracker.resolve(3).unwrap_err();
        assert_eq!(err.to_string(), "Call not found for sequence number 3");
    }

    #[test]
    fn test_seqno_reusable_after_removal() {
        let tracker = Tracker::new();
        let (call, _rx) = PendingCall::new("abc.hello", None);
        tracker.reserve(1, call).unwrap();
        tracker.resolve(1).unwrap();

        let (call, _rx) = PendingCall::new("abc.again", None);
        tracker.reserve(1, call).unwrap();
        assert_eq!(tracker.resolve(1).unwrap().method(), "abc.again");
    }

    #[test]
    fn test_begin_skips_occupied_seqnos() {
        let tracker = Tracker::starting_at(5);
        let (call, _rx) = PendingCall::new("abc.manual", None);
        tracker.reserve(5, call).unwrap();

        let (seqno, _rx) = tracker.begin("abc.hello", None);
        assert_eq!(seqno, 6);
        assert!(tracker.contains(5));
        assert!(tracker.contains(6));
    }

    #[test]
    fn test_cancel_then_resolve_fails() {
        let tracker = Tracker::new();
        let (seqno, mut rx) = tracker.begin("abc.hello", None);

        assert!(tracker.cancel(seqno).is_some());
        assert!(tracker.cancel(seqno).is_none());
        assert_eq!(tracker.resolve(seqno).unwrap_err(), Error::CallNotFound(seqno));
        assert!(matches!(rx.try_recv(), Err(oneshot::error::TryRecvError::Closed)));
    }

    #[test]
    fn test_cancel_all_in_sequence_order() {
        let tracker = Tracker::new();
        for seqno in [9, 2, 5] {
            let (call, _rx) = PendingCall::new(format!("abc.m{}", seqno), None);
            tracker.reserve(seqno, call).unwrap();
        }

        let cancelled = tracker.cancel_all();
        let seqnos: Vec<SeqNo> = cancelled.iter().map(|(seqno, _)| *seqno).collect();
        assert_eq!(seqnos, vec![2, 5, 9]);
        assert!(tracker.is_empty());
        assert!(tracker.cancel_all().is_empty());
    }

    #[test]
    fn test_complete_reports_abandoned_receiver() {
        let (call, rx) = PendingCall::new("abc.hello", None);
        drop(rx);
        assert!(call.is_abandoned());
        assert!(!call.complete(Ok(None)));
    }
}
