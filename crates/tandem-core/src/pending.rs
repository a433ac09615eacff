//! Outstanding outbound calls, keyed by sequence number.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::body::Body;
use crate::error::{RpcError, WireError};

const DEFAULT_MAX_PENDING: usize = 8192;

fn max_pending() -> usize {
    std::env::var("TANDEM_MAX_PENDING")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_MAX_PENDING)
}

/// What a pending call resolves to: the peer's reply body, or the peer's
/// failure. Dropping the sender without resolving means the endpoint shut
/// down; the waiting caller observes that as `RpcError::Shutdown`.
pub type CallOutcome = Result<Body, WireError>;

pub(crate) type CallSlot = oneshot::Sender<CallOutcome>;

struct Inner {
    /// Next seq to hand out. Starts at 1; 0 is the notification sentinel.
    next_seq: u64,
    waiting: HashMap<u64, CallSlot>,
}

/// The table of outstanding outbound calls.
///
/// Seq allocation and insertion happen under one lock acquisition, so a
/// reply racing back over a fast wire always finds the entry in place.
pub struct PendingTable {
    inner: Mutex<Inner>,
    max: usize,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self::with_capacity(max_pending())
    }

    pub(crate) fn with_capacity(max: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_seq: 1,
                waiting: HashMap::new(),
            }),
            max,
        }
    }

    /// Reserve the next seq and register the caller's slot under it.
    pub(crate) fn allocate(&self, slot: CallSlot) -> Result<u64, RpcError> {
        let mut inner = self.inner.lock();
        if inner.waiting.len() >= self.max {
            tracing::warn!(
                pending = inner.waiting.len(),
                max = self.max,
                "too many pending calls; refusing new call"
            );
            return Err(RpcError::TooManyPending(self.max));
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.waiting.insert(seq, slot);
        Ok(seq)
    }

    /// Remove and return the slot for `seq`, if it is still outstanding.
    pub(crate) fn take(&self, seq: u64) -> Option<CallSlot> {
        self.inner.lock().waiting.remove(&seq)
    }

    /// Empty the table at shutdown. Dropping the returned slots completes
    /// every waiting caller with *connection shut down*.
    pub(crate) fn drain(&self) -> Vec<CallSlot> {
        let mut inner = self.inner.lock();
        inner.waiting.drain().map(|(_, slot)| slot).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().waiting.len()
    }

    /// Outstanding seqs, sorted. Diagnostics only.
    pub(crate) fn seqs(&self) -> Vec<u64> {
        let inner = self.inner.lock();
        let mut seqs: Vec<u64> = inner.waiting.keys().copied().collect();
        seqs.sort_unstable();
        seqs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seqs_start_at_one_and_increase_strictly() {
        let table = PendingTable::with_capacity(16);
        let mut last = 0;
        for _ in 0..5 {
            let (tx, _rx) = oneshot::channel();
            let seq = table.allocate(tx).unwrap();
            assert!(seq > last);
            last = seq;
        }
        assert_eq!(table.len(), 5);
        assert_eq!(table.seqs(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn take_removes_exactly_one_entry() {
        let table = PendingTable::with_capacity(16);
        let (tx, _rx) = oneshot::channel();
        let seq = table.allocate(tx).unwrap();
        assert!(table.take(seq).is_some());
        assert!(table.take(seq).is_none());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn seqs_are_never_reused_after_take() {
        let table = PendingTable::with_capacity(16);
        let (tx, _rx) = oneshot::channel();
        let first = table.allocate(tx).unwrap();
        table.take(first);
        let (tx, _rx) = oneshot::channel();
        let second = table.allocate(tx).unwrap();
        assert!(second > first);
    }

    #[test]
    fn capacity_is_enforced() {
        let table = PendingTable::with_capacity(2);
        let mut keep = Vec::new();
        for _ in 0..2 {
            let (tx, rx) = oneshot::channel();
            table.allocate(tx).unwrap();
            keep.push(rx);
        }
        let (tx, _rx) = oneshot::channel();
        match table.allocate(tx) {
            Err(RpcError::TooManyPending(2)) => {}
            other => panic!("expected TooManyPending, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn drained_slots_wake_their_callers() {
        let table = PendingTable::with_capacity(16);
        let (tx, rx) = oneshot::channel();
        table.allocate(tx).unwrap();
        drop(table.drain());
        assert!(rx.await.is_err());
        assert_eq!(table.len(), 0);
    }
}
