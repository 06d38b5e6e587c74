//! In-flight request registry.
//!
//! Maps request identifiers to one-shot completion slots awaited by the
//! submitting callers. Every resolver (the read pump delivering a
//! response, the write pump reporting a failed write, a caller's
//! cancellation or deadline, the shutdown path) must first win
//! [`PendingTable::take`]; only the successful taker resolves the slot.
//! Losers observe `None` and back off, which is what makes
//! resolve-once-and-remove-once hold under concurrency.
//!
//! Remote resolvers send a [`Completion`] through the slot. Caller-side
//! resolvers (cancellation, deadline) do not: having won `take`, the caller
//! simply returns its own error and drops the slot.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::{oneshot, Notify};
use transport::{RequestId, Response, TransportError};

use crate::error::Error;

/// Terminal outcome delivered through a completion slot by a remote
/// resolver.
#[derive(Debug, Clone)]
pub(crate) enum Completion {
    /// The matching response arrived.
    Delivered(Response),
    /// The multiplexer shut down before delivery.
    Shutdown,
    /// The transport failed for this request or for the whole channel.
    TransportFailed(TransportError),
}

/// One in-flight request: the sending end of its completion slot.
#[derive(Debug)]
pub(crate) struct PendingEntry {
    slot: oneshot::Sender<Completion>,
}

impl PendingEntry {
    /// Resolve the slot. A dropped receiver (the caller gave up) is fine;
    /// the outcome is simply discarded.
    pub(crate) fn resolve(self, completion: Completion) {
        let _ = self.slot.send(completion);
    }
}

/// Identifier-indexed registry of in-flight requests.
#[derive(Debug)]
pub(crate) struct PendingTable {
    entries: Mutex<HashMap<RequestId, PendingEntry>>,
    emptied: Notify,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            emptied: Notify::new(),
        }
    }

    /// Register a new entry, returning the receiving end of its slot.
    ///
    /// Fails with [`Error::DuplicateRequestId`] when the identifier is
    /// already in flight; the existing entry is left untouched.
    pub(crate) fn insert(&self, id: RequestId) -> Result<oneshot::Receiver<Completion>, Error> {
        let mut entries = self.entries.lock().unwrap();
        match entries.entry(id) {
            Entry::Occupied(_) => Err(Error::DuplicateRequestId(id)),
            Entry::Vacant(vacant) => {
                let (slot, receiver) = oneshot::channel();
                vacant.insert(PendingEntry { slot });
                Ok(receiver)
            }
        }
    }

    /// Atomically remove and return the entry for `id`, if present.
    pub(crate) fn take(&self, id: RequestId) -> Option<PendingEntry> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.remove(&id);
        if entry.is_some() && entries.is_empty() {
            self.emptied.notify_waiters();
        }
        entry
    }

    /// Drain every entry and resolve each with `completion`.
    ///
    /// Used by forced shutdown and by fatal read failures. Returns how many
    /// entries were resolved.
    pub(crate) fn fail_all(&self, completion: Completion) -> usize {
        let drained: Vec<PendingEntry> = {
            let mut entries = self.entries.lock().unwrap();
            let drained = entries.drain().map(|(_, entry)| entry).collect();
            self.emptied.notify_waiters();
            drained
        };
        let count = drained.len();
        for entry in drained {
            entry.resolve(completion.clone());
        }
        count
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Wait until the table holds no entries. Returns immediately if it is
    /// already empty.
    pub(crate) async fn wait_empty(&self) {
        loop {
            // register before checking, so a removal between the check and
            // the await cannot be missed
            let emptied = self.emptied.notified();
            if self.is_empty() {
                return;
            }
            emptied.await;
        }
    }
}

/// Removes the entry for `id` when dropped.
///
/// Held across the awaiting section of `send` so that a caller dropping the
/// future outright (rather than cancelling through its token) cannot leak
/// an entry. Removal is idempotent: after any resolver has taken the entry,
/// the drop is a no-op.
pub(crate) struct PendingGuard<'a> {
    table: &'a PendingTable,
    id: RequestId,
}

impl<'a> PendingGuard<'a> {
    pub(crate) fn new(table: &'a PendingTable, id: RequestId) -> Self {
        Self { table, id }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let _ = self.table.take(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn id(raw: u64) -> RequestId {
        RequestId::from(raw)
    }

    #[tokio::test]
    async fn insert_then_take_returns_the_entry() {
        let table = PendingTable::new();
        let _receiver = table.insert(id(1)).unwrap();

        assert!(!table.is_empty());
        assert!(table.take(id(1)).is_some());
        assert!(table.take(id(1)).is_none());
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let table = PendingTable::new();
        let _receiver = table.insert(id(1)).unwrap();

        let err = table.insert(id(1)).unwrap_err();
        assert!(matches!(err, Error::DuplicateRequestId(d) if d == id(1)));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn resolution_reaches_the_receiver() {
        let table = PendingTable::new();
        let receiver = table.insert(id(1)).unwrap();

        let entry = table.take(id(1)).unwrap();
        entry.resolve(Completion::Delivered(Response::new(1u64, Bytes::new())));

        match receiver.await.unwrap() {
            Completion::Delivered(response) => assert_eq!(response.id, id(1)),
            other => panic!("unexpected completion: {other:?}"),
        }
    }

    #[tokio::test]
    async fn fail_all_resolves_every_entry() {
        let table = PendingTable::new();
        let first = table.insert(id(1)).unwrap();
        let second = table.insert(id(2)).unwrap();

        assert_eq!(table.fail_all(Completion::Shutdown), 2);
        assert!(table.is_empty());

        assert!(matches!(first.await.unwrap(), Completion::Shutdown));
        assert!(matches!(second.await.unwrap(), Completion::Shutdown));
    }

    #[tokio::test]
    async fn wait_empty_wakes_on_last_removal() {
        use std::sync::Arc;

        let table = Arc::new(PendingTable::new());
        let _receiver = table.insert(id(1)).unwrap();

        let waiter = {
            let table = Arc::clone(&table);
            tokio::spawn(async move { table.wait_empty().await })
        };

        tokio::task::yield_now().await;
        table.take(id(1));
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn wait_empty_returns_immediately_when_empty() {
        let table = PendingTable::new();
        table.wait_empty().await;
    }

    #[tokio::test]
    async fn guard_removes_an_unresolved_entry() {
        let table = PendingTable::new();
        let _receiver = table.insert(id(1)).unwrap();
        {
            let _guard = PendingGuard::new(&table, id(1));
        }
        assert!(table.is_empty());
    }
}
