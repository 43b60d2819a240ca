//! Pending request ledger.
//!
//! Bounded FIFO of issued frame requests, in issue order. Backed by a
//! `HeapRb` so the ledger never reallocates after construction:
//! - issuing on a full ledger evicts the single oldest entry
//! - completing an entry also drops every entry issued before it

use std::fmt;

use contracts::RequestId;
use ringbuf::{traits::*, HeapRb};

/// One outstanding request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestEntry {
    pub request_id: RequestId,
    /// Issue time on the monotonic clock
    pub issued_at_ms: i64,
}

/// Result of [`RequestLedger::issue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Issued {
    pub entry: RequestEntry,
    /// Oldest entry dropped to make room
    pub evicted: Option<RequestEntry>,
}

/// Result of [`RequestLedger::complete`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completed {
    pub entry: RequestEntry,
    /// Older entries removed along with the completed one
    pub superseded: usize,
}

pub struct RequestLedger {
    entries: HeapRb<RequestEntry>,
    next_id: RequestId,
    capacity: usize,
}

impl fmt::Debug for RequestLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLedger")
            .field("len", &self.entries.occupied_len())
            .field("capacity", &self.capacity)
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl RequestLedger {
    /// Create an empty ledger. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HeapRb::new(capacity),
            next_id: 0,
            capacity,
        }
    }

    /// Mint the next id and append it.
    ///
    /// Ids wrap silently at `u32::MAX`.
    #[inline]
    pub fn issue(&mut self, now_ms: i64) -> Issued {
        let entry = RequestEntry {
            request_id: self.next_id,
            issued_at_ms: now_ms,
        };
        self.next_id = self.next_id.wrapping_add(1);

        let evicted = if self.entries.is_full() {
            self.entries.try_pop()
        } else {
            None
        };
        let _ = self.entries.try_push(entry);

        Issued { entry, evicted }
    }

    /// Remove `request_id` and everything issued before it.
    ///
    /// Returns `None` when the id is not pending (unknown, already
    /// completed, evicted or cleared).
    #[inline]
    pub fn complete(&mut self, request_id: RequestId) -> Option<Completed> {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.request_id == request_id)?;

        let superseded = self.entries.skip(position);
        let entry = self.entries.try_pop()?;
        Some(Completed { entry, superseded })
    }

    /// Drop every pending entry. The id counter keeps running.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline]
    pub fn contains(&self, request_id: RequestId) -> bool {
        self.entries.iter().any(|entry| entry.request_id == request_id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pending ids, oldest first
    pub fn pending_ids(&self) -> Vec<RequestId> {
        self.entries.iter().map(|entry| entry.request_id).collect()
    }
}
