// ASim: AS-level BGP route propagation simulator written in Rust
// Copyright (C) 2023-2024 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Per-AS mailboxes holding the updates in flight between rounds.
//!
//! The mailboxes live next to the node table rather than inside the nodes,
//! so that the workers of a convergence round can deliver updates to any
//! mailbox while holding mutable access to their own slice of nodes.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::route::Update;
use crate::types::{Asn, NetworkError};

/// Mailbox of a single AS, filled by its neighbors and drained by the AS
/// itself during the processing phase.
#[derive(Debug, Default)]
pub struct RouteMailbox {
    queue: Mutex<VecDeque<Update>>,
}

impl RouteMailbox {
    fn guard(&self) -> MutexGuard<'_, VecDeque<Update>> {
        // A worker holding the lock never panics between push and pop, and
        // even if it did, the queue itself stays consistent.
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an update at the back of the queue.
    pub fn push(&self, update: Update) {
        self.guard().push_back(update);
    }

    /// Take the oldest update out of the queue.
    pub fn pop(&self) -> Option<Update> {
        self.guard().pop_front()
    }

    /// Number of updates waiting in the queue.
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

impl Clone for RouteMailbox {
    fn clone(&self) -> Self {
        Self {
            queue: Mutex::new(self.guard().clone()),
        }
    }
}

/// The mailboxes of all ASes in the network, addressable by AS number.
#[derive(Debug, Default)]
pub struct Mailboxes {
    boxes: HashMap<Asn, RouteMailbox>,
    delivered: AtomicU64,
}

impl Mailboxes {
    /// Create a mailbox for the given AS if it has none yet.
    pub(crate) fn register(&mut self, asn: Asn) {
        self.boxes.entry(asn).or_default();
    }

    /// The mailbox of the given AS.
    pub fn inbox(&self, asn: Asn) -> Result<&RouteMailbox, NetworkError> {
        self.boxes.get(&asn).ok_or(NetworkError::UnknownAs(asn))
    }

    /// Deliver one update into the mailbox of `to`.
    pub fn deliver(&self, to: Asn, update: Update) -> Result<(), NetworkError> {
        self.inbox(to)?.push(update);
        self.delivered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Deliver a batch of updates, each addressed to its receiver.
    pub fn deliver_all(
        &self,
        batch: impl IntoIterator<Item = (Asn, Update)>,
    ) -> Result<(), NetworkError> {
        for (to, update) in batch {
            self.deliver(to, update)?;
        }
        Ok(())
    }

    /// Total number of updates delivered since the network was built.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Number of updates currently waiting across all mailboxes.
    pub fn pending_total(&self) -> usize {
        self.boxes.values().map(|b| b.len()).sum()
    }
}

impl Clone for Mailboxes {
    fn clone(&self) -> Self {
        Self {
            boxes: self.boxes.clone(),
            delivered: AtomicU64::new(self.delivered()),
        }
    }
}
