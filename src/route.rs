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

//! Routes, destinations and the update messages exchanged between nodes.

use std::collections::BTreeSet;
use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::types::Asn;

/// Destination a route leads to.
///
/// A destination is always an AS (every AS originates exactly one prefix, its
/// own), but the same AS can be reached over two independent routing trees:
/// the regular one, and a poisoned one carrying fabricated hops that
/// hole-punches around links the originator wants to drain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Destination {
    /// The regular route towards the AS.
    Normal(Asn),
    /// A poisoned route towards the AS, distinguished from the regular one
    /// in every table it traverses.
    Poisoned(Asn),
}

impl Destination {
    /// The AS this destination leads to.
    pub fn asn(&self) -> Asn {
        match self {
            Self::Normal(asn) | Self::Poisoned(asn) => *asn,
        }
    }

    /// Whether this is the poisoned variant.
    pub fn is_poisoned(&self) -> bool {
        matches!(self, Self::Poisoned(_))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal(asn) => asn.fmt(f),
            Self::Poisoned(asn) => write!(f, "{asn} (poisoned)"),
        }
    }
}

impl From<Asn> for Destination {
    fn from(asn: Asn) -> Self {
        Self::Normal(asn)
    }
}

/// A single route: a destination and the sequence of hops towards it.
///
/// The first hop is the neighbor the route was learned from, the last hop is
/// the originating AS itself. The route an AS originates for its own prefix
/// has no hops at all; each AS re-advertising the route prepends its own
/// number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    destination: Destination,
    hops: Vec<Asn>,
}

impl Route {
    /// New route without any hops, as originated by the destination itself.
    pub fn new(destination: Destination) -> Self {
        Self {
            destination,
            hops: Vec::new(),
        }
    }

    /// New route with the given hop sequence, first hop first.
    pub fn with_hops(destination: Destination, hops: Vec<Asn>) -> Self {
        Self { destination, hops }
    }

    /// The destination of the route.
    pub fn destination(&self) -> Destination {
        self.destination
    }

    /// The AS the route leads to, ignoring whether it is poisoned.
    pub fn dest_asn(&self) -> Asn {
        self.destination.asn()
    }

    /// All hops of the route, first hop first.
    pub fn hops(&self) -> &[Asn] {
        &self.hops
    }

    /// The neighbor this route was learned from.
    ///
    /// For the hop-less route an AS originates for itself, the next hop is
    /// the destination AS itself.
    pub fn next_hop(&self) -> Asn {
        match self.hops.first() {
            Some(asn) => *asn,
            None => self.destination.asn(),
        }
    }

    /// Raw number of hops, counting fabricated ones.
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    /// Whether the route has no hops at all.
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Propagation length of the route: the number of hops up to and
    /// including the first occurrence of the destination AS.
    ///
    /// Fabricated hops appended behind the destination never inflate this
    /// metric, so a poisoned route competes on equal footing with the
    /// regular one. The hop-less self route has length one.
    pub fn real_length(&self) -> usize {
        let dest = self.destination.asn();
        match self.hops.iter().position(|asn| *asn == dest) {
            Some(idx) => idx + 1,
            None => self.hops.len() + 1,
        }
    }

    /// Whether the given AS appears anywhere in the hop sequence.
    pub fn contains_hop(&self, asn: Asn) -> bool {
        self.hops.contains(&asn)
    }

    /// Whether any AS of the given set appears in the hop sequence.
    pub fn contains_any(&self, set: &BTreeSet<Asn>) -> bool {
        self.hops.iter().any(|asn| set.contains(asn))
    }

    /// Whether `a` is immediately followed by `b` in the hop sequence.
    ///
    /// The check is directed: hops are recorded in traversal order, so a
    /// route crosses the link from `a` to `b` only in that direction.
    pub fn contains_link(&self, a: Asn, b: Asn) -> bool {
        self.hops.windows(2).any(|w| w[0] == a && w[1] == b)
    }

    /// Prepend a hop, as done by each AS re-advertising the route.
    pub fn prepend_hop(&mut self, asn: Asn) {
        self.hops.insert(0, asn);
    }

    /// Append a hop at the far end, used to fabricate poisoned hops.
    pub fn append_hop(&mut self, asn: Asn) {
        self.hops.push(asn);
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] -> {}",
            self.hops.iter().join(", "),
            self.destination
        )
    }
}

/// A protocol message from one AS to a neighbor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Update {
    /// Advertise a route. The first hop of the route is the sender.
    Advertise(Route),
    /// Withdraw the route towards the destination that the sender (the
    /// second field) previously advertised.
    Withdraw(Destination, Asn),
}

impl Update {
    /// The neighbor that sent the update.
    pub fn advertiser(&self) -> Asn {
        match self {
            Self::Advertise(route) => route.next_hop(),
            Self::Withdraw(_, from) => *from,
        }
    }

    /// The destination the update talks about.
    pub fn destination(&self) -> Destination {
        match self {
            Self::Advertise(route) => route.destination(),
            Self::Withdraw(dest, _) => *dest,
        }
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Advertise(route) => write!(f, "advertise {route}"),
            Self::Withdraw(dest, from) => write!(f, "withdraw {dest} from {from}"),
        }
    }
}
