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

//! The network: the node table, the mailboxes, and all operations that act
//! on the topology as a whole.

use std::collections::{BTreeSet, HashMap};

use log::{debug, info};

use crate::mailbox::Mailboxes;
use crate::node::AsNode;
use crate::route::{Destination, Route, Update};
use crate::types::{Asn, AvoidanceMode, NetworkError};

/// An AS-level topology with per-AS mailboxes for the updates in flight.
///
/// The mailboxes live beside the node table so that the workers of a
/// convergence round can deliver into any mailbox while mutating their own
/// slice of nodes.
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub(crate) nodes: HashMap<Asn, AsNode>,
    pub(crate) mailboxes: Mailboxes,
}

impl Network {
    /// New, empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ASes in the network, including purged ones.
    pub fn num_ases(&self) -> usize {
        self.nodes.len()
    }

    /// All AS numbers in the network, in ascending order.
    pub fn asns(&self) -> Vec<Asn> {
        let mut asns: Vec<Asn> = self.nodes.keys().copied().collect();
        asns.sort_unstable();
        asns
    }

    /// The node with the given AS number.
    pub fn get(&self, asn: Asn) -> Result<&AsNode, NetworkError> {
        self.nodes.get(&asn).ok_or(NetworkError::UnknownAs(asn))
    }

    pub(crate) fn get_mut(&mut self, asn: Asn) -> Result<&mut AsNode, NetworkError> {
        self.nodes.get_mut(&asn).ok_or(NetworkError::UnknownAs(asn))
    }

    /// Number of updates currently waiting in mailboxes.
    pub fn pending_messages(&self) -> usize {
        self.mailboxes.pending_total()
    }

    /// Total number of updates delivered since the network was built.
    pub fn delivered_messages(&self) -> u64 {
        self.mailboxes.delivered()
    }

    /// Put an advertisement into the mailbox of `to`, as if the first hop
    /// of the route had sent it.
    pub fn enqueue_advertisement(&self, to: Asn, route: Route) -> Result<(), NetworkError> {
        self.mailboxes.deliver(to, Update::Advertise(route))
    }

    /// Put a withdrawal from `from` for `dest` into the mailbox of `to`.
    pub fn enqueue_withdrawal(
        &self,
        to: Asn,
        dest: Destination,
        from: Asn,
    ) -> Result<(), NetworkError> {
        self.mailboxes.deliver(to, Update::Withdraw(dest, from))
    }

    /// Let the given AS originate the route for its own prefix.
    pub fn originate(&mut self, asn: Asn) -> Result<(), NetworkError> {
        self.get_mut(asn)?.originate()?;
        Ok(())
    }

    /// Let every non-purged AS originate the route for its own prefix.
    pub fn originate_all(&mut self) -> Result<(), NetworkError> {
        for asn in self.asns() {
            let node = self.get_mut(asn)?;
            if node.is_purged() {
                continue;
            }
            node.originate()?;
        }
        Ok(())
    }

    /// Let `origin` originate a poisoned route carrying the given
    /// fabricated hops, sprayed to `targets` or to all of its neighbors.
    ///
    /// The spray is delivered immediately; run the scheduler afterwards to
    /// propagate it through the topology.
    pub fn poison_from(
        &mut self,
        origin: Asn,
        decoys: &BTreeSet<Asn>,
        targets: Option<&BTreeSet<Asn>>,
    ) -> Result<(), NetworkError> {
        let deliveries = self.get_mut(origin)?.originate_poisoned(decoys, targets);
        debug!(
            "{origin} sprays a poisoned route with {} fabricated hops to {} neighbors",
            decoys.len(),
            deliveries.len()
        );
        self.mailboxes.deliver_all(deliveries)
    }

    /// Withdraw the poisoned route of `origin` from every neighbor it was
    /// sprayed to.
    pub fn clear_poison(&mut self, origin: Asn) -> Result<(), NetworkError> {
        let deliveries = self.get_mut(origin)?.clear_poisoned_state();
        debug!(
            "{origin} withdraws its poisoned route from {} neighbors",
            deliveries.len()
        );
        self.mailboxes.deliver_all(deliveries)
    }

    /// Make the given AS route around the given set of ASes, re-running
    /// selection on everything it already installed.
    pub fn set_avoidance(&mut self, asn: Asn, avoid: BTreeSet<Asn>) -> Result<(), NetworkError> {
        let node = self.get_mut(asn)?;
        node.set_avoidance(avoid);
        node.rescan_routes()?;
        Ok(())
    }

    /// Change the point in the selection process at which avoidance
    /// applies for the given AS.
    pub fn set_avoidance_mode(
        &mut self,
        asn: Asn,
        mode: AvoidanceMode,
    ) -> Result<(), NetworkError> {
        let node = self.get_mut(asn)?;
        node.set_avoidance_mode(mode);
        node.rescan_routes()?;
        Ok(())
    }

    /// Turn avoidance off again for the given AS.
    pub fn clear_avoidance(&mut self, asn: Asn) -> Result<(), NetworkError> {
        let node = self.get_mut(asn)?;
        node.clear_avoidance();
        node.rescan_routes()?;
        Ok(())
    }

    /// The route `src` would use towards `dst`, looking through pruned
    /// ASes on both ends.
    ///
    /// A pruned source climbs into each of its former providers and picks
    /// the best of their routes. A pruned destination is reached through
    /// its former providers, where routes on the poisoned tree win over
    /// regular ones so that hole-punched reachability survives poisoning.
    pub fn route_between(&self, src: Asn, dst: Asn) -> Result<Option<Route>, NetworkError> {
        let src_node = self.get(src)?;
        let dst_node = self.get(dst)?;
        match (src_node.is_purged(), dst_node.is_purged()) {
            (false, false) => Ok(src_node.route_to(dst).cloned()),
            (true, _) => {
                let mut candidates: Vec<Route> = Vec::new();
                for provider in src_node.providers().iter().copied() {
                    if let Some(route) = self.get(provider)?.route_to(dst) {
                        let mut climbed = route.clone();
                        climbed.prepend_hop(provider);
                        candidates.push(climbed);
                    }
                }
                let refs: Vec<&Route> = candidates.iter().collect();
                Ok(src_node.best_of(&refs)?.cloned())
            }
            (false, true) => {
                let mut punched: Vec<Route> = Vec::new();
                let mut normal: Vec<Route> = Vec::new();
                for hook in dst_node.providers().iter().copied() {
                    if let Some(route) = src_node.route_to(hook) {
                        if route.destination().is_poisoned() {
                            punched.push(route.clone());
                        } else {
                            normal.push(route.clone());
                        }
                    }
                }
                let pool = if punched.is_empty() { normal } else { punched };
                let refs: Vec<&Route> = pool.iter().collect();
                Ok(src_node.best_of(&refs)?.cloned())
            }
        }
    }

    /// Fraction of ordered pairs of active ASes that can reach each other.
    /// A fully converged topology should score 1.0.
    pub fn verify_connected(&self) -> Result<f64, NetworkError> {
        let asns: Vec<Asn> = self
            .asns()
            .into_iter()
            .filter(|asn| self.nodes.get(asn).map_or(false, |n| !n.is_purged()))
            .collect();
        let mut total = 0u64;
        let mut connected = 0u64;
        for &src in &asns {
            for &dst in &asns {
                if src == dst {
                    continue;
                }
                total += 1;
                if self.route_between(src, dst)?.is_some() {
                    connected += 1;
                }
            }
        }
        let fraction = if total == 0 {
            1.0
        } else {
            connected as f64 / total as f64
        };
        info!(
            "connectivity check: {connected}/{total} pairs connected ({:.2}%)",
            fraction * 100.0
        );
        Ok(fraction)
    }

    /// Two networks are weakly equal when every node chose the same best
    /// routes. Candidate tables, mailboxes and statistics are ignored.
    pub fn weak_eq(&self, other: &Self) -> bool {
        self.nodes.len() == other.nodes.len()
            && self
                .nodes
                .iter()
                .all(|(asn, node)| other.nodes.get(asn).map_or(false, |o| node.weak_eq(o)))
    }
}
