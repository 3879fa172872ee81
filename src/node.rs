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

//! A single AS and its complete route processing state machine.
//!
//! Every node keeps three tables per destination: the candidate routes
//! learned from its neighbors (at most one per neighbor), the best route
//! chosen among them, and the set of neighbors the best route was exported
//! to. Processing a message only mutates the tables and marks the
//! destination dirty. Exports happen later, when the round timer fires, so
//! that a burst of messages in one round collapses into a single export.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::mem;

use log::trace;

use crate::mailbox::RouteMailbox;
use crate::route::{Destination, Route, Update};
use crate::types::{Asn, AvoidanceMode, NodeError, Relation};

/// Preference classes of the selection process, from least to most
/// preferred. Routes from customers beat routes from peers, which beat
/// routes from providers. A node's own route beats everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PathPreference {
    FromProvider,
    FromPeer,
    FromCustomer,
    SelfOriginated,
}

/// A single AS in the topology.
#[derive(Debug, Clone, PartialEq)]
pub struct AsNode {
    asn: Asn,
    customers: BTreeSet<Asn>,
    peers: BTreeSet<Asn>,
    providers: BTreeSet<Asn>,
    /// Former neighbors that were removed when the topology was pruned.
    pruned_neighbors: BTreeSet<Asn>,
    purged: bool,
    /// Candidate routes per destination, at most one per advertising
    /// neighbor. Withdrawn slots leave an empty entry behind.
    rib_in: HashMap<Destination, Vec<Route>>,
    /// Best route per destination. Absent when no candidate survived.
    loc_rib: HashMap<Destination, Route>,
    /// Neighbors the current best route was exported to, per destination.
    adj_out: HashMap<Destination, BTreeSet<Asn>>,
    /// Destinations whose best route changed since the last export.
    dirty: BTreeSet<Destination>,
    avoid_mode: AvoidanceMode,
    active_avoidance: bool,
    avoid_set: BTreeSet<Asn>,
}

impl AsNode {
    pub(crate) fn new(asn: Asn) -> Self {
        Self {
            asn,
            customers: BTreeSet::new(),
            peers: BTreeSet::new(),
            providers: BTreeSet::new(),
            pruned_neighbors: BTreeSet::new(),
            purged: false,
            rib_in: HashMap::new(),
            loc_rib: HashMap::new(),
            adj_out: HashMap::new(),
            dirty: BTreeSet::new(),
            avoid_mode: AvoidanceMode::default(),
            active_avoidance: false,
            avoid_set: BTreeSet::new(),
        }
    }

    /// The AS number of this node.
    pub fn asn(&self) -> Asn {
        self.asn
    }

    /// The customers of this node.
    pub fn customers(&self) -> &BTreeSet<Asn> {
        &self.customers
    }

    /// The peers of this node.
    pub fn peers(&self) -> &BTreeSet<Asn> {
        &self.peers
    }

    /// The providers of this node.
    pub fn providers(&self) -> &BTreeSet<Asn> {
        &self.providers
    }

    /// All neighbors of this node, customers first.
    pub fn neighbors(&self) -> impl Iterator<Item = Asn> + '_ {
        self.customers
            .iter()
            .chain(self.peers.iter())
            .chain(self.providers.iter())
            .copied()
    }

    /// Former neighbors that were removed when the topology was pruned.
    pub fn pruned_neighbors(&self) -> &BTreeSet<Asn> {
        &self.pruned_neighbors
    }

    /// Whether this node was removed from the active topology.
    pub fn is_purged(&self) -> bool {
        self.purged
    }

    /// Whether any destination has an unexported best route change.
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Whether this node currently routes around its avoidance set.
    pub fn is_avoiding(&self) -> bool {
        self.active_avoidance
    }

    /// The point in the selection process at which avoidance applies.
    pub fn avoidance_mode(&self) -> AvoidanceMode {
        self.avoid_mode
    }

    /// The relationship of the given AS towards this node, or `None` if the
    /// two are not neighbors.
    pub fn relation_to(&self, asn: Asn) -> Option<Relation> {
        if self.customers.contains(&asn) {
            Some(Relation::Customer)
        } else if self.peers.contains(&asn) {
            Some(Relation::Peer)
        } else if self.providers.contains(&asn) {
            Some(Relation::Provider)
        } else {
            None
        }
    }

    /// The best route towards the given destination, if any.
    pub fn best_route(&self, dest: Destination) -> Option<&Route> {
        self.loc_rib.get(&dest)
    }

    /// All candidate routes towards the given destination.
    pub fn candidate_routes(&self, dest: Destination) -> &[Route] {
        self.rib_in.get(&dest).map(Vec::as_slice).unwrap_or_default()
    }

    /// The best route towards the given AS, preferring the poisoned
    /// routing tree over the regular one where both exist.
    pub fn route_to(&self, asn: Asn) -> Option<&Route> {
        self.loc_rib
            .get(&Destination::Poisoned(asn))
            .or_else(|| self.loc_rib.get(&Destination::Normal(asn)))
    }

    pub(crate) fn insert_relation(&mut self, other: Asn, relation: Relation) {
        match relation {
            Relation::Customer => self.customers.insert(other),
            Relation::Peer => self.peers.insert(other),
            Relation::Provider => self.providers.insert(other),
        };
    }

    pub(crate) fn mark_purged(&mut self) {
        self.purged = true;
    }

    /// Remove a purged neighbor from the relationship sets and remember it.
    pub(crate) fn sever_neighbor(&mut self, other: Asn) {
        self.customers.remove(&other);
        self.peers.remove(&other);
        self.providers.remove(&other);
        self.pruned_neighbors.insert(other);
    }

    /// Two nodes are weakly equal when they chose the same best routes.
    pub(crate) fn weak_eq(&self, other: &Self) -> bool {
        self.loc_rib == other.loc_rib
    }

    fn preference_of(&self, asn: Asn) -> Result<PathPreference, NodeError> {
        if asn == self.asn {
            Ok(PathPreference::SelfOriginated)
        } else if self.customers.contains(&asn) {
            Ok(PathPreference::FromCustomer)
        } else if self.peers.contains(&asn) {
            Ok(PathPreference::FromPeer)
        } else if self.providers.contains(&asn) {
            Ok(PathPreference::FromProvider)
        } else {
            Err(NodeError::NoRelationship {
                node: self.asn,
                other: asn,
            })
        }
    }

    /// Install the route for this node's own prefix and mark it for export.
    pub(crate) fn originate(&mut self) -> Result<(), NodeError> {
        let dest = Destination::Normal(self.asn);
        let route = Route::new(dest);
        let rib = self.rib_in.entry(dest).or_default();
        if !rib.contains(&route) {
            rib.push(route);
        }
        self.recompute_best(dest)
    }

    /// Apply a single update to the candidate table and re-run selection
    /// for the destination it talks about.
    ///
    /// The update first clears the slot of its sender, then an
    /// advertisement re-fills it, unless the route already carries this
    /// node's own number, which means a loop (or a fabricated hop placed
    /// there on purpose) and drops the route.
    pub(crate) fn process_one_message(&mut self, update: Update) -> Result<(), NodeError> {
        let advertiser = update.advertiser();
        let dest = update.destination();
        let rib = self.rib_in.entry(dest).or_default();
        if let Some(pos) = rib.iter().position(|r| r.next_hop() == advertiser) {
            rib.remove(pos);
        }
        if let Update::Advertise(route) = update {
            if route.contains_hop(self.asn) {
                trace!("{} drops a looping route from {advertiser}", self.asn);
            } else {
                rib.push(route);
            }
        }
        self.recompute_best(dest)
    }

    /// Drain the given mailbox and process every update in order. Returns
    /// the number of updates processed.
    pub(crate) fn process_all_pending(
        &mut self,
        inbox: &RouteMailbox,
    ) -> Result<usize, NodeError> {
        let mut processed = 0;
        while let Some(update) = inbox.pop() {
            self.process_one_message(update)?;
            processed += 1;
        }
        Ok(processed)
    }

    /// Re-run selection for one destination and mark it dirty if the best
    /// route changed in any way, including disappearing.
    pub(crate) fn recompute_best(&mut self, dest: Destination) -> Result<(), NodeError> {
        let candidates: Vec<&Route> = self
            .rib_in
            .get(&dest)
            .map(|rib| rib.iter().collect())
            .unwrap_or_default();
        let best = self.best_of(&candidates)?.cloned();
        let changed = self.loc_rib.get(&dest) != best.as_ref();
        match best {
            Some(route) => {
                self.loc_rib.insert(dest, route);
            }
            None => {
                self.loc_rib.remove(&dest);
            }
        }
        if changed {
            self.dirty.insert(dest);
        }
        Ok(())
    }

    /// Select the best route among the given candidates.
    ///
    /// An avoiding node runs selection twice: first restricted to routes
    /// that respect the avoidance set, and if that pass comes up empty,
    /// once more without the restriction. Reachability always wins over
    /// avoidance.
    pub(crate) fn best_of<'a>(
        &self,
        candidates: &[&'a Route],
    ) -> Result<Option<&'a Route>, NodeError> {
        if self.active_avoidance {
            if let Some(best) = self.select_pass(candidates, true)? {
                return Ok(Some(best));
            }
        }
        self.select_pass(candidates, false)
    }

    /// One selection pass: relationship class, then propagation length,
    /// then lowest next hop. In a restricted pass the avoidance set is
    /// consulted at the point given by the avoidance mode.
    fn select_pass<'a>(
        &self,
        candidates: &[&'a Route],
        restricted: bool,
    ) -> Result<Option<&'a Route>, NodeError> {
        let mut best: Option<(&'a Route, PathPreference)> = None;
        for route in candidates.iter().copied() {
            if restricted
                && self.avoid_mode == AvoidanceMode::LocalPref
                && route.contains_any(&self.avoid_set)
            {
                continue;
            }
            let pref = self.preference_of(route.next_hop())?;
            let (incumbent, incumbent_pref) = match best {
                None => {
                    best = Some((route, pref));
                    continue;
                }
                Some(current) => current,
            };
            if pref != incumbent_pref {
                if pref > incumbent_pref {
                    best = Some((route, pref));
                }
                continue;
            }
            if restricted && self.avoid_mode == AvoidanceMode::PathLength {
                let dirty_incumbent = incumbent.contains_any(&self.avoid_set);
                let dirty_route = route.contains_any(&self.avoid_set);
                if dirty_incumbent != dirty_route {
                    if dirty_incumbent {
                        best = Some((route, pref));
                    }
                    continue;
                }
            }
            match route.real_length().cmp(&incumbent.real_length()) {
                Ordering::Less => {
                    best = Some((route, pref));
                    continue;
                }
                Ordering::Greater => continue,
                Ordering::Equal => {}
            }
            if restricted && self.avoid_mode == AvoidanceMode::TieBreak {
                let dirty_incumbent = incumbent.contains_any(&self.avoid_set);
                let dirty_route = route.contains_any(&self.avoid_set);
                if dirty_incumbent != dirty_route {
                    if dirty_incumbent {
                        best = Some((route, pref));
                    }
                    continue;
                }
            }
            if route.next_hop() < incumbent.next_hop() {
                best = Some((route, pref));
            }
        }
        Ok(best.map(|(route, _)| route))
    }

    /// Export every dirty destination to the neighbors that should see it
    /// and clear the dirty set. Returns the updates to deliver, each
    /// addressed to its receiver.
    pub(crate) fn fire_timer_and_advertise(&mut self) -> Result<Vec<(Asn, Update)>, NodeError> {
        let dirty = mem::take(&mut self.dirty);
        let mut out = Vec::new();
        for dest in dirty {
            self.send_update(dest, &mut out)?;
        }
        Ok(out)
    }

    /// Export the current best route for one destination.
    ///
    /// Customers always learn the route. Peers and providers only learn it
    /// when it is the node's own or was itself learned from a customer.
    /// Neighbors that saw the previous export but are not part of the new
    /// one receive a withdrawal.
    fn send_update(
        &mut self,
        dest: Destination,
        out: &mut Vec<(Asn, Update)>,
    ) -> Result<(), NodeError> {
        let prev: BTreeSet<Asn> = self.adj_out.get(&dest).cloned().unwrap_or_default();
        let mut now: BTreeSet<Asn> = BTreeSet::new();
        if let Some(best) = self.loc_rib.get(&dest) {
            let mut adv = best.clone();
            adv.prepend_hop(self.asn);
            // the shortcut applies to the regular self prefix only; an
            // exported poisoned route is judged like any learned route
            let to_all = dest == Destination::Normal(self.asn)
                || self.preference_of(best.next_hop())? == PathPreference::FromCustomer;
            let mut targets: Vec<Asn> = self.customers.iter().copied().collect();
            if to_all {
                targets.extend(self.peers.iter().copied());
                targets.extend(self.providers.iter().copied());
            }
            for to in targets {
                now.insert(to);
                out.push((to, Update::Advertise(adv.clone())));
            }
        }
        for to in prev.difference(&now) {
            out.push((*to, Update::Withdraw(dest, self.asn)));
        }
        self.adj_out.insert(dest, now);
        Ok(())
    }

    /// Originate a poisoned route for this node's own prefix, carrying the
    /// given fabricated hops behind the origin.
    ///
    /// The advertisement is sprayed to the given targets, or to every
    /// neighbor when none are given, bypassing the export rules. From
    /// there it propagates like any other route, except that each
    /// fabricated hop makes the named AS drop it through the ordinary loop
    /// check. That is the mechanism that steers traffic away from those
    /// ASes.
    ///
    /// Locally the origin keeps a hop-less route, exactly as for its
    /// regular prefix. The fabricated hops only travel in the sprayed
    /// advertisement, so echoes of the poison coming back from neighbors
    /// cannot disturb the origin's own tables.
    pub(crate) fn originate_poisoned(
        &mut self,
        decoys: &BTreeSet<Asn>,
        targets: Option<&BTreeSet<Asn>>,
    ) -> Vec<(Asn, Update)> {
        let dest = Destination::Poisoned(self.asn);
        let route = Route::new(dest);
        let rib = self.rib_in.entry(dest).or_default();
        if !rib.contains(&route) {
            rib.push(route.clone());
        }
        self.loc_rib.insert(dest, route);
        // the spray below already is the export of this destination
        self.dirty.remove(&dest);

        let mut adv = Route::new(dest);
        adv.prepend_hop(self.asn);
        for decoy in decoys {
            adv.append_hop(*decoy);
        }
        let spray: Vec<Asn> = match targets {
            Some(set) => set.iter().copied().collect(),
            None => self.neighbors().collect(),
        };
        let mut now = BTreeSet::new();
        let mut out = Vec::new();
        for to in spray {
            now.insert(to);
            out.push((to, Update::Advertise(adv.clone())));
        }
        self.adj_out.insert(dest, now);
        out
    }

    /// Tear the poisoned route down again: withdraw it from every neighbor
    /// it was sprayed to and drop it from the local tables.
    pub(crate) fn clear_poisoned_state(&mut self) -> Vec<(Asn, Update)> {
        let dest = Destination::Poisoned(self.asn);
        self.rib_in.remove(&dest);
        self.loc_rib.remove(&dest);
        self.dirty.remove(&dest);
        self.adj_out
            .remove(&dest)
            .unwrap_or_default()
            .into_iter()
            .map(|to| (to, Update::Withdraw(dest, self.asn)))
            .collect()
    }

    /// Turn avoidance on with the given set of ASes to route around.
    pub(crate) fn set_avoidance(&mut self, avoid: BTreeSet<Asn>) {
        self.avoid_set = avoid;
        self.active_avoidance = true;
    }

    /// Turn avoidance off again.
    pub(crate) fn clear_avoidance(&mut self) {
        self.active_avoidance = false;
        self.avoid_set.clear();
    }

    /// Change the point in the selection process at which avoidance applies.
    pub(crate) fn set_avoidance_mode(&mut self, mode: AvoidanceMode) {
        self.avoid_mode = mode;
    }

    /// Re-run selection for every installed destination, marking those
    /// whose best route changes. Used after the avoidance state changed
    /// underneath an otherwise quiescent node.
    pub(crate) fn rescan_routes(&mut self) -> Result<(), NodeError> {
        let dests: Vec<Destination> = self.loc_rib.keys().copied().collect();
        for dest in dests {
            self.recompute_best(dest)?;
        }
        Ok(())
    }
}
