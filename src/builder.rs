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

//! Building topologies: by hand, from an AS relationship file, or randomly.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use log::{debug, info};
#[cfg(feature = "rand")]
use rand::{seq::SliceRandom, Rng};

use crate::network::Network;
use crate::node::AsNode;
use crate::types::{Asn, NetworkError, Relation, TopologyError};

impl Network {
    /// Add an AS to the network, together with its mailbox. Adding an AS
    /// twice has no effect.
    pub fn add_as(&mut self, asn: Asn) -> Asn {
        self.nodes.entry(asn).or_insert_with(|| AsNode::new(asn));
        self.mailboxes.register(asn);
        asn
    }

    /// Add a relationship between two ASes, creating them if necessary.
    /// `relation` states what `b` is to `a`; the reverse is recorded on
    /// `b` automatically.
    pub fn add_relation(
        &mut self,
        a: Asn,
        b: Asn,
        relation: Relation,
    ) -> Result<(), NetworkError> {
        if a == b {
            return Err(TopologyError::SelfRelation(a).into());
        }
        self.add_as(a);
        self.add_as(b);
        self.get_mut(a)?.insert_relation(b, relation);
        self.get_mut(b)?.insert_relation(a, relation.reversed());
        Ok(())
    }

    /// Build a network from an AS relationship description in the CAIDA
    /// serial-1 format: one `a|b|code` entry per line, where code `-1`
    /// makes `a` the provider of `b`, `1` the inverse, `0` makes them
    /// peers, and `3` (sibling) is ignored. Lines starting with `#` and
    /// blank lines are skipped.
    pub fn from_relationship_str(input: &str) -> Result<Self, NetworkError> {
        let mut net = Network::new();
        for (idx, raw) in input.lines().enumerate() {
            let line = idx + 1;
            let entry = raw.trim();
            if entry.is_empty() || entry.starts_with('#') {
                continue;
            }
            let mut fields = entry.split('|');
            let a = fields
                .next()
                .ok_or(TopologyError::MissingField { line })?
                .trim();
            let b = fields
                .next()
                .ok_or(TopologyError::MissingField { line })?
                .trim();
            let code = fields
                .next()
                .ok_or(TopologyError::MissingField { line })?
                .trim();
            let a: Asn = a.parse().map_err(|_| TopologyError::BadToken {
                line,
                token: a.to_string(),
            })?;
            let b: Asn = b.parse().map_err(|_| TopologyError::BadToken {
                line,
                token: b.to_string(),
            })?;
            let code: i32 = code.parse().map_err(|_| TopologyError::BadToken {
                line,
                token: code.to_string(),
            })?;
            let relation = match code {
                -1 => Relation::Customer,
                0 => Relation::Peer,
                1 => Relation::Provider,
                3 => continue,
                other => {
                    return Err(TopologyError::UnknownRelation { line, code: other }.into())
                }
            };
            net.add_relation(a, b, relation)?;
        }
        debug!("parsed a topology of {} ASes", net.num_ases());
        Ok(net)
    }

    /// Build a network from an AS relationship file, see
    /// [`Network::from_relationship_str`].
    pub fn from_relationship_file(path: impl AsRef<Path>) -> Result<Self, NetworkError> {
        let content = fs::read_to_string(path).map_err(TopologyError::from)?;
        Self::from_relationship_str(&content)
    }

    /// Remove every stub (an AS without customers) from the active
    /// topology, except those listed in `keep`. Returns the purged ASes.
    ///
    /// Purged ASes stay in the store with their own relationship sets
    /// intact, but their neighbors drop them and remember them as pruned.
    /// The scheduler skips purged ASes entirely;
    /// [`Network::route_between`] still routes to and from them through
    /// their former providers.
    pub fn prune_stub_ases(&mut self, keep: &BTreeSet<Asn>) -> Result<Vec<Asn>, NetworkError> {
        let purged: Vec<Asn> = self
            .asns()
            .into_iter()
            .filter(|asn| {
                self.nodes.get(asn).map_or(false, |node| {
                    !node.is_purged() && node.customers().is_empty() && !keep.contains(asn)
                })
            })
            .collect();
        for &asn in &purged {
            self.get_mut(asn)?.mark_purged();
            let neighbors: Vec<Asn> = self.get(asn)?.neighbors().collect();
            for nbr in neighbors {
                self.get_mut(nbr)?.sever_neighbor(asn);
            }
        }
        let active = self.nodes.values().filter(|n| !n.is_purged()).count();
        info!("pruned {} stub ASes, {active} remain active", purged.len());
        Ok(purged)
    }

    /// Build a random three-tier topology: a full peer mesh of `cores`
    /// core ASes, `transits` transit ASes buying from one or two random
    /// cores, and `stubs` stub ASes buying from one or two random
    /// transits (or cores, when there are no transits).
    ///
    /// Every AS can reach the core, so the topology is connected. The
    /// result is deterministic in the random generator. `cores` is raised
    /// to at least one.
    #[cfg(feature = "rand")]
    pub fn random_hierarchy<R: Rng + ?Sized>(
        rng: &mut R,
        cores: usize,
        transits: usize,
        stubs: usize,
    ) -> Result<Self, NetworkError> {
        let cores = cores.max(1);
        let mut net = Network::new();

        let core_asns: Vec<Asn> = (1..=cores as u32).map(Asn).collect();
        for &asn in &core_asns {
            net.add_as(asn);
        }
        for (i, &a) in core_asns.iter().enumerate() {
            for &b in &core_asns[i + 1..] {
                net.add_relation(a, b, Relation::Peer)?;
            }
        }

        let transit_asns: Vec<Asn> = (0..transits)
            .map(|k| Asn((cores + k + 1) as u32))
            .collect();
        for &asn in &transit_asns {
            net.add_as(asn);
            let picks = rng.gen_range(1..=core_asns.len().min(2));
            let providers: Vec<Asn> = core_asns
                .choose_multiple(rng, picks)
                .copied()
                .collect();
            for provider in providers {
                net.add_relation(asn, provider, Relation::Provider)?;
            }
        }

        let upstream = if transit_asns.is_empty() {
            &core_asns
        } else {
            &transit_asns
        };
        for k in 0..stubs {
            let asn = Asn((cores + transits + k + 1) as u32);
            net.add_as(asn);
            let picks = rng.gen_range(1..=upstream.len().min(2));
            let providers: Vec<Asn> = upstream.choose_multiple(rng, picks).copied().collect();
            for provider in providers {
                net.add_relation(asn, provider, Relation::Provider)?;
            }
        }

        debug!(
            "built a random hierarchy of {} cores, {transits} transits and {stubs} stubs",
            cores
        );
        Ok(net)
    }
}
