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

//! Identifier and error types used throughout the simulator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// AS number, the identifier of a node in the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Asn(pub u32);

impl fmt::Display for Asn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AS{}", self.0)
    }
}

impl From<u32> for Asn {
    fn from(x: u32) -> Self {
        Self(x)
    }
}

impl From<Asn> for u32 {
    fn from(asn: Asn) -> Self {
        asn.0
    }
}

impl FromStr for Asn {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>().map(Asn)
    }
}

/// Business relationship of a neighboring AS, as seen from the local AS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    /// The neighbor buys transit from the local AS.
    Customer,
    /// Settlement-free peering.
    Peer,
    /// The local AS buys transit from the neighbor.
    Provider,
}

impl Relation {
    /// The same relationship, seen from the other side of the link.
    pub fn reversed(self) -> Self {
        match self {
            Self::Customer => Self::Provider,
            Self::Peer => Self::Peer,
            Self::Provider => Self::Customer,
        }
    }
}

/// Point in the selection process at which an avoiding node prefers routes
/// that are free of tainted identifiers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AvoidanceMode {
    /// Treat tainted routes as unusable in the first selection pass,
    /// regardless of any other metric.
    #[default]
    LocalPref,
    /// Within the same relationship class, prefer untainted routes before
    /// comparing path lengths.
    PathLength,
    /// Within the same relationship class and path length, prefer untainted
    /// routes before the next-hop tie-break.
    TieBreak,
}

/// Errors raised by the protocol operations of a single node.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// A relationship lookup for an identifier that is neither a neighbor
    /// nor the node itself. This means the topology is broken or a candidate
    /// route survived the removal of its advertising neighbor.
    #[error("{node} has no relationship with {other}")]
    NoRelationship {
        /// The node performing the lookup.
        node: Asn,
        /// The identifier that could not be resolved.
        other: Asn,
    },
}

/// Errors raised while building a topology from a relationship description.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// Reading the relationship input failed.
    #[error("cannot read the relationship input: {0}")]
    Io(#[from] std::io::Error),
    /// A relationship line has fewer than three `|`-separated fields.
    #[error("line {line}: missing field in relationship entry")]
    MissingField {
        /// One-based line number in the input.
        line: usize,
    },
    /// A field that must be a number could not be parsed.
    #[error("line {line}: invalid number {token:?}")]
    BadToken {
        /// One-based line number in the input.
        line: usize,
        /// The offending token.
        token: String,
    },
    /// The relationship code is none of -1, 0, 1 or 3.
    #[error("line {line}: unknown relationship code {code}")]
    UnknownRelation {
        /// One-based line number in the input.
        line: usize,
        /// The offending code.
        code: i32,
    },
    /// A relationship of an AS with itself.
    #[error("{0} cannot have a relationship with itself")]
    SelfRelation(Asn),
}

/// Errors raised by network-wide operations and convergence runs.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// A node operation violated a protocol invariant.
    #[error("node error: {0}")]
    Node(#[from] NodeError),
    /// The topology description was malformed.
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),
    /// An operation addressed an AS that does not exist in the network.
    #[error("{0} does not exist in the network")]
    UnknownAs(Asn),
    /// Convergence did not finish within the configured round limit.
    #[error("no convergence after {0} rounds")]
    NoConvergence(usize),
    /// The convergence run was stopped through its stop token.
    #[error("convergence run was interrupted")]
    Interrupted,
    /// The worker pool could not be constructed.
    #[error("cannot build the worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
