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

//! # ASim: AS-level BGP route propagation simulator
//!
//! ASim simulates interdomain route propagation at the granularity of whole
//! ASes: every AS originates a single prefix (its own), learns routes from
//! its neighbors, selects among them along its business relationships, and
//! re-exports the winners along customer-provider lines. On top of the
//! regular machinery it models route poisoning: an AS can originate a
//! second, poisoned route carrying fabricated hops, which makes each named
//! AS drop the route through its ordinary loop check and thereby steers
//! traffic around it. Convergence is computed in synchronous, parallel
//! rounds whose outcome is independent of the number of workers.
//!
//! ## Structure
//!
//! - [`route`] defines [`route::Route`], [`route::Destination`] and the
//!   [`route::Update`] messages exchanged between ASes.
//! - [`node`] implements the per-AS state machine: candidate tables, route
//!   selection, and the export rules ([`node::AsNode`]).
//! - [`network`] holds the node table and the mailboxes, and offers the
//!   network-wide operations, including poisoning and universal routing
//!   through pruned ASes ([`network::Network`]).
//! - [`builder`] constructs topologies by hand, from CAIDA-style
//!   relationship files, or randomly (feature `rand`).
//! - [`scheduler`] drives the network to convergence with a pool of
//!   workers ([`scheduler::Scheduler`]).
//!
//! ## Example
//!
//! ```
//! use asim::prelude::*;
//!
//! # fn main() -> Result<(), NetworkError> {
//! // A small chain: AS 2 buys transit from AS 1, and AS 3 from AS 2.
//! let mut net = Network::new();
//! net.add_relation(Asn(2), Asn(1), Relation::Provider)?;
//! net.add_relation(Asn(3), Asn(2), Relation::Provider)?;
//!
//! // Every AS announces its own prefix, then the network converges.
//! net.originate_all()?;
//! let scheduler = Scheduler::new(2)?;
//! scheduler.drive_to_convergence(&mut net)?;
//!
//! let route = net.get(Asn(3))?.route_to(Asn(1)).unwrap();
//! assert_eq!(route.hops(), &[Asn(2), Asn(1)]);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod builder;
pub mod mailbox;
pub mod network;
pub mod node;
pub mod prelude;
pub mod route;
pub mod scheduler;
pub mod types;

#[cfg(test)]
mod test;
