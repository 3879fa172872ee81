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

//! Convenience re-export of the most important types of this crate.

pub use crate::mailbox::{Mailboxes, RouteMailbox};
pub use crate::network::Network;
pub use crate::node::AsNode;
pub use crate::route::{Destination, Route, Update};
pub use crate::scheduler::{ConvergenceReport, Scheduler, StopToken, DEFAULT_BLOCK_SIZE};
pub use crate::types::{Asn, AvoidanceMode, NetworkError, NodeError, Relation, TopologyError};
