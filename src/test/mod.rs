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

use crate::network::Network;
use crate::scheduler::Scheduler;
use crate::types::{Asn, Relation};

/// Drive the network to convergence with a single worker.
fn converge(net: &mut Network) {
    Scheduler::new(1).unwrap().drive_to_convergence(net).unwrap();
}

/// Small topology used across the tests. An arrow points from the
/// customer to its provider.
///
/// ```text
///       1 ------- 2      1 and 2 peer with each other
///      / \       / \
///     3   +- 4 -+   5    3 -> 1,  4 -> {1, 2},  5 -> 2
///     |      |      |
///     |      6      |    6 -> 4
///     +----- 7 -----+    7 -> {3, 5}
/// ```
fn net_small() -> Network {
    let mut net = Network::new();
    net.add_relation(Asn(1), Asn(2), Relation::Peer).unwrap();
    net.add_relation(Asn(3), Asn(1), Relation::Provider).unwrap();
    net.add_relation(Asn(4), Asn(1), Relation::Provider).unwrap();
    net.add_relation(Asn(4), Asn(2), Relation::Provider).unwrap();
    net.add_relation(Asn(5), Asn(2), Relation::Provider).unwrap();
    net.add_relation(Asn(6), Asn(4), Relation::Provider).unwrap();
    net.add_relation(Asn(7), Asn(3), Relation::Provider).unwrap();
    net.add_relation(Asn(7), Asn(5), Relation::Provider).unwrap();
    net
}

macro_rules! assert_hops {
    ($net:expr, $src:expr, $dst:expr, [$($hop:expr),+ $(,)?]) => {
        let route = $net
            .route_between($src, $dst)
            .unwrap()
            .unwrap_or_else(|| panic!("no route from {} to {}", $src, $dst));
        pretty_assertions::assert_eq!(route.hops(), &[$($hop),+]);
    };
}

mod test_network;
