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

use maplit::btreeset;
use pretty_assertions::assert_eq;

use super::{converge, net_small};
use crate::network::Network;
use crate::route::{Destination, Route};
use crate::types::{Asn, AvoidanceMode, NetworkError};

fn converged_small() -> Network {
    let mut net = net_small();
    net.originate_all().unwrap();
    converge(&mut net);
    net
}

#[test]
fn converged_routes_follow_business_preferences() {
    let net = converged_small();
    // customer routes are re-exported everywhere, so traffic can cross
    // the peering link at the top
    assert_hops!(&net, Asn(3), Asn(5), [Asn(1), Asn(2), Asn(5)]);
    assert_hops!(&net, Asn(6), Asn(5), [Asn(4), Asn(2), Asn(5)]);
    assert_hops!(&net, Asn(5), Asn(3), [Asn(2), Asn(1), Asn(3)]);
    // a route through a customer beats the same route through a peer
    assert_hops!(&net, Asn(2), Asn(6), [Asn(4), Asn(6)]);
    assert_hops!(&net, Asn(1), Asn(6), [Asn(4), Asn(6)]);
    // ties within a class fall to the lower next hop
    assert_hops!(&net, Asn(6), Asn(7), [Asn(4), Asn(1), Asn(3), Asn(7)]);
    // the shorter of two provider routes wins
    assert_hops!(&net, Asn(7), Asn(1), [Asn(3), Asn(1)]);
}

#[test]
fn every_as_reaches_every_other() {
    let net = converged_small();
    assert_eq!(net.verify_connected().unwrap(), 1.0);
}

#[test]
fn self_route_has_no_hops() {
    let net = converged_small();
    let route = net
        .get(Asn(1))
        .unwrap()
        .best_route(Destination::Normal(Asn(1)))
        .unwrap();
    assert!(route.is_empty());
    assert_eq!(route.next_hop(), Asn(1));
    assert_eq!(route.real_length(), 1);
}

#[test]
fn withdrawal_reaches_every_learner() {
    let mut net = converged_small();

    // AS 5 takes its prefix away from its provider. Its customer 7 keeps
    // the directly learned route, everybody else loses theirs because all
    // other routes led through AS 2.
    net.enqueue_withdrawal(Asn(2), Destination::Normal(Asn(5)), Asn(5))
        .unwrap();
    converge(&mut net);

    for asn in [Asn(1), Asn(2), Asn(3), Asn(4), Asn(6)] {
        assert_eq!(net.get(asn).unwrap().route_to(Asn(5)), None);
    }
    assert_eq!(
        net.get(Asn(7)).unwrap().route_to(Asn(5)).unwrap().hops(),
        &[Asn(5)]
    );
    // routes in the other direction are untouched
    assert_hops!(&net, Asn(5), Asn(1), [Asn(2), Asn(1)]);
}

#[test]
fn poisoned_route_attracts_and_decoy_repels() {
    let mut net = converged_small();
    let poisoned = Destination::Poisoned(Asn(7));

    // AS 7 sprays a route fabricating AS 1 as a hop, but only towards its
    // provider 5, leaving provider 3 out.
    net.poison_from(Asn(7), &btreeset! {Asn(1)}, Some(&btreeset! {Asn(5)}))
        .unwrap();
    converge(&mut net);

    // the sprayed route spreads upwards from AS 5
    let at_5 = net.get(Asn(5)).unwrap().best_route(poisoned).unwrap();
    assert_eq!(at_5.hops(), &[Asn(7), Asn(1)]);
    assert_eq!(at_5.real_length(), 1);
    assert_eq!(
        net.get(Asn(2)).unwrap().best_route(poisoned).unwrap().hops(),
        &[Asn(5), Asn(7), Asn(1)]
    );
    let at_6 = net.get(Asn(6)).unwrap().best_route(poisoned).unwrap();
    assert_eq!(at_6.hops(), &[Asn(4), Asn(2), Asn(5), Asn(7), Asn(1)]);
    assert!(at_6.contains_hop(Asn(1)));

    // the fabricated hop makes AS 1 drop the route as a loop
    assert_eq!(net.get(Asn(1)).unwrap().best_route(poisoned), None);
    assert_eq!(
        net.get(Asn(1)).unwrap().route_to(Asn(7)).unwrap().hops(),
        &[Asn(3), Asn(7)]
    );

    // the left-out provider never sees the poisoned tree at all
    assert_eq!(net.get(Asn(3)).unwrap().best_route(poisoned), None);
    assert_eq!(
        net.get(Asn(3)).unwrap().route_to(Asn(7)).unwrap().hops(),
        &[Asn(7)]
    );

    // where both trees exist, the poisoned one carries the traffic
    assert_eq!(
        net.get(Asn(5)).unwrap().route_to(Asn(7)).unwrap().hops(),
        &[Asn(7), Asn(1)]
    );
}

#[test]
fn clearing_poison_restores_plain_convergence() {
    let mut net = converged_small();
    net.poison_from(Asn(7), &btreeset! {Asn(1)}, Some(&btreeset! {Asn(5)}))
        .unwrap();
    converge(&mut net);

    net.clear_poison(Asn(7)).unwrap();
    converge(&mut net);

    let poisoned = Destination::Poisoned(Asn(7));
    for asn in net.asns() {
        assert_eq!(net.get(asn).unwrap().best_route(poisoned), None);
    }
    assert!(net.weak_eq(&converged_small()));
}

#[test]
fn avoidance_steers_around_the_set() {
    let mut net = converged_small();
    assert_eq!(
        net.get(Asn(7)).unwrap().route_to(Asn(4)).unwrap().hops(),
        &[Asn(3), Asn(1), Asn(4)]
    );

    net.set_avoidance(Asn(7), btreeset! {Asn(1)}).unwrap();
    assert!(net.get(Asn(7)).unwrap().is_avoiding());
    assert_eq!(
        net.get(Asn(7)).unwrap().route_to(Asn(4)).unwrap().hops(),
        &[Asn(5), Asn(2), Asn(4)]
    );

    net.clear_avoidance(Asn(7)).unwrap();
    assert!(!net.get(Asn(7)).unwrap().is_avoiding());
    assert_eq!(
        net.get(Asn(7)).unwrap().route_to(Asn(4)).unwrap().hops(),
        &[Asn(3), Asn(1), Asn(4)]
    );
}

#[test]
fn avoidance_mode_changes_the_stage() {
    let mut net = converged_small();
    net.set_avoidance(Asn(7), btreeset! {Asn(3)}).unwrap();

    // by default a clean route wins over a tainted one outright
    assert_eq!(
        net.get(Asn(7)).unwrap().route_to(Asn(1)).unwrap().hops(),
        &[Asn(5), Asn(2), Asn(1)]
    );

    // as a tie breaker, the shorter tainted route survives
    net.set_avoidance_mode(Asn(7), AvoidanceMode::TieBreak)
        .unwrap();
    assert_eq!(
        net.get(Asn(7)).unwrap().route_to(Asn(1)).unwrap().hops(),
        &[Asn(3), Asn(1)]
    );

    // ahead of the length comparison, the clean route wins again
    net.set_avoidance_mode(Asn(7), AvoidanceMode::PathLength)
        .unwrap();
    assert_eq!(
        net.get(Asn(7)).unwrap().route_to(Asn(1)).unwrap().hops(),
        &[Asn(5), Asn(2), Asn(1)]
    );
}

#[test]
fn avoidance_never_leaves_a_node_routeless() {
    let mut net = converged_small();
    // the only route AS 6 has towards AS 5 runs through the avoided AS 2
    net.set_avoidance(Asn(6), btreeset! {Asn(2)}).unwrap();
    assert_eq!(
        net.get(Asn(6)).unwrap().route_to(Asn(5)).unwrap().hops(),
        &[Asn(4), Asn(2), Asn(5)]
    );
}

#[test]
fn pruned_source_routes_through_its_providers() {
    let mut net = net_small();
    let purged = net.prune_stub_ases(&btreeset! {}).unwrap();
    assert_eq!(purged, vec![Asn(6), Asn(7)]);
    net.originate_all().unwrap();
    converge(&mut net);

    assert_hops!(&net, Asn(6), Asn(1), [Asn(4), Asn(1)]);
    assert_hops!(&net, Asn(6), Asn(5), [Asn(4), Asn(2), Asn(5)]);
    // a purged destination never originated, so there is nothing to climb to
    assert_eq!(net.route_between(Asn(6), Asn(7)).unwrap(), None);
}

#[test]
fn pruned_destination_is_reached_through_its_hooks() {
    let mut net = net_small();
    net.prune_stub_ases(&btreeset! {}).unwrap();
    net.originate_all().unwrap();
    converge(&mut net);

    // the route leads to the best former provider of the stub
    assert_hops!(&net, Asn(1), Asn(6), [Asn(4)]);
    assert_hops!(&net, Asn(3), Asn(6), [Asn(1), Asn(4)]);
    assert_hops!(&net, Asn(2), Asn(7), [Asn(5)]);
    // a provider of the stub is its own hook
    assert!(net.route_between(Asn(4), Asn(6)).unwrap().unwrap().is_empty());
}

#[test]
fn keep_set_protects_stubs_from_pruning() {
    let mut net = net_small();
    let purged = net.prune_stub_ases(&btreeset! {Asn(7)}).unwrap();
    assert_eq!(purged, vec![Asn(6)]);

    assert!(!net.get(Asn(7)).unwrap().is_purged());
    assert!(net.get(Asn(6)).unwrap().is_purged());
    // the neighbor dropped the stub but remembers it
    assert!(!net.get(Asn(4)).unwrap().customers().contains(&Asn(6)));
    assert!(net.get(Asn(4)).unwrap().pruned_neighbors().contains(&Asn(6)));
    // the stub itself keeps its relations for later lookups
    assert!(net.get(Asn(6)).unwrap().providers().contains(&Asn(4)));

    // pruning again purges AS 4, which just lost its only customer
    let purged = net.prune_stub_ases(&btreeset! {Asn(7)}).unwrap();
    assert_eq!(purged, vec![Asn(4)]);
}

#[test]
fn unknown_as_is_an_error() {
    let mut net = net_small();
    assert!(matches!(
        net.get(Asn(99)),
        Err(NetworkError::UnknownAs(Asn(99)))
    ));
    assert!(matches!(
        net.route_between(Asn(1), Asn(99)),
        Err(NetworkError::UnknownAs(Asn(99)))
    ));
    assert!(matches!(
        net.originate(Asn(99)),
        Err(NetworkError::UnknownAs(Asn(99)))
    ));
    assert!(matches!(
        net.set_avoidance(Asn(99), btreeset! {Asn(1)}),
        Err(NetworkError::UnknownAs(Asn(99)))
    ));
}

#[test]
fn weak_eq_spots_differing_choices() {
    let mut a = converged_small();
    let b = converged_small();
    assert!(a.weak_eq(&b));
    assert!(b.weak_eq(&a));

    a.set_avoidance(Asn(7), btreeset! {Asn(1)}).unwrap();
    assert!(!a.weak_eq(&b));
}

#[test]
fn message_counters_track_traffic() {
    let mut net = net_small();
    assert_eq!(net.pending_messages(), 0);
    net.originate_all().unwrap();
    // origination fills the local tables without sending anything
    assert_eq!(net.pending_messages(), 0);

    converge(&mut net);
    assert_eq!(net.pending_messages(), 0);
    assert!(net.delivered_messages() > 0);

    net.enqueue_advertisement(
        Asn(3),
        Route::with_hops(Destination::Normal(Asn(1)), vec![Asn(1)]),
    )
    .unwrap();
    assert_eq!(net.pending_messages(), 1);
}
