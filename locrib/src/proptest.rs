// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property-based tests for the decision process and identifier allocation.

use crate::bestpath::{decide, Candidate};
use crate::ids::IdAllocator;
use crate::path::{Path, PathKey};
use crate::test::{test_path, TestNeighbor};
use proptest::prelude::*;
use rib_types::{AsPathSegment, AttributeSet, Origin};
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};

/// Attributes drawn from small domains so that ties at every stage are
/// common.
fn path_strategy() -> impl Strategy<Value = (u8, bool, u32, u8, u8, u8, u8)> {
    (
        1u8..=20,      // peer address, distinct per candidate below
        any::<bool>(), // internal
        prop_oneof![Just(100u32), Just(200u32)],
        1u8..=3, // AS path length
        0u8..=2, // origin
        0u8..=2, // originator id
        0u8..=2, // cluster list length
    )
}

fn build(
    (peer, internal, local_pref, hops, origin, originator, clusters): (
        u8,
        bool,
        u32,
        u8,
        u8,
        u8,
        u8,
    ),
) -> Path {
    let addr = IpAddr::V4(Ipv4Addr::new(198, 51, 100, peer));
    let neighbor = if internal {
        TestNeighbor::internal(addr)
    } else {
        TestNeighbor::external(addr)
    };
    let origin = match origin {
        0 => Origin::Igp,
        1 => Origin::Egp,
        _ => Origin::Incomplete,
    };
    let attrs = AttributeSet {
        origin: Some(origin),
        as_path: vec![AsPathSegment::sequence(
            (0..u32::from(hops)).map(|h| 64510 + h).collect(),
        )],
        next_hop: Some("192.0.2.1".parse().unwrap()),
        local_pref: Some(local_pref),
        originator_id: (originator > 0)
            .then(|| Ipv4Addr::new(10, 0, 0, originator)),
        cluster_list: (0..clusters)
            .map(|c| Ipv4Addr::new(10, 1, 0, c))
            .collect(),
        ..Default::default()
    };
    test_path(&neighbor, attrs)
}

fn candidates_strategy() -> impl Strategy<Value = Vec<Path>> {
    prop::collection::vec(path_strategy(), 1..8).prop_map(|specs| {
        let mut seen = BTreeSet::new();
        specs
            .into_iter()
            .filter(|s| seen.insert(s.0))
            .map(build)
            .collect()
    })
}

fn keyed(paths: &[Path]) -> Vec<Candidate<'_>> {
    paths
        .iter()
        .map(|p| Candidate {
            key: (p.peer_addr(), 0),
            path: p,
        })
        .collect()
}

proptest! {
    /// With distinct peers the best path does not depend on the order
    /// candidates are presented in.
    #[test]
    fn prop_best_is_order_independent(
        paths in candidates_strategy(),
        rotate in 0usize..8,
    ) {
        let forward: PathKey = decide(keyed(&paths), false, false)
            .survivors[0]
            .key;

        let mut reordered = paths.clone();
        let n = reordered.len();
        reordered.rotate_left(rotate % n);
        reordered.reverse();
        let other: PathKey = decide(keyed(&reordered), false, false)
            .survivors[0]
            .key;

        prop_assert_eq!(forward, other);
    }

    /// Every candidate ends up exactly once among survivors, runners up and
    /// pruned pools.
    #[test]
    fn prop_decision_partitions_candidates(
        paths in candidates_strategy(),
        ebgp in any::<bool>(),
        ibgp in any::<bool>(),
    ) {
        let d = decide(keyed(&paths), ebgp, ibgp);
        let mut keys: Vec<PathKey> = d
            .survivors
            .iter()
            .chain(d.runners_up.iter())
            .chain(d.pruned.iter().flat_map(|(_, c)| c.iter()))
            .map(|c| c.key)
            .collect();
        keys.sort();
        let mut expected: Vec<PathKey> =
            paths.iter().map(|p| (p.peer_addr(), 0)).collect();
        expected.sort();
        prop_assert_eq!(keys, expected);
        prop_assert!(!d.survivors.is_empty());
        if !d.multipath {
            prop_assert_eq!(d.survivors.len(), 1);
        }
    }

    /// Live ids are always unique, whatever the interleaving of allocations
    /// and releases.
    #[test]
    fn prop_ids_never_shared(
        ops in prop::collection::vec(any::<Option<u8>>(), 0..200),
    ) {
        let mut ids = IdAllocator::default();
        let mut held: Vec<u32> = Vec::new();
        for op in ops {
            match op {
                None => held.push(ids.alloc()),
                Some(i) if !held.is_empty() => {
                    let id = held.swap_remove(usize::from(i) % held.len());
                    prop_assert!(ids.release(id));
                    prop_assert!(!ids.release(id));
                }
                Some(_) => {}
            }
            let unique: BTreeSet<u32> = held.iter().copied().collect();
            prop_assert_eq!(unique.len(), held.len());
            prop_assert_eq!(ids.live_count(), held.len());
        }
    }
}
