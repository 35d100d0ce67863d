// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property-based tests for prefix containment, which aggregation relies on
//! to decide whether a contributor belongs under an aggregate.

use crate::{Prefix, Prefix4, Prefix6};
use proptest::prelude::*;
use std::net::{Ipv4Addr, Ipv6Addr};

fn ipv4_prefix_strategy() -> impl Strategy<Value = Prefix4> {
    (any::<u32>(), 0u8..=32u8).prop_map(|(addr_bits, length)| {
        Prefix4::new(Ipv4Addr::from(addr_bits), length)
    })
}

fn ipv6_prefix_strategy() -> impl Strategy<Value = Prefix6> {
    (any::<u128>(), 0u8..=128u8).prop_map(|(addr_bits, length)| {
        Prefix6::new(Ipv6Addr::from(addr_bits), length)
    })
}

proptest! {
    #[test]
    fn prop_host_bits_unset(
        p4 in ipv4_prefix_strategy(),
        p6 in ipv6_prefix_strategy(),
    ) {
        prop_assert!(p4.host_bits_are_unset(), "{p4} has host bits set");
        prop_assert!(p6.host_bits_are_unset(), "{p6} has host bits set");
    }

    #[test]
    fn prop_within_self(
        p4 in ipv4_prefix_strategy(),
        p6 in ipv6_prefix_strategy(),
    ) {
        prop_assert!(p4.within(&p4));
        prop_assert!(p6.within(&p6));
    }

    #[test]
    fn prop_shorter_cover_contains(
        p in ipv4_prefix_strategy(),
        cut in 0u8..=32u8,
    ) {
        let cover = Prefix4::new(p.value, cut.min(p.length));
        prop_assert!(p.within(&cover), "{p} should be within {cover}");
        if cover.length < p.length {
            prop_assert!(!cover.within(&p), "{cover} should not be within {p}");
        }
    }

    #[test]
    fn prop_no_cross_family(
        p4 in ipv4_prefix_strategy(),
        p6 in ipv6_prefix_strategy(),
    ) {
        let v4 = Prefix::V4(p4);
        let v6 = Prefix::V6(p6);
        prop_assert!(!v4.within(&v6));
        prop_assert!(!v6.within(&v4));
    }

    #[test]
    fn prop_display_roundtrip(
        p4 in ipv4_prefix_strategy(),
        p6 in ipv6_prefix_strategy(),
    ) {
        let v4 = Prefix::V4(p4);
        let v6 = Prefix::V6(p6);
        prop_assert_eq!(v4.to_string().parse::<Prefix>(), Ok(v4));
        prop_assert_eq!(v6.to_string().parse::<Prefix>(), Ok(v6));
    }
}
