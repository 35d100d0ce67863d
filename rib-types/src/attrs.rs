// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::ProtocolFamily;
use num_enum::TryFromPrimitive;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

/// ORIGIN attribute codes. Lower codes are preferred by the decision
/// process.
#[derive(
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Clone,
    Copy,
    Hash,
    TryFromPrimitive,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[repr(u8)]
pub enum Origin {
    Igp = 0,
    Egp = 1,
    Incomplete = 2,
}

#[derive(
    Debug,
    PartialEq,
    Eq,
    Copy,
    Clone,
    Hash,
    TryFromPrimitive,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[repr(u8)]
pub enum AsPathType {
    AsSet = 1,
    AsSequence = 2,
}

#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize, JsonSchema)]
pub struct AsPathSegment {
    pub typ: AsPathType,
    pub value: Vec<u32>,
}

impl AsPathSegment {
    pub fn sequence(value: Vec<u32>) -> Self {
        Self {
            typ: AsPathType::AsSequence,
            value,
        }
    }

    pub fn set(value: Vec<u32>) -> Self {
        Self {
            typ: AsPathType::AsSet,
            value,
        }
    }

    /// Number of AS hops this segment contributes to path length. An AS_SET
    /// counts as a single hop no matter how many members it has.
    pub fn hop_count(&self) -> usize {
        match self.typ {
            AsPathType::AsSequence => self.value.len(),
            AsPathType::AsSet => usize::from(!self.value.is_empty()),
        }
    }
}

/// AGGREGATOR attribute: the AS and BGP identifier of the speaker that
/// formed an aggregate.
#[derive(
    Debug, PartialEq, Eq, Copy, Clone, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct Aggregator {
    pub asn: u32,
    pub address: Ipv4Addr,
}

/// A decoded set of path attributes as produced by the codec and, where
/// configured, rewritten by import policy.
///
/// Missing optional attributes are `None` or empty. Accessors apply the
/// RFC 4271 defaults that the decision process depends on.
#[derive(
    Debug, Default, PartialEq, Eq, Clone, Serialize, Deserialize, JsonSchema,
)]
pub struct AttributeSet {
    /// ORIGIN (type code 1).
    pub origin: Option<Origin>,
    /// AS_PATH (type code 2), four-octet ASNs.
    pub as_path: Vec<AsPathSegment>,
    /// NEXT_HOP (type code 3).
    pub next_hop: Option<IpAddr>,
    /// Next hop carried in MP_REACH_NLRI (type code 14) for a family.
    pub mp_next_hop: Option<(ProtocolFamily, IpAddr)>,
    /// MULTI_EXIT_DISC (type code 4).
    pub med: Option<u32>,
    /// LOCAL_PREF (type code 5).
    pub local_pref: Option<u32>,
    /// ATOMIC_AGGREGATE (type code 6).
    pub atomic_aggregate: bool,
    /// AGGREGATOR (type code 7).
    pub aggregator: Option<Aggregator>,
    /// ORIGINATOR_ID (type code 9, RFC 4456).
    pub originator_id: Option<Ipv4Addr>,
    /// CLUSTER_LIST (type code 10, RFC 4456).
    pub cluster_list: Vec<Ipv4Addr>,
    /// COMMUNITIES (type code 8, RFC 1997).
    pub communities: Vec<u32>,
}

impl AttributeSet {
    /// ORIGIN, treating a missing attribute as the least preferred code.
    pub fn origin(&self) -> Origin {
        self.origin.unwrap_or(Origin::Incomplete)
    }

    pub fn as_path_len(&self) -> usize {
        self.as_path.iter().map(AsPathSegment::hop_count).sum()
    }

    /// Every ASN in the AS path, in path order.
    pub fn asns(&self) -> impl Iterator<Item = u32> + '_ {
        self.as_path.iter().flat_map(|s| s.value.iter().copied())
    }

    pub fn contains_asn(&self, asn: u32) -> bool {
        self.asns().any(|x| x == asn)
    }

    /// The next hop to use for routes of `family`. A multiprotocol next hop
    /// for the family wins over the classic NEXT_HOP attribute, which is
    /// only used when it is an address of the family's AFI.
    pub fn next_hop_for(&self, family: ProtocolFamily) -> Option<IpAddr> {
        if let Some((f, nh)) = self.mp_next_hop {
            if f == family {
                return Some(nh);
            }
        }
        self.next_hop.filter(|nh| family.carries_addr(nh))
    }
}
