// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::aggregate::Aggregation;
use crate::neighbor::Neighbor;
use crate::route_manager::ReachabilityInfo;
use crate::{DEFAULT_LOCAL_PREF, EXTERNAL_PREF, LOCAL_PEER};
use rib_types::{AttributeSet, Origin, ProtocolFamily};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

/// Identity of a path within one destination: the advertising peer and the
/// Add-Path identifier it used.
pub type PathKey = (IpAddr, u32);

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
pub enum RouteType {
    Aggregate,
    Connected,
    Static,
    /// Learned from a peer in the local AS.
    Igp,
    /// Learned from a peer in another AS.
    Egp,
}

/// Coarse preference tier of a path. A path of a lower class always beats
/// one of a higher class, before any attribute is compared.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum RouteSourceClass {
    Local,
    External,
}

impl From<RouteType> for RouteSourceClass {
    fn from(value: RouteType) -> Self {
        match value {
            RouteType::Aggregate | RouteType::Connected | RouteType::Static => {
                Self::Local
            }
            RouteType::Igp | RouteType::Egp => Self::External,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PathSource {
    /// Originated by this speaker.
    Local { router_id: Ipv4Addr },
    Peer {
        addr: IpAddr,
        bgp_id: Ipv4Addr,
        internal: bool,
    },
}

/// Next hop of a path for one family and the outcome of resolving it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NextHopState {
    pub next_hop: IpAddr,
    pub info: Option<ReachabilityInfo>,
}

/// One advertisement as held by a destination.
#[derive(Debug, Clone)]
pub struct Path {
    /// Identity of the update this path was ingested from. Every copy of a
    /// representative path made for individual destinations shares it.
    pub serial: u64,
    pub source: PathSource,
    pub attrs: Arc<AttributeSet>,
    pub route_type: RouteType,
    pref: u32,
    reachability: BTreeMap<ProtocolFamily, NextHopState>,
    pub(crate) aggregation: Option<Aggregation>,
    withdrawn: bool,
}

impl Path {
    pub fn from_neighbor(
        neighbor: &dyn Neighbor,
        attrs: Arc<AttributeSet>,
    ) -> Self {
        let internal = neighbor.is_internal();
        let source = PathSource::Peer {
            addr: neighbor.peer_addr(),
            bgp_id: neighbor.bgp_id(),
            internal,
        };
        let route_type = if internal {
            RouteType::Igp
        } else {
            RouteType::Egp
        };
        Self::new(source, route_type, attrs)
    }

    pub fn local(
        router_id: Ipv4Addr,
        route_type: RouteType,
        attrs: Arc<AttributeSet>,
    ) -> Self {
        Self::new(PathSource::Local { router_id }, route_type, attrs)
    }

    pub(crate) fn new(
        source: PathSource,
        route_type: RouteType,
        attrs: Arc<AttributeSet>,
    ) -> Self {
        // A LOCAL_PREF received over an external session is ignored.
        let pref = match source {
            PathSource::Local { .. } => DEFAULT_LOCAL_PREF,
            PathSource::Peer { internal: true, .. } => {
                attrs.local_pref.unwrap_or(DEFAULT_LOCAL_PREF)
            }
            PathSource::Peer {
                internal: false, ..
            } => EXTERNAL_PREF,
        };
        Self {
            serial: 0,
            source,
            attrs,
            route_type,
            pref,
            reachability: BTreeMap::new(),
            aggregation: None,
            withdrawn: false,
        }
    }

    /// A copy used only to name the path being withdrawn. It is never
    /// installed, so its attributes may be dropped freely.
    pub fn withdrawal_marker(&self) -> Self {
        Self {
            aggregation: None,
            withdrawn: true,
            ..self.clone()
        }
    }

    pub fn is_withdrawal_marker(&self) -> bool {
        self.withdrawn
    }

    pub fn pref(&self) -> u32 {
        self.pref
    }

    pub fn peer_addr(&self) -> IpAddr {
        match self.source {
            PathSource::Local { .. } => LOCAL_PEER,
            PathSource::Peer { addr, .. } => addr,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.source, PathSource::Local { .. })
    }

    pub fn is_internal(&self) -> bool {
        matches!(self.source, PathSource::Peer { internal: true, .. })
    }

    pub fn is_external(&self) -> bool {
        matches!(
            self.source,
            PathSource::Peer {
                internal: false,
                ..
            }
        )
    }

    pub fn is_aggregate(&self) -> bool {
        self.route_type == RouteType::Aggregate
    }

    pub fn class(&self) -> RouteSourceClass {
        self.route_type.into()
    }

    pub fn as_path_len(&self) -> usize {
        self.attrs.as_path_len()
    }

    pub fn origin(&self) -> Origin {
        self.attrs.origin()
    }

    pub fn med(&self) -> Option<u32> {
        self.attrs.med
    }

    /// The identifier of the speaker that originated the path into the AS:
    /// the ORIGINATOR_ID of a reflected path, else the advertising peer.
    pub fn bgp_id(&self) -> Ipv4Addr {
        if let Some(id) = self.attrs.originator_id {
            return id;
        }
        match self.source {
            PathSource::Local { router_id } => router_id,
            PathSource::Peer { bgp_id, .. } => bgp_id,
        }
    }

    pub fn cluster_list_len(&self) -> usize {
        self.attrs.cluster_list.len()
    }

    pub fn set_next_hop(&mut self, family: ProtocolFamily, next_hop: IpAddr) {
        self.reachability
            .entry(family)
            .and_modify(|s| {
                if s.next_hop != next_hop {
                    s.next_hop = next_hop;
                    s.info = None;
                }
            })
            .or_insert(NextHopState {
                next_hop,
                info: None,
            });
    }

    pub fn set_reachability(
        &mut self,
        family: ProtocolFamily,
        next_hop: IpAddr,
        info: ReachabilityInfo,
    ) {
        self.reachability.insert(
            family,
            NextHopState {
                next_hop,
                info: Some(info),
            },
        );
    }

    /// Next hop for `family`: the one set by resolution if any, else the one
    /// carried in the attributes.
    pub fn next_hop(&self, family: ProtocolFamily) -> Option<IpAddr> {
        match self.reachability.get(&family) {
            Some(s) => Some(s.next_hop),
            None => self.attrs.next_hop_for(family),
        }
    }

    pub fn reachability(
        &self,
        family: ProtocolFamily,
    ) -> Option<&ReachabilityInfo> {
        self.reachability.get(&family).and_then(|s| s.info.as_ref())
    }

    pub fn is_reachable(&self, family: ProtocolFamily) -> bool {
        self.reachability(family).is_some()
    }

    /// True when the AS path already traverses `local_asn`. Locally
    /// originated paths never loop.
    pub fn has_as_loop(&self, local_asn: u32) -> bool {
        !self.is_local() && self.attrs.contains_asn(local_asn)
    }

    /// Route reflection split horizon: a path carrying our own
    /// ORIGINATOR_ID or our CLUSTER_ID has already been through us.
    pub fn is_valid(&self, router_id: Ipv4Addr, cluster_id: Ipv4Addr) -> bool {
        if self.is_local() {
            return true;
        }
        if self.attrs.originator_id == Some(router_id) {
            return false;
        }
        !self.attrs.cluster_list.contains(&cluster_id)
    }
}
