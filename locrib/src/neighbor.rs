// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

/// The session layer's view of a peer, as consumed by the Loc-RIB.
///
/// Prefix accounting lives with the session because exceeding a configured
/// maximum is a session level event. The Loc-RIB only asks whether one more
/// prefix may be admitted and keeps the count in step with what it actually
/// holds for the peer.
pub trait Neighbor: Send + Sync {
    fn peer_addr(&self) -> IpAddr;

    /// BGP identifier from the peer's OPEN.
    fn bgp_id(&self) -> Ipv4Addr;

    /// True when the peer is in the local AS.
    fn is_internal(&self) -> bool;

    fn can_accept_new_prefix(&self) -> bool;

    fn incr_prefix_count(&self);

    fn decr_prefix_count(&self);
}

pub type NeighborRef = Arc<dyn Neighbor>;
