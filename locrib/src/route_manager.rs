// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! This module contains the trait that decouples the Loc-RIB from the
//! forwarding RIB. The route manager programs forwarding state and resolves
//! next hops. It never calls back into the Loc-RIB.

use crate::error::Error;
use rib_types::{Prefix, ProtocolFamily};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

/// Result of a successful next hop resolution.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
pub struct ReachabilityInfo {
    /// The immediate next hop the resolved address is reached through.
    pub next_hop: IpAddr,
    pub if_index: u32,
    pub metric: u32,
}

impl ReachabilityInfo {
    /// Reachability of locally originated routes. They resolve to
    /// themselves and are never resolved through the route manager.
    pub fn local(next_hop: IpAddr) -> Self {
        Self {
            next_hop,
            if_index: 0,
            metric: 0,
        }
    }
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
pub enum RouteProtocol {
    Ebgp,
    Ibgp,
    Aggregate,
}

/// A route as programmed into the forwarding RIB.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
pub struct RouteConfig {
    pub family: ProtocolFamily,
    pub prefix: Prefix,
    pub next_hop: IpAddr,
    pub if_index: u32,
    pub metric: u32,
    pub protocol: RouteProtocol,
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
pub enum RouteUpdateOp {
    /// Move the route via `previous` to the next hop carried in the config.
    ReplaceNextHop { previous: IpAddr },
}

pub trait RouteManager: Send + Sync {
    fn create_route(&self, cfg: &RouteConfig) -> Result<(), Error>;

    fn update_route(
        &self,
        cfg: &RouteConfig,
        op: RouteUpdateOp,
    ) -> Result<(), Error>;

    fn delete_route(&self, cfg: &RouteConfig) -> Result<(), Error>;

    /// Resolve `addr` against the forwarding RIB. An unresolvable address is
    /// an error; the caller decides whether to retry.
    fn next_hop_info(
        &self,
        addr: IpAddr,
        if_index: u32,
    ) -> Result<ReachabilityInfo, Error>;

    fn routes(&self) -> Vec<RouteConfig>;
}

pub type RouteManagerRef = Arc<dyn RouteManager>;
