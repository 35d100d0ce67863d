// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::path::{Path, RouteType};
use chrono::{DateTime, Utc};
use rib_types::{Origin, Prefix, ProtocolFamily};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Externally visible snapshot of one path held by a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Route {
    pub peer: IpAddr,
    pub path_id: u32,
    /// Path id used when announcing this path with Add-Path.
    pub out_path_id: u32,
    pub next_hop: Option<IpAddr>,
    pub med: Option<u32>,
    pub local_pref: u32,
    pub as_path: Vec<u32>,
    pub origin: Origin,
    pub route_type: RouteType,
    pub updated: DateTime<Utc>,
    pub best: bool,
    pub multipath: bool,
    pub additional_path: bool,
    /// Position in the destination's route list.
    pub idx: usize,
}

impl Route {
    pub(crate) fn new(
        path: &Path,
        path_id: u32,
        family: ProtocolFamily,
        out_path_id: u32,
        idx: usize,
    ) -> Self {
        Self {
            peer: path.peer_addr(),
            path_id,
            out_path_id,
            next_hop: path.next_hop(family),
            med: path.med(),
            local_pref: path.pref(),
            as_path: path.attrs.asns().collect(),
            origin: path.origin(),
            route_type: path.route_type,
            updated: Utc::now(),
            best: false,
            multipath: false,
            additional_path: false,
            idx,
        }
    }

    /// Take the data of a replacing path, keeping position, output id and
    /// selection flags.
    pub(crate) fn refresh(&mut self, path: &Path, family: ProtocolFamily) {
        self.next_hop = path.next_hop(family);
        self.med = path.med();
        self.local_pref = path.pref();
        self.as_path = path.attrs.asns().collect();
        self.origin = path.origin();
        self.route_type = path.route_type;
        self.updated = Utc::now();
    }

    pub(crate) fn clear_flags(&mut self) {
        self.best = false;
        self.multipath = false;
        self.additional_path = false;
    }
}

/// Snapshot of every route a destination holds, in route list order. This
/// is the unit handed to management queries and persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DestinationState {
    pub family: ProtocolFamily,
    pub prefix: Prefix,
    pub paths: Vec<Route>,
}

impl DestinationState {
    pub fn best(&self) -> Option<&Route> {
        self.paths.iter().find(|r| r.best)
    }
}
