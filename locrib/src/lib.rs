// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The local routing information base (Loc-RIB) of a BGP speaker.
//!
//! For every destination prefix in every configured protocol family the
//! Loc-RIB tracks all paths advertised by all peers, runs the BGP decision
//! process to choose the installed path set, and exposes that choice to the
//! forwarding plane (through a [`route_manager::RouteManager`]) and to
//! management queries (through [`export::RouteExport`]).
//!
//! Mutation of the table is serialized by construction: every ingestion
//! entry point on [`LocRib`] takes `&mut self`. Only the paginated export
//! list is shared with other threads and it carries its own lock.

mod aggregate;
pub mod bestpath;
pub mod config;
pub mod destination;
pub mod error;
pub mod export;
pub mod ids;
pub mod log;
pub mod neighbor;
pub mod path;
pub mod persist;
pub mod rib;
pub mod route;
pub mod route_manager;

#[cfg(test)]
mod proptest;


pub use config::LocRibConfig;
pub use destination::{Action, Destination, Selection};
pub use path::{Path, PathKey, PathSource, RouteType};
pub use rib::{DestKey, LocRib, UpdateOutcome};
pub use route::{DestinationState, Route};
pub use rib_types::*;

use std::net::{IpAddr, Ipv4Addr};

pub const COMPONENT_LOCRIB: &str = "locrib";
pub const MOD_RIB: &str = "rib";
pub const MOD_DESTINATION: &str = "destination";
pub const MOD_EXPORT: &str = "export";
pub const MOD_PERSIST: &str = "persist";

/// Preference of internally learned paths without a LOCAL_PREF attribute
/// and of every locally originated path.
pub const DEFAULT_LOCAL_PREF: u32 = 100;

/// Preference of every externally learned path. LOCAL_PREF only has meaning
/// inside an AS, so a value received from an external peer is ignored.
pub const EXTERNAL_PREF: u32 = 50;

/// Path id reserved for aggregate paths. Peers never share the local peer
/// key, so this cannot collide with a received Add-Path identifier.
pub const AGGREGATE_PATH_ID: u32 = 0;

/// Path id used for connected and static paths.
pub const LOCAL_PATH_ID: u32 = 1;

/// Peer key under which locally originated paths are stored.
pub const LOCAL_PEER: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

#[macro_export]
macro_rules! lock {
    ($mtx:expr) => {
        $mtx.lock().expect("lock mutex")
    };
}

#[macro_export]
macro_rules! read_lock {
    ($rwl:expr) => {
        $rwl.read().expect("rwlock read")
    };
}

#[macro_export]
macro_rules! write_lock {
    ($rwl:expr) => {
        $rwl.write().expect("rwlock write")
    };
}
