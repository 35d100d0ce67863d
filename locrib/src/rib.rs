// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The table of tables.
//!
//! [`LocRib`] owns every destination, partitioned by protocol family, and is
//! the single entry point for applying decoded updates. Next hops are
//! resolved before any destination is touched. Additions whose next hop does
//! not resolve are parked per next hop and replayed the first time that next
//! hop resolves. Only successful resolutions are cached, so a failed one is
//! retried on every later lookup of the same next hop.

use crate::config::LocRibConfig;
use crate::destination::{Action, DecisionContext, Destination};
use crate::export::RouteExport;
use crate::log::locrib_log;
use crate::neighbor::NeighborRef;
use crate::path::{Path, RouteType};
use crate::persist::StateClientRef;
use crate::route::DestinationState;
use crate::route_manager::{ReachabilityInfo, RouteManagerRef};
use crate::{AGGREGATE_PATH_ID, LOCAL_PATH_ID, LOCAL_PEER, MOD_RIB};
use rib_types::{Afi, AttributeSet, Nlri, Prefix, ProtocolFamily};
use slog::Logger;
use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::thread::JoinHandle;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DestKey {
    pub family: ProtocolFamily,
    pub prefix: Prefix,
}

impl DestKey {
    pub fn new(family: ProtocolFamily, prefix: Prefix) -> Self {
        Self { family, prefix }
    }
}

/// Destinations whose best path is now `path`.
#[derive(Debug, Clone)]
pub struct UpdatedPath {
    pub path: Path,
    pub destinations: Vec<DestKey>,
}

/// Accumulated results of one or more ingestion calls, for the announcement
/// side to act on.
#[derive(Debug)]
pub struct UpdateOutcome {
    /// Destinations with a new or changed best path, grouped by the serial
    /// of that path so destinations sharing attributes announce together.
    pub updated: BTreeMap<u64, UpdatedPath>,
    /// Destinations left with no installed path.
    pub withdrawn: Vec<DestKey>,
    pub add_paths_changed: BTreeSet<DestKey>,
    /// Cleared when admission control turned away at least one prefix.
    pub all_prefixes_accepted: bool,
}

impl Default for UpdateOutcome {
    fn default() -> Self {
        Self {
            updated: BTreeMap::new(),
            withdrawn: Vec::new(),
            add_paths_changed: BTreeSet::new(),
            all_prefixes_accepted: true,
        }
    }
}

impl UpdateOutcome {
    pub fn is_updated(&self, key: &DestKey) -> bool {
        self.updated.values().any(|u| u.destinations.contains(key))
    }
}

/// Additions parked until their next hop resolves.
struct PendingPath {
    path: Path,
    neighbor: NeighborRef,
    add_path_budget: usize,
    destinations: BTreeMap<DestKey, BTreeSet<u32>>,
}

fn unspecified(family: ProtocolFamily) -> IpAddr {
    match family.afi {
        Afi::Ipv4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        Afi::Ipv6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    }
}

pub struct LocRib {
    config: LocRibConfig,
    destinations: BTreeMap<ProtocolFamily, BTreeMap<Prefix, Destination>>,
    reachability: BTreeMap<IpAddr, ReachabilityInfo>,
    unreachable_paths: BTreeMap<IpAddr, BTreeMap<u64, PendingPath>>,
    route_manager: RouteManagerRef,
    state_client: StateClientRef,
    export: Arc<RouteExport>,
    reaper: Option<JoinHandle<()>>,
    serial: u64,
    log: Logger,
}

impl LocRib {
    pub fn new(
        config: LocRibConfig,
        route_manager: RouteManagerRef,
        state_client: StateClientRef,
        log: Logger,
    ) -> Self {
        let export = Arc::new(RouteExport::new(
            config.export_idle_timeout(),
            log.clone(),
        ));
        let reaper = match export.spawn_idle_reaper() {
            Ok(handle) => Some(handle),
            Err(e) => {
                slog::error!(log,
                    "failed to start export idle reaper: {}", e;
                    "component" => crate::COMPONENT_LOCRIB,
                    "module" => MOD_RIB
                );
                None
            }
        };
        Self {
            config,
            destinations: BTreeMap::new(),
            reachability: BTreeMap::new(),
            unreachable_paths: BTreeMap::new(),
            route_manager,
            state_client,
            export,
            reaper,
            serial: 0,
            log,
        }
    }

    pub fn config(&self) -> &LocRibConfig {
        &self.config
    }

    /// The paginated export list. It is safe to read from other threads
    /// while this table is being mutated.
    pub fn export(&self) -> Arc<RouteExport> {
        self.export.clone()
    }

    /// True while the thread that ends idle export walks is running.
    pub fn is_reaper_running(&self) -> bool {
        self.reaper.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn next_serial(&mut self) -> u64 {
        self.serial += 1;
        self.serial
    }

    pub fn destination_count(&self, family: ProtocolFamily) -> usize {
        self.destinations.get(&family).map(BTreeMap::len).unwrap_or(0)
    }

    /// Number of additions waiting on an unresolved next hop.
    pub fn pending_count(&self) -> usize {
        self.unreachable_paths
            .values()
            .flat_map(BTreeMap::values)
            .flat_map(|p| p.destinations.values())
            .map(BTreeSet::len)
            .sum()
    }

    /// Look up a destination, creating it when `create` is set. The flag
    /// returned is true if the destination already existed.
    pub fn get_dest(
        &mut self,
        prefix: Prefix,
        family: ProtocolFamily,
        create: bool,
    ) -> Option<(&mut Destination, bool)> {
        if !create {
            return self
                .destinations
                .get_mut(&family)?
                .get_mut(&prefix)
                .map(|d| (d, true));
        }
        let table = self.destinations.entry(family).or_default();
        let existed = table.contains_key(&prefix);
        if !existed {
            let dest = Destination::new(family, prefix);
            self.export.upsert(dest.state());
            table.insert(prefix, dest);
        }
        table.get_mut(&prefix).map(|d| (d, existed))
    }

    pub fn get_bgp_route(
        &self,
        prefix: &Prefix,
        family: ProtocolFamily,
    ) -> Option<DestinationState> {
        self.destinations
            .get(&family)?
            .get(prefix)
            .map(Destination::state)
    }

    /// Resolve `next_hop` through the route manager unless a previous
    /// resolution succeeded.
    pub fn get_reachability_info(
        &mut self,
        next_hop: IpAddr,
    ) -> Option<ReachabilityInfo> {
        if let Some(info) = self.reachability.get(&next_hop) {
            return Some(*info);
        }
        match self.route_manager.next_hop_info(next_hop, 0) {
            Ok(info) => {
                self.reachability.insert(next_hop, info);
                Some(info)
            }
            Err(e) => {
                locrib_log!(self, MOD_RIB, debug,
                    "next hop {} unresolved: {}", next_hop, e
                );
                None
            }
        }
    }

    /// Apply one family's worth of one update from `neighbor`. `path` carries
    /// the attributes shared by every prefix in `added`.
    #[allow(clippy::too_many_arguments)]
    pub fn process_update(
        &mut self,
        neighbor: &NeighborRef,
        path: Path,
        added: &[Nlri],
        removed: &[Nlri],
        family: ProtocolFamily,
        add_path_budget: usize,
        out: &mut UpdateOutcome,
    ) {
        let mut path = path;
        path.serial = self.next_serial();
        let marker = path.withdrawal_marker();

        if !path.is_valid(self.config.router_id, self.config.cluster_id()) {
            locrib_log!(self, MOD_RIB, info,
                "ignoring reflected path from {} that passed through us",
                neighbor.peer_addr();
                "family" => family.to_string()
            );
            self.process_routes(
                Some(neighbor),
                None,
                &marker,
                &[],
                removed,
                family,
                add_path_budget,
                out,
            );
            return;
        }

        self.test_nh_and_process_routes(
            neighbor,
            path,
            &marker,
            added,
            removed,
            family,
            add_path_budget,
            out,
        );
    }

    /// Apply the outcome of import policy: `permitted` prefixes are installed
    /// and `filtered` ones are withdrawn.
    #[allow(clippy::too_many_arguments)]
    pub fn process_filtered_routes(
        &mut self,
        neighbor: &NeighborRef,
        path: Path,
        permitted: &[Nlri],
        filtered: &[Nlri],
        family: ProtocolFamily,
        add_path_budget: usize,
        out: &mut UpdateOutcome,
    ) {
        self.process_update(
            neighbor,
            path,
            permitted,
            filtered,
            family,
            add_path_budget,
            out,
        );
    }

    /// Install or remove directly connected prefixes. They resolve to
    /// themselves and bypass admission control.
    pub fn process_connected_routes(
        &mut self,
        attrs: Arc<AttributeSet>,
        added: &[Prefix],
        removed: &[Prefix],
        family: ProtocolFamily,
        out: &mut UpdateOutcome,
    ) {
        let mut path =
            Path::local(self.config.router_id, RouteType::Connected, attrs);
        path.serial = self.next_serial();
        let nh = path.next_hop(family).unwrap_or_else(|| unspecified(family));
        path.set_reachability(family, nh, ReachabilityInfo::local(nh));
        let marker = path.withdrawal_marker();

        let added: Vec<Nlri> = added
            .iter()
            .map(|p| Nlri::with_path_id(*p, LOCAL_PATH_ID))
            .collect();
        let removed: Vec<Nlri> = removed
            .iter()
            .map(|p| Nlri::with_path_id(*p, LOCAL_PATH_ID))
            .collect();
        self.process_routes(
            None,
            Some(&path),
            &marker,
            &added,
            &removed,
            family,
            0,
            out,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn test_nh_and_process_routes(
        &mut self,
        neighbor: &NeighborRef,
        path: Path,
        marker: &Path,
        added: &[Nlri],
        removed: &[Nlri],
        family: ProtocolFamily,
        add_path_budget: usize,
        out: &mut UpdateOutcome,
    ) {
        let mut path = path;
        let next_hop = if added.is_empty() {
            None
        } else {
            let nh = path.next_hop(family);
            if nh.is_none() {
                locrib_log!(self, MOD_RIB, warn,
                    "update from {} has no {} next hop",
                    neighbor.peer_addr(), family
                );
            }
            nh
        };

        let Some(nh) = next_hop else {
            self.process_routes(
                Some(neighbor),
                None,
                marker,
                &[],
                removed,
                family,
                add_path_budget,
                out,
            );
            return;
        };

        let Some(info) = self.get_reachability_info(nh) else {
            // The advertisement implicitly withdraws whatever the peer
            // already has for the same prefix and path id.
            let peer = neighbor.peer_addr();
            let mut withdrawals = removed.to_vec();
            for nlri in added {
                let held = self
                    .get_dest(nlri.prefix, family, false)
                    .is_some_and(|(d, _)| d.path(peer, nlri.path_id).is_some());
                if held && !withdrawals.contains(nlri) {
                    withdrawals.push(*nlri);
                }
            }
            self.process_routes(
                Some(neighbor),
                None,
                marker,
                &[],
                &withdrawals,
                family,
                add_path_budget,
                out,
            );
            self.defer(neighbor, path, nh, added, family, add_path_budget);
            return;
        };

        path.set_reachability(family, nh, info);
        if self.unreachable_paths.contains_key(&nh) {
            self.process_routes_for_reachable_routes(nh, info, out);
        }
        self.process_routes(
            Some(neighbor),
            Some(&path),
            marker,
            added,
            removed,
            family,
            add_path_budget,
            out,
        );
    }

    fn defer(
        &mut self,
        neighbor: &NeighborRef,
        path: Path,
        next_hop: IpAddr,
        added: &[Nlri],
        family: ProtocolFamily,
        add_path_budget: usize,
    ) {
        let peer = path.peer_addr();
        for nlri in added {
            self.purge_pending(
                peer,
                DestKey::new(family, nlri.prefix),
                nlri.path_id,
            );
        }

        locrib_log!(self, MOD_RIB, debug,
            "deferring {} prefixes from {} until {} resolves",
            added.len(), peer, next_hop;
            "family" => family.to_string()
        );

        let serial = path.serial;
        let pending = self
            .unreachable_paths
            .entry(next_hop)
            .or_default()
            .entry(serial)
            .or_insert_with(|| PendingPath {
                path,
                neighbor: neighbor.clone(),
                add_path_budget,
                destinations: BTreeMap::new(),
            });
        for nlri in added.iter().filter(|n| family.carries(&n.prefix)) {
            pending
                .destinations
                .entry(DestKey::new(family, nlri.prefix))
                .or_default()
                .insert(nlri.path_id);
        }
    }

    /// Drop any parked addition from `peer` for `key` and `path_id`.
    fn purge_pending(&mut self, peer: IpAddr, key: DestKey, path_id: u32) {
        for pending in self.unreachable_paths.values_mut() {
            for p in pending.values_mut() {
                if p.path.peer_addr() != peer {
                    continue;
                }
                if let Some(ids) = p.destinations.get_mut(&key) {
                    ids.remove(&path_id);
                    if ids.is_empty() {
                        p.destinations.remove(&key);
                    }
                }
            }
            pending.retain(|_, p| !p.destinations.is_empty());
        }
        self.unreachable_paths.retain(|_, m| !m.is_empty());
    }

    /// Install everything parked behind `next_hop`, which now resolves.
    fn process_routes_for_reachable_routes(
        &mut self,
        next_hop: IpAddr,
        info: ReachabilityInfo,
        out: &mut UpdateOutcome,
    ) {
        let Some(pending) = self.unreachable_paths.remove(&next_hop) else {
            return;
        };
        locrib_log!(self, MOD_RIB, debug,
            "next hop {} resolved, replaying {} parked paths",
            next_hop, pending.len()
        );

        for (_, p) in pending {
            let mut by_family: BTreeMap<ProtocolFamily, Vec<Nlri>> =
                BTreeMap::new();
            for (key, ids) in &p.destinations {
                by_family.entry(key.family).or_default().extend(
                    ids.iter().map(|id| Nlri::with_path_id(key.prefix, *id)),
                );
            }
            let mut path = p.path;
            let marker = path.withdrawal_marker();
            for (family, added) in by_family {
                path.set_reachability(family, next_hop, info);
                self.process_routes(
                    Some(&p.neighbor),
                    Some(&path),
                    &marker,
                    &added,
                    &[],
                    family,
                    p.add_path_budget,
                    out,
                );
            }
        }
    }

    /// Try every parked next hop again, replaying those that now resolve.
    pub fn retry_unreachable_paths(&mut self, out: &mut UpdateOutcome) {
        let next_hops: Vec<IpAddr> =
            self.unreachable_paths.keys().copied().collect();
        for nh in next_hops {
            if let Some(info) = self.get_reachability_info(nh) {
                self.process_routes_for_reachable_routes(nh, info, out);
            }
        }
    }

    /// Apply withdrawals then additions to their destinations, and run the
    /// decision process on every destination touched. Additions are only
    /// applied when `path` is given, in which case its next hop has
    /// resolved.
    #[allow(clippy::too_many_arguments)]
    fn process_routes(
        &mut self,
        neighbor: Option<&NeighborRef>,
        path: Option<&Path>,
        marker: &Path,
        added: &[Nlri],
        removed: &[Nlri],
        family: ProtocolFamily,
        add_path_budget: usize,
        out: &mut UpdateOutcome,
    ) {
        let peer = marker.peer_addr();
        let mut touched: BTreeSet<Prefix> = BTreeSet::new();

        for nlri in removed {
            if !family.carries(&nlri.prefix) {
                locrib_log!(self, MOD_RIB, warn,
                    "withdrawal of {} outside family {}", nlri, family
                );
                continue;
            }
            if path.is_some() && added.contains(nlri) {
                continue;
            }
            self.purge_pending(
                peer,
                DestKey::new(family, nlri.prefix),
                nlri.path_id,
            );
            let Some((dest, _)) = self.get_dest(nlri.prefix, family, false)
            else {
                locrib_log!(self, MOD_RIB, warn,
                    "withdrawal of unknown destination {} from {}", nlri, peer;
                    "family" => family.to_string()
                );
                continue;
            };
            if dest.remove_path(peer, nlri.path_id).is_some() {
                if let Some(n) = neighbor {
                    n.decr_prefix_count();
                }
                touched.insert(nlri.prefix);
            } else {
                locrib_log!(self, MOD_RIB, warn,
                    "withdrawal of unknown path {} from {}", nlri, peer;
                    "family" => family.to_string()
                );
            }
        }

        if let Some(path) = path {
            for nlri in added {
                if !family.carries(&nlri.prefix) {
                    locrib_log!(self, MOD_RIB, warn,
                        "advertisement of {} outside family {}", nlri, family
                    );
                    continue;
                }
                self.purge_pending(
                    peer,
                    DestKey::new(family, nlri.prefix),
                    nlri.path_id,
                );
                let known = self
                    .get_dest(nlri.prefix, family, false)
                    .is_some_and(|(d, _)| d.path(peer, nlri.path_id).is_some());
                if let Some(n) = neighbor {
                    if !known && !n.can_accept_new_prefix() {
                        locrib_log!(self, MOD_RIB, info,
                            "prefix limit reached, rejecting {} from {}",
                            nlri, peer;
                            "family" => family.to_string()
                        );
                        out.all_prefixes_accepted = false;
                        continue;
                    }
                }
                let Some((dest, _)) = self.get_dest(nlri.prefix, family, true)
                else {
                    continue;
                };
                if dest.add_or_update_path(peer, nlri.path_id, path.clone()) {
                    if let Some(n) = neighbor {
                        n.incr_prefix_count();
                    }
                }
                touched.insert(nlri.prefix);
            }
        }

        for prefix in touched {
            self.process_destination(family, prefix, add_path_budget, out);
        }
    }

    /// Run the decision process for one destination and propagate the
    /// result to the outcome, the export list, persistence and any
    /// aggregates the destination contributes to.
    fn process_destination(
        &mut self,
        family: ProtocolFamily,
        prefix: Prefix,
        add_path_budget: usize,
        out: &mut UpdateOutcome,
    ) {
        let ctx = DecisionContext {
            config: &self.config,
            route_manager: self.route_manager.as_ref(),
            log: &self.log,
        };
        let Some(dest) = self
            .destinations
            .get_mut(&family)
            .and_then(|t| t.get_mut(&prefix))
        else {
            return;
        };

        let selection = dest.select_route_for_loc_rib(&ctx, add_path_budget);
        let key = DestKey::new(family, prefix);
        let state = dest.state();
        let best = dest.best_path().cloned();
        let aggregates: Vec<Prefix> = dest.aggregates.iter().copied().collect();
        let empty = dest.is_empty();

        if selection.add_paths_changed {
            out.add_paths_changed.insert(key);
        }
        match selection.action {
            Action::Add | Action::Replace => {
                if let Some(best) = best.as_ref() {
                    out.updated
                        .entry(best.serial)
                        .or_insert_with(|| UpdatedPath {
                            path: best.clone(),
                            destinations: Vec::new(),
                        })
                        .destinations
                        .push(key);
                }
            }
            Action::Delete => out.withdrawn.push(key),
            Action::None => {}
        }

        if empty {
            if let Some(table) = self.destinations.get_mut(&family) {
                table.remove(&prefix);
                if table.is_empty() {
                    self.destinations.remove(&family);
                }
            }
            self.export.remove(family, &prefix);
            self.state_client.delete_object(&state);
            for aggregate in aggregates {
                self.remove_route_from_aggregate(
                    aggregate,
                    family,
                    prefix,
                    out,
                );
            }
            return;
        }

        self.export.upsert(state.clone());
        match selection.action {
            Action::Add => self.state_client.add_object(&state),
            _ => self.state_client.update_object(&state),
        }

        if selection.action == Action::None {
            return;
        }
        for aggregate in aggregates {
            if best.is_some() {
                self.add_route_to_aggregate(
                    aggregate,
                    family,
                    prefix,
                    false,
                    out,
                );
            } else {
                self.remove_route_from_aggregate(
                    aggregate,
                    family,
                    prefix,
                    out,
                );
            }
        }
    }

    /// Make `contributor`'s best path part of the aggregate `aggregate`,
    /// creating the aggregate if needed. `generate_as_set` only applies to a
    /// new aggregate. Returns false if the contributor is not more specific
    /// than the aggregate or has no best path.
    pub fn add_route_to_aggregate(
        &mut self,
        aggregate: Prefix,
        family: ProtocolFamily,
        contributor: Prefix,
        generate_as_set: bool,
        out: &mut UpdateOutcome,
    ) -> bool {
        if !contributor.within(&aggregate)
            || contributor.length() <= aggregate.length()
        {
            locrib_log!(self, MOD_RIB, warn,
                "{} cannot contribute to aggregate {}", contributor, aggregate
            );
            return false;
        }

        let attrs = self
            .get_dest(contributor, family, false)
            .and_then(|(dest, _)| {
                let attrs = dest.best_path()?.attrs.clone();
                dest.aggregates.insert(aggregate);
                Some(attrs)
            });
        let Some(attrs) = attrs else {
            locrib_log!(self, MOD_RIB, warn,
                "contributor {} has no best path", contributor;
                "family" => family.to_string()
            );
            return false;
        };

        let asn = self.config.asn;
        let router_id = self.config.router_id;
        let serial = self.next_serial();
        let Some((dest, _)) = self.get_dest(aggregate, family, true) else {
            return false;
        };
        let mut path = match dest.path(LOCAL_PEER, AGGREGATE_PATH_ID) {
            Some(existing) => existing.clone(),
            None => {
                let mut p = Path::aggregate(asn, router_id, generate_as_set);
                let nh = unspecified(family);
                p.set_reachability(family, nh, ReachabilityInfo::local(nh));
                p
            }
        };
        path.serial = serial;
        path.add_contributor(contributor, attrs);
        dest.add_or_update_path(LOCAL_PEER, AGGREGATE_PATH_ID, path);

        self.process_destination(family, aggregate, 0, out);
        true
    }

    /// Take `contributor` out of the aggregate `aggregate`. The aggregate
    /// is withdrawn with its last contributor.
    pub fn remove_route_from_aggregate(
        &mut self,
        aggregate: Prefix,
        family: ProtocolFamily,
        contributor: Prefix,
        out: &mut UpdateOutcome,
    ) -> bool {
        if let Some((dest, _)) = self.get_dest(contributor, family, false) {
            dest.aggregates.remove(&aggregate);
        }

        let serial = self.next_serial();
        let Some((dest, _)) = self.get_dest(aggregate, family, false) else {
            locrib_log!(self, MOD_RIB, warn,
                "aggregate {} not found", aggregate;
                "family" => family.to_string()
            );
            return false;
        };
        let Some(mut path) = dest.path(LOCAL_PEER, AGGREGATE_PATH_ID).cloned()
        else {
            locrib_log!(self, MOD_RIB, warn,
                "{} is not an aggregate", aggregate
            );
            return false;
        };
        if !path.has_contributor(&contributor) {
            locrib_log!(self, MOD_RIB, warn,
                "{} does not contribute to {}", contributor, aggregate
            );
            return false;
        }
        path.remove_contributor(&contributor);

        if path.contributor_count() == 0 {
            dest.remove_path(LOCAL_PEER, AGGREGATE_PATH_ID);
        } else {
            path.serial = serial;
            dest.add_or_update_path(LOCAL_PEER, AGGREGATE_PATH_ID, path);
        }
        self.process_destination(family, aggregate, 0, out);
        true
    }

    /// Remove every path learned from `neighbor`, parked ones included.
    pub fn remove_updates_from_neighbor(
        &mut self,
        neighbor: &NeighborRef,
        add_path_budget: usize,
        out: &mut UpdateOutcome,
    ) {
        let peer = neighbor.peer_addr();
        for pending in self.unreachable_paths.values_mut() {
            pending.retain(|_, p| p.path.peer_addr() != peer);
        }
        self.unreachable_paths.retain(|_, m| !m.is_empty());

        for key in self.dest_keys() {
            let Some((dest, _)) = self.get_dest(key.prefix, key.family, false)
            else {
                continue;
            };
            let removed = dest.remove_all_neighbor_paths(peer);
            if removed.is_empty() {
                continue;
            }
            for _ in &removed {
                neighbor.decr_prefix_count();
            }
            self.process_destination(
                key.family,
                key.prefix,
                add_path_budget,
                out,
            );
        }
    }

    /// Remove every path learned from any peer and drop the whole backlog.
    /// Locally originated paths stay. Prefix counts are left to the session
    /// layer, which resets them with the sessions.
    pub fn remove_updates_from_all_neighbors(
        &mut self,
        out: &mut UpdateOutcome,
    ) {
        self.unreachable_paths.clear();

        for key in self.dest_keys() {
            let Some((dest, _)) = self.get_dest(key.prefix, key.family, false)
            else {
                continue;
            };
            let peers: BTreeSet<IpAddr> = dest
                .paths()
                .map(|((peer, _), _)| peer)
                .filter(|peer| *peer != LOCAL_PEER)
                .collect();
            if peers.is_empty() {
                continue;
            }
            for peer in peers {
                dest.remove_all_neighbor_paths(peer);
            }
            self.process_destination(key.family, key.prefix, 0, out);
        }
    }

    fn dest_keys(&self) -> Vec<DestKey> {
        self.destinations
            .iter()
            .flat_map(|(family, table)| {
                table.keys().map(|prefix| DestKey::new(*family, *prefix))
            })
            .collect()
    }
}
