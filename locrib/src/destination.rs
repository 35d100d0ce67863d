// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The BGP decision process for a single prefix.

use crate::bestpath::{self, Candidate, Stage};
use crate::config::LocRibConfig;
use crate::ids::IdAllocator;
use crate::log::locrib_log;
use crate::path::{Path, PathKey, RouteSourceClass};
use crate::route::{DestinationState, Route};
use crate::route_manager::{
    RouteConfig, RouteManager, RouteProtocol, RouteUpdateOp,
};
use crate::MOD_DESTINATION;
use rib_types::{Prefix, ProtocolFamily};
use slog::Logger;
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

/// Everything a decision run needs besides the destination itself.
pub struct DecisionContext<'a> {
    pub config: &'a LocRibConfig,
    pub route_manager: &'a dyn RouteManager,
    pub log: &'a Logger,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Action {
    #[default]
    None,
    Add,
    Replace,
    Delete,
}

/// Outcome of one decision run.
#[derive(Debug, Default)]
pub struct Selection {
    pub action: Action,
    pub add_paths_changed: bool,
    /// Installed paths that were not installed before.
    pub added: Vec<Route>,
    /// Installed paths that were installed before.
    pub updated: Vec<Route>,
    /// Paths that were installed before and no longer are.
    pub deleted: Vec<Route>,
    /// Candidates eliminated by each tie-break stage.
    pub pruned: Vec<(Stage, Vec<PathKey>)>,
}

fn keys(candidates: Vec<Candidate<'_>>) -> Vec<PathKey> {
    candidates.into_iter().map(|c| c.key).collect()
}

#[derive(Debug)]
pub struct Destination {
    family: ProtocolFamily,
    prefix: Prefix,
    peer_paths: BTreeMap<IpAddr, BTreeMap<u32, Path>>,
    routes: BTreeMap<PathKey, Route>,
    route_list: Vec<PathKey>,
    best: Option<PathKey>,
    ecmp: Vec<PathKey>,
    add_paths: Vec<PathKey>,
    add_paths_stale: bool,
    /// Installed paths removed since the last decision run. Kept until the
    /// run reports and unprograms them.
    detached: BTreeMap<PathKey, Route>,
    /// Routes handed to the route manager, by next hop.
    programmed: BTreeMap<IpAddr, (PathKey, RouteConfig)>,
    /// Paths replaced in place since the last decision run.
    changed: BTreeSet<PathKey>,
    out_ids: IdAllocator,
    /// Aggregates this destination contributes to.
    pub(crate) aggregates: BTreeSet<Prefix>,
    dirty: bool,
}

impl Destination {
    pub fn new(family: ProtocolFamily, prefix: Prefix) -> Self {
        Self {
            family,
            prefix,
            peer_paths: BTreeMap::new(),
            routes: BTreeMap::new(),
            route_list: Vec::new(),
            best: None,
            ecmp: Vec::new(),
            add_paths: Vec::new(),
            add_paths_stale: false,
            detached: BTreeMap::new(),
            programmed: BTreeMap::new(),
            changed: BTreeSet::new(),
            out_ids: IdAllocator::default(),
            aggregates: BTreeSet::new(),
            dirty: false,
        }
    }

    pub fn family(&self) -> ProtocolFamily {
        self.family
    }

    pub fn prefix(&self) -> Prefix {
        self.prefix
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_empty(&self) -> bool {
        self.peer_paths.is_empty()
    }

    /// Number of paths held.
    pub fn len(&self) -> usize {
        self.peer_paths.values().map(BTreeMap::len).sum()
    }

    pub fn path(&self, peer: IpAddr, path_id: u32) -> Option<&Path> {
        self.peer_paths.get(&peer)?.get(&path_id)
    }

    pub fn paths(&self) -> impl Iterator<Item = (PathKey, &Path)> {
        self.peer_paths.iter().flat_map(|(peer, paths)| {
            paths.iter().map(move |(id, p)| ((*peer, *id), p))
        })
    }

    pub fn best_key(&self) -> Option<PathKey> {
        self.best
    }

    pub fn best_path(&self) -> Option<&Path> {
        let (peer, id) = self.best?;
        self.path(peer, id)
    }

    pub fn ecmp(&self) -> &[PathKey] {
        &self.ecmp
    }

    pub fn add_paths(&self) -> &[PathKey] {
        &self.add_paths
    }

    pub fn route(&self, key: &PathKey) -> Option<&Route> {
        self.routes.get(key)
    }

    /// Routes in position order.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.route_list.iter().filter_map(|k| self.routes.get(k))
    }

    pub fn state(&self) -> DestinationState {
        DestinationState {
            family: self.family,
            prefix: self.prefix,
            paths: self.routes().cloned().collect(),
        }
    }

    fn best_class(&self) -> Option<RouteSourceClass> {
        self.best_path().map(Path::class)
    }

    /// Insert `path` under `(peer, path_id)`, replacing any path already
    /// there. Returns true if the key was new.
    pub fn add_or_update_path(
        &mut self,
        peer: IpAddr,
        path_id: u32,
        path: Path,
    ) -> bool {
        let key = (peer, path_id);
        match self.best_class() {
            Some(best) if path.class() > best => {}
            _ => self.dirty = true,
        }

        if let Some(route) = self.routes.get_mut(&key) {
            route.refresh(&path, self.family);
            self.changed.insert(key);
            if self.add_paths.contains(&key) {
                self.add_paths_stale = true;
            }
            self.peer_paths.entry(peer).or_default().insert(path_id, path);
            return false;
        }

        // A removed installed path coming back keeps its output id.
        let out_path_id = match self.detached.remove(&key) {
            Some(old) => {
                self.changed.insert(key);
                old.out_path_id
            }
            None => self.out_ids.alloc(),
        };
        let idx = self.route_list.len();
        self.route_list.push(key);
        self.routes.insert(
            key,
            Route::new(&path, path_id, self.family, out_path_id, idx),
        );
        self.peer_paths.entry(peer).or_default().insert(path_id, path);
        true
    }

    fn detach_route(&mut self, key: &PathKey) -> Option<Route> {
        let route = self.routes.remove(key)?;
        let idx = route.idx;
        self.route_list.swap_remove(idx);
        if let Some(moved) = self.route_list.get(idx) {
            if let Some(r) = self.routes.get_mut(moved) {
                r.idx = idx;
            }
        }
        Some(route)
    }

    pub fn remove_path(&mut self, peer: IpAddr, path_id: u32) -> Option<Path> {
        let paths = self.peer_paths.get_mut(&peer)?;
        let path = paths.remove(&path_id)?;
        if paths.is_empty() {
            self.peer_paths.remove(&peer);
        }

        let key = (peer, path_id);
        self.dirty = true;
        self.changed.remove(&key);
        if self.best == Some(key) {
            self.best = None;
        }
        if self.add_paths.contains(&key) {
            self.add_paths_stale = true;
        }
        if let Some(route) = self.detach_route(&key) {
            if let Some(pos) = self.ecmp.iter().position(|k| *k == key) {
                self.ecmp.remove(pos);
                self.detached.insert(key, route);
            } else {
                self.out_ids.release(route.out_path_id);
            }
        }
        Some(path)
    }

    pub fn remove_all_neighbor_paths(
        &mut self,
        peer: IpAddr,
    ) -> Vec<(u32, Path)> {
        let ids: Vec<u32> = match self.peer_paths.get(&peer) {
            Some(paths) => paths.keys().copied().collect(),
            None => return Vec::new(),
        };
        ids.into_iter()
            .filter_map(|id| self.remove_path(peer, id).map(|p| (id, p)))
            .collect()
    }

    pub fn remove_all_paths(&mut self) -> Vec<(PathKey, Path)> {
        let keys: Vec<PathKey> = self.paths().map(|(k, _)| k).collect();
        keys.into_iter()
            .filter_map(|(peer, id)| {
                self.remove_path(peer, id).map(|p| ((peer, id), p))
            })
            .collect()
    }

    fn next_hop_of(&self, key: PathKey) -> Option<IpAddr> {
        self.path(key.0, key.1)?.next_hop(self.family)
    }

    /// Paths eligible for this run: the current best first, then every
    /// other reachable loop free path, all of the most preferred class seen.
    fn candidates(&self, local_asn: u32) -> Vec<Candidate<'_>> {
        let best = self
            .best
            .and_then(|k| self.path(k.0, k.1).map(|p| (k, p)));
        let rest = self.paths().filter(|(k, _)| Some(*k) != self.best);

        let mut out: Vec<Candidate<'_>> = Vec::new();
        let mut class: Option<RouteSourceClass> = None;
        for (key, path) in best.into_iter().chain(rest) {
            if !path.is_reachable(self.family) || path.has_as_loop(local_asn)
            {
                continue;
            }
            match class {
                Some(c) if path.class() > c => continue,
                Some(c) if path.class() < c => out.clear(),
                _ => {}
            }
            class = Some(path.class());
            out.push(Candidate { key, path });
        }
        out
    }

    /// The forwarding entry for an installed path, if it is one the route
    /// manager should hear about. Connected and static routes already live
    /// in the forwarding RIB.
    fn route_config(&self, key: PathKey) -> Option<RouteConfig> {
        let path = self.path(key.0, key.1)?;
        let protocol = if path.is_aggregate() {
            RouteProtocol::Aggregate
        } else if path.is_internal() {
            RouteProtocol::Ibgp
        } else if path.is_external() {
            RouteProtocol::Ebgp
        } else {
            return None;
        };
        let info = path.reachability(self.family);
        Some(RouteConfig {
            family: self.family,
            prefix: self.prefix,
            next_hop: path.next_hop(self.family)?,
            if_index: info.map(|i| i.if_index).unwrap_or(0),
            metric: info.map(|i| i.metric).unwrap_or(0),
            protocol,
        })
    }

    fn program(
        &mut self,
        ctx: &DecisionContext,
        programmed: BTreeMap<IpAddr, (PathKey, RouteConfig)>,
    ) {
        let old = std::mem::take(&mut self.programmed);
        let mut stale: BTreeMap<IpAddr, (PathKey, RouteConfig)> = old
            .iter()
            .filter(|(nh, _)| !programmed.contains_key(nh))
            .map(|(nh, v)| (*nh, *v))
            .collect();

        for (nh, (key, rc)) in &programmed {
            let moved = stale
                .iter()
                .find(|(_, (k, _))| k == key)
                .map(|(prev, _)| *prev);
            let result = match (old.get(nh), moved) {
                // Same next hop, possibly from a different path. Only the
                // entry's protocol, interface or metric can have changed.
                (Some((_, prev)), _) if prev == rc => continue,
                (Some(_), _) => ctx.route_manager.update_route(
                    rc,
                    RouteUpdateOp::ReplaceNextHop { previous: *nh },
                ),
                (None, Some(previous)) => {
                    stale.remove(&previous);
                    ctx.route_manager.update_route(
                        rc,
                        RouteUpdateOp::ReplaceNextHop { previous },
                    )
                }
                (None, None) => ctx.route_manager.create_route(rc),
            };
            if let Err(e) = result {
                locrib_log!(ctx, MOD_DESTINATION, error,
                    "failed to program {} via {}: {}", self.prefix, nh, e;
                    "error" => format!("{e}")
                );
            }
        }

        for (nh, (_, rc)) in &stale {
            if let Err(e) = ctx.route_manager.delete_route(rc) {
                locrib_log!(ctx, MOD_DESTINATION, error,
                    "failed to remove {} via {}: {}", self.prefix, nh, e;
                    "error" => format!("{e}")
                );
            }
        }
        self.programmed = programmed;
    }

    /// Run the decision process if anything changed since the last run.
    /// At most `add_path_budget` additional paths are selected.
    pub fn select_route_for_loc_rib(
        &mut self,
        ctx: &DecisionContext,
        add_path_budget: usize,
    ) -> Selection {
        if !self.dirty {
            return Selection::default();
        }
        self.dirty = false;
        let cfg = ctx.config;

        let (survivors, runners_up, pruned) = {
            let d = bestpath::decide(
                self.candidates(cfg.asn),
                cfg.ebgp_multipath,
                cfg.ibgp_multipath,
            );
            let pruned: Vec<(Stage, Vec<PathKey>)> = d
                .pruned
                .into_iter()
                .map(|(stage, cs)| (stage, keys(cs)))
                .collect();
            (keys(d.survivors), keys(d.runners_up), pruned)
        };

        // Group by next hop, keeping first appearance order.
        let mut groups: Vec<(Option<IpAddr>, Vec<PathKey>)> = Vec::new();
        for key in survivors {
            let nh = self.next_hop_of(key);
            match groups.iter_mut().find(|(g, _)| *g == nh) {
                Some((_, members)) => members.push(key),
                None => groups.push((nh, vec![key])),
            }
        }
        let mut ecmp: Vec<PathKey> =
            groups.iter().flat_map(|(_, m)| m.iter().copied()).collect();
        let cap = cfg.max_ecmp_paths.max(1);
        let overflow = if ecmp.len() > cap {
            ecmp.split_off(cap)
        } else {
            Vec::new()
        };

        let mut programmed = BTreeMap::new();
        for (_, members) in &groups {
            let leader = members[0];
            if !ecmp.contains(&leader) {
                continue;
            }
            if let Some(rc) = self.route_config(leader) {
                programmed.insert(rc.next_hop, (leader, rc));
            }
        }
        self.program(ctx, programmed);

        // Reconcile against what was installed before.
        let old_best = self.best;
        let mut old_members = std::mem::take(&mut self.ecmp);
        old_members.extend(self.detached.keys().copied());

        let mut deleted = Vec::new();
        for key in &old_members {
            if ecmp.contains(key) {
                continue;
            }
            if let Some(mut route) = self.detached.remove(key) {
                self.out_ids.release(route.out_path_id);
                route.clear_flags();
                deleted.push(route);
            } else if let Some(route) = self.routes.get(key) {
                let mut route = route.clone();
                route.clear_flags();
                deleted.push(route);
            }
        }

        // Backfill additional paths, skipping next hops already covered.
        let mut seen: BTreeSet<Option<IpAddr>> =
            ecmp.iter().map(|k| self.next_hop_of(*k)).collect();
        let mut add_paths = Vec::new();
        let pool = overflow.into_iter().chain(runners_up).chain(
            pruned.iter().rev().flat_map(|(_, ks)| ks.iter().copied()),
        );
        for key in pool {
            if add_paths.len() >= add_path_budget {
                break;
            }
            if seen.insert(self.next_hop_of(key)) {
                add_paths.push(key);
            }
        }
        let add_paths_changed =
            self.add_paths_stale || add_paths != self.add_paths;

        for route in self.routes.values_mut() {
            route.clear_flags();
        }
        let multipath = ecmp.len() > 1;
        for (i, key) in ecmp.iter().enumerate() {
            if let Some(r) = self.routes.get_mut(key) {
                r.best = i == 0;
                r.multipath = multipath;
            }
        }
        for key in &add_paths {
            if let Some(r) = self.routes.get_mut(key) {
                r.additional_path = true;
            }
        }

        let best = ecmp.first().copied();
        let action = if ecmp.is_empty() {
            if old_members.is_empty() {
                Action::None
            } else {
                Action::Delete
            }
        } else if old_members.is_empty() {
            Action::Add
        } else if old_best != best
            || old_members != ecmp
            || !deleted.is_empty()
            || ecmp.iter().any(|k| self.changed.contains(k))
        {
            Action::Replace
        } else {
            Action::None
        };

        let mut selection = Selection {
            action,
            add_paths_changed,
            pruned,
            ..Default::default()
        };
        if action != Action::None {
            for key in &ecmp {
                let Some(route) = self.routes.get(key) else {
                    continue;
                };
                if old_members.contains(key) {
                    selection.updated.push(route.clone());
                } else {
                    selection.added.push(route.clone());
                }
            }
            selection.deleted = deleted;
        }

        self.best = best;
        self.ecmp = ecmp;
        self.add_paths = add_paths;
        self.add_paths_stale = false;
        self.changed.clear();

        locrib_log!(ctx, MOD_DESTINATION, debug,
            "selected {}", self.prefix;
            "family" => self.family.to_string(),
            "action" => format!("{:?}", selection.action),
            "installed" => self.ecmp.len(),
            "add_paths" => self.add_paths.len()
        );
        selection
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::path::RouteType;
    use crate::test::{
        test_log, test_path, unresolved_path, TestNeighbor, TestRouteManager,
    };
    use pretty_assertions::assert_eq;
    use rib_types::{AsPathSegment, AttributeSet, Origin};
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    const V4: ProtocolFamily = ProtocolFamily::IPV4_UNICAST;

    struct Harness {
        cfg: LocRibConfig,
        rm: TestRouteManager,
        log: Logger,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                cfg: LocRibConfig::new(64500, Ipv4Addr::new(10, 255, 0, 1)),
                rm: TestRouteManager::default(),
                log: test_log(),
            }
        }

        fn ctx(&self) -> DecisionContext<'_> {
            DecisionContext {
                config: &self.cfg,
                route_manager: &self.rm,
                log: &self.log,
            }
        }
    }

    fn attrs(nh: &str, local_pref: u32) -> AttributeSet {
        AttributeSet {
            origin: Some(Origin::Igp),
            as_path: vec![AsPathSegment::sequence(vec![64510])],
            next_hop: Some(nh.parse().unwrap()),
            local_pref: Some(local_pref),
            ..Default::default()
        }
    }

    fn dest() -> Destination {
        Destination::new(V4, "10.0.0.0/24".parse().unwrap())
    }

    fn ibgp(addr: &str) -> TestNeighbor {
        TestNeighbor::internal(addr.parse().unwrap())
    }

    #[test]
    fn higher_local_pref_wins() {
        let h = Harness::new();
        let mut d = dest();
        let a = ibgp("198.51.100.1");
        let b = ibgp("198.51.100.2");

        d.add_or_update_path(a.addr, 0, test_path(&a, attrs("192.0.2.1", 100)));
        d.add_or_update_path(b.addr, 0, test_path(&b, attrs("192.0.2.2", 200)));

        let s = d.select_route_for_loc_rib(&h.ctx(), 0);
        assert_eq!(s.action, Action::Add);
        assert_eq!(s.added.len(), 1);
        assert_eq!(s.added[0].peer, b.addr);
        assert!(s.added[0].best);
        assert_eq!(s.pruned, vec![(Stage::LocalPref, vec![(a.addr, 0)])]);
        assert!(d.add_paths().is_empty());
        assert!(!s.add_paths_changed);
        assert_eq!(d.best_key(), Some((b.addr, 0)));
        assert_eq!(h.rm.created().len(), 1);
        assert_eq!(
            h.rm.created()[0].next_hop,
            "192.0.2.2".parse::<IpAddr>().unwrap()
        );

        // Nothing changed, nothing to do.
        let again = d.select_route_for_loc_rib(&h.ctx(), 0);
        assert_eq!(again.action, Action::None);
        assert_eq!(d.best_key(), Some((b.addr, 0)));
    }

    #[test]
    fn withdrawal_fails_over() {
        let h = Harness::new();
        let mut d = dest();
        let a = ibgp("198.51.100.1");
        let b = ibgp("198.51.100.2");
        d.add_or_update_path(a.addr, 0, test_path(&a, attrs("192.0.2.1", 100)));
        d.add_or_update_path(b.addr, 0, test_path(&b, attrs("192.0.2.2", 200)));
        d.select_route_for_loc_rib(&h.ctx(), 0);
        let out_id = d.route(&(b.addr, 0)).unwrap().out_path_id;

        assert!(d.remove_path(b.addr, 0).is_some());
        assert!(d.remove_path(b.addr, 0).is_none());
        assert_eq!(d.best_key(), None);
        assert!(d.ecmp().is_empty());

        let s = d.select_route_for_loc_rib(&h.ctx(), 0);
        assert_eq!(s.action, Action::Replace);
        assert_eq!(s.added.len(), 1);
        assert_eq!(s.added[0].peer, a.addr);
        assert_eq!(s.deleted.len(), 1);
        assert_eq!(s.deleted[0].peer, b.addr);
        assert_eq!(s.deleted[0].out_path_id, out_id);
        assert_eq!(h.rm.deleted().len(), 1);

        d.remove_path(a.addr, 0);
        let s = d.select_route_for_loc_rib(&h.ctx(), 0);
        assert_eq!(s.action, Action::Delete);
        assert!(d.is_empty());
        assert_eq!(h.rm.routes(), vec![]);
    }

    #[test]
    fn equal_next_hops_form_one_group() {
        let mut h = Harness::new();
        h.cfg.ebgp_multipath = true;
        h.cfg.ibgp_multipath = true;
        let mut d = dest();
        let a = ibgp("198.51.100.1");
        let b = ibgp("198.51.100.2");
        d.add_or_update_path(a.addr, 0, test_path(&a, attrs("192.0.2.1", 100)));
        d.add_or_update_path(b.addr, 0, test_path(&b, attrs("192.0.2.1", 100)));

        let s = d.select_route_for_loc_rib(&h.ctx(), 0);
        assert_eq!(s.action, Action::Add);
        assert_eq!(s.added.len(), 2);
        assert!(s.added.iter().all(|r| r.multipath));
        assert_eq!(s.added.iter().filter(|r| r.best).count(), 1);
        // One forwarding entry per next hop.
        assert_eq!(h.rm.created().len(), 1);
    }

    #[test]
    fn ecmp_cap_feeds_add_paths() {
        let mut h = Harness::new();
        h.cfg.ibgp_multipath = true;
        h.cfg.max_ecmp_paths = 2;
        let mut d = dest();
        for i in 1..=3 {
            let n = ibgp(&format!("198.51.100.{i}"));
            let nh = format!("192.0.2.{i}");
            d.add_or_update_path(n.addr, 0, test_path(&n, attrs(&nh, 100)));
        }
        let s = d.select_route_for_loc_rib(&h.ctx(), 4);
        assert_eq!(s.added.len(), 2);
        assert_eq!(h.rm.created().len(), 2);
        let expected: Vec<PathKey> = vec![("198.51.100.3".parse().unwrap(), 0)];
        assert_eq!(d.add_paths().to_vec(), expected);
        assert!(s.add_paths_changed);
    }

    #[test]
    fn add_paths_prefer_latest_pruned_stage() {
        let h = Harness::new();
        let mut d = dest();
        let best = ibgp("198.51.100.1");
        let longer = ibgp("198.51.100.2");
        let lower = ibgp("198.51.100.3");
        let same_nh = ibgp("198.51.100.4");

        d.add_or_update_path(
            best.addr,
            0,
            test_path(&best, attrs("192.0.2.1", 200)),
        );
        d.add_or_update_path(
            longer.addr,
            0,
            test_path(
                &longer,
                AttributeSet {
                    as_path: vec![AsPathSegment::sequence(vec![1, 2, 3])],
                    ..attrs("192.0.2.2", 200)
                },
            ),
        );
        d.add_or_update_path(
            lower.addr,
            0,
            test_path(&lower, attrs("192.0.2.3", 100)),
        );
        d.add_or_update_path(
            same_nh.addr,
            0,
            test_path(&same_nh, attrs("192.0.2.1", 100)),
        );

        let s = d.select_route_for_loc_rib(&h.ctx(), 3);
        assert_eq!(d.best_key(), Some((best.addr, 0)));
        assert_eq!(s.pruned.len(), 2);
        // Stage 2 pruned last, so it is drawn from first. The path sharing
        // the best path's next hop is skipped.
        let expected: Vec<PathKey> = vec![(longer.addr, 0), (lower.addr, 0)];
        assert_eq!(d.add_paths().to_vec(), expected);
        assert!(d.route(&(lower.addr, 0)).unwrap().additional_path);
        assert!(!d.route(&(same_nh.addr, 0)).unwrap().additional_path);
    }

    #[test]
    fn unresolved_paths_are_never_selected() {
        let h = Harness::new();
        let mut d = dest();
        let a = ibgp("198.51.100.1");
        let b = ibgp("198.51.100.2");
        d.add_or_update_path(a.addr, 0, test_path(&a, attrs("192.0.2.1", 100)));
        d.add_or_update_path(
            b.addr,
            0,
            unresolved_path(&b, attrs("192.0.2.2", 300)),
        );
        d.select_route_for_loc_rib(&h.ctx(), 4);
        assert_eq!(d.best_key(), Some((a.addr, 0)));
        assert!(d.add_paths().is_empty());

        d.add_or_update_path(b.addr, 0, test_path(&b, attrs("192.0.2.2", 300)));
        let s = d.select_route_for_loc_rib(&h.ctx(), 4);
        assert_eq!(s.action, Action::Replace);
        assert_eq!(d.best_key(), Some((b.addr, 0)));
    }

    #[test]
    fn local_class_beats_external() {
        let h = Harness::new();
        let mut d = dest();
        let a = ibgp("198.51.100.1");
        d.add_or_update_path(a.addr, 0, test_path(&a, attrs("192.0.2.1", 900)));
        d.select_route_for_loc_rib(&h.ctx(), 0);

        let mut local = Path::local(
            h.cfg.router_id,
            RouteType::Static,
            Arc::new(attrs("192.0.2.9", 0)),
        );
        local.set_reachability(
            V4,
            "192.0.2.9".parse().unwrap(),
            crate::route_manager::ReachabilityInfo::local(
                "192.0.2.9".parse().unwrap(),
            ),
        );
        d.add_or_update_path(crate::LOCAL_PEER, crate::LOCAL_PATH_ID, local);
        let s = d.select_route_for_loc_rib(&h.ctx(), 4);
        assert_eq!(s.action, Action::Replace);
        assert_eq!(
            d.best_key(),
            Some((crate::LOCAL_PEER, crate::LOCAL_PATH_ID)),
        );
        // External paths are a different class and cannot be backfilled.
        assert!(d.add_paths().is_empty());
        // Static routes are not pushed to the route manager.
        assert_eq!(h.rm.routes(), vec![]);

        // A worse class path does not trigger a new run.
        d.add_or_update_path(a.addr, 0, test_path(&a, attrs("192.0.2.5", 900)));
        assert!(!d.is_dirty());
    }

    #[test]
    fn next_hop_change_updates_route() {
        let h = Harness::new();
        let mut d = dest();
        let a = ibgp("198.51.100.1");
        d.add_or_update_path(a.addr, 0, test_path(&a, attrs("192.0.2.1", 100)));
        d.select_route_for_loc_rib(&h.ctx(), 0);

        assert!(!d.add_or_update_path(
            a.addr,
            0,
            test_path(&a, attrs("192.0.2.7", 100))
        ));
        let s = d.select_route_for_loc_rib(&h.ctx(), 0);
        assert_eq!(s.action, Action::Replace);
        assert_eq!(s.updated.len(), 1);
        assert_eq!(h.rm.updated().len(), 1);
        assert_eq!(h.rm.created().len(), 1);
        assert!(h.rm.deleted().is_empty());
        assert_eq!(
            h.rm.routes()[0].next_hop,
            "192.0.2.7".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn own_asn_in_path_is_never_selected() {
        let mut h = Harness::new();
        h.cfg.ibgp_multipath = true;
        let mut d = dest();
        let a = ibgp("198.51.100.1");
        let b = ibgp("198.51.100.2");
        let lower = ibgp("198.51.100.3");
        let looped = ibgp("198.51.100.4");
        let looped_key: PathKey = (looped.addr, 0);

        d.add_or_update_path(a.addr, 0, test_path(&a, attrs("192.0.2.1", 100)));
        d.add_or_update_path(b.addr, 0, test_path(&b, attrs("192.0.2.2", 100)));
        d.add_or_update_path(
            lower.addr,
            0,
            test_path(&lower, attrs("192.0.2.3", 90)),
        );
        d.add_or_update_path(
            looped.addr,
            0,
            test_path(
                &looped,
                AttributeSet {
                    as_path: vec![AsPathSegment::sequence(vec![64510, 64500])],
                    ..attrs("192.0.2.4", 300)
                },
            ),
        );

        let s = d.select_route_for_loc_rib(&h.ctx(), 2);
        assert_eq!(s.action, Action::Add);
        assert_eq!(d.best_key(), Some((a.addr, 0)));
        assert_eq!(d.ecmp().to_vec(), vec![(a.addr, 0), (b.addr, 0)]);
        assert!(d.add_paths().contains(&(lower.addr, 0)));
        assert!(!d.add_paths().contains(&looped_key));
        assert!(s.added.iter().all(|r| r.peer != looped.addr));
        let looped_nh: IpAddr = "192.0.2.4".parse().unwrap();
        assert!(h.rm.routes().iter().all(|r| r.next_hop != looped_nh));
        let route = d.route(&looped_key).unwrap();
        assert!(!route.best);
        assert!(!route.multipath);
        assert!(!route.additional_path);
    }

    #[test]
    fn same_next_hop_new_leader_updates_route() {
        let h = Harness::new();
        let mut d = dest();
        let a = ibgp("198.51.100.1");
        let e = TestNeighbor::external("203.0.113.1".parse().unwrap());

        // Below the fixed external preference.
        d.add_or_update_path(a.addr, 0, test_path(&a, attrs("192.0.2.1", 40)));
        d.select_route_for_loc_rib(&h.ctx(), 0);
        assert_eq!(h.rm.routes()[0].protocol, RouteProtocol::Ibgp);

        d.add_or_update_path(e.addr, 0, test_path(&e, attrs("192.0.2.1", 0)));
        let s = d.select_route_for_loc_rib(&h.ctx(), 0);
        assert_eq!(s.action, Action::Replace);
        assert_eq!(d.best_key(), Some((e.addr, 0)));
        assert_eq!(h.rm.created().len(), 1);
        assert_eq!(h.rm.updated().len(), 1);
        assert_eq!(h.rm.updated()[0].protocol, RouteProtocol::Ebgp);
        assert!(h.rm.deleted().is_empty());
        assert_eq!(h.rm.routes().len(), 1);
        assert_eq!(h.rm.routes()[0].protocol, RouteProtocol::Ebgp);

        d.remove_path(e.addr, 0);
        d.select_route_for_loc_rib(&h.ctx(), 0);
        assert_eq!(h.rm.updated().len(), 2);
        assert_eq!(h.rm.routes()[0].protocol, RouteProtocol::Ibgp);
    }

    #[test]
    fn route_positions_stay_dense() {
        let mut d = dest();
        let peers: Vec<TestNeighbor> = (1..=4)
            .map(|i| ibgp(&format!("198.51.100.{i}")))
            .collect();
        for n in &peers {
            d.add_or_update_path(
                n.addr,
                0,
                test_path(n, attrs("192.0.2.1", 100)),
            );
        }
        let first_out = d.route(&(peers[0].addr, 0)).unwrap().out_path_id;

        d.remove_path(peers[0].addr, 0);
        let positions: Vec<(IpAddr, usize)> =
            d.routes().map(|r| (r.peer, r.idx)).collect();
        assert_eq!(
            positions,
            vec![(peers[3].addr, 0), (peers[1].addr, 1), (peers[2].addr, 2)]
        );

        // Replacing keeps position and output id, a new key reuses the
        // released output id.
        d.add_or_update_path(
            peers[1].addr,
            0,
            test_path(&peers[1], attrs("192.0.2.9", 100)),
        );
        assert_eq!(d.route(&(peers[1].addr, 0)).unwrap().idx, 1);
        d.add_or_update_path(
            peers[0].addr,
            7,
            test_path(&peers[0], attrs("192.0.2.1", 100)),
        );
        let r = d.route(&(peers[0].addr, 7)).unwrap();
        assert_eq!(r.idx, 3);
        assert_eq!(r.out_path_id, first_out);
        assert_eq!(d.len(), 4);
    }

    #[test]
    fn remove_all_neighbor_paths_only_touches_that_peer() {
        let mut d = dest();
        let a = ibgp("198.51.100.1");
        let b = ibgp("198.51.100.2");
        for id in 1..=3 {
            d.add_or_update_path(
                a.addr,
                id,
                test_path(&a, attrs("192.0.2.1", 100)),
            );
        }
        d.add_or_update_path(b.addr, 1, test_path(&b, attrs("192.0.2.2", 100)));

        let removed = d.remove_all_neighbor_paths(a.addr);
        assert_eq!(removed.len(), 3);
        assert_eq!(d.len(), 1);
        assert!(d.remove_all_neighbor_paths(a.addr).is_empty());
        assert_eq!(d.remove_all_paths().len(), 1);
        assert!(d.is_empty());
    }
}
