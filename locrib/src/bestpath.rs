// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::path::{Path, PathKey};
use itertools::Itertools;
use std::net::IpAddr;

/// Tie-break stages in the order they are applied.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    LocalPref = 1,
    AsPathLen = 2,
    Origin = 3,
    Multipath = 4,
    PreferExternal = 5,
    BgpId = 6,
    ClusterListLen = 7,
    PeerAddr = 8,
}

#[derive(Debug, Copy, Clone)]
pub struct Candidate<'a> {
    pub key: PathKey,
    pub path: &'a Path,
}

#[derive(Debug, Default)]
pub struct Decision<'a> {
    /// Candidates left standing. The first is the best path. More than one
    /// only when the pipeline stopped for multipath.
    pub survivors: Vec<Candidate<'a>>,
    /// Candidates that tied with the best path through every stage.
    pub runners_up: Vec<Candidate<'a>>,
    /// Candidates removed by each stage, in the order stages ran.
    pub pruned: Vec<(Stage, Vec<Candidate<'a>>)>,
    pub multipath: bool,
}

fn peer_octets(addr: IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(a) => a.octets().to_vec(),
        IpAddr::V6(a) => a.octets().to_vec(),
    }
}

/// Keep `winners`, recording everything else in `candidates` as pruned by
/// `stage`.
fn narrow<'a>(
    stage: Stage,
    candidates: Vec<Candidate<'a>>,
    winners: Vec<Candidate<'a>>,
    pruned: &mut Vec<(Stage, Vec<Candidate<'a>>)>,
) -> Vec<Candidate<'a>> {
    if winners.len() < candidates.len() {
        let losers = candidates
            .into_iter()
            .filter(|c| !winners.iter().any(|w| w.key == c.key))
            .collect();
        pruned.push((stage, losers));
    }
    winners
}

/// Run the BGP decision process over `candidates`. Input order matters only
/// among candidates that tie through all stages, where the earliest wins.
///
/// - prefer the highest local preference
/// - prefer the fewest AS hops
/// - prefer the lowest origin code
/// - stop if multipath is enabled for the class of the leading candidate
/// - drop internal paths if any external path remains
/// - prefer the lowest originating BGP identifier
/// - prefer the shortest cluster list
/// - prefer the lowest peer address
pub fn decide<'a>(
    candidates: Vec<Candidate<'a>>,
    ebgp_multipath: bool,
    ibgp_multipath: bool,
) -> Decision<'a> {
    let mut d = Decision::default();
    let mut candidates = candidates;

    if candidates.len() > 1 {
        let winners = candidates
            .iter()
            .copied()
            .max_set_by_key(|c| c.path.pref());
        candidates = narrow(
            Stage::LocalPref,
            candidates,
            winners,
            &mut d.pruned,
        );
    }

    if candidates.len() > 1 {
        let winners = candidates
            .iter()
            .copied()
            .min_set_by_key(|c| c.path.as_path_len());
        candidates = narrow(
            Stage::AsPathLen,
            candidates,
            winners,
            &mut d.pruned,
        );
    }

    if candidates.len() > 1 {
        let winners = candidates
            .iter()
            .copied()
            .min_set_by_key(|c| c.path.origin());
        candidates = narrow(Stage::Origin, candidates, winners, &mut d.pruned);
    }

    if candidates.len() > 1 {
        let leader = candidates[0].path;
        let multipath = (leader.is_external() && ebgp_multipath)
            || (leader.is_internal() && ibgp_multipath);
        if multipath {
            d.multipath = true;
            d.survivors = candidates;
            return d;
        }
    }

    if candidates.len() > 1 && candidates.iter().any(|c| c.path.is_external())
    {
        let winners = candidates
            .iter()
            .copied()
            .filter(|c| !c.path.is_internal())
            .collect();
        candidates =
            narrow(Stage::PreferExternal, candidates, winners, &mut d.pruned);
    }

    if candidates.len() > 1 {
        let winners = candidates
            .iter()
            .copied()
            .min_set_by_key(|c| c.path.bgp_id());
        candidates = narrow(Stage::BgpId, candidates, winners, &mut d.pruned);
    }

    if candidates.len() > 1 {
        let winners = candidates
            .iter()
            .copied()
            .min_set_by_key(|c| c.path.cluster_list_len());
        candidates =
            narrow(Stage::ClusterListLen, candidates, winners, &mut d.pruned);
    }

    if candidates.len() > 1 {
        let winners = candidates
            .iter()
            .copied()
            .min_set_by_key(|c| peer_octets(c.path.peer_addr()));
        candidates = narrow(
            Stage::PeerAddr,
            candidates,
            winners,
            &mut d.pruned,
        );
    }

    if candidates.len() > 1 {
        d.runners_up = candidates.split_off(1);
    }
    d.survivors = candidates;
    d
}
