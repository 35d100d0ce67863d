// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Attribute merging for synthetic aggregate paths.
//!
//! The attributes of an aggregate depend only on its set of contributors.
//! Adding a contributor whose MED agrees with the existing ones is merged
//! into the current attributes in place; any other change rebuilds them from
//! the remaining contributors.

use crate::path::{Path, PathSource, RouteType};
use rib_types::{Aggregator, AsPathSegment, AttributeSet, Origin, Prefix};
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub(crate) struct Aggregation {
    pub generate_as_set: bool,
    pub asn: u32,
    pub router_id: Ipv4Addr,
    pub contributors: BTreeMap<Prefix, Arc<AttributeSet>>,
}

impl Aggregation {
    fn aggregator(&self) -> Aggregator {
        Aggregator {
            asn: self.asn,
            address: self.router_id,
        }
    }

    fn empty_attrs(&self) -> AttributeSet {
        AttributeSet {
            origin: Some(Origin::Igp),
            atomic_aggregate: !self.generate_as_set,
            aggregator: Some(self.aggregator()),
            ..Default::default()
        }
    }

    fn rebuild(&self) -> AttributeSet {
        let mut attrs = self.empty_attrs();
        let mut contributors = self.contributors.values();
        let Some(first) = contributors.next() else {
            return attrs;
        };
        attrs.med = first.med;
        attrs.origin = Some(first.origin());
        attrs.atomic_aggregate |= first.atomic_aggregate;
        let mut asns: BTreeSet<u32> = first.asns().collect();

        for c in contributors {
            if c.med != attrs.med {
                attrs.med = None;
            }
            attrs.origin = attrs.origin.max(Some(c.origin()));
            attrs.atomic_aggregate |= c.atomic_aggregate;
            asns.extend(c.asns());
        }

        if self.generate_as_set && !asns.is_empty() {
            attrs.as_path =
                vec![AsPathSegment::set(asns.into_iter().collect())];
        }
        attrs
    }

    /// Fold one more contributor into `current`. Only valid when the
    /// contributor agrees with the MED already held by `current`.
    fn merge(&self, current: &AttributeSet, c: &AttributeSet) -> AttributeSet {
        let mut attrs = current.clone();
        attrs.origin = attrs.origin.max(Some(c.origin()));
        attrs.atomic_aggregate |= c.atomic_aggregate;
        if self.generate_as_set {
            let mut asns: BTreeSet<u32> = current.asns().collect();
            asns.extend(c.asns());
            if !asns.is_empty() {
                attrs.as_path =
                    vec![AsPathSegment::set(asns.into_iter().collect())];
            }
        }
        attrs
    }
}

impl Path {
    /// A new aggregate path with no contributors.
    pub(crate) fn aggregate(
        asn: u32,
        router_id: Ipv4Addr,
        generate_as_set: bool,
    ) -> Self {
        let aggregation = Aggregation {
            generate_as_set,
            asn,
            router_id,
            contributors: BTreeMap::new(),
        };
        let attrs = Arc::new(aggregation.empty_attrs());
        let mut path = Path::new(
            PathSource::Local { router_id },
            RouteType::Aggregate,
            attrs,
        );
        path.aggregation = Some(aggregation);
        path
    }

    /// Add or refresh the contribution of `prefix`. Returns false for a
    /// path that is not an aggregate.
    pub(crate) fn add_contributor(
        &mut self,
        prefix: Prefix,
        contributor: Arc<AttributeSet>,
    ) -> bool {
        let Some(agg) = self.aggregation.as_mut() else {
            return false;
        };
        let incremental = !agg.contributors.is_empty()
            && !agg.contributors.contains_key(&prefix)
            && agg.contributors.values().all(|c| c.med == contributor.med);

        agg.contributors.insert(prefix, contributor.clone());
        let attrs = if incremental {
            agg.merge(&self.attrs, &contributor)
        } else {
            agg.rebuild()
        };
        self.attrs = Arc::new(attrs);
        true
    }

    /// Drop the contribution of `prefix`. Returns true if it was present.
    pub(crate) fn remove_contributor(&mut self, prefix: &Prefix) -> bool {
        let Some(agg) = self.aggregation.as_mut() else {
            return false;
        };
        if agg.contributors.remove(prefix).is_none() {
            return false;
        }
        self.attrs = Arc::new(agg.rebuild());
        true
    }

    pub(crate) fn contributor_count(&self) -> usize {
        self.aggregation
            .as_ref()
            .map(|a| a.contributors.len())
            .unwrap_or(0)
    }

    pub(crate) fn has_contributor(&self, prefix: &Prefix) -> bool {
        self.aggregation
            .as_ref()
            .is_some_and(|a| a.contributors.contains_key(prefix))
    }
}
