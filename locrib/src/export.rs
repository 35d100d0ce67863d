// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Paginated export of destinations to management queries.
//!
//! Each family keeps a flat list of destination snapshots. A reader walks the
//! list with a cursor over several calls while the update path keeps adding
//! and removing destinations. Indices handed to a walker stay valid until the
//! walk ends: removal during a walk leaves a tombstone and marks the family
//! dirty, and the list is only compacted while no walk is in progress.

use crate::log::locrib_log;
use crate::route::DestinationState;
use crate::{lock, read_lock, write_lock, MOD_EXPORT};
use rib_types::{Prefix, ProtocolFamily};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// One page of a bulk walk.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
pub struct BulkRoutes {
    /// Cursor to pass to the next call. Zero once the walk is complete.
    pub next_index: usize,
    pub more: bool,
    pub routes: Vec<DestinationState>,
}

#[derive(Debug, Default)]
struct ExportList {
    slots: Vec<Option<DestinationState>>,
    index: HashMap<Prefix, usize>,
    route_count: usize,
    dirty: bool,
    walk_active: AtomicBool,
    last_read: Mutex<Option<Instant>>,
}

impl ExportList {
    fn upsert(&mut self, state: DestinationState) {
        match self.index.get(&state.prefix) {
            Some(i) => self.slots[*i] = Some(state),
            None => {
                self.index.insert(state.prefix, self.slots.len());
                self.slots.push(Some(state));
                self.route_count += 1;
            }
        }
    }

    fn remove(&mut self, prefix: &Prefix) -> bool {
        let Some(i) = self.index.remove(prefix) else {
            return false;
        };
        self.route_count -= 1;
        if self.walk_active.load(Ordering::SeqCst) {
            self.slots[i] = None;
            self.dirty = true;
            return true;
        }
        self.slots.swap_remove(i);
        if let Some(Some(moved)) = self.slots.get(i) {
            self.index.insert(moved.prefix, i);
        }
        true
    }

    /// Drop tombstones, relocating every live slot.
    fn reset_route_list(&mut self) {
        self.slots.retain(Option::is_some);
        self.index = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (s.prefix, i)))
            .collect();
        self.dirty = false;
    }

    fn idle_since(&self, now: Instant, timeout: Duration) -> bool {
        match *lock!(self.last_read) {
            Some(t) => now.saturating_duration_since(t) >= timeout,
            None => true,
        }
    }
}

pub struct RouteExport {
    lists: RwLock<BTreeMap<ProtocolFamily, ExportList>>,
    idle_timeout: Duration,
    log: Logger,
}

impl RouteExport {
    pub fn new(idle_timeout: Duration, log: Logger) -> Self {
        Self {
            lists: RwLock::new(BTreeMap::new()),
            idle_timeout,
            log,
        }
    }

    /// Insert or refresh the snapshot of a destination.
    pub fn upsert(&self, state: DestinationState) {
        let mut lists = write_lock!(self.lists);
        lists.entry(state.family).or_default().upsert(state);
    }

    pub fn remove(&self, family: ProtocolFamily, prefix: &Prefix) {
        let mut lists = write_lock!(self.lists);
        let removed = match lists.get_mut(&family) {
            Some(list) => list.remove(prefix),
            None => false,
        };
        if !removed {
            locrib_log!(self, MOD_EXPORT, warn,
                "export remove: {} not listed", prefix;
                "family" => family.to_string()
            );
        }
    }

    pub fn route_count(&self, family: ProtocolFamily) -> usize {
        read_lock!(self.lists)
            .get(&family)
            .map(|l| l.route_count)
            .unwrap_or(0)
    }

    /// Number of slots including tombstones.
    pub fn slot_count(&self, family: ProtocolFamily) -> usize {
        read_lock!(self.lists)
            .get(&family)
            .map(|l| l.slots.len())
            .unwrap_or(0)
    }

    pub fn is_walk_active(&self, family: ProtocolFamily) -> bool {
        read_lock!(self.lists)
            .get(&family)
            .is_some_and(|l| l.walk_active.load(Ordering::SeqCst))
    }

    /// Read up to `count` destinations starting at slot `from`. A walk
    /// starting at zero first compacts a dirty list.
    pub fn bulk_get(
        &self,
        family: ProtocolFamily,
        from: usize,
        count: usize,
    ) -> BulkRoutes {
        if from == 0 {
            let mut lists = write_lock!(self.lists);
            if let Some(list) = lists.get_mut(&family) {
                list.walk_active.store(false, Ordering::SeqCst);
                if list.dirty {
                    list.reset_route_list();
                }
            }
        }

        let lists = read_lock!(self.lists);
        let Some(list) = lists.get(&family) else {
            locrib_log!(self, MOD_EXPORT, warn,
                "bulk get for unlisted family {}", family
            );
            return BulkRoutes::default();
        };

        list.walk_active.store(true, Ordering::SeqCst);
        *lock!(list.last_read) = Some(Instant::now());

        if count == 0 {
            list.walk_active.store(false, Ordering::SeqCst);
            return BulkRoutes::default();
        }

        let mut routes = Vec::new();
        let mut i = from;
        while i < list.slots.len() && routes.len() < count {
            if let Some(state) = &list.slots[i] {
                routes.push(state.clone());
            }
            i += 1;
        }

        if i >= list.slots.len() {
            list.walk_active.store(false, Ordering::SeqCst);
            BulkRoutes {
                next_index: 0,
                more: false,
                routes,
            }
        } else {
            BulkRoutes {
                next_index: i,
                more: true,
                routes,
            }
        }
    }

    pub fn bulk_get_v4(&self, from: usize, count: usize) -> BulkRoutes {
        self.bulk_get(ProtocolFamily::IPV4_UNICAST, from, count)
    }

    pub fn bulk_get_v6(&self, from: usize, count: usize) -> BulkRoutes {
        self.bulk_get(ProtocolFamily::IPV6_UNICAST, from, count)
    }

    /// End walks with no read for the idle timeout and compact every dirty
    /// family without an active walk.
    pub fn reap_idle(&self, now: Instant) {
        let mut lists = write_lock!(self.lists);
        for (family, list) in lists.iter_mut() {
            if list.walk_active.load(Ordering::SeqCst)
                && list.idle_since(now, self.idle_timeout)
            {
                locrib_log!(self, MOD_EXPORT, info,
                    "ending idle export walk";
                    "family" => family.to_string()
                );
                list.walk_active.store(false, Ordering::SeqCst);
            }
            if list.dirty && !list.walk_active.load(Ordering::SeqCst) {
                list.reset_route_list();
            }
        }
    }

    /// Run [`RouteExport::reap_idle`] periodically on a background thread.
    /// The thread exits once the export itself is dropped.
    pub fn spawn_idle_reaper(
        self: &Arc<Self>,
    ) -> std::io::Result<JoinHandle<()>> {
        let export: Weak<Self> = Arc::downgrade(self);
        let log = self.log.clone();
        let interval = (self.idle_timeout / 4).max(Duration::from_millis(10));

        thread::Builder::new()
            .name("export-idle-reaper".to_string())
            .spawn(move || {
                loop {
                    thread::sleep(interval);
                    match export.upgrade() {
                        Some(export) => export.reap_idle(Instant::now()),
                        None => break,
                    }
                }
                slog::debug!(log, "export idle reaper shutting down");
            })
    }
}
