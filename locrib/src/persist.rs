// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mirroring of destination state into the management plane.

use crate::error::Error;
use crate::log::locrib_log;
use crate::route::DestinationState;
use crate::MOD_PERSIST;
use rib_types::{Prefix, ProtocolFamily};
use slog::Logger;
use std::sync::Arc;

/// Receives a snapshot of every destination the Loc-RIB touches. Calls are
/// fire and forget: an implementation deals with its own failures.
pub trait StateClient: Send + Sync {
    fn add_object(&self, state: &DestinationState);
    fn update_object(&self, state: &DestinationState);
    fn delete_object(&self, state: &DestinationState);
}

pub type StateClientRef = Arc<dyn StateClient>;

/// Discards every snapshot.
pub struct NullStateClient;

impl StateClient for NullStateClient {
    fn add_object(&self, _state: &DestinationState) {}
    fn update_object(&self, _state: &DestinationState) {}
    fn delete_object(&self, _state: &DestinationState) {}
}

/// Keeps the latest snapshot of each destination in a sled database, one
/// tree per family keyed by prefix.
#[derive(Clone)]
pub struct SledStateClient {
    db: sled::Db,
    log: Logger,
}

fn tree_name(family: ProtocolFamily) -> String {
    format!("bgp_{family}_routes")
}

impl SledStateClient {
    pub fn new(path: &str, log: Logger) -> Result<Self, Error> {
        Ok(Self {
            db: sled::open(path)?,
            log,
        })
    }

    fn put(&self, state: &DestinationState) -> Result<(), Error> {
        let tree = self.db.open_tree(tree_name(state.family))?;
        let value = serde_json::to_string(state)?;
        tree.insert(state.prefix.db_key(), value.as_str())?;
        tree.flush()?;
        Ok(())
    }

    fn del(&self, state: &DestinationState) -> Result<(), Error> {
        let tree = self.db.open_tree(tree_name(state.family))?;
        tree.remove(state.prefix.db_key())?;
        tree.flush()?;
        Ok(())
    }

    pub fn get(
        &self,
        family: ProtocolFamily,
        prefix: &Prefix,
    ) -> Result<Option<DestinationState>, Error> {
        let tree = self.db.open_tree(tree_name(family))?;
        match tree.get(prefix.db_key())? {
            Some(value) => {
                let value = String::from_utf8_lossy(&value);
                Ok(Some(serde_json::from_str(&value)?))
            }
            None => Ok(None),
        }
    }

    /// Every stored snapshot of `family`, skipping entries that fail to
    /// load.
    pub fn get_all(
        &self,
        family: ProtocolFamily,
    ) -> Result<Vec<DestinationState>, Error> {
        let tree = self.db.open_tree(tree_name(family))?;
        Ok(tree
            .scan_prefix(vec![])
            .filter_map(|item| {
                let (_, value) = match item {
                    Ok(item) => item,
                    Err(e) => {
                        locrib_log!(self, MOD_PERSIST, error,
                            "error fetching destination entry: {}", e
                        );
                        return None;
                    }
                };
                let value = String::from_utf8_lossy(&value);
                match serde_json::from_str(&value) {
                    Ok(state) => Some(state),
                    Err(e) => {
                        locrib_log!(self, MOD_PERSIST, error,
                            "error parsing destination entry: {}", e
                        );
                        None
                    }
                }
            })
            .collect())
    }

    fn report(
        &self,
        op: &str,
        state: &DestinationState,
        result: Result<(), Error>,
    ) {
        if let Err(e) = result {
            locrib_log!(self, MOD_PERSIST, error,
                "failed to {} {}: {}", op, state.prefix, e;
                "family" => state.family.to_string()
            );
        }
    }
}

impl StateClient for SledStateClient {
    fn add_object(&self, state: &DestinationState) {
        self.report("add", state, self.put(state));
    }

    fn update_object(&self, state: &DestinationState) {
        self.report("update", state, self.put(state));
    }

    fn delete_object(&self, state: &DestinationState) {
        self.report("delete", state, self.del(state));
    }
}
