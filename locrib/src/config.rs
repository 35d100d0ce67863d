// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::error::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_MAX_ECMP_PATHS: usize = 8;
pub const DEFAULT_EXPORT_IDLE_TIMEOUT: u64 = 120;

fn default_max_ecmp_paths() -> usize {
    DEFAULT_MAX_ECMP_PATHS
}

fn default_export_idle_timeout() -> u64 {
    DEFAULT_EXPORT_IDLE_TIMEOUT
}

/// Speaker-wide settings consulted by the decision process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LocRibConfig {
    /// Local autonomous system number.
    pub asn: u32,

    /// Local BGP identifier.
    pub router_id: Ipv4Addr,

    /// Route reflection cluster id. Falls back to the router id.
    #[serde(default)]
    pub cluster_id: Option<Ipv4Addr>,

    /// Install equal paths learned from external peers as one ECMP group.
    #[serde(default)]
    pub ebgp_multipath: bool,

    /// Install equal paths learned from internal peers as one ECMP group.
    #[serde(default)]
    pub ibgp_multipath: bool,

    /// Upper bound on the size of an installed ECMP group.
    #[serde(default = "default_max_ecmp_paths")]
    pub max_ecmp_paths: usize,

    /// Seconds without a bulk read after which an export walk is considered
    /// abandoned.
    #[serde(default = "default_export_idle_timeout")]
    pub export_idle_timeout: u64,
}

impl LocRibConfig {
    pub fn new(asn: u32, router_id: Ipv4Addr) -> Self {
        Self {
            asn,
            router_id,
            cluster_id: None,
            ebgp_multipath: false,
            ibgp_multipath: false,
            max_ecmp_paths: DEFAULT_MAX_ECMP_PATHS,
            export_idle_timeout: DEFAULT_EXPORT_IDLE_TIMEOUT,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&contents)?;
        if cfg.max_ecmp_paths == 0 {
            return Err(Error::Config(
                "max_ecmp_paths must be at least 1".into(),
            ));
        }
        Ok(cfg)
    }

    pub fn cluster_id(&self) -> Ipv4Addr {
        self.cluster_id.unwrap_or(self.router_id)
    }

    pub fn export_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.export_idle_timeout)
    }
}
