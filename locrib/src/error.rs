// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::net::IpAddr;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("route manager error {0}")]
    RouteManager(String),

    #[error("next hop {0} unresolved")]
    NextHopUnresolved(IpAddr),

    #[error("datastore error {0}")]
    Datastore(#[from] sled::Error),

    #[error("serialization error {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error {0}")]
    Io(#[from] std::io::Error),

    #[error("config error {0}")]
    Config(String),

    #[error("{0}")]
    UnsupportedFamily(#[from] rib_types::Error),
}
