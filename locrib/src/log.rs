// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use slog::{Drain, Logger};
use std::fs::File;
use std::io::Write;

pub fn init_logger() -> Logger {
    build_logger(std::io::stdout())
}

pub fn init_file_logger(filename: &str) -> std::io::Result<Logger> {
    Ok(build_logger(File::create(filename)?))
}

/// Bunyan formatted records behind an async drain.
pub fn build_logger<W: Write + Send + 'static>(w: W) -> Logger {
    let drain = slog_bunyan::new(w).build().fuse();
    let drain = slog_async::Async::new(drain)
        .chan_size(0x8000)
        .build()
        .fuse();
    slog::Logger::root(drain, slog::o!())
}

/// Log through `$self.log` tagged with the locrib component and the given
/// module.
macro_rules! locrib_log {
    ($self:expr, $module:expr, $level:ident, $msg:expr;
        $($key:expr => $value:expr),*) => {
        slog::$level!($self.log,
            $msg;
            "component" => crate::COMPONENT_LOCRIB,
            "module" => $module,
            $($key => $value),*
        )
    };
    ($self:expr, $module:expr, $level:ident, $msg:expr, $($args:expr),*;
        $($key:expr => $value:expr),*) => {
        slog::$level!($self.log,
            $msg, $($args),*;
            "component" => crate::COMPONENT_LOCRIB,
            "module" => $module,
            $($key => $value),*
        )
    };
    ($self:expr, $module:expr, $level:ident, $msg:expr) => {
        slog::$level!($self.log,
            $msg;
            "component" => crate::COMPONENT_LOCRIB,
            "module" => $module,
        )
    };
    ($self:expr, $module:expr, $level:ident, $msg:expr, $($args:expr),*) => {
        slog::$level!($self.log,
            $msg, $($args),*;
            "component" => crate::COMPONENT_LOCRIB,
            "module" => $module,
        )
    };
}

pub(crate) use locrib_log;
