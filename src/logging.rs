// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Logger setup for the binary; the library only uses the `log` macros

use std::io::Write;

/// Install a timestamped `env_logger`. `RUST_LOG` takes precedence over
/// `default_filter`; `verbose` raises the default to debug.
pub fn init_logger(default_filter: &str, verbose: bool) {
    let filter = if verbose { "debug" } else { default_filter };

    let _ = env_logger::Builder::new()
        .format(|buf, record| {
            let level_style = buf.default_level_style(record.level());
            let time = chrono::Local::now().format("%Y/%m/%d %H:%M:%S");
            let module = record.module_path().unwrap_or("");
            writeln!(
                buf,
                "{level_style}[{time}] {:<5}{level_style:#} {module}: {}",
                record.level(),
                record.args()
            )
        })
        .parse_filters(filter)
        .parse_env("RUST_LOG")
        .try_init();
}
