// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommand implementations.

pub mod check_op;
pub mod config;
pub mod lists;

use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over `-v` when set.
pub fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose >= 2)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the session config from `path`, or the default one.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<runtime::SessionConfig> {
    match path {
        Some(p) => runtime::SessionConfig::from_file(p)
            .map_err(|e| anyhow::anyhow!("failed to load config '{}': {e}", p.display())),
        None => {
            tracing::debug!("no config given, using defaults");
            Ok(runtime::SessionConfig::default())
        }
    }
}
