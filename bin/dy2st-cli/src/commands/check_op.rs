// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `dy2st check-op` command: how ops run inside the configured scope.

use amp::AmpDispatcher;
use runtime::TraceSession;
use std::path::Path;

pub fn execute(
    config: Option<&Path>,
    ops: &[String],
    level: Option<String>,
    dtype: Option<String>,
) -> anyhow::Result<()> {
    let config = super::load_config(config)?;
    let mut options = config.resolve_scope();
    if let Some(level) = level {
        options.level = level.parse()?;
    }
    if let Some(dtype) = dtype {
        options.dtype = dtype.parse()?;
    }

    let mut session = TraceSession::new(config);
    let scope = session.enter_amp_scope(options)?;
    let state = scope.precision_state();

    println!(
        "  Place: {}   Level: {}   DType: {}   Enabled: {}",
        scope.expected_place(),
        state.level,
        state.dtype,
        state.enabled,
    );
    println!();
    println!("  {:<40} {:>10}", "Op", "Precision");
    println!("  {}", "-".repeat(51));
    for op in ops {
        println!("  {:<40} {:>10}", op, scope.op_precision(op).as_str());
    }
    Ok(())
}
