// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `dy2st config` command: validate a session config and print it
//! normalised, or print the default config when none is given.

use std::path::Path;

pub fn execute(config: Option<&Path>) -> anyhow::Result<()> {
    let loaded = super::load_config(config)?;
    match config {
        Some(p) => println!("# {} is valid", p.display()),
        None => println!("# default session config"),
    }

    let place = loaded.resolve_place();
    for dtype in [amp::AmpDType::Float16, amp::AmpDType::BFloat16] {
        if let Some(reason) = place.unsupported_reason(dtype) {
            println!("# note: {reason}");
        }
    }
    print!("{}", loaded.to_toml()?);
    Ok(())
}
