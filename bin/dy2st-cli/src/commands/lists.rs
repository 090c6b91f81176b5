// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `dy2st lists` command: print the resolved allow/deny lists.

use crate::Format;
use amp::{AmpDType, AmpLevel, OpLists};

#[derive(serde::Serialize)]
struct ListsReport<'a> {
    level: AmpLevel,
    dtype: AmpDType,
    white_list: Vec<&'a str>,
    black_list: Vec<&'a str>,
}

pub fn execute(
    level: &str,
    dtype: &str,
    white: Vec<String>,
    black: Vec<String>,
    format: Format,
) -> anyhow::Result<()> {
    let level: AmpLevel = level.parse()?;
    let dtype: AmpDType = dtype.parse()?;
    let lists = OpLists::resolve(level, dtype, &white, &black)?;

    let report = ListsReport {
        level,
        dtype,
        white_list: lists.white_list.iter().map(String::as_str).collect(),
        black_list: lists.black_list.iter().map(String::as_str).collect(),
    };

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => {
            println!("  Level: {level}   DType: {dtype}");
            if level == AmpLevel::O0 {
                println!("  (O0 runs every op in float32; lists are informational)");
            }
            println!();
            print_list("Allow (low precision)", &report.white_list);
            print_list("Deny (float32)", &report.black_list);
        }
    }
    Ok(())
}

fn print_list(title: &str, ops: &[&str]) {
    println!("  {title}: {} ops", ops.len());
    for op in ops {
        println!("    {op}");
    }
    println!();
}
