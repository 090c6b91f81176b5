// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # dy2st
//!
//! Command-line interface for the dy2static-rt libraries.
//!
//! ## Usage
//! ```bash
//! # Show the resolved allow/deny lists for a level and dtype
//! dy2st lists --level O2 --dtype float16 --black reduce_mean
//!
//! # How would an op run under the configured scope?
//! dy2st --config session.toml check-op softmax
//!
//! # Validate a session config (or print the default one)
//! dy2st --config session.toml config
//! ```

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "dy2st",
    about = "Inspect mixed-precision op lists and trace session configs",
    version,
    author
)]
struct Cli {
    /// Path to a TOML session configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for list-like results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the allow/deny lists a precision scope would install.
    Lists {
        /// AMP level: O0, O1 or O2.
        #[arg(short, long, default_value = "O1")]
        level: String,

        /// Low-precision dtype: float16 or bfloat16.
        #[arg(short, long, default_value = "float16")]
        dtype: String,

        /// Comma-separated custom allow-list ops.
        #[arg(long, value_delimiter = ',')]
        white: Vec<String>,

        /// Comma-separated custom deny-list ops.
        #[arg(long, value_delimiter = ',')]
        black: Vec<String>,

        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Report how ops would run inside the configured precision scope.
    CheckOp {
        /// Op names to check.
        #[arg(required = true)]
        ops: Vec<String>,

        /// Override the configured AMP level.
        #[arg(short, long)]
        level: Option<String>,

        /// Override the configured dtype.
        #[arg(short, long)]
        dtype: Option<String>,
    },

    /// Validate the session config and print it in normalised form.
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging based on verbosity.
    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Lists {
            level,
            dtype,
            white,
            black,
            format,
        } => commands::lists::execute(&level, &dtype, white, black, format),
        Commands::CheckOp { ops, level, dtype } => {
            commands::check_op::execute(cli.config.as_deref(), &ops, level, dtype)
        }
        Commands::Config => commands::config::execute(cli.config.as_deref()),
    }
}
