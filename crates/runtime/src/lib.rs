// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # runtime
//!
//! Trace sessions tying call conversion and mixed precision together.
//!
//! The runtime takes:
//! - A [`SessionConfig`] (TOML) describing the default precision scope,
//!   model decoration, the device and translator verbosity.
//! - A `ConversionBackend` from `dy2static` that rewrites functions.
//!
//! And exposes a [`TraceSession`] that converts each callable the tracer
//! meets, opens precision scopes on its own `amp` context, and counts what
//! happened in [`SessionMetrics`].
//!
//! # Scoping
//! ```text
//! TraceSession ──enter_amp_scope──▶ PrecisionGuard<TraceSession>
//!                                       │ derefs to the session
//!                                       ▼
//!                        convert_call / nested enter_amp_scope
//! ```
//! Dropping a guard restores the enclosing precision state, also when the
//! traced body fails or panics.

mod config;
mod error;
mod metrics;
mod session;

pub use config::{SessionConfig, TranslatorConfig};
pub use error::RuntimeError;
pub use metrics::SessionMetrics;
pub use session::TraceSession;
