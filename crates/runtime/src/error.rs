// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for trace sessions.

/// Errors that can occur while configuring or driving a trace session.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Precision scope entry or model decoration failed.
    #[error("amp error: {0}")]
    Amp(#[from] amp::AmpError),

    /// A callable could not be classified or converted.
    #[error("classify error: {0}")]
    Classify(#[from] dy2static::ClassifyError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
