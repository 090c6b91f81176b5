// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for mixed-precision scopes and model decoration.

/// Errors that can occur when entering a precision scope or decorating
/// models and optimizers.
///
/// Every variant is raised before any precision state is mutated, so the
/// enclosing scope is always left intact.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmpError {
    /// The requested AMP level is not one of `O0`, `O1`, `O2`.
    #[error("level should be O0, O1 or O2 (O0: fp32, O1: mixed precision, O2: pure fp16/bf16), got '{0}'")]
    InvalidLevel(String),

    /// The requested low-precision dtype is not `float16` or `bfloat16`.
    #[error("dtype should be 'float16' or 'bfloat16', got '{0}'")]
    InvalidDType(String),

    /// The same op name appears in both custom lists.
    #[error("custom white list overlaps custom black list on op '{op}'")]
    ListOverlap { op: String },

    /// Decoration only accepts `O1` and `O2`.
    #[error("decorate level should be O1 or O2, got '{0}'")]
    InvalidDecorateLevel(String),

    /// A model passed to decoration is not usable for pure low precision.
    #[error("models should be plain layers, but received {type_name}: {reason}")]
    InvalidModel { type_name: String, reason: String },

    /// An optimizer passed to decoration failed the capability check.
    #[error("optimizers should be recognized optimizers, but received {type_name}")]
    InvalidOptimizer { type_name: String },

    /// `save_dtype` is not one of the serialisable floating types.
    #[error("save_dtype can only be float16, bfloat16, float32 or float64, got '{0}'")]
    InvalidSaveDType(String),
}
