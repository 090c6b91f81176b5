// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for call classification, conversion and invocation.

/// Fatal classification failures. The tracer must abort tracing the
/// function that produced the callable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    /// The value is not a function, method or callable object.
    #[error("callable {callable} can not be transformed at present")]
    Unsupported { callable: String },

    /// The conversion backend failed for a reason other than missing
    /// source or a binding failure.
    #[error("conversion of {callable} failed: {source}")]
    Backend {
        callable: String,
        #[source]
        source: ConvertError,
    },
}

/// Errors reported by a [`crate::ConversionBackend`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    /// The callable's source cannot be retrieved, e.g. it was produced
    /// dynamically. The classifier recovers by running it unconverted.
    #[error("source of {0} is unavailable")]
    SourceUnavailable(String),

    /// The converted entry point cannot be bound to its receiver. The
    /// classifier recovers by running the callable unconverted.
    #[error("cannot bind converted {0}")]
    Binding(String),

    /// Any other rewrite failure. Not recoverable.
    #[error("{0}")]
    Failed(String),
}

impl ConvertError {
    /// `true` for the failures the classifier falls back from.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ConvertError::SourceUnavailable(_) | ConvertError::Binding(_))
    }
}

/// Errors raised while invoking a callable or a builtin substitute.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// Wrong argument count or argument type.
    #[error("TypeError: {0}")]
    Type(String),

    /// Right type, invalid value (e.g. a zero range step).
    #[error("ValueError: {0}")]
    Value(String),

    /// The operation has no static-graph equivalent for these arguments.
    #[error("not supported in static graph: {0}")]
    Unsupported(String),

    /// The callable carries no executable body.
    #[error("{0} has no executable body")]
    NotInvocable(String),
}
