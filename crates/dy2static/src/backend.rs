// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Collaborator seams of the classifier.
//!
//! The classifier decides *whether* to convert; these traits decide *how*
//! and answer the questions only the host runtime can answer:
//!
//! ```text
//!   SourceInspector        can the function's source be retrieved?
//!   ConversionBackend      rewrite a free function for static tracing
//!   FrameworkIntrospector  is this part of the framework's public API?
//!                          is this object a layer?
//! ```

use crate::callable::{Callable, CallableKind, ObjectDef};
use crate::ConvertError;

/// Source retrieval for plain functions.
pub trait SourceInspector: Send + Sync {
    fn has_source(&self, function: &Callable) -> bool;
}

/// Rewrites a free function (no receiver bound) into its static-graph form.
///
/// Implementations must build results with [`Callable::converted`], so
/// that classifying a result again finds the original.
pub trait ConversionBackend: Send + Sync {
    fn convert(&self, function: &Callable) -> Result<Callable, ConvertError>;
}

/// Framework knowledge needed for passthrough decisions.
pub trait FrameworkIntrospector: Send + Sync {
    /// `true` if the callable belongs to the framework's public API and
    /// runs as-is.
    fn is_framework_api(&self, callable: &Callable) -> bool;

    /// `true` if the object is a layer whose `forward` should be converted.
    fn is_layer(&self, object: &ObjectDef) -> bool {
        object.layer
    }
}

// ── Defaults ───────────────────────────────────────────────────────

/// Treats every plain function as having retrievable source.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeSourceAvailable;

impl SourceInspector for AssumeSourceAvailable {
    fn has_source(&self, function: &Callable) -> bool {
        matches!(function.kind(), CallableKind::Function(_))
    }
}

/// A backend that marks functions as converted without rewriting them.
///
/// The result keeps the original's name, module and body, so calling it
/// behaves exactly like the original.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityBackend;

impl ConversionBackend for IdentityBackend {
    fn convert(&self, function: &Callable) -> Result<Callable, ConvertError> {
        match function.kind() {
            CallableKind::Function(def) => Ok(Callable::converted(
                function,
                CallableKind::Function(def.clone()),
            )),
            _ => Err(ConvertError::Failed(format!(
                "{function} is not a free function"
            ))),
        }
    }
}

/// Recognises the framework's public API by module path prefix.
#[derive(Debug, Clone)]
pub struct ModulePrefixIntrospector {
    prefixes: Vec<String>,
}

impl ModulePrefixIntrospector {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for ModulePrefixIntrospector {
    fn default() -> Self {
        Self::new(["paddle"])
    }
}

impl FrameworkIntrospector for ModulePrefixIntrospector {
    fn is_framework_api(&self, callable: &Callable) -> bool {
        let Some(module) = callable.module() else {
            return false;
        };
        self.prefixes.iter().any(|p| {
            module == p
                || module
                    .strip_prefix(p.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}
