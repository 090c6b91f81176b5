// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Pure classification of a callable, computed before any conversion.
//!
//! Rules apply in order; the first match wins:
//!
//! ```text
//!   not_convert set                       → OptedOut
//!   classifier-derived wrapper            → Derived
//!   exact builtin name len/zip/range/…    → Substitute
//!   builtin / builtin-like module / API   → Passthrough   (Sequential exempt)
//!   generator function                    → Generator
//!   lambda                                → Lambda
//!   plain function                        → Function
//!   bound method                          → Method
//!   layer with forward                    → LayerForward
//!   other callable object                 → CallEntry
//!   anything else                         → Unsupported
//! ```
//!
//! The input is expected to have its decorator markers already removed
//! with [`Callable::unwrap_decorators`].

use crate::backend::FrameworkIntrospector;
use crate::callable::{Callable, CallableKind, FunctionDef, Instance};
use crate::registry::registry;
use crate::BuiltinSubstitute;
use std::fmt;

/// Why a callable runs unconverted without being an error or fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassthroughReason {
    /// A host builtin with no traceable substitute.
    Builtin,
    /// Lives in a builtin-like module such as `numpy`.
    BuiltinModule,
    /// Part of the framework's public API.
    FrameworkApi,
}

impl PassthroughReason {
    pub fn as_str(self) -> &'static str {
        match self {
            PassthroughReason::Builtin => "builtin",
            PassthroughReason::BuiltinModule => "builtin_module",
            PassthroughReason::FrameworkApi => "framework_api",
        }
    }
}

impl fmt::Display for PassthroughReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The category a callable falls in.
#[derive(Debug, Clone)]
pub enum Classification {
    OptedOut,
    /// Already produced by a classifier: a substitute, a partial binding
    /// or a layer wrapper.
    Derived,
    Substitute(BuiltinSubstitute),
    Passthrough(PassthroughReason),
    Generator,
    Lambda,
    Function(FunctionDef),
    Method {
        function: Callable,
        receiver: Instance,
    },
    LayerForward {
        layer: Callable,
        forward: Callable,
        instance: Instance,
    },
    /// A callable object; `entry` is `None` when the type's call entry
    /// cannot be retrieved.
    CallEntry {
        entry: Option<Callable>,
        instance: Instance,
    },
    Unsupported,
}

/// Classifies `callable` without side effects.
pub fn classify(callable: &Callable, introspector: &dyn FrameworkIntrospector) -> Classification {
    if callable.options().not_convert {
        return Classification::OptedOut;
    }

    let kind = callable.kind();
    match kind {
        CallableKind::Substitute(_)
        | CallableKind::Partial { .. }
        | CallableKind::LayerWrapper { .. } => return Classification::Derived,
        CallableKind::Builtin { name, .. } => return host_builtin(name),
        CallableKind::Function(def) if is_host_builtin(callable, def) => {
            return host_builtin(def.name())
        }
        CallableKind::NotCallable { .. } => return Classification::Unsupported,
        _ => {}
    }

    if let Some(reason) = passthrough_reason(callable, introspector) {
        return Classification::Passthrough(reason);
    }

    match kind {
        CallableKind::Function(def) if def.is_generator() => Classification::Generator,
        CallableKind::Function(def) if def.is_lambda() => Classification::Lambda,
        CallableKind::Function(def) => Classification::Function(def.clone()),
        CallableKind::Method { function, receiver } => {
            let function = function.unwrap_decorators();
            if is_generator(&function) {
                Classification::Generator
            } else {
                Classification::Method {
                    function,
                    receiver: receiver.clone(),
                }
            }
        }
        CallableKind::Object(obj) => match &obj.forward {
            Some(forward) if introspector.is_layer(obj) => Classification::LayerForward {
                layer: callable.clone(),
                forward: forward.unwrap_decorators(),
                instance: obj.instance.clone(),
            },
            _ => Classification::CallEntry {
                entry: obj.call_entry.as_ref().map(Callable::unwrap_decorators),
                instance: obj.instance.clone(),
            },
        },
        _ => Classification::Unsupported,
    }
}

/// A plain function that is really one of the host builtins, e.g. `len`
/// reached through the `builtins` module.
fn is_host_builtin(callable: &Callable, def: &FunctionDef) -> bool {
    callable.module() == Some("builtins") && registry().is_builtin_name(def.name())
}

fn host_builtin(name: &str) -> Classification {
    match BuiltinSubstitute::from_name(name) {
        Some(sub) => Classification::Substitute(sub),
        None => Classification::Passthrough(PassthroughReason::Builtin),
    }
}

fn is_generator(callable: &Callable) -> bool {
    matches!(callable.kind(), CallableKind::Function(def) if def.is_generator())
}

/// The type whose membership in the convertible set exempts the callable
/// from passthrough.
fn owner_type(callable: &Callable) -> Option<&str> {
    match callable.kind() {
        CallableKind::Object(obj) => Some(obj.instance.qualified_type()),
        CallableKind::Method { receiver, .. } => Some(receiver.qualified_type()),
        _ => None,
    }
}

fn passthrough_reason(
    callable: &Callable,
    introspector: &dyn FrameworkIntrospector,
) -> Option<PassthroughReason> {
    let reg = registry();
    if owner_type(callable).is_some_and(|t| reg.is_convertible_type(t)) {
        return None;
    }
    if callable.module().is_some_and(|m| reg.is_builtin_module(m)) {
        return Some(PassthroughReason::BuiltinModule);
    }
    if introspector.is_framework_api(callable) {
        return Some(PassthroughReason::FrameworkApi);
    }
    None
}
