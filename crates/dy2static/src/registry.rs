// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The process-wide builtin registry.
//!
//! Built once on first use and read-only afterwards. It answers three
//! questions for the classifier:
//!
//! ```text
//!   is_builtin_name("len")               host builtin?
//!   is_builtin_module("numpy.linalg")    lives in a builtin-like module?
//!   is_convertible_type("…Sequential")   framework type exempt from passthrough?
//! ```

use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Host builtin functions.
const BUILTIN_NAMES: &[&str] = &[
    "abs", "all", "any", "ascii", "bin", "bool", "bytearray", "bytes", "callable", "chr",
    "classmethod", "compile", "complex", "delattr", "dict", "dir", "divmod", "enumerate", "eval",
    "exec", "filter", "float", "format", "frozenset", "getattr", "globals", "hasattr", "hash",
    "help", "hex", "id", "input", "int", "isinstance", "issubclass", "iter", "len", "list",
    "locals", "map", "max", "memoryview", "min", "next", "object", "oct", "open", "ord", "pow",
    "print", "property", "range", "repr", "reversed", "round", "set", "setattr", "slice",
    "sorted", "staticmethod", "str", "sum", "super", "tuple", "type", "vars", "zip",
];

/// Modules whose members are always run as-is.
const BUILTIN_LIKE_MODULES: &[&str] = &[
    "builtins", "collections", "pdb", "copy", "inspect", "re", "numpy", "logging", "six",
];

/// Framework container types that must be converted although they live
/// under the framework's public API.
const CONVERTIBLE_TYPES: &[&str] = &["paddle.nn.Sequential", "paddle.nn.layer.container.Sequential"];

/// Read-only lookup tables, see [`registry`].
#[derive(Debug)]
pub struct BuiltinRegistry {
    names: BTreeSet<&'static str>,
    modules: BTreeSet<&'static str>,
    convertible_types: BTreeSet<&'static str>,
}

static REGISTRY: LazyLock<BuiltinRegistry> = LazyLock::new(|| {
    tracing::trace!(
        names = BUILTIN_NAMES.len(),
        modules = BUILTIN_LIKE_MODULES.len(),
        "initialising builtin registry"
    );
    BuiltinRegistry {
        names: BUILTIN_NAMES.iter().copied().collect(),
        modules: BUILTIN_LIKE_MODULES.iter().copied().collect(),
        convertible_types: CONVERTIBLE_TYPES.iter().copied().collect(),
    }
});

/// The shared registry.
pub fn registry() -> &'static BuiltinRegistry {
    &REGISTRY
}

impl BuiltinRegistry {
    pub fn is_builtin_name(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// `true` if `module` is a builtin-like module or one of its submodules.
    pub fn is_builtin_module(&self, module: &str) -> bool {
        let root = module.split('.').next().unwrap_or(module);
        self.modules.contains(root)
    }

    /// `true` for the framework container types exempt from passthrough.
    pub fn is_convertible_type(&self, qualified_type: &str) -> bool {
        self.convertible_types.contains(qualified_type)
    }
}
