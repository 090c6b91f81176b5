// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # dy2static
//!
//! Call classification for imperative-to-static tracing. While the tracer
//! walks a user's imperative program it meets arbitrary callables; for
//! each one [`CallClassifier::classify_and_convert`] decides whether to run
//! it as-is, replace it with a traceable substitute, or rewrite it.
//!
//! # Key Components
//!
//! - [`Callable`]: an identity-compared handle over a closed
//!   [`CallableKind`], with `to_static` and converted-from markers.
//! - [`Value`]: the values callables consume while tracing, including
//!   symbolic [`TensorSpec`]s.
//! - [`registry`]: the read-only set of host builtins and builtin-like
//!   modules.
//! - [`BuiltinSubstitute`]: traceable `len`/`zip`/`range`/`enumerate`/`print`.
//! - [`classify`]: pure categorisation, computed before any conversion.
//! - [`CallClassifier`]: drives the backend, binds receivers, wraps layer
//!   `forward`s and caches conversions.
//!
//! # Example
//! ```
//! use dy2static::{CallClassifier, Callable, FunctionDef, Namespace, Outcome, Value};
//!
//! let classifier = CallClassifier::default();
//!
//! let range = classifier.classify_and_convert(&Callable::builtin("range")).unwrap();
//! assert_eq!(
//!     range.call(&[Value::Int(2)]).unwrap(),
//!     Value::List(vec![Value::Int(0), Value::Int(1)]),
//! );
//!
//! let module = Namespace::new();
//! let f = Callable::function(FunctionDef::new("f").in_scope(&module));
//! module.bind_callable(&f);
//! let converted = classifier.convert_call(&f).unwrap();
//! assert_eq!(converted.outcome, Outcome::Converted);
//! ```

pub mod backend;
mod callable;
mod classify;
mod convert;
mod error;
mod registry;
mod substitutes;
mod value;

pub use callable::{
    Binding, Body, Callable, CallableId, CallableKind, ConversionOptions, FunctionDef, Instance,
    Namespace, ObjectDef, LAMBDA_NAME,
};
pub use classify::{classify, Classification, PassthroughReason};
pub use convert::{CallClassifier, Conversion, FallbackReason, Outcome};
pub use error::{CallError, ClassifyError, ConvertError};
pub use registry::{registry, BuiltinRegistry};
pub use substitutes::BuiltinSubstitute;
pub use value::{RangeLoop, TensorSpec, Value};

/// Opts `callable` out of conversion; every handle to it sees the flag.
pub fn not_to_static(callable: Callable) -> Callable {
    callable.not_to_static()
}

/// Marks `callable` as decorated with `to_static`.
pub fn to_static(callable: Callable) -> Callable {
    Callable::to_static(callable)
}
