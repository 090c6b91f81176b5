// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The call classifier: turns a callable met while tracing into the
//! callable the tracer should invoke instead.
//!
//! ```text
//!   input ──unwrap markers──▶ original ──classify──▶ Classification
//!                                                        │
//!         ┌───────────────┬───────────────┬──────────────┼──────────────┐
//!         ▼               ▼               ▼              ▼              ▼
//!     unchanged      substitute     backend.convert   partial bind   LayerWrapper
//! ```
//!
//! Conversions of free functions are cached by identity of the original,
//! so converting the same function (or anything that unwraps to it) again
//! yields the same result.

use crate::backend::{
    AssumeSourceAvailable, ConversionBackend, FrameworkIntrospector, IdentityBackend,
    ModulePrefixIntrospector, SourceInspector,
};
use crate::callable::{Callable, CallableId, CallableKind, FunctionDef, Instance};
use crate::classify::{classify, Classification, PassthroughReason};
use crate::{BuiltinSubstitute, ClassifyError, ConvertError};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace, warn};

/// Why a callable that would normally be converted runs unconverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FallbackReason {
    Generator,
    Lambda,
    SourceUnavailable,
    /// The function carries no enclosing scope to check reachability in.
    NoDeclaredScope,
    /// The function is no longer bound under its name in its scope.
    TransformedBefore,
    BindingFailed,
}

impl FallbackReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FallbackReason::Generator => "generator",
            FallbackReason::Lambda => "lambda",
            FallbackReason::SourceUnavailable => "source_unavailable",
            FallbackReason::NoDeclaredScope => "no_declared_scope",
            FallbackReason::TransformedBefore => "transformed_before",
            FallbackReason::BindingFailed => "binding_failed",
        }
    }
}

/// What the classifier did with a callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    OptedOut,
    Substituted(BuiltinSubstitute),
    Passthrough(PassthroughReason),
    /// A free function was converted.
    Converted,
    /// A method or callable object was converted and bound to its receiver.
    BoundConverted,
    /// A layer's `forward` was converted and wrapped.
    LayerForwardConverted,
    /// The input was itself a conversion result.
    AlreadyConverted,
    Fallback(FallbackReason),
}

impl Outcome {
    /// A stable label, e.g. `"fallback.source_unavailable"`.
    pub fn label(&self) -> String {
        match self {
            Outcome::OptedOut => "opted_out".into(),
            Outcome::Substituted(sub) => format!("substituted.{}", sub.name()),
            Outcome::Passthrough(reason) => format!("passthrough.{}", reason.as_str()),
            Outcome::Converted => "converted".into(),
            Outcome::BoundConverted => "bound_converted".into(),
            Outcome::LayerForwardConverted => "layer_forward_converted".into(),
            Outcome::AlreadyConverted => "already_converted".into(),
            Outcome::Fallback(reason) => format!("fallback.{}", reason.as_str()),
        }
    }

    /// `true` if the returned callable differs from what was passed in.
    pub fn is_rewrite(&self) -> bool {
        matches!(
            self,
            Outcome::Substituted(_)
                | Outcome::Converted
                | Outcome::BoundConverted
                | Outcome::LayerForwardConverted
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// The result of [`CallClassifier::convert_call`].
#[derive(Debug, Clone)]
pub struct Conversion {
    pub callable: Callable,
    pub outcome: Outcome,
}

impl Conversion {
    fn new(callable: Callable, outcome: Outcome) -> Self {
        Self { callable, outcome }
    }
}

/// Decides, per callable, whether and how to rewrite it for static tracing.
pub struct CallClassifier {
    backend: Arc<dyn ConversionBackend>,
    inspector: Arc<dyn SourceInspector>,
    introspector: Arc<dyn FrameworkIntrospector>,
    verbosity: u8,
    /// original id → (original, converted). Holding the original keeps
    /// its id from being reused.
    cache: Mutex<HashMap<CallableId, (Callable, Callable)>>,
}

impl Default for CallClassifier {
    fn default() -> Self {
        Self::new(Arc::new(IdentityBackend))
    }
}

impl fmt::Debug for CallClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallClassifier")
            .field("verbosity", &self.verbosity)
            .field("cached", &self.cached_len())
            .finish_non_exhaustive()
    }
}

impl CallClassifier {
    /// A classifier using `backend`, assuming source is available and
    /// treating `paddle.*` as the framework API.
    pub fn new(backend: Arc<dyn ConversionBackend>) -> Self {
        Self {
            backend,
            inspector: Arc::new(AssumeSourceAvailable),
            introspector: Arc::new(ModulePrefixIntrospector::default()),
            verbosity: 0,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_inspector(mut self, inspector: Arc<dyn SourceInspector>) -> Self {
        self.inspector = inspector;
        self
    }

    pub fn with_introspector(mut self, introspector: Arc<dyn FrameworkIntrospector>) -> Self {
        self.introspector = introspector;
        self
    }

    /// Translator log verbosity: 1 logs decisions at debug, 2 adds
    /// per-step detail at trace.
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    /// Number of cached function conversions.
    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Returns the callable the tracer should invoke in place of `callable`.
    pub fn classify_and_convert(&self, callable: &Callable) -> Result<Callable, ClassifyError> {
        self.convert_call(callable).map(|c| c.callable)
    }

    /// Like [`classify_and_convert`](Self::classify_and_convert), also
    /// reporting what was done.
    pub fn convert_call(&self, callable: &Callable) -> Result<Conversion, ClassifyError> {
        let original = callable.unwrap_decorators();
        if callable.options().not_convert {
            self.log_decision(callable, "opted out of conversion");
            return Ok(Conversion::new(callable.clone(), Outcome::OptedOut));
        }
        if original.options().not_convert {
            self.log_decision(&original, "opted out of conversion");
            return Ok(Conversion::new(original, Outcome::OptedOut));
        }

        if let Some(converted) = self.cached(&original) {
            if self.verbosity >= 2 {
                trace!(%callable, "reusing cached conversion");
            }
            return Ok(Conversion::new(converted, Outcome::AlreadyConverted));
        }
        if callable.converted_from().is_some() {
            return Ok(Conversion::new(callable.clone(), Outcome::AlreadyConverted));
        }

        let classification = classify(&original, self.introspector.as_ref());
        if self.verbosity >= 2 {
            trace!(%original, ?classification, "classified callable");
        }

        match classification {
            Classification::OptedOut => {
                self.log_decision(&original, "opted out of conversion");
                Ok(Conversion::new(original, Outcome::OptedOut))
            }
            Classification::Derived => {
                Ok(Conversion::new(callable.clone(), Outcome::AlreadyConverted))
            }
            Classification::Substitute(sub) => {
                self.log_decision(&original, "replaced by traceable substitute");
                Ok(Conversion::new(
                    Callable::substitute(sub),
                    Outcome::Substituted(sub),
                ))
            }
            Classification::Passthrough(reason) => {
                self.log_decision(&original, reason.as_str());
                Ok(Conversion::new(callable.clone(), Outcome::Passthrough(reason)))
            }
            Classification::Generator => {
                warn!(
                    %original,
                    "generator functions are not supported in static graph; running unconverted"
                );
                Ok(self.fallback(callable, FallbackReason::Generator))
            }
            Classification::Lambda => {
                self.log_decision(&original, "lambda runs unconverted");
                Ok(self.fallback(callable, FallbackReason::Lambda))
            }
            Classification::Function(def) => self.convert_function(callable, &original, &def),
            Classification::Method { function, receiver } => {
                self.convert_bound(callable, &function, &receiver)
            }
            Classification::LayerForward {
                layer,
                forward,
                instance,
            } => match self.convert_bound(callable, &forward, &instance)? {
                Conversion {
                    callable: bound,
                    outcome: Outcome::BoundConverted,
                } => {
                    self.log_decision(&layer, "converted layer forward");
                    Ok(Conversion::new(
                        Callable::layer_wrapper(layer, bound),
                        Outcome::LayerForwardConverted,
                    ))
                }
                fallback => Ok(fallback),
            },
            Classification::CallEntry {
                entry: Some(entry),
                instance,
            } => self.convert_bound(callable, &entry, &instance),
            Classification::CallEntry { entry: None, .. } => {
                warn!(%callable, "cannot retrieve the call entry point; running unconverted");
                Ok(self.fallback(callable, FallbackReason::BindingFailed))
            }
            Classification::Unsupported => Err(ClassifyError::Unsupported {
                callable: callable.to_string(),
            }),
        }
    }

    fn convert_function(
        &self,
        callable: &Callable,
        original: &Callable,
        def: &FunctionDef,
    ) -> Result<Conversion, ClassifyError> {
        let Some(scope) = def.scope() else {
            self.log_decision(original, "no declared scope; running unconverted");
            return Ok(self.fallback(callable, FallbackReason::NoDeclaredScope));
        };
        if !scope.reaches(def.name(), original) {
            warn!(
                %original,
                "{} doesn't have to be transformed to static function because it has been \
                 transformed before, it will be run as-is",
                def.name()
            );
            return Ok(self.fallback(callable, FallbackReason::TransformedBefore));
        }
        match self.convert_free(original)? {
            Ok(converted) => {
                self.log_decision(original, "converted function");
                Ok(Conversion::new(converted, Outcome::Converted))
            }
            Err(reason) => Ok(self.fallback(callable, reason)),
        }
    }

    /// Converts `function` and binds `receiver` as its first argument.
    fn convert_bound(
        &self,
        callable: &Callable,
        function: &Callable,
        receiver: &Instance,
    ) -> Result<Conversion, ClassifyError> {
        let converted = match self.convert_free(function)? {
            Ok(converted) => converted,
            Err(reason) => return Ok(self.fallback(callable, reason)),
        };
        if matches!(converted.kind(), CallableKind::NotCallable { .. }) {
            warn!(%callable, "converted entry point cannot be bound; running unconverted");
            return Ok(self.fallback(callable, FallbackReason::BindingFailed));
        }
        self.log_decision(callable, "converted and bound to receiver");
        Ok(Conversion::new(
            Callable::partial(converted, receiver.clone()),
            Outcome::BoundConverted,
        ))
    }

    /// Runs the backend on a free function, consulting and filling the
    /// cache. The inner `Err` is a recoverable fallback.
    fn convert_free(
        &self,
        function: &Callable,
    ) -> Result<Result<Callable, FallbackReason>, ClassifyError> {
        if let Some(converted) = self.cached(function) {
            return Ok(Ok(converted));
        }
        if !self.inspector.has_source(function) {
            warn!(%function, "source code is unavailable; running unconverted");
            return Ok(Err(FallbackReason::SourceUnavailable));
        }

        let converted = match self.backend.convert(function) {
            Ok(converted) => converted,
            Err(err) if err.is_recoverable() => {
                warn!(%function, %err, "running unconverted");
                let reason = match err {
                    ConvertError::SourceUnavailable(_) => FallbackReason::SourceUnavailable,
                    _ => FallbackReason::BindingFailed,
                };
                return Ok(Err(reason));
            }
            Err(source) => {
                return Err(ClassifyError::Backend {
                    callable: function.to_string(),
                    source,
                })
            }
        };

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let (_, converted) = cache
            .entry(function.id())
            .or_insert_with(|| (function.clone(), converted));
        Ok(Ok(converted.clone()))
    }

    fn cached(&self, original: &Callable) -> Option<Callable> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .get(&original.id())
            .filter(|(o, _)| o == original)
            .map(|(_, converted)| converted.clone())
    }

    fn fallback(&self, callable: &Callable, reason: FallbackReason) -> Conversion {
        Conversion::new(callable.clone(), Outcome::Fallback(reason))
    }

    fn log_decision(&self, callable: &Callable, decision: &str) {
        if self.verbosity >= 1 {
            debug!(%callable, decision, "convert_call");
        }
    }
}
