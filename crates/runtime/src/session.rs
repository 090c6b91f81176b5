// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! A trace session: one classifier and one precision context, configured
//! together and observed through shared metrics.
//!
//! ```text
//!                    TraceSession
//!        ┌───────────────┼────────────────┐
//!        ▼               ▼                ▼
//!  CallClassifier    AmpContext     SessionMetrics
//!   convert_call    enter_amp_scope    counters
//! ```
//!
//! The session is itself an [`AmpDispatcher`]. A scope entered on it
//! derefs back to the session, so callables met inside the scope are
//! converted through the same session and nested scopes borrow through
//! the outer one.

use crate::{RuntimeError, SessionConfig, SessionMetrics};
use amp::{
    AmpContext, AmpDispatcher, Decorated, Layer, OneOrMany, OpPrecision, Optimizer, Place,
    PrecisionGuard, PrecisionState, ScopeOptions,
};
use dy2static::{
    backend::{ConversionBackend, IdentityBackend, ModulePrefixIntrospector},
    CallClassifier, Callable, Conversion,
};
use std::path::Path;
use std::sync::Arc;

/// A session tying the call classifier and the precision context together.
///
/// # Example
/// ```
/// use amp::{AmpDispatcher, OpPrecision, Place};
/// use runtime::{SessionConfig, TraceSession};
///
/// let config = SessionConfig {
///     device: Place::gpu(8, 0, Some("11.2")),
///     ..Default::default()
/// };
/// let mut session = TraceSession::new(config);
/// {
///     let scope = session.amp_scope().unwrap();
///     assert_eq!(scope.op_precision("conv2d"), OpPrecision::Allow);
/// }
/// assert_eq!(session.op_precision("conv2d"), OpPrecision::Disabled);
/// assert_eq!(session.metrics().scopes_entered, 1);
/// ```
pub struct TraceSession {
    config: SessionConfig,
    amp: AmpContext,
    classifier: CallClassifier,
    metrics: SessionMetrics,
}

impl TraceSession {
    /// Creates a session whose backend marks functions as converted
    /// without rewriting them.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_backend(config, Arc::new(IdentityBackend))
    }

    /// Creates a session converting functions with `backend`.
    pub fn with_backend(config: SessionConfig, backend: Arc<dyn ConversionBackend>) -> Self {
        let classifier = CallClassifier::new(backend)
            .with_introspector(Arc::new(ModulePrefixIntrospector::new(
                config.translator.framework_prefixes.iter().cloned(),
            )))
            .with_verbosity(config.translator.verbosity);
        let amp = AmpContext::new(config.resolve_place());
        tracing::info!(
            place = %amp.expected_place(),
            level = %config.amp.level,
            dtype = %config.amp.dtype,
            verbosity = config.translator.verbosity,
            "trace session created"
        );
        Self {
            config,
            amp,
            classifier,
            metrics: SessionMetrics::new(),
        }
    }

    /// Loads the configuration from a TOML file and creates a session.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        Ok(Self::new(SessionConfig::from_file(path)?))
    }

    /// Replaces the classifier, e.g. to plug in a source inspector.
    pub fn with_classifier(mut self, classifier: CallClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn classifier(&self) -> &CallClassifier {
        &self.classifier
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    /// Returns the callable the tracer should invoke in place of `callable`.
    pub fn convert_call(&mut self, callable: &Callable) -> Result<Callable, RuntimeError> {
        self.convert_call_detailed(callable).map(|c| c.callable)
    }

    /// Like [`convert_call`](Self::convert_call), also reporting the outcome.
    pub fn convert_call_detailed(
        &mut self,
        callable: &Callable,
    ) -> Result<Conversion, RuntimeError> {
        match self.classifier.convert_call(callable) {
            Ok(conversion) => {
                self.metrics.record_outcome(&conversion.outcome);
                Ok(conversion)
            }
            Err(err) => {
                self.metrics.record_classify_error();
                tracing::error!(%callable, %err, "call conversion failed");
                Err(err.into())
            }
        }
    }

    /// Enters the precision scope described by the session configuration.
    pub fn amp_scope(&mut self) -> Result<PrecisionGuard<'_, Self>, RuntimeError> {
        let options = self.config.resolve_scope();
        self.enter_amp_scope(options)
    }

    /// Enters a precision scope. The returned guard derefs to the session
    /// and restores the enclosing precision state when dropped.
    pub fn enter_amp_scope(
        &mut self,
        options: ScopeOptions,
    ) -> Result<PrecisionGuard<'_, Self>, RuntimeError> {
        let state = match options.resolve(self.amp.expected_place()) {
            Ok(state) => state,
            Err(err) => {
                self.metrics.record_scope(false);
                return Err(err.into());
            }
        };
        let mut guard = amp::enter_resolved(self, state);
        guard.metrics.record_scope(true);
        Ok(guard)
    }

    /// Runs `body` inside a precision scope, restoring the enclosing state
    /// whether `body` succeeds or fails.
    pub fn with_amp_scope<T, E, F>(&mut self, options: ScopeOptions, body: F) -> Result<T, E>
    where
        E: From<RuntimeError>,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        let mut guard = self.enter_amp_scope(options)?;
        body(&mut *guard)
    }

    /// Decorates models and optimizers with the configured options.
    pub fn decorate<M: Layer, O: Optimizer>(
        &self,
        models: OneOrMany<M>,
        optimizers: Option<OneOrMany<O>>,
    ) -> Result<Decorated<M, O>, RuntimeError> {
        let options = self.config.resolve_decorate()?;
        tracing::info!(
            level = %options.level,
            dtype = %options.dtype,
            models = models.len(),
            "decorating models"
        );
        Ok(amp::decorate(models, optimizers, &options)?)
    }

    /// How an op named `op` runs right now.
    pub fn op_precision(&self, op: &str) -> OpPrecision {
        self.amp.op_precision(op)
    }
}

impl AmpDispatcher for TraceSession {
    fn expected_place(&self) -> &Place {
        self.amp.expected_place()
    }

    fn precision_state(&self) -> &PrecisionState {
        self.amp.precision_state()
    }

    fn replace_precision_state(&mut self, state: PrecisionState) -> PrecisionState {
        self.amp.replace_precision_state(state)
    }
}

impl std::fmt::Debug for TraceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceSession")
            .field("place", self.amp.expected_place())
            .field("precision", self.amp.precision_state())
            .field("classifier", &self.classifier)
            .field("metrics", &self.metrics)
            .finish()
    }
}
