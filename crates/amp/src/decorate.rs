// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model and optimizer decoration for pure low-precision (`O2`) training.
//!
//! At `O1` decoration is a passthrough. At `O2`:
//!
//! 1. Every sublayer of every model has its floating parameters cast to the
//!    low-precision dtype, except norm layers (kept in `float32`) and fused
//!    layers (which adapt themselves through [`Layer::amp_decorate`]).
//! 2. Every optimizer gets its multi-precision flag set so that it keeps
//!    `float32` master weights, unless `master_weight == Some(false)`.
//! 3. With `save_dtype`, every sublayer gets a [`StateDictHook`] that casts
//!    the serialized state only. Live parameters are never touched by it.
//!
//! Inputs and outputs keep their shape through [`OneOrMany`]: a single model
//! in yields a single model out, a list in yields a list out.

use crate::{AmpDType, AmpError, AmpLevel, DType};
use std::collections::BTreeMap;

/// Coarse layer categories that decoration treats specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    BatchNorm,
    BatchNorm1D,
    BatchNorm2D,
    BatchNorm3D,
    LayerNorm,
    SyncBatchNorm,
    FusedFeedForward,
    FusedMultiHeadAttention,
    /// A data-parallel wrapper. Must be applied after decoration.
    DataParallel,
    Other,
}

impl LayerKind {
    /// Norm layers keep their parameters in full precision.
    pub fn is_norm(self) -> bool {
        matches!(
            self,
            LayerKind::BatchNorm
                | LayerKind::BatchNorm1D
                | LayerKind::BatchNorm2D
                | LayerKind::BatchNorm3D
                | LayerKind::LayerNorm
                | LayerKind::SyncBatchNorm
        )
    }

    /// Fused layers adapt their own precision instead of a blanket cast.
    pub fn is_fused(self) -> bool {
        matches!(
            self,
            LayerKind::FusedFeedForward | LayerKind::FusedMultiHeadAttention
        )
    }
}

/// One serialized parameter or buffer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StateEntry {
    /// Framework-side parameter name, preserved by casts.
    pub name: String,
    pub dtype: DType,
    pub shape: Vec<usize>,
}

/// The serialized representation of a layer's state, keyed by path.
pub type StateDict = BTreeMap<String, StateEntry>;

/// A persistence hook that casts floating entries of a state dict to
/// `save_dtype` at serialization time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateDictHook {
    save_dtype: DType,
}

impl StateDictHook {
    pub fn new(save_dtype: DType) -> Self {
        Self { save_dtype }
    }

    pub fn save_dtype(&self) -> DType {
        self.save_dtype
    }

    /// Casts every floating entry; integer and boolean entries pass through.
    pub fn apply(&self, state: &mut StateDict) {
        for entry in state.values_mut() {
            if entry.dtype.is_floating() {
                entry.dtype = self.save_dtype;
            }
        }
    }
}

/// The layer capability decoration needs from the execution runtime.
pub trait Layer {
    /// Concrete type name, used in error messages.
    fn type_name(&self) -> &str;

    fn kind(&self) -> LayerKind;

    /// The dtype the layer was built with.
    fn dtype(&self) -> DType;

    /// Casts this layer's own floating parameters (not its sublayers).
    fn cast_parameters(&mut self, dtype: DType);

    /// Precision adaptation for layers that cannot take a blanket cast.
    fn amp_decorate(&mut self, dtype: DType) {
        self.cast_parameters(dtype);
    }

    /// Records that pure low-precision decoration visited this layer.
    fn mark_pure_precision(&mut self) {}

    /// Direct children, in registration order.
    fn children_mut(&mut self) -> Vec<&mut dyn Layer>;

    /// Attaches a hook run over the layer's state dict when it is saved.
    fn register_state_dict_hook(&mut self, hook: StateDictHook);
}

/// Visits `layer` and then all of its sublayers, depth-first.
pub fn for_each_sublayer(layer: &mut dyn Layer, f: &mut dyn FnMut(&mut dyn Layer)) {
    f(&mut *layer);
    for child in layer.children_mut() {
        for_each_sublayer(child, f);
    }
}

/// The optimizer capability decoration needs from the execution runtime.
pub trait Optimizer {
    /// Concrete type name, used in error messages.
    fn type_name(&self) -> &str;

    /// Capability check: `true` for optimizers the runtime can drive.
    fn is_recognized(&self) -> bool;

    /// Enables or disables `float32` master weights. Optimizers without
    /// multi-precision support ignore the call.
    fn set_multi_precision(&mut self, enabled: bool);

    /// The wrapped optimizer, for sharding wrappers that delegate updates.
    fn inner_mut(&mut self) -> Option<&mut dyn Optimizer> {
        None
    }
}

fn set_multi_precision(optimizer: &mut dyn Optimizer, enabled: bool) {
    match optimizer.inner_mut() {
        Some(inner) => inner.set_multi_precision(enabled),
        None => optimizer.set_multi_precision(enabled),
    }
}

/// A single value or a list, preserved through decoration.
#[derive(Debug, Clone, PartialEq)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_many(&self) -> bool {
        matches!(self, OneOrMany::Many(_))
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(x) => std::slice::from_ref(x),
            OneOrMany::Many(v) => v,
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match self {
            OneOrMany::One(x) => std::slice::from_mut(x),
            OneOrMany::Many(v) => v,
        }
    }

    /// Returns the single value, or `None` for a list.
    pub fn into_one(self) -> Option<T> {
        match self {
            OneOrMany::One(x) => Some(x),
            OneOrMany::Many(_) => None,
        }
    }

    /// Returns the list, or `None` for a single value.
    pub fn into_many(self) -> Option<Vec<T>> {
        match self {
            OneOrMany::One(_) => None,
            OneOrMany::Many(v) => Some(v),
        }
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(x: T) -> Self {
        OneOrMany::One(x)
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(v: Vec<T>) -> Self {
        OneOrMany::Many(v)
    }
}

/// Arguments of [`decorate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DecorateOptions {
    #[serde(default)]
    pub level: AmpLevel,
    #[serde(default)]
    pub dtype: AmpDType,
    /// `None` and `Some(true)` both enable master weights.
    #[serde(default)]
    pub master_weight: Option<bool>,
    #[serde(default)]
    pub save_dtype: Option<DType>,
}

impl Default for DecorateOptions {
    fn default() -> Self {
        Self {
            level: AmpLevel::O1,
            dtype: AmpDType::Float16,
            master_weight: None,
            save_dtype: None,
        }
    }
}

impl DecorateOptions {
    /// Builds options from the string form used by user-facing APIs.
    pub fn parse(
        level: &str,
        dtype: &str,
        master_weight: Option<bool>,
        save_dtype: Option<&str>,
    ) -> Result<Self, AmpError> {
        let level: AmpLevel = level.parse()?;
        if level == AmpLevel::O0 {
            return Err(AmpError::InvalidDecorateLevel(level.to_string()));
        }
        Ok(Self {
            level,
            dtype: dtype.parse()?,
            master_weight,
            save_dtype: save_dtype.map(DType::parse_save_dtype).transpose()?,
        })
    }

    /// Rejects level `O0` and non-floating save dtypes.
    pub fn validate(&self) -> Result<(), AmpError> {
        if self.level == AmpLevel::O0 {
            return Err(AmpError::InvalidDecorateLevel(self.level.to_string()));
        }
        if let Some(save) = self.save_dtype {
            if !save.is_floating() {
                return Err(AmpError::InvalidSaveDType(save.to_string()));
            }
        }
        Ok(())
    }
}

/// Decorated models, plus the optimizers if any were supplied.
pub type Decorated<M, O> = (OneOrMany<M>, Option<OneOrMany<O>>);

/// Prepares models and optimizers for pure low-precision training.
///
/// All models and optimizers are validated before anything is cast, so a
/// rejected call leaves every input untouched.
pub fn decorate<M: Layer, O: Optimizer>(
    mut models: OneOrMany<M>,
    mut optimizers: Option<OneOrMany<O>>,
    options: &DecorateOptions,
) -> Result<Decorated<M, O>, AmpError> {
    options.validate()?;
    if options.level == AmpLevel::O1 {
        return Ok((models, optimizers));
    }

    for model in models.as_slice() {
        check_model(model)?;
    }
    if let Some(opts) = &optimizers {
        for optimizer in opts.as_slice() {
            if !optimizer.is_recognized() {
                return Err(AmpError::InvalidOptimizer {
                    type_name: optimizer.type_name().to_string(),
                });
            }
        }
    }

    let target = options.dtype.to_dtype();
    let mut cast_layers = 0usize;
    for model in models.as_mut_slice() {
        for_each_sublayer(model, &mut |layer: &mut dyn Layer| {
            if pure_precision_initialize(layer, target) {
                cast_layers += 1;
            }
        });
    }
    tracing::debug!(models = models.len(), cast_layers, dtype = %target, "models decorated for pure precision");

    if let Some(opts) = optimizers.as_mut() {
        let use_multi_precision = options.master_weight != Some(false);
        for optimizer in opts.as_mut_slice() {
            set_multi_precision(optimizer, use_multi_precision);
        }
        tracing::debug!(optimizers = opts.len(), use_multi_precision, "optimizers decorated");
    }

    if let Some(save_dtype) = options.save_dtype {
        for model in models.as_mut_slice() {
            for_each_sublayer(model, &mut |layer: &mut dyn Layer| {
                layer.register_state_dict_hook(StateDictHook::new(save_dtype));
            });
        }
    }

    Ok((models, optimizers))
}

fn check_model(model: &dyn Layer) -> Result<(), AmpError> {
    if model.kind() == LayerKind::DataParallel {
        return Err(AmpError::InvalidModel {
            type_name: model.type_name().to_string(),
            reason: "decorate the original model first, then wrap it for data parallelism".into(),
        });
    }
    Ok(())
}

/// Applies the pure-precision cast rules to one layer. Returns `true` if the
/// layer's parameters were changed.
fn pure_precision_initialize(layer: &mut dyn Layer, target: DType) -> bool {
    layer.mark_pure_precision();
    let kind = layer.kind();
    if layer.dtype() == target || kind.is_norm() {
        return false;
    }
    if kind.is_fused() {
        layer.amp_decorate(target);
    } else {
        layer.cast_parameters(target);
    }
    true
}
