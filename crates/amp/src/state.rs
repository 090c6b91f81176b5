// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The precision state an op dispatcher consults, and the dispatcher seam
//! that precision scopes mutate.

use crate::{AmpLevel, DType, OpLists, OpPrecision, Place, ScopeOptions};

/// Everything a precision scope installs and later restores.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PrecisionState {
    /// Whether the installing scope ended up enabled after device checks.
    pub enabled: bool,
    /// Active AMP level.
    pub level: AmpLevel,
    /// Active compute dtype: the low-precision type, or `float32` when off.
    pub dtype: DType,
    /// Active allow/deny lists.
    pub lists: OpLists,
    /// Options of the innermost active scope, `None` outside any scope.
    pub scope: Option<ScopeOptions>,
}

impl Default for PrecisionState {
    /// Full precision with empty lists: the state outside any scope.
    fn default() -> Self {
        Self {
            enabled: false,
            level: AmpLevel::O0,
            dtype: DType::Float32,
            lists: OpLists::default(),
            scope: None,
        }
    }
}

impl PrecisionState {
    /// How an op named `op` runs under this state.
    pub fn op_precision(&self, op: &str) -> OpPrecision {
        if self.level == AmpLevel::O0 {
            return OpPrecision::Disabled;
        }
        self.lists.classify(op)
    }
}

/// The low-level op dispatcher whose AMP configuration a precision scope
/// mutates for the scope's duration.
///
/// Implementors only store and hand back state; validation, list resolution
/// and restore discipline live in [`crate::enter_scope`].
pub trait AmpDispatcher {
    /// The device ops are expected to run on.
    fn expected_place(&self) -> &Place;

    /// The currently installed precision state.
    fn precision_state(&self) -> &PrecisionState;

    /// Installs `state` and returns the previous one.
    fn replace_precision_state(&mut self, state: PrecisionState) -> PrecisionState;

    /// How an op named `op` runs right now.
    fn op_precision(&self, op: &str) -> OpPrecision {
        self.precision_state().op_precision(op)
    }

    /// `true` inside an `O1` scope.
    fn in_amp_guard(&self) -> bool {
        self.precision_state().level == AmpLevel::O1
    }

    /// `true` inside an `O2` scope.
    fn in_pure_fp16_guard(&self) -> bool {
        self.precision_state().level == AmpLevel::O2
    }

    /// Options of the innermost active scope.
    fn amp_state(&self) -> Option<&ScopeOptions> {
        self.precision_state().scope.as_ref()
    }
}

/// A plain in-memory dispatcher: one per trace/execution session, passed
/// by `&mut` to whoever opens precision scopes.
///
/// # Example
/// ```
/// use amp::{enter_scope, AmpContext, AmpDispatcher, OpPrecision, Place, ScopeOptions};
///
/// let mut ctx = AmpContext::new(Place::gpu(8, 0, Some("11.2")));
/// {
///     let scope = enter_scope(&mut ctx, ScopeOptions::default()).unwrap();
///     assert_eq!(scope.op_precision("conv2d"), OpPrecision::Allow);
/// }
/// assert_eq!(ctx.op_precision("conv2d"), OpPrecision::Disabled);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AmpContext {
    place: Place,
    state: PrecisionState,
}

impl AmpContext {
    /// Creates a context for `place` in full precision.
    pub fn new(place: Place) -> Self {
        Self {
            place,
            state: PrecisionState::default(),
        }
    }

    /// Moves the context to another device. Takes effect for scopes entered
    /// afterwards.
    pub fn set_place(&mut self, place: Place) {
        self.place = place;
    }
}

impl AmpDispatcher for AmpContext {
    fn expected_place(&self) -> &Place {
        &self.place
    }

    fn precision_state(&self) -> &PrecisionState {
        &self.state
    }

    fn replace_precision_state(&mut self, state: PrecisionState) -> PrecisionState {
        std::mem::replace(&mut self.state, state)
    }
}
