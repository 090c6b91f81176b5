// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII precision scopes.
//!
//! [`enter_scope`] validates the request, resolves the effective op lists,
//! checks the device, snapshots the dispatcher's current state and installs
//! the new one. The returned [`PrecisionGuard`] restores the snapshot when it
//! is dropped: on normal exit, on `?` propagation and on unwinding alike.
//!
//! ```text
//! enter_scope(&mut ctx, opts)
//!       │  validate ─► resolve lists ─► device check
//!       ▼
//!  PrecisionGuard  ◄─── holds &mut ctx + saved PrecisionState
//!       │
//!       │  drop()
//!       ▼
//!  ctx.replace_precision_state(saved)
//! ```
//!
//! The guard derefs to the dispatcher, so nested scopes borrow through the
//! outer guard and the borrow checker enforces LIFO exit order.

use crate::{AmpDType, AmpDispatcher, AmpError, AmpLevel, DType, OpLists, PrecisionState};
use std::ops::{Deref, DerefMut};

/// The arguments of a precision scope.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ScopeOptions {
    /// Enable mixed precision at all.
    #[serde(default = "default_true")]
    pub enable: bool,
    /// Ops to force into low precision on top of the built-in table.
    #[serde(default)]
    pub custom_white_list: Vec<String>,
    /// Ops to keep in full precision on top of the built-in table.
    #[serde(default)]
    pub custom_black_list: Vec<String>,
    #[serde(default)]
    pub level: AmpLevel,
    #[serde(default)]
    pub dtype: AmpDType,
}

fn default_true() -> bool {
    true
}

impl Default for ScopeOptions {
    fn default() -> Self {
        Self {
            enable: true,
            custom_white_list: Vec::new(),
            custom_black_list: Vec::new(),
            level: AmpLevel::O1,
            dtype: AmpDType::Float16,
        }
    }
}

impl ScopeOptions {
    /// Options for an enabled scope at `level` with `dtype`.
    pub fn new(level: AmpLevel, dtype: AmpDType) -> Self {
        Self {
            level,
            dtype,
            ..Self::default()
        }
    }

    /// Builds options from the string form used by user-facing APIs.
    ///
    /// `level` and `dtype` are validated case-insensitively.
    pub fn parse(
        enable: bool,
        custom_white_list: Vec<String>,
        custom_black_list: Vec<String>,
        level: &str,
        dtype: &str,
    ) -> Result<Self, AmpError> {
        Ok(Self {
            enable,
            custom_white_list,
            custom_black_list,
            level: level.parse()?,
            dtype: dtype.parse()?,
        })
    }

    pub fn enabled(mut self, enable: bool) -> Self {
        self.enable = enable;
        self
    }

    pub fn with_white_list<I, S>(mut self, ops: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.custom_white_list = ops.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_black_list<I, S>(mut self, ops: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.custom_black_list = ops.into_iter().map(Into::into).collect();
        self
    }

    /// Resolves the state this scope would install on a device described
    /// by `place`, without touching any dispatcher.
    pub fn resolve(&self, place: &crate::Place) -> Result<PrecisionState, AmpError> {
        let lists = OpLists::resolve(
            self.level,
            self.dtype,
            &self.custom_white_list,
            &self.custom_black_list,
        )?;

        let mut enabled = self.enable;
        if enabled {
            if let Some(reason) = place.unsupported_reason(self.dtype) {
                tracing::warn!("{reason}; amp_guard makes no effect in this scope");
                enabled = false;
            }
        }

        let (level, dtype) = if enabled && self.level != AmpLevel::O0 {
            (self.level, self.dtype.to_dtype())
        } else {
            (AmpLevel::O0, DType::Float32)
        };

        Ok(PrecisionState {
            enabled,
            level,
            dtype,
            lists,
            scope: Some(self.clone()),
        })
    }
}

/// An active precision scope. Restores the enclosing state on drop.
///
/// # Example
/// ```
/// use amp::{enter_scope, AmpContext, AmpDispatcher, AmpLevel, Place, ScopeOptions, AmpDType};
///
/// let mut ctx = AmpContext::new(Place::gpu(8, 0, Some("11.2")));
/// let mut outer = enter_scope(&mut ctx, ScopeOptions::default()).unwrap();
/// {
///     let inner = enter_scope(&mut *outer, ScopeOptions::new(AmpLevel::O2, AmpDType::Float16)).unwrap();
///     assert!(inner.in_pure_fp16_guard());
/// }
/// assert!(outer.in_amp_guard());
/// ```
pub struct PrecisionGuard<'a, D: AmpDispatcher + ?Sized> {
    dispatcher: &'a mut D,
    /// The enclosing state. `Option` so `drop()` can `take()` it.
    saved: Option<PrecisionState>,
}

impl<D: AmpDispatcher + ?Sized> PrecisionGuard<'_, D> {
    /// The state this scope replaced.
    pub fn saved_state(&self) -> Option<&PrecisionState> {
        self.saved.as_ref()
    }
}

impl<D: AmpDispatcher + ?Sized> Deref for PrecisionGuard<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.dispatcher
    }
}

impl<D: AmpDispatcher + ?Sized> DerefMut for PrecisionGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        self.dispatcher
    }
}

impl<D: AmpDispatcher + ?Sized> Drop for PrecisionGuard<'_, D> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            tracing::trace!(level = %saved.level, dtype = %saved.dtype, "restoring precision state");
            self.dispatcher.replace_precision_state(saved);
        }
    }
}

impl<D: AmpDispatcher + ?Sized> std::fmt::Debug for PrecisionGuard<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrecisionGuard")
            .field("active", self.dispatcher.precision_state())
            .field("saved", &self.saved)
            .finish()
    }
}

/// Enters a precision scope on `dispatcher`.
///
/// Fails with [`AmpError::ListOverlap`] before any state change if the
/// custom lists overlap. A device that cannot run the requested dtype
/// degrades the scope to full precision with a warning instead of failing.
pub fn enter_scope<D: AmpDispatcher + ?Sized>(
    dispatcher: &mut D,
    options: ScopeOptions,
) -> Result<PrecisionGuard<'_, D>, AmpError> {
    let state = options.resolve(dispatcher.expected_place())?;
    Ok(enter_resolved(dispatcher, state))
}

/// Installs an already resolved `state` on `dispatcher`, see
/// [`ScopeOptions::resolve`]. Cannot fail.
pub fn enter_resolved<D: AmpDispatcher + ?Sized>(
    dispatcher: &mut D,
    state: PrecisionState,
) -> PrecisionGuard<'_, D> {
    tracing::debug!(
        enabled = state.enabled,
        level = %state.level,
        dtype = %state.dtype,
        white = state.lists.white_list.len(),
        black = state.lists.black_list.len(),
        "entering precision scope"
    );
    let saved = dispatcher.replace_precision_state(state);
    PrecisionGuard {
        dispatcher,
        saved: Some(saved),
    }
}

/// Runs `body` inside a precision scope and restores the enclosing state
/// afterwards, whether `body` succeeds or fails.
pub fn with_scope<D, T, E, F>(dispatcher: &mut D, options: ScopeOptions, body: F) -> Result<T, E>
where
    D: AmpDispatcher + ?Sized,
    E: From<AmpError>,
    F: FnOnce(&mut D) -> Result<T, E>,
{
    let mut guard = enter_scope(dispatcher, options)?;
    body(&mut *guard)
}
