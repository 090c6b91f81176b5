// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # amp
//!
//! Automatic mixed precision for imperative execution: which ops run in
//! low precision, scoped so that every change is undone on exit.
//!
//! # Key Components
//!
//! - [`AmpLevel`] / [`AmpDType`]: the requested level (`O0`/`O1`/`O2`) and
//!   low-precision type (`float16`/`bfloat16`).
//! - [`OpLists`]: the built-in allow/deny tables per `(level, dtype)` and
//!   the custom-list merge policy.
//! - [`Place`]: the execution device and its low-precision capability.
//! - [`AmpDispatcher`] / [`AmpContext`]: the op dispatcher whose precision
//!   state scopes mutate.
//! - [`enter_scope`] / [`PrecisionGuard`]: an RAII scope. Dropping the guard
//!   restores the enclosing state exactly once.
//! - [`decorate`]: prepares models and optimizers for pure low precision.
//!
//! # Ownership Model
//!
//! ```text
//! AmpContext (one per session)
//!       │  enter_scope(&mut ctx, opts)
//!       ▼
//!  PrecisionGuard<'_>  ◄─── &mut ctx + saved state
//!       │  enter_scope(&mut *guard, opts)
//!       ▼
//!  PrecisionGuard<'_>  ◄─── nested: borrows through the outer guard
//! ```
//!
//! There is no process-wide precision state. Each session owns a context and
//! scopes borrow it mutably, so at most one scope is current at a time and
//! inner scopes always exit before outer ones.
//!
//! # Example
//! ```
//! use amp::{enter_scope, AmpContext, AmpDispatcher, OpPrecision, Place, ScopeOptions};
//!
//! let mut ctx = AmpContext::new(Place::gpu(7, 5, Some("11.2")));
//! let opts = ScopeOptions::parse(true, vec![], vec![], "O1", "float16").unwrap();
//! {
//!     let scope = enter_scope(&mut ctx, opts).unwrap();
//!     assert_eq!(scope.op_precision("conv2d"), OpPrecision::Allow);
//!     assert_eq!(scope.op_precision("softmax"), OpPrecision::Deny);
//! }
//! assert!(!ctx.in_amp_guard());
//! ```

mod decorate;
mod device;
mod dtype;
mod error;
mod guard;
mod level;
pub mod lists;
mod state;

pub use decorate::{
    decorate, for_each_sublayer, DecorateOptions, Decorated, Layer, LayerKind, OneOrMany,
    Optimizer, StateDict, StateDictHook, StateEntry,
};
pub use device::Place;
pub use dtype::{AmpDType, DType};
pub use error::AmpError;
pub use guard::{enter_resolved, enter_scope, with_scope, PrecisionGuard, ScopeOptions};
pub use level::AmpLevel;
pub use lists::{OpLists, OpPrecision};
pub use state::{AmpContext, AmpDispatcher, PrecisionState};
