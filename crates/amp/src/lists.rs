// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Op allow/deny tables and the custom-list merge policy.
//!
//! The allow list ("white list") holds ops that are numerically safe and
//! performance-critical in low precision; they are always cast down. The
//! deny list ("black list") holds ops that are numerically dangerous in low
//! precision, whose effects may also be observed downstream; they always run
//! in `float32`. Ops on neither list follow their inputs.
//!
//! # Merge Policy
//! ```text
//! base (level, dtype) ──► allow pass ──► deny pass ──► effective lists
//!                          custom_white   custom_black
//! ```
//! Each custom allow name is removed from the deny list and added to the
//! allow list; then each custom deny name is removed from the allow list
//! and added to the deny list. A name present in both custom lists is
//! rejected before either pass runs.

use crate::{AmpDType, AmpError, AmpLevel};
use std::collections::BTreeSet;

/// Ops that support fp16 and are numerically safe and performance-critical.
pub const WHITE_LIST: &[&str] = &[
    "conv2d",
    "matmul",
    "matmul_v2",
    "mul",
    "fake_quantize_dequantize_abs_max",
    "fake_quantize_dequantize_moving_average_abs_max",
];

/// Ops that support fp16 but are numerically dangerous.
pub const BLACK_LIST: &[&str] = &[
    "exp",
    "square",
    "log",
    "mean",
    "sum",
    "cos_sim",
    "softmax",
    "softmax_with_cross_entropy",
    "sigmoid_cross_entropy_with_logits",
    "c_softmax_with_cross_entropy",
    "cross_entropy",
    "cross_entropy2",
    // fp32 avoids inf once the sum exceeds 65504.
    "reduce_sum",
    // fp16 grad kernels of the interpolation ops are slower than fp32.
    "linear_interp_v2",
    "nearest_interp_v2",
    "bilinear_interp_v2",
    "bicubic_interp_v2",
    "trilinear_interp_v2",
];

pub const PURE_FP16_WHITE_LIST: &[&str] = &[];

/// Ops with no usable pure-fp16 kernel.
pub const PURE_FP16_BLACK_LIST: &[&str] = &[
    "lookup_table",
    "lookup_table_v2",
    "scatter",
    "scatter_grad",
    "linear_interp_v2",
    "nearest_interp_v2",
    "bilinear_interp_v2",
    "bicubic_interp_v2",
    "trilinear_interp_v2",
];

pub const BF16_WHITE_LIST: &[&str] = &["conv2d", "matmul_v2"];
pub const BF16_BLACK_LIST: &[&str] = &[];

pub const PURE_BF16_WHITE_LIST: &[&str] = &[];
pub const PURE_BF16_BLACK_LIST: &[&str] = &[];

/// How an op is treated under the active precision state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpPrecision {
    /// On the allow list: runs in the scope's low-precision dtype.
    Allow,
    /// On the deny list: kept in `float32`.
    Deny,
    /// On neither list: follows the dtype of its inputs.
    Unlisted,
    /// The active level is `O0`; everything runs in full precision.
    Disabled,
}

impl OpPrecision {
    pub fn as_str(self) -> &'static str {
        match self {
            OpPrecision::Allow => "allow",
            OpPrecision::Deny => "deny",
            OpPrecision::Unlisted => "unlisted",
            OpPrecision::Disabled => "disabled",
        }
    }
}

/// A pair of disjoint op-name sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OpLists {
    /// Ops forced into low precision.
    pub white_list: BTreeSet<String>,
    /// Ops kept in full precision.
    pub black_list: BTreeSet<String>,
}

impl OpLists {
    /// Builds lists from static tables.
    pub fn from_tables(white: &[&str], black: &[&str]) -> Self {
        Self {
            white_list: white.iter().map(|s| s.to_string()).collect(),
            black_list: black.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// The built-in tables for a `(level, dtype)` pair.
    ///
    /// `O0` carries the `O1` table of its dtype so that a later scope
    /// restore or a re-enable sees sensible lists; the level itself
    /// disables casting.
    pub fn base(level: AmpLevel, dtype: AmpDType) -> Self {
        match (level, dtype) {
            (AmpLevel::O0 | AmpLevel::O1, AmpDType::Float16) => {
                Self::from_tables(WHITE_LIST, BLACK_LIST)
            }
            (AmpLevel::O0 | AmpLevel::O1, AmpDType::BFloat16) => {
                Self::from_tables(BF16_WHITE_LIST, BF16_BLACK_LIST)
            }
            (AmpLevel::O2, AmpDType::Float16) => {
                Self::from_tables(PURE_FP16_WHITE_LIST, PURE_FP16_BLACK_LIST)
            }
            (AmpLevel::O2, AmpDType::BFloat16) => {
                Self::from_tables(PURE_BF16_WHITE_LIST, PURE_BF16_BLACK_LIST)
            }
        }
    }

    /// Resolves the effective lists: the base table for `(level, dtype)`
    /// with the custom lists merged in.
    ///
    /// Fails with [`AmpError::ListOverlap`] if a name appears in both custom
    /// lists.
    pub fn resolve(
        level: AmpLevel,
        dtype: AmpDType,
        custom_white: &[String],
        custom_black: &[String],
    ) -> Result<Self, AmpError> {
        check_overlap(custom_white, custom_black)?;
        let mut lists = Self::base(level, dtype);
        lists.merge_custom(custom_white, custom_black);
        Ok(lists)
    }

    /// Applies the allow pass, then the deny pass.
    ///
    /// Callers must have rejected overlapping inputs first; with overlap the
    /// deny pass wins.
    pub fn merge_custom(&mut self, custom_white: &[String], custom_black: &[String]) {
        for op in custom_white {
            self.black_list.remove(op);
            self.white_list.insert(op.clone());
        }
        for op in custom_black {
            self.white_list.remove(op);
            self.black_list.insert(op.clone());
        }
    }

    /// Looks up an op name.
    pub fn classify(&self, op: &str) -> OpPrecision {
        if self.white_list.contains(op) {
            OpPrecision::Allow
        } else if self.black_list.contains(op) {
            OpPrecision::Deny
        } else {
            OpPrecision::Unlisted
        }
    }

    /// Returns `true` if no op is on both lists.
    pub fn is_disjoint(&self) -> bool {
        self.white_list.is_disjoint(&self.black_list)
    }
}

/// Rejects any name present in both custom lists.
pub fn check_overlap(custom_white: &[String], custom_black: &[String]) -> Result<(), AmpError> {
    if custom_white.is_empty() || custom_black.is_empty() {
        return Ok(());
    }
    let black: BTreeSet<&str> = custom_black.iter().map(String::as_str).collect();
    match custom_white.iter().find(|op| black.contains(op.as_str())) {
        Some(op) => Err(AmpError::ListOverlap { op: op.clone() }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_base_tables_are_disjoint() {
        for level in [AmpLevel::O0, AmpLevel::O1, AmpLevel::O2] {
            for dtype in [AmpDType::Float16, AmpDType::BFloat16] {
                assert!(OpLists::base(level, dtype).is_disjoint(), "{level}/{dtype}");
            }
        }
    }

    #[test]
    fn test_o1_fp16_classification() {
        let lists = OpLists::base(AmpLevel::O1, AmpDType::Float16);
        assert_eq!(lists.classify("conv2d"), OpPrecision::Allow);
        assert_eq!(lists.classify("softmax"), OpPrecision::Deny);
        assert_eq!(lists.classify("relu"), OpPrecision::Unlisted);
    }

    #[test]
    fn test_o2_tables() {
        let fp16 = OpLists::base(AmpLevel::O2, AmpDType::Float16);
        assert!(fp16.white_list.is_empty());
        assert!(fp16.black_list.contains("lookup_table_v2"));
        let bf16 = OpLists::base(AmpLevel::O2, AmpDType::BFloat16);
        assert!(bf16.white_list.is_empty());
        assert!(bf16.black_list.is_empty());
    }

    #[test]
    fn test_bf16_o1_table() {
        let lists = OpLists::base(AmpLevel::O1, AmpDType::BFloat16);
        assert_eq!(lists.white_list.len(), 2);
        assert_eq!(lists.classify("matmul_v2"), OpPrecision::Allow);
        assert_eq!(lists.classify("softmax"), OpPrecision::Unlisted);
    }

    #[test]
    fn test_custom_white_moves_from_black() {
        let lists =
            OpLists::resolve(AmpLevel::O1, AmpDType::Float16, &names(&["softmax"]), &[]).unwrap();
        assert_eq!(lists.classify("softmax"), OpPrecision::Allow);
        assert!(lists.is_disjoint());
    }

    #[test]
    fn test_custom_black_moves_from_white() {
        let lists =
            OpLists::resolve(AmpLevel::O1, AmpDType::Float16, &[], &names(&["conv2d", "relu"]))
                .unwrap();
        assert_eq!(lists.classify("conv2d"), OpPrecision::Deny);
        assert_eq!(lists.classify("relu"), OpPrecision::Deny);
        assert!(lists.is_disjoint());
    }

    #[test]
    fn test_overlap_rejected() {
        let err = OpLists::resolve(
            AmpLevel::O1,
            AmpDType::Float16,
            &names(&["a", "conv2d"]),
            &names(&["conv2d"]),
        )
        .unwrap_err();
        assert_eq!(err, AmpError::ListOverlap { op: "conv2d".into() });
    }

    #[test]
    fn test_merge_with_overlap_deny_wins() {
        let mut lists = OpLists::default();
        lists.merge_custom(&names(&["x"]), &names(&["x"]));
        assert_eq!(lists.classify("x"), OpPrecision::Deny);
    }
}
