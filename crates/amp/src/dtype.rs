// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Numeric data types known to the precision subsystem.
//!
//! Two enums live here:
//! - [`DType`]: any element type a parameter or a scope can carry.
//! - [`AmpDType`]: the two low-precision types a scope may request.

use crate::AmpError;
use std::fmt;
use std::str::FromStr;

/// Element data types a parameter, a serialized entry, or the active
/// precision state can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// 16-bit IEEE 754 floating point.
    Float16,
    /// 16-bit brain floating point.
    BFloat16,
    /// 32-bit IEEE 754 floating point.
    Float32,
    /// 64-bit IEEE 754 floating point.
    Float64,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// Boolean.
    Bool,
}

impl DType {
    /// Returns the framework-facing name of this data type.
    pub fn as_str(self) -> &'static str {
        match self {
            DType::Float16 => "float16",
            DType::BFloat16 => "bfloat16",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Bool => "bool",
        }
    }

    /// Returns `true` for floating-point types. Only these are touched by
    /// precision casts.
    pub fn is_floating(self) -> bool {
        matches!(
            self,
            DType::Float16 | DType::BFloat16 | DType::Float32 | DType::Float64
        )
    }

    /// Parses a serialisable dtype for `save_dtype`.
    ///
    /// Only the exact names `float16`, `bfloat16`, `float32` and
    /// `float64` are accepted.
    pub fn parse_save_dtype(s: &str) -> Result<Self, AmpError> {
        match s {
            "float16" => Ok(DType::Float16),
            "bfloat16" => Ok(DType::BFloat16),
            "float32" => Ok(DType::Float32),
            "float64" => Ok(DType::Float64),
            _ => Err(AmpError::InvalidSaveDType(s.to_string())),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The low-precision type a scope requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AmpDType {
    /// IEEE half precision.
    #[default]
    Float16,
    /// Brain floating point.
    BFloat16,
}

impl AmpDType {
    /// Returns the canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            AmpDType::Float16 => "float16",
            AmpDType::BFloat16 => "bfloat16",
        }
    }

    /// The element type installed while a scope of this dtype is active.
    pub fn to_dtype(self) -> DType {
        match self {
            AmpDType::Float16 => DType::Float16,
            AmpDType::BFloat16 => DType::BFloat16,
        }
    }
}

impl FromStr for AmpDType {
    type Err = AmpError;

    /// Case-insensitive: `"float16"`, `"FLOAT16"`, `"bfloat16"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "float16" => Ok(AmpDType::Float16),
            "bfloat16" => Ok(AmpDType::BFloat16),
            _ => Err(AmpError::InvalidDType(s.to_string())),
        }
    }
}

impl TryFrom<String> for AmpDType {
    type Error = AmpError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AmpDType> for String {
    fn from(d: AmpDType) -> Self {
        d.as_str().to_string()
    }
}

impl fmt::Display for AmpDType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_floating() {
        assert!(DType::BFloat16.is_floating());
        assert!(DType::Float64.is_floating());
        assert!(!DType::Int64.is_floating());
        assert!(!DType::Bool.is_floating());
    }

    #[test]
    fn test_amp_dtype_parse_case_insensitive() {
        assert_eq!("float16".parse::<AmpDType>().unwrap(), AmpDType::Float16);
        assert_eq!("BFloat16".parse::<AmpDType>().unwrap(), AmpDType::BFloat16);
        assert_eq!(
            "float32".parse::<AmpDType>(),
            Err(AmpError::InvalidDType("float32".into()))
        );
    }

    #[test]
    fn test_parse_save_dtype() {
        assert_eq!(DType::parse_save_dtype("float64").unwrap(), DType::Float64);
        assert_eq!(DType::parse_save_dtype("bfloat16").unwrap(), DType::BFloat16);
        for rejected in ["int8", "fp16", "bf16", "fp32", "fp64", "Float32"] {
            assert_eq!(
                DType::parse_save_dtype(rejected),
                Err(AmpError::InvalidSaveDType(rejected.into())),
                "{rejected}"
            );
        }
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&AmpDType::BFloat16).unwrap();
        assert_eq!(json, "\"bfloat16\"");
        let back: AmpDType = serde_json::from_str("\"FLOAT16\"").unwrap();
        assert_eq!(back, AmpDType::Float16);
        assert!(serde_json::from_str::<AmpDType>("\"int8\"").is_err());
        assert_eq!(serde_json::to_string(&DType::Float32).unwrap(), "\"float32\"");
    }
}
