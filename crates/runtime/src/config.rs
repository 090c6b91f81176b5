// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Session configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! [amp]
//! enable = true
//! level = "O1"
//! dtype = "float16"
//! custom_white_list = ["elementwise_add"]
//! custom_black_list = ["reduce_mean"]
//!
//! [decorate]
//! level = "O2"
//! master_weight = true
//! save_dtype = "float32"
//!
//! [device]
//! place = "gpu"
//! compute_capability = [8, 0]
//! cuda_version = "11.2"
//!
//! [translator]
//! verbosity = 1
//! ```
//!
//! Every section is optional; missing sections take their defaults.

use amp::{DecorateOptions, Place, ScopeOptions};
use std::path::Path;

use crate::RuntimeError;

/// Translator settings.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TranslatorConfig {
    /// 0 is quiet, 1 logs conversion decisions, 2 adds per-step detail.
    #[serde(default)]
    pub verbosity: u8,
    /// Module path prefixes of the framework's public API.
    #[serde(default = "default_framework_prefixes")]
    pub framework_prefixes: Vec<String>,
}

fn default_framework_prefixes() -> Vec<String> {
    vec!["paddle".to_string()]
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            framework_prefixes: default_framework_prefixes(),
        }
    }
}

/// Configuration for a trace session.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionConfig {
    /// Default precision scope.
    #[serde(default)]
    pub amp: ScopeOptions,
    /// Model/optimizer decoration.
    #[serde(default)]
    pub decorate: DecorateOptions,
    /// The device ops are expected to run on.
    #[serde(default)]
    pub device: Place,
    #[serde(default)]
    pub translator: TranslatorConfig,
}

impl SessionConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, RuntimeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::ConfigError(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, RuntimeError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| RuntimeError::ConfigError(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, RuntimeError> {
        toml::to_string_pretty(self)
            .map_err(|e| RuntimeError::ConfigError(format!("TOML serialise error: {e}")))
    }

    /// Checks everything that can be checked without a dispatcher.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        amp::lists::check_overlap(&self.amp.custom_white_list, &self.amp.custom_black_list)?;
        self.decorate.validate()?;
        if let Place::Custom { device_type } = &self.device {
            if device_type.is_empty() {
                return Err(RuntimeError::ConfigError(
                    "custom device needs a non-empty device_type".into(),
                ));
            }
        }
        Ok(())
    }

    /// The default precision scope's options.
    pub fn resolve_scope(&self) -> ScopeOptions {
        self.amp.clone()
    }

    pub fn resolve_decorate(&self) -> Result<DecorateOptions, RuntimeError> {
        self.decorate.validate()?;
        Ok(self.decorate)
    }

    pub fn resolve_place(&self) -> Place {
        self.device.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amp::{AmpDType, AmpLevel, DType};

    #[test]
    fn test_default() {
        let c = SessionConfig::default();
        assert!(c.amp.enable);
        assert_eq!(c.amp.level, AmpLevel::O1);
        assert_eq!(c.device, Place::Cpu);
        assert_eq!(c.translator.verbosity, 0);
        assert_eq!(c.translator.framework_prefixes, vec!["paddle".to_string()]);
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
[amp]
level = "o2"
dtype = "BFloat16"
custom_black_list = ["reduce_mean"]

[decorate]
level = "O2"
master_weight = false
save_dtype = "float32"

[device]
place = "gpu"
compute_capability = [8, 0]
cuda_version = "11.2"

[translator]
verbosity = 2
"#;
        let c = SessionConfig::from_toml(toml).unwrap();
        assert_eq!(c.amp.level, AmpLevel::O2);
        assert_eq!(c.amp.dtype, AmpDType::BFloat16);
        assert!(c.amp.enable);
        assert_eq!(c.amp.custom_black_list, vec!["reduce_mean".to_string()]);
        assert_eq!(c.decorate.master_weight, Some(false));
        assert_eq!(c.decorate.save_dtype, Some(DType::Float32));
        assert_eq!(c.device, Place::gpu(8, 0, Some("11.2")));
        assert_eq!(c.translator.verbosity, 2);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(SessionConfig::from_toml("").unwrap(), SessionConfig::default());
    }

    #[test]
    fn test_invalid_level_rejected() {
        let err = SessionConfig::from_toml("[amp]\nlevel = \"O3\"\n").unwrap_err();
        assert!(matches!(err, RuntimeError::ConfigError(_)));
    }

    #[test]
    fn test_overlapping_lists_rejected() {
        let toml = r#"
[amp]
custom_white_list = ["relu"]
custom_black_list = ["relu"]
"#;
        let err = SessionConfig::from_toml(toml).unwrap_err();
        assert!(matches!(err, RuntimeError::Amp(amp::AmpError::ListOverlap { .. })));
    }

    #[test]
    fn test_decorate_o0_rejected() {
        let err = SessionConfig::from_toml("[decorate]\nlevel = \"O0\"\n").unwrap_err();
        assert!(matches!(err, RuntimeError::Amp(amp::AmpError::InvalidDecorateLevel(_))));
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = SessionConfig {
            device: Place::gpu(7, 5, Some("11.2")),
            ..Default::default()
        };
        let toml = c.to_toml().unwrap();
        let back = SessionConfig::from_toml(&toml).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_from_file_missing() {
        let err = SessionConfig::from_file(Path::new("/nonexistent/session.toml")).unwrap_err();
        assert!(err.to_string().contains("cannot read config"));
    }
}
