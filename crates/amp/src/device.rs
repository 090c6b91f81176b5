// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Execution-device descriptors and low-precision capability checks.
//!
//! # Graceful Degradation
//! A device that cannot run the requested dtype never fails a scope. The
//! guard asks [`Place::unsupported_reason`]; a `Some(reason)` turns the
//! scope into a full-precision one and the reason is logged as a warning.
//!
//! | Place | float16 | bfloat16 |
//! |---|---|---|
//! | CPU | no | no |
//! | GPU | capability ≥ 7.0 | capability ≥ 8.0 and CUDA ≥ 11 |
//! | XPU / MLU / NPU / custom | yes | no |

use crate::AmpDType;
use std::fmt;

/// Minimum compute-capability major version for fp16 AMP on GPUs.
const GPU_FP16_MIN_MAJOR: u32 = 7;

/// Minimum compute-capability major version for bf16 AMP on GPUs.
const GPU_BF16_MIN_MAJOR: u32 = 8;

/// Minimum CUDA major version for bf16 AMP on GPUs.
const GPU_BF16_MIN_CUDA: u32 = 11;

/// The device ops are expected to run on.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(tag = "place", rename_all = "snake_case")]
pub enum Place {
    #[default]
    Cpu,
    Gpu {
        /// `(major, minor)` compute capability.
        compute_capability: (u32, u32),
        /// Version string such as `"11.2"`; `None` for non-CUDA builds.
        cuda_version: Option<String>,
    },
    Xpu,
    Mlu,
    Npu,
    Custom {
        device_type: String,
    },
}

impl Place {
    /// Convenience constructor for a GPU place.
    pub fn gpu(major: u32, minor: u32, cuda_version: Option<&str>) -> Self {
        Place::Gpu {
            compute_capability: (major, minor),
            cuda_version: cuda_version.map(str::to_string),
        }
    }

    /// Returns `true` for places AMP can be enabled on at all.
    pub fn is_accelerator(&self) -> bool {
        !matches!(self, Place::Cpu)
    }

    pub fn is_gpu(&self) -> bool {
        matches!(self, Place::Gpu { .. })
    }

    /// Returns `true` if this GPU supports fp16 AMP. Non-GPU places return
    /// `false`.
    pub fn is_gpu_float16_supported(&self) -> bool {
        match self {
            Place::Gpu {
                compute_capability, ..
            } => compute_capability.0 >= GPU_FP16_MIN_MAJOR,
            _ => false,
        }
    }

    /// Returns `true` if this GPU supports bf16 AMP: capability 8.0 or
    /// higher and a CUDA toolkit of major version 11 or higher.
    pub fn is_gpu_bfloat16_supported(&self) -> bool {
        match self {
            Place::Gpu {
                compute_capability,
                cuda_version,
            } => {
                let cuda_ok = cuda_version
                    .as_deref()
                    .and_then(cuda_major)
                    .is_some_and(|major| major >= GPU_BF16_MIN_CUDA);
                compute_capability.0 >= GPU_BF16_MIN_MAJOR && cuda_ok
            }
            _ => false,
        }
    }

    /// Explains why AMP with `dtype` cannot run here, or `None` if it can.
    pub fn unsupported_reason(&self, dtype: AmpDType) -> Option<String> {
        match (self, dtype) {
            (Place::Cpu, _) => Some(format!(
                "amp can only be enabled on GPU, XPU, MLU, NPU and custom places, current place is {self}"
            )),
            (Place::Gpu { compute_capability: (major, minor), .. }, AmpDType::Float16) => {
                if self.is_gpu_float16_supported() {
                    None
                } else {
                    Some(format!(
                        "float16 amp requires a GPU with compute capability {GPU_FP16_MIN_MAJOR}.0 or higher, current capability is {major}.{minor}"
                    ))
                }
            }
            (
                Place::Gpu {
                    compute_capability: (major, minor),
                    cuda_version,
                },
                AmpDType::BFloat16,
            ) => {
                if self.is_gpu_bfloat16_supported() {
                    None
                } else {
                    Some(format!(
                        "bfloat16 amp requires a GPU with compute capability {GPU_BF16_MIN_MAJOR}.0 or higher and CUDA {GPU_BF16_MIN_CUDA}.0 or higher, current capability is {major}.{minor}, CUDA version is {}",
                        cuda_version.as_deref().unwrap_or("none")
                    ))
                }
            }
            (_, AmpDType::BFloat16) => Some(format!("{self} only supports float16 amp")),
            (_, AmpDType::Float16) => None,
        }
    }
}

/// Parses the major component of a version string like `"11.2"`.
fn cuda_major(version: &str) -> Option<u32> {
    version.split('.').next()?.trim().parse().ok()
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Place::Cpu => f.write_str("CPUPlace"),
            Place::Gpu {
                compute_capability: (major, minor),
                ..
            } => write!(f, "GPUPlace(sm_{major}{minor})"),
            Place::Xpu => f.write_str("XPUPlace"),
            Place::Mlu => f.write_str("MLUPlace"),
            Place::Npu => f.write_str("NPUPlace"),
            Place::Custom { device_type } => write!(f, "CustomPlace({device_type})"),
        }
    }
}
