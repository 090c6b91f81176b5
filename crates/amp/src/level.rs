// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Automatic mixed-precision levels.

use crate::AmpError;
use std::fmt;
use std::str::FromStr;

/// How aggressively a scope lowers precision.
///
/// | Level | Meaning |
/// |---|---|
/// | `O0` | full precision, lists are ignored |
/// | `O1` | mixed precision, ops cast per the allow/deny lists |
/// | `O2` | pure low precision, everything cast except the deny list |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AmpLevel {
    O0,
    #[default]
    O1,
    O2,
}

impl AmpLevel {
    /// Returns the canonical uppercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            AmpLevel::O0 => "O0",
            AmpLevel::O1 => "O1",
            AmpLevel::O2 => "O2",
        }
    }
}

impl FromStr for AmpLevel {
    type Err = AmpError;

    /// Case-insensitive: `"o1"` and `"O1"` are the same level.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "O0" => Ok(AmpLevel::O0),
            "O1" => Ok(AmpLevel::O1),
            "O2" => Ok(AmpLevel::O2),
            _ => Err(AmpError::InvalidLevel(s.to_string())),
        }
    }
}

impl TryFrom<String> for AmpLevel {
    type Error = AmpError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AmpLevel> for String {
    fn from(l: AmpLevel) -> Self {
        l.as_str().to_string()
    }
}

impl fmt::Display for AmpLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("O0".parse::<AmpLevel>().unwrap(), AmpLevel::O0);
        assert_eq!("o1".parse::<AmpLevel>().unwrap(), AmpLevel::O1);
        assert_eq!(" O2 ".parse::<AmpLevel>().unwrap(), AmpLevel::O2);
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(
            "O3".parse::<AmpLevel>(),
            Err(AmpError::InvalidLevel("O3".into()))
        );
        assert!("".parse::<AmpLevel>().is_err());
    }

    #[test]
    fn test_display_and_default() {
        assert_eq!(AmpLevel::default(), AmpLevel::O1);
        assert_eq!(format!("{}", AmpLevel::O2), "O2");
    }
}
