// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The values callables consume and produce while tracing.
//!
//! Host values (`Int`, `List`, …) behave like their host-language
//! counterparts. [`Value::Tensor`] is a symbolic static-graph variable whose
//! leading dimension may be unknown until run time; [`Value::Loop`] is a loop
//! construct emitted into the graph instead of a materialised sequence.

use crate::callable::Instance;
use std::fmt;

/// A symbolic static-graph variable.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TensorSpec {
    pub name: String,
    /// Per-dimension size; `None` marks a dimension only known at run time.
    pub shape: Vec<Option<usize>>,
}

impl TensorSpec {
    pub fn new(name: impl Into<String>, shape: Vec<Option<usize>>) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }

    /// A tensor whose dimensions are all known.
    pub fn fixed(name: impl Into<String>, shape: &[usize]) -> Self {
        Self::new(name, shape.iter().copied().map(Some).collect())
    }

    /// The leading dimension: `None` for 0-D tensors, `Some(None)` if
    /// only known at run time.
    pub fn leading_dim(&self) -> Option<Option<usize>> {
        self.shape.first().copied()
    }
}

/// A loop construct over `start..stop` by `step` emitted into the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeLoop {
    pub start: Value,
    pub stop: Value,
    pub step: Value,
}

/// A traced value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Tensor(TensorSpec),
    Loop(Box<RangeLoop>),
    /// An object instance, e.g. the receiver of a bound method.
    Instance(Instance),
}

impl Value {
    /// The host-language type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Tensor(_) => "Tensor",
            Value::Loop(_) => "Loop",
            Value::Instance(_) => "object",
        }
    }

    pub fn is_tensor(&self) -> bool {
        matches!(self, Value::Tensor(_))
    }

    /// Items of a host sequence; strings yield one `Str` per character.
    /// `None` for non-sequences.
    pub fn host_items(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) | Value::Tuple(items) => Some(items.clone()),
            Value::Str(s) => Some(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<TensorSpec> for Value {
    fn from(t: TensorSpec) -> Self {
        Value::Tensor(t)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            Ok(())
        }

        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                join(f, items)?;
                f.write_str("]")
            }
            Value::Tuple(items) => {
                f.write_str("(")?;
                join(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Value::Tensor(t) => {
                let dims: Vec<String> = t
                    .shape
                    .iter()
                    .map(|d| d.map_or("-1".to_string(), |n| n.to_string()))
                    .collect();
                write!(f, "Tensor({}, shape=[{}])", t.name, dims.join(", "))
            }
            Value::Loop(l) => write!(f, "Loop({}, {}, {})", l.start, l.stop, l.step),
            Value::Instance(i) => write!(f, "<{} object>", i.qualified_type()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_host_values() {
        let v = Value::List(vec![Value::Int(1), Value::Tuple(vec![Value::Int(2)])]);
        assert_eq!(v.to_string(), "[1, (2,)]");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
    }

    #[test]
    fn test_display_tensor() {
        let t = TensorSpec::new("x", vec![None, Some(3)]);
        assert_eq!(Value::Tensor(t).to_string(), "Tensor(x, shape=[-1, 3])");
    }

    #[test]
    fn test_host_items() {
        assert_eq!(Value::from("ab").host_items().unwrap().len(), 2);
        assert!(Value::Int(3).host_items().is_none());
    }

    #[test]
    fn test_leading_dim() {
        assert_eq!(TensorSpec::fixed("x", &[4, 2]).leading_dim(), Some(Some(4)));
        assert_eq!(TensorSpec::new("y", vec![None]).leading_dim(), Some(None));
        assert_eq!(TensorSpec::fixed("s", &[]).leading_dim(), None);
    }

    #[test]
    fn test_tensor_spec_serde() {
        let t = TensorSpec::new("x", vec![None, Some(8)]);
        let json = serde_json::to_string(&t).unwrap();
        let back: TensorSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
