// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Traceable replacements for host builtins.
//!
//! On host values each substitute behaves exactly like the builtin it
//! replaces. On tensors it emits the static-graph equivalent instead:
//!
//! | builtin     | tensor behaviour                                      |
//! |-------------|-------------------------------------------------------|
//! | `len`       | leading dim if static, symbolic `shape(x)[0]` if not  |
//! | `range`     | a [`RangeLoop`] construct                             |
//! | `zip`       | unsupported                                           |
//! | `enumerate` | unsupported                                           |
//! | `print`     | logged symbolically                                   |

use crate::{CallError, RangeLoop, TensorSpec, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the fixed builtin substitutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinSubstitute {
    Len,
    Zip,
    Range,
    Enumerate,
    Print,
}

impl BuiltinSubstitute {
    pub const ALL: [BuiltinSubstitute; 5] = [
        BuiltinSubstitute::Len,
        BuiltinSubstitute::Zip,
        BuiltinSubstitute::Range,
        BuiltinSubstitute::Enumerate,
        BuiltinSubstitute::Print,
    ];

    /// Looks a substitute up by the exact builtin name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// The name of the builtin this substitute replaces.
    pub fn name(self) -> &'static str {
        match self {
            BuiltinSubstitute::Len => "len",
            BuiltinSubstitute::Zip => "zip",
            BuiltinSubstitute::Range => "range",
            BuiltinSubstitute::Enumerate => "enumerate",
            BuiltinSubstitute::Print => "print",
        }
    }

    pub fn call(self, args: &[Value]) -> Result<Value, CallError> {
        match self {
            BuiltinSubstitute::Len => match args {
                [x] => len(x),
                _ => Err(arity("len", "exactly one argument", args.len())),
            },
            BuiltinSubstitute::Range => range(args),
            BuiltinSubstitute::Zip => zip(args),
            BuiltinSubstitute::Enumerate => match args {
                [seq] => enumerate(seq, 0),
                [seq, Value::Int(start)] => enumerate(seq, *start),
                [_, other] => Err(CallError::Type(format!(
                    "'{}' object cannot be interpreted as an integer",
                    other.type_name()
                ))),
                _ => Err(arity("enumerate", "one or two arguments", args.len())),
            },
            BuiltinSubstitute::Print => {
                print(args);
                Ok(Value::None)
            }
        }
    }
}

impl fmt::Display for BuiltinSubstitute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn arity(name: &str, expected: &str, got: usize) -> CallError {
    CallError::Type(format!("{name}() takes {expected} ({got} given)"))
}

fn len(x: &Value) -> Result<Value, CallError> {
    if let Value::Tensor(t) = x {
        return match t.leading_dim() {
            Some(Some(n)) => Ok(Value::Int(n as i64)),
            Some(None) => Ok(Value::Tensor(TensorSpec::new(
                format!("shape({})[0]", t.name),
                Vec::new(),
            ))),
            None => Err(CallError::Type("len() of a 0-D tensor".into())),
        };
    }
    match x.host_items() {
        Some(items) => Ok(Value::Int(items.len() as i64)),
        None => Err(CallError::Type(format!(
            "object of type '{}' has no len()",
            x.type_name()
        ))),
    }
}

fn range(args: &[Value]) -> Result<Value, CallError> {
    let zero = Value::Int(0);
    let one = Value::Int(1);
    let (start, stop, step) = match args {
        [stop] => (&zero, stop, &one),
        [start, stop] => (start, stop, &one),
        [start, stop, step] => (start, stop, step),
        _ => return Err(arity("range", "one to three arguments", args.len())),
    };

    for bound in [start, stop, step] {
        if !matches!(bound, Value::Int(_) | Value::Tensor(_)) {
            return Err(CallError::Type(format!(
                "'{}' object cannot be interpreted as an integer",
                bound.type_name()
            )));
        }
    }
    if *step == zero {
        return Err(CallError::Value("range() arg 3 must not be zero".into()));
    }

    match (start, stop, step) {
        (Value::Int(start), Value::Int(stop), Value::Int(step)) => {
            int_range(*start, *stop, *step).map(Value::List)
        }
        _ => Ok(Value::Loop(Box::new(RangeLoop {
            start: start.clone(),
            stop: stop.clone(),
            step: step.clone(),
        }))),
    }
}

/// Longest host `range` materialised as a list.
const MAX_RANGE_LEN: usize = 1 << 24;

/// Number of elements in `range(start, stop, step)`; `step` is non-zero.
fn range_len(start: i64, stop: i64, step: i64) -> u128 {
    let (start, stop, step) = (i128::from(start), i128::from(stop), i128::from(step));
    let span = if step > 0 { stop - start } else { start - stop };
    if span <= 0 {
        return 0;
    }
    ((span - 1) / step.abs() + 1) as u128
}

fn int_range(start: i64, stop: i64, step: i64) -> Result<Vec<Value>, CallError> {
    let len = range_len(start, stop, step);
    let len = usize::try_from(len)
        .ok()
        .filter(|&n| n <= MAX_RANGE_LEN)
        .ok_or_else(|| {
            CallError::Value(format!(
                "range() of {len} elements exceeds the limit of {MAX_RANGE_LEN}"
            ))
        })?;

    let mut items = Vec::new();
    items
        .try_reserve_exact(len)
        .map_err(|err| CallError::Value(format!("range() of {len} elements: {err}")))?;
    let mut next = Some(start);
    while let Some(i) = next.filter(|_| items.len() < len) {
        items.push(Value::Int(i));
        next = i.checked_add(step);
    }
    Ok(items)
}

fn sequence_items(name: &str, x: &Value) -> Result<Vec<Value>, CallError> {
    if x.is_tensor() {
        return Err(CallError::Unsupported(format!("{name}() over a tensor")));
    }
    x.host_items().ok_or_else(|| {
        CallError::Type(format!("'{}' object is not iterable", x.type_name()))
    })
}

fn zip(args: &[Value]) -> Result<Value, CallError> {
    let columns = args
        .iter()
        .map(|a| sequence_items("zip", a))
        .collect::<Result<Vec<_>, _>>()?;
    let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
    let zipped = (0..rows)
        .map(|i| Value::Tuple(columns.iter().map(|c| c[i].clone()).collect()))
        .collect();
    Ok(Value::List(zipped))
}

fn enumerate(seq: &Value, start: i64) -> Result<Value, CallError> {
    let items = sequence_items("enumerate", seq)?;
    let pairs = items
        .into_iter()
        .enumerate()
        .map(|(offset, item)| {
            let index = i64::try_from(offset)
                .ok()
                .and_then(|offset| start.checked_add(offset))
                .ok_or_else(|| {
                    CallError::Value(format!("enumerate() index overflows from start {start}"))
                })?;
            Ok(Value::Tuple(vec![Value::Int(index), item]))
        })
        .collect::<Result<_, CallError>>()?;
    Ok(Value::List(pairs))
}

fn print(args: &[Value]) {
    let line = args.iter().map(Value::to_string).collect::<Vec<_>>().join(" ");
    if args.iter().any(Value::is_tensor) {
        tracing::info!(target: "dy2static::print", symbolic = true, "{line}");
    } else {
        tracing::info!(target: "dy2static::print", "{line}");
    }
}
