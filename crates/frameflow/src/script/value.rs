// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Runtime values of the scriptlet interpreter.
//!
//! Resolved state is stored as JSON; [`Value`] adds the things JSON cannot
//! hold (`undefined`, functions, builtin namespaces) and implements the
//! JavaScript coercion rules the interpreter needs.

use crate::script::ast::Arrow;
use serde_json::{Map, Number};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A scriptlet value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// `undefined`; also the "absent" sentinel for resolved props.
    #[default]
    Undefined,
    /// `null`.
    Null,
    /// Boolean.
    Bool(bool),
    /// IEEE double, as in JavaScript.
    Number(f64),
    /// String.
    String(String),
    /// Array.
    Array(Vec<Value>),
    /// Plain object with ordered keys.
    Object(BTreeMap<String, Value>),
    /// Anything callable.
    Function(Callable),
    /// A builtin namespace such as `Math` or the `api` handle.
    Namespace(Namespace),
}

/// Builtin namespaces reachable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// `Math`
    Math,
    /// `JSON`
    Json,
    /// `Object`
    Object,
    /// `Array`
    Array,
    /// The host capability handle.
    Api,
}

/// An arrow function together with the locals visible where it was created.
#[derive(Debug)]
pub struct Closure {
    /// The function syntax.
    pub arrow: Arc<Arrow>,
    /// Snapshot of enclosing locals.
    pub captured: BTreeMap<String, Value>,
}

/// Callable values.
#[derive(Debug, Clone)]
pub enum Callable {
    /// User-defined arrow function.
    Arrow(Arc<Closure>),
    /// Builtin free function, by qualified name (`"Math.max"`, `"String"`).
    Builtin(&'static str),
    /// Array or string method bound to its receiver.
    Method(Box<Value>, String),
    /// Method of the host `api` handle.
    Api(String),
    /// The `setState(node, patch)` callback of actions.
    SetState,
}

impl Value {
    /// Converts a JSON value.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts to JSON following `JSON.stringify` rules: object members that
    /// are `undefined` or functions are dropped, array slots become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null | Value::Function(_) | Value::Namespace(_) => {
                serde_json::Value::Null
            }
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => {
                let mut out = Map::new();
                for (k, v) in map {
                    if !v.is_absent() {
                        out.insert(k.clone(), v.to_json());
                    }
                }
                serde_json::Value::Object(out)
            }
        }
    }

    /// True for values that have no JSON member representation.
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Undefined | Value::Function(_) | Value::Namespace(_))
    }

    /// True for `undefined` and `null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// JavaScript truthiness.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// The `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Null | Value::Array(_) | Value::Object(_) | Value::Namespace(_) => "object",
        }
    }

    /// `Number(value)`.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Array(items) => match items.as_slice() {
                [] => 0.0,
                [single] => string_to_number(&single.to_js_string()),
                _ => f64::NAN,
            },
            _ => f64::NAN,
        }
    }

    /// `String(value)`.
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) | Value::Namespace(_) => "[object Object]".to_string(),
            Value::Function(_) => "function".to_string(),
        }
    }

    /// `===`. Arrays and objects compare structurally.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.strict_equals(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.strict_equals(vb))
            }
            (Value::Namespace(a), Value::Namespace(b)) => a == b,
            _ => false,
        }
    }

    /// `==`.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => {
                let (a, b) = (self.to_number(), other.to_number());
                a == b
            }
            _ => self.strict_equals(other),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(&json)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_js_string())
    }
}

/// Integral doubles within the safe range are emitted as JSON integers so
/// resolved state reads `3`, not `3.0`.
fn number_to_json(n: f64) -> serde_json::Value {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;

    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE {
        serde_json::Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    match trimmed {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
    }
}

/// Formats a number the way JavaScript's `String(n)` does for common values.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
