// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Tree-walking interpreter for scriptlets.
//!
//! Interpretation is stateless per call: locals live only for the duration
//! of one [`run`], every other name is resolved through [`Bindings`], and
//! the only side effects go through [`Host`].

use crate::script::ast::*;
use crate::script::value::{format_number, Callable, Closure, Namespace, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// Nested arrow calls deeper than this abort the scriptlet.
pub const MAX_CALL_DEPTH: usize = 64;

/// Errors raised while executing a scriptlet.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    /// Operation applied to a value of the wrong type.
    #[error("TypeError: {0}")]
    Type(String),

    /// Assignment to a name that is not a local.
    #[error("ReferenceError: {0}")]
    Reference(String),

    /// Evaluation could not proceed (bad JSON, call depth exceeded).
    #[error("EvaluationError: {0}")]
    Evaluation(String),

    /// The host rejected an `api` call or a `setState` request.
    #[error("HostError: {0}")]
    Host(String),
}

/// Name resolution for everything that is not a local.
pub trait Bindings {
    /// Resolves a free identifier, or `None` to fall through to builtins.
    fn resolve(&self, name: &str) -> Option<Value>;
}

/// Bindings with no names.
pub struct NoBindings;

impl Bindings for NoBindings {
    fn resolve(&self, _name: &str) -> Option<Value> {
        None
    }
}

impl Bindings for HashMap<String, Value> {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Bindings for BTreeMap<String, Value> {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// Capabilities the host exposes to scriptlets.
pub trait Host {
    /// Invokes `api.<method>(args...)`.
    fn call_api(&self, method: &str, args: Vec<Value>) -> Result<Value, ScriptError>;

    /// Handles an action's `setState(node, patch)`.
    fn set_state(&self, node: &str, patch: Value) -> Result<(), ScriptError>;
}

/// Host that rejects every request.
pub struct NullHost;

impl Host for NullHost {
    fn call_api(&self, method: &str, _args: Vec<Value>) -> Result<Value, ScriptError> {
        Err(ScriptError::Host(format!("api.{} is not available", method)))
    }

    fn set_state(&self, node: &str, _patch: Value) -> Result<(), ScriptError> {
        Err(ScriptError::Host(format!("setState('{}') is not available", node)))
    }
}

/// Executes a parsed scriptlet.
///
/// Expression scripts yield their value; statement scripts yield the value
/// of the first executed `return`, or `undefined`.
pub fn run(script: &Script, bindings: &dyn Bindings, host: &dyn Host) -> Result<Value, ScriptError> {
    let mut interp = Interpreter {
        bindings,
        host,
        scopes: Vec::new(),
        depth: 0,
    };
    match script {
        Script::Expr(expr) => interp.eval(expr),
        Script::Block(stmts) => match interp.exec_block(stmts)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Undefined),
        },
    }
}

enum Flow {
    Normal,
    Return(Value),
}

struct Interpreter<'a> {
    bindings: &'a dyn Bindings,
    host: &'a dyn Host,
    scopes: Vec<BTreeMap<String, Value>>,
    depth: usize,
}

impl Interpreter<'_> {
    fn lookup(&self, name: &str) -> Value {
        for scope in self.scopes.iter().rev() {
            if let Some(value) = scope.get(name) {
                return value.clone();
            }
        }
        self.bindings
            .resolve(name)
            .or_else(|| global(name))
            .unwrap_or(Value::Undefined)
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Flow, ScriptError> {
        self.scopes.push(BTreeMap::new());
        let result = self.exec_all(stmts);
        self.scopes.pop();
        result
    }

    fn exec_all(&mut self, stmts: &[Stmt]) -> Result<Flow, ScriptError> {
        for stmt in stmts {
            if let Flow::Return(value) = self.exec(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Flow, ScriptError> {
        match stmt {
            Stmt::Let { name, init } => {
                let value = match init {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Undefined,
                };
                if self.scopes.is_empty() {
                    self.scopes.push(BTreeMap::new());
                }
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(name.name.clone(), value);
                }
                Ok(Flow::Normal)
            }
            Stmt::Expr(expr) => {
                self.eval(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::If { test, then, otherwise } => {
                if self.eval(test)?.truthy() {
                    self.exec(then)
                } else if let Some(otherwise) = otherwise {
                    self.exec(otherwise)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Block(stmts) => self.exec_block(stmts),
            Stmt::Empty => Ok(Flow::Normal),
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, ScriptError> {
        match expr {
            Expr::Literal(lit) => Ok(match lit {
                Literal::Number(n) => Value::Number(*n),
                Literal::Str(s) => Value::String(s.clone()),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Null => Value::Null,
                Literal::Undefined => Value::Undefined,
            }),
            Expr::Ident(id) => Ok(self.lookup(&id.name)),
            Expr::Array(items) => Ok(Value::Array(
                items.iter().map(|e| self.eval(e)).collect::<Result<_, _>>()?,
            )),
            Expr::Object(props) => {
                let mut map = BTreeMap::new();
                for prop in props {
                    let value = self.eval(&prop.value)?;
                    map.insert(prop.key.as_str().to_string(), value);
                }
                Ok(Value::Object(map))
            }
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let object = self.eval(object)?;
                if *optional && object.is_nullish() {
                    return Ok(Value::Undefined);
                }
                get_member(&object, &property.name)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object)?;
                let key = match self.eval(index)? {
                    Value::Number(n) => format_number(n),
                    other => other.to_js_string(),
                };
                get_member(&object, &key)
            }
            Expr::Call { callee, args } => {
                let callee = self.eval(callee)?;
                let args = args.iter().map(|e| self.eval(e)).collect::<Result<Vec<_>, _>>()?;
                self.call(&callee, args)
            }
            Expr::Unary { op, expr } => {
                let value = self.eval(expr)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Pos => Value::Number(value.to_number()),
                    UnaryOp::TypeOf => Value::String(value.type_of().to_string()),
                })
            }
            Expr::Binary { op, lhs, rhs } => {
                let left = self.eval(lhs)?;
                match op {
                    BinaryOp::And if !left.truthy() => Ok(left),
                    BinaryOp::Or if left.truthy() => Ok(left),
                    BinaryOp::Nullish if !left.is_nullish() => Ok(left),
                    BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish => self.eval(rhs),
                    _ => {
                        let right = self.eval(rhs)?;
                        Ok(binary(*op, &left, &right))
                    }
                }
            }
            Expr::Conditional {
                test,
                then,
                otherwise,
            } => {
                if self.eval(test)?.truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Assign { target, op, value } => {
                let value = self.eval(value)?;
                let scope = self
                    .scopes
                    .iter_mut()
                    .rev()
                    .find(|scope| scope.contains_key(&target.name))
                    .ok_or_else(|| {
                        ScriptError::Reference(format!("{} is not a local variable", target.name))
                    })?;
                let current = scope.get(&target.name).cloned().unwrap_or_default();
                let next = match op {
                    AssignOp::Set => value,
                    AssignOp::Add => binary(BinaryOp::Add, &current, &value),
                    AssignOp::Sub => binary(BinaryOp::Sub, &current, &value),
                };
                scope.insert(target.name.clone(), next.clone());
                Ok(next)
            }
            Expr::Arrow(arrow) => {
                let mut captured = BTreeMap::new();
                for scope in &self.scopes {
                    for (name, value) in scope {
                        captured.insert(name.clone(), value.clone());
                    }
                }
                Ok(Value::Function(Callable::Arrow(Arc::new(Closure {
                    arrow: Arc::clone(arrow),
                    captured,
                }))))
            }
        }
    }

    fn call(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, ScriptError> {
        let callable = match callee {
            Value::Function(callable) => callable,
            other => {
                return Err(ScriptError::Type(format!(
                    "{} is not a function",
                    other.type_of()
                )))
            }
        };

        match callable {
            Callable::Arrow(closure) => self.call_arrow(closure, args),
            Callable::Builtin(name) => call_builtin(name, args),
            Callable::Method(receiver, name) => self.call_method(receiver, name, args),
            Callable::Api(method) => self.host.call_api(method, args),
            Callable::SetState => {
                let mut args = args.into_iter();
                let node = match args.next() {
                    Some(Value::String(node)) => node,
                    _ => return Err(ScriptError::Type("setState expects a node id".to_string())),
                };
                let patch = args.next().unwrap_or_default();
                self.host.set_state(&node, patch)?;
                Ok(Value::Undefined)
            }
        }
    }

    fn call_arrow(&mut self, closure: &Closure, args: Vec<Value>) -> Result<Value, ScriptError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(ScriptError::Evaluation(format!(
                "Maximum call depth of {} exceeded",
                MAX_CALL_DEPTH
            )));
        }

        let mut params = BTreeMap::new();
        let mut args = args.into_iter();
        for param in &closure.arrow.params {
            params.insert(param.name.clone(), args.next().unwrap_or_default());
        }

        let saved = std::mem::replace(&mut self.scopes, vec![closure.captured.clone(), params]);
        self.depth += 1;
        let result = match &closure.arrow.body {
            ArrowBody::Expr(expr) => self.eval(expr),
            ArrowBody::Block(stmts) => self.exec_all(stmts).map(|flow| match flow {
                Flow::Return(value) => value,
                Flow::Normal => Value::Undefined,
            }),
        };
        self.depth -= 1;
        self.scopes = saved;
        result
    }

    fn call_method(&mut self, receiver: &Value, name: &str, args: Vec<Value>) -> Result<Value, ScriptError> {
        match receiver {
            Value::Array(items) => self.call_array_method(items, name, args),
            Value::String(s) => call_string_method(s, name, &args),
            other => Err(ScriptError::Type(format!(
                "{}.{} is not a function",
                other.type_of(),
                name
            ))),
        }
    }

    fn call_array_method(&mut self, items: &[Value], name: &str, args: Vec<Value>) -> Result<Value, ScriptError> {
        let mut args = args.into_iter();
        let first = args.next().unwrap_or_default();

        match name {
            "map" => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(self.call(&first, vec![item.clone(), Value::Number(i as f64)])?);
                }
                Ok(Value::Array(out))
            }
            "filter" => {
                let mut out = Vec::new();
                for (i, item) in items.iter().enumerate() {
                    if self.call(&first, vec![item.clone(), Value::Number(i as f64)])?.truthy() {
                        out.push(item.clone());
                    }
                }
                Ok(Value::Array(out))
            }
            "find" | "findIndex" | "some" | "every" => {
                for (i, item) in items.iter().enumerate() {
                    let hit = self.call(&first, vec![item.clone(), Value::Number(i as f64)])?.truthy();
                    match (name, hit) {
                        ("find", true) => return Ok(item.clone()),
                        ("findIndex", true) => return Ok(Value::Number(i as f64)),
                        ("some", true) => return Ok(Value::Bool(true)),
                        ("every", false) => return Ok(Value::Bool(false)),
                        _ => {}
                    }
                }
                Ok(match name {
                    "find" => Value::Undefined,
                    "findIndex" => Value::Number(-1.0),
                    "some" => Value::Bool(false),
                    _ => Value::Bool(true),
                })
            }
            "reduce" => {
                let mut iter = items.iter().enumerate();
                let mut acc = match args.next() {
                    Some(init) => init,
                    None => match iter.next() {
                        Some((_, item)) => item.clone(),
                        None => {
                            return Err(ScriptError::Type(
                                "Reduce of empty array with no initial value".to_string(),
                            ))
                        }
                    },
                };
                for (i, item) in iter {
                    acc = self.call(&first, vec![acc, item.clone(), Value::Number(i as f64)])?;
                }
                Ok(acc)
            }
            "includes" => Ok(Value::Bool(items.iter().any(|v| v.strict_equals(&first)))),
            "indexOf" => Ok(Value::Number(
                items
                    .iter()
                    .position(|v| v.strict_equals(&first))
                    .map(|i| i as f64)
                    .unwrap_or(-1.0),
            )),
            "join" => {
                let sep = match first {
                    Value::Undefined => ",".to_string(),
                    other => other.to_js_string(),
                };
                Ok(Value::String(
                    items
                        .iter()
                        .map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() })
                        .collect::<Vec<_>>()
                        .join(&sep),
                ))
            }
            "slice" => {
                let end = args.next();
                let (start, end) = slice_bounds(items.len(), Some(&first), end.as_ref());
                Ok(Value::Array(items[start..end].to_vec()))
            }
            "concat" => {
                let mut out = items.to_vec();
                for arg in std::iter::once(first).chain(args) {
                    match arg {
                        Value::Array(more) => out.extend(more),
                        other => out.push(other),
                    }
                }
                Ok(Value::Array(out))
            }
            _ => Err(ScriptError::Type(format!("array.{} is not a function", name))),
        }
    }
}

const ARRAY_METHODS: &[&str] = &[
    "map", "filter", "find", "findIndex", "some", "every", "reduce", "includes", "indexOf", "join",
    "slice", "concat",
];

const STRING_METHODS: &[&str] = &[
    "toUpperCase", "toLowerCase", "trim", "includes", "startsWith", "endsWith", "indexOf", "split",
    "slice",
];

fn global(name: &str) -> Option<Value> {
    Some(match name {
        "Math" => Value::Namespace(Namespace::Math),
        "JSON" => Value::Namespace(Namespace::Json),
        "Object" => Value::Namespace(Namespace::Object),
        "Array" => Value::Namespace(Namespace::Array),
        "api" => Value::Namespace(Namespace::Api),
        "String" => Value::Function(Callable::Builtin("String")),
        "Number" => Value::Function(Callable::Builtin("Number")),
        "Boolean" => Value::Function(Callable::Builtin("Boolean")),
        "NaN" => Value::Number(f64::NAN),
        "Infinity" => Value::Number(f64::INFINITY),
        _ => return None,
    })
}

fn get_member(object: &Value, key: &str) -> Result<Value, ScriptError> {
    match object {
        Value::Undefined | Value::Null => Err(ScriptError::Type(format!(
            "Cannot read properties of {} (reading '{}')",
            object.to_js_string(),
            key
        ))),
        Value::Object(map) => Ok(map.get(key).cloned().unwrap_or_default()),
        Value::Array(items) => Ok(if key == "length" {
            Value::Number(items.len() as f64)
        } else if let Ok(i) = key.parse::<usize>() {
            items.get(i).cloned().unwrap_or_default()
        } else if ARRAY_METHODS.contains(&key) {
            Value::Function(Callable::Method(Box::new(object.clone()), key.to_string()))
        } else {
            Value::Undefined
        }),
        Value::String(s) => Ok(if key == "length" {
            Value::Number(s.chars().count() as f64)
        } else if let Ok(i) = key.parse::<usize>() {
            s.chars()
                .nth(i)
                .map(|c| Value::String(c.to_string()))
                .unwrap_or_default()
        } else if STRING_METHODS.contains(&key) {
            Value::Function(Callable::Method(Box::new(object.clone()), key.to_string()))
        } else {
            Value::Undefined
        }),
        Value::Namespace(ns) => Ok(namespace_member(*ns, key)),
        _ => Ok(Value::Undefined),
    }
}

fn namespace_member(ns: Namespace, key: &str) -> Value {
    let builtin = match (ns, key) {
        (Namespace::Api, method) => return Value::Function(Callable::Api(method.to_string())),
        (Namespace::Math, "PI") => return Value::Number(std::f64::consts::PI),
        (Namespace::Math, "max") => "Math.max",
        (Namespace::Math, "min") => "Math.min",
        (Namespace::Math, "round") => "Math.round",
        (Namespace::Math, "floor") => "Math.floor",
        (Namespace::Math, "ceil") => "Math.ceil",
        (Namespace::Math, "abs") => "Math.abs",
        (Namespace::Json, "stringify") => "JSON.stringify",
        (Namespace::Json, "parse") => "JSON.parse",
        (Namespace::Object, "keys") => "Object.keys",
        (Namespace::Object, "values") => "Object.values",
        (Namespace::Array, "isArray") => "Array.isArray",
        _ => return Value::Undefined,
    };
    Value::Function(Callable::Builtin(builtin))
}

fn call_builtin(name: &str, args: Vec<Value>) -> Result<Value, ScriptError> {
    let first = args.first().cloned().unwrap_or_default();
    let number = |f: fn(f64) -> f64| -> Result<Value, ScriptError> { Ok(Value::Number(f(first.to_number()))) };

    match name {
        "Math.max" | "Math.min" => {
            let max = name == "Math.max";
            let mut acc = if max { f64::NEG_INFINITY } else { f64::INFINITY };
            for arg in &args {
                let n = arg.to_number();
                if n.is_nan() {
                    return Ok(Value::Number(f64::NAN));
                }
                acc = if max { acc.max(n) } else { acc.min(n) };
            }
            Ok(Value::Number(acc))
        }
        "Math.round" => number(|n| (n + 0.5).floor()),
        "Math.floor" => number(f64::floor),
        "Math.ceil" => number(f64::ceil),
        "Math.abs" => number(f64::abs),
        "String" => Ok(Value::String(if args.is_empty() {
            String::new()
        } else {
            first.to_js_string()
        })),
        "Number" => Ok(Value::Number(if args.is_empty() { 0.0 } else { first.to_number() })),
        "Boolean" => Ok(Value::Bool(first.truthy())),
        "JSON.stringify" => {
            if first.is_absent() {
                return Ok(Value::Undefined);
            }
            serde_json::to_string(&first.to_json())
                .map(Value::String)
                .map_err(|e| ScriptError::Evaluation(format!("JSON.stringify: {}", e)))
        }
        "JSON.parse" => serde_json::from_str::<serde_json::Value>(&first.to_js_string())
            .map(|json| Value::from_json(&json))
            .map_err(|e| ScriptError::Evaluation(format!("JSON.parse: {}", e))),
        "Object.keys" | "Object.values" => {
            let keys = name == "Object.keys";
            Ok(Value::Array(match &first {
                Value::Object(map) => {
                    if keys {
                        map.keys().map(|k| Value::String(k.clone())).collect()
                    } else {
                        map.values().cloned().collect()
                    }
                }
                Value::Array(items) => {
                    if keys {
                        (0..items.len()).map(|i| Value::String(i.to_string())).collect()
                    } else {
                        items.clone()
                    }
                }
                _ => Vec::new(),
            }))
        }
        "Array.isArray" => Ok(Value::Bool(matches!(first, Value::Array(_)))),
        _ => Err(ScriptError::Type(format!("{} is not a function", name))),
    }
}

fn call_string_method(s: &str, name: &str, args: &[Value]) -> Result<Value, ScriptError> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or_default();

    Ok(match name {
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::String(s.trim().to_string()),
        "includes" => Value::Bool(s.contains(arg(0).to_js_string().as_str())),
        "startsWith" => Value::Bool(s.starts_with(arg(0).to_js_string().as_str())),
        "endsWith" => Value::Bool(s.ends_with(arg(0).to_js_string().as_str())),
        "indexOf" => {
            let needle = arg(0).to_js_string();
            Value::Number(
                s.find(needle.as_str())
                    .map(|byte| s[..byte].chars().count() as f64)
                    .unwrap_or(-1.0),
            )
        }
        "split" => match arg(0) {
            Value::Undefined => Value::Array(vec![Value::String(s.to_string())]),
            sep => {
                let sep = sep.to_js_string();
                if sep.is_empty() {
                    Value::Array(s.chars().map(|c| Value::String(c.to_string())).collect())
                } else {
                    Value::Array(s.split(sep.as_str()).map(Value::from).collect())
                }
            }
        },
        "slice" => {
            let chars: Vec<char> = s.chars().collect();
            let (start, end) = slice_bounds(chars.len(), args.first(), args.get(1));
            Value::String(chars[start..end].iter().collect())
        }
        _ => return Err(ScriptError::Type(format!("string.{} is not a function", name))),
    })
}

/// Resolves `slice(start, end)` arguments, with negative offsets counted from the end.
fn slice_bounds(len: usize, start: Option<&Value>, end: Option<&Value>) -> (usize, usize) {
    let clamp = |value: Option<&Value>, default: usize| -> usize {
        match value {
            None | Some(Value::Undefined) => default,
            Some(v) => {
                let n = v.to_number();
                let n = if n.is_nan() { 0.0 } else { n.trunc() };
                if n < 0.0 {
                    (len as f64 + n).max(0.0) as usize
                } else {
                    (n as usize).min(len)
                }
            }
        }
    };
    let start = clamp(start, 0);
    let end = clamp(end, len);
    (start.min(end), end)
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            let stringy = |v: &Value| matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_));
            if stringy(left) || stringy(right) {
                Value::String(format!("{}{}", left.to_js_string(), right.to_js_string()))
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNe => Value::Bool(!left.strict_equals(right)),
        BinaryOp::Eq => Value::Bool(left.loose_equals(right)),
        BinaryOp::Ne => Value::Bool(!left.loose_equals(right)),
        BinaryOp::Lt => Value::Bool(compare(left, right) == Some(Ordering::Less)),
        BinaryOp::Gt => Value::Bool(compare(left, right) == Some(Ordering::Greater)),
        BinaryOp::Le => Value::Bool(matches!(compare(left, right), Some(Ordering::Less | Ordering::Equal))),
        BinaryOp::Ge => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        // Short-circuit operators are handled before operands are evaluated.
        BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish => Value::Undefined,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::parse_script;
    use serde_json::json;
    use std::cell::RefCell;

    fn eval_with(source: &str, bindings: &dyn Bindings) -> Result<Value, ScriptError> {
        let script = parse_script(source).unwrap();
        run(&script, bindings, &NullHost)
    }

    fn eval(source: &str) -> serde_json::Value {
        eval_with(source, &NoBindings).unwrap().to_json()
    }

    #[test]
    fn arithmetic_and_concatenation() {
        assert_eq!(eval("1 + 2 * 3"), json!(7));
        assert_eq!(eval("'a' + 1 + 2"), json!("a12"));
        assert_eq!(eval("(1 + 2) + 'a'"), json!("3a"));
        assert_eq!(eval("7 % 3"), json!(1));
        assert_eq!(eval("-'2'"), json!(-2));
    }

    #[test]
    fn logical_operators_return_operands() {
        assert_eq!(eval("0 || 'x'"), json!("x"));
        assert_eq!(eval("'a' && 'b'"), json!("b"));
        assert_eq!(eval("null ?? 5"), json!(5));
        assert_eq!(eval("0 ?? 5"), json!(0));
        assert_eq!(eval("1 > 0 ? 'yes' : 'no'"), json!("yes"));
    }

    #[test]
    fn member_access_on_bindings() {
        let mut scope = HashMap::new();
        scope.insert(
            "n1".to_string(),
            Value::from_json(&json!({ "props": { "items": [1, 2, 3] } })),
        );
        let value = eval_with("n1.props.items.map(x => x * 2).join('-')", &scope).unwrap();
        assert_eq!(value.to_js_string(), "2-4-6");

        let value = eval_with("n1.props['items'][1]", &scope).unwrap();
        assert_eq!(value.to_json(), json!(2));
    }

    #[test]
    fn unknown_names_are_undefined() {
        assert_eq!(eval("typeof nothing"), json!("undefined"));
        let err = eval_with("nothing.field", &NoBindings).unwrap_err();
        assert!(matches!(err, ScriptError::Type(_)));
        assert_eq!(eval("nothing?.field"), json!(null));
    }

    #[test]
    fn statements_and_closures() {
        let source = "let total = 0; const add = (a, b) => a + b; total = add(2, 3); total += 1; return total;";
        assert_eq!(eval(source), json!(6));

        let source = "let x = 10; if (x > 5) { return 'big'; } return 'small';";
        assert_eq!(eval(source), json!("big"));

        let source = "let base = 3; return [1, 2].map(v => { let y = v * base; return y; });";
        assert_eq!(eval(source), json!([3, 6]));
    }

    #[test]
    fn assignment_requires_a_local() {
        let err = eval_with("let a = 1; b = 2; return a", &NoBindings).unwrap_err();
        assert!(matches!(err, ScriptError::Reference(_)));
    }

    #[test]
    fn builtins() {
        assert_eq!(eval("Math.max(1, 5, 3)"), json!(5));
        assert_eq!(eval("Math.round(2.5)"), json!(3));
        assert_eq!(eval("JSON.stringify({ b: 1, a: [true, null] })"), json!(r#"{"a":[true,null],"b":1}"#));
        assert_eq!(eval("JSON.parse('[1,2]').length"), json!(2));
        assert_eq!(eval("Object.keys({ x: 1, y: 2 })"), json!(["x", "y"]));
        assert_eq!(eval("Array.isArray([])"), json!(true));
        assert_eq!(eval("String(12) + Number('3')"), json!("123"));
    }

    #[test]
    fn string_and_array_methods() {
        assert_eq!(eval("'Hello'.toUpperCase()"), json!("HELLO"));
        assert_eq!(eval("'a,b,c'.split(',').length"), json!(3));
        assert_eq!(eval("'frame'.slice(-3)"), json!("ame"));
        assert_eq!(eval("[1, 2, 3, 4].filter(x => x % 2 === 0)"), json!([2, 4]));
        assert_eq!(eval("[1, 2, 3].reduce((a, b) => a + b, 0)"), json!(6));
        assert_eq!(eval("[1, 2].concat([3], 4)"), json!([1, 2, 3, 4]));
        assert_eq!(eval("[3, 4].indexOf(4)"), json!(1));
    }

    #[test]
    fn runaway_recursion_is_bounded() {
        let source = "let g = x => x(x); return g(g);";
        let err = eval_with(source, &NoBindings).unwrap_err();
        assert!(matches!(err, ScriptError::Evaluation(_)));
    }

    struct RecordingHost {
        patches: RefCell<Vec<(String, serde_json::Value)>>,
    }

    impl Host for RecordingHost {
        fn call_api(&self, method: &str, args: Vec<Value>) -> Result<Value, ScriptError> {
            Ok(Value::String(format!("{}:{}", method, args.len())))
        }

        fn set_state(&self, node: &str, patch: Value) -> Result<(), ScriptError> {
            self.patches.borrow_mut().push((node.to_string(), patch.to_json()));
            Ok(())
        }
    }

    #[test]
    fn host_capabilities() {
        let host = RecordingHost {
            patches: RefCell::new(Vec::new()),
        };
        let mut scope = HashMap::new();
        scope.insert("setState".to_string(), Value::Function(Callable::SetState));

        let script = parse_script("setState('n1', { text: api.greet(1, 2) })").unwrap();
        run(&script, &scope, &host).unwrap();
        assert_eq!(
            host.patches.borrow().as_slice(),
            &[("n1".to_string(), json!({ "text": "greet:2" }))]
        );
    }
}
