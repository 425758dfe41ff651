// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The scriptlet language and the pluggable [`ScriptEngine`] seam.
//!
//! The tree compiler and linker never look inside a scriptlet themselves.
//! They ask a [`ScriptEngine`] to compile it into a closure, to list its
//! dependency chains, and to rename identifiers in it. [`ScriptletEngine`] is
//! the built-in implementation for the JavaScript-like scriptlet language.
//!
//! # Example
//!
//! ```rust
//! use frameflow::script::{NoBindings, NullHost, ScriptEngine, ScriptKind, ScriptletEngine};
//!
//! let engine = ScriptletEngine::new();
//! let compiled = engine.compile("[1, 2, 3].map(x => x * 2)", ScriptKind::Value);
//! let value = (compiled.run)(&NoBindings, &NullHost).unwrap();
//! assert_eq!(value.to_json(), serde_json::json!([2, 4, 6]));
//! ```

pub mod ast;
mod deps;
mod interp;
mod parser;
mod rename;
mod value;

pub use deps::{collect_dependencies, DepPath};
pub use interp::{run, Bindings, Host, NoBindings, NullHost, ScriptError, MAX_CALL_DEPTH};
pub use parser::parse_script;
pub use rename::rename_identifiers;
pub use value::{format_number, Callable, Closure, Namespace, Value};

use crate::cache::ScriptCache;
use crate::error::Result;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Value that a scriptlet resolves to when it cannot be parsed or run.
pub const ERROR_VALUE: &str = "error";

/// A compiled scriptlet closure.
pub type ScriptFn =
    Arc<dyn Fn(&dyn Bindings, &dyn Host) -> std::result::Result<Value, ScriptError> + Send + Sync>;

/// What a scriptlet is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// A prop or style: evaluated every pass, dependencies analyzed.
    Value,
    /// An action body: run on invocation with `event`, `value`, `state`,
    /// `setState` and `api` in scope.
    Action,
}

/// Result of compiling one scriptlet.
#[derive(Clone)]
pub struct CompiledScript {
    /// The closure. Constants and parse failures get a closure too.
    pub run: ScriptFn,
    /// True when the source passed the constancy test.
    pub constant: bool,
    /// Free access chains of value scriptlets.
    pub deps: Vec<DepPath>,
    /// Parse error message, if the source did not parse.
    pub error: Option<String>,
}

impl CompiledScript {
    /// A closure returning a fixed value.
    pub fn constant(value: Value) -> Self {
        Self {
            run: Arc::new(move |_: &dyn Bindings, _: &dyn Host| Ok(value.clone())),
            constant: true,
            deps: Vec::new(),
            error: None,
        }
    }

    /// A closure standing in for a scriptlet that failed to parse.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            run: Arc::new(|_: &dyn Bindings, _: &dyn Host| Ok(Value::String(ERROR_VALUE.to_string()))),
            constant: false,
            deps: Vec::new(),
            error: Some(message.into()),
        }
    }
}

impl fmt::Debug for CompiledScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledScript")
            .field("constant", &self.constant)
            .field("deps", &self.deps)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// The capability the compiler and linker use to handle scriptlet code.
pub trait ScriptEngine: Send + Sync {
    /// Compiles a scriptlet. Never fails: unparsable sources produce a
    /// [`CompiledScript`] whose `error` is set.
    fn compile(&self, source: &str, kind: ScriptKind) -> CompiledScript;

    /// Lists the free access chains of a value scriptlet; empty when the
    /// source is constant or does not parse.
    fn analyze_dependencies(&self, source: &str) -> Vec<DepPath>;

    /// Renames identifiers, member names and object keys.
    fn rename(&self, source: &str, renames: &HashMap<String, String>) -> Result<String>;
}

lazy_static! {
    static ref CONSTANT: Regex = Regex::new(
        r#"^(?:'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*"|-?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?|true|false|null)$"#
    )
    .expect("constant pattern is valid");
}

/// The constancy test: quoted string, number, boolean or `null` literal, a
/// JSON array/object literal, or an empty source.
pub fn is_constant(source: &str) -> bool {
    let trimmed = source.trim();
    trimmed.is_empty()
        || CONSTANT.is_match(trimmed)
        || ((trimmed.starts_with('[') || trimmed.starts_with('{'))
            && serde_json::from_str::<serde_json::Value>(trimmed).is_ok())
}

/// Evaluates a source that passed [`is_constant`]. Empty sources are `undefined`.
fn constant_value(source: &str) -> Value {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Value::Undefined;
    }
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return Value::from_json(&json);
    }
    parse_script(trimmed)
        .ok()
        .and_then(|script| run(&script, &NoBindings, &NullHost).ok())
        .unwrap_or_else(|| Value::String(ERROR_VALUE.to_string()))
}

/// Built-in [`ScriptEngine`] for the scriptlet language.
#[derive(Debug, Clone, Default)]
pub struct ScriptletEngine {
    cache: ScriptCache,
}

impl ScriptletEngine {
    /// Creates an engine with the default parse cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine whose parse cache holds `capacity` scripts.
    pub fn with_cache_size(capacity: usize) -> Self {
        Self {
            cache: ScriptCache::new(capacity),
        }
    }

    /// The parse cache.
    pub fn cache(&self) -> &ScriptCache {
        &self.cache
    }
}

impl ScriptEngine for ScriptletEngine {
    fn compile(&self, source: &str, kind: ScriptKind) -> CompiledScript {
        if is_constant(source) {
            return CompiledScript::constant(constant_value(source));
        }

        match self.cache.get_or_parse(source) {
            Ok(script) => {
                let deps = match kind {
                    ScriptKind::Value => collect_dependencies(&script),
                    ScriptKind::Action => Vec::new(),
                };
                let run: ScriptFn = Arc::new(move |bindings: &dyn Bindings, host: &dyn Host| {
                    interp::run(&script, bindings, host)
                });
                CompiledScript {
                    run,
                    constant: false,
                    deps,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!("Scriptlet does not parse: {}", e);
                CompiledScript::failed(e.to_string())
            }
        }
    }

    fn analyze_dependencies(&self, source: &str) -> Vec<DepPath> {
        if is_constant(source) {
            return Vec::new();
        }
        self.cache
            .get_or_parse(source)
            .map(|script| collect_dependencies(&script))
            .unwrap_or_default()
    }

    fn rename(&self, source: &str, renames: &HashMap<String, String>) -> Result<String> {
        if is_constant(source) {
            return Ok(source.to_string());
        }
        rename_identifiers(source, renames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn constancy_test() {
        for source in ["'hello'", "\"x\"", "42", "-1.5", "true", "null", "", "  ", "[1, 2]", "{\"a\": 1}"] {
            assert!(is_constant(source), "{source:?} should be constant");
        }
        for source in ["a", "'a' + 'b'", "[a, 1]", "{ a: 1 }", "1 + 1"] {
            assert!(!is_constant(source), "{source:?} should not be constant");
        }
    }

    #[test]
    fn constants_compile_without_dependencies() {
        let engine = ScriptletEngine::new();
        let compiled = engine.compile("'hello'", ScriptKind::Value);
        assert!(compiled.constant);
        assert!(compiled.deps.is_empty());
        let value = (compiled.run)(&NoBindings, &NullHost).unwrap();
        assert_eq!(value.to_json(), json!("hello"));
    }

    #[test]
    fn parse_failures_yield_error_value() {
        let engine = ScriptletEngine::new();
        let compiled = engine.compile("a + * b", ScriptKind::Value);
        assert!(compiled.error.is_some());
        assert!(compiled.deps.is_empty());
        let value = (compiled.run)(&NoBindings, &NullHost).unwrap();
        assert_eq!(value.to_json(), json!("error"));
        assert!(engine.analyze_dependencies("a + * b").is_empty());
    }

    #[test]
    fn value_scripts_report_dependencies() {
        let engine = ScriptletEngine::new();
        let compiled = engine.compile("n1.props.count * 2", ScriptKind::Value);
        assert_eq!(compiled.deps, vec![vec!["n1".to_string(), "props".into(), "count".into()]]);

        let action = engine.compile("setState('n1', { count: n1.props.count + 1 })", ScriptKind::Action);
        assert!(action.deps.is_empty());
    }

    #[test]
    fn constants_are_not_rewritten() {
        let engine = ScriptletEngine::new();
        let renames: HashMap<String, String> = [("n1".to_string(), "n2".to_string())].into_iter().collect();
        assert_eq!(engine.rename("'n1'", &renames).unwrap(), "'n1'");
        assert_eq!(engine.rename("n1.props.x", &renames).unwrap(), "n2.props.x");
    }
}
