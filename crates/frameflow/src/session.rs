// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Evaluation sessions.
//!
//! A [`Session`] owns one tree instance: the compiled tree of a schema and
//! the result of its last pass, which the next pass uses as `prev`. Passes,
//! rebuilds and action dispatches on one session are serialized by a mutex;
//! separate sessions share nothing but the store.
//!
//! # Example
//!
//! ```rust
//! use frameflow::{Context, MemoryNodeStore, Node, NodeKind, NodeTable, NoApi, Session};
//! use std::sync::Arc;
//!
//! let store = MemoryNodeStore::new();
//! store.insert(NodeTable::new(
//!     "main",
//!     vec![
//!         Node::new("main", "", NodeKind::Group),
//!         Node::new("n1", "main", NodeKind::Text).with_prop("text", "'hello'"),
//!     ],
//! ));
//!
//! let session = Session::open(Arc::new(store), "main")?;
//! let result = session.evaluate(&Context::new(), &NoApi)?;
//! assert_eq!(result.prop("n1", "text"), Some(&serde_json::json!("hello")));
//! # Ok::<(), frameflow::FrameError>(())
//! ```

use crate::compiler::{Compiler, ExecutableNode};
use crate::error::Result;
use crate::runtime::{
    invoke_action, ActionCall, ActionOutcome, Api, Context, Diagnostic, DiagnosticKind, EvalOptions,
    Evaluator, ResultStore,
};
use crate::store::NodeStore;
use crate::tree::TreeBuilder;
use std::sync::{Arc, Mutex, MutexGuard};

struct SessionState {
    tree: ExecutableNode,
    last: ResultStore,
}

/// One tree instance with its pass history.
pub struct Session {
    store: Arc<dyn NodeStore>,
    compiler: Compiler,
    schema: String,
    options: EvalOptions,
    state: Mutex<SessionState>,
}

impl Session {
    /// Builds and compiles `schema` from `store` with default settings.
    pub fn open(store: Arc<dyn NodeStore>, schema: impl Into<String>) -> Result<Self> {
        Self::with_options(store, schema, Compiler::new(), EvalOptions::default())
    }

    /// Builds and compiles `schema` with a custom compiler and options.
    pub fn with_options(
        store: Arc<dyn NodeStore>,
        schema: impl Into<String>,
        compiler: Compiler,
        options: EvalOptions,
    ) -> Result<Self> {
        let schema = schema.into();
        let built = TreeBuilder::new(store.as_ref(), compiler.engine()).build(&schema)?;
        let tree = compiler.compile(&built);
        tracing::debug!("Opened session for '{}'", schema);
        Ok(Self {
            store,
            compiler,
            schema,
            options,
            state: Mutex::new(SessionState {
                tree,
                last: ResultStore::default(),
            }),
        })
    }

    /// The schema this session evaluates.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Runs one pass against the previous one.
    pub fn evaluate(&self, context: &Context, api: &dyn Api) -> Result<ResultStore> {
        let mut guard = self.lock();
        let SessionState { tree, last } = &mut *guard;
        let result = Evaluator::new(&self.compiler, api)
            .with_store(self.store.as_ref())
            .with_options(&self.options)
            .evaluate(tree, last, context)?;
        *last = result.clone();
        Ok(result)
    }

    /// Rebuilds the tree from the store, keeping the last pass as `prev`.
    pub fn rebuild(&self) -> Result<()> {
        let built = TreeBuilder::new(self.store.as_ref(), self.compiler.engine()).build(&self.schema)?;
        let tree = self.compiler.compile(&built);

        let mut guard = self.lock();
        guard.tree = tree;
        tracing::debug!("Rebuilt session for '{}'", self.schema);
        Ok(())
    }

    /// Invokes an action against the last pass.
    ///
    /// A failing action is recorded as a diagnostic of the last pass and
    /// returned as an error. When the action persisted a patch the tree is
    /// rebuilt, so the next pass sees the new rows.
    pub fn dispatch(&self, call: ActionCall<'_>, api: &dyn Api) -> Result<ActionOutcome> {
        let outcome = {
            let mut guard = self.lock();
            let node = call.node.to_string();
            let action = call.action.to_string();
            let outcome = invoke_action(&guard.tree, &guard.last, call, api, Some(self.store.as_ref()));
            if let Err(e) = &outcome {
                guard.last.diagnostics.push(Diagnostic {
                    node,
                    key: format!("actions.{}", action),
                    kind: DiagnosticKind::Action,
                    message: e.to_string(),
                });
            }
            outcome?
        };

        if outcome.persisted {
            self.rebuild()?;
        }
        Ok(outcome)
    }

    /// Forces the active slide of a slides control from the next pass on.
    pub fn force_slide(&self, slides: &str, slide: &str) {
        self.lock().last.force_slide(slides, slide);
    }

    /// Returns a slides control to value-based selection.
    pub fn release_slide(&self, slides: &str) {
        self.lock().last.release_slide(slides);
    }

    /// The result of the last pass.
    pub fn last(&self) -> ResultStore {
        self.lock().last.clone()
    }

    /// Runs `f` with the current executable tree.
    pub fn with_tree<R>(&self, f: impl FnOnce(&ExecutableNode) -> R) -> R {
        f(&self.lock().tree)
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeKind, NodeTable};
    use crate::runtime::NoApi;
    use crate::store::MemoryNodeStore;
    use serde_json::json;

    fn store() -> MemoryNodeStore {
        let store = MemoryNodeStore::new();
        store.insert(NodeTable::new(
            "main",
            vec![
                Node::new("main", "", NodeKind::Group),
                Node::new("counter", "main", NodeKind::Text).with_prop("count", "0"),
                Node::new("inc", "main", NodeKind::Button)
                    .with_rank(1)
                    .with_action("click", "setState('counter', { count: counter.props.count + 1 })"),
                Node::new("label", "main", NodeKind::Text)
                    .with_rank(2)
                    .with_prop("text", "'Count: ' + counter.props.count"),
            ],
        ));
        store
    }

    #[test]
    fn dispatch_persists_and_rebuilds() {
        let store = store();
        let session = Session::open(Arc::new(store.clone()), "main").unwrap();
        let first = session.evaluate(&Context::new(), &NoApi).unwrap();
        assert_eq!(first.prop("label", "text"), Some(&json!("Count: 0")));

        let outcome = session.dispatch(ActionCall::new("inc", "click"), &NoApi).unwrap();
        assert!(outcome.persisted);
        assert_eq!(store.get("main").unwrap().row("counter").unwrap().props["count"], "1");

        let second = session.evaluate(&Context::new(), &NoApi).unwrap();
        assert_eq!(second.prop("counter", "count"), Some(&json!(1)));
        assert_eq!(second.prop("label", "text"), Some(&json!("Count: 1")));
    }

    #[test]
    fn failed_dispatch_is_a_diagnostic() {
        let session = Session::open(Arc::new(store()), "main").unwrap();
        session.evaluate(&Context::new(), &NoApi).unwrap();
        assert!(session.dispatch(ActionCall::new("inc", "missing"), &NoApi).is_err());
        let last = session.last();
        assert_eq!(last.diagnostics.len(), 1);
        assert_eq!(last.diagnostics[0].kind, DiagnosticKind::Action);
    }

    #[test]
    fn opening_a_missing_schema_fails() {
        let result = Session::open(Arc::new(MemoryNodeStore::new()), "nope");
        assert!(matches!(result, Err(crate::error::FrameError::SchemaNotFound(_))));
    }
}
