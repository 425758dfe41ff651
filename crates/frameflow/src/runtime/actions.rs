// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Action invocation and the host capabilities scriptlets call into.
//!
//! Props and styles only ever see the [`Api`] handle. Action bodies also get
//! `setState(node, patch)`, which writes the patch into the node's row as
//! literal scriptlets and saves the table through the [`NodeStore`].

use crate::compiler::ExecutableNode;
use crate::error::{FrameError, Result};
use crate::node::{literal_scriptlet, RowRef};
use crate::runtime::scope::{ActionArgs, NodeScope};
use crate::runtime::state::ResultStore;
use crate::script::{Host, ScriptError, Value};
use crate::store::NodeStore;
use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};

/// Host functionality reachable from scriptlets as `api.<method>(...)`.
pub trait Api: Send + Sync {
    /// Calls a host method.
    fn call(&self, method: &str, args: Vec<Value>) -> std::result::Result<Value, ScriptError>;
}

impl<F> Api for F
where
    F: Fn(&str, Vec<Value>) -> std::result::Result<Value, ScriptError> + Send + Sync,
{
    fn call(&self, method: &str, args: Vec<Value>) -> std::result::Result<Value, ScriptError> {
        self(method, args)
    }
}

/// An [`Api`] without methods.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoApi;

impl Api for NoApi {
    fn call(&self, method: &str, _args: Vec<Value>) -> std::result::Result<Value, ScriptError> {
        Err(ScriptError::Host(format!("api.{} is not available", method)))
    }
}

/// Host for props and styles: `api` only.
pub(crate) struct ValueHost<'a> {
    pub api: &'a dyn Api,
}

impl Host for ValueHost<'_> {
    fn call_api(&self, method: &str, args: Vec<Value>) -> std::result::Result<Value, ScriptError> {
        self.api.call(method, args)
    }

    fn set_state(&self, node: &str, _patch: Value) -> std::result::Result<(), ScriptError> {
        Err(ScriptError::Host(format!(
            "setState('{}') is only available in actions",
            node
        )))
    }
}

/// Host for action bodies: `api` plus persisting `setState`.
pub(crate) struct ActionHost<'a> {
    pub api: &'a dyn Api,
    pub store: Option<&'a dyn NodeStore>,
    /// Persisted row of every node id of the tree.
    pub schemas: &'a BTreeMap<String, RowRef>,
    pub persisted: Cell<bool>,
}

impl Host for ActionHost<'_> {
    fn call_api(&self, method: &str, args: Vec<Value>) -> std::result::Result<Value, ScriptError> {
        self.api.call(method, args)
    }

    fn set_state(&self, node: &str, patch: Value) -> std::result::Result<(), ScriptError> {
        let store = self
            .store
            .ok_or_else(|| ScriptError::Host("no node store attached".to_string()))?;
        let target = self
            .schemas
            .get(node)
            .ok_or_else(|| ScriptError::Host(format!("unknown node '{}'", node)))?;
        let schema = &target.schema_id;
        let patch = match patch {
            Value::Object(map) => map,
            other => {
                return Err(ScriptError::Type(format!(
                    "setState patch must be an object, got {}",
                    other.type_of()
                )))
            }
        };

        let mut table = store
            .load_node_table(schema)
            .map_err(|e| ScriptError::Host(e.to_string()))?;
        let row = table.row_mut(&target.id).ok_or_else(|| {
            ScriptError::Host(format!("node '{}' has no row '{}' in schema '{}'", node, target.id, schema))
        })?;
        for (key, value) in patch {
            if value.is_absent() {
                row.props.remove(&key);
            } else {
                row.props.insert(key, literal_scriptlet(&value.to_json()));
            }
        }
        store
            .save_node_table(schema, &table)
            .map_err(|e| ScriptError::Host(e.to_string()))?;

        tracing::debug!("setState persisted '{}' as '{}.{}'", node, schema, target.id);
        self.persisted.set(true);
        Ok(())
    }
}

/// Persisted row of every node of a tree, materialized list items included.
pub(crate) fn schema_index(root: &ExecutableNode) -> BTreeMap<String, RowRef> {
    fn walk(node: &ExecutableNode, out: &mut BTreeMap<String, RowRef>) {
        out.insert(node.node.id.clone(), RowRef::of(&node.node));
        for child in &node.children {
            walk(child, out);
        }
    }
    let mut out = BTreeMap::new();
    walk(root, &mut out);
    out
}

/// Identifies an action invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCall<'a> {
    /// Node owning the action.
    pub node: &'a str,
    /// Action key.
    pub action: &'a str,
    /// The triggering event, bound as `event`.
    pub event: serde_json::Value,
    /// The value argument, bound as `value`.
    pub value: serde_json::Value,
}

impl<'a> ActionCall<'a> {
    /// An invocation without event or value.
    pub fn new(node: &'a str, action: &'a str) -> Self {
        Self {
            node,
            action,
            event: serde_json::Value::Null,
            value: serde_json::Value::Null,
        }
    }
}

/// What an invoked action produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    /// The value the action body returned.
    pub result: serde_json::Value,
    /// True when the action persisted a patch through `setState`.
    pub persisted: bool,
}

/// Runs an action of a node against the state of a finished pass.
///
/// The body sees `event`, `value`, `state` (the whole resolved tree),
/// `setState` and `api`. Script failures are returned as
/// [`FrameError::RuntimeError`].
pub fn invoke_action(
    root: &ExecutableNode,
    result: &ResultStore,
    call: ActionCall<'_>,
    api: &dyn Api,
    store: Option<&dyn NodeStore>,
) -> Result<ActionOutcome> {
    let target = root
        .find(call.node)
        .ok_or_else(|| FrameError::RuntimeError(format!("unknown node '{}'", call.node)))?;
    let compiled = target.actions.scripts.get(call.action).ok_or_else(|| {
        FrameError::RuntimeError(format!("node '{}' has no action '{}'", call.node, call.action))
    })?;
    if let Some(error) = &compiled.error {
        return Err(FrameError::RuntimeError(format!(
            "{}.actions.{} does not parse: {}",
            call.node, call.action, error
        )));
    }

    let schemas = schema_index(root);
    let known: BTreeSet<String> = schemas.keys().cloned().collect();
    let entry = result.state.get(call.node).cloned().unwrap_or_default();
    let args = ActionArgs {
        event: Value::from_json(&call.event),
        value: Value::from_json(&call.value),
    };
    let scope = NodeScope {
        bucket: None,
        entry: &entry,
        action: Some(&args),
        state: &result.state,
        known: &known,
        context: &result.context,
    };
    let host = ActionHost {
        api,
        store,
        schemas: &schemas,
        persisted: Cell::new(false),
    };

    tracing::debug!("Invoking {}.actions.{}", call.node, call.action);
    let value = (compiled.run)(&scope, &host).map_err(|e| {
        tracing::warn!("Action {}.{} failed: {}", call.node, call.action, e);
        FrameError::RuntimeError(format!("{}.actions.{}: {}", call.node, call.action, e))
    })?;
    Ok(ActionOutcome {
        result: value.to_json(),
        persisted: host.persisted.get(),
    })
}
