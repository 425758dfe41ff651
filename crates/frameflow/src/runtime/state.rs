// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Resolved state and the per-pass result store.

use crate::script::{DepPath, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// JSON object of resolved values keyed by name.
pub type ValueMap = serde_json::Map<String, serde_json::Value>;

/// External context: named data sources visible to scriptlets.
pub type Context = BTreeMap<String, serde_json::Value>;

/// Resolved values of one node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeState {
    /// Resolved props.
    pub props: ValueMap,
    /// Resolved styles.
    pub styles: ValueMap,
    /// Resolved actions (handles or constants).
    pub actions: ValueMap,
}

impl NodeState {
    /// The bucket with the given name.
    pub fn bucket(&self, name: &str) -> Option<&ValueMap> {
        match name {
            "props" => Some(&self.props),
            "styles" => Some(&self.styles),
            "actions" => Some(&self.actions),
            _ => None,
        }
    }

    /// Merges another entry key by key; keys of `other` win.
    pub fn merge(&mut self, other: &NodeState) {
        for (k, v) in &other.props {
            self.props.insert(k.clone(), v.clone());
        }
        for (k, v) in &other.styles {
            self.styles.insert(k.clone(), v.clone());
        }
        for (k, v) in &other.actions {
            self.actions.insert(k.clone(), v.clone());
        }
    }

    /// The entry as a JSON object `{props, styles, actions}`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "props": self.props,
            "styles": self.styles,
            "actions": self.actions,
        })
    }

    /// The entry as a scriptlet value.
    pub fn to_value(&self) -> Value {
        Value::from_json(&self.to_json())
    }

    /// Follows `segments` (`props`, `value`, `0`, ...) into the entry.
    pub fn lookup(&self, segments: &[String]) -> Option<serde_json::Value> {
        let (bucket, rest) = match segments.split_first() {
            Some((first, rest)) => (self.bucket(first)?, rest),
            None => return Some(self.to_json()),
        };
        let (key, rest) = match rest.split_first() {
            Some(split) => split,
            None => return Some(serde_json::Value::Object(bucket.clone())),
        };
        let mut current = bucket.get(key)?;
        for segment in rest {
            current = match current {
                serde_json::Value::Object(map) => map.get(segment)?,
                serde_json::Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }
}

/// Resolved state of a tree, keyed by node id.
pub type StateMap = BTreeMap<String, NodeState>;

/// Category of a per-node failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// A scriptlet did not parse.
    Parse,
    /// Same-bucket keys depend on each other in a cycle.
    Cycle,
    /// A prop or style scriptlet failed while running.
    Runtime,
    /// An action failed while running.
    Action,
    /// A structural loss (dangling parent, missing template).
    Structure,
}

/// A per-node failure recorded during a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The node the failure belongs to.
    pub node: String,
    /// `bucket.key` of the failing scriptlet, or the bucket for cycles.
    pub key: String,
    /// Category.
    pub kind: DiagnosticKind,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {} {}: {}", self.kind, self.node, self.key, self.message)
    }
}

/// Instrumentation counters of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PassStats {
    /// Scriptlet closures invoked (constants included).
    pub invocations: usize,
    /// Nodes whose entries were computed.
    pub evaluated: usize,
    /// Nodes whose entries were copied from the previous pass.
    pub skipped: usize,
}

/// Output of one pass, also the input `prev` of the next one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResultStore {
    /// Resolved entries of this pass.
    pub state: StateMap,
    /// Mirrored entries that had no visited target when produced.
    pub new_state: StateMap,
    /// Resolved entries of the previous pass.
    #[serde(skip)]
    pub prev_state: StateMap,
    /// Active slide per slides control.
    pub slides: BTreeMap<String, String>,
    /// Externally forced slide selections, carried between passes.
    pub forced_slides: BTreeMap<String, String>,
    /// Per-node failures.
    pub diagnostics: Vec<Diagnostic>,
    /// The context this pass saw, compared by the next pass.
    pub context: Context,
    /// Id counter start of each materialized list item, per list node.
    pub lists: BTreeMap<String, Vec<u64>>,
    /// Source fingerprint of every node entry, compared by the next pass.
    #[serde(skip)]
    pub fingerprints: BTreeMap<String, u64>,
    /// Diagnostics each node's own resolution recorded, replayed when the
    /// next pass skips the node.
    #[serde(skip)]
    pub node_diagnostics: BTreeMap<String, Vec<Diagnostic>>,
    /// Next free value of the id counter.
    pub next_id: u64,
    /// Instrumentation counters.
    pub stats: PassStats,
}

impl ResultStore {
    /// An empty store whose id counter starts at `next_id`.
    pub fn seeded(next_id: u64) -> Self {
        Self {
            next_id,
            ..Default::default()
        }
    }

    /// Forces the active slide of a slides control for subsequent passes.
    pub fn force_slide(&mut self, slides: impl Into<String>, slide: impl Into<String>) {
        self.forced_slides.insert(slides.into(), slide.into());
    }

    /// Removes a forced selection.
    pub fn release_slide(&mut self, slides: &str) {
        self.forced_slides.remove(slides);
    }

    /// The resolved entry of a node.
    pub fn node(&self, id: &str) -> Option<&NodeState> {
        self.state.get(id)
    }

    /// A resolved prop value.
    pub fn prop(&self, id: &str, key: &str) -> Option<&serde_json::Value> {
        self.state.get(id).and_then(|entry| entry.props.get(key))
    }

    /// Resolves a dependency chain against this store's state, falling back
    /// to its context for roots that are not node ids. Unknown roots are `None`.
    pub fn resolve_path(&self, path: &DepPath) -> Option<serde_json::Value> {
        let (root, rest) = path.split_first()?;
        if let Some(entry) = self.state.get(root) {
            return entry.lookup(rest);
        }
        let mut current = self.context.get(root)?;
        for segment in rest {
            current = match current {
                serde_json::Value::Object(map) => map.get(segment)?,
                serde_json::Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }

    /// The resolved state as a JSON object.
    pub fn state_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.state).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry() -> NodeState {
        serde_json::from_value(json!({
            "props": { "value": [{ "name": "a" }, { "name": "b" }], "text": "hi" }
        }))
        .unwrap()
    }

    fn path(s: &str) -> DepPath {
        s.split('.').map(String::from).collect()
    }

    #[test]
    fn lookup_follows_segments() {
        let entry = entry();
        assert_eq!(entry.lookup(&path("props.text")[..]), Some(json!("hi")));
        assert_eq!(entry.lookup(&path("props.value.1.name")[..]), Some(json!("b")));
        assert_eq!(entry.lookup(&path("props.missing")[..]), None);
        assert_eq!(entry.lookup(&path("styles")[..]), Some(json!({})));
    }

    #[test]
    fn resolve_path_prefers_node_ids_over_context() {
        let mut store = ResultStore::default();
        store.state.insert("n1".into(), entry());
        store.context.insert("user".into(), json!({ "name": "ada" }));
        store.context.insert("n1".into(), json!({ "props": { "text": "ctx" } }));

        assert_eq!(store.resolve_path(&path("n1.props.text")), Some(json!("hi")));
        assert_eq!(store.resolve_path(&path("user.name")), Some(json!("ada")));
        assert_eq!(store.resolve_path(&path("Math")), None);
    }

    #[test]
    fn merge_overrides_per_key() {
        let mut target = entry();
        let mut mirror = NodeState::default();
        mirror.props.insert("text".into(), json!("mirrored"));
        mirror.styles.insert("color".into(), json!("red"));
        target.merge(&mirror);
        assert_eq!(target.props["text"], json!("mirrored"));
        assert!(target.props.contains_key("value"));
        assert_eq!(target.styles["color"], json!("red"));
    }
}
