// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Name resolution for scriptlets running against a node.

use crate::runtime::state::{Context, NodeState, StateMap, ValueMap};
use crate::script::{Bindings, Callable, Value};
use std::collections::BTreeSet;

/// The extra names an action body sees.
#[derive(Debug, Clone, Default)]
pub(crate) struct ActionArgs {
    pub event: Value,
    pub value: Value,
}

/// Free-name lookup for one scriptlet invocation.
///
/// Order: keys of the bucket being resolved, `self`, the action names, node
/// ids, context names. Anything else falls through to the builtins.
pub(crate) struct NodeScope<'a> {
    /// Bucket name and the keys resolved so far.
    pub bucket: Option<(&'a str, &'a ValueMap)>,
    /// The node's entry so far.
    pub entry: &'a NodeState,
    pub action: Option<&'a ActionArgs>,
    pub state: &'a StateMap,
    /// Node ids of the tree; ids without an entry read as empty entries.
    pub known: &'a BTreeSet<String>,
    pub context: &'a Context,
}

impl NodeScope<'_> {
    fn self_value(&self) -> Value {
        match self.bucket {
            Some((name, own)) => {
                let mut entry = self.entry.clone();
                match name {
                    "props" => entry.props = own.clone(),
                    "styles" => entry.styles = own.clone(),
                    _ => entry.actions = own.clone(),
                }
                entry.to_value()
            }
            None => self.entry.to_value(),
        }
    }

    fn state_value(&self) -> Value {
        let tree: serde_json::Map<String, serde_json::Value> = self
            .state
            .iter()
            .map(|(id, entry)| (id.clone(), entry.to_json()))
            .collect();
        Value::from_json(&serde_json::Value::Object(tree))
    }
}

impl Bindings for NodeScope<'_> {
    fn resolve(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bucket.and_then(|(_, own)| own.get(name)) {
            return Some(Value::from_json(value));
        }
        if name == "self" {
            return Some(self.self_value());
        }
        if let Some(args) = self.action {
            match name {
                "event" => return Some(args.event.clone()),
                "value" => return Some(args.value.clone()),
                "state" => return Some(self.state_value()),
                "setState" => return Some(Value::Function(Callable::SetState)),
                _ => {}
            }
        }
        if let Some(entry) = self.state.get(name) {
            return Some(entry.to_value());
        }
        if self.known.contains(name) {
            return Some(NodeState::default().to_value());
        }
        self.context.get(name).map(Value::from_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_order() {
        let mut state = StateMap::new();
        let mut other = NodeState::default();
        other.props.insert("x".into(), json!(1));
        state.insert("other".into(), other);
        let known: BTreeSet<String> = ["other", "later"].iter().map(|s| s.to_string()).collect();
        let mut context = Context::new();
        context.insert("user".into(), json!({ "name": "ada" }));
        context.insert("other".into(), json!("shadowed"));

        let mut own = ValueMap::new();
        own.insert("a".into(), json!(2));
        let entry = NodeState::default();
        let scope = NodeScope {
            bucket: Some(("props", &own)),
            entry: &entry,
            action: None,
            state: &state,
            known: &known,
            context: &context,
        };

        assert_eq!(scope.resolve("a").unwrap().to_json(), json!(2));
        assert_eq!(scope.resolve("self").unwrap().to_json()["props"], json!({ "a": 2 }));
        assert_eq!(scope.resolve("other").unwrap().to_json()["props"], json!({ "x": 1 }));
        assert_eq!(
            scope.resolve("later").unwrap().to_json(),
            json!({ "props": {}, "styles": {}, "actions": {} })
        );
        assert_eq!(scope.resolve("user").unwrap().to_json(), json!({ "name": "ada" }));
        assert!(scope.resolve("event").is_none());
        assert!(scope.resolve("Math").is_none());
    }

    #[test]
    fn action_names() {
        let state = StateMap::new();
        let known = BTreeSet::new();
        let context = Context::new();
        let entry = NodeState::default();
        let args = ActionArgs {
            event: Value::from("click"),
            value: Value::from(3.0),
        };
        let scope = NodeScope {
            bucket: None,
            entry: &entry,
            action: Some(&args),
            state: &state,
            known: &known,
            context: &context,
        };
        assert_eq!(scope.resolve("event").unwrap().to_json(), json!("click"));
        assert_eq!(scope.resolve("value").unwrap().to_json(), json!(3));
        assert_eq!(scope.resolve("state").unwrap().to_json(), json!({}));
        assert!(matches!(scope.resolve("setState"), Some(Value::Function(Callable::SetState))));
    }
}
