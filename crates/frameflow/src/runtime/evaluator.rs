// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! One evaluation pass over an executable tree.
//!
//! Nodes are visited root to leaves. Each node is first checked against the
//! previous pass: an unchanged subtree whose inputs still resolve to the same
//! values is copied over instead of recomputed. Otherwise its props, styles
//! and actions are resolved in their local dependency order, lists
//! materialize one item per element of their `value`, and slides controls
//! activate one slide and mirror its descendants onto their `ref` targets.

use crate::compiler::{CompiledBucket, Compiler, ExecutableNode};
use crate::error::{FrameError, Result};
use crate::kind::EvalRole;
use crate::linker::link_tree;
use crate::node::{RowRef, Scriptlets};
use crate::runtime::actions::{schema_index, ActionHost, Api, ValueHost};
use crate::runtime::scope::{ActionArgs, NodeScope};
use crate::runtime::state::{
    Context, Diagnostic, DiagnosticKind, NodeState, ResultStore, StateMap, ValueMap,
};
use crate::runtime::theme::StyleSheet;
use crate::script::{DepPath, ERROR_VALUE};
use crate::store::NodeStore;
use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};

/// Action key invoked the first time a node materializes.
pub const RUN_ACTION: &str = "run";

/// Programmatic evaluation settings.
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    /// Style sheet merged over resolved styles.
    pub theme: Option<StyleSheet>,
}

/// Runs passes over executable trees.
pub struct Evaluator<'a> {
    compiler: &'a Compiler,
    api: &'a dyn Api,
    store: Option<&'a dyn NodeStore>,
    theme: Option<&'a StyleSheet>,
}

impl<'a> Evaluator<'a> {
    /// An evaluator compiling list items with `compiler` and exposing `api`.
    pub fn new(compiler: &'a Compiler, api: &'a dyn Api) -> Self {
        Self {
            compiler,
            api,
            store: None,
            theme: None,
        }
    }

    /// Lets `setState` in run actions persist into `store`.
    pub fn with_store(mut self, store: &'a dyn NodeStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Applies evaluation options.
    pub fn with_options(mut self, options: &'a EvalOptions) -> Self {
        self.theme = options.theme.as_ref();
        self
    }

    /// Runs one pass.
    ///
    /// Per-node failures are recorded as diagnostics in the returned store.
    /// List nodes of `root` get their items for this pass.
    pub fn evaluate(
        &self,
        root: &mut ExecutableNode,
        prev: &ResultStore,
        context: &Context,
    ) -> Result<ResultStore> {
        if root.node.id.is_empty() {
            return Err(FrameError::InvalidTree("root node has no id".to_string()));
        }

        let mut pass = Pass::new(self, prev, context, root);
        pass.visit(root);
        Ok(pass.finish())
    }
}

/// Runs one pass with a default compiler and no node store.
pub fn evaluate(
    root: &mut ExecutableNode,
    prev: &ResultStore,
    context: &Context,
    api: &dyn Api,
) -> Result<ResultStore> {
    let compiler = Compiler::new();
    Evaluator::new(&compiler, api).evaluate(root, prev, context)
}

struct Pass<'p> {
    eval: &'p Evaluator<'p>,
    prev: &'p ResultStore,
    out: ResultStore,
    known: BTreeSet<String>,
    schemas: BTreeMap<String, RowRef>,
}

/// What a scriptlet invocation reads from the pass.
struct Env<'e> {
    state: &'e StateMap,
    known: &'e BTreeSet<String>,
    context: &'e Context,
    api: &'e dyn Api,
}

/// Diagnostics and counters of one node resolution.
struct Tally<'t> {
    node: &'t str,
    diagnostics: Vec<Diagnostic>,
    invocations: usize,
}

impl Tally<'_> {
    fn record(&mut self, key: String, kind: DiagnosticKind, message: String) {
        tracing::warn!("{} {}: {}", self.node, key, message);
        self.diagnostics.push(Diagnostic {
            node: self.node.to_string(),
            key,
            kind,
            message,
        });
    }
}

impl Env<'_> {
    fn resolve_values(
        &self,
        name: &str,
        bucket: &CompiledBucket,
        entry: &NodeState,
        tally: &mut Tally<'_>,
    ) -> ValueMap {
        let mut resolved = ValueMap::new();
        if let Some(path) = &bucket.cycle {
            tally.record(
                name.to_string(),
                DiagnosticKind::Cycle,
                format!("dependency cycle {}", path.join(" -> ")),
            );
            return resolved;
        }

        let host = ValueHost { api: self.api };
        for key in &bucket.order {
            let compiled = match bucket.scripts.get(key) {
                Some(compiled) => compiled,
                None => continue,
            };
            tally.invocations += 1;
            if let Some(error) = &compiled.error {
                tally.record(format!("{}.{}", name, key), DiagnosticKind::Parse, error.clone());
                resolved.insert(key.clone(), serde_json::Value::String(ERROR_VALUE.to_string()));
                continue;
            }

            let scope = NodeScope {
                bucket: Some((name, &resolved)),
                entry,
                action: None,
                state: self.state,
                known: self.known,
                context: self.context,
            };
            let result = (compiled.run)(&scope, &host);
            match result {
                Ok(value) if value.is_absent() => {
                    resolved.remove(key);
                }
                Ok(value) => {
                    resolved.insert(key.clone(), value.to_json());
                }
                Err(e) => {
                    tally.record(format!("{}.{}", name, key), DiagnosticKind::Runtime, e.to_string());
                    resolved.insert(key.clone(), serde_json::Value::String(ERROR_VALUE.to_string()));
                }
            }
        }
        resolved
    }

    fn resolve_actions(&self, node: &ExecutableNode, entry: &NodeState, tally: &mut Tally<'_>) -> ValueMap {
        let mut resolved = ValueMap::new();
        let host = ValueHost { api: self.api };
        for key in &node.actions.order {
            let compiled = match node.actions.scripts.get(key) {
                Some(compiled) => compiled,
                None => continue,
            };
            if let Some(error) = &compiled.error {
                tally.record(format!("actions.{}", key), DiagnosticKind::Parse, error.clone());
                resolved.insert(key.clone(), serde_json::Value::String(ERROR_VALUE.to_string()));
                continue;
            }
            if !compiled.constant {
                resolved.insert(
                    key.clone(),
                    serde_json::json!({ "node": node.node.id, "action": key }),
                );
                continue;
            }

            tally.invocations += 1;
            let scope = NodeScope {
                bucket: Some(("actions", &resolved)),
                entry,
                action: None,
                state: self.state,
                known: self.known,
                context: self.context,
            };
            let result = (compiled.run)(&scope, &host);
            match result {
                Ok(value) if value.is_absent() => {}
                Ok(value) => {
                    resolved.insert(key.clone(), value.to_json());
                }
                Err(e) => tally.record(format!("actions.{}", key), DiagnosticKind::Action, e.to_string()),
            }
        }
        resolved
    }
}

impl<'p> Pass<'p> {
    fn new(eval: &'p Evaluator<'p>, prev: &'p ResultStore, context: &Context, root: &ExecutableNode) -> Self {
        let out = ResultStore {
            prev_state: prev.state.clone(),
            forced_slides: prev.forced_slides.clone(),
            context: context.clone(),
            lists: prev.lists.clone(),
            next_id: prev.next_id.max(root.options.next_id),
            ..Default::default()
        };
        let mut known = BTreeSet::new();
        static_ids(root, &mut known);
        Self {
            eval,
            prev,
            out,
            known,
            schemas: schema_index(root),
        }
    }

    fn finish(mut self) -> ResultStore {
        let pending: Vec<(String, NodeState)> = self
            .out
            .new_state
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect();
        for (id, entry) in pending {
            self.out.state.entry(id).or_default().merge(&entry);
        }

        let stats = self.out.stats;
        tracing::debug!(
            "Pass done: {} evaluated, {} skipped, {} invocations, {} diagnostics",
            stats.evaluated,
            stats.skipped,
            stats.invocations,
            self.out.diagnostics.len()
        );
        self.out
    }

    fn visit(&mut self, node: &mut ExecutableNode) {
        if self.try_skip(node) {
            return;
        }
        self.resolve_node(node);
        match node.node.kind.behavior().role {
            EvalRole::List => {
                self.materialize(node);
                self.visit_children(node);
            }
            EvalRole::Slides => self.visit_slides(node),
            _ => self.visit_children(node),
        }
    }

    /// Visits children, slides controls first.
    fn visit_children(&mut self, node: &mut ExecutableNode) {
        let (slides, rest): (Vec<usize>, Vec<usize>) = (0..node.children.len())
            .partition(|&i| node.children[i].node.kind.behavior().role == EvalRole::Slides);
        for i in slides.into_iter().chain(rest) {
            self.visit(&mut node.children[i]);
        }
    }

    fn try_skip(&mut self, node: &ExecutableNode) -> bool {
        if node.options.volatile {
            return false;
        }
        if self.prev.fingerprints.get(node.id()) != Some(&node.options.fingerprint) {
            return false;
        }
        let ids = node.subtree_ids();
        if ids
            .iter()
            .any(|id| !self.prev.state.contains_key(*id) || self.out.new_state.contains_key(*id))
        {
            return false;
        }
        if !node.options.transitive_deps.iter().all(|path| self.dep_unchanged(path)) {
            return false;
        }

        for id in &ids {
            if let Some(entry) = self.prev.state.get(*id) {
                self.out.state.insert(id.to_string(), entry.clone());
            }
            if let Some(fingerprint) = self.prev.fingerprints.get(*id) {
                self.out.fingerprints.insert(id.to_string(), *fingerprint);
            }
            if let Some(diagnostics) = self.prev.node_diagnostics.get(*id) {
                self.out.diagnostics.extend(diagnostics.iter().cloned());
                self.out.node_diagnostics.insert(id.to_string(), diagnostics.clone());
            }
        }
        self.out.stats.skipped += ids.len();
        tracing::trace!("Skipped '{}' ({} nodes)", node.id(), ids.len());
        true
    }

    /// A node id that is known but not visited yet reads as an empty entry,
    /// and it was equally unvisited at this point of the previous pass.
    fn dep_unchanged(&self, path: &DepPath) -> bool {
        match path.first() {
            Some(root) if self.known.contains(root) && !self.out.state.contains_key(root) => true,
            _ => self.out.resolve_path(path) == self.prev.resolve_path(path),
        }
    }

    fn resolve_node(&mut self, node: &ExecutableNode) {
        let id = node.id();
        let mut tally = Tally {
            node: id,
            diagnostics: Vec::new(),
            invocations: 0,
        };
        let mut entry = NodeState::default();
        {
            let env = Env {
                state: &self.out.state,
                known: &self.known,
                context: &self.out.context,
                api: self.eval.api,
            };
            entry.props = env.resolve_values("props", &node.props, &entry, &mut tally);
            entry.styles = env.resolve_values("styles", &node.styles, &entry, &mut tally);
            if let Some(theme) = self.eval.theme {
                let class = entry.props.get("class").and_then(|v| v.as_str()).map(str::to_string);
                theme.apply(node.node.kind, class.as_deref(), &mut entry.styles);
            }
            entry.actions = env.resolve_actions(node, &entry, &mut tally);
        }
        if let Some(pending) = self.out.new_state.remove(id) {
            entry.merge(&pending);
        }

        tracing::trace!("Resolved '{}' ({} invocations)", id, tally.invocations);
        self.out.state.insert(id.to_string(), entry);
        self.out.fingerprints.insert(id.to_string(), node.options.fingerprint);
        self.out.stats.evaluated += 1;
        self.out.stats.invocations += tally.invocations;
        if !tally.diagnostics.is_empty() {
            self.out.node_diagnostics.insert(id.to_string(), tally.diagnostics.clone());
        }
        self.out.diagnostics.extend(tally.diagnostics);

        if !self.prev.state.contains_key(id) {
            self.run_on_materialize(node);
        }
    }

    fn run_on_materialize(&mut self, node: &ExecutableNode) {
        let compiled = match node.actions.scripts.get(RUN_ACTION) {
            Some(compiled) if !compiled.constant && compiled.error.is_none() => compiled,
            _ => return,
        };
        let id = node.id();
        let entry = self.out.state.get(id).cloned().unwrap_or_default();
        let args = ActionArgs::default();
        let host = ActionHost {
            api: self.eval.api,
            store: self.eval.store,
            schemas: &self.schemas,
            persisted: Cell::new(false),
        };
        let result = {
            let scope = NodeScope {
                bucket: None,
                entry: &entry,
                action: Some(&args),
                state: &self.out.state,
                known: &self.known,
                context: &self.out.context,
            };
            (compiled.run)(&scope, &host)
        };
        self.out.stats.invocations += 1;
        if let Err(e) = result {
            tracing::warn!("Run action of '{}' failed: {}", id, e);
            self.out.diagnostics.push(Diagnostic {
                node: id.to_string(),
                key: format!("actions.{}", RUN_ACTION),
                kind: DiagnosticKind::Action,
                message: e.to_string(),
            });
        }
    }

    /// Brings a list's items in line with the length of its `value`.
    fn materialize(&mut self, list: &mut ExecutableNode) {
        let id = list.node.id.clone();
        let count = match self.out.prop(&id, "value") {
            Some(serde_json::Value::Array(items)) => items.len(),
            _ => 0,
        };
        let per_item = list.options.template.len();
        if per_item == 0 {
            list.children.clear();
            self.out.lists.insert(id, Vec::new());
            return;
        }

        let existing = list.children.len() / per_item;
        if count < existing {
            list.children.truncate(count * per_item);
        }
        let eval = self.eval;
        let mut starts = self.out.lists.get(&id).cloned().unwrap_or_default();
        for index in existing..count {
            let start = starts.get(index).copied().unwrap_or(self.out.next_id);
            let mut counter = start;
            for template in &list.options.template {
                let mut props = Scriptlets::new();
                props.insert("index".to_string(), index.to_string());
                props.insert("value".to_string(), format!("{}.props.value[{}]", id, index));
                let (tree, next) = link_tree(
                    &id,
                    &list.node.schema_id,
                    &props,
                    &template.to_tree(),
                    counter,
                    eval.compiler.engine(),
                );
                counter = next;
                let item = eval.compiler.build_executable(&tree);
                self.schemas.extend(schema_index(&item));
                list.children.push(item);
            }
            if index < starts.len() {
                starts[index] = start;
            } else {
                starts.push(start);
            }
            self.out.next_id = self.out.next_id.max(counter);
        }
        starts.truncate(count);

        tracing::trace!("List '{}' has {} items", id, count);
        self.out.lists.insert(id, starts);
    }

    fn visit_slides(&mut self, node: &mut ExecutableNode) {
        let id = node.node.id.clone();
        for child in &node.children {
            if is_slide(child) {
                self.resolve_node(child);
            }
        }

        let active = self.active_slide(node);
        if let Some(active) = &active {
            self.out.slides.insert(id.clone(), active.clone());
        }

        let parent = node.node.parent_id.clone();
        for child in &mut node.children {
            if !is_slide(child) {
                self.visit(child);
            } else if active.as_deref() == Some(child.id()) {
                self.visit_children(child);
                self.mirror(&parent, child);
            }
        }
    }

    fn active_slide(&mut self, node: &ExecutableNode) -> Option<String> {
        let id = node.id();
        if let Some(forced) = self.out.forced_slides.get(id).cloned() {
            if node.children.iter().any(|c| is_slide(c) && c.id() == forced) {
                return Some(forced);
            }
            self.out.diagnostics.push(Diagnostic {
                node: id.to_string(),
                key: "slides".to_string(),
                kind: DiagnosticKind::Structure,
                message: format!("forced slide '{}' is not a slide of '{}'", forced, id),
            });
        }

        let value = self.out.prop(id, "value")?;
        node.children
            .iter()
            .filter(|c| is_slide(c))
            .find(|c| self.out.prop(c.id(), "value") == Some(value))
            .map(|c| c.id().to_string())
    }

    /// Copies the entries of an active slide's descendants onto their `ref`
    /// targets. The slides control's parent is merged at once, every other
    /// target when it resolves or at the end of the pass.
    fn mirror(&mut self, parent: &str, slide: &ExecutableNode) {
        let mut descendants = Vec::new();
        for child in &slide.children {
            collect_nodes(child, &mut descendants);
        }
        for node in descendants {
            let target = match &node.node.ref_id {
                Some(target) if !target.is_empty() => target,
                _ => continue,
            };
            let entry = match self.out.state.get(node.id()) {
                Some(entry) => entry.clone(),
                None => continue,
            };
            let bucket = if target == parent {
                &mut self.out.state
            } else {
                &mut self.out.new_state
            };
            bucket.entry(target.clone()).or_default().merge(&entry);
        }
    }
}

fn is_slide(node: &ExecutableNode) -> bool {
    node.node.kind.behavior().role == EvalRole::Slide
}

fn collect_nodes<'n>(node: &'n ExecutableNode, out: &mut Vec<&'n ExecutableNode>) {
    out.push(node);
    for child in &node.children {
        collect_nodes(child, out);
    }
}

/// Ids that exist independently of list materialization.
fn static_ids(node: &ExecutableNode, out: &mut BTreeSet<String>) {
    out.insert(node.node.id.clone());
    if node.node.kind.behavior().role == EvalRole::List {
        return;
    }
    for child in &node.children {
        static_ids(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeKind};
    use crate::runtime::actions::NoApi;
    use crate::runtime::theme::ThemeRule;
    use crate::script::{ScriptError, Value};
    use crate::tree::TreeNode;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn compile(tree: TreeNode) -> ExecutableNode {
        Compiler::new().build_executable(&tree)
    }

    fn group(id: &str, children: Vec<TreeNode>) -> TreeNode {
        TreeNode {
            node: Node::new(id, "", NodeKind::Group),
            children,
            ..Default::default()
        }
    }

    fn run(root: &mut ExecutableNode, prev: &ResultStore) -> ResultStore {
        evaluate(root, prev, &Context::new(), &NoApi).unwrap()
    }

    #[test]
    fn props_resolve_in_dependency_order() {
        let mut root = compile(TreeNode::leaf(
            Node::new("n", "", NodeKind::Text)
                .with_prop("b", "a + 1")
                .with_prop("a", "1")
                .with_prop("c", "self.props.b * 10"),
        ));
        let out = run(&mut root, &ResultStore::default());
        assert_eq!(out.state["n"].props, json!({ "a": 1, "b": 2, "c": 20 }).as_object().cloned().unwrap());
    }

    #[test]
    fn undefined_removes_keys_and_errors_are_recorded() {
        let mut root = compile(TreeNode::leaf(
            Node::new("n", "", NodeKind::Text)
                .with_prop("gone", "undefined")
                .with_prop("empty", "")
                .with_prop("bad", "a +* 2")
                .with_prop("boom", "missing.props.x"),
        ));
        let out = run(&mut root, &ResultStore::default());
        let props = &out.state["n"].props;
        assert!(!props.contains_key("gone"));
        assert!(!props.contains_key("empty"));
        assert_eq!(props["bad"], json!("error"));
        assert_eq!(props["boom"], json!("error"));
        let kinds: Vec<DiagnosticKind> = out.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![DiagnosticKind::Parse, DiagnosticKind::Runtime]);
    }

    #[test]
    fn nodes_read_each_other_and_context() {
        let mut root = compile(group(
            "main",
            vec![
                TreeNode::leaf(Node::new("a", "main", NodeKind::Text).with_prop("text", "user.name")),
                TreeNode::leaf(
                    Node::new("b", "main", NodeKind::Text).with_prop("text", "a.props.text + '!'"),
                ),
            ],
        ));
        let mut context = Context::new();
        context.insert("user".into(), json!({ "name": "ada" }));
        let out = evaluate(&mut root, &ResultStore::default(), &context, &NoApi).unwrap();
        assert_eq!(out.prop("b", "text"), Some(&json!("ada!")));
    }

    #[test]
    fn actions_resolve_to_handles_or_constants() {
        let mut root = compile(TreeNode::leaf(
            Node::new("btn", "", NodeKind::Button)
                .with_action("click", "setState('btn', {})")
                .with_action("href", "'/home'"),
        ));
        let out = run(&mut root, &ResultStore::default());
        assert_eq!(
            out.state["btn"].actions["click"],
            json!({ "node": "btn", "action": "click" })
        );
        assert_eq!(out.state["btn"].actions["href"], json!("/home"));
    }

    #[test]
    fn unchanged_trees_are_skipped() {
        let mut root = compile(group(
            "main",
            vec![TreeNode::leaf(Node::new("n1", "main", NodeKind::Text).with_prop("text", "'hello'"))],
        ));
        let first = run(&mut root, &ResultStore::default());
        assert_eq!(first.stats.invocations, 1);

        let second = run(&mut root, &first);
        assert_eq!(second.stats.invocations, 0);
        assert_eq!(second.stats.skipped, 2);
        assert_eq!(second.state, first.state);
    }

    #[test]
    fn forward_sibling_reads_are_skipped() {
        let mut root = compile(group(
            "main",
            vec![
                TreeNode::leaf(Node::new("body", "main", NodeKind::Content)),
                TreeNode::leaf(Node::new("a", "main", NodeKind::Text).with_prop("t", "b.props.z")),
                TreeNode::leaf(Node::new("b", "main", NodeKind::Text).with_prop("z", "1")),
            ],
        ));
        assert!(root.options.volatile);
        let first = run(&mut root, &ResultStore::default());

        let second = run(&mut root, &first);
        assert_eq!(second.state, first.state);
        assert_eq!(second.stats.skipped, 2);
        assert_eq!(second.stats.invocations, 0);
    }

    #[test]
    fn skipped_nodes_keep_their_diagnostics() {
        let mut root = compile(group(
            "main",
            vec![TreeNode::leaf(
                Node::new("n", "main", NodeKind::Text)
                    .with_prop("a", "b")
                    .with_prop("b", "a")
                    .with_style("color", "'red' +"),
            )],
        ));
        let first = run(&mut root, &ResultStore::default());
        assert_eq!(first.diagnostics.len(), 2);

        let second = run(&mut root, &first);
        assert_eq!(second.stats.skipped, 2);
        assert_eq!(second.diagnostics, first.diagnostics);
        let third = run(&mut root, &second);
        assert_eq!(third.diagnostics, first.diagnostics);
    }

    #[test]
    fn context_changes_defeat_the_skip() {
        let mut root = compile(group(
            "main",
            vec![TreeNode::leaf(Node::new("n1", "main", NodeKind::Text).with_prop("text", "user.name"))],
        ));
        let mut context = Context::new();
        context.insert("user".into(), json!({ "name": "ada" }));
        let first = evaluate(&mut root, &ResultStore::default(), &context, &NoApi).unwrap();

        context.insert("user".into(), json!({ "name": "grace" }));
        let second = evaluate(&mut root, &first, &context, &NoApi).unwrap();
        assert_eq!(second.stats.skipped, 0);
        assert_eq!(second.prop("n1", "text"), Some(&json!("grace")));
    }

    #[test]
    fn lists_materialize_one_item_per_value() {
        let list = TreeNode {
            node: Node::new("l", "main", NodeKind::List).with_prop("value", "items"),
            children: vec![TreeNode::leaf(
                Node::new("row", "l", NodeKind::Text).with_prop("text", "value.name + index"),
            )],
            ..Default::default()
        };
        let mut root = compile(group("main", vec![list]));
        let mut context = Context::new();
        context.insert("items".into(), json!([{ "name": "a" }, { "name": "b" }, { "name": "c" }]));

        let out = evaluate(&mut root, &ResultStore::default(), &context, &NoApi).unwrap();
        let list = root.find("l").unwrap();
        let ids: Vec<&str> = list.children.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["row_0", "row_1", "row_2"]);
        assert_eq!(out.prop("row_1", "index"), Some(&json!(1)));
        assert_eq!(out.prop("row_1", "value"), Some(&json!({ "name": "b" })));
        assert_eq!(out.prop("row_2", "text"), Some(&json!("c2")));
        assert_eq!(out.lists["l"], vec![0, 1, 2]);
        assert_eq!(out.next_id, 3);

        context.insert("items".into(), json!([{ "name": "a" }]));
        let shrunk = evaluate(&mut root, &out, &context, &NoApi).unwrap();
        assert_eq!(root.find("l").unwrap().children.len(), 1);
        assert!(!shrunk.state.contains_key("row_1"));
        assert_eq!(shrunk.lists["l"], vec![0]);
    }

    #[test]
    fn slides_activate_and_mirror() {
        let slides = TreeNode {
            node: Node::new("tabs", "main", NodeKind::Slides).with_prop("value", "'b'"),
            children: vec![
                TreeNode {
                    node: Node::new("sa", "tabs", NodeKind::Slide).with_prop("value", "'a'"),
                    children: vec![TreeNode::leaf(
                        Node::new("ta", "sa", NodeKind::Text).with_prop("title", "'A'").with_ref("main"),
                    )],
                    ..Default::default()
                },
                TreeNode {
                    node: Node::new("sb", "tabs", NodeKind::Slide).with_prop("value", "'b'"),
                    children: vec![
                        TreeNode::leaf(
                            Node::new("tb", "sb", NodeKind::Text).with_prop("title", "'B'").with_ref("main"),
                        ),
                        TreeNode::leaf(
                            Node::new("hb", "sb", NodeKind::Text).with_prop("color", "'red'").with_ref("header"),
                        ),
                    ],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let header = TreeNode::leaf(Node::new("header", "main", NodeKind::Text).with_prop("text", "'Top'"));
        let mut root = compile(group("main", vec![header, slides]));

        let out = run(&mut root, &ResultStore::default());
        assert_eq!(out.slides["tabs"], "sb");
        assert!(out.state.contains_key("sa"));
        assert!(!out.state.contains_key("ta"));
        assert_eq!(out.prop("main", "title"), Some(&json!("B")));
        assert_eq!(out.prop("header", "text"), Some(&json!("Top")));
        assert_eq!(out.prop("header", "color"), Some(&json!("red")));
        assert!(out.new_state.is_empty());

        let again = run(&mut root, &out);
        assert_eq!(again.state, out.state);

        let mut forced = out.clone();
        forced.force_slide("tabs", "sa");
        let switched = run(&mut root, &forced);
        assert_eq!(switched.slides["tabs"], "sa");
        assert_eq!(switched.prop("main", "title"), Some(&json!("A")));
    }

    #[test]
    fn cycles_leave_the_bucket_unresolved() {
        let mut root = compile(TreeNode::leaf(
            Node::new("n", "", NodeKind::Text)
                .with_prop("a", "b")
                .with_prop("b", "a")
                .with_style("color", "'red'"),
        ));
        let out = run(&mut root, &ResultStore::default());
        assert!(out.state["n"].props.is_empty());
        assert_eq!(out.state["n"].styles["color"], json!("red"));
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::Cycle);
    }

    #[test]
    fn theme_rules_apply_to_matching_nodes() {
        let mut root = compile(group(
            "main",
            vec![TreeNode::leaf(
                Node::new("b", "main", NodeKind::Button).with_style("color", "'black'"),
            )],
        ));
        let options = EvalOptions {
            theme: Some(StyleSheet::new(vec![ThemeRule {
                kind: Some(NodeKind::Button),
                class: None,
                styles: json!({ "color": "white" }).as_object().cloned().unwrap(),
            }])),
        };
        let compiler = Compiler::new();
        let out = Evaluator::new(&compiler, &NoApi)
            .with_options(&options)
            .evaluate(&mut root, &ResultStore::default(), &Context::new())
            .unwrap();
        assert_eq!(out.state["b"].styles["color"], json!("white"));
    }

    #[test]
    fn run_action_fires_once() {
        let mut root = compile(TreeNode::leaf(
            Node::new("n", "", NodeKind::Text).with_action("run", "api.load(1)"),
        ));
        let calls = AtomicUsize::new(0);
        let api = |_: &str, _: Vec<Value>| -> std::result::Result<Value, ScriptError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        };
        let first = evaluate(&mut root, &ResultStore::default(), &Context::new(), &api).unwrap();
        evaluate(&mut root, &first, &Context::new(), &api).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
