// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Tree nodes to executable nodes.
//!
//! The [`Compiler`] turns every scriptlet of a [`TreeNode`] subtree into a
//! closure, orders each node's buckets by their local dependencies, and
//! computes the dependency sets the evaluator uses to skip unchanged
//! subtrees. `list` nodes keep their compiled children aside as a template
//! instead of as fixed children.

use crate::dependencies::{local_dependencies, order_keys};
use crate::error::FrameError;
use crate::kind::{EditorProps, EvalRole};
use crate::node::{Node, Scriptlets};
use crate::script::{CompiledScript, DepPath, ScriptEngine, ScriptKind, ScriptletEngine};
use crate::tree::{BuiltTree, TreeNode};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// The compiled scriptlets of one bucket of one node.
#[derive(Debug, Clone, Default)]
pub struct CompiledBucket {
    /// Compiled closures by key.
    pub scripts: BTreeMap<String, CompiledScript>,
    /// Same-bucket keys each key reads.
    pub local_deps: BTreeMap<String, Vec<String>>,
    /// Evaluation order; empty when the bucket has a cycle.
    pub order: Vec<String>,
    /// The cycle path, when the local dependencies are cyclic.
    pub cycle: Option<Vec<String>>,
}

impl CompiledBucket {
    fn compile(
        engine: &dyn ScriptEngine,
        node_id: &str,
        bucket: &str,
        sources: &Scriptlets,
        kind: ScriptKind,
    ) -> Self {
        let own_keys: BTreeSet<String> = sources.keys().cloned().collect();
        let mut scripts = BTreeMap::new();
        let mut local_deps = BTreeMap::new();
        for (key, source) in sources {
            let compiled = engine.compile(source, kind);
            local_deps.insert(
                key.clone(),
                local_dependencies(key, bucket, &own_keys, &compiled.deps),
            );
            scripts.insert(key.clone(), compiled);
        }

        let (order, cycle) = match order_keys(node_id, &local_deps) {
            Ok(order) => (order, None),
            Err(FrameError::Cycle { path, .. }) => {
                tracing::warn!("Cycle in {}.{}: {}", node_id, bucket, path.join(" -> "));
                (Vec::new(), Some(path))
            }
            Err(e) => {
                tracing::warn!("Cannot order {}.{}: {}", node_id, bucket, e);
                (Vec::new(), Some(Vec::new()))
            }
        };

        Self {
            scripts,
            local_deps,
            order,
            cycle,
        }
    }

    /// Dependency chains that leave the node: everything except chains rooted
    /// at `self` or at one of the bucket's own keys.
    fn external_deps(&self) -> impl Iterator<Item = &DepPath> + '_ {
        self.scripts.values().flat_map(|compiled| compiled.deps.iter()).filter(move |path| {
            path.first()
                .map_or(false, |root| root != "self" && !self.scripts.contains_key(root))
        })
    }
}

/// Per-node compilation metadata.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// External dependency chains of the node's own props and styles.
    pub deps: Vec<DepPath>,
    /// External dependency chains of the whole subtree, memoization input.
    pub transitive_deps: Vec<DepPath>,
    /// The subtree contains a node that must be re-derived every pass.
    pub volatile: bool,
    /// Hash of the subtree's rows; changes whenever any scriptlet does.
    pub fingerprint: u64,
    /// Compiled child template of a `list` node.
    pub template: Vec<ExecutableNode>,
    /// First id counter no `<id>_<counter>` id of the subtree uses.
    pub next_id: u64,
}

/// A tree node with compiled scriptlets.
#[derive(Debug, Clone, Default)]
pub struct ExecutableNode {
    /// The row.
    pub node: Node,
    /// Expanded from a frame template.
    pub is_ref: bool,
    /// Editor affordances carried over from the tree.
    pub editor_props: EditorProps,
    /// Children; for lists, the items materialized by the last pass.
    pub children: Vec<ExecutableNode>,
    /// Compiled props.
    pub props: CompiledBucket,
    /// Compiled styles.
    pub styles: CompiledBucket,
    /// Compiled actions.
    pub actions: CompiledBucket,
    /// Dependency metadata and the list template.
    pub options: ExecOptions,
}

impl ExecutableNode {
    /// The node id.
    pub fn id(&self) -> &str {
        &self.node.id
    }

    /// Finds a node of the subtree by id.
    pub fn find(&self, id: &str) -> Option<&ExecutableNode> {
        if self.node.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Ids of the node and all its current descendants.
    pub fn subtree_ids(&self) -> Vec<&str> {
        let mut ids = vec![self.node.id.as_str()];
        for child in &self.children {
            ids.extend(child.subtree_ids());
        }
        ids
    }

    /// The uncompiled tree, with list templates in place of materialized items.
    pub fn to_tree(&self) -> TreeNode {
        let children = if self.node.kind.behavior().role == EvalRole::List {
            &self.options.template
        } else {
            &self.children
        };
        TreeNode {
            node: self.node.clone(),
            children: children.iter().map(ExecutableNode::to_tree).collect(),
            is_ref: self.is_ref,
            editor_props: self.editor_props,
        }
    }

    /// The compiled bucket with the given name.
    pub fn bucket(&self, name: &str) -> Option<&CompiledBucket> {
        match name {
            "props" => Some(&self.props),
            "styles" => Some(&self.styles),
            "actions" => Some(&self.actions),
            _ => None,
        }
    }
}

/// Compiles trees into executable nodes.
#[derive(Clone)]
pub struct Compiler {
    engine: Arc<dyn ScriptEngine>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// A compiler using the built-in scriptlet engine.
    pub fn new() -> Self {
        Self::with_engine(Arc::new(ScriptletEngine::new()))
    }

    /// A compiler whose built-in engine caches `capacity` parsed scripts.
    pub fn with_cache_size(capacity: usize) -> Self {
        Self::with_engine(Arc::new(ScriptletEngine::with_cache_size(capacity)))
    }

    /// A compiler using a custom engine.
    pub fn with_engine(engine: Arc<dyn ScriptEngine>) -> Self {
        Self { engine }
    }

    /// The scriptlet engine.
    pub fn engine(&self) -> &dyn ScriptEngine {
        self.engine.as_ref()
    }

    /// Compiles a tree.
    pub fn build_executable(&self, root: &TreeNode) -> ExecutableNode {
        let node = self.compile_node(root);
        tracing::debug!("Compiled tree '{}'", node.node.id);
        node
    }

    /// Compiles a built tree; ids generated later start past the builder's counter.
    pub fn compile(&self, built: &BuiltTree) -> ExecutableNode {
        let mut node = self.build_executable(&built.root);
        node.options.next_id = node.options.next_id.max(built.next_id);
        node
    }

    fn compile_node(&self, tree: &TreeNode) -> ExecutableNode {
        let engine = self.engine.as_ref();
        let node = &tree.node;
        let props = CompiledBucket::compile(engine, &node.id, "props", &node.props, ScriptKind::Value);
        let styles = CompiledBucket::compile(engine, &node.id, "styles", &node.styles, ScriptKind::Value);
        let actions = CompiledBucket::compile(engine, &node.id, "actions", &node.actions, ScriptKind::Action);

        let compiled: Vec<ExecutableNode> = tree.children.iter().map(|c| self.compile_node(c)).collect();
        let behavior = node.kind.behavior();
        let (children, template) = if behavior.role == EvalRole::List {
            (Vec::new(), compiled)
        } else {
            (compiled, Vec::new())
        };

        let mut deps: Vec<DepPath> = Vec::new();
        for path in props.external_deps().chain(styles.external_deps()) {
            if !deps.contains(path) {
                deps.push(path.clone());
            }
        }

        let mut subtree = BTreeSet::new();
        subtree.insert(node.id.clone());
        let mut transitive = deps.clone();
        let mut volatile = behavior.volatile;
        let mut next_id = counter_after(&node.id);
        let mut hasher = DefaultHasher::new();
        serde_json::to_string(node).unwrap_or_default().hash(&mut hasher);
        tree.is_ref.hash(&mut hasher);
        for child in children.iter().chain(template.iter()) {
            collect_ids(child, &mut subtree);
            volatile |= child.options.volatile;
            next_id = next_id.max(child.options.next_id);
            child.options.fingerprint.hash(&mut hasher);
            for path in &child.options.transitive_deps {
                if !transitive.contains(path) {
                    transitive.push(path.clone());
                }
            }
        }
        transitive.retain(|path| path.first().map_or(false, |root| !subtree.contains(root)));

        ExecutableNode {
            node: node.clone(),
            is_ref: tree.is_ref,
            editor_props: tree.editor_props,
            children,
            props,
            styles,
            actions,
            options: ExecOptions {
                deps,
                transitive_deps: transitive,
                volatile,
                fingerprint: hasher.finish(),
                template,
                next_id,
            },
        }
    }
}

fn counter_after(id: &str) -> u64 {
    id.rsplit_once('_')
        .and_then(|(_, counter)| counter.parse::<u64>().ok())
        .map_or(0, |counter| counter.saturating_add(1))
}

fn collect_ids(node: &ExecutableNode, ids: &mut BTreeSet<String>) {
    ids.insert(node.node.id.clone());
    for child in node.children.iter().chain(node.options.template.iter()) {
        collect_ids(child, ids);
    }
}
