// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Flat rows to rooted trees.
//!
//! The [`TreeBuilder`] assembles a schema's rows into a [`TreeNode`] tree,
//! expands every `frame` node by building the schema it references, and
//! finally derives the editor metadata of every node.
//!
//! ```text
//! rows ──► assemble ──► expand frames ──► editor props ──► TreeNode
//!             │               │
//!             │               └─ load schema, build, merge params, relink
//!             └─ group by parent, sort by rank, drop dangling rows
//! ```
//!
//! Construction is copy-on-write: every expansion produces new nodes, the
//! loaded tables are never touched.

use crate::error::{FrameError, Result};
use crate::kind::{editor_props, EditorInput, EditorProps};
use crate::linker::link_tree;
use crate::node::{literal_scriptlet, Node, NodeKind, NodeTable, Scriptlets};
use crate::script::ScriptEngine;
use crate::store::NodeStore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A node with its children, as assembled by the [`TreeBuilder`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// The row.
    #[serde(flatten)]
    pub node: Node,
    /// Children in rank order.
    #[serde(default)]
    pub children: Vec<TreeNode>,
    /// True when the node was expanded from a frame template.
    #[serde(default)]
    pub is_ref: bool,
    /// Derived editor affordances.
    #[serde(default)]
    pub editor_props: EditorProps,
}

impl TreeNode {
    /// A node without children.
    pub fn leaf(node: Node) -> Self {
        Self {
            node,
            ..Default::default()
        }
    }

    /// The node id.
    pub fn id(&self) -> &str {
        &self.node.id
    }

    /// Finds a node of the subtree by id.
    pub fn find(&self, id: &str) -> Option<&TreeNode> {
        if self.node.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Number of nodes in the subtree.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(TreeNode::len).sum::<usize>()
    }

    /// Always false: a subtree contains at least its root.
    pub fn is_empty(&self) -> bool {
        false
    }

    fn mark_ref(&mut self) {
        self.is_ref = true;
        for child in &mut self.children {
            child.mark_ref();
        }
    }

    /// Child indices leading to the first `content` node in pre-order.
    fn content_path(&self) -> Option<Vec<usize>> {
        if self.node.kind == NodeKind::Content {
            return Some(Vec::new());
        }
        self.children.iter().enumerate().find_map(|(i, child)| {
            child.content_path().map(|mut path| {
                path.insert(0, i);
                path
            })
        })
    }

    fn descend_mut(&mut self, path: &[usize]) -> &mut TreeNode {
        match path.split_first() {
            Some((&i, rest)) if i < self.children.len() => self.children[i].descend_mut(rest),
            _ => self,
        }
    }
}

/// The output of a build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltTree {
    /// The root.
    pub root: TreeNode,
    /// Next free value of the id counter used while relinking templates.
    pub next_id: u64,
}

/// Builds trees from the node store.
pub struct TreeBuilder<'a> {
    store: &'a dyn NodeStore,
    engine: &'a dyn ScriptEngine,
}

struct Expansion {
    next_id: u64,
    visiting: Vec<String>,
}

impl<'a> TreeBuilder<'a> {
    /// Creates a builder reading from `store`, rewriting scriptlets with `engine`.
    pub fn new(store: &'a dyn NodeStore, engine: &'a dyn ScriptEngine) -> Self {
        Self { store, engine }
    }

    /// Loads and builds a schema.
    pub fn build(&self, schema_id: &str) -> Result<BuiltTree> {
        let table = self.store.load_node_table(schema_id)?;
        self.build_table(&table)
    }

    /// Builds an already loaded table.
    ///
    /// Fails with [`FrameError::InvalidTree`] when the table has no rows.
    pub fn build_table(&self, table: &NodeTable) -> Result<BuiltTree> {
        if table.rows.is_empty() {
            return Err(FrameError::InvalidTree(format!(
                "schema '{}' has no rows",
                table.schema.id
            )));
        }

        let mut expansion = Expansion {
            next_id: 0,
            visiting: vec![table.schema.id.clone()],
        };
        let mut root = self.build_schema(table, &mut expansion)?;
        apply_editor_props(&mut root, 0, None);

        tracing::debug!(
            "Built tree '{}': {} nodes, next id {}",
            table.schema.id,
            root.len(),
            expansion.next_id
        );
        Ok(BuiltTree {
            root,
            next_id: expansion.next_id,
        })
    }

    fn build_schema(&self, table: &NodeTable, expansion: &mut Expansion) -> Result<TreeNode> {
        let root = assemble(table);
        self.expand(root, &table.schema.id, expansion)
    }

    fn expand(&self, mut tree: TreeNode, schema_id: &str, expansion: &mut Expansion) -> Result<TreeNode> {
        let children = std::mem::take(&mut tree.children);
        let mut expanded = Vec::with_capacity(children.len());
        for child in children {
            expanded.push(self.expand(child, schema_id, expansion)?);
        }
        tree.children = expanded;

        if !tree.node.kind.behavior().expands {
            return Ok(tree);
        }
        let target = match tree.node.frame.clone() {
            Some(target) if !target.is_empty() => target,
            _ => return Ok(tree),
        };
        if tree.node.schema_id == target || expansion.visiting.contains(&target) {
            tracing::warn!(
                "Frame '{}' references '{}' recursively, left unexpanded",
                tree.node.id,
                target
            );
            return Ok(tree);
        }

        let table = match self.store.load_node_table(&target) {
            Ok(table) => table,
            Err(FrameError::SchemaNotFound(_)) => {
                tracing::warn!("Frame '{}' references missing schema '{}'", tree.node.id, target);
                return Ok(tree);
            }
            Err(e) => return Err(e),
        };
        if table.rows.is_empty() {
            tracing::warn!("Frame '{}' references empty schema '{}'", tree.node.id, target);
            return Ok(tree);
        }

        expansion.visiting.push(target.clone());
        let template = self.build_schema(&table, expansion);
        expansion.visiting.pop();
        let template = template?;

        let params = frame_params(&tree.node, &table, &template.node);
        let (mut instance, next_id) = link_tree(
            &tree.node.id,
            schema_id,
            &params,
            &template,
            expansion.next_id,
            self.engine,
        );
        expansion.next_id = next_id;
        instance.mark_ref();

        let authored = std::mem::take(&mut tree.children);
        if !authored.is_empty() {
            let path = instance.content_path().unwrap_or_default();
            let slot = instance.descend_mut(&path);
            for mut child in authored {
                child.node.parent_id = slot.node.id.clone();
                slot.children.push(child);
            }
        }

        tracing::debug!("Expanded frame '{}' with schema '{}'", tree.node.id, target);
        tree.children = vec![instance];
        Ok(tree)
    }
}

/// Arranges a table's rows into a tree rooted at the schema root.
///
/// Rows with an empty parent attach to the root. Rows whose parent is not
/// reachable are dropped.
fn assemble(table: &NodeTable) -> TreeNode {
    let schema_id = table.schema.id.as_str();
    let owned = |node: &Node| {
        let mut node = node.clone();
        if node.schema_id.is_empty() {
            node.schema_id = schema_id.to_string();
        }
        node
    };

    let root = table
        .rows
        .iter()
        .find(|n| n.id == schema_id && n.parent_id.is_empty())
        .map(owned)
        .unwrap_or_else(|| {
            let mut root = Node::new(schema_id, "", NodeKind::Group);
            root.schema_id = schema_id.to_string();
            root
        });

    let mut by_parent: BTreeMap<&str, Vec<&Node>> = BTreeMap::new();
    for row in &table.rows {
        if row.id == schema_id && row.parent_id.is_empty() {
            continue;
        }
        let parent = if row.parent_id.is_empty() {
            schema_id
        } else {
            row.parent_id.as_str()
        };
        by_parent.entry(parent).or_default().push(row);
    }
    for siblings in by_parent.values_mut() {
        siblings.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.id.cmp(&b.id)));
    }

    fn attach(
        node: Node,
        by_parent: &BTreeMap<&str, Vec<&Node>>,
        seen: &mut BTreeSet<String>,
        owned: &dyn Fn(&Node) -> Node,
    ) -> TreeNode {
        let mut tree = TreeNode::leaf(node);
        if let Some(rows) = by_parent.get(tree.node.id.as_str()) {
            for row in rows {
                if !seen.insert(row.id.clone()) {
                    continue;
                }
                tree.children.push(attach(owned(row), by_parent, seen, owned));
            }
        }
        tree
    }

    let mut seen = BTreeSet::new();
    seen.insert(root.id.clone());
    let tree = attach(root, &by_parent, &mut seen, &owned);

    for row in &table.rows {
        if !seen.contains(&row.id) {
            tracing::warn!(
                "Dropping node '{}' of schema '{}': parent '{}' not found",
                row.id,
                schema_id,
                row.parent_id
            );
        }
    }
    tree
}

/// The parameter props a frame reference passes into its template root.
///
/// Declared parameters are the schema columns plus the reference's `types`
/// and `propsValue` keys. For each one absent from the template root, the
/// reference's own prop wins, then its `propsValue`, then the column default.
fn frame_params(reference: &Node, table: &NodeTable, template_root: &Node) -> Scriptlets {
    let mut declared: BTreeSet<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
    declared.extend(reference.types.keys().map(String::as_str));
    declared.extend(reference.props_value.keys().map(String::as_str));

    let mut params = Scriptlets::new();
    for name in declared {
        if name.is_empty() || template_root.props.contains_key(name) {
            continue;
        }
        let column_default = table
            .columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.default_value)
            .filter(|v| !v.is_null());
        let source = reference
            .props
            .get(name)
            .cloned()
            .or_else(|| reference.props_value.get(name).map(literal_scriptlet))
            .or_else(|| column_default.map(literal_scriptlet));
        if let Some(source) = source {
            params.insert(name.to_string(), source);
        }
    }
    params
}

fn apply_editor_props(tree: &mut TreeNode, depth: usize, parent: Option<(NodeKind, &EditorProps)>) {
    tree.editor_props = editor_props(&EditorInput {
        kind: tree.node.kind,
        depth,
        child_count: tree.children.len(),
        is_ref: tree.is_ref,
        parent,
    });
    let own = (tree.node.kind, tree.editor_props);
    for child in &mut tree.children {
        apply_editor_props(child, depth + 1, Some((own.0, &own.1)));
    }
}
