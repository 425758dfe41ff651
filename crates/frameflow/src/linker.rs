// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Identifier relinking for template reuse.
//!
//! A template subtree can be instantiated any number of times (frame
//! expansion, one copy per list item, paste) once every id in it has been
//! renamed and every scriptlet that mentions one of those ids rewritten to
//! match. Ids are drawn from an explicit counter that callers thread through
//! and get back, so linking is pure and reproducible.

use crate::node::{literal_scriptlet, Node, RowRef, Scriptlets};
use crate::script::{ScriptEngine, ERROR_VALUE};
use crate::tree::TreeNode;
use std::collections::HashMap;

/// Renames one node from `old_id` to `new_id`.
///
/// The node's own id, its `parentId` and its `ref` are renamed when they
/// equal `old_id`, except that the `parentId` of the subtree top `root_id`
/// keeps pointing at its real parent. Scriptlets are rewritten by the
/// engine; a scriptlet that cannot be rewritten becomes the `'error'`
/// literal.
pub fn relink(old_id: &str, new_id: &str, node: &Node, root_id: &str, engine: &dyn ScriptEngine) -> Node {
    let renames: HashMap<String, String> = [(old_id.to_string(), new_id.to_string())]
        .into_iter()
        .collect();

    let mut linked = node.clone();
    if linked.id == old_id {
        linked.id = new_id.to_string();
    }
    if linked.parent_id == old_id && node.id != root_id {
        linked.parent_id = new_id.to_string();
    }
    if linked.ref_id.as_deref() == Some(old_id) {
        linked.ref_id = Some(new_id.to_string());
    }
    rename_scriptlets(&mut linked, &renames, engine);
    linked
}

/// Relinks a batch of nodes, given in pre-order with the subtree top first.
///
/// Every node gets the id `<oldId>_<counter>`, counting up from `start_id`.
/// References between batch members (parents, `ref` targets, scriptlet
/// identifiers) follow the renaming. The top node is re-parented under
/// `parent`, every node moves to `schema_id` and remembers the template row
/// it came from, and `props` are written onto the top node after renaming. Returns the linked nodes and the next free
/// counter value.
pub fn link_nodes(
    parent: &str,
    schema_id: &str,
    props: &Scriptlets,
    flat: &[Node],
    start_id: u64,
    engine: &dyn ScriptEngine,
) -> (Vec<Node>, u64) {
    let mut counter = start_id;
    let mut renames = HashMap::with_capacity(flat.len());
    for node in flat {
        renames.insert(node.id.clone(), format!("{}_{}", node.id, counter));
        counter += 1;
    }

    let mut linked = Vec::with_capacity(flat.len());
    for (index, node) in flat.iter().enumerate() {
        let mut next = node.clone();
        next.origin = Some(RowRef::of(node));
        next.schema_id = schema_id.to_string();
        if let Some(id) = renames.get(&node.id) {
            next.id = id.clone();
        }
        if index == 0 {
            next.parent_id = parent.to_string();
        } else if let Some(parent_id) = renames.get(&node.parent_id) {
            next.parent_id = parent_id.clone();
        }
        if let Some(target) = node.ref_id.as_ref().and_then(|r| renames.get(r)) {
            next.ref_id = Some(target.clone());
        }
        rename_scriptlets(&mut next, &renames, engine);
        if index == 0 {
            for (key, source) in props {
                next.props.insert(key.clone(), source.clone());
            }
        }
        linked.push(next);
    }

    tracing::trace!("Linked {} nodes under '{}' (ids {}..{})", linked.len(), parent, start_id, counter);
    (linked, counter)
}

/// Flattens a tree into its nodes in pre-order.
pub fn flatten(root: &TreeNode) -> Vec<Node> {
    fn walk(node: &TreeNode, out: &mut Vec<Node>) {
        out.push(node.node.clone());
        for child in &node.children {
            walk(child, out);
        }
    }
    let mut out = Vec::new();
    walk(root, &mut out);
    out
}

/// Rebuilds a tree of the same shape as `shape` from nodes in pre-order.
///
/// Flags and editor props of `shape` carry over; nodes come from `nodes`.
/// Returns `None` when the counts differ.
pub fn unflatten(shape: &TreeNode, nodes: Vec<Node>) -> Option<TreeNode> {
    fn rebuild(shape: &TreeNode, nodes: &mut std::vec::IntoIter<Node>) -> Option<TreeNode> {
        let node = nodes.next()?;
        let mut children = Vec::with_capacity(shape.children.len());
        for child in &shape.children {
            children.push(rebuild(child, nodes)?);
        }
        Some(TreeNode {
            node,
            children,
            is_ref: shape.is_ref,
            editor_props: shape.editor_props,
        })
    }

    let mut iter = nodes.into_iter();
    let tree = rebuild(shape, &mut iter)?;
    match iter.next() {
        Some(_) => None,
        None => Some(tree),
    }
}

/// Links a whole tree with [`link_nodes`], keeping its shape.
pub fn link_tree(
    parent: &str,
    schema_id: &str,
    props: &Scriptlets,
    tree: &TreeNode,
    start_id: u64,
    engine: &dyn ScriptEngine,
) -> (TreeNode, u64) {
    let (linked, next_id) = link_nodes(parent, schema_id, props, &flatten(tree), start_id, engine);
    match unflatten(tree, linked) {
        Some(tree) => (tree, next_id),
        // link_nodes is one-to-one, so the shapes always agree
        None => (tree.clone(), start_id),
    }
}

fn rename_scriptlets(node: &mut Node, renames: &HashMap<String, String>, engine: &dyn ScriptEngine) {
    let id = node.id.clone();
    for (bucket, scriptlets) in [
        ("props", &mut node.props),
        ("styles", &mut node.styles),
        ("actions", &mut node.actions),
    ] {
        for (key, source) in scriptlets.iter_mut() {
            match engine.rename(source, renames) {
                Ok(renamed) => *source = renamed,
                Err(e) => {
                    tracing::warn!("Cannot relink {}.{}.{}: {}", id, bucket, key, e);
                    *source = literal_scriptlet(&serde_json::Value::String(ERROR_VALUE.to_string()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use crate::script::ScriptletEngine;

    fn template() -> Vec<Node> {
        vec![
            Node::new("card", "tpl", NodeKind::Group).with_prop("title", "label.props.text"),
            Node::new("label", "card", NodeKind::Text)
                .with_prop("text", "'Hi ' + card.props.name")
                .with_style("color", "card.props.tone ?? 'black'"),
            Node::new("go", "card", NodeKind::Button)
                .with_ref("label")
                .with_action("click", "setState('label', { text: label.props.text })"),
        ]
    }

    #[test]
    fn relink_renames_id_parent_ref_and_scripts() {
        let engine = ScriptletEngine::new();
        let node = Node::new("label", "card", NodeKind::Text)
            .with_ref("card")
            .with_prop("text", "card.props.name + ' card'");
        let linked = relink("card", "card_7", &node, "card", &engine);
        assert_eq!(linked.id, "label");
        assert_eq!(linked.parent_id, "card_7");
        assert_eq!(linked.ref_id.as_deref(), Some("card_7"));
        assert_eq!(linked.props["text"], "card_7.props.name + ' card'");

        let top = Node::new("card", "outer", NodeKind::Group);
        let linked = relink("card", "card_7", &top, "card", &engine);
        assert_eq!(linked.id, "card_7");
        assert_eq!(linked.parent_id, "outer");
    }

    #[test]
    fn relink_round_trips() {
        let engine = ScriptletEngine::new();
        for node in template() {
            let there = relink("card", "box", &node, "card", &engine);
            let back = relink("box", "card", &there, "box", &engine);
            assert_eq!(back, node);
        }
    }

    #[test]
    fn unparsable_scripts_become_error_literals() {
        let engine = ScriptletEngine::new();
        let node = Node::new("x", "card", NodeKind::Text).with_prop("text", "card.props. +");
        let linked = relink("card", "box", &node, "card", &engine);
        assert_eq!(linked.props["text"], "'error'");
    }

    #[test]
    fn link_nodes_is_self_consistent() {
        let engine = ScriptletEngine::new();
        let props: Scriptlets = [("index".to_string(), "0".to_string())].into_iter().collect();
        let (nodes, next) = link_nodes("list", "main", &props, &template(), 10, &engine);

        assert_eq!(next, 13);
        let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["card_10", "label_11", "go_12"]);
        assert_eq!(nodes[0].parent_id, "list");
        assert_eq!(nodes[1].parent_id, "card_10");
        assert_eq!(nodes[2].ref_id.as_deref(), Some("label_11"));
        assert!(nodes.iter().all(|n| n.schema_id == "main"));
        assert_eq!(nodes[0].props["title"], "label_11.props.text");
        assert_eq!(nodes[0].props["index"], "0");
        assert_eq!(nodes[1].props["text"], "'Hi ' + card_10.props.name");
        assert_eq!(
            nodes[2].actions["click"],
            "setState('label', { text: label_11.props.text })"
        );
    }

    #[test]
    fn linked_nodes_remember_their_template_row() {
        let engine = ScriptletEngine::new();
        let mut rows = template();
        for row in &mut rows {
            row.schema_id = "card".into();
        }
        let (inner, next) = link_nodes("frame", "panel", &Scriptlets::new(), &rows, 0, &engine);
        assert_eq!(inner[1].origin, Some(RowRef::new("card", "label")));

        let (outer, _) = link_nodes("host", "main", &Scriptlets::new(), &inner, next, &engine);
        assert_eq!(outer[1].id, "label_1_4");
        assert_eq!(outer[1].schema_id, "main");
        assert_eq!(outer[1].origin, Some(RowRef::new("card", "label")));
    }

    #[test]
    fn repeated_links_never_collide() {
        let engine = ScriptletEngine::new();
        let (first, next) = link_nodes("list", "main", &Scriptlets::new(), &template(), 0, &engine);
        let (second, _) = link_nodes("list", "main", &Scriptlets::new(), &template(), next, &engine);
        for node in &first {
            assert!(second.iter().all(|other| other.id != node.id));
        }
    }

    #[test]
    fn link_tree_keeps_shape() {
        let engine = ScriptletEngine::new();
        let rows = template();
        let tree = TreeNode {
            node: rows[0].clone(),
            children: vec![TreeNode::leaf(rows[1].clone()), TreeNode::leaf(rows[2].clone())],
            is_ref: true,
            editor_props: Default::default(),
        };
        let (linked, next) = link_tree("list", "main", &Scriptlets::new(), &tree, 3, &engine);
        assert_eq!(next, 6);
        assert!(linked.is_ref);
        assert_eq!(linked.node.id, "card_3");
        assert_eq!(linked.children[1].node.id, "go_5");
        assert_eq!(flatten(&linked).len(), 3);
    }
}
