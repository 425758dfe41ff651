// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Persisted node records and the node-table shape exchanged with the store.
//!
//! A [`NodeTable`] is the full contract with the persistence collaborator:
//! schema metadata, declared parameter columns and the flat row set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from property name to scriptlet source (or constant literal).
pub type Scriptlets = BTreeMap<String, String>;

/// Mapping from property name to declared metadata (types, defaults, attrs).
pub type PropMeta = BTreeMap<String, serde_json::Value>;

/// Node type tag from the fixed vocabulary.
///
/// Tags that are not part of the vocabulary deserialize as [`NodeKind::Unknown`]
/// and behave like plain leaf widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Generic container.
    #[default]
    Group,
    /// Reference to another schema, expanded by the tree builder.
    Frame,
    /// One column of a `columns` layout.
    Column,
    /// Horizontal layout of columns.
    Columns,
    /// Repeats its child template once per item of its `value` prop.
    List,
    /// Activates exactly one `slide` child.
    Slides,
    /// One selectable subtree of a `slides` control.
    Slide,
    /// Pass-through slot receiving a frame reference's authored children.
    Content,
    /// Streaming/delta node, re-derived every pass.
    Stream,
    /// Text widget.
    Text,
    /// Button widget.
    Button,
    /// Input widget.
    Input,
    /// Image widget.
    Image,
    /// Icon widget.
    Icon,
    /// Checkbox widget.
    Checkbox,
    /// Select widget.
    Select,
    /// Table widget.
    Table,
    /// Chart widget.
    Chart,
    /// Any tag outside the vocabulary.
    #[serde(other)]
    Unknown,
}

impl NodeKind {
    /// Returns the lowercase tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Group => "group",
            NodeKind::Frame => "frame",
            NodeKind::Column => "column",
            NodeKind::Columns => "columns",
            NodeKind::List => "list",
            NodeKind::Slides => "slides",
            NodeKind::Slide => "slide",
            NodeKind::Content => "content",
            NodeKind::Stream => "stream",
            NodeKind::Text => "text",
            NodeKind::Button => "button",
            NodeKind::Input => "input",
            NodeKind::Image => "image",
            NodeKind::Icon => "icon",
            NodeKind::Checkbox => "checkbox",
            NodeKind::Select => "select",
            NodeKind::Table => "table",
            NodeKind::Chart => "chart",
            NodeKind::Unknown => "unknown",
        }
    }
}

/// The persisted unit: one element of a node tree.
///
/// `rank` is unique among siblings sharing a `parent_id`; `id` is unique within
/// the owning schema's rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Node {
    /// Identifier, unique within the owning schema.
    pub id: String,
    /// Parent identifier; empty for the schema root.
    pub parent_id: String,
    /// The owning schema (table or template).
    pub schema_id: String,
    /// Type tag.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Sibling order.
    pub rank: i64,
    /// Property scriptlets.
    pub props: Scriptlets,
    /// Style scriptlets.
    pub styles: Scriptlets,
    /// Action scriptlets.
    pub actions: Scriptlets,
    /// Declared parameter types (frame templates).
    pub types: PropMeta,
    /// Declared parameter default values (frame templates).
    pub props_value: PropMeta,
    /// Declared parameter display attributes (frame templates).
    pub props_attrs: PropMeta,
    /// Reference target receiving this node's state when mirrored by a slides control.
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    /// Schema referenced by a `frame` node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<String>,
    /// Template row this node was linked from; unset on authored rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<RowRef>,
}

/// Locates a row: a schema and a row id within it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowRef {
    /// The owning schema.
    pub schema_id: String,
    /// The row id.
    pub id: String,
}

impl RowRef {
    /// The row `id` of `schema_id`.
    pub fn new(schema_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            schema_id: schema_id.into(),
            id: id.into(),
        }
    }

    /// The row a node is persisted in: its origin, else its own id and schema.
    pub fn of(node: &Node) -> Self {
        node.origin
            .clone()
            .unwrap_or_else(|| Self::new(node.schema_id.clone(), node.id.clone()))
    }
}

impl Node {
    /// Creates a node with the given id, parent and kind.
    pub fn new(id: impl Into<String>, parent_id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
            kind,
            ..Default::default()
        }
    }

    /// Sets the sibling rank.
    pub fn with_rank(mut self, rank: i64) -> Self {
        self.rank = rank;
        self
    }

    /// Adds a property scriptlet.
    pub fn with_prop(mut self, key: impl Into<String>, source: impl Into<String>) -> Self {
        self.props.insert(key.into(), source.into());
        self
    }

    /// Adds a style scriptlet.
    pub fn with_style(mut self, key: impl Into<String>, source: impl Into<String>) -> Self {
        self.styles.insert(key.into(), source.into());
        self
    }

    /// Adds an action scriptlet.
    pub fn with_action(mut self, key: impl Into<String>, source: impl Into<String>) -> Self {
        self.actions.insert(key.into(), source.into());
        self
    }

    /// Sets the schema referenced by a frame node.
    pub fn with_frame(mut self, schema: impl Into<String>) -> Self {
        self.frame = Some(schema.into());
        self
    }

    /// Sets the mirror reference target.
    pub fn with_ref(mut self, target: impl Into<String>) -> Self {
        self.ref_id = Some(target.into());
        self
    }
}

/// Schema metadata of a node table.
///
/// `def` carries structural configuration opaque to the engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaInfo {
    /// Schema identifier (also the id of the root node).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Schema type tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Opaque structural configuration.
    pub def: serde_json::Value,
}

/// A declared parameter field of a schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Column {
    /// Parameter name.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Default value, in any JSON shape.
    pub default_value: serde_json::Value,
    /// Display attributes.
    pub attrs: serde_json::Value,
}

/// A flat node table: the unit loaded from and saved to the store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeTable {
    /// Schema metadata.
    pub schema: SchemaInfo,
    /// Declared parameter fields.
    pub columns: Vec<Column>,
    /// Flat row set.
    pub rows: Vec<Node>,
}

impl NodeTable {
    /// Creates a table for the given schema id with no columns.
    pub fn new(schema_id: impl Into<String>, rows: Vec<Node>) -> Self {
        let id = schema_id.into();
        Self {
            schema: SchemaInfo {
                name: id.clone(),
                id,
                ..Default::default()
            },
            columns: Vec::new(),
            rows,
        }
    }

    /// Adds a declared parameter column.
    pub fn with_column(mut self, name: impl Into<String>, default_value: serde_json::Value) -> Self {
        self.columns.push(Column {
            name: name.into(),
            default_value,
            ..Default::default()
        });
        self
    }

    /// Finds a row by id.
    pub fn row(&self, id: &str) -> Option<&Node> {
        self.rows.iter().find(|n| n.id == id)
    }

    /// Finds a row by id for mutation.
    pub fn row_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.rows.iter_mut().find(|n| n.id == id)
    }
}

/// Renders a JSON value as a constant scriptlet literal.
///
/// Strings become single-quoted literals so the result passes the constancy test.
pub fn literal_scriptlet(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => {
            let escaped = s.replace('\\', "\\\\").replace('\'', "\\'").replace('\n', "\\n");
            format!("'{}'", escaped)
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_rows_use_wire_names() {
        let node: Node = serde_json::from_value(json!({
            "id": "n1",
            "parentId": "main",
            "type": "text",
            "rank": 2,
            "props": { "text": "'hello'" },
            "ref": "target"
        }))
        .unwrap();

        assert_eq!(node.kind, NodeKind::Text);
        assert_eq!(node.parent_id, "main");
        assert_eq!(node.ref_id.as_deref(), Some("target"));
        assert_eq!(node.props["text"], "'hello'");
    }

    #[test]
    fn unknown_tags_fall_back() {
        let node: Node = serde_json::from_value(json!({ "id": "x", "type": "marquee" })).unwrap();
        assert_eq!(node.kind, NodeKind::Unknown);
    }

    #[test]
    fn literal_scriptlet_quotes_strings() {
        assert_eq!(literal_scriptlet(&json!("it's")), r"'it\'s'");
        assert_eq!(literal_scriptlet(&json!(3)), "3");
        assert_eq!(literal_scriptlet(&json!([1, 2])), "[1,2]");
    }
}
