// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Per-kind behavior lookup and editor affordances.
//!
//! Every decision that depends on a node's type tag goes through
//! [`NodeKind::behavior`], so the tree builder, compiler and evaluator share
//! one table instead of matching on kinds individually.

use crate::node::NodeKind;
use serde::{Deserialize, Serialize};

/// How the editor lets a node be dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Drag {
    /// Not draggable.
    #[default]
    None,
    /// Draggable by its handle only.
    Handle,
    /// Draggable anywhere.
    Free,
}

/// How the editor lets a node be resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resize {
    /// Fixed size.
    #[default]
    None,
    /// Width only.
    Horizontal,
    /// Width and height.
    Both,
}

/// Derived editor metadata of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorProps {
    /// Drag mode.
    pub drag: Drag,
    /// Whether other nodes may be dropped into this one.
    pub drop: bool,
    /// Resize mode.
    pub resize: Resize,
    /// All interaction disabled (reference or template content).
    pub locked: bool,
}

impl EditorProps {
    /// Everything disabled.
    pub const LOCKED: EditorProps = EditorProps {
        drag: Drag::None,
        drop: false,
        resize: Resize::None,
        locked: true,
    };

    const fn open(drag: Drag, drop: bool, resize: Resize) -> Self {
        EditorProps {
            drag,
            drop,
            resize,
            locked: false,
        }
    }
}

/// What the editor rules see of a node and its position.
#[derive(Debug, Clone, Copy)]
pub struct EditorInput<'a> {
    /// The node's kind.
    pub kind: NodeKind,
    /// Distance from the root (root is 0).
    pub depth: usize,
    /// Number of children.
    pub child_count: usize,
    /// Whether the node was expanded from a template.
    pub is_ref: bool,
    /// The parent's kind and editor props, absent for the root.
    pub parent: Option<(NodeKind, &'a EditorProps)>,
}

/// How the evaluator treats a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalRole {
    /// Ordinary node.
    Plain,
    /// Multiplies its template per item of its `value` prop.
    List,
    /// Selects one `slide` child and mirrors it.
    Slides,
    /// Selectable subtree of a slides control.
    Slide,
    /// Pass-through slot.
    Content,
    /// Streaming node.
    Stream,
}

/// Behavior of one node kind.
#[derive(Debug, Clone, Copy)]
pub struct KindBehavior {
    /// Accepts child nodes in the editor.
    pub container: bool,
    /// Must be re-derived every pass.
    pub volatile: bool,
    /// Expanded from another schema by the tree builder.
    pub expands: bool,
    /// Evaluation special-casing.
    pub role: EvalRole,
    /// Editor rule applied after the generic ones.
    pub editor: fn(&EditorInput<'_>) -> EditorProps,
}

const fn plain(container: bool) -> KindBehavior {
    KindBehavior {
        container,
        volatile: false,
        expands: false,
        role: EvalRole::Plain,
        editor: positional_editor,
    }
}

const fn special(role: EvalRole, editor: fn(&EditorInput<'_>) -> EditorProps) -> KindBehavior {
    KindBehavior {
        container: true,
        volatile: true,
        expands: false,
        role,
        editor,
    }
}

static GROUP: KindBehavior = plain(true);
static COLUMNS: KindBehavior = plain(true);
static COLUMN: KindBehavior = KindBehavior {
    editor: column_editor,
    ..plain(true)
};
static LEAF: KindBehavior = plain(false);
static FRAME: KindBehavior = KindBehavior {
    expands: true,
    ..plain(false)
};
static LIST: KindBehavior = special(EvalRole::List, positional_editor);
static SLIDES: KindBehavior = special(EvalRole::Slides, positional_editor);
static SLIDE: KindBehavior = special(EvalRole::Slide, slide_editor);
static CONTENT: KindBehavior = special(EvalRole::Content, positional_editor);
static STREAM: KindBehavior = KindBehavior {
    container: false,
    ..special(EvalRole::Stream, positional_editor)
};

impl NodeKind {
    /// The behavior table entry of this kind.
    pub fn behavior(self) -> &'static KindBehavior {
        match self {
            NodeKind::Group => &GROUP,
            NodeKind::Columns => &COLUMNS,
            NodeKind::Column => &COLUMN,
            NodeKind::Frame => &FRAME,
            NodeKind::List => &LIST,
            NodeKind::Slides => &SLIDES,
            NodeKind::Slide => &SLIDE,
            NodeKind::Content => &CONTENT,
            NodeKind::Stream => &STREAM,
            NodeKind::Text
            | NodeKind::Button
            | NodeKind::Input
            | NodeKind::Image
            | NodeKind::Icon
            | NodeKind::Checkbox
            | NodeKind::Select
            | NodeKind::Table
            | NodeKind::Chart
            | NodeKind::Unknown => &LEAF,
        }
    }
}

/// Computes a node's editor props from its parent's.
pub fn editor_props(input: &EditorInput<'_>) -> EditorProps {
    if let Some((parent_kind, parent)) = input.parent {
        let reopened = parent_kind == NodeKind::Content && !input.is_ref;
        if input.is_ref || parent_kind == NodeKind::List || (parent.locked && !reopened) {
            return EditorProps::LOCKED;
        }
    } else if input.is_ref {
        return EditorProps::LOCKED;
    }

    if input.depth == 0 {
        return EditorProps::open(Drag::None, true, Resize::None);
    }
    (input.kind.behavior().editor)(input)
}

fn positional_editor(input: &EditorInput<'_>) -> EditorProps {
    let container = input.kind.behavior().container;
    match (input.depth, container) {
        (1, true) => EditorProps::open(Drag::Free, true, Resize::Both),
        (1, false) => EditorProps::open(Drag::Handle, false, Resize::Both),
        (_, true) => EditorProps::open(Drag::Free, true, Resize::None),
        (_, false) => EditorProps::open(Drag::Free, false, Resize::Both),
    }
}

fn column_editor(input: &EditorInput<'_>) -> EditorProps {
    let drag = if input.child_count == 0 { Drag::Handle } else { Drag::None };
    EditorProps::open(drag, true, Resize::Horizontal)
}

fn slide_editor(_input: &EditorInput<'_>) -> EditorProps {
    EditorProps::open(Drag::None, true, Resize::None)
}
