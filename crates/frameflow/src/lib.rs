// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]
#![allow(clippy::result_large_err)]

//! # Frameflow
//!
//! Incremental frame execution engine for Rust.
//!
//! Frameflow turns flat node tables (one per schema) into live trees whose
//! props, styles and actions are small scriptlets. A pass resolves every
//! scriptlet in dependency order, reusing whatever the previous pass
//! computed for subtrees whose inputs did not change.
//!
//! ## Features
//!
//! - Frame nodes that instantiate other schemas as private, relinked copies
//! - A small expression language with dependency extraction and renaming
//! - Per-bucket topological ordering with cycle diagnostics
//! - Memoized passes keyed on source fingerprints and dependency values
//! - Lists, slides with state mirroring, and persisting `setState` actions
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use frameflow::{Context, FileSystemNodeStore, NoApi, Session};
//! use std::sync::Arc;
//!
//! let store = FileSystemNodeStore::new("./schemas");
//! let session = Session::open(Arc::new(store), "main")?;
//!
//! let result = session.evaluate(&Context::new(), &NoApi)?;
//! println!("{}", serde_json::to_string_pretty(&result.state_json())?);
//! ```

/// Script compilation cache.
pub mod cache;
/// Executable tree compilation.
pub mod compiler;
/// Key ordering within a node's buckets.
pub mod dependencies;
/// Error types and reporting.
pub mod error;
/// Node kind behaviors and editor props.
pub mod kind;
/// Id renaming for tree instantiation.
pub mod linker;
/// Node rows and tables.
pub mod node;
/// Pass evaluation, actions and result state.
pub mod runtime;
/// The scriptlet language.
pub mod script;
/// Stateful evaluation sessions.
pub mod session;
/// Node table persistence.
pub mod store;
/// Tree building from node tables.
pub mod tree;


pub use cache::{ScriptCache, DEFAULT_CACHE_SIZE};
pub use compiler::{CompiledBucket, Compiler, ExecOptions, ExecutableNode};
pub use dependencies::{local_dependencies, order_keys};
pub use error::{FrameError, Result};
pub use kind::{editor_props, Drag, EditorInput, EditorProps, EvalRole, KindBehavior, Resize};
pub use linker::{flatten, link_nodes, link_tree, relink, unflatten};
pub use node::{literal_scriptlet, Column, Node, NodeKind, NodeTable, PropMeta, RowRef, SchemaInfo, Scriptlets};
pub use runtime::{
    evaluate, invoke_action, ActionCall, ActionOutcome, Api, Context, Diagnostic, DiagnosticKind,
    EvalOptions, Evaluator, NoApi, NodeState, PassStats, ResultStore, StateMap, StyleSheet,
    ThemeRule, ValueMap, RUN_ACTION,
};
pub use script::{
    CompiledScript, DepPath, ScriptEngine, ScriptError, ScriptKind, ScriptletEngine, Value, ERROR_VALUE,
};
pub use session::Session;
#[cfg(feature = "filesystem")]
pub use store::FileSystemNodeStore;
pub use store::{MemoryNodeStore, NodeStore};
pub use tree::{BuiltTree, TreeBuilder, TreeNode};
