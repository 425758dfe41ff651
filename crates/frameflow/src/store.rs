// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Node table persistence.
//!
//! This module provides the [`NodeStore`] trait, the only durable shared
//! resource the engine touches, and its implementations.
//!
//! # Store Implementations
//!
//! - [`FileSystemNodeStore`]: One `<schema>.json` file per table (native builds)
//! - [`MemoryNodeStore`]: Tables held in memory (testing)
//!
//! Reads happen when the tree builder loads a schema; writes happen only when
//! an action's `setState` callback asks for persistence. Write atomicity per
//! table is the store's responsibility.

use crate::error::{FrameError, Result};
use crate::node::NodeTable;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[cfg(feature = "filesystem")]
use std::path::{Path, PathBuf};

/// Trait for loading and saving flat node tables.
///
/// Implementations must be thread-safe: independent sessions may share one store.
pub trait NodeStore: Send + Sync + 'static {
    /// Loads the table for a schema reference.
    ///
    /// Returns [`FrameError::SchemaNotFound`] when no such table exists.
    fn load_node_table(&self, schema_ref: &str) -> Result<NodeTable>;

    /// Replaces the table for a schema reference.
    fn save_node_table(&self, schema_ref: &str, table: &NodeTable) -> Result<()>;
}

impl<S: NodeStore + ?Sized> NodeStore for Arc<S> {
    fn load_node_table(&self, schema_ref: &str) -> Result<NodeTable> {
        (**self).load_node_table(schema_ref)
    }

    fn save_node_table(&self, schema_ref: &str, table: &NodeTable) -> Result<()> {
        (**self).save_node_table(schema_ref, table)
    }
}

/// Memory-based node store.
///
/// Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryNodeStore {
    tables: Arc<Mutex<HashMap<String, NodeTable>>>,
}

impl MemoryNodeStore {
    /// Creates an empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a table under its schema id.
    pub fn insert(&self, table: NodeTable) {
        let key = table.schema.id.clone();
        self.with_tables(|tables| {
            tables.insert(key, table);
        });
    }

    /// Removes a table.
    pub fn remove(&self, schema_ref: &str) {
        self.with_tables(|tables| {
            tables.remove(schema_ref);
        });
    }

    /// Returns a copy of a table, if present.
    pub fn get(&self, schema_ref: &str) -> Option<NodeTable> {
        self.with_tables(|tables| tables.get(schema_ref).cloned())
    }

    fn with_tables<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut HashMap<String, NodeTable>) -> R,
    {
        // A poisoned lock only means another thread panicked mid-insert; the map is still usable.
        let mut guard = match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

impl NodeStore for MemoryNodeStore {
    fn load_node_table(&self, schema_ref: &str) -> Result<NodeTable> {
        self.get(schema_ref)
            .ok_or_else(|| FrameError::SchemaNotFound(schema_ref.to_string()))
    }

    fn save_node_table(&self, schema_ref: &str, table: &NodeTable) -> Result<()> {
        let table = table.clone();
        self.with_tables(|tables| {
            tables.insert(schema_ref.to_string(), table);
        });
        Ok(())
    }
}

/// Filesystem-based node store.
///
/// Each schema lives in `<root>/<schema>.json`. Saves write a sibling temp
/// file and rename it over the target.
#[cfg(feature = "filesystem")]
#[derive(Debug, Clone)]
pub struct FileSystemNodeStore {
    root_dir: PathBuf,
}

#[cfg(feature = "filesystem")]
impl FileSystemNodeStore {
    /// Creates a store rooted at the given directory.
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Self {
        Self {
            root_dir: root_dir.as_ref().to_path_buf(),
        }
    }

    /// The directory holding the table files.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn table_path(&self, schema_ref: &str) -> Result<PathBuf> {
        if schema_ref.is_empty()
            || schema_ref.contains(|c: char| c == '/' || c == '\\')
            || schema_ref.starts_with('.')
        {
            return Err(FrameError::StoreError(format!(
                "Invalid schema reference '{}'",
                schema_ref
            )));
        }
        Ok(self.root_dir.join(format!("{}.json", schema_ref)))
    }
}

#[cfg(feature = "filesystem")]
impl NodeStore for FileSystemNodeStore {
    fn load_node_table(&self, schema_ref: &str) -> Result<NodeTable> {
        let path = self.table_path(schema_ref)?;
        if !path.is_file() {
            return Err(FrameError::SchemaNotFound(schema_ref.to_string()));
        }

        let source = std::fs::read_to_string(&path).map_err(|e| {
            FrameError::StoreError(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        let mut table: NodeTable = serde_json::from_str(&source)?;
        if table.schema.id.is_empty() {
            table.schema.id = schema_ref.to_string();
        }

        tracing::debug!("Loaded schema '{}' ({} rows) from {}", schema_ref, table.rows.len(), path.display());
        Ok(table)
    }

    fn save_node_table(&self, schema_ref: &str, table: &NodeTable) -> Result<()> {
        let path = self.table_path(schema_ref)?;
        std::fs::create_dir_all(&self.root_dir)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(table)?)?;
        std::fs::rename(&tmp, &path)?;

        tracing::debug!("Saved schema '{}' to {}", schema_ref, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeKind};

    fn sample() -> NodeTable {
        NodeTable::new(
            "main",
            vec![
                Node::new("main", "", NodeKind::Group),
                Node::new("n1", "main", NodeKind::Text).with_prop("text", "'hi'"),
            ],
        )
    }

    #[test]
    fn memory_store_round_trips_tables() {
        let store = MemoryNodeStore::new();
        store.insert(sample());

        let table = store.load_node_table("main").unwrap();
        assert_eq!(table.rows.len(), 2);

        let shared = store.clone();
        let mut changed = table.clone();
        changed.rows.pop();
        shared.save_node_table("main", &changed).unwrap();
        assert_eq!(store.load_node_table("main").unwrap().rows.len(), 1);
    }

    #[test]
    fn memory_store_reports_missing_schema() {
        let store = MemoryNodeStore::new();
        assert!(matches!(
            store.load_node_table("nope"),
            Err(FrameError::SchemaNotFound(name)) if name == "nope"
        ));
    }

    #[cfg(feature = "filesystem")]
    #[test]
    fn filesystem_store_writes_json_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileSystemNodeStore::new(dir.path());

        store.save_node_table("main", &sample()).unwrap();
        assert!(dir.path().join("main.json").is_file());

        let loaded = store.load_node_table("main").unwrap();
        assert_eq!(loaded, sample());
        assert!(store.load_node_table("../etc").is_err());
        assert!(matches!(
            store.load_node_table("other"),
            Err(FrameError::SchemaNotFound(_))
        ));
    }
}
