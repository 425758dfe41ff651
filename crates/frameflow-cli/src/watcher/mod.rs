// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! File system watching for node table directories.
//!
//! Change events are debounced (750ms) and filtered to `.json` tables, so a
//! burst of saves triggers a single re-evaluation.

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Debounce window for change bursts.
pub const DEBOUNCE: Duration = Duration::from_millis(750);

/// Watches a directory for changes to node table files.
///
/// Watching stops when the value is dropped.
pub struct FileWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl FileWatcher {
    /// Starts watching `path` recursively.
    ///
    /// `on_change` receives the changed table files relative to `path`.
    pub fn new<F>(path: &Path, on_change: F) -> anyhow::Result<Self>
    where
        F: Fn(Vec<PathBuf>) + Send + 'static,
    {
        let base_path = path.to_path_buf();
        let mut debouncer = new_debouncer(DEBOUNCE, None, move |result: DebounceEventResult| match result {
            Ok(events) => {
                let changed = table_paths(&base_path, events.iter().flat_map(|e| e.paths.iter()));
                if !changed.is_empty() {
                    on_change(changed);
                }
            }
            Err(errors) => {
                for error in errors {
                    tracing::warn!("Watch error: {}", error);
                }
            }
        })?;

        debouncer.watch(path, RecursiveMode::Recursive)?;
        tracing::debug!("Watching {}", path.display());
        Ok(Self { _debouncer: debouncer })
    }
}

/// Keeps `.json` paths, relative to `base`, without duplicates.
fn table_paths<'a>(base: &Path, paths: impl Iterator<Item = &'a PathBuf>) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = Vec::new();
    for path in paths {
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let relative = path.strip_prefix(base).unwrap_or(path).to_path_buf();
        if !out.contains(&relative) {
            out.push(relative);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_tables_are_reported() {
        let base = PathBuf::from("/project/schemas");
        let paths = vec![
            base.join("main.json"),
            base.join("main.json.tmp"),
            base.join("notes.txt"),
            base.join("main.json"),
            base.join("nested/card.json"),
        ];
        assert_eq!(
            table_paths(&base, paths.iter()),
            vec![PathBuf::from("main.json"), PathBuf::from("nested/card.json")]
        );
    }
}
