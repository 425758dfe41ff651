// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the frame execution engine.
//!
//! This module defines [`FrameError`], the main error enum, and helper types
//! for rich error reporting with source context.
//!
//! # Error Categories
//!
//! - **Parse errors**: Invalid scriptlet syntax
//! - **Store errors**: Node tables that cannot be loaded or saved
//! - **Tree errors**: Structural problems that cannot be recovered by omission
//! - **Cycle errors**: Same-node property dependency cycles
//! - **Runtime errors**: Failures while executing a scriptlet
//!
//! Structural losses that the engine recovers from (dangling parents, empty
//! templates) are not errors; they are logged and the node is dropped.

use std::fmt;
use thiserror::Error;

/// Source context for enhanced error messages.
///
/// Captures a snippet of scriptlet source around an error location,
/// enabling rich error messages with line numbers and a caret.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceContext {
    /// All lines from the scriptlet.
    pub lines: Vec<String>,
    /// The line number where the error occurred (1-indexed).
    pub error_line: usize,
    /// The column number where the error occurred (1-indexed).
    pub error_column: usize,
    /// First line number of the snippet (1-indexed).
    pub snippet_start: usize,
    /// Last line number of the snippet (1-indexed).
    pub snippet_end: usize,
}

impl SourceContext {
    /// Creates a source context from source code and error location.
    ///
    /// Captures 2 lines before and after the error line. Scriptlets are short.
    pub fn from_source(source: &str, line: usize, column: usize) -> Self {
        let lines: Vec<String> = source.lines().map(|l| l.to_string()).collect();
        let snippet_start = line.saturating_sub(2).max(1);
        let snippet_end = (line + 2).min(lines.len());

        Self {
            lines,
            error_line: line,
            error_column: column,
            snippet_start,
            snippet_end,
        }
    }

    /// Formats the source snippet with line numbers and error indicator.
    ///
    /// ```text
    ///    1 | a + * 2
    ///      |     ^
    /// ```
    pub fn format_snippet(&self) -> String {
        let mut result = String::new();

        for line_num in self.snippet_start..=self.snippet_end {
            if line_num > self.lines.len() {
                break;
            }

            let line = &self.lines[line_num - 1];
            result.push_str(&format!("{:4} | {}\n", line_num, line));

            if line_num == self.error_line {
                result.push_str(&format!(
                    "     | {}^\n",
                    " ".repeat(self.error_column.saturating_sub(1))
                ));
            }
        }

        result
    }
}

impl fmt::Display for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_snippet())
    }
}

/// Helper struct for displaying optional source context.
pub struct OptSourceContextDisplay<'a>(pub &'a Option<SourceContext>);

impl fmt::Display for OptSourceContextDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ctx) => write!(f, "{}", ctx),
            None => Ok(()),
        }
    }
}

/// Helper trait for formatting optional source context.
pub trait AsDisplay<'a> {
    /// Wraps self for Display formatting.
    fn as_display(&'a self) -> OptSourceContextDisplay<'a>;
}

impl<'a> AsDisplay<'a> for Option<SourceContext> {
    fn as_display(&'a self) -> OptSourceContextDisplay<'a> {
        OptSourceContextDisplay(self)
    }
}

/// The main error type for frameflow operations.
#[derive(Error, Debug)]
pub enum FrameError {
    /// Scriptlet parsing failed due to invalid syntax.
    #[error("Parse error: {message} at line {line}, column {column}\n{}", source_context.as_display())]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Line number where the error occurred.
        line: usize,
        /// Column number where the error occurred.
        column: usize,
        /// Source context for rich error display.
        source_context: Option<SourceContext>,
    },

    /// The persistence collaborator failed.
    #[error("Store error: {0}")]
    StoreError(String),

    /// A schema reference could not be resolved to a node table.
    #[error("Schema not found: {0}")]
    SchemaNotFound(String),

    /// The tree could not be built at all (for example, no rows and no root).
    #[error("Invalid tree: {0}")]
    InvalidTree(String),

    /// A node's same-bucket properties depend on each other in a cycle.
    #[error("Dependency cycle in node {node}: {}", path.join(" -> "))]
    Cycle {
        /// The node whose properties form the cycle.
        node: String,
        /// The property keys on the cycle, first key repeated at the end.
        path: Vec<String>,
    },

    /// A scriptlet failed while executing.
    #[error("Runtime error: {0}")]
    RuntimeError(String),

    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Node table (de)serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Convenience type alias for Results with [`FrameError`].
pub type Result<T> = std::result::Result<T, FrameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_points_at_column() {
        let ctx = SourceContext::from_source("a +\n* 2", 2, 1);
        let snippet = ctx.format_snippet();
        assert!(snippet.contains("   2 | * 2"));
        assert!(snippet.contains("     | ^"));
    }

    #[test]
    fn cycle_message_lists_path() {
        let err = FrameError::Cycle {
            node: "n1".to_string(),
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Dependency cycle in node n1: a -> b -> a");
    }
}
