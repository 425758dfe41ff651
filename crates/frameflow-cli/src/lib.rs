// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! Frameflow CLI library.
//!
//! This crate provides the command-line interface for the Frameflow engine:
//! evaluating schemas from a directory of node tables, dumping built trees
//! and re-evaluating on change.
//!
//! # Usage
//!
//! This crate is primarily used through the `frameflow` binary:
//!
//! ```bash
//! frameflow eval --passes 2     # Evaluate the entry schema twice
//! frameflow tree --schema card  # Print the expanded tree of a schema
//! frameflow watch               # Re-evaluate on table changes
//! ```
//!
//! # Configuration
//!
//! Projects are configured via `frameflow.toml` at the project root.

/// CLI commands (eval, tree, watch).
pub mod commands;
/// Project configuration from `frameflow.toml`.
pub mod config;
/// File system watching for table changes.
pub mod watcher;
