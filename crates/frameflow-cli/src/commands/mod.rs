// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI command implementations.
//!
//! - `eval`: Build, evaluate and print resolved state
//! - `tree`: Print the built tree
//! - `watch`: Re-evaluate whenever a node table changes

/// Evaluation command.
pub mod eval;
/// Tree dump command.
pub mod tree;
/// File watch command.
pub mod watch;
