// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Runtime evaluation of executable trees.
//!
//! - [`Evaluator`] / [`evaluate`]: one pass, producing a [`ResultStore`]
//! - [`invoke_action`]: running an action against a finished pass
//! - [`StyleSheet`]: theme rules merged over resolved styles

mod actions;
mod evaluator;
mod scope;
pub mod state;
pub mod theme;

pub use actions::{invoke_action, ActionCall, ActionOutcome, Api, NoApi};
pub use evaluator::{evaluate, EvalOptions, Evaluator, RUN_ACTION};
pub use state::{
    Context, Diagnostic, DiagnosticKind, NodeState, PassStats, ResultStore, StateMap, ValueMap,
};
pub use theme::{StyleSheet, ThemeRule};
