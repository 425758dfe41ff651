// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Eval command: build a schema, run passes and print the result.

use crate::config::Project;
use frameflow::{NoApi, ResultStore, Session};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

/// Options of the eval command.
#[derive(Debug, Clone, Default)]
pub struct EvalArgs {
    /// Schema to evaluate instead of the configured entry.
    pub schema: Option<String>,
    /// Context file overriding `[eval] context`.
    pub context: Option<PathBuf>,
    /// Number of passes, each fed the previous result (at least one).
    pub passes: usize,
}

/// Opens a session for `schema` (or the entry schema) of `project`.
pub fn open_session(project: &Project, schema: Option<&str>) -> anyhow::Result<Session> {
    let schema = project.schema(schema);
    let session = Session::with_options(
        Arc::new(project.store()),
        schema,
        project.compiler(),
        project.eval_options(),
    )?;
    Ok(session)
}

/// Runs the passes and returns the last result.
pub fn evaluate(project: &Project, args: &EvalArgs) -> anyhow::Result<ResultStore> {
    let session = open_session(project, args.schema.as_deref())?;
    let context = project.context(args.context.as_deref())?;

    let mut result = session.evaluate(&context, &NoApi)?;
    for _ in 1..args.passes.max(1) {
        result = session.evaluate(&context, &NoApi)?;
    }
    Ok(result)
}

/// The printed form of a result.
pub fn report(result: &ResultStore) -> serde_json::Value {
    json!({
        "state": result.state_json(),
        "diagnostics": result.diagnostics,
        "stats": result.stats,
    })
}

/// Runs the eval command in the current directory.
pub async fn run(args: EvalArgs) -> anyhow::Result<()> {
    let project = Project::open(std::env::current_dir()?)?;
    let result = evaluate(&project, &args)?;
    for diagnostic in &result.diagnostics {
        eprintln!(
            "  {:?} {}.{}: {}",
            diagnostic.kind, diagnostic.node, diagnostic.key, diagnostic.message
        );
    }
    println!("{}", serde_json::to_string_pretty(&report(&result))?);
    Ok(())
}
