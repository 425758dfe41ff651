// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! File watcher command: re-evaluate whenever a node table changes.

use crate::commands::eval::open_session;
use crate::config::Project;
use crate::watcher::FileWatcher;
use frameflow::{Context, NoApi, ResultStore, Session};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;

/// Rebuilds the session from the store and runs one pass.
pub fn refresh(session: &Session, context: &Context) -> anyhow::Result<ResultStore> {
    session.rebuild()?;
    Ok(session.evaluate(context, &NoApi)?)
}

fn summary(result: &ResultStore) -> String {
    format!(
        "{} nodes, {} evaluated, {} skipped, {} diagnostics",
        result.state.len(),
        result.stats.evaluated,
        result.stats.skipped,
        result.diagnostics.len()
    )
}

/// Runs the watch command in the current directory.
pub async fn run(schema: Option<String>) -> anyhow::Result<()> {
    let project = Project::open(std::env::current_dir()?)?;
    let context = project.context(None)?;
    let session = Arc::new(open_session(&project, schema.as_deref())?);
    let store_dir = project.store_dir();

    let first = session.evaluate(&context, &NoApi)?;
    println!("Evaluated '{}': {}", session.schema(), summary(&first));
    println!("Watching for changes in: {}", store_dir.display());
    println!("Press Ctrl+C to stop...");
    println!();

    let watched = Arc::clone(&session);
    let _watcher = FileWatcher::new(&store_dir, move |paths: Vec<PathBuf>| {
        let files = paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        match refresh(&watched, &context) {
            Ok(result) => println!("  Changed: {} - {}", files, summary(&result)),
            Err(e) => {
                tracing::warn!("Re-evaluation failed: {}", e);
                println!("  Changed: {} - error: {}", files, e);
            }
        }
    })?;

    signal::ctrl_c().await?;

    println!("\nStopping file watcher...");
    Ok(())
}
