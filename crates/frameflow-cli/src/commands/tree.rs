// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Tree command: print the built tree of a schema.

use crate::config::Project;
use frameflow::{TreeBuilder, TreeNode};

/// Builds `schema` (or the entry schema) with frames expanded.
pub fn build(project: &Project, schema: Option<&str>) -> anyhow::Result<TreeNode> {
    let store = project.store();
    let compiler = project.compiler();
    let built = TreeBuilder::new(&store, compiler.engine()).build(project.schema(schema))?;
    Ok(built.root)
}

/// Runs the tree command in the current directory.
pub async fn run(schema: Option<String>) -> anyhow::Result<()> {
    let project = Project::open(std::env::current_dir()?)?;
    let tree = build(&project, schema.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&tree)?);
    Ok(())
}
