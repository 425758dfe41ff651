// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Integration tests for the eval, tree and watch commands against a project
//! directory on disk.

use std::fs;
use std::path::Path;

use frameflow_cli::commands::eval::{evaluate, open_session, report, EvalArgs};
use frameflow_cli::commands::tree::build;
use frameflow_cli::commands::watch::refresh;
use frameflow_cli::config::Project;
use serde_json::json;
use tempfile::tempdir;

/// Create a project with a `main` schema embedding a `card` frame
fn setup_test_project(dir: &Path) {
    fs::create_dir_all(dir.join("tables")).unwrap();
    fs::write(
        dir.join("frameflow.toml"),
        r#"
[project]
name = "demo"

[store]
dir = "tables"

[eval]
context = "context.json"

[[theme.rules]]
kind = "button"
styles = { color = "white" }
"#,
    )
    .unwrap();
    fs::write(dir.join("context.json"), r#"{ "user": { "name": "ada" } }"#).unwrap();

    let card = json!({
        "schema": { "id": "card" },
        "columns": [{ "name": "label", "defaultValue": "Untitled" }],
        "rows": [
            { "id": "card", "parentId": "", "type": "group" },
            { "id": "title", "parentId": "card", "type": "text", "props": { "text": "card.props.label" } }
        ]
    });
    fs::write(dir.join("tables/card.json"), card.to_string()).unwrap();

    let main = json!({
        "schema": { "id": "main" },
        "rows": [
            { "id": "main", "parentId": "", "type": "group", "props": { "greeting": "'Hi ' + user.name" } },
            { "id": "intro", "parentId": "main", "type": "frame", "frame": "card", "props": { "label": "'Welcome'" } },
            { "id": "go", "parentId": "main", "type": "button", "rank": 1, "styles": { "color": "'black'" } }
        ]
    });
    fs::write(dir.join("tables/main.json"), main.to_string()).unwrap();
}

#[test]
fn test_eval_resolves_the_entry_schema() {
    let dir = tempdir().unwrap();
    setup_test_project(dir.path());
    let project = Project::open(dir.path()).unwrap();

    let result = evaluate(&project, &EvalArgs { passes: 1, ..Default::default() }).unwrap();
    assert_eq!(result.prop("main", "greeting"), Some(&json!("Hi ada")));
    assert_eq!(result.prop("title_1", "text"), Some(&json!("Welcome")));
    assert_eq!(result.state["go"].styles["color"], json!("white"));

    let printed = report(&result);
    assert_eq!(printed["state"]["main"]["props"]["greeting"], json!("Hi ada"));
    assert_eq!(printed["diagnostics"], json!([]));
}

#[test]
fn test_eval_passes_reuse_previous_results() {
    let dir = tempdir().unwrap();
    setup_test_project(dir.path());
    let project = Project::open(dir.path()).unwrap();

    let once = evaluate(&project, &EvalArgs { passes: 1, ..Default::default() }).unwrap();
    let twice = evaluate(&project, &EvalArgs { passes: 2, ..Default::default() }).unwrap();
    assert_eq!(once.state, twice.state);
    assert_eq!(twice.stats.invocations, 0);
}

#[test]
fn test_eval_context_override() {
    let dir = tempdir().unwrap();
    setup_test_project(dir.path());
    let other = dir.path().join("other.json");
    fs::write(&other, r#"{ "user": { "name": "grace" } }"#).unwrap();
    let project = Project::open(dir.path()).unwrap();

    let args = EvalArgs {
        context: Some(other),
        passes: 1,
        ..Default::default()
    };
    let result = evaluate(&project, &args).unwrap();
    assert_eq!(result.prop("main", "greeting"), Some(&json!("Hi grace")));
}

#[test]
fn test_eval_unknown_schema_fails() {
    let dir = tempdir().unwrap();
    setup_test_project(dir.path());
    let project = Project::open(dir.path()).unwrap();

    let args = EvalArgs {
        schema: Some("missing".to_string()),
        passes: 1,
        ..Default::default()
    };
    assert!(evaluate(&project, &args).is_err());
}

#[test]
fn test_tree_expands_frames() {
    let dir = tempdir().unwrap();
    setup_test_project(dir.path());
    let project = Project::open(dir.path()).unwrap();

    let tree = build(&project, None).unwrap();
    let card = tree.find("card_0").unwrap();
    assert!(card.is_ref);
    assert_eq!(card.node.props["label"], "'Welcome'");

    let printed = serde_json::to_value(&tree).unwrap();
    assert_eq!(printed["id"], json!("main"));
    assert_eq!(printed["children"][0]["children"][0]["isRef"], json!(true));

    let card_only = build(&project, Some("card")).unwrap();
    assert_eq!(card_only.id(), "card");
}

#[test]
fn test_watch_refresh_sees_edited_tables() {
    let dir = tempdir().unwrap();
    setup_test_project(dir.path());
    let project = Project::open(dir.path()).unwrap();
    let context = project.context(None).unwrap();

    let session = open_session(&project, None).unwrap();
    session.evaluate(&context, &frameflow::NoApi).unwrap();

    let path = dir.path().join("tables/main.json");
    let edited = fs::read_to_string(&path).unwrap().replace("'Hi ' + user.name", "'Bye ' + user.name");
    fs::write(&path, edited).unwrap();

    let result = refresh(&session, &context).unwrap();
    assert_eq!(result.prop("main", "greeting"), Some(&json!("Bye ada")));
    assert_eq!(result.prop("title_1", "text"), Some(&json!("Welcome")));
}
