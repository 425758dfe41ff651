// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Frameflow project configuration.
//!
//! Configuration is loaded from `frameflow.toml` at the project root.
//!
//! # Example Configuration
//!
//! ```toml
//! [project]
//! name = "my-app"
//! entry = "main"
//!
//! [store]
//! dir = "schemas"
//!
//! [eval]
//! cache_size = 256
//! context = "context.json"
//!
//! [[theme.rules]]
//! kind = "button"
//! styles = { color = "white", background = "navy" }
//! ```

use anyhow::Context as _;
use frameflow::{Compiler, Context, EvalOptions, FileSystemNodeStore, StyleSheet, DEFAULT_CACHE_SIZE};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the project root.
pub const CONFIG_FILE: &str = "frameflow.toml";

/// Main configuration structure loaded from `frameflow.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Project metadata.
    #[serde(default)]
    pub project: ProjectConfig,
    /// Node table location.
    #[serde(default)]
    pub store: StoreConfig,
    /// Evaluation settings.
    #[serde(default)]
    pub eval: EvalConfig,
    /// Style sheet merged over resolved styles.
    #[serde(default)]
    pub theme: StyleSheet,
}

/// Project metadata configuration.
#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    /// Project name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Schema evaluated when no `--schema` is given (default: "main").
    #[serde(default = "default_entry")]
    pub entry: String,
}

/// Where node tables live.
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    /// Directory of `<schema>.json` tables (default: "schemas").
    #[serde(default = "default_store_dir")]
    pub dir: String,
}

/// Evaluation settings.
#[derive(Debug, Deserialize)]
pub struct EvalConfig {
    /// Compiled scriptlet cache capacity (default: 256).
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    /// JSON file with the external context, relative to the project root.
    #[serde(default)]
    pub context: Option<String>,
}

fn default_name() -> String {
    "unnamed".to_string()
}

fn default_entry() -> String {
    "main".to_string()
}

fn default_store_dir() -> String {
    "schemas".to_string()
}

fn default_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            entry: default_entry(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            cache_size: default_cache_size(),
            context: None,
        }
    }
}

impl Config {
    /// Loads configuration from `frameflow.toml` in the current directory.
    ///
    /// If no configuration file exists, returns default configuration.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Loads configuration from `frameflow.toml` in `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be parsed.
    pub fn load_from(root: &Path) -> anyhow::Result<Self> {
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid {}", config_path.display()))?;
        Ok(config)
    }
}

/// A loaded configuration bound to its project root.
#[derive(Debug)]
pub struct Project {
    /// Directory holding `frameflow.toml`.
    pub root: PathBuf,
    /// The configuration.
    pub config: Config,
}

impl Project {
    /// Loads the project rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        let config = Config::load_from(&root)?;
        Ok(Self { root, config })
    }

    /// Directory of the node tables.
    pub fn store_dir(&self) -> PathBuf {
        self.root.join(&self.config.store.dir)
    }

    /// The node store over [`Project::store_dir`].
    pub fn store(&self) -> FileSystemNodeStore {
        FileSystemNodeStore::new(self.store_dir())
    }

    /// The schema to evaluate: `schema` if given, else the configured entry.
    pub fn schema<'a>(&'a self, schema: Option<&'a str>) -> &'a str {
        schema.unwrap_or(&self.config.project.entry)
    }

    /// A compiler sized by `[eval] cache_size`.
    pub fn compiler(&self) -> Compiler {
        Compiler::with_cache_size(self.config.eval.cache_size)
    }

    /// Evaluation options carrying the configured theme.
    pub fn eval_options(&self) -> EvalOptions {
        EvalOptions {
            theme: if self.config.theme.rules.is_empty() {
                None
            } else {
                Some(self.config.theme.clone())
            },
        }
    }

    /// Reads the external context from `path`, or from `[eval] context`.
    ///
    /// No file means an empty context. The file must hold a JSON object.
    pub fn context(&self, path: Option<&Path>) -> anyhow::Result<Context> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match &self.config.eval.context {
                Some(path) => self.root.join(path),
                None => return Ok(Context::new()),
            },
        };

        let source = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read context file {}", path.display()))?;
        let context: Context = serde_json::from_str(&source)
            .with_context(|| format!("Context file {} must hold a JSON object", path.display()))?;
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frameflow::NodeKind;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let project = Project::open(dir.path()).unwrap();
        assert_eq!(project.config.project.entry, "main");
        assert_eq!(project.config.eval.cache_size, 256);
        assert_eq!(project.store_dir(), dir.path().join("schemas"));
        assert!(project.eval_options().theme.is_none());
        assert!(project.context(None).unwrap().is_empty());
    }

    #[test]
    fn parses_all_sections() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
[project]
name = "demo"
entry = "home"

[store]
dir = "tables"

[eval]
cache_size = 8
context = "ctx.json"

[[theme.rules]]
kind = "button"
styles = { color = "white" }

[[theme.rules]]
class = "muted"
styles = { opacity = 0.5 }
"#,
        )
        .unwrap();
        fs::write(dir.path().join("ctx.json"), r#"{ "user": { "name": "ada" } }"#).unwrap();

        let project = Project::open(dir.path()).unwrap();
        assert_eq!(project.config.project.name, "demo");
        assert_eq!(project.schema(None), "home");
        assert_eq!(project.schema(Some("other")), "other");
        assert_eq!(project.store_dir(), dir.path().join("tables"));
        assert_eq!(project.config.eval.cache_size, 8);

        let theme = project.eval_options().theme.unwrap();
        assert_eq!(theme.rules.len(), 2);
        assert_eq!(theme.rules[0].kind, Some(NodeKind::Button));
        assert_eq!(theme.rules[1].class.as_deref(), Some("muted"));

        let context = project.context(None).unwrap();
        assert_eq!(context["user"]["name"], "ada");
    }

    #[test]
    fn non_object_context_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ctx.json");
        fs::write(&path, "[1, 2]").unwrap();
        let project = Project::open(dir.path()).unwrap();
        assert!(project.context(Some(&path)).is_err());
    }
}
