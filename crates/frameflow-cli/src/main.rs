// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use clap::{Parser, Subcommand};
use frameflow_cli::commands;
use frameflow_cli::commands::eval::EvalArgs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "frameflow")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Build and evaluate frame trees from node tables", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a schema and print the resolved state
    Eval {
        /// Schema to evaluate (defaults to the project entry)
        #[arg(short, long)]
        schema: Option<String>,
        /// JSON file with the external context
        #[arg(short, long)]
        context: Option<PathBuf>,
        /// Number of passes to run
        #[arg(short, long, default_value = "1")]
        passes: usize,
    },
    /// Print the built tree of a schema
    Tree {
        /// Schema to build (defaults to the project entry)
        #[arg(short, long)]
        schema: Option<String>,
    },
    /// Watch node tables and re-evaluate on change
    Watch {
        /// Schema to evaluate (defaults to the project entry)
        #[arg(short, long)]
        schema: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with the specified log level
    let filter = EnvFilter::try_new(&cli.log_level)
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Eval { schema, context, passes } => {
            commands::eval::run(EvalArgs { schema, context, passes }).await
        }
        Commands::Tree { schema } => commands::tree::run(schema).await,
        Commands::Watch { schema } => commands::watch::run(schema).await,
    }
}
