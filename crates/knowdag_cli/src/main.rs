//! KnowDAG CLI.
//!
//! # Responsibility
//! - Smoke-probe `knowdag_core` linkage (`ping`).
//! - Inspect, export, import and analyze projects in a SQLite file.

use clap::{Parser, Subcommand};
use knowdag_core::{
    init_logging, open_db, CoreConfig, GraphService, InterchangeService, ProjectService,
    SqliteProjectStore,
};
use log::warn;
use std::error::Error;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "knowdag")]
#[command(about = "KnowDAG - knowledge hierarchy and dependency graph store", long_about = None)]
struct Cli {
    /// SQLite database file (overrides KNOWDAG_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print core linkage info
    Ping,
    /// List project summaries, most recently updated first
    List,
    /// Write one project as an interchange document
    Export {
        project_id: String,
        /// Output file; stdout when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Create a new project from an interchange document
    Import {
        input: PathBuf,
        /// Project name to use instead of the document's
        #[arg(long)]
        name: Option<String>,
    },
    /// Show ancestors, descendants and paths around one node
    Analyze { project_id: String, node_id: String },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = CoreConfig::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(logging) = config.logging() {
        if let Err(err) = init_logging(&logging) {
            eprintln!("Warning: file logging disabled: {err}");
        }
    }

    if let Commands::Ping = cli.command {
        println!("knowdag_core ping={}", knowdag_core::ping());
        println!("knowdag_core version={}", knowdag_core::core_version());
        return Ok(());
    }

    let conn = open_db(&config.db_path)?;
    let store = SqliteProjectStore::try_new(&conn)?;
    let ctx = config.service_context();

    match cli.command {
        Commands::Ping => {}
        Commands::List => {
            let projects = ProjectService::with_context(&store, ctx).list_projects()?;
            println!("{}", serde_json::to_string_pretty(&projects)?);
        }
        Commands::Export { project_id, output } => {
            let json = InterchangeService::with_context(&store, ctx).export_json(&project_id)?;
            match output {
                Some(path) => std::fs::write(path, json)?,
                None => println!("{json}"),
            }
        }
        Commands::Import { input, name } => {
            let json = std::fs::read_to_string(&input)?;
            let project = InterchangeService::with_context(&store, ctx)
                .import_json(&json, name.as_deref())?;
            println!("{}", project.id);
        }
        Commands::Analyze {
            project_id,
            node_id,
        } => {
            let analysis =
                GraphService::with_context(&store, ctx).analyze(&project_id, Some(&node_id))?;
            if analysis.is_empty() {
                warn!("event=cli_analyze module=cli status=empty project_id={project_id}");
            }
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
    }

    Ok(())
}
