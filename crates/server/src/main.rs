//! snaphunt - timed photo scavenger hunt server
//!
//! `serve` runs the REST API, `seed` imports a catalog file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use snaphunt_server::logging::init_logging;
use snaphunt_server::seed::seed_catalog;
use snaphunt_server::{serve, ServerConfig};
use snaphunt_storage::SqliteStorage;
use tracing::info;

#[derive(Parser)]
#[command(name = "snaphunt")]
#[command(about = "snaphunt - timed photo scavenger hunt server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://snaphunt.db", global = true)]
    database_url: String,

    /// Default log level, overridden by RUST_LOG
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve(ServerConfig),

    /// Import image sets from a JSON file
    Seed {
        /// Catalog file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json);

    let storage = SqliteStorage::new(&cli.database_url).await?;
    if !storage.health_check().await {
        bail!("database at {} is not responding", cli.database_url);
    }

    match cli.command {
        Commands::Serve(config) => {
            serve(config, Arc::new(storage)).await?;
        }
        Commands::Seed { file } => {
            let created = seed_catalog(&storage, &file).await?;
            info!(count = created.len(), "Catalog imported");
            for set in created {
                println!("{}\t{}\t{}s", set.id, set.name, set.time_limit_secs);
            }
        }
    }

    Ok(())
}
