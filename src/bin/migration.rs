//! Schema management for the POS database.
//!
//! Run with: cargo run --bin migration -- up

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use kasir_api::{
    config,
    db::{self, DbConfig},
    migrator::Migrator,
};

#[derive(Debug, Parser)]
#[command(name = "migration", about = "Apply or roll back kasir-api schema migrations")]
struct Cli {
    /// Database URL; falls back to DATABASE_URL, then the app configuration
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending migrations
    Up {
        /// Only apply this many
        #[arg(long)]
        steps: Option<u32>,
    },
    /// Roll back applied migrations
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Show applied and pending migrations
    Status,
    /// Drop every table and re-apply all migrations
    Fresh,
}

fn resolve_database_url(flag: Option<String>) -> Result<String> {
    if let Some(url) = flag {
        return Ok(url);
    }
    if let Ok(url) = std::env::var("DATABASE_URL") {
        return Ok(url);
    }
    let cfg = config::load_config().context("no --database-url given and config failed to load")?;
    Ok(cfg.database_url)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let url = resolve_database_url(cli.database_url)?;

    info!("Connecting to database");
    let db = db::establish_connection_with_config(&DbConfig {
        url,
        max_connections: 1,
        ..Default::default()
    })
    .await
    .context("failed to connect")?;

    match cli.command {
        Command::Up { steps } => {
            Migrator::up(&db, steps).await?;
            info!("Migrations applied");
        }
        Command::Down { steps } => {
            Migrator::down(&db, Some(steps)).await?;
            info!(steps, "Migrations rolled back");
        }
        Command::Status => Migrator::status(&db).await?,
        Command::Fresh => {
            Migrator::fresh(&db).await?;
            info!("Schema rebuilt from scratch");
        }
    }

    Ok(())
}
