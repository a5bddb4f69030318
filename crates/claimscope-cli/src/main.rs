mod cli;
mod commands;
mod observability;
mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use claimscope_index::{FileCatalog, IndexConfig, load_config};
use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    observability::init_tracing_with_level(&config.logging.level);
    let format = cli.format.unwrap_or_default();

    match &cli.command {
        Commands::Overlaps(args) => {
            let catalog = open_catalog(&cli, &config)?;
            commands::index::overlaps(&catalog, args, format).await?;
        }
        Commands::Affected(args) => {
            let catalog = open_catalog(&cli, &config)?;
            commands::index::affected(&catalog, args, format).await?;
        }
        Commands::Watch => {
            let catalog = open_catalog(&cli, &config)?;
            commands::index::watch(catalog, &config).await?;
        }
        Commands::Sql(args) => {
            commands::sql::render(args, &config, format)?;
        }
    }

    Ok(())
}

fn open_catalog(cli: &Cli, config: &IndexConfig) -> Result<FileCatalog> {
    let path: PathBuf = cli
        .catalog
        .clone()
        .or_else(|| config.catalog.path.clone())
        .context("No batch catalog. Pass --catalog or set catalog.path")?;
    Ok(FileCatalog::new(path, config.filter.sizing()))
}
