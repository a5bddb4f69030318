use std::sync::Arc;

use anyhow::{Context, Result};
use claimscope_index::{BatchCatalog, FileCatalog, FilterManager, IndexConfig, RefreshOutcome};
use claimscope_search::RangeQuery;
use colored::Colorize;
use serde_json::json;

use crate::cli::{AffectedArgs, OutputFormat, RangeArgs};
use crate::output;

fn parse_range(args: &RangeArgs) -> Result<RangeQuery> {
    RangeQuery::from_params(&args.last_updated).context("invalid --lastUpdated")
}

/// Load every batch from the catalog into a fresh manager.
async fn load_manager(catalog: &FileCatalog) -> Result<FilterManager> {
    let manager = FilterManager::new();
    let outcome = manager
        .refresh_from(catalog)
        .await
        .with_context(|| format!("failed to load catalog {}", catalog.path().display()))?;
    if outcome == RefreshOutcome::Skipped {
        tracing::warn!(path = %catalog.path().display(), "Catalog holds no load batches");
    }
    Ok(manager)
}

pub async fn overlaps(catalog: &FileCatalog, args: &RangeArgs, format: OutputFormat) -> Result<()> {
    let query = parse_range(args)?;
    let manager = load_manager(catalog).await?;
    let overlapping = manager.overlaps_range(&query)?;

    if let OutputFormat::Table = format {
        println!("{}: {}", "Range".cyan(), query);
    }
    output::print_batches(overlapping.iter().map(|b| &**b), format)
}

pub async fn affected(
    catalog: &FileCatalog,
    args: &AffectedArgs,
    format: OutputFormat,
) -> Result<()> {
    let query = parse_range(&args.range)?;
    let manager = load_manager(catalog).await?;

    let possibly_affected = manager.possibly_affected(&args.beneficiary, &query)?;
    let in_bounds = manager.is_in_bounds(&query);
    let result_set_empty = manager.is_result_set_empty(&args.beneficiary, &query)?;

    match format {
        OutputFormat::Json => output::print_json(&json!({
            "beneficiary": args.beneficiary,
            "range": query.to_params(),
            "possiblyAffected": possibly_affected,
            "inBounds": in_bounds,
            "resultSetEmpty": result_set_empty,
            "transactionTime": manager.transaction_time().to_string(),
        })),
        OutputFormat::Table => {
            println!("{}: {}", "Beneficiary".cyan(), args.beneficiary);
            println!("{}: {}", "Range".cyan(), query);
            println!("{}: {}", "Transaction time".cyan(), manager.transaction_time());
            if !in_bounds {
                println!(
                    "{}",
                    "Range starts before the first known batch; the index cannot rule it out."
                        .yellow()
                );
            }
            if possibly_affected {
                println!("{}", "possibly affected".yellow());
            } else {
                output::print_success("not affected in this range");
            }
            Ok(())
        }
    }
}

pub async fn watch(catalog: FileCatalog, config: &IndexConfig) -> Result<()> {
    let manager = Arc::new(FilterManager::new());
    let catalog: Arc<dyn BatchCatalog> = Arc::new(catalog);

    tracing::info!(
        interval_ms = config.refresh.interval_ms,
        initial_delay_ms = config.refresh.initial_delay_ms,
        "Watching batch catalog"
    );
    let handle = Arc::clone(&manager).start_refresh_task(catalog, &config.refresh);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    handle.abort();

    let snapshot = manager.snapshot();
    output::print_success(&format!(
        "Stopped with {} load batches, transaction time {}",
        snapshot.len(),
        manager.transaction_time()
    ));
    Ok(())
}
