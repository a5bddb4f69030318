use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "claimscope")]
#[command(about = "Inspect the claimscope load batch filter index")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to claimscope.toml when present)
    #[arg(short, long, global = true, env = "CLAIMSCOPE_CONFIG")]
    pub config: Option<String>,

    /// Batch catalog JSON file (overrides catalog.path)
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the load batches a _lastUpdated range overlaps
    Overlaps(RangeArgs),
    /// Check whether a beneficiary may have records updated in a range
    Affected(AffectedArgs),
    /// Keep the filter chain refreshed from the catalog until Ctrl-C
    Watch,
    /// Render the paged claim query for one category
    Sql(SqlArgs),
}

#[derive(clap::Args)]
pub struct RangeArgs {
    /// Prefixed _lastUpdated value, repeatable (e.g. ge2020-01-15, lt2020-02-15)
    #[arg(long = "lastUpdated", value_name = "VALUE")]
    pub last_updated: Vec<String>,
}

#[derive(clap::Args)]
pub struct AffectedArgs {
    /// Beneficiary id
    #[arg(short, long)]
    pub beneficiary: String,
    #[command(flatten)]
    pub range: RangeArgs,
}

#[derive(clap::Args)]
pub struct SqlArgs {
    /// Claim category (carrier, inpatient, outpatient, snf, dme, hha, hospice, pde)
    #[arg(long)]
    pub category: String,
    /// Beneficiary id
    #[arg(short, long)]
    pub beneficiary: String,
    #[command(flatten)]
    pub range: RangeArgs,
    /// Request URL carrying _count and cursor
    #[arg(long)]
    pub url: Option<String>,
    /// Database schema holding the claim tables
    #[arg(long, default_value = "ccw")]
    pub schema: String,
}
