use anyhow::{Context, Result};
use claimscope_core::{CategoryRegistry, ClaimCategory};
use claimscope_index::IndexConfig;
use claimscope_search::{ClaimQueryBuilder, CursorLinkBuilder, RangeQuery};
use colored::Colorize;
use serde_json::json;

use crate::cli::{OutputFormat, SqlArgs};
use crate::output;

pub fn render(args: &SqlArgs, config: &IndexConfig, format: OutputFormat) -> Result<()> {
    let category: ClaimCategory = args.category.parse()?;
    let registry = CategoryRegistry::with_default_tables();
    let source = registry.get(category)?;

    let range = RangeQuery::from_params(&args.range.last_updated).context("invalid --lastUpdated")?;
    let paging = args
        .url
        .as_deref()
        .map(|url| CursorLinkBuilder::from_url(url, config.paging.max_count))
        .transpose()?;

    let query = ClaimQueryBuilder::new(&**source, args.schema.as_str())
        .beneficiary(args.beneficiary.as_str())
        .last_updated(range)
        .after_cursor(paging.as_ref().and_then(|p| p.cursor()))
        .limit(paging.as_ref().and_then(|p| p.page_size()))
        .build()?;

    match format {
        OutputFormat::Json => output::print_json(&json!({
            "category": category.as_str(),
            "sql": query.sql,
            "params": query.params.iter().map(|p| p.as_display_str()).collect::<Vec<_>>(),
            "firstPage": paging.as_ref().is_none_or(|p| p.is_first_page()),
        })),
        OutputFormat::Table => {
            println!("{}: {}", "Category".cyan(), category);
            println!("{query}");
            output::print_params(&query.params);
            if let Some(first) = paging.as_ref().and_then(|p| p.first_link()) {
                println!("{}: {}", "First page".cyan(), first);
            }
            Ok(())
        }
    }
}
