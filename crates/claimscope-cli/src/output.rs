use crate::cli::OutputFormat;
use claimscope_index::LoadBatch;
use claimscope_search::SqlValue;
use colored::Colorize;
use serde_json::{Value, json};
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn batch_json(batch: &LoadBatch) -> Value {
    let membership = batch.membership();
    json!({
        "id": batch.id(),
        "firstUpdated": batch.first_updated().to_string(),
        "lastUpdated": batch.last_updated().to_string(),
        "batchCount": batch.batch_count(),
        "beneficiaries": membership.len(),
        "bitSize": membership.bit_size(),
        "hashCount": membership.hash_count(),
        "estimatedFpp": membership.estimated_fpp(),
    })
}

pub fn print_batches<'a>(
    batches: impl IntoIterator<Item = &'a LoadBatch>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let batches: Vec<&LoadBatch> = batches.into_iter().collect();
    match format {
        OutputFormat::Json => {
            print_json(&Value::Array(batches.iter().map(|b| batch_json(b)).collect()))
        }
        OutputFormat::Table => {
            if batches.is_empty() {
                println!("No load batches overlap the range.");
                return Ok(());
            }
            let mut builder = Builder::default();
            builder.push_record([
                "ID",
                "FirstUpdated",
                "LastUpdated",
                "Batches",
                "Beneficiaries",
                "Bits",
                "Hashes",
            ]);
            for batch in &batches {
                let membership = batch.membership();
                builder.push_record([
                    batch.id().to_string(),
                    batch.first_updated().to_string(),
                    batch.last_updated().to_string(),
                    batch.batch_count().to_string(),
                    membership.len().to_string(),
                    membership.bit_size().to_string(),
                    membership.hash_count().to_string(),
                ]);
            }
            let table = builder.build().with(Style::rounded()).to_string();
            println!("{table}");
            println!("Total: {}", batches.len());
            Ok(())
        }
    }
}

pub fn print_params(params: &[SqlValue]) {
    for (i, param) in params.iter().enumerate() {
        println!("  {} {}", format!("${}", i + 1).cyan(), param.as_display_str());
    }
}
