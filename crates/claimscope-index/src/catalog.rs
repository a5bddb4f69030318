//! Sources of load batch metadata for refreshing the filter chain.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use claimscope_core::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::batch::{BatchId, LoadBatch};
use crate::error::CatalogError;

/// The ingestion catalog, read only by the refresh task.
#[async_trait]
pub trait BatchCatalog: Send + Sync {
    /// Read the catalog once and return every batch id it retains, plus the
    /// batches whose ids are not in `known` with their membership filters
    /// built.
    ///
    /// Batch ids identify new work. Update windows do not: a batch loaded
    /// late may cover instants older than batches already known.
    async fn list_load_batches(
        &self,
        known: &BTreeSet<BatchId>,
    ) -> Result<CatalogListing, CatalogError>;
}

/// One consistent read of a [`BatchCatalog`].
#[derive(Debug, Default)]
pub struct CatalogListing {
    pub retained: BTreeSet<BatchId>,
    /// Batches absent from the caller's known set, in catalog order.
    pub batches: Vec<LoadBatch>,
}

impl CatalogListing {
    /// Ids in `known` that the catalog no longer retains.
    pub fn expired(&self, known: &BTreeSet<BatchId>) -> Vec<BatchId> {
        known.difference(&self.retained).copied().collect()
    }

    /// Whether applying this listing would leave a chain holding `known`
    /// unchanged.
    pub fn is_unchanged(&self, known: &BTreeSet<BatchId>) -> bool {
        self.batches.is_empty() && known.is_subset(&self.retained)
    }
}

/// One batch as recorded in a JSON catalog file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub id: BatchId,
    pub first_updated: Timestamp,
    pub last_updated: Timestamp,
    #[serde(default = "default_batch_count")]
    pub batch_count: u32,
    #[serde(default)]
    pub beneficiaries: Vec<String>,
}

fn default_batch_count() -> u32 {
    1
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub batches: Vec<CatalogEntry>,
}

impl CatalogDocument {
    fn listing(
        &self,
        known: &BTreeSet<BatchId>,
        sizing: &FilterSizing,
    ) -> Result<CatalogListing, CatalogError> {
        let batches = self
            .batches
            .iter()
            .filter(|e| !known.contains(&e.id))
            .map(|e| sizing.build(e))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CatalogListing {
            retained: self.batches.iter().map(|e| e.id).collect(),
            batches,
        })
    }
}

/// Filter sizing applied when building batches from catalog entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSizing {
    pub false_positive_rate: f64,
    /// Used when an entry lists no beneficiaries.
    pub expected_beneficiaries: usize,
}

impl Default for FilterSizing {
    fn default() -> Self {
        Self {
            false_positive_rate: 0.01,
            expected_beneficiaries: 1000,
        }
    }
}

impl FilterSizing {
    fn build(&self, entry: &CatalogEntry) -> Result<LoadBatch, CatalogError> {
        let expected = if entry.beneficiaries.is_empty() {
            self.expected_beneficiaries
        } else {
            entry.beneficiaries.len()
        };
        LoadBatch::from_beneficiaries(
            entry.id,
            entry.first_updated,
            entry.last_updated,
            entry.batch_count,
            &entry.beneficiaries,
            expected,
            self.false_positive_rate,
        )
        .map_err(|e| CatalogError::InvalidEntry {
            id: entry.id,
            message: e.to_string(),
        })
    }
}

/// A catalog stored as a JSON document on disk, read once per listing.
///
/// ```json
/// { "batches": [
///     { "id": 1, "first_updated": "2020-01-01T00:00:00Z",
///       "last_updated": "2020-01-31T00:00:00Z", "batch_count": 2,
///       "beneficiaries": ["B1", "B2"] } ] }
/// ```
#[derive(Debug, Clone)]
pub struct FileCatalog {
    path: PathBuf,
    sizing: FilterSizing,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>, sizing: FilterSizing) -> Self {
        Self {
            path: path.into(),
            sizing,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read_document(&self) -> Result<CatalogDocument, CatalogError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[async_trait]
impl BatchCatalog for FileCatalog {
    async fn list_load_batches(
        &self,
        known: &BTreeSet<BatchId>,
    ) -> Result<CatalogListing, CatalogError> {
        self.read_document().await?.listing(known, &self.sizing)
    }
}

/// A catalog held in memory; entries can be appended and expired while a
/// manager refreshes from it.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    document: RwLock<CatalogDocument>,
    sizing: FilterSizing,
}

impl MemoryCatalog {
    pub fn new(sizing: FilterSizing) -> Self {
        Self {
            document: RwLock::new(CatalogDocument::default()),
            sizing,
        }
    }

    pub async fn append(&self, entry: CatalogEntry) {
        self.document.write().await.batches.push(entry);
    }

    /// Drop entries for which `keep` returns false.
    pub async fn retain(&self, keep: impl Fn(&CatalogEntry) -> bool) {
        self.document.write().await.batches.retain(|e| keep(e));
    }
}

#[async_trait]
impl BatchCatalog for MemoryCatalog {
    async fn list_load_batches(
        &self,
        known: &BTreeSet<BatchId>,
    ) -> Result<CatalogListing, CatalogError> {
        self.document.read().await.listing(known, &self.sizing)
    }
}
