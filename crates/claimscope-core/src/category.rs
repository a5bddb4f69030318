//! Claim categories and the per-category source strategies.
//!
//! Each category of claim lives in its own table with its own column names.
//! The mapping from category tag to source is built once at startup and
//! passed to whoever renders store queries; there is no global registry.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The closed set of claim categories held by the claims store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimCategory {
    Carrier,
    Inpatient,
    Outpatient,
    Snf,
    Dme,
    Hha,
    Hospice,
    #[serde(rename = "pde")]
    PartD,
}

impl ClaimCategory {
    pub const ALL: [ClaimCategory; 8] = [
        Self::Carrier,
        Self::Inpatient,
        Self::Outpatient,
        Self::Snf,
        Self::Dme,
        Self::Hha,
        Self::Hospice,
        Self::PartD,
    ];

    /// Bit position of this category in the store's availability mask.
    pub fn bit_index(self) -> u8 {
        match self {
            Self::Carrier => 0,
            Self::Inpatient => 1,
            Self::Outpatient => 2,
            Self::Snf => 3,
            Self::Dme => 4,
            Self::Hha => 5,
            Self::Hospice => 6,
            Self::PartD => 7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Carrier => "carrier",
            Self::Inpatient => "inpatient",
            Self::Outpatient => "outpatient",
            Self::Snf => "snf",
            Self::Dme => "dme",
            Self::Hha => "hha",
            Self::Hospice => "hospice",
            Self::PartD => "pde",
        }
    }
}

impl fmt::Display for ClaimCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimCategory {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| CoreError::unknown_category(s))
    }
}

/// Which categories hold at least one claim for a beneficiary, decoded from
/// the integer bitmask the claims store computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClaimsAvailability(u8);

impl ClaimsAvailability {
    /// Decode the store's mask. Bits above the known categories are ignored.
    pub fn from_mask(mask: i32) -> Self {
        Self((mask & 0xff) as u8)
    }

    pub fn all() -> Self {
        Self(0xff)
    }

    pub fn has_data(&self, category: ClaimCategory) -> bool {
        self.0 & (1 << category.bit_index()) != 0
    }

    pub fn categories(&self) -> impl Iterator<Item = ClaimCategory> + '_ {
        ClaimCategory::ALL
            .into_iter()
            .filter(|c| self.has_data(*c))
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Where the records of one claim category live in the claims store.
pub trait ClaimSource: Send + Sync + fmt::Debug {
    fn category(&self) -> ClaimCategory;

    fn table(&self) -> &str;

    fn id_column(&self) -> &str {
        "claim_id"
    }

    fn beneficiary_column(&self) -> &str {
        "bene_id"
    }

    fn last_updated_column(&self) -> &str {
        "last_updated"
    }
}

/// A plain table-backed source.
#[derive(Debug, Clone)]
pub struct TableSource {
    category: ClaimCategory,
    table: String,
    id_column: String,
}

impl TableSource {
    pub fn new(category: ClaimCategory, table: impl Into<String>) -> Self {
        Self {
            category,
            table: table.into(),
            id_column: "claim_id".to_string(),
        }
    }

    #[must_use]
    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }
}

impl ClaimSource for TableSource {
    fn category(&self) -> ClaimCategory {
        self.category
    }

    fn table(&self) -> &str {
        &self.table
    }

    fn id_column(&self) -> &str {
        &self.id_column
    }
}

/// Category tag to source strategy mapping, built at startup.
#[derive(Debug, Clone, Default)]
pub struct CategoryRegistry {
    sources: BTreeMap<ClaimCategory, Arc<dyn ClaimSource>>,
}

impl CategoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with one table per category using the claims schema names.
    pub fn with_default_tables() -> Self {
        let mut registry = Self::new();
        for category in ClaimCategory::ALL {
            let source = match category {
                ClaimCategory::PartD => {
                    TableSource::new(category, "partd_events").with_id_column("pde_id")
                }
                other => TableSource::new(other, format!("{}_claims", other.as_str())),
            };
            registry.register(Arc::new(source));
        }
        tracing::debug!(count = registry.len(), "Registered default claim sources");
        registry
    }

    /// Register a source, replacing any previous source for its category.
    pub fn register(&mut self, source: Arc<dyn ClaimSource>) {
        self.sources.insert(source.category(), source);
    }

    pub fn get(&self, category: ClaimCategory) -> Result<&Arc<dyn ClaimSource>> {
        self.sources
            .get(&category)
            .ok_or_else(|| CoreError::MissingSource(category.to_string()))
    }

    /// Sources for the requested categories that the availability mask says
    /// hold data, in category order.
    pub fn sources_with_data(
        &self,
        requested: &[ClaimCategory],
        availability: ClaimsAvailability,
    ) -> Result<Vec<Arc<dyn ClaimSource>>> {
        let mut wanted: Vec<ClaimCategory> = requested
            .iter()
            .copied()
            .filter(|c| availability.has_data(*c))
            .collect();
        wanted.sort();
        wanted.dedup();
        wanted
            .into_iter()
            .map(|c| self.get(c).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
