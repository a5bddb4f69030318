//! Incremental-change filter index over ingested load batches.
//!
//! Each [`LoadBatch`] carries a [`MembershipFilter`] of the beneficiaries it
//! touched and the window its records were updated in. A [`FilterChain`]
//! orders them by id and answers "could this beneficiary have records
//! updated in this range?" with no false negatives. [`FilterManager`]
//! publishes the chain to concurrent readers and refreshes it from a
//! [`BatchCatalog`].

pub mod batch;
pub mod catalog;
pub mod chain;
pub mod config;
pub mod error;
pub mod manager;
pub mod membership;

pub use batch::{BatchId, LoadBatch};
pub use catalog::{
    BatchCatalog, CatalogDocument, CatalogEntry, CatalogListing, FileCatalog, FilterSizing,
    MemoryCatalog,
};
pub use chain::FilterChain;
pub use config::{IndexConfig, loader::load_config};
pub use error::{CatalogError, IndexError, Result};
pub use manager::{FilterManager, RefreshOutcome};
pub use membership::{MembershipFilter, MembershipFilterBuilder};
