//! Publishes the current [`FilterChain`] to readers and refreshes it from a
//! [`BatchCatalog`].
//!
//! The chain lives behind an `ArcSwap`: a query performs one atomic load
//! and works on that snapshot until it returns, while the single refresh
//! task builds the next chain off to the side and swaps it in whole.
//!
//! # Usage
//!
//! ```ignore
//! let manager = Arc::new(FilterManager::new());
//! let handle = manager.clone().start_refresh_task(catalog, &config.refresh);
//!
//! let query = RangeQuery::from_params(["ge2020-01-15"])?;
//! if manager.is_result_set_empty("567834", &query)? {
//!     // skip the claims store entirely
//! }
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use claimscope_core::{BEFORE_LAST_UPDATED, Timestamp};
use claimscope_search::RangeQuery;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::batch::{BatchId, LoadBatch};
use crate::catalog::BatchCatalog;
use crate::chain::FilterChain;
use crate::config::RefreshConfig;
use crate::error::{IndexError, Result};

/// What a call to [`FilterManager::refresh_from`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The catalog had nothing newer than the published chain.
    Skipped,
    /// A new chain was published. `last_batch_created` falls back to
    /// [`BEFORE_LAST_UPDATED`] when every batch was trimmed.
    Refreshed {
        batches: usize,
        last_batch_created: Timestamp,
    },
}

/// Lock-free holder of the published filter chain.
#[derive(Debug)]
pub struct FilterManager {
    chain: ArcSwap<FilterChain>,
    /// Serialises writers; readers never take it.
    refresh_lock: Mutex<()>,
}

impl Default for FilterManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterManager {
    /// A manager with an empty chain. Until the first refresh every query is
    /// out of bounds.
    pub fn new() -> Self {
        Self::with_chain(FilterChain::default())
    }

    pub fn with_chain(chain: FilterChain) -> Self {
        Self {
            chain: ArcSwap::from_pointee(chain),
            refresh_lock: Mutex::new(()),
        }
    }

    /// The currently published chain.
    pub fn snapshot(&self) -> Arc<FilterChain> {
        self.chain.load_full()
    }

    pub fn possibly_affected(&self, beneficiary_id: &str, query: &RangeQuery) -> Result<bool> {
        Ok(self.chain.load().possibly_affected(beneficiary_id, query)?)
    }

    pub fn overlaps_range(&self, query: &RangeQuery) -> Result<Vec<Arc<LoadBatch>>> {
        let chain = self.chain.load();
        Ok(chain.overlaps_range(query)?.into_iter().cloned().collect())
    }

    /// Whether the query starts inside the window the index knows about.
    ///
    /// A query with no lower bound, or one starting before the first known
    /// batch, reaches back into history the filters do not cover.
    pub fn is_in_bounds(&self, query: &RangeQuery) -> bool {
        Self::in_bounds(&self.chain.load(), query)
    }

    fn in_bounds(chain: &FilterChain, query: &RangeQuery) -> bool {
        match (query.lower(), chain.first_batch_created()) {
            (Some(lower), Some(first)) => lower.value >= first,
            _ => false,
        }
    }

    /// `true` only when the index proves that no record of the beneficiary
    /// was updated in the range. Out-of-bounds queries are never empty.
    pub fn is_result_set_empty(&self, beneficiary_id: &str, query: &RangeQuery) -> Result<bool> {
        if beneficiary_id.trim().is_empty() {
            return Err(IndexError::InvalidBeneficiaryId(beneficiary_id.to_string()));
        }

        // one snapshot for both the bounds check and the probe
        let chain = self.chain.load();
        query.rules()?;
        if !Self::in_bounds(&chain, query) {
            return Ok(false);
        }
        Ok(!chain.possibly_affected(beneficiary_id, query)?)
    }

    /// Newest batch time the published chain covers, or the instant before
    /// last-updated tracking began when nothing has been loaded.
    pub fn transaction_time(&self) -> Timestamp {
        self.chain
            .load()
            .last_batch_created()
            .unwrap_or(BEFORE_LAST_UPDATED)
    }

    /// Replace the published chain with one built from `batches`.
    pub async fn refresh(&self, batches: Vec<LoadBatch>) -> Result<()> {
        let chain = FilterChain::new(batches)?;
        let _guard = self.refresh_lock.lock().await;
        self.publish(chain);
        Ok(())
    }

    fn publish(&self, chain: FilterChain) {
        let batches = chain.len();
        self.chain.store(Arc::new(chain));
        debug!(batches, "Published filter chain");
    }

    /// Bring the chain up to date with the catalog.
    ///
    /// Reads the catalog once. Batches whose ids the chain does not hold yet
    /// are merged in, whatever their update windows, and batches the catalog
    /// no longer retains are trimmed. Skips when neither applies. On error
    /// the published chain is left as it was.
    pub async fn refresh_from(&self, catalog: &dyn BatchCatalog) -> Result<RefreshOutcome> {
        let _guard = self.refresh_lock.lock().await;
        let current = self.chain.load_full();
        let known: BTreeSet<BatchId> = current.ids().collect();

        let listing = catalog.list_load_batches(&known).await?;
        if listing.is_unchanged(&known) {
            debug!(batches = known.len(), "No new load batches");
            return Ok(RefreshOutcome::Skipped);
        }

        let trimmed = listing.expired(&known);
        info!(
            known = known.len(),
            incoming = listing.batches.len(),
            "Refreshing load batch filters"
        );
        if !trimmed.is_empty() {
            info!(trimmed = ?trimmed, "Trimmed expired load batch filters");
        }

        let next = current
            .merged(listing.batches, &listing.retained)
            .map_err(|e| {
                IndexError::RefreshFailure(format!("cannot merge catalog batches: {e}"))
            })?;
        let last_batch_created = next.last_batch_created().unwrap_or(BEFORE_LAST_UPDATED);
        let batches = next.len();
        self.publish(next);

        info!(batches, %last_batch_created, "Load batch filters refreshed");
        Ok(RefreshOutcome::Refreshed {
            batches,
            last_batch_created,
        })
    }

    /// Refresh from `catalog` after `initial_delay`, then every `interval`
    /// measured from the end of the previous refresh. Failures are logged
    /// and the previous chain stays published.
    pub fn start_refresh_task(
        self: Arc<Self>,
        catalog: Arc<dyn BatchCatalog>,
        config: &RefreshConfig,
    ) -> JoinHandle<()> {
        let period = config.interval();
        let initial_delay = config.initial_delay();

        tokio::spawn(async move {
            tokio::time::sleep(initial_delay).await;

            loop {
                if let Err(e) = self.refresh_from(catalog.as_ref()).await {
                    error!(error = %e, "Error refreshing load batch filters");
                }

                tokio::time::sleep(period).await;
            }
        })
    }
}
