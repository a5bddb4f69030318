//! The ordered, immutable collection of load batches a query runs against.

use std::collections::BTreeSet;
use std::sync::Arc;

use claimscope_core::Timestamp;
use claimscope_search::{RangeError, RangeQuery};

use crate::batch::{BatchId, LoadBatch};
use crate::error::{IndexError, Result};

/// Load batches ordered by id ascending.
///
/// A chain is never mutated; refreshing builds a new chain and the
/// [`FilterManager`](crate::FilterManager) publishes it wholesale.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    batches: Vec<Arc<LoadBatch>>,
    /// `first_updated` is non-decreasing along the chain, so scans may stop
    /// at the first batch starting after the query's upper bound.
    ordered_by_time: bool,
}

impl FilterChain {
    pub fn new(batches: Vec<LoadBatch>) -> Result<Self> {
        Self::from_shared(batches.into_iter().map(Arc::new).collect())
    }

    /// Build from shared batches, sorting by id. Duplicate ids are rejected.
    pub fn from_shared(mut batches: Vec<Arc<LoadBatch>>) -> Result<Self> {
        batches.sort_by_key(|b| b.id());
        if let Some(pair) = batches.windows(2).find(|w| w[0].id() == w[1].id()) {
            return Err(IndexError::invalid_batch(format!(
                "duplicate batch id {}",
                pair[0].id()
            )));
        }

        let ordered_by_time = batches
            .windows(2)
            .all(|w| w[0].first_updated() <= w[1].first_updated());

        Ok(Self {
            batches,
            ordered_by_time,
        })
    }

    pub fn batches(&self) -> &[Arc<LoadBatch>] {
        &self.batches
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = BatchId> + '_ {
        self.batches.iter().map(|b| b.id())
    }

    /// Earliest instant any known batch covers.
    pub fn first_batch_created(&self) -> Option<Timestamp> {
        self.batches.iter().map(|b| b.first_updated()).min()
    }

    /// Latest instant any known batch covers.
    pub fn last_batch_created(&self) -> Option<Timestamp> {
        self.batches.iter().map(|b| b.last_updated()).max()
    }

    /// Batches whose window holds at least one instant the query accepts, in
    /// id order.
    pub fn overlaps_range(
        &self,
        query: &RangeQuery,
    ) -> std::result::Result<Vec<&Arc<LoadBatch>>, RangeError> {
        let rules = query.rules()?;

        let mut overlapping = Vec::new();
        for batch in &self.batches {
            if self.ordered_by_time && !rules.upper_admits(batch.first_updated()) {
                break;
            }
            if batch.overlaps(&rules) {
                overlapping.push(batch);
            }
        }
        Ok(overlapping)
    }

    /// `false` certifies that no batch in the range touched the beneficiary.
    pub fn possibly_affected(
        &self,
        beneficiary_id: &str,
        query: &RangeQuery,
    ) -> std::result::Result<bool, RangeError> {
        Ok(self
            .overlaps_range(query)?
            .into_iter()
            .any(|batch| batch.might_contain(beneficiary_id)))
    }

    /// A new chain with `incoming` merged in and batches missing from
    /// `retained` dropped.
    ///
    /// Existing batches keep their filters unless `incoming` carries a batch
    /// with the same id.
    pub fn merged(&self, incoming: Vec<LoadBatch>, retained: &BTreeSet<BatchId>) -> Result<Self> {
        let replaced: BTreeSet<BatchId> = incoming.iter().map(|b| b.id()).collect();
        if replaced.len() != incoming.len() {
            return Err(IndexError::invalid_batch(
                "catalog returned the same batch id twice",
            ));
        }

        let kept = self
            .batches
            .iter()
            .filter(|b| !replaced.contains(&b.id()))
            .cloned();
        let merged = kept
            .chain(incoming.into_iter().map(Arc::new))
            .filter(|b| retained.contains(&b.id()))
            .collect();

        Self::from_shared(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn batch(id: BatchId, first: &str, last: &str, benes: &[&str]) -> LoadBatch {
        LoadBatch::from_beneficiaries(id, ts(first), ts(last), 1, benes, benes.len(), 0.01)
            .unwrap()
    }

    fn sample_chain() -> FilterChain {
        FilterChain::new(vec![
            batch(2, "2020-02-01", "2020-02-28", &["B3"]),
            batch(1, "2020-01-01", "2020-01-31", &["B1", "B2"]),
            batch(3, "2020-03-01", "2020-03-31", &["B1"]),
        ])
        .unwrap()
    }

    fn overlapping_ids(chain: &FilterChain, params: &[&str]) -> Vec<BatchId> {
        let query = RangeQuery::from_params(params).unwrap();
        chain
            .overlaps_range(&query)
            .unwrap()
            .into_iter()
            .map(|b| b.id())
            .collect()
    }

    #[test]
    fn test_sorted_by_id() {
        let chain = sample_chain();
        assert_eq!(chain.ids().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(chain.first_batch_created(), Some(ts("2020-01-01")));
        assert_eq!(chain.last_batch_created(), Some(ts("2020-03-31")));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let err = FilterChain::new(vec![
            batch(1, "2020-01-01", "2020-01-31", &["B1"]),
            batch(1, "2020-02-01", "2020-02-28", &["B2"]),
        ])
        .unwrap_err();
        assert!(matches!(err, IndexError::InvalidBatch(_)));
    }

    #[test]
    fn test_overlaps_range() {
        let chain = sample_chain();
        assert_eq!(overlapping_ids(&chain, &[]), vec![1, 2, 3]);
        assert_eq!(overlapping_ids(&chain, &["ge2020-01-15", "lt2020-02-15"]), vec![1, 2]);
        assert_eq!(overlapping_ids(&chain, &["lt2020-02-01"]), vec![1]);
        assert_eq!(overlapping_ids(&chain, &["le2020-02-01"]), vec![1, 2]);
        assert_eq!(overlapping_ids(&chain, &["gt2020-02-28"]), vec![3]);
        assert_eq!(overlapping_ids(&chain, &["2020-02-28"]), vec![2]);
        assert!(overlapping_ids(&chain, &["gt2020-03-31"]).is_empty());
    }

    #[test]
    fn test_overlaps_range_without_time_order() {
        // batch 2 was loaded late but covers an earlier window
        let chain = FilterChain::new(vec![
            batch(1, "2020-03-01", "2020-03-31", &["B1"]),
            batch(2, "2020-01-01", "2020-01-31", &["B2"]),
        ])
        .unwrap();
        assert_eq!(overlapping_ids(&chain, &["lt2020-02-01"]), vec![2]);
    }

    #[test]
    fn test_gt_last_instant_overlaps_nothing() {
        let chain = sample_chain();
        let query = RangeQuery::from_params(["gt9999-12-31T23:59:59.999999999Z"]).unwrap();
        assert!(chain.overlaps_range(&query).unwrap().is_empty());
        assert!(!chain.possibly_affected("B1", &query).unwrap());
    }

    #[test]
    fn test_invalid_query_is_an_error() {
        let chain = sample_chain();
        let query = RangeQuery::from_params(["ne2020-01-01"]).unwrap();
        assert!(chain.overlaps_range(&query).is_err());
        assert!(chain.possibly_affected("B1", &query).is_err());
    }

    #[test]
    fn test_possibly_affected() {
        let chain = sample_chain();
        let january = RangeQuery::from_params(["ge2020-01-01", "lt2020-02-01"]).unwrap();

        assert!(chain.possibly_affected("B1", &january).unwrap());
        assert!(!chain.possibly_affected("B3", &january).unwrap());
        assert!(chain.possibly_affected("B3", &RangeQuery::unbounded()).unwrap());
    }

    #[test]
    fn test_merged_keeps_replaces_and_trims() {
        let chain = sample_chain();
        let original_first = Arc::clone(&chain.batches()[0]);

        let incoming = vec![
            batch(3, "2020-03-01", "2020-04-15", &["B9"]),
            batch(4, "2020-04-01", "2020-04-30", &["B4"]),
        ];
        let retained: BTreeSet<BatchId> = [1, 3, 4].into_iter().collect();
        let merged = chain.merged(incoming, &retained).unwrap();

        assert_eq!(merged.ids().collect::<Vec<_>>(), vec![1, 3, 4]);
        assert!(Arc::ptr_eq(&merged.batches()[0], &original_first));
        assert_eq!(merged.batches()[1].last_updated(), ts("2020-04-15"));
        assert!(merged.batches()[1].might_contain("B9"));

        // the source chain is untouched
        assert_eq!(chain.ids().collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
