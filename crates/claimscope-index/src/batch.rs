use claimscope_core::Timestamp;
use claimscope_search::RangeRules;

use crate::error::{IndexError, Result};
use crate::membership::{MembershipFilter, MembershipFilterBuilder};

/// Load batch identifier, increasing in ingestion order.
pub type BatchId = u64;

/// One ingestion event: the window its records were updated in and which
/// beneficiaries it touched.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadBatch {
    id: BatchId,
    first_updated: Timestamp,
    last_updated: Timestamp,
    batch_count: u32,
    membership: MembershipFilter,
}

impl LoadBatch {
    pub fn new(
        id: BatchId,
        first_updated: Timestamp,
        last_updated: Timestamp,
        batch_count: u32,
        membership: MembershipFilter,
    ) -> Result<Self> {
        if first_updated > last_updated {
            return Err(IndexError::invalid_batch(format!(
                "batch {id} ends ({last_updated}) before it starts ({first_updated})"
            )));
        }
        if batch_count == 0 {
            return Err(IndexError::invalid_batch(format!(
                "batch {id} has no batches; a filter cannot be empty"
            )));
        }

        Ok(Self {
            id,
            first_updated,
            last_updated,
            batch_count,
            membership,
        })
    }

    /// Build the membership filter from the batch's beneficiary ids, sized
    /// for `expected_beneficiaries` at `false_positive_rate`.
    pub fn from_beneficiaries<I, S>(
        id: BatchId,
        first_updated: Timestamp,
        last_updated: Timestamp,
        batch_count: u32,
        beneficiaries: I,
        expected_beneficiaries: usize,
        false_positive_rate: f64,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder =
            MembershipFilterBuilder::with_accuracy(expected_beneficiaries, false_positive_rate)?;
        builder.extend(beneficiaries);
        let membership = builder.build();

        tracing::debug!(
            batch_id = id,
            batch_count,
            beneficiaries = membership.len(),
            bit_size = membership.bit_size(),
            hash_count = membership.hash_count(),
            "Built membership filter"
        );

        Self::new(id, first_updated, last_updated, batch_count, membership)
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn first_updated(&self) -> Timestamp {
        self.first_updated
    }

    pub fn last_updated(&self) -> Timestamp {
        self.last_updated
    }

    pub fn batch_count(&self) -> u32 {
        self.batch_count
    }

    pub fn membership(&self) -> &MembershipFilter {
        &self.membership
    }

    pub fn might_contain(&self, beneficiary_id: &str) -> bool {
        self.membership.might_contain(beneficiary_id)
    }

    /// Whether some instant of `[first_updated, last_updated]` satisfies the
    /// range.
    pub fn overlaps(&self, rules: &RangeRules) -> bool {
        rules.accepts_any_in(self.first_updated, self.last_updated)
    }
}
