use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use claimscope_core::Timestamp;
use claimscope_index::{BatchId, FilterChain, FilterManager, LoadBatch};
use claimscope_search::{RangeError, RangeQuery};

fn ts(s: &str) -> Timestamp {
    Timestamp::parse(s).unwrap()
}

fn batch(id: BatchId, first: &str, last: &str, benes: &[&str]) -> LoadBatch {
    LoadBatch::from_beneficiaries(id, ts(first), ts(last), 1, benes, benes.len(), 0.01).unwrap()
}

fn ids(batches: &[Arc<LoadBatch>]) -> Vec<BatchId> {
    batches.iter().map(|b| b.id()).collect()
}

#[test]
fn two_batches_overlapping_a_range_spanning_both() {
    let chain = FilterChain::new(vec![
        batch(1, "2020-01-01", "2020-01-31", &["B1", "B2"]),
        batch(2, "2020-02-01", "2020-02-28", &["B3"]),
    ])
    .unwrap();
    let manager = FilterManager::with_chain(chain);
    let query = RangeQuery::from_params(["ge2020-01-15", "lt2020-02-15"]).unwrap();

    assert_eq!(ids(&manager.overlaps_range(&query).unwrap()), vec![1, 2]);
    assert!(manager.possibly_affected("B1", &query).unwrap());
    assert!(manager.possibly_affected("B3", &query).unwrap());
    assert!(!manager.possibly_affected("B4", &query).unwrap());
}

#[test]
fn upper_eq_without_lower_is_rejected_everywhere() {
    let query = RangeQuery::from_params(Vec::<&str>::new()).unwrap();
    assert!(query.is_unbounded());

    let upper_eq = RangeQuery::new(
        None,
        Some(claimscope_search::RangeBound::new(
            ts("2020-01-01"),
            claimscope_search::SearchPrefix::Eq,
        )),
    );
    assert!(matches!(
        upper_eq.evaluate(Some(ts("2020-01-01"))),
        Err(RangeError::InvalidQuery(_))
    ));

    let manager = FilterManager::with_chain(
        FilterChain::new(vec![batch(1, "2020-01-01", "2020-01-31", &["B1"])]).unwrap(),
    );
    assert!(manager.possibly_affected("B1", &upper_eq).is_err());
    assert!(manager.is_result_set_empty("B1", &upper_eq).is_err());
}

#[test]
fn absent_timestamp_matches_unbounded_below_query() {
    let query = RangeQuery::from_params(["lt2020-01-01"]).unwrap();
    assert!(query.evaluate(None).unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_queries_see_exactly_one_snapshot() {
    let three = vec![
        batch(1, "2020-01-01", "2020-01-31", &["B1"]),
        batch(2, "2020-02-01", "2020-02-28", &["B2"]),
        batch(3, "2020-03-01", "2020-03-31", &["B3"]),
    ];
    let mut four = three.clone();
    four.push(batch(4, "2020-04-01", "2020-04-30", &["B4"]));

    let manager = Arc::new(FilterManager::new());
    manager.refresh(three).await.unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let mut readers = Vec::new();
    for _ in 0..4 {
        let manager = Arc::clone(&manager);
        let done = Arc::clone(&done);
        readers.push(tokio::spawn(async move {
            let query = RangeQuery::unbounded();
            let mut observed = 0usize;
            while !done.load(Ordering::Acquire) || observed == 0 {
                let snapshot = manager.snapshot();
                let overlapping = snapshot.overlaps_range(&query).unwrap();
                let seen: Vec<BatchId> = overlapping.iter().map(|b| b.id()).collect();
                assert!(
                    seen == vec![1, 2, 3] || seen == vec![1, 2, 3, 4],
                    "mixed snapshot: {seen:?}"
                );
                assert_eq!(seen.len(), snapshot.len());
                assert_eq!(
                    snapshot.possibly_affected("B4", &query).unwrap(),
                    seen.len() == 4
                );
                observed += 1;
                tokio::task::yield_now().await;
            }
            observed
        }));
    }

    tokio::task::yield_now().await;
    manager.refresh(four).await.unwrap();
    done.store(true, Ordering::Release);

    for reader in readers {
        assert!(reader.await.unwrap() > 0);
    }
    assert_eq!(manager.snapshot().len(), 4);
}
