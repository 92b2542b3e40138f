//! Pairwise similarity cache invalidated by graph and interaction changes

use std::sync::Mutex;

use dashmap::DashMap;

use crate::graph::UserId;

/// Data version a cached score was computed against:
/// (graph generation, interaction revision)
pub type Stamp = (u64, u64);

/// Hybrid scores keyed by unordered user pair.
///
/// Every lookup carries the caller's current [`Stamp`]; a stamp different
/// from the one the entries were computed under clears the cache first, so
/// any follow, unfollow, user or interaction change invalidates everything.
#[derive(Debug, Default)]
pub struct SimilarityCache {
    scores: DashMap<(UserId, UserId), f64>,
    stamp: Mutex<Stamp>,
}

impl SimilarityCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: UserId, b: UserId) -> (UserId, UserId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    fn sync(&self, stamp: Stamp) {
        let mut current = self.stamp.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *current != stamp {
            log::debug!(
                "Similarity cache invalidated ({} entries, stamp {:?} -> {:?})",
                self.scores.len(),
                *current,
                stamp
            );
            self.scores.clear();
            *current = stamp;
        }
    }

    /// Cached score for the pair, computing and storing it on a miss
    pub fn get_or_compute<F>(&self, stamp: Stamp, a: UserId, b: UserId, compute: F) -> f64
    where
        F: FnOnce() -> f64,
    {
        self.sync(stamp);
        let key = Self::key(a, b);
        if let Some(score) = self.scores.get(&key) {
            return *score;
        }
        let score = compute();
        self.scores.insert(key, score);
        score
    }

    pub fn invalidate(&self) {
        self.scores.clear();
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}
