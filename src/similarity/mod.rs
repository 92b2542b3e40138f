//! Follow-set and interaction similarity between users

pub mod cache;
pub mod vector;

use itertools::{EitherOrBoth, Itertools};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::graph::{GraphStore, UserId};

pub use cache::SimilarityCache;
pub use vector::{cosine, InteractionIndex, InteractionVector};

/// A scored recommendation candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub user: UserId,
    pub jaccard: f64,
    pub cosine: f64,
    pub score: f64,
}

/// |out(u) ∩ out(v)| / |out(u) ∪ out(v)|; 0 when both follow nobody
pub fn jaccard(store: &GraphStore, u: UserId, v: UserId) -> Result<f64> {
    let (intersection, union) = store
        .followees(u)?
        .merge_join_by(store.followees(v)?, |a, b| a.cmp(b))
        .fold((0usize, 0usize), |(both, all), pair| match pair {
            EitherOrBoth::Both(..) => (both + 1, all + 1),
            _ => (both, all + 1),
        });

    if union == 0 {
        return Ok(0.0);
    }
    Ok(intersection as f64 / union as f64)
}

/// Blends follow overlap and interaction similarity
#[derive(Debug)]
pub struct SimilarityEngine {
    alpha: f64,
    cache: SimilarityCache,
}

impl SimilarityEngine {
    pub fn new(alpha: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(EngineError::InvalidConfig(format!(
                "alpha must be within [0, 1], got {}",
                alpha
            )));
        }
        Ok(Self {
            alpha,
            cache: SimilarityCache::new(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.alpha)
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn cache(&self) -> &SimilarityCache {
        &self.cache
    }

    fn blend(&self, jaccard: f64, cosine: f64) -> f64 {
        self.alpha * jaccard + (1.0 - self.alpha) * cosine
    }

    /// `alpha * jaccard + (1 - alpha) * cosine`
    pub fn hybrid_score(
        &self,
        store: &GraphStore,
        interactions: &InteractionIndex,
        u: UserId,
        v: UserId,
    ) -> Result<f64> {
        let j = jaccard(store, u, v)?;
        Ok(self.blend(j, interactions.cosine(u, v)))
    }

    /// Same as [`hybrid_score`](Self::hybrid_score), memoized until the graph
    /// or the interaction index changes
    pub fn cached_hybrid_score(
        &self,
        store: &GraphStore,
        interactions: &InteractionIndex,
        u: UserId,
        v: UserId,
    ) -> Result<f64> {
        // Ids are validated before the cache lookup
        let j = jaccard(store, u, v)?;
        let stamp = (store.generation(), interactions.revision());
        Ok(self
            .cache
            .get_or_compute(stamp, u, v, || self.blend(j, interactions.cosine(u, v))))
    }

    fn score_candidate(
        &self,
        store: &GraphStore,
        interactions: &InteractionIndex,
        u: UserId,
        candidate: UserId,
    ) -> Result<ScoredCandidate> {
        let j = jaccard(store, u, candidate)?;
        let c = interactions.cosine(u, candidate);
        let stamp = (store.generation(), interactions.revision());
        let score = self
            .cache
            .get_or_compute(stamp, u, candidate, || self.blend(j, c));
        Ok(ScoredCandidate {
            user: candidate,
            jaccard: j,
            cosine: c,
            score,
        })
    }

    /// Every user except `u` and those `u` already follows, best first.
    /// Equal scores are ordered by ascending id.
    pub fn rank_candidates(
        &self,
        store: &GraphStore,
        interactions: &InteractionIndex,
        u: UserId,
    ) -> Result<Vec<ScoredCandidate>> {
        if !store.contains(u) {
            return Err(EngineError::user_not_found(u));
        }

        let candidates: Vec<UserId> = store
            .user_ids()
            .filter(|&v| v != u && !store.is_following(u, v))
            .collect();

        let mut scored = candidates
            .par_iter()
            .map(|&v| self.score_candidate(store, interactions, u, v))
            .collect::<Result<Vec<_>>>()?;

        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.user.cmp(&b.user)));

        log::debug!("Scored {} candidates for user {}", scored.len(), u);
        Ok(scored)
    }
}
