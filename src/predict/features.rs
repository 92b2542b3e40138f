//! Feature extraction and bootstrap training data for follow prediction

use rand::rngs::StdRng;
use rand::seq::IteratorRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::{GraphStore, UserId};
use crate::similarity::{InteractionIndex, ScoredCandidate, SimilarityEngine};

pub const FEATURE_COUNT: usize = 4;

/// `[hybrid score, capped separation, candidate centrality, mutual followees]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn hybrid(&self) -> f64 {
        self.0[0]
    }

    pub fn separation(&self) -> f64 {
        self.0[1]
    }

    pub fn centrality(&self) -> f64 {
        self.0[2]
    }

    pub fn mutual_count(&self) -> f64 {
        self.0[3]
    }

    pub fn distance(&self, other: &FeatureVector) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

/// A feature vector with its follow outcome
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledExample {
    pub features: FeatureVector,
    pub follows: bool,
}

/// Hop count clamped to `max`; unreachable or farther maps to `max + 1`
pub fn capped_separation(separation: Option<usize>, max: usize) -> f64 {
    match separation {
        Some(hops) if hops <= max => hops as f64,
        _ => (max + 1) as f64,
    }
}

/// Reads graph metrics and similarity for user pairs
pub struct FeatureExtractor<'a> {
    store: &'a GraphStore,
    interactions: &'a InteractionIndex,
    similarity: &'a SimilarityEngine,
    max_separation: usize,
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(
        store: &'a GraphStore,
        interactions: &'a InteractionIndex,
        similarity: &'a SimilarityEngine,
        max_separation: usize,
    ) -> Self {
        Self {
            store,
            interactions,
            similarity,
            max_separation,
        }
    }

    pub fn store(&self) -> &'a GraphStore {
        self.store
    }

    pub fn hybrid_score(&self, user: UserId, candidate: UserId) -> Result<f64> {
        self.similarity
            .cached_hybrid_score(self.store, self.interactions, user, candidate)
    }

    /// Unfollowed users ranked by hybrid score
    pub fn candidates(&self, user: UserId) -> Result<Vec<ScoredCandidate>> {
        self.similarity
            .rank_candidates(self.store, self.interactions, user)
    }

    pub fn extract(&self, user: UserId, candidate: UserId) -> Result<FeatureVector> {
        let hybrid = self.hybrid_score(user, candidate)?;
        let separation = self.store.degree_of_separation(user, candidate)?;
        let centrality = self.store.centrality(candidate)?;
        let mutual = self.store.mutual_following(user, candidate)?.len();

        Ok(FeatureVector([
            hybrid,
            capped_separation(separation, self.max_separation),
            centrality,
            mutual as f64,
        ]))
    }

    /// Features of an existing follow `user -> candidate` computed as if it
    /// had not happened yet, so positives look like the pairs being predicted
    pub fn extract_held_out(&self, user: UserId, candidate: UserId) -> Result<FeatureVector> {
        if !self.store.is_following(user, candidate) {
            return self.extract(user, candidate);
        }
        let hidden = (user, candidate);

        let mutual = self.store.mutual_following(user, candidate)?.len();
        let union = self.store.following_count(user)? - 1 + self.store.following_count(candidate)?
            - mutual;
        let jaccard = if union == 0 {
            0.0
        } else {
            mutual as f64 / union as f64
        };
        let alpha = self.similarity.alpha();
        let hybrid = alpha * jaccard + (1.0 - alpha) * self.interactions.cosine(user, candidate);

        let separation = self.store.separation_without(user, candidate, hidden)?;
        let centrality = self.store.centrality_without(candidate, hidden)?;

        Ok(FeatureVector([
            hybrid,
            capped_separation(separation, self.max_separation),
            centrality,
            mutual as f64,
        ]))
    }

    /// Every follow edge as a positive (features taken with that edge held
    /// out), plus up to `negative_ratio` sampled non-edges per positive
    pub fn bootstrap(&self, negative_ratio: usize, seed: u64) -> Result<Vec<LabeledExample>> {
        let positives: Vec<(UserId, UserId)> = self
            .store
            .edges()
            .map(|edge| (edge.follower, edge.followee))
            .collect();

        let mut rng = StdRng::seed_from_u64(seed);
        let ids: Vec<UserId> = self.store.user_ids().collect();
        let store = self.store;
        let negatives: Vec<(UserId, UserId)> = ids
            .iter()
            .flat_map(|&u| ids.iter().map(move |&v| (u, v)))
            .filter(|&(u, v)| u != v && !store.is_following(u, v))
            .choose_multiple(&mut rng, positives.len() * negative_ratio);

        log::info!(
            "Bootstrap training set: {} follow edges, {} sampled non-edges",
            positives.len(),
            negatives.len()
        );

        let labeled: Vec<((UserId, UserId), bool)> = positives
            .into_iter()
            .map(|pair| (pair, true))
            .chain(negatives.into_iter().map(|pair| (pair, false)))
            .collect();

        labeled
            .par_iter()
            .map(|&((u, v), follows)| {
                let features = if follows {
                    self.extract_held_out(u, v)?
                } else {
                    self.extract(u, v)?
                };
                Ok(LabeledExample { features, follows })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::User;

    fn chain(users: u64) -> GraphStore {
        let mut store = GraphStore::new();
        for id in 1..=users {
            store.add_user(User::new(id, format!("user{}", id))).unwrap();
        }
        for id in 1..users {
            store.follow(id, id + 1).unwrap();
        }
        store
    }

    #[test]
    fn separation_is_capped_with_sentinel() {
        assert_eq!(capped_separation(Some(2), 6), 2.0);
        assert_eq!(capped_separation(Some(6), 6), 6.0);
        assert_eq!(capped_separation(Some(9), 6), 7.0);
        assert_eq!(capped_separation(None, 6), 7.0);
    }

    #[test]
    fn extract_reads_graph_metrics() {
        let mut store = chain(4);
        store.follow(1, 3).unwrap();
        let interactions = InteractionIndex::new();
        let similarity = SimilarityEngine::new(1.0).unwrap();
        let extractor = FeatureExtractor::new(&store, &interactions, &similarity, 6);

        // 1 -> {2, 3}, 2 -> {3}
        let features = extractor.extract(1, 2).unwrap();
        assert!((features.hybrid() - 0.5).abs() < 1e-12);
        assert_eq!(features.separation(), 1.0);
        assert!((features.centrality() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(features.mutual_count(), 1.0);

        let far = FeatureExtractor::new(&store, &interactions, &similarity, 1);
        assert_eq!(far.extract(1, 4).unwrap().separation(), 2.0);
    }

    #[test]
    fn bootstrap_is_seeded_and_balanced() {
        let store = chain(6);
        let interactions = InteractionIndex::new();
        let similarity = SimilarityEngine::new(0.6).unwrap();
        let extractor = FeatureExtractor::new(&store, &interactions, &similarity, 6);

        let first = extractor.bootstrap(2, 7).unwrap();
        let second = extractor.bootstrap(2, 7).unwrap();
        assert_eq!(first, second);

        let positives = first.iter().filter(|e| e.follows).count();
        assert_eq!(positives, 5);
        assert_eq!(first.len() - positives, 10);
    }

    #[test]
    fn held_out_features_match_the_graph_before_the_follow() {
        let before = chain(4);
        let mut after = before.clone();
        after.follow(1, 3).unwrap();

        let mut interactions = InteractionIndex::new();
        interactions.add_interests(1, ["go"]);
        interactions.add_interests(3, ["go", "rust"]);
        let similarity = SimilarityEngine::new(0.6).unwrap();

        let expected = FeatureExtractor::new(&before, &interactions, &similarity, 6)
            .extract(1, 3)
            .unwrap();
        let extractor = FeatureExtractor::new(&after, &interactions, &similarity, 6);
        let held_out = extractor.extract_held_out(1, 3).unwrap();
        for (a, b) in held_out.0.iter().zip(expected.0.iter()) {
            assert!((a - b).abs() < 1e-12, "{:?} vs {:?}", held_out, expected);
        }

        // a present follow is one hop; held out it is the chain distance
        assert_eq!(extractor.extract(1, 3).unwrap().separation(), 1.0);
        assert_eq!(held_out.separation(), 2.0);
    }

    #[test]
    fn bootstrap_on_empty_graph_is_empty() {
        let store = GraphStore::new();
        let interactions = InteractionIndex::new();
        let similarity = SimilarityEngine::new(0.6).unwrap();
        let extractor = FeatureExtractor::new(&store, &interactions, &similarity, 6);
        assert!(extractor.bootstrap(2, 1).unwrap().is_empty());
    }
}
