//! Follow prediction: KNN over graph and similarity features, with a
//! hybrid-similarity fallback when there is too little labeled data.

pub mod features;
pub mod knn;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::graph::UserId;

pub use features::{capped_separation, FeatureExtractor, FeatureVector, LabeledExample};
pub use knn::{KnnClassifier, Scaler, Vote, Voting};

/// Which model produced a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionSource {
    Knn,
    Fallback,
}

/// Follow likelihood for one (user, candidate) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub candidate: UserId,
    pub will_follow: bool,
    pub probability: f64,
    pub hybrid_score: f64,
    pub source: PredictionSource,
}

impl Prediction {
    /// Neutral prediction used without a trained model
    fn fallback(candidate: UserId, hybrid_score: f64) -> Self {
        Self {
            candidate,
            will_follow: hybrid_score >= 0.5,
            probability: hybrid_score,
            hybrid_score,
            source: PredictionSource::Fallback,
        }
    }
}

/// Held-out accuracy report
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub train_size: usize,
    pub test_size: usize,
    pub accuracy: f64,
}

/// Shuffle with `seed` and move `ratio` of the examples into a test set
pub fn split_holdout(
    mut examples: Vec<LabeledExample>,
    ratio: f64,
    seed: u64,
) -> (Vec<LabeledExample>, Vec<LabeledExample>) {
    let mut rng = StdRng::seed_from_u64(seed);
    examples.shuffle(&mut rng);

    let test_len = ((examples.len() as f64) * ratio.clamp(0.0, 1.0)).round() as usize;
    let test = examples.split_off(examples.len() - test_len);
    (examples, test)
}

/// Owns the trained classifier, if any
#[derive(Debug, Clone)]
pub struct Predictor {
    k: usize,
    voting: Voting,
    negative_ratio: usize,
    seed: u64,
    model: Option<KnnClassifier>,
}

impl Predictor {
    pub fn new(k: usize, negative_ratio: usize, seed: u64) -> Self {
        Self {
            k,
            voting: Voting::Majority,
            negative_ratio,
            seed,
            model: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.k, config.negative_ratio, config.seed).with_voting(config.voting)
    }

    pub fn with_voting(mut self, voting: Voting) -> Self {
        self.voting = voting;
        self
    }

    pub fn source(&self) -> PredictionSource {
        if self.model.is_some() {
            PredictionSource::Knn
        } else {
            PredictionSource::Fallback
        }
    }

    pub fn model(&self) -> Option<&KnnClassifier> {
        self.model.as_ref()
    }

    /// Drop the model; predictions fall back until the next training run
    pub fn reset(&mut self) {
        self.model = None;
    }

    /// Fit on supplied labeled examples. Too few examples leaves the
    /// predictor in fallback mode rather than failing.
    pub fn train_on(&mut self, examples: Vec<LabeledExample>) -> Result<PredictionSource> {
        match KnnClassifier::fit_with(self.k, self.voting, examples) {
            Ok(model) => {
                log::info!("KNN model fitted on {} examples (k = {})", model.len(), self.k);
                self.model = Some(model);
            }
            Err(EngineError::InsufficientData(reason)) => {
                log::warn!("Falling back to hybrid similarity ranking: {}", reason);
                self.model = None;
            }
            Err(e) => return Err(e),
        }
        Ok(self.source())
    }

    /// Fit on examples bootstrapped from the current follow graph
    pub fn train(&mut self, extractor: &FeatureExtractor<'_>) -> Result<PredictionSource> {
        let examples = extractor.bootstrap(self.negative_ratio, self.seed)?;
        self.train_on(examples)
    }

    /// Bootstrap, hold out `ratio` of the examples, fit on the rest and
    /// report accuracy on the held-out part. The predictor keeps the model
    /// fitted on the training split.
    pub fn train_with_holdout(
        &mut self,
        extractor: &FeatureExtractor<'_>,
        ratio: f64,
    ) -> Result<Option<Evaluation>> {
        let examples = extractor.bootstrap(self.negative_ratio, self.seed)?;
        let (train, test) = split_holdout(examples, ratio, self.seed);
        let train_size = train.len();
        self.train_on(train)?;

        let evaluation = self.evaluate(&test).map(|accuracy| Evaluation {
            train_size,
            test_size: test.len(),
            accuracy,
        });
        if let Some(report) = &evaluation {
            log::info!(
                "Held-out accuracy {:.3} on {} examples",
                report.accuracy,
                report.test_size
            );
        }
        Ok(evaluation)
    }

    /// Accuracy on `examples`; `None` without a model or examples
    pub fn evaluate(&self, examples: &[LabeledExample]) -> Option<f64> {
        match &self.model {
            Some(model) if !examples.is_empty() => Some(model.accuracy(examples)),
            _ => None,
        }
    }

    pub fn predict(
        &self,
        extractor: &FeatureExtractor<'_>,
        user: UserId,
        candidate: UserId,
    ) -> Result<Prediction> {
        let features = extractor.extract(user, candidate)?;
        Ok(self.predict_features(candidate, &features))
    }

    fn predict_features(&self, candidate: UserId, features: &FeatureVector) -> Prediction {
        match &self.model {
            Some(model) => {
                let vote = model.predict(features);
                Prediction {
                    candidate,
                    will_follow: vote.follows,
                    probability: vote.probability,
                    hybrid_score: features.hybrid(),
                    source: PredictionSource::Knn,
                }
            }
            None => Prediction::fallback(candidate, features.hybrid()),
        }
    }

    /// Top `limit` users for `user` to follow. With a model, candidates are
    /// ordered by KNN probability then hybrid score; without one, by hybrid
    /// score alone.
    pub fn recommend(
        &self,
        extractor: &FeatureExtractor<'_>,
        user: UserId,
        limit: usize,
    ) -> Result<Vec<Prediction>> {
        let candidates = extractor.candidates(user)?;

        if self.model.is_none() {
            return Ok(candidates
                .into_iter()
                .take(limit)
                .map(|c| Prediction::fallback(c.user, c.score))
                .collect());
        }

        let mut predictions = candidates
            .par_iter()
            .map(|c| self.predict(extractor, user, c.user))
            .collect::<Result<Vec<_>>>()?;

        predictions.sort_by(|a, b| {
            b.probability
                .total_cmp(&a.probability)
                .then(b.hybrid_score.total_cmp(&a.hybrid_score))
                .then(a.candidate.cmp(&b.candidate))
        });
        predictions.truncate(limit);
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphStore, User};
    use crate::similarity::{InteractionIndex, SimilarityEngine};

    fn star_store() -> GraphStore {
        let mut store = GraphStore::new();
        for id in 1..=8 {
            store.add_user(User::new(id, format!("user{}", id))).unwrap();
        }
        // 2..=6 all follow 1 and 7
        for id in 2..=6 {
            store.follow(id, 1).unwrap();
            store.follow(id, 7).unwrap();
        }
        store
    }

    #[test]
    fn too_few_examples_falls_back_without_error() {
        let mut store = GraphStore::new();
        for id in 1..=3 {
            store.add_user(User::new(id, format!("user{}", id))).unwrap();
        }
        store.follow(1, 2).unwrap();
        let interactions = InteractionIndex::new();
        let similarity = SimilarityEngine::new(0.6).unwrap();
        let extractor = FeatureExtractor::new(&store, &interactions, &similarity, 6);

        let mut predictor = Predictor::new(5, 2, 42);
        assert_eq!(predictor.train(&extractor).unwrap(), PredictionSource::Fallback);

        let prediction = predictor.predict(&extractor, 3, 2).unwrap();
        assert_eq!(prediction.source, PredictionSource::Fallback);
        assert_eq!(prediction.probability, prediction.hybrid_score);

        let recommended = predictor.recommend(&extractor, 1, 10).unwrap();
        assert_eq!(recommended.len(), 1);
        assert_eq!(recommended[0].candidate, 3);
    }

    #[test]
    fn enough_edges_train_knn_mode() {
        let store = star_store();
        let interactions = InteractionIndex::new();
        let similarity = SimilarityEngine::new(0.6).unwrap();
        let extractor = FeatureExtractor::new(&store, &interactions, &similarity, 6);

        let mut predictor = Predictor::new(3, 2, 42);
        assert_eq!(predictor.train(&extractor).unwrap(), PredictionSource::Knn);

        let recommended = predictor.recommend(&extractor, 8, 3).unwrap();
        assert!(recommended.len() <= 3);
        assert!(recommended.iter().all(|p| p.source == PredictionSource::Knn));
        assert!(recommended
            .windows(2)
            .all(|w| w[0].probability >= w[1].probability));

        predictor.reset();
        assert_eq!(predictor.source(), PredictionSource::Fallback);
    }

    #[test]
    fn recommend_excludes_followed_users() {
        let store = star_store();
        let interactions = InteractionIndex::new();
        let similarity = SimilarityEngine::new(0.6).unwrap();
        let extractor = FeatureExtractor::new(&store, &interactions, &similarity, 6);

        let mut predictor = Predictor::new(3, 2, 42);
        predictor.train(&extractor).unwrap();
        let recommended = predictor.recommend(&extractor, 2, 10).unwrap();
        let ids: Vec<UserId> = recommended.iter().map(|p| p.candidate).collect();
        assert!(!ids.contains(&1));
        assert!(!ids.contains(&7));
        assert!(!ids.contains(&2));
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn unknown_user_is_not_found() {
        let store = star_store();
        let interactions = InteractionIndex::new();
        let similarity = SimilarityEngine::new(0.6).unwrap();
        let extractor = FeatureExtractor::new(&store, &interactions, &similarity, 6);
        let predictor = Predictor::new(3, 2, 42);
        assert!(matches!(
            predictor.predict(&extractor, 1, 99),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn holdout_split_is_seeded() {
        let examples: Vec<LabeledExample> = (0..10)
            .map(|i| LabeledExample {
                features: FeatureVector([i as f64, 0.0, 0.0, 0.0]),
                follows: i % 2 == 0,
            })
            .collect();

        let (train, test) = split_holdout(examples.clone(), 0.2, 42);
        assert_eq!((train.len(), test.len()), (8, 2));
        assert_eq!(split_holdout(examples, 0.2, 42), (train, test));
    }

    #[test]
    fn holdout_training_reports_accuracy() {
        let store = star_store();
        let interactions = InteractionIndex::new();
        let similarity = SimilarityEngine::new(0.6).unwrap();
        let extractor = FeatureExtractor::new(&store, &interactions, &similarity, 6);

        let mut predictor = Predictor::new(3, 2, 7);
        let report = predictor.train_with_holdout(&extractor, 0.2).unwrap().unwrap();
        assert_eq!(report.train_size + report.test_size, 30);
        assert!((0.0..=1.0).contains(&report.accuracy));
    }
}
