//! k-nearest-neighbour follow classifier

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::error::{EngineError, Result};
use crate::predict::features::{FeatureVector, LabeledExample, FEATURE_COUNT};

/// Per-feature z-score normalization fixed at fit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: [f64; FEATURE_COUNT],
    pub std_dev: [f64; FEATURE_COUNT],
}

impl Scaler {
    pub fn fit(examples: &[LabeledExample]) -> Self {
        let mut mean = [0.0; FEATURE_COUNT];
        let mut std_dev = [1.0; FEATURE_COUNT];

        for feature in 0..FEATURE_COUNT {
            let column: Vec<f64> = examples.iter().map(|e| e.features.0[feature]).collect();
            if column.is_empty() {
                continue;
            }
            mean[feature] = column.iter().mean();
            let spread = column.iter().population_std_dev();
            // constant columns keep unit scale
            if spread.is_finite() && spread > 0.0 {
                std_dev[feature] = spread;
            }
        }

        Self { mean, std_dev }
    }

    pub fn transform(&self, features: &FeatureVector) -> FeatureVector {
        let mut scaled = [0.0; FEATURE_COUNT];
        for (i, value) in scaled.iter_mut().enumerate() {
            *value = (features.0[i] - self.mean[i]) / self.std_dev[i];
        }
        FeatureVector(scaled)
    }
}

/// How the k nearest neighbours decide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Voting {
    /// One vote each; a tied vote goes to the class with the smaller mean distance
    #[default]
    Majority,

    /// Votes weighted by `1 / (distance + 1e-5)`
    InverseDistance,
}

/// Outcome of a single classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vote {
    pub follows: bool,

    /// Share of the vote won by the positive class
    pub probability: f64,
}

/// Stores normalized training examples; prediction is a linear scan
#[derive(Debug, Clone)]
pub struct KnnClassifier {
    k: usize,
    voting: Voting,
    scaler: Scaler,
    examples: Vec<LabeledExample>,
}

impl KnnClassifier {
    /// Fails with `InsufficientData` when fewer than `k` examples are given
    pub fn fit(k: usize, examples: Vec<LabeledExample>) -> Result<Self> {
        Self::fit_with(k, Voting::Majority, examples)
    }

    pub fn fit_with(k: usize, voting: Voting, examples: Vec<LabeledExample>) -> Result<Self> {
        if k == 0 {
            return Err(EngineError::InvalidConfig("k must be at least 1".to_string()));
        }
        if examples.len() < k {
            return Err(EngineError::InsufficientData(format!(
                "{} labeled examples, need at least k = {}",
                examples.len(),
                k
            )));
        }

        let scaler = Scaler::fit(&examples);
        let examples = examples
            .into_iter()
            .map(|e| LabeledExample {
                features: scaler.transform(&e.features),
                follows: e.follows,
            })
            .collect();

        Ok(Self {
            k,
            voting,
            scaler,
            examples,
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Indices and distances of the k nearest examples, nearest first.
    /// Equal distances keep training order.
    fn nearest(&self, query: &FeatureVector) -> Vec<(usize, f64)> {
        let mut distances: Vec<(usize, f64)> = self
            .examples
            .iter()
            .enumerate()
            .map(|(i, e)| (i, query.distance(&e.features)))
            .collect();
        distances.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        distances.truncate(self.k);
        distances
    }

    /// Classify raw (unnormalized) features
    pub fn predict(&self, features: &FeatureVector) -> Vote {
        let query = self.scaler.transform(features);
        let neighbours = self.nearest(&query);

        let mut weight = [0.0f64; 2];
        let mut distance_sum = [0.0f64; 2];
        let mut count = [0usize; 2];
        for &(i, distance) in &neighbours {
            let class = usize::from(self.examples[i].follows);
            weight[class] += match self.voting {
                Voting::Majority => 1.0,
                Voting::InverseDistance => 1.0 / (distance + 1e-5),
            };
            distance_sum[class] += distance;
            count[class] += 1;
        }

        let total = weight[0] + weight[1];
        let probability = if total > 0.0 { weight[1] / total } else { 0.0 };

        let follows = match weight[1].partial_cmp(&weight[0]) {
            Some(Ordering::Greater) => true,
            Some(Ordering::Less) => false,
            _ => {
                let mean = |class: usize| distance_sum[class] / count[class].max(1) as f64;
                // nearer class wins; a perfect tie stays negative
                mean(1) < mean(0)
            }
        };

        Vote {
            follows,
            probability,
        }
    }

    /// Fraction of `examples` classified correctly
    pub fn accuracy(&self, examples: &[LabeledExample]) -> f64 {
        if examples.is_empty() {
            return 0.0;
        }
        let correct = examples
            .iter()
            .filter(|e| self.predict(&e.features).follows == e.follows)
            .count();
        correct as f64 / examples.len() as f64
    }
}
