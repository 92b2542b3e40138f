//! Sparse interaction vectors for cosine similarity

use std::collections::{BTreeMap, HashMap};

use itertools::{EitherOrBoth, Itertools};
use serde::{Deserialize, Serialize};

use crate::graph::UserId;

/// Feature key -> weight; missing keys are zero
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionVector {
    weights: BTreeMap<String, f64>,
}

impl InteractionVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: impl Into<String>, weight: f64) {
        *self.weights.entry(key.into()).or_insert(0.0) += weight;
    }

    pub fn get(&self, key: &str) -> f64 {
        self.weights.get(key).copied().unwrap_or(0.0)
    }

    pub fn norm(&self) -> f64 {
        self.weights.values().map(|w| w * w).sum::<f64>().sqrt()
    }

    pub fn dot(&self, other: &InteractionVector) -> f64 {
        self.weights
            .iter()
            .merge_join_by(other.weights.iter(), |(a, _), (b, _)| a.cmp(b))
            .map(|pair| match pair {
                EitherOrBoth::Both((_, x), (_, y)) => x * y,
                _ => 0.0,
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for InteractionVector {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut vector = Self::new();
        for (key, weight) in iter {
            vector.add(key, weight);
        }
        vector
    }
}

/// Dot product over product of norms; 0 when either norm is zero
pub fn cosine(a: &InteractionVector, b: &InteractionVector) -> f64 {
    let denominator = a.norm() * b.norm();
    if denominator == 0.0 {
        return 0.0;
    }
    a.dot(b) / denominator
}

/// Per-user interaction vectors supplied by the collaborator layer
#[derive(Debug, Clone, Default)]
pub struct InteractionIndex {
    vectors: HashMap<UserId, InteractionVector>,
    revision: u64,
}

impl InteractionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each profile interest contributes weight 1.0 under `interest:<name>`
    pub fn add_interests<I, S>(&mut self, user: UserId, interests: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let vector = self.vectors.entry(user).or_default();
        for interest in interests {
            vector.add(format!("interest:{}", interest.as_ref().to_lowercase()), 1.0);
        }
        self.revision += 1;
    }

    /// Accumulate an interaction weight (likes, comments, ...) toward `key`
    pub fn record(&mut self, user: UserId, key: impl Into<String>, weight: f64) {
        self.vectors.entry(user).or_default().add(key, weight);
        self.revision += 1;
    }

    pub fn remove_user(&mut self, user: UserId) {
        if self.vectors.remove(&user).is_some() {
            self.revision += 1;
        }
    }

    pub fn vector(&self, user: UserId) -> Option<&InteractionVector> {
        self.vectors.get(&user)
    }

    /// Cosine between two users; 0 when either has no vector
    pub fn cosine(&self, a: UserId, b: UserId) -> f64 {
        match (self.vectors.get(&a), self.vectors.get(&b)) {
            (Some(x), Some(y)) => cosine(x, y),
            _ => 0.0,
        }
    }

    /// Changes whenever any vector changes
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}
