//! Configuration management for the social graph engine

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::predict::Voting;

/// Case policy for the username index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseSensitivity {
    /// Keys are lowercased for storage and matching; display keeps the original spelling
    Insensitive,
    Sensitive,
}

/// Feed scoring strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingKind {
    /// `popularity_weight * engagement - decay_weight * age_hours`
    PopularityDecay,
    /// Fixed-weight engagement plus `1000 / (age_hours + 1)^2`
    InverseSquareDecay,
}

/// Coefficients of the linear engagement combination
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementWeights {
    pub likes: f64,
    pub dislikes: f64,
    pub comments: f64,
}

impl Default for EngagementWeights {
    fn default() -> Self {
        Self {
            likes: 1.0,
            dislikes: 1.0,
            comments: 1.0,
        }
    }
}

/// Engine configuration, settable at construction time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Multiplier applied to post engagement
    pub popularity_weight: f64,

    /// Score lost per hour of post age
    pub decay_weight: f64,

    /// Which feed scoring strategy to use
    pub ranking: RankingKind,

    /// Engagement coefficients (likes and comments add, dislikes subtract)
    pub engagement: EngagementWeights,

    /// Weight of the author's follower influence in feed scores
    pub influence_weight: f64,

    /// Jaccard share of the hybrid similarity score, in [0, 1]
    pub alpha: f64,

    /// Number of neighbors consulted by the KNN predictor
    pub k: usize,

    /// How the KNN neighbours vote
    pub voting: Voting,

    /// Maximum number of username suggestions
    pub autocomplete_limit: usize,

    /// Case policy for username search
    pub case_sensitivity: CaseSensitivity,

    /// Separation cap used in feature vectors; farther pairs get `max_separation + 1`
    pub max_separation: usize,

    /// Negatives kept per positive when bootstrapping training data
    pub negative_ratio: usize,

    /// Seed for negative sampling and holdout splits
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            popularity_weight: 1.0,
            decay_weight: 0.1,
            ranking: RankingKind::PopularityDecay,
            engagement: EngagementWeights::default(),
            influence_weight: 0.0,
            alpha: 0.6,
            k: 5,
            voting: Voting::Majority,
            autocomplete_limit: 10,
            case_sensitivity: CaseSensitivity::Insensitive,
            max_separation: 6,
            negative_ratio: 2,
            seed: 42,
        }
    }
}

impl Config {
    /// Create a new configuration with custom values for the core knobs
    pub fn new(
        popularity_weight: f64,
        decay_weight: f64,
        alpha: f64,
        k: usize,
        autocomplete_limit: usize,
        case_sensitivity: CaseSensitivity,
    ) -> Result<Self> {
        let config = Self {
            popularity_weight,
            decay_weight,
            alpha,
            k,
            autocomplete_limit,
            case_sensitivity,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(EngineError::InvalidConfig(format!(
                "alpha must be within [0, 1], got {}",
                self.alpha
            )));
        }
        if self.k == 0 {
            return Err(EngineError::InvalidConfig("k must be at least 1".into()));
        }
        if self.autocomplete_limit == 0 {
            return Err(EngineError::InvalidConfig(
                "autocomplete_limit must be at least 1".into(),
            ));
        }
        let weights = [
            ("popularity_weight", self.popularity_weight),
            ("decay_weight", self.decay_weight),
            ("influence_weight", self.influence_weight),
            ("engagement.likes", self.engagement.likes),
            ("engagement.dislikes", self.engagement.dislikes),
            ("engagement.comments", self.engagement.comments),
        ];
        for (name, value) in weights {
            if !value.is_finite() {
                return Err(EngineError::InvalidConfig(format!(
                    "{} must be finite",
                    name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.k, 5);
        assert_eq!(config.case_sensitivity, CaseSensitivity::Insensitive);
    }

    #[test]
    fn rejects_alpha_out_of_range() {
        let err = Config::new(1.0, 0.1, 1.5, 5, 10, CaseSensitivity::Sensitive).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_zero_k() {
        let err = Config::new(1.0, 0.1, 0.5, 0, 10, CaseSensitivity::Sensitive).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn partial_json_overlays_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "alpha": 0.25, "case_sensitivity": "sensitive" }"#).unwrap();
        assert_eq!(config.alpha, 0.25);
        assert_eq!(config.case_sensitivity, CaseSensitivity::Sensitive);
        assert_eq!(config.k, Config::default().k);
        assert_eq!(config.ranking, RankingKind::PopularityDecay);
    }
}
