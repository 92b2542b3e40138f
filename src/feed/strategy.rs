//! Post scoring strategies

use std::collections::HashMap;

use crate::config::{Config, EngagementWeights, RankingKind};
use crate::feed::Post;
use crate::graph::{Timestamp, UserId};

/// Scores a post at a point in time; higher ranks first
pub trait RankingStrategy: Send + Sync {
    fn score(&self, post: &Post, now: Timestamp) -> f64;
}

/// `popularity_weight * engagement - decay_weight * age_hours`,
/// plus an optional bonus for influential authors
#[derive(Debug, Clone)]
pub struct PopularityDecay {
    pub popularity_weight: f64,
    pub decay_weight: f64,
    pub engagement: EngagementWeights,
    pub influence_weight: f64,

    /// Author -> influence in [0, 1]
    pub influence: HashMap<UserId, f64>,
}

impl PopularityDecay {
    pub fn from_config(config: &Config) -> Self {
        Self {
            popularity_weight: config.popularity_weight,
            decay_weight: config.decay_weight,
            engagement: config.engagement,
            influence_weight: config.influence_weight,
            influence: HashMap::new(),
        }
    }

    pub fn engagement(&self, post: &Post) -> f64 {
        self.engagement.likes * post.likes as f64 - self.engagement.dislikes * post.dislikes as f64
            + self.engagement.comments * post.comment_count as f64
    }
}

impl RankingStrategy for PopularityDecay {
    fn score(&self, post: &Post, now: Timestamp) -> f64 {
        let influence = self.influence.get(&post.author).copied().unwrap_or(0.0);
        self.popularity_weight * self.engagement(post) - self.decay_weight * post.age_hours(now)
            + self.influence_weight * influence
    }
}

/// Fixed weights (likes 5, comments 10, dislikes -5) plus `1000 / (age_hours + 1)^2`
#[derive(Debug, Clone, Copy, Default)]
pub struct InverseSquareDecay;

impl RankingStrategy for InverseSquareDecay {
    fn score(&self, post: &Post, now: Timestamp) -> f64 {
        let popularity =
            5.0 * post.likes as f64 + 10.0 * post.comment_count as f64 - 5.0 * post.dislikes as f64;
        let hours = post.age_hours(now);
        popularity + 1000.0 / (hours + 1.0).powi(2)
    }
}

/// Pick the strategy named by the configuration
pub fn from_config(config: &Config, influence: HashMap<UserId, f64>) -> Box<dyn RankingStrategy> {
    match config.ranking {
        RankingKind::PopularityDecay => Box::new(PopularityDecay {
            influence,
            ..PopularityDecay::from_config(config)
        }),
        RankingKind::InverseSquareDecay => Box::new(InverseSquareDecay),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popularity_decay_default_weights() {
        let strategy = PopularityDecay::from_config(&Config::default());
        let post = Post::new(1, 1, 0).with_engagement(10, 2, 3);
        // engagement 11, two hours old at decay 0.1
        let score = strategy.score(&post, 7200);
        assert!((score - (11.0 - 0.2)).abs() < 1e-9);
    }

    #[test]
    fn influence_bonus_applies_to_author() {
        let config = Config {
            influence_weight: 4.0,
            ..Config::default()
        };
        let strategy = PopularityDecay {
            influence: HashMap::from([(7, 0.5)]),
            ..PopularityDecay::from_config(&config)
        };
        let by_seven = Post::new(1, 7, 100);
        let by_eight = Post::new(2, 8, 100);
        assert!((strategy.score(&by_seven, 100) - strategy.score(&by_eight, 100) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn inverse_square_matches_fixed_formula() {
        let post = Post::new(1, 1, 0).with_engagement(2, 1, 1);
        // 10 + 10 - 5 + 1000 / (1 + 1)^2
        assert!((InverseSquareDecay.score(&post, 3600) - 265.0).abs() < 1e-9);
    }

    #[test]
    fn future_posts_do_not_gain_score() {
        let post = Post::new(1, 1, 10_000);
        assert_eq!(post.age_hours(0), 0.0);
    }
}
