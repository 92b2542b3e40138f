//! Stable merge-sort ranking of candidate posts

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::feed::strategy::{self, RankingStrategy};
use crate::feed::Post;
use crate::graph::{GraphStore, Timestamp, UserId};

/// A post with the score it was ranked by
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPost {
    pub post: Post,
    pub score: f64,
}

/// Top-down merge sort. Elements comparing equal keep their input order.
pub fn merge_sort_by<T, F>(mut items: Vec<T>, compare: &mut F) -> Vec<T>
where
    F: FnMut(&T, &T) -> Ordering,
{
    if items.len() <= 1 {
        return items;
    }

    let right = items.split_off(items.len() / 2);
    let left = merge_sort_by(items, &mut *compare);
    let right = merge_sort_by(right, &mut *compare);
    merge(left, right, compare)
}

fn merge<T, F>(left: Vec<T>, right: Vec<T>, compare: &mut F) -> Vec<T>
where
    F: FnMut(&T, &T) -> Ordering,
{
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();

    loop {
        let take_right = match (left.peek(), right.peek()) {
            // Only a strictly smaller right element may overtake the left run
            (Some(l), Some(r)) => compare(r, l) == Ordering::Less,
            _ => break,
        };
        let next = if take_right { right.next() } else { left.next() };
        merged.extend(next);
    }

    merged.extend(left);
    merged.extend(right);
    merged
}

/// Orders posts by a [`RankingStrategy`], best first
pub struct FeedRanker {
    strategy: Box<dyn RankingStrategy>,
}

impl FeedRanker {
    pub fn new(strategy: Box<dyn RankingStrategy>) -> Self {
        Self { strategy }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(strategy::from_config(config, HashMap::new()))
    }

    /// Strategy from `config`, with author influence feeding the popularity signal
    pub fn with_influence(config: &Config, influence: HashMap<UserId, f64>) -> Self {
        Self::new(strategy::from_config(config, influence))
    }

    /// Score and sort by descending score
    pub fn rank<I>(&self, posts: I, now: Timestamp) -> Vec<RankedPost>
    where
        I: IntoIterator<Item = Post>,
    {
        let scored: Vec<RankedPost> = posts
            .into_iter()
            .map(|post| RankedPost {
                score: self.strategy.score(&post, now),
                post,
            })
            .collect();

        merge_sort_by(scored, &mut |a: &RankedPost, b: &RankedPost| b.score.total_cmp(&a.score))
    }

    /// Rank the posts written by users `viewer` follows
    pub fn feed_for<I>(
        &self,
        store: &GraphStore,
        viewer: UserId,
        posts: I,
        now: Timestamp,
    ) -> Result<Vec<RankedPost>>
    where
        I: IntoIterator<Item = Post>,
    {
        if !store.contains(viewer) {
            return Err(EngineError::user_not_found(viewer));
        }

        let candidates = posts
            .into_iter()
            .filter(|post| store.is_following(viewer, post.author));
        let ranked = self.rank(candidates, now);

        log::debug!("Ranked {} feed posts for user {}", ranked.len(), viewer);
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RankingKind;
    use crate::graph::User;

    const HOUR: Timestamp = 3600;

    fn ids(ranked: &[RankedPost]) -> Vec<u64> {
        ranked.iter().map(|r| r.post.id).collect()
    }

    #[test]
    fn merge_sort_is_stable() {
        let items = vec![(3, 'a'), (1, 'b'), (3, 'c'), (2, 'd'), (1, 'e'), (3, 'f')];
        let sorted = merge_sort_by(items, &mut |a: &(i32, char), b: &(i32, char)| a.0.cmp(&b.0));
        assert_eq!(
            sorted,
            vec![(1, 'b'), (1, 'e'), (2, 'd'), (3, 'a'), (3, 'c'), (3, 'f')]
        );
    }

    #[test]
    fn newer_post_wins_on_equal_engagement() {
        let ranker = FeedRanker::from_config(&Config::default());
        let older = Post::new(1, 1, 0).with_engagement(10, 0, 0);
        let newer = Post::new(2, 1, 5 * HOUR).with_engagement(10, 0, 0);

        let ranked = ranker.rank(vec![older, newer], 10 * HOUR);
        assert_eq!(ids(&ranked), vec![2, 1]);
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn equal_scores_keep_insertion_order() {
        let ranker = FeedRanker::from_config(&Config::default());
        let posts: Vec<Post> = (1..=5)
            .map(|id| Post::new(id, 1, HOUR).with_engagement(4, 1, 0))
            .collect();

        let ranked = ranker.rank(posts, 2 * HOUR);
        assert_eq!(ids(&ranked), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn engagement_outranks_small_age_gap() {
        let ranker = FeedRanker::from_config(&Config::default());
        let popular = Post::new(1, 1, 0).with_engagement(50, 0, 10);
        let fresh = Post::new(2, 1, 3 * HOUR);
        let ranked = ranker.rank(vec![fresh, popular], 3 * HOUR);
        assert_eq!(ids(&ranked), vec![1, 2]);
    }

    #[test]
    fn inverse_square_strategy_is_selectable() {
        let config = Config {
            ranking: RankingKind::InverseSquareDecay,
            ..Config::default()
        };
        let ranker = FeedRanker::from_config(&config);
        let old_liked = Post::new(1, 1, 0).with_engagement(1, 0, 0);
        let brand_new = Post::new(2, 1, 48 * HOUR);
        let ranked = ranker.rank(vec![old_liked, brand_new], 48 * HOUR);
        // 1000 for the new post beats 5 + 1000/49^2
        assert_eq!(ids(&ranked), vec![2, 1]);
    }

    #[test]
    fn feed_only_contains_followed_authors() {
        let mut store = GraphStore::new();
        for id in 1..=3 {
            store.add_user(User::new(id, format!("u{}", id))).unwrap();
        }
        store.follow(1, 2).unwrap();

        let ranker = FeedRanker::from_config(&Config::default());
        let posts = vec![Post::new(10, 2, 0), Post::new(11, 3, 0), Post::new(12, 1, 0)];
        let feed = ranker.feed_for(&store, 1, posts.clone(), HOUR).unwrap();
        assert_eq!(ids(&feed), vec![10]);

        assert!(matches!(
            ranker.feed_for(&store, 42, posts, HOUR),
            Err(EngineError::NotFound(_))
        ));
    }
}
