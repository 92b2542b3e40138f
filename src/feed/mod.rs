//! Feed ranking module

pub mod ranker;
pub mod strategy;

use serde::{Deserialize, Serialize};

use crate::graph::{Timestamp, UserId};

pub use ranker::{merge_sort_by, FeedRanker, RankedPost};
pub use strategy::{InverseSquareDecay, PopularityDecay, RankingStrategy};

pub type PostId = u64;

/// Pointer to a compressed body held by the persistence layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    pub key: String,
    pub original_len: u64,
}

/// Post metadata the ranker works from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,

    /// Author id; not guaranteed to still exist in the graph
    pub author: UserId,

    pub created_at: Timestamp,

    #[serde(default)]
    pub likes: u64,

    #[serde(default)]
    pub dislikes: u64,

    #[serde(default)]
    pub comment_count: u64,

    #[serde(default)]
    pub content: Option<ContentRef>,
}

impl Post {
    pub fn new(id: PostId, author: UserId, created_at: Timestamp) -> Self {
        Self {
            id,
            author,
            created_at,
            likes: 0,
            dislikes: 0,
            comment_count: 0,
            content: None,
        }
    }

    pub fn with_engagement(mut self, likes: u64, dislikes: u64, comment_count: u64) -> Self {
        self.likes = likes;
        self.dislikes = dislikes;
        self.comment_count = comment_count;
        self
    }

    /// Hours since creation; posts dated in the future count as brand new
    pub fn age_hours(&self, now: Timestamp) -> f64 {
        (now - self.created_at).max(0) as f64 / 3600.0
    }
}
