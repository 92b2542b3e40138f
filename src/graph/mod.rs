//! Social graph representation and algorithms module

pub mod algorithms;
pub mod builder;
pub mod components;
pub mod compressed;
pub mod store;

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub use compressed::CompressedGraph;
pub use store::{AdjacencyMatrix, GraphStore};

/// Stable user identifier assigned by the persistence layer
pub type UserId = u64;

/// Seconds since the unix epoch
pub type Timestamp = i64;

/// A registered user, owned by the graph store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,

    /// Profile attributes the core never interprets
    #[serde(default)]
    pub profile: BTreeMap<String, String>,

    #[serde(default)]
    pub created_at: Timestamp,
}

impl User {
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            profile: BTreeMap::new(),
            created_at: 0,
        }
    }

    pub fn created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Directed follow relationship: `follower` follows `followee`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowEdge {
    pub follower: UserId,
    pub followee: UserId,
    #[serde(default)]
    pub created_at: Timestamp,
}

/// Which edges to walk from a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Users this user follows
    Outgoing,
    /// Users following this user
    Incoming,
    /// Either direction
    Both,
}

impl Direction {
    pub fn includes_outgoing(self) -> bool {
        matches!(self, Direction::Outgoing | Direction::Both)
    }

    pub fn includes_incoming(self) -> bool {
        matches!(self, Direction::Incoming | Direction::Both)
    }
}

/// Current wall clock time as a unix timestamp
pub fn unix_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as Timestamp)
        .unwrap_or(0)
}
