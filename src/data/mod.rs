//! Persistence collaborator interface and in-memory implementation

pub mod content;
pub mod snapshot;

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use bytes::Bytes;

use crate::feed::Post;
use crate::graph::{FollowEdge, User, UserId};

pub use content::ContentStore;
pub use snapshot::{load_snapshot, parse_snapshot, Snapshot};

/// Records the engine needs from the persistence layer
pub trait SocialRepository {
    fn users(&self) -> Result<Vec<User>>;

    fn follows(&self) -> Result<Vec<FollowEdge>>;

    fn posts(&self) -> Result<Vec<Post>>;

    /// Profile interests per user
    fn interests(&self) -> Result<Vec<(UserId, Vec<String>)>>;

    fn store_content(&mut self, key: &str, blob: Bytes) -> Result<()>;

    fn load_content(&self, key: &str) -> Result<Option<Bytes>>;
}

/// Vec-backed repository used by the CLI and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    users: Vec<User>,
    follows: Vec<FollowEdge>,
    posts: Vec<Post>,
    interests: BTreeMap<UserId, Vec<String>>,
    content: HashMap<String, Bytes>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&mut self, user: User) {
        self.users.push(user);
    }

    pub fn add_follow(&mut self, edge: FollowEdge) {
        self.follows.push(edge);
    }

    pub fn add_post(&mut self, post: Post) {
        self.posts.push(post);
    }

    pub fn set_interests(&mut self, user: UserId, interests: Vec<String>) {
        self.interests.insert(user, interests);
    }

    pub fn content_len(&self) -> usize {
        self.content.len()
    }
}

impl SocialRepository for MemoryRepository {
    fn users(&self) -> Result<Vec<User>> {
        Ok(self.users.clone())
    }

    fn follows(&self) -> Result<Vec<FollowEdge>> {
        Ok(self.follows.clone())
    }

    fn posts(&self) -> Result<Vec<Post>> {
        Ok(self.posts.clone())
    }

    fn interests(&self) -> Result<Vec<(UserId, Vec<String>)>> {
        Ok(self
            .interests
            .iter()
            .map(|(id, interests)| (*id, interests.clone()))
            .collect())
    }

    fn store_content(&mut self, key: &str, blob: Bytes) -> Result<()> {
        self.content.insert(key.to_string(), blob);
        Ok(())
    }

    fn load_content(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self.content.get(key).cloned())
    }
}
