//! JSON snapshot files standing in for the persistence layer

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{ContentStore, MemoryRepository};
use crate::feed::Post;
use crate::graph::{FollowEdge, User};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotUser {
    #[serde(flatten)]
    pub user: User,

    #[serde(default)]
    pub interests: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotPost {
    #[serde(flatten)]
    pub post: Post,

    /// Plain-text body, compressed into the repository on load
    #[serde(default)]
    pub body: Option<String>,
}

/// On-disk layout of a snapshot file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub users: Vec<SnapshotUser>,

    #[serde(default)]
    pub follows: Vec<FollowEdge>,

    #[serde(default)]
    pub posts: Vec<SnapshotPost>,
}

impl Snapshot {
    /// Move the records into a repository, compressing post bodies
    pub fn into_repository(self) -> Result<MemoryRepository> {
        let mut store = ContentStore::new(MemoryRepository::new());

        for entry in self.users {
            let repo = store.repository_mut();
            if !entry.interests.is_empty() {
                repo.set_interests(entry.user.id, entry.interests);
            }
            repo.add_user(entry.user);
        }

        for edge in self.follows {
            store.repository_mut().add_follow(edge);
        }

        let mut bodies = 0usize;
        for entry in self.posts {
            let mut post = entry.post;
            if let Some(body) = entry.body {
                post.content = Some(store.put(&format!("post:{}", post.id), body.as_bytes())?);
                bodies += 1;
            }
            store.repository_mut().add_post(post);
        }

        log::info!("Compressed {} post bodies", bodies);
        Ok(store.into_inner())
    }
}

/// Parse snapshot JSON text
pub fn parse_snapshot(json: &str) -> Result<MemoryRepository> {
    let snapshot: Snapshot = serde_json::from_str(json).context("parsing snapshot JSON")?;
    log::info!(
        "Snapshot holds {} users, {} follows, {} posts",
        snapshot.users.len(),
        snapshot.follows.len(),
        snapshot.posts.len()
    );
    snapshot.into_repository()
}

/// Read a snapshot file into a [`MemoryRepository`]
pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<MemoryRepository> {
    let path = path.as_ref();
    log::info!("Reading snapshot file: {}", path.display());

    if !path.exists() {
        return Err(anyhow::anyhow!("File not found: {}", path.display()));
    }

    let json = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_snapshot(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SocialRepository;
    use std::io::Write;

    const SNAPSHOT: &str = r#"{
        "users": [
            {"id": 1, "username": "alice", "created_at": 100, "interests": ["music", "chess"]},
            {"id": 2, "username": "bob", "profile": {"bio": "hi"}}
        ],
        "follows": [{"follower": 1, "followee": 2, "created_at": 200}],
        "posts": [{"id": 10, "author": 2, "created_at": 300, "likes": 4, "body": "hello hello"}]
    }"#;

    #[test]
    fn parses_records_and_compresses_bodies() {
        let repo = parse_snapshot(SNAPSHOT).unwrap();
        let users = repo.users().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[1].profile.get("bio").map(String::as_str), Some("hi"));
        assert_eq!(repo.follows().unwrap()[0].created_at, 200);
        assert_eq!(repo.interests().unwrap(), vec![(1, vec!["music".to_string(), "chess".to_string()])]);

        let posts = repo.posts().unwrap();
        let content = posts[0].content.clone().unwrap();
        assert_eq!(content.key, "post:10");

        let store = ContentStore::new(repo);
        assert_eq!(store.get_text(&content).unwrap(), "hello hello");
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SNAPSHOT.as_bytes()).unwrap();
        let repo = load_snapshot(file.path()).unwrap();
        assert_eq!(repo.posts().unwrap().len(), 1);

        assert!(load_snapshot(file.path().with_extension("missing")).is_err());
        assert!(parse_snapshot("{not json").is_err());
    }
}
