//! Mutable, id-keyed social graph

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use itertools::Itertools;
use ndarray::Array2;

use crate::error::{EngineError, Result};
use crate::graph::{unix_now, CompressedGraph, Direction, FollowEdge, Timestamp, User, UserId};

/// Per-user adjacency, kept symmetric with the other endpoint's sets
#[derive(Debug, Clone)]
struct UserNode {
    user: User,

    /// Followee -> time the follow was created
    following: BTreeMap<UserId, Timestamp>,

    followers: BTreeSet<UserId>,
}

impl UserNode {
    fn new(user: User) -> Self {
        Self {
            user,
            following: BTreeMap::new(),
            followers: BTreeSet::new(),
        }
    }

    /// Calls `f(neighbor, outgoing)` for each edge walked in `direction`
    fn for_each_neighbor(&self, direction: Direction, mut f: impl FnMut(UserId, bool)) {
        if direction.includes_outgoing() {
            for &id in self.following.keys() {
                f(id, true);
            }
        }
        if direction.includes_incoming() {
            for &id in &self.followers {
                f(id, false);
            }
        }
    }
}

/// Dense matrix view of the graph; `matrix[[i, j]] == 1` when `ids[i]` follows `ids[j]`
#[derive(Debug, Clone)]
pub struct AdjacencyMatrix {
    pub ids: Vec<UserId>,
    pub matrix: Array2<u8>,
}

impl AdjacencyMatrix {
    pub fn index_of(&self, id: UserId) -> Option<usize> {
        self.ids.binary_search(&id).ok()
    }
}

/// In-memory follow graph: an arena of users plus id-keyed edge sets.
///
/// All mutation goes through `&mut self`, so analytics borrowing the store
/// (or working on a [`snapshot`](GraphStore::snapshot)) never see a partial
/// update. `generation` increases with every successful mutation and is used
/// by derived caches to detect staleness.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    nodes: BTreeMap<UserId, UserNode>,
    usernames: HashMap<String, UserId>,
    edge_count: usize,
    generation: u64,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user node. Ids and usernames must be unique.
    pub fn add_user(&mut self, user: User) -> Result<()> {
        if self.usernames.contains_key(&user.username) {
            return Err(EngineError::DuplicateUsername(format!("username {}", user.username)));
        }
        if self.nodes.contains_key(&user.id) {
            return Err(EngineError::DuplicateUsername(format!("user id {}", user.id)));
        }

        self.usernames.insert(user.username.clone(), user.id);
        self.nodes.insert(user.id, UserNode::new(user));
        self.generation += 1;
        Ok(())
    }

    /// Remove a user and every edge touching it
    pub fn remove_user(&mut self, id: UserId) -> Result<User> {
        let node = self
            .nodes
            .remove(&id)
            .ok_or_else(|| EngineError::user_not_found(id))?;

        for followee in node.following.keys() {
            if let Some(other) = self.nodes.get_mut(followee) {
                other.followers.remove(&id);
            }
        }
        for follower in &node.followers {
            if let Some(other) = self.nodes.get_mut(follower) {
                other.following.remove(&id);
            }
        }

        self.edge_count -= node.following.len() + node.followers.len();
        self.usernames.remove(&node.user.username);
        self.generation += 1;

        log::debug!(
            "Removed user {} with {} outgoing and {} incoming edges",
            id,
            node.following.len(),
            node.followers.len()
        );

        Ok(node.user)
    }

    /// `follower` starts following `followee` now
    pub fn follow(&mut self, follower: UserId, followee: UserId) -> Result<()> {
        self.follow_at(follower, followee, unix_now())
    }

    /// Add a follow edge with an explicit creation time
    pub fn follow_at(
        &mut self,
        follower: UserId,
        followee: UserId,
        created_at: Timestamp,
    ) -> Result<()> {
        self.require(follower)?;
        self.require(followee)?;

        if follower == followee {
            return Err(EngineError::InvalidEdge {
                follower,
                followee,
                reason: "users cannot follow themselves",
            });
        }

        let src = self
            .nodes
            .get_mut(&follower)
            .ok_or_else(|| EngineError::user_not_found(follower))?;
        if src.following.contains_key(&followee) {
            return Err(EngineError::InvalidEdge {
                follower,
                followee,
                reason: "already following",
            });
        }
        src.following.insert(followee, created_at);

        if let Some(dst) = self.nodes.get_mut(&followee) {
            dst.followers.insert(follower);
        }

        self.edge_count += 1;
        self.generation += 1;
        Ok(())
    }

    /// Remove an existing follow edge
    pub fn unfollow(&mut self, follower: UserId, followee: UserId) -> Result<()> {
        self.require(followee)?;
        let src = self
            .nodes
            .get_mut(&follower)
            .ok_or_else(|| EngineError::user_not_found(follower))?;

        if src.following.remove(&followee).is_none() {
            return Err(EngineError::NotFound(format!(
                "follow edge {} -> {}",
                follower, followee
            )));
        }
        if let Some(dst) = self.nodes.get_mut(&followee) {
            dst.followers.remove(&follower);
        }

        self.edge_count -= 1;
        self.generation += 1;
        Ok(())
    }

    /// Adjacent users in ascending id order
    pub fn neighbors(&self, id: UserId, direction: Direction) -> Result<Vec<UserId>> {
        let node = self.node(id)?;
        let neighbors = match direction {
            Direction::Outgoing => node.following.keys().copied().collect(),
            Direction::Incoming => node.followers.iter().copied().collect(),
            Direction::Both => node
                .following
                .keys()
                .merge(node.followers.iter())
                .dedup()
                .copied()
                .collect(),
        };
        Ok(neighbors)
    }

    /// Ids of the users `id` follows, ascending
    pub fn followees(&self, id: UserId) -> Result<impl Iterator<Item = UserId> + '_> {
        Ok(self.node(id)?.following.keys().copied())
    }

    /// Ids of the users following `id`, ascending
    pub fn followers(&self, id: UserId) -> Result<impl Iterator<Item = UserId> + '_> {
        Ok(self.node(id)?.followers.iter().copied())
    }

    pub fn following_count(&self, id: UserId) -> Result<usize> {
        Ok(self.node(id)?.following.len())
    }

    pub fn follower_count(&self, id: UserId) -> Result<usize> {
        Ok(self.node(id)?.followers.len())
    }

    /// Whether `follower` follows `followee`; false for unknown users
    pub fn is_following(&self, follower: UserId, followee: UserId) -> bool {
        self.nodes
            .get(&follower)
            .map_or(false, |node| node.following.contains_key(&followee))
    }

    pub fn are_mutual(&self, a: UserId, b: UserId) -> bool {
        self.is_following(a, b) && self.is_following(b, a)
    }

    /// Users who follow both `a` and `b`
    pub fn mutual_followers(&self, a: UserId, b: UserId) -> Result<Vec<UserId>> {
        let left = &self.node(a)?.followers;
        let right = &self.node(b)?.followers;
        Ok(left.intersection(right).copied().collect())
    }

    /// Users followed by both `a` and `b`
    pub fn mutual_following(&self, a: UserId, b: UserId) -> Result<Vec<UserId>> {
        let left = self.node(a)?.following.keys();
        let right = self.node(b)?.following.keys();
        Ok(left
            .merge_join_by(right, |x, y| x.cmp(y))
            .filter_map(|pair| pair.both().map(|(id, _)| *id))
            .collect())
    }

    /// Shortest hop count between two users treating follows as undirected.
    ///
    /// `Ok(None)` means the users live in different components.
    pub fn degree_of_separation(&self, a: UserId, b: UserId) -> Result<Option<usize>> {
        self.separation_along(a, b, Direction::Both)
    }

    /// Breadth-first hop count from `a` to `b` walking edges in `direction`
    pub fn separation_along(
        &self,
        a: UserId,
        b: UserId,
        direction: Direction,
    ) -> Result<Option<usize>> {
        self.bfs_separation(a, b, direction, None)
    }

    /// Undirected separation as if the follow `hidden.0 -> hidden.1` did not exist
    pub fn separation_without(
        &self,
        a: UserId,
        b: UserId,
        hidden: (UserId, UserId),
    ) -> Result<Option<usize>> {
        self.bfs_separation(a, b, Direction::Both, Some(hidden))
    }

    fn bfs_separation(
        &self,
        a: UserId,
        b: UserId,
        direction: Direction,
        hidden: Option<(UserId, UserId)>,
    ) -> Result<Option<usize>> {
        self.require(a)?;
        self.require(b)?;
        if a == b {
            return Ok(Some(0));
        }

        let mut visited: HashSet<UserId> = HashSet::with_capacity(self.nodes.len());
        let mut queue = VecDeque::new();
        visited.insert(a);
        queue.push_back((a, 0usize));

        while let Some((current, depth)) = queue.pop_front() {
            let node = match self.nodes.get(&current) {
                Some(node) => node,
                None => continue,
            };

            let mut found = false;
            node.for_each_neighbor(direction, |next, outgoing| {
                let edge = if outgoing {
                    (current, next)
                } else {
                    (next, current)
                };
                if found || hidden == Some(edge) || !visited.insert(next) {
                    return;
                }
                if next == b {
                    found = true;
                    return;
                }
                queue.push_back((next, depth + 1));
            });

            if found {
                return Ok(Some(depth + 1));
            }
        }

        Ok(None)
    }

    /// Degree centrality with the follow `hidden.0 -> hidden.1` left out
    pub fn centrality_without(&self, id: UserId, hidden: (UserId, UserId)) -> Result<f64> {
        let centrality = self.centrality(id)?;
        let (follower, followee) = hidden;
        let touches = id == follower || id == followee;
        // an unreciprocated follow is the only link between its two ends
        if touches
            && self.is_following(follower, followee)
            && !self.is_following(followee, follower)
        {
            return Ok(centrality - 1.0 / (self.nodes.len() - 1) as f64);
        }
        Ok(centrality)
    }

    /// Degree centrality: distinct adjacent users over `|V| - 1`
    pub fn centrality(&self, id: UserId) -> Result<f64> {
        let node = self.node(id)?;
        let n = self.nodes.len();
        if n <= 1 {
            return Ok(0.0);
        }

        let adjacent = node
            .following
            .keys()
            .merge(node.followers.iter())
            .dedup()
            .count();

        Ok(adjacent as f64 / (n - 1) as f64)
    }

    /// Dense adjacency matrix generated from the edge sets
    pub fn adjacency_matrix(&self) -> AdjacencyMatrix {
        let ids: Vec<UserId> = self.nodes.keys().copied().collect();
        let index: HashMap<UserId, usize> =
            ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let mut matrix = Array2::<u8>::zeros((ids.len(), ids.len()));
        for (row, node) in self.nodes.values().enumerate() {
            for followee in node.following.keys() {
                if let Some(&col) = index.get(followee) {
                    matrix[[row, col]] = 1;
                }
            }
        }

        AdjacencyMatrix { ids, matrix }
    }

    /// Immutable CSR copy for read-only analytics
    pub fn snapshot(&self) -> CompressedGraph {
        CompressedGraph::from_store(self)
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn user(&self, id: UserId) -> Result<&User> {
        Ok(&self.node(id)?.user)
    }

    /// Exact-match username lookup
    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        self.usernames
            .get(username)
            .and_then(|id| self.nodes.get(id))
            .map(|node| &node.user)
    }

    /// All users in ascending id order
    pub fn users(&self) -> impl Iterator<Item = &User> + '_ {
        self.nodes.values().map(|node| &node.user)
    }

    pub fn user_ids(&self) -> impl Iterator<Item = UserId> + '_ {
        self.nodes.keys().copied()
    }

    /// All follow edges, ordered by follower then followee
    pub fn edges(&self) -> impl Iterator<Item = FollowEdge> + '_ {
        self.nodes.iter().flat_map(|(&follower, node)| {
            node.following
                .iter()
                .map(move |(&followee, &created_at)| FollowEdge {
                    follower,
                    followee,
                    created_at,
                })
        })
    }

    pub fn user_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Mutation counter; changes whenever users or edges change
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn node(&self, id: UserId) -> Result<&UserNode> {
        self.nodes
            .get(&id)
            .ok_or_else(|| EngineError::user_not_found(id))
    }

    fn require(&self, id: UserId) -> Result<()> {
        self.node(id).map(|_| ())
    }
}
