//! Graph construction from persisted records

use crate::error::EngineError;
use crate::graph::{FollowEdge, GraphStore, Timestamp, User, UserId};

/// Counts of what was loaded and what was dropped while building
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub users: usize,
    pub edges: usize,
    pub duplicate_users: usize,
    pub self_loops: usize,
    pub duplicate_edges: usize,
    /// Edges naming a user that was never registered
    pub dangling_edges: usize,
}

impl BuildReport {
    pub fn skipped(&self) -> usize {
        self.duplicate_users + self.self_loops + self.duplicate_edges + self.dangling_edges
    }
}

/// Builder for populating a [`GraphStore`] from collaborator records.
///
/// Persisted data may contain rows the live store would reject; the builder
/// drops them and reports the counts instead of failing the whole load.
pub struct GraphBuilder {
    users: Vec<User>,
    edges: Vec<FollowEdge>,
}

impl GraphBuilder {
    /// Create a new graph builder with the given capacity
    pub fn with_capacity(users: usize, edges: usize) -> Self {
        Self {
            users: Vec::with_capacity(users),
            edges: Vec::with_capacity(edges),
        }
    }

    pub fn add_user(&mut self, user: User) -> &mut Self {
        self.users.push(user);
        self
    }

    /// Add an edge from one user to another
    pub fn add_edge(&mut self, follower: UserId, followee: UserId, created_at: Timestamp) -> &mut Self {
        self.edges.push(FollowEdge {
            follower,
            followee,
            created_at,
        });
        self
    }

    pub fn extend_users(&mut self, users: impl IntoIterator<Item = User>) -> &mut Self {
        self.users.extend(users);
        self
    }

    pub fn extend_edges(&mut self, edges: impl IntoIterator<Item = FollowEdge>) -> &mut Self {
        self.edges.extend(edges);
        self
    }

    /// Build the store
    pub fn build(self) -> (GraphStore, BuildReport) {
        let mut store = GraphStore::new();
        let mut report = BuildReport::default();

        for user in self.users {
            match store.add_user(user) {
                Ok(()) => report.users += 1,
                Err(err) => {
                    log::warn!("Skipping user record: {}", err);
                    report.duplicate_users += 1;
                }
            }
        }

        for edge in self.edges {
            match store.follow_at(edge.follower, edge.followee, edge.created_at) {
                Ok(()) => report.edges += 1,
                Err(EngineError::InvalidEdge { follower, followee, .. }) if follower == followee => {
                    report.self_loops += 1
                }
                Err(EngineError::InvalidEdge { .. }) => report.duplicate_edges += 1,
                Err(err) => {
                    log::debug!("Skipping follow record: {}", err);
                    report.dangling_edges += 1;
                }
            }
        }

        if report.skipped() > 0 {
            log::warn!(
                "Skipped {} records while building graph ({} self-loops, {} duplicate edges, {} dangling edges, {} duplicate users)",
                report.skipped(),
                report.self_loops,
                report.duplicate_edges,
                report.dangling_edges,
                report.duplicate_users
            );
        }
        log::info!(
            "Built graph with {} users and {} follow edges",
            report.users,
            report.edges
        );

        (store, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_skips_invalid_records() {
        let mut builder = GraphBuilder::with_capacity(3, 5);
        builder
            .add_user(User::new(1, "ann"))
            .add_user(User::new(2, "ben"))
            .add_user(User::new(3, "ann"));
        builder
            .add_edge(1, 2, 10)
            .add_edge(1, 2, 11)
            .add_edge(2, 2, 12)
            .add_edge(2, 9, 13)
            .add_edge(2, 1, 14);

        let (store, report) = builder.build();

        assert_eq!(store.user_count(), 2);
        assert_eq!(store.edge_count(), 2);
        assert_eq!(
            report,
            BuildReport {
                users: 2,
                edges: 2,
                duplicate_users: 1,
                self_loops: 1,
                duplicate_edges: 1,
                dangling_edges: 1,
            }
        );
        assert_eq!(store.edges().next().map(|e| e.created_at), Some(10));
    }
}
