//! Records handed to the presentation layer
//!
//! Nothing here lays anything out; nodes and edges carry the analytics a
//! renderer would colour or size them by.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::feed::RankedPost;
use crate::graph::algorithms::{
    bfs_distances, closeness_all, degree_centrality, find_mutual_follows, pagerank, Cancellation,
    DEFAULT_DAMPING, DEFAULT_PAGERANK_ITERATIONS,
};
use crate::graph::components::{component_labels, connected_components};
use crate::graph::{CompressedGraph, Direction, UserId};
use crate::predict::Prediction;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView {
    pub id: UserId,
    pub username: String,
    pub centrality: f64,

    /// Reachable users over total hops along follows
    pub closeness: f64,

    pub influence: f64,
    pub followers: u32,
    pub following: u32,

    /// Hops from the viewer, ignoring edge direction
    pub separation_from_viewer: Option<usize>,

    pub component: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeView {
    pub follower: UserId,
    pub followee: UserId,
    pub mutual: bool,
}

/// Annotated node and edge lists for one snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphView {
    pub viewer: Option<UserId>,
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
}

impl GraphView {
    pub fn build(graph: &CompressedGraph, viewer: Option<UserId>) -> Result<Self> {
        Self::build_cancellable(graph, viewer, None)
    }

    /// Like [`GraphView::build`], giving up with `Cancelled` once `cancel` is set
    pub fn build_cancellable(
        graph: &CompressedGraph,
        viewer: Option<UserId>,
        cancel: Option<&Cancellation>,
    ) -> Result<Self> {
        let distances = match viewer {
            Some(id) => {
                let source = graph
                    .index_of(id)
                    .ok_or_else(|| EngineError::user_not_found(id))?;
                Some(bfs_distances(graph, source, Direction::Both))
            }
            None => None,
        };

        let closeness = closeness_all(graph, cancel)?;
        let influence = pagerank(graph, DEFAULT_DAMPING, DEFAULT_PAGERANK_ITERATIONS);
        let labels = component_labels(graph);

        let nodes = (0..graph.node_count)
            .map(|node| {
                let (followers, following) = graph.metadata.counts(node);
                NodeView {
                    id: graph.id_of(node),
                    username: graph.usernames[node].clone(),
                    centrality: degree_centrality(graph, node),
                    closeness: closeness[node],
                    influence: influence[node],
                    followers,
                    following,
                    separation_from_viewer: distances
                        .as_ref()
                        .and_then(|d| d[node])
                        .map(|d| d as usize),
                    component: labels[node],
                }
            })
            .collect();

        let mutual: HashSet<(u32, u32)> = find_mutual_follows(graph).into_iter().collect();
        let mut edges = Vec::with_capacity(graph.edge_count());
        for src in 0..graph.node_count {
            for &dst in graph.outgoing_edges(src) {
                let key = if (src as u32) < dst {
                    (src as u32, dst)
                } else {
                    (dst, src as u32)
                };
                edges.push(EdgeView {
                    follower: graph.id_of(src),
                    followee: graph.id_of(dst as usize),
                    mutual: mutual.contains(&key),
                });
            }
        }

        Ok(Self {
            viewer,
            nodes,
            edges,
        })
    }
}

/// Headline numbers for a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSummary {
    pub user_count: usize,
    pub edge_count: usize,
    pub mutual_edge_count: usize,
    pub avg_following: f64,
    pub component_count: usize,
    pub largest_component: usize,

    /// Estimated in-memory size of the snapshot
    pub snapshot_bytes: usize,

    /// Users per follower count, the last bucket holding 100+
    pub follower_distribution: Vec<usize>,
}

impl GraphSummary {
    pub fn from_graph(graph: &CompressedGraph) -> Self {
        let components = connected_components(graph, 1);

        let mut follower_distribution = vec![0usize; 101];
        for &count in &graph.metadata.follower_counts {
            follower_distribution[(count as usize).min(100)] += 1;
        }
        while follower_distribution.len() > 1 && follower_distribution.last() == Some(&0) {
            follower_distribution.pop();
        }

        let user_count = graph.node_count;
        Self {
            user_count,
            edge_count: graph.edge_count(),
            mutual_edge_count: find_mutual_follows(graph).len(),
            avg_following: if user_count == 0 {
                0.0
            } else {
                graph.edge_count() as f64 / user_count as f64
            },
            component_count: components.len(),
            largest_component: components.first().map_or(0, |c| c.size),
            snapshot_bytes: graph.memory_usage(),
            follower_distribution,
        }
    }
}

/// A user's feed as exported
#[derive(Debug, Clone, Serialize)]
pub struct FeedView {
    pub viewer: UserId,
    pub posts: Vec<RankedPost>,
}

/// A user's follow recommendations as exported
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationView {
    pub user: UserId,
    pub recommendations: Vec<Prediction>,
}
