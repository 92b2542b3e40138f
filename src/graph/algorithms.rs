//! Graph algorithms for analysis over compressed snapshots

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::error::{EngineError, Result};
use crate::graph::{CompressedGraph, Direction, UserId};

/// Damping factor used by [`pagerank`] callers that have no preference
pub const DEFAULT_DAMPING: f64 = 0.85;

/// Iteration count used by [`pagerank`] callers that have no preference
pub const DEFAULT_PAGERANK_ITERATIONS: usize = 20;

/// Cooperative cancellation flag for bulk recomputation
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn for_each_neighbor(
    graph: &CompressedGraph,
    node: usize,
    direction: Direction,
    mut f: impl FnMut(usize),
) {
    if direction.includes_outgoing() {
        for &next in graph.outgoing_edges(node) {
            f(next as usize);
        }
    }
    if direction.includes_incoming() {
        for &next in graph.incoming_edges(node) {
            f(next as usize);
        }
    }
}

fn require(graph: &CompressedGraph, id: UserId) -> Result<usize> {
    graph
        .index_of(id)
        .ok_or_else(|| EngineError::user_not_found(id))
}

/// Hop distance from `source` to every node; `None` for unreachable nodes.
/// Each node is visited once.
pub fn bfs_distances(graph: &CompressedGraph, source: usize, direction: Direction) -> Vec<Option<u32>> {
    let mut distance = vec![None; graph.node_count];
    let mut queue = VecDeque::new();

    distance[source] = Some(0);
    queue.push_back(source);

    while let Some(current) = queue.pop_front() {
        let next_depth = distance[current].map(|d| d + 1);
        for_each_neighbor(graph, current, direction, |next| {
            if distance[next].is_none() {
                distance[next] = next_depth;
                queue.push_back(next);
            }
        });
    }

    distance
}

/// Hop count between two users, `None` when unreachable
pub fn separation(
    graph: &CompressedGraph,
    a: UserId,
    b: UserId,
    direction: Direction,
) -> Result<Option<usize>> {
    let src = require(graph, a)?;
    let dst = require(graph, b)?;
    Ok(bfs_distances(graph, src, direction)[dst].map(|d| d as usize))
}

/// Shortest path as a list of user ids from `a` to `b` inclusive.
///
/// Empty when `b` cannot be reached.
pub fn shortest_path(
    graph: &CompressedGraph,
    a: UserId,
    b: UserId,
    direction: Direction,
) -> Result<Vec<UserId>> {
    let src = require(graph, a)?;
    let dst = require(graph, b)?;
    if src == dst {
        return Ok(vec![a]);
    }

    let mut parent: Vec<Option<usize>> = vec![None; graph.node_count];
    let mut visited = vec![false; graph.node_count];
    let mut queue = VecDeque::new();
    visited[src] = true;
    queue.push_back(src);

    while let Some(current) = queue.pop_front() {
        if current == dst {
            break;
        }
        for_each_neighbor(graph, current, direction, |next| {
            if !visited[next] {
                visited[next] = true;
                parent[next] = Some(current);
                queue.push_back(next);
            }
        });
    }

    if !visited[dst] {
        return Ok(Vec::new());
    }

    let mut path = vec![graph.id_of(dst)];
    let mut cursor = dst;
    while let Some(prev) = parent[cursor] {
        path.push(graph.id_of(prev));
        cursor = prev;
    }
    path.reverse();
    Ok(path)
}

/// Distinct adjacent nodes over `n - 1`
pub fn degree_centrality(graph: &CompressedGraph, node: usize) -> f64 {
    if graph.node_count <= 1 {
        return 0.0;
    }

    let out = graph.outgoing_edges(node);
    let inc = graph.incoming_edges(node);
    // Both lists are sorted; count their union
    let (mut i, mut j, mut adjacent) = (0, 0, 0usize);
    while i < out.len() || j < inc.len() {
        match (out.get(i), inc.get(j)) {
            (Some(a), Some(b)) if a == b => {
                i += 1;
                j += 1;
            }
            (Some(a), Some(b)) if a < b => i += 1,
            (Some(_), None) => i += 1,
            _ => j += 1,
        }
        adjacent += 1;
    }

    adjacent as f64 / (graph.node_count - 1) as f64
}

/// Closeness over outgoing reachability: reachable count / sum of distances
pub fn closeness_centrality(graph: &CompressedGraph, node: usize) -> f64 {
    let distances = bfs_distances(graph, node, Direction::Outgoing);

    let (reachable, total) = distances
        .iter()
        .enumerate()
        .filter(|&(other, _)| other != node)
        .filter_map(|(_, d)| *d)
        .fold((0u64, 0u64), |(count, sum), d| (count + 1, sum + d as u64));

    if total == 0 {
        0.0
    } else {
        reachable as f64 / total as f64
    }
}

/// Closeness for every node, checking `cancel` before each BFS source
pub fn closeness_all(graph: &CompressedGraph, cancel: Option<&Cancellation>) -> Result<Vec<f64>> {
    log::info!("Computing closeness centrality for {} users", graph.node_count);

    (0..graph.node_count)
        .into_par_iter()
        .map(|node| {
            if let Some(cancel) = cancel {
                cancel.check()?;
            }
            Ok(closeness_centrality(graph, node))
        })
        .collect()
}

/// PageRank with uniform teleport and dangling-node redistribution,
/// scaled so the top node scores 1.0
pub fn pagerank(graph: &CompressedGraph, damping: f64, iterations: usize) -> Vec<f64> {
    let n = graph.node_count;
    if n == 0 {
        return Vec::new();
    }

    let nf = n as f64;
    let mut scores = vec![1.0 / nf; n];

    for _ in 0..iterations {
        let dangling: f64 = (0..n)
            .filter(|&node| graph.out_degree(node) == 0)
            .map(|node| scores[node])
            .sum();
        let base = (1.0 - damping) / nf + damping * dangling / nf;

        let next: Vec<f64> = (0..n)
            .into_par_iter()
            .map(|node| {
                let inflow: f64 = graph
                    .incoming_edges(node)
                    .iter()
                    .map(|&src| scores[src as usize] / graph.out_degree(src as usize) as f64)
                    .sum();
                base + damping * inflow
            })
            .collect();

        scores = next;
    }

    let max = scores.iter().cloned().fold(0.0f64, f64::max);
    if max > 0.0 {
        for score in &mut scores {
            *score /= max;
        }
    }
    scores
}

/// Follower count relative to the most-followed user
pub fn influence_scores(graph: &CompressedGraph) -> Vec<f64> {
    let counts = &graph.metadata.follower_counts;
    let max = counts.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return vec![0.0; graph.node_count];
    }
    counts.iter().map(|&c| c as f64 / max as f64).collect()
}

/// Reciprocated follow pairs `(a, b)` with `a < b`
pub fn find_mutual_follows(graph: &CompressedGraph) -> Vec<(u32, u32)> {
    let mut pairs = Vec::new();

    for src in 0..graph.node_count {
        for &dst in graph.outgoing_edges(src) {
            let dst_idx = dst as usize;
            // Only store in one direction
            if src < dst_idx && graph.has_edge(dst_idx, src as u32) {
                pairs.push((src as u32, dst));
            }
        }
    }

    log::debug!("Found {} mutual follow relationships", pairs.len());
    pairs
}
