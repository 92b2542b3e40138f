//! Weakly connected components of the follow graph

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::graph::{CompressedGraph, UserId};

/// Union-Find structure for connected component analysis
pub struct DisjointSets {
    /// Parent pointers (parent[i] = parent of node i)
    parent: Vec<u32>,

    /// Size of each set, valid at roots
    rank: Vec<u32>,
}

impl DisjointSets {
    /// Create a new DisjointSets data structure
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size as u32).collect(),
            rank: vec![1; size],
        }
    }

    /// Find the root of the set containing x with path compression
    pub fn find(&mut self, x: u32) -> u32 {
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }

        let mut cursor = x;
        while self.parent[cursor as usize] != root {
            let next = self.parent[cursor as usize];
            self.parent[cursor as usize] = root;
            cursor = next;
        }

        root
    }

    /// Union the sets containing x and y
    pub fn union(&mut self, x: u32, y: u32) {
        let root_x = self.find(x);
        let root_y = self.find(y);

        if root_x == root_y {
            return;
        }

        // Attach smaller tree under root of larger tree
        if self.rank[root_x as usize] >= self.rank[root_y as usize] {
            self.parent[root_y as usize] = root_x;
            self.rank[root_x as usize] += self.rank[root_y as usize];
        } else {
            self.parent[root_x as usize] = root_y;
            self.rank[root_y as usize] += self.rank[root_x as usize];
        }
    }

    /// Get the size of the set containing x
    pub fn size(&mut self, x: u32) -> u32 {
        let root = self.find(x);
        self.rank[root as usize]
    }
}

/// A group of users linked by follows in either direction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub id: u32,

    /// Member user ids, ascending
    pub members: Vec<UserId>,

    pub size: usize,

    /// Density: internal edges / potential directed edges
    pub density: f32,
}

/// Internal edges over `n * (n - 1)`; singletons have density 1 by convention
pub fn component_density(graph: &CompressedGraph, members: &[u32]) -> f32 {
    let n = members.len();
    if n <= 1 {
        return 1.0;
    }

    let member_set: HashSet<u32> = members.iter().copied().collect();
    let actual_edges: usize = members
        .iter()
        .map(|&src| {
            graph
                .outgoing_edges(src as usize)
                .iter()
                .filter(|&&dst| member_set.contains(&dst))
                .count()
        })
        .sum();

    actual_edges as f32 / (n * (n - 1)) as f32
}

/// Find weakly connected components with at least `min_size` members.
///
/// Components are ordered by size (largest first), then by smallest member id.
pub fn connected_components(graph: &CompressedGraph, min_size: usize) -> Vec<Component> {
    let mut sets = DisjointSets::new(graph.node_count);

    for src in 0..graph.node_count {
        for &dst in graph.outgoing_edges(src) {
            sets.union(src as u32, dst);
        }
    }

    let mut groups: HashMap<u32, Vec<u32>> = HashMap::new();
    for node in 0..graph.node_count as u32 {
        let root = sets.find(node);
        groups.entry(root).or_default().push(node);
    }

    let mut grouped: Vec<Vec<u32>> = groups
        .into_values()
        .filter(|members| members.len() >= min_size)
        .collect();
    // Nodes were pushed in ascending order, so members[0] is the smallest
    grouped.sort_by(|a, b| b.len().cmp(&a.len()).then(a[0].cmp(&b[0])));

    let components: Vec<Component> = grouped
        .into_par_iter()
        .enumerate()
        .map(|(id, members)| Component {
            id: id as u32,
            size: members.len(),
            density: component_density(graph, &members),
            members: members.iter().map(|&m| graph.id_of(m as usize)).collect(),
        })
        .collect();

    log::debug!(
        "Found {} components with {} or more members",
        components.len(),
        min_size
    );

    components
}

/// Component id of every node, indexed like the snapshot
pub fn component_labels(graph: &CompressedGraph) -> Vec<u32> {
    let mut labels = vec![0u32; graph.node_count];
    for component in connected_components(graph, 1) {
        for member in &component.members {
            if let Some(idx) = graph.index_of(*member) {
                labels[idx] = component.id;
            }
        }
    }
    labels
}
