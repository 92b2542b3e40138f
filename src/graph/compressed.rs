//! Immutable compressed snapshot of the follow graph

use std::collections::HashMap;
use std::mem;

use serde::{Deserialize, Serialize};

use crate::graph::{GraphStore, UserId};

/// Per-node follow counts, indexed by the same dense ids as the CSR arrays
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub follower_counts: Vec<u32>,
    pub following_counts: Vec<u32>,
}

impl NodeMetadata {
    /// `(followers, following)` of a dense node
    pub fn counts(&self, node: usize) -> (u32, u32) {
        (self.follower_counts[node], self.following_counts[node])
    }

    fn heap_bytes(&self) -> usize {
        (self.follower_counts.capacity() + self.following_counts.capacity()) * mem::size_of::<u32>()
    }
}

/// Compressed sparse row view of the follow graph.
///
/// Nodes are dense indices `0..node_count` assigned in ascending user id
/// order. Both the outgoing (follows) and incoming (followers) adjacency are
/// kept so analytics can walk either direction. A snapshot never changes
/// after construction and can be shared across threads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedGraph {
    /// Number of nodes in the graph
    pub node_count: usize,

    /// `offsets[i]..offsets[i+1]` is the outgoing edge range of node i
    pub offsets: Vec<u32>,

    /// Concatenated, sorted outgoing target lists
    pub edges: Vec<u32>,

    /// Same layout as `offsets`, for incoming edges
    pub in_offsets: Vec<u32>,

    pub in_edges: Vec<u32>,

    /// Dense index -> user id
    pub node_ids: Vec<UserId>,

    /// Dense index -> username
    pub usernames: Vec<String>,

    pub metadata: NodeMetadata,

    /// Store generation this snapshot was taken at
    pub generation: u64,

    #[serde(skip)]
    index: HashMap<UserId, u32>,
}

impl CompressedGraph {
    /// Take a snapshot of the store's current state
    pub fn from_store(store: &GraphStore) -> Self {
        let node_ids: Vec<UserId> = store.user_ids().collect();
        let index: HashMap<UserId, u32> = node_ids
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i as u32))
            .collect();
        let node_count = node_ids.len();

        let mut outgoing: Vec<Vec<u32>> = vec![Vec::new(); node_count];
        let mut incoming: Vec<Vec<u32>> = vec![Vec::new(); node_count];

        for edge in store.edges() {
            if let (Some(&src), Some(&dst)) = (index.get(&edge.follower), index.get(&edge.followee))
            {
                outgoing[src as usize].push(dst);
                incoming[dst as usize].push(src);
            }
        }

        let (offsets, edges) = Self::flatten(&mut outgoing);
        let (in_offsets, in_edges) = Self::flatten(&mut incoming);

        let metadata = NodeMetadata {
            follower_counts: incoming.iter().map(|list| list.len() as u32).collect(),
            following_counts: outgoing.iter().map(|list| list.len() as u32).collect(),
        };

        let usernames = store.users().map(|user| user.username.clone()).collect();

        Self {
            node_count,
            offsets,
            edges,
            in_offsets,
            in_edges,
            node_ids,
            usernames,
            metadata,
            generation: store.generation(),
            index,
        }
    }

    fn flatten(lists: &mut [Vec<u32>]) -> (Vec<u32>, Vec<u32>) {
        let edge_count: usize = lists.iter().map(|list| list.len()).sum();

        let mut offsets = Vec::with_capacity(lists.len() + 1);
        let mut edges = Vec::with_capacity(edge_count);
        offsets.push(0);

        let mut offset = 0;
        for list in lists.iter_mut() {
            // Sorted for binary search in has_edge
            list.sort_unstable();
            edges.extend_from_slice(list);
            offset += list.len() as u32;
            offsets.push(offset);
        }

        (offsets, edges)
    }

    /// Rebuild the id lookup after deserialization
    pub fn reindex(&mut self) {
        self.index = self
            .node_ids
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i as u32))
            .collect();
    }

    /// Dense index of a user, if present in the snapshot
    pub fn index_of(&self, id: UserId) -> Option<usize> {
        self.index.get(&id).map(|&i| i as usize)
    }

    pub fn id_of(&self, node: usize) -> UserId {
        self.node_ids[node]
    }

    /// Get outgoing edges for a node
    pub fn outgoing_edges(&self, node: usize) -> &[u32] {
        let start = self.offsets[node] as usize;
        let end = self.offsets[node + 1] as usize;
        &self.edges[start..end]
    }

    /// Get incoming edges for a node
    pub fn incoming_edges(&self, node: usize) -> &[u32] {
        let start = self.in_offsets[node] as usize;
        let end = self.in_offsets[node + 1] as usize;
        &self.in_edges[start..end]
    }

    /// Check if there's an edge from src to dst
    pub fn has_edge(&self, src: usize, dst: u32) -> bool {
        self.outgoing_edges(src).binary_search(&dst).is_ok()
    }

    pub fn out_degree(&self, node: usize) -> usize {
        self.outgoing_edges(node).len()
    }

    pub fn in_degree(&self, node: usize) -> usize {
        self.incoming_edges(node).len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Bytes held by the snapshot, inline fields plus allocated capacity
    pub fn memory_usage(&self) -> usize {
        let base = mem::size_of::<Self>();
        let adjacency = (self.offsets.capacity()
            + self.edges.capacity()
            + self.in_offsets.capacity()
            + self.in_edges.capacity())
            * mem::size_of::<u32>();
        let ids = self.node_ids.capacity() * mem::size_of::<UserId>();
        let names: usize = self.usernames.iter().map(|s| s.capacity()).sum();

        base + adjacency + ids + names + self.metadata.heap_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::User;

    #[test]
    fn snapshot_mirrors_store() {
        let mut store = GraphStore::new();
        for (id, name) in [(10, "ann"), (20, "ben"), (30, "cal")] {
            store.add_user(User::new(id, name)).unwrap();
        }
        store.follow(10, 30).unwrap();
        store.follow(10, 20).unwrap();
        store.follow(30, 10).unwrap();

        let graph = CompressedGraph::from_store(&store);
        assert_eq!(graph.node_count, 3);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.index_of(20), Some(1));
        assert_eq!(graph.outgoing_edges(0), &[1, 2]);
        assert_eq!(graph.incoming_edges(0), &[2]);
        assert!(graph.has_edge(2, 0));
        assert!(!graph.has_edge(1, 0));
        assert_eq!(graph.metadata.follower_counts, vec![1, 1, 1]);
        assert_eq!(graph.usernames[2], "cal");
        assert_eq!(graph.generation, store.generation());
    }

    #[test]
    fn snapshot_is_unaffected_by_later_mutation() {
        let mut store = GraphStore::new();
        store.add_user(User::new(1, "a")).unwrap();
        store.add_user(User::new(2, "b")).unwrap();
        let graph = CompressedGraph::from_store(&store);

        store.follow(1, 2).unwrap();
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.generation < store.generation());
    }

    #[test]
    fn deserialized_snapshot_needs_reindex() {
        let mut store = GraphStore::new();
        store.add_user(User::new(7, "a")).unwrap();
        store.add_user(User::new(9, "b")).unwrap();
        store.follow(9, 7).unwrap();
        let graph = CompressedGraph::from_store(&store);

        let json = serde_json::to_string(&graph).unwrap();
        let mut restored: CompressedGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.index_of(9), None);

        restored.reindex();
        assert_eq!(restored.index_of(9), Some(1));
        assert!(restored.has_edge(1, 0));
        assert!(restored.memory_usage() > 0);
    }
}
