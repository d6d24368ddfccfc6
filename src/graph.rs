//! An immutable CSR adjacency view with mutable per-vertex payload.
//!
//! [`Graph`] is consumed, not owned, by the Louvain engine: topology and
//! edge weights never mutate once built (symmetry and deduplication are the
//! loader's responsibility — the engine does not verify them, only warns).
//! The mutable part of the model lives entirely in [`Node`], one per vertex,
//! addressable without locking the graph itself.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

/// Sentinel meaning "no community assigned yet", per spec.md §3.
pub const INF_VAL: u64 = u64::MAX / 2 - 1;

/// Bit pattern used internally where spec.md writes the isolated-vertex
/// sentinel as `-1`. Exposed as `Option::None` at the public API boundary
/// (see spec.md §9's open question on typed sentinels vs. cast comparisons).
pub const ISOLATED: u64 = u64::MAX;

/// Per-vertex mutable payload.
///
/// `curr_comm` is the live community assignment, mutated under the
/// cautious-locking protocol during a Louvain iteration (see
/// [`crate::louvain`]). `degree_wt` and `cluster_wt_internal` are populated
/// once per phase and once per iteration respectively.
#[derive(Debug)]
pub struct Node {
    pub prev_comm: AtomicU64,
    pub curr_comm: AtomicU64,
    pub degree_wt: AtomicU64,
    pub cluster_wt_internal: AtomicU64,
}

impl Node {
    fn new(initial_comm: u64) -> Self {
        Node {
            prev_comm: AtomicU64::new(initial_comm),
            curr_comm: AtomicU64::new(initial_comm),
            degree_wt: AtomicU64::new(0),
            cluster_wt_internal: AtomicU64::new(0),
        }
    }
}

/// An out-edge: destination vertex and edge weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub dst: u32,
    pub weight: u32,
}

/// An immutable CSR adjacency structure with a mutable [`Node`] per vertex.
///
/// Built once (see [`crate::io`]) and then only read from by the Louvain
/// engine except through the atomic [`Node`] fields.
pub struct Graph {
    offsets: Vec<u32>,
    edges: Vec<Edge>,
    nodes: Vec<Node>,
}

impl Graph {
    /// Builds a graph from CSR parts: `offsets` has length `n + 1`,
    /// `edges[offsets[v]..offsets[v+1]]` are `v`'s out-edges.
    ///
    /// The graph is assumed symmetric with no duplicate edges; this is only
    /// sanity-checked, never enforced, matching spec.md §4.5 ("the engine
    /// warns but does not verify").
    pub fn from_csr(offsets: Vec<u32>, edges: Vec<Edge>) -> Self {
        assert!(offsets.len() >= 1, "offsets must include the trailing total");
        let n = offsets.len() - 1;
        let nodes = (0..n as u64).map(Node::new).collect();
        let graph = Graph { offsets, edges, nodes };
        graph.warn_if_asymmetric();
        graph
    }

    fn warn_if_asymmetric(&self) {
        // A full O(m log m) symmetry check isn't the engineering focus here
        // (the loader owns that contract); this only catches the common
        // case of a grossly lopsided in/out edge count as a hint.
        let mut in_count = vec![0u32; self.node_count()];
        for e in &self.edges {
            if (e.dst as usize) < in_count.len() {
                in_count[e.dst as usize] += 1;
            }
        }
        for v in 0..self.node_count() {
            let out = self.degree(v as u32);
            if in_count[v] != out {
                warn!(
                    vertex = v,
                    out_degree = out,
                    in_degree = in_count[v],
                    "graph does not look symmetric; Louvain assumes a symmetric weighted graph"
                );
                return;
            }
        }
    }

    /// Number of vertices.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of directed edge entries (for a symmetric graph, twice the
    /// undirected edge count).
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Out-edges of `v`.
    #[inline]
    pub fn out_edges(&self, v: u32) -> &[Edge] {
        let start = self.offsets[v as usize] as usize;
        let end = self.offsets[v as usize + 1] as usize;
        &self.edges[start..end]
    }

    /// Out-degree (edge count, not weighted) of `v`.
    #[inline]
    pub fn degree(&self, v: u32) -> u32 {
        self.offsets[v as usize + 1] - self.offsets[v as usize]
    }

    /// Per-vertex mutable payload.
    #[inline]
    pub fn node(&self, v: u32) -> &Node {
        &self.nodes[v as usize]
    }

    /// Iterates over all vertex ids.
    pub fn vertices(&self) -> impl Iterator<Item = u32> {
        0..self.node_count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Graph {
        // 0-1-2 triangle, unit weights, symmetric.
        let offsets = vec![0, 2, 4, 6];
        let edges = vec![
            Edge { dst: 1, weight: 1 },
            Edge { dst: 2, weight: 1 },
            Edge { dst: 0, weight: 1 },
            Edge { dst: 2, weight: 1 },
            Edge { dst: 0, weight: 1 },
            Edge { dst: 1, weight: 1 },
        ];
        Graph::from_csr(offsets, edges)
    }

    #[test]
    fn out_edges_slice_correctly() {
        let g = triangle();
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.degree(0), 2);
        let e0: Vec<u32> = g.out_edges(0).iter().map(|e| e.dst).collect();
        assert_eq!(e0, vec![1, 2]);
    }

    #[test]
    fn node_starts_as_singleton_community() {
        let g = triangle();
        for v in g.vertices() {
            assert_eq!(g.node(v).curr_comm.load(Ordering::Relaxed), v as u64);
        }
    }
}
