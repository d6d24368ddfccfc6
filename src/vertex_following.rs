//! The vertex-following preprocessor (spec.md §4.6).
//!
//! A single parallel pass that collapses degree-0 and degree-1 vertices into
//! a neighbor, shrinking the effective problem size before the Louvain
//! engine runs. It does not touch graph structure — graph rebuild from the
//! collapsed assignment is deferred, as spec.md §4.6/§9 call out.

use crate::graph::{Graph, ISOLATED};

/// Runs vertex-following over every vertex of `graph`, writing into
/// `clusters` (indexed by vertex id, length `graph.node_count()`).
///
/// - degree 0: `clusters[v] = ISOLATED` (spec.md's `-1` sentinel).
/// - degree 1, unique neighbor `d`: collapsed into `d` iff `deg(d) > 1` or
///   `v > d` (tie-break to avoid two mutual degree-1 vertices both trying to
///   collapse into each other and forming a cycle). `clusters[v]` is set to
///   `d`'s *current* community, i.e. `d` itself before the engine has run.
/// - otherwise: `clusters[v]` is left untouched.
///
/// Returns the number of vertices collapsed ("followed").
pub fn run(graph: &Graph, clusters: &mut [u64]) -> usize {
    assert_eq!(clusters.len(), graph.node_count());
    let mut followed = 0;
    for v in graph.vertices() {
        let deg = graph.degree(v);
        if deg == 0 {
            clusters[v as usize] = ISOLATED;
            continue;
        }
        if deg == 1 {
            let d = graph.out_edges(v)[0].dst;
            let deg_d = graph.degree(d);
            if deg_d > 1 || v > d {
                clusters[v as usize] = graph.node(d).curr_comm.load(std::sync::atomic::Ordering::Relaxed);
                followed += 1;
            }
        }
    }
    followed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use std::sync::atomic::Ordering;

    #[test]
    fn two_isolated_vertices_are_marked_isolated() {
        let offsets = vec![0, 0, 0];
        let g = Graph::from_csr(offsets, Vec::<Edge>::new());
        let mut clusters = vec![u64::MAX / 2; 2];
        let followed = run(&g, &mut clusters);
        assert_eq!(followed, 0);
        assert_eq!(clusters, vec![ISOLATED, ISOLATED]);
    }

    #[test]
    fn path_collapses_lower_id_into_higher() {
        // 0 - 1, unit weight. deg(0) = deg(1) = 1, so tie-break applies:
        // 0 < 1, so vertex 0 collapses into 1.
        let offsets = vec![0, 1, 2];
        let edges = vec![Edge { dst: 1, weight: 1 }, Edge { dst: 0, weight: 1 }];
        let g = Graph::from_csr(offsets, edges);
        let mut clusters = vec![u64::MAX / 2; 2];
        let followed = run(&g, &mut clusters);
        assert_eq!(followed, 1);
        assert_eq!(clusters[0], g.node(1).curr_comm.load(Ordering::Relaxed));
    }

    #[test]
    fn degree_two_vertex_is_left_untouched() {
        let g_offsets = vec![0, 2, 3, 4];
        let edges = vec![
            Edge { dst: 1, weight: 1 },
            Edge { dst: 2, weight: 1 },
            Edge { dst: 0, weight: 1 },
            Edge { dst: 0, weight: 1 },
        ];
        let g = Graph::from_csr(g_offsets, edges);
        let sentinel = u64::MAX / 2;
        let mut clusters = vec![sentinel; 3];
        run(&g, &mut clusters);
        assert_eq!(clusters[0], sentinel, "degree-2 vertex must be left alone");
    }
}
