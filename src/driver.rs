//! The multi-phase driver (spec.md §4.8) and the parallel dispatch of the
//! Louvain iteration body over the chunked work-stealing worklist.
//!
//! spec.md §9 is explicit that the source this crate is modeled on `break`s
//! unconditionally after phase 1 — graph contraction into a coarsened
//! super-vertex graph is flagged open. This build documents that choice
//! rather than half-implementing it: [`run_louvain`] runs exactly one
//! phase. The loop below is still shaped as a phase loop (not inlined) so
//! that wiring up contraction later is a matter of producing a new [`Graph`]
//! and calling back in, not restructuring the driver.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{info, info_span};

use crate::adaptor::ChunkedAdaptor;
use crate::config::LouvainConfig;
use crate::error::LouvainError;
use crate::graph::{Graph, ISOLATED};
use crate::locality::EffectiveId;
use crate::louvain::{self, ModularityReport, Outcome, PhaseState};
use crate::vertex_following;
use crate::worklist::{GlobalSeedQueue, InitialQueue, StealingWorklist};

/// Chunk capacity used by the driver's worklist. Matches spec.md §3's
/// suggested default; not runtime-configurable (see
/// [`crate::chunk::DEFAULT_CAPACITY`] and [`LouvainConfig`]'s docs).
const K: usize = crate::chunk::DEFAULT_CAPACITY;

type VertexQueue = InitialQueue<GlobalSeedQueue<u32, K>, StealingWorklist<u32, K>>;

/// Outcome of one phase of the driver.
#[derive(Debug, Clone)]
pub struct PhaseReport {
    /// Iteration-by-iteration `(e_xx, a2_x, Q)` history, in order.
    pub iterations: Vec<ModularityReport>,
    /// Final modularity.
    pub final_q: f64,
    /// Number of vertices vertex-following collapsed, if enabled.
    pub vf_followed: usize,
    /// `curr_comm` (or `None` for isolated vertices) indexed by vertex id.
    pub clusters: Vec<Option<u64>>,
}

/// Runs the Louvain engine over `graph` per `config`, returning a
/// [`PhaseReport`]. Single-phase: see the module docs for why.
pub fn run_louvain(graph: &Graph, config: &LouvainConfig) -> Result<PhaseReport, LouvainError> {
    let n = graph.node_count();
    let mut clusters = vec![crate::graph::INF_VAL; n];

    let vf_followed = if config.enable_vf {
        let span = info_span!("vertex_following");
        let _enter = span.enter();
        let followed = vertex_following::run(graph, &mut clusters);
        info!(followed, "vertex-following preprocessor collapsed vertices");
        followed
    } else {
        0
    };

    let state = louvain::init_phase(graph);
    let mut reports = Vec::new();
    let mut prev_q = f64::NEG_INFINITY;

    for iter in 0..config.max_iterations {
        let span = info_span!("iteration", iter);
        let _enter = span.enter();

        run_parallel_pass(&state, graph, &clusters, config.num_workers)?;
        louvain::recompute_internal_weights(&state);
        let report = louvain::modularity(&state);

        info!(
            iter,
            e_xx = report.e_xx,
            a2_x = report.a2_x,
            q = report.q,
            "iteration complete"
        );

        let gain = report.q - prev_q;
        reports.push(report);
        if gain < config.c_threshold {
            break;
        }
        prev_q = report.q;
    }

    let final_q = reports.last().map(|r| r.q).unwrap_or(0.0);
    let final_clusters: Vec<Option<u64>> = graph
        .vertices()
        .map(|v| {
            if clusters[v as usize] == ISOLATED {
                None
            } else {
                Some(graph.node(v).curr_comm.load(Ordering::Acquire))
            }
        })
        .collect();

    Ok(PhaseReport {
        iterations: reports,
        final_q,
        vf_followed,
        clusters: final_clusters,
    })
}

/// Dispatches one full pass over all non-isolated, non-followed vertices
/// across `num_workers` threads, each draining a [`ChunkedAdaptor`] bound to
/// the shared [`StealingWorklist`]. A vertex whose cautious lock could not
/// be acquired is pushed back via `adaptor.push(v)` (see below) rather than
/// retried in a tight inline loop, satisfying spec.md §9's "restarting the
/// vertex" requirement.
fn run_parallel_pass(
    state: &PhaseState<'_>,
    graph: &Graph,
    clusters: &[u64],
    num_workers: usize,
) -> Result<(), LouvainError> {
    let num_workers = num_workers.max(1);
    let queue: Arc<VertexQueue> = Arc::new(InitialQueue::new(
        GlobalSeedQueue::new(),
        StealingWorklist::new(num_workers),
    ));

    // Seed the initial queue: round-robin the vertex set across workers so
    // each one has local work to start on before any stealing happens.
    {
        let mut seeders: Vec<_> = (0..num_workers)
            .map(|w| ChunkedAdaptor::new(EffectiveId(w), Arc::clone(&queue)))
            .collect();
        let mut w = 0;
        for v in graph.vertices() {
            if clusters[v as usize] == ISOLATED {
                continue;
            }
            seeders[w].pushi(v);
            w = (w + 1) % num_workers;
        }
    }

    let error: std::sync::Mutex<Option<LouvainError>> = std::sync::Mutex::new(None);

    crossbeam_utils::thread::scope(|scope| {
        for w in 0..num_workers {
            let queue = Arc::clone(&queue);
            let error = &error;
            scope.spawn(move |_| {
                let mut adaptor = ChunkedAdaptor::<u32, K, _, _>::new(EffectiveId(w), queue);
                while let Some(v) = adaptor.pop() {
                    if error.lock().unwrap().is_some() {
                        return;
                    }
                    match louvain::process_vertex(state, v) {
                        // `push` lands v back on this worker's own current
                        // chunk, which is LIFO: the very next `pop` below
                        // hands v right back, so this is a push/pop detour
                        // through the adaptor rather than a pick-a-different-
                        // vertex-first retry. It's still not an inline spin —
                        // no lock is re-attempted without going back through
                        // the scheduler — and the round trip gives other
                        // workers a window to make progress (and potentially
                        // free up v's contended neighbor locks) in between.
                        Ok(Outcome::Requeue) => adaptor.push(v),
                        Ok(_) => {}
                        Err(e) => {
                            *error.lock().unwrap() = Some(e);
                            return;
                        }
                    }
                }
            });
        }
    })
    .expect("worker thread panicked");

    match error.into_inner().unwrap() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;

    fn triangle() -> Graph {
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
    fn triangle_converges_to_one_community_single_worker() {
        let g = triangle();
        let config = LouvainConfig {
            num_workers: 1,
            ..LouvainConfig::default()
        };
        let report = run_louvain(&g, &config).unwrap();
        assert!(!report.iterations.is_empty());
        let first = report.clusters[0];
        assert!(report.clusters.iter().all(|c| *c == first));
    }

    #[test]
    fn triangle_converges_with_multiple_workers() {
        let g = triangle();
        let config = LouvainConfig {
            num_workers: 4,
            ..LouvainConfig::default()
        };
        let report = run_louvain(&g, &config).unwrap();
        let first = report.clusters[0];
        assert!(report.clusters.iter().all(|c| *c == first));
    }

    #[test]
    fn two_isolated_vertices_converge_immediately_with_zero_modularity() {
        let offsets = vec![0, 0, 0];
        let g = Graph::from_csr(offsets, Vec::<Edge>::new());
        let config = LouvainConfig {
            enable_vf: true,
            ..LouvainConfig::default()
        };
        let report = run_louvain(&g, &config).unwrap();
        assert_eq!(report.vf_followed, 0);
        assert!(report.clusters.iter().all(Option::is_none));
        assert_eq!(report.final_q, 0.0);
    }

    #[test]
    fn path_with_vf_enabled_collapses_the_lower_id_vertex() {
        let offsets = vec![0, 1, 2];
        let edges = vec![Edge { dst: 1, weight: 1 }, Edge { dst: 0, weight: 1 }];
        let g = Graph::from_csr(offsets, edges);
        let config = LouvainConfig {
            enable_vf: true,
            ..LouvainConfig::default()
        };
        let report = run_louvain(&g, &config).unwrap();
        assert_eq!(report.vf_followed, 1);
    }
}
