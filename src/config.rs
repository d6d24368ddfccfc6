//! Ambient configuration for a Louvain run (spec.md §4.9).
//!
//! [`LouvainConfig`] is the single struct both the library API and the
//! `louvain` binary build from; the binary populates it from [`clap`]
//! (see `src/bin/louvain.rs`), library callers can build it directly.

use crate::error::LouvainError;

/// Community-detection algorithm selector.
///
/// Kept as an enum rather than a bare string so that adding a second
/// algorithm later is a non-breaking match arm, not a string comparison
/// sprinkled through the engine. Only [`Algorithm::Naive`] does anything
/// today (spec.md §6: "only `Naive` is meaningful").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Naive,
}

impl std::str::FromStr for Algorithm {
    type Err = LouvainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("naive") {
            Ok(Algorithm::Naive)
        } else {
            Err(LouvainError::Input(format!(
                "unknown -algo value {s:?}; only \"Naive\" is supported"
            )))
        }
    }
}

/// Default modularity-gain convergence threshold (spec.md §6).
pub const DEFAULT_C_THRESHOLD: f64 = 0.01;

/// Default `min_graph_size` below which the multi-phase driver would stop
/// contracting (spec.md §4.8). Single-phase builds never reach it, but it
/// is plumbed through so that landing phase 2 later is a localized change.
pub const DEFAULT_MIN_GRAPH_SIZE: usize = 100;

/// Configuration for one [`crate::driver::run_louvain`] invocation.
#[derive(Debug, Clone)]
pub struct LouvainConfig {
    pub algo: Algorithm,
    pub enable_vf: bool,
    pub c_threshold: f64,
    pub min_graph_size: usize,
    pub num_workers: usize,
    /// Hard cap on iterations within a phase, guarding against a
    /// pathological case where modularity gain never drops below
    /// `c_threshold` (spec.md §5: "Cancellation: none... or by an
    /// implementation-defined maximum iteration count").
    pub max_iterations: usize,
}

impl Default for LouvainConfig {
    fn default() -> Self {
        LouvainConfig {
            algo: Algorithm::Naive,
            enable_vf: false,
            c_threshold: DEFAULT_C_THRESHOLD,
            min_graph_size: DEFAULT_MIN_GRAPH_SIZE,
            num_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            max_iterations: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algo_parses_case_insensitively() {
        assert_eq!("Naive".parse::<Algorithm>().unwrap(), Algorithm::Naive);
        assert_eq!("naive".parse::<Algorithm>().unwrap(), Algorithm::Naive);
        assert!("louvain++".parse::<Algorithm>().is_err());
    }

    #[test]
    fn default_num_workers_is_at_least_one() {
        assert!(LouvainConfig::default().num_workers >= 1);
    }
}
