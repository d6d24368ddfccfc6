//! The error taxonomy from spec.md §7.

use thiserror::Error;

/// Errors surfaced by graph ingestion, configuration, or the Louvain engine
/// itself.
///
/// [`LouvainError::Input`] fails fast at startup and should surface to the
/// CLI as a nonzero exit. [`LouvainError::Invariant`] indicates a migration
/// logic bug (a community's size or degree weight went negative under
/// atomic subtract) and must not be masked — callers embedding the engine
/// in-process get a `Result` to handle as they see fit; the CLI binary turns
/// it into a nonzero exit rather than aborting the process out from under
/// an embedder. [`LouvainError::Capacity`] is defensive: the community
/// table is sized to the vertex count up front, so this should not occur in
/// practice, but cannot be ruled out if a caller builds the table by hand.
#[derive(Debug, Error)]
pub enum LouvainError {
    /// The input graph is missing, malformed, or the loader otherwise
    /// could not produce a usable graph.
    #[error("input error: {0}")]
    Input(String),

    /// A community id was used that exceeds the table's allocated size.
    #[error("community table capacity exceeded: requested {requested}, available {available}")]
    Capacity { requested: usize, available: usize },

    /// A community aggregate (size or weighted degree) went negative under
    /// a concurrent atomic subtract — indicates a migration logic bug.
    #[error("invariant violation: {0}")]
    Invariant(String),
}
