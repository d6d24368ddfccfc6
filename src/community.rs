//! Per-community aggregates, updated atomically under concurrent migration.
//!
//! In phase 1 (the only phase this build runs — see [`crate::driver`]),
//! vertex id doubles as initial community id, so the table has exactly one
//! record per vertex.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::error::LouvainError;

/// One community's aggregates: membership count and total weighted degree.
#[derive(Debug)]
pub struct Comm {
    pub size: AtomicI64,
    pub degree_wt: AtomicI64,
}

/// Parallel array of [`Comm`] records, one per potential community id.
///
/// Invariant (spec.md §3): for every community `c`, `c.size` equals the
/// count of vertices currently assigned to it and `c.degree_wt` equals the
/// sum of their `degree_wt`, maintained *eventually* (at iteration
/// boundaries) and *locally* across each atomic add/subtract pair performed
/// on a single migration.
pub struct CommunityTable {
    comms: Vec<Comm>,
}

impl CommunityTable {
    /// Allocates a table sized to `n` communities, all starting with size 1
    /// and the given per-vertex degree weights (phase-1 initialization: each
    /// vertex is its own community).
    pub fn new_singletons(degree_wts: &[u64]) -> Self {
        let comms = degree_wts
            .iter()
            .map(|&dw| Comm {
                size: AtomicI64::new(1),
                degree_wt: AtomicI64::new(dw as i64),
            })
            .collect();
        CommunityTable { comms }
    }

    /// Number of community slots.
    pub fn len(&self) -> usize {
        self.comms.len()
    }

    /// `true` if the table has no slots at all.
    pub fn is_empty(&self) -> bool {
        self.comms.is_empty()
    }

    /// Read-only access to a community's record.
    #[inline]
    pub fn get(&self, c: u64) -> &Comm {
        &self.comms[c as usize]
    }

    /// Atomically adds `(degree, 1)` to community `target`'s aggregates.
    pub fn add(&self, target: u64, degree_wt: u64) {
        let c = self.get(target);
        c.size.fetch_add(1, Ordering::AcqRel);
        c.degree_wt.fetch_add(degree_wt as i64, Ordering::AcqRel);
    }

    /// Atomically subtracts `(degree, 1)` from community `source`'s
    /// aggregates, returning [`LouvainError::Invariant`] if either field
    /// would go negative — a migration logic bug, per spec.md §7.
    pub fn sub(&self, source: u64, degree_wt: u64) -> Result<(), LouvainError> {
        let c = self.get(source);
        let new_size = c.size.fetch_sub(1, Ordering::AcqRel) - 1;
        let new_degree = c.degree_wt.fetch_sub(degree_wt as i64, Ordering::AcqRel) - degree_wt as i64;
        if new_size < 0 || new_degree < 0 {
            return Err(LouvainError::Invariant(format!(
                "community {source} aggregates went negative (size={new_size}, degree_wt={new_degree})"
            )));
        }
        Ok(())
    }

    /// `Σ_c degree_wt`, used for the conservation check in property 6.
    pub fn total_degree_wt(&self) -> i64 {
        self.comms.iter().map(|c| c.degree_wt.load(Ordering::Acquire)).sum()
    }

    /// `Σ_c size`, used for the conservation check in property 6.
    pub fn total_size(&self) -> i64 {
        self.comms.iter().map(|c| c.size.load(Ordering::Acquire)).sum()
    }

    /// `Σ_c degree_wt²`, the `a2_x` term of the modularity formula (§4.7).
    pub fn sum_of_squares(&self) -> f64 {
        self.comms
            .iter()
            .map(|c| {
                let d = c.degree_wt.load(Ordering::Acquire) as f64;
                d * d
            })
            .sum()
    }
}
