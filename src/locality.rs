//! Per-locality addressing for the stealing worklist.
//!
//! Each worker is assigned a stable [`EffectiveId`] at initialization —
//! typically the index of the worker's OS thread among the pool, standing in
//! for "per-socket or per-core" placement when the caller has topology
//! information available. The id never changes for the worker's lifetime and
//! indexes directly into a [`LocalityStacks`] array.

use crate::chunk::Chunk;
use crate::stack::ChunkStack;

/// A stable, contiguous worker index used to address per-locality stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EffectiveId(pub usize);

impl EffectiveId {
    /// Raw index, usable to index directly into a slice of stacks.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// One [`ChunkStack`] per scheduling locality.
///
/// This is the array `LevelLocalAlt`/`LevelStealingAlt` route through in
/// spec.md §4.3: `push`/`pop` always address the caller's own slot;
/// `StealingWorklist` (in [`crate::worklist`]) is what adds the round-robin
/// steal-from-sibling behavior on top.
pub struct LocalityStacks<T, const K: usize> {
    stacks: Vec<ChunkStack<T, K>>,
}

impl<T, const K: usize> LocalityStacks<T, K> {
    /// Creates `n` empty per-locality stacks, one per worker.
    pub fn new(n: usize) -> Self {
        let mut stacks = Vec::with_capacity(n);
        stacks.resize_with(n, ChunkStack::new);
        LocalityStacks { stacks }
    }

    /// Number of localities (stacks) in the array.
    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    /// `true` if there are no localities at all (degenerate, zero workers).
    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    /// The stack belonging to `id`.
    #[inline]
    pub fn local(&self, id: EffectiveId) -> &ChunkStack<T, K> {
        &self.stacks[id.index()]
    }

    /// Pushes directly onto `id`'s own stack.
    pub fn push(&self, id: EffectiveId, chunk: Box<Chunk<T, K>>) {
        self.local(id).push(chunk);
    }

    /// Pops from `id`'s own stack only (no stealing).
    pub fn pop(&self, id: EffectiveId) -> Option<Box<Chunk<T, K>>> {
        self.local(id).pop()
    }

    /// Attempts a steal from a specific sibling locality.
    pub fn steal_from(&self, victim: EffectiveId) -> Option<Box<Chunk<T, K>>> {
        self.local(victim).steal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_routes_to_own_locality_only() {
        let arr: LocalityStacks<i32, 8> = LocalityStacks::new(4);
        let mut c = Box::new(Chunk::new());
        c.push(7);
        arr.push(EffectiveId(1), c);

        assert!(arr.pop(EffectiveId(0)).is_none());
        assert!(arr.pop(EffectiveId(2)).is_none());
        let mut popped = arr.pop(EffectiveId(1)).unwrap();
        assert_eq!(popped.pop(), Some(7));
    }
}
