//! The composed scheduler: per-locality stealing on top of
//! [`LocalityStacks`](crate::locality::LocalityStacks), and a global seed
//! queue layered in front of it.
//!
//! This module operates at chunk granularity (whole [`Chunk`]s move between
//! localities); [`crate::adaptor::ChunkedAdaptor`] is the item-level API
//! built on top.

use crate::chunk::Chunk;
use crate::locality::{EffectiveId, LocalityStacks};
use crate::stack::ChunkStack;

/// A scheduler that worker `id` can push whole chunks into and pop them back
/// out of, possibly stealing from a sibling locality.
pub trait ChunkWorklist<T, const K: usize> {
    /// Publishes a full chunk on behalf of `id`.
    fn push_chunk(&self, id: EffectiveId, chunk: Box<Chunk<T, K>>);
    /// Fetches a chunk for `id` to drain, possibly stealing from a sibling.
    fn pop_chunk(&self, id: EffectiveId) -> Option<Box<Chunk<T, K>>>;
}

/// `LevelStealingAlt` of spec.md §4.3: local pop first, then round-robin
/// `steal` over sibling localities starting at `(id + 1) mod N`.
///
/// Victim order is deterministic by design — it avoids convoys (all idle
/// workers hammering the same busy victim first) and keeps behavior
/// reproducible for testing, as spec.md calls out explicitly.
pub struct StealingWorklist<T, const K: usize> {
    localities: LocalityStacks<T, K>,
}

impl<T, const K: usize> StealingWorklist<T, K> {
    /// Creates a stealing worklist with `n` per-locality stacks.
    pub fn new(n: usize) -> Self {
        StealingWorklist {
            localities: LocalityStacks::new(n),
        }
    }

    /// Number of localities.
    pub fn len(&self) -> usize {
        self.localities.len()
    }

    /// `true` if there are no localities configured.
    pub fn is_empty(&self) -> bool {
        self.localities.is_empty()
    }
}

impl<T, const K: usize> ChunkWorklist<T, K> for StealingWorklist<T, K> {
    fn push_chunk(&self, id: EffectiveId, chunk: Box<Chunk<T, K>>) {
        self.localities.push(id, chunk);
    }

    fn pop_chunk(&self, id: EffectiveId) -> Option<Box<Chunk<T, K>>> {
        if let Some(chunk) = self.localities.pop(id) {
            return Some(chunk);
        }
        let n = self.localities.len();
        if n <= 1 {
            return None;
        }
        for offset in 1..n {
            let victim = EffectiveId((id.index() + offset) % n);
            if victim == id {
                continue;
            }
            if let Some(chunk) = self.localities.steal_from(victim) {
                return Some(chunk);
            }
        }
        None
    }
}

/// A single shared LIFO stack used as the global seed queue. Unlike
/// [`StealingWorklist`], it ignores the caller's [`EffectiveId`] entirely —
/// it is the driver's entry point for pre-kickoff work, not a per-worker
/// locality.
pub struct GlobalSeedQueue<T, const K: usize> {
    stack: ChunkStack<T, K>,
}

impl<T, const K: usize> GlobalSeedQueue<T, K> {
    /// Creates an empty seed queue.
    pub fn new() -> Self {
        GlobalSeedQueue {
            stack: ChunkStack::new(),
        }
    }
}

impl<T, const K: usize> Default for GlobalSeedQueue<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const K: usize> ChunkWorklist<T, K> for GlobalSeedQueue<T, K> {
    fn push_chunk(&self, _id: EffectiveId, chunk: Box<Chunk<T, K>>) {
        self.stack.push(chunk);
    }

    fn pop_chunk(&self, _id: EffectiveId) -> Option<Box<Chunk<T, K>>> {
        self.stack.pop()
    }
}

/// Composes a global seed queue (`Init`) with a per-locality stealing queue
/// (`Running`): `pushi` routes to `Init`, `push` routes to `Running`, and
/// `pop` prefers `Running` but falls back to `Init`, naturally draining seeds
/// as stealing ramps up (spec.md §4.3).
pub struct InitialQueue<Init, Running> {
    init: Init,
    running: Running,
}

impl<Init, Running> InitialQueue<Init, Running> {
    /// Wraps the given initial and running queues.
    pub fn new(init: Init, running: Running) -> Self {
        InitialQueue { init, running }
    }

    /// Access to the running (stealing) queue, e.g. to create per-worker
    /// adaptors bound to it.
    pub fn running(&self) -> &Running {
        &self.running
    }

    /// Access to the initial (seed) queue.
    pub fn init(&self) -> &Init {
        &self.init
    }
}

impl<T, const K: usize, Init, Running> InitialQueue<Init, Running>
where
    Init: ChunkWorklist<T, K>,
    Running: ChunkWorklist<T, K>,
{
    /// Pushes a seed chunk, bypassing the worker's local locality entirely.
    pub fn pushi(&self, id: EffectiveId, chunk: Box<Chunk<T, K>>) {
        self.init.push_chunk(id, chunk);
    }

    /// Pushes a chunk produced by running work into the stealing queue.
    pub fn push(&self, id: EffectiveId, chunk: Box<Chunk<T, K>>) {
        self.running.push_chunk(id, chunk);
    }

    /// Pops from the running queue first, falling back to the seed queue.
    pub fn pop(&self, id: EffectiveId) -> Option<Box<Chunk<T, K>>> {
        self.running.pop_chunk(id).or_else(|| self.init.pop_chunk(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_with(v: i32) -> Box<Chunk<i32, 8>> {
        let mut c = Box::new(Chunk::new());
        c.push(v);
        c
    }

    #[test]
    fn pop_local_before_stealing() {
        let wl: StealingWorklist<i32, 8> = StealingWorklist::new(3);
        wl.push_chunk(EffectiveId(0), chunk_with(1));
        wl.push_chunk(EffectiveId(1), chunk_with(2));

        let mut popped = wl.pop_chunk(EffectiveId(0)).unwrap();
        assert_eq!(popped.pop(), Some(1), "must drain own locality first");
    }

    #[test]
    fn steals_round_robin_starting_after_self() {
        let wl: StealingWorklist<i32, 8> = StealingWorklist::new(4);
        // Nothing local to id 0; siblings 1..3 empty except 2.
        wl.push_chunk(EffectiveId(2), chunk_with(99));

        let mut popped = wl.pop_chunk(EffectiveId(0)).unwrap();
        assert_eq!(popped.pop(), Some(99));
    }

    #[test]
    fn returns_none_when_everything_is_empty() {
        let wl: StealingWorklist<i32, 8> = StealingWorklist::new(4);
        assert!(wl.pop_chunk(EffectiveId(0)).is_none());
    }

    #[test]
    fn initial_queue_drains_seeds_after_running_empties() {
        let iq: InitialQueue<GlobalSeedQueue<i32, 8>, StealingWorklist<i32, 8>> =
            InitialQueue::new(GlobalSeedQueue::new(), StealingWorklist::new(2));
        iq.pushi(EffectiveId(0), chunk_with(5));
        iq.push(EffectiveId(0), chunk_with(6));

        let mut first = iq.pop(EffectiveId(0)).unwrap();
        assert_eq!(first.pop(), Some(6), "running queue drains before seeds");
        let mut second = iq.pop(EffectiveId(0)).unwrap();
        assert_eq!(second.pop(), Some(5), "seed queue drains once running is empty");
        assert!(iq.pop(EffectiveId(0)).is_none());
    }
}
