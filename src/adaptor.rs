//! The user-facing, item-level worklist.
//!
//! [`ChunkedAdaptor`] is what a Louvain worker thread actually calls: plain
//! `push`/`pop` of single task items (vertex ids), with chunk batching and
//! publication to the underlying [`StealingWorklist`](crate::worklist::StealingWorklist)
//! handled transparently underneath. Work is LIFO within a chunk and LIFO
//! over chunks on a stack — globally an unfair, depth-first-biased
//! scheduler that favors recently produced work, which is good for cache
//! locality and matches how Louvain's per-vertex migrations tend to create
//! more local work on the vertex just reassigned.

use std::sync::Arc;

use crate::allocator::ChunkAllocator;
use crate::chunk::Chunk;
use crate::locality::EffectiveId;
use crate::worklist::{ChunkWorklist, InitialQueue};

/// Per-worker adaptor: owns a thread-local [`ChunkAllocator`] and a pointer
/// to the current (possibly absent) [`Chunk`] it is filling or draining.
pub struct ChunkedAdaptor<T, const K: usize, Init, Running> {
    id: EffectiveId,
    current: Option<Box<Chunk<T, K>>>,
    allocator: ChunkAllocator<T, K>,
    queue: Arc<InitialQueue<Init, Running>>,
}

impl<T, const K: usize, Init, Running> ChunkedAdaptor<T, K, Init, Running>
where
    Init: ChunkWorklist<T, K>,
    Running: ChunkWorklist<T, K>,
{
    /// Creates an adaptor for worker `id`, sharing the given queue.
    pub fn new(id: EffectiveId, queue: Arc<InitialQueue<Init, Running>>) -> Self {
        ChunkedAdaptor {
            id,
            current: None,
            allocator: ChunkAllocator::new(4),
            queue,
        }
    }

    /// This worker's stable locality id.
    pub fn id(&self) -> EffectiveId {
        self.id
    }

    /// Pushes a single item.
    ///
    /// If the current chunk has room it goes straight in. Otherwise the
    /// current chunk (if any) is published to the running queue, a fresh
    /// chunk is allocated, and the push is retried — which always succeeds,
    /// because a freshly allocated chunk is empty.
    pub fn push(&mut self, item: T) {
        if let Some(chunk) = self.current.as_mut() {
            if chunk.push(item) {
                return;
            }
            let full = self.current.take().unwrap();
            self.queue.push(self.id, full);
        }
        let mut fresh = self.allocator.alloc();
        let pushed = fresh.push(item);
        debug_assert!(pushed, "a freshly allocated chunk must have room");
        self.current = Some(fresh);
    }

    /// Pushes every item in `iter`, repeatedly filling and publishing chunks
    /// until the iterator is drained.
    pub fn push_iter<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let mut iter = iter.into_iter().peekable();
        while iter.peek().is_some() {
            if self.current.is_none() {
                self.current = Some(self.allocator.alloc());
            }
            let chunk = self.current.as_mut().unwrap();
            iter = chunk.push_iter(iter);
            if chunk.full() && iter.peek().is_some() {
                let full = self.current.take().unwrap();
                self.queue.push(self.id, full);
            }
        }
    }

    /// Pushes a single seed item via the initial-queue path, bypassing this
    /// worker's current chunk entirely. Used by the driver before kickoff.
    pub fn pushi(&mut self, item: T) {
        let mut chunk = self.allocator.alloc();
        let pushed = chunk.push(item);
        debug_assert!(pushed);
        self.queue.pushi(self.id, chunk);
    }

    /// Pops a single item, LIFO.
    ///
    /// Drains the current chunk first; once it empties, the chunk is
    /// recycled into this worker's allocator and a replacement is requested
    /// from the underlying worklist (which may steal on this worker's
    /// behalf). Returns `None` only once both the current chunk and the
    /// worklist are exhausted.
    pub fn pop(&mut self) -> Option<T> {
        loop {
            if let Some(chunk) = self.current.as_mut() {
                if let Some(item) = chunk.pop() {
                    return Some(item);
                }
                let drained = self.current.take().unwrap();
                self.allocator.recycle(drained);
            }
            match self.queue.pop(self.id) {
                Some(chunk) => self.current = Some(chunk),
                None => return None,
            }
        }
    }

    /// `true` if this worker has no buffered items and the underlying
    /// worklist currently looks empty (best-effort, see
    /// [`ChunkStack::is_empty`](crate::stack::ChunkStack::is_empty)).
    pub fn is_locally_empty(&self) -> bool {
        self.current.as_ref().map_or(true, |c| c.empty())
    }
}
