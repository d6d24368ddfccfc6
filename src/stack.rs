//! A lock-free LIFO stack of [`Chunk`]s.
//!
//! `push` is a classic Treiber push: lock-free, retried on CAS failure.
//! `pop` and `steal` serialize on a single-bit lock folded into the head
//! pointer's tag (`1` = locked). `push` never acquires that lock — it simply
//! competes with a locked holder via CAS on the whole tagged word, which
//! fails while the tag bit is set, forcing the pusher to retry. Because the
//! locked critical section is O(1) (read head, unlink, restore), this
//! retry is bounded.
//!
//! Reclamation rides on [`crossbeam_epoch`]: every read of the head pointer
//! happens under a pinned [`Guard`], so a stalled reader can never observe a
//! chunk address after it has been handed back to its owning thread's
//! [`ChunkAllocator`](crate::allocator::ChunkAllocator) and reused — the
//! pin simply never advances past the epoch in which the read occurred
//! until the reader unpins. This is the epoch-based twin of the thread-local
//! quarantine discipline described in spec.md's ABA discussion; the two are
//! complementary, not redundant, because confinement to one allocator rules
//! out cross-thread reuse and epoch pinning rules out use-after-unlink
//! within the racing CAS window itself.

use std::sync::atomic::Ordering;

use crossbeam_epoch::{self as epoch, Atomic, Owned, Shared};

use crate::chunk::Chunk;

const UNLOCKED: usize = 0;
const LOCKED: usize = 1;

/// A lock-free LIFO stack of [`Chunk<T, K>`].
///
/// Invariants (spec.md §3):
/// 1. a chunk is linked onto at most one stack at a time;
/// 2. `head == null` iff the stack is empty;
/// 3. `push` is lock-free via CAS; `pop`/`steal` serialize on the head lock;
/// 4. `steal` is the only method that may remove a chunk on behalf of a
///    thread other than the current owner.
pub struct ChunkStack<T, const K: usize> {
    head: Atomic<Chunk<T, K>>,
}

impl<T, const K: usize> ChunkStack<T, K> {
    /// Creates an empty stack.
    pub const fn new() -> Self {
        ChunkStack { head: Atomic::null() }
    }

    /// `true` if the stack currently holds no chunks.
    ///
    /// Best-effort: with concurrent pushers this is a momentary snapshot.
    pub fn is_empty(&self) -> bool {
        let guard = epoch::pin();
        self.head.load(Ordering::Acquire, &guard).is_null()
    }

    /// Pushes `chunk` onto the stack. Lock-free: retries the CAS until it
    /// wins, which only fails when another push wins the race or the head is
    /// momentarily locked by a concurrent `pop`/`steal`.
    pub fn push(&self, chunk: Box<Chunk<T, K>>) {
        let guard = epoch::pin();
        let new = Owned::from(chunk).into_shared(&guard).with_tag(UNLOCKED);
        loop {
            let old = self.head.load(Ordering::Acquire, &guard);
            if old.tag() == LOCKED {
                // Head is momentarily locked by a pop/steal; back off and retry
                // the whole read-modify-CAS rather than spin on the stale value.
                std::hint::spin_loop();
                continue;
            }
            // Safety: `new` was just derived from a uniquely-owned `Box` and is
            // not yet reachable from any other thread, so writing `next` is race-free.
            unsafe {
                (*new.as_raw()).next.store(old, Ordering::Relaxed);
            }
            match self.head.compare_exchange_weak(
                old,
                new,
                Ordering::AcqRel,
                Ordering::Acquire,
                &guard,
            ) {
                Ok(_) => return,
                Err(_) => continue,
            }
        }
    }

    /// Pops the top chunk, or `None` if the stack is empty.
    ///
    /// The fast path checks `head == null` without locking — best-effort,
    /// may miss an item pushed concurrently with the check, but that only
    /// loses work-stealing opportunity, never correctness.
    pub fn pop(&self) -> Option<Box<Chunk<T, K>>> {
        self.detach(Lock::Blocking)
    }

    /// Attempts to steal the top chunk on behalf of another thread.
    ///
    /// Identical to [`pop`](Self::pop) except it uses a `try_lock`: under
    /// contention it returns `None` immediately instead of retrying, which
    /// guarantees the stealer always makes forward progress and bounds
    /// stealing overhead.
    pub fn steal(&self) -> Option<Box<Chunk<T, K>>> {
        self.detach(Lock::TryOnce)
    }

    fn detach(&self, mode: Lock) -> Option<Box<Chunk<T, K>>> {
        let guard = epoch::pin();
        loop {
            let cur = self.head.load(Ordering::Acquire, &guard);
            if cur.is_null() {
                return None;
            }
            if cur.tag() == LOCKED {
                match mode {
                    Lock::TryOnce => return None,
                    Lock::Blocking => {
                        std::hint::spin_loop();
                        continue;
                    }
                }
            }
            let locked = cur.with_tag(LOCKED);
            if self
                .head
                .compare_exchange_weak(cur, locked, Ordering::AcqRel, Ordering::Acquire, &guard)
                .is_err()
            {
                continue;
            }
            // We now exclusively hold the head lock; `cur` cannot be
            // mutated or unlinked by any other thread.
            let node_ref = unsafe { cur.as_ref() }.expect("locked head is non-null");
            let next = node_ref.next.load(Ordering::Acquire, &guard).with_tag(UNLOCKED);
            self.head.store(next, Ordering::Release); // unlock_and_set
            let mut owned: Box<Chunk<T, K>> =
                unsafe { cur.with_tag(UNLOCKED).into_owned().into_box() };
            owned.next.store(Shared::null(), Ordering::Relaxed);
            return Some(owned);
        }
    }
}

impl<T, const K: usize> Default for ChunkStack<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const K: usize> Drop for ChunkStack<T, K> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

// Safety: `Chunk<T, K>` is `Send` when `T: Send` (see chunk.rs); the stack
// only ever exposes whole, detached chunks across threads, never aliases
// their contents.
unsafe impl<T: Send, const K: usize> Send for ChunkStack<T, K> {}
unsafe impl<T: Send, const K: usize> Sync for ChunkStack<T, K> {}

#[derive(Clone, Copy)]
enum Lock {
    Blocking,
    TryOnce,
}
