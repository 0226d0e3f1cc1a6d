//! Ready queue for thread dispatch
//!
//! Plain FIFO. Priority never changes a thread's position, so dispatch order
//! is round-robin regardless of slice length.
//!
//! Capacity is reserved up front: the dispatcher pushes from inside the
//! preemption signal handler and must never reach the allocator there.

use std::collections::VecDeque;

use crate::id::ThreadId;

/// FIFO of runnable thread ids
#[derive(Debug, Default)]
pub struct ReadyQueue {
    queue: VecDeque<ThreadId>,
}

impl ReadyQueue {
    /// Create a queue that can hold `capacity` ids without reallocating
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
        }
    }

    /// Make a thread runnable after everything already queued
    #[inline]
    pub fn push_back(&mut self, id: ThreadId) {
        debug_assert!(!self.contains(id), "thread {} queued twice", id);
        debug_assert!(self.queue.len() < self.queue.capacity(), "ready queue would grow");
        self.queue.push_back(id);
    }

    /// Next thread to dispatch
    #[inline]
    pub fn pop_front(&mut self) -> Option<ThreadId> {
        self.queue.pop_front()
    }

    /// Drop a thread that was blocked or terminated before it got to run
    ///
    /// Returns whether the id was queued.
    pub fn remove(&mut self, id: ThreadId) -> bool {
        match self.queue.iter().position(|&queued| queued == id) {
            Some(pos) => {
                self.queue.remove(pos);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn contains(&self, id: ThreadId) -> bool {
        self.queue.contains(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queued ids, front first
    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.queue.iter().copied()
    }
}
