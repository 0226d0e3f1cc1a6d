//! Thread table
//!
//! Slots are indexed by thread id and never removed. A terminated slot keeps
//! its id until a later spawn replaces the context in place; the lowest
//! terminated index is always reused first.

use uthreads_core::error::{SchedResult, SystemError, UsageError};
use uthreads_core::id::ThreadId;
use uthreads_core::state::Priority;

use crate::context::{Entry, ExecutionContext};

/// All execution contexts, slot index == thread id
pub struct ThreadTable {
    /// Boxed so a suspended context never moves when the vector grows
    slots: Vec<Box<ExecutionContext>>,
    capacity: usize,
    stack_size: usize,

    /// Where every spawned context starts executing
    start: extern "C" fn(),
}

impl ThreadTable {
    /// Table holding only thread 0
    pub fn new(capacity: usize, stack_size: usize, start: extern "C" fn()) -> Self {
        debug_assert!(capacity > 0);
        let mut slots = Vec::with_capacity(capacity);
        slots.push(Box::new(ExecutionContext::main(Priority::DEFAULT)));
        Self {
            slots,
            capacity,
            stack_size,
            start,
        }
    }

    /// Create a context for `entry` and return its id
    ///
    /// Reuses the first terminated slot, otherwise appends one. Fails with
    /// `MaxThreads` and leaves the table untouched when neither is possible.
    pub fn spawn(&mut self, entry: Entry, priority: Priority) -> SchedResult<ThreadId> {
        if let Some(index) = self.first_terminated() {
            let id = ThreadId::new(index as u32);
            let fresh = self.build(id, priority, entry)?;
            // Old context (and its stack) dropped here
            self.slots[index] = fresh;
            return Ok(id);
        }

        if self.slots.len() >= self.capacity {
            return Err(UsageError::MaxThreads(self.capacity).into());
        }

        let id = ThreadId::new(self.slots.len() as u32);
        let fresh = self.build(id, priority, entry)?;
        self.slots.push(fresh);
        Ok(id)
    }

    fn build(
        &self,
        id: ThreadId,
        priority: Priority,
        entry: Entry,
    ) -> Result<Box<ExecutionContext>, SystemError> {
        ExecutionContext::spawned(id, priority, entry, self.stack_size, self.start).map(Box::new)
    }

    fn first_terminated(&self) -> Option<usize> {
        self.slots
            .iter()
            .skip(1)
            .position(|ctx| ctx.is_terminated())
            .map(|pos| pos + 1)
    }

    /// Context in slot `id`, terminated or not
    #[inline]
    pub fn get(&self, id: ThreadId) -> Option<&ExecutionContext> {
        self.slots.get(id.as_usize()).map(|b| &**b)
    }

    #[inline]
    pub fn get_mut(&mut self, id: ThreadId) -> Option<&mut ExecutionContext> {
        self.slots.get_mut(id.as_usize()).map(|b| &mut **b)
    }

    /// Context of a thread that exists and has not terminated
    pub fn live(&self, id: ThreadId) -> Result<&ExecutionContext, UsageError> {
        match self.get(id) {
            None => Err(UsageError::ThreadNotFound(id)),
            Some(ctx) if ctx.is_terminated() => Err(UsageError::ThreadTerminated(id)),
            Some(ctx) => Ok(ctx),
        }
    }

    pub fn live_mut(&mut self, id: ThreadId) -> Result<&mut ExecutionContext, UsageError> {
        match self.get_mut(id) {
            None => Err(UsageError::ThreadNotFound(id)),
            Some(ctx) if ctx.is_terminated() => Err(UsageError::ThreadTerminated(id)),
            Some(ctx) => Ok(ctx),
        }
    }

    /// Number of slots in use, terminated ones included
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExecutionContext> {
        self.slots.iter().map(|b| &**b)
    }

    /// Release every context
    ///
    /// The context whose stack contains `sp` is still executing, so its
    /// mapping is leaked rather than pulled out from under the caller. Only
    /// for use on the way to process exit.
    pub fn release(self, sp: usize) {
        for ctx in self.slots {
            if ctx.owns_address(sp) {
                std::mem::forget(ctx);
            } else {
                drop(ctx);
            }
        }
    }
}

impl std::fmt::Debug for ThreadTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadTable")
            .field("len", &self.slots.len())
            .field("capacity", &self.capacity)
            .field("stack_size", &self.stack_size)
            .finish()
    }
}
