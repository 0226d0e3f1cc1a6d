//! Execution context of one logical thread
//!
//! Owns the thread's stack and the register snapshot it resumes from. The
//! snapshot lives inside the context, so a context must not move while it
//! is suspended; the thread table keeps every context boxed for that reason.

use nix::sys::signal::SigSet;
use uthreads_core::error::SystemError;
use uthreads_core::id::ThreadId;
use uthreads_core::state::{Priority, ThreadState};

use crate::current_arch::{self, Registers};
use crate::memory::Stack;

/// Body of a spawned thread
pub type Entry = Box<dyn FnOnce() + 'static>;

/// One logical thread
pub struct ExecutionContext {
    id: ThreadId,
    priority: Priority,
    state: ThreadState,
    terminated: bool,

    /// Times this thread was placed into `Running`
    quanta: u64,

    /// `None` for thread 0, which runs on the process stack
    stack: Option<Stack>,

    /// Resumption point, valid once captured or initialized
    regs: Registers,

    /// Signal mask reinstated when this thread resumes
    mask: SigSet,

    /// Taken once, when the thread first runs
    entry: Option<Entry>,
}

impl ExecutionContext {
    /// Context for thread 0
    ///
    /// It has no stack of its own; its registers are captured the first time
    /// it is switched away from.
    pub fn main(priority: Priority) -> Self {
        Self {
            id: ThreadId::MAIN,
            priority,
            state: ThreadState::Ready,
            terminated: false,
            quanta: 0,
            stack: None,
            regs: Registers::new(),
            mask: SigSet::empty(),
            entry: None,
        }
    }

    /// Context for a spawned thread
    ///
    /// Maps a fresh stack and prepares the registers so the first restore
    /// enters `start` at the top of it with an empty signal mask. `start`
    /// is expected to take the entry out of the running context and run it.
    pub fn spawned(
        id: ThreadId,
        priority: Priority,
        entry: Entry,
        stack_size: usize,
        start: extern "C" fn(),
    ) -> Result<Self, SystemError> {
        debug_assert!(!id.is_main(), "thread 0 never gets a spawned context");

        let stack = Stack::new(stack_size)?;
        let mut regs = Registers::new();
        unsafe { current_arch::init_context(&mut regs, stack.top(), start) };

        Ok(Self {
            id,
            priority,
            state: ThreadState::Ready,
            terminated: false,
            quanta: 0,
            stack: Some(stack),
            regs,
            mask: SigSet::empty(),
            entry: Some(entry),
        })
    }

    #[inline]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    #[inline]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    #[inline]
    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    #[inline]
    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Change the state; entering `Running` counts one more quantum
    #[inline]
    pub fn set_state(&mut self, state: ThreadState) {
        self.state = state;
        if state == ThreadState::Running {
            self.quanta += 1;
        }
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Mark terminated. There is no way back; the slot waits for reuse.
    #[inline]
    pub fn terminate(&mut self) {
        self.terminated = true;
    }

    #[inline]
    pub fn quanta(&self) -> u64 {
        self.quanta
    }

    #[inline]
    pub fn stack(&self) -> Option<&Stack> {
        self.stack.as_ref()
    }

    /// Check whether `addr` lies on this thread's own stack
    #[inline]
    pub fn owns_address(&self, addr: usize) -> bool {
        self.stack.as_ref().is_some_and(|s| s.contains(addr))
    }

    #[inline]
    pub fn has_entry(&self) -> bool {
        self.entry.is_some()
    }

    /// Hand the body over to the trampoline; `None` after the first call
    #[inline]
    pub fn take_entry(&mut self) -> Option<Entry> {
        self.entry.take()
    }

    /// Prepare for suspension: record the signal mask and return the
    /// register area to hand to `capture`
    ///
    /// `capture` itself has to be called from the frame that will later be
    /// resumed, so it cannot be wrapped here.
    #[inline]
    pub fn suspend_point(&mut self, mask: SigSet) -> *mut Registers {
        self.mask = mask;
        &mut self.regs
    }

    /// Register area to hand to `restore`
    #[inline]
    pub fn resume_point(&self) -> *const Registers {
        &self.regs
    }

    /// Mask to reinstate once this thread is running again
    #[inline]
    pub fn saved_mask(&self) -> SigSet {
        self.mask
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("state", &self.state)
            .field("terminated", &self.terminated)
            .field("quanta", &self.quanta)
            .field("stack", &self.stack)
            .finish()
    }
}
