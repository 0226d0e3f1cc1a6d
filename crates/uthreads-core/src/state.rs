//! Thread state and priority types

use core::fmt;

/// Scheduling state of a logical thread
///
/// Termination is tracked separately: a terminated slot is inert no matter
/// which state it last recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    /// Runnable, sitting in the ready queue
    Ready = 1,

    /// Currently executing on the process's single thread of control
    Running = 2,

    /// Waiting for an explicit resume
    Blocked = 3,
}

impl ThreadState {
    /// Check if this state allows the thread to be dispatched
    #[inline]
    pub const fn is_runnable(&self) -> bool {
        matches!(self, ThreadState::Ready)
    }
}

impl From<ThreadState> for u8 {
    fn from(state: ThreadState) -> u8 {
        state as u8
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadState::Ready => write!(f, "READY"),
            ThreadState::Running => write!(f, "RUNNING"),
            ThreadState::Blocked => write!(f, "BLOCKED"),
        }
    }
}

/// Priority of a thread
///
/// A priority is an index into the quantum table given to `init`. It only
/// decides how long a thread runs once dispatched, never its place in the
/// ready queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Priority(usize);

impl Priority {
    /// Priority 0, which thread 0 starts with
    pub const DEFAULT: Priority = Priority(0);

    #[inline]
    pub const fn new(index: usize) -> Self {
        Priority(index)
    }

    /// Get priority as quantum table index
    #[inline]
    pub const fn as_index(&self) -> usize {
        self.0
    }
}

impl From<usize> for Priority {
    #[inline]
    fn from(index: usize) -> Self {
        Priority(index)
    }
}

impl From<Priority> for usize {
    #[inline]
    fn from(p: Priority) -> usize {
        p.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_runnable() {
        assert!(ThreadState::Ready.is_runnable());
        assert!(!ThreadState::Running.is_runnable());
        assert!(!ThreadState::Blocked.is_runnable());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ThreadState::Blocked.to_string(), "BLOCKED");
        assert_eq!(u8::from(ThreadState::Running), 2);
    }

    #[test]
    fn test_priority_index() {
        let p: Priority = 3usize.into();
        assert_eq!(p.as_index(), 3);
        assert_eq!(Priority::default(), Priority::DEFAULT);
        assert!(Priority::new(0) < Priority::new(1));
        assert_eq!(p.to_string(), "P3");
    }
}
