//! Error types for the uthreads library
//!
//! Two tiers: `UsageError` is a rejected call that changed nothing and
//! leaves the library usable; `SystemError` is a failed OS primitive and
//! always ends the process.

use core::fmt;
use crate::id::ThreadId;

/// Result type for scheduler operations
pub type SchedResult<T> = Result<T, SchedError>;

/// Errors that can occur in scheduler operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// Invalid caller input; no state was mutated
    Usage(UsageError),

    /// An OS primitive failed; fatal to the library
    System(SystemError),
}

impl SchedError {
    #[inline]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, SchedError::System(_))
    }
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::Usage(e) => write!(f, "thread library error: {}", e),
            SchedError::System(e) => write!(f, "system error: {}", e),
        }
    }
}

impl std::error::Error for SchedError {}

/// Invalid caller input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// Library used before `init`
    NotInitialized,

    /// `init` called twice
    AlreadyInitialized,

    /// Quantum table has no entries
    EmptyQuantumTable,

    /// Quantum table entry is zero
    ZeroQuantum { priority: usize },

    /// Priority is not an index into the quantum table
    InvalidPriority { priority: usize, levels: usize },

    /// No slot with this id
    ThreadNotFound(ThreadId),

    /// Slot exists but its thread has terminated
    ThreadTerminated(ThreadId),

    /// Table is full and no slot is reusable
    MaxThreads(usize),

    /// Thread 0 can never be blocked
    BlockMainThread,

    /// Configuration rejected by `RuntimeConfig::validate`
    InvalidConfig(&'static str),
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageError::NotInitialized => write!(f, "library not initialized"),
            UsageError::AlreadyInitialized => write!(f, "library already initialized"),
            UsageError::EmptyQuantumTable => write!(f, "invalid input: empty quantum table"),
            UsageError::ZeroQuantum { priority } => {
                write!(f, "invalid input: quantum for priority {} is not positive", priority)
            }
            UsageError::InvalidPriority { priority, levels } => {
                write!(f, "invalid input: priority {} out of range (0..{})", priority, levels)
            }
            UsageError::ThreadNotFound(id) => write!(f, "invalid input: no thread with id {}", id),
            UsageError::ThreadTerminated(id) => write!(f, "invalid input: thread {} has terminated", id),
            UsageError::MaxThreads(max) => write!(f, "max thread num reached ({})", max),
            UsageError::BlockMainThread => write!(f, "invalid input: the main thread cannot be blocked"),
            UsageError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for UsageError {}

impl From<UsageError> for SchedError {
    fn from(e: UsageError) -> Self {
        SchedError::Usage(e)
    }
}

/// OS primitive failures, each carrying the raw errno
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemError {
    /// pthread_sigmask failed
    SignalMask(i32),

    /// sigaction failed
    SignalAction(i32),

    /// setitimer failed
    Timer(i32),

    /// mmap of a thread stack failed
    StackMap(i32),

    /// mprotect of a guard page failed
    StackProtect(i32),
}

impl SystemError {
    /// Raw errno reported by the failing call
    pub const fn errno(&self) -> i32 {
        match *self {
            SystemError::SignalMask(e)
            | SystemError::SignalAction(e)
            | SystemError::Timer(e)
            | SystemError::StackMap(e)
            | SystemError::StackProtect(e) => e,
        }
    }
}

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self {
            SystemError::SignalMask(_) => "signal masking failed",
            SystemError::SignalAction(_) => "signal handler installation failed",
            SystemError::Timer(_) => "interval timer configuration failed",
            SystemError::StackMap(_) => "stack allocation failed",
            SystemError::StackProtect(_) => "stack guard page protection failed",
        };
        write!(f, "{} (errno {})", what, self.errno())
    }
}

impl std::error::Error for SystemError {}

impl From<SystemError> for SchedError {
    fn from(e: SystemError) -> Self {
        SchedError::System(e)
    }
}
