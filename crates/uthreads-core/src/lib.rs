//! # uthreads-core
//!
//! Core types for the uthreads green-thread scheduler.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! Stacks, signals, timers and context switching live in `uthreads-runtime`.
//!
//! ## Modules
//!
//! - `id` - Thread identifier type
//! - `state` - Thread state and priority types
//! - `quantum` - Per-priority time slice table
//! - `ready_queue` - FIFO of runnable thread ids
//! - `error` - Usage/system error taxonomy
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod state;
pub mod quantum;
pub mod ready_queue;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::ThreadId;
pub use state::{ThreadState, Priority};
pub use quantum::QuantumTable;
pub use ready_queue::ReadyQueue;
pub use error::{SchedError, SchedResult, SystemError, UsageError};
pub use env::{env_get, env_get_bool, env_get_opt};

/// Constants for memory layout and table sizing
pub mod constants {
    /// Default maximum number of live thread slots (including thread 0)
    pub const DEFAULT_MAX_THREADS: usize = 100;

    /// Largest thread table `RuntimeConfig` accepts
    pub const MAX_THREADS_LIMIT: usize = 65_536;

    /// Default stack size per spawned thread (256 KB)
    pub const DEFAULT_STACK_SIZE: usize = 256 * 1024;

    /// Smallest stack we accept; catch_unwind plus a panic message needs room
    pub const MIN_STACK_SIZE: usize = 16 * 1024;

    /// Guard page size when sysconf cannot report a page size (4 KB)
    pub const GUARD_SIZE: usize = 4096;

    /// Stack pointer alignment required by both supported ABIs
    pub const STACK_ALIGN: usize = 16;

    /// No thread sentinel value
    pub const THREAD_NONE: u32 = u32::MAX;

    /// Microseconds per second, for itimerval conversion
    pub const MICROS_PER_SEC: u64 = 1_000_000;
}
