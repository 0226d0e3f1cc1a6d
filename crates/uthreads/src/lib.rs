//! # uthreads - user-level threads with timer preemption
//!
//! Many logical threads multiplexed onto the calling OS thread. Each thread
//! runs for the quantum of its priority, measured in process CPU time, and
//! is then preempted in favour of the next thread in a FIFO ready queue.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::time::Duration;
//!
//! fn main() {
//!     // Priority 0 gets 10ms slices, priority 1 gets 20ms
//!     uthreads::init(&[Duration::from_millis(10), Duration::from_millis(20)]).unwrap();
//!
//!     let worker = uthreads::spawn(|| {
//!         loop {
//!             // CPU-bound work; preempted when its 20ms slice runs out
//!         }
//!     }, 1).unwrap();
//!
//!     while uthreads::total_quanta() < 10 {}
//!     uthreads::terminate(worker).unwrap();
//!
//!     // Thread 0 terminating ends the process
//!     uthreads::terminate(uthreads::ThreadId::MAIN).unwrap();
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      User Code                              │
//! │     spawn(), block(), resume(), terminate(), masked()       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Scheduler                             │
//! │        thread table, FIFO ready queue, quantum counts       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌─────────────┐      ┌───────────┐
//!    │ SIGVTALRM │ ───► │ Dispatcher  │ ───► │  capture/ │
//!    │  handler  │      │             │      │  restore  │
//!    └───────────┘      └─────────────┘      └───────────┘
//!          ▲                   │
//!          └── ITIMER_VIRTUAL ◄┘ rearmed with the incoming quantum
//! ```
//!
//! ## Preemption and non-reentrant code
//!
//! A thread can be switched out between any two instructions. Code that is
//! not reentrant, heap allocation and `std` stdio included, has to run
//! inside [`masked`] if another thread may run the same code. The `k*!`
//! logging macros bypass std's stderr once `init` has run and can be used
//! unmasked as long as their arguments format without allocating.

use std::time::Duration;

use uthreads_runtime::runtime;

// Re-export core types
pub use uthreads_core::{
    Priority,
    QuantumTable,
    SchedError,
    SchedResult,
    SystemError,
    ThreadId,
    ThreadState,
    UsageError,
};

// Re-export kprint macros for debug logging
pub use uthreads_core::{kprint, kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use uthreads_core::kprint::{LogLevel, init as init_logging, set_log_level, set_flush_enabled};

// Re-export env utilities
pub use uthreads_core::{env_get, env_get_bool};

// Re-export runtime types
pub use uthreads_runtime::RuntimeConfig;

pub mod compat;

/// Usage errors go back to the caller; a failed system primitive ends the
/// process
fn settle<T>(result: Result<T, SchedError>) -> Result<T, UsageError> {
    match result {
        Ok(value) => Ok(value),
        Err(SchedError::Usage(e)) => Err(e),
        Err(SchedError::System(e)) => runtime::fatal(e),
    }
}

/// Initialize the library with one quantum per priority level
///
/// The caller becomes thread 0 and starts running its first quantum.
/// Configuration comes from [`RuntimeConfig::from_env`].
pub fn init(quanta: &[Duration]) -> Result<(), UsageError> {
    init_with_config(RuntimeConfig::from_env(), quanta)
}

/// Initialize with an explicit configuration
pub fn init_with_config(config: RuntimeConfig, quanta: &[Duration]) -> Result<(), UsageError> {
    settle(runtime::init(config, quanta))
}

/// Spawn a thread running `f` at `priority`
///
/// The new thread is queued behind every thread already ready. When `f`
/// returns the thread terminates as if it had called
/// `terminate(running_id())`; a panic in `f` is logged and does the same.
///
/// # Example
///
/// ```ignore
/// let id = uthreads::spawn(|| {
///     uthreads::masked(|| println!("hello from {}", uthreads::running_id()));
/// }, 0)?;
/// ```
pub fn spawn<F>(f: F, priority: usize) -> Result<ThreadId, UsageError>
where
    F: FnOnce() + 'static,
{
    settle(runtime::spawn(f, Priority::new(priority)))
}

/// Change the priority of a live thread
///
/// A running thread keeps the quantum it was dispatched with; the new
/// priority applies from its next dispatch.
pub fn change_priority(id: ThreadId, priority: usize) -> Result<(), UsageError> {
    settle(runtime::change_priority(id, Priority::new(priority)))
}

/// Terminate a thread
///
/// Terminating [`ThreadId::MAIN`] releases everything and exits the process
/// with status 0. Terminating the running thread does not return.
pub fn terminate(id: ThreadId) -> Result<(), UsageError> {
    settle(runtime::terminate(id))
}

/// Block a thread until [`resume`]
///
/// Thread 0 cannot be blocked. Blocking the running thread switches away
/// and returns once it has been resumed and dispatched again. Blocking a
/// blocked thread succeeds and does nothing.
pub fn block(id: ThreadId) -> Result<(), UsageError> {
    settle(runtime::block(id))
}

/// Make a blocked thread ready again; a no-op for ready or running threads
pub fn resume(id: ThreadId) -> Result<(), UsageError> {
    settle(runtime::resume(id))
}

/// Id of the running thread, [`ThreadId::NONE`] before `init`
#[inline]
pub fn running_id() -> ThreadId {
    runtime::running_id()
}

/// Number of dispatches since `init`, counting thread 0's first quantum
#[inline]
pub fn total_quanta() -> u64 {
    runtime::total_quanta()
}

/// Number of times `id` has been dispatched
pub fn quanta(id: ThreadId) -> Result<u64, UsageError> {
    settle(runtime::quanta(id))
}

/// Run `f` with preemption masked
///
/// No other thread runs until `f` returns. Nests.
pub fn masked<R>(f: impl FnOnce() -> R) -> R {
    let _guard = match uthreads_runtime::signal::MaskGuard::new() {
        Ok(guard) => guard,
        Err(e) => runtime::fatal(e),
    };
    f()
}

/// Check whether [`init`] has completed
#[inline]
pub fn is_initialized() -> bool {
    runtime::is_initialized()
}

#[cfg(test)]
mod tests {
    use super::*;

    // The runtime is never initialized in unit tests: a process-wide virtual
    // timer would preempt the test harness threads

    #[test]
    fn test_queries_before_init() {
        assert!(!is_initialized());
        assert_eq!(running_id(), ThreadId::NONE);
        assert_eq!(total_quanta(), 0);
        assert_eq!(quanta(ThreadId::MAIN), Err(UsageError::NotInitialized));
    }

    #[test]
    fn test_operations_before_init() {
        assert_eq!(spawn(|| {}, 0), Err(UsageError::NotInitialized));
        assert_eq!(block(ThreadId::new(1)), Err(UsageError::NotInitialized));
        assert_eq!(resume(ThreadId::new(1)), Err(UsageError::NotInitialized));
        assert_eq!(terminate(ThreadId::MAIN), Err(UsageError::NotInitialized));
        assert_eq!(change_priority(ThreadId::MAIN, 0), Err(UsageError::NotInitialized));
    }

    #[test]
    fn test_init_rejects_bad_input_without_side_effects() {
        assert_eq!(init(&[]), Err(UsageError::EmptyQuantumTable));
        assert_eq!(
            init(&[Duration::from_millis(1), Duration::ZERO]),
            Err(UsageError::ZeroQuantum { priority: 1 })
        );
        assert_eq!(
            init_with_config(RuntimeConfig::new().max_threads(0), &[Duration::from_millis(1)]),
            Err(UsageError::InvalidConfig("max_threads must be > 0"))
        );
        assert!(!is_initialized());
    }

    #[test]
    fn test_masked_returns_value() {
        assert_eq!(masked(|| masked(|| 42)), 42);
    }
}
