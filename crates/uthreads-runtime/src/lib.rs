//! # uthreads-runtime
//!
//! Platform-specific runtime for the uthreads scheduler.
//!
//! This crate provides:
//! - Stack mappings with guard pages (mmap)
//! - Preemption signal masking and handler installation (SIGVTALRM)
//! - The virtual-time preemption timer (ITIMER_VIRTUAL)
//! - Context capture/restore (architecture-specific assembly)
//! - The thread table, scheduler bookkeeping and the dispatcher
//! - The process-wide `Runtime` and its init/teardown lifecycle

pub mod config;
pub mod memory;
pub mod signal;
pub mod arch;
pub mod timer;
pub mod context;
pub mod table;
pub mod scheduler;
mod dispatch;
pub mod runtime;

// Re-exports
pub use config::RuntimeConfig;
pub use context::{Entry, ExecutionContext};
pub use runtime::Runtime;
pub use table::ThreadTable;
pub use scheduler::{Reschedule, Scheduler, Switch};
pub use timer::PreemptionTimer;

// Platform detection
cfg_if::cfg_if! {
    if #[cfg(not(unix))] {
        compile_error!("uthreads needs POSIX signals and interval timers");
    }
}

// Architecture detection
cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub use arch::x86_64 as current_arch;
    } else if #[cfg(target_arch = "aarch64")] {
        pub use arch::aarch64 as current_arch;
    } else {
        compile_error!("Unsupported architecture");
    }
}
