//! Integer interface
//!
//! The classic `uthread_*` calls: ids and priorities are plain integers,
//! quanta are microseconds, and every call returns `-1` on a usage error
//! (after logging it) instead of a `Result`. System errors still end the
//! process.
//!
//! ```ignore
//! use uthreads::compat::*;
//!
//! fn worker() {
//!     loop {}
//! }
//!
//! uthread_init(&[100_000, 200_000]);
//! let tid = uthread_spawn(worker, 1);
//! assert_eq!(uthread_get_tid(), 0);
//! ```

use std::time::Duration;

use uthreads_core::{ThreadId, UsageError};

/// Upper bound on thread ids and quantum counts reported as `i32`
const MAX_REPORTED: u64 = i32::MAX as u64;

fn status(result: Result<(), UsageError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Negative ids map to `ThreadId::NONE`, which no slot ever has
fn tid(raw: i32) -> ThreadId {
    u32::try_from(raw).map(ThreadId::new).unwrap_or(ThreadId::NONE)
}

/// Negative priorities map past the end of any quantum table
fn priority(raw: i32) -> usize {
    usize::try_from(raw).unwrap_or(usize::MAX)
}

fn clamp(value: u64) -> i32 {
    value.min(MAX_REPORTED) as i32
}

/// Initialize with per-priority quanta in microseconds
///
/// Returns 0, or -1 for an empty table or a non-positive entry.
pub fn uthread_init(quantum_usecs: &[i32]) -> i32 {
    let mut quanta = Vec::with_capacity(quantum_usecs.len());
    for &usecs in quantum_usecs {
        match u64::try_from(usecs) {
            Ok(us) => quanta.push(Duration::from_micros(us)),
            // Negative entries are rejected like zero ones
            Err(_) => quanta.push(Duration::ZERO),
        }
    }
    status(crate::init(&quanta))
}

/// Spawn `f` at `priority`; returns the new id or -1
pub fn uthread_spawn(f: fn(), priority: i32) -> i32 {
    match crate::spawn(f, self::priority(priority)) {
        Ok(id) => clamp(id.as_u32() as u64),
        Err(_) => -1,
    }
}

pub fn uthread_change_priority(tid: i32, priority: i32) -> i32 {
    status(crate::change_priority(self::tid(tid), self::priority(priority)))
}

/// Terminate `tid`; `uthread_terminate(0)` exits the process with status 0
pub fn uthread_terminate(tid: i32) -> i32 {
    status(crate::terminate(self::tid(tid)))
}

pub fn uthread_block(tid: i32) -> i32 {
    status(crate::block(self::tid(tid)))
}

pub fn uthread_resume(tid: i32) -> i32 {
    status(crate::resume(self::tid(tid)))
}

/// Id of the running thread, -1 before init
pub fn uthread_get_tid() -> i32 {
    match crate::running_id().to_option() {
        Some(id) => clamp(id.as_u32() as u64),
        None => -1,
    }
}

pub fn uthread_get_total_quantums() -> i32 {
    clamp(crate::total_quanta())
}

/// Quanta of `tid`, or -1 for an invalid or terminated id
pub fn uthread_get_quantums(tid: i32) -> i32 {
    match crate::quanta(self::tid(tid)) {
        Ok(q) => clamp(q),
        Err(_) => -1,
    }
}
