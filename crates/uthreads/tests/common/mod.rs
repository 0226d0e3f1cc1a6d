//! Helpers shared by the integration binaries
//!
//! The waits burn CPU instead of sleeping: the preemption timer only
//! advances while the process consumes user time, and a syscall-heavy loop
//! would barely move it.

#![allow(dead_code)]

use std::hint::black_box;
use std::time::{Duration, Instant};

/// Wall-clock limit for any single wait
pub const WAIT_LIMIT: Duration = Duration::from_secs(20);

/// Pure user-mode work
#[inline(never)]
pub fn burn(iters: u64) -> u64 {
    let mut x = 0u64;
    for i in 0..iters {
        x = black_box(x.wrapping_mul(31).wrapping_add(i));
    }
    x
}

/// Spin until `cond` holds; panics after [`WAIT_LIMIT`]
pub fn spin_until(what: &str, mut cond: impl FnMut() -> bool) {
    let start = Instant::now();
    while !cond() {
        burn(50_000);
        if start.elapsed() > WAIT_LIMIT {
            panic!("timed out waiting for {}", what);
        }
    }
}

/// Keep the CPU busy for about `d` of wall time
pub fn spin_for(d: Duration) {
    let start = Instant::now();
    while start.elapsed() < d {
        burn(50_000);
    }
}

/// Body for threads that only exist to be scheduled
pub fn busy_forever() -> ! {
    loop {
        burn(1_000_000);
    }
}
