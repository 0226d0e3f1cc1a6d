//! Basic uthreads example
//!
//! Spawns a few threads at different priorities, lets them share the CPU,
//! blocks and resumes one of them, and exits through `terminate(0)`.
//!
//! # Environment Variables
//!
//! - `UTHREADS_FLUSH_EPRINT=1` - Flush debug output immediately (useful for crash debugging)
//! - `UTHREADS_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)

use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use uthreads::{kinfo, masked, ThreadId};

const WORKERS: usize = 3;

static PROGRESS: [AtomicU64; WORKERS] = [const { AtomicU64::new(0) }; WORKERS];

fn work(iters: u64) -> u64 {
    let mut x = 0u64;
    for i in 0..iters {
        x = black_box(x.wrapping_mul(6364136223846793005).wrapping_add(i));
    }
    x
}

// UTHREADS_LOG_LEVEL=debug cargo run -p uthreads-basic
fn main() {
    println!("=== uthreads Basic Example ===\n");

    // Priority 0: 10ms, 1: 20ms, 2: 40ms of CPU per dispatch
    let quanta = [
        Duration::from_millis(10),
        Duration::from_millis(20),
        Duration::from_millis(40),
    ];
    uthreads::init(&quanta).expect("init");

    let mut ids = Vec::with_capacity(WORKERS);
    for slot in 0..WORKERS {
        let id = uthreads::spawn(
            move || loop {
                work(200_000);
                PROGRESS[slot].fetch_add(1, Ordering::Relaxed);
            },
            slot,
        )
        .expect("spawn");
        println!("Spawned worker {} at priority {} (ID={})", slot, slot, id);
        ids.push(id);
    }

    while uthreads::total_quanta() < 20 {
        work(100_000);
    }

    masked(|| {
        kinfo!("blocking thread {}", ids[0]);
        uthreads::block(ids[0]).expect("block");
    });
    let frozen = PROGRESS[0].load(Ordering::Relaxed);
    let resume_at = uthreads::total_quanta() + 10;
    while uthreads::total_quanta() < resume_at {
        work(100_000);
    }
    assert_eq!(PROGRESS[0].load(Ordering::Relaxed), frozen);
    uthreads::resume(ids[0]).expect("resume");

    let done_at = uthreads::total_quanta() + 10;
    while uthreads::total_quanta() < done_at {
        work(100_000);
    }

    masked(|| {
        println!("\n{:>6} {:>9} {:>8} {:>9}", "thread", "priority", "quanta", "progress");
        println!("{:>6} {:>9} {:>8} {:>9}", 0, 0, uthreads::quanta(ThreadId::MAIN).unwrap_or(0), "-");
        for (slot, id) in ids.iter().enumerate() {
            println!(
                "{:>6} {:>9} {:>8} {:>9}",
                id,
                slot,
                uthreads::quanta(*id).unwrap_or(0),
                PROGRESS[slot].load(Ordering::Relaxed)
            );
        }
        println!("\ntotal quanta: {}", uthreads::total_quanta());
        println!("\n=== Example Complete ===");
    });

    uthreads::terminate(ThreadId::MAIN).expect("terminate");
}
