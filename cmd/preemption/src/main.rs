//! Preemption demo
//!
//! Two CPU-bound threads that never yield, plus thread 0. Each one gets the
//! slice of its priority; the tally at the end shows how the CPU was split.
//!
//! ```text
//! cargo run -p uthreads-preemption -- 5000 20000 3
//! ```
//!
//! Arguments: quantum of priority 0 and 1 in microseconds, seconds to run.

use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use uthreads::{kinfo, kwarn, masked, ThreadId};

static SPINS: [AtomicU64; 2] = [const { AtomicU64::new(0) }; 2];

fn spin(slot: usize) -> ! {
    loop {
        let mut x = 0u64;
        for i in 0..10_000u64 {
            x = black_box(x ^ i.rotate_left(7));
        }
        SPINS[slot].fetch_add(1, Ordering::Relaxed);
    }
}

fn arg(args: &[String], index: usize, default: u64) -> u64 {
    match args.get(index).map(|s| s.parse::<u64>()) {
        Some(Ok(v)) => v,
        Some(Err(_)) => {
            kwarn!("ignoring argument {:?}, using {}", args[index], default);
            default
        }
        None => default,
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let short = arg(&args, 1, 5_000);
    let long = arg(&args, 2, 20_000);
    let seconds = arg(&args, 3, 3);

    println!("=== uthreads Preemption Demo ===");
    println!("priority 0: {}us, priority 1: {}us, running {}s\n", short, long, seconds);

    if uthreads::init(&[Duration::from_micros(short), Duration::from_micros(long)]).is_err() {
        eprintln!("quanta must be positive");
        std::process::exit(2);
    }

    let fast = uthreads::spawn(|| spin(0), 0).expect("spawn");
    let slow = uthreads::spawn(|| spin(1), 1).expect("spawn");
    kinfo!("spawned {} (priority 0) and {} (priority 1)", fast, slow);

    let deadline = Instant::now() + Duration::from_secs(seconds);
    while Instant::now() < deadline {
        black_box(0u64);
    }

    masked(|| {
        let a = SPINS[0].load(Ordering::Relaxed);
        let b = SPINS[1].load(Ordering::Relaxed);
        println!("{:>6} {:>8} {:>12}", "thread", "quanta", "spins");
        for (id, spins) in [(fast, a), (slow, b)] {
            println!("{:>6} {:>8} {:>12}", id, uthreads::quanta(id).unwrap_or(0), spins);
        }
        if a > 0 {
            println!("\nspin ratio slow/fast: {:.2} (expected ~{:.2})", b as f64 / a as f64, long as f64 / short as f64);
        }
        println!("total quanta: {}", uthreads::total_quanta());
    });

    uthreads::terminate(ThreadId::MAIN).expect("terminate");
}
