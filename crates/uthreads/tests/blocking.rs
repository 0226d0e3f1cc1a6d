//! Block and resume
//!
//! Blocked threads are never dispatched; resuming puts them back at the end
//! of the queue. A thread that blocks itself continues right after the call
//! once resumed.

mod common;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use common::{burn, spin_for, spin_until};
use uthreads::{masked, ThreadId, UsageError};

static WORK: AtomicU64 = AtomicU64::new(0);
static BLOCKS: AtomicU64 = AtomicU64::new(0);
static WAKEUPS: AtomicU64 = AtomicU64::new(0);

fn main() {
    uthreads::init(&[Duration::from_millis(10)]).unwrap();

    let worker = uthreads::spawn(
        || loop {
            WORK.fetch_add(1, Ordering::SeqCst);
            burn(100_000);
        },
        0,
    )
    .unwrap();

    masked(|| {
        assert_eq!(uthreads::block(worker), Ok(()));
        assert_eq!(uthreads::block(worker), Ok(()));
        assert_eq!(uthreads::block(ThreadId::MAIN), Err(UsageError::BlockMainThread));
        assert_eq!(
            uthreads::block(ThreadId::new(42)),
            Err(UsageError::ThreadNotFound(ThreadId::new(42)))
        );
        assert_eq!(
            uthreads::resume(ThreadId::new(42)),
            Err(UsageError::ThreadNotFound(ThreadId::new(42)))
        );
        // Resuming the running thread does nothing
        assert_eq!(uthreads::resume(ThreadId::MAIN), Ok(()));
    });

    // Blocked before it ever ran: it must not run now
    spin_for(Duration::from_millis(60));
    assert_eq!(WORK.load(Ordering::SeqCst), 0);
    assert_eq!(uthreads::quanta(worker), Ok(0));
    assert_eq!(uthreads::total_quanta(), 1);

    assert_eq!(uthreads::resume(worker), Ok(()));
    assert_eq!(uthreads::resume(worker), Ok(()));
    spin_until("the resumed worker", || WORK.load(Ordering::SeqCst) > 0);

    // A thread blocking itself
    let sleeper = uthreads::spawn(
        || loop {
            // Count and block without a switch in between, so thread 0 never
            // resumes a thread that has not blocked yet
            masked(|| {
                BLOCKS.fetch_add(1, Ordering::SeqCst);
                let _ = uthreads::block(uthreads::running_id());
            });
            WAKEUPS.fetch_add(1, Ordering::SeqCst);
        },
        0,
    )
    .unwrap();

    spin_until("the sleeper to block", || BLOCKS.load(Ordering::SeqCst) == 1);
    let dispatched = uthreads::quanta(sleeper).unwrap();
    spin_for(Duration::from_millis(60));
    assert_eq!(WAKEUPS.load(Ordering::SeqCst), 0);
    assert_eq!(uthreads::quanta(sleeper), Ok(dispatched));

    for round in 1..=3 {
        assert_eq!(uthreads::resume(sleeper), Ok(()));
        spin_until("the sleeper to wake and block again", || {
            BLOCKS.load(Ordering::SeqCst) == round + 1
        });
        assert_eq!(WAKEUPS.load(Ordering::SeqCst), round);
    }

    // Blocked threads can still be terminated
    assert_eq!(uthreads::terminate(sleeper), Ok(()));
    assert_eq!(
        uthreads::resume(sleeper),
        Err(UsageError::ThreadTerminated(sleeper))
    );
    assert_eq!(uthreads::terminate(worker), Ok(()));

    uthreads::terminate(ThreadId::MAIN).unwrap();
    unreachable!("terminating thread 0 exits the process");
}
