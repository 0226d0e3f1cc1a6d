//! Thread table lifecycle: capacity, slot reuse, termination paths
//!
//! A thread that terminates itself never comes back, a thread whose body
//! returns or panics is terminated for it, and terminated ids are reused
//! lowest first.

mod common;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use common::{busy_forever, spin_until};
use uthreads::{masked, RuntimeConfig, ThreadId, UsageError};

static BEFORE_EXIT: AtomicBool = AtomicBool::new(false);
static AFTER_EXIT: AtomicBool = AtomicBool::new(false);
static RETURNED: AtomicU32 = AtomicU32::new(0);
static PANICKING: AtomicBool = AtomicBool::new(false);

fn is_gone(id: ThreadId) -> bool {
    masked(|| matches!(uthreads::quanta(id), Err(UsageError::ThreadTerminated(_))))
}

fn main() {
    let config = RuntimeConfig::new().max_threads(3).stack_size(64 * 1024);
    uthreads::init_with_config(config, &[Duration::from_millis(10), Duration::from_millis(5)])
        .unwrap();
    assert_eq!(
        uthreads::init(&[Duration::from_millis(10)]),
        Err(UsageError::AlreadyInitialized)
    );

    // Capacity and reuse, with no switch in between
    masked(|| {
        assert_eq!(uthreads::spawn(|| busy_forever(), 0), Ok(ThreadId::new(1)));
        assert_eq!(uthreads::spawn(|| busy_forever(), 0), Ok(ThreadId::new(2)));
        assert_eq!(uthreads::spawn(|| busy_forever(), 0), Err(UsageError::MaxThreads(3)));
        assert_eq!(uthreads::quanta(ThreadId::new(1)), Ok(0));
        assert_eq!(
            uthreads::spawn(|| {}, 7),
            Err(UsageError::InvalidPriority { priority: 7, levels: 2 })
        );

        assert_eq!(uthreads::terminate(ThreadId::new(1)), Ok(()));
        assert_eq!(
            uthreads::terminate(ThreadId::new(1)),
            Err(UsageError::ThreadTerminated(ThreadId::new(1)))
        );
        assert_eq!(
            uthreads::terminate(ThreadId::new(9)),
            Err(UsageError::ThreadNotFound(ThreadId::new(9)))
        );
        assert_eq!(
            uthreads::quanta(ThreadId::new(1)),
            Err(UsageError::ThreadTerminated(ThreadId::new(1)))
        );
        assert_eq!(
            uthreads::change_priority(ThreadId::new(1), 0),
            Err(UsageError::ThreadTerminated(ThreadId::new(1)))
        );
    });

    // Slot 1 comes back with fresh counters; this thread exits itself
    let quitter = masked(|| {
        let id = uthreads::spawn(
            || {
                BEFORE_EXIT.store(true, Ordering::SeqCst);
                let _ = uthreads::terminate(uthreads::running_id());
                AFTER_EXIT.store(true, Ordering::SeqCst);
            },
            1,
        )
        .unwrap();
        assert_eq!(uthreads::quanta(id), Ok(0));
        assert_eq!(
            uthreads::change_priority(id, 2),
            Err(UsageError::InvalidPriority { priority: 2, levels: 2 })
        );
        assert_eq!(uthreads::change_priority(id, 0), Ok(()));
        id
    });
    assert_eq!(quitter, ThreadId::new(1));

    spin_until("the self-terminating thread", || is_gone(quitter));
    assert!(BEFORE_EXIT.load(Ordering::SeqCst));
    assert!(!AFTER_EXIT.load(Ordering::SeqCst));

    // A body that returns terminates its thread and frees the slot
    let returner = uthreads::spawn(|| {
        RETURNED.fetch_add(1, Ordering::SeqCst);
    }, 0)
    .unwrap();
    assert_eq!(returner, ThreadId::new(1));
    spin_until("the returning thread", || is_gone(returner));
    assert_eq!(RETURNED.load(Ordering::SeqCst), 1);

    // So does a panic, and the library stays usable afterwards
    std::panic::set_hook(Box::new(|_| {}));
    let panicker = uthreads::spawn(|| {
        PANICKING.store(true, Ordering::SeqCst);
        panic!("deliberate");
    }, 0)
    .unwrap();
    spin_until("the panicking thread", || is_gone(panicker));
    assert!(PANICKING.load(Ordering::SeqCst));

    let again = uthreads::spawn(|| busy_forever(), 0).unwrap();
    assert_eq!(again, ThreadId::new(1));
    assert!(uthreads::quanta(ThreadId::new(2)).is_ok());

    uthreads::terminate(ThreadId::MAIN).unwrap();
    unreachable!("terminating thread 0 exits the process");
}
