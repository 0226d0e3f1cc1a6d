//! Signal handling for preemption
//!
//! SIGVTALRM from the virtual interval timer drives preemption. Masking it is
//! the only synchronization the scheduler needs: the handler is the
//! dispatcher itself, and there is no other flow of control to race with.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::*;
    }
}
