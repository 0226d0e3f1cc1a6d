//! Architecture-specific context capture/restore
//!
//! Each architecture exposes the same four items:
//!
//! - `Registers` - callee-saved state plus stack pointer and resume point
//! - `capture(regs)` - records the caller's resumption point, returns
//!   [`CAPTURED`] now and [`RESUMED`] when a later `restore` lands there
//! - `restore(regs)` - jumps to a captured or freshly initialized context,
//!   never returns
//! - `init_context(regs, stack_top, entry)` - prepares a context that starts
//!   `entry` on an empty stack
//!
//! The function that calls `capture` must not return before the matching
//! `restore` has happened, otherwise the frame `restore` lands in is gone.

/// `capture` returned for the first time
pub const CAPTURED: u32 = 0;

/// `capture` returned because a `restore` jumped back to it
pub const RESUMED: u32 = 1;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub mod x86_64;
    } else if #[cfg(target_arch = "aarch64")] {
        pub mod aarch64;
    }
}
