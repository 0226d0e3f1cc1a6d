//! Unix signal handling for SIGVTALRM preemption

use nix::errno::Errno;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};
use uthreads_core::error::SystemError;

/// Signal the preemption timer delivers
pub const PREEMPT_SIGNAL: Signal = Signal::SIGVTALRM;

#[inline]
fn mask_err(e: Errno) -> SystemError {
    SystemError::SignalMask(e as i32)
}

#[inline]
fn action_err(e: Errno) -> SystemError {
    SystemError::SignalAction(e as i32)
}

/// Set containing only the preemption signal
pub fn preempt_set() -> SigSet {
    let mut set = SigSet::empty();
    set.add(PREEMPT_SIGNAL);
    set
}

/// Block preemption on the calling thread, returning the previous mask
pub fn block_preemption() -> Result<SigSet, SystemError> {
    preempt_set().thread_swap_mask(SigmaskHow::SIG_BLOCK).map_err(mask_err)
}

/// Unblock preemption on the calling thread
pub fn unblock_preemption() -> Result<(), SystemError> {
    preempt_set().thread_unblock().map_err(mask_err)
}

/// Signal mask of the calling thread
pub fn current_mask() -> Result<SigSet, SystemError> {
    SigSet::thread_get_mask().map_err(mask_err)
}

/// Replace the calling thread's signal mask
pub fn set_mask(mask: &SigSet) -> Result<(), SystemError> {
    mask.thread_set_mask().map_err(mask_err)
}

/// Check whether preemption is currently blocked
pub fn preemption_blocked() -> Result<bool, SystemError> {
    Ok(current_mask()?.contains(PREEMPT_SIGNAL))
}

/// Drop a preemption signal that became pending while it was blocked
///
/// Called right before the timer is rearmed, so a stale expiry cannot cut
/// the next quantum short. Preemption must be blocked.
#[cfg(target_os = "linux")]
pub fn discard_pending() {
    let set = preempt_set();
    let zero = libc::timespec { tv_sec: 0, tv_nsec: 0 };
    unsafe {
        let mut info: libc::siginfo_t = std::mem::zeroed();
        // EAGAIN when nothing is pending
        libc::sigtimedwait(set.as_ref(), &mut info, &zero);
    }
}

#[cfg(not(target_os = "linux"))]
pub fn discard_pending() {}

/// Keeps preemption blocked for its lifetime
///
/// Dropping restores the mask that was in effect when the guard was created,
/// so guards nest. A guard held across a context switch is released by the
/// same logical thread once it is resumed.
#[must_use = "preemption is unblocked again as soon as the guard is dropped"]
pub struct MaskGuard {
    previous: SigSet,
}

impl MaskGuard {
    pub fn new() -> Result<Self, SystemError> {
        Ok(Self {
            previous: block_preemption()?,
        })
    }
}

impl Drop for MaskGuard {
    fn drop(&mut self) {
        if let Err(e) = set_mask(&self.previous) {
            crate::runtime::fatal(e);
        }
    }
}

/// Install `handler` for the preemption signal
///
/// The signal stays blocked while the handler runs. Returns the disposition
/// that was replaced so teardown can put it back.
pub fn install_handler(handler: extern "C" fn(libc::c_int)) -> Result<SigAction, SystemError> {
    let action = SigAction::new(SigHandler::Handler(handler), SaFlags::SA_RESTART, preempt_set());
    unsafe { signal::sigaction(PREEMPT_SIGNAL, &action) }.map_err(action_err)
}

/// Put back a disposition returned by `install_handler`
///
/// Passes through SIG_IGN first, which discards an expiry that is still
/// pending; otherwise unmasking afterwards could deliver it to a default
/// disposition and kill the process.
pub fn restore_handler(previous: &SigAction) -> Result<(), SystemError> {
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    unsafe { signal::sigaction(PREEMPT_SIGNAL, &ignore) }.map_err(action_err)?;
    unsafe { signal::sigaction(PREEMPT_SIGNAL, previous) }.map_err(action_err)?;
    Ok(())
}
