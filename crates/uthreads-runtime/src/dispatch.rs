//! The dispatcher
//!
//! One scheduling decision and, when another thread is ready, one context
//! switch. Entered from the SIGVTALRM handler on quantum expiry, or directly
//! when the running thread terminates or blocks itself. Either way the
//! preemption signal is masked for the whole call.
//!
//! ```text
//!   thread A                      dispatch()                     thread B
//!   ────────                      ──────────                     ────────
//!   SIGVTALRM ──► select_next: B Running, total += 1
//!                 capture(A) == CAPTURED
//!                 requeue(A), rearm timer for B
//!                 restore(B) ─────────────────────────────────► capture(B) == RESUMED
//!                                                                 reinstate B's mask
//!                                                                 return
//! ```
//!
//! A capture that reports `RESUMED` means the switch that stopped this
//! thread was finished long ago by some other thread; the only thing left to
//! do is return.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use nix::errno::Errno;
use uthreads_core::kprint;
use uthreads_core::{kerror, ktrace};

use crate::arch::RESUMED;
use crate::current_arch;
use crate::runtime::{self, fatal};
use crate::signal;

/// SIGVTALRM handler
///
/// The signal stays blocked while the handler runs. A handler that switches
/// away only returns once its thread is dispatched again, and the kernel
/// then restores that thread's pre-signal mask.
pub(crate) extern "C" fn on_preempt(_sig: libc::c_int) {
    let errno = Errno::last_raw();
    unsafe { dispatch() };
    Errno::set_raw(errno);
}

/// Run one dispatch
///
/// # Safety
///
/// Preemption must be masked, the caller must be running on the stack of
/// the thread the scheduler considers running, and no reference obtained
/// from `runtime::current` may be alive.
pub(crate) unsafe fn dispatch() {
    let Some(rt) = runtime::current() else {
        return;
    };

    let Some(switch) = rt.scheduler_mut().select_next() else {
        // Nobody else is ready: keep running with a fresh quantum
        let running = rt.scheduler().running_id();
        signal::discard_pending();
        if let Err(e) = rt.arm_for(running) {
            fatal(e);
        }
        return;
    };

    let mask = match signal::current_mask() {
        Ok(mask) => mask,
        Err(e) => fatal(e),
    };
    let outgoing = match rt.scheduler_mut().table_mut().get_mut(switch.from) {
        Some(ctx) => ctx.suspend_point(mask),
        None => unreachable!("running thread {} has no slot", switch.from),
    };

    if current_arch::capture(outgoing) == RESUMED {
        land();
        return;
    }

    let Some(rt) = runtime::current() else {
        return;
    };
    rt.scheduler_mut().requeue(switch.from);

    signal::discard_pending();
    if let Err(e) = rt.arm_for(switch.to) {
        fatal(e);
    }

    let incoming = match rt.scheduler().table().get(switch.to) {
        Some(ctx) => ctx.resume_point(),
        None => unreachable!("dispatched thread {} has no slot", switch.to),
    };
    kprint::set_thread_id(switch.to.as_u32());
    current_arch::restore(incoming)
}

/// Reinstate the running thread's saved signal mask after a switch
///
/// # Safety
///
/// Same as [`dispatch`].
unsafe fn land() {
    let mask = runtime::current()
        .and_then(|rt| rt.scheduler().running_context())
        .map(|ctx| ctx.saved_mask());
    if let Some(mask) = mask {
        if let Err(e) = signal::set_mask(&mask) {
            fatal(e);
        }
    }
}

/// First code of every spawned thread, on its own fresh stack
///
/// Arrives here from `dispatch`, still masked. Takes the body out of the
/// running context, opens up preemption, runs the body and terminates the
/// thread when it returns or panics.
pub(crate) extern "C" fn thread_main() {
    let entry = unsafe { runtime::current() }
        .and_then(|rt| rt.scheduler_mut().running_context_mut())
        .and_then(|ctx| ctx.take_entry());
    if entry.is_some() {
        ktrace!("thread started");
    }
    unsafe { land() };

    if let Some(entry) = entry {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(entry)) {
            let _guard = runtime::mask();
            kerror!("thread panicked: {}", panic_message(payload.as_ref()));
            drop(payload);
        }
    }

    runtime::finish_running_thread()
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
