//! Virtual-time preemption timer
//!
//! `ITIMER_VIRTUAL` counts down only while the process is consuming user CPU
//! time and delivers SIGVTALRM on expiry. Every arm is one-shot: the
//! dispatcher rearms it with the incoming thread's quantum on each switch.

use nix::errno::Errno;
use std::time::Duration;
use uthreads_core::constants::MICROS_PER_SEC;
use uthreads_core::error::SystemError;

/// Handle on the process-wide virtual interval timer
#[derive(Debug, Default)]
pub struct PreemptionTimer {
    armed: Option<Duration>,
}

impl PreemptionTimer {
    pub const fn new() -> Self {
        Self { armed: None }
    }

    /// Arm for one expiry after `quantum` of CPU time
    pub fn arm(&mut self, quantum: Duration) -> Result<(), SystemError> {
        set_virtual_timer(&to_itimerval(quantum))?;
        self.armed = Some(quantum);
        Ok(())
    }

    /// Cancel any pending expiry
    pub fn disarm(&mut self) -> Result<(), SystemError> {
        set_virtual_timer(&to_itimerval(Duration::ZERO))?;
        self.armed = None;
        Ok(())
    }

    /// Quantum of the last successful arm, if still armed
    #[inline]
    pub fn armed(&self) -> Option<Duration> {
        self.armed
    }
}

fn set_virtual_timer(value: &libc::itimerval) -> Result<(), SystemError> {
    let ret = unsafe { libc::setitimer(libc::ITIMER_VIRTUAL, value, std::ptr::null_mut()) };
    if ret != 0 {
        return Err(SystemError::Timer(Errno::last() as i32));
    }
    Ok(())
}

/// One-shot itimerval for `d`
///
/// A non-zero duration shorter than a microsecond rounds up to one, since an
/// all-zero value would disarm instead.
fn to_itimerval(d: Duration) -> libc::itimerval {
    let mut usecs = d.as_micros().min(i64::MAX as u128) as u64;
    if usecs == 0 && !d.is_zero() {
        usecs = 1;
    }
    libc::itimerval {
        it_interval: libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        },
        it_value: libc::timeval {
            tv_sec: (usecs / MICROS_PER_SEC) as libc::time_t,
            tv_usec: (usecs % MICROS_PER_SEC) as libc::suseconds_t,
        },
    }
}
