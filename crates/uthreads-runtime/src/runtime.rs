//! Process-wide runtime
//!
//! One `Runtime` per process holds the scheduler, the preemption timer and
//! the signal disposition it replaced. It lives in a global cell because the
//! signal handler has to reach it. Every access happens with SIGVTALRM
//! masked, which is what makes the unsynchronized cell sound: the only other
//! flow of control that could touch it is that handler.
//!
//! All functions here validate before they mutate. Usage errors are logged
//! and returned; system errors are returned for the caller to hand to
//! [`fatal`].

use std::cell::UnsafeCell;
use std::time::Duration;

use nix::sys::signal::SigAction;
use uthreads_core::error::{SchedError, SchedResult, SystemError, UsageError};
use uthreads_core::id::ThreadId;
use uthreads_core::kprint::{self, LogLevel};
use uthreads_core::quantum::QuantumTable;
use uthreads_core::state::Priority;
use uthreads_core::{kdebug, kerror, kinfo, kwarn};

use crate::config::RuntimeConfig;
use crate::dispatch;
use crate::scheduler::{Reschedule, Scheduler};
use crate::signal::{self, MaskGuard};
use crate::timer::PreemptionTimer;

/// Everything `init` sets up and teardown releases
pub struct Runtime {
    scheduler: Scheduler,
    timer: PreemptionTimer,

    /// Disposition of SIGVTALRM before `init`
    previous_action: SigAction,
}

impl Runtime {
    #[inline]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[inline]
    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Rearm the preemption timer with the quantum of `id`
    pub(crate) fn arm_for(&mut self, id: ThreadId) -> Result<(), SystemError> {
        let quantum = self.scheduler.quantum_of(id);
        self.timer.arm(quantum)
    }

    /// Undo `init`; the caller exits right after
    fn release(mut self) {
        if self.timer.armed().is_some() {
            if let Err(e) = self.timer.disarm() {
                kwarn!("teardown: {}", e);
            }
        }
        if let Err(e) = signal::restore_handler(&self.previous_action) {
            kwarn!("teardown: {}", e);
        }

        // Any local lives on the stack we are executing on
        let marker = 0u8;
        let sp = &marker as *const u8 as usize;
        self.scheduler.into_table().release(sp);
    }
}

struct GlobalRuntime(UnsafeCell<Option<Runtime>>);

// Single OS thread; exclusion comes from masking the preemption signal
unsafe impl Sync for GlobalRuntime {}

static RUNTIME: GlobalRuntime = GlobalRuntime(UnsafeCell::new(None));

/// The initialized runtime, if any
///
/// # Safety
///
/// Preemption must be masked and no other reference obtained from this
/// function may be used while the returned one is alive.
#[inline]
pub(crate) unsafe fn current() -> Option<&'static mut Runtime> {
    (*RUNTIME.0.get()).as_mut()
}

/// Mask preemption or die trying
pub(crate) fn mask() -> MaskGuard {
    match MaskGuard::new() {
        Ok(guard) => guard,
        Err(e) => fatal(e),
    }
}

/// Log a usage error on its way back to the caller
fn report<T>(result: SchedResult<T>) -> SchedResult<T> {
    if let Err(e) = &result {
        // System errors are logged once, by `fatal`
        if !e.is_fatal() {
            kerror!("{}", e);
        }
    }
    result
}

/// Run `op` on the runtime; the caller holds the mask
fn with_runtime<T>(op: impl FnOnce(&mut Runtime) -> SchedResult<T>) -> SchedResult<T> {
    let result = match unsafe { current() } {
        Some(rt) => op(rt),
        None => Err(UsageError::NotInitialized.into()),
    };
    report(result)
}

/// Read from the runtime without logging; `None` before `init`
fn peek<T>(read: impl FnOnce(&Runtime) -> T) -> Option<T> {
    let _guard = mask();
    unsafe { current() }.map(|rt| read(rt))
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Set up the library with thread 0 running
///
/// Installs the SIGVTALRM handler and arms the first quantum.
pub fn init(config: RuntimeConfig, quanta: &[Duration]) -> SchedResult<()> {
    // Read the environment now, never from inside the handler
    kprint::init();

    report(validate(&config, quanta)).and_then(|table| {
        let _guard = MaskGuard::new()?;
        if unsafe { current() }.is_some() {
            return report(Err(UsageError::AlreadyInitialized.into()));
        }

        if config.debug_logging {
            kprint::set_log_level(LogLevel::Debug);
            config.print();
        }

        let levels = table.levels();
        for (priority, quantum) in table.iter().enumerate() {
            kdebug!("priority {} quantum {:?}", priority, quantum);
        }
        let scheduler = Scheduler::new(table, &config, dispatch::thread_main);
        let previous_action = signal::install_handler(dispatch::on_preempt)?;

        unsafe {
            *RUNTIME.0.get() = Some(Runtime {
                scheduler,
                timer: PreemptionTimer::new(),
                previous_action,
            });
        }
        kprint::set_thread_id(ThreadId::MAIN.as_u32());

        if let Some(rt) = unsafe { current() } {
            rt.arm_for(ThreadId::MAIN)?;
        }
        kinfo!("initialized: {} priority levels, up to {} threads", levels, config.max_threads);
        Ok(())
    })
}

fn validate(config: &RuntimeConfig, quanta: &[Duration]) -> SchedResult<QuantumTable> {
    config.validate().map_err(UsageError::InvalidConfig)?;
    Ok(QuantumTable::new(quanta)?)
}

/// Check whether `init` has completed
pub fn is_initialized() -> bool {
    peek(|_| ()).is_some()
}

/// Release everything and end the process with `code`
///
/// Reached through `terminate(0)` and through [`fatal`].
pub fn shutdown(code: i32) -> ! {
    let _ = signal::block_preemption();

    let rt = unsafe { (*RUNTIME.0.get()).take() };
    if let Some(rt) = rt {
        kdebug!("shutting down, exit code {}", code);
        rt.release();
    }
    kprint::clear_thread_id();

    let _ = signal::unblock_preemption();
    std::process::exit(code)
}

/// A system primitive failed: report, tear down, exit 1
pub fn fatal(e: SystemError) -> ! {
    kerror!("{}", SchedError::System(e));
    shutdown(1)
}

// ============================================================================
// Operations
// ============================================================================

/// Spawn `f` as a Ready thread at the back of the queue
///
/// The closure is boxed with preemption masked so the allocation cannot be
/// interrupted by a switch.
pub fn spawn<F>(f: F, priority: Priority) -> SchedResult<ThreadId>
where
    F: FnOnce() + 'static,
{
    let _guard = MaskGuard::new()?;
    with_runtime(move |rt| rt.scheduler.spawn(Box::new(f), priority))
}

pub fn change_priority(id: ThreadId, priority: Priority) -> SchedResult<()> {
    let _guard = MaskGuard::new()?;
    with_runtime(|rt| Ok(rt.scheduler.change_priority(id, priority)?))
}

/// Terminate `id`
///
/// Thread 0 takes the whole process down with exit code 0. Terminating
/// the running thread switches away immediately and never returns.
pub fn terminate(id: ThreadId) -> SchedResult<()> {
    let _guard = MaskGuard::new()?;
    let reschedule = with_runtime(|rt| {
        if id.is_main() {
            return Ok(None);
        }
        Ok(Some(rt.scheduler.terminate(id)?))
    })?;

    match reschedule {
        None => shutdown(0),
        Some(Reschedule::Now) => unsafe { dispatch::dispatch() },
        Some(Reschedule::No) => {}
    }
    Ok(())
}

/// Block `id`; blocking the running thread switches away until resumed
pub fn block(id: ThreadId) -> SchedResult<()> {
    let _guard = MaskGuard::new()?;
    let reschedule = with_runtime(|rt| Ok(rt.scheduler.block(id)?))?;
    if reschedule == Reschedule::Now {
        unsafe { dispatch::dispatch() };
    }
    Ok(())
}

pub fn resume(id: ThreadId) -> SchedResult<()> {
    let _guard = MaskGuard::new()?;
    with_runtime(|rt| Ok(rt.scheduler.resume(id)?))
}

/// Id of the running thread, `ThreadId::NONE` before `init`
pub fn running_id() -> ThreadId {
    peek(|rt| rt.scheduler.running_id()).unwrap_or(ThreadId::NONE)
}

/// Dispatches since `init`, bootstrap included; 0 before `init`
pub fn total_quanta() -> u64 {
    peek(|rt| rt.scheduler.total_quanta()).unwrap_or(0)
}

pub fn quanta(id: ThreadId) -> SchedResult<u64> {
    let _guard = MaskGuard::new()?;
    with_runtime(|rt| Ok(rt.scheduler.quanta(id)?))
}

/// The running thread's body returned: terminate it
pub(crate) fn finish_running_thread() -> ! {
    let _guard = mask();
    let id = running_id();
    kdebug!("thread {} finished", id);

    if let Err(e) = terminate(id) {
        kerror!("thread {} could not exit: {}", id, e);
    }
    // A terminated thread is never restored
    kerror!("thread {} resumed after termination", id);
    std::process::abort()
}
