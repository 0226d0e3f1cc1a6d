//! Scheduler bookkeeping
//!
//! Everything the dispatcher and the public operations mutate: the thread
//! table, the ready queue, the running thread and the quantum counters.
//! Nothing here switches stacks or touches signals, so every transition can
//! be exercised directly. Callers hold preemption masked.

use std::time::Duration;

use uthreads_core::error::{SchedResult, UsageError};
use uthreads_core::id::ThreadId;
use uthreads_core::quantum::QuantumTable;
use uthreads_core::ready_queue::ReadyQueue;
use uthreads_core::state::{Priority, ThreadState};
use uthreads_core::{kdebug, ktrace};

use crate::config::RuntimeConfig;
use crate::context::{Entry, ExecutionContext};
use crate::table::ThreadTable;

/// Whether an operation requires an immediate dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reschedule {
    /// The running thread can no longer run; dispatch now
    Now,
    /// Nothing to do until the next timer expiry
    No,
}

/// A dispatch decision: who stops, who runs next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Switch {
    pub from: ThreadId,
    pub to: ThreadId,
}

/// Scheduler state
pub struct Scheduler {
    quanta: QuantumTable,
    table: ThreadTable,
    ready: ReadyQueue,
    running: ThreadId,

    /// Dispatches that placed some thread into `Running`, bootstrap included
    total_quanta: u64,
}

impl Scheduler {
    /// Scheduler with thread 0 already running its first quantum
    pub fn new(quanta: QuantumTable, config: &RuntimeConfig, start: extern "C" fn()) -> Self {
        let mut table = ThreadTable::new(config.max_threads, config.stack_size, start);
        if let Some(main) = table.get_mut(ThreadId::MAIN) {
            main.set_state(ThreadState::Running);
        }

        Self {
            quanta,
            table,
            ready: ReadyQueue::with_capacity(config.max_threads),
            running: ThreadId::MAIN,
            total_quanta: 1,
        }
    }

    // ========================================================================
    // Public operations
    // ========================================================================

    /// Create a Ready thread at the back of the queue
    pub fn spawn(&mut self, entry: Entry, priority: Priority) -> SchedResult<ThreadId> {
        self.quanta.check(priority)?;
        let id = self.table.spawn(entry, priority)?;
        self.ready.push_back(id);
        kdebug!("spawned thread {} at {}", id, priority);
        Ok(id)
    }

    /// Takes effect the next time the thread is dispatched
    pub fn change_priority(&mut self, id: ThreadId, priority: Priority) -> Result<(), UsageError> {
        self.quanta.check(priority)?;
        self.table.live_mut(id)?.set_priority(priority);
        Ok(())
    }

    /// Terminate a thread other than 0
    ///
    /// Terminating thread 0 is a library shutdown and is handled by the
    /// runtime before it gets here.
    pub fn terminate(&mut self, id: ThreadId) -> Result<Reschedule, UsageError> {
        debug_assert!(!id.is_main(), "terminate(0) is a shutdown, not a transition");
        let ctx = self.table.live_mut(id)?;
        let state = ctx.state();
        ctx.terminate();

        match state {
            ThreadState::Running => return Ok(Reschedule::Now),
            ThreadState::Ready => {
                self.ready.remove(id);
            }
            ThreadState::Blocked => {}
        }
        kdebug!("terminated thread {}", id);
        Ok(Reschedule::No)
    }

    /// Block a thread; blocking a Blocked thread succeeds without effect
    pub fn block(&mut self, id: ThreadId) -> Result<Reschedule, UsageError> {
        if id.is_main() {
            // Still report unknown ids as such
            self.table.live(id)?;
            return Err(UsageError::BlockMainThread);
        }
        let ctx = self.table.live_mut(id)?;
        let state = ctx.state();
        ctx.set_state(ThreadState::Blocked);

        match state {
            ThreadState::Running => Ok(Reschedule::Now),
            ThreadState::Ready => {
                self.ready.remove(id);
                Ok(Reschedule::No)
            }
            ThreadState::Blocked => Ok(Reschedule::No),
        }
    }

    /// Make a Blocked thread Ready; any other live thread is left alone
    pub fn resume(&mut self, id: ThreadId) -> Result<(), UsageError> {
        let ctx = self.table.live_mut(id)?;
        if ctx.state() == ThreadState::Blocked {
            ctx.set_state(ThreadState::Ready);
            self.ready.push_back(id);
        }
        Ok(())
    }

    #[inline]
    pub fn running_id(&self) -> ThreadId {
        self.running
    }

    #[inline]
    pub fn total_quanta(&self) -> u64 {
        self.total_quanta
    }

    pub fn quanta(&self, id: ThreadId) -> Result<u64, UsageError> {
        Ok(self.table.live(id)?.quanta())
    }

    // ========================================================================
    // Dispatcher steps
    // ========================================================================

    /// Pick the next thread and make it Running
    ///
    /// `None` when the queue is empty: the running thread keeps the CPU and
    /// no counter moves. The outgoing thread is left as it is until
    /// [`Scheduler::requeue`].
    pub fn select_next(&mut self) -> Option<Switch> {
        let to = self.ready.pop_front()?;
        let from = self.running;

        match self.table.get_mut(to) {
            Some(ctx) => ctx.set_state(ThreadState::Running),
            None => unreachable!("queued thread {} has no slot", to),
        }
        self.total_quanta += 1;
        self.running = to;

        ktrace!("dispatch {} -> {} (total {})", from, to, self.total_quanta);
        Some(Switch { from, to })
    }

    /// Put a preempted thread back in line unless it terminated or blocked
    pub fn requeue(&mut self, id: ThreadId) {
        let Some(ctx) = self.table.get_mut(id) else {
            return;
        };
        if ctx.is_terminated() || ctx.state() == ThreadState::Blocked {
            return;
        }
        ctx.set_state(ThreadState::Ready);
        self.ready.push_back(id);
    }

    /// Quantum for a thread at its current priority
    pub fn quantum_of(&self, id: ThreadId) -> Duration {
        let priority = self
            .table
            .get(id)
            .map(ExecutionContext::priority)
            .unwrap_or(Priority::DEFAULT);
        // Every stored priority was checked against the table on the way in
        match self.quanta.quantum(priority) {
            Ok(quantum) => quantum,
            Err(e) => unreachable!("thread {} holds {}", id, e),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn table(&self) -> &ThreadTable {
        &self.table
    }

    #[inline]
    pub fn table_mut(&mut self) -> &mut ThreadTable {
        &mut self.table
    }

    #[inline]
    pub fn ready_queue(&self) -> &ReadyQueue {
        &self.ready
    }

    /// Context of the running thread
    #[inline]
    pub fn running_context(&self) -> Option<&ExecutionContext> {
        self.table.get(self.running)
    }

    #[inline]
    pub fn running_context_mut(&mut self) -> Option<&mut ExecutionContext> {
        self.table.get_mut(self.running)
    }

    /// Give up ownership of every context
    pub fn into_table(self) -> ThreadTable {
        self.table
    }

    /// Check the bookkeeping invariants
    ///
    /// Exactly one live thread is Running and it is `running_id`; the live
    /// Ready threads are exactly the queued ones.
    pub fn check_invariants(&self) -> Result<(), String> {
        let live: Vec<&ExecutionContext> =
            self.table.iter().filter(|c| !c.is_terminated()).collect();

        let running: Vec<ThreadId> = live
            .iter()
            .filter(|c| c.state() == ThreadState::Running)
            .map(|c| c.id())
            .collect();
        if running != [self.running] {
            return Err(format!("running threads {:?}, expected [{}]", running, self.running));
        }

        let mut ready: Vec<ThreadId> = live
            .iter()
            .filter(|c| c.state().is_runnable())
            .map(|c| c.id())
            .collect();
        let mut queued: Vec<ThreadId> = self.ready.iter().collect();
        ready.sort();
        queued.sort();
        if ready != queued {
            return Err(format!("ready threads {:?} but queue holds {:?}", ready, queued));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("running", &self.running)
            .field("total_quanta", &self.total_quanta)
            .field("ready", &self.ready)
            .field("table", &self.table)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uthreads_core::error::SchedError;

    extern "C" fn never_started() {}

    fn scheduler(usecs: &[u64], max_threads: usize) -> Scheduler {
        let config = RuntimeConfig::new().max_threads(max_threads).stack_size(16 * 1024);
        Scheduler::new(QuantumTable::from_micros(usecs).unwrap(), &config, never_started)
    }

    fn spawn(s: &mut Scheduler, priority: usize) -> SchedResult<ThreadId> {
        s.spawn(Box::new(|| {}), Priority::new(priority))
    }

    /// What the dispatcher does around a switch, minus the switch
    fn expire(s: &mut Scheduler) -> Option<Switch> {
        let switch = s.select_next()?;
        s.requeue(switch.from);
        s.check_invariants().unwrap();
        Some(switch)
    }

    fn tid(n: u32) -> ThreadId {
        ThreadId::new(n)
    }

    #[test]
    fn test_bootstrap() {
        let s = scheduler(&[1000], 4);
        assert_eq!(s.running_id(), ThreadId::MAIN);
        assert_eq!(s.total_quanta(), 1);
        assert_eq!(s.quanta(ThreadId::MAIN), Ok(1));
        assert!(s.ready_queue().is_empty());
        s.check_invariants().unwrap();
    }

    #[test]
    fn test_two_expiries_alternate() {
        let mut s = scheduler(&[100_000, 200_000], 4);
        assert_eq!(spawn(&mut s, 1), Ok(tid(1)));

        assert_eq!(expire(&mut s), Some(Switch { from: tid(0), to: tid(1) }));
        assert_eq!(s.quantum_of(s.running_id()), Duration::from_micros(200_000));
        assert_eq!(expire(&mut s), Some(Switch { from: tid(1), to: tid(0) }));

        assert_eq!(s.quanta(tid(0)), Ok(2));
        assert_eq!(s.quanta(tid(1)), Ok(1));
        assert_eq!(s.total_quanta(), 3);
    }

    #[test]
    fn test_empty_queue_keeps_running_thread() {
        let mut s = scheduler(&[1000], 4);
        assert_eq!(s.select_next(), None);
        assert_eq!(s.running_id(), ThreadId::MAIN);
        assert_eq!(s.total_quanta(), 1);
        assert_eq!(s.quanta(ThreadId::MAIN), Ok(1));
    }

    #[test]
    fn test_round_robin_ignores_priority() {
        let mut s = scheduler(&[10, 20, 30], 8);
        spawn(&mut s, 2).unwrap();
        spawn(&mut s, 0).unwrap();
        spawn(&mut s, 1).unwrap();

        let order: Vec<u32> = (0..8).map(|_| expire(&mut s).unwrap().to.as_u32()).collect();
        assert_eq!(order, vec![1, 2, 3, 0, 1, 2, 3, 0]);

        let sum: u64 = (0..4).map(|i| s.quanta(tid(i)).unwrap()).sum();
        assert_eq!(sum, s.total_quanta());
    }

    #[test]
    fn test_spawn_validates_priority_first() {
        let mut s = scheduler(&[10, 20], 2);
        assert_eq!(
            spawn(&mut s, 2),
            Err(SchedError::Usage(UsageError::InvalidPriority { priority: 2, levels: 2 }))
        );
        assert_eq!(s.table().len(), 1);
        assert!(s.ready_queue().is_empty());
    }

    #[test]
    fn test_capacity_then_reuse() {
        let mut s = scheduler(&[10], 3);
        spawn(&mut s, 0).unwrap();
        spawn(&mut s, 0).unwrap();
        expire(&mut s); // thread 1 runs once
        assert_eq!(
            spawn(&mut s, 0),
            Err(SchedError::Usage(UsageError::MaxThreads(3)))
        );
        assert_eq!(s.ready_queue().len(), 2);

        // Thread 1 is running; terminating it needs a dispatch
        assert_eq!(s.terminate(tid(1)), Ok(Reschedule::Now));
        expire(&mut s);
        assert_ne!(s.running_id(), tid(1));

        assert_eq!(spawn(&mut s, 0), Ok(tid(1)));
        assert_eq!(s.quanta(tid(1)), Ok(0));
        s.check_invariants().unwrap();
    }

    #[test]
    fn test_terminate_ready_thread() {
        let mut s = scheduler(&[10], 4);
        spawn(&mut s, 0).unwrap();
        spawn(&mut s, 0).unwrap();
        assert_eq!(s.terminate(tid(1)), Ok(Reschedule::No));
        assert!(!s.ready_queue().contains(tid(1)));
        assert_eq!(s.quanta(tid(1)), Err(UsageError::ThreadTerminated(tid(1))));
        assert_eq!(s.terminate(tid(1)), Err(UsageError::ThreadTerminated(tid(1))));
        assert_eq!(s.terminate(tid(7)), Err(UsageError::ThreadNotFound(tid(7))));
        s.check_invariants().unwrap();

        assert_eq!(expire(&mut s).unwrap().to, tid(2));
    }

    #[test]
    fn test_block_rules() {
        let mut s = scheduler(&[10], 4);
        spawn(&mut s, 0).unwrap();

        assert_eq!(s.block(ThreadId::MAIN), Err(UsageError::BlockMainThread));
        assert_eq!(s.block(tid(5)), Err(UsageError::ThreadNotFound(tid(5))));

        assert_eq!(s.block(tid(1)), Ok(Reschedule::No));
        assert!(s.ready_queue().is_empty());
        assert_eq!(s.block(tid(1)), Ok(Reschedule::No));
        s.check_invariants().unwrap();

        // Blocked threads are never dispatched
        assert_eq!(s.select_next(), None);

        assert_eq!(s.resume(tid(1)), Ok(()));
        assert_eq!(s.resume(tid(1)), Ok(()));
        assert_eq!(s.ready_queue().len(), 1);
        assert_eq!(s.resume(tid(3)), Err(UsageError::ThreadNotFound(tid(3))));
        s.check_invariants().unwrap();
    }

    #[test]
    fn test_block_running_thread_skips_requeue() {
        let mut s = scheduler(&[10], 4);
        spawn(&mut s, 0).unwrap();
        expire(&mut s);
        assert_eq!(s.running_id(), tid(1));

        assert_eq!(s.block(tid(1)), Ok(Reschedule::Now));
        expire(&mut s);
        assert_eq!(s.running_id(), ThreadId::MAIN);
        assert!(s.ready_queue().is_empty());

        // Running thread 0 is a no-op resume target
        assert_eq!(s.resume(ThreadId::MAIN), Ok(()));
        assert!(s.ready_queue().is_empty());
    }

    #[test]
    fn test_change_priority_deferred() {
        let mut s = scheduler(&[10, 20], 4);
        assert_eq!(s.change_priority(ThreadId::MAIN, Priority::new(1)), Ok(()));
        assert_eq!(s.quantum_of(ThreadId::MAIN), Duration::from_micros(20));
        assert_eq!(
            s.change_priority(ThreadId::MAIN, Priority::new(2)),
            Err(UsageError::InvalidPriority { priority: 2, levels: 2 })
        );
        assert_eq!(
            s.change_priority(tid(1), Priority::new(0)),
            Err(UsageError::ThreadNotFound(tid(1)))
        );
    }
}
