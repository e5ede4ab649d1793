//! Handle usage statistics, for diagnosing dangling observers and the like.
//!
//! Counters are kept per thread and, with the `global` feature, for the
//! whole process.

use std::cell::Cell;
#[cfg(feature = "global")]
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats
{
    /// Accesses through an `Unset` owning handle.
    pub null_accesses: usize,

    /// `WeakHandle::lock` calls whose target was already gone.
    pub failed_locks: usize,

    /// Weak dispatches that found no live target and did not run.
    pub declined_invocations: usize,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Event
{
    NullAccess,
    FailedLock,
    DeclinedInvocation,
}

impl Stats
{
    fn count(&mut self, event: Event)
    {
        match event {
            Event::NullAccess => self.null_accesses += 1,
            Event::FailedLock => self.failed_locks += 1,
            Event::DeclinedInvocation => self.declined_invocations += 1,
        }
    }

    pub fn total(&self) -> usize
    {
        self.null_accesses + self.failed_locks + self.declined_invocations
    }
}

thread_local! {
    static LOCAL_STATS: Cell<Stats> = Cell::new(Stats::default());
}

/// Process-wide counters. Relaxed increments only, so recording never
/// blocks, whichever family the failing handle belongs to.
#[cfg(feature = "global")]
struct GlobalStats
{
    null_accesses: AtomicUsize,
    failed_locks: AtomicUsize,
    declined_invocations: AtomicUsize,
}

#[cfg(feature = "global")]
impl GlobalStats
{
    fn count(&self, event: Event)
    {
        let counter = match event {
            Event::NullAccess => &self.null_accesses,
            Event::FailedLock => &self.failed_locks,
            Event::DeclinedInvocation => &self.declined_invocations,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> Stats
    {
        Stats {
            null_accesses: self.null_accesses.load(Ordering::Relaxed),
            failed_locks: self.failed_locks.load(Ordering::Relaxed),
            declined_invocations: self.declined_invocations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(feature = "global")]
static GLOBAL_STATS: GlobalStats = GlobalStats {
    null_accesses: AtomicUsize::new(0),
    failed_locks: AtomicUsize::new(0),
    declined_invocations: AtomicUsize::new(0),
};

pub(crate) fn record(event: Event)
{
    // a handle touched during thread teardown has nowhere to report to
    let _ = LOCAL_STATS.try_with(|cell| {
        let mut stats = cell.get();
        stats.count(event);
        cell.set(stats);
    });

    #[cfg(feature = "global")]
    GLOBAL_STATS.count(event);
}

pub fn thread_local_stats() -> Stats { LOCAL_STATS.with(Cell::get) }

#[cfg(feature = "global")]
pub fn global_stats() -> Stats { GLOBAL_STATS.snapshot() }
