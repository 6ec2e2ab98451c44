//! Persistent worker pool with dynamically partitioned jobs.
//!
//! # Overview
//! The pool is created once per analysis. Each pass of the engine is a
//! [`JobKind`] over the job indices `0..jobs`. Dispatching broadcasts the
//! pass to every worker; workers then pull indices from one shared
//! [`JobQueue`] until it runs dry, so cheap and expensive jobs balance out.
//! A dispatch returns only after every worker has finished, which makes it a
//! full barrier between passes.
//!
//! ```text
//!   master ──dispatch(kind)──► worker 0 ─┐
//!                         ├──► worker 1 ─┼─ pull from JobQueue until empty
//!                         └──► worker n ─┘
//!   master ◄──────── all workers done (barrier)
//! ```

use std::sync::{Mutex, OnceLock, PoisonError};

use log::debug;

use crate::bitset::Bitset;
use crate::error::Result;

/// The passes run through the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobKind {
    /// One job per profile element: find the dropsets it takes part in.
    EventDiscovery,
    /// One job per dropset: combine its prime events into complex events.
    EventCombination,
    /// One job per dropset: score the consensus without its taxa.
    MreScoring,
}

/// Shared counter handing out each job index exactly once.
///
/// Indices not set in `eligible` are skipped while the lock is held.
pub struct JobQueue<'a> {
    next: Mutex<usize>,
    total: usize,
    eligible: Option<&'a Bitset>,
}

impl<'a> JobQueue<'a> {
    pub fn new(total: usize, eligible: Option<&'a Bitset>) -> Self {
        JobQueue {
            next: Mutex::new(0),
            total,
            eligible,
        }
    }

    /// The next unprocessed eligible job, or `None` once all are handed out.
    pub fn next_job(&self) -> Option<usize> {
        let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        while *next < self.total {
            let job = *next;
            *next += 1;
            if self.eligible.is_none_or(|e| e.test(job)) {
                return Some(job);
            }
        }
        None
    }
}

/// Jobs processed by each worker during one dispatch.
#[derive(Clone, Debug)]
pub struct DispatchReport {
    pub kind: JobKind,
    pub per_worker: Vec<usize>,
}

impl DispatchReport {
    pub fn processed(&self) -> usize {
        self.per_worker.iter().sum()
    }
}

pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// Starts `threads` workers, optionally pinning worker `i` to core `i`.
    pub fn new(threads: usize, pin_threads: bool) -> Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("dropset-worker-{i}"));
        if pin_threads {
            builder = builder.start_handler(pin_to_core);
        }
        let pool = builder.build()?;
        debug!("started {} worker threads", pool.current_num_threads());
        Ok(WorkerPool { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `work` once for every eligible job in `0..jobs`.
    ///
    /// Returns after all workers are done.
    pub fn dispatch<F>(
        &self,
        kind: JobKind,
        jobs: usize,
        eligible: Option<&Bitset>,
        work: F,
    ) -> DispatchReport
    where
        F: Fn(usize) + Sync,
    {
        let queue = JobQueue::new(jobs, eligible);
        let per_worker = self.pool.broadcast(|ctx| {
            let mut done = 0;
            while let Some(job) = queue.next_job() {
                work(job);
                done += 1;
            }
            debug!("{kind:?}: worker {} processed {done} jobs", ctx.index());
            done
        });
        let report = DispatchReport { kind, per_worker };
        debug!("{kind:?}: {} of {jobs} jobs processed", report.processed());
        report
    }

    /// Runs `work` for every job in `0..jobs` and collects the results by index.
    ///
    /// # Panics
    /// If a job index is handed out twice or never.
    pub fn map_jobs<T, F>(&self, kind: JobKind, jobs: usize, work: F) -> Vec<T>
    where
        T: Send + Sync,
        F: Fn(usize) -> T + Sync,
    {
        let slots: Vec<OnceLock<T>> = (0..jobs).map(|_| OnceLock::new()).collect();
        self.dispatch(kind, jobs, None, |job| {
            let stored = slots[job].set(work(job)).is_ok();
            assert!(stored, "{kind:?}: job {job} processed twice");
        });
        slots
            .into_iter()
            .enumerate()
            .map(|(job, slot)| {
                slot.into_inner()
                    .unwrap_or_else(|| panic!("{kind:?}: job {job} never processed"))
            })
            .collect()
    }
}

#[cfg(target_os = "linux")]
fn pin_to_core(index: usize) {
    let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
    let core = index % cores;
    // SAFETY: cpu_set_t is a plain bit mask, all zeroes is the empty set, and
    // pid 0 addresses the calling thread.
    let pinned = unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(core, &mut set);
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) == 0
    };
    if pinned {
        debug!("worker {index} pinned to core {core}");
    } else {
        debug!("worker {index} left unpinned");
    }
}

#[cfg(not(target_os = "linux"))]
fn pin_to_core(index: usize) {
    debug!("thread pinning unsupported, worker {index} left unpinned");
}
