//! Order-preserving parallel evaluation on a rayon pool.
//!
//! [`WorkerPool`] owns one thread pool for the lifetime of an optimizer run.
//! [`WorkerPool::map`] returns results in input order, catches panics per
//! item, retries failed items once on the calling thread, and reports items
//! that still fail as [`TaskFailure`]s instead of aborting the batch.
//!
//! Only one level of pool parallelism is ever active: a `map` issued from
//! inside a worker thread runs serially.

use std::panic::{self, AssertUnwindSafe};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, error, warn};

use crate::error::{Result, TaskFailure, TimetableError};

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ParallelOptions {
    /// Thread cap; `None` uses [`determine_worker_count`].
    pub max_workers: Option<usize>,
    /// Batches of at most this many items run serially.
    pub min_parallel_items: usize,
    /// Force serial execution.
    pub deterministic: bool,
}

impl Default for ParallelOptions {
    fn default() -> Self {
        Self {
            max_workers: None,
            min_parallel_items: 4,
            deterministic: false,
        }
    }
}

impl ParallelOptions {
    pub fn with_max_workers(mut self, n: usize) -> Self {
        self.max_workers = Some(n);
        self
    }

    pub fn with_min_parallel_items(mut self, n: usize) -> Self {
        self.min_parallel_items = n;
        self
    }

    pub fn with_deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = deterministic;
        self
    }

    /// Serial execution regardless of batch size.
    pub fn serial() -> Self {
        Self::default().with_deterministic(true)
    }

    /// Threads the pool would use.
    pub fn worker_count(&self) -> usize {
        self.max_workers.unwrap_or_else(determine_worker_count).max(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == Some(0) {
            return Err(TimetableError::config("max_workers must be at least 1"));
        }
        Ok(())
    }
}

/// Worker count for a machine with `cores` logical cores.
///
/// Leaves headroom for the orchestrating thread: ≤ 2 cores → 1,
/// ≤ 4 → `cores - 1`, otherwise `cores - 2`.
pub fn worker_count_for(cores: usize) -> usize {
    match cores {
        0..=2 => 1,
        3..=4 => cores - 1,
        _ => cores - 2,
    }
}

/// Worker count for this machine.
pub fn determine_worker_count() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    worker_count_for(cores)
}

/// Whether the current thread belongs to a rayon pool.
pub fn in_worker_thread() -> bool {
    rayon::current_thread_index().is_some()
}

/// A reusable evaluation pool.
pub struct WorkerPool {
    pool: Option<ThreadPool>,
    options: ParallelOptions,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.pool.as_ref().map(|p| p.current_num_threads()))
            .field("options", &self.options)
            .finish()
    }
}

impl WorkerPool {
    /// Builds a pool for `options`.
    ///
    /// Single-worker and deterministic options never start threads. A pool
    /// that fails to build is logged and replaced by serial execution.
    pub fn new(options: ParallelOptions) -> Self {
        let workers = options.worker_count();
        if options.deterministic || workers <= 1 {
            return Self {
                pool: None,
                options,
            };
        }

        let pool = match ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("timetable-worker-{i}"))
            .build()
        {
            Ok(pool) => {
                debug!(workers, "worker pool started");
                Some(pool)
            }
            Err(e) => {
                warn!(error = %e, "failed to start worker pool, evaluating serially");
                None
            }
        };
        Self { pool, options }
    }

    /// A pool that always runs on the calling thread.
    pub fn serial() -> Self {
        Self::new(ParallelOptions::serial())
    }

    pub fn options(&self) -> &ParallelOptions {
        &self.options
    }

    /// Whether batches larger than the threshold will use threads.
    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    fn runs_serially(&self, len: usize) -> bool {
        len <= 1
            || len <= self.options.min_parallel_items
            || self.pool.is_none()
            || in_worker_thread()
    }

    /// Applies `f` to every item, returning results in input order.
    pub fn map<T, U, F>(&self, items: &[T], f: F) -> Vec<std::result::Result<U, TaskFailure>>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> U + Sync,
    {
        let mut results: Vec<std::result::Result<U, TaskFailure>> = match &self.pool {
            Some(pool) if !self.runs_serially(items.len()) => pool.install(|| {
                items
                    .par_iter()
                    .enumerate()
                    .map(|(index, item)| run_guarded(index, item, &f))
                    .collect()
            }),
            _ => items
                .iter()
                .enumerate()
                .map(|(index, item)| run_guarded(index, item, &f))
                .collect(),
        };

        for (index, slot) in results.iter_mut().enumerate() {
            if let Err(failure) = slot {
                warn!(index, message = %failure.message, "task failed, retrying serially");
                *slot = run_guarded(index, &items[index], &f);
                if let Err(failure) = slot {
                    error!(index, message = %failure.message, "task failed after retry");
                }
            }
        }
        results
    }
}

/// One-shot [`WorkerPool::map`] with a temporary pool.
pub fn parallel_map<T, U, F>(
    f: F,
    items: &[T],
    options: &ParallelOptions,
) -> Vec<std::result::Result<U, TaskFailure>>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync,
{
    let serial = options.deterministic
        || options.max_workers == Some(1)
        || items.len() <= options.min_parallel_items
        || in_worker_thread();
    let pool = if serial {
        WorkerPool::serial()
    } else {
        WorkerPool::new(options.clone())
    };
    pool.map(items, f)
}

fn run_guarded<T, U, F>(index: usize, item: &T, f: &F) -> std::result::Result<U, TaskFailure>
where
    F: Fn(&T) -> U,
{
    panic::catch_unwind(AssertUnwindSafe(|| f(item))).map_err(|payload| TaskFailure {
        index,
        message: panic_message(payload.as_ref()),
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn pool() -> WorkerPool {
        WorkerPool::new(
            ParallelOptions::default()
                .with_max_workers(4)
                .with_min_parallel_items(4),
        )
    }

    #[test]
    fn test_worker_count_heuristic() {
        assert_eq!(worker_count_for(1), 1);
        assert_eq!(worker_count_for(2), 1);
        assert_eq!(worker_count_for(3), 2);
        assert_eq!(worker_count_for(4), 3);
        assert_eq!(worker_count_for(8), 6);
        assert!(determine_worker_count() >= 1);
    }

    #[test]
    fn test_order_preserved_under_shuffled_completion() {
        let items: Vec<u64> = (0..10).collect();
        let results = pool().map(&items, |&i| {
            // Early items finish last.
            std::thread::sleep(Duration::from_millis(2 * (10 - i)));
            i * 10
        });
        let values: Vec<u64> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, (0..10).map(|i| i * 10).collect::<Vec<_>>());
    }

    #[test]
    fn test_parallel_map_matches_serial() {
        let items: Vec<i32> = (0..50).collect();
        let options = ParallelOptions::default().with_max_workers(3);
        let parallel: Vec<i32> = parallel_map(|x| x * x, &items, &options)
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        let serial: Vec<i32> = items.iter().map(|x| x * x).collect();
        assert_eq!(parallel, serial);
    }

    #[test]
    fn test_persistent_panic_reported_with_index() {
        let items: Vec<usize> = (0..8).collect();
        let results = pool().map(&items, |&i| {
            if i == 3 {
                panic!("bad item");
            }
            i
        });
        assert_eq!(results.len(), 8);
        let failure = results[3].as_ref().unwrap_err();
        assert_eq!(failure.index, 3);
        assert!(failure.message.contains("bad item"));
        assert!(results.iter().enumerate().all(|(i, r)| i == 3 || r.is_ok()));
    }

    #[test]
    fn test_transient_failure_recovers_on_retry() {
        let calls = AtomicUsize::new(0);
        let items = [7usize];
        let results = WorkerPool::serial().map(&items, |&x| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first attempt");
            }
            x
        });
        assert_eq!(results[0], Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_pool_starts_only_when_threads_allowed() {
        assert!(pool().is_parallel());
        assert!(!WorkerPool::serial().is_parallel());
        assert!(!WorkerPool::new(ParallelOptions::default().with_max_workers(1)).is_parallel());
        let deterministic = ParallelOptions::default()
            .with_max_workers(4)
            .with_deterministic(true);
        assert!(!WorkerPool::new(deterministic).is_parallel());
    }

    #[test]
    fn test_deterministic_runs_on_caller() {
        let caller = std::thread::current().id();
        let items: Vec<u8> = (0..20).collect();
        let options = ParallelOptions::default()
            .with_max_workers(4)
            .with_deterministic(true);
        let threads = parallel_map(|_| std::thread::current().id(), &items, &options);
        assert!(threads.into_iter().all(|t| t == Ok(caller)));
    }

    #[test]
    fn test_nested_map_runs_serially() {
        let outer = pool();
        let items: Vec<usize> = (0..6).collect();
        let results = outer.map(&items, |_| {
            let inner_items: Vec<usize> = (0..10).collect();
            let me = std::thread::current().id();
            pool()
                .map(&inner_items, |_| std::thread::current().id())
                .into_iter()
                .all(|t| t == Ok(me))
        });
        assert!(results.into_iter().all(|r| r == Ok(true)));
    }

    #[test]
    fn test_small_batches_stay_serial() {
        let caller = std::thread::current().id();
        let items = [1, 2, 3];
        let results = pool().map(&items, |_| std::thread::current().id());
        assert!(results.into_iter().all(|t| t == Ok(caller)));
    }

    #[test]
    fn test_empty_input() {
        let items: Vec<u32> = Vec::new();
        assert!(pool().map(&items, |x| *x).is_empty());
    }
}
