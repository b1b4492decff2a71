//! Fork/join schedulers that execute multiplication tasks.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder, Yield};

use crate::Error;

/// How long an idle joiner sleeps before checking its task again.
const IDLE_WAIT: Duration = Duration::from_millis(1);

/// Executes fork/join work on behalf of the engine.
///
/// A task is any `FnOnce() -> Result<T, Error>`. Panics raised inside a task
/// never escape the scheduler; they come back from [`Scheduler::join`] or
/// [`Scheduler::invoke_all`] as [`Error::TaskPanicked`].
pub trait Scheduler: Send + Sync {
    /// Queues `task` and returns a handle to its eventual result.
    fn submit<T, F>(&self, task: F) -> TaskHandle<T>
    where
        F: FnOnce() -> Result<T, Error> + Send + 'static,
        T: Send + 'static;

    /// Blocks until the task behind `handle` and everything it forked finished.
    fn join<T>(&self, handle: TaskHandle<T>) -> Result<T, Error>;

    /// Runs `f` over every input and returns the results in input order.
    ///
    /// Fails with the error of a failed input if any input fails.
    fn invoke_all<I, T, F>(&self, inputs: Vec<I>, f: F) -> Result<Vec<T>, Error>
    where
        I: Send,
        T: Send,
        F: Fn(I) -> Result<T, Error> + Send + Sync;

    /// Number of tasks that may run at the same time.
    fn parallelism(&self) -> usize;
}

/// Handle to a submitted task's result.
pub struct TaskHandle<T> {
    slot: Arc<Slot<T>>,
}

impl<T> TaskHandle<T> {
    fn pending() -> (Self, Arc<Slot<T>>) {
        let slot = Arc::new(Slot {
            result: Mutex::new(None),
            ready: Condvar::new(),
        });
        (
            Self {
                slot: Arc::clone(&slot),
            },
            slot,
        )
    }

    /// Returns `true` once the task has produced a result.
    pub fn is_finished(&self) -> bool {
        self.slot.lock().is_some()
    }
}

struct Slot<T> {
    result: Mutex<Option<Result<T, Error>>>,
    ready: Condvar,
}

impl<T> Slot<T> {
    // The lock is never held across user code, so poisoning carries no
    // broken invariant.
    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Result<T, Error>>> {
        self.result.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fill(&self, result: Result<T, Error>) {
        *self.lock() = Some(result);
        self.ready.notify_all();
    }

    fn try_take(&self) -> Option<Result<T, Error>> {
        self.lock().take()
    }

    fn wait_timeout(&self, timeout: Duration) -> Option<Result<T, Error>> {
        let guard = self.lock();
        let (mut guard, _) = self
            .ready
            .wait_timeout_while(guard, timeout, |result| result.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        guard.take()
    }

    fn wait(&self) -> Result<T, Error> {
        let guard = self.lock();
        let mut guard = self
            .ready
            .wait_while(guard, |result| result.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        match guard.take() {
            Some(result) => result,
            None => unreachable!("wait_while returned without a result"),
        }
    }
}

/// Runs `task`, turning a panic into [`Error::TaskPanicked`].
fn guarded<T>(task: impl FnOnce() -> Result<T, Error>) -> Result<T, Error> {
    panic::catch_unwind(AssertUnwindSafe(task))
        .unwrap_or_else(|payload| Err(Error::TaskPanicked(panic_message(payload))))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// A bounded work-stealing pool.
///
/// Workers that block in [`Scheduler::join`] keep executing other queued
/// tasks until their own result arrives, so nested joins deeper than the
/// pool size cannot starve it. The pool is shared by every session; tasks
/// carry only their own matrices.
pub struct WorkStealingScheduler {
    pool: ThreadPool,
}

impl WorkStealingScheduler {
    /// Builds a pool with `workers` threads.
    pub fn new(workers: usize) -> Result<Self, Error> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("strassen-worker-{}", i))
            .build()?;
        tracing::info!(workers = pool.current_num_threads(), "strassen worker pool started");
        Ok(Self { pool })
    }

    /// Builds a pool sized to the host's available parallelism.
    pub fn with_available_parallelism() -> Result<Self, Error> {
        let workers = std::thread::available_parallelism().map_or(1, |n| n.get());
        Self::new(workers)
    }
}

impl Scheduler for WorkStealingScheduler {
    fn submit<T, F>(&self, task: F) -> TaskHandle<T>
    where
        F: FnOnce() -> Result<T, Error> + Send + 'static,
        T: Send + 'static,
    {
        let (handle, slot) = TaskHandle::pending();
        self.pool.spawn(move || slot.fill(guarded(task)));
        handle
    }

    fn join<T>(&self, handle: TaskHandle<T>) -> Result<T, Error> {
        loop {
            if let Some(result) = handle.slot.try_take() {
                return result;
            }
            match self.pool.yield_now() {
                Some(Yield::Executed) => {}
                Some(Yield::Idle) => {
                    if let Some(result) = handle.slot.wait_timeout(IDLE_WAIT) {
                        return result;
                    }
                }
                // Not a thread of this pool: nothing to help with, just wait.
                None => return handle.slot.wait(),
            }
        }
    }

    fn invoke_all<I, T, F>(&self, inputs: Vec<I>, f: F) -> Result<Vec<T>, Error>
    where
        I: Send,
        T: Send,
        F: Fn(I) -> Result<T, Error> + Send + Sync,
    {
        self.pool.install(|| {
            inputs
                .into_par_iter()
                .map(|input| guarded(|| f(input)))
                .collect()
        })
    }

    fn parallelism(&self) -> usize {
        self.pool.current_num_threads()
    }
}

/// Runs every task inline on the calling thread, in submission order.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequentialScheduler;

impl Scheduler for SequentialScheduler {
    fn submit<T, F>(&self, task: F) -> TaskHandle<T>
    where
        F: FnOnce() -> Result<T, Error> + Send + 'static,
        T: Send + 'static,
    {
        let (handle, slot) = TaskHandle::pending();
        slot.fill(guarded(task));
        handle
    }

    fn join<T>(&self, handle: TaskHandle<T>) -> Result<T, Error> {
        handle.slot.wait()
    }

    fn invoke_all<I, T, F>(&self, inputs: Vec<I>, f: F) -> Result<Vec<T>, Error>
    where
        I: Send,
        T: Send,
        F: Fn(I) -> Result<T, Error> + Send + Sync,
    {
        inputs
            .into_iter()
            .map(|input| guarded(|| f(input)))
            .collect()
    }

    fn parallelism(&self) -> usize {
        1
    }
}
