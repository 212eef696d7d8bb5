//! Fixed-size worker pool with a single FIFO queue.
//!
//! Producers submit closures and receive a handle that resolves to the
//! closure's result. A panicking task resolves its handle to an error and
//! leaves the worker thread alive; shutdown drains unstarted work.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use thiserror::Error;
use tracing::debug;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Submission-side failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("submit on a stopped worker pool")]
    Stopped,
}

/// Failures surfaced through a task handle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("task panicked: {0}")]
    Panicked(String),
    #[error("task abandoned before it ran")]
    Abandoned,
}

struct PoolState {
    queue: VecDeque<Job>,
    stopping: bool,
}

struct PoolShared {
    state: Mutex<PoolState>,
    available: Condvar,
    active: AtomicUsize,
}

/// Handle to a submitted task's eventual result.
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: Receiver<Result<T, TaskError>>,
}

impl<T> TaskHandle<T> {
    /// Block until the task finishes and return its result.
    ///
    /// Resolves to [`TaskError::Abandoned`] when the pool was shut down
    /// before the task ran.
    pub fn join(self) -> Result<T, TaskError> {
        match self.rx.recv() {
            Ok(outcome) => outcome,
            Err(_) => Err(TaskError::Abandoned),
        }
    }
}

/// Bounded set of worker threads draining an unbounded FIFO queue.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn a pool with `threads` workers; 0 selects hardware parallelism.
    pub fn new(threads: usize) -> Self {
        let threads = if threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            threads
        };

        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                queue: VecDeque::new(),
                stopping: false,
            }),
            available: Condvar::new(),
            active: AtomicUsize::new(0),
        });

        let workers = (0..threads)
            .map(|_| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || worker_loop(shared))
            })
            .collect();

        debug!(threads, "worker pool started");
        WorkerPool { shared, workers }
    }

    /// Number of workers in the pool.
    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue a closure; the returned handle resolves to its result.
    pub fn submit<T, F>(&self, task: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let job: Job = Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(task))
                .map_err(|payload| TaskError::Panicked(panic_message(payload.as_ref())));
            let _ = tx.send(outcome);
        });

        {
            let mut state = self.shared.state.lock().unwrap();
            if state.stopping {
                return Err(PoolError::Stopped);
            }
            state.queue.push_back(job);
        }
        self.shared.available.notify_one();
        Ok(TaskHandle { rx })
    }

    /// Tasks waiting in the queue.
    pub fn queue_len(&self) -> usize {
        self.shared.state.lock().unwrap().queue.len()
    }

    /// Tasks currently executing on a worker.
    pub fn active_tasks(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Stop accepting work, drop queued-but-unstarted tasks (their handles
    /// resolve to [`TaskError::Abandoned`]) and join all workers. Idempotent.
    pub fn shutdown(&mut self) {
        let drained = {
            let mut state = self.shared.state.lock().unwrap();
            if state.stopping {
                return;
            }
            state.stopping = true;
            std::mem::take(&mut state.queue)
        };
        // Dropping the jobs drops their result senders; pending handles
        // observe a closed channel and resolve to Abandoned.
        let abandoned = drained.len();
        drop(drained);

        self.shared.available.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!(abandoned, "worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<PoolShared>) {
    loop {
        let job = {
            let mut state = shared.state.lock().unwrap();
            loop {
                if let Some(job) = state.queue.pop_front() {
                    break job;
                }
                if state.stopping {
                    return;
                }
                state = shared.available.wait(state).unwrap();
            }
        };

        shared.active.fetch_add(1, Ordering::SeqCst);
        job();
        shared.active.fetch_sub(1, Ordering::SeqCst);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
