//! Background workers for CPU-only work such as model parsing.
//!
//! Two pieces:
//!
//! - [`JobSystem`] - a fixed pool of worker threads pulling boxed closures
//!   from a condvar-guarded FIFO.
//! - [`ParseQueue`] - a mutex-guarded FIFO that workers push finished results
//!   onto and the main thread drains.
//!
//! Jobs must never touch GPU state. Everything that crosses this boundary is
//! `Send`, which GPU handles are not. A panicking job is logged and its
//! worker keeps running.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

/// Boxed unit of work executed on a worker thread.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

struct JobQueue {
    jobs: VecDeque<Job>,
    stopping: bool,
}

struct Shared {
    queue: Mutex<JobQueue>,
    available: Condvar,
}

/// Fixed-size worker pool.
///
/// Dropping the pool shuts it down: queued jobs still run, then workers exit
/// and are joined.
pub struct JobSystem {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl JobSystem {
    /// Spawn `thread_count` workers (at least one).
    pub fn new(thread_count: usize) -> Self {
        let thread_count = thread_count.max(1);
        let shared = Arc::new(Shared {
            queue: Mutex::new(JobQueue {
                jobs: VecDeque::new(),
                stopping: false,
            }),
            available: Condvar::new(),
        });

        let mut workers = Vec::with_capacity(thread_count);
        for index in 0..thread_count {
            let shared = Arc::clone(&shared);
            let spawned = std::thread::Builder::new()
                .name(format!("aether-worker-{index}"))
                .spawn(move || worker_loop(&shared));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => log::error!("JobSystem: failed to spawn worker {index}: {e}"),
            }
        }

        log::info!("JobSystem started with {} workers", workers.len());
        Self { shared, workers }
    }

    /// Spawn one worker per available core, leaving one for the main thread.
    pub fn with_default_threads() -> Self {
        let cores = std::thread::available_parallelism().map_or(2, |n| n.get());
        Self::new(cores.saturating_sub(1))
    }

    /// Queue a job for execution on some worker.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        let mut queue = self.shared.queue.lock();
        if queue.stopping {
            log::warn!("JobSystem: submit after shutdown ignored");
            return;
        }
        queue.jobs.push_back(Box::new(job));
        drop(queue);
        self.shared.available.notify_one();
    }

    /// Number of live worker threads.
    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Finish queued jobs, stop the workers and join them.
    pub fn shutdown(&mut self) {
        self.shared.queue.lock().stopping = true;
        self.shared.available.notify_all();

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("JobSystem: worker panicked");
            }
        }
    }
}

impl Drop for JobSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let job = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(job) = queue.jobs.pop_front() {
                    break job;
                }
                if queue.stopping {
                    return;
                }
                shared.available.wait(&mut queue);
            }
        };
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            log::error!("JobSystem: job panicked: {}", panic_message(&*payload));
        }
    }
}

/// Text of a panic payload, for logging.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Mutex-guarded FIFO of finished results, shared between producers and the main thread.
///
/// Cloning yields another handle to the same queue.
pub struct ParseQueue<T> {
    items: Arc<Mutex<VecDeque<T>>>,
}

impl<T> Clone for ParseQueue<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> Default for ParseQueue<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Mutex::new(VecDeque::new())),
        }
    }
}

impl<T> ParseQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finished result.
    pub fn push(&self, item: T) {
        self.items.lock().push_back(item);
    }

    /// Take the oldest result, if any.
    pub fn pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Take every queued result in FIFO order.
    pub fn drain(&self) -> Vec<T> {
        self.items.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

static_assertions::assert_impl_all!(ParseQueue<crate::model::ModelLoadResult>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    #[test]
    fn test_jobs_run_before_shutdown_returns() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut jobs = JobSystem::new(3);
        for _ in 0..32 {
            let counter = Arc::clone(&counter);
            jobs.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        jobs.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 32);
        assert_eq!(jobs.thread_count(), 0);
    }

    #[test]
    fn test_submit_after_shutdown_is_ignored() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut jobs = JobSystem::new(1);
        jobs.shutdown();
        let c = Arc::clone(&counter);
        jobs.submit(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panicking_job_keeps_worker_alive() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut jobs = JobSystem::new(1);
        jobs.submit(|| panic!("malformed input"));
        for _ in 0..4 {
            let counter = Arc::clone(&counter);
            jobs.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(jobs.thread_count(), 1);
        jobs.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_panic_message() {
        let payload = panic::catch_unwind(|| panic!("bad {}", 7)).unwrap_err();
        assert_eq!(panic_message(&*payload), "bad 7");
        let payload = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(&*payload), "static");
    }

    #[test]
    fn test_parse_queue_is_fifo() {
        let queue = ParseQueue::new();
        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.drain(), vec![2, 3]);
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_workers_feed_queue() {
        let queue = ParseQueue::new();
        let jobs = JobSystem::new(2);
        for i in 0..4 {
            let queue = queue.clone();
            jobs.submit(move || queue.push(i));
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while queue.len() < 4 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }

        let mut results = queue.drain();
        results.sort();
        assert_eq!(results, vec![0, 1, 2, 3]);
    }
}
