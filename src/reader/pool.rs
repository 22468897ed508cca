//! Bounded worker pool with a double-ended task queue.
//!
//! A fixed set of OS threads drains one [`VecDeque`] guarded by a single
//! mutex and condition variable. The deque's two ends are the pool's
//! whole scheduling policy:
//!
//! - [`WorkerPool::push_back`]: run after everything already queued
//! - [`WorkerPool::push_front`]: run next
//!
//! Front insertion is how the read manager re-prioritises tiles that
//! stay in view across a viewport change: their re-enqueued tasks jump
//! ahead of freshly enqueued work. It is deliberately not a priority
//! queue; there are exactly two urgency classes.
//!
//! Workers drop a task after running it. [`WorkerPool::stop`] discards
//! everything still queued and joins the threads.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

/// A unit of work executed on a pool thread.
pub trait Routine: Send {
    /// Execute the work. Called exactly once.
    fn run(&mut self);
}

/// Closures are routines; tests lean on this.
impl<F: FnMut() + Send> Routine for F {
    fn run(&mut self) {
        self()
    }
}

struct PoolState {
    queue: VecDeque<Box<dyn Routine>>,
    stopped: bool,
}

struct PoolShared {
    state: Mutex<PoolState>,
    work_available: Condvar,
}

/// Fixed-size worker pool over a double-ended task queue.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `threads` workers (at least one).
    pub fn new(threads: usize) -> Self {
        assert!(threads >= 1, "a worker pool needs at least one thread");

        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                queue: VecDeque::new(),
                stopped: false,
            }),
            work_available: Condvar::new(),
        });

        let workers = (0..threads)
            .map(|i| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("tile-reader-{i}"))
                    .spawn(move || worker_loop(&shared))
                    .expect("failed to spawn pool worker")
            })
            .collect();

        Self { shared, workers }
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Tasks waiting in the queue (running tasks not counted).
    pub fn queued(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Enqueue behind all pending tasks. Dropped silently after
    /// [`WorkerPool::stop`].
    pub fn push_back(&self, task: Box<dyn Routine>) {
        let mut state = self.shared.state.lock();
        if state.stopped {
            return;
        }
        state.queue.push_back(task);
        drop(state);
        self.shared.work_available.notify_one();
    }

    /// Enqueue ahead of all pending tasks. Dropped silently after
    /// [`WorkerPool::stop`].
    pub fn push_front(&self, task: Box<dyn Routine>) {
        let mut state = self.shared.state.lock();
        if state.stopped {
            return;
        }
        state.queue.push_front(task);
        drop(state);
        self.shared.work_available.notify_one();
    }

    /// Discard queued tasks and join every worker.
    ///
    /// Tasks already running finish; they are expected to observe their
    /// own cancellation flags and return promptly.
    pub fn stop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            if state.stopped {
                return;
            }
            state.stopped = true;
            let discarded = state.queue.len();
            state.queue.clear();
            if discarded > 0 {
                debug!(discarded, "worker pool stop discarded queued tasks");
            }
        }
        self.shared.work_available.notify_all();

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(shared: &PoolShared) {
    loop {
        let mut task = {
            let mut state = shared.state.lock();
            loop {
                if state.stopped {
                    return;
                }
                if let Some(task) = state.queue.pop_front() {
                    break task;
                }
                shared.work_available.wait(&mut state);
            }
        };
        task.run();
        // Task dropped here; completion destroys it.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_runs_all_tasks() {
        let mut pool = WorkerPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            pool.push_back(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while counter.load(Ordering::SeqCst) < 100 {
            assert!(std::time::Instant::now() < deadline, "pool failed to drain");
            std::thread::yield_now();
        }
        pool.stop();
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn test_front_insertion_runs_next() {
        let mut pool = WorkerPool::new(1);
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let (order_tx, order_rx) = mpsc::channel::<&'static str>();

        // Occupy the single worker until the queue is staged.
        pool.push_back(Box::new(move || {
            gate_rx.recv().unwrap();
        }));
        while pool.queued() > 0 {
            std::thread::yield_now();
        }

        for name in ["back-1", "back-2"] {
            let tx = order_tx.clone();
            pool.push_back(Box::new(move || tx.send(name).unwrap()));
        }
        let tx = order_tx.clone();
        pool.push_front(Box::new(move || tx.send("front").unwrap()));

        gate_tx.send(()).unwrap();

        let order: Vec<_> = (0..3)
            .map(|_| order_rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(order, vec!["front", "back-1", "back-2"]);

        pool.stop();
    }

    #[test]
    fn test_stop_discards_queued_tasks() {
        let mut pool = WorkerPool::new(1);
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let ran = Arc::new(AtomicUsize::new(0));

        pool.push_back(Box::new(move || {
            let _ = gate_rx.recv();
        }));
        while pool.queued() > 0 {
            std::thread::yield_now();
        }

        for _ in 0..10 {
            let ran = Arc::clone(&ran);
            pool.push_back(Box::new(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }

        gate_tx.send(()).unwrap();
        pool.stop();

        // The blocker finished; the ten queued tasks raced stop. With the
        // gate released only at stop time, none-to-few of them ran and
        // none remain queued.
        assert_eq!(pool.queued(), 0);
        assert!(ran.load(Ordering::SeqCst) <= 10);
    }

    #[test]
    fn test_push_after_stop_is_dropped() {
        let mut pool = WorkerPool::new(1);
        pool.stop();

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = Arc::clone(&ran);
        pool.push_back(Box::new(move || {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(pool.queued(), 0);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_worker_count() {
        let pool = WorkerPool::new(3);
        assert_eq!(pool.workers(), 3);
    }
}
