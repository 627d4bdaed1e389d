//! Where resolution work and completion callbacks run.
//!
//! [`ThreadPool`] is a cached pool: a job is handed to an idle worker when one
//! is waiting, otherwise a new worker thread is started for it. Workers exit
//! after sitting idle for [`PoolConfig::keep_alive`]. The hand-off uses a
//! zero-capacity channel, so `try_send` only succeeds when a worker is
//! already blocked in `recv`.
//!
//! A process-wide pool is created on first use by [`default_executor`]. It is
//! never torn down implicitly; call [`ThreadPool::shutdown`] on it, or inject
//! another executor, to control its lifetime.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;

use crate::config::PoolConfig;
use crate::error::Result;

/// A unit of work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Returned when an executor refuses a job. The job is handed back unrun.
pub struct Rejected(pub Job);

impl std::fmt::Debug for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Rejected(..)")
    }
}

/// Runs jobs.
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job) -> std::result::Result<(), Rejected>;
}

/// Runs each job immediately on the submitting thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectExecutor;

impl Executor for DirectExecutor {
    fn execute(&self, job: Job) -> std::result::Result<(), Rejected> {
        job();
        Ok(())
    }
}

/// Cached thread pool. See the module docs.
pub struct ThreadPool {
    sender: Mutex<Option<Sender<Job>>>,
    receiver: Receiver<Job>,
    keep_alive: Duration,
    thread_name: String,
    next_worker: AtomicUsize,
    live_workers: Arc<AtomicUsize>,
}

impl ThreadPool {
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: PoolConfig) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(0);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
            keep_alive: config.keep_alive,
            thread_name: config.thread_name,
            next_worker: AtomicUsize::new(0),
            live_workers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Stop accepting jobs. Running jobs finish; idle workers exit.
    pub fn shutdown(&self) {
        if self.sender.lock().take().is_some() {
            tracing::debug!(pool = %self.thread_name, "thread pool shut down");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Number of worker threads currently alive, busy or idle.
    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::Acquire)
    }

    fn spawn_worker(&self, first: Job) -> std::result::Result<(), Rejected> {
        let index = self.next_worker.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}-{index}", self.thread_name);
        let jobs = self.receiver.clone();
        let keep_alive = self.keep_alive;
        let live = self.live_workers.clone();

        // Count the worker before it starts so live_workers never under-reports.
        live.fetch_add(1, Ordering::AcqRel);
        let (first_tx, first_rx) = crossbeam_channel::bounded::<Job>(1);
        let _ = first_tx.send(first);

        let spawned = thread::Builder::new().name(name.clone()).spawn({
            let first_rx = first_rx.clone();
            let live = live.clone();
            move || {
                tracing::debug!(worker = %name, "worker started");
                if let Ok(job) = first_rx.recv() {
                    run_job(job);
                }
                run_worker(&jobs, keep_alive);
                live.fetch_sub(1, Ordering::AcqRel);
                tracing::debug!(worker = %name, "worker exiting");
            }
        });

        match spawned {
            Ok(_) => Ok(()),
            Err(e) => {
                live.fetch_sub(1, Ordering::AcqRel);
                tracing::warn!(error = %e, "failed to spawn worker thread");
                match first_rx.try_recv() {
                    Ok(job) => Err(Rejected(job)),
                    Err(_) => Err(Rejected(Box::new(|| {}))),
                }
            }
        }
    }
}

impl Executor for ThreadPool {
    fn execute(&self, job: Job) -> std::result::Result<(), Rejected> {
        let sender = self.sender.lock().clone();
        let Some(sender) = sender else {
            tracing::warn!(pool = %self.thread_name, "job rejected: pool is shut down");
            return Err(Rejected(job));
        };

        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => self.spawn_worker(job),
            Err(TrySendError::Disconnected(job)) => Err(Rejected(job)),
        }
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("thread_name", &self.thread_name)
            .field("keep_alive", &self.keep_alive)
            .field("live_workers", &self.live_workers())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

fn run_worker(jobs: &Receiver<Job>, keep_alive: Duration) {
    loop {
        match jobs.recv_timeout(keep_alive) {
            Ok(job) => run_job(job),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn run_job(job: Job) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        tracing::warn!("job panicked");
    }
}

/// The process-wide pool, created with [`PoolConfig::default`] on first use.
pub fn default_executor() -> Arc<ThreadPool> {
    static DEFAULT: OnceLock<Arc<ThreadPool>> = OnceLock::new();
    DEFAULT
        .get_or_init(|| Arc::new(ThreadPool::build(PoolConfig::default())))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn small_pool(keep_alive: Duration) -> ThreadPool {
        ThreadPool::new(PoolConfig {
            keep_alive,
            thread_name: "test-pool".into(),
        })
        .unwrap()
    }

    fn wait_until(deadline: Duration, mut f: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if f() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        f()
    }

    #[test]
    fn direct_executor_runs_inline() {
        let caller = thread::current().id();
        let (tx, rx) = crossbeam_channel::bounded(1);
        DirectExecutor
            .execute(Box::new(move || tx.send(thread::current().id()).unwrap()))
            .unwrap();
        assert_eq!(rx.try_recv().unwrap(), caller);
    }

    #[test]
    fn runs_jobs_on_named_workers() {
        let pool = small_pool(Duration::from_secs(5));
        let (tx, rx) = crossbeam_channel::unbounded();
        pool.execute(Box::new(move || {
            tx.send(thread::current().name().map(str::to_string)).unwrap();
        }))
        .unwrap();

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert!(name.starts_with("test-pool-"), "{name}");
    }

    #[test]
    fn grows_for_concurrent_jobs() {
        let pool = small_pool(Duration::from_secs(5));
        let (release_tx, release_rx) = crossbeam_channel::unbounded::<()>();
        let (started_tx, started_rx) = crossbeam_channel::unbounded();

        for _ in 0..3 {
            let release = release_rx.clone();
            let started = started_tx.clone();
            pool.execute(Box::new(move || {
                started.send(()).unwrap();
                let _ = release.recv();
            }))
            .unwrap();
        }

        for _ in 0..3 {
            started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        assert!(pool.live_workers() >= 3);
        drop(release_tx);
    }

    #[test]
    fn idle_workers_exit_after_keep_alive() {
        let pool = small_pool(Duration::from_millis(20));
        let (tx, rx) = crossbeam_channel::bounded(1);
        pool.execute(Box::new(move || tx.send(()).unwrap())).unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert!(wait_until(Duration::from_secs(5), || pool.live_workers() == 0));
    }

    #[test]
    fn survives_panicking_job() {
        let pool = small_pool(Duration::from_secs(5));
        pool.execute(Box::new(|| panic!("boom"))).unwrap();

        let (tx, rx) = crossbeam_channel::bounded(1);
        pool.execute(Box::new(move || tx.send(7).unwrap())).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
    }

    #[test]
    fn rejects_after_shutdown() {
        let pool = small_pool(Duration::from_secs(5));
        assert!(!pool.is_shutdown());
        pool.shutdown();
        assert!(pool.is_shutdown());

        let (tx, rx) = crossbeam_channel::bounded(1);
        let Err(Rejected(job)) = pool.execute(Box::new(move || tx.send(1).unwrap())) else {
            panic!("expected rejection");
        };
        // The job comes back unrun.
        assert!(rx.try_recv().is_err());
        job();
        assert_eq!(rx.try_recv().unwrap(), 1);
    }

    #[test]
    fn default_executor_is_shared() {
        assert!(Arc::ptr_eq(&default_executor(), &default_executor()));
    }
}
