//! A one-shot result that can be waited on, awaited, or handed a callback.
//!
//! [`promise`] creates a connected [`Promise`] / [`FutureCall`] pair over a
//! `futures` oneshot channel. The promise side completes at most once;
//! dropping it without completing delivers [`Error::Abandoned`]. The future
//! side is consumed by whichever way the caller chooses to observe the
//! result:
//!
//! - [`FutureCall::wait`] blocks the calling thread
//! - `.await` via the [`Future`] impl
//! - [`FutureCall::enqueue`] / [`FutureCall::enqueue_on`] register a callback

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::oneshot;

use crate::error::{Error, Result};
use crate::executor::{Executor, Job, Rejected, default_executor};

/// Create a connected promise and future.
pub fn promise<T>() -> (Promise<T>, FutureCall<T>) {
    let (sender, receiver) = oneshot::channel();
    (
        Promise { sender },
        FutureCall {
            receiver,
            ready: None,
        },
    )
}

/// Producer side of a [`FutureCall`].
pub struct Promise<T> {
    sender: oneshot::Sender<Result<T>>,
}

impl<T> Promise<T> {
    pub fn complete(self, result: Result<T>) {
        // Err only when the future was dropped; nobody wants the result.
        let _ = self.sender.send(result);
    }
}

/// Consumer side of a one-shot result.
pub struct FutureCall<T> {
    receiver: oneshot::Receiver<Result<T>>,
    ready: Option<Result<T>>,
}

// Neither field is ever pinned.
impl<T> Unpin for FutureCall<T> {}

impl<T> FutureCall<T> {
    /// Whether a result is available now. Never blocks.
    pub fn is_done(&mut self) -> bool {
        if self.ready.is_none() {
            self.ready = match self.receiver.try_recv() {
                Ok(Some(result)) => Some(result),
                Ok(None) => None,
                Err(oneshot::Canceled) => Some(Err(Error::Abandoned)),
            };
        }
        self.ready.is_some()
    }

    /// Block until the result is available.
    pub fn wait(self) -> Result<T> {
        futures::executor::block_on(self)
    }
}

impl<T: Send + 'static> FutureCall<T> {
    /// A future that is already complete.
    pub fn ready(result: Result<T>) -> Self {
        let (promise, mut future) = promise();
        promise.complete(result);
        future.is_done();
        future
    }

    /// Run `f` on `executor` and complete with its result.
    ///
    /// If the executor rejects the job the future completes with
    /// [`Error::Rejected`].
    pub fn spawn<F>(executor: &dyn Executor, f: F) -> Self
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (promise, future) = promise();
        match executor.execute(Box::new(move || promise.complete(f()))) {
            Ok(()) => future,
            Err(Rejected(_job)) => Self::ready(Err(Error::Rejected)),
        }
    }

    /// Invoke `callback` with the result on a worker of the default pool.
    pub fn enqueue<F>(self, callback: F)
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        self.enqueue_on(default_executor(), callback);
    }

    /// Invoke `callback` with the result on `executor`.
    ///
    /// A pending result is waited for on `executor`. If the executor rejects
    /// the job it runs on this thread instead, so the result is never lost.
    pub fn enqueue_on<F>(mut self, executor: Arc<dyn Executor>, callback: F)
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        if self.is_done() {
            dispatch(&*executor, self.wait(), callback);
            return;
        }
        let job: Job = Box::new(move || callback(self.wait()));
        if let Err(Rejected(job)) = executor.execute(job) {
            tracing::warn!("callback executor rejected job; waiting inline");
            job();
        }
    }
}

/// Run `callback(result)` on `executor`, or on this thread if it is refused.
pub(crate) fn dispatch<T, F>(executor: &dyn Executor, result: Result<T>, callback: F)
where
    T: Send + 'static,
    F: FnOnce(Result<T>) + Send + 'static,
{
    if let Err(Rejected(job)) = executor.execute(Box::new(move || callback(result))) {
        tracing::warn!("callback executor rejected job; running inline");
        job();
    }
}

impl<T> Future for FutureCall<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(result) = self.ready.take() {
            return Poll::Ready(result);
        }
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(Error::Abandoned)))
    }
}

impl<T> std::fmt::Debug for FutureCall<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FutureCall")
            .field("ready", &self.ready.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::executor::{DirectExecutor, ThreadPool};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn ready_future_is_done() {
        let mut future = FutureCall::ready(Ok(5));
        assert!(future.is_done());
        assert_eq!(future.wait().unwrap(), 5);
    }

    #[test]
    fn wait_blocks_until_completed() {
        let (promise, mut future) = promise::<u32>();
        assert!(!future.is_done());

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            promise.complete(Ok(42));
        });
        assert_eq!(future.wait().unwrap(), 42);
        handle.join().unwrap();
    }

    #[test]
    fn is_done_keeps_the_result() {
        let (promise, mut future) = promise::<u32>();
        promise.complete(Ok(8));
        assert!(future.is_done());
        assert!(future.is_done());
        assert_eq!(future.wait().unwrap(), 8);
    }

    #[test]
    fn dropped_promise_abandons() {
        let (promise, future) = promise::<u32>();
        drop(promise);
        assert!(matches!(future.wait(), Err(Error::Abandoned)));

        let (promise, mut future) = super::promise::<u32>();
        drop(promise);
        assert!(future.is_done());
        assert!(matches!(future.wait(), Err(Error::Abandoned)));
    }

    #[test]
    fn completing_after_future_dropped_is_harmless() {
        let (promise, future) = promise::<u32>();
        drop(future);
        promise.complete(Ok(1));
    }

    #[test]
    fn enqueue_on_direct_executor_after_completion_runs_inline() {
        let caller = thread::current().id();
        let (tx, rx) = crossbeam_channel::bounded(1);
        FutureCall::ready(Ok("done")).enqueue_on(Arc::new(DirectExecutor), move |r| {
            tx.send((r.unwrap(), thread::current().id())).unwrap()
        });
        assert_eq!(rx.try_recv().unwrap(), ("done", caller));
    }

    #[test]
    fn enqueue_before_completion_runs_on_executor() {
        let pool = Arc::new(
            ThreadPool::new(PoolConfig {
                keep_alive: Duration::from_secs(5),
                thread_name: "waiter".into(),
            })
            .unwrap(),
        );
        let (promise, future) = promise::<u32>();
        let (tx, rx) = crossbeam_channel::bounded(1);
        future.enqueue_on(pool, move |r| {
            tx.send((r.unwrap(), thread::current().name().map(str::to_string)))
                .unwrap()
        });
        assert!(rx.try_recv().is_err());

        promise.complete(Ok(3));

        let (value, name) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(value, 3);
        assert!(name.unwrap().starts_with("waiter-"));
    }

    #[test]
    fn enqueue_delivers_errors() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        FutureCall::<u32>::ready(Err(Error::Rejected)).enqueue(move |r| tx.send(r).unwrap());
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            Err(Error::Rejected)
        ));
    }

    struct RejectAll;

    impl Executor for RejectAll {
        fn execute(&self, job: Job) -> std::result::Result<(), Rejected> {
            Err(Rejected(job))
        }
    }

    #[test]
    fn spawn_on_rejecting_executor() {
        let mut future = FutureCall::spawn(&RejectAll, || Ok(1));
        assert!(future.is_done());
        assert!(matches!(future.wait(), Err(Error::Rejected)));
    }

    #[test]
    fn rejected_callback_still_runs() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        FutureCall::ready(Ok(9)).enqueue_on(Arc::new(RejectAll), move |r| {
            tx.send(r.unwrap()).unwrap()
        });
        assert_eq!(rx.try_recv().unwrap(), 9);
    }

    #[test]
    fn awaits_result() {
        let (promise, future) = promise::<&'static str>();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            promise.complete(Ok("awaited"));
        });
        assert_eq!(futures::executor::block_on(future).unwrap(), "awaited");
        handle.join().unwrap();
    }
}
