//! Resolving an operation handle into its typed final result.

use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};
use std::thread;

use parking_lot::Mutex;
use ringline_grpc::{CallResult, ClientStub, Decodable, ResponseMetadata};

use crate::error::{Error, Result};
use crate::executor::{Executor, default_executor};
use crate::future::{FutureCall, dispatch};
use crate::operations::{OperationsApi, OperationsClient};
use crate::poll::{Immediate, PollStrategy};
use crate::proto::Operation;

/// Resolves a long-running operation into a `CallResult<T>`.
///
/// The operation handle comes from a (possibly still running) call. Resolving
/// waits for that call, then polls `GetOperation` until the handle reports
/// done, then decodes the response payload as `T`. The terminal handle and
/// the response metadata of the final poll are cached, so every retrieval
/// after the first success returns the same outcome without polling again.
///
/// At most one resolution polls at a time per `LongRunningCall`. Concurrent
/// retrievals wait for the one in progress and then share its outcome.
pub struct LongRunningCall<T> {
    operations: Arc<dyn OperationsApi>,
    resolution: Arc<Resolution>,
    is_done: bool,
    executor: Arc<dyn Executor>,
    poll_strategy: Arc<dyn PollStrategy>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> LongRunningCall<T>
where
    T: Decodable + Send + 'static,
{
    /// Resolve the operation that `future` will produce, polling through
    /// `operations`.
    ///
    /// [`is_done`](Self::is_done) reflects whether `future` had already
    /// completed at this point.
    pub fn new(operations: Arc<dyn OperationsApi>, mut future: FutureCall<Operation>) -> Self {
        let is_done = future.is_done();
        Self {
            operations,
            resolution: Arc::new(Resolution {
                held: Mutex::new(Held::Initial(future)),
                latest: Mutex::new(None),
                terminal: OnceLock::new(),
            }),
            is_done,
            executor: default_executor(),
            poll_strategy: Arc::new(Immediate),
            _marker: PhantomData,
        }
    }

    /// Resolve an operation handle that is already in hand.
    pub fn from_operation(operations: Arc<dyn OperationsApi>, operation: Operation) -> Self {
        Self::new(operations, FutureCall::ready(Ok(operation)))
    }

    /// Resolve `operation`, polling on the channel and credentials of `stub`.
    pub fn of(operation: Operation, stub: &ClientStub) -> Self {
        Self::from_operation(Arc::new(OperationsClient::from_stub(stub)), operation)
    }

    /// Run resolution on `executor` instead of the default pool.
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_poll_strategy(mut self, poll_strategy: Arc<dyn PollStrategy>) -> Self {
        self.poll_strategy = poll_strategy;
        self
    }

    /// Whether the call that produced the handle had completed when this
    /// resolver was created. It says nothing about the remote operation.
    pub fn is_done(&self) -> bool {
        self.is_done
    }

    /// The most recent handle seen, if the originating call has completed.
    pub fn operation(&self) -> Option<Operation> {
        if let Some(resolved) = self.resolution.terminal.get() {
            return Some(resolved.operation.clone());
        }
        self.resolution.latest.lock().clone()
    }

    /// Block until the operation is resolved.
    pub fn get(&self) -> Result<CallResult<T>> {
        self.as_future().wait()
    }

    /// Resolve on the configured executor.
    pub fn as_future(&self) -> FutureCall<CallResult<T>> {
        let resolve = self.resolver();
        FutureCall::spawn(&*self.executor, resolve)
    }

    /// Resolve in the background and hand the outcome to `callback` on the
    /// thread that finishes resolving.
    pub fn enqueue<F>(&self, callback: F)
    where
        F: FnOnce(Result<CallResult<T>>) + Send + 'static,
    {
        let resolve = self.resolver();
        self.submit(move |callback: F| callback(resolve()), callback);
    }

    /// Resolve in the background and run `callback` on `executor`.
    pub fn enqueue_on<F>(&self, executor: Arc<dyn Executor>, callback: F)
    where
        F: FnOnce(Result<CallResult<T>>) + Send + 'static,
    {
        let resolve = self.resolver();
        self.submit(
            move |callback: F| dispatch(&*executor, resolve(), callback),
            callback,
        );
    }

    fn resolver(&self) -> impl FnOnce() -> Result<CallResult<T>> + Send + 'static {
        let operations = self.operations.clone();
        let resolution = self.resolution.clone();
        let poll_strategy = self.poll_strategy.clone();
        move || {
            let resolved = resolution.resolve(&*operations, &*poll_strategy)?;
            let body = parse_result::<T>(&resolved.operation)?;
            Ok(CallResult::new(body, resolved.metadata))
        }
    }

    /// Run `job(callback)` on the resolution executor. If the executor
    /// refuses, `callback` receives [`Error::Rejected`] on this thread.
    fn submit<F, J>(&self, job: J, callback: F)
    where
        F: FnOnce(Result<CallResult<T>>) + Send + 'static,
        J: FnOnce(F) + Send + 'static,
    {
        let slot = Arc::new(Mutex::new(Some(callback)));
        let taken = slot.clone();
        let submitted = self.executor.execute(Box::new(move || {
            let callback = taken.lock().take();
            if let Some(callback) = callback {
                job(callback);
            }
        }));
        if submitted.is_err() {
            let callback = slot.lock().take();
            if let Some(callback) = callback {
                callback(Err(Error::Rejected));
            }
        }
    }
}

impl<T> std::fmt::Debug for LongRunningCall<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LongRunningCall")
            .field("is_done", &self.is_done)
            .field("resolved", &self.resolution.terminal.get().is_some())
            .field("poll_strategy", &self.poll_strategy)
            .finish_non_exhaustive()
    }
}

/// The handle currently known to a resolver.
enum Held {
    /// The originating call has not been waited on yet.
    Initial(FutureCall<Operation>),
    Handle(Operation),
    /// The originating call failed; its error was already reported.
    Failed,
}

#[derive(Clone)]
struct Resolved {
    operation: Operation,
    metadata: ResponseMetadata,
}

struct Resolution {
    /// Held for the whole of a resolution, so polling is serialized.
    held: Mutex<Held>,
    /// Copy of the held handle, readable while a resolution is polling.
    latest: Mutex<Option<Operation>>,
    terminal: OnceLock<Resolved>,
}

impl Resolution {
    fn resolve(
        &self,
        operations: &dyn OperationsApi,
        poll_strategy: &dyn PollStrategy,
    ) -> Result<Resolved> {
        if let Some(resolved) = self.terminal.get() {
            return Ok(resolved.clone());
        }

        let mut held = self.held.lock();
        if let Some(resolved) = self.terminal.get() {
            return Ok(resolved.clone());
        }

        let mut operation = match std::mem::replace(&mut *held, Held::Failed) {
            Held::Initial(future) => future.wait()?,
            Held::Handle(operation) => operation,
            Held::Failed => return Err(Error::Abandoned),
        };
        self.record(&mut held, &operation);

        tracing::debug!(operation = %operation.name, done = operation.done, "resolving operation");

        let mut metadata = ResponseMetadata::new();
        let mut polls: u32 = 0;
        while !operation.done {
            polls = polls.saturating_add(1);
            let delay = poll_strategy.delay_before(polls);
            if !delay.is_zero() {
                thread::sleep(delay);
            }

            tracing::trace!(operation = %operation.name, poll = polls, "polling operation");
            match operations.get_operation(&operation.name) {
                Ok(result) => {
                    operation = result.body;
                    metadata = result.metadata;
                    self.record(&mut held, &operation);
                }
                Err(e) if e.is_interrupted() => {
                    tracing::trace!(operation = %operation.name, "poll interrupted, retrying");
                }
                Err(e) => return Err(Error::Transport(e)),
            }
        }

        tracing::debug!(operation = %operation.name, polls, "operation resolved");

        let resolved = Resolved {
            operation,
            metadata,
        };
        // Only the holder of `held` sets the terminal value.
        let _ = self.terminal.set(resolved.clone());
        Ok(resolved)
    }

    fn record(&self, held: &mut Held, operation: &Operation) {
        *held = Held::Handle(operation.clone());
        *self.latest.lock() = Some(operation.clone());
    }
}

/// Turn a done handle into the caller's result type.
///
/// An error with a non-OK code is reported as-is and the payload is never
/// decoded. Otherwise the response payload (empty if absent) is decoded.
fn parse_result<T: Decodable>(operation: &Operation) -> Result<T> {
    if let Some(error) = operation.error()
        && !error.is_ok()
    {
        return Err(Error::RemoteOperation {
            code: error.code,
            message: error.message.clone(),
        });
    }
    Ok(T::decode(operation.response_payload())?)
}

/// Block until an operation handle is done and decode its result.
pub trait OperationExt {
    fn wait_until_done<T>(&self, stub: &ClientStub) -> Result<CallResult<T>>
    where
        T: Decodable + Send + 'static;
}

impl OperationExt for Operation {
    fn wait_until_done<T>(&self, stub: &ClientStub) -> Result<CallResult<T>>
    where
        T: Decodable + Send + 'static,
    {
        LongRunningCall::<T>::of(self.clone(), stub).get()
    }
}

impl OperationExt for CallResult<Operation> {
    fn wait_until_done<T>(&self, stub: &ClientStub) -> Result<CallResult<T>>
    where
        T: Decodable + Send + 'static,
    {
        self.body.wait_until_done(stub)
    }
}
