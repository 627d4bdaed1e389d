//! Client-side resolution of `google.longrunning` operations.
//!
//! A call that starts slow server-side work returns an [`Operation`] handle
//! instead of its result. [`LongRunningCall`] turns that handle into the
//! typed result: it waits for the originating call, polls
//! `google.longrunning.Operations/GetOperation` until the handle is done, and
//! decodes the response payload. The result comes back as a
//! [`CallResult`](ringline_grpc::CallResult) carrying the response metadata
//! of the final poll.
//!
//! ```text
//!   originating call ──► FutureCall<Operation>
//!                               │
//!                     LongRunningCall<T>  ── runs on ──► Executor (ThreadPool)
//!                               │
//!            done? ──no──► PollStrategy delay ──► OperationsApi::get_operation
//!              │                                        │
//!             yes ◄─────────────────────────────────────┘
//!              │
//!   error (non-OK)  ──► Error::RemoteOperation
//!   response        ──► T::decode ──► CallResult<T>
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use ringline_longrunning::{LongRunningCall, OperationExt};
//!
//! let started = stub.unary::<_, Operation>(&create_method, &request)?;
//! let result = started.wait_until_done::<CreatedResource>(&stub)?;
//!
//! // Or keep the resolver around for async use.
//! let call = LongRunningCall::<CreatedResource>::of(started.body, &stub);
//! let result = call.as_future().await?;
//! ```

pub mod call;
pub mod config;
pub mod error;
pub mod executor;
pub mod future;
pub mod operations;
pub mod poll;
pub mod proto;

pub use call::{LongRunningCall, OperationExt};
pub use config::{PollConfig, PoolConfig};
pub use error::{Error, Result};
pub use executor::{DirectExecutor, Executor, Job, Rejected, ThreadPool, default_executor};
pub use future::{FutureCall, Promise, promise};
pub use operations::{OperationsApi, OperationsClient, get_operation_method};
pub use poll::{ExponentialBackoff, FixedDelay, Immediate, PollStrategy};
pub use proto::{Any, GetOperationRequest, Operation, OperationResult, RpcStatus};
