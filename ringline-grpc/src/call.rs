//! Call-level capability traits and per-call options.
//!
//! A [`Channel`] creates [`ClientCall`]s. A call reports back through a
//! [`Listener`]: headers once, then messages, then a final close. Interceptors
//! sit between the caller and the channel and decorate calls and listeners
//! without changing this shape.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{GrpcError, Status};
use crate::metadata::Metadata;
use crate::response_metadata::ResponseMetadata;

/// Fully-qualified method being called.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    service: String,
    method: String,
}

impl MethodDescriptor {
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// `service/method`, as gRPC names it.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.service, self.method)
    }

    /// HTTP/2 `:path` pseudo-header value.
    pub fn path(&self) -> String {
        format!("/{}/{}", self.service, self.method)
    }
}

/// Typed key for attaching a value to [`CallOptions`].
///
/// Keys are identified by name, so each name must be globally unique.
pub struct CallOptionKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> CallOptionKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> fmt::Debug for CallOptionKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CallOptionKey").field(&self.name).finish()
    }
}

/// Per-call credentials. Applied to the outgoing request headers when a call
/// starts.
pub trait CallCredentials: Send + Sync {
    fn apply(&self, headers: &mut Metadata);
}

/// `authorization: Bearer <token>` credentials.
#[derive(Clone)]
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(..)")
    }
}

impl CallCredentials for BearerToken {
    fn apply(&self, headers: &mut Metadata) {
        headers.insert("authorization", format!("Bearer {}", self.token));
    }
}

/// Options attached to a single call: credentials plus arbitrary typed values.
#[derive(Clone, Default)]
pub struct CallOptions {
    credentials: Option<Arc<dyn CallCredentials>>,
    values: HashMap<&'static str, Arc<dyn Any + Send + Sync>>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CallCredentials>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn credentials(&self) -> Option<&Arc<dyn CallCredentials>> {
        self.credentials.as_ref()
    }

    /// Attach `value` under `key`, replacing any previous value.
    pub fn with_option<T>(mut self, key: &CallOptionKey<T>, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.values.insert(key.name, Arc::new(value));
        self
    }

    /// The value attached under `key`, if any.
    pub fn option<T>(&self, key: &CallOptionKey<T>) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.values.get(key.name)?.downcast_ref::<T>()
    }
}

impl fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallOptions")
            .field("credentials", &self.credentials.is_some())
            .field("options", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Receives the events of a single call.
///
/// `on_headers` fires at most once per call attempt and `on_close` exactly
/// once, last.
pub trait Listener: Send {
    fn on_headers(&mut self, _headers: &Metadata) {}

    fn on_message(&mut self, _message: Bytes) {}

    fn on_close(&mut self, status: Status, trailers: &Metadata);
}

/// One outgoing call.
pub trait ClientCall: Send {
    /// Begin the call. Events are delivered to `listener`.
    fn start(&mut self, listener: Box<dyn Listener>, headers: Metadata) -> Result<(), GrpcError>;

    fn send_message(&mut self, message: Bytes) -> Result<(), GrpcError>;

    /// No more messages will be sent.
    fn half_close(&mut self) -> Result<(), GrpcError>;

    fn cancel(&mut self, reason: &str);
}

/// Creates calls. Implementations own connection and transport state.
pub trait Channel: Send + Sync {
    fn new_call(&self, method: &MethodDescriptor, options: &CallOptions) -> Box<dyn ClientCall>;
}

impl<C: Channel + ?Sized> Channel for Arc<C> {
    fn new_call(&self, method: &MethodDescriptor, options: &CallOptions) -> Box<dyn ClientCall> {
        (**self).new_call(method, options)
    }
}

/// A decoded response body paired with the metadata captured during its call.
#[derive(Debug, Clone)]
pub struct CallResult<T> {
    pub body: T,
    pub metadata: ResponseMetadata,
}

impl<T> CallResult<T> {
    pub fn new(body: T, metadata: ResponseMetadata) -> Self {
        Self { body, metadata }
    }
}
