//! Client interceptors.
//!
//! An interceptor sees every call a channel creates and may decorate it. The
//! decorated call usually wraps the caller's [`Listener`] so it can observe
//! events on their way back.

use std::sync::Arc;

use bytes::Bytes;

use crate::call::{CallOptions, Channel, ClientCall, Listener, MethodDescriptor};
use crate::error::{GrpcError, Status};
use crate::metadata::Metadata;
use crate::response_metadata::ResponseMetadata;

/// Decorates calls created through a channel.
pub trait ClientInterceptor: Send + Sync {
    /// Create the call for `method`. `next` is the rest of the chain; calling
    /// `next.new_call` unchanged is a pass-through.
    fn intercept_call(
        &self,
        method: &MethodDescriptor,
        options: &CallOptions,
        next: &dyn Channel,
    ) -> Box<dyn ClientCall>;
}

/// A channel that runs every call through a list of interceptors.
#[derive(Clone)]
pub struct InterceptedChannel {
    channel: Arc<dyn Channel>,
    interceptors: Vec<Arc<dyn ClientInterceptor>>,
}

/// Wrap `channel` so calls pass through `interceptors`, first to last.
pub fn intercept(
    channel: Arc<dyn Channel>,
    interceptors: Vec<Arc<dyn ClientInterceptor>>,
) -> InterceptedChannel {
    InterceptedChannel {
        channel,
        interceptors,
    }
}

impl Channel for InterceptedChannel {
    fn new_call(&self, method: &MethodDescriptor, options: &CallOptions) -> Box<dyn ClientCall> {
        Next {
            channel: &*self.channel,
            interceptors: &self.interceptors,
        }
        .new_call(method, options)
    }
}

struct Next<'a> {
    channel: &'a dyn Channel,
    interceptors: &'a [Arc<dyn ClientInterceptor>],
}

impl Channel for Next<'_> {
    fn new_call(&self, method: &MethodDescriptor, options: &CallOptions) -> Box<dyn ClientCall> {
        match self.interceptors.split_first() {
            Some((first, rest)) => {
                let next = Next {
                    channel: self.channel,
                    interceptors: rest,
                };
                first.intercept_call(method, options, &next)
            }
            None => self.channel.new_call(method, options),
        }
    }
}

/// Copies response headers into the [`ResponseMetadata`] attached to a call.
///
/// Calls without a sink under [`ResponseMetadata::KEY`] pass through
/// untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseMetadataInterceptor;

impl ClientInterceptor for ResponseMetadataInterceptor {
    fn intercept_call(
        &self,
        method: &MethodDescriptor,
        options: &CallOptions,
        next: &dyn Channel,
    ) -> Box<dyn ClientCall> {
        let call = next.new_call(method, options);
        match options.option(&ResponseMetadata::KEY) {
            Some(sink) => Box::new(MetadataCapturingCall {
                inner: call,
                method: method.full_name(),
                sink: sink.clone(),
            }),
            None => call,
        }
    }
}

struct MetadataCapturingCall {
    inner: Box<dyn ClientCall>,
    method: String,
    sink: ResponseMetadata,
}

impl ClientCall for MetadataCapturingCall {
    fn start(&mut self, listener: Box<dyn Listener>, headers: Metadata) -> Result<(), GrpcError> {
        let listener = MetadataCapturingListener {
            inner: listener,
            method: std::mem::take(&mut self.method),
            sink: self.sink.clone(),
        };
        self.inner.start(Box::new(listener), headers)
    }

    fn send_message(&mut self, message: Bytes) -> Result<(), GrpcError> {
        self.inner.send_message(message)
    }

    fn half_close(&mut self) -> Result<(), GrpcError> {
        self.inner.half_close()
    }

    fn cancel(&mut self, reason: &str) {
        self.inner.cancel(reason)
    }
}

struct MetadataCapturingListener {
    inner: Box<dyn Listener>,
    method: String,
    sink: ResponseMetadata,
}

impl Listener for MetadataCapturingListener {
    fn on_headers(&mut self, headers: &Metadata) {
        let mut captured = 0;
        for field in headers.iter() {
            match (std::str::from_utf8(&field.name), std::str::from_utf8(&field.value)) {
                (Ok(name), Ok(value)) => {
                    self.sink.put(name, value);
                    captured += 1;
                }
                _ => tracing::trace!(
                    method = %self.method,
                    name = %String::from_utf8_lossy(&field.name),
                    "skipping non-UTF-8 response header"
                ),
            }
        }
        tracing::trace!(method = %self.method, captured, "captured response headers");
        self.inner.on_headers(headers);
    }

    fn on_message(&mut self, message: Bytes) {
        self.inner.on_message(message);
    }

    fn on_close(&mut self, status: Status, trailers: &Metadata) {
        self.inner.on_close(status, trailers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records the name of each interceptor as the call is built.
    struct Tagging {
        tag: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl ClientInterceptor for Tagging {
        fn intercept_call(
            &self,
            method: &MethodDescriptor,
            options: &CallOptions,
            next: &dyn Channel,
        ) -> Box<dyn ClientCall> {
            self.seen.lock().push(self.tag);
            next.new_call(method, options)
        }
    }

    struct NullCall;

    impl ClientCall for NullCall {
        fn start(&mut self, _: Box<dyn Listener>, _: Metadata) -> Result<(), GrpcError> {
            Ok(())
        }
        fn send_message(&mut self, _: Bytes) -> Result<(), GrpcError> {
            Ok(())
        }
        fn half_close(&mut self) -> Result<(), GrpcError> {
            Ok(())
        }
        fn cancel(&mut self, _: &str) {}
    }

    struct CountingChannel(Arc<Mutex<usize>>);

    impl Channel for CountingChannel {
        fn new_call(&self, _: &MethodDescriptor, _: &CallOptions) -> Box<dyn ClientCall> {
            *self.0.lock() += 1;
            Box::new(NullCall)
        }
    }

    #[test]
    fn interceptors_run_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let created = Arc::new(Mutex::new(0));
        let channel = intercept(
            Arc::new(CountingChannel(created.clone())),
            vec![
                Arc::new(Tagging {
                    tag: "outer",
                    seen: seen.clone(),
                }),
                Arc::new(Tagging {
                    tag: "inner",
                    seen: seen.clone(),
                }),
            ],
        );

        let method = MethodDescriptor::new("svc", "M");
        let _call = channel.new_call(&method, &CallOptions::new());

        assert_eq!(*seen.lock(), vec!["outer", "inner"]);
        assert_eq!(*created.lock(), 1);
    }

    #[test]
    fn empty_chain_reaches_channel() {
        let created = Arc::new(Mutex::new(0));
        let channel = intercept(Arc::new(CountingChannel(created.clone())), Vec::new());
        let _call = channel.new_call(&MethodDescriptor::new("svc", "M"), &CallOptions::new());
        assert_eq!(*created.lock(), 1);
    }
}
