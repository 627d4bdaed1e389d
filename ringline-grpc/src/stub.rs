//! Blocking unary calls.

use std::sync::Arc;

use bytes::Bytes;
use crossbeam_channel::Sender;

use crate::call::{CallCredentials, CallOptions, CallResult, Channel, Listener, MethodDescriptor};
use crate::codec::{Decodable, Encodable};
use crate::error::{GrpcError, Status};
use crate::metadata::Metadata;
use crate::response_metadata::ResponseMetadata;

/// Issue a unary call and block until it closes.
///
/// A fresh [`ResponseMetadata`] is attached to the call under
/// [`ResponseMetadata::KEY`] and returned with the decoded body. It is only
/// populated if `channel` runs a [`ResponseMetadataInterceptor`].
///
/// [`ResponseMetadataInterceptor`]: crate::ResponseMetadataInterceptor
pub fn blocking_unary_call<Req, Resp>(
    channel: &dyn Channel,
    method: &MethodDescriptor,
    request: &Req,
    options: &CallOptions,
) -> Result<CallResult<Resp>, GrpcError>
where
    Req: Encodable + ?Sized,
    Resp: Decodable,
{
    let metadata = ResponseMetadata::new();
    let options = options
        .clone()
        .with_option(&ResponseMetadata::KEY, metadata.clone());

    let mut headers = Metadata::new();
    if let Some(credentials) = options.credentials() {
        credentials.apply(&mut headers);
    }

    let (tx, rx) = crossbeam_channel::bounded(1);
    let mut call = channel.new_call(method, &options);
    call.start(
        Box::new(UnaryListener {
            message: None,
            extra_messages: 0,
            done: Some(tx),
        }),
        headers,
    )?;

    let sent = call
        .send_message(Bytes::from(request.encode_to_vec()))
        .and_then(|()| call.half_close());
    if let Err(e) = sent {
        call.cancel("failed to send request");
        return Err(e);
    }

    let outcome = rx.recv().map_err(|_| GrpcError::ConnectionClosed)?;
    let message = outcome?;
    let body = Resp::decode(&message)?;
    Ok(CallResult::new(body, metadata))
}

/// Collects the single response of a unary call.
struct UnaryListener {
    message: Option<Bytes>,
    extra_messages: usize,
    done: Option<Sender<Result<Bytes, GrpcError>>>,
}

impl Listener for UnaryListener {
    fn on_message(&mut self, message: Bytes) {
        if self.message.is_none() {
            self.message = Some(message);
        } else {
            self.extra_messages += 1;
        }
    }

    fn on_close(&mut self, status: Status, _trailers: &Metadata) {
        let Some(done) = self.done.take() else {
            return;
        };
        let outcome = if !status.is_ok() {
            Err(GrpcError::Status(status))
        } else if self.extra_messages > 0 {
            Err(GrpcError::Protocol(format!(
                "unary call received {} messages",
                self.extra_messages + 1
            )))
        } else {
            self.message.take().ok_or(GrpcError::MissingMessage)
        };
        // The receiver only goes away if the caller already gave up.
        let _ = done.send(outcome);
    }
}

/// A channel plus the default options applied to every call made through it.
#[derive(Clone)]
pub struct ClientStub {
    channel: Arc<dyn Channel>,
    options: CallOptions,
}

impl ClientStub {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self {
            channel,
            options: CallOptions::new(),
        }
    }

    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CallCredentials>) -> Self {
        self.options = self.options.with_credentials(credentials);
        self
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    pub fn call_options(&self) -> &CallOptions {
        &self.options
    }

    /// Blocking unary call with this stub's options.
    pub fn unary<Req, Resp>(
        &self,
        method: &MethodDescriptor,
        request: &Req,
    ) -> Result<CallResult<Resp>, GrpcError>
    where
        Req: Encodable + ?Sized,
        Resp: Decodable,
    {
        blocking_unary_call(&*self.channel, method, request, &self.options)
    }
}

impl std::fmt::Debug for ClientStub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientStub")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
