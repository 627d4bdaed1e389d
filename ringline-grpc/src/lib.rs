//! gRPC client call plumbing.
//!
//! This crate defines the seams a gRPC client is built from: a [`Channel`]
//! that creates [`ClientCall`]s, a [`Listener`] that receives call events, and
//! [`ClientInterceptor`]s that decorate calls in between. It has no transport
//! and no protobuf dependency -- transports implement `Channel`, and message
//! types implement [`Encodable`] / [`Decodable`].
//!
//! # Response metadata
//!
//! ```text
//!   caller
//!     |  CallOptions { ResponseMetadata::KEY => sink }
//!   +-v-------------------------------+
//!   | ResponseMetadataInterceptor     |  on_headers: copy every value into sink
//!   +-+-------------------------------+
//!     |
//!   +-v-------------------------------+
//!   | transport Channel / ClientCall  |
//!   +---------------------------------+
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ringline_grpc::{ClientStub, MethodDescriptor, ResponseMetadataInterceptor, intercept};
//!
//! let channel = intercept(transport, vec![Arc::new(ResponseMetadataInterceptor)]);
//! let stub = ClientStub::new(Arc::new(channel));
//!
//! let method = MethodDescriptor::new("my.Service", "MyMethod");
//! let result = stub.unary::<_, MyResponse>(&method, &request)?;
//! let request_id = result.metadata.get("x-request-id");
//! ```

pub mod call;
pub mod codec;
pub mod error;
pub mod interceptor;
pub mod metadata;
pub mod response_metadata;
pub mod stub;

pub use call::{
    BearerToken, CallCredentials, CallOptionKey, CallOptions, CallResult, Channel, ClientCall,
    Listener, MethodDescriptor,
};
pub use codec::{Decodable, Encodable};
pub use error::{DecodeError, GrpcError, GrpcStatus, Status};
pub use interceptor::{ClientInterceptor, InterceptedChannel, ResponseMetadataInterceptor, intercept};
pub use metadata::{HeaderField, Metadata};
pub use response_metadata::ResponseMetadata;
pub use stub::{ClientStub, blocking_unary_call};
