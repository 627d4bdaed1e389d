//! The `google.longrunning.Operations` polling client.

use std::sync::Arc;

use ringline_grpc::{CallResult, Channel, ClientStub, GrpcError, MethodDescriptor};

use crate::proto::{GetOperationRequest, Operation};

pub const OPERATIONS_SERVICE: &str = "google.longrunning.Operations";

/// `google.longrunning.Operations/GetOperation`.
pub fn get_operation_method() -> MethodDescriptor {
    MethodDescriptor::new(OPERATIONS_SERVICE, "GetOperation")
}

/// Fetches the current state of an operation by name.
///
/// The returned [`CallResult`] carries the response metadata of that one poll.
pub trait OperationsApi: Send + Sync {
    fn get_operation(&self, name: &str) -> Result<CallResult<Operation>, GrpcError>;
}

impl<A: OperationsApi + ?Sized> OperationsApi for Arc<A> {
    fn get_operation(&self, name: &str) -> Result<CallResult<Operation>, GrpcError> {
        (**self).get_operation(name)
    }
}

/// [`OperationsApi`] over a gRPC channel.
#[derive(Clone, Debug)]
pub struct OperationsClient {
    stub: ClientStub,
}

impl OperationsClient {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self {
            stub: ClientStub::new(channel),
        }
    }

    /// A client on the same channel and credentials as `stub`. Other call
    /// options of `stub` are not carried over.
    pub fn from_stub(stub: &ClientStub) -> Self {
        let mut polling = ClientStub::new(stub.channel().clone());
        if let Some(credentials) = stub.call_options().credentials() {
            polling = polling.with_credentials(credentials.clone());
        }
        Self { stub: polling }
    }

    pub fn stub(&self) -> &ClientStub {
        &self.stub
    }
}

impl OperationsApi for OperationsClient {
    fn get_operation(&self, name: &str) -> Result<CallResult<Operation>, GrpcError> {
        let request = GetOperationRequest {
            name: name.to_string(),
        };
        self.stub.unary(&get_operation_method(), &request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_path() {
        assert_eq!(
            get_operation_method().path(),
            "/google.longrunning.Operations/GetOperation"
        );
    }
}
