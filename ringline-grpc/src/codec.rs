//! Message codec capabilities.
//!
//! The framing layer stays codec-agnostic: request and response bodies are
//! raw bytes. Types that travel through a call implement [`Encodable`] and
//! [`Decodable`], and the caller picks the target type at the call site.

use bytes::Bytes;

use crate::error::DecodeError;

/// A message that can be parsed from its serialized form.
pub trait Decodable: Sized {
    fn decode(data: &[u8]) -> Result<Self, DecodeError>;
}

/// A message that can be serialized.
pub trait Encodable {
    fn encode(&self, buf: &mut Vec<u8>);

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }
}

impl Decodable for Bytes {
    fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        Ok(Bytes::copy_from_slice(data))
    }
}

impl Encodable for Bytes {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self);
    }
}

impl Decodable for Vec<u8> {
    fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        Ok(data.to_vec())
    }
}

impl Encodable for Vec<u8> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self);
    }
}

/// `google.protobuf.Empty`. Unknown fields are ignored, so any body decodes.
impl Decodable for () {
    fn decode(_data: &[u8]) -> Result<Self, DecodeError> {
        Ok(())
    }
}

impl Encodable for () {
    fn encode(&self, _buf: &mut Vec<u8>) {}
}
