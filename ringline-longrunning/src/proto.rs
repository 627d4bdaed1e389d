//! Minimal protobuf encoding/decoding for `google.longrunning` messages.
//!
//! This implements just enough protobuf wire format to encode/decode
//! `Operation`, `google.rpc.Status`, `google.protobuf.Any` and
//! `GetOperationRequest` without requiring prost or other heavy deps.
//! Unknown fields are skipped.

use bytes::Bytes;
use ringline_grpc::{Decodable, DecodeError, Encodable, GrpcStatus};

/// Wire type for varint (int32, int64, uint32, uint64, bool, enum).
const WIRE_TYPE_VARINT: u8 = 0;
/// Wire type for 64-bit fixed.
const WIRE_TYPE_FIXED64: u8 = 1;
/// Wire type for length-delimited (string, bytes, embedded messages).
const WIRE_TYPE_LEN: u8 = 2;
/// Wire type for 32-bit fixed.
const WIRE_TYPE_FIXED32: u8 = 5;

/// Encode a varint.
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a varint from a buffer.
pub fn decode_varint(buf: &mut &[u8]) -> Option<u64> {
    let mut result: u64 = 0;
    let mut shift = 0;

    loop {
        let (&byte, rest) = buf.split_first()?;
        *buf = rest;

        // The tenth byte may only carry bit 63.
        if shift == 63 && byte > 1 {
            return None;
        }
        result |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Some(result);
        }
        shift += 7;
        if shift >= 64 {
            return None; // Overflow
        }
    }
}

/// Encode a field tag.
pub fn encode_tag(field_number: u32, wire_type: u8, buf: &mut Vec<u8>) {
    encode_varint(((field_number as u64) << 3) | (wire_type as u64), buf);
}

/// Decode a field tag, returning (field_number, wire_type).
pub fn decode_tag(buf: &mut &[u8]) -> Option<(u32, u8)> {
    let tag = decode_varint(buf)?;
    let field_number = (tag >> 3) as u32;
    let wire_type = (tag & 0x07) as u8;
    Some((field_number, wire_type))
}

/// Encode a bytes field.
pub fn encode_bytes(field_number: u32, data: &[u8], buf: &mut Vec<u8>) {
    encode_tag(field_number, WIRE_TYPE_LEN, buf);
    encode_varint(data.len() as u64, buf);
    buf.extend_from_slice(data);
}

/// Encode a string field (same as bytes in protobuf).
pub fn encode_string(field_number: u32, s: &str, buf: &mut Vec<u8>) {
    encode_bytes(field_number, s.as_bytes(), buf);
}

/// Encode an int32 field. Negative values take the full ten bytes.
pub fn encode_int32(field_number: u32, value: i32, buf: &mut Vec<u8>) {
    encode_tag(field_number, WIRE_TYPE_VARINT, buf);
    encode_varint(value as i64 as u64, buf);
}

/// Encode a bool field.
pub fn encode_bool(field_number: u32, value: bool, buf: &mut Vec<u8>) {
    encode_tag(field_number, WIRE_TYPE_VARINT, buf);
    encode_varint(value as u64, buf);
}

/// Encode an embedded message field.
pub fn encode_message(field_number: u32, message: &impl Encodable, buf: &mut Vec<u8>) {
    encode_bytes(field_number, &message.encode_to_vec(), buf);
}

/// Decode a length-delimited field, returning the bytes.
pub fn decode_length_delimited<'a>(buf: &mut &'a [u8]) -> Option<&'a [u8]> {
    let len = usize::try_from(decode_varint(buf)?).ok()?;
    if buf.len() < len {
        return None;
    }
    let (data, rest) = buf.split_at(len);
    *buf = rest;
    Some(data)
}

/// Skip a field based on its wire type.
pub fn skip_field(wire_type: u8, buf: &mut &[u8]) -> Option<()> {
    let width = match wire_type {
        WIRE_TYPE_VARINT => {
            decode_varint(buf)?;
            return Some(());
        }
        WIRE_TYPE_LEN => {
            decode_length_delimited(buf)?;
            return Some(());
        }
        WIRE_TYPE_FIXED64 => 8,
        WIRE_TYPE_FIXED32 => 4,
        _ => return None,
    };
    if buf.len() < width {
        return None;
    }
    *buf = &buf[width..];
    Some(())
}

fn truncated(message: &str) -> DecodeError {
    DecodeError::new(format!("truncated or malformed {message}"))
}

fn expect_wire_type(message: &str, field: u32, actual: u8, expected: u8) -> Result<(), DecodeError> {
    if actual == expected {
        Ok(())
    } else {
        Err(DecodeError::new(format!(
            "{message} field {field}: wire type {actual}, expected {expected}"
        )))
    }
}

fn decode_string(message: &str, buf: &mut &[u8]) -> Result<String, DecodeError> {
    let bytes = decode_length_delimited(buf).ok_or_else(|| truncated(message))?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| DecodeError::new(format!("{message}: string field is not valid UTF-8")))
}

// ============================================================================
// google.protobuf.Any
// ============================================================================

/// A serialized message together with a URL naming its type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Any {
    pub type_url: String,
    pub value: Bytes,
}

impl Any {
    pub fn new(type_url: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            type_url: type_url.into(),
            value: value.into(),
        }
    }

    /// Pack `message` under `type.googleapis.com/<type_name>`.
    pub fn pack(type_name: &str, message: &impl Encodable) -> Self {
        Self {
            type_url: format!("type.googleapis.com/{type_name}"),
            value: Bytes::from(message.encode_to_vec()),
        }
    }

    /// Type name with any URL prefix stripped.
    pub fn type_name(&self) -> &str {
        self.type_url
            .rsplit_once('/')
            .map_or(self.type_url.as_str(), |(_, name)| name)
    }

    /// Decode the payload as `T`. The type URL is not checked.
    pub fn unpack<T: Decodable>(&self) -> Result<T, DecodeError> {
        T::decode(&self.value)
    }
}

impl Encodable for Any {
    fn encode(&self, buf: &mut Vec<u8>) {
        if !self.type_url.is_empty() {
            encode_string(1, &self.type_url, buf);
        }
        if !self.value.is_empty() {
            encode_bytes(2, &self.value, buf);
        }
    }
}

impl Decodable for Any {
    fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut buf = data;
        let mut any = Any::default();

        while !buf.is_empty() {
            let (field, wire_type) = decode_tag(&mut buf).ok_or_else(|| truncated("Any"))?;
            match field {
                1 => {
                    expect_wire_type("Any", field, wire_type, WIRE_TYPE_LEN)?;
                    any.type_url = decode_string("Any", &mut buf)?;
                }
                2 => {
                    expect_wire_type("Any", field, wire_type, WIRE_TYPE_LEN)?;
                    let value =
                        decode_length_delimited(&mut buf).ok_or_else(|| truncated("Any"))?;
                    any.value = Bytes::copy_from_slice(value);
                }
                _ => skip_field(wire_type, &mut buf).ok_or_else(|| truncated("Any"))?,
            }
        }

        Ok(any)
    }
}

// ============================================================================
// google.rpc.Status
// ============================================================================

/// Error carried by a failed operation.
///
/// `details` (field 3) is skipped on decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpcStatus {
    pub code: i32,
    pub message: String,
}

impl RpcStatus {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn grpc_status(&self) -> GrpcStatus {
        GrpcStatus::from_code(self.code)
    }

    /// Whether the code is the success sentinel (`OK`).
    pub fn is_ok(&self) -> bool {
        self.code == GrpcStatus::Ok.code()
    }
}

impl Encodable for RpcStatus {
    fn encode(&self, buf: &mut Vec<u8>) {
        if self.code != 0 {
            encode_int32(1, self.code, buf);
        }
        if !self.message.is_empty() {
            encode_string(2, &self.message, buf);
        }
    }
}

impl Decodable for RpcStatus {
    fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut buf = data;
        let mut status = RpcStatus::default();

        while !buf.is_empty() {
            let (field, wire_type) = decode_tag(&mut buf).ok_or_else(|| truncated("Status"))?;
            match field {
                1 => {
                    expect_wire_type("Status", field, wire_type, WIRE_TYPE_VARINT)?;
                    let code = decode_varint(&mut buf).ok_or_else(|| truncated("Status"))?;
                    status.code = code as i32;
                }
                2 => {
                    expect_wire_type("Status", field, wire_type, WIRE_TYPE_LEN)?;
                    status.message = decode_string("Status", &mut buf)?;
                }
                _ => skip_field(wire_type, &mut buf).ok_or_else(|| truncated("Status"))?,
            }
        }

        Ok(status)
    }
}

// ============================================================================
// google.longrunning.Operation
// ============================================================================

/// Outcome of a finished operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    Error(RpcStatus),
    Response(Any),
}

/// Handle for a remote long-running operation.
///
/// While `done` is false, `result` is absent. Once `done` is true the handle
/// no longer changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Operation {
    /// Server-assigned name, stable across polls.
    pub name: String,
    /// Service-specific progress metadata. Carried, never interpreted.
    pub metadata: Option<Any>,
    pub done: bool,
    pub result: Option<OperationResult>,
}

impl Operation {
    /// An operation that has not finished yet.
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// A finished operation holding `response`.
    pub fn succeeded(name: impl Into<String>, response: Any) -> Self {
        Self {
            name: name.into(),
            metadata: None,
            done: true,
            result: Some(OperationResult::Response(response)),
        }
    }

    /// A finished operation holding `error`.
    pub fn failed(name: impl Into<String>, error: RpcStatus) -> Self {
        Self {
            name: name.into(),
            metadata: None,
            done: true,
            result: Some(OperationResult::Error(error)),
        }
    }

    pub fn error(&self) -> Option<&RpcStatus> {
        match &self.result {
            Some(OperationResult::Error(status)) => Some(status),
            _ => None,
        }
    }

    pub fn response(&self) -> Option<&Any> {
        match &self.result {
            Some(OperationResult::Response(any)) => Some(any),
            _ => None,
        }
    }

    /// Serialized response payload; empty when there is none.
    pub fn response_payload(&self) -> &[u8] {
        self.response().map_or(&[][..], |any| any.value.as_ref())
    }
}

impl Encodable for Operation {
    fn encode(&self, buf: &mut Vec<u8>) {
        if !self.name.is_empty() {
            encode_string(1, &self.name, buf);
        }
        if let Some(metadata) = &self.metadata {
            encode_message(2, metadata, buf);
        }
        if self.done {
            encode_bool(3, true, buf);
        }
        match &self.result {
            Some(OperationResult::Error(status)) => encode_message(4, status, buf),
            Some(OperationResult::Response(any)) => encode_message(5, any, buf),
            None => {}
        }
    }
}

impl Decodable for Operation {
    fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut buf = data;
        let mut op = Operation::default();

        while !buf.is_empty() {
            let (field, wire_type) =
                decode_tag(&mut buf).ok_or_else(|| truncated("Operation"))?;
            match field {
                1 => {
                    expect_wire_type("Operation", field, wire_type, WIRE_TYPE_LEN)?;
                    op.name = decode_string("Operation", &mut buf)?;
                }
                2 => {
                    expect_wire_type("Operation", field, wire_type, WIRE_TYPE_LEN)?;
                    let bytes = decode_length_delimited(&mut buf)
                        .ok_or_else(|| truncated("Operation"))?;
                    op.metadata = Some(Any::decode(bytes)?);
                }
                3 => {
                    expect_wire_type("Operation", field, wire_type, WIRE_TYPE_VARINT)?;
                    op.done = decode_varint(&mut buf).ok_or_else(|| truncated("Operation"))? != 0;
                }
                4 => {
                    expect_wire_type("Operation", field, wire_type, WIRE_TYPE_LEN)?;
                    let bytes = decode_length_delimited(&mut buf)
                        .ok_or_else(|| truncated("Operation"))?;
                    op.result = Some(OperationResult::Error(RpcStatus::decode(bytes)?));
                }
                5 => {
                    expect_wire_type("Operation", field, wire_type, WIRE_TYPE_LEN)?;
                    let bytes = decode_length_delimited(&mut buf)
                        .ok_or_else(|| truncated("Operation"))?;
                    op.result = Some(OperationResult::Response(Any::decode(bytes)?));
                }
                _ => skip_field(wire_type, &mut buf).ok_or_else(|| truncated("Operation"))?,
            }
        }

        Ok(op)
    }
}

// ============================================================================
// google.longrunning.GetOperationRequest
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOperationRequest {
    pub name: String,
}

impl Encodable for GetOperationRequest {
    fn encode(&self, buf: &mut Vec<u8>) {
        if !self.name.is_empty() {
            encode_string(1, &self.name, buf);
        }
    }
}

impl Decodable for GetOperationRequest {
    fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut buf = data;
        let mut request = GetOperationRequest::default();

        while !buf.is_empty() {
            let (field, wire_type) =
                decode_tag(&mut buf).ok_or_else(|| truncated("GetOperationRequest"))?;
            match field {
                1 => {
                    expect_wire_type("GetOperationRequest", field, wire_type, WIRE_TYPE_LEN)?;
                    request.name = decode_string("GetOperationRequest", &mut buf)?;
                }
                _ => skip_field(wire_type, &mut buf)
                    .ok_or_else(|| truncated("GetOperationRequest"))?,
            }
        }

        Ok(request)
    }
}
