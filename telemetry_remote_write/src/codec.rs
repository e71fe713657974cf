//! Protobuf encoding and snappy block compression of write requests.

use prost::Message;

use crate::error::PushError;
use crate::proto::WriteRequest;

/// Serialize a write request.
///
/// Repeated fields keep their order, so identical requests encode identically.
pub fn encode(request: &WriteRequest) -> Result<Vec<u8>, PushError> {
    let mut bytes: Vec<u8> = Vec::with_capacity(request.encoded_len());
    request.encode(&mut bytes)?;
    Ok(bytes)
}

pub fn decode(bytes: &[u8]) -> Result<WriteRequest, prost::DecodeError> {
    WriteRequest::decode(bytes)
}

/// Compress a request body using the snappy block format (not the framed format).
pub fn compress(bytes: &[u8]) -> Result<Vec<u8>, PushError> {
    let mut encoder = snap::raw::Encoder::new();
    Ok(encoder.compress_vec(bytes)?)
}

pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, snap::Error> {
    snap::raw::Decoder::new().decompress_vec(bytes)
}
