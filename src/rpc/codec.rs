//! JSON message codec for tonic.
//!
//! Backends are invoked by method path without generated stubs, so messages
//! travel as JSON documents inside standard gRPC framing.

use bytes::{Buf, BufMut};
use serde_json::Value;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::Status;

/// Codec carrying `serde_json::Value` messages in both directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    type Encode = Value;
    type Decode = Value;
    type Encoder = JsonEncoder;
    type Decoder = JsonDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        JsonEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        JsonDecoder
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    type Item = Value;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        encode_json(&item, dst)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    type Item = Value;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        decode_json(src).map(Some)
    }
}

/// Write `value` into a gRPC message buffer.
pub fn encode_json<B: BufMut>(value: &Value, dst: B) -> Result<(), Status> {
    serde_json::to_writer(dst.writer(), value)
        .map_err(|e| Status::internal(format!("failed to encode message: {}", e)))
}

/// Read one message; an empty frame is the empty object.
pub fn decode_json<B: Buf>(src: B) -> Result<Value, Status> {
    if !src.has_remaining() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_reader(src.reader())
        .map_err(|e| Status::internal(format!("failed to decode message: {}", e)))
}
