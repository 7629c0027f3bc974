// src/core/protocol/codec.rs

//! A length-prefixed `bincode` frame codec, the same "frame over a raw
//! stream" shape as the teacher's `RespFrameCodec`, generalized to carry
//! our own request/response enums instead of RESP values: a 4-byte
//! big-endian length prefix followed by that many bytes of `bincode`.

use crate::core::errors::PgAutoCtlError;
use bytes::{Buf, BytesMut};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tokio_util::codec::{Decoder, Encoder};

const LENGTH_PREFIX_BYTES: usize = 4;
/// Protocol-level limit guarding against a malformed or hostile peer
/// claiming an enormous frame length.
const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

/// A `tokio_util::codec` implementation carrying any `Serialize +
/// DeserializeOwned` message type. The keeper and monitor each instantiate
/// it once per connection with their own request/response types.
#[derive(Debug)]
pub struct WireCodec<T> {
    _marker: PhantomData<T>,
}

impl<T> Default for WireCodec<T> {
    fn default() -> Self {
        Self { _marker: PhantomData }
    }
}

/// Encodes any serializable message over a `WireCodec<T>`, independent of
/// the type it decodes: a connection's request and response types differ
/// (the monitor decodes `RpcRequest` and encodes `RpcResponse`; the keeper
/// does the reverse), so this impl is generic over both.
impl<T, U: Serialize> Encoder<U> for WireCodec<T> {
    type Error = PgAutoCtlError;

    fn encode(&mut self, item: U, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = bincode::serde::encode_to_vec(&item, bincode::config::standard())?;
        let len: u32 = payload
            .len()
            .try_into()
            .map_err(|_| PgAutoCtlError::InternalError("frame too large to encode".to_string()))?;
        dst.extend_from_slice(&len.to_be_bytes());
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

impl<T: DeserializeOwned> Decoder for WireCodec<T> {
    type Item = T;
    type Error = PgAutoCtlError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_PREFIX_BYTES {
            return Ok(None);
        }
        let len = u32::from_be_bytes(src[..LENGTH_PREFIX_BYTES].try_into().unwrap());
        if len > MAX_FRAME_BYTES {
            return Err(PgAutoCtlError::InternalError(format!(
                "frame of {len} bytes exceeds the {MAX_FRAME_BYTES} byte limit"
            )));
        }
        let total = LENGTH_PREFIX_BYTES + len as usize;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_BYTES);
        let frame = src.split_to(len as usize);
        let (item, _) = bincode::serde::decode_from_slice(&frame, bincode::config::standard())?;
        Ok(Some(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        a: u32,
        b: String,
    }

    #[test]
    fn round_trips_a_frame() {
        let mut codec = WireCodec::<Sample>::default();
        let mut buf = BytesMut::new();
        let item = Sample { a: 7, b: "hello".into() };
        codec.encode(item.clone(), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, item);
        assert!(buf.is_empty());
    }

    #[test]
    fn waits_for_more_bytes_on_partial_frame() {
        let mut codec = WireCodec::<Sample>::default();
        let mut buf = BytesMut::new();
        codec.encode(Sample { a: 1, b: "x".into() }, &mut buf).unwrap();
        let mut partial = buf.split_to(buf.len() - 1);
        assert!(codec.decode(&mut partial).unwrap().is_none());
    }
}
