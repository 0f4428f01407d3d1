//! Wire codec between protocol types and socket frames

use bytes::Bytes;
use thiserror::Error;

use super::protocol::{InputMsg, ServerMsg};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Encodes server messages and decodes client envelopes
pub trait Codec: Send + Sync {
    fn encode(&self, msg: &ServerMsg) -> Result<Bytes, CodecError>;
    fn decode(&self, data: &[u8]) -> Result<InputMsg, CodecError>;
}

/// JSON over binary frames
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, msg: &ServerMsg) -> Result<Bytes, CodecError> {
        serde_json::to_vec(msg)
            .map(Bytes::from)
            .map_err(CodecError::Encode)
    }

    fn decode(&self, data: &[u8]) -> Result<InputMsg, CodecError> {
        serde_json::from_slice(data).map_err(CodecError::Decode)
    }
}
