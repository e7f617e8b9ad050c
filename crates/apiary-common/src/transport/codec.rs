use serde_json::Value;

use crate::protocol::envelope::{CallEnvelope, ResultEnvelope};
use crate::protocol::error::{ApiaryError, Result};

/// JSON codec for the frame payloads of the persistent transport.
///
/// Encoding failures are serialization faults of our own making and map to
/// [`ApiaryError::Json`]; decoding failures come from the peer and map to
/// [`ApiaryError::Protocol`] so the adapter can answer with a protocol
/// failure instead of tearing the connection down.
pub struct JsonCodec;

impl JsonCodec {
    pub fn encode_call(call: &CallEnvelope) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(call)?)
    }

    pub fn decode_call(data: &[u8]) -> Result<CallEnvelope> {
        serde_json::from_slice(data).map_err(|e| ApiaryError::Protocol(e.to_string()))
    }

    pub fn encode_result(envelope: &ResultEnvelope) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&envelope.to_wire())?)
    }

    pub fn decode_frame(data: &[u8]) -> Result<Value> {
        serde_json::from_slice(data).map_err(|e| ApiaryError::Protocol(e.to_string()))
    }
}
