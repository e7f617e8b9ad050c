//! Apiary Envelope Types
//!
//! One [`CallEnvelope`] names a service, a method and a positional argument
//! list; every handler invocation binds to exactly one call envelope and
//! produces exactly one [`ResultEnvelope`].
//!
//! # Correlation
//!
//! The `id` field is optional on both envelopes. Without it the persistent
//! transport correlates by frame ordering (next frame on the connection is
//! the response), which is only safe single-in-flight; with it both frames
//! carry the id and responses match explicitly. The field is skipped during
//! serialization when absent so uncorrelated traffic keeps the bare
//! `{name, method, args}` shape.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::{ApiaryError, Result};

/// A request to invoke one method of one service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallEnvelope {
    /// Optional correlation identifier, echoed back on the result envelope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Target service name.
    pub name: String,
    /// Target method name.
    pub method: String,
    /// Positional arguments, passed to the handler in order.
    #[serde(default)]
    pub args: Vec<Value>,
}

impl CallEnvelope {
    pub fn new(name: impl Into<String>, method: impl Into<String>, args: Vec<Value>) -> Self {
        CallEnvelope {
            id: None,
            name: name.into(),
            method: method.into(),
            args,
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }
}

/// Failure classification carried on error frames.
///
/// The client maps these back onto [`ApiaryError`] variants; the server
/// derives them from the error it caught, so the remote caller learns the
/// kind and message but never a raw stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    UnknownService,
    UnknownMethod,
    HandlerError,
    ProtocolError,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FailureKind::UnknownService => "unknownService",
            FailureKind::UnknownMethod => "unknownMethod",
            FailureKind::HandlerError => "handlerError",
            FailureKind::ProtocolError => "protocolError",
        };
        f.write_str(label)
    }
}

/// The failure half of a result envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Failure {
            kind,
            message: message.into(),
        }
    }

    /// Classifies a server-side error for transmission.
    pub fn from_error(err: &ApiaryError) -> Self {
        let kind = match err {
            ApiaryError::UnknownService(_) => FailureKind::UnknownService,
            ApiaryError::UnknownMethod { .. } => FailureKind::UnknownMethod,
            ApiaryError::Protocol(_) => FailureKind::ProtocolError,
            _ => FailureKind::HandlerError,
        };
        Failure::new(kind, err.to_string())
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// The reply to exactly one [`CallEnvelope`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResultEnvelope {
    Success { id: Option<u64>, value: Value },
    Failure { id: Option<u64>, failure: Failure },
}

impl ResultEnvelope {
    pub fn success(id: Option<u64>, value: Value) -> Self {
        ResultEnvelope::Success { id, value }
    }

    pub fn failure(id: Option<u64>, failure: Failure) -> Self {
        ResultEnvelope::Failure { id, failure }
    }

    pub fn id(&self) -> Option<u64> {
        match self {
            ResultEnvelope::Success { id, .. } | ResultEnvelope::Failure { id, .. } => *id,
        }
    }

    /// Produces the wire representation.
    ///
    /// An uncorrelated success is the raw result value itself; everything
    /// else is wrapped so the receiver can tell result, error and id apart.
    pub fn to_wire(&self) -> Value {
        match self {
            ResultEnvelope::Success { id: None, value } => value.clone(),
            ResultEnvelope::Success { id: Some(id), value } => {
                json!({ "id": id, "result": value })
            }
            ResultEnvelope::Failure { id: None, failure } => {
                json!({ "error": failure })
            }
            ResultEnvelope::Failure { id: Some(id), failure } => {
                json!({ "id": id, "error": failure })
            }
        }
    }

    /// Decodes a reply frame.
    ///
    /// `sent_id` is the correlation id the caller put on the matching call
    /// envelope. When present the frame must be a correlated object whose id
    /// matches; when absent the frame is taken as the raw value, except for
    /// the single-key `{"error": ...}` shape which decodes as a failure.
    pub fn from_wire(frame: Value, sent_id: Option<u64>) -> Result<Self> {
        if let Some(expected) = sent_id {
            let obj = frame
                .as_object()
                .ok_or_else(|| ApiaryError::Protocol("expected a correlated response object".into()))?;
            let id = obj
                .get("id")
                .and_then(Value::as_u64)
                .ok_or_else(|| ApiaryError::Protocol("response is missing its correlation id".into()))?;
            if id != expected {
                return Err(ApiaryError::Protocol(format!(
                    "correlation mismatch: sent {expected}, received {id}"
                )));
            }
            if let Some(error) = obj.get("error") {
                let failure = serde_json::from_value(error.clone())
                    .map_err(|e| ApiaryError::Protocol(format!("unreadable error body: {e}")))?;
                return Ok(ResultEnvelope::Failure { id: Some(id), failure });
            }
            if let Some(result) = obj.get("result") {
                return Ok(ResultEnvelope::Success {
                    id: Some(id),
                    value: result.clone(),
                });
            }
            return Err(ApiaryError::Protocol(
                "correlated response carries neither result nor error".into(),
            ));
        }

        if let Value::Object(map) = &frame {
            if map.len() == 1 {
                if let Some(error) = map.get("error") {
                    if let Ok(failure) = serde_json::from_value::<Failure>(error.clone()) {
                        return Ok(ResultEnvelope::Failure { id: None, failure });
                    }
                }
            }
        }
        Ok(ResultEnvelope::Success { id: None, value: frame })
    }
}
