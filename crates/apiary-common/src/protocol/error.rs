use thiserror::Error;

use crate::protocol::envelope::Failure;

#[derive(Error, Debug)]
pub enum ApiaryError {
    #[error("module '{module}' exceeded its {timeout_ms}ms initialization budget")]
    LoadTimeout { module: String, timeout_ms: u64 },

    #[error("module '{module}' failed to initialize: {cause}")]
    LoadError { module: String, cause: String },

    #[error("unknown service '{0}'")]
    UnknownService(String),

    #[error("unknown method '{service}.{method}'")]
    UnknownMethod { service: String, method: String },

    #[error("handler failed: {0}")]
    Handler(String),

    #[error("malformed frame: {0}")]
    Protocol(String),

    #[error("remote call failed: {0}")]
    Call(Failure),

    #[error("call failed with status {0}")]
    Status(u16),

    #[error("sandbox error: {0}")]
    Sandbox(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ApiaryError>;
