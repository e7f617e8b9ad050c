//! Transport-selecting RPC client.
//!
//! The two transports form a closed set picked once from the address scheme.
//! The persistent variant keeps one framed TCP connection; without
//! correlation ids the next inbound frame IS the response, so the connection
//! lock is held across the whole send/receive pair and calls on one client
//! are single-in-flight (overlapping callers queue on the lock). Enabling
//! correlation puts a monotonic id on each call envelope and verifies it on
//! the reply; the stateless variant opens an independent request per call
//! and needs neither.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use apiary_common::transport::frame::{read_frame, write_frame};
use apiary_common::transport::JsonCodec;
use apiary_common::{ApiaryError, CallEnvelope, Result, ResultEnvelope};

pub struct RpcClient {
    transport: Transport,
}

enum Transport {
    Frame(FrameTransport),
    Http(HttpTransport),
}

impl RpcClient {
    /// Connect to `url`, selecting the transport from its scheme
    /// (`tcp://` or `http://`/`https://`).
    pub async fn connect(url: &str) -> Result<Self> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| ApiaryError::Connection(format!("address '{url}' has no scheme")))?;

        let transport = match scheme {
            "tcp" => Transport::Frame(FrameTransport::connect(rest).await?),
            "http" | "https" => Transport::Http(HttpTransport::new(url)),
            other => {
                return Err(ApiaryError::Connection(format!(
                    "unsupported scheme '{other}' (expected tcp, http or https)"
                )))
            }
        };

        Ok(Self { transport })
    }

    /// Put explicit correlation ids on persistent-transport calls.
    ///
    /// Off by default to preserve the bare wire shape; no effect on the
    /// stateless transport, which correlates by request.
    pub fn with_correlation(mut self) -> Self {
        if let Transport::Frame(frame) = &mut self.transport {
            frame.correlate = true;
        }
        self
    }

    /// Invoke `service.method(args)` remotely.
    pub async fn call(&self, service: &str, method: &str, args: Vec<Value>) -> Result<Value> {
        match &self.transport {
            Transport::Frame(frame) => frame.call(service, method, args).await,
            Transport::Http(http) => http.call(service, method, args).await,
        }
    }
}

struct FrameTransport {
    stream: Mutex<TcpStream>,
    correlate: bool,
    next_id: AtomicU64,
}

impl FrameTransport {
    async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ApiaryError::Connection(format!("failed to connect to {addr}: {e}")))?;
        stream
            .set_nodelay(true)
            .map_err(|e| ApiaryError::Connection(format!("failed to set nodelay: {e}")))?;

        Ok(Self {
            stream: Mutex::new(stream),
            correlate: false,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call(&self, service: &str, method: &str, args: Vec<Value>) -> Result<Value> {
        let id = self
            .correlate
            .then(|| self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut call = CallEnvelope::new(service, method, args);
        call.id = id;
        let bytes = JsonCodec::encode_call(&call)?;

        // Held across the request/response pair: single-in-flight per
        // connection is what makes next-frame correlation sound.
        let mut stream = self.stream.lock().await;
        write_frame(&mut *stream, &bytes).await?;
        let frame = read_frame(&mut *stream)
            .await?
            .ok_or_else(|| ApiaryError::Connection("connection closed before response".into()))?;
        drop(stream);

        let decoded = JsonCodec::decode_frame(&frame)?;
        match ResultEnvelope::from_wire(decoded, id)? {
            ResultEnvelope::Success { value, .. } => Ok(value),
            ResultEnvelope::Failure { failure, .. } => Err(ApiaryError::Call(failure)),
        }
    }
}

struct HttpTransport {
    client: reqwest::Client,
    base: String,
}

impl HttpTransport {
    fn new(base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
        }
    }

    async fn call(&self, service: &str, method: &str, args: Vec<Value>) -> Result<Value> {
        let url = format!("{}/{}/{}", self.base, service, method);

        let response = self
            .client
            .post(&url)
            .json(&args)
            .send()
            .await
            .map_err(|e| ApiaryError::Transport(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            // The status code alone signals failure on this transport.
            return Err(ApiaryError::Status(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| ApiaryError::Protocol(format!("invalid response body: {e}")))
    }
}
