//! Stateless transport adapter.
//!
//! Serves `POST /<service>/<method>` with a JSON array body as the argument
//! list. Success is status 200 with the return value as the JSON body;
//! failure is signalled by the status code alone (the body is a short plain
//! message, not guaranteed structured):
//!
//! - 404 — unknown service or method
//! - 400 — malformed path or body
//! - 405 — anything but POST
//! - 500 — handler failure
//!
//! No state is kept between requests; each connection runs on its own task.

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use tokio::net::TcpListener;

use apiary_common::{ApiaryError, Result};

use crate::dispatcher::Dispatcher;

pub type HyperRequest = Request<Incoming>;
pub type HyperResponse = Response<Full<Bytes>>;

pub struct HttpServer {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
}

impl HttpServer {
    pub async fn bind(addr: SocketAddr, dispatcher: Arc<Dispatcher>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiaryError::Transport(format!("failed to bind to {addr}: {e}")))?;
        Ok(Self { listener, dispatcher })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| ApiaryError::Transport(format!("failed to get local address: {e}")))
    }

    pub async fn run(self) -> Result<()> {
        tracing::info!("http server listening on {}", self.local_addr()?);

        loop {
            let (stream, _) = self
                .listener
                .accept()
                .await
                .map_err(|e| ApiaryError::Transport(format!("failed to accept connection: {e}")))?;

            let io = TokioIo::new(stream);
            let dispatcher = self.dispatcher.clone();

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let dispatcher = dispatcher.clone();
                    async move { handle_request(dispatcher, req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::error!("error serving connection: {err}");
                }
            });
        }
    }
}

async fn handle_request(
    dispatcher: Arc<Dispatcher>,
    req: HyperRequest,
) -> Result<HyperResponse> {
    if req.method() != hyper::Method::POST {
        return Ok(plain_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "only POST is supported",
        ));
    }

    let path = req.uri().path().to_string();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let (service, method) = match segments.as_slice() {
        [service, method] => (service.to_string(), method.to_string()),
        _ => {
            return Ok(plain_response(
                StatusCode::BAD_REQUEST,
                "expected /<service>/<method>",
            ));
        }
    };

    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| ApiaryError::Transport(format!("failed to read request body: {e}")))?
        .to_bytes();

    let args: Vec<Value> = if body.is_empty() {
        Vec::new()
    } else {
        match serde_json::from_slice(&body) {
            Ok(args) => args,
            Err(e) => {
                return Ok(plain_response(
                    StatusCode::BAD_REQUEST,
                    format!("body must be a JSON array of arguments: {e}"),
                ));
            }
        }
    };

    match dispatcher.dispatch(&service, &method, args).await {
        Ok(value) => Ok(json_response(StatusCode::OK, &value)),
        Err(e) => {
            let status = match &e {
                ApiaryError::UnknownService(_) | ApiaryError::UnknownMethod { .. } => {
                    StatusCode::NOT_FOUND
                }
                ApiaryError::Protocol(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            tracing::debug!("call {service}/{method} failed: {e}");
            Ok(plain_response(status, e.to_string()))
        }
    }
}

fn json_response(status: StatusCode, value: &Value) -> HyperResponse {
    let body = serde_json::to_vec(value).unwrap_or_default();

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

fn plain_response(status: StatusCode, message: impl Into<String>) -> HyperResponse {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from(message.into())))
        .unwrap()
}
