//! Persistent-connection transport adapter.
//!
//! Accepts TCP connections and speaks length-prefixed JSON frames. Each
//! connection is a loop of `receive frame -> dispatch -> send frame`:
//! responses follow their requests on the same connection, while separate
//! connections dispatch concurrently on their own tasks. A frame whose
//! payload fails to parse is answered with a protocol failure and the
//! connection stays open; framing-level corruption closes it. Nothing is
//! queued past a disconnect (at-most-once per call).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};

use apiary_common::transport::frame::{read_frame, write_frame};
use apiary_common::transport::JsonCodec;
use apiary_common::{ApiaryError, Failure, FailureKind, Result, ResultEnvelope};

use crate::dispatcher::Dispatcher;

pub struct FrameServer {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
}

impl FrameServer {
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
        tracing::info!("frame server listening on {}", self.local_addr()?);

        loop {
            let (stream, peer) = self
                .listener
                .accept()
                .await
                .map_err(|e| ApiaryError::Transport(format!("failed to accept connection: {e}")))?;

            let dispatcher = self.dispatcher.clone();
            tokio::spawn(async move {
                tracing::debug!("connection established from {peer}");
                if let Err(e) = handle_connection(stream, dispatcher).await {
                    tracing::debug!("connection from {peer} ended: {e}");
                }
            });
        }
    }
}

async fn handle_connection(mut stream: TcpStream, dispatcher: Arc<Dispatcher>) -> Result<()> {
    loop {
        let Some(bytes) = read_frame(&mut stream).await? else {
            return Ok(());
        };

        let call = match JsonCodec::decode_call(&bytes) {
            Ok(call) => call,
            Err(e) => {
                tracing::debug!("dropping malformed frame: {e}");
                let reply =
                    ResultEnvelope::failure(None, Failure::new(FailureKind::ProtocolError, e.to_string()));
                send_result(&mut stream, &reply).await?;
                continue;
            }
        };

        let reply = dispatcher.dispatch_envelope(call).await;
        send_result(&mut stream, &reply).await?;
    }
}

async fn send_result(stream: &mut TcpStream, reply: &ResultEnvelope) -> Result<()> {
    let bytes = JsonCodec::encode_result(reply)?;
    write_frame(stream, &bytes).await
}
