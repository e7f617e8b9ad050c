//! Persistent transport integration tests.
//!
//! These talk to a live frame server with a raw tokio TCP stream, using the
//! shared frame helpers, to pin the wire behavior down at the byte level.

use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpStream;

use apiary_common::transport::frame::{read_frame, write_frame};
use apiary_server::{CapabilitySet, Dispatcher, FrameServer, Loader, LoaderConfig};

async fn start_server(modules: &[(&str, &str)]) -> SocketAddr {
    let dir = TempDir::new().unwrap();
    for (file_name, source) in modules {
        fs::write(dir.path().join(file_name), source).unwrap();
    }

    let capabilities = CapabilitySet::in_memory();
    let loader = Loader::new(capabilities.clone(), LoaderConfig::default());
    let registry = Arc::new(loader.load_dir(dir.path()).unwrap());
    let dispatcher = Arc::new(Dispatcher::new(registry, capabilities));

    let server = FrameServer::bind("127.0.0.1:0".parse().unwrap(), dispatcher)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

async fn round_trip(stream: &mut TcpStream, frame: &Value) -> Value {
    write_frame(stream, &serde_json::to_vec(frame).unwrap())
        .await
        .unwrap();
    let reply = read_frame(stream).await.unwrap().unwrap();
    serde_json::from_slice(&reply).unwrap()
}

const USER_MODULE: &str = "({ read: (id) => ({ id: id, name: 'x' }) })";

#[tokio::test]
async fn next_frame_is_the_raw_result() {
    let addr = start_server(&[("user.js", USER_MODULE)]).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let reply = round_trip(
        &mut stream,
        &json!({"name": "user", "method": "read", "args": [3]}),
    )
    .await;

    assert_eq!(reply, json!({"id": 3, "name": "x"}));
}

#[tokio::test]
async fn responses_follow_requests_on_one_connection() {
    let addr = start_server(&[("user.js", USER_MODULE)]).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    for id in [1, 2, 3] {
        let reply = round_trip(
            &mut stream,
            &json!({"name": "user", "method": "read", "args": [id]}),
        )
        .await;
        assert_eq!(reply, json!({"id": id, "name": "x"}));
    }
}

#[tokio::test]
async fn unknown_targets_come_back_as_failure_frames() {
    let addr = start_server(&[("user.js", USER_MODULE)]).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let reply = round_trip(
        &mut stream,
        &json!({"name": "city", "method": "read", "args": []}),
    )
    .await;
    assert_eq!(reply["error"]["kind"], json!("unknownService"));

    let reply = round_trip(
        &mut stream,
        &json!({"name": "user", "method": "delete", "args": []}),
    )
    .await;
    assert_eq!(reply["error"]["kind"], json!("unknownMethod"));
}

#[tokio::test]
async fn malformed_frame_is_dropped_without_closing_the_connection() {
    let addr = start_server(&[("user.js", USER_MODULE)]).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    write_frame(&mut stream, b"this is not json").await.unwrap();
    let reply: Value =
        serde_json::from_slice(&read_frame(&mut stream).await.unwrap().unwrap()).unwrap();
    assert_eq!(reply["error"]["kind"], json!("protocolError"));

    // The same connection still serves well-formed calls.
    let reply = round_trip(
        &mut stream,
        &json!({"name": "user", "method": "read", "args": [7]}),
    )
    .await;
    assert_eq!(reply, json!({"id": 7, "name": "x"}));
}

#[tokio::test]
async fn correlated_calls_echo_their_id() {
    let addr = start_server(&[("user.js", USER_MODULE)]).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let reply = round_trip(
        &mut stream,
        &json!({"id": 21, "name": "user", "method": "read", "args": [3]}),
    )
    .await;

    assert_eq!(reply, json!({"id": 21, "result": {"id": 3, "name": "x"}}));
}

#[tokio::test]
async fn handler_failure_is_reported_per_call() {
    let addr = start_server(&[(
        "user.js",
        r#"({
            ok: () => 'fine',
            explode: () => { throw new Error('kaboom'); },
        })"#,
    )])
    .await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let reply = round_trip(
        &mut stream,
        &json!({"name": "user", "method": "explode", "args": []}),
    )
    .await;
    assert_eq!(reply["error"]["kind"], json!("handlerError"));

    let reply = round_trip(
        &mut stream,
        &json!({"name": "user", "method": "ok", "args": []}),
    )
    .await;
    assert_eq!(reply, json!("fine"));
}

#[tokio::test]
async fn connections_dispatch_concurrently() {
    let addr = start_server(&[
        ("alpha.js", "({ get: () => 'alpha' })"),
        ("beta.js", "({ get: () => 'beta' })"),
    ])
    .await;

    let call = |service: &'static str| async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        round_trip(
            &mut stream,
            &json!({"name": service, "method": "get", "args": []}),
        )
        .await
    };

    let (alpha, beta) = tokio::join!(call("alpha"), call("beta"));

    assert_eq!(alpha, json!("alpha"));
    assert_eq!(beta, json!("beta"));
}
