//! End-to-end client tests against live servers on ephemeral ports.

use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;

use apiary_client::{Api, ApiStructure, RpcClient};
use apiary_common::ApiaryError;
use apiary_server::{CapabilitySet, Dispatcher, FrameServer, HttpServer, Loader, LoaderConfig};

const USER_MODULE: &str = r#"({
    read: (id) => ({ id: id, name: 'x' }),
    sum: (a, b) => a + b,
    explode: () => { throw new Error('kaboom'); },
})"#;

fn dispatcher_for(modules: &[(&str, &str)]) -> Arc<Dispatcher> {
    let dir = TempDir::new().unwrap();
    for (file_name, source) in modules {
        fs::write(dir.path().join(file_name), source).unwrap();
    }
    let capabilities = CapabilitySet::in_memory();
    let loader = Loader::new(capabilities.clone(), LoaderConfig::default());
    let registry = Arc::new(loader.load_dir(dir.path()).unwrap());
    Arc::new(Dispatcher::new(registry, capabilities))
}

async fn start_http(modules: &[(&str, &str)]) -> SocketAddr {
    let server = HttpServer::bind("127.0.0.1:0".parse().unwrap(), dispatcher_for(modules))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

async fn start_frame(modules: &[(&str, &str)]) -> SocketAddr {
    let server = FrameServer::bind("127.0.0.1:0".parse().unwrap(), dispatcher_for(modules))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

fn user_structure() -> ApiStructure {
    serde_json::from_value(json!({
        "user": {
            "read": ["id"],
            "sum": ["a", "b"],
            "explode": [],
        },
    }))
    .unwrap()
}

#[tokio::test]
async fn http_round_trip_returns_the_handler_value() {
    let addr = start_http(&[("user.js", USER_MODULE)]).await;

    let api = Api::connect(&format!("http://{addr}"), user_structure())
        .await
        .unwrap();
    let value = api
        .service("user")
        .unwrap()
        .invoke("read", vec![json!(3)])
        .await
        .unwrap();

    assert_eq!(value, json!({"id": 3, "name": "x"}));
}

#[tokio::test]
async fn frame_round_trip_returns_the_handler_value() {
    let addr = start_frame(&[("user.js", USER_MODULE)]).await;

    let api = Api::connect(&format!("tcp://{addr}"), user_structure())
        .await
        .unwrap();
    let value = api
        .service("user")
        .unwrap()
        .invoke("read", vec![json!(3)])
        .await
        .unwrap();

    assert_eq!(value, json!({"id": 3, "name": "x"}));
}

#[tokio::test]
async fn undeclared_targets_fail_locally() {
    // No server at this address; the structure check must trip first.
    let api = Api::connect("http://127.0.0.1:9", user_structure())
        .await
        .unwrap();

    let err = api.service("country").unwrap_err();
    assert!(matches!(err, ApiaryError::UnknownService(name) if name == "country"));

    let err = api
        .service("user")
        .unwrap()
        .invoke("drop", vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, ApiaryError::UnknownMethod { .. }));
}

#[tokio::test]
async fn declared_params_are_descriptive_only() {
    let addr = start_http(&[("user.js", USER_MODULE)]).await;

    let api = Api::connect(&format!("http://{addr}"), user_structure())
        .await
        .unwrap();
    let service = api.service("user").unwrap();

    assert_eq!(
        service.params("sum").unwrap(),
        &["a".to_string(), "b".to_string()]
    );

    // Arity is not enforced; extra args pass through like in JavaScript.
    let value = service
        .invoke("sum", vec![json!(1), json!(2), json!(99)])
        .await
        .unwrap();
    assert_eq!(value, json!(3));
}

#[tokio::test]
async fn http_failure_surfaces_as_a_status() {
    let addr = start_http(&[("user.js", USER_MODULE)]).await;
    let client = RpcClient::connect(&format!("http://{addr}")).await.unwrap();

    let err = client.call("user", "missing", vec![]).await.unwrap_err();
    assert!(matches!(err, ApiaryError::Status(404)));

    let err = client.call("user", "explode", vec![]).await.unwrap_err();
    assert!(matches!(err, ApiaryError::Status(500)));
}

#[tokio::test]
async fn frame_failure_surfaces_as_a_remote_failure() {
    let addr = start_frame(&[("user.js", USER_MODULE)]).await;
    let client = RpcClient::connect(&format!("tcp://{addr}")).await.unwrap();

    let err = client.call("user", "explode", vec![]).await.unwrap_err();
    match err {
        ApiaryError::Call(failure) => {
            assert_eq!(failure.kind, apiary_common::FailureKind::HandlerError);
            assert!(failure.message.contains("kaboom"));
        }
        other => panic!("expected remote failure, got {other}"),
    }
}

#[tokio::test]
async fn frame_calls_queue_on_one_connection() {
    let addr = start_frame(&[("user.js", USER_MODULE)]).await;
    let client = Arc::new(RpcClient::connect(&format!("tcp://{addr}")).await.unwrap());

    // Overlapping calls on a shared connection serialize on the lock and
    // every response lands with its own request.
    let calls = (0..8).map(|i| {
        let client = Arc::clone(&client);
        async move { client.call("user", "read", vec![json!(i)]).await.unwrap() }
    });
    let results: Vec<Value> = futures::future::join_all(calls).await;

    for (i, value) in results.into_iter().enumerate() {
        assert_eq!(value, json!({"id": i, "name": "x"}));
    }
}

#[tokio::test]
async fn correlated_frame_calls_verify_their_ids() {
    let addr = start_frame(&[("user.js", USER_MODULE)]).await;
    let client = RpcClient::connect(&format!("tcp://{addr}"))
        .await
        .unwrap()
        .with_correlation();

    for i in 0..3 {
        let value = client.call("user", "read", vec![json!(i)]).await.unwrap();
        assert_eq!(value, json!({"id": i, "name": "x"}));
    }
}

#[tokio::test]
async fn http_calls_run_concurrently() {
    let addr = start_http(&[("user.js", USER_MODULE)]).await;
    let client = Arc::new(RpcClient::connect(&format!("http://{addr}")).await.unwrap());

    let calls = (0..8).map(|i| {
        let client = Arc::clone(&client);
        async move { client.call("user", "sum", vec![json!(i), json!(i)]).await.unwrap() }
    });
    let results: Vec<Value> = futures::future::join_all(calls).await;

    for (i, value) in results.into_iter().enumerate() {
        assert_eq!(value, json!(2 * i));
    }
}

#[tokio::test]
async fn unsupported_scheme_is_rejected() {
    let err = RpcClient::connect("ftp://127.0.0.1:8001").await.unwrap_err();
    assert!(matches!(err, ApiaryError::Connection(_)));

    let err = RpcClient::connect("127.0.0.1:8001").await.unwrap_err();
    assert!(matches!(err, ApiaryError::Connection(_)));
}
