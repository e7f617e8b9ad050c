use serde_json::json;

use crate::protocol::envelope::{CallEnvelope, Failure, FailureKind, ResultEnvelope};
use crate::protocol::error::ApiaryError;
use crate::transport::codec::JsonCodec;
use crate::transport::frame::{read_frame, write_frame, MAX_FRAME_BYTES};

#[test]
fn codec_call_round_trip() {
    let call = CallEnvelope::new("user", "read", vec![json!(3)]);

    let encoded = JsonCodec::encode_call(&call).unwrap();
    let decoded = JsonCodec::decode_call(&encoded).unwrap();

    assert_eq!(call, decoded);
}

#[test]
fn codec_rejects_malformed_calls_as_protocol_errors() {
    let err = JsonCodec::decode_call(b"not json at all").unwrap_err();
    assert!(matches!(err, ApiaryError::Protocol(_)));

    let err = JsonCodec::decode_call(br#"{"method":"read"}"#).unwrap_err();
    assert!(matches!(err, ApiaryError::Protocol(_)));
}

#[test]
fn codec_result_frames() {
    let envelope = ResultEnvelope::failure(
        None,
        Failure::new(FailureKind::UnknownService, "unknown service 'x'"),
    );

    let encoded = JsonCodec::encode_result(&envelope).unwrap();
    let frame = JsonCodec::decode_frame(&encoded).unwrap();

    assert_eq!(ResultEnvelope::from_wire(frame, None).unwrap(), envelope);
}

#[tokio::test]
async fn frame_round_trip() {
    let (mut client, mut server) = tokio::io::duplex(1024);

    write_frame(&mut client, br#"{"name":"user","method":"read","args":[3]}"#)
        .await
        .unwrap();

    let frame = read_frame(&mut server).await.unwrap().unwrap();
    let call = JsonCodec::decode_call(&frame).unwrap();

    assert_eq!(call.name, "user");
    assert_eq!(call.method, "read");
    assert_eq!(call.args, vec![json!(3)]);
}

#[tokio::test]
async fn frame_read_reports_clean_eof_as_none() {
    let (client, mut server) = tokio::io::duplex(64);
    drop(client);

    assert!(read_frame(&mut server).await.unwrap().is_none());
}

#[tokio::test]
async fn frame_read_rejects_oversized_lengths() {
    let (mut client, mut server) = tokio::io::duplex(64);

    let len = (MAX_FRAME_BYTES as u32) + 1;
    tokio::io::AsyncWriteExt::write_all(&mut client, &len.to_be_bytes())
        .await
        .unwrap();

    let err = read_frame(&mut server).await.unwrap_err();
    assert!(matches!(err, ApiaryError::Protocol(_)));
}

#[tokio::test]
async fn frame_read_treats_truncation_as_connection_error() {
    let (mut client, mut server) = tokio::io::duplex(64);

    tokio::io::AsyncWriteExt::write_all(&mut client, &8u32.to_be_bytes())
        .await
        .unwrap();
    tokio::io::AsyncWriteExt::write_all(&mut client, b"abc").await.unwrap();
    drop(client);

    let err = read_frame(&mut server).await.unwrap_err();
    assert!(matches!(err, ApiaryError::Connection(_)));
}
