//! Apiary Common Types and Transport
//!
//! This crate provides the protocol definitions and the persistent-transport
//! framing shared by the apiary server and client.
//!
//! # Overview
//!
//! Apiary is a small RPC framework: a server exposes named services (each a
//! table of methods backed by one dynamically loaded module) over either a
//! persistent framed TCP connection or stateless HTTP requests. This crate
//! contains the pieces both ends agree on:
//!
//! - **Protocol Layer**: call/result envelopes and the error taxonomy
//! - **Transport Layer**: JSON codec and length-prefixed frame I/O
//!
//! # Wire Format
//!
//! The persistent transport sends one JSON document per frame:
//! `[4-byte length prefix as u32 big-endian] + [JSON data]`. A call frame is
//! `{"name": <service>, "method": <method>, "args": [...]}`; the reply frame
//! is the raw result value, or `{"error": {"kind": ..., "message": ...}}` on
//! failure. When the optional correlation id is in play both frames carry an
//! `"id"` field (see [`protocol::envelope`]).

pub mod protocol;
pub mod transport;

pub use protocol::envelope::{CallEnvelope, Failure, FailureKind, ResultEnvelope};
pub use protocol::error::{ApiaryError, Result};
