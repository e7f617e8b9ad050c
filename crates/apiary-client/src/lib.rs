//! Apiary Client
//!
//! Call remote services as local async calls. The address scheme picks the
//! transport once at construction: `tcp://host:port` opens a persistent
//! framed connection, `http://host:port` issues independent stateless
//! requests.
//!
//! ```no_run
//! use apiary_client::Api;
//! use serde_json::json;
//!
//! # async fn run() -> apiary_common::Result<()> {
//! let structure = serde_json::from_value(json!({
//!     "user": { "read": ["id"], "create": ["record"] },
//! })).expect("static structure");
//!
//! let api = Api::connect("tcp://127.0.0.1:8001", structure).await?;
//! let user = api.service("user")?.invoke("read", vec![json!(3)]).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod proxy;

pub use client::RpcClient;
pub use proxy::{Api, ApiStructure, ServiceProxy};
