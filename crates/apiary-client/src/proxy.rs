//! Declarative proxy generation.
//!
//! An [`Api`] is scaffolded from a `{service: {method: [paramNames]}}`
//! structure. The structure only shapes the local surface: parameter names
//! are descriptive, nothing is enforced about them (not even arity), but a
//! service or method missing from the structure fails locally without
//! touching the wire.

use std::collections::BTreeMap;

use serde_json::Value;

use apiary_common::{ApiaryError, Result};

use crate::client::RpcClient;

/// `service -> method -> param names`. Deserializes straight from the JSON
/// shape clients declare, e.g. `{"user": {"read": ["id"]}}`.
pub type ApiStructure = BTreeMap<String, BTreeMap<String, Vec<String>>>;

pub struct Api {
    client: RpcClient,
    structure: ApiStructure,
}

impl Api {
    /// Connect to `url` and scaffold the declared surface over it.
    pub async fn connect(url: &str, structure: ApiStructure) -> Result<Self> {
        let client = RpcClient::connect(url).await?;
        Ok(Self::from_client(client, structure))
    }

    /// Scaffold over an existing client (e.g. one with correlation enabled).
    pub fn from_client(client: RpcClient, structure: ApiStructure) -> Self {
        Api { client, structure }
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.structure.keys().map(String::as_str)
    }

    pub fn service(&self, name: &str) -> Result<ServiceProxy<'_>> {
        let (name, methods) = self
            .structure
            .get_key_value(name)
            .ok_or_else(|| ApiaryError::UnknownService(name.to_string()))?;
        Ok(ServiceProxy {
            client: &self.client,
            name,
            methods,
        })
    }
}

pub struct ServiceProxy<'a> {
    client: &'a RpcClient,
    name: &'a str,
    methods: &'a BTreeMap<String, Vec<String>>,
}

impl ServiceProxy<'_> {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Declared parameter names; descriptive only.
    pub fn params(&self, method: &str) -> Option<&[String]> {
        self.methods.get(method).map(Vec::as_slice)
    }

    /// Call a declared method remotely.
    pub async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        if !self.methods.contains_key(method) {
            return Err(ApiaryError::UnknownMethod {
                service: self.name.to_string(),
                method: method.to_string(),
            });
        }
        self.client.call(self.name, method, args).await
    }
}
