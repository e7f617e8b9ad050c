//! Transport-independent call dispatch.
//!
//! `dispatch(service, method, args)` resolves the target in the registry and
//! invokes the handler on a blocking thread with a fresh sandbox context.
//! This layer does not log and does not persist; side effects belong to the
//! handler, which reaches the host only through its capability set. No
//! per-call timeout is imposed here (only module load is time-bounded).

use std::sync::Arc;

use serde_json::Value;

use apiary_common::{ApiaryError, CallEnvelope, Failure, Result, ResultEnvelope};

use crate::capabilities::CapabilitySet;
use crate::registry::Registry;
use crate::sandbox::ServiceContext;

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    capabilities: CapabilitySet,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, capabilities: CapabilitySet) -> Self {
        Dispatcher { registry, capabilities }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Resolve and invoke one handler.
    ///
    /// Unknown targets fail before any context is spun up. Handler failures
    /// of any shape come back as [`ApiaryError::Handler`] with the original
    /// message; one failing call never affects another.
    pub async fn dispatch(&self, service: &str, method: &str, args: Vec<Value>) -> Result<Value> {
        let definition = self
            .registry
            .get(service)
            .ok_or_else(|| ApiaryError::UnknownService(service.to_string()))?;

        if !definition.has_method(method) {
            return Err(ApiaryError::UnknownMethod {
                service: service.to_string(),
                method: method.to_string(),
            });
        }

        let source = definition.source();
        let capabilities = self.capabilities.clone();
        let method = method.to_string();

        let outcome = tokio::task::spawn_blocking(move || {
            let mut context = ServiceContext::instantiate(&source, &capabilities)?;
            context.invoke(&method, &args)
        })
        .await
        .map_err(|e| ApiaryError::Handler(format!("handler task failed: {e}")))?;

        outcome.map_err(|e| match e {
            already @ ApiaryError::Handler(_) => already,
            other => ApiaryError::Handler(other.to_string()),
        })
    }

    /// Envelope-level dispatch for the framed transport: one call envelope
    /// in, exactly one result envelope out, correlation id echoed.
    pub async fn dispatch_envelope(&self, call: CallEnvelope) -> ResultEnvelope {
        let id = call.id;
        match self.dispatch(&call.name, &call.method, call.args).await {
            Ok(value) => ResultEnvelope::success(id, value),
            Err(e) => ResultEnvelope::failure(id, Failure::from_error(&e)),
        }
    }
}
