use boa_engine::builtins::promise::PromiseState;
use boa_engine::object::builtins::JsPromise;
use boa_engine::object::JsObject;
use boa_engine::{js_string, value::JsValue, Context, Source};
use serde_json::Value as JsonValue;

use apiary_common::{ApiaryError, Result};

use crate::capabilities::CapabilitySet;
use crate::sandbox::{bindings, conversions};

/// Backstop so an abandoned initialization (see the loader's watchdog)
/// terminates itself instead of spinning forever. Far above anything a
/// legitimate module does within a load budget.
const LOOP_ITERATION_LIMIT: u64 = 1 << 31;

/// One instantiated service module.
///
/// Evaluating the module source must yield an object whose own function
/// properties are the service's methods, e.g.
///
/// ```text
/// ({
///   read: (id) => ({ id, name: 'x' }),
/// })
/// ```
///
/// The context is not thread-safe and is never shared: the loader builds one
/// on a watchdog thread to validate the module, and the dispatcher builds a
/// fresh one per invocation on a blocking thread.
pub struct ServiceContext {
    ctx: Context,
    table: JsObject,
}

impl ServiceContext {
    /// Evaluate a module inside a fresh context wired to `capabilities`.
    pub fn instantiate(source: &str, capabilities: &CapabilitySet) -> Result<Self> {
        let mut ctx = Context::default();
        ctx.runtime_limits_mut().set_loop_iteration_limit(LOOP_ITERATION_LIMIT);

        bindings::install(&mut ctx, capabilities)?;

        let value = ctx
            .eval(Source::from_bytes(source))
            .map_err(|e| ApiaryError::Sandbox(format!("module evaluation failed: {e}")))?;

        let table = value
            .as_object()
            .cloned()
            .ok_or_else(|| ApiaryError::Sandbox("module must evaluate to an object of functions".into()))?;

        Ok(Self { ctx, table })
    }

    /// The names of the module's callable properties, in property order.
    pub fn method_names(&mut self) -> Result<Vec<String>> {
        let keys = self
            .table
            .own_property_keys(&mut self.ctx)
            .map_err(|e| ApiaryError::Sandbox(format!("failed to enumerate methods: {e}")))?;

        let mut names = Vec::new();
        for key in keys {
            let name = match key.as_string() {
                Some(s) => s.to_std_string_escaped(),
                None => continue,
            };
            let value = self
                .table
                .get(key, &mut self.ctx)
                .map_err(|e| ApiaryError::Sandbox(format!("failed to read method '{name}': {e}")))?;
            if value.as_object().map_or(false, |o| o.is_callable()) {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Invoke one method with `args` unpacked positionally.
    ///
    /// A throw inside the handler, or a rejected promise from an async
    /// handler, comes back as [`ApiaryError::Handler`] carrying the original
    /// message.
    pub fn invoke(&mut self, method: &str, args: &[JsonValue]) -> Result<JsonValue> {
        let function = self
            .table
            .get(js_string!(method), &mut self.ctx)
            .map_err(|e| ApiaryError::Sandbox(format!("method '{method}' lookup error: {e}")))?;

        let function = function
            .as_object()
            .filter(|o| o.is_callable())
            .cloned()
            .ok_or_else(|| ApiaryError::Sandbox(format!("'{method}' is not a function")))?;

        let mut js_args = Vec::with_capacity(args.len());
        for arg in args {
            js_args.push(conversions::json_to_js(arg.clone(), &mut self.ctx)?);
        }

        let result = function
            .call(&JsValue::undefined(), &js_args, &mut self.ctx)
            .map_err(|e| ApiaryError::Handler(e.to_string()))?;

        self.resolve(result)
    }

    /// Settle a handler result, draining the job queue if it is a promise.
    fn resolve(&mut self, value: JsValue) -> Result<JsonValue> {
        let promise = value
            .as_object()
            .cloned()
            .and_then(|o| JsPromise::from_object(o).ok());

        let Some(promise) = promise else {
            return conversions::js_to_json(&value, &mut self.ctx);
        };

        let _ = self.ctx.run_jobs();
        match promise.state() {
            PromiseState::Fulfilled(settled) => conversions::js_to_json(&settled, &mut self.ctx),
            PromiseState::Rejected(reason) => {
                Err(ApiaryError::Handler(reason.display().to_string()))
            }
            PromiseState::Pending => Err(ApiaryError::Handler(
                "handler returned a promise that never settled".into(),
            )),
        }
    }
}
