//! Capability bindings for service modules.
//!
//! This is the SINGLE place where host facilities cross into the JavaScript
//! context. A module gets exactly three globals:
//!
//! - `console.log/dir/debug/error/system/access(...)` — forwarded to the
//!   host log under the `service` target with the matching level
//! - `db.read/write/remove/find(...)` — the injected [`Storage`] accessor
//! - `common.hash(text)` — SHA-256 hex digest of a string
//!
//! The storage `Arc` is cloned into the closures that need it; nothing is
//! stored as a raw pointer and modules cannot reach the `Arc` itself.

use std::sync::Arc;

use boa_engine::native_function::NativeFunction;
use boa_engine::object::{FunctionObjectBuilder, JsObject};
use boa_engine::property::Attribute;
use boa_engine::{js_string, value::JsValue, Context, JsNativeError, JsResult};
use boa_gc::{empty_trace, Finalize, Trace};
use sha2::{Digest, Sha256};

use apiary_common::{ApiaryError, Result};

use crate::capabilities::{CapabilitySet, Storage};
use crate::sandbox::conversions::{js_to_json, json_to_js};

/// Capture wrapper so the storage handle can ride inside native closures.
/// It holds no GC pointers, so tracing it is a no-op.
#[derive(Clone)]
struct StorageCapture(Arc<dyn Storage>);

impl Finalize for StorageCapture {}

// SAFETY: `StorageCapture` contains no `Gc` pointers.
unsafe impl Trace for StorageCapture {
    empty_trace!();
}

/// Install the capability set into a fresh context.
pub(crate) fn install(ctx: &mut Context, capabilities: &CapabilitySet) -> Result<()> {
    install_console(ctx)?;
    install_db(ctx, &capabilities.storage)?;
    install_common(ctx)?;
    Ok(())
}

fn register(ctx: &mut Context, name: &str, object: JsObject) -> Result<()> {
    ctx.register_global_property(js_string!(name), object, Attribute::all())
        .map_err(|e| ApiaryError::Sandbox(format!("failed to register '{name}': {e}")))
}

fn set_method(
    ctx: &mut Context,
    object: &JsObject,
    name: &str,
    function: NativeFunction,
) -> Result<()> {
    let function = FunctionObjectBuilder::new(ctx.realm(), function).build();
    object
        .set(js_string!(name), function, false, ctx)
        .map_err(|e| ApiaryError::Sandbox(format!("failed to bind '{name}': {e}")))
}

fn join_args(args: &[JsValue]) -> String {
    args.iter()
        .map(|v| v.display().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn install_console(ctx: &mut Context) -> Result<()> {
    let console = JsObject::with_object_proto(ctx.intrinsics());

    // The original logger's level set; dir/system/access collapse to info.
    for name in ["log", "dir", "system", "access"] {
        let info = NativeFunction::from_copy_closure(|_this, args, _ctx| {
            tracing::info!(target: "service", "{}", join_args(args));
            Ok(JsValue::undefined())
        });
        set_method(ctx, &console, name, info)?;
    }

    let debug = NativeFunction::from_copy_closure(|_this, args, _ctx| {
        tracing::debug!(target: "service", "{}", join_args(args));
        Ok(JsValue::undefined())
    });
    set_method(ctx, &console, "debug", debug)?;

    let error = NativeFunction::from_copy_closure(|_this, args, _ctx| {
        tracing::error!(target: "service", "{}", join_args(args));
        Ok(JsValue::undefined())
    });
    set_method(ctx, &console, "error", error)?;

    register(ctx, "console", console)
}

fn string_arg(args: &[JsValue], index: usize, name: &str) -> JsResult<String> {
    args.get(index)
        .and_then(|v| v.as_string())
        .map(|s| s.to_std_string_escaped())
        .ok_or_else(|| {
            JsNativeError::typ()
                .with_message(format!("argument '{name}' must be a string"))
                .into()
        })
}

fn storage_err(e: ApiaryError) -> boa_engine::JsError {
    JsNativeError::error().with_message(e.to_string()).into()
}

fn install_db(ctx: &mut Context, storage: &Arc<dyn Storage>) -> Result<()> {
    let db = JsObject::with_object_proto(ctx.intrinsics());

    let read = NativeFunction::from_copy_closure_with_captures(
        |_this, args, storage: &StorageCapture, ctx| {
            let table = string_arg(args, 0, "table")?;
            let id = string_arg(args, 1, "id")?;
            match storage.0.read(&table, &id).map_err(storage_err)? {
                Some(record) => json_to_js(record, ctx).map_err(storage_err),
                None => Ok(JsValue::null()),
            }
        },
        StorageCapture(Arc::clone(storage)),
    );
    set_method(ctx, &db, "read", read)?;

    let write = NativeFunction::from_copy_closure_with_captures(
        |_this, args, storage: &StorageCapture, ctx| {
            let table = string_arg(args, 0, "table")?;
            let id = string_arg(args, 1, "id")?;
            let record = args.get(2).cloned().unwrap_or(JsValue::undefined());
            let record = js_to_json(&record, ctx).map_err(storage_err)?;
            storage.0.write(&table, &id, record).map_err(storage_err)?;
            Ok(JsValue::undefined())
        },
        StorageCapture(Arc::clone(storage)),
    );
    set_method(ctx, &db, "write", write)?;

    let remove = NativeFunction::from_copy_closure_with_captures(
        |_this, args, storage: &StorageCapture, _ctx| {
            let table = string_arg(args, 0, "table")?;
            let id = string_arg(args, 1, "id")?;
            let removed = storage.0.remove(&table, &id).map_err(storage_err)?;
            Ok(JsValue::new(removed))
        },
        StorageCapture(Arc::clone(storage)),
    );
    set_method(ctx, &db, "remove", remove)?;

    let find = NativeFunction::from_copy_closure_with_captures(
        |_this, args, storage: &StorageCapture, ctx| {
            let table = string_arg(args, 0, "table")?;
            let mask = string_arg(args, 1, "mask")?;
            let records = storage.0.find(&table, &mask).map_err(storage_err)?;
            json_to_js(serde_json::Value::Array(records), ctx).map_err(storage_err)
        },
        StorageCapture(Arc::clone(storage)),
    );
    set_method(ctx, &db, "find", find)?;

    register(ctx, "db", db)
}

fn install_common(ctx: &mut Context) -> Result<()> {
    let common = JsObject::with_object_proto(ctx.intrinsics());

    let hash = NativeFunction::from_copy_closure(|_this, args, _ctx| {
        let text = string_arg(args, 0, "text")?;
        let digest = Sha256::digest(text.as_bytes());
        Ok(JsValue::new(js_string!(hex::encode(digest))))
    });
    set_method(ctx, &common, "hash", hash)?;

    register(ctx, "common", common)
}
