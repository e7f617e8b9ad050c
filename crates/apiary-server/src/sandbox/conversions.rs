//! JSON <-> JavaScript value conversions.
//!
//! Arguments arrive from the wire as `serde_json::Value` and handler results
//! leave the same way. Notable rules:
//!
//! - `undefined` and `null` both become JSON `null`
//! - whole numbers survive as JSON integers, everything else as doubles
//! - non-finite numbers become JSON `null`
//! - symbol keys are skipped during object conversion

use boa_engine::object::builtins::JsArray;
use boa_engine::object::JsObject;
use boa_engine::{js_string, value::JsValue, Context};
use serde_json::Value as JsonValue;

use apiary_common::{ApiaryError, Result};

/// Convert a JSON value into its JavaScript equivalent.
pub fn json_to_js(json: JsonValue, ctx: &mut Context) -> Result<JsValue> {
    match json {
        JsonValue::Null => Ok(JsValue::null()),
        JsonValue::Bool(b) => Ok(JsValue::new(b)),
        JsonValue::Number(n) => n
            .as_f64()
            .map(JsValue::new)
            .or_else(|| n.as_i64().map(JsValue::new))
            .ok_or_else(|| ApiaryError::Sandbox("number out of range".into())),
        JsonValue::String(s) => Ok(JsValue::new(js_string!(s))),
        JsonValue::Array(items) => {
            let array = JsArray::new(ctx);
            for (i, item) in items.into_iter().enumerate() {
                let value = json_to_js(item, ctx)?;
                array.push(value, ctx).map_err(|e| {
                    ApiaryError::Sandbox(format!("failed to push array element {i}: {e}"))
                })?;
            }
            Ok(array.into())
        }
        JsonValue::Object(entries) => {
            let object = JsObject::with_object_proto(ctx.intrinsics());
            for (key, value) in entries {
                let js_value = json_to_js(value, ctx)?;
                object
                    .create_data_property_or_throw(js_string!(key.clone()), js_value, ctx)
                    .map_err(|e| {
                        ApiaryError::Sandbox(format!("failed to set property '{key}': {e}"))
                    })?;
            }
            Ok(object.into())
        }
    }
}

/// Convert a JavaScript value into its JSON equivalent.
pub fn js_to_json(value: &JsValue, ctx: &mut Context) -> Result<JsonValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(JsonValue::Null);
    }
    if let Some(b) = value.as_boolean() {
        return Ok(JsonValue::Bool(b));
    }
    if let Some(n) = value.as_number() {
        return Ok(number_to_json(n));
    }
    if let Some(s) = value.as_string() {
        return Ok(JsonValue::String(s.to_std_string_escaped()));
    }
    if let Some(object) = value.as_object() {
        let object = object.clone();
        if object.is_callable() {
            return Ok(JsonValue::Null);
        }
        if object.is_array() {
            let array = JsArray::from_object(object)
                .map_err(|e| ApiaryError::Sandbox(format!("not an array after all: {e}")))?;
            let len = array
                .length(ctx)
                .map_err(|e| ApiaryError::Sandbox(format!("failed to read array length: {e}")))?;
            let mut items = Vec::with_capacity(len as usize);
            for i in 0..len {
                let item = array
                    .get(i as u32, ctx)
                    .map_err(|e| ApiaryError::Sandbox(format!("failed to read element {i}: {e}")))?;
                items.push(js_to_json(&item, ctx)?);
            }
            return Ok(JsonValue::Array(items));
        }

        let keys = object
            .own_property_keys(ctx)
            .map_err(|e| ApiaryError::Sandbox(format!("failed to enumerate properties: {e}")))?;
        let mut map = serde_json::Map::new();
        for key in keys {
            let name = match key.as_string() {
                Some(s) => s.to_std_string_escaped(),
                None => continue,
            };
            let property = object
                .get(key, ctx)
                .map_err(|e| ApiaryError::Sandbox(format!("failed to read property '{name}': {e}")))?;
            map.insert(name, js_to_json(&property, ctx)?);
        }
        return Ok(JsonValue::Object(map));
    }

    // Symbols and the rest have no JSON representation.
    Ok(JsonValue::Null)
}

fn number_to_json(n: f64) -> JsonValue {
    if !n.is_finite() {
        return JsonValue::Null;
    }
    if n.fract() == 0.0 && n.abs() <= i64::MAX as f64 {
        return JsonValue::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}
