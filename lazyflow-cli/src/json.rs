//! JSON output of runtime values.
//!
//! Objects keep their key order. Numbers without a fractional part print as
//! integers; NaN and infinities have no JSON form and print as `null`.

use lazyflow_common::Value;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Serializes a [`Value`] as JSON.
pub struct JsonValue<'a>(pub &'a Value);

// Largest magnitude below which every integer is exact in an f64.
const MAX_EXACT: f64 = 9_007_199_254_740_992.0;

impl Serialize for JsonValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Number(n) if !n.is_finite() => serializer.serialize_unit(),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < MAX_EXACT => {
                serializer.serialize_i64(*n as i64)
            }
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(&JsonValue(item))?;
                }
                seq.end()
            }
            Value::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, value) in fields.iter() {
                    map.serialize_entry(key, &JsonValue(value))?;
                }
                map.end()
            }
            Value::Thunk(thunk) => match thunk.result() {
                Some(value) => JsonValue(value).serialize(serializer),
                None => serializer.serialize_str("<thunk>"),
            },
            Value::Chunk(_) => serializer.collect_str(self.0),
        }
    }
}

/// Render a value as compact JSON text.
pub fn to_json(value: &Value) -> String {
    // Serializing into a String cannot fail for this type.
    serde_json::to_string(&JsonValue(value)).unwrap_or_else(|_| "null".to_string())
}
