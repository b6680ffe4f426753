// SPDX-License-Identifier: Apache-2.0

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use opentelemetry_proto::tonic::common::v1::AnyValue;
use opentelemetry_proto::tonic::common::v1::any_value::Value;
use serde_json::Number;
use std::collections::BTreeMap;

/// Render an attribute value the way the OpenTelemetry collector stringifies
/// values: scalars in their textual form, bytes as base64 and composite values as
/// compact JSON of their raw contents. Missing values render as the empty string.
pub fn as_string(value: Option<&AnyValue>) -> String {
    match value.and_then(|av| av.value.as_ref()) {
        None => String::new(),
        Some(Value::StringValue(s)) => s.clone(),
        Some(Value::BoolValue(b)) => b.to_string(),
        Some(Value::IntValue(i)) => i.to_string(),
        Some(Value::DoubleValue(d)) => format_double(*d),
        Some(Value::BytesValue(b)) => STANDARD.encode(b),
        Some(v @ (Value::ArrayValue(_) | Value::KvlistValue(_))) => to_raw_json(v).to_string(),
    }
}

/// Name of the value variant, for diagnostics.
pub fn type_name(value: Option<&AnyValue>) -> &'static str {
    match value.and_then(|av| av.value.as_ref()) {
        None => "Empty",
        Some(Value::StringValue(_)) => "Str",
        Some(Value::BoolValue(_)) => "Bool",
        Some(Value::IntValue(_)) => "Int",
        Some(Value::DoubleValue(_)) => "Double",
        Some(Value::BytesValue(_)) => "Bytes",
        Some(Value::ArrayValue(_)) => "Slice",
        Some(Value::KvlistValue(_)) => "Map",
    }
}

/// Convert a value into plain JSON, dropping the protobuf wrapping.
pub fn to_raw_json(value: &Value) -> serde_json::Value {
    match value {
        Value::StringValue(s) => serde_json::Value::String(s.clone()),
        Value::BoolValue(b) => serde_json::Value::Bool(*b),
        Value::IntValue(i) => serde_json::Value::Number((*i).into()),
        Value::DoubleValue(d) => Number::from_f64(*d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::BytesValue(b) => serde_json::Value::String(STANDARD.encode(b)),
        Value::ArrayValue(arr) => serde_json::Value::Array(
            arr.values
                .iter()
                .map(|av| raw_or_null(Some(av)))
                .collect(),
        ),
        Value::KvlistValue(kvs) => {
            // keys sorted, matching the collector's output
            let obj: BTreeMap<String, serde_json::Value> = kvs
                .values
                .iter()
                .map(|kv| (kv.key.clone(), raw_or_null(kv.value.as_ref())))
                .collect();
            serde_json::Value::Object(obj.into_iter().collect())
        }
    }
}

fn raw_or_null(value: Option<&AnyValue>) -> serde_json::Value {
    match value.and_then(|av| av.value.as_ref()) {
        Some(v) => to_raw_json(v),
        None => serde_json::Value::Null,
    }
}

// Shortest round-trip form, switching to exponent notation outside [1e-6, 1e21)
fn format_double(d: f64) -> String {
    if d.is_nan() {
        return "NaN".to_string();
    }
    if d.is_infinite() {
        return if d > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }

    let abs = d.abs();
    if abs != 0.0 && !(1e-6..1e21).contains(&abs) {
        let s = format!("{:e}", d);
        return match s.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => s,
        };
    }

    format!("{}", d)
}
