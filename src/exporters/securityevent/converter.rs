// SPDX-License-Identifier: Apache-2.0

use crate::exporters::securityevent::errors::ConversionError;
use crate::exporters::securityevent::event::{
    ATTRIBUTES_PREFIX, FIELD_MESSAGE, FIELD_SEVERITY, FIELD_SEVERITY_NUMBER, FIELD_SPAN_ID,
    FIELD_TIMESTAMP, FIELD_TRACE_ID, RESOURCE_PREFIX, SecurityEvent,
};
use crate::exporters::securityevent::truncate_str;
use crate::otlp::attr;
use chrono::{DateTime, SecondsFormat, Utc};
use opentelemetry_proto::tonic::common::v1::KeyValue;
use opentelemetry_proto::tonic::common::v1::any_value::Value as AnyValueKind;
use opentelemetry_proto::tonic::logs::v1::LogRecord;
use serde_json::{Map, Value};
use tracing::{debug, trace};

const TRACE_ID_LEN: usize = 16;
const SPAN_ID_LEN: usize = 8;
const MESSAGE_PREVIEW_CHARS: usize = 100;

/// Turns log records into flat security events.
///
/// Fields are written in a fixed order and a later write replaces an earlier one
/// under the same key: default attributes, then `resource.*`, then `attributes.*`,
/// then the reserved record fields. A default attribute named like a reserved
/// field (`timestamp`, `message`, ...) is therefore always overridden by the record.
#[derive(Clone, Debug, Default)]
pub struct EventConverter {
    default_attributes: Map<String, Value>,
}

impl EventConverter {
    pub fn new(default_attributes: Map<String, Value>) -> Self {
        Self { default_attributes }
    }

    pub fn convert(
        &self,
        record: &LogRecord,
        resource_attrs: &[KeyValue],
    ) -> Result<SecurityEvent, ConversionError> {
        let mut event = SecurityEvent::new();

        for (key, value) in &self.default_attributes {
            event.insert(key.clone(), value.clone());
        }
        trace!(count = self.default_attributes.len(), "Added default attributes");

        for kv in resource_attrs {
            let key = format!("{}{}", RESOURCE_PREFIX, kv.key);
            trace!(key = %key, "Added resource attribute");
            event.insert(key, attr::as_string(kv.value.as_ref()));
        }

        for kv in &record.attributes {
            let key = format!("{}{}", ATTRIBUTES_PREFIX, kv.key);
            trace!(key = %key, "Added log attribute");
            event.insert(key, attr::as_string(kv.value.as_ref()));
        }

        let timestamp = format_timestamp(record.time_unix_nano)?;
        event.insert(FIELD_TIMESTAMP, timestamp);
        event.insert(FIELD_SEVERITY, record.severity_text.clone());
        event.insert(FIELD_SEVERITY_NUMBER, record.severity_number);

        if let Some(trace_id) = encode_id(&record.trace_id, TRACE_ID_LEN)
            .map_err(ConversionError::InvalidTraceId)?
        {
            trace!(trace_id = %trace_id, "Added trace ID");
            event.insert(FIELD_TRACE_ID, trace_id);
        }
        if let Some(span_id) =
            encode_id(&record.span_id, SPAN_ID_LEN).map_err(ConversionError::InvalidSpanId)?
        {
            trace!(span_id = %span_id, "Added span ID");
            event.insert(FIELD_SPAN_ID, span_id);
        }

        match record.body.as_ref().and_then(|b| b.value.as_ref()) {
            Some(AnyValueKind::StringValue(s)) => {
                debug!(
                    message_preview = %truncate_str(s, MESSAGE_PREVIEW_CHARS),
                    "Added string message body"
                );
                event.insert(FIELD_MESSAGE, s.clone());
            }
            Some(AnyValueKind::BytesValue(b)) => {
                debug!(message_length = b.len(), "Added bytes message body");
                event.insert(FIELD_MESSAGE, String::from_utf8_lossy(b).into_owned());
            }
            _ => {
                debug!(
                    body_type = attr::type_name(record.body.as_ref()),
                    "Log body has unsupported type"
                );
            }
        }

        debug!(
            total_fields = event.len(),
            "Completed log to security event conversion"
        );

        Ok(event)
    }
}

fn format_timestamp(time_unix_nano: u64) -> Result<String, ConversionError> {
    let nanos = i64::try_from(time_unix_nano)
        .map_err(|_| ConversionError::TimestampOutOfRange(time_unix_nano))?;

    Ok(DateTime::<Utc>::from_timestamp_nanos(nanos)
        .to_rfc3339_opts(SecondsFormat::Secs, true))
}

// Ids that are absent or all zeros are treated as unset.
fn encode_id(id: &[u8], expected_len: usize) -> Result<Option<String>, usize> {
    if id.iter().all(|b| *b == 0) {
        return Ok(None);
    }
    if id.len() != expected_len {
        return Err(id.len());
    }
    Ok(Some(hex::encode(id)))
}
