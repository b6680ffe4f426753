use chrono::Utc;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::common::v1::any_value::Value;
use opentelemetry_proto::tonic::common::v1::{AnyValue, InstrumentationScope, KeyValue};
use opentelemetry_proto::tonic::logs::v1::{LogRecord, ResourceLogs, ScopeLogs};
use opentelemetry_proto::tonic::resource::v1::Resource;

/// 2024-01-02T03:04:05Z
pub const FIXED_TIME_UNIX_NANO: u64 = 1_704_164_645_000_000_000;

pub const TRACE_ID: [u8; 16] = [
    0x4b, 0xf9, 0x2f, 0x35, 0x77, 0xb3, 0x4d, 0xa6, 0xa3, 0xce, 0x92, 0x9d, 0x0e, 0x0e, 0x47, 0x36,
];
pub const SPAN_ID: [u8; 8] = [0x00, 0xf0, 0x67, 0xaa, 0x0b, 0xa9, 0x02, 0xb7];

pub struct FakeOTLP;

impl FakeOTLP {
    pub fn logs_service_request() -> ExportLogsServiceRequest {
        Self::logs_service_request_with_logs(1, 1)
    }

    pub fn logs_service_request_with_logs(
        num_resource_logs: usize,
        num_logs: usize,
    ) -> ExportLogsServiceRequest {
        let mut exp = ExportLogsServiceRequest {
            resource_logs: Vec::with_capacity(num_resource_logs),
        };
        for _i in 0..num_resource_logs {
            exp.resource_logs.push(Self::resource_logs(num_logs));
        }
        exp
    }

    pub fn resource_logs(num_logs: usize) -> ResourceLogs {
        let now_ns = Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64;
        let log_records = (0..num_logs).map(|_| Self::log_record(now_ns)).collect();

        Self::resource_logs_with_records(log_records)
    }

    pub fn resource_logs_with_records(log_records: Vec<LogRecord>) -> ResourceLogs {
        let scope_logs = ScopeLogs {
            scope: Some(InstrumentationScope {
                name: "auth".to_string(),
                version: "0.0.1".to_string(),
                attributes: vec![string_attr("module", "login")],
                dropped_attributes_count: 0,
            }),
            log_records,
            schema_url: "https://opentelemetry.io/schemas/1.21.0".to_string(),
        };

        ResourceLogs {
            resource: Some(Self::resource()),
            scope_logs: vec![scope_logs],
            schema_url: "https://opentelemetry.io/schemas/1.21.0".to_string(),
        }
    }

    pub fn resource() -> Resource {
        Resource {
            attributes: vec![
                string_attr("service.name", "test-service"),
                string_attr("telemetry.sdk.version", "1.13.0"),
                string_attr("telemetry.sdk.name", "open-telemetry"),
                string_attr("k8s.pod.uid", "dc2c3e55-0dfb-4fda-854c-f7a1e5f88fd6"),
                string_attr("k8s.node.name", "ip-10-250-64-50.ec2.internal"),
                string_attr(
                    "container.id",
                    "b1e5232f92b315b7d91052e2c1b09de3735bea5b51c983a2a81ff3d69dfd0359",
                ),
            ],
            dropped_attributes_count: 0,
        }
    }

    /// A failed-login style record with trace context and a string body.
    pub fn log_record(time_unix_nano: u64) -> LogRecord {
        LogRecord {
            time_unix_nano,
            observed_time_unix_nano: time_unix_nano,
            severity_number: 13,
            severity_text: "WARNING".to_string(),
            body: Some(AnyValue {
                value: Some(Value::StringValue("Failed login attempt".to_string())),
            }),
            attributes: vec![
                string_attr("user.name", "alice"),
                string_attr("source.ip", "10.1.2.3"),
                int_attr("attempt", 3),
            ],
            dropped_attributes_count: 0,
            flags: 1,
            trace_id: TRACE_ID.to_vec(),
            span_id: SPAN_ID.to_vec(),
            event_name: "".to_string(),
        }
    }
}

pub fn string_attr(key: &str, value: &str) -> KeyValue {
    attr(key, Value::StringValue(value.to_string()))
}

pub fn int_attr(key: &str, value: i64) -> KeyValue {
    attr(key, Value::IntValue(value))
}

pub fn bool_attr(key: &str, value: bool) -> KeyValue {
    attr(key, Value::BoolValue(value))
}

pub fn double_attr(key: &str, value: f64) -> KeyValue {
    attr(key, Value::DoubleValue(value))
}

pub fn bytes_attr(key: &str, value: &[u8]) -> KeyValue {
    attr(key, Value::BytesValue(value.to_vec()))
}

pub fn attr(key: &str, value: Value) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue { value: Some(value) }),
    }
}
