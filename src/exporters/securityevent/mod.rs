// SPDX-License-Identifier: Apache-2.0

//! Exports OpenTelemetry logs as flat JSON security events.
//!
//! Each call to [`SecurityEventExporter::consume_logs`] converts every log record
//! it is handed into a [`SecurityEvent`], collects the results into one batch and
//! posts that batch to the configured endpoint in a single request. Records that
//! cannot be converted are skipped and counted; a failed delivery fails the whole
//! batch.

pub mod config;
pub mod converter;
pub mod errors;
pub mod event;
pub mod metrics;
pub mod sender;

pub use config::{
    QueueSettings, RetrySettings, SecurityEventExporterConfig, SecurityEventExporterConfigBuilder,
};
pub use converter::EventConverter;
pub use errors::{BuildError, ConfigError, ConversionError, ExportError};
pub use event::{EventBatch, SecurityEvent};
pub use metrics::{DeliveryMetrics, MetricsSnapshot};
pub use sender::{BatchSender, Delivery};

use crate::bounded_channel::BoundedReceiver;
use crate::exporters::securityevent::config::is_sensitive_header;
use opentelemetry_proto::tonic::logs::v1::ResourceLogs;
use std::borrow::Cow;
use std::sync::Arc;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of one successful `consume_logs` call.
#[derive(Clone, Debug, Default)]
pub struct ConsumeReport {
    pub resource_logs: usize,
    pub log_records: usize,
    pub events_converted: usize,
    pub conversion_errors: usize,
    /// `None` when nothing was converted and no request was made.
    pub delivery: Option<Delivery>,
}

pub struct SecurityEventExporterBuilder {
    config: SecurityEventExporterConfig,
}

impl SecurityEventExporterBuilder {
    pub fn new(config: SecurityEventExporterConfig) -> Self {
        Self { config }
    }

    pub fn build(mut self) -> Result<SecurityEventExporter, BuildError> {
        self.config.validate()?;

        let metrics = Arc::new(DeliveryMetrics::new());
        let sender = BatchSender::new(&self.config, metrics.clone())?;
        let converter = EventConverter::new(self.config.default_attributes.clone());

        Ok(SecurityEventExporter {
            config: self.config,
            converter,
            sender,
            metrics,
        })
    }
}

pub struct SecurityEventExporter {
    config: SecurityEventExporterConfig,
    converter: EventConverter,
    sender: BatchSender,
    metrics: Arc<DeliveryMetrics>,
}

impl SecurityEventExporter {
    pub fn builder(config: SecurityEventExporterConfig) -> SecurityEventExporterBuilder {
        SecurityEventExporterBuilder::new(config)
    }

    pub fn config(&self) -> &SecurityEventExporterConfig {
        &self.config
    }

    /// Inputs are only read, never modified.
    pub fn mutates_data(&self) -> bool {
        false
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn start(&self) {
        info!(
            endpoint = %self.sender.endpoint(),
            timeout = ?self.config.timeout,
            headers_count = self.config.headers.len(),
            default_attributes_count = self.config.default_attributes.len(),
            retry_enabled = self.config.retry_on_failure.enabled,
            queue_enabled = self.config.sending_queue.enabled,
            "Starting security event exporter"
        );

        for (name, _) in &self.config.headers {
            debug!(
                header = name.as_str(),
                is_sensitive = is_sensitive_header(name),
                "Configured custom header"
            );
        }
        for key in self.config.default_attributes.keys() {
            debug!(key = key.as_str(), "Configured default attribute");
        }
    }

    /// Convert and deliver one unit of logs.
    ///
    /// Conversion failures are recovered per record. Nothing is sent when no record
    /// converts. When delivery fails every converted event is counted as failed and
    /// the delivery error is returned.
    pub async fn consume_logs(
        &self,
        resource_logs: &[ResourceLogs],
        cancel: &CancellationToken,
    ) -> Result<ConsumeReport, ExportError> {
        let log_records: usize = resource_logs
            .iter()
            .flat_map(|rl| rl.scope_logs.iter())
            .map(|sl| sl.log_records.len())
            .sum();
        self.metrics.add_logs_received(log_records as u64);

        debug!(
            resource_logs = resource_logs.len(),
            log_records, "Processing logs for security event export"
        );

        let mut batch = EventBatch::new();
        let mut conversion_errors = 0;

        for (resource_index, rl) in resource_logs.iter().enumerate() {
            let resource_attrs = rl
                .resource
                .as_ref()
                .map(|r| r.attributes.as_slice())
                .unwrap_or_default();

            for (scope_index, sl) in rl.scope_logs.iter().enumerate() {
                for (log_index, record) in sl.log_records.iter().enumerate() {
                    match self.converter.convert(record, resource_attrs) {
                        Ok(event) => batch.add_event(event),
                        Err(e) => {
                            conversion_errors += 1;
                            self.metrics.add_conversion_errors(1);
                            warn!(
                                error = %e,
                                resource_index,
                                scope_index,
                                log_index,
                                severity = record.severity_text.as_str(),
                                "Failed to convert log record to security event"
                            );
                        }
                    }
                }
            }
        }

        let mut report = ConsumeReport {
            resource_logs: resource_logs.len(),
            log_records,
            events_converted: batch.len(),
            conversion_errors,
            delivery: None,
        };

        if batch.is_empty() {
            info!(
                resource_logs = report.resource_logs,
                log_records,
                events_sent = 0,
                conversion_errors,
                "Completed processing logs"
            );
            return Ok(report);
        }

        let event_count = batch.len() as u64;
        match self.sender.send(&batch, cancel).await {
            Ok(delivery) => {
                self.metrics.add_events_exported(event_count);
                info!(
                    resource_logs = report.resource_logs,
                    log_records,
                    events_sent = event_count,
                    conversion_errors,
                    duration = ?delivery.duration,
                    "Completed processing logs"
                );
                report.delivery = Some(delivery);
                Ok(report)
            }
            Err(e) => {
                self.metrics.add_events_failed(event_count);
                error!(
                    event_count,
                    error = %e,
                    "Failed to send security events"
                );
                Err(e)
            }
        }
    }

    /// Log the final delivery report and return the totals.
    pub fn shutdown(&self) -> MetricsSnapshot {
        let snap = self.metrics.snapshot();
        info!(
            logs_received = snap.logs_received,
            events_exported = snap.events_exported,
            events_failed = snap.events_failed,
            conversion_errors = snap.conversion_errors,
            http_requests = snap.http_requests,
            http_errors = snap.http_errors,
            average_http_duration = ?snap.average_http_duration,
            "Shutting down security event exporter"
        );
        snap
    }

    /// Drive `consume_logs` from `rx` until the channel closes or `cancel` fires,
    /// then shut down.
    pub async fn run(
        self,
        mut rx: BoundedReceiver<Vec<ResourceLogs>>,
        cancel: CancellationToken,
    ) -> MetricsSnapshot {
        self.start();

        loop {
            select! {
                m = rx.next() => match m {
                    None => break,
                    Some(resource_logs) => {
                        if let Err(e) = self.consume_logs(&resource_logs, &cancel).await {
                            debug!(error = %e, "Dropping logs after failed export");
                        }
                    }
                },
                _ = cancel.cancelled() => break,
            }
        }

        debug!("exiting security event exporter");
        self.shutdown()
    }
}

/// Shorten `s` to at most `max_chars` characters, marking the cut with `...`.
pub(crate) fn truncate_str(s: &str, max_chars: usize) -> Cow<'_, str> {
    match s.char_indices().nth(max_chars) {
        None => Cow::Borrowed(s),
        Some((idx, _)) => Cow::Owned(format!("{}...", &s[..idx])),
    }
}

#[cfg(test)]
mod tests {
    extern crate utilities;

    use super::*;
    use crate::bounded_channel::bounded;
    use crate::exporters::crypto_init_tests::init_crypto;
    use httpmock::prelude::*;
    use serde_json::{Map, Value};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};
    use utilities::otlp::{FIXED_TIME_UNIX_NANO, FakeOTLP};

    fn exporter(endpoint: String) -> SecurityEventExporter {
        init_crypto();
        let config = SecurityEventExporterConfigBuilder::new()
            .with_endpoint(endpoint)
            .with_timeout(Duration::from_secs(5))
            .with_header("Authorization", "Bearer token")
            .build();
        SecurityEventExporter::builder(config).build().unwrap()
    }

    fn records(n: usize) -> Vec<ResourceLogs> {
        vec![FakeOTLP::resource_logs(n)]
    }

    #[test]
    fn truncation() {
        assert_eq!("abc", truncate_str("abc", 3));
        assert_eq!("ab...", truncate_str("abc", 2));
        assert_eq!("éé...", truncate_str("ééé", 2));
        assert_eq!("", truncate_str("", 0));
    }

    #[test]
    fn invalid_config_fails_build() {
        let config = SecurityEventExporterConfigBuilder::new()
            .with_endpoint("")
            .build();
        let res = SecurityEventExporter::builder(config).build();
        assert!(matches!(
            res,
            Err(BuildError::Config(ConfigError::MissingEndpoint))
        ));
    }

    #[tokio::test]
    async fn delivers_batch() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/security-events")
                .header("authorization", "Bearer token")
                .header("content-type", "application/json");
            then.status(200);
        });

        let exp = exporter(server.url("/security-events"));
        assert!(!exp.mutates_data());

        let report = assert_ok!(exp.consume_logs(&records(3), &CancellationToken::new()).await);
        mock.assert();
        assert_eq!(3, report.events_converted);
        assert!(report.delivery.is_some());

        let snap = exp.metrics();
        assert_eq!(3, snap.logs_received);
        assert_eq!(3, snap.events_exported);
        assert_eq!(0, snap.events_failed);
        assert_eq!(1, snap.http_requests);
        assert_eq!(1, snap.http_duration_samples);
    }

    #[tokio::test]
    async fn payload_shape() {
        let server = MockServer::start();
        let mut expected = Map::new();
        expected.insert("source".into(), Value::from("opentelemetry-collector"));
        expected.insert("timestamp".into(), Value::from("2024-01-02T03:04:05Z"));
        expected.insert("severity".into(), Value::from("WARNING"));
        expected.insert("severity_number".into(), Value::from(13));
        expected.insert(
            "trace_id".into(),
            Value::from("4bf92f3577b34da6a3ce929d0e0e4736"),
        );
        expected.insert("span_id".into(), Value::from("00f067aa0ba902b7"));
        expected.insert("message".into(), Value::from("Failed login attempt"));
        expected.insert("attributes.user.name".into(), Value::from("alice"));
        expected.insert("attributes.source.ip".into(), Value::from("10.1.2.3"));
        expected.insert("attributes.attempt".into(), Value::from("3"));
        for kv in FakeOTLP::resource().attributes {
            let v = crate::otlp::attr::as_string(kv.value.as_ref());
            expected.insert(format!("resource.{}", kv.key), Value::from(v));
        }

        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/security-events")
                .json_body(Value::Array(vec![Value::Object(expected)]));
            then.status(200);
        });

        let exp = exporter(server.url("/security-events"));
        let rl = vec![FakeOTLP::resource_logs_with_records(vec![
            FakeOTLP::log_record(FIXED_TIME_UNIX_NANO),
        ])];
        assert_ok!(exp.consume_logs(&rl, &CancellationToken::new()).await);
        mock.assert();
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_whole_batch() {
        let exp = exporter("http://127.0.0.1:1/security-events".to_string());

        let err = assert_err!(exp.consume_logs(&records(5), &CancellationToken::new()).await);
        assert!(matches!(err, ExportError::Connect), "got {:?}", err);

        let snap = exp.metrics();
        assert_eq!(5, snap.logs_received);
        assert_eq!(0, snap.events_exported);
        assert_eq!(5, snap.events_failed);
        assert_eq!(1, snap.http_errors);
        assert_eq!(1, snap.http_requests);
    }

    #[tokio::test]
    async fn malformed_record_is_skipped() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/security-events");
            then.status(200);
        });

        let mut bad = FakeOTLP::log_record(FIXED_TIME_UNIX_NANO);
        bad.trace_id = vec![0xab; 5];
        let mut logs = vec![FakeOTLP::log_record(FIXED_TIME_UNIX_NANO); 4];
        logs.insert(2, bad);
        let rl = vec![FakeOTLP::resource_logs_with_records(logs)];

        let exp = exporter(server.url("/security-events"));
        let report = assert_ok!(exp.consume_logs(&rl, &CancellationToken::new()).await);
        mock.assert();

        assert_eq!(4, report.events_converted);
        assert_eq!(1, report.conversion_errors);

        let snap = exp.metrics();
        assert_eq!(5, snap.logs_received);
        assert_eq!(1, snap.conversion_errors);
        assert_eq!(4, snap.events_exported);
    }

    #[tokio::test]
    async fn empty_input_makes_no_request() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST);
            then.status(200);
        });

        let exp = exporter(server.url("/security-events"));
        let report = assert_ok!(exp.consume_logs(&[], &CancellationToken::new()).await);
        assert!(report.delivery.is_none());

        // resource without any records
        let report = assert_ok!(exp.consume_logs(&records(0), &CancellationToken::new()).await);
        assert!(report.delivery.is_none());

        // only unconvertible records
        let mut bad = FakeOTLP::log_record(FIXED_TIME_UNIX_NANO);
        bad.span_id = vec![1, 2];
        let rl = vec![FakeOTLP::resource_logs_with_records(vec![bad])];
        let report = assert_ok!(exp.consume_logs(&rl, &CancellationToken::new()).await);
        assert!(report.delivery.is_none());

        mock.assert_hits(0);
        let snap = exp.metrics();
        assert_eq!(0, snap.http_requests);
        assert_eq!(1, snap.conversion_errors);
    }

    #[tokio::test]
    async fn rejected_status() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/security-events");
            then.status(400).body("bad event format");
        });

        let exp = exporter(server.url("/security-events"));
        let err = assert_err!(exp.consume_logs(&records(2), &CancellationToken::new()).await);
        mock.assert();
        match err {
            ExportError::Rejected { status, body } => {
                assert_eq!(400, status.as_u16());
                assert_eq!(Some("bad event format".to_string()), body);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let snap = exp.metrics();
        assert_eq!(2, snap.events_failed);
        assert_eq!(1, snap.http_errors);
    }

    #[tokio::test]
    async fn exported_plus_failed_matches_batches() {
        let server = MockServer::start();
        let ok = server.mock(|when, then| {
            when.method(POST).path("/ok");
            then.status(200);
        });

        let good = exporter(server.url("/ok"));
        for n in [1, 4, 0, 7] {
            assert_ok!(good.consume_logs(&records(n), &CancellationToken::new()).await);
        }
        ok.assert_hits(3);

        let snap = good.metrics();
        assert_eq!(12, snap.events_exported + snap.events_failed);
        assert_eq!(3, snap.http_requests);
    }

    #[tokio::test]
    async fn exported_plus_failed_with_rejections() {
        let server = MockServer::start();
        let ok = server.mock(|when, then| {
            when.method(POST)
                .path("/security-events")
                .body_contains("\"severity\":\"WARNING\"");
            then.status(200);
        });
        let rejected = server.mock(|when, then| {
            when.method(POST)
                .path("/security-events")
                .body_contains("\"severity\":\"REJECT\"");
            then.status(500).body("unavailable");
        });

        let rejected_logs = |n: usize| {
            let mut record = FakeOTLP::log_record(FIXED_TIME_UNIX_NANO);
            record.severity_text = "REJECT".to_string();
            vec![FakeOTLP::resource_logs_with_records(vec![record; n])]
        };

        let exp = exporter(server.url("/security-events"));
        let cancel = CancellationToken::new();
        assert_ok!(exp.consume_logs(&records(2), &cancel).await);
        assert_err!(exp.consume_logs(&rejected_logs(3), &cancel).await);
        assert_ok!(exp.consume_logs(&records(0), &cancel).await);
        assert_ok!(exp.consume_logs(&records(4), &cancel).await);
        assert_err!(exp.consume_logs(&rejected_logs(1), &cancel).await);
        ok.assert_hits(2);
        rejected.assert_hits(2);

        let snap = exp.metrics();
        assert_eq!(6, snap.events_exported);
        assert_eq!(4, snap.events_failed);
        assert_eq!(10, snap.events_exported + snap.events_failed);
        assert_eq!(4, snap.http_requests);
        assert_eq!(2, snap.http_errors);
    }

    #[tokio::test]
    async fn cancelled_consume_fails_whole_batch() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/security-events");
            then.status(200).delay(Duration::from_secs(2));
        });

        let exp = exporter(server.url("/security-events"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = assert_err!(exp.consume_logs(&records(3), &cancel).await);
        assert!(matches!(err, ExportError::Cancelled), "got {:?}", err);

        let snap = exp.metrics();
        assert_eq!(3, snap.logs_received);
        assert_eq!(0, snap.events_exported);
        assert_eq!(3, snap.events_failed);
        assert_eq!(1, snap.http_requests);
        assert_eq!(1, snap.http_errors);
    }

    #[tokio::test]
    async fn run_until_channel_closes() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/security-events");
            then.status(200);
        });

        let exp = exporter(server.url("/security-events"));
        let (tx, rx) = bounded(4);
        let cancel = CancellationToken::new();
        let jh = tokio::spawn(exp.run(rx, cancel.clone()));

        assert_ok!(tx.send(records(2)).await);
        assert_ok!(tx.send(records(3)).await);
        drop(tx);

        let snap = jh.await.unwrap();
        mock.assert_hits(2);
        assert_eq!(5, snap.events_exported);
        assert_eq!(2, snap.http_requests);
    }

    #[tokio::test]
    async fn run_continues_after_failed_export() {
        let server = MockServer::start();
        let rejected = server.mock(|when, then| {
            when.method(POST)
                .path("/security-events")
                .body_contains("\"severity\":\"REJECT\"");
            then.status(503);
        });
        let ok = server.mock(|when, then| {
            when.method(POST)
                .path("/security-events")
                .body_contains("\"severity\":\"WARNING\"");
            then.status(200);
        });

        let mut record = FakeOTLP::log_record(FIXED_TIME_UNIX_NANO);
        record.severity_text = "REJECT".to_string();
        let rejected_logs = vec![FakeOTLP::resource_logs_with_records(vec![record; 2])];

        let exp = exporter(server.url("/security-events"));
        let (tx, rx) = bounded(4);
        let jh = tokio::spawn(exp.run(rx, CancellationToken::new()));

        assert_ok!(tx.send(rejected_logs).await);
        assert_ok!(tx.send(records(3)).await);
        drop(tx);

        let snap = jh.await.unwrap();
        rejected.assert();
        ok.assert();
        assert_eq!(3, snap.events_exported);
        assert_eq!(2, snap.events_failed);
        assert_eq!(2, snap.http_requests);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let exp = exporter("http://127.0.0.1:1/security-events".to_string());
        let (_tx, rx) = bounded::<Vec<ResourceLogs>>(1);
        let cancel = CancellationToken::new();
        let jh = tokio::spawn(exp.run(rx, cancel.clone()));

        cancel.cancel();
        let snap = jh.await.unwrap();
        assert_eq!(0, snap.http_requests);
    }
}
