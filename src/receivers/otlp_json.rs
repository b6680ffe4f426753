// SPDX-License-Identifier: Apache-2.0

//! Reads newline-delimited OTLP/JSON `ExportLogsServiceRequest` documents and
//! forwards their resource logs downstream.

use crate::bounded_channel::BoundedSender;
use crate::receivers::get_meter;
use opentelemetry::KeyValue;
use opentelemetry::metrics::Counter;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::logs::v1::ResourceLogs;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tower::BoxError;
use tracing::{debug, info, warn};

/// Totals for one receiver run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub lines: u64,
    pub requests: u64,
    pub malformed_lines: u64,
    pub log_records: u64,
}

pub struct OtlpJsonReceiver<R> {
    reader: R,
    logs_tx: BoundedSender<Vec<ResourceLogs>>,
    metrics: ReceiverMetrics,
}

impl<R> OtlpJsonReceiver<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R, logs_tx: BoundedSender<Vec<ResourceLogs>>) -> Self {
        Self {
            reader,
            logs_tx,
            metrics: ReceiverMetrics::new(),
        }
    }

    /// Read until EOF or cancellation. Malformed lines are skipped. Fails if the
    /// input cannot be read or the downstream channel has closed.
    pub async fn run(self, cancel: CancellationToken) -> Result<ReceiverStats, BoxError> {
        let mut stats = ReceiverStats::default();
        let mut lines = self.reader.lines();

        loop {
            let line = select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("OTLP/JSON receiver cancelled");
                    break;
                },
                line = lines.next_line() => line?,
            };

            let line = match line {
                None => break,
                Some(l) => l,
            };
            stats.lines += 1;

            if line.trim().is_empty() {
                continue;
            }

            let req: ExportLogsServiceRequest = match serde_json::from_str(&line) {
                Ok(req) => req,
                Err(e) => {
                    stats.malformed_lines += 1;
                    warn!(
                        line_number = stats.lines,
                        error = %e,
                        "Skipping malformed OTLP/JSON line"
                    );
                    continue;
                }
            };
            stats.requests += 1;

            if req.resource_logs.is_empty() {
                continue;
            }

            let count = count_log_records(&req.resource_logs);
            select! {
                biased;

                _ = cancel.cancelled() => {
                    self.metrics.add_refused(count);
                    break;
                },
                res = self.logs_tx.send(req.resource_logs) => {
                    if let Err(e) = res {
                        self.metrics.add_refused(count);
                        return Err(format!("failed to forward logs: {}", e).into());
                    }
                    self.metrics.add_accepted(count);
                    stats.log_records += count;
                }
            }
        }

        info!(
            lines = stats.lines,
            requests = stats.requests,
            malformed_lines = stats.malformed_lines,
            log_records = stats.log_records,
            "OTLP/JSON receiver finished"
        );
        Ok(stats)
    }
}

fn count_log_records(resource_logs: &[ResourceLogs]) -> u64 {
    resource_logs
        .iter()
        .flat_map(|rl| rl.scope_logs.iter())
        .map(|sl| sl.log_records.len() as u64)
        .sum()
}

struct ReceiverMetrics {
    accepted: Counter<u64>,
    refused: Counter<u64>,
    tags: [KeyValue; 1],
}

impl ReceiverMetrics {
    fn new() -> Self {
        Self {
            accepted: get_meter()
                .u64_counter("secevent_receiver_accepted_log_records")
                .with_description(
                    "Number of log records successfully read and pushed to the exporter.",
                )
                .with_unit("log_records")
                .build(),
            refused: get_meter()
                .u64_counter("secevent_receiver_refused_log_records")
                .with_description("Number of log records that could not be pushed to the exporter.")
                .with_unit("log_records")
                .build(),
            tags: [KeyValue::new("receiver", "otlp_json")],
        }
    }

    fn add_accepted(&self, count: u64) {
        if count > 0 {
            self.accepted.add(count, &self.tags);
        }
    }

    fn add_refused(&self, count: u64) {
        if count > 0 {
            self.refused.add(count, &self.tags);
        }
    }
}
