// SPDX-License-Identifier: Apache-2.0

use crate::exporters::get_meter;
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Delivery counters owned by one exporter instance.
///
/// Totals are kept locally so a final report can be produced at shutdown, and each
/// increment is mirrored to OpenTelemetry instruments for hosts that install a meter
/// provider.
pub struct DeliveryMetrics {
    logs_received: AtomicU64,
    events_exported: AtomicU64,
    events_failed: AtomicU64,
    conversion_errors: AtomicU64,
    http_errors: AtomicU64,
    http_requests: AtomicU64,
    http_durations: Mutex<Vec<Duration>>,

    instruments: Instruments,
}

struct Instruments {
    attrs: [KeyValue; 1],
    logs_received: Counter<u64>,
    events_exported: Counter<u64>,
    events_failed: Counter<u64>,
    conversion_errors: Counter<u64>,
    http_errors: Counter<u64>,
    http_requests: Counter<u64>,
    http_duration: Histogram<f64>,
}

impl Instruments {
    fn new() -> Self {
        let meter = get_meter();
        Self {
            attrs: [KeyValue::new("exporter", "securityevent")],
            logs_received: meter
                .u64_counter("secevent_exporter_received_log_records")
                .with_description("Log records handed to the exporter")
                .with_unit("log_records")
                .build(),
            events_exported: meter
                .u64_counter("secevent_exporter_sent_events")
                .with_description("Security events delivered to the endpoint")
                .with_unit("events")
                .build(),
            events_failed: meter
                .u64_counter("secevent_exporter_send_failed_events")
                .with_description("Security events lost to a failed delivery")
                .with_unit("events")
                .build(),
            conversion_errors: meter
                .u64_counter("secevent_exporter_conversion_errors")
                .with_description("Log records that could not be converted")
                .with_unit("log_records")
                .build(),
            http_errors: meter
                .u64_counter("secevent_exporter_http_errors")
                .with_description("Failed delivery attempts")
                .with_unit("requests")
                .build(),
            http_requests: meter
                .u64_counter("secevent_exporter_http_requests")
                .with_description("Delivery attempts that reached the network")
                .with_unit("requests")
                .build(),
            http_duration: meter
                .f64_histogram("secevent_exporter_http_duration")
                .with_description("Wall-clock duration of delivery requests")
                .with_unit("s")
                .build(),
        }
    }
}

/// Plain-value copy of the counters at one point in time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub logs_received: u64,
    pub events_exported: u64,
    pub events_failed: u64,
    pub conversion_errors: u64,
    pub http_errors: u64,
    pub http_requests: u64,
    pub http_duration_samples: usize,
    pub average_http_duration: Option<Duration>,
}

impl Default for DeliveryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryMetrics {
    pub fn new() -> Self {
        Self {
            logs_received: AtomicU64::new(0),
            events_exported: AtomicU64::new(0),
            events_failed: AtomicU64::new(0),
            conversion_errors: AtomicU64::new(0),
            http_errors: AtomicU64::new(0),
            http_requests: AtomicU64::new(0),
            http_durations: Mutex::new(Vec::new()),
            instruments: Instruments::new(),
        }
    }

    pub fn add_logs_received(&self, count: u64) {
        self.logs_received.fetch_add(count, Ordering::Relaxed);
        self.instruments
            .logs_received
            .add(count, &self.instruments.attrs);
    }

    pub fn add_conversion_errors(&self, count: u64) {
        self.conversion_errors.fetch_add(count, Ordering::Relaxed);
        self.instruments
            .conversion_errors
            .add(count, &self.instruments.attrs);
    }

    pub fn add_events_exported(&self, count: u64) {
        self.events_exported.fetch_add(count, Ordering::Relaxed);
        self.instruments
            .events_exported
            .add(count, &self.instruments.attrs);
    }

    pub fn add_events_failed(&self, count: u64) {
        self.events_failed.fetch_add(count, Ordering::Relaxed);
        self.instruments
            .events_failed
            .add(count, &self.instruments.attrs);
    }

    /// Count one request that reached the network along with its duration.
    pub fn record_http_request(&self, duration: Duration) {
        self.http_requests.fetch_add(1, Ordering::Relaxed);
        self.instruments
            .http_requests
            .add(1, &self.instruments.attrs);
        self.instruments
            .http_duration
            .record(duration.as_secs_f64(), &self.instruments.attrs);

        self.http_durations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
    }

    pub fn add_http_error(&self) {
        self.http_errors.fetch_add(1, Ordering::Relaxed);
        self.instruments.http_errors.add(1, &self.instruments.attrs);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let durations = self
            .http_durations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let average_http_duration = if durations.is_empty() {
            None
        } else {
            let total: Duration = durations.iter().sum();
            Some(total / durations.len() as u32)
        };

        MetricsSnapshot {
            logs_received: self.logs_received.load(Ordering::Relaxed),
            events_exported: self.events_exported.load(Ordering::Relaxed),
            events_failed: self.events_failed.load(Ordering::Relaxed),
            conversion_errors: self.conversion_errors.load(Ordering::Relaxed),
            http_errors: self.http_errors.load(Ordering::Relaxed),
            http_requests: self.http_requests.load(Ordering::Relaxed),
            http_duration_samples: durations.len(),
            average_http_duration,
        }
    }
}
