// SPDX-License-Identifier: Apache-2.0

use http::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tower::BoxError;

/// Invalid exporter configuration. Header values never appear in these messages.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("endpoint is required")]
    MissingEndpoint,

    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("invalid retry_on_failure settings: {0}")]
    InvalidRetrySettings(String),

    #[error("invalid sending_queue settings: {0}")]
    InvalidQueueSettings(String),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("unable to build HTTP client: {0}")]
    Client(BoxError),
}

/// A single log record could not be turned into a security event. The record is
/// skipped; the rest of the batch is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("timestamp {0}ns is outside the representable range")]
    TimestampOutOfRange(u64),

    #[error("trace id must be 16 bytes, found {0}")]
    InvalidTraceId(usize),

    #[error("span id must be 8 bytes, found {0}")]
    InvalidSpanId(usize),
}

/// Delivery of a whole batch failed.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to marshal security event batch: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to create HTTP request: {0}")]
    Request(#[from] http::Error),

    #[error("failed to connect to endpoint")]
    Connect,

    #[error("failed to send HTTP request: {0}")]
    Transport(BoxError),

    #[error("HTTP request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP request cancelled")]
    Cancelled,

    #[error("HTTP request failed with status: {}", .status.as_u16())]
    Rejected {
        status: StatusCode,
        body: Option<String>,
    },
}

