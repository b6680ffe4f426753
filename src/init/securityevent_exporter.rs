// SPDX-License-Identifier: Apache-2.0

use crate::init::parse;
use clap::Args;
use std::time::Duration;

#[derive(Debug, Default, Clone, Args)]
pub struct SecurityEventExporterArgs {
    /// Security event endpoint, overrides the config file
    #[arg(
        long("security-event-exporter-endpoint"),
        env = "SECEVENT_EXPORTER_ENDPOINT"
    )]
    pub endpoint: Option<String>,

    /// Request timeout, e.g. "10s" or "500ms"
    #[arg(
        long("security-event-exporter-timeout"),
        env = "SECEVENT_EXPORTER_TIMEOUT",
        value_parser = humantime::parse_duration
    )]
    pub timeout: Option<Duration>,

    /// Comma-separated, key=value pairs of headers to send with each request
    #[arg(
        long("security-event-exporter-headers"),
        env = "SECEVENT_EXPORTER_HEADERS",
        value_parser = parse::parse_key_val::<String, String>,
        value_delimiter = ','
    )]
    pub headers: Vec<(String, String)>,

    /// Comma-separated, key=value pairs added to every event
    #[arg(
        long("security-event-exporter-default-attributes"),
        env = "SECEVENT_EXPORTER_DEFAULT_ATTRIBUTES",
        value_parser = parse::parse_key_val::<String, String>,
        value_delimiter = ','
    )]
    pub default_attributes: Vec<(String, String)>,
}
