// SPDX-License-Identifier: Apache-2.0

use crate::exporters::securityevent::config::deser_duration;
use crate::exporters::securityevent::{
    QueueSettings, RetrySettings, SecurityEventExporterConfig, SecurityEventExporterConfigBuilder,
};
use crate::init::args::AgentRun;
use crate::init::parse;
use figment::Figment;
use figment::providers::{Format, Json, Toml};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tower::BoxError;
use tracing::debug;

/// Exporter settings as read from a configuration file. Every field is optional;
/// absent fields keep the exporter defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub endpoint: Option<String>,
    #[serde(deserialize_with = "deser_duration_opt")]
    pub timeout: Option<Duration>,
    #[serde(deserialize_with = "parse::deser_string_map")]
    pub headers: BTreeMap<String, String>,
    pub default_attributes: Option<Map<String, Value>>,
    pub retry_on_failure: Option<RetrySettings>,
    pub sending_queue: Option<QueueSettings>,
}

fn deser_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    deser_duration(deserializer).map(Some)
}

impl FileConfig {
    /// Load from a `.toml` or `.json` file. Files without an extension are read as TOML.
    pub fn load(path: &Path) -> Result<Self, BoxError> {
        if !path.is_file() {
            return Err(format!("config file not found: {}", path.display()).into());
        }

        let figment = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Figment::new().merge(Json::file(path)),
            Some("toml") | None => Figment::new().merge(Toml::file(path)),
            Some(other) => {
                return Err(format!("unsupported config file extension: {}", other).into());
            }
        };

        Self::from_figment(figment)
    }

    fn from_figment(figment: Figment) -> Result<Self, BoxError> {
        figment
            .extract()
            .map_err(|e| format!("failed to parse config file: {}", e).into())
    }
}

/// Exporter configuration from defaults, then the config file, then command line.
pub fn build_exporter_config(args: &AgentRun) -> Result<SecurityEventExporterConfig, BoxError> {
    let file = match &args.config {
        Some(path) => {
            debug!(path = %path.display(), "Loading config file");
            FileConfig::load(path)?
        }
        None => FileConfig::default(),
    };

    Ok(merge(file, args))
}

fn merge(file: FileConfig, args: &AgentRun) -> SecurityEventExporterConfig {
    let mut builder = SecurityEventExporterConfigBuilder::new();

    if let Some(endpoint) = file.endpoint {
        builder = builder.with_endpoint(endpoint);
    }
    if let Some(timeout) = file.timeout {
        builder = builder.with_timeout(timeout);
    }
    builder = builder.with_headers(file.headers.into_iter().collect());
    if let Some(attrs) = file.default_attributes {
        builder = builder.with_default_attributes(attrs);
    }
    if let Some(retry) = file.retry_on_failure {
        builder = builder.with_retry_settings(retry);
    }
    if let Some(queue) = file.sending_queue {
        builder = builder.with_queue_settings(queue);
    }

    let cli = &args.security_event_exporter;
    if let Some(endpoint) = &cli.endpoint {
        builder = builder.with_endpoint(endpoint.clone());
    }
    if let Some(timeout) = cli.timeout {
        builder = builder.with_timeout(timeout);
    }
    // Appended after the file headers so that a clash resolves to the command line.
    builder = builder.with_headers(cli.headers.clone());
    for (k, v) in &cli.default_attributes {
        builder = builder.with_default_attribute(k.clone(), v.clone());
    }

    builder.build()
}
