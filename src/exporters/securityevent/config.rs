// SPDX-License-Identifier: Apache-2.0

use crate::exporters::securityevent::errors::ConfigError;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Uri};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080/security-events";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const SENSITIVE_HEADER_PATTERNS: [&str; 4] = ["authorization", "cookie", "api-key", "auth-token"];

/// Whether a header name is likely to carry credentials. Values of such headers
/// must never reach the logs.
pub fn is_sensitive_header(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SENSITIVE_HEADER_PATTERNS
        .iter()
        .any(|pattern| lower.contains(pattern))
}

/// Retry policy declaration. Validated and logged, not enforced: every batch is
/// attempted exactly once.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub enabled: bool,
    #[serde(deserialize_with = "deser_duration")]
    pub initial_interval: Duration,
    pub randomization_factor: f64,
    pub multiplier: f64,
    #[serde(deserialize_with = "deser_duration")]
    pub max_interval: Duration,
    #[serde(deserialize_with = "deser_duration")]
    pub max_elapsed_time: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_interval: Duration::from_secs(5),
            randomization_factor: 0.5,
            multiplier: 1.5,
            max_interval: Duration::from_secs(30),
            max_elapsed_time: Duration::from_secs(300),
        }
    }
}

impl RetrySettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.randomization_factor) {
            return Err(ConfigError::InvalidRetrySettings(format!(
                "randomization_factor must be within [0, 1], found {}",
                self.randomization_factor
            )));
        }
        if self.multiplier.is_nan() || self.multiplier < 1.0 {
            return Err(ConfigError::InvalidRetrySettings(format!(
                "multiplier must be at least 1, found {}",
                self.multiplier
            )));
        }
        if self.initial_interval > self.max_interval {
            return Err(ConfigError::InvalidRetrySettings(
                "initial_interval exceeds max_interval".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sending queue declaration. Validated and logged, not enforced.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub enabled: bool,
    pub num_consumers: usize,
    pub queue_size: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            num_consumers: 10,
            queue_size: 1000,
        }
    }
}

impl QueueSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.num_consumers == 0 {
            return Err(ConfigError::InvalidQueueSettings(
                "num_consumers must be greater than 0".to_string(),
            ));
        }
        if self.queue_size == 0 {
            return Err(ConfigError::InvalidQueueSettings(
                "queue_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SecurityEventExporterConfig {
    pub endpoint: String,
    /// A zero timeout is replaced by [`DEFAULT_TIMEOUT`] during validation.
    pub timeout: Duration,
    pub headers: Vec<(String, String)>,
    pub default_attributes: Map<String, Value>,
    pub retry_on_failure: RetrySettings,
    pub sending_queue: QueueSettings,
}

impl Default for SecurityEventExporterConfig {
    fn default() -> Self {
        let mut default_attributes = Map::new();
        default_attributes.insert(
            "source".to_string(),
            Value::String("opentelemetry-collector".to_string()),
        );

        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            headers: Vec::new(),
            default_attributes,
            retry_on_failure: RetrySettings::default(),
            sending_queue: QueueSettings::default(),
        }
    }
}

impl SecurityEventExporterConfig {
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        self.endpoint_uri()?;
        self.header_map()?;

        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
        }

        self.retry_on_failure.validate()?;
        self.sending_queue.validate()
    }

    pub(crate) fn endpoint_uri(&self) -> Result<Uri, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            reason,
        };

        let uri: Uri = self.endpoint.parse().map_err(|e| invalid(format!("{}", e)))?;
        match uri.scheme_str() {
            Some("http") | Some("https") => {}
            Some(other) => return Err(invalid(format!("unsupported scheme {}", other))),
            None => return Err(invalid("missing scheme".to_string())),
        }
        if uri.authority().is_none() {
            return Err(invalid("missing host".to_string()));
        }

        Ok(uri)
    }

    /// Custom headers in application order; a later duplicate replaces an earlier one.
    pub(crate) fn header_map(&self) -> Result<HeaderMap, ConfigError> {
        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| ConfigError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let mut header_value =
                HeaderValue::from_str(value).map_err(|_| ConfigError::InvalidHeader {
                    name: name.clone(),
                    reason: "value contains invalid characters".to_string(),
                })?;
            if is_sensitive_header(name) {
                header_value.set_sensitive(true);
            }
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }
}

pub struct SecurityEventExporterConfigBuilder {
    config: SecurityEventExporterConfig,
}

impl Default for SecurityEventExporterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityEventExporterConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SecurityEventExporterConfig::default(),
        }
    }

    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.config.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.config.headers.extend(headers);
        self
    }

    pub fn with_default_attribute<K: Into<String>, V: Into<Value>>(
        mut self,
        key: K,
        value: V,
    ) -> Self {
        self.config
            .default_attributes
            .insert(key.into(), value.into());
        self
    }

    /// Replace the default attributes entirely, including the built-in `source`.
    pub fn with_default_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.config.default_attributes = attributes;
        self
    }

    pub fn with_retry_settings(mut self, retry: RetrySettings) -> Self {
        self.config.retry_on_failure = retry;
        self
    }

    pub fn with_queue_settings(mut self, queue: QueueSettings) -> Self {
        self.config.sending_queue = queue;
        self
    }

    pub fn build(self) -> SecurityEventExporterConfig {
        self.config
    }
}

pub(crate) fn deser_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => humantime::parse_duration(&s).map_err(serde::de::Error::custom),
        Value::Number(n) => n
            .as_u64()
            .map(Duration::from_secs)
            .ok_or_else(|| serde::de::Error::custom("duration seconds must be a positive integer")),
        _ => Err(serde::de::Error::custom(
            "unexpected value for duration parameter",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn defaults() {
        let cfg = SecurityEventExporterConfig::default();
        assert_eq!(DEFAULT_ENDPOINT, cfg.endpoint);
        assert_eq!(Duration::from_secs(30), cfg.timeout);
        assert_eq!(
            Some(&Value::String("opentelemetry-collector".to_string())),
            cfg.default_attributes.get("source")
        );
        assert!(cfg.retry_on_failure.enabled);
        assert_eq!(Duration::from_secs(300), cfg.retry_on_failure.max_elapsed_time);
        assert_eq!(1000, cfg.sending_queue.queue_size);
    }

    #[test]
    fn empty_endpoint_is_rejected() {
        let mut cfg = SecurityEventExporterConfigBuilder::new()
            .with_endpoint("")
            .build();
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingEndpoint)));
    }

    #[test]
    fn endpoint_must_be_absolute_http() {
        let mut cfg = SecurityEventExporterConfigBuilder::new()
            .with_endpoint("ftp://example.com/events")
            .build();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidEndpoint { .. })
        ));

        let mut cfg = SecurityEventExporterConfigBuilder::new()
            .with_endpoint("/events")
            .build();
        assert_err!(cfg.validate());

        let mut cfg = SecurityEventExporterConfigBuilder::new()
            .with_endpoint("https://example.com/events")
            .build();
        assert_ok!(cfg.validate());
    }

    #[test]
    fn zero_timeout_gets_default() {
        let mut cfg = SecurityEventExporterConfigBuilder::new()
            .with_timeout(Duration::ZERO)
            .build();
        assert_ok!(cfg.validate());
        assert_eq!(DEFAULT_TIMEOUT, cfg.timeout);

        let mut cfg = SecurityEventExporterConfigBuilder::new()
            .with_timeout(Duration::from_secs(5))
            .build();
        assert_ok!(cfg.validate());
        assert_eq!(Duration::from_secs(5), cfg.timeout);
    }

    #[test]
    fn invalid_header_value_is_not_echoed() {
        let mut cfg = SecurityEventExporterConfigBuilder::new()
            .with_header("Authorization", "Bearer secret\nvalue")
            .build();
        let err = cfg.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Authorization"));
        assert!(!msg.contains("secret"));

        let mut cfg = SecurityEventExporterConfigBuilder::new()
            .with_header("bad header", "v")
            .build();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn sensitive_headers_are_flagged() {
        assert!(is_sensitive_header("Authorization"));
        assert!(is_sensitive_header("X-API-Key"));
        assert!(is_sensitive_header("x-auth-token"));
        assert!(is_sensitive_header("Cookie"));
        assert!(!is_sensitive_header("X-Tenant"));

        let cfg = SecurityEventExporterConfigBuilder::new()
            .with_header("X-Api-Key", "abc")
            .with_header("X-Tenant", "acme")
            .build();
        let headers = cfg.header_map().unwrap();
        assert!(headers.get("x-api-key").unwrap().is_sensitive());
        assert!(!headers.get("x-tenant").unwrap().is_sensitive());
    }

    #[test]
    fn passthrough_blocks_are_shape_checked() {
        let mut cfg = SecurityEventExporterConfigBuilder::new()
            .with_retry_settings(RetrySettings {
                multiplier: 0.5,
                ..Default::default()
            })
            .build();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidRetrySettings(_))
        ));

        let mut cfg = SecurityEventExporterConfigBuilder::new()
            .with_queue_settings(QueueSettings {
                enabled: true,
                num_consumers: 0,
                queue_size: 10,
            })
            .build();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidQueueSettings(_))
        ));

        // a disabled queue is not checked further
        let mut cfg = SecurityEventExporterConfigBuilder::new()
            .with_queue_settings(QueueSettings {
                enabled: false,
                num_consumers: 0,
                queue_size: 0,
            })
            .build();
        assert_ok!(cfg.validate());
    }

    #[test]
    fn retry_settings_from_json() {
        let json = r#"{"enabled": false, "initial_interval": "1s", "max_interval": 10}"#;
        let retry: RetrySettings = serde_json::from_str(json).unwrap();
        assert!(!retry.enabled);
        assert_eq!(Duration::from_secs(1), retry.initial_interval);
        assert_eq!(Duration::from_secs(10), retry.max_interval);
        assert_eq!(1.5, retry.multiplier);
    }
}
