// SPDX-License-Identifier: Apache-2.0

use crate::exporters::http::client::ConnectError;
use crate::exporters::http::http_client::HttpClient;
use crate::exporters::securityevent::config::{SecurityEventExporterConfig, is_sensitive_header};
use crate::exporters::securityevent::errors::{BuildError, ExportError};
use crate::exporters::securityevent::event::EventBatch;
use crate::exporters::securityevent::metrics::DeliveryMetrics;
use crate::exporters::securityevent::truncate_str;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method, Request, StatusCode, Uri};
use http_body_util::Full;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tower::timeout::Timeout;
use tower::timeout::error::Elapsed;
use tower::{BoxError, ServiceExt};
use tracing::{debug, warn};

const PAYLOAD_PREVIEW_CHARS: usize = 200;

/// Outcome of a successful delivery.
#[derive(Clone, Debug)]
pub struct Delivery {
    pub status: StatusCode,
    pub duration: Duration,
    pub payload_bytes: usize,
}

/// Posts one batch per call to the configured endpoint.
pub struct BatchSender {
    endpoint: Uri,
    headers: HeaderMap,
    timeout: Duration,
    client: Timeout<HttpClient>,
    metrics: Arc<DeliveryMetrics>,
}

impl BatchSender {
    pub fn new(
        config: &SecurityEventExporterConfig,
        metrics: Arc<DeliveryMetrics>,
    ) -> Result<Self, BuildError> {
        let endpoint = config.endpoint_uri()?;
        let headers = config.header_map()?;
        let client = HttpClient::build().map_err(BuildError::Client)?;

        Ok(Self {
            endpoint,
            headers,
            timeout: config.timeout,
            client: Timeout::new(client, config.timeout),
            metrics,
        })
    }

    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    /// Deliver `batch` as a single POST.
    ///
    /// Every call that reaches the network records one request and one duration
    /// sample, whatever the outcome. Failures to encode the batch never reach the
    /// network and only count as an HTTP error.
    pub async fn send(
        &self,
        batch: &EventBatch,
        cancel: &CancellationToken,
    ) -> Result<Delivery, ExportError> {
        let payload = match batch.to_json() {
            Ok(p) => p,
            Err(e) => {
                self.metrics.add_http_error();
                return Err(e.into());
            }
        };
        let payload_bytes = payload.len();

        debug!(
            event_count = batch.len(),
            payload_bytes,
            payload_preview = %truncate_str(&String::from_utf8_lossy(&payload), PAYLOAD_PREVIEW_CHARS),
            "Marshaled security event batch"
        );

        let req = match self.build_request(payload) {
            Ok(r) => r,
            Err(e) => {
                self.metrics.add_http_error();
                return Err(e.into());
            }
        };

        debug!(
            endpoint = %self.endpoint,
            timeout = ?self.timeout,
            "Sending HTTP request"
        );

        let start = Instant::now();
        let svc = self.client.clone();
        let result = select! {
            biased;

            _ = cancel.cancelled() => Err(ExportError::Cancelled),
            resp = svc.oneshot(req) => match resp {
                Ok(resp) => {
                    if resp.is_success() {
                        Ok(resp.status_code())
                    } else {
                        Err(ExportError::Rejected {
                            status: resp.status_code(),
                            body: resp.body_preview(),
                        })
                    }
                }
                Err(e) => Err(self.classify(e)),
            },
        };
        let duration = start.elapsed();
        self.metrics.record_http_request(duration);

        match result {
            Ok(status) => {
                debug!(
                    status_code = status.as_u16(),
                    duration = ?duration,
                    "HTTP request completed"
                );
                Ok(Delivery {
                    status,
                    duration,
                    payload_bytes,
                })
            }
            Err(e) => {
                self.metrics.add_http_error();
                match &e {
                    ExportError::Rejected { status, body } => warn!(
                        status_code = status.as_u16(),
                        response_body = body.as_deref().unwrap_or(""),
                        duration = ?duration,
                        "HTTP request failed with non-success status"
                    ),
                    _ => warn!(
                        error = %e,
                        endpoint = %self.endpoint,
                        duration = ?duration,
                        "HTTP request failed"
                    ),
                }
                Err(e)
            }
        }
    }

    fn build_request(&self, payload: Vec<u8>) -> Result<Request<Full<Bytes>>, http::Error> {
        let mut req = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(Full::new(Bytes::from(payload)))?;

        // Configured headers replace the defaults on a name clash.
        for (name, value) in self.headers.iter() {
            debug!(
                header = name.as_str(),
                is_sensitive = is_sensitive_header(name.as_str()),
                "Added custom header"
            );
            req.headers_mut().insert(name.clone(), value.clone());
        }

        Ok(req)
    }

    fn classify(&self, e: BoxError) -> ExportError {
        if e.is::<Elapsed>() {
            ExportError::Timeout(self.timeout)
        } else if e.is::<ConnectError>() {
            ExportError::Connect
        } else {
            ExportError::Transport(e)
        }
    }
}
