// SPDX-License-Identifier: Apache-2.0

use crate::exporters::http::client::{ConnectError, HttpsClient, build_hyper_client};
use crate::exporters::http::response::Response;
use bytes::{Bytes, BytesMut};
use http::Request;
use http_body_util::{BodyExt, Full};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{BoxError, Service};
use tracing::{debug, warn};

/// Upper bound on how much of an error response body is kept for diagnostics.
pub const ERROR_BODY_PREVIEW_BYTES: usize = 500;

#[derive(Clone)]
pub struct HttpClient {
    inner: HttpsClient,
}

impl HttpClient {
    pub fn build() -> Result<Self, BoxError> {
        let inner = build_hyper_client()?;
        Ok(Self { inner })
    }

    async fn perform_request(&self, req: Request<Full<Bytes>>) -> Result<Response, BoxError> {
        match self.inner.request(req).await {
            Err(e) => {
                if e.is_connect() {
                    Err(ConnectError {}.into())
                } else {
                    Err(e.into())
                }
            }
            Ok(resp) => {
                let (head, mut body) = resp.into_parts();

                if head.status.is_success() {
                    // Drain so the connection can return to the pool.
                    while let Some(next) = body.frame().await {
                        if let Err(e) = next {
                            debug!(error = %e, "Failed draining response body");
                            break;
                        }
                    }
                    return Ok(Response::from_http(head, None));
                }

                let mut preview = BytesMut::new();
                while preview.len() < ERROR_BODY_PREVIEW_BYTES {
                    match body.frame().await {
                        None => break,
                        Some(Ok(frame)) => {
                            if let Ok(data) = frame.into_data() {
                                let room = ERROR_BODY_PREVIEW_BYTES - preview.len();
                                let take = room.min(data.len());
                                preview.extend_from_slice(&data[..take]);
                            }
                        }
                        Some(Err(e)) => {
                            // The status alone decides the outcome.
                            warn!(error = %e, "Failed reading error response body");
                            break;
                        }
                    }
                }

                Ok(Response::from_http(head, Some(preview.freeze())))
            }
        }
    }
}

impl Service<Request<Full<Bytes>>> for HttpClient {
    type Response = Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
        let this = self.clone();

        Box::pin(async move { this.perform_request(req).await })
    }
}
