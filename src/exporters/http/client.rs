// SPDX-License-Identifier: Apache-2.0

use bytes::Bytes;
use http_body_util::Full;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tower::BoxError;
use tracing::warn;

#[derive(Debug)]
pub struct ConnectError;
impl Display for ConnectError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unable to connect")
    }
}
impl Error for ConnectError {}

pub(crate) type HttpsClient = HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>;

pub(crate) fn build_hyper_client() -> Result<HttpsClient, BoxError> {
    let builder = match HttpsConnectorBuilder::new().with_native_roots() {
        Ok(b) => b,
        Err(e) => {
            warn!(
                error = %e,
                "Unable to load native root certificates, using bundled webpki roots"
            );
            HttpsConnectorBuilder::new().with_webpki_roots()
        }
    };

    let https = builder.https_or_http().enable_http1().enable_http2().build();

    let client = HyperClient::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(100)
        .timer(TokioTimer::new())
        .build::<_, Full<Bytes>>(https);

    Ok(client)
}
