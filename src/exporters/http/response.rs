// SPDX-License-Identifier: Apache-2.0

use bytes::Bytes;
use http::StatusCode;
use http::response::Parts;
use std::fmt::{self, Debug, Formatter};

/// Response head plus, for unsuccessful statuses, a bounded prefix of the body.
pub struct Response {
    head: Parts,
    body_preview: Option<Bytes>,
}

impl Response {
    pub fn from_http(head: Parts, body_preview: Option<Bytes>) -> Self {
        Self { head, body_preview }
    }

    pub fn status_code(&self) -> StatusCode {
        self.head.status
    }

    pub fn is_success(&self) -> bool {
        self.head.status.is_success()
    }

    /// Body preview decoded lossily as UTF-8.
    pub fn body_preview(&self) -> Option<String> {
        self.body_preview
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

impl Debug for Response {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.body_preview {
            Some(body) => write!(
                f,
                "HTTPResponse{{Status={}, Body={:?}}}",
                self.head.status, body
            ),
            None => write!(f, "HTTPResponse{{Status={}}}", self.head.status),
        }
    }
}
