//! Delivery of compressed write requests over HTTP.

use async_trait::async_trait;
use std::convert::TryInto;
use std::time::Duration;
use surf::http::auth::BasicAuth;
use surf::http::headers::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE};
use surf::Url;

use crate::error::TransportError;

/// The `Content-Type` of a protobuf encoded write request.
pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

/// The `Content-Encoding` of a snappy (block format) compressed body.
pub const SNAPPY_CONTENT_ENCODING: &str = "snappy";

pub const REMOTE_WRITE_VERSION_HEADER: &str = "X-Prometheus-Remote-Write-Version";
pub const REMOTE_WRITE_VERSION: &str = "0.1.0";

/// How a push authenticates with the receiver; at most one mode is active.
#[derive(Clone, Debug, PartialEq)]
pub enum Auth {
    None,
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl Default for Auth {
    fn default() -> Self {
        Auth::None
    }
}

impl Auth {
    /// The `Authorization` header value, if any.
    pub fn header_value(&self) -> Option<String> {
        match self {
            Auth::None => None,
            Auth::Basic { username, password } => {
                Some(BasicAuth::new(username, password).value().to_string())
            }
            Auth::Bearer { token } => Some(format!("Bearer {}", token)),
        }
    }
}

/// The Transport trait is implemented by anything which can deliver an encoded,
/// compressed write request.
///
/// A send either lands as a whole or fails; there is no partial success.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, body: Vec<u8>) -> Result<(), TransportError>;
}

/// Sends write requests with a single HTTP POST; failures are not retried.
pub struct HttpTransport {
    client: surf::Client,
    url: Url,
    auth: Auth,
    timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new(url: &str, auth: Auth, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let url = Url::parse(url).map_err(|err| TransportError::InvalidUrl {
            url: url.into(),
            reason: err.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => (),
            scheme => {
                return Err(TransportError::InvalidUrl {
                    url: url.to_string(),
                    reason: format!("unsupported scheme '{}'", scheme),
                })
            }
        }

        // The default client gives up after 60s; `timeout` is enforced in `send` instead
        let client: surf::Client = surf::Config::new()
            .set_timeout(None)
            .try_into()
            .unwrap_or_else(|never: std::convert::Infallible| match never {});
        Ok(HttpTransport {
            client,
            url,
            auth,
            timeout,
        })
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn post(&self, body: Vec<u8>) -> Result<(), TransportError> {
        // Set the headers after the body, which would otherwise reset `Content-Type`
        let mut request = self
            .client
            .post(self.url.clone())
            .body_bytes(body)
            .header(CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)
            .header(CONTENT_ENCODING, SNAPPY_CONTENT_ENCODING)
            .header(REMOTE_WRITE_VERSION_HEADER, REMOTE_WRITE_VERSION);
        if let Some(value) = self.auth.header_value() {
            request = request.header(AUTHORIZATION, value);
        }

        let mut response = request.await.map_err(TransportError::Failed)?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        // Receivers explain rejections in the body, e.g. "out of order sample"
        let message = match response.body_string().await {
            Ok(body) => body.trim_end().to_string(),
            Err(err) => format!("<unreadable response body: {}>", err),
        };
        Err(TransportError::Rejected {
            status: u16::from(status),
            message,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, body: Vec<u8>) -> Result<(), TransportError> {
        match self.timeout {
            Some(timeout) => async_std::future::timeout(timeout, self.post(body))
                .await
                .map_err(|_| TransportError::Timeout(timeout))?,
            None => self.post(body).await,
        }
    }
}
