//! HTTP transport seam
//!
//! The gateway depends only on the `Transport` trait; the concrete
//! reqwest-backed implementation lives here too. Keeping the seam narrow
//! lets tests drive the refresh state machine with scripted transports
//! and lets the gateway stay ignorant of connection pooling, TLS, and
//! timeouts.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::debug;

use crate::config::ApiConfig;
use crate::request::RequestDescription;

/// Failure of a single HTTP exchange.
///
/// The split matters to the gateway: `Status` means the server answered
/// and the status code drives classification (401 enters the refresh
/// path), while `Network` means nothing came back and no refresh is
/// warranted.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("upstream responded {status}")]
    Status { status: u16, body: Value },

    #[error("network error: {0}")]
    Network(String),
}

/// One HTTP exchange against the portal API.
///
/// Implementations resolve with the parsed response body for 2xx statuses
/// and fail with `Status` for anything the server answered, `Network`
/// when no response arrived (connect failure, timeout, aborted transfer).
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn Transport>`).
pub trait Transport: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: &'a RequestDescription,
        headers: HeaderMap,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<Value, TransportError>> + Send + 'a>>;
}

/// reqwest-backed transport.
///
/// Joins request paths onto the configured base URL and applies one
/// timeout to every exchange. Timeouts surface as `Network` errors like
/// any other no-response failure.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

impl Transport for HttpTransport {
    fn execute<'a>(
        &'a self,
        request: &'a RequestDescription,
        headers: HeaderMap,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<Value, TransportError>> + Send + 'a>>
    {
        Box::pin(async move {
            let url = join_url(&self.base_url, &request.path);
            let mut req = self
                .client
                .request(request.method.clone(), &url)
                .headers(headers)
                .timeout(self.timeout);
            if !request.query.is_empty() {
                req = req.query(&request.query);
            }
            if let Some(body) = &request.body {
                req = req.json(body);
            }

            let response = req
                .send()
                .await
                .map_err(|e| TransportError::Network(e.to_string()))?;

            let status = response.status();
            let bytes = response
                .bytes()
                .await
                .map_err(|e| TransportError::Network(e.to_string()))?;
            let body = parse_body(&bytes);

            if status.is_success() {
                Ok(body)
            } else {
                debug!(%url, status = status.as_u16(), "upstream returned error status");
                Err(TransportError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
        })
    }
}

/// Join the configured base URL with a request path.
fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Parse a response body. The portal API speaks JSON; an empty body maps
/// to `Null` and anything unparsable is preserved verbatim as a string so
/// error reporting loses nothing.
fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
