//! Signed HTTP requests against the gateway, with throttling retries.

use crate::auth::{authorization_token, http_date};
use chrono::Utc;
use cosmo_core::{BackendError, DriverOptions};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const API_VERSION: &str = "2018-12-31";

/// Retry delay used when a 429 carries no `x-ms-retry-after-ms`.
const DEFAULT_RETRY_AFTER_MS: u64 = 1000;

/// One logical request. Rebuilt and re-signed on every attempt.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: Method,
    /// URL path below the endpoint, already percent-encoded.
    pub path: String,
    pub resource_type: &'static str,
    /// Unencoded resource link used for signing.
    pub resource_link: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Value>,
}

impl GatewayRequest {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        resource_type: &'static str,
        resource_link: impl Into<String>,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            resource_type,
            resource_link: resource_link.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A successful response.
#[derive(Debug)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub body: Value,
    pub request_charge: f64,
    pub continuation: Option<String>,
}

/// HTTP client bound to one account.
pub struct GatewayClient {
    http: reqwest::Client,
    endpoint: String,
    key: Vec<u8>,
    options: DriverOptions,
}

impl GatewayClient {
    pub fn new(http: reqwest::Client, endpoint: String, key: Vec<u8>, options: DriverOptions) -> Self {
        Self {
            http,
            endpoint,
            key,
            options,
        }
    }

    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    /// Send a request, retrying throttled (429) responses within the
    /// configured attempt and wait budget.
    pub async fn send(&self, request: &GatewayRequest) -> Result<GatewayResponse, BackendError> {
        let mut attempts = 0u32;
        let mut waited_ms = 0u64;

        loop {
            match self.send_once(request).await {
                Err(failure) if failure.error.is_throttled() => {
                    let retry_after = failure.retry_after_ms.unwrap_or(DEFAULT_RETRY_AFTER_MS);
                    if attempts >= self.options.max_retry_attempts
                        || waited_ms + retry_after > self.options.max_retry_wait_ms
                    {
                        warn!(
                            path = %request.path,
                            attempts,
                            waited_ms,
                            "Giving up on throttled request"
                        );
                        return Err(failure.error);
                    }
                    attempts += 1;
                    waited_ms += retry_after;
                    debug!(path = %request.path, attempt = attempts, retry_after_ms = retry_after, "Throttled, retrying");
                    tokio::time::sleep(Duration::from_millis(retry_after)).await;
                }
                Err(failure) => return Err(failure.error),
                Ok(response) => return Ok(response),
            }
        }
    }

    async fn send_once(&self, request: &GatewayRequest) -> Result<GatewayResponse, Failure> {
        let date = http_date(Utc::now());
        let token = authorization_token(
            &self.key,
            request.method.as_str(),
            request.resource_type,
            &request.resource_link,
            &date,
        )?;

        let url = format!("{}/{}", self.endpoint, request.path);
        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .header("authorization", token)
            .header("x-ms-date", &date)
            .header("x-ms-version", API_VERSION)
            .header("accept", "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        if let Some(body) = &request.body {
            // Query bodies need their own content type, so serialize by hand.
            let bytes = serde_json::to_vec(body)
                .map_err(|e| BackendError::new(format!("cannot encode request body: {}", e)))?;
            builder = builder.body(bytes);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::new(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        let headers = response.headers().clone();
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let request_charge = header("x-ms-request-charge")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0);
        let continuation = header("x-ms-continuation").filter(|c| !c.is_empty());
        let retry_after_ms = header("x-ms-retry-after-ms").and_then(|v| v.parse().ok());

        let text = response
            .text()
            .await
            .map_err(|e| BackendError::new(format!("cannot read response body: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(text);
            return Err(Failure {
                error: BackendError::with_status(status.as_u16(), message),
                retry_after_ms,
            });
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|e| BackendError::new(format!("cannot decode response body: {}", e)))?
        };

        Ok(GatewayResponse {
            status,
            body,
            request_charge,
            continuation,
        })
    }
}

/// A failed attempt, with the server's requested back-off if any.
struct Failure {
    error: BackendError,
    retry_after_ms: Option<u64>,
}

impl From<BackendError> for Failure {
    fn from(error: BackendError) -> Self {
        Self {
            error,
            retry_after_ms: None,
        }
    }
}

/// Percent-encode one path segment (database, container or document id).
pub fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}
