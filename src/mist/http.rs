//! HTTP transport for Mist REST API calls
//!
//! Only transport-level problems (connect, TLS, timeout) are errors here.
//! A non-2xx status is a normal [`ApiResponse`] for the caller to interpret,
//! since the API's error bodies carry the message worth surfacing.

use crate::error::WorkflowError;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Fixed per-request timeout. Bounds each HTTP call, never the workflow.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and masks non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let head: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
        format!("{}... [truncated, {} bytes total]", head, body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// A completed exchange with the management API.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body as JSON.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    /// Best-effort extraction of the server's `detail` error field.
    pub fn detail(&self) -> Option<String> {
        let value: Value = serde_json::from_str(&self.body).ok()?;
        value
            .get("detail")
            .and_then(|d| d.as_str())
            .map(str::to_string)
    }

    /// Human-readable failure message: the server's `detail` when present,
    /// else the raw status code.
    pub fn failure_message(&self) -> String {
        self.detail()
            .unwrap_or_else(|| format!("HTTP status {}", self.status.as_u16()))
    }

    /// Convert a failed response into the typed error carrying the most
    /// specific message available.
    pub fn as_error(&self) -> WorkflowError {
        WorkflowError::RemoteApi {
            status: self.status.as_u16(),
            detail: self.failure_message(),
        }
    }
}

/// HTTP client wrapper for Mist API calls
#[derive(Clone)]
pub struct MistHttpClient {
    client: Client,
}

impl MistHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self, WorkflowError> {
        let client = Client::builder()
            .user_agent(concat!("mistctl/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { client })
    }

    /// Build a request with the Mist token auth header and JSON content type.
    /// Security: the token goes into the header only, never into a URL or log.
    fn authed(&self, method: Method, url: &str, token: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(AUTHORIZATION, format!("Token {token}"))
            .header(CONTENT_TYPE, "application/json")
    }

    async fn execute(&self, request: RequestBuilder) -> Result<ApiResponse, WorkflowError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Security: only log sanitized/truncated error bodies
            tracing::warn!("API error: {} - {}", status, sanitize_for_log(&body));
        }

        Ok(ApiResponse { status, body })
    }

    /// Make a GET request to the management API.
    pub async fn get(&self, url: &str, token: &str) -> Result<ApiResponse, WorkflowError> {
        tracing::debug!("GET {}", url);
        self.execute(self.authed(Method::GET, url, token)).await
    }

    /// Make a POST request with a JSON body.
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        url: &str,
        token: &str,
        body: &B,
    ) -> Result<ApiResponse, WorkflowError> {
        tracing::debug!("POST {}", url);
        self.execute(self.authed(Method::POST, url, token).json(body))
            .await
    }

    /// Make a PUT request with a JSON body.
    pub async fn put<B: Serialize + ?Sized>(
        &self,
        url: &str,
        token: &str,
        body: &B,
    ) -> Result<ApiResponse, WorkflowError> {
        tracing::debug!("PUT {}", url);
        self.execute(self.authed(Method::PUT, url, token).json(body))
            .await
    }

    /// Make a DELETE request to the management API.
    pub async fn delete(&self, url: &str, token: &str) -> Result<ApiResponse, WorkflowError> {
        tracing::debug!("DELETE {}", url);
        self.execute(self.authed(Method::DELETE, url, token)).await
    }
}

impl Default for MistHttpClient {
    fn default() -> Self {
        Self::new().expect("Failed to create default HTTP client")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> ApiResponse {
        ApiResponse {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
        }
    }

    #[test]
    fn detail_extracted_from_error_body() {
        let resp = response(403, r#"{"detail": "forbidden"}"#);
        assert_eq!(resp.detail().as_deref(), Some("forbidden"));
        assert_eq!(resp.failure_message(), "forbidden");
    }

    #[test]
    fn failure_message_falls_back_to_status() {
        let resp = response(500, "not json at all");
        assert_eq!(resp.detail(), None);
        assert_eq!(resp.failure_message(), "HTTP status 500");
    }

    #[test]
    fn empty_body_is_not_a_detail() {
        let resp = response(204, "");
        assert!(resp.is_success());
        assert_eq!(resp.detail(), None);
    }

    #[test]
    fn as_error_carries_status_and_detail() {
        let err = response(401, r#"{"detail": "invalid token"}"#).as_error();
        match err {
            WorkflowError::RemoteApi { status, detail } => {
                assert_eq!(status, 401);
                assert_eq!(detail, "invalid token");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn sanitize_truncates_and_masks() {
        let long = "x".repeat(300);
        let sanitized = sanitize_for_log(&long);
        assert!(sanitized.contains("[truncated, 300 bytes total]"));

        let control = "line1\nline2\tend";
        assert_eq!(sanitize_for_log(control), "line1line2end");
    }
}
