//! HTTP transport port and its reqwest implementation.
//!
//! Everything above this module talks in [`HttpRequest`] / [`HttpResponse`],
//! so tests can script the remote side without a network.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as Json;
use thiserror::Error;

use crate::transpiler::Method;

/// Credentials attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Auth {
    #[default]
    None,
    Bearer(String),
    Basic { user: String, password: String },
}

/// A file sent as one multipart form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    #[default]
    Empty,
    Json(Json),
    Multipart(FilePart),
}

/// One outgoing call, with an absolute URL.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub auth: Auth,
    pub body: Body,
    /// Accept and resend cookies for the duration of this call.
    pub keep_cookies: bool,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            auth: Auth::None,
            body: Body::Empty,
            keep_cookies: false,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn keep_cookies(mut self) -> Self {
        self.keep_cookies = true;
        self
    }
}

/// A response as received, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason_phrase(status).to_string(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as JSON, if it is JSON.
    pub fn json(&self) -> Option<Json> {
        serde_json::from_str(&self.body).ok()
    }
}

/// A response whose body is kept as raw bytes (container content).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub reason: String,
    pub bytes: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl From<HttpResponse> for RawResponse {
    fn from(response: HttpResponse) -> Self {
        Self {
            status: response.status,
            reason: response.reason,
            bytes: response.body.into_bytes(),
        }
    }
}

/// Failure before any response arrived.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request timed out")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

/// Sends requests to the Data API.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Like [`Transport::send`], but the body is not decoded as text.
    async fn fetch(&self, request: HttpRequest) -> Result<RawResponse, TransportError> {
        self.send(request).await.map(RawResponse::from)
    }
}

/// Production transport over a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    /// The pooled client, or a fresh one with its own cookie jar when the
    /// request asks for cookies. Jars are never shared between calls.
    fn client_for(&self, request: &HttpRequest) -> Result<reqwest::Client, TransportError> {
        if !request.keep_cookies {
            return Ok(self.client.clone());
        }
        reqwest::Client::builder()
            .timeout(self.timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))
    }

    async fn dispatch(&self, request: HttpRequest) -> Result<reqwest::Response, TransportError> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", request.url, e)))?;

        let client = self.client_for(&request)?;
        let mut builder = client.request(reqwest_method(request.method), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.auth {
            Auth::None => builder,
            Auth::Bearer(token) => builder.bearer_auth(token),
            Auth::Basic { user, password } => {
                builder.basic_auth(user, (!password.is_empty()).then_some(password))
            }
        };
        builder = match request.body {
            Body::Empty => builder,
            Body::Json(json) => builder.json(&json),
            Body::Multipart(file) => {
                let mut part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.file_name);
                if let Some(mime) = file.mime {
                    part = part.mime_str(&mime)?;
                }
                builder.multipart(reqwest::multipart::Form::new().part(file.field, part))
            }
        };

        Ok(builder.send().await?)
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_builder() {
            TransportError::InvalidUrl(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let response = self.dispatch(request).await?;
        let status = response.status();
        let reason = status.canonical_reason().unwrap_or_default().to_string();
        let body = response.text().await?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason,
            body,
        })
    }

    async fn fetch(&self, request: HttpRequest) -> Result<RawResponse, TransportError> {
        let response = self.dispatch(request).await?;
        let status = response.status();
        let reason = status.canonical_reason().unwrap_or_default().to_string();
        let bytes = response.bytes().await?;

        Ok(RawResponse {
            status: status.as_u16(),
            reason,
            bytes: bytes.to_vec(),
        })
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_helpers() {
        let ok = HttpResponse::new(200, r#"{"response":{}}"#);
        assert!(ok.is_success());
        assert!(ok.json().is_some());

        let bad = HttpResponse::new(502, "<html>Bad Gateway</html>");
        assert!(!bad.is_success());
        assert_eq!(bad.reason, "Bad Gateway");
        assert!(bad.json().is_none());

        let raw = RawResponse::from(HttpResponse::new(404, "gone"));
        assert!(!raw.is_success());
        assert_eq!(raw.reason, "Not Found");
        assert_eq!(raw.bytes, b"gone".to_vec());
    }

    #[test]
    fn test_invalid_url_is_reported_before_sending() {
        let transport = ReqwestTransport::new(Duration::from_secs(1)).unwrap();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let err = rt
            .block_on(transport.send(HttpRequest::new(Method::Get, "not a url")))
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl(_)));
    }
}
