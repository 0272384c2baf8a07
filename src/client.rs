//! Request execution against the Data API.
//!
//! Every call carries the session token. An expired session is refreshed
//! and the call replayed, at most once per call: the `retried` flag lives
//! in the loop of [`DataApiClient::send`], not in the client, so one
//! caller's retry never leaks into the next call.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::error::{FmError, FmResult};
use crate::session::SessionManager;
use crate::transpiler::{Method, TranslatedRequest};
use crate::transport::{Auth, Body, FilePart, HttpRequest, Transport, TransportError};

/// Application code meaning "no records match".
pub const CODE_NO_RECORDS: i64 = 401;
/// Application code for a missing layout; also seen with stale sessions.
pub const CODE_LAYOUT_MISSING: i64 = 105;
/// Application code for an invalid or expired token.
pub const CODE_INVALID_TOKEN: i64 = 952;

/// Counts reported with the last result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataInfo {
    pub found_count: u64,
    pub returned_count: u64,
    pub total_record_count: u64,
}

/// Script outcome as reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptResult {
    /// Script error code; `"0"` on success.
    pub error: String,
    pub result: String,
}

enum Reply {
    Body(Json),
    NoRecords,
}

/// First entry of a Data API `messages` array as `(message, code)`.
/// The server sends codes as strings, older versions as numbers.
pub fn remote_message(body: &Json) -> Option<(String, i64)> {
    let first = body.get("messages")?.get(0)?;
    let code = match first.get("code")? {
        Json::String(s) => s.trim().parse().ok()?,
        Json::Number(n) => n.as_i64()?,
        _ => return None,
    };
    let message = first
        .get("message")
        .and_then(Json::as_str)
        .unwrap_or_default()
        .to_string();
    Some((message, code))
}

/// Data API client bound to one session.
pub struct DataApiClient {
    session: SessionManager,
    transport: Arc<dyn Transport>,
    base_url: String,
    data_info: DataInfo,
}

impl std::fmt::Debug for DataApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataApiClient")
            .field("base_url", &self.base_url)
            .field("session", &self.session)
            .field("data_info", &self.data_info)
            .finish_non_exhaustive()
    }
}

impl DataApiClient {
    /// Wrap `session`, establishing a token straight away.
    pub async fn open(mut session: SessionManager, transport: Arc<dyn Transport>) -> FmResult<Self> {
        session.token().await?;
        let base_url = session.config().base_url();
        Ok(Self {
            session,
            transport,
            base_url,
            data_info: DataInfo::default(),
        })
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Counts of the last successful call; zero after "no records".
    pub fn data_info(&self) -> DataInfo {
        self.data_info
    }

    /// Perform a call and return `response.data`, or the whole `response`
    /// object when there is no data array. "No records" gives `[]`.
    pub async fn perform(&mut self, request: &TranslatedRequest) -> FmResult<Json> {
        let body = request.body.clone().map(Body::Json).unwrap_or_default();
        match self.send(request.method, request, body).await? {
            Reply::Body(mut content) => {
                let mut response = content
                    .get_mut("response")
                    .map(Json::take)
                    .unwrap_or(Json::Null);
                if let Some(data) = response.get_mut("data") {
                    return Ok(data.take());
                }
                Ok(response)
            }
            Reply::NoRecords => Ok(Json::Array(Vec::new())),
        }
    }

    /// Perform a call that runs a script and return the script's outcome.
    pub async fn perform_script(&mut self, request: &TranslatedRequest) -> FmResult<ScriptResult> {
        match self.send(request.method, request, Body::Empty).await? {
            Reply::Body(content) => {
                let text = |key: &str| match content.pointer(&format!("/response/{}", key)) {
                    Some(Json::String(s)) => s.clone(),
                    Some(Json::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                Ok(ScriptResult {
                    error: text("scriptError"),
                    result: text("scriptResult"),
                })
            }
            Reply::NoRecords => Ok(ScriptResult {
                error: CODE_NO_RECORDS.to_string(),
                result: String::new(),
            }),
        }
    }

    /// Upload a file as a multipart form to `path`.
    pub async fn upload(&mut self, path: &str, file: FilePart) -> FmResult<Json> {
        let request = TranslatedRequest::new(Method::Post, path);
        match self.send(Method::Post, &request, Body::Multipart(file)).await? {
            Reply::Body(content) => Ok(content.get("response").cloned().unwrap_or(Json::Null)),
            Reply::NoRecords => Ok(Json::Null),
        }
    }

    /// Fetch a URL outside the Data API (container content) and return
    /// the body untouched. No session token is attached and nothing is
    /// retried.
    pub async fn download(&self, request: HttpRequest) -> FmResult<Vec<u8>> {
        debug!("{} {}", request.method, request.url);
        let response = self
            .transport
            .fetch(request)
            .await
            .map_err(|e| FmError::api(e.to_string(), -1))?;
        if !response.is_success() {
            return Err(FmError::api(response.reason, i64::from(response.status)));
        }
        Ok(response.bytes)
    }

    async fn send(
        &mut self,
        method: Method,
        request: &TranslatedRequest,
        body: Body,
    ) -> FmResult<Reply> {
        let url = format!("{}{}", self.base_url, request.path.trim_start_matches('/'));
        let mut retried = false;

        loop {
            let token = self.session.token().await?;
            let mut http = HttpRequest::new(method, url.clone())
                .query(request.query.clone())
                .header("Accept-Encoding", "gzip, deflate, br")
                .auth(Auth::Bearer(token));
            if !matches!(body, Body::Multipart(_)) {
                http = http.header("Content-Type", "application/json");
            }
            let http = http.body(body.clone());

            debug!("{} {}", method, request.uri());
            let response = match self.transport.send(http).await {
                Ok(response) => response,
                Err(TransportError::Other(e)) => {
                    warn!("Transport failure: {}", e);
                    return Err(FmError::auth("Unknown error", -1));
                }
                Err(e) => return Err(FmError::api(e.to_string(), -1)),
            };

            if response.is_success() {
                let content: Json = serde_json::from_str(&response.body)?;
                self.data_info = content
                    .pointer("/response/dataInfo")
                    .cloned()
                    .and_then(|info| serde_json::from_value(info).ok())
                    .unwrap_or_default();
                return Ok(Reply::Body(content));
            }

            // FileMaker Cloud reports an expired token as a bare HTTP 401.
            if response.status == 401 && self.session.config().is_cloud() {
                if retried {
                    return Err(FmError::api(response.reason, 401));
                }
                retried = true;
                warn!("Session rejected with HTTP 401, refreshing");
                self.session.force_refresh().await?;
                continue;
            }

            let Some((message, code)) = response.json().as_ref().and_then(remote_message) else {
                return Err(FmError::api(response.reason, i64::from(response.status)));
            };

            if code == CODE_NO_RECORDS {
                self.data_info = DataInfo::default();
                return Ok(Reply::NoRecords);
            }

            if !retried && matches!(code, CODE_LAYOUT_MISSING | CODE_INVALID_TOKEN) {
                retried = true;
                warn!("Data API error {} ({}), refreshing session", code, message);
                self.session.force_refresh().await?;
                continue;
            }

            return Err(FmError::api(message, code));
        }
    }
}
