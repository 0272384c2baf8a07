//! Container fields: uploads, server-side imports and downloads.

use std::path::Path;

use serde_json::{Value as Json, json};
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::engine::Connection;
use crate::error::{FmError, FmResult};
use crate::script::ScriptOutput;
use crate::transpiler::Method;
use crate::transport::{Auth, FilePart, HttpRequest};

/// Form field the Data API reads container uploads from.
pub const UPLOAD_FIELD: &str = "upload";

/// Script used by [`Connection::insert_into_container`].
pub const IMPORT_SCRIPT: &str = "ImportToContainer";

pub fn container_path(layout: &str, record_id: &str, field: &str, repetition: u32) -> String {
    format!(
        "layouts/{}/records/{}/containers/{}/{}",
        layout, record_id, field, repetition
    )
}

/// Undo the HTML escaping of `&`, quotes and angle brackets.
/// `&amp;` goes last so `&amp;lt;` decodes to `&lt;`, not `<`.
fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// GET request for a container path served by the FileMaker host itself
/// (an externally stored container). The path arrives HTML-escaped, as
/// it appears in field data. The configured account goes along as basic
/// auth when one is set.
pub fn external_request(config: &ConnectionConfig, path: &str) -> HttpRequest {
    let path = unescape_html(path);
    let url = format!("{}/{}", config.server_root(), path.trim_start_matches('/'));
    let request = HttpRequest::new(Method::Get, url);
    if config.user.is_empty() {
        return request;
    }
    request.auth(Auth::Basic {
        user: config.user.clone(),
        password: config.password.clone(),
    })
}

impl Connection {
    /// Upload `bytes` into a container field. Repetition defaults to 1.
    pub async fn upload_container(
        &mut self,
        layout: &str,
        record_id: &str,
        field: &str,
        repetition: Option<u32>,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> FmResult<Json> {
        let path = container_path(layout, record_id, field, repetition.unwrap_or(1));
        debug!("Uploading {} ({} bytes) to {}", file_name, bytes.len(), path);
        let part = FilePart {
            field: UPLOAD_FIELD.to_string(),
            file_name: file_name.to_string(),
            mime: None,
            bytes,
        };
        self.client.upload(&path, part).await
    }

    /// Upload a local file into a container field.
    pub async fn upload_container_file(
        &mut self,
        layout: &str,
        record_id: &str,
        field: &str,
        repetition: Option<u32>,
        file: &Path,
    ) -> FmResult<Json> {
        let bytes = tokio::fs::read(file).await?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| FmError::Config(format!("{} is not a file", file.display())))?;
        self.upload_container(layout, record_id, field, repetition, &file_name, bytes)
            .await
    }

    /// Have the server import an asset path into a container field by
    /// running the import script on the record.
    pub async fn insert_into_container(
        &mut self,
        layout: &str,
        id_field: &str,
        record_id: &str,
        field: &str,
        asset_path: &str,
    ) -> FmResult<ScriptOutput> {
        let param = json!({
            "idField": id_field,
            "uuid": record_id,
            "field": field,
            "asset": asset_path,
        })
        .to_string();
        self.run_script(layout, Some(record_id), IMPORT_SCRIPT, &param, false)
            .await
    }
}

impl Connection {
    /// Download an externally stored container from the host.
    pub async fn external_container_content(&self, path: &str) -> FmResult<Vec<u8>> {
        let request = external_request(self.client.session().config(), path);
        self.client.download(request).await
    }

    /// Download a container through the streaming URL found in its field
    /// value. The server answers with a cookie and a redirect, so the call
    /// keeps cookies; the URL is already authorized and gets no credentials.
    pub async fn streamed_container_content(&self, url: &str) -> FmResult<Vec<u8>> {
        let request = HttpRequest::new(Method::Get, url).keep_cookies();
        self.client.download(request).await
    }
}
