//! Script execution and global fields.

use indexmap::IndexMap;
use serde_json::{Map, Value as Json, json};
use tracing::debug;

use crate::client::ScriptResult;
use crate::engine::Connection;
use crate::error::{FmError, FmResult};
use crate::transpiler::{Method, TranslatedRequest, record_path};
use crate::types::Param;

/// What [`Connection::run_script`] hands back.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptOutput {
    /// The script's error code and result text.
    Result(ScriptResult),
    /// Field data of the record the script ran on, read after the run.
    Record(Map<String, Json>),
}

/// Request running `script` on `layout`, or on one record of it.
pub fn script_request(
    layout: &str,
    record_id: Option<&str>,
    script: &str,
    param: &str,
) -> TranslatedRequest {
    match record_id {
        Some(id) => TranslatedRequest::new(Method::Get, record_path(layout, id))
            .with_query("script", script)
            .with_query("script.param", param),
        None => TranslatedRequest::new(Method::Get, format!("layouts/{}/script/{}", layout, script))
            .with_query("script.param", param),
    }
}

impl Connection {
    /// Run a FileMaker script.
    ///
    /// With `return_result`, or without a record to read back, the script's
    /// own outcome is returned. Otherwise the record is re-read and its
    /// field data returned.
    pub async fn run_script(
        &mut self,
        layout: &str,
        record_id: Option<&str>,
        script: &str,
        param: &str,
        return_result: bool,
    ) -> FmResult<ScriptOutput> {
        debug!("Running script '{}' on {}", script, layout);
        let request = script_request(layout, record_id, script, param);

        let Some(id) = record_id.filter(|_| !return_result) else {
            return self.client.perform_script(&request).await.map(ScriptOutput::Result);
        };

        self.client.perform(&request).await?;
        let record = self
            .client
            .perform(&TranslatedRequest::new(Method::Get, record_path(layout, id)))
            .await?;

        match record.get(0).and_then(|r| r.get("fieldData")) {
            Some(Json::Object(fields)) => Ok(ScriptOutput::Record(fields.clone())),
            _ => Err(FmError::RecordNotFound(format!(
                "record {} of '{}' after running '{}'",
                id, layout, script
            ))),
        }
    }

    /// Set global fields for the session.
    pub async fn set_globals<K, V>(&mut self, globals: impl IntoIterator<Item = (K, V)>) -> FmResult<Json>
    where
        K: Into<String>,
        V: Into<Param>,
    {
        let fields: IndexMap<String, Json> = globals
            .into_iter()
            .map(|(k, v)| (k.into(), v.into().to_field_value()))
            .collect();
        let request = TranslatedRequest::new(Method::Patch, "globals")
            .with_body(json!({ "globalFields": fields }));
        self.client.perform(&request).await
    }
}
