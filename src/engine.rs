//! Statement execution over one Data API session.
//!
//! # Example
//! ```ignore
//! let mut conn = Connection::connect(ConnectionConfig::load(&path)?).await?;
//! let mut rows = conn.query("SELECT t0.name FROM Contacts t0 WHERE t0.city = ?", &["Leeds".into()]).await?;
//! while let Some(row) = rows.fetch() {
//!     println!("{:?}", row);
//! }
//! ```

use std::sync::Arc;

use serde_json::Value as Json;
use tracing::{debug, info};

use crate::ast::{REC_ID, Statement};
use crate::client::{DataApiClient, DataInfo};
use crate::config::ConnectionConfig;
use crate::error::{FmError, FmResult};
use crate::identity::{EntityMetadata, id_column};
use crate::mapper::ResultSet;
use crate::parser::parse;
use crate::session::{FileTokenStore, SessionManager, TokenStore};
use crate::transpiler::{Method, Plan, TranslatedRequest, record_path, translate};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::Param;

/// Reported by [`Connection::server_version`].
pub const SERVER_VERSION: &str = "FMS Data API v1";

/// Parse and translate `sql` without touching the network.
pub fn prepare(
    sql: &str,
    params: &[Param],
    metadata: &dyn EntityMetadata,
) -> FmResult<(Statement, Plan)> {
    let stmt = parse(sql)?;
    let plan = translate(&stmt, sql, params, metadata)?;
    Ok((stmt, plan))
}

/// Result of [`Connection::execute`].
#[derive(Debug)]
pub enum Outcome {
    /// The statement ran.
    Completed(ResultSet),
    /// Held until [`Connection::commit`]; the value is its queue position.
    Queued(usize),
}

#[derive(Debug)]
struct Queued {
    stmt: Statement,
    plan: Plan,
}

/// Record created by the most recent INSERT.
#[derive(Debug, Clone)]
struct Inserted {
    layout: String,
    record_id: String,
}

/// A connection to one hosted database.
pub struct Connection {
    pub(crate) client: DataApiClient,
    metadata: Arc<dyn EntityMetadata>,
    in_transaction: bool,
    queue: Vec<Queued>,
    last_insert: Option<Inserted>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("client", &self.client)
            .field("in_transaction", &self.in_transaction)
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Connect with the reqwest transport and the on-disk token cache.
    pub async fn connect(config: ConnectionConfig) -> FmResult<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(config.timeout())
            .map_err(|e| FmError::Config(e.to_string()))?;
        let store = FileTokenStore::for_config(&config);
        debug!("Token cache at {}", store.path().display());
        Self::connect_with(config, Arc::new(transport), Arc::new(store)).await
    }

    /// Connect over a caller-supplied transport and token store.
    pub async fn connect_with(
        config: ConnectionConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn TokenStore>,
    ) -> FmResult<Self> {
        let metadata = Arc::new(config.metadata());
        let session = SessionManager::new(config, transport.clone(), store);
        Self::open(session, transport, metadata).await
    }

    /// Open a connection on a prepared session, e.g. one with a cloud
    /// authenticator attached.
    pub async fn open(
        session: SessionManager,
        transport: Arc<dyn Transport>,
        metadata: Arc<dyn EntityMetadata>,
    ) -> FmResult<Self> {
        let client = DataApiClient::open(session, transport).await?;
        Ok(Self {
            client,
            metadata,
            in_transaction: false,
            queue: Vec::new(),
            last_insert: None,
        })
    }

    pub fn server_version(&self) -> &'static str {
        SERVER_VERSION
    }

    /// Counts reported with the last call.
    pub fn data_info(&self) -> DataInfo {
        self.client.data_info()
    }

    /// The Data API call(s) `sql` translates to.
    pub fn explain(&self, sql: &str, params: &[Param]) -> FmResult<Plan> {
        prepare(sql, params, self.metadata.as_ref()).map(|(_, plan)| plan)
    }

    /// Run a statement. Inside a transaction, writes are queued instead.
    pub async fn execute(&mut self, sql: &str, params: &[Param]) -> FmResult<Outcome> {
        let (stmt, plan) = prepare(sql, params, self.metadata.as_ref())?;

        if self.in_transaction && !matches!(stmt, Statement::Select(_)) {
            self.queue.push(Queued { stmt, plan });
            debug!("Queued statement {} of transaction", self.queue.len());
            return Ok(Outcome::Queued(self.queue.len()));
        }

        self.run(&stmt, &plan).await.map(Outcome::Completed)
    }

    /// Run a statement now, transaction or not, and return its rows.
    pub async fn query(&mut self, sql: &str, params: &[Param]) -> FmResult<ResultSet> {
        let (stmt, plan) = prepare(sql, params, self.metadata.as_ref())?;
        self.run(&stmt, &plan).await
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub fn begin_transaction(&mut self) {
        self.in_transaction = true;
    }

    /// Send the queued statements in order and close the transaction.
    ///
    /// There is no atomicity: when a statement fails, those before it stay
    /// applied, the rest are dropped and the error is returned.
    pub async fn commit(&mut self) -> FmResult<usize> {
        let queue = std::mem::take(&mut self.queue);
        self.in_transaction = false;
        info!("Committing {} queued statement(s)", queue.len());

        let mut applied = 0;
        for queued in &queue {
            self.run(&queued.stmt, &queued.plan).await?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Drop the queued statements and close the transaction. Nothing
    /// already sent is undone.
    pub fn rollback(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        self.in_transaction = false;
        dropped
    }

    /// Primary key of the record created by the last INSERT.
    ///
    /// An INSERT still queued in the open transaction is sent first. For a
    /// layout keyed on `rec_id` the record id is the key; otherwise the new
    /// record is read back to get its id field.
    pub async fn last_insert_id(&mut self) -> FmResult<String> {
        if matches!(self.queue.last(), Some(q) if matches!(q.stmt, Statement::Insert(_))) {
            if let Some(queued) = self.queue.pop() {
                self.run(&queued.stmt, &queued.plan).await?;
            }
        }

        let inserted = self
            .last_insert
            .clone()
            .ok_or_else(|| FmError::api("No INSERT has run on this connection", -1))?;

        let id_col = id_column(&inserted.layout, self.metadata.as_ref());
        if id_col == REC_ID {
            return Ok(inserted.record_id);
        }

        let request = TranslatedRequest::new(
            Method::Get,
            record_path(&inserted.layout, &inserted.record_id),
        );
        let data = self.client.perform(&request).await.map_err(|e| {
            FmError::api(
                format!("Unable to locate record primary key with error {}", e),
                e.code().unwrap_or(-1),
            )
        })?;

        data.get(0)
            .and_then(|record| record.get("fieldData"))
            .and_then(|fields| fields.get(&id_col))
            .and_then(json_text)
            .ok_or_else(|| {
                FmError::api(
                    format!(
                        "Unable to locate record primary key with error field '{}' is missing",
                        id_col
                    ),
                    -1,
                )
            })
    }

    async fn run(&mut self, stmt: &Statement, plan: &Plan) -> FmResult<ResultSet> {
        let data = match plan {
            Plan::Request(request) => self.client.perform(request).await?,
            Plan::ByRecordId { lookup, target } => {
                let record_id = self.locate(stmt.layout(), lookup).await?;
                self.client.perform(&target.request(&record_id)).await?
            }
        };

        match stmt {
            Statement::Select(select) => {
                ResultSet::from_data(select.columns.clone(), data, self.client.data_info())
            }
            Statement::Insert(insert) => {
                if let Some(record_id) = data.get("recordId").and_then(json_text) {
                    self.last_insert = Some(Inserted {
                        layout: insert.layout.clone(),
                        record_id,
                    });
                }
                Ok(ResultSet::empty(1))
            }
            Statement::Update(_) | Statement::Delete(_) => Ok(ResultSet::empty(1)),
        }
    }

    /// Internal record id of the first record `lookup` finds.
    async fn locate(&mut self, layout: &str, lookup: &TranslatedRequest) -> FmResult<String> {
        let data = self
            .client
            .perform(lookup)
            .await
            .map_err(|e| FmError::RecordNotFound(format!("lookup in '{}' failed: {}", layout, e)))?;

        data.pointer("/0/recordId")
            .and_then(json_text)
            .ok_or_else(|| FmError::RecordNotFound(format!("no matching record in '{}'", layout)))
    }
}

/// Scalar JSON as text; ids arrive as strings or numbers.
pub(crate) fn json_text(value: &Json) -> Option<String> {
    match value {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
