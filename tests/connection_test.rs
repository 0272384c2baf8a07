//! Connection behaviour against a scripted Data API.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{Value as Json, json};

use fmsql::client::DataInfo;
use fmsql::prelude::*;
use fmsql::session::{
    CloudAuthenticator, CloudCredentials, FileTokenStore, MemoryTokenStore, SessionManager,
    TokenStore,
};
use fmsql::transpiler::Method;
use fmsql::transport::{
    Auth, Body, HttpRequest, HttpResponse, Transport, TransportError,
};

const BASE: &str = "https://fm.test/fmi/data/v1/databases/Sales/";

/// Replays canned replies in order and records every request.
#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    sent: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn reply(&self, status: u16, body: Json) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(HttpResponse::new(status, body.to_string())));
        self
    }

    fn reply_raw(&self, status: u16, body: &str) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(HttpResponse::new(status, body)));
        self
    }

    fn fail(&self, error: TransportError) -> &Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    fn sent(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.sent.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("no scripted reply".into())))
    }
}

fn config() -> ConnectionConfig {
    ConnectionConfig::builder()
        .host("fm.test")
        .database("Sales")
        .credentials("api", "secret")
        .build()
}

fn error_body(code: &str, message: &str) -> Json {
    json!({ "messages": [{ "code": code, "message": message }], "response": {} })
}

fn session_body(token: &str) -> Json {
    json!({ "response": { "token": token }, "messages": [{ "code": "0", "message": "OK" }] })
}

fn records(records: Json) -> Json {
    json!({
        "response": {
            "dataInfo": { "foundCount": 2, "returnedCount": 2, "totalRecordCount": 40 },
            "data": records,
        },
        "messages": [{ "code": "0", "message": "OK" }],
    })
}

fn contacts() -> Json {
    records(json!([
        { "recordId": "1", "modId": "4", "fieldData": { "name": "Ann", "city": "Leeds" } },
        { "recordId": "2", "modId": "1", "fieldData": { "name": "Bob", "city": "" } },
    ]))
}

async fn connect(
    transport: &Arc<ScriptedTransport>,
    store: Arc<MemoryTokenStore>,
) -> Connection {
    Connection::connect_with(config(), transport.clone(), store)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_cached_token_skips_session_request() {
    let transport = ScriptedTransport::new();
    transport.reply(200, contacts());
    let mut conn = connect(&transport, Arc::new(MemoryTokenStore::with_token("cached"))).await;

    let mut rows = conn.query("SELECT * FROM Contacts", &[]).await.unwrap();
    assert_eq!(rows.row_count(), 2);
    assert_eq!(rows.fetch().unwrap()["name"], json!("Ann"));
    assert_eq!(rows.fetch().unwrap()["city"], Json::Null);
    assert!(rows.fetch().is_none());

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, Method::Get);
    assert_eq!(sent[0].url, format!("{}layouts/Contacts/records", BASE));
    assert_eq!(
        sent[0].query,
        vec![
            ("_offset".to_string(), "1".to_string()),
            ("_limit".to_string(), "10000".to_string()),
        ]
    );
    assert_eq!(sent[0].auth, Auth::Bearer("cached".into()));
    assert!(
        sent[0]
            .headers
            .contains(&("Accept-Encoding".to_string(), "gzip, deflate, br".to_string()))
    );
    assert_eq!(
        conn.data_info(),
        DataInfo {
            found_count: 2,
            returned_count: 2,
            total_record_count: 40
        }
    );
}

#[tokio::test]
async fn test_session_acquired_and_cached() {
    let transport = ScriptedTransport::new();
    transport.reply(200, session_body("fresh"));
    let store = Arc::new(MemoryTokenStore::new());
    let _conn = connect(&transport, store.clone()).await;

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, Method::Post);
    assert_eq!(sent[0].url, format!("{}sessions", BASE));
    assert_eq!(
        sent[0].auth,
        Auth::Basic {
            user: "api".into(),
            password: "secret".into()
        }
    );
    assert_eq!(store.load().unwrap(), Some("fresh".to_string()));
}

#[tokio::test]
async fn test_file_token_store_shared_between_connections() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConnectionConfig::builder()
        .host("fm.test")
        .database("Sales")
        .credentials("api", "secret")
        .token_dir(dir.path())
        .build();

    let transport = ScriptedTransport::new();
    transport.reply(200, session_body("on-disk"));
    let store = Arc::new(FileTokenStore::for_config(&config));
    Connection::connect_with(config.clone(), transport.clone(), store.clone())
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "on-disk");

    let second = ScriptedTransport::new();
    second.reply(200, contacts());
    let mut conn = Connection::connect_with(config, second.clone(), store)
        .await
        .unwrap();
    conn.query("SELECT * FROM Contacts", &[]).await.unwrap();
    assert_eq!(second.sent().len(), 1);
    assert_eq!(second.sent()[0].auth, Auth::Bearer("on-disk".into()));
}

#[tokio::test]
async fn test_expired_token_is_refreshed_once() {
    let transport = ScriptedTransport::new();
    transport
        .reply(401, error_body("952", "Invalid FileMaker Data API token (*)"))
        .reply(200, session_body("fresh"))
        .reply(200, contacts());
    let store = Arc::new(MemoryTokenStore::with_token("stale"));
    let mut conn = connect(&transport, store.clone()).await;

    let rows = conn.query("SELECT * FROM Contacts", &[]).await.unwrap();
    assert_eq!(rows.row_count(), 2);

    let sent = transport.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].auth, Auth::Bearer("stale".into()));
    assert_eq!(sent[1].url, format!("{}sessions", BASE));
    assert_eq!(sent[2].auth, Auth::Bearer("fresh".into()));
    assert_eq!(sent[2].url, sent[0].url);
    assert_eq!(store.load().unwrap(), Some("fresh".to_string()));
}

#[tokio::test]
async fn test_second_expiry_is_fatal() {
    let transport = ScriptedTransport::new();
    transport
        .reply(401, error_body("952", "Invalid FileMaker Data API token (*)"))
        .reply(200, session_body("fresh"))
        .reply(401, error_body("952", "Invalid FileMaker Data API token (*)"));
    let mut conn = connect(&transport, Arc::new(MemoryTokenStore::with_token("stale"))).await;

    let err = conn.query("SELECT * FROM Contacts", &[]).await.unwrap_err();
    assert!(matches!(err, FmError::Api { code: 952, .. }));
    assert_eq!(transport.sent().len(), 3);
}

#[tokio::test]
async fn test_missing_layout_is_retried_then_reported() {
    let transport = ScriptedTransport::new();
    transport
        .reply(500, error_body("105", "Layout is missing"))
        .reply(200, session_body("fresh"))
        .reply(500, error_body("105", "Layout is missing"));
    let mut conn = connect(&transport, Arc::new(MemoryTokenStore::with_token("t"))).await;

    let err = conn.query("SELECT * FROM Nope", &[]).await.unwrap_err();
    assert_eq!(err.to_string(), "FileMaker error 105: Layout is missing");
}

#[tokio::test]
async fn test_retry_budget_is_per_call() {
    let transport = ScriptedTransport::new();
    transport
        .reply(401, error_body("952", "Invalid token"))
        .reply(200, session_body("t2"))
        .reply(200, contacts())
        .reply(401, error_body("952", "Invalid token"))
        .reply(200, session_body("t3"))
        .reply(200, contacts());
    let mut conn = connect(&transport, Arc::new(MemoryTokenStore::with_token("t1"))).await;

    conn.query("SELECT * FROM Contacts", &[]).await.unwrap();
    conn.query("SELECT * FROM Contacts", &[]).await.unwrap();
    assert_eq!(transport.sent().len(), 6);
}

#[tokio::test]
async fn test_no_records_code_is_an_empty_result() {
    let transport = ScriptedTransport::new();
    transport.reply(500, error_body("401", "No records match the request"));
    let mut conn = connect(&transport, Arc::new(MemoryTokenStore::with_token("t"))).await;

    let mut rows = conn
        .query("SELECT * FROM Contacts WHERE name = ?", &["Zed".into()])
        .await
        .unwrap();
    assert_eq!(rows.row_count(), 0);
    assert!(rows.fetch().is_none());
    assert_eq!(transport.sent()[0].body, Body::Json(json!({ "query": [{ "name": "==Zed" }] })));
}

#[tokio::test]
async fn test_other_codes_are_surfaced() {
    let transport = ScriptedTransport::new();
    transport.reply(500, error_body("102", "Field is missing"));
    let mut conn = connect(&transport, Arc::new(MemoryTokenStore::with_token("t"))).await;

    let err = conn
        .query("SELECT * FROM Contacts WHERE nope = ?", &["x".into()])
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(102));
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn test_unparseable_error_uses_http_status() {
    let transport = ScriptedTransport::new();
    transport.reply_raw(502, "<html>Bad Gateway</html>");
    let mut conn = connect(&transport, Arc::new(MemoryTokenStore::with_token("t"))).await;

    let err = conn.query("SELECT * FROM Contacts", &[]).await.unwrap_err();
    assert!(matches!(err, FmError::Api { code: 502, ref message } if message == "Bad Gateway"));
}

#[tokio::test]
async fn test_transport_failures() {
    let transport = ScriptedTransport::new();
    transport
        .fail(TransportError::Connect("connection refused".into()))
        .fail(TransportError::Other("stream reset".into()));
    let mut conn = connect(&transport, Arc::new(MemoryTokenStore::with_token("t"))).await;

    let err = conn.query("SELECT * FROM Contacts", &[]).await.unwrap_err();
    assert!(matches!(err, FmError::Api { code: -1, .. }));

    let err = conn.query("SELECT * FROM Contacts", &[]).await.unwrap_err();
    assert!(
        matches!(err, FmError::Authentication { code: -1, ref message } if message == "Unknown error")
    );
}

#[tokio::test]
async fn test_wrong_database_fails_authentication() {
    let transport = ScriptedTransport::new();
    transport.reply_raw(404, "");
    let err = Connection::connect_with(config(), transport.clone(), Arc::new(MemoryTokenStore::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, FmError::Authentication { code: 404, ref message } if message == "Not Found"));
}

#[tokio::test]
async fn test_bad_credentials_fail_authentication() {
    let transport = ScriptedTransport::new();
    transport.reply(401, error_body("212", "Invalid user account and/or password"));
    let err = Connection::connect_with(config(), transport.clone(), Arc::new(MemoryTokenStore::new()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(212));
}

struct CountingAuthenticator {
    calls: AtomicUsize,
}

#[async_trait]
impl CloudAuthenticator for CountingAuthenticator {
    async fn fetch_token(&self, credentials: &CloudCredentials) -> FmResult<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("{}-cloud-{}", credentials.user, n))
    }
}

#[tokio::test]
async fn test_cloud_http_401_refreshes_through_authenticator() {
    let transport = ScriptedTransport::new();
    transport.reply_raw(401, "").reply(200, contacts());

    let config = ConnectionConfig::builder()
        .host("fm.test")
        .database("Sales")
        .credentials("api", "secret")
        .server_version("FMCloud")
        .build();
    let auth = Arc::new(CountingAuthenticator {
        calls: AtomicUsize::new(0),
    });
    let session = SessionManager::new(
        config,
        transport.clone(),
        Arc::new(MemoryTokenStore::new()),
    )
    .with_authenticator(auth.clone());
    let mut conn = Connection::open(session, transport.clone(), Arc::new(StaticMetadata::new()))
        .await
        .unwrap();

    conn.query("SELECT * FROM Contacts", &[]).await.unwrap();
    assert_eq!(auth.calls.load(Ordering::SeqCst), 2);
    assert_eq!(transport.sent()[1].auth, Auth::Bearer("api-cloud-2".into()));
}

#[tokio::test]
async fn test_aliases_and_record_id() {
    let transport = ScriptedTransport::new();
    transport.reply(
        200,
        records(json!([{ "recordId": "7", "modId": "2", "fieldData": { "name": "Ann" } }])),
    );
    let mut conn = connect(&transport, Arc::new(MemoryTokenStore::with_token("t"))).await;

    let mut rows = conn
        .query(
            "SELECT t0.rec_id AS x, t0.name AS y FROM Contacts t0 WHERE t0.name = ?",
            &["Ann".into()],
        )
        .await
        .unwrap();
    let row = rows.fetch().unwrap();
    assert_eq!(row.keys().collect::<Vec<_>>(), vec!["x", "y"]);
    assert_eq!(row["x"], json!("7"));
    assert_eq!(row["y"], json!("Ann"));
}

#[tokio::test]
async fn test_update_finds_record_then_patches() {
    let transport = ScriptedTransport::new();
    transport
        .reply(200, records(json!([{ "recordId": "12", "modId": "3", "fieldData": {} }])))
        .reply(200, json!({ "response": { "modId": "4" }, "messages": [{ "code": "0", "message": "OK" }] }));
    let mut conn = connect(&transport, Arc::new(MemoryTokenStore::with_token("t"))).await;

    let outcome = conn
        .execute(
            "UPDATE Contacts SET name = ?, city = ? WHERE id = ?",
            &["Ann".into(), Param::Null, "C-9".into()],
        )
        .await
        .unwrap();
    assert!(matches!(outcome, Outcome::Completed(ref rs) if rs.row_count() == 1));

    let sent = transport.sent();
    assert_eq!(sent[0].url, format!("{}layouts/Contacts/_find", BASE));
    assert_eq!(sent[0].body, Body::Json(json!({ "query": [{ "id": "C-9" }] })));
    assert_eq!(sent[1].method, Method::Patch);
    assert_eq!(sent[1].url, format!("{}layouts/Contacts/records/12", BASE));
    assert_eq!(
        sent[1].body,
        Body::Json(json!({ "fieldData": { "name": "Ann", "city": "" } }))
    );
}

#[tokio::test]
async fn test_delete_of_missing_record() {
    let transport = ScriptedTransport::new();
    transport.reply(500, error_body("401", "No records match the request"));
    let mut conn = connect(&transport, Arc::new(MemoryTokenStore::with_token("t"))).await;

    let err = conn
        .execute("DELETE FROM Contacts WHERE id = ?", &["gone".into()])
        .await
        .unwrap_err();
    assert!(matches!(err, FmError::RecordNotFound(_)));
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn test_transaction_flushes_in_order_without_atomicity() {
    let transport = ScriptedTransport::new();
    transport
        .reply(200, json!({ "response": { "recordId": "1", "modId": "0" } }))
        .reply(500, error_body("504", "Value in field is not unique as required"));
    let mut conn = connect(&transport, Arc::new(MemoryTokenStore::with_token("t"))).await;

    conn.begin_transaction();
    for name in ["Ann", "Ann", "Cy"] {
        let outcome = conn
            .execute("INSERT INTO Contacts (name) VALUES (?)", &[name.into()])
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Queued(_)));
    }
    assert!(transport.sent().is_empty());

    let err = conn.commit().await.unwrap_err();
    assert_eq!(err.code(), Some(504));
    assert_eq!(transport.sent().len(), 2);
    assert!(!conn.in_transaction());
}

#[tokio::test]
async fn test_select_inside_transaction_runs_immediately() {
    let transport = ScriptedTransport::new();
    transport.reply(200, contacts());
    let mut conn = connect(&transport, Arc::new(MemoryTokenStore::with_token("t"))).await;

    conn.begin_transaction();
    conn.execute("INSERT INTO Contacts (name) VALUES (?)", &["Cy".into()])
        .await
        .unwrap();
    let outcome = conn.execute("SELECT * FROM Contacts", &[]).await.unwrap();
    assert!(matches!(outcome, Outcome::Completed(ref rs) if rs.row_count() == 2));

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, Method::Get);
    assert!(conn.in_transaction());
    assert_eq!(conn.rollback(), 1);
}

#[tokio::test]
async fn test_rollback_discards_queue() {
    let transport = ScriptedTransport::new();
    let mut conn = connect(&transport, Arc::new(MemoryTokenStore::with_token("t"))).await;

    conn.begin_transaction();
    conn.execute("DELETE FROM Contacts WHERE id = ?", &["1".into()])
        .await
        .unwrap();
    assert_eq!(conn.rollback(), 1);
    assert_eq!(conn.commit().await.unwrap(), 0);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_last_insert_id_reads_back_key_field() {
    let transport = ScriptedTransport::new();
    transport
        .reply(200, json!({ "response": { "recordId": "31", "modId": "0" } }))
        .reply(
            200,
            records(json!([{ "recordId": "31", "modId": "0", "fieldData": { "uuid": "ABC-1" } }])),
        );
    let config = ConnectionConfig::builder()
        .host("fm.test")
        .database("Sales")
        .credentials("api", "secret")
        .identifiers("Contacts", &["uuid"])
        .build();
    let mut conn = Connection::connect_with(
        config,
        transport.clone(),
        Arc::new(MemoryTokenStore::with_token("t")),
    )
    .await
    .unwrap();

    conn.begin_transaction();
    conn.execute(
        "INSERT INTO Contacts (uuid, name) VALUES (?, ?)",
        &[Param::Null, "Ann".into()],
    )
    .await
    .unwrap();
    assert_eq!(conn.last_insert_id().await.unwrap(), "ABC-1");

    let sent = transport.sent();
    assert_eq!(sent[0].body, Body::Json(json!({ "fieldData": { "name": "Ann" } })));
    assert_eq!(sent[1].method, Method::Get);
    assert_eq!(sent[1].url, format!("{}layouts/Contacts/records/31", BASE));
    assert_eq!(conn.commit().await.unwrap(), 0);
}

#[tokio::test]
async fn test_last_insert_id_for_rec_id_layout() {
    let transport = ScriptedTransport::new();
    transport.reply(200, json!({ "response": { "recordId": "55", "modId": "0" } }));
    let config = ConnectionConfig::builder()
        .host("fm.test")
        .database("Sales")
        .credentials("api", "secret")
        .identifiers("Notes", &["rec_id"])
        .build();
    let mut conn = Connection::connect_with(
        config,
        transport.clone(),
        Arc::new(MemoryTokenStore::with_token("t")),
    )
    .await
    .unwrap();

    conn.execute("INSERT INTO Notes (body) VALUES (?)", &["hi".into()])
        .await
        .unwrap();
    assert_eq!(conn.last_insert_id().await.unwrap(), "55");
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn test_script_result() {
    let transport = ScriptedTransport::new();
    transport.reply(
        200,
        json!({ "response": { "scriptResult": "done", "scriptError": "0" }, "messages": [{ "code": "0", "message": "OK" }] }),
    );
    let mut conn = connect(&transport, Arc::new(MemoryTokenStore::with_token("t"))).await;

    let out = conn
        .run_script("Contacts", None, "Tidy Up", "all", true)
        .await
        .unwrap();
    match out {
        ScriptOutput::Result(result) => {
            assert_eq!(result.error, "0");
            assert_eq!(result.result, "done");
        }
        other => panic!("unexpected output {:?}", other),
    }
    let sent = transport.sent();
    assert_eq!(sent[0].url, format!("{}layouts/Contacts/script/Tidy Up", BASE));
    assert_eq!(sent[0].query, vec![("script.param".to_string(), "all".to_string())]);
}

#[tokio::test]
async fn test_set_globals() {
    let transport = ScriptedTransport::new();
    transport.reply(200, json!({ "response": {}, "messages": [{ "code": "0", "message": "OK" }] }));
    let mut conn = connect(&transport, Arc::new(MemoryTokenStore::with_token("t"))).await;

    conn.set_globals([("Globals::year", 2024)]).await.unwrap();
    let sent = transport.sent();
    assert_eq!(sent[0].method, Method::Patch);
    assert_eq!(sent[0].url, format!("{}globals", BASE));
    assert_eq!(
        sent[0].body,
        Body::Json(json!({ "globalFields": { "Globals::year": 2024 } }))
    );
}

#[tokio::test]
async fn test_container_upload_is_multipart() {
    let transport = ScriptedTransport::new();
    transport.reply(200, json!({ "response": { "modId": "2" }, "messages": [{ "code": "0", "message": "OK" }] }));
    let mut conn = connect(&transport, Arc::new(MemoryTokenStore::with_token("t"))).await;

    conn.upload_container("Assets", "31", "Photo", None, "cat.png", vec![1, 2, 3])
        .await
        .unwrap();
    let sent = transport.sent();
    assert_eq!(
        sent[0].url,
        format!("{}layouts/Assets/records/31/containers/Photo/1", BASE)
    );
    match &sent[0].body {
        Body::Multipart(part) => {
            assert_eq!(part.field, "upload");
            assert_eq!(part.file_name, "cat.png");
            assert_eq!(part.bytes, vec![1, 2, 3]);
        }
        other => panic!("unexpected body {:?}", other),
    }
    assert!(!sent[0].headers.iter().any(|(name, _)| name == "Content-Type"));
}

#[tokio::test]
async fn test_external_container_is_fetched_from_host_with_account() {
    let transport = ScriptedTransport::new();
    transport.reply_raw(200, "JPEG");
    let config = ConnectionConfig::builder()
        .host("fm.test")
        .database("Sales")
        .port(8443)
        .credentials("api", "secret")
        .build();
    let conn = Connection::connect_with(
        config,
        transport.clone(),
        Arc::new(MemoryTokenStore::with_token("t")),
    )
    .await
    .unwrap();

    let bytes = conn
        .external_container_content("/Assets/cat.jpg?w=1&amp;h=2")
        .await
        .unwrap();
    assert_eq!(bytes, b"JPEG".to_vec());

    let sent = transport.sent();
    assert_eq!(sent[0].method, Method::Get);
    assert_eq!(sent[0].url, "https://fm.test:8443/Assets/cat.jpg?w=1&h=2");
    assert_eq!(
        sent[0].auth,
        Auth::Basic {
            user: "api".to_string(),
            password: "secret".to_string()
        }
    );
    assert!(!sent[0].keep_cookies);
}

#[tokio::test]
async fn test_container_download_failure_carries_http_status() {
    let transport = ScriptedTransport::new();
    transport.reply_raw(404, "<html>Not Found</html>");
    transport.fail(TransportError::Timeout);
    let conn = connect(&transport, Arc::new(MemoryTokenStore::with_token("t"))).await;

    let err = conn.external_container_content("/missing.pdf").await.unwrap_err();
    assert!(matches!(err, FmError::Api { .. }));
    assert_eq!(err.code(), Some(404));

    let err = conn.external_container_content("/slow.pdf").await.unwrap_err();
    assert_eq!(err.code(), Some(-1));
    assert_eq!(transport.sent().len(), 2);
}

#[tokio::test]
async fn test_streamed_container_keeps_cookies_and_sends_no_token() {
    let transport = ScriptedTransport::new();
    transport.reply_raw(200, "%PDF-1.4");
    let conn = connect(&transport, Arc::new(MemoryTokenStore::with_token("t"))).await;

    let url = "https://fm.test/Streaming_SSL/MainDB/6A1F.pdf?RCType=EmbeddedRCFileProcessor";
    let bytes = conn.streamed_container_content(url).await.unwrap();
    assert_eq!(bytes, b"%PDF-1.4".to_vec());

    let sent = transport.sent();
    assert_eq!(sent[0].url, url);
    assert_eq!(sent[0].auth, Auth::None);
    assert!(sent[0].keep_cookies);
}

#[tokio::test]
async fn test_explain_sends_nothing() {
    let transport = ScriptedTransport::new();
    let conn = connect(&transport, Arc::new(MemoryTokenStore::with_token("t"))).await;

    let plan = conn
        .explain("SELECT * FROM Contacts ORDER BY name DESC", &[])
        .unwrap();
    match plan {
        Plan::Request(req) => assert_eq!(
            req.uri(),
            r#"layouts/Contacts/records?_sort=[{"fieldName":"name","sortOrder":"descend"}]&_offset=1&_limit=10000"#
        ),
        other => panic!("unexpected plan {:?}", other),
    }
    assert!(transport.sent().is_empty());
    assert_eq!(conn.server_version(), "FMS Data API v1");
}
