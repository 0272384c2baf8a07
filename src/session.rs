//! Session token management.
//!
//! A token is read from the on-disk cache when one is there, otherwise it is
//! exchanged for the configured credentials and written back. The cache
//! file is shared by every process using the same install, so a token
//! acquired by one process is picked up by the next.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::client::remote_message;
use crate::config::ConnectionConfig;
use crate::error::{FmError, FmResult};
use crate::transpiler::Method;
use crate::transport::{Auth, Body, HttpRequest, Transport, TransportError};

/// Where a session token is kept between processes.
pub trait TokenStore: Send + Sync {
    /// Cached token; `None` when absent or empty.
    fn load(&self) -> FmResult<Option<String>>;
    fn save(&self, token: &str) -> FmResult<()>;
    /// Invalidate the cached token.
    fn clear(&self) -> FmResult<()>;
}

/// Token cache in a plain-text file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<dir>/fmp-token-<salt>.txt`, where the salt is derived from
    /// the install location and the target database so different databases
    /// never share a token.
    pub fn for_config(config: &ConnectionConfig) -> Self {
        let dir = config
            .token_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let seed = format!(
            "{}|{}|{}",
            env!("CARGO_MANIFEST_DIR"),
            config.base_url(),
            config.user
        );
        let salt = format!("{:x}", md5::compute(seed.as_bytes()));
        Self::new(dir.join(format!("fmp-token-{}.txt", salt)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> FmResult<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let token = content.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, token: &str) -> FmResult<()> {
        std::fs::write(&self.path, token)?;
        Ok(())
    }

    fn clear(&self) -> FmResult<()> {
        // Truncate rather than remove; other processes treat empty as absent.
        std::fs::write(&self.path, "")?;
        Ok(())
    }
}

/// Process-local token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: std::sync::Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: std::sync::Mutex::new(Some(token.into())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> FmResult<Option<String>> {
        Ok(self.slot().clone().filter(|t| !t.is_empty()))
    }

    fn save(&self, token: &str) -> FmResult<()> {
        *self.slot() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> FmResult<()> {
        *self.slot() = None;
        Ok(())
    }
}

/// Credentials handed to a cloud authenticator.
#[derive(Debug, Clone)]
pub struct CloudCredentials {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

/// Token source for FileMaker Cloud, which does not accept basic auth on
/// the sessions endpoint.
#[async_trait]
pub trait CloudAuthenticator: Send + Sync {
    async fn fetch_token(&self, credentials: &CloudCredentials) -> FmResult<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    /// A token was found in the cache.
    Cached,
    Acquiring,
    Valid,
    Refreshing,
}

/// Owns the session token of one connection.
pub struct SessionManager {
    config: ConnectionConfig,
    transport: Arc<dyn Transport>,
    store: Arc<dyn TokenStore>,
    authenticator: Option<Arc<dyn CloudAuthenticator>>,
    state: SessionState,
    token: Option<String>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("base_url", &self.config.base_url())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(
        config: ConnectionConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            config,
            transport,
            store,
            authenticator: None,
            state: SessionState::Uninitialized,
            token: None,
        }
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn CloudAuthenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Current token, loading or acquiring one first if needed.
    pub async fn token(&mut self) -> FmResult<String> {
        if let (SessionState::Valid, Some(token)) = (self.state, &self.token) {
            return Ok(token.clone());
        }

        match self.store.load() {
            Ok(Some(token)) => {
                self.state = SessionState::Cached;
                debug!("Using cached session token");
                self.token = Some(token.clone());
                self.state = SessionState::Valid;
                return Ok(token);
            }
            Ok(None) => {}
            Err(e) => warn!("Cannot read token cache: {}", e),
        }

        self.acquire().await
    }

    /// Drop the cached token and acquire a new one.
    pub async fn force_refresh(&mut self) -> FmResult<String> {
        info!("Refreshing session token");
        self.state = SessionState::Refreshing;
        self.token = None;
        if let Err(e) = self.store.clear() {
            warn!("Cannot clear token cache: {}", e);
        }
        self.acquire().await
    }

    async fn acquire(&mut self) -> FmResult<String> {
        self.state = SessionState::Acquiring;
        let result = if self.config.is_cloud() {
            self.acquire_cloud().await
        } else {
            self.acquire_basic().await
        };

        let token = match result {
            Ok(token) => token,
            Err(e) => {
                self.state = SessionState::Uninitialized;
                return Err(e);
            }
        };

        if let Err(e) = self.store.save(&token) {
            warn!("Cannot write token cache: {}", e);
        }
        self.token = Some(token.clone());
        self.state = SessionState::Valid;
        info!("Session established with {}", self.config.host);
        Ok(token)
    }

    async fn acquire_cloud(&self) -> FmResult<String> {
        let authenticator = self.authenticator.as_ref().ok_or_else(|| {
            FmError::auth(
                "A cloud authenticator is required when server_version is FMCloud",
                -1,
            )
        })?;
        debug!("Requesting cloud session token");
        authenticator
            .fetch_token(&CloudCredentials {
                host: self.config.host.clone(),
                user: self.config.user.clone(),
                password: self.config.password.clone(),
                database: self.config.database.clone(),
            })
            .await
    }

    async fn acquire_basic(&self) -> FmResult<String> {
        let url = format!("{}sessions", self.config.base_url());
        debug!("POST {}", url);

        let request = HttpRequest::new(Method::Post, url)
            .header("Content-Type", "application/json")
            .auth(Auth::Basic {
                user: self.config.user.clone(),
                password: self.config.password.clone(),
            })
            .body(Body::Json(json!({})));

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(TransportError::Other(_)) => return Err(FmError::auth("Unknown error", -1)),
            Err(e) => return Err(FmError::auth(e.to_string(), 0)),
        };

        if response.is_success() {
            return response
                .json()
                .and_then(|body| {
                    body.pointer("/response/token")
                        .and_then(|t| t.as_str())
                        .map(str::to_string)
                })
                .ok_or_else(|| FmError::auth("Session response carried no token", -1));
        }

        if response.status == 404 {
            return Err(FmError::auth(response.reason, 404));
        }

        match response.json().as_ref().and_then(remote_message) {
            Some((message, code)) => Err(FmError::auth(message, code)),
            None => Err(FmError::auth(response.reason, i64::from(response.status))),
        }
    }
}
