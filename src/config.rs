//! Connection configuration

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{FmError, FmResult};
use crate::identity::StaticMetadata;

/// `server_version` value that selects the cloud authenticator.
pub const SERVER_VERSION_CLOUD: &str = "FMCloud";

/// Connection settings for one hosted database
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Host name, optionally with a scheme (`https://` is assumed)
    pub host: String,

    /// Hosted database (file) name
    pub database: String,

    pub user: String,

    pub password: String,

    /// Port, appended to the base URL unless 80 or 443
    pub port: Option<u16>,

    /// `"FMCloud"` for FileMaker Cloud, anything else for on-prem servers
    pub server_version: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Directory of the session token file (OS temp dir when unset)
    pub token_dir: Option<PathBuf>,

    /// Identifier columns per layout
    #[serde(default)]
    pub identifiers: HashMap<String, Vec<String>>,
}

fn default_timeout() -> u64 {
    30
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            database: String::new(),
            user: String::new(),
            password: String::new(),
            port: None,
            server_version: None,
            timeout_secs: default_timeout(),
            token_dir: None,
            identifiers: HashMap::new(),
        }
    }
}

impl ConnectionConfig {
    /// Create a new configuration builder
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }

    /// Default config file location: `<config dir>/fmsql/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("fmsql").join("config.toml"))
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> FmResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FmError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> FmResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| FmError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> FmResult<()> {
        if self.host.trim().is_empty() {
            return Err(FmError::Config("host is required".to_string()));
        }
        if self.database.trim().is_empty() {
            return Err(FmError::Config("database is required".to_string()));
        }
        Ok(())
    }

    pub fn is_cloud(&self) -> bool {
        self.server_version.as_deref() == Some(SERVER_VERSION_CLOUD)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn metadata(&self) -> StaticMetadata {
        StaticMetadata::from(self.identifiers.clone())
    }

    /// Scheme, host and port of the server, without a trailing `/`.
    /// The scheme defaults to https; ports 80 and 443 are left out.
    pub fn server_root(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        let mut url = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        };
        if let Some(port) = self.port.filter(|p| !matches!(p, 80 | 443)) {
            url.push_str(&format!(":{}", port));
        }
        url
    }

    /// Data API base URL, always ending in `/`.
    ///
    /// `db.example.com` with port 8443 and database `Sales` gives
    /// `https://db.example.com:8443/fmi/data/v1/databases/Sales/`.
    pub fn base_url(&self) -> String {
        format!("{}/fmi/data/v1/databases/{}/", self.server_root(), self.database)
    }
}

/// Builder for ConnectionConfig
#[derive(Debug, Default)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.config.database = database.into();
        self
    }

    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.user = user.into();
        self.config.password = password.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    pub fn server_version(mut self, version: impl Into<String>) -> Self {
        self.config.server_version = Some(version.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn token_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.token_dir = Some(dir.into());
        self
    }

    /// Declare the identifier columns of a layout
    pub fn identifiers(mut self, layout: impl Into<String>, columns: &[&str]) -> Self {
        self.config.identifiers.insert(
            layout.into(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}
