//! # fmsql — SQL over the FileMaker Data API
//!
//! Runs the SQL an ORM emits against a database that only speaks the
//! FileMaker Data API: sessions, layout-scoped record and `_find`
//! endpoints, JSON bodies.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use fmsql::prelude::*;
//!
//! let config = ConnectionConfig::builder()
//!     .host("fm.example.com")
//!     .database("Sales")
//!     .credentials("api", "secret")
//!     .build();
//! let mut conn = Connection::connect(config).await?;
//!
//! let mut rows = conn
//!     .query("SELECT t0.name FROM Contacts t0 WHERE t0.city IN (?, ?)", &["Leeds".into(), "York".into()])
//!     .await?;
//! // => POST layouts/Contacts/_find {"query":[{"city":"==Leeds"},{"city":"==York"}]}
//! ```
//!
//! ## Translation
//!
//! | SQL                        | Data API                                   |
//! |----------------------------|--------------------------------------------|
//! | `SELECT` without `WHERE`   | `GET layouts/{l}/records?_offset&_limit`   |
//! | `SELECT ... WHERE`         | `POST layouts/{l}/_find`                   |
//! | `INSERT`                   | `POST layouts/{l}/records`                 |
//! | `UPDATE ... WHERE k = ?`   | find by `k`, then `PATCH .../records/{id}` |
//! | `DELETE ... WHERE k = ?`   | find by `k`, then `DELETE .../records/{id}`|

pub mod ast;
pub mod client;
pub mod config;
pub mod container;
pub mod engine;
pub mod error;
pub mod identity;
pub mod mapper;
pub mod pagination;
pub mod parser;
pub mod script;
pub mod session;
pub mod transpiler;
pub mod transport;
pub mod types;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::config::ConnectionConfig;
    pub use crate::engine::{Connection, Outcome};
    pub use crate::error::*;
    pub use crate::identity::{EntityMetadata, StaticMetadata};
    pub use crate::mapper::{ResultSet, Row};
    pub use crate::parser::parse;
    pub use crate::script::ScriptOutput;
    pub use crate::transpiler::{Plan, TranslatedRequest, translate};
    pub use crate::types::{FmDate, Param};
}

pub use engine::Connection;

/// Parse a SQL statement into a [`ast::Statement`].
///
/// # Example
///
/// ```
/// use fmsql::parse;
///
/// let stmt = parse("SELECT t0.name FROM Contacts t0 WHERE t0.id = ?").unwrap();
/// assert_eq!(stmt.layout(), "Contacts");
/// ```
pub fn parse(sql: &str) -> Result<ast::Statement, error::FmError> {
    parser::parse(sql)
}
