//! Data API transpiler for parsed statements.
//!
//! Converts a [`Statement`] plus its bound parameters into the HTTP call
//! that performs it. Translation is pure: UPDATE and DELETE, which first
//! need the record's internal id, come back as a [`Plan::ByRecordId`] that
//! the engine completes after running the lookup.

pub mod delete;
pub mod find;
pub mod insert;
pub mod select;
pub mod update;


use serde::Serialize;
use serde_json::Value as Json;

use crate::ast::*;
use crate::error::{FmError, FmResult};
use crate::identity::EntityMetadata;
use crate::types::Param;

pub use find::{FindGroup, SortRule};

/// HTTP verbs used by the Data API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One Data API call, relative to the database base URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslatedRequest {
    pub method: Method,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Json>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<(String, String)>,
}

impl TranslatedRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            query: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: Json) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Path plus query string, unencoded, for display.
    pub fn uri(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let pairs: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        format!("{}?{}", self.path, pairs.join("&"))
    }
}

/// Call to make once a record's internal id is known.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordTarget {
    pub method: Method,
    pub layout: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Json>,
}

impl RecordTarget {
    pub fn request(&self, record_id: &str) -> TranslatedRequest {
        let req = TranslatedRequest::new(self.method, record_path(&self.layout, record_id));
        match &self.body {
            Some(body) => req.with_body(body.clone()),
            None => req,
        }
    }
}

/// Result of translating one statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Plan {
    /// Send as-is.
    Request(TranslatedRequest),
    /// Run `lookup`, take the first record's id, then send `target`.
    ByRecordId {
        lookup: TranslatedRequest,
        target: RecordTarget,
    },
}

/// Positional cursor over bound parameters.
#[derive(Debug)]
pub struct Bindings<'a> {
    params: &'a [Param],
    next: usize,
}

impl<'a> Bindings<'a> {
    pub fn new(params: &'a [Param]) -> Self {
        Self { params, next: 0 }
    }

    /// Next positional parameter.
    pub fn take(&mut self) -> FmResult<&'a Param> {
        let param = self.params.get(self.next).ok_or(FmError::MissingParam {
            index: self.next + 1,
            bound: self.params.len(),
        })?;
        self.next += 1;
        Ok(param)
    }

    /// Advance past `n` placeholders whose values are not used.
    pub fn skip(&mut self, n: usize) -> FmResult<()> {
        for _ in 0..n {
            self.take()?;
        }
        Ok(())
    }

    /// Value of a scalar operand; placeholders consume one parameter.
    pub fn resolve(&mut self, operand: &Operand) -> FmResult<Param> {
        match operand {
            Operand::Placeholder => self.take().cloned(),
            Operand::Literal(s) => Ok(Param::Text(s.clone())),
            Operand::List(_) => Err(FmError::Unsupported(
                "a value list outside IN".to_string(),
            )),
        }
    }

    /// Number of parameters consumed so far.
    pub fn consumed(&self) -> usize {
        self.next
    }
}

/// Translate a statement into the Data API call(s) that perform it.
///
/// `sql` is the statement text; UPDATE reads its SET list from it.
pub fn translate(
    stmt: &Statement,
    sql: &str,
    params: &[Param],
    metadata: &dyn EntityMetadata,
) -> FmResult<Plan> {
    let mut binds = Bindings::new(params);
    match stmt {
        Statement::Select(s) => select::build_find(s, &mut binds).map(Plan::Request),
        Statement::Insert(s) => insert::build_insert(s, &mut binds, metadata).map(Plan::Request),
        Statement::Update(s) => update::build_update(s, sql, params),
        Statement::Delete(s) => delete::build_delete(s, params),
    }
}

pub(crate) fn records_path(layout: &str) -> String {
    format!("layouts/{}/records", layout)
}

pub(crate) fn record_path(layout: &str, record_id: &str) -> String {
    format!("layouts/{}/records/{}", layout, record_id)
}

pub(crate) fn find_path(layout: &str) -> String {
    format!("layouts/{}/_find", layout)
}

/// Find request locating the record an UPDATE/DELETE targets: the first
/// WHERE field matched against the last bound parameter.
pub fn record_lookup(
    layout: &str,
    filter: &[WhereTerm],
    params: &[Param],
) -> FmResult<TranslatedRequest> {
    let field = key_field(filter).ok_or_else(|| {
        FmError::RecordNotFound(format!("no WHERE key to locate a record in '{}'", layout))
    })?;

    let key = match (first_operand(filter), params.last()) {
        (Some(Operand::Literal(v)), _) => v.clone(),
        (_, Some(param)) => param.to_criterion(),
        (_, None) => {
            return Err(FmError::MissingParam {
                index: 1,
                bound: 0,
            })
        }
    };

    let mut group = FindGroup::new();
    group.insert(field.to_string(), key);
    let body = serde_json::json!({ "query": [group] });
    Ok(TranslatedRequest::new(Method::Post, find_path(layout)).with_body(body))
}

fn first_operand(filter: &[WhereTerm]) -> Option<&Operand> {
    filter.iter().find_map(|term| match term {
        WhereTerm::Compare(cmp) => Some(&cmp.operand),
        WhereTerm::AnyOf(alts) => alts.first().map(|c| &c.operand),
    })
}
