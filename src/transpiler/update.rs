//! UPDATE → record lookup, then `PATCH layouts/{layout}/records/{id}`.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde_json::{Value as Json, json};

use super::{Method, Plan, RecordTarget, record_lookup};
use crate::ast::Update;
use crate::error::{FmError, FmResult};
use crate::types::Param;

// SET values may hold expressions the grammar does not model, so the
// assignment list is read from the statement text.
static SET_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\sSET\s(.*)\sWHERE\s").expect("valid SET clause regex")
});

/// Right-hand side of one SET assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetValue {
    /// Holds a `?`; takes the next bound parameter.
    Placeholder,
    /// Written in the statement; binds nothing.
    Literal(String),
}

/// One `field = value` piece of the SET list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub field: String,
    pub value: SetValue,
}

fn set_value(rhs: &str) -> SetValue {
    let rhs = rhs.trim();
    if rhs.contains('?') {
        return SetValue::Placeholder;
    }
    if rhs.eq_ignore_ascii_case("NULL") {
        return SetValue::Literal(String::new());
    }
    match rhs.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        Some(quoted) => SetValue::Literal(quoted.replace("''", "'")),
        None => SetValue::Literal(rhs.to_string()),
    }
}

/// Assignments of the SET list of `sql`, in order.
pub fn assignments(sql: &str) -> Vec<Assignment> {
    let Some(caps) = SET_CLAUSE.captures(sql) else {
        return Vec::new();
    };

    caps[1]
        .split(',')
        .filter_map(|pair| {
            let (lhs, rhs) = pair.split_once('=')?;
            let cleaned: String = lhs
                .chars()
                .filter(|c| !matches!(c, '\'' | '"' | '`' | '[' | ']'))
                .collect();
            let field = cleaned.trim().rsplit('.').next().unwrap_or_default().trim();
            (!field.is_empty()).then(|| Assignment {
                field: field.to_string(),
                value: set_value(rhs),
            })
        })
        .collect()
}

/// Build the UPDATE plan. Each assignment holding a placeholder takes the
/// next bound parameter, literals are written as given; the lookup key is
/// the last parameter.
pub fn build_update(update: &Update, sql: &str, params: &[Param]) -> FmResult<Plan> {
    let fields = assignments(sql);
    if fields.is_empty() {
        return Err(FmError::Unsupported(
            "UPDATE without a SET ... WHERE clause".to_string(),
        ));
    }

    let mut next = 0;
    let mut field_data: IndexMap<String, Json> = IndexMap::new();
    for Assignment { field, value } in fields {
        let value = match value {
            SetValue::Literal(text) => Json::String(text),
            SetValue::Placeholder => {
                let param = params.get(next).ok_or(FmError::MissingParam {
                    index: next + 1,
                    bound: params.len(),
                })?;
                next += 1;
                param.to_field_value()
            }
        };
        field_data.insert(field, value);
    }

    let lookup = record_lookup(&update.layout, &update.filter, params)?;
    Ok(Plan::ByRecordId {
        lookup,
        target: RecordTarget {
            method: Method::Patch,
            layout: update.layout.clone(),
            body: Some(json!({ "fieldData": field_data })),
        },
    })
}
