//! WHERE / ORDER BY translation into Data API find requests.
//!
//! A find request is a list of groups. Criteria inside a group are AND-ed,
//! the groups themselves are OR-ed, and a group flagged `omit` excludes
//! what it matches.

use indexmap::IndexMap;
use serde::Serialize;

use crate::ast::*;
use crate::error::FmResult;
use crate::transpiler::Bindings;

/// One AND-combined set of field criteria.
pub type FindGroup = IndexMap<String, String>;

/// Sort rule as the Data API spells it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SortRule {
    pub field_name: String,
    pub sort_order: &'static str,
}

/// Sort rules for an ORDER BY list.
pub fn sort_rules(order: &[OrderBy]) -> Vec<SortRule> {
    order
        .iter()
        .map(|o| SortRule {
            field_name: o.column.field().to_string(),
            sort_order: o.order.remote_name(),
        })
        .collect()
}

/// Criterion text for a comparison against `value`.
///
/// `=` becomes an exact match (`==`) unless the value carries its own
/// leading `=`, `<` or `>`, in which case the value is sent untouched.
/// LIKE and `!=` fall back to the Data API's default text matching.
pub fn criterion(op: CompareOp, value: &str) -> String {
    match op {
        CompareOp::Eq => {
            if value.starts_with(['=', '<', '>']) {
                value.to_string()
            } else {
                format!("=={}", value)
            }
        }
        CompareOp::Gt
        | CompareOp::Lt
        | CompareOp::Gte
        | CompareOp::Lte
        | CompareOp::EqLt
        | CompareOp::EqGt => format!("{}{}", op.sql_symbol(), value),
        CompareOp::In => format!("=={}", value),
        CompareOp::NotEq | CompareOp::BangEq | CompareOp::Like => value.to_string(),
    }
}

fn omit_group(field: &str, value: String) -> FindGroup {
    let mut group = FindGroup::new();
    group.insert(field.to_string(), value);
    group.insert("omit".to_string(), "true".to_string());
    group
}

/// Items of an IN operand; a bare operand counts as a one-item list.
fn in_items(operand: &Operand) -> &[Operand] {
    match operand {
        Operand::List(items) => items,
        other => std::slice::from_ref(other),
    }
}

/// Translate the WHERE terms of `select` into find groups.
///
/// Predicates on columns the statement does not select are dropped, but
/// their placeholders are still consumed so later values stay aligned.
pub fn find_groups(select: &Select, binds: &mut Bindings<'_>) -> FmResult<Vec<FindGroup>> {
    let mut groups: Vec<FindGroup> = Vec::new();
    let mut current = FindGroup::new();

    for term in &select.filter {
        match term {
            WhereTerm::Compare(cmp) => {
                let field = cmp.column.field();
                if !select.selects(field) {
                    binds.skip(cmp.operand.placeholder_count())?;
                    continue;
                }

                match cmp.op {
                    CompareOp::NotEq => {
                        let value = binds.resolve(&cmp.operand)?;
                        if !current.is_empty() {
                            groups.push(std::mem::take(&mut current));
                        }
                        groups.push(omit_group(field, value.to_criterion()));
                    }
                    CompareOp::In => {
                        for item in in_items(&cmp.operand) {
                            let value = binds.resolve(item)?;
                            let mut group = current.clone();
                            group.insert(field.to_string(), criterion(CompareOp::In, &value.to_criterion()));
                            groups.push(group);
                        }
                        current.clear();
                    }
                    op => {
                        let value = binds.resolve(&cmp.operand)?;
                        current.insert(field.to_string(), criterion(op, &value.to_criterion()));
                    }
                }
            }
            WhereTerm::AnyOf(alternatives) => {
                let base = current.clone();
                let before = groups.len();
                let mut base_sent = false;

                for cmp in alternatives {
                    let field = cmp.column.field();
                    if !select.selects(field) {
                        binds.skip(cmp.operand.placeholder_count())?;
                        continue;
                    }

                    match cmp.op {
                        CompareOp::NotEq => {
                            let value = binds.resolve(&cmp.operand)?;
                            // An omit group only subtracts, so the context
                            // needs a request of its own to select from.
                            if !base.is_empty() && !base_sent {
                                groups.push(base.clone());
                                base_sent = true;
                            }
                            groups.push(omit_group(field, value.to_criterion()));
                        }
                        op => {
                            for item in in_items(&cmp.operand) {
                                let value = binds.resolve(item)?;
                                let mut group = base.clone();
                                group.insert(field.to_string(), criterion(op, &value.to_criterion()));
                                groups.push(group);
                            }
                        }
                    }
                }

                // The context before the bracket now lives in every alternative.
                if groups.len() > before {
                    current.clear();
                }
            }
        }
    }

    if !current.is_empty() {
        groups.push(current);
    }

    Ok(groups)
}
