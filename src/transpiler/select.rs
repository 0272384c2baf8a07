//! SELECT → record listing or `_find`.

use serde::Serialize;

use super::find::{FindGroup, SortRule, find_groups, sort_rules};
use super::{Bindings, Method, TranslatedRequest, find_path, records_path};
use crate::ast::{Page, Select};
use crate::error::{FmError, FmResult};

#[derive(Debug, Serialize)]
struct FindBody {
    query: Vec<FindGroup>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sort: Vec<SortRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u64>,
}

/// Build the request for a SELECT.
///
/// Without a WHERE clause the layout is listed with `_offset`/`_limit`
/// (the API returns only 100 records when no limit is given, so an
/// unpaged listing asks for [`Page::UNBOUNDED`]). Otherwise a `_find` is
/// posted and the window is sent only when the statement set one.
pub fn build_find(select: &Select, binds: &mut Bindings<'_>) -> FmResult<TranslatedRequest> {
    let groups = find_groups(select, binds)?;
    let sort = sort_rules(&select.order);

    if select.filter.is_empty() {
        return list_records(select, sort);
    }
    if groups.is_empty() {
        return Err(FmError::Unsupported(format!(
            "WHERE on '{}' only names columns the statement does not select",
            select.layout
        )));
    }

    let body = FindBody {
        query: groups,
        sort,
        offset: select.page.map(|p| p.offset),
        limit: select.page.map(|p| p.limit),
    };
    Ok(TranslatedRequest::new(Method::Post, find_path(&select.layout))
        .with_body(serde_json::to_value(body)?))
}

fn list_records(select: &Select, sort: Vec<SortRule>) -> FmResult<TranslatedRequest> {
    let page = select.page.unwrap_or(Page::UNBOUNDED);
    let mut req = TranslatedRequest::new(Method::Get, records_path(&select.layout));
    if !sort.is_empty() {
        req = req.with_query("_sort", serde_json::to_string(&sort)?);
    }
    Ok(req
        .with_query("_offset", page.offset)
        .with_query("_limit", page.limit))
}
