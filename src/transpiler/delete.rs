//! DELETE → record lookup, then `DELETE layouts/{layout}/records/{id}`.

use super::{Method, Plan, RecordTarget, record_lookup};
use crate::ast::Delete;
use crate::error::FmResult;
use crate::types::Param;

pub fn build_delete(delete: &Delete, params: &[Param]) -> FmResult<Plan> {
    let lookup = record_lookup(&delete.layout, &delete.filter, params)?;
    Ok(Plan::ByRecordId {
        lookup,
        target: RecordTarget {
            method: Method::Delete,
            layout: delete.layout.clone(),
            body: None,
        },
    })
}
