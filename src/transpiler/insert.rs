//! INSERT → `POST layouts/{layout}/records`.

use indexmap::IndexMap;
use serde_json::{Value as Json, json};

use super::{Bindings, Method, TranslatedRequest, records_path};
use crate::ast::{Insert, is_pseudo_column};
use crate::error::{FmError, FmResult};
use crate::identity::{EntityMetadata, id_column};

/// Build the create-record request.
///
/// Pseudo-columns are never written. The id column is left out when its
/// value is empty so the server can generate one; every other empty value
/// is sent as `""`.
pub fn build_insert(
    insert: &Insert,
    binds: &mut Bindings<'_>,
    metadata: &dyn EntityMetadata,
) -> FmResult<TranslatedRequest> {
    if insert.columns.len() != insert.values.len() {
        return Err(FmError::Unsupported(format!(
            "INSERT with {} columns and {} values",
            insert.columns.len(),
            insert.values.len()
        )));
    }

    let id_col = id_column(&insert.layout, metadata);
    let mut field_data: IndexMap<String, Json> = IndexMap::new();

    for (column, operand) in insert.columns.iter().zip(&insert.values) {
        let value = binds.resolve(operand)?;
        if is_pseudo_column(column) || (*column == id_col && value.is_empty()) {
            continue;
        }
        field_data.insert(column.clone(), value.to_field_value());
    }

    Ok(TranslatedRequest::new(Method::Post, records_path(&insert.layout))
        .with_body(json!({ "fieldData": field_data })))
}
