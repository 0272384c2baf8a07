//! Mapping of Data API records onto SQL result rows.

use std::collections::VecDeque;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value as Json};

use crate::ast::{MOD_ID, REC_ID, REC_META, SelectItem};
use crate::client::DataInfo;
use crate::error::FmResult;

/// One result row, keyed by output column name in SELECT order.
pub type Row = IndexMap<String, Json>;

/// One element of a response's `data` array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(deserialize_with = "id_text")]
    pub record_id: String,
    #[serde(default, deserialize_with = "id_text")]
    pub mod_id: String,
    #[serde(default)]
    pub field_data: Map<String, Json>,
}

/// Ids are strings on the wire, but accept numbers too.
fn id_text<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(match Json::deserialize(de)? {
        Json::String(s) => s,
        Json::Null => String::new(),
        other => other.to_string(),
    })
}

/// Empty strings come back as NULL.
fn field_value(value: Option<&Json>) -> Json {
    match value {
        None => Json::Null,
        Some(Json::String(s)) if s.is_empty() => Json::Null,
        Some(v) => v.clone(),
    }
}

/// `rec_meta` value: the counts of the last call as a JSON string.
pub fn meta_value(info: DataInfo) -> Json {
    Json::String(format!(
        r#"{{"found":{},"fetch":{},"total":{}}}"#,
        info.found_count, info.returned_count, info.total_record_count
    ))
}

/// Build the row for `record`. Columns are resolved by bare field name and
/// keyed by alias; a wildcard takes every field of the record.
pub fn map_record(columns: &[SelectItem], record: &Record, info: DataInfo) -> Row {
    let mut row = Row::new();
    for item in columns {
        match item {
            SelectItem::Wildcard => {
                for (name, value) in &record.field_data {
                    row.insert(name.clone(), field_value(Some(value)));
                }
            }
            SelectItem::Column(column) => {
                let value = match column.field() {
                    REC_ID => Json::String(record.record_id.clone()),
                    MOD_ID => Json::String(record.mod_id.clone()),
                    REC_META => meta_value(info),
                    field => field_value(record.field_data.get(field)),
                };
                row.insert(column.key().to_string(), value);
            }
        }
    }
    row
}

/// Forward-only rows of one executed statement.
///
/// Records are mapped as they are fetched; a fetched row is gone.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Vec<SelectItem>,
    pending: VecDeque<Record>,
    row_count: usize,
    info: DataInfo,
}

impl ResultSet {
    pub fn new(columns: Vec<SelectItem>, records: Vec<Record>, info: DataInfo) -> Self {
        Self {
            columns,
            row_count: records.len(),
            pending: records.into(),
            info,
        }
    }

    /// Decode a response `data` value. Anything but an array gives no rows.
    pub fn from_data(columns: Vec<SelectItem>, data: Json, info: DataInfo) -> FmResult<Self> {
        let records = match data {
            Json::Array(_) => serde_json::from_value(data)?,
            _ => Vec::new(),
        };
        Ok(Self::new(columns, records, info))
    }

    /// Set with no rows, for statements that return none.
    pub fn empty(row_count: usize) -> Self {
        Self {
            row_count,
            ..Self::default()
        }
    }

    /// Rows returned, or records affected, when the statement ran.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Counts reported with the records.
    pub fn data_info(&self) -> DataInfo {
        self.info
    }

    /// Next row, or `None` once every row has been fetched.
    pub fn fetch(&mut self) -> Option<Row> {
        let record = self.pending.pop_front()?;
        Some(map_record(&self.columns, &record, self.info))
    }

    pub fn fetch_all(&mut self) -> Vec<Row> {
        self.by_ref().collect()
    }

    /// Value of column `index` of the next row.
    pub fn fetch_column(&mut self, index: usize) -> Option<Json> {
        self.fetch()
            .and_then(|row| row.get_index(index).map(|(_, v)| v.clone()))
    }
}

impl Iterator for ResultSet {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.fetch()
    }
}
