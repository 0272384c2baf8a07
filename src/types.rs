//! Bound parameter values and remote value formats.

use chrono::{Datelike, NaiveDate};
use serde_json::Value as Json;

use crate::error::{FmError, FmResult};

/// Date format the Data API reads and writes.
pub const FM_DATE_FORMAT: &str = "%m/%d/%Y";

/// Dynamic value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl Param {
    pub fn is_null(&self) -> bool {
        matches!(self, Param::Null)
    }

    /// True for values that count as "not supplied" when deciding whether
    /// to let the server generate an id.
    pub fn is_empty(&self) -> bool {
        match self {
            Param::Null => true,
            Param::Bool(b) => !b,
            Param::Int(n) => *n == 0,
            Param::Float(n) => *n == 0.0,
            Param::Text(s) => s.is_empty() || s == "0",
            Param::Date(_) => false,
        }
    }

    /// Text form used inside find criteria. `false` is sent as `0`.
    pub fn to_criterion(&self) -> String {
        match self {
            Param::Null => String::new(),
            Param::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Param::Int(n) => n.to_string(),
            Param::Float(n) => n.to_string(),
            Param::Text(s) => s.clone(),
            Param::Date(d) => FmDate(*d).to_string(),
        }
    }

    /// JSON form used in `fieldData` bodies. Null becomes an empty string,
    /// which the Data API treats as clearing the field.
    pub fn to_field_value(&self) -> Json {
        match self {
            Param::Null => Json::String(String::new()),
            Param::Bool(b) => Json::from(i64::from(*b)),
            Param::Int(n) => Json::from(*n),
            Param::Float(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or_else(|| Json::String(n.to_string())),
            Param::Text(s) => Json::String(s.clone()),
            Param::Date(d) => Json::String(FmDate(*d).to_string()),
        }
    }
}

impl std::fmt::Display for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Param::Null => write!(f, "NULL"),
            other => write!(f, "{}", other.to_criterion()),
        }
    }
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Param::Bool(v)
    }
}

impl From<i32> for Param {
    fn from(v: i32) -> Self {
        Param::Int(v as i64)
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Float(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Text(v.to_string())
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Text(v)
    }
}

impl From<NaiveDate> for Param {
    fn from(v: NaiveDate) -> Self {
        Param::Date(v)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Param::Null)
    }
}

/// A calendar date in the Data API's `MM/DD/YYYY` representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FmDate(pub NaiveDate);

impl FmDate {
    /// Parse a remote date. Empty input means "no date".
    pub fn parse(value: &str) -> FmResult<Option<Self>> {
        if value.is_empty() {
            return Ok(None);
        }
        let date = NaiveDate::parse_from_str(value, FM_DATE_FORMAT)
            .map_err(|_| FmError::Config(format!("Cannot convert '{}' to a date", value)))?;
        // Reject loose forms such as "1/2/2024" so the value round-trips exactly.
        if FmDate(date).to_string() != value {
            return Err(FmError::Config(format!(
                "Cannot convert '{}' to a date",
                value
            )));
        }
        Ok(Some(FmDate(date)))
    }

    /// Date for a unix timestamp in seconds. Non-positive timestamps are rejected.
    pub fn from_timestamp(secs: i64) -> FmResult<Self> {
        if secs <= 0 {
            return Err(FmError::Config(format!(
                "Cannot convert timestamp {} to a date",
                secs
            )));
        }
        chrono::DateTime::from_timestamp(secs, 0)
            .map(|dt| FmDate(dt.date_naive()))
            .ok_or_else(|| FmError::Config(format!("Timestamp {} out of range", secs)))
    }
}

impl std::fmt::Display for FmDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}/{:02}/{:04}",
            self.0.month(),
            self.0.day(),
            self.0.year()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_from() {
        assert_eq!(Param::from(7i32), Param::Int(7));
        assert_eq!(Param::from("abc"), Param::Text("abc".into()));
        assert_eq!(Param::from(None::<i64>), Param::Null);
    }

    #[test]
    fn test_false_criterion_is_zero() {
        assert_eq!(Param::Bool(false).to_criterion(), "0");
        assert_eq!(Param::Null.to_field_value(), Json::String(String::new()));
    }

    #[test]
    fn test_date_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(FmDate(date).to_string(), "03/09/2024");
        assert_eq!(FmDate::parse("03/09/2024").unwrap(), Some(FmDate(date)));
        assert_eq!(FmDate::parse("").unwrap(), None);
        assert!(FmDate::parse("2024-03-09").is_err());
        assert!(FmDate::parse("3/9/2024").is_err());
    }

    #[test]
    fn test_date_from_timestamp() {
        let date = FmDate::from_timestamp(86_400).unwrap();
        assert_eq!(date.to_string(), "01/02/1970");
        assert!(FmDate::from_timestamp(0).is_err());
    }
}
