use serde::{Deserialize, Serialize};

/// Sort order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Keyword the Data API expects in a sort rule.
    pub fn remote_name(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ascend",
            SortOrder::Desc => "descend",
        }
    }
}

/// Comparison operators as written in the SQL text.
///
/// `<>` and `!=` are kept apart: only `<>` becomes an omit request, `!=`
/// is handed to the Data API's own text matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    /// Equal (=)
    Eq,
    /// Not equal (<>)
    NotEq,
    /// Bang not equal (!=)
    BangEq,
    /// Greater than (>)
    Gt,
    /// Less than (<)
    Lt,
    /// Greater than or equal (>=)
    Gte,
    /// Less than or equal (<=)
    Lte,
    /// Less than or equal, reversed spelling (=<)
    EqLt,
    /// Greater than or equal, reversed spelling (=>)
    EqGt,
    /// LIKE pattern match
    Like,
    /// IN list
    In,
}

impl CompareOp {
    /// Returns the SQL symbol/keyword for this operator.
    pub fn sql_symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::BangEq => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Gte => ">=",
            CompareOp::Lte => "<=",
            CompareOp::EqLt => "=<",
            CompareOp::EqGt => "=>",
            CompareOp::Like => "LIKE",
            CompareOp::In => "IN",
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.sql_symbol())
    }
}
