//! Typed statement tree handed from the parser to the transpiler.
//!
//! Each variant carries exactly the clauses the Data API can use. Paging
//! lives on [`Select::page`] instead of being smuggled through WHERE terms.

pub mod operators;

use serde::{Deserialize, Serialize};

pub use self::operators::{CompareOp, SortOrder};

/// Pseudo-column mapped to the record's internal id.
pub const REC_ID: &str = "rec_id";
/// Pseudo-column mapped to the record's modification id.
pub const MOD_ID: &str = "mod_id";
/// Pseudo-column mapped to the found/returned/total counts.
pub const REC_META: &str = "rec_meta";

/// True when `field` is one of the three pseudo-columns.
pub fn is_pseudo_column(field: &str) -> bool {
    matches!(field, REC_ID | MOD_ID | REC_META)
}

/// One parsed SQL statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

impl Statement {
    /// Target layout of the statement.
    pub fn layout(&self) -> &str {
        match self {
            Statement::Select(s) => &s.layout,
            Statement::Insert(s) => &s.layout,
            Statement::Update(s) => &s.layout,
            Statement::Delete(s) => &s.layout,
        }
    }

    /// SQL keyword of the statement.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Select(_) => "SELECT",
            Statement::Insert(_) => "INSERT",
            Statement::Update(_) => "UPDATE",
            Statement::Delete(_) => "DELETE",
        }
    }
}

/// A dotted column reference with an optional alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub path: Vec<String>,
    pub alias: Option<String>,
}

impl ColumnRef {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.split('.').map(str::to_string).collect(),
            alias: None,
        }
    }

    pub fn aliased(path: &str, alias: &str) -> Self {
        Self {
            alias: Some(alias.to_string()),
            ..Self::new(path)
        }
    }

    /// Bare field name (last path segment).
    pub fn field(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    /// Output key of the column in a row: the alias, else the field name.
    pub fn key(&self) -> &str {
        self.alias.as_deref().unwrap_or_else(|| self.field())
    }
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.join("."))?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", alias)?;
        }
        Ok(())
    }
}

/// An item of the SELECT list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectItem {
    /// `*` or `t.*`
    Wildcard,
    Column(ColumnRef),
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// `?`, bound positionally.
    Placeholder,
    /// Literal written in the SQL text (quotes removed).
    Literal(String),
    /// Parenthesised list, for IN.
    List(Vec<Operand>),
}

impl Operand {
    /// Number of placeholders this operand consumes.
    pub fn placeholder_count(&self) -> usize {
        match self {
            Operand::Placeholder => 1,
            Operand::Literal(_) => 0,
            Operand::List(items) => items.iter().map(Operand::placeholder_count).sum(),
        }
    }
}

/// `column op operand`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub column: ColumnRef,
    pub op: CompareOp,
    pub operand: Operand,
}

impl Comparison {
    pub fn new(column: &str, op: CompareOp, operand: Operand) -> Self {
        Self {
            column: ColumnRef::new(column),
            op,
            operand,
        }
    }

    /// `column = ?`
    pub fn eq(column: &str) -> Self {
        Self::new(column, CompareOp::Eq, Operand::Placeholder)
    }

    /// `column IN (?, ?, ...)` with `n` placeholders.
    pub fn is_in(column: &str, n: usize) -> Self {
        Self::new(
            column,
            CompareOp::In,
            Operand::List(vec![Operand::Placeholder; n]),
        )
    }
}

/// One top-level WHERE term; top-level terms are AND-ed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WhereTerm {
    Compare(Comparison),
    /// Parenthesised sub-expression: each comparison is an alternative.
    AnyOf(Vec<Comparison>),
}

/// ORDER BY entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: ColumnRef,
    pub order: SortOrder,
}

/// Record window in the Data API's terms: `offset` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: u64,
    pub limit: u64,
}

impl Page {
    /// Listing window used when the statement asks for no paging.
    pub const UNBOUNDED: Page = Page {
        offset: 1,
        limit: 10_000,
    };

    /// Window for SQL `LIMIT n OFFSET m`, where `m` counts skipped rows.
    pub fn from_limit_offset(limit: Option<u64>, offset: Option<u64>) -> Self {
        Page {
            offset: offset.unwrap_or(0) + 1,
            limit: limit.unwrap_or(Self::UNBOUNDED.limit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub layout: String,
    pub columns: Vec<SelectItem>,
    pub filter: Vec<WhereTerm>,
    pub order: Vec<OrderBy>,
    pub page: Option<Page>,
}

impl Select {
    pub fn new(layout: &str) -> Self {
        Self {
            layout: layout.to_string(),
            columns: Vec::new(),
            filter: Vec::new(),
            order: Vec::new(),
            page: None,
        }
    }

    pub fn column(mut self, column: ColumnRef) -> Self {
        self.columns.push(SelectItem::Column(column));
        self
    }

    pub fn wildcard(mut self) -> Self {
        self.columns.push(SelectItem::Wildcard);
        self
    }

    pub fn filter(mut self, cmp: Comparison) -> Self {
        self.filter.push(WhereTerm::Compare(cmp));
        self
    }

    pub fn any_of(mut self, alternatives: Vec<Comparison>) -> Self {
        self.filter.push(WhereTerm::AnyOf(alternatives));
        self
    }

    pub fn order_by(mut self, column: &str, order: SortOrder) -> Self {
        self.order.push(OrderBy {
            column: ColumnRef::new(column),
            order,
        });
        self
    }

    pub fn page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    /// Column references of the SELECT list, skipping wildcards.
    pub fn column_refs(&self) -> impl Iterator<Item = &ColumnRef> {
        self.columns.iter().filter_map(|item| match item {
            SelectItem::Column(c) => Some(c),
            SelectItem::Wildcard => None,
        })
    }

    /// True if a predicate on `field` may be sent to the Data API.
    pub fn selects(&self, field: &str) -> bool {
        self.columns.iter().any(|item| match item {
            SelectItem::Wildcard => true,
            SelectItem::Column(c) => c.field() == field,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insert {
    pub layout: String,
    pub columns: Vec<String>,
    pub values: Vec<Operand>,
}

/// UPDATE keeps only the parts the parser can read reliably; the SET
/// assignments are re-read from the raw SQL by the transpiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub layout: String,
    pub filter: Vec<WhereTerm>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delete {
    pub layout: String,
    pub filter: Vec<WhereTerm>,
}

/// Field name of the first WHERE comparison, used as the record lookup key.
pub fn key_field(filter: &[WhereTerm]) -> Option<&str> {
    filter.iter().find_map(|term| match term {
        WhereTerm::Compare(cmp) => Some(cmp.column.field()),
        WhereTerm::AnyOf(alts) => alts.first().map(|c| c.column.field()),
    })
}
