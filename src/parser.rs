//! SQL parser using nom.
//!
//! Parses the statement subset an ORM emits against the Data API into a
//! [`Statement`]. Placeholders stay placeholders; nothing is substituted
//! into the text before parsing.
//!
//! # Supported Shapes
//!
//! ```text
//! SELECT t0.id AS id_1, t0.name AS name_2 FROM Contacts t0
//!     WHERE t0.name = ? AND (t0.city = ? OR t0.city = ?) ORDER BY t0.name DESC LIMIT 10 OFFSET 20
//! SELECT * FROM (SELECT ... ) dctrn WHERE rownum >= 11 AND rownum <= 20
//! INSERT INTO Contacts (id, name) VALUES (?, ?)
//! UPDATE Contacts SET name = ?, city = ? WHERE id = ?
//! DELETE FROM Contacts WHERE id = ?
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{char, digit1, multispace0, satisfy},
    combinator::{map, map_res, not, opt, recognize, value, verify},
    error::{Error, ErrorKind},
    multi::separated_list1,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::ast::*;
use crate::error::{FmError, FmResult};
use crate::pagination::{self, RowBound};

const RESERVED: &[&str] = &[
    "SELECT", "FROM", "WHERE", "AND", "OR", "NOT", "IN", "LIKE", "AS", "ORDER", "BY", "ASC",
    "DESC", "LIMIT", "OFFSET", "SET", "VALUES", "INTO", "INSERT", "UPDATE", "DELETE", "NULL",
    "DISTINCT",
];

/// Parse a single SQL statement.
pub fn parse(sql: &str) -> FmResult<Statement> {
    let input = sql.trim();
    let head: String = input
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();

    let parsed = match head.as_str() {
        "SELECT" => select_stmt(input).map(|(rest, raw)| (rest, Parsed::Select(raw))),
        "INSERT" => insert_stmt(input).map(|(rest, s)| (rest, Parsed::Done(Statement::Insert(s)))),
        "UPDATE" => update_stmt(input).map(|(rest, s)| (rest, Parsed::Done(Statement::Update(s)))),
        "DELETE" => delete_stmt(input).map(|(rest, s)| (rest, Parsed::Done(Statement::Delete(s)))),
        "" if input.is_empty() => return Err(FmError::parse(0, "Empty statement")),
        "" => return Err(FmError::parse(0, "Expected SELECT, INSERT, UPDATE or DELETE")),
        other => return Err(FmError::Unsupported(format!("{} statements", other))),
    };

    match parsed {
        Ok((rest, parsed)) => {
            let trailing = rest.trim_start();
            let trailing = trailing.strip_prefix(';').unwrap_or(trailing).trim();
            if !trailing.is_empty() {
                return Err(FmError::parse(
                    input.len() - rest.len(),
                    format!("Unexpected trailing content: '{}'", snippet(trailing)),
                ));
            }
            match parsed {
                Parsed::Select(raw) => resolve_select(raw).map(Statement::Select),
                Parsed::Done(stmt) => Ok(stmt),
            }
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(FmError::parse(
            input.len() - e.input.len(),
            format!("Unexpected input near '{}'", snippet(e.input)),
        )),
        Err(nom::Err::Incomplete(_)) => Err(FmError::parse(input.len(), "Incomplete statement")),
    }
}

enum Parsed {
    Select(RawSelect),
    Done(Statement),
}

/// SELECT as written, before wrapper queries are unwrapped.
struct RawSelect {
    columns: Vec<SelectItem>,
    source: Source,
    filter: Vec<WhereTerm>,
    order: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
}

enum Source {
    Layout(String),
    Subquery(Box<RawSelect>),
}

/// Unwrap row-number wrapper queries down to the real SELECT.
fn resolve_select(raw: RawSelect) -> FmResult<Select> {
    let native = if raw.limit.is_some() || raw.offset.is_some() {
        Some(Page::from_limit_offset(raw.limit, raw.offset))
    } else {
        None
    };

    match raw.source {
        Source::Layout(layout) => Ok(Select {
            layout,
            columns: raw.columns,
            filter: raw.filter,
            order: raw.order,
            page: native,
        }),
        Source::Subquery(inner) => {
            let mut select = resolve_select(*inner)?;
            if native.is_some() {
                select.page = native;
            } else if !raw.filter.is_empty() {
                select.page = Some(pagination::from_row_bounds(&row_bounds(&raw.filter)?));
            } else if select.page.is_none() {
                select.page = Some(pagination::from_row_bounds(&[]));
            }
            if select.order.is_empty() {
                select.order = raw.order;
            }
            Ok(select)
        }
    }
}

fn row_bounds(filter: &[WhereTerm]) -> FmResult<Vec<RowBound>> {
    filter
        .iter()
        .map(|term| match term {
            WhereTerm::Compare(Comparison {
                op,
                operand: Operand::Literal(v),
                ..
            }) => v
                .parse::<u64>()
                .map(|n| RowBound::new(*op, n))
                .map_err(|_| FmError::parse(0, format!("Row bound '{}' is not a number", v))),
            _ => Err(FmError::parse(
                0,
                "Wrapper query may only compare the row number with integer literals",
            )),
        })
        .collect()
}

fn snippet(input: &str) -> String {
    input.chars().take(24).collect()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Case-insensitive keyword that is not the prefix of a longer word.
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    move |input: &'a str| {
        let (input, _) = multispace0(input)?;
        terminated(tag_no_case(word), not(satisfy(is_ident_char)))(input)
    }
}

/// A punctuation character with optional leading whitespace.
fn sym<'a>(c: char) -> impl FnMut(&'a str) -> IResult<&'a str, char> {
    move |input: &'a str| preceded(multispace0, char(c))(input)
}

/// Parse an identifier: bare, "double quoted", `backticked` or [bracketed].
fn identifier(input: &str) -> IResult<&str, String> {
    let (input, _) = multispace0(input)?;
    alt((
        map(
            delimited(char('"'), take_while1(|c: char| c != '"'), char('"')),
            |s: &str| s.to_string(),
        ),
        map(
            delimited(char('`'), take_while1(|c: char| c != '`'), char('`')),
            |s: &str| s.to_string(),
        ),
        map(
            delimited(char('['), take_while1(|c: char| c != ']'), char(']')),
            |s: &str| s.to_string(),
        ),
        map(
            verify(
                recognize(pair(
                    satisfy(|c: char| c.is_alphabetic() || c == '_'),
                    take_while(is_ident_char),
                )),
                |s: &str| !RESERVED.iter().any(|kw| kw.eq_ignore_ascii_case(s)),
            ),
            |s: &str| s.to_string(),
        ),
    ))(input)
}

/// Parse a dotted path (t0.name).
fn column_path(input: &str) -> IResult<&str, Vec<String>> {
    separated_list1(char('.'), identifier)(input)
}

fn alias(input: &str) -> IResult<&str, String> {
    alt((preceded(keyword("AS"), identifier), identifier))(input)
}

fn unsigned(input: &str) -> IResult<&str, u64> {
    map_res(preceded(multispace0, digit1), |s: &str| s.parse::<u64>())(input)
}

/// Parse a single-quoted string literal, '' being an escaped quote.
fn string_literal(input: &str) -> IResult<&str, String> {
    let (mut rest, _) = char('\'')(input)?;
    let mut out = String::new();
    loop {
        match rest.find('\'') {
            None => return Err(nom::Err::Error(Error::new(rest, ErrorKind::Char))),
            Some(i) => {
                out.push_str(&rest[..i]);
                rest = &rest[i + 1..];
                match rest.strip_prefix('\'') {
                    Some(after) => {
                        out.push('\'');
                        rest = after;
                    }
                    None => return Ok((rest, out)),
                }
            }
        }
    }
}

fn number_literal(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit1)),
    )))(input)
}

/// Parse a comparison value: `?`, a string, a number, NULL, TRUE or FALSE.
fn operand(input: &str) -> IResult<&str, Operand> {
    let (input, _) = multispace0(input)?;
    alt((
        value(Operand::Placeholder, char('?')),
        map(string_literal, Operand::Literal),
        map(number_literal, |s: &str| Operand::Literal(s.to_string())),
        value(Operand::Literal(String::new()), keyword("NULL")),
        value(Operand::Literal("1".to_string()), keyword("TRUE")),
        value(Operand::Literal("0".to_string()), keyword("FALSE")),
    ))(input)
}

fn operand_list(input: &str) -> IResult<&str, Vec<Operand>> {
    delimited(sym('('), separated_list1(sym(','), operand), sym(')'))(input)
}

fn compare_op(input: &str) -> IResult<&str, CompareOp> {
    let (input, _) = multispace0(input)?;
    alt((
        value(CompareOp::NotEq, tag("<>")),
        value(CompareOp::BangEq, tag("!=")),
        value(CompareOp::Gte, tag(">=")),
        value(CompareOp::Lte, tag("<=")),
        value(CompareOp::EqLt, tag("=<")),
        value(CompareOp::EqGt, tag("=>")),
        value(CompareOp::Eq, tag("=")),
        value(CompareOp::Gt, tag(">")),
        value(CompareOp::Lt, tag("<")),
    ))(input)
}

/// Parse `column op value`, `column IN (...)` or `column LIKE value`.
fn comparison(input: &str) -> IResult<&str, Comparison> {
    let (input, path) = column_path(input)?;
    let (input, (op, operand)) = alt((
        map(preceded(keyword("IN"), operand_list), |items| {
            (CompareOp::In, Operand::List(items))
        }),
        map(preceded(keyword("LIKE"), operand), |o| (CompareOp::Like, o)),
        pair(compare_op, operand),
    ))(input)?;

    Ok((
        input,
        Comparison {
            column: ColumnRef { path, alias: None },
            op,
            operand,
        },
    ))
}

/// Parse a parenthesised group, flattening nested groups.
fn bracket_group(input: &str) -> IResult<&str, Vec<Comparison>> {
    let (input, _) = sym('(')(input)?;
    let (input, parts) = separated_list1(
        alt((keyword("AND"), keyword("OR"))),
        alt((bracket_group, map(comparison, |c| vec![c]))),
    )(input)?;
    let (input, _) = sym(')')(input)?;
    Ok((input, parts.into_iter().flatten().collect()))
}

fn where_term(input: &str) -> IResult<&str, WhereTerm> {
    alt((
        map(bracket_group, WhereTerm::AnyOf),
        map(comparison, WhereTerm::Compare),
    ))(input)
}

/// Parse WHERE terms. Top-level terms are AND-ed; OR must be parenthesised.
fn where_clause(input: &str) -> IResult<&str, Vec<WhereTerm>> {
    separated_list1(keyword("AND"), where_term)(input)
}

fn order_item(input: &str) -> IResult<&str, OrderBy> {
    let (input, path) = column_path(input)?;
    let (input, order) = opt(alt((
        value(SortOrder::Asc, keyword("ASC")),
        value(SortOrder::Desc, keyword("DESC")),
    )))(input)?;

    Ok((
        input,
        OrderBy {
            column: ColumnRef { path, alias: None },
            order: order.unwrap_or_default(),
        },
    ))
}

fn select_item(input: &str) -> IResult<&str, SelectItem> {
    let (input, _) = multispace0(input)?;
    alt((
        value(SelectItem::Wildcard, char('*')),
        value(SelectItem::Wildcard, pair(column_path, tag(".*"))),
        map(pair(column_path, opt(alias)), |(path, alias)| {
            SelectItem::Column(ColumnRef { path, alias })
        }),
    ))(input)
}

fn source(input: &str) -> IResult<&str, Source> {
    alt((
        map(
            terminated(delimited(sym('('), select_stmt, sym(')')), opt(alias)),
            |inner| Source::Subquery(Box::new(inner)),
        ),
        map(terminated(identifier, opt(alias)), Source::Layout),
    ))(input)
}

fn select_stmt(input: &str) -> IResult<&str, RawSelect> {
    let (input, _) = keyword("SELECT")(input)?;
    let (input, _) = opt(keyword("DISTINCT"))(input)?;
    let (input, columns) = separated_list1(sym(','), select_item)(input)?;
    let (input, _) = keyword("FROM")(input)?;
    let (input, source) = source(input)?;
    let (input, filter) = opt(preceded(keyword("WHERE"), where_clause))(input)?;
    let (input, order) = opt(preceded(
        pair(keyword("ORDER"), keyword("BY")),
        separated_list1(sym(','), order_item),
    ))(input)?;
    let (input, limit) = opt(preceded(keyword("LIMIT"), unsigned))(input)?;
    let (input, offset) = opt(preceded(keyword("OFFSET"), unsigned))(input)?;

    Ok((
        input,
        RawSelect {
            columns,
            source,
            filter: filter.unwrap_or_default(),
            order: order.unwrap_or_default(),
            limit,
            offset,
        },
    ))
}

fn insert_stmt(input: &str) -> IResult<&str, Insert> {
    let (input, _) = keyword("INSERT")(input)?;
    let (input, _) = keyword("INTO")(input)?;
    let (input, layout) = identifier(input)?;
    let (input, columns) =
        delimited(sym('('), separated_list1(sym(','), identifier), sym(')'))(input)?;
    let (input, _) = keyword("VALUES")(input)?;
    let (input, values) = operand_list(input)?;

    Ok((
        input,
        Insert {
            layout,
            columns,
            values,
        },
    ))
}

/// Byte offset of the last standalone `word` in `input`.
fn find_last_keyword(input: &str, word: &str) -> Option<usize> {
    input
        .char_indices()
        .map(|(i, _)| i)
        .filter(|&i| {
            let Some(candidate) = input.get(i..i + word.len()) else {
                return false;
            };
            let before_ok = input[..i].chars().next_back().is_none_or(|c| !is_ident_char(c));
            let after_ok = input[i + word.len()..]
                .chars()
                .next()
                .is_none_or(|c| !is_ident_char(c));
            candidate.eq_ignore_ascii_case(word) && before_ok && after_ok
        })
        .last()
}

/// UPDATE's SET list is skipped: values may hold nested calls the grammar
/// does not cover. The transpiler reads the assignments from the raw text.
fn update_stmt(input: &str) -> IResult<&str, Update> {
    let (input, _) = keyword("UPDATE")(input)?;
    let (input, layout) = identifier(input)?;
    let (input, _) = opt(alias)(input)?;
    let (input, _) = keyword("SET")(input)?;
    let Some(at) = find_last_keyword(input, "WHERE") else {
        return Err(nom::Err::Failure(Error::new(input, ErrorKind::Tag)));
    };
    let (input, _) = keyword("WHERE")(&input[at..])?;
    let (input, filter) = where_clause(input)?;

    Ok((input, Update { layout, filter }))
}

fn delete_stmt(input: &str) -> IResult<&str, Delete> {
    let (input, _) = keyword("DELETE")(input)?;
    let (input, _) = keyword("FROM")(input)?;
    let (input, layout) = identifier(input)?;
    let (input, _) = opt(alias)(input)?;
    let (input, filter) = opt(preceded(keyword("WHERE"), where_clause))(input)?;

    Ok((
        input,
        Delete {
            layout,
            filter: filter.unwrap_or_default(),
        },
    ))
}
