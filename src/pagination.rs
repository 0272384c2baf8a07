//! Paging carried by a row-number wrapper query.
//!
//! ORM layers without native LIMIT support wrap the real statement as
//!
//! ```text
//! SELECT * FROM (SELECT a.*, ROWNUM rn FROM (<real query>) a) WHERE rn >= 11 AND rn <= 20
//! ```
//!
//! The outer comparisons carry the window. Row numbers are 1-based and both
//! bounds are inclusive, which matches the Data API's own `offset`.

use crate::ast::{CompareOp, Page};

/// Default window size when only a lower bound is given.
pub const DEFAULT_WINDOW: u64 = 10;

/// One `rownum <op> <n>` comparison from the wrapper's WHERE clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowBound {
    pub op: CompareOp,
    pub value: u64,
}

impl RowBound {
    pub fn new(op: CompareOp, value: u64) -> Self {
        Self { op, value }
    }
}

/// Window described by the wrapper's bounds, in the order they were written.
///
/// - offset is the first bound's value when it is `>=`, else 1
/// - with two bounds, limit is `upper - offset + 1`
/// - with a single `<=` bound, limit is that bound
/// - otherwise limit is [`DEFAULT_WINDOW`]
pub fn from_row_bounds(bounds: &[RowBound]) -> Page {
    let offset = match bounds.first() {
        Some(b) if b.op == CompareOp::Gte => b.value.max(1),
        _ => 1,
    };

    let limit = match bounds {
        [_, upper, ..] => (upper.value + 1).saturating_sub(offset),
        [only] if only.op == CompareOp::Lte => only.value,
        _ => DEFAULT_WINDOW,
    };

    Page { offset, limit }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_and_upper_bound() {
        let page = from_row_bounds(&[
            RowBound::new(CompareOp::Gte, 11),
            RowBound::new(CompareOp::Lte, 20),
        ]);
        assert_eq!(page, Page { offset: 11, limit: 10 });
    }

    #[test]
    fn test_upper_bound_only() {
        let page = from_row_bounds(&[RowBound::new(CompareOp::Lte, 25)]);
        assert_eq!(page, Page { offset: 1, limit: 25 });
    }

    #[test]
    fn test_lower_bound_only_uses_default_window() {
        let page = from_row_bounds(&[RowBound::new(CompareOp::Gte, 41)]);
        assert_eq!(page, Page { offset: 41, limit: DEFAULT_WINDOW });
    }

    #[test]
    fn test_no_bounds() {
        assert_eq!(from_row_bounds(&[]), Page { offset: 1, limit: DEFAULT_WINDOW });
    }

    #[test]
    fn test_inverted_bounds_do_not_underflow() {
        let page = from_row_bounds(&[
            RowBound::new(CompareOp::Gte, 30),
            RowBound::new(CompareOp::Lte, 10),
        ]);
        assert_eq!(page.limit, 0);
    }
}
