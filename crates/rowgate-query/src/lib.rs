//! Request parsing for rowgate.
//!
//! Raw `GET`-style parameters (`f_<column>__<op>`, `search`, `sort`/`order`,
//! `page`/`perPage`) are parsed once, at the boundary, into a [`QueryIr`].
//! Dialect code never sees raw parameter strings.

pub mod error;
pub mod ir;
pub mod parser;

pub use error::{IssueKind, ValidationError, ValidationIssue};
pub use ir::{FilterClause, FilterOperator, PageWindow, Predicate, QueryIr, SortSpec};
pub use parser::{ParseContext, QueryParser, RawParams};
