//! CLI command implementations for rowgate.

pub mod check;
pub mod context;
pub mod query;
