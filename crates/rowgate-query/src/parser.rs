//! Filter, sort and pagination parameter parsing.
//!
//! Recognised parameters:
//!
//! | Parameter | Meaning |
//! |---|---|
//! | `f_<column>__<op>=<value>` | filter clause, repeatable; `f_<column>=<value>` means `eq` |
//! | `search=<term>` | OR of `contain` over the searched columns |
//! | `sort=<column>` / `order=ASC\|DESC` | sort key (`orderBy` is accepted for `sort`) |
//! | `page`, `perPage` | 1-based page window (`per_page` is accepted for `perPage`) |
//!
//! Anything else (`tableName`, `connectionId`, ...) belongs to the caller and is ignored.

use rowgate_core::{QueryConfig, SortOrder, TableSchema, TableSettings};
use std::collections::BTreeSet;

use crate::error::{ValidationError, ValidationIssue};
use crate::ir::{FilterClause, FilterOperator, PageWindow, Predicate, QueryIr, SortSpec};

const FILTER_PREFIX: &str = "f_";
const OPERATOR_SEPARATOR: &str = "__";

/// Raw request parameters in arrival order. Keys may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawParams {
    pairs: Vec<(String, String)>,
}

impl RawParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse an `a=1&b=2` query string, percent-decoding keys and values.
    pub fn from_query_string(query: &str) -> Result<Self, ValidationError> {
        let mut pairs = Vec::new();
        let mut issues = Vec::new();
        for part in query.trim_start_matches('?').split('&') {
            if part.is_empty() {
                continue;
            }
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            match (decode(key), decode(value)) {
                (Ok(k), Ok(v)) => pairs.push((k, v)),
                _ => issues.push(ValidationIssue::invalid_parameter(key, "invalid percent-encoding")),
            }
        }
        if issues.is_empty() {
            Ok(Self { pairs })
        } else {
            Err(ValidationError::new(issues))
        }
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// Last value of the first alias present.
    pub fn get(&self, aliases: &[&str]) -> Option<&str> {
        aliases.iter().find_map(|alias| {
            self.pairs
                .iter()
                .rev()
                .find(|(k, _)| k == alias)
                .map(|(_, v)| v.as_str())
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn decode(raw: &str) -> Result<String, std::string::FromUtf8Error> {
    urlencoding::decode(&raw.replace('+', " ")).map(|s| s.into_owned())
}

/// Everything the parser needs to know about the target table.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub schema: &'a TableSchema,
    pub settings: &'a TableSettings,
    /// Fields the requester may never see, filter or sort on.
    pub excluded: &'a BTreeSet<String>,
    pub defaults: &'a QueryConfig,
}

/// Builds a [`QueryIr`] from raw parameters.
pub struct QueryParser<'a> {
    ctx: ParseContext<'a>,
}

impl<'a> QueryParser<'a> {
    pub fn new(ctx: ParseContext<'a>) -> Self {
        Self { ctx }
    }

    /// Parse and validate a table query request.
    pub fn parse(&self, raw: &RawParams) -> Result<QueryIr, ValidationError> {
        let mut issues = Vec::new();

        let clauses = self.parse_filters(raw, &mut issues);
        let search = raw
            .get(&["search"])
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .and_then(|term| self.expand_search(term));
        let sort = self.parse_sort(raw, &mut issues);
        let page = self.parse_page(raw, &mut issues);

        if !issues.is_empty() {
            tracing::debug!(
                table = %self.ctx.schema.name,
                issues = issues.len(),
                "Rejected table query parameters"
            );
            return Err(ValidationError::new(issues));
        }

        let mut parts: Vec<Predicate> = clauses.into_iter().map(Predicate::Clause).collect();
        if let Some(search) = search {
            parts.push(search);
        }

        Ok(QueryIr {
            table: self.ctx.schema.name.clone(),
            projection: self.projection(),
            filter: Predicate::and(parts),
            sort,
            page: page.unwrap_or_else(|| PageWindow::new(1, self.default_per_page())),
        })
    }

    /// Query selecting a single row by its full primary key.
    pub fn primary_key_lookup(&self, key: &[(String, String)]) -> Result<QueryIr, ValidationError> {
        let schema = self.ctx.schema;
        if !schema.is_identifiable() {
            return Err(ValidationError::single(ValidationIssue::invalid_parameter(
                "primaryKey",
                &format!("table '{}' has no primary key", schema.name),
            )));
        }

        let mut issues = Vec::new();
        let mut parts = Vec::new();
        for pk in &schema.primary_key {
            match key.iter().find(|(col, _)| col == pk) {
                Some((_, value)) => parts.push(Predicate::Clause(FilterClause::new(
                    pk.clone(),
                    FilterOperator::Eq,
                    value.clone(),
                ))),
                None => issues.push(ValidationIssue::invalid_parameter(
                    pk,
                    "primary key value is required",
                )),
            }
        }
        for (col, _) in key {
            if !schema.is_primary_key(col) {
                issues.push(ValidationIssue::invalid_parameter(col, "not a primary key column"));
            }
        }
        if !issues.is_empty() {
            return Err(ValidationError::new(issues));
        }

        Ok(QueryIr {
            table: schema.name.clone(),
            projection: self.projection(),
            filter: Predicate::and(parts),
            sort: Vec::new(),
            page: PageWindow::new(1, 1),
        })
    }

    fn is_visible_column(&self, column: &str) -> bool {
        self.ctx.schema.has_column(column) && !self.ctx.excluded.contains(column)
    }

    fn projection(&self) -> Vec<String> {
        self.ctx
            .schema
            .column_names()
            .filter(|c| !self.ctx.excluded.contains(*c))
            .map(str::to_string)
            .collect()
    }

    fn default_per_page(&self) -> u32 {
        self.ctx
            .settings
            .default_per_page
            .unwrap_or(self.ctx.defaults.default_per_page)
            .clamp(1, self.ctx.defaults.max_per_page.max(1))
    }

    fn parse_filters(&self, raw: &RawParams, issues: &mut Vec<ValidationIssue>) -> Vec<FilterClause> {
        let mut clauses = Vec::new();
        for (key, value) in raw.iter() {
            let Some(rest) = key.strip_prefix(FILTER_PREFIX) else {
                continue;
            };
            let (column, operator) = split_filter_key(rest);

            if !self.is_visible_column(column) {
                if self.ctx.excluded.contains(column) {
                    tracing::debug!(column, "Filter on excluded field rejected");
                }
                issues.push(ValidationIssue::column_not_found(column, &self.ctx.schema.name));
                continue;
            }

            let Some(col) = self.ctx.schema.get_column(column) else {
                continue;
            };
            if !operator.supports(col.category()) {
                issues.push(ValidationIssue::operator_not_supported(
                    column,
                    operator.as_str(),
                    &col.data_type,
                ));
                continue;
            }

            clauses.push(FilterClause::new(column, operator, value));
        }
        clauses
    }

    /// Expand a search term over the searched columns, or every visible
    /// text-like column when none are configured.
    ///
    /// Configured columns the requester cannot see are dropped; they never
    /// widen the search to other columns.
    fn expand_search(&self, term: &str) -> Option<Predicate> {
        let configured = &self.ctx.settings.searched_columns;
        let columns: Vec<&str> = if configured.is_empty() {
            self.ctx
                .schema
                .columns
                .iter()
                .filter(|c| c.category().is_text_like() && !self.ctx.excluded.contains(&c.name))
                .map(|c| c.name.as_str())
                .collect()
        } else {
            configured
                .iter()
                .map(String::as_str)
                .filter(|c| self.is_visible_column(c))
                .collect()
        };

        if columns.is_empty() {
            tracing::debug!(table = %self.ctx.schema.name, "No searchable columns, search ignored");
            return None;
        }

        Predicate::or(
            columns
                .into_iter()
                .map(|c| Predicate::Clause(FilterClause::new(c, FilterOperator::Contain, term)))
                .collect(),
        )
    }

    fn parse_sort(&self, raw: &RawParams, issues: &mut Vec<ValidationIssue>) -> Vec<SortSpec> {
        let order = match raw.get(&["order"]) {
            Some(o) => match SortOrder::parse(o) {
                Some(order) => Some(order),
                None => {
                    issues.push(ValidationIssue::invalid_sort_order(o));
                    None
                }
            },
            None => None,
        };

        let mut sort = Vec::new();
        match raw.get(&["sort", "orderBy"]).filter(|s| !s.is_empty()) {
            Some(column) if self.is_visible_column(column) => {
                sort.push(SortSpec::new(column, order.unwrap_or_default()));
            }
            Some(column) => {
                issues.push(ValidationIssue::column_not_found(column, &self.ctx.schema.name));
            }
            None => sort.extend(self.default_sort(order)),
        }

        // Primary keys break ties so pages never overlap.
        for pk in &self.ctx.schema.primary_key {
            if !sort.iter().any(|s| &s.column == pk) {
                sort.push(SortSpec::new(pk.clone(), SortOrder::Asc));
            }
        }
        sort
    }

    fn default_sort(&self, order: Option<SortOrder>) -> Vec<SortSpec> {
        let settings = self.ctx.settings;
        if let Some(field) = &settings.ordering_field {
            if self.is_visible_column(field) {
                return vec![SortSpec::new(
                    field.clone(),
                    order.or(settings.ordering).unwrap_or_default(),
                )];
            }
            tracing::warn!(
                table = %self.ctx.schema.name,
                ordering_field = %field,
                "Configured ordering field is not a visible column, falling back to primary key"
            );
        }
        self.ctx
            .schema
            .primary_key
            .iter()
            .map(|pk| SortSpec::new(pk.clone(), order.unwrap_or_default()))
            .collect()
    }

    fn parse_page(&self, raw: &RawParams, issues: &mut Vec<ValidationIssue>) -> Option<PageWindow> {
        let page = match raw.get(&["page"]) {
            Some(p) => {
                let parsed = parse_positive(p);
                if parsed.is_none() {
                    issues.push(ValidationIssue::invalid_page(p));
                }
                parsed
            }
            None => Some(1),
        };

        let max = self.ctx.defaults.max_per_page;
        let per_page = match raw.get(&["perPage", "per_page"]) {
            Some(p) => match parse_positive(p) {
                Some(n) if n > max => {
                    issues.push(ValidationIssue::per_page_exceeded(n, max));
                    None
                }
                Some(n) => Some(n),
                None => {
                    issues.push(ValidationIssue::invalid_per_page(p));
                    None
                }
            },
            None => Some(self.default_per_page()),
        };

        Some(PageWindow::new(page?, per_page?))
    }
}

/// Split `<column>__<op>`; an unknown suffix is part of the column name.
fn split_filter_key(rest: &str) -> (&str, FilterOperator) {
    if let Some((column, suffix)) = rest.rsplit_once(OPERATOR_SEPARATOR)
        && let Some(op) = FilterOperator::parse(suffix)
    {
        return (column, op);
    }
    (rest, FilterOperator::Eq)
}

fn parse_positive(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|n| *n >= 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IssueKind;
    use pretty_assertions::assert_eq;
    use rowgate_core::ColumnSchema;

    fn users() -> TableSchema {
        TableSchema::new("users")
            .with_column(ColumnSchema::new("id", "integer").primary_key())
            .with_column(ColumnSchema::new("name", "character varying"))
            .with_column(ColumnSchema::new("email", "text"))
            .with_column(ColumnSchema::new("age", "integer"))
            .with_column(ColumnSchema::new("created_at", "timestamp with time zone"))
            .with_column(ColumnSchema::new("password_hash", "text"))
    }

    fn parse_with(
        settings: &TableSettings,
        raw: &RawParams,
    ) -> Result<QueryIr, ValidationError> {
        let schema = users();
        let excluded: BTreeSet<String> = ["password_hash".to_string()].into_iter().collect();
        let defaults = QueryConfig::default();
        QueryParser::new(ParseContext {
            schema: &schema,
            settings,
            excluded: &excluded,
            defaults: &defaults,
        })
        .parse(raw)
    }

    fn parse(raw: &RawParams) -> Result<QueryIr, ValidationError> {
        parse_with(&TableSettings::default(), raw)
    }

    #[test]
    fn test_defaults() {
        let ir = parse(&RawParams::new()).unwrap();
        assert_eq!(ir.page, PageWindow::new(1, 20));
        assert_eq!(ir.sort, vec![SortSpec::new("id", SortOrder::Asc)]);
        assert_eq!(ir.filter, None);
        assert_eq!(ir.projection, vec!["id", "name", "email", "age", "created_at"]);
    }

    #[test]
    fn test_filter_keys_and_default_operator() {
        let raw = RawParams::new()
            .with("f_age__gte", "18")
            .with("f_age__lt", "65")
            .with("f_name", "Vasia")
            .with("tableName", "users");
        let ir = parse(&raw).unwrap();
        assert_eq!(
            ir.filter,
            Some(Predicate::And(vec![
                Predicate::Clause(FilterClause::new("age", FilterOperator::Gte, "18")),
                Predicate::Clause(FilterClause::new("age", FilterOperator::Lt, "65")),
                Predicate::Clause(FilterClause::new("name", FilterOperator::Eq, "Vasia")),
            ]))
        );
    }

    #[test]
    fn test_search_expands_to_text_columns() {
        let raw = RawParams::new().with("search", "Vasia").with("f_id__lt", "45");
        let ir = parse(&raw).unwrap();
        assert_eq!(
            ir.filter,
            Some(Predicate::And(vec![
                Predicate::Clause(FilterClause::new("id", FilterOperator::Lt, "45")),
                Predicate::Or(vec![
                    Predicate::Clause(FilterClause::new("name", FilterOperator::Contain, "Vasia")),
                    Predicate::Clause(FilterClause::new("email", FilterOperator::Contain, "Vasia")),
                ]),
            ]))
        );
    }

    #[test]
    fn test_search_uses_configured_columns() {
        let settings = TableSettings {
            searched_columns: vec!["email".to_string(), "password_hash".to_string()],
            ..Default::default()
        };
        let ir = parse_with(&settings, &RawParams::new().with("search", "x")).unwrap();
        assert_eq!(
            ir.filter,
            Some(Predicate::Clause(FilterClause::new("email", FilterOperator::Contain, "x")))
        );
    }

    #[test]
    fn test_hidden_searched_columns_do_not_widen_search() {
        let settings = TableSettings {
            searched_columns: vec!["password_hash".to_string()],
            ..Default::default()
        };
        let ir = parse_with(&settings, &RawParams::new().with("search", "x")).unwrap();
        assert_eq!(ir.filter, None);
    }

    #[test]
    fn test_bad_page_and_per_page_are_both_reported() {
        let err = parse(&RawParams::new().with("page", "0").with("perPage", "abc")).unwrap_err();
        let kinds: Vec<IssueKind> = err.issues.iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![IssueKind::InvalidPage, IssueKind::InvalidPerPage]);
        assert_eq!(err.fields(), vec!["page", "perPage"]);
    }

    #[test]
    fn test_bad_fields_are_aggregated() {
        let raw = RawParams::new()
            .with("f_nope", "1")
            .with("f_password_hash__eq", "x")
            .with("f_name__gt", "a")
            .with("sort", "ghost")
            .with("order", "sideways");
        let err = parse(&raw).unwrap_err();
        let kinds: Vec<IssueKind> = err.issues.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                IssueKind::ColumnNotFound,
                IssueKind::ColumnNotFound,
                IssueKind::OperatorNotSupported,
                IssueKind::InvalidSortOrder,
                IssueKind::ColumnNotFound,
            ]
        );
        assert_eq!(err.fields(), vec!["nope", "password_hash", "name", "order", "ghost"]);
        assert!(err.to_string().contains(", "));
    }

    #[test]
    fn test_excluded_and_unknown_read_the_same() {
        let excluded = parse(&RawParams::new().with("f_password_hash", "x")).unwrap_err();
        let unknown = parse(&RawParams::new().with("f_salary", "x")).unwrap_err();
        assert_eq!(
            excluded.to_string().replace("password_hash", "?"),
            unknown.to_string().replace("salary", "?")
        );
    }

    #[test]
    fn test_page_validation() {
        assert!(parse(&RawParams::new().with("page", "0")).is_err());
        assert!(parse(&RawParams::new().with("page", "1.5")).is_err());
        assert!(parse(&RawParams::new().with("perPage", "-2")).is_err());
        let err = parse(&RawParams::new().with("perPage", "5000")).unwrap_err();
        assert_eq!(err.issues[0].kind, IssueKind::PerPageExceeded);

        let ir = parse(&RawParams::new().with("page", "3").with("perPage", "2")).unwrap();
        assert_eq!(ir.page.offset(), 4);
    }

    #[test]
    fn test_sort_request_and_table_default() {
        let ir = parse(&RawParams::new().with("sort", "age").with("order", "desc")).unwrap();
        assert_eq!(
            ir.sort,
            vec![SortSpec::new("age", SortOrder::Desc), SortSpec::new("id", SortOrder::Asc)]
        );

        let settings = TableSettings {
            ordering_field: Some("created_at".to_string()),
            ordering: Some(SortOrder::Desc),
            default_per_page: Some(50),
            ..Default::default()
        };
        let ir = parse_with(&settings, &RawParams::new()).unwrap();
        assert_eq!(ir.sort[0], SortSpec::new("created_at", SortOrder::Desc));
        assert_eq!(ir.page.per_page, 50);
    }

    #[test]
    fn test_unknown_suffix_is_part_of_column_name() {
        assert_eq!(split_filter_key("first__name"), ("first__name", FilterOperator::Eq));
        assert_eq!(split_filter_key("age__empty"), ("age", FilterOperator::Empty));
    }

    #[test]
    fn test_query_string_decoding() {
        let raw = RawParams::from_query_string("?search=Vasia+P&f_email__contain=a%40b.c&page=2").unwrap();
        assert_eq!(raw.get(&["search"]), Some("Vasia P"));
        assert_eq!(raw.get(&["f_email__contain"]), Some("a@b.c"));
        assert_eq!(raw.get(&["page"]), Some("2"));
    }

    #[test]
    fn test_primary_key_lookup() {
        let schema = users();
        let excluded = BTreeSet::new();
        let defaults = QueryConfig::default();
        let settings = TableSettings::default();
        let parser = QueryParser::new(ParseContext {
            schema: &schema,
            settings: &settings,
            excluded: &excluded,
            defaults: &defaults,
        });

        let ir = parser
            .primary_key_lookup(&[("id".to_string(), "7".to_string())])
            .unwrap();
        assert_eq!(ir.page, PageWindow::new(1, 1));
        assert_eq!(
            ir.filter,
            Some(Predicate::Clause(FilterClause::new("id", FilterOperator::Eq, "7")))
        );
        assert!(parser.primary_key_lookup(&[]).is_err());
        assert!(parser
            .primary_key_lookup(&[("name".to_string(), "x".to_string())])
            .is_err());
    }
}
