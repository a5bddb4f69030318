//! SQL builder for pushing claim filters down to the claims store.
//!
//! Conditions are built as a small declarative tree ([`SearchCondition`])
//! that can either be rendered to parameterised PostgreSQL or executed by
//! the in-memory [`MemoryStore`](crate::store::MemoryStore). Both consumers
//! read the same tree, so a predicate means the same thing wherever it runs.

use std::fmt;
use thiserror::Error;

use claimscope_core::{ClaimSource, Timestamp};

use crate::range::{RangeError, RangeQuery};

/// Errors that can occur during SQL building.
#[derive(Debug, Error)]
pub enum SqlBuilderError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid search value: {0}")]
    InvalidSearchValue(String),

    #[error(transparent)]
    Range(#[from] RangeError),
}

// ============================================================================
// Field references
// ============================================================================

/// A validated column reference.
///
/// Only alphanumeric characters and underscores are accepted, which keeps
/// column names safe to splice into SQL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    column: String,
}

impl FieldRef {
    pub fn new(column: impl Into<String>) -> Result<Self, SqlBuilderError> {
        let column = column.into();
        validate_identifier(&column)?;
        Ok(Self { column })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Render the column, optionally qualified by a table alias.
    pub fn to_accessor(&self, alias: Option<&str>) -> String {
        match alias {
            Some(a) => format!("{a}.\"{}\"", self.column),
            None => format!("\"{}\"", self.column),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.column)
    }
}

/// Validate an identifier (table name, column name, schema).
fn validate_identifier(name: &str) -> Result<(), SqlBuilderError> {
    if name.is_empty() {
        return Err(SqlBuilderError::InvalidIdentifier(
            "Empty identifier".to_string(),
        ));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SqlBuilderError::InvalidIdentifier(name.to_string()));
    }

    Ok(())
}

/// Escape a PostgreSQL identifier (table name, column name).
pub fn escape_identifier(name: &str) -> Result<String, SqlBuilderError> {
    validate_identifier(name)?;
    Ok(format!("\"{name}\""))
}

// ============================================================================
// Search Condition Types
// ============================================================================

/// Comparison operators for search conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Equal (=)
    Eq,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Ge,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Le,
}

impl Operator {
    /// Get the SQL operator string.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }

    /// Whether `left op right` holds, given `left.cmp(right)`.
    pub fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        match self {
            Self::Eq => ordering == Equal,
            Self::Gt => ordering == Greater,
            Self::Ge => ordering != Less,
            Self::Lt => ordering == Less,
            Self::Le => ordering != Greater,
        }
    }
}

/// SQL value types for parameterized queries.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Timestamp(Timestamp),
    Null,
}

impl SqlValue {
    /// Get the value as a string for display/debugging.
    pub fn as_display_str(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Timestamp(t) => t.to_string(),
            Self::Null => "NULL".to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<Option<Timestamp>> for SqlValue {
    fn from(value: Option<Timestamp>) -> Self {
        value.map_or(Self::Null, Self::Timestamp)
    }
}

/// A search condition that can be combined with other conditions.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchCondition {
    /// Simple comparison: field op value
    Compare {
        field: FieldRef,
        op: Operator,
        value: SqlValue,
    },

    /// IS NULL check
    IsNull(FieldRef),

    /// Combine conditions with OR
    Or(Vec<SearchCondition>),

    /// Combine conditions with AND
    And(Vec<SearchCondition>),

    /// Always true (used for empty AND lists)
    True,

    /// Always false (used for empty OR lists)
    False,
}

impl SearchCondition {
    /// Create a simple comparison condition.
    pub fn compare(field: FieldRef, op: Operator, value: SqlValue) -> Self {
        Self::Compare { field, op, value }
    }

    /// Create an OR condition. `False` members are dropped.
    pub fn or(mut conditions: Vec<SearchCondition>) -> Self {
        conditions.retain(|c| *c != Self::False);
        if conditions.contains(&Self::True) {
            return Self::True;
        }
        match conditions.len() {
            0 => Self::False,
            1 => conditions.remove(0),
            _ => Self::Or(conditions),
        }
    }

    /// Create an AND condition. `True` members are dropped.
    pub fn and(mut conditions: Vec<SearchCondition>) -> Self {
        conditions.retain(|c| *c != Self::True);
        if conditions.contains(&Self::False) {
            return Self::False;
        }
        match conditions.len() {
            0 => Self::True,
            1 => conditions.remove(0),
            _ => Self::And(conditions),
        }
    }

    /// Render this condition as SQL, appending bind values to `params`.
    pub fn to_sql(&self, alias: Option<&str>, params: &mut Vec<SqlValue>) -> String {
        match self {
            Self::Compare { field, op, value } => {
                let accessor = field.to_accessor(alias);
                params.push(value.clone());
                format!("({accessor} {} ${})", op.as_sql(), params.len())
            }

            Self::IsNull(field) => format!("({} IS NULL)", field.to_accessor(alias)),

            Self::Or(conditions) => {
                if conditions.is_empty() {
                    return "FALSE".to_string();
                }
                let parts: Vec<String> = conditions
                    .iter()
                    .map(|c| c.to_sql(alias, params))
                    .collect();
                format!("({})", parts.join(" OR "))
            }

            Self::And(conditions) => {
                if conditions.is_empty() {
                    return "TRUE".to_string();
                }
                let parts: Vec<String> = conditions
                    .iter()
                    .map(|c| c.to_sql(alias, params))
                    .collect();
                format!("({})", parts.join(" AND "))
            }

            Self::True => "TRUE".to_string(),
            Self::False => "FALSE".to_string(),
        }
    }
}

// ============================================================================
// Claim Query Builder
// ============================================================================

/// Fluent builder for the paged per-category claim query.
///
/// # Example
///
/// ```ignore
/// let registry = CategoryRegistry::with_default_tables();
/// let query = ClaimQueryBuilder::new(registry.get(ClaimCategory::Carrier)?.as_ref(), "ccw")
///     .beneficiary("567834")
///     .last_updated(RangeQuery::from_params(&["ge2020-01-01"])?)
///     .after_cursor(paging.cursor())
///     .limit(paging.page_size())
///     .build()?;
/// ```
#[derive(Debug)]
pub struct ClaimQueryBuilder<'a> {
    source: &'a dyn ClaimSource,
    schema: String,
    beneficiary_id: Option<String>,
    last_updated: Option<RangeQuery>,
    cursor: Option<String>,
    limit: Option<usize>,
}

const TABLE_ALIAS: &str = "c";

impl<'a> ClaimQueryBuilder<'a> {
    pub fn new(source: &'a dyn ClaimSource, schema: impl Into<String>) -> Self {
        Self {
            source,
            schema: schema.into(),
            beneficiary_id: None,
            last_updated: None,
            cursor: None,
            limit: None,
        }
    }

    pub fn beneficiary(mut self, beneficiary_id: impl Into<String>) -> Self {
        self.beneficiary_id = Some(beneficiary_id.into());
        self
    }

    pub fn last_updated(mut self, range: RangeQuery) -> Self {
        self.last_updated = Some(range);
        self
    }

    /// Resume after the given claim id (keyset continuation).
    pub fn after_cursor(mut self, cursor: Option<&str>) -> Self {
        self.cursor = cursor.map(str::to_string);
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn source(&self) -> &'a dyn ClaimSource {
        self.source
    }

    pub fn page_limit(&self) -> Option<usize> {
        self.limit
    }

    /// The WHERE tree this query filters by.
    pub fn condition(&self) -> Result<SearchCondition, SqlBuilderError> {
        let mut conditions = Vec::new();

        if let Some(bene) = &self.beneficiary_id {
            if bene.trim().is_empty() {
                return Err(SqlBuilderError::InvalidSearchValue(
                    "beneficiary id cannot be empty".to_string(),
                ));
            }
            conditions.push(SearchCondition::compare(
                FieldRef::new(self.source.beneficiary_column())?,
                Operator::Eq,
                SqlValue::Text(bene.clone()),
            ));
        }

        if let Some(range) = &self.last_updated {
            let field = FieldRef::new(self.source.last_updated_column())?;
            conditions.push(range.to_condition(&field)?);
        }

        if let Some(cursor) = &self.cursor {
            conditions.push(SearchCondition::compare(
                FieldRef::new(self.source.id_column())?,
                Operator::Gt,
                SqlValue::Text(cursor.clone()),
            ));
        }

        Ok(SearchCondition::and(conditions))
    }

    /// Build the SQL query and parameters.
    pub fn build(&self) -> Result<BuiltQuery, SqlBuilderError> {
        let schema = escape_identifier(&self.schema)?;
        let table = escape_identifier(self.source.table())?;
        let id = FieldRef::new(self.source.id_column())?;

        let mut params = Vec::new();
        let mut sql = format!("SELECT {TABLE_ALIAS}.* FROM {schema}.{table} AS {TABLE_ALIAS}");

        let condition = self.condition()?;
        if condition != SearchCondition::True {
            sql.push_str(" WHERE ");
            sql.push_str(&condition.to_sql(Some(TABLE_ALIAS), &mut params));
        }

        sql.push_str(&format!(" ORDER BY {} ASC", id.to_accessor(Some(TABLE_ALIAS))));

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        tracing::trace!(category = %self.source.category(), sql = %sql, "Built claim query");
        Ok(BuiltQuery { sql, params })
    }
}

/// A built SQL query with parameters.
#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl fmt::Display for BuiltQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}
