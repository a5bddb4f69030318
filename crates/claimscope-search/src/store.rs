//! In-memory executor for [`SearchCondition`] trees.
//!
//! Evaluates conditions the way PostgreSQL does: comparisons involving NULL
//! are unknown, `AND`/`OR` follow three-valued logic, and a row is selected
//! only when its condition is true. Used as the reference store when
//! checking that declarative predicates agree with in-memory evaluation.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use thiserror::Error;

use crate::sql_builder::{ClaimQueryBuilder, FieldRef, SearchCondition, SqlBuilderError, SqlValue};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cannot compare {left} with {right} in column '{column}'")]
    TypeMismatch {
        column: String,
        left: &'static str,
        right: &'static str,
    },

    #[error(transparent)]
    Query(#[from] SqlBuilderError),
}

/// SQL three-valued truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    pub fn and(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::False, _) | (_, Truth::False) => Truth::False,
            (Truth::True, Truth::True) => Truth::True,
            _ => Truth::Unknown,
        }
    }

    pub fn or(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::True, _) | (_, Truth::True) => Truth::True,
            (Truth::False, Truth::False) => Truth::False,
            _ => Truth::Unknown,
        }
    }

    pub fn is_true(self) -> bool {
        self == Truth::True
    }
}

impl From<bool> for Truth {
    fn from(value: bool) -> Self {
        if value { Truth::True } else { Truth::False }
    }
}

static NULL: SqlValue = SqlValue::Null;

/// A row of named column values. Missing columns read as NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: BTreeMap<String, SqlValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: SqlValue) -> Self {
        self.values.insert(column.into(), value);
        self
    }

    pub fn get(&self, column: &str) -> &SqlValue {
        self.values.get(column).unwrap_or(&NULL)
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        match self.get(column) {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

fn type_name(value: &SqlValue) -> &'static str {
    match value {
        SqlValue::Text(_) => "text",
        SqlValue::Integer(_) => "integer",
        SqlValue::Timestamp(_) => "timestamp",
        SqlValue::Null => "null",
    }
}

/// Compare two values; `None` when either side is NULL.
fn compare_values(
    column: &str,
    left: &SqlValue,
    right: &SqlValue,
) -> Result<Option<Ordering>, StoreError> {
    match (left, right) {
        (SqlValue::Null, _) | (_, SqlValue::Null) => Ok(None),
        (SqlValue::Text(a), SqlValue::Text(b)) => Ok(Some(a.cmp(b))),
        (SqlValue::Integer(a), SqlValue::Integer(b)) => Ok(Some(a.cmp(b))),
        (SqlValue::Timestamp(a), SqlValue::Timestamp(b)) => Ok(Some(a.cmp(b))),
        (l, r) => Err(StoreError::TypeMismatch {
            column: column.to_string(),
            left: type_name(l),
            right: type_name(r),
        }),
    }
}

/// Evaluate a condition against one row.
pub fn evaluate(condition: &SearchCondition, row: &Row) -> Result<Truth, StoreError> {
    match condition {
        SearchCondition::Compare { field, op, value } => {
            let ordering = compare_values(field.column(), row.get(field.column()), value)?;
            Ok(ordering.map_or(Truth::Unknown, |o| op.holds(o).into()))
        }
        SearchCondition::IsNull(field) => Ok(row.get(field.column()).is_null().into()),
        SearchCondition::And(conditions) => conditions
            .iter()
            .try_fold(Truth::True, |acc, c| Ok(acc.and(evaluate(c, row)?))),
        SearchCondition::Or(conditions) => conditions
            .iter()
            .try_fold(Truth::False, |acc, c| Ok(acc.or(evaluate(c, row)?))),
        SearchCondition::True => Ok(Truth::True),
        SearchCondition::False => Ok(Truth::False),
    }
}

/// A table of rows held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Vec<Row>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows for which `condition` is true, in insertion order.
    pub fn select(&self, condition: &SearchCondition) -> Result<Vec<&Row>, StoreError> {
        let mut selected = Vec::new();
        for row in &self.rows {
            if evaluate(condition, row)?.is_true() {
                selected.push(row);
            }
        }
        Ok(selected)
    }

    /// Run a claim page query: filter, order by id ascending, then limit.
    pub fn run(&self, query: &ClaimQueryBuilder<'_>) -> Result<Vec<&Row>, StoreError> {
        let id = FieldRef::new(query.source().id_column())?;
        let mut rows = self.select(&query.condition()?)?;

        let mut mismatch = None;
        rows.sort_by(|a, b| {
            match compare_values(id.column(), a.get(id.column()), b.get(id.column())) {
                Ok(Some(ordering)) => ordering,
                // NULLS LAST
                Ok(None) => a
                    .get(id.column())
                    .is_null()
                    .cmp(&b.get(id.column()).is_null()),
                Err(e) => {
                    mismatch.get_or_insert(e);
                    Ordering::Equal
                }
            }
        });
        if let Some(e) = mismatch {
            return Err(e);
        }

        if let Some(limit) = query.page_limit() {
            rows.truncate(limit);
        }
        Ok(rows)
    }
}
