//! `_lastUpdated` range queries.
//!
//! A [`RangeQuery`] is compiled once into [`RangeRules`], the single rule
//! table behind every use of the query:
//!
//! - [`RangeRules::accepts`] decides a candidate timestamp in memory,
//! - [`RangeRules::to_condition`] renders the same rules as a
//!   [`SearchCondition`] over a nullable column,
//! - [`RangeRules::accepts_any_in`] decides whether a closed interval holds
//!   at least one accepted point (used by the batch index).
//!
//! Records without a `lastUpdated` value predate tracking and are treated as
//! infinitely old: they match queries that are unbounded below, never pass a
//! lower-bound test, and make a lower-only query invalid.

use std::fmt;

use claimscope_core::Timestamp;
use thiserror::Error;

use crate::parameters::SearchPrefix;
use crate::sql_builder::{FieldRef, Operator, SearchCondition, SqlValue};

/// Errors raised while parsing or validating a range query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    /// The query combines bounds or prefixes that have no meaning.
    #[error("Invalid _lastUpdated query: {0}")]
    InvalidQuery(String),

    /// A bound value could not be parsed.
    #[error("Invalid _lastUpdated value: {0}")]
    InvalidValue(String),
}

impl RangeError {
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery(message.into())
    }
}

/// One side of a range query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeBound {
    pub value: Timestamp,
    pub prefix: SearchPrefix,
}

impl RangeBound {
    pub fn new(value: Timestamp, prefix: SearchPrefix) -> Self {
        Self { value, prefix }
    }
}

impl fmt::Display for RangeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.value)
    }
}

/// A time range with optional lower and upper bounds.
///
/// Construction never fails; validation happens when the query is compiled
/// with [`RangeQuery::rules`], so malformed queries surface as
/// [`RangeError::InvalidQuery`] at the point of use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RangeQuery {
    lower: Option<RangeBound>,
    upper: Option<RangeBound>,
}

impl RangeQuery {
    pub fn new(lower: Option<RangeBound>, upper: Option<RangeBound>) -> Self {
        Self { lower, upper }
    }

    /// A query that matches everything.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn lower(&self) -> Option<&RangeBound> {
        self.lower.as_ref()
    }

    pub fn upper(&self) -> Option<&RangeBound> {
        self.upper.as_ref()
    }

    pub fn is_unbounded(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    /// Parse prefixed `_lastUpdated` values such as `ge2020-01-01` or
    /// `lt2020-02-15T00:00:00Z`.
    ///
    /// `gt`/`ge` set the lower bound and `lt`/`le` the upper bound. `eq` or
    /// no prefix sets both bounds to `eq` with the same value. Unsupported
    /// prefixes are kept as given so that [`RangeQuery::rules`] rejects them.
    pub fn from_params<I, S>(values: I) -> Result<Self, RangeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut query = Self::default();

        for raw in values {
            let raw = raw.as_ref();
            if raw.trim().is_empty() {
                continue;
            }

            let (prefix, value) = SearchPrefix::split(raw);
            let value = Timestamp::parse(value)
                .map_err(|e| RangeError::InvalidValue(format!("'{raw}': {e}")))?;

            match prefix.unwrap_or(SearchPrefix::Eq) {
                SearchPrefix::Eq => {
                    if query.lower.is_some() || query.upper.is_some() {
                        return Err(RangeError::invalid_query(format!(
                            "'{raw}' cannot be combined with other bounds"
                        )));
                    }
                    let bound = RangeBound::new(value, SearchPrefix::Eq);
                    query.lower = Some(bound);
                    query.upper = Some(bound);
                }
                p if p.is_upper() => query.set_upper(RangeBound::new(value, p), raw)?,
                p => query.set_lower(RangeBound::new(value, p), raw)?,
            }
        }

        Ok(query)
    }

    fn set_lower(&mut self, bound: RangeBound, raw: &str) -> Result<(), RangeError> {
        if self.lower.replace(bound).is_some() {
            return Err(RangeError::invalid_query(format!(
                "'{raw}' repeats the lower bound"
            )));
        }
        Ok(())
    }

    fn set_upper(&mut self, bound: RangeBound, raw: &str) -> Result<(), RangeError> {
        if self.upper.replace(bound).is_some() {
            return Err(RangeError::invalid_query(format!(
                "'{raw}' repeats the upper bound"
            )));
        }
        Ok(())
    }

    /// The query as `_lastUpdated` parameter values, for echoing in links.
    pub fn to_params(&self) -> Vec<String> {
        match (self.lower, self.upper) {
            (Some(l), Some(u)) if l == u && l.prefix == SearchPrefix::Eq => {
                vec![format!("eq{}", l.value)]
            }
            (lower, upper) => lower
                .into_iter()
                .chain(upper)
                .map(|b| b.to_string())
                .collect(),
        }
    }

    /// Validate the query and compile it into its rule table.
    pub fn rules(&self) -> Result<RangeRules, RangeError> {
        let lower = self
            .lower
            .map(|bound| {
                let op = match bound.prefix {
                    SearchPrefix::Gt => Operator::Gt,
                    SearchPrefix::Ge | SearchPrefix::Eq => Operator::Ge,
                    other => {
                        return Err(RangeError::invalid_query(format!(
                            "prefix '{other}' is not supported for a lower bound"
                        )));
                    }
                };
                Ok(Comparison::new(op, bound))
            })
            .transpose()?;

        let upper = self
            .upper
            .map(|bound| {
                let op = match bound.prefix {
                    SearchPrefix::Lt => Operator::Lt,
                    SearchPrefix::Le => Operator::Le,
                    SearchPrefix::Eq => match self.lower {
                        Some(l) if l.prefix == SearchPrefix::Eq && l.value == bound.value => {
                            Operator::Le
                        }
                        _ => {
                            return Err(RangeError::invalid_query(
                                "an 'eq' upper bound requires an 'eq' lower bound with the same value",
                            ));
                        }
                    },
                    other => {
                        return Err(RangeError::invalid_query(format!(
                            "prefix '{other}' is not supported for an upper bound"
                        )));
                    }
                };
                Ok(Comparison::new(op, bound))
            })
            .transpose()?;

        Ok(RangeRules { lower, upper })
    }

    /// Decide whether a record timestamp (or its absence) matches.
    pub fn evaluate(&self, value: Option<Timestamp>) -> Result<bool, RangeError> {
        self.rules()?.accepts(value)
    }

    /// Render the query as a condition over a nullable timestamp column.
    ///
    /// Follows the same rules as [`RangeQuery::evaluate`] with one
    /// exception. Where `evaluate` rejects an absent value with
    /// [`RangeError::InvalidQuery`] (a lower bound alone, or `eq`), the
    /// condition leaves NULL rows out instead, since a store cannot fail a
    /// single row.
    pub fn to_condition(&self, field: &FieldRef) -> Result<SearchCondition, RangeError> {
        Ok(self.rules()?.to_condition(field))
    }

    /// Keep the records whose `lastUpdated` matches, in order.
    pub fn filter_records<'a, R: LastUpdatedRecord>(
        &self,
        records: &'a [R],
    ) -> Result<Vec<&'a R>, RangeError> {
        let rules = self.rules()?;
        let mut matched = Vec::new();
        for record in records {
            if rules.accepts(record.last_updated())? {
                matched.push(record);
            }
        }
        Ok(matched)
    }
}

impl fmt::Display for RangeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unbounded() {
            return f.write_str("(unbounded)");
        }
        f.write_str(&self.to_params().join("&"))
    }
}

/// Anything with an optional `lastUpdated` timestamp.
pub trait LastUpdatedRecord {
    fn last_updated(&self) -> Option<Timestamp>;
}

impl LastUpdatedRecord for Option<Timestamp> {
    fn last_updated(&self) -> Option<Timestamp> {
        *self
    }
}

/// A compiled bound: `value op bound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    pub op: Operator,
    pub bound: RangeBound,
}

impl Comparison {
    fn new(op: Operator, bound: RangeBound) -> Self {
        Self { op, bound }
    }

    pub fn admits(&self, value: Timestamp) -> bool {
        self.op.holds(value.cmp(&self.bound.value))
    }

    fn to_condition(self, field: &FieldRef) -> SearchCondition {
        SearchCondition::compare(
            field.clone(),
            self.op,
            SqlValue::Timestamp(self.bound.value),
        )
    }
}

/// A validated range query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRules {
    lower: Option<Comparison>,
    upper: Option<Comparison>,
}

impl RangeRules {
    pub fn lower(&self) -> Option<&Comparison> {
        self.lower.as_ref()
    }

    pub fn upper(&self) -> Option<&Comparison> {
        self.upper.as_ref()
    }

    pub fn accepts(&self, value: Option<Timestamp>) -> Result<bool, RangeError> {
        match value {
            Some(v) => Ok(self.lower.is_none_or(|c| c.admits(v))
                && self.upper.is_none_or(|c| c.admits(v))),
            None => match (&self.lower, &self.upper) {
                (None, _) => Ok(true),
                (Some(_), Some(u)) if u.bound.prefix != SearchPrefix::Eq => Ok(false),
                (Some(_), _) => Err(RangeError::invalid_query(
                    "a record without lastUpdated cannot be tested against a lower bound alone",
                )),
            },
        }
    }

    /// Whether any point of `[first, last]` is accepted.
    pub fn accepts_any_in(&self, first: Timestamp, last: Timestamp) -> bool {
        if first > last {
            return false;
        }
        let candidate = match &self.lower {
            None => first,
            Some(c) if c.op == Operator::Gt => match c.bound.value.successor() {
                Some(after) => first.max(after),
                // nothing is later than the last representable instant
                None => return false,
            },
            Some(c) => first.max(c.bound.value),
        };
        candidate <= last && self.upper.is_none_or(|c| c.admits(candidate))
    }

    /// Whether a point at or after `from` can still satisfy the upper bound.
    pub fn upper_admits(&self, from: Timestamp) -> bool {
        self.upper.is_none_or(|c| c.admits(from))
    }

    /// NULL rows match only when there is no lower bound. See
    /// [`RangeQuery::to_condition`] for the one case that differs from
    /// [`RangeRules::accepts`].
    pub fn to_condition(&self, field: &FieldRef) -> SearchCondition {
        match (self.lower, self.upper) {
            (None, None) => SearchCondition::True,
            (None, Some(upper)) => SearchCondition::or(vec![
                SearchCondition::IsNull(field.clone()),
                upper.to_condition(field),
            ]),
            (Some(lower), None) => lower.to_condition(field),
            (Some(lower), Some(upper)) => {
                SearchCondition::and(vec![lower.to_condition(field), upper.to_condition(field)])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn bound(prefix: SearchPrefix, s: &str) -> Option<RangeBound> {
        Some(RangeBound::new(ts(s), prefix))
    }

    #[test]
    fn test_upper_eq_without_lower_is_invalid() {
        let query = RangeQuery::new(None, bound(SearchPrefix::Eq, "2020-01-01"));
        let err = query.evaluate(Some(ts("2020-01-01"))).unwrap_err();
        assert!(matches!(err, RangeError::InvalidQuery(_)));
        assert!(query.evaluate(None).is_err());
    }

    #[test]
    fn test_upper_eq_requires_same_value() {
        let query = RangeQuery::new(
            bound(SearchPrefix::Eq, "2020-01-01"),
            bound(SearchPrefix::Eq, "2020-01-02"),
        );
        assert!(query.rules().is_err());

        let query = RangeQuery::new(
            bound(SearchPrefix::Ge, "2020-01-01"),
            bound(SearchPrefix::Eq, "2020-01-01"),
        );
        assert!(query.rules().is_err());
    }

    #[test]
    fn test_absent_timestamp_before_upper_bound_matches() {
        let query = RangeQuery::new(None, bound(SearchPrefix::Lt, "2020-01-01"));
        assert!(query.evaluate(None).unwrap());

        let query = RangeQuery::new(None, bound(SearchPrefix::Le, "2020-01-01"));
        assert!(query.evaluate(None).unwrap());
    }

    #[test]
    fn test_absent_timestamp_with_lower_bound() {
        let both = RangeQuery::new(
            bound(SearchPrefix::Ge, "2020-01-01"),
            bound(SearchPrefix::Lt, "2020-02-01"),
        );
        assert!(!both.evaluate(None).unwrap());

        let lower_only = RangeQuery::new(bound(SearchPrefix::Gt, "2020-01-01"), None);
        assert!(matches!(
            lower_only.evaluate(None),
            Err(RangeError::InvalidQuery(_))
        ));

        let exact = RangeQuery::from_params(["eq2020-01-01"]).unwrap();
        assert!(exact.evaluate(None).is_err());
    }

    #[test]
    fn test_unbounded_matches_everything() {
        let query = RangeQuery::unbounded();
        assert!(query.evaluate(None).unwrap());
        assert!(query.evaluate(Some(ts("1999-12-31"))).unwrap());
    }

    #[test]
    fn test_boundary_values() {
        let day = ts("2020-01-15");

        let gt = RangeQuery::new(bound(SearchPrefix::Gt, "2020-01-15"), None);
        assert!(!gt.evaluate(Some(day)).unwrap());
        assert!(gt.evaluate(Some(day.successor().unwrap())).unwrap());

        let ge = RangeQuery::new(bound(SearchPrefix::Ge, "2020-01-15"), None);
        assert!(ge.evaluate(Some(day)).unwrap());

        let lt = RangeQuery::new(None, bound(SearchPrefix::Lt, "2020-01-15"));
        assert!(!lt.evaluate(Some(day)).unwrap());

        let le = RangeQuery::new(None, bound(SearchPrefix::Le, "2020-01-15"));
        assert!(le.evaluate(Some(day)).unwrap());

        let eq = RangeQuery::from_params(["2020-01-15"]).unwrap();
        assert!(eq.evaluate(Some(day)).unwrap());
        assert!(!eq.evaluate(Some(day.successor().unwrap())).unwrap());
    }

    #[test]
    fn test_wrong_side_prefixes_are_invalid() {
        for (lower, upper) in [
            (bound(SearchPrefix::Lt, "2020-01-01"), None),
            (bound(SearchPrefix::Le, "2020-01-01"), None),
            (None, bound(SearchPrefix::Gt, "2020-01-01")),
            (None, bound(SearchPrefix::Ge, "2020-01-01")),
            (bound(SearchPrefix::Ne, "2020-01-01"), None),
            (bound(SearchPrefix::Ap, "2020-01-01"), None),
            (bound(SearchPrefix::Sa, "2020-01-01"), None),
            (None, bound(SearchPrefix::Eb, "2020-01-01")),
        ] {
            let query = RangeQuery::new(lower, upper);
            assert!(
                matches!(query.rules(), Err(RangeError::InvalidQuery(_))),
                "{query:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_from_params() {
        let query = RangeQuery::from_params(["ge2020-01-15", "lt2020-02-15T00:00:00Z"]).unwrap();
        assert_eq!(query.lower(), bound(SearchPrefix::Ge, "2020-01-15").as_ref());
        assert_eq!(query.upper(), bound(SearchPrefix::Lt, "2020-02-15").as_ref());
        assert_eq!(
            query.to_params(),
            vec!["ge2020-01-15T00:00:00Z", "lt2020-02-15T00:00:00Z"]
        );

        let exact = RangeQuery::from_params(["2020-01-15"]).unwrap();
        assert_eq!(exact.lower(), exact.upper());
        assert_eq!(exact.to_params(), vec!["eq2020-01-15T00:00:00Z"]);

        assert!(RangeQuery::from_params(Vec::<String>::new()).unwrap().is_unbounded());
    }

    #[test]
    fn test_from_params_rejections() {
        assert!(matches!(
            RangeQuery::from_params(["ge2020-01-01", "gt2020-01-02"]),
            Err(RangeError::InvalidQuery(_))
        ));
        assert!(matches!(
            RangeQuery::from_params(["ge2020-01-01", "eq2020-01-02"]),
            Err(RangeError::InvalidQuery(_))
        ));
        assert!(matches!(
            RangeQuery::from_params(["genot-a-date"]),
            Err(RangeError::InvalidValue(_))
        ));

        // kept on parse, rejected on compile
        let ne = RangeQuery::from_params(["ne2020-01-01"]).unwrap();
        assert!(ne.rules().is_err());
    }

    #[test]
    fn test_accepts_any_in() {
        let rules = RangeQuery::from_params(["ge2020-01-15", "lt2020-02-15"])
            .unwrap()
            .rules()
            .unwrap();

        assert!(rules.accepts_any_in(ts("2020-01-01"), ts("2020-01-31")));
        assert!(rules.accepts_any_in(ts("2020-02-01"), ts("2020-02-28")));
        assert!(rules.accepts_any_in(ts("2020-01-01"), ts("2020-01-15")));
        assert!(!rules.accepts_any_in(ts("2020-01-01"), ts("2020-01-14")));
        assert!(!rules.accepts_any_in(ts("2020-02-15"), ts("2020-03-01")));

        let gt = RangeQuery::new(bound(SearchPrefix::Gt, "2020-01-31"), None)
            .rules()
            .unwrap();
        assert!(!gt.accepts_any_in(ts("2020-01-01"), ts("2020-01-31")));
        assert!(gt.accepts_any_in(ts("2020-01-01"), ts("2020-01-31").successor().unwrap()));

        let le = RangeQuery::new(None, bound(SearchPrefix::Le, "2020-01-01"))
            .rules()
            .unwrap();
        assert!(le.accepts_any_in(ts("2020-01-01"), ts("2020-01-31")));
        assert!(!le.accepts_any_in(ts("2020-01-02"), ts("2020-01-31")));
    }

    #[test]
    fn test_gt_last_instant_accepts_nothing() {
        let query = RangeQuery::from_params(["gt9999-12-31T23:59:59.999999999Z"]).unwrap();
        let rules = query.rules().unwrap();

        assert!(!rules.accepts_any_in(ts("2020-01-01"), ts("2020-12-31")));
        assert!(!rules.accepts_any_in(
            ts("2020-01-01"),
            ts("9999-12-31T23:59:59.999999999Z")
        ));
        assert!(!query.evaluate(Some(ts("9999-12-31T23:59:59.999999999Z"))).unwrap());
    }

    #[test]
    fn test_to_condition_shapes() {
        let field = FieldRef::new("last_updated").unwrap();

        assert_eq!(
            RangeQuery::unbounded().to_condition(&field).unwrap(),
            SearchCondition::True
        );

        let upper_only = RangeQuery::new(None, bound(SearchPrefix::Lt, "2020-01-01"))
            .to_condition(&field)
            .unwrap();
        assert!(matches!(upper_only, SearchCondition::Or(ref parts) if parts.len() == 2));

        let both = RangeQuery::from_params(["gt2020-01-01", "le2020-02-01"])
            .unwrap()
            .to_condition(&field)
            .unwrap();
        assert!(matches!(both, SearchCondition::And(ref parts) if parts.len() == 2));
    }

    #[test]
    fn test_filter_records_keeps_order() {
        let records = vec![
            Some(ts("2020-01-10")),
            None,
            Some(ts("2019-06-01")),
            Some(ts("2020-03-01")),
        ];
        let query = RangeQuery::new(None, bound(SearchPrefix::Lt, "2020-02-01"));
        let matched = query.filter_records(&records).unwrap();
        assert_eq!(
            matched,
            vec![&records[0], &records[1], &records[2]]
        );
    }
}
