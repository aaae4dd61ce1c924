//! SOQL generation from query descriptors.
//!
//! A query type implements [`SoqlQuery`] by returning a [`QuerySpec`]: the
//! object to select from, the projected columns in order, and the WHERE
//! conditions. Conditions are ANDed in declaration order; a condition whose
//! value is `None` is left out. Values are always rendered as escaped
//! literals, so untrusted input cannot change the shape of the query.
//!
//! # Example
//!
//! ```rust
//! use forcelink_rest::{Condition, QuerySpec, SoqlBuilder, SoqlQuery};
//!
//! struct ContactsByOwner {
//!     owner: Option<String>,
//!     min_age: Option<i64>,
//! }
//!
//! impl SoqlQuery for ContactsByOwner {
//!     fn describe(&self) -> QuerySpec {
//!         QuerySpec::new("Contact")
//!             .columns(["Id", "Name", "Owner.Name"])
//!             .condition(Condition::equals("Owner.Name", self.owner.clone()))
//!             .condition(Condition::greater_than_or_equals("Age__c", self.min_age))
//!     }
//! }
//!
//! let query = ContactsByOwner { owner: Some("O'Brien".into()), min_age: None };
//! assert_eq!(
//!     SoqlBuilder::build(&query).unwrap(),
//!     "SELECT Id, Name, Owner.Name FROM Contact WHERE Owner.Name = 'O\\'Brien'"
//! );
//! ```

use forcelink_client::security::soql;
use forcelink_client::FieldValue;

use crate::error::{Error, Result};

/// Comparison applied by a WHERE condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Like,
    NotLike,
    GreaterThan,
    GreaterThanOrEquals,
    LessThan,
    LessThanOrEquals,
    IsNull,
    IsNotNull,
}

impl Operator {
    fn symbol(&self) -> &'static str {
        match self {
            Operator::Equals | Operator::IsNull => "=",
            Operator::NotEquals | Operator::IsNotNull => "!=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Like | Operator::NotLike => "LIKE",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEquals => ">=",
            Operator::LessThan => "<",
            Operator::LessThanOrEquals => "<=",
        }
    }
}

/// Where wildcards go around a LIKE value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LikeMatch {
    #[default]
    Contains,
    StartsWith,
    EndsWith,
    Exact,
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Absent,
    Nothing,
    Single(FieldValue),
    List(Vec<FieldValue>),
}

/// One WHERE condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    field: String,
    operator: Operator,
    operand: Operand,
    like: LikeMatch,
}

impl Condition {
    /// A comparison against a single value. A null value (including `None`)
    /// makes the condition absent.
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<FieldValue>) -> Self {
        let value = value.into();
        let operand = match operator {
            Operator::IsNull | Operator::IsNotNull => Operand::Nothing,
            _ if value.is_null() => Operand::Absent,
            Operator::In | Operator::NotIn => Operand::List(vec![value]),
            _ => Operand::Single(value),
        };
        Self {
            field: field.into(),
            operator,
            operand,
            like: LikeMatch::default(),
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new(field, Operator::Equals, value)
    }

    pub fn not_equals(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new(field, Operator::NotEquals, value)
    }

    pub fn greater_than(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new(field, Operator::GreaterThan, value)
    }

    pub fn greater_than_or_equals(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new(field, Operator::GreaterThanOrEquals, value)
    }

    pub fn less_than(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new(field, Operator::LessThan, value)
    }

    pub fn less_than_or_equals(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new(field, Operator::LessThanOrEquals, value)
    }

    /// `field LIKE '%value%'`, with `%` and `_` in the value escaped.
    pub fn like(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new(field, Operator::Like, value)
    }

    pub fn not_like(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new(field, Operator::NotLike, value)
    }

    /// `field IN (...)`. An empty list is rejected at build time.
    pub fn one_of<V: Into<FieldValue>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::list(field, Operator::In, values)
    }

    pub fn none_of<V: Into<FieldValue>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::list(field, Operator::NotIn, values)
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNull, FieldValue::Null)
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNotNull, FieldValue::Null)
    }

    /// Wildcard placement for `Like`/`NotLike`.
    pub fn matching(mut self, like: LikeMatch) -> Self {
        self.like = like;
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// False when the condition was given no value and is left out.
    pub fn is_present(&self) -> bool {
        self.operand != Operand::Absent
    }

    fn list<V: Into<FieldValue>>(
        field: impl Into<String>,
        operator: Operator,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            operand: Operand::List(values.into_iter().map(Into::into).collect()),
            like: LikeMatch::default(),
        }
    }

    fn render(&self) -> Result<Option<String>> {
        if !soql::is_safe_field_name(&self.field) {
            return Err(Error::validation(format!(
                "invalid field name '{}'",
                self.field
            )));
        }

        let field = &self.field;
        let op = self.operator.symbol();
        let clause = match &self.operand {
            Operand::Absent => return Ok(None),
            Operand::Nothing => format!("{field} {op} null"),
            Operand::List(values) => {
                if values.is_empty() {
                    return Err(Error::validation(format!(
                        "{op} condition on '{field}' has no values"
                    )));
                }
                let rendered = values.iter().map(literal).collect::<Result<Vec<_>>>()?;
                format!("{field} {op} ({})", rendered.join(", "))
            }
            Operand::Single(value) => match self.operator {
                Operator::Like | Operator::NotLike => {
                    let escaped = soql::escape_like(&value.to_text());
                    let pattern = match self.like {
                        LikeMatch::Contains => format!("%{escaped}%"),
                        LikeMatch::StartsWith => format!("{escaped}%"),
                        LikeMatch::EndsWith => format!("%{escaped}"),
                        LikeMatch::Exact => escaped,
                    };
                    if self.operator == Operator::NotLike {
                        format!("(NOT {field} LIKE '{pattern}')")
                    } else {
                        format!("{field} LIKE '{pattern}'")
                    }
                }
                _ => format!("{field} {op} {}", literal(value)?),
            },
        };
        Ok(Some(clause))
    }
}

/// Render a value as a SOQL literal: text quoted and escaped, everything
/// else bare. SOQL has no spelling for NaN or infinity.
fn literal(value: &FieldValue) -> Result<String> {
    match value {
        FieldValue::Null => Ok("null".to_string()),
        FieldValue::String(s) => Ok(format!("'{}'", soql::escape_string(s))),
        FieldValue::Float(n) if !n.is_finite() => Err(Error::validation(format!(
            "{n} is not a valid SOQL number"
        ))),
        other => Ok(other.to_text()),
    }
}

/// Field-descriptor table of one query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuerySpec {
    pub table: String,
    pub columns: Vec<String>,
    pub conditions: Vec<Condition>,
    /// Field and ascending flag.
    pub order_by: Option<(String, bool)>,
    pub limit: Option<u32>,
}

impl QuerySpec {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, ascending: bool) -> Self {
        self.order_by = Some((field.into(), ascending));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render the SOQL string.
    pub fn to_soql(&self) -> Result<String> {
        if !soql::is_safe_sobject_name(&self.table) {
            return Err(Error::validation(format!(
                "invalid sObject name '{}'",
                self.table
            )));
        }
        if self.columns.is_empty() {
            return Err(Error::validation(format!(
                "query on '{}' selects no columns",
                self.table
            )));
        }
        if let Some(bad) = self.columns.iter().find(|c| !soql::is_safe_field_name(c)) {
            return Err(Error::validation(format!("invalid column name '{bad}'")));
        }

        let mut query = format!("SELECT {} FROM {}", self.columns.join(", "), self.table);

        let mut clauses = Vec::new();
        for condition in &self.conditions {
            if let Some(clause) = condition.render()? {
                clauses.push(clause);
            }
        }
        if !clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&clauses.join(" AND "));
        }

        if let Some((field, ascending)) = &self.order_by {
            if !soql::is_safe_field_name(field) {
                return Err(Error::validation(format!("invalid ORDER BY field '{field}'")));
            }
            let direction = if *ascending { "ASC" } else { "DESC" };
            query.push_str(&format!(" ORDER BY {field} {direction}"));
        }

        if let Some(limit) = self.limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }

        Ok(query)
    }
}

/// A type that describes a SOQL query.
pub trait SoqlQuery {
    fn describe(&self) -> QuerySpec;
}

impl SoqlQuery for QuerySpec {
    fn describe(&self) -> QuerySpec {
        self.clone()
    }
}

/// Builds SOQL strings from [`SoqlQuery`] descriptors.
pub struct SoqlBuilder;

impl SoqlBuilder {
    pub fn build<Q: SoqlQuery + ?Sized>(query: &Q) -> Result<String> {
        query.describe().to_soql()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    struct AccountByName {
        name: String,
        employees: Option<i64>,
    }

    impl SoqlQuery for AccountByName {
        fn describe(&self) -> QuerySpec {
            QuerySpec::new("Account")
                .columns(["Id", "Name"])
                .condition(Condition::equals("Name", self.name.as_str()))
                .condition(Condition::greater_than("NumberOfEmployees", self.employees))
        }
    }

    #[test]
    fn test_non_finite_float_is_rejected() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = QuerySpec::new("Opportunity")
                .columns(["Id"])
                .condition(Condition::greater_than("Amount", value))
                .to_soql()
                .unwrap_err();
            assert!(err.is_validation(), "unexpected error: {err}");
        }

        let err = QuerySpec::new("Opportunity")
            .columns(["Id"])
            .condition(Condition::one_of("Amount", vec![1.5, f64::NAN]))
            .to_soql()
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_select_with_escaped_equals() {
        let query = AccountByName {
            name: "O'Brien".to_string(),
            employees: None,
        };
        assert_eq!(
            SoqlBuilder::build(&query).unwrap(),
            "SELECT Id, Name FROM Account WHERE Name = 'O\\'Brien'"
        );
    }

    #[test]
    fn test_numbers_unquoted_and_anded_in_order() {
        let query = AccountByName {
            name: "Acme".to_string(),
            employees: Some(50),
        };
        assert_eq!(
            SoqlBuilder::build(&query).unwrap(),
            "SELECT Id, Name FROM Account WHERE Name = 'Acme' AND NumberOfEmployees > 50"
        );
    }

    #[test]
    fn test_all_operators() {
        let spec = QuerySpec::new("Contact")
            .column("Id")
            .condition(Condition::not_equals("Status__c", "Closed"))
            .condition(Condition::one_of("Industry", ["Tech", "Finance"]))
            .condition(Condition::none_of("Rating__c", [1i64, 2]))
            .condition(Condition::like("Name", "50%_off"))
            .condition(Condition::not_like("Email", "test").matching(LikeMatch::StartsWith))
            .condition(Condition::less_than_or_equals("Birthdate", NaiveDate::from_ymd_opt(2000, 1, 31)))
            .condition(Condition::greater_than_or_equals("Score__c", 1.5))
            .condition(Condition::less_than("Active__c", true))
            .condition(Condition::is_null("MailingCity"))
            .condition(Condition::is_not_null("Phone"))
            .order_by("CreatedDate", false)
            .limit(10);

        assert_eq!(
            spec.to_soql().unwrap(),
            "SELECT Id FROM Contact WHERE Status__c != 'Closed' \
             AND Industry IN ('Tech', 'Finance') \
             AND Rating__c NOT IN (1, 2) \
             AND Name LIKE '%50\\%\\_off%' \
             AND (NOT Email LIKE 'test%') \
             AND Birthdate <= 2000-01-31 \
             AND Score__c >= 1.5 \
             AND Active__c < true \
             AND MailingCity = null \
             AND Phone != null \
             ORDER BY CreatedDate DESC LIMIT 10"
        );
    }

    #[test]
    fn test_no_columns_is_validation_error() {
        let err = QuerySpec::new("Account").to_soql().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_unsafe_names_rejected() {
        assert!(QuerySpec::new("Account'; DROP--").column("Id").to_soql().is_err());
        assert!(QuerySpec::new("Account").column("Name'--").to_soql().is_err());
        assert!(QuerySpec::new("Account")
            .column("Id")
            .condition(Condition::equals("Name OR Id", "x"))
            .to_soql()
            .is_err());
    }

    #[test]
    fn test_empty_in_list_rejected() {
        let spec = QuerySpec::new("Account")
            .column("Id")
            .condition(Condition::one_of("Id", Vec::<String>::new()));
        assert!(spec.to_soql().unwrap_err().is_validation());
    }

    #[test]
    fn test_absent_condition_skipped() {
        let condition = Condition::equals("Name", Option::<String>::None);
        assert!(!condition.is_present());
        let spec = QuerySpec::new("Account").column("Id").condition(condition);
        assert_eq!(spec.to_soql().unwrap(), "SELECT Id FROM Account");
    }
}
