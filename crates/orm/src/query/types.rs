//! Query Builder Types - Core types and enums for query building

use std::fmt;
use std::str::FromStr;

use crate::backends::DatabaseValue;
use crate::error::ModelError;

use super::builder::QueryBuilder;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Like,
    NotLike,
}

impl QueryOperator {
    /// Check an ordering produced by [`DatabaseValue::compare`] against this operator
    pub fn accepts(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;

        match self {
            QueryOperator::Equal => ordering == Equal,
            QueryOperator::NotEqual => ordering != Equal,
            QueryOperator::GreaterThan => ordering == Greater,
            QueryOperator::GreaterThanOrEqual => ordering != Less,
            QueryOperator::LessThan => ordering == Less,
            QueryOperator::LessThanOrEqual => ordering != Greater,
            QueryOperator::Like => ordering == Equal,
            QueryOperator::NotLike => ordering != Equal,
        }
    }
}

impl fmt::Display for QueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOperator::Equal => write!(f, "="),
            QueryOperator::NotEqual => write!(f, "!="),
            QueryOperator::GreaterThan => write!(f, ">"),
            QueryOperator::GreaterThanOrEqual => write!(f, ">="),
            QueryOperator::LessThan => write!(f, "<"),
            QueryOperator::LessThanOrEqual => write!(f, "<="),
            QueryOperator::Like => write!(f, "LIKE"),
            QueryOperator::NotLike => write!(f, "NOT LIKE"),
        }
    }
}

impl FromStr for QueryOperator {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "=" => Ok(QueryOperator::Equal),
            "!=" | "<>" => Ok(QueryOperator::NotEqual),
            ">" => Ok(QueryOperator::GreaterThan),
            ">=" => Ok(QueryOperator::GreaterThanOrEqual),
            "<" => Ok(QueryOperator::LessThan),
            "<=" => Ok(QueryOperator::LessThanOrEqual),
            "like" => Ok(QueryOperator::Like),
            "not like" => Ok(QueryOperator::NotLike),
            other => Err(ModelError::Query(format!("Unsupported comparison operator '{}'", other))),
        }
    }
}

/// Logical operator joining a where clause to the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Boolean {
    #[default]
    And,
    Or,
}

impl fmt::Display for Boolean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boolean::And => write!(f, "AND"),
            Boolean::Or => write!(f, "OR"),
        }
    }
}

/// Where clause
#[derive(Debug, Clone)]
pub enum WhereClause {
    /// `column <op> value`
    Basic {
        column: String,
        operator: QueryOperator,
        value: DatabaseValue,
        boolean: Boolean,
    },
    /// `column [NOT] IN (values)`
    In {
        column: String,
        values: Vec<DatabaseValue>,
        not: bool,
        boolean: Boolean,
    },
    /// `column IS [NOT] NULL`
    Null {
        column: String,
        not: bool,
        boolean: Boolean,
    },
    /// `first <op> second`, both sides are columns
    Column {
        first: String,
        operator: QueryOperator,
        second: String,
        boolean: Boolean,
    },
    /// `[NOT] EXISTS (query)`
    Exists {
        query: Box<QueryBuilder>,
        not: bool,
        boolean: Boolean,
    },
    /// `(query) <op> count`, the query selects an aggregate
    Count {
        query: Box<QueryBuilder>,
        operator: QueryOperator,
        count: i64,
        boolean: Boolean,
    },
    /// Parenthesized group of the query's where clauses
    Nested {
        query: Box<QueryBuilder>,
        boolean: Boolean,
    },
    /// Raw SQL fragment
    Raw { sql: String, boolean: Boolean },
}

impl WhereClause {
    /// Logical operator joining this clause to the previous one
    pub fn boolean(&self) -> Boolean {
        match self {
            WhereClause::Basic { boolean, .. }
            | WhereClause::In { boolean, .. }
            | WhereClause::Null { boolean, .. }
            | WhereClause::Column { boolean, .. }
            | WhereClause::Exists { boolean, .. }
            | WhereClause::Count { boolean, .. }
            | WhereClause::Nested { boolean, .. }
            | WhereClause::Raw { boolean, .. } => *boolean,
        }
    }

    /// Same clause joined to the previous one with `joined_by`
    pub fn with_boolean(mut self, joined_by: Boolean) -> Self {
        match &mut self {
            WhereClause::Basic { boolean, .. }
            | WhereClause::In { boolean, .. }
            | WhereClause::Null { boolean, .. }
            | WhereClause::Column { boolean, .. }
            | WhereClause::Exists { boolean, .. }
            | WhereClause::Count { boolean, .. }
            | WhereClause::Nested { boolean, .. }
            | WhereClause::Raw { boolean, .. } => *boolean = joined_by,
        }
        self
    }
}

/// Join types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER JOIN"),
            JoinType::Left => write!(f, "LEFT JOIN"),
            JoinType::Right => write!(f, "RIGHT JOIN"),
        }
    }
}

/// Join clause
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: String,
    pub alias: Option<String>,
    pub on_conditions: Vec<(String, String)>, // (left_column, right_column)
}

impl JoinClause {
    /// Name the joined table is referenced by
    pub fn reference(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }
}

/// Order by direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// Aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Min,
    Max,
    Sum,
    Avg,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunction::Count => write!(f, "COUNT"),
            AggregateFunction::Min => write!(f, "MIN"),
            AggregateFunction::Max => write!(f, "MAX"),
            AggregateFunction::Sum => write!(f, "SUM"),
            AggregateFunction::Avg => write!(f, "AVG"),
        }
    }
}

/// Aggregate selected instead of the column list, always aliased as `aggregate`
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub function: AggregateFunction,
    pub column: String,
}

/// Query types supported by the builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
}

/// Set clause for UPDATE and INSERT operations
#[derive(Debug, Clone, PartialEq)]
pub struct SetClause {
    pub column: String,
    pub value: DatabaseValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_round_trips_through_text() {
        for op in [">=", "<", "=", "!=", "like"] {
            let parsed: QueryOperator = op.parse().expect("operator");
            assert_eq!(parsed.to_string().to_lowercase(), op);
        }
        assert_eq!("<>".parse::<QueryOperator>().ok(), Some(QueryOperator::NotEqual));
        assert!("~~".parse::<QueryOperator>().is_err());
    }

    #[test]
    fn test_operator_accepts_ordering() {
        use std::cmp::Ordering;

        assert!(QueryOperator::GreaterThanOrEqual.accepts(Ordering::Equal));
        assert!(!QueryOperator::LessThan.accepts(Ordering::Equal));
        assert!(QueryOperator::NotEqual.accepts(Ordering::Less));
    }
}
