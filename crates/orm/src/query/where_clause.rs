//! Query Builder WHERE clause operations

use crate::backends::DatabaseValue;

use super::builder::QueryBuilder;
use super::types::*;

impl<M> QueryBuilder<M> {
    /// Add WHERE condition with an explicit operator
    pub fn where_op<T>(mut self, column: &str, operator: QueryOperator, value: T) -> Self
    where
        T: Into<DatabaseValue>,
    {
        self.wheres.push(WhereClause::Basic {
            column: column.to_string(),
            operator,
            value: value.into(),
            boolean: Boolean::And,
        });
        self
    }

    /// Add OR WHERE condition with an explicit operator
    pub fn or_where_op<T>(mut self, column: &str, operator: QueryOperator, value: T) -> Self
    where
        T: Into<DatabaseValue>,
    {
        self.wheres.push(WhereClause::Basic {
            column: column.to_string(),
            operator,
            value: value.into(),
            boolean: Boolean::Or,
        });
        self
    }

    /// Add WHERE condition with equality
    pub fn where_eq<T>(self, column: &str, value: T) -> Self
    where
        T: Into<DatabaseValue>,
    {
        self.where_op(column, QueryOperator::Equal, value)
    }

    /// Add OR WHERE condition with equality
    pub fn or_where_eq<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.or_where_op(column, QueryOperator::Equal, value)
    }

    /// Add WHERE condition with not equal
    pub fn where_ne<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.where_op(column, QueryOperator::NotEqual, value)
    }

    /// Add WHERE condition with greater than
    pub fn where_gt<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.where_op(column, QueryOperator::GreaterThan, value)
    }

    /// Add WHERE condition with greater than or equal
    pub fn where_gte<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.where_op(column, QueryOperator::GreaterThanOrEqual, value)
    }

    /// Add WHERE condition with less than
    pub fn where_lt<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.where_op(column, QueryOperator::LessThan, value)
    }

    /// Add WHERE condition with less than or equal
    pub fn where_lte<T: Into<DatabaseValue>>(self, column: &str, value: T) -> Self {
        self.where_op(column, QueryOperator::LessThanOrEqual, value)
    }

    /// Add WHERE condition with LIKE
    pub fn where_like(self, column: &str, pattern: &str) -> Self {
        self.where_op(column, QueryOperator::Like, pattern)
    }

    /// Add an equality condition per attribute
    pub fn where_attributes<'a, I>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a DatabaseValue)>,
    {
        for (column, value) in attributes {
            self = self.where_eq(column, value.clone());
        }
        self
    }

    fn push_in<I, T>(mut self, column: &str, values: I, not: bool, boolean: Boolean) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DatabaseValue>,
    {
        self.wheres.push(WhereClause::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            not,
            boolean,
        });
        self
    }

    /// Add WHERE IN condition
    pub fn where_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DatabaseValue>,
    {
        self.push_in(column, values, false, Boolean::And)
    }

    /// Add OR WHERE IN condition
    pub fn or_where_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DatabaseValue>,
    {
        self.push_in(column, values, false, Boolean::Or)
    }

    /// Add WHERE NOT IN condition
    pub fn where_not_in<I, T>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<DatabaseValue>,
    {
        self.push_in(column, values, true, Boolean::And)
    }

    fn push_null(mut self, column: &str, not: bool, boolean: Boolean) -> Self {
        self.wheres.push(WhereClause::Null {
            column: column.to_string(),
            not,
            boolean,
        });
        self
    }

    /// Add WHERE IS NULL condition
    pub fn where_null(self, column: &str) -> Self {
        self.push_null(column, false, Boolean::And)
    }

    /// Add OR WHERE IS NULL condition
    pub fn or_where_null(self, column: &str) -> Self {
        self.push_null(column, false, Boolean::Or)
    }

    /// Add WHERE IS NOT NULL condition
    pub fn where_not_null(self, column: &str) -> Self {
        self.push_null(column, true, Boolean::And)
    }

    /// Add OR WHERE IS NOT NULL condition
    pub fn or_where_not_null(self, column: &str) -> Self {
        self.push_null(column, true, Boolean::Or)
    }

    /// Compare two columns
    pub fn where_column(mut self, first: &str, operator: QueryOperator, second: &str) -> Self {
        self.wheres.push(WhereClause::Column {
            first: first.to_string(),
            operator,
            second: second.to_string(),
            boolean: Boolean::And,
        });
        self
    }

    /// Compare two columns, joined with OR
    pub fn or_where_column(mut self, first: &str, operator: QueryOperator, second: &str) -> Self {
        self.wheres.push(WhereClause::Column {
            first: first.to_string(),
            operator,
            second: second.to_string(),
            boolean: Boolean::Or,
        });
        self
    }

    /// Add WHERE EXISTS sub-query
    pub fn where_exists<N>(mut self, query: QueryBuilder<N>) -> Self {
        self.wheres.push(WhereClause::Exists {
            query: Box::new(query.into_base()),
            not: false,
            boolean: Boolean::And,
        });
        self
    }

    /// Add WHERE NOT EXISTS sub-query
    pub fn where_not_exists<N>(mut self, query: QueryBuilder<N>) -> Self {
        self.wheres.push(WhereClause::Exists {
            query: Box::new(query.into_base()),
            not: true,
            boolean: Boolean::And,
        });
        self
    }

    /// Add a parenthesized group of conditions
    pub fn where_nested<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let group = callback(QueryBuilder::new().from(self.get_table()));
        if !group.wheres.is_empty() {
            self.wheres.push(WhereClause::Nested {
                query: Box::new(group),
                boolean: Boolean::And,
            });
        }
        self
    }

    /// Add a parenthesized group of conditions, joined with OR
    pub fn or_where_nested<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let group = callback(QueryBuilder::new().from(self.get_table()));
        if !group.wheres.is_empty() {
            self.wheres.push(WhereClause::Nested {
                query: Box::new(group),
                boolean: Boolean::Or,
            });
        }
        self
    }

    /// Add raw WHERE condition
    pub fn where_raw(mut self, sql: &str) -> Self {
        self.wheres.push(WhereClause::Raw {
            sql: sql.to_string(),
            boolean: Boolean::And,
        });
        self
    }
}
