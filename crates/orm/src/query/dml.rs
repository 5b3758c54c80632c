//! Query Builder DML operations (INSERT, UPDATE, DELETE)
//!
//! These only shape the statement; [`execution`](super::execution) runs them.

use crate::backends::{Attributes, DatabaseValue};

use super::builder::QueryBuilder;
use super::types::*;

fn set_clauses(values: Attributes) -> Vec<SetClause> {
    values
        .into_iter()
        .map(|(column, value)| SetClause { column, value })
        .collect()
}

impl<M> QueryBuilder<M> {
    /// Turn the query into an INSERT of the given rows
    pub fn into_insert(mut self, rows: Vec<Attributes>) -> Self {
        self.query_type = QueryType::Insert;
        self.insert_rows = rows.into_iter().map(set_clauses).collect();
        self
    }

    /// Turn the query into an UPDATE keeping its where clauses
    pub fn into_update(mut self, values: Attributes) -> Self {
        self.query_type = QueryType::Update;
        self.set_clauses = set_clauses(values);
        self
    }

    /// Turn the query into a DELETE keeping its where clauses
    pub fn into_delete(mut self) -> Self {
        self.query_type = QueryType::Delete;
        self
    }

    /// Set a column value (for UPDATE)
    pub fn set<T: Into<DatabaseValue>>(mut self, column: &str, value: T) -> Self {
        self.set_clauses.push(SetClause {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    /// Statement kind
    pub fn query_type(&self) -> QueryType {
        self.query_type
    }
}
