//! Query Builder SELECT operations

use super::builder::QueryBuilder;
use super::types::*;

impl<M> QueryBuilder<M> {
    /// Replace the selected columns
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|column| column.to_string()).collect();
        self
    }

    /// Add columns to the selection, skipping ones already selected
    pub fn add_select(mut self, columns: &[&str]) -> Self {
        for column in columns {
            if !self.columns.iter().any(|existing| existing == column) {
                self.columns.push(column.to_string());
            }
        }
        self
    }

    /// Select DISTINCT rows
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Select an aggregate instead of the column list
    pub fn select_aggregate(mut self, function: AggregateFunction, column: &str) -> Self {
        self.aggregate = Some(Aggregate {
            function,
            column: column.to_string(),
        });
        self
    }

    /// Select `COUNT(*)`
    pub fn select_count(self) -> Self {
        self.select_aggregate(AggregateFunction::Count, "*")
    }

    /// Check if the query selects an aggregate
    pub fn is_aggregate(&self) -> bool {
        self.aggregate.is_some()
    }
}
