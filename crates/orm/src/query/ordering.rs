//! Query Builder ORDER BY and GROUP BY operations

use super::builder::QueryBuilder;
use super::types::*;

impl<M> QueryBuilder<M> {
    /// Add ORDER BY clause
    pub fn order_by(mut self, column: &str) -> Self {
        self.orders.push((column.to_string(), OrderDirection::Asc));
        self
    }

    /// Add ORDER BY DESC clause
    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.orders.push((column.to_string(), OrderDirection::Desc));
        self
    }

    /// Order by a column, newest first
    pub fn latest(self, column: &str) -> Self {
        self.order_by_desc(column)
    }

    /// Order by a column, oldest first
    pub fn oldest(self, column: &str) -> Self {
        self.order_by(column)
    }

    /// Drop every ORDER BY clause
    pub fn reorder(mut self) -> Self {
        self.orders.clear();
        self
    }

    /// Add GROUP BY clause
    pub fn group_by(mut self, column: &str) -> Self {
        self.groups.push(column.to_string());
        self
    }
}
