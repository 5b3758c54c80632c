//! Query Builder execution
//!
//! Row level operations work on any query; model hydration and eager loading
//! need the query to be typed with a [`Model`].

use crate::backends::{Attributes, DatabaseConnection, DatabaseValue};
use crate::error::{ModelError, ModelResult};
use crate::model::Model;

use super::builder::QueryBuilder;
use super::types::AggregateFunction;

/// Key a selected column comes back under: the alias, or the last segment
fn result_key(column: &str) -> &str {
    if let Some(index) = column.to_ascii_lowercase().find(" as ") {
        return column[index + 4..].trim();
    }
    column.rsplit('.').next().unwrap_or(column)
}

impl<M> QueryBuilder<M> {
    /// Execute the query and return the raw rows
    pub async fn get_rows(self, conn: &dyn DatabaseConnection) -> ModelResult<Vec<Attributes>> {
        let query = self.into_base();
        tracing::debug!(backend = conn.backend_name(), sql = %query.to_sql(), "Executing select");
        conn.select(&query).await
    }

    /// Values of a single column
    pub async fn pluck(self, column: &str, conn: &dyn DatabaseConnection) -> ModelResult<Vec<DatabaseValue>> {
        let key = result_key(column).to_string();
        let rows = self.select(&[column]).get_rows(conn).await?;
        Ok(rows
            .into_iter()
            .map(|mut row| row.remove(&key).unwrap_or_default())
            .collect())
    }

    /// Run an aggregate function over the query
    pub async fn aggregate(
        self,
        function: AggregateFunction,
        column: &str,
        conn: &dyn DatabaseConnection,
    ) -> ModelResult<DatabaseValue> {
        let mut query = self.select_aggregate(function, column);
        query.orders.clear();
        query.limit_count = None;
        query.offset_value = None;

        let rows = query.get_rows(conn).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|mut row| row.remove("aggregate"))
            .unwrap_or_default())
    }

    /// Count the matching rows
    pub async fn count(self, conn: &dyn DatabaseConnection) -> ModelResult<i64> {
        let value = self.aggregate(AggregateFunction::Count, "*", conn).await?;
        Ok(value.as_i64().unwrap_or(0))
    }

    pub async fn min(self, column: &str, conn: &dyn DatabaseConnection) -> ModelResult<DatabaseValue> {
        self.aggregate(AggregateFunction::Min, column, conn).await
    }

    pub async fn max(self, column: &str, conn: &dyn DatabaseConnection) -> ModelResult<DatabaseValue> {
        self.aggregate(AggregateFunction::Max, column, conn).await
    }

    pub async fn sum(self, column: &str, conn: &dyn DatabaseConnection) -> ModelResult<DatabaseValue> {
        self.aggregate(AggregateFunction::Sum, column, conn).await
    }

    pub async fn avg(self, column: &str, conn: &dyn DatabaseConnection) -> ModelResult<DatabaseValue> {
        self.aggregate(AggregateFunction::Avg, column, conn).await
    }

    /// Check if any row matches
    pub async fn exists(self, conn: &dyn DatabaseConnection) -> ModelResult<bool> {
        let rows = self.limit(1).get_rows(conn).await?;
        Ok(!rows.is_empty())
    }

    /// Insert rows into the query's table, returns the inserted rows count
    pub async fn insert(self, rows: Vec<Attributes>, conn: &dyn DatabaseConnection) -> ModelResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let query = self.into_insert(rows).into_base();
        tracing::debug!(backend = conn.backend_name(), sql = %query.to_sql(), "Executing insert");
        conn.affecting_statement(&query).await
    }

    /// Insert one row and return the value generated for `key_name`
    pub async fn insert_get_id(
        self,
        row: Attributes,
        key_name: &str,
        conn: &dyn DatabaseConnection,
    ) -> ModelResult<DatabaseValue> {
        let query = self.into_insert(vec![row]).into_base();
        tracing::debug!(backend = conn.backend_name(), sql = %query.to_sql(), "Executing insert");
        conn.insert_get_id(&query, key_name).await
    }

    /// Update the matching rows, returns the affected rows count
    pub async fn update(self, values: Attributes, conn: &dyn DatabaseConnection) -> ModelResult<u64> {
        if values.is_empty() {
            return Ok(0);
        }
        let query = self.into_update(values).into_base();
        tracing::debug!(backend = conn.backend_name(), sql = %query.to_sql(), "Executing update");
        conn.affecting_statement(&query).await
    }

    /// Delete the matching rows, returns the deleted rows count
    pub async fn delete(self, conn: &dyn DatabaseConnection) -> ModelResult<u64> {
        let query = self.into_delete().into_base();
        tracing::debug!(backend = conn.backend_name(), sql = %query.to_sql(), "Executing delete");
        conn.affecting_statement(&query).await
    }
}

// Implement specialized methods for Model-typed query builders
impl<M: Model> QueryBuilder<M> {
    /// Execute the query and hydrate models, without eager loading
    pub async fn get_models(self, conn: &dyn DatabaseConnection) -> ModelResult<Vec<M>> {
        let mut template = M::default();
        if self.get_table() != M::table_name() && !self.get_table().is_empty() {
            template.base_mut().table = Some(self.get_table().to_string());
        }

        let rows = self.get_rows(conn).await?;
        Ok(rows.into_iter().map(|row| template.new_from_row(row)).collect())
    }

    /// Execute the query, hydrate models and eager load the requested relations
    pub async fn get(self, conn: &dyn DatabaseConnection) -> ModelResult<Vec<M>> {
        let mut models = self.clone().get_models(conn).await?;

        if !models.is_empty() && !self.eager_load.is_empty() {
            self.eager_load_relations(&mut models, conn).await?;
        }

        Ok(models)
    }

    /// First model matching the query
    pub async fn first(self, conn: &dyn DatabaseConnection) -> ModelResult<Option<M>> {
        let models = self.limit(1).get(conn).await?;
        Ok(models.into_iter().next())
    }

    /// First model matching the query or a `NotFound` error
    pub async fn first_or_fail(self, conn: &dyn DatabaseConnection) -> ModelResult<M> {
        let table = self.get_table().to_string();
        self.first(conn)
            .await?
            .ok_or_else(|| ModelError::NotFound(table))
    }

    /// Find a model by its primary key
    pub async fn find<V>(self, id: V, conn: &dyn DatabaseConnection) -> ModelResult<Option<M>>
    where
        V: Into<DatabaseValue>,
    {
        let key = self.qualify_column(M::primary_key_name());
        self.where_eq(&key, id).first(conn).await
    }

    /// Execute query with chunking for large datasets
    pub async fn chunk<F>(self, chunk_size: i64, conn: &dyn DatabaseConnection, mut callback: F) -> ModelResult<()>
    where
        F: FnMut(Vec<M>) -> ModelResult<()>,
    {
        if chunk_size <= 0 {
            return Ok(());
        }

        let mut page = 1;
        loop {
            let chunk = self.clone().for_page(page, chunk_size).get(conn).await?;
            let len = chunk.len() as i64;

            if len == 0 {
                break;
            }

            callback(chunk)?;

            if len < chunk_size {
                break;
            }
            page += 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_key() {
        assert_eq!(result_key("role_user.role_id"), "role_id");
        assert_eq!(result_key("role_user.user_id as pivot_user_id"), "pivot_user_id");
        assert_eq!(result_key("name"), "name");
    }
}
