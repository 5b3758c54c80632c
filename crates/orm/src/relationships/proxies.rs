//! Query builder methods forwarded through a relation
//!
//! Builder methods narrow the relation's own query and hand the relation back;
//! execution methods run that query, going through the relation's result hook so
//! many-to-many results still get their pivot rows.

use async_trait::async_trait;

use crate::backends::{DatabaseConnection, DatabaseValue};
use crate::error::{ModelError, OrmResult};
use crate::model::Model;
use crate::query::{AggregateFunction, QueryBuilder, QueryOperator};

use super::relation::Relation;

#[async_trait]
pub trait RelationProxies<M: Model>: Relation<M> {
    /// Replace the relation query with `f` applied to it
    fn map_query<F>(mut self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder<Self::Related>) -> QueryBuilder<Self::Related>,
    {
        let query = std::mem::take(&mut self.core_mut().query);
        self.core_mut().query = f(query);
        self
    }

    /// Fallible variant of [`RelationProxies::map_query`]
    fn try_map_query<F>(mut self, f: F) -> OrmResult<Self>
    where
        F: FnOnce(QueryBuilder<Self::Related>) -> OrmResult<QueryBuilder<Self::Related>>,
    {
        let query = std::mem::take(&mut self.core_mut().query);
        self.core_mut().query = f(query)?;
        Ok(self)
    }

    fn where_eq<V: Into<DatabaseValue>>(self, column: &str, value: V) -> Self {
        self.map_query(|query| query.where_eq(column, value))
    }

    fn where_op<V: Into<DatabaseValue>>(self, column: &str, operator: QueryOperator, value: V) -> Self {
        self.map_query(|query| query.where_op(column, operator, value))
    }

    fn or_where_eq<V: Into<DatabaseValue>>(self, column: &str, value: V) -> Self {
        self.map_query(|query| query.or_where_eq(column, value))
    }

    fn where_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<DatabaseValue>,
    {
        self.map_query(|query| query.where_in(column, values))
    }

    fn where_null(self, column: &str) -> Self {
        self.map_query(|query| query.where_null(column))
    }

    fn where_not_null(self, column: &str) -> Self {
        self.map_query(|query| query.where_not_null(column))
    }

    fn where_like(self, column: &str, pattern: &str) -> Self {
        self.map_query(|query| query.where_like(column, pattern))
    }

    fn select(self, columns: &[&str]) -> Self {
        self.map_query(|query| query.select(columns))
    }

    fn add_select(self, columns: &[&str]) -> Self {
        self.map_query(|query| query.add_select(columns))
    }

    fn distinct(self) -> Self {
        self.map_query(|query| query.distinct())
    }

    fn join(self, table: &str, left_col: &str, right_col: &str) -> Self {
        self.map_query(|query| query.join(table, left_col, right_col))
    }

    fn order_by(self, column: &str) -> Self {
        self.map_query(|query| query.order_by(column))
    }

    fn order_by_desc(self, column: &str) -> Self {
        self.map_query(|query| query.order_by_desc(column))
    }

    fn latest(self, column: &str) -> Self {
        self.map_query(|query| query.latest(column))
    }

    fn limit(self, count: i64) -> Self {
        self.map_query(|query| query.limit(count))
    }

    fn offset(self, count: i64) -> Self {
        self.map_query(|query| query.offset(count))
    }

    fn for_page(self, page: i64, per_page: i64) -> Self {
        self.map_query(|query| query.for_page(page, per_page))
    }

    /// Eager load relations of the related models
    fn with(self, relations: &[&str]) -> Self {
        self.map_query(|query| query.with(relations))
    }

    fn has(self, relation: &str) -> OrmResult<Self> {
        self.try_map_query(|query| query.has(relation))
    }

    fn doesnt_have(self, relation: &str) -> OrmResult<Self> {
        self.try_map_query(|query| query.doesnt_have(relation))
    }

    fn where_has<N, F>(self, relation: &str, callback: F) -> OrmResult<Self>
    where
        N: Model,
        F: FnOnce(QueryBuilder<N>) -> QueryBuilder<N> + Send + 'static,
    {
        self.try_map_query(|query| query.where_has(relation, callback))
    }

    /// Related models matching the relation query
    async fn get(&self, conn: &dyn DatabaseConnection) -> OrmResult<Vec<Self::Related>> {
        self.get_query_results(self.get_query().clone(), conn).await
    }

    async fn first(&self, conn: &dyn DatabaseConnection) -> OrmResult<Option<Self::Related>> {
        let models = self
            .get_query_results(self.get_query().clone().limit(1), conn)
            .await?;
        Ok(models.into_iter().next())
    }

    async fn first_or_fail(&self, conn: &dyn DatabaseConnection) -> OrmResult<Self::Related> {
        self.first(conn)
            .await?
            .ok_or_else(|| ModelError::NotFound(Self::Related::table_name().to_string()))
    }

    /// Related model with the given primary key
    async fn find<V>(&self, id: V, conn: &dyn DatabaseConnection) -> OrmResult<Option<Self::Related>>
    where
        V: Into<DatabaseValue> + Send,
    {
        let key = self.get_related().get_qualified_key_name();
        let query = self.get_query().clone().where_eq(&key, id).limit(1);
        let models = self.get_query_results(query, conn).await?;
        Ok(models.into_iter().next())
    }

    async fn count(&self, conn: &dyn DatabaseConnection) -> OrmResult<i64> {
        self.get_query().clone().count(conn).await
    }

    async fn exists(&self, conn: &dyn DatabaseConnection) -> OrmResult<bool> {
        self.get_query().clone().exists(conn).await
    }

    async fn pluck(&self, column: &str, conn: &dyn DatabaseConnection) -> OrmResult<Vec<DatabaseValue>> {
        self.get_query().clone().pluck(column, conn).await
    }

    async fn aggregate(
        &self,
        function: AggregateFunction,
        column: &str,
        conn: &dyn DatabaseConnection,
    ) -> OrmResult<DatabaseValue> {
        self.get_query().clone().aggregate(function, column, conn).await
    }

    async fn min(&self, column: &str, conn: &dyn DatabaseConnection) -> OrmResult<DatabaseValue> {
        self.aggregate(AggregateFunction::Min, column, conn).await
    }

    async fn max(&self, column: &str, conn: &dyn DatabaseConnection) -> OrmResult<DatabaseValue> {
        self.aggregate(AggregateFunction::Max, column, conn).await
    }

    async fn sum(&self, column: &str, conn: &dyn DatabaseConnection) -> OrmResult<DatabaseValue> {
        self.aggregate(AggregateFunction::Sum, column, conn).await
    }

    async fn avg(&self, column: &str, conn: &dyn DatabaseConnection) -> OrmResult<DatabaseValue> {
        self.aggregate(AggregateFunction::Avg, column, conn).await
    }

    /// Walk the related models page by page
    async fn chunk<F>(&self, chunk_size: i64, conn: &dyn DatabaseConnection, mut callback: F) -> OrmResult<()>
    where
        F: FnMut(Vec<Self::Related>) -> OrmResult<()> + Send,
    {
        if chunk_size <= 0 {
            return Ok(());
        }

        let mut page = 1;
        loop {
            let query = self.get_query().clone().for_page(page, chunk_size);
            let chunk = self.get_query_results(query, conn).await?;
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

impl<M: Model, T: Relation<M>> RelationProxies<M> for T {}
