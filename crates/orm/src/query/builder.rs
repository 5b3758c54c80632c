//! Query Builder - Core builder implementation

use std::marker::PhantomData;

use crate::relationships::eager_loading::EagerLoad;

use super::types::*;

/// Query builder for constructing database queries
///
/// `M` is the model the query hydrates; the untyped `QueryBuilder` (`M = ()`) is
/// what backends execute and what sub-queries are stored as.
#[derive(Debug)]
pub struct QueryBuilder<M = ()> {
    pub(crate) query_type: QueryType,
    pub(crate) columns: Vec<String>,
    pub(crate) aggregate: Option<Aggregate>,
    pub(crate) from_table: Option<String>,
    pub(crate) from_alias: Option<String>,
    pub(crate) set_clauses: Vec<SetClause>,
    pub(crate) insert_rows: Vec<Vec<SetClause>>,
    pub(crate) wheres: Vec<WhereClause>,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) orders: Vec<(String, OrderDirection)>,
    pub(crate) groups: Vec<String>,
    pub(crate) limit_count: Option<i64>,
    pub(crate) offset_value: Option<i64>,
    pub(crate) distinct: bool,
    /// Sub-query nesting depth, 0 for the outermost query
    pub(crate) depth: usize,
    pub(crate) eager_load: Vec<EagerLoad>,
    _phantom: PhantomData<fn() -> M>,
}

impl<M> Clone for QueryBuilder<M> {
    fn clone(&self) -> Self {
        Self {
            query_type: self.query_type,
            columns: self.columns.clone(),
            aggregate: self.aggregate.clone(),
            from_table: self.from_table.clone(),
            from_alias: self.from_alias.clone(),
            set_clauses: self.set_clauses.clone(),
            insert_rows: self.insert_rows.clone(),
            wheres: self.wheres.clone(),
            joins: self.joins.clone(),
            orders: self.orders.clone(),
            groups: self.groups.clone(),
            limit_count: self.limit_count,
            offset_value: self.offset_value,
            distinct: self.distinct,
            depth: self.depth,
            eager_load: self.eager_load.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<M> Default for QueryBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> QueryBuilder<M> {
    /// Create a new query builder
    pub fn new() -> Self {
        Self {
            query_type: QueryType::Select,
            columns: Vec::new(),
            aggregate: None,
            from_table: None,
            from_alias: None,
            set_clauses: Vec::new(),
            insert_rows: Vec::new(),
            wheres: Vec::new(),
            joins: Vec::new(),
            orders: Vec::new(),
            groups: Vec::new(),
            limit_count: None,
            offset_value: None,
            distinct: false,
            depth: 0,
            eager_load: Vec::new(),
            _phantom: PhantomData,
        }
    }

    /// Set the table the query selects from
    pub fn from(mut self, table: &str) -> Self {
        self.from_table = Some(table.to_string());
        self.from_alias = None;
        self
    }

    /// Select from `table` under an alias
    pub fn from_as(mut self, table: &str, alias: &str) -> Self {
        self.from_table = Some(table.to_string());
        self.from_alias = Some(alias.to_string());
        self
    }

    /// Table the query selects from
    pub fn get_table(&self) -> &str {
        self.from_table.as_deref().unwrap_or_default()
    }

    /// Alias of the from table, if any
    pub fn get_alias(&self) -> Option<&str> {
        self.from_alias.as_deref()
    }

    /// Name columns of the from table are qualified with (the alias when present)
    pub fn table_reference(&self) -> &str {
        self.from_alias.as_deref().unwrap_or_else(|| self.get_table())
    }

    /// Qualify a column with the table reference unless it already is
    pub fn qualify_column(&self, column: &str) -> String {
        if column.contains('.') {
            column.to_string()
        } else {
            format!("{}.{}", self.table_reference(), column)
        }
    }

    /// Where clauses added so far
    pub fn get_wheres(&self) -> &[WhereClause] {
        &self.wheres
    }

    /// Selected columns
    pub fn get_columns(&self) -> &[String] {
        &self.columns
    }

    /// Join clauses added so far
    pub fn get_joins(&self) -> &[JoinClause] {
        &self.joins
    }

    /// Sub-query nesting depth
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Place this query one level below `depth`
    pub(crate) fn nested_below(mut self, depth: usize) -> Self {
        self.depth = depth + 1;
        self
    }

    /// Append a where clause
    pub fn add_where(mut self, clause: WhereClause) -> Self {
        self.wheres.push(clause);
        self
    }

    /// Append where clauses taken from another query
    pub fn merge_wheres(mut self, wheres: &[WhereClause]) -> Self {
        self.wheres.extend(wheres.iter().cloned());
        self
    }

    /// AND the where clauses from `start` on as one unit
    ///
    /// Clauses joined with OR are wrapped in a parenthesized group so they cannot
    /// escape the conditions before `start`.
    pub(crate) fn group_wheres_from(mut self, start: usize) -> Self {
        let start = start.min(self.wheres.len());
        let mut group: Vec<WhereClause> = self.wheres.drain(start..).collect();
        let Some(first) = group.first_mut() else {
            return self;
        };
        *first = first.clone().with_boolean(Boolean::And);

        if group.iter().any(|clause| clause.boolean() == Boolean::Or) {
            let mut nested = QueryBuilder::new().from(self.get_table());
            nested.wheres = group;
            self.wheres.push(WhereClause::Nested {
                query: Box::new(nested),
                boolean: Boolean::And,
            });
        } else {
            self.wheres.extend(group);
        }
        self
    }

    /// Drop the first `count` where clauses
    pub(crate) fn remove_leading_wheres(&mut self, count: usize) {
        let count = count.min(self.wheres.len());
        self.wheres.drain(..count);
    }

    /// Re-type the query for another model, eager loads do not survive
    pub fn cast<N>(self) -> QueryBuilder<N> {
        QueryBuilder {
            query_type: self.query_type,
            columns: self.columns,
            aggregate: self.aggregate,
            from_table: self.from_table,
            from_alias: self.from_alias,
            set_clauses: self.set_clauses,
            insert_rows: self.insert_rows,
            wheres: self.wheres,
            joins: self.joins,
            orders: self.orders,
            groups: self.groups,
            limit_count: self.limit_count,
            offset_value: self.offset_value,
            distinct: self.distinct,
            depth: self.depth,
            eager_load: Vec::new(),
            _phantom: PhantomData,
        }
    }

    /// Untyped copy of this query as backends execute it
    pub fn to_base(&self) -> QueryBuilder {
        self.clone().cast()
    }

    /// Consume into the untyped query
    pub fn into_base(self) -> QueryBuilder {
        self.cast()
    }
}
