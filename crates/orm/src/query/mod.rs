//! Query Builder Module - Type-safe, fluent query builder for relation queries

pub mod builder;
pub mod dml;
pub mod execution;
pub mod joins;
pub mod ordering;
pub mod pagination;
pub mod select;
pub mod sql_generation;
pub mod types;
pub mod where_clause;

pub use builder::QueryBuilder;
pub use sql_generation::format_value;
pub use types::{
    Aggregate, AggregateFunction, Boolean, JoinClause, JoinType, OrderDirection, QueryOperator, QueryType,
    SetClause, WhereClause,
};
