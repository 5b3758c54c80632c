//! Relation base - the contract every relationship type implements
//!
//! A relation owns a snapshot of its parent, a template instance of the related
//! model and a query scoped to the related table. Constructors take an explicit
//! `constraints` flag; [`Relation::without_constraints`] removes the where clauses
//! the constraints added, which is how eager loading and existence queries get an
//! unconstrained copy of a user declared relation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backends::{attributes, DatabaseConnection};
use crate::error::OrmResult;
use crate::model::Model;
use crate::query::QueryBuilder;

use super::container::RelationValue;

/// Kind of relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    /// One-to-one relationship (hasOne)
    HasOne,
    /// One-to-many relationship (hasMany)
    HasMany,
    /// Inverse of a one-to-one or one-to-many relationship (belongsTo)
    BelongsTo,
    /// Many-to-many relationship through a pivot table
    BelongsToMany,
}

impl RelationshipType {
    /// Returns true if this relationship returns a collection
    pub fn is_collection(self) -> bool {
        matches!(self, Self::HasMany | Self::BelongsToMany)
    }

    /// Returns true if this relationship requires a pivot table
    pub fn requires_pivot(self) -> bool {
        matches!(self, Self::BelongsToMany)
    }
}

/// How many related models a relation yields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    One,
    Many,
}

/// Relation yielding at most one model
pub trait OneRelation {}

/// Relation yielding a collection
pub trait ManyRelation {}

/// Relation whose models carry a pivot row
pub trait PivotRelation {}

/// State shared by every relation type
#[derive(Debug, Clone)]
pub struct RelationCore<M: Model, R: Model> {
    /// Snapshot of the parent, loaded relations stripped
    pub(crate) parent: M,
    /// Template instance of the related model
    pub(crate) related: R,
    /// Query scoped to the related table
    pub(crate) query: QueryBuilder<R>,
    /// Number of leading where clauses the constraints added
    pub(crate) constraint_wheres: usize,
}

impl<M: Model, R: Model> RelationCore<M, R> {
    pub(crate) fn new(parent: &M, related: R) -> Self {
        let mut parent = parent.clone();
        parent.base_mut().relations.clear();

        Self {
            query: related.new_query(),
            parent,
            related,
            constraint_wheres: 0,
        }
    }
}

/// Alias of the related table when a relation queries its own table
pub(crate) fn self_join_alias(table: &str, depth: usize) -> String {
    format!("{}_self_{}", table, depth)
}

/// Core relationship trait
#[async_trait]
pub trait Relation<M: Model>: Send + Sync + Sized + 'static {
    type Related: Model;

    const KIND: RelationshipType;
    const CARDINALITY: Cardinality;

    fn core(&self) -> &RelationCore<M, Self::Related>;

    fn core_mut(&mut self) -> &mut RelationCore<M, Self::Related>;

    /// Set the base constraints on the relation query
    fn add_constraints(&mut self);

    /// Set the constraints for an eager load of the relation
    fn add_eager_constraints(&mut self, models: &[M]);

    /// Initialize the relation on a set of models
    fn init_relation(&self, models: &mut [M], relation: &str);

    /// Match the eagerly loaded results to their parents
    fn match_models(&self, models: &mut [M], results: Vec<Self::Related>, relation: &str);

    /// Get the results of the relationship for the parent snapshot
    async fn get_results(&self, conn: &dyn DatabaseConnection) -> OrmResult<RelationValue>;

    /// Add the constraints for a relationship existence query
    fn relation_existence_query(
        &self,
        query: QueryBuilder<Self::Related>,
        outer: &QueryBuilder<M>,
    ) -> QueryBuilder<Self::Related>;

    /// Run the constraints once, remembering how many where clauses they added
    fn init(mut self, constraints: bool) -> Self {
        if constraints {
            let before = self.core().query.wheres.len();
            self.add_constraints();
            let added = self.core().query.wheres.len() - before;
            self.core_mut().constraint_wheres = added;
        }
        self
    }

    /// Drop the where clauses added by the base constraints
    fn without_constraints(mut self) -> Self {
        let count = self.core().constraint_wheres;
        let core = self.core_mut();
        core.query.remove_leading_wheres(count);
        core.constraint_wheres = 0;
        self
    }

    /// Execute `query` and hydrate the related models
    async fn get_query_results(
        &self,
        query: QueryBuilder<Self::Related>,
        conn: &dyn DatabaseConnection,
    ) -> OrmResult<Vec<Self::Related>> {
        query.get(conn).await
    }

    /// Get the relationship for eager loading
    async fn get_eager(&self, conn: &dyn DatabaseConnection) -> OrmResult<Vec<Self::Related>> {
        self.get_query_results(self.core().query.clone(), conn).await
    }

    /// Existence query selecting the related count
    fn relation_existence_count_query(
        &self,
        query: QueryBuilder<Self::Related>,
        outer: &QueryBuilder<M>,
    ) -> QueryBuilder<Self::Related> {
        self.relation_existence_query(query, outer).select_count()
    }

    /// Touch all of the related models for the relationship
    async fn touch(&self, conn: &dyn DatabaseConnection) -> OrmResult<u64> {
        if !Self::Related::uses_timestamps() {
            return Ok(0);
        }

        let values = attributes([(
            Self::Related::updated_at_column(),
            Self::Related::fresh_timestamp(),
        )]);
        self.core().query.clone().update(values, conn).await
    }

    /// The underlying query for the relation
    fn get_query(&self) -> &QueryBuilder<Self::Related> {
        &self.core().query
    }

    /// Untyped copy of the relation query
    fn get_base_query(&self) -> QueryBuilder {
        self.core().query.to_base()
    }

    fn get_parent(&self) -> &M {
        &self.core().parent
    }

    fn get_related(&self) -> &Self::Related {
        &self.core().related
    }

    /// Primary key of the parent qualified with its table
    fn get_qualified_parent_key_name(&self) -> String {
        self.core().parent.get_qualified_key_name()
    }
}

/// Collect the sorted, unique, non-null values of `key` across `models`
pub(crate) fn keys_of<M: Model>(models: &[M], key: &str) -> Vec<crate::backends::DatabaseValue> {
    let mut keys: Vec<_> = models
        .iter()
        .map(|model| model.get_attribute_value(key))
        .filter(|value| value.as_key().is_some())
        .collect();

    keys.sort_by(|a, b| a.compare(b).unwrap_or(std::cmp::Ordering::Equal));
    keys.dedup_by(|a, b| a.as_key() == b.as_key());
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_type_predicates() {
        assert!(RelationshipType::HasMany.is_collection());
        assert!(RelationshipType::BelongsToMany.is_collection());
        assert!(!RelationshipType::BelongsTo.is_collection());
        assert!(RelationshipType::BelongsToMany.requires_pivot());
        assert!(!RelationshipType::HasOne.requires_pivot());
    }

    #[test]
    fn test_self_join_alias_uses_depth() {
        assert_eq!(self_join_alias("categories", 1), "categories_self_1");
        assert_eq!(self_join_alias("categories", 2), "categories_self_2");
    }
}
