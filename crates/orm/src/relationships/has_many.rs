//! HasMany Relationship - parent model has many related models

use async_trait::async_trait;

use crate::backends::DatabaseConnection;
use crate::error::OrmResult;
use crate::model::Model;
use crate::query::QueryBuilder;

use super::container::RelationValue;
use super::has_one_or_many::{HasOneOrMany, HasOneOrManyRelation};
use super::relation::{Cardinality, ManyRelation, Relation, RelationCore, RelationshipType};

/// HasMany relationship
#[derive(Debug, Clone)]
pub struct HasMany<M: Model, R: Model> {
    inner: HasOneOrMany<M, R>,
}

impl<M: Model, R: Model> HasMany<M, R> {
    /// Create a new HasMany relationship
    pub fn new(related: R, parent: &M, foreign_key: &str, local_key: &str, constraints: bool) -> Self {
        Self {
            inner: HasOneOrMany::new(related, parent, foreign_key, local_key),
        }
        .init(constraints)
    }

    pub fn get_foreign_key_name(&self) -> &str {
        self.inner.get_foreign_key_name()
    }

    pub fn get_qualified_foreign_key_name(&self) -> &str {
        self.inner.get_qualified_foreign_key_name()
    }

    pub fn get_local_key_name(&self) -> &str {
        self.inner.get_local_key_name()
    }
}

#[async_trait]
impl<M: Model, R: Model> Relation<M> for HasMany<M, R> {
    type Related = R;

    const KIND: RelationshipType = RelationshipType::HasMany;
    const CARDINALITY: Cardinality = Cardinality::Many;

    fn core(&self) -> &RelationCore<M, R> {
        &self.inner.core
    }

    fn core_mut(&mut self) -> &mut RelationCore<M, R> {
        &mut self.inner.core
    }

    fn add_constraints(&mut self) {
        self.inner.add_constraints();
    }

    fn add_eager_constraints(&mut self, models: &[M]) {
        self.inner.add_eager_constraints(models);
    }

    fn init_relation(&self, models: &mut [M], relation: &str) {
        for model in models.iter_mut() {
            model
                .base_mut()
                .relations
                .insert(relation.to_string(), RelationValue::Many(Vec::new()));
        }
    }

    fn match_models(&self, models: &mut [M], results: Vec<R>, relation: &str) {
        self.inner.match_one_or_many(models, results, relation, Cardinality::Many);
    }

    async fn get_results(&self, conn: &dyn DatabaseConnection) -> OrmResult<RelationValue> {
        if self.inner.get_parent_key().is_null() {
            return Ok(RelationValue::Many(Vec::new()));
        }

        let related = self.get_query_results(self.inner.core.query.clone(), conn).await?;
        Ok(RelationValue::many(related))
    }

    fn relation_existence_query(&self, query: QueryBuilder<R>, outer: &QueryBuilder<M>) -> QueryBuilder<R> {
        self.inner.existence_query(query, outer)
    }

    fn get_qualified_parent_key_name(&self) -> String {
        self.inner.get_qualified_parent_key_name()
    }
}

impl<M: Model, R: Model> HasOneOrManyRelation<M> for HasMany<M, R> {
    fn one_or_many(&self) -> &HasOneOrMany<M, R> {
        &self.inner
    }
}

impl<M: Model, R: Model> ManyRelation for HasMany<M, R> {}
