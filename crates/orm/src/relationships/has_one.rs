//! HasOne Relationship - parent model has at most one related model

use async_trait::async_trait;

use crate::backends::{attributes, DatabaseConnection, DatabaseValue};
use crate::error::OrmResult;
use crate::model::Model;
use crate::query::QueryBuilder;

use super::compares_related_models::ComparesRelatedModels;
use super::container::RelationValue;
use super::default_models::{DefaultModel, SupportsDefaultModels};
use super::has_one_or_many::{HasOneOrMany, HasOneOrManyRelation};
use super::relation::{Cardinality, OneRelation, Relation, RelationCore, RelationshipType};

/// HasOne relationship
#[derive(Debug, Clone)]
pub struct HasOne<M: Model, R: Model> {
    inner: HasOneOrMany<M, R>,
    default: DefaultModel,
}

impl<M: Model, R: Model> HasOne<M, R> {
    /// Create a new HasOne relationship
    pub fn new(related: R, parent: &M, foreign_key: &str, local_key: &str, constraints: bool) -> Self {
        Self {
            inner: HasOneOrMany::new(related, parent, foreign_key, local_key),
            default: DefaultModel::default(),
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
impl<M: Model, R: Model> Relation<M> for HasOne<M, R> {
    type Related = R;

    const KIND: RelationshipType = RelationshipType::HasOne;
    const CARDINALITY: Cardinality = Cardinality::One;

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
            let value = RelationValue::one(self.get_default_for(model));
            model.base_mut().relations.insert(relation.to_string(), value);
        }
    }

    fn match_models(&self, models: &mut [M], results: Vec<R>, relation: &str) {
        self.inner.match_one_or_many(models, results, relation, Cardinality::One);
    }

    async fn get_results(&self, conn: &dyn DatabaseConnection) -> OrmResult<RelationValue> {
        let parent = &self.inner.core.parent;

        if self.inner.get_parent_key().is_null() {
            return Ok(RelationValue::one(self.get_default_for(parent)));
        }

        let related = self.inner.core.query.clone().first(conn).await?;
        Ok(RelationValue::one(related.or_else(|| self.get_default_for(parent))))
    }

    fn relation_existence_query(&self, query: QueryBuilder<R>, outer: &QueryBuilder<M>) -> QueryBuilder<R> {
        self.inner.existence_query(query, outer)
    }

    fn get_qualified_parent_key_name(&self) -> String {
        self.inner.get_qualified_parent_key_name()
    }
}

impl<M: Model, R: Model> HasOneOrManyRelation<M> for HasOne<M, R> {
    fn one_or_many(&self) -> &HasOneOrMany<M, R> {
        &self.inner
    }
}

impl<M: Model, R: Model> OneRelation for HasOne<M, R> {}

impl<M: Model, R: Model> SupportsDefaultModels<M> for HasOne<M, R> {
    fn default_model(&self) -> &DefaultModel {
        &self.default
    }

    fn default_model_mut(&mut self) -> &mut DefaultModel {
        &mut self.default
    }

    fn new_related_instance_for(&self, parent: &M) -> R {
        let foreign_key = self.inner.get_foreign_key_name();
        let local_key = parent.get_attribute_value(self.inner.get_local_key_name());
        self.inner
            .core
            .related
            .new_instance(attributes([(foreign_key, local_key)]), false)
    }
}

impl<M: Model, R: Model> ComparesRelatedModels<M> for HasOne<M, R> {
    fn get_parent_key(&self) -> DatabaseValue {
        self.inner.get_parent_key()
    }

    fn get_related_key_name(&self) -> &str {
        self.inner.get_foreign_key_name()
    }
}
