//! BelongsTo Relationship - the child model holds the foreign key

use std::collections::HashMap;

use async_trait::async_trait;

use crate::backends::{DatabaseConnection, DatabaseValue};
use crate::error::OrmResult;
use crate::model::Model;
use crate::query::{QueryBuilder, QueryOperator};

use super::compares_related_models::ComparesRelatedModels;
use super::container::RelationValue;
use super::default_models::{DefaultModel, SupportsDefaultModels};
use super::relation::{keys_of, self_join_alias, Cardinality, OneRelation, Relation, RelationCore, RelationshipType};

/// BelongsTo relationship - the child points at its owner through `foreign_key`
#[derive(Debug, Clone)]
pub struct BelongsTo<M: Model, R: Model> {
    core: RelationCore<M, R>,
    /// Foreign key column on the child
    foreign_key: String,
    /// Key on the owner the foreign key references
    owner_key: String,
    relation_name: String,
    default: DefaultModel,
}

impl<M: Model, R: Model> BelongsTo<M, R> {
    /// Create a new BelongsTo relationship for `child`
    pub fn new(
        related: R,
        child: &M,
        foreign_key: &str,
        owner_key: &str,
        relation_name: &str,
        constraints: bool,
    ) -> Self {
        Self {
            core: RelationCore::new(child, related),
            foreign_key: foreign_key.to_string(),
            owner_key: owner_key.to_string(),
            relation_name: relation_name.to_string(),
            default: DefaultModel::default(),
        }
        .init(constraints)
    }

    /// Associate `model` with `child`, setting the foreign key and caching the relation
    pub fn associate(&self, child: &mut M, model: &R) {
        let owner_key = model.get_attribute_value(&self.owner_key);
        child.set_attribute(&self.foreign_key, owner_key);
        child
            .base_mut()
            .relations
            .insert(self.relation_name.clone(), RelationValue::one(Some(model.clone())));
    }

    /// Associate by key only; the cached relation no longer applies and is unset
    pub fn associate_id<V: Into<DatabaseValue>>(&self, child: &mut M, id: V) {
        child.set_attribute(&self.foreign_key, id);
        child.base_mut().relations.remove(&self.relation_name);
    }

    /// Dissociate the owner from `child`
    pub fn dissociate(&self, child: &mut M) {
        child.set_attribute(&self.foreign_key, DatabaseValue::Null);
        child
            .base_mut()
            .relations
            .insert(self.relation_name.clone(), RelationValue::One(None));
    }

    /// Alias of [`BelongsTo::dissociate`]
    pub fn disassociate(&self, child: &mut M) {
        self.dissociate(child)
    }

    /// Snapshot of the child model
    pub fn get_child(&self) -> &M {
        &self.core.parent
    }

    pub fn get_foreign_key_name(&self) -> &str {
        &self.foreign_key
    }

    pub fn get_qualified_foreign_key_name(&self) -> String {
        self.core.parent.qualify_column(&self.foreign_key)
    }

    pub fn get_owner_key_name(&self) -> &str {
        &self.owner_key
    }

    pub fn get_qualified_owner_key_name(&self) -> String {
        self.core.related.qualify_column(&self.owner_key)
    }

    pub fn get_relation_name(&self) -> &str {
        &self.relation_name
    }
}

#[async_trait]
impl<M: Model, R: Model> Relation<M> for BelongsTo<M, R> {
    type Related = R;

    const KIND: RelationshipType = RelationshipType::BelongsTo;
    const CARDINALITY: Cardinality = Cardinality::One;

    fn core(&self) -> &RelationCore<M, R> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RelationCore<M, R> {
        &mut self.core
    }

    fn add_constraints(&mut self) {
        let owner_key = self.get_qualified_owner_key_name();
        let value = self.core.parent.get_attribute_value(&self.foreign_key);
        let query = std::mem::take(&mut self.core.query);
        self.core.query = query.where_eq(&owner_key, value);
    }

    fn add_eager_constraints(&mut self, models: &[M]) {
        let owner_key = self.get_qualified_owner_key_name();
        let keys = keys_of(models, &self.foreign_key);
        let query = std::mem::take(&mut self.core.query);
        self.core.query = query.where_in(&owner_key, keys);
    }

    fn init_relation(&self, models: &mut [M], relation: &str) {
        for model in models.iter_mut() {
            let value = RelationValue::one(self.get_default_for(model));
            model.base_mut().relations.insert(relation.to_string(), value);
        }
    }

    fn match_models(&self, models: &mut [M], results: Vec<R>, relation: &str) {
        let dictionary: HashMap<String, R> = results
            .into_iter()
            .filter_map(|result| {
                let key = result.get_attribute_value(&self.owner_key).as_key()?;
                Some((key, result))
            })
            .collect();

        for model in models.iter_mut() {
            let Some(key) = model.get_attribute_value(&self.foreign_key).as_key() else {
                continue;
            };
            if let Some(owner) = dictionary.get(&key) {
                model
                    .base_mut()
                    .relations
                    .insert(relation.to_string(), RelationValue::one(Some(owner.clone())));
            }
        }
    }

    async fn get_results(&self, conn: &dyn DatabaseConnection) -> OrmResult<RelationValue> {
        let child = &self.core.parent;

        if child.get_attribute_value(&self.foreign_key).is_null() {
            return Ok(RelationValue::one(self.get_default_for(child)));
        }

        let owner = self.core.query.clone().first(conn).await?;
        Ok(RelationValue::one(owner.or_else(|| self.get_default_for(child))))
    }

    fn relation_existence_query(&self, query: QueryBuilder<R>, outer: &QueryBuilder<M>) -> QueryBuilder<R> {
        let table = self.core.related.get_table();
        let foreign_key = outer.qualify_column(&self.foreign_key);

        if table == outer.get_table() {
            let alias = self_join_alias(&table, query.depth());
            let owner_key = format!("{}.{}", alias, self.owner_key);
            return query
                .from_as(&table, &alias)
                .where_column(&foreign_key, QueryOperator::Equal, &owner_key);
        }

        let owner_key = query.qualify_column(&self.owner_key);
        query.where_column(&foreign_key, QueryOperator::Equal, &owner_key)
    }
}

impl<M: Model, R: Model> OneRelation for BelongsTo<M, R> {}

impl<M: Model, R: Model> SupportsDefaultModels<M> for BelongsTo<M, R> {
    fn default_model(&self) -> &DefaultModel {
        &self.default
    }

    fn default_model_mut(&mut self) -> &mut DefaultModel {
        &mut self.default
    }

    fn new_related_instance_for(&self, _parent: &M) -> R {
        self.core.related.new_instance(Default::default(), false)
    }
}

impl<M: Model, R: Model> ComparesRelatedModels<M> for BelongsTo<M, R> {
    /// Foreign key value held by the child
    fn get_parent_key(&self) -> DatabaseValue {
        self.core.parent.get_attribute_value(&self.foreign_key)
    }

    fn get_related_key_name(&self) -> &str {
        &self.owner_key
    }
}
