//! HasOneOrMany - shared implementation of HasOne and HasMany
//!
//! The related model holds the foreign key pointing at the parent's local key.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::backends::{Attributes, DatabaseConnection, DatabaseValue};
use crate::error::OrmResult;
use crate::model::{CrudOperations, Model};
use crate::query::{QueryBuilder, QueryOperator};

use super::container::RelationValue;
use super::relation::{keys_of, self_join_alias, Cardinality, Relation, RelationCore};

/// State and behaviour shared by HasOne and HasMany
#[derive(Debug, Clone)]
pub struct HasOneOrMany<M: Model, R: Model> {
    pub(crate) core: RelationCore<M, R>,
    /// Foreign key on the related model, qualified with its table
    foreign_key: String,
    /// Key on the parent the foreign key references
    local_key: String,
}

impl<M: Model, R: Model> HasOneOrMany<M, R> {
    pub(crate) fn new(related: R, parent: &M, foreign_key: &str, local_key: &str) -> Self {
        let foreign_key = related.qualify_column(foreign_key);
        Self {
            core: RelationCore::new(parent, related),
            foreign_key,
            local_key: local_key.to_string(),
        }
    }

    pub(crate) fn add_constraints(&mut self) {
        let value = self.get_parent_key();
        let query = std::mem::take(&mut self.core.query);
        self.core.query = query
            .where_eq(&self.foreign_key, value)
            .where_not_null(&self.foreign_key);
    }

    pub(crate) fn add_eager_constraints(&mut self, models: &[M]) {
        let keys = keys_of(models, &self.local_key);
        let query = std::mem::take(&mut self.core.query);
        self.core.query = query.where_in(&self.foreign_key, keys);
    }

    /// Group the results by their foreign key
    fn build_dictionary(&self, results: Vec<R>, relation: &str, cardinality: Cardinality) -> HashMap<String, Vec<R>> {
        let foreign_key = self.get_foreign_key_name();
        let mut dictionary: HashMap<String, Vec<R>> = HashMap::new();

        for result in results {
            let Some(key) = result.get_attribute_value(foreign_key).as_key() else {
                continue;
            };
            let bucket = dictionary.entry(key.clone()).or_default();

            // to-one keeps the first row in query order
            if cardinality == Cardinality::One && !bucket.is_empty() {
                tracing::warn!(
                    relation = relation,
                    related = R::model_name(),
                    key = %key,
                    "Multiple rows matched a has-one relation, keeping the first one"
                );
                continue;
            }
            bucket.push(result);
        }

        dictionary
    }

    /// Match the eagerly loaded results to their parents
    pub(crate) fn match_one_or_many(
        &self,
        models: &mut [M],
        results: Vec<R>,
        relation: &str,
        cardinality: Cardinality,
    ) {
        let dictionary = self.build_dictionary(results, relation, cardinality);

        for model in models.iter_mut() {
            let Some(key) = model.get_attribute_value(&self.local_key).as_key() else {
                continue;
            };
            let Some(bucket) = dictionary.get(&key) else {
                continue;
            };

            let value = match cardinality {
                Cardinality::One => RelationValue::one(bucket.first().cloned()),
                Cardinality::Many => RelationValue::many(bucket.clone()),
            };
            model.base_mut().relations.insert(relation.to_string(), value);
        }
    }

    pub(crate) fn existence_query(&self, query: QueryBuilder<R>, outer: &QueryBuilder<M>) -> QueryBuilder<R> {
        let table = self.core.related.get_table();
        let parent_key = outer.qualify_column(&self.local_key);

        if table == outer.get_table() {
            let alias = self_join_alias(&table, query.depth());
            let foreign_key = format!("{}.{}", alias, self.get_foreign_key_name());
            return query
                .from_as(&table, &alias)
                .where_column(&parent_key, QueryOperator::Equal, &foreign_key);
        }

        query.where_column(&parent_key, QueryOperator::Equal, &self.foreign_key)
    }

    /// Set the foreign key on a model about to be created
    pub fn set_foreign_attributes_for_create(&self, model: &mut R) {
        model.set_attribute(self.get_foreign_key_name(), self.get_parent_key());
    }

    /// Foreign key column name without the table
    pub fn get_foreign_key_name(&self) -> &str {
        self.foreign_key.rsplit('.').next().unwrap_or(&self.foreign_key)
    }

    pub fn get_qualified_foreign_key_name(&self) -> &str {
        &self.foreign_key
    }

    pub fn get_local_key_name(&self) -> &str {
        &self.local_key
    }

    /// Value of the local key on the parent
    pub fn get_parent_key(&self) -> DatabaseValue {
        self.core.parent.get_attribute_value(&self.local_key)
    }

    pub fn get_qualified_parent_key_name(&self) -> String {
        self.core.parent.qualify_column(&self.local_key)
    }
}

/// Create and save helpers of HasOne and HasMany
#[async_trait]
pub trait HasOneOrManyRelation<M: Model>: Relation<M> {
    fn one_or_many(&self) -> &HasOneOrMany<M, Self::Related>;

    /// New unsaved related model with the foreign key set
    fn make(&self, attributes: Attributes) -> Self::Related {
        let inner = self.one_or_many();
        let mut instance = inner.core.related.new_instance(Attributes::new(), false);
        instance.fill(attributes);
        inner.set_foreign_attributes_for_create(&mut instance);
        instance
    }

    /// Attach `model` to the parent and save it
    async fn save(&self, model: &mut Self::Related, conn: &dyn DatabaseConnection) -> OrmResult<bool> {
        self.one_or_many().set_foreign_attributes_for_create(model);
        model.save(conn).await
    }

    /// Attach a collection of models to the parent and save them
    async fn save_many(&self, models: &mut [Self::Related], conn: &dyn DatabaseConnection) -> OrmResult<()> {
        for model in models.iter_mut() {
            self.save(model, conn).await?;
        }
        Ok(())
    }

    /// Create a new related model for the parent
    async fn create(&self, attributes: Attributes, conn: &dyn DatabaseConnection) -> OrmResult<Self::Related> {
        let mut instance = self.make(attributes);
        instance.save(conn).await?;
        Ok(instance)
    }

    /// Create several related models for the parent
    async fn create_many(
        &self,
        records: Vec<Attributes>,
        conn: &dyn DatabaseConnection,
    ) -> OrmResult<Vec<Self::Related>> {
        let mut instances = Vec::with_capacity(records.len());
        for attributes in records {
            instances.push(self.create(attributes, conn).await?);
        }
        Ok(instances)
    }

    /// Find a related model by its primary key or make a new one
    async fn find_or_new<V>(&self, id: V, conn: &dyn DatabaseConnection) -> OrmResult<Self::Related>
    where
        V: Into<DatabaseValue> + Send,
    {
        let found = self.core().query.clone().find(id, conn).await?;
        Ok(match found {
            Some(model) => model,
            None => self.make(Attributes::new()),
        })
    }

    /// First related model matching `attributes` or a new one filled with both maps
    async fn first_or_new(
        &self,
        attributes: Attributes,
        values: Attributes,
        conn: &dyn DatabaseConnection,
    ) -> OrmResult<Self::Related> {
        let found = self
            .core()
            .query
            .clone()
            .where_attributes(&attributes)
            .first(conn)
            .await?;

        Ok(match found {
            Some(model) => model,
            None => {
                let mut merged = attributes;
                merged.extend(values);
                self.make(merged)
            }
        })
    }

    /// First related model matching `attributes` or a newly created one
    async fn first_or_create(
        &self,
        attributes: Attributes,
        values: Attributes,
        conn: &dyn DatabaseConnection,
    ) -> OrmResult<Self::Related> {
        let found = self
            .core()
            .query
            .clone()
            .where_attributes(&attributes)
            .first(conn)
            .await?;

        match found {
            Some(model) => Ok(model),
            None => {
                let mut merged = attributes;
                merged.extend(values);
                self.create(merged, conn).await
            }
        }
    }

    /// Update the first related model matching `attributes` or create it
    async fn update_or_create(
        &self,
        attributes: Attributes,
        values: Attributes,
        conn: &dyn DatabaseConnection,
    ) -> OrmResult<Self::Related> {
        let mut instance = self.first_or_new(attributes, Attributes::new(), conn).await?;
        instance.fill(values);
        instance.save(conn).await?;
        Ok(instance)
    }
}
