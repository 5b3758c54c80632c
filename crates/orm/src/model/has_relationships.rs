//! Relationship support for models
//!
//! Relation factories used inside relation methods, the loaded relations
//! container, lazy and eager loading by name, touching owners, pushing and
//! serialization of loaded relations.

use std::future::Future;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use crate::backends::DatabaseConnection;
use crate::error::{ModelError, OrmResult, RelationFrom};
use crate::model::crud_operations::CrudOperations;
use crate::model::naming;
use crate::model::Model;
use crate::relationships::{
    BelongsTo, BelongsToMany, Cardinality, ExpectedRelated, HasMany, HasOne, Pivot, PivotKeys, PivotModel,
    RelationStore, RelationValue, Relations, StoreOutcome,
};

#[async_trait]
pub trait HasRelationships: Model {
    /// One-to-one relation, `foreign_key` on the related table defaults to `user_id` style
    fn has_one<R: Model>(&self, foreign_key: Option<&str>, local_key: Option<&str>) -> HasOne<Self, R> {
        let foreign_key = foreign_key
            .map(str::to_string)
            .unwrap_or_else(Self::get_foreign_key);
        let local_key = local_key.unwrap_or(Self::primary_key_name());

        HasOne::new(R::default(), self, &foreign_key, local_key, true)
    }

    /// One-to-many relation
    fn has_many<R: Model>(&self, foreign_key: Option<&str>, local_key: Option<&str>) -> HasMany<Self, R> {
        let foreign_key = foreign_key
            .map(str::to_string)
            .unwrap_or_else(Self::get_foreign_key);
        let local_key = local_key.unwrap_or(Self::primary_key_name());

        HasMany::new(R::default(), self, &foreign_key, local_key, true)
    }

    /// Inverse of a one-to-one or one-to-many relation
    ///
    /// Without `relation` the name is guessed from the related model (`user` for
    /// `User`) and has to be registered; the foreign key then defaults to
    /// `<relation>_<owner key>`.
    fn belongs_to<R: Model>(
        &self,
        foreign_key: Option<&str>,
        owner_key: Option<&str>,
        relation: Option<&str>,
    ) -> OrmResult<BelongsTo<Self, R>> {
        let relation = match relation {
            Some(relation) => relation.to_string(),
            None => {
                let guessed = naming::lcfirst(R::model_name());
                Self::validate_user_relation(&guessed, RelationFrom::BelongsTo)?;
                guessed
            }
        };

        let foreign_key = foreign_key
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}_{}", naming::snake_case(&relation), R::primary_key_name()));
        let owner_key = owner_key.unwrap_or(R::primary_key_name());

        Ok(BelongsTo::new(R::default(), self, &foreign_key, owner_key, &relation, true))
    }

    /// Many-to-many relation through the generic [`Pivot`]
    fn belongs_to_many<R: Model>(&self, keys: PivotKeys<'_>) -> OrmResult<BelongsToMany<Self, R>> {
        self.belongs_to_many_using::<R, Pivot>(keys)
    }

    /// Many-to-many relation hydrating pivots as `P`
    ///
    /// The pivot table defaults to both snake cased model names in alphabetical
    /// order, `role_user`; an unnamed relation is guessed as `roles` for `Role`.
    fn belongs_to_many_using<R: Model, P: PivotModel>(
        &self,
        keys: PivotKeys<'_>,
    ) -> OrmResult<BelongsToMany<Self, R, P>> {
        let relation = match keys.relation {
            Some(relation) => relation.to_string(),
            None => {
                let guessed = naming::pluralize(&naming::lcfirst(R::model_name()));
                Self::validate_user_relation(&guessed, RelationFrom::BelongsToMany)?;
                guessed
            }
        };

        let table = keys
            .table
            .map(str::to_string)
            .unwrap_or_else(|| naming::pivot_table_name(Self::model_name(), R::model_name()));
        let foreign_pivot_key = keys
            .foreign_pivot_key
            .map(str::to_string)
            .unwrap_or_else(Self::get_foreign_key);
        let related_pivot_key = keys
            .related_pivot_key
            .map(str::to_string)
            .unwrap_or_else(R::get_foreign_key);

        Ok(BelongsToMany::new(
            R::default(),
            self,
            &table,
            &foreign_pivot_key,
            &related_pivot_key,
            keys.parent_key.unwrap_or(Self::primary_key_name()),
            keys.related_key.unwrap_or(R::primary_key_name()),
            &relation,
            true,
        ))
    }

    /// Check that a guessed relation name is registered on the model
    fn validate_user_relation(name: &str, from: RelationFrom) -> OrmResult<()> {
        if Self::relations().contains(name) {
            Ok(())
        } else {
            Err(ModelError::relation_mapping_not_found(Self::model_name(), name, from))
        }
    }

    fn relation_loaded(&self, relation: &str) -> bool {
        self.base().relations.contains_key(relation)
    }

    fn get_relations(&self) -> &Relations {
        &self.base().relations
    }

    fn set_relation(&mut self, relation: &str, value: RelationValue) -> &mut Self {
        self.base_mut().relations.insert(relation.to_string(), value);
        self
    }

    fn set_relation_many<R: Model>(&mut self, relation: &str, models: Vec<R>) -> &mut Self {
        self.set_relation(relation, RelationValue::many(models))
    }

    fn set_relation_one<R: Model>(&mut self, relation: &str, model: Option<R>) -> &mut Self {
        self.set_relation(relation, RelationValue::one(model))
    }

    fn unset_relation(&mut self, relation: &str) -> &mut Self {
        self.base_mut().relations.remove(relation);
        self
    }

    fn unset_relations(&mut self) -> &mut Self {
        self.base_mut().relations.clear();
        self
    }

    /// Models of an already loaded to-many relation
    fn get_relation<R: Model>(&self, relation: &str) -> OrmResult<Vec<&R>> {
        self.base()
            .relations
            .get(relation)
            .ok_or_else(|| ModelError::relation_not_loaded(Self::model_name(), relation))?
            .downcast_many::<R>(relation)
    }

    /// Model of an already loaded to-one relation
    fn get_relation_one<R: Model>(&self, relation: &str) -> OrmResult<Option<&R>> {
        self.base()
            .relations
            .get(relation)
            .ok_or_else(|| ModelError::relation_not_loaded(Self::model_name(), relation))?
            .downcast_one::<R>(relation)
    }

    /// Query a relation by name and store the result, a loaded relation is kept
    async fn load_relation(&mut self, relation: &str, conn: &dyn DatabaseConnection) -> OrmResult<()> {
        if self.relation_loaded(relation) {
            return Ok(());
        }

        let entry = Self::relations().resolve(relation, RelationFrom::Undefined)?;
        tracing::debug!(model = Self::model_name(), relation, "Lazy loading relation");

        let outcome = entry
            .dispatch(relation, RelationStore::Lazy { parent: &*self }, conn)
            .await?;

        match outcome {
            StoreOutcome::Value(value) => {
                self.set_relation(relation, value);
                Ok(())
            }
            other => Err(ModelError::Runtime(format!(
                "Lazy loading the '{}' relation returned {:?}",
                relation, other
            ))),
        }
    }

    /// Models of a to-many relation, queried on first access
    fn get_relation_value<'a, R: Model>(
        &'a mut self,
        relation: &'a str,
        conn: &'a dyn DatabaseConnection,
    ) -> impl Future<Output = OrmResult<Vec<&'a R>>> + Send + 'a {
        async move {
            if !self.relation_loaded(relation) {
                Self::check_relation_type::<R>(relation, Cardinality::Many)?;
                self.load_relation(relation, conn).await?;
            }
            let this: &'a Self = self;
            this.get_relation::<R>(relation)
        }
    }

    /// Model of a to-one relation, queried on first access
    fn get_relation_value_one<'a, R: Model>(
        &'a mut self,
        relation: &'a str,
        conn: &'a dyn DatabaseConnection,
    ) -> impl Future<Output = OrmResult<Option<&'a R>>> + Send + 'a {
        async move {
            if !self.relation_loaded(relation) {
                Self::check_relation_type::<R>(relation, Cardinality::One)?;
                self.load_relation(relation, conn).await?;
            }
            let this: &'a Self = self;
            this.get_relation_one::<R>(relation)
        }
    }

    #[doc(hidden)]
    fn check_relation_type<R: Model>(relation: &str, cardinality: Cardinality) -> OrmResult<()> {
        let entry = Self::relations().resolve(relation, RelationFrom::Undefined)?;

        if entry.cardinality() != cardinality {
            let accessor = match entry.cardinality() {
                Cardinality::One => "get_relation_value_one",
                Cardinality::Many => "get_relation_value",
            };
            return Err(ModelError::InvalidTemplateArgument(format!(
                "The '{}' relation on the '{}' model is a {:?} relation, use {}::<{}>() instead",
                relation,
                Self::model_name(),
                entry.kind(),
                accessor,
                R::model_name()
            )));
        }

        let related = entry.related();
        if related != ExpectedRelated::of::<R>() {
            return Err(ModelError::InvalidTemplateArgument(format!(
                "The '{}' relation on the '{}' model yields '{}' models, not '{}'",
                relation,
                Self::model_name(),
                related.name,
                R::model_name()
            )));
        }
        Ok(())
    }

    /// Eager load relations onto this already retrieved model
    async fn load(&mut self, relations: &[&str], conn: &dyn DatabaseConnection) -> OrmResult<()> {
        let mut models = vec![self.clone()];
        Self::query()
            .with(relations)
            .eager_load_relations(&mut models, conn)
            .await?;

        if let Some(model) = models.pop() {
            *self = model;
        }
        Ok(())
    }

    /// Touch every relation of [`Model::get_touched_relations`], then their owners in turn
    async fn touch_owners(&mut self, conn: &dyn DatabaseConnection) -> OrmResult<()> {
        for relation in self.get_touched_relations() {
            let entry = Self::relations().resolve(&relation, RelationFrom::Undefined)?;
            entry
                .dispatch(&relation, RelationStore::TouchOwners { parent: &*self }, conn)
                .await?;

            self.load_relation(&relation, conn).await?;
            if let Some(value) = self.base_mut().relations.get_mut(&relation) {
                for model in value.models_mut() {
                    model.touch_owners_dyn(conn).await?;
                }
            }
        }
        Ok(())
    }

    /// Save the model and every loaded related model, pivots excluded
    async fn push(&mut self, conn: &dyn DatabaseConnection) -> OrmResult<bool> {
        if !self.save(conn).await? {
            return Ok(false);
        }

        for value in self.base_mut().relations.values_mut() {
            if value.is_pivot() {
                continue;
            }
            for model in value.models_mut() {
                if !model.push_dyn(conn).await? {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Loaded relations as JSON, honouring the visible and hidden lists
    fn relations_to_json(&self) -> Map<String, JsonValue> {
        self.base()
            .relations
            .iter()
            .filter(|(name, _)| is_serialized::<Self>(name))
            .map(|(name, value)| {
                let key = if Self::snake_attributes() {
                    naming::snake_case(name)
                } else {
                    name.clone()
                };
                (key, value.to_json())
            })
            .collect()
    }

    /// Attributes and loaded relations as a JSON object
    fn to_json(&self) -> JsonValue {
        let mut object: Map<String, JsonValue> = self
            .get_attributes()
            .iter()
            .filter(|(name, _)| is_serialized::<Self>(name))
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();

        object.extend(self.relations_to_json());
        JsonValue::Object(object)
    }
}

fn is_serialized<M: Model>(name: &str) -> bool {
    let visible = M::visible();
    (visible.is_empty() || visible.contains(&name)) && !M::hidden().contains(&name)
}

impl<T: Model> HasRelationships for T {}
