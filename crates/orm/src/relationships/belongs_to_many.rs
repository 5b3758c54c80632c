//! BelongsToMany Relationship - many-to-many through a pivot table
//!
//! Related rows are selected together with the pivot columns, aliased
//! `pivot_<column>`. Hydration moves those columns into a pivot model stored
//! on each related model under the relation's accessor (`pivot` by default).

use std::collections::HashMap;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::backends::{attributes, Attributes, DatabaseConnection};
use crate::error::OrmResult;
use crate::model::{Model, ModelBase};
use crate::query::{QueryBuilder, QueryOperator};

use super::container::RelationValue;
use super::pivot::{Pivot, PivotModel};
use super::relation::{
    keys_of, self_join_alias, Cardinality, ManyRelation, PivotRelation, Relation, RelationCore,
    RelationshipType,
};

/// Prefix of the pivot columns in the selected rows
const PIVOT_PREFIX: &str = "pivot_";

/// Table and key names of a many-to-many relation, unset ones follow the naming conventions
#[derive(Debug, Clone, Copy, Default)]
pub struct PivotKeys<'a> {
    pub table: Option<&'a str>,
    pub foreign_pivot_key: Option<&'a str>,
    pub related_pivot_key: Option<&'a str>,
    pub parent_key: Option<&'a str>,
    pub related_key: Option<&'a str>,
    pub relation: Option<&'a str>,
}

impl<'a> PivotKeys<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: &'a str) -> Self {
        self.table = Some(table);
        self
    }

    pub fn foreign_pivot_key(mut self, key: &'a str) -> Self {
        self.foreign_pivot_key = Some(key);
        self
    }

    pub fn related_pivot_key(mut self, key: &'a str) -> Self {
        self.related_pivot_key = Some(key);
        self
    }

    pub fn parent_key(mut self, key: &'a str) -> Self {
        self.parent_key = Some(key);
        self
    }

    pub fn related_key(mut self, key: &'a str) -> Self {
        self.related_key = Some(key);
        self
    }

    /// Relation name, skips guessing it from the related model
    pub fn relation(mut self, relation: &'a str) -> Self {
        self.relation = Some(relation);
        self
    }
}

/// BelongsToMany relationship
#[derive(Debug, Clone)]
pub struct BelongsToMany<M: Model, R: Model, P: PivotModel = Pivot> {
    core: RelationCore<M, R>,
    /// Intermediate table
    table: String,
    /// Pivot column referencing the parent
    foreign_pivot_key: String,
    /// Pivot column referencing the related model
    related_pivot_key: String,
    /// Key on the parent
    parent_key: String,
    /// Key on the related model
    related_key: String,
    relation_name: String,
    /// Name the pivot is stored under on each related model
    accessor: String,
    /// Extra pivot columns selected with the related rows
    pivot_columns: Vec<String>,
    with_timestamps: bool,
    pivot_created_at: String,
    pivot_updated_at: String,
    _pivot: PhantomData<fn() -> P>,
}

impl<M: Model, R: Model, P: PivotModel> BelongsToMany<M, R, P> {
    /// Create a new BelongsToMany relationship
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        related: R,
        parent: &M,
        table: &str,
        foreign_pivot_key: &str,
        related_pivot_key: &str,
        parent_key: &str,
        related_key: &str,
        relation_name: &str,
        constraints: bool,
    ) -> Self {
        let mut relation = Self {
            core: RelationCore::new(parent, related),
            table: Self::resolve_table_name(table),
            foreign_pivot_key: foreign_pivot_key.to_string(),
            related_pivot_key: related_pivot_key.to_string(),
            parent_key: parent_key.to_string(),
            related_key: related_key.to_string(),
            relation_name: relation_name.to_string(),
            accessor: "pivot".to_string(),
            pivot_columns: Vec::new(),
            with_timestamps: false,
            pivot_created_at: M::created_at_column().to_string(),
            pivot_updated_at: M::updated_at_column().to_string(),
            _pivot: PhantomData,
        };

        // The join is part of every query, constrained or not
        let query = std::mem::take(&mut relation.core.query);
        relation.core.query = relation.perform_join(query);
        relation.init(constraints)
    }

    /// A custom pivot type's own table wins over the given one
    fn resolve_table_name(table: &str) -> String {
        P::pivot_table().unwrap_or(table).to_string()
    }

    /// Join the pivot table to the related table
    pub(crate) fn perform_join(&self, query: QueryBuilder<R>) -> QueryBuilder<R> {
        let related_key = query.qualify_column(&self.related_key);
        let related_pivot_key = self.get_qualified_related_pivot_key_name();
        query.join(&self.table, &related_key, &related_pivot_key)
    }

    /// Select the related columns plus the aliased pivot columns
    pub(crate) fn should_select(&self, query: QueryBuilder<R>) -> QueryBuilder<R> {
        let mut columns: Vec<String> = if query.get_columns().is_empty() {
            vec![format!("{}.*", query.table_reference())]
        } else {
            query.get_columns().to_vec()
        };
        columns.extend(self.aliased_pivot_columns());

        let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
        query.select(&columns)
    }

    fn aliased_pivot_columns(&self) -> Vec<String> {
        let mut names = vec![self.foreign_pivot_key.clone(), self.related_pivot_key.clone()];
        for column in &self.pivot_columns {
            if !names.contains(column) {
                names.push(column.clone());
            }
        }

        names
            .iter()
            .map(|column| format!("{}.{} as {}{}", self.table, column, PIVOT_PREFIX, column))
            .collect()
    }

    /// Move the `pivot_` attributes of each model into its pivot relation
    pub(crate) fn hydrate_pivot_relation(&self, models: &mut [R]) {
        for model in models.iter_mut() {
            let pivot_keys: Vec<String> = model
                .get_attributes()
                .keys()
                .filter(|key| key.starts_with(PIVOT_PREFIX))
                .cloned()
                .collect();

            let mut values = Attributes::new();
            for key in pivot_keys {
                if let Some(value) = model.base_mut().attributes.remove(&key) {
                    values.insert(key[PIVOT_PREFIX.len()..].to_string(), value);
                }
            }
            model.sync_original();

            let pivot = self.new_existing_pivot(values);
            model
                .base_mut()
                .relations
                .insert(self.accessor.clone(), RelationValue::pivot(pivot));
        }
    }

    /// Pivot hydrated on a related model
    pub fn pivot_of<'a>(&self, model: &'a R) -> Option<&'a P> {
        match model.base().relations.get(&self.accessor) {
            Some(RelationValue::Pivot(pivot)) => pivot.as_any().downcast_ref::<P>(),
            _ => None,
        }
    }

    /// Create a new pivot model instance
    pub fn new_pivot(&self, attributes: Attributes, exists: bool) -> P {
        let mut pivot = P::default();
        *pivot.base_mut() = ModelBase::from_attributes(attributes, exists);
        pivot.base_mut().table = Some(self.table.clone());
        pivot
    }

    /// Create a new existing pivot model instance
    pub fn new_existing_pivot(&self, attributes: Attributes) -> P {
        self.new_pivot(attributes, true)
    }

    /// Select extra columns of the pivot table
    pub fn with_pivot(mut self, columns: &[&str]) -> Self {
        for column in columns {
            if !self.pivot_columns.iter().any(|existing| existing == column) {
                self.pivot_columns.push(column.to_string());
            }
        }
        self
    }

    /// Maintain created_at and updated_at on the pivot table
    pub fn with_timestamps(self) -> Self {
        let created_at = self.pivot_created_at.clone();
        let updated_at = self.pivot_updated_at.clone();
        self.with_timestamps_using(&created_at, &updated_at)
    }

    /// Maintain pivot timestamps stored in custom columns
    pub fn with_timestamps_using(mut self, created_at: &str, updated_at: &str) -> Self {
        self.with_timestamps = true;
        self.pivot_created_at = created_at.to_string();
        self.pivot_updated_at = updated_at.to_string();
        self.with_pivot(&[created_at, updated_at])
    }

    /// Store the pivot under another name
    pub fn as_accessor(mut self, accessor: &str) -> Self {
        self.accessor = accessor.to_string();
        self
    }

    pub fn get_table(&self) -> &str {
        &self.table
    }

    pub fn get_foreign_pivot_key_name(&self) -> &str {
        &self.foreign_pivot_key
    }

    pub fn get_qualified_foreign_pivot_key_name(&self) -> String {
        format!("{}.{}", self.table, self.foreign_pivot_key)
    }

    pub fn get_related_pivot_key_name(&self) -> &str {
        &self.related_pivot_key
    }

    pub fn get_qualified_related_pivot_key_name(&self) -> String {
        format!("{}.{}", self.table, self.related_pivot_key)
    }

    pub fn get_parent_key_name(&self) -> &str {
        &self.parent_key
    }

    pub fn get_related_key_name(&self) -> &str {
        &self.related_key
    }

    pub fn get_qualified_related_key_name(&self) -> String {
        self.core.related.qualify_column(&self.related_key)
    }

    pub fn get_relation_name(&self) -> &str {
        &self.relation_name
    }

    pub fn get_pivot_accessor(&self) -> &str {
        &self.accessor
    }

    pub fn get_pivot_columns(&self) -> &[String] {
        &self.pivot_columns
    }

    /// Whether `column` was selected through [`with_pivot`](Self::with_pivot) or the timestamps
    pub fn has_pivot_column(&self, column: &str) -> bool {
        self.pivot_columns.iter().any(|existing| existing == column)
    }

    pub(crate) fn uses_timestamps(&self) -> bool {
        self.with_timestamps
    }

    pub(crate) fn created_at(&self) -> &str {
        &self.pivot_created_at
    }

    pub(crate) fn updated_at(&self) -> &str {
        &self.pivot_updated_at
    }
}

#[async_trait]
impl<M: Model, R: Model, P: PivotModel> Relation<M> for BelongsToMany<M, R, P> {
    type Related = R;

    const KIND: RelationshipType = RelationshipType::BelongsToMany;
    const CARDINALITY: Cardinality = Cardinality::Many;

    fn core(&self) -> &RelationCore<M, R> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RelationCore<M, R> {
        &mut self.core
    }

    fn add_constraints(&mut self) {
        let foreign_pivot_key = self.get_qualified_foreign_pivot_key_name();
        let value = self.core.parent.get_attribute_value(&self.parent_key);
        let query = std::mem::take(&mut self.core.query);
        self.core.query = query.where_eq(&foreign_pivot_key, value);
    }

    fn add_eager_constraints(&mut self, models: &[M]) {
        let foreign_pivot_key = self.get_qualified_foreign_pivot_key_name();
        let keys = keys_of(models, &self.parent_key);
        let query = std::mem::take(&mut self.core.query);
        self.core.query = query.where_in(&foreign_pivot_key, keys);
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
        let mut dictionary: HashMap<String, Vec<R>> = HashMap::new();

        for result in results {
            let key = self
                .pivot_of(&result)
                .and_then(|pivot| pivot.get_attribute_value(&self.foreign_pivot_key).as_key());
            if let Some(key) = key {
                dictionary.entry(key).or_default().push(result);
            }
        }

        for model in models.iter_mut() {
            let Some(key) = model.get_attribute_value(&self.parent_key).as_key() else {
                continue;
            };
            if let Some(bucket) = dictionary.get(&key) {
                model
                    .base_mut()
                    .relations
                    .insert(relation.to_string(), RelationValue::many(bucket.clone()));
            }
        }
    }

    async fn get_results(&self, conn: &dyn DatabaseConnection) -> OrmResult<RelationValue> {
        if self.core.parent.get_attribute_value(&self.parent_key).is_null() {
            return Ok(RelationValue::Many(Vec::new()));
        }

        let related = self.get_query_results(self.core.query.clone(), conn).await?;
        Ok(RelationValue::many(related))
    }

    async fn get_query_results(
        &self,
        query: QueryBuilder<R>,
        conn: &dyn DatabaseConnection,
    ) -> OrmResult<Vec<R>> {
        let query = self.should_select(query);
        let mut models = query.clone().get_models(conn).await?;

        self.hydrate_pivot_relation(&mut models);

        if !models.is_empty() {
            query.eager_load_relations(&mut models, conn).await?;
        }

        Ok(models)
    }

    fn relation_existence_query(&self, query: QueryBuilder<R>, outer: &QueryBuilder<M>) -> QueryBuilder<R> {
        let table = self.core.related.get_table();

        let query = if table == outer.get_table() {
            let alias = self_join_alias(&table, query.depth());
            query.from_as(&table, &alias)
        } else {
            query
        };

        let parent_key = outer.qualify_column(&self.parent_key);
        let foreign_pivot_key = self.get_qualified_foreign_pivot_key_name();
        self.perform_join(query)
            .where_column(&parent_key, QueryOperator::Equal, &foreign_pivot_key)
    }

    /// Touch every related model through the current pivot rows
    async fn touch(&self, conn: &dyn DatabaseConnection) -> OrmResult<u64> {
        if !R::uses_timestamps() {
            return Ok(0);
        }

        let ids = self.all_related_ids(conn).await?;
        if ids.is_empty() {
            return Ok(0);
        }

        let values = attributes([(R::updated_at_column(), R::fresh_timestamp())]);
        self.core
            .related
            .new_query()
            .where_in(&self.related_key, ids)
            .update(values, conn)
            .await
    }

    fn get_qualified_parent_key_name(&self) -> String {
        self.core.parent.qualify_column(&self.parent_key)
    }
}

impl<M: Model, R: Model, P: PivotModel> ManyRelation for BelongsToMany<M, R, P> {}

impl<M: Model, R: Model, P: PivotModel> PivotRelation for BelongsToMany<M, R, P> {}
