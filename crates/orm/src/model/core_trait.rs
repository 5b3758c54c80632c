//! Core Model Trait - Base definition for database entities
//!
//! Defines the fundamental Model trait with table metadata, primary key handling,
//! timestamp configuration, attribute storage and the serialization contract.

use std::fmt::Debug;

use chrono::Utc;

use crate::backends::{Attributes, DatabaseValue};
use crate::model::naming;
use crate::query::QueryBuilder;
use crate::relationships::container::Relations;
use crate::relationships::registry::RelationRegistry;

/// Per-instance state every model carries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelBase {
    /// Current attribute values
    pub attributes: Attributes,
    /// Attribute values as last synced with the database
    pub original: Attributes,
    /// Whether the row exists in the database
    pub exists: bool,
    /// Table override for models whose table is only known at runtime (pivots)
    pub table: Option<String>,
    /// Loaded relationships keyed by relation name
    pub relations: Relations,
    /// Instance override of [`Model::touches`]
    pub touched_relations: Option<Vec<String>>,
}

impl ModelBase {
    /// Base for a model hydrated from `attributes`
    pub fn from_attributes(attributes: Attributes, exists: bool) -> Self {
        Self {
            original: if exists { attributes.clone() } else { Attributes::new() },
            attributes,
            exists,
            table: None,
            relations: Relations::new(),
            touched_relations: None,
        }
    }
}

/// Core trait for database models with standard ORM operations
pub trait Model: Clone + Debug + Default + PartialEq + Send + Sync + 'static {
    /// Table name for this model
    fn table_name() -> &'static str;

    /// Primary key field name
    fn primary_key_name() -> &'static str {
        "id"
    }

    /// Shared model state
    fn base(&self) -> &ModelBase;

    /// Shared model state, mutable
    fn base_mut(&mut self) -> &mut ModelBase;

    /// Relations this model type declares
    fn relations() -> &'static RelationRegistry<Self>;

    /// Relation names whose owners are touched when this model is touched
    fn touches() -> &'static [&'static str] {
        &[]
    }

    /// Relations this instance touches, [`Model::touches`] unless overridden
    fn get_touched_relations(&self) -> Vec<String> {
        match &self.base().touched_relations {
            Some(relations) => relations.clone(),
            None => Self::touches().iter().map(|relation| relation.to_string()).collect(),
        }
    }

    fn touches_relation(&self, relation: &str) -> bool {
        match &self.base().touched_relations {
            Some(relations) => relations.iter().any(|touched| touched == relation),
            None => Self::touches().contains(&relation),
        }
    }

    /// Replace the relations this instance touches
    fn set_touched_relations<I, S>(&mut self, relations: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base_mut().touched_relations = Some(relations.into_iter().map(Into::into).collect());
        self
    }

    /// Touch `relation` as well when this instance is touched
    fn add_touch(&mut self, relation: &str) -> &mut Self {
        let mut relations = self.get_touched_relations();
        if !relations.iter().any(|touched| touched == relation) {
            relations.push(relation.to_string());
        }
        self.base_mut().touched_relations = Some(relations);
        self
    }

    /// Stop touching any relation from this instance
    fn clear_touches(&mut self) -> &mut Self {
        self.base_mut().touched_relations = Some(Vec::new());
        self
    }

    /// Attributes and relations included in serialization, empty means all
    fn visible() -> &'static [&'static str] {
        &[]
    }

    /// Attributes and relations excluded from serialization
    fn hidden() -> &'static [&'static str] {
        &[]
    }

    /// Attributes `fill` accepts, empty means all
    fn fillable() -> &'static [&'static str] {
        &[]
    }

    /// Serialize relation names in snake_case
    fn snake_attributes() -> bool {
        true
    }

    /// Check if this model uses timestamps (created_at, updated_at)
    fn uses_timestamps() -> bool {
        false
    }

    fn created_at_column() -> &'static str {
        "created_at"
    }

    fn updated_at_column() -> &'static str {
        "updated_at"
    }

    /// Short type name, `User` for `app::models::User`
    fn model_name() -> &'static str {
        naming::class_basename(std::any::type_name::<Self>())
    }

    /// Default foreign key other models use to point at this one, `user_id`
    fn get_foreign_key() -> String {
        format!("{}_{}", naming::snake_case(Self::model_name()), Self::primary_key_name())
    }

    /// Table of this instance, honours a runtime override
    fn get_table(&self) -> String {
        self.base()
            .table
            .clone()
            .unwrap_or_else(|| Self::table_name().to_string())
    }

    /// Qualify a column with this model's table unless it already is
    fn qualify_column(&self, column: &str) -> String {
        if column.contains('.') {
            column.to_string()
        } else {
            format!("{}.{}", self.get_table(), column)
        }
    }

    fn get_key_name(&self) -> &'static str {
        Self::primary_key_name()
    }

    fn get_qualified_key_name(&self) -> String {
        self.qualify_column(Self::primary_key_name())
    }

    /// Primary key value, null when unset
    fn get_key(&self) -> DatabaseValue {
        self.get_attribute_value(Self::primary_key_name())
    }

    fn get_attribute(&self, key: &str) -> Option<&DatabaseValue> {
        self.base().attributes.get(key)
    }

    /// Attribute value, null when missing
    fn get_attribute_value(&self, key: &str) -> DatabaseValue {
        self.get_attribute(key).cloned().unwrap_or_default()
    }

    fn set_attribute<V: Into<DatabaseValue>>(&mut self, key: &str, value: V) -> &mut Self {
        self.base_mut().attributes.insert(key.to_string(), value.into());
        self
    }

    fn get_attributes(&self) -> &Attributes {
        &self.base().attributes
    }

    /// Fill attributes allowed by [`Model::fillable`]
    fn fill(&mut self, attributes: Attributes) -> &mut Self {
        let fillable = Self::fillable();
        for (key, value) in attributes {
            if fillable.is_empty() || fillable.contains(&key.as_str()) {
                self.base_mut().attributes.insert(key, value);
            }
        }
        self
    }

    /// Fill attributes ignoring [`Model::fillable`]
    fn force_fill(&mut self, attributes: Attributes) -> &mut Self {
        self.base_mut().attributes.extend(attributes);
        self
    }

    /// Attributes changed since the last sync
    fn get_dirty(&self) -> Attributes {
        let base = self.base();
        base.attributes
            .iter()
            .filter(|(key, value)| base.original.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn is_dirty(&self) -> bool {
        !self.get_dirty().is_empty()
    }

    /// Mark the current attributes as persisted
    fn sync_original(&mut self) {
        let attributes = self.base().attributes.clone();
        self.base_mut().original = attributes;
    }

    fn exists(&self) -> bool {
        self.base().exists
    }

    /// New instance of this model sharing the table override
    fn new_instance(&self, attributes: Attributes, exists: bool) -> Self {
        let mut model = Self::default();
        let table = self.base().table.clone();
        *model.base_mut() = ModelBase::from_attributes(attributes, exists);
        model.base_mut().table = table;
        model
    }

    /// Existing model hydrated from a result row
    fn new_from_row(&self, row: Attributes) -> Self {
        self.new_instance(row, true)
    }

    /// Query builder for this model type
    fn query() -> QueryBuilder<Self> {
        Self::default().new_query()
    }

    /// Query builder scoped to this instance's table
    fn new_query(&self) -> QueryBuilder<Self> {
        QueryBuilder::new().from(&self.get_table())
    }

    /// Current time as stored in timestamp columns
    fn fresh_timestamp() -> DatabaseValue {
        DatabaseValue::DateTime(Utc::now())
    }
}
