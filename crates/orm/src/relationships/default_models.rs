//! Default models for to-one relations
//!
//! A `BelongsTo` or `HasOne` relation can hand back a fresh, unsaved related
//! model instead of `None` when no row matches.

use crate::backends::{Attributes, DatabaseValue};
use crate::model::Model;

use super::relation::{OneRelation, Relation};

/// Default model policy of a relation
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultModel {
    /// `false` returns nothing, `true` returns an empty related instance
    Bool(bool),
    /// Related instance force-filled with these attributes
    Attributes(Attributes),
}

impl Default for DefaultModel {
    fn default() -> Self {
        DefaultModel::Bool(false)
    }
}

/// To-one relations that can return a default model
pub trait SupportsDefaultModels<M: Model>: Relation<M> + OneRelation {
    fn default_model(&self) -> &DefaultModel;

    fn default_model_mut(&mut self) -> &mut DefaultModel;

    /// Make a new related instance for the given parent
    fn new_related_instance_for(&self, parent: &M) -> Self::Related;

    /// Return an empty related model instead of `None`
    fn with_default(mut self, value: bool) -> Self {
        *self.default_model_mut() = DefaultModel::Bool(value);
        self
    }

    /// Return a related model filled with `attributes` instead of `None`
    fn with_default_attributes<I, K, V>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DatabaseValue>,
    {
        *self.default_model_mut() = DefaultModel::Attributes(crate::backends::attributes(attributes));
        self
    }

    /// Default model for `parent`, `None` when no default is configured
    fn get_default_for(&self, parent: &M) -> Option<Self::Related> {
        match self.default_model() {
            DefaultModel::Bool(false) => None,
            DefaultModel::Bool(true) => Some(self.new_related_instance_for(parent)),
            DefaultModel::Attributes(attributes) => {
                let mut instance = self.new_related_instance_for(parent);
                instance.force_fill(attributes.clone());
                Some(instance)
            }
        }
    }
}
