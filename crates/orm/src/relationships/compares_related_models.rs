//! Related model comparison for to-one relations

use crate::backends::DatabaseValue;
use crate::model::Model;

use super::relation::{OneRelation, Relation};

/// Tell whether a model is the one a to-one relation points at, without a query
pub trait ComparesRelatedModels<M: Model>: Relation<M> + OneRelation {
    /// Key on the relation's parent side that identifies the related model
    fn get_parent_key(&self) -> DatabaseValue;

    /// Column of a related model compared against [`get_parent_key`](Self::get_parent_key)
    fn get_related_key_name(&self) -> &str;

    /// Whether `model` is the related instance of the relation
    ///
    /// The model must live in the related table and carry a matching, non-null key.
    fn is<N: Model>(&self, model: Option<&N>) -> bool {
        let Some(model) = model else {
            return false;
        };
        if model.get_table() != self.get_related().get_table() {
            return false;
        }

        match (
            self.get_parent_key().as_key(),
            model.get_attribute_value(self.get_related_key_name()).as_key(),
        ) {
            (Some(parent), Some(related)) => parent == related,
            _ => false,
        }
    }

    fn is_not<N: Model>(&self, model: Option<&N>) -> bool {
        !self.is(model)
    }
}
