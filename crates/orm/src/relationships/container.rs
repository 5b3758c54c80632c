//! Loaded relationship container
//!
//! A model keeps every loaded relation under its name. A missing name means the
//! relation was never loaded; `One(None)` and an empty `Many` mean it was loaded
//! and nothing was there.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;

use crate::error::{ModelError, OrmResult};
use crate::model::{AnyModel, Model};

/// Loaded relations keyed by relation name
pub type Relations = BTreeMap<String, RelationValue>;

/// Value of a loaded relationship
#[derive(Debug, Clone)]
pub enum RelationValue {
    /// To-one relation, `None` when no related row exists
    One(Option<Box<dyn AnyModel>>),
    /// To-many relation
    Many(Vec<Box<dyn AnyModel>>),
    /// Pivot row attached to a model loaded through a many-to-many relation
    Pivot(Box<dyn AnyModel>),
}

impl PartialEq for RelationValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RelationValue::One(a), RelationValue::One(b)) => a == b,
            (RelationValue::Many(a), RelationValue::Many(b)) => a == b,
            (RelationValue::Pivot(a), RelationValue::Pivot(b)) => a == b,
            _ => false,
        }
    }
}

impl RelationValue {
    pub fn one<R: Model>(model: Option<R>) -> Self {
        RelationValue::One(model.map(|model| Box::new(model) as Box<dyn AnyModel>))
    }

    pub fn many<R: Model>(models: Vec<R>) -> Self {
        RelationValue::Many(
            models
                .into_iter()
                .map(|model| Box::new(model) as Box<dyn AnyModel>)
                .collect(),
        )
    }

    pub fn pivot<P: Model>(pivot: P) -> Self {
        RelationValue::Pivot(Box::new(pivot))
    }

    pub fn is_pivot(&self) -> bool {
        matches!(self, RelationValue::Pivot(_))
    }

    /// Every model held by the value
    pub fn models(&self) -> Vec<&dyn AnyModel> {
        match self {
            RelationValue::One(model) => model.iter().map(|model| &**model).collect(),
            RelationValue::Many(models) => models.iter().map(|model| &**model).collect(),
            RelationValue::Pivot(model) => vec![&**model],
        }
    }

    pub fn models_mut(&mut self) -> Vec<&mut Box<dyn AnyModel>> {
        match self {
            RelationValue::One(model) => model.iter_mut().collect(),
            RelationValue::Many(models) => models.iter_mut().collect(),
            RelationValue::Pivot(model) => vec![model],
        }
    }

    /// Serialize by variant: an object or null, an array, or the pivot object
    pub fn to_json(&self) -> JsonValue {
        match self {
            RelationValue::One(Some(model)) | RelationValue::Pivot(model) => model.to_json_value(),
            RelationValue::One(None) => JsonValue::Null,
            RelationValue::Many(models) => {
                JsonValue::Array(models.iter().map(|model| model.to_json_value()).collect())
            }
        }
    }

    /// Borrow the models of a to-many value as `R`
    pub fn downcast_many<R: Model>(&self, relation: &str) -> OrmResult<Vec<&R>> {
        match self {
            RelationValue::Many(models) => models
                .iter()
                .map(|model| downcast_ref::<R>(&**model, relation))
                .collect(),
            _ => Err(ModelError::InvalidTemplateArgument(format!(
                "The '{}' relation holds a single model, use get_relation_one::<{}>() instead",
                relation,
                R::model_name()
            ))),
        }
    }

    /// Borrow the model of a to-one or pivot value as `R`
    pub fn downcast_one<R: Model>(&self, relation: &str) -> OrmResult<Option<&R>> {
        match self {
            RelationValue::One(model) => model
                .as_ref()
                .map(|model| downcast_ref::<R>(&**model, relation))
                .transpose(),
            RelationValue::Pivot(model) => downcast_ref::<R>(&**model, relation).map(Some),
            RelationValue::Many(_) => Err(ModelError::InvalidTemplateArgument(format!(
                "The '{}' relation holds a collection, use get_relation::<{}>() instead",
                relation,
                R::model_name()
            ))),
        }
    }
}

fn downcast_ref<'a, R: Model>(model: &'a dyn AnyModel, relation: &str) -> OrmResult<&'a R> {
    model.as_any().downcast_ref::<R>().ok_or_else(|| {
        ModelError::InvalidTemplateArgument(format!(
            "The '{}' relation holds '{}' models, not '{}'",
            relation,
            model.model_type_name(),
            R::model_name()
        ))
    })
}
