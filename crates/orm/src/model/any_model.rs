//! Type-erased models
//!
//! Loaded relations hold models of many different types in one container, so
//! they are stored as `Box<dyn AnyModel>` and downcast on the way out.

use std::any::Any;
use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::backends::DatabaseConnection;
use crate::error::OrmResult;
use crate::model::{HasRelationships, Model};

/// Object-safe view of a [`Model`]
#[async_trait]
pub trait AnyModel: Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    fn clone_box(&self) -> Box<dyn AnyModel>;

    /// Compare with another erased model, false when the types differ
    fn eq_box(&self, other: &dyn AnyModel) -> bool;

    fn model_type_name(&self) -> &'static str;

    /// Attributes and loaded relations as JSON
    fn to_json_value(&self) -> JsonValue;

    /// Touch the owners of this model, see [`HasRelationships::touch_owners`]
    async fn touch_owners_dyn(&mut self, conn: &dyn DatabaseConnection) -> OrmResult<()>;

    /// Save this model and its loaded relations, see [`HasRelationships::push`]
    async fn push_dyn(&mut self, conn: &dyn DatabaseConnection) -> OrmResult<bool>;
}

#[async_trait]
impl<T: Model> AnyModel for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn clone_box(&self) -> Box<dyn AnyModel> {
        Box::new(self.clone())
    }

    fn eq_box(&self, other: &dyn AnyModel) -> bool {
        other.as_any().downcast_ref::<T>().is_some_and(|other| self == other)
    }

    fn model_type_name(&self) -> &'static str {
        T::model_name()
    }

    fn to_json_value(&self) -> JsonValue {
        self.to_json()
    }

    async fn touch_owners_dyn(&mut self, conn: &dyn DatabaseConnection) -> OrmResult<()> {
        self.touch_owners(conn).await
    }

    async fn push_dyn(&mut self, conn: &dyn DatabaseConnection) -> OrmResult<bool> {
        self.push(conn).await
    }
}

impl Clone for Box<dyn AnyModel> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl PartialEq for Box<dyn AnyModel> {
    fn eq(&self, other: &Self) -> bool {
        self.eq_box(other.as_ref())
    }
}
