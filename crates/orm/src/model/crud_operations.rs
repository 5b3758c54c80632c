//! CRUD Operations - Create, Read, Update, Delete operations for models
//!
//! Persistence goes through the model's own query, so runtime table overrides
//! (pivot rows) are honoured. Timestamps are maintained when the model uses them.

use async_trait::async_trait;

use crate::backends::{Attributes, DatabaseConnection, DatabaseValue};
use crate::error::{ModelError, ModelResult};
use crate::model::core_trait::Model;

/// Trait providing CRUD operations for models
#[async_trait]
pub trait CrudOperations: Model {
    /// Find a model by its primary key
    async fn find<V>(id: V, conn: &dyn DatabaseConnection) -> ModelResult<Option<Self>>
    where
        V: Into<DatabaseValue> + Send,
    {
        Self::query().find(id, conn).await
    }

    /// Find a model by its primary key or return an error if not found
    async fn find_or_fail<V>(id: V, conn: &dyn DatabaseConnection) -> ModelResult<Self>
    where
        V: Into<DatabaseValue> + Send,
    {
        let id = id.into();
        Self::find(id.clone(), conn)
            .await?
            .ok_or_else(|| ModelError::NotFound(format!("{}({:?})", Self::table_name(), id)))
    }

    /// Every row of the model's table
    async fn all(conn: &dyn DatabaseConnection) -> ModelResult<Vec<Self>> {
        Self::query().get(conn).await
    }

    /// Fill a new model with `attributes` and insert it
    async fn create(attributes: Attributes, conn: &dyn DatabaseConnection) -> ModelResult<Self> {
        let mut model = Self::default();
        model.fill(attributes);
        model.save(conn).await?;
        Ok(model)
    }

    /// Insert the model when it does not exist yet, update its dirty attributes otherwise
    async fn save(&mut self, conn: &dyn DatabaseConnection) -> ModelResult<bool> {
        if self.exists() {
            self.perform_update(conn).await
        } else {
            self.perform_insert(conn).await
        }
    }

    #[doc(hidden)]
    async fn perform_insert(&mut self, conn: &dyn DatabaseConnection) -> ModelResult<bool> {
        if Self::uses_timestamps() {
            let now = Self::fresh_timestamp();
            for column in [Self::created_at_column(), Self::updated_at_column()] {
                if self.get_attribute_value(column).is_null() {
                    self.set_attribute(column, now.clone());
                }
            }
        }

        let mut row = self.get_attributes().clone();
        let key_name = Self::primary_key_name();

        if self.get_key().is_null() {
            row.remove(key_name);
            let id = self.new_query().insert_get_id(row, key_name, conn).await?;
            self.set_attribute(key_name, id);
        } else {
            self.new_query().insert(vec![row], conn).await?;
        }

        tracing::debug!(model = Self::model_name(), key = ?self.get_key(), "Inserted model");

        self.base_mut().exists = true;
        self.sync_original();
        Ok(true)
    }

    #[doc(hidden)]
    async fn perform_update(&mut self, conn: &dyn DatabaseConnection) -> ModelResult<bool> {
        if !self.is_dirty() {
            return Ok(true);
        }

        let key = self.get_key();
        if key.is_null() {
            return Err(ModelError::MissingPrimaryKey);
        }

        if Self::uses_timestamps() && self.get_dirty().get(Self::updated_at_column()).is_none() {
            self.set_attribute(Self::updated_at_column(), Self::fresh_timestamp());
        }

        let dirty = self.get_dirty();
        self.new_query()
            .where_eq(Self::primary_key_name(), key)
            .update(dirty, conn)
            .await?;

        self.sync_original();
        Ok(true)
    }

    /// Delete the model's row, false when it was never persisted
    async fn delete(&mut self, conn: &dyn DatabaseConnection) -> ModelResult<bool> {
        if !self.exists() {
            return Ok(false);
        }

        let key = self.get_key();
        if key.is_null() {
            return Err(ModelError::MissingPrimaryKey);
        }

        self.new_query()
            .where_eq(Self::primary_key_name(), key)
            .delete(conn)
            .await?;

        self.base_mut().exists = false;
        Ok(true)
    }

    /// Update the model's update timestamp
    async fn touch(&mut self, conn: &dyn DatabaseConnection) -> ModelResult<bool> {
        if !Self::uses_timestamps() {
            return Ok(false);
        }

        self.set_attribute(Self::updated_at_column(), Self::fresh_timestamp());
        self.save(conn).await
    }
}

impl<T: Model> CrudOperations for T {}
