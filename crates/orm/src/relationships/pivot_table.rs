//! Pivot table operations of BelongsToMany relations
//!
//! Attaching, detaching, updating and syncing the rows of the intermediate
//! table for the relation's parent.

use std::collections::{HashMap, HashSet};

use crate::backends::{attributes, Attributes, DatabaseConnection, DatabaseValue};
use crate::error::{ModelError, OrmResult};
use crate::model::{naming, Model};
use crate::query::QueryBuilder;

use super::belongs_to_many::BelongsToMany;
use super::pivot::PivotModel;
use super::relation::Relation;

/// Changes applied by a sync
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncChanges {
    pub attached: Vec<DatabaseValue>,
    pub detached: Vec<DatabaseValue>,
    pub updated: Vec<DatabaseValue>,
}

impl SyncChanges {
    /// Whether the sync changed anything
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty() && self.detached.is_empty() && self.updated.is_empty()
    }
}

impl<M: Model, R: Model, P: PivotModel> BelongsToMany<M, R, P> {
    /// Query on the pivot table without any constraints
    pub fn new_pivot_statement(&self) -> QueryBuilder {
        QueryBuilder::new().from(self.get_table())
    }

    /// Query on the pivot table for the parent's rows
    pub fn new_pivot_query(&self) -> QueryBuilder {
        let parent_key = self.get_parent().get_attribute_value(self.get_parent_key_name());
        self.new_pivot_statement()
            .where_eq(self.get_foreign_pivot_key_name(), parent_key)
    }

    /// Query on the pivot table for the parent's rows pointing at `ids`
    pub fn new_pivot_statement_for_id<I, V>(&self, ids: I) -> QueryBuilder
    where
        I: IntoIterator<Item = V>,
        V: Into<DatabaseValue>,
    {
        self.new_pivot_query()
            .where_in(self.get_related_pivot_key_name(), ids)
    }

    /// Related keys currently attached to the parent
    pub async fn all_related_ids(&self, conn: &dyn DatabaseConnection) -> OrmResult<Vec<DatabaseValue>> {
        self.new_pivot_query()
            .pluck(self.get_related_pivot_key_name(), conn)
            .await
    }

    /// Attach related keys to the parent, each row getting `attributes`
    pub async fn attach<I, V>(
        &self,
        ids: I,
        attributes: Attributes,
        touch: bool,
        conn: &dyn DatabaseConnection,
    ) -> OrmResult<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<DatabaseValue>,
    {
        let records = ids
            .into_iter()
            .map(|id| (id.into(), attributes.clone()))
            .collect();
        self.attach_with_attributes(records, touch, conn).await
    }

    /// Attach related models to the parent
    pub async fn attach_models(
        &self,
        models: &[R],
        attributes: Attributes,
        touch: bool,
        conn: &dyn DatabaseConnection,
    ) -> OrmResult<()> {
        let ids: Vec<DatabaseValue> = models
            .iter()
            .map(|model| model.get_attribute_value(self.get_related_key_name()))
            .collect();
        self.attach(ids, attributes, touch, conn).await
    }

    /// Attach related keys, each with its own pivot attributes
    pub async fn attach_with_attributes(
        &self,
        records: Vec<(DatabaseValue, Attributes)>,
        touch: bool,
        conn: &dyn DatabaseConnection,
    ) -> OrmResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let rows = self.format_attach_records(records)?;
        tracing::debug!(
            table = self.get_table(),
            relation = self.get_relation_name(),
            rows = rows.len(),
            "Attaching pivot rows"
        );
        self.new_pivot_statement().insert(rows, conn).await?;

        if touch {
            self.touch_if_touching(conn).await?;
        }
        Ok(())
    }

    /// Build the pivot rows for an attach
    pub fn format_attach_records(&self, records: Vec<(DatabaseValue, Attributes)>) -> OrmResult<Vec<Attributes>> {
        let parent_key = self.get_parent().get_attribute_value(self.get_parent_key_name());
        let foreign_pivot_key = self.get_foreign_pivot_key_name();
        let related_pivot_key = self.get_related_pivot_key_name();

        records
            .into_iter()
            .map(|(id, extra)| {
                if let Some(key) = [foreign_pivot_key, related_pivot_key]
                    .into_iter()
                    .find(|key| extra.contains_key(*key))
                {
                    return Err(ModelError::InvalidArgument(format!(
                        "Pivot attributes for the '{}' table can not overwrite the '{}' key",
                        self.get_table(),
                        key
                    )));
                }

                let mut record = attributes([
                    (foreign_pivot_key, parent_key.clone()),
                    (related_pivot_key, id),
                ]);

                if self.uses_timestamps() {
                    let now = M::fresh_timestamp();
                    record.insert(self.created_at().to_string(), now.clone());
                    record.insert(self.updated_at().to_string(), now);
                }

                record.extend(extra);
                Ok(record)
            })
            .collect()
    }

    /// Detach related keys from the parent, returns the deleted rows count
    pub async fn detach<I, V>(&self, ids: I, touch: bool, conn: &dyn DatabaseConnection) -> OrmResult<u64>
    where
        I: IntoIterator<Item = V>,
        V: Into<DatabaseValue>,
    {
        let ids: Vec<DatabaseValue> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let deleted = self.new_pivot_statement_for_id(ids).delete(conn).await?;
        if touch {
            self.touch_if_touching(conn).await?;
        }
        Ok(deleted)
    }

    /// Detach related models from the parent
    pub async fn detach_models(&self, models: &[R], touch: bool, conn: &dyn DatabaseConnection) -> OrmResult<u64> {
        let ids: Vec<DatabaseValue> = models
            .iter()
            .map(|model| model.get_attribute_value(self.get_related_key_name()))
            .collect();
        self.detach(ids, touch, conn).await
    }

    /// Detach every related model from the parent
    pub async fn detach_all(&self, touch: bool, conn: &dyn DatabaseConnection) -> OrmResult<u64> {
        let deleted = self.new_pivot_query().delete(conn).await?;
        if touch {
            self.touch_if_touching(conn).await?;
        }
        Ok(deleted)
    }

    /// Update the pivot row of an attached related key
    pub async fn update_existing_pivot<V>(
        &self,
        id: V,
        mut attributes: Attributes,
        touch: bool,
        conn: &dyn DatabaseConnection,
    ) -> OrmResult<u64>
    where
        V: Into<DatabaseValue>,
    {
        if self.uses_timestamps() {
            attributes
                .entry(self.updated_at().to_string())
                .or_insert_with(M::fresh_timestamp);
        }

        let updated = self
            .new_pivot_statement_for_id([id.into()])
            .update(attributes, conn)
            .await?;

        if touch && updated > 0 {
            self.touch_if_touching(conn).await?;
        }
        Ok(updated)
    }

    /// Make the pivot rows of the parent match `records`
    ///
    /// Keys missing from `records` are detached when `detaching` is set, new keys
    /// are attached and the attributes of already attached keys are updated.
    pub async fn sync(
        &self,
        records: Vec<(DatabaseValue, Attributes)>,
        detaching: bool,
        conn: &dyn DatabaseConnection,
    ) -> OrmResult<SyncChanges> {
        let mut changes = SyncChanges::default();
        let records = unique_records(records);

        let current = self.all_related_ids(conn).await?;
        let current_keys: HashSet<String> = current.iter().filter_map(DatabaseValue::as_key).collect();
        let wanted_keys: HashSet<String> = records.iter().filter_map(|(id, _)| id.as_key()).collect();

        if detaching {
            let detach: Vec<DatabaseValue> = current
                .into_iter()
                .filter(|id| id.as_key().is_some_and(|key| !wanted_keys.contains(&key)))
                .collect();

            if !detach.is_empty() {
                self.detach(detach.clone(), false, conn).await?;
                changes.detached = detach;
            }
        }

        let mut to_attach = Vec::new();
        for (id, extra) in records {
            let attached = id.as_key().is_some_and(|key| current_keys.contains(&key));

            if !attached {
                to_attach.push((id, extra));
            } else if !extra.is_empty() && self.update_existing_pivot(id.clone(), extra, false, conn).await? > 0 {
                changes.updated.push(id);
            }
        }

        if !to_attach.is_empty() {
            changes.attached = to_attach.iter().map(|(id, _)| id.clone()).collect();
            self.attach_with_attributes(to_attach, false, conn).await?;
        }

        if !changes.attached.is_empty() || !changes.updated.is_empty() {
            self.touch_if_touching(conn).await?;
        }

        tracing::debug!(
            table = self.get_table(),
            attached = changes.attached.len(),
            detached = changes.detached.len(),
            updated = changes.updated.len(),
            "Synced pivot rows"
        );

        Ok(changes)
    }

    /// Sync plain related keys, detaching the rest
    pub async fn sync_ids<I, V>(&self, ids: I, conn: &dyn DatabaseConnection) -> OrmResult<SyncChanges>
    where
        I: IntoIterator<Item = V>,
        V: Into<DatabaseValue>,
    {
        let records = ids.into_iter().map(|id| (id.into(), Attributes::new())).collect();
        self.sync(records, true, conn).await
    }

    /// Sync without detaching keys missing from `records`
    pub async fn sync_without_detaching(
        &self,
        records: Vec<(DatabaseValue, Attributes)>,
        conn: &dyn DatabaseConnection,
    ) -> OrmResult<SyncChanges> {
        self.sync(records, false, conn).await
    }

    /// Touch the related models or the parent when either side asks for it
    pub async fn touch_if_touching(&self, conn: &dyn DatabaseConnection) -> OrmResult<()> {
        if self.touching_parent() {
            self.touch_parent(conn).await?;
        }

        if self.get_parent().touches_relation(self.get_relation_name()) {
            self.touch(conn).await?;
        }
        Ok(())
    }

    /// Whether the related model touches its parents through the inverse relation
    fn touching_parent(&self) -> bool {
        let inverse = naming::pluralize(&naming::lcfirst(M::model_name()));
        R::touches().contains(&inverse.as_str())
    }

    async fn touch_parent(&self, conn: &dyn DatabaseConnection) -> OrmResult<u64> {
        if !M::uses_timestamps() {
            return Ok(0);
        }

        let parent = self.get_parent();
        parent
            .new_query()
            .where_eq(M::primary_key_name(), parent.get_key())
            .update(attributes([(M::updated_at_column(), M::fresh_timestamp())]), conn)
            .await
    }
}

/// Collapse records sharing a key into the first one, later attributes win
fn unique_records(records: Vec<(DatabaseValue, Attributes)>) -> Vec<(DatabaseValue, Attributes)> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<(DatabaseValue, Attributes)> = Vec::with_capacity(records.len());

    for (id, extra) in records {
        let Some(key) = id.as_key() else {
            unique.push((id, extra));
            continue;
        };
        match positions.get(&key) {
            Some(&index) => unique[index].1.extend(extra),
            None => {
                positions.insert(key, unique.len());
                unique.push((id, extra));
            }
        }
    }

    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_records_merges_repeated_keys() {
        let records = vec![
            (DatabaseValue::Int64(3), attributes([("active", true)])),
            (DatabaseValue::Int32(4), Attributes::new()),
            (DatabaseValue::Int32(3), attributes([("active", false)])),
        ];

        let unique = unique_records(records);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].0, DatabaseValue::Int64(3));
        assert_eq!(unique[0].1.get("active"), Some(&DatabaseValue::Bool(false)));
        assert_eq!(unique[1].0, DatabaseValue::Int32(4));
    }
}
