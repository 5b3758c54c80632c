//! Eager Loading System - Prevents N+1 query problems with efficient relationship loading
//!
//! `with` records the relations to load on the query; after the parents are
//! hydrated every top level relation runs one query for the whole parent set and
//! hands its nested relations down to the related query.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::backends::DatabaseConnection;
use crate::error::{ModelError, OrmResult, RelationFrom};
use crate::model::Model;
use crate::query::QueryBuilder;

use super::registry::{ExpectedRelated, RelationStore};

/// Boxed constraint callback applied to an eager relation query
pub type EagerCallback<R> = Box<dyn Fn(QueryBuilder<R>) -> QueryBuilder<R> + Send + Sync>;

/// Type-erased constraint for an eager load, bound to the related model it expects
#[derive(Clone)]
pub struct EagerConstraint {
    callback: Arc<dyn Any + Send + Sync>,
    related: ExpectedRelated,
}

impl EagerConstraint {
    pub fn new<R, F>(callback: F) -> Self
    where
        R: Model,
        F: Fn(QueryBuilder<R>) -> QueryBuilder<R> + Send + Sync + 'static,
    {
        let callback: EagerCallback<R> = Box::new(callback);
        Self {
            callback: Arc::new(callback),
            related: ExpectedRelated::of::<R>(),
        }
    }

    /// Related model the callback was written for
    pub fn related(&self) -> ExpectedRelated {
        self.related
    }

    /// Apply the callback to the query of the `relation` relation
    pub fn apply<R: Model>(&self, query: QueryBuilder<R>, relation: &str) -> OrmResult<QueryBuilder<R>> {
        if self.related.type_id != TypeId::of::<R>() {
            return Err(ModelError::InvalidTemplateArgument(format!(
                "The constraint passed for the '{}' relation expects '{}' models but the relation \
                 yields '{}' models",
                relation,
                self.related.name,
                R::model_name()
            )));
        }

        let callback = self
            .callback
            .downcast_ref::<EagerCallback<R>>()
            .ok_or_else(|| ModelError::Runtime(format!("Malformed constraint for the '{}' relation", relation)))?;
        Ok(callback(query))
    }
}

impl fmt::Debug for EagerConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerConstraint")
            .field("related", &self.related.name)
            .finish()
    }
}

/// Relation to load eagerly, `posts.comments` style names address nested relations
#[derive(Debug, Clone)]
pub struct EagerLoad {
    pub name: String,
    pub constraint: Option<EagerConstraint>,
}

impl EagerLoad {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            constraint: None,
        }
    }

    pub fn with_constraint(name: &str, constraint: EagerConstraint) -> Self {
        Self {
            name: name.to_string(),
            constraint: Some(constraint),
        }
    }

    fn is_top_level(&self) -> bool {
        !self.name.contains('.')
    }
}

/// Merge `load` into `loads`, adding every parent segment of a dotted name first
///
/// A parent segment already present keeps its constraint; the load itself
/// replaces an earlier entry of the same name.
pub fn parse_with_relations(loads: &mut Vec<EagerLoad>, load: EagerLoad) {
    let segments: Vec<&str> = load.name.split('.').collect();

    for depth in 1..segments.len() {
        let parent = segments[..depth].join(".");
        if !loads.iter().any(|existing| existing.name == parent) {
            loads.push(EagerLoad::new(&parent));
        }
    }

    match loads.iter_mut().find(|existing| existing.name == load.name) {
        Some(existing) => *existing = load,
        None => loads.push(load),
    }
}

/// Loads nested below `relation`, renamed relative to the related model
pub(crate) fn nested_relations(loads: &[EagerLoad], relation: &str) -> Vec<EagerLoad> {
    let prefix = format!("{}.", relation);
    loads
        .iter()
        .filter_map(|load| {
            load.name.strip_prefix(&prefix).map(|rest| EagerLoad {
                name: rest.to_string(),
                constraint: load.constraint.clone(),
            })
        })
        .collect()
}

impl<M> QueryBuilder<M> {
    /// Relations to eager load, nested relations with dots
    pub fn with(mut self, relations: &[&str]) -> Self {
        for relation in relations {
            parse_with_relations(&mut self.eager_load, EagerLoad::new(relation));
        }
        self
    }

    /// Eager load a relation whose query is adjusted by `callback`
    pub fn with_constraint<R, F>(mut self, relation: &str, callback: F) -> Self
    where
        R: Model,
        F: Fn(QueryBuilder<R>) -> QueryBuilder<R> + Send + Sync + 'static,
    {
        let load = EagerLoad::with_constraint(relation, EagerConstraint::new(callback));
        parse_with_relations(&mut self.eager_load, load);
        self
    }

    /// Add prepared eager loads
    pub fn with_loads(mut self, loads: Vec<EagerLoad>) -> Self {
        for load in loads {
            parse_with_relations(&mut self.eager_load, load);
        }
        self
    }

    /// Relations registered for eager loading
    pub fn get_eager_loads(&self) -> &[EagerLoad] {
        &self.eager_load
    }

    /// Forget every registered eager load
    pub fn without_eager_loads(mut self) -> Self {
        self.eager_load.clear();
        self
    }
}

impl<M: Model> QueryBuilder<M> {
    /// Eager load the registered relations onto `models`
    pub async fn eager_load_relations(&self, models: &mut [M], conn: &dyn DatabaseConnection) -> OrmResult<()> {
        if models.is_empty() {
            return Ok(());
        }

        for load in self.eager_load.iter().filter(|load| load.is_top_level()) {
            let entry = M::relations().resolve(&load.name, RelationFrom::Undefined)?;
            let nested = nested_relations(&self.eager_load, &load.name);

            tracing::debug!(
                model = M::model_name(),
                relation = %load.name,
                parents = models.len(),
                nested = nested.len(),
                "Eager loading relation"
            );

            entry
                .dispatch(
                    &load.name,
                    RelationStore::Eager {
                        models: &mut *models,
                        load,
                        nested,
                    },
                    conn,
                )
                .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(loads: &[EagerLoad]) -> Vec<&str> {
        loads.iter().map(|load| load.name.as_str()).collect()
    }

    #[test]
    fn test_nested_names_register_their_parents() {
        let query: QueryBuilder = QueryBuilder::new().with(&["posts.comments.author", "profile"]);

        assert_eq!(
            names(query.get_eager_loads()),
            vec!["posts", "posts.comments", "posts.comments.author", "profile"]
        );
    }

    #[test]
    fn test_repeated_names_are_not_duplicated() {
        let query: QueryBuilder = QueryBuilder::new()
            .with(&["posts"])
            .with(&["posts.comments", "posts"]);

        assert_eq!(names(query.get_eager_loads()), vec!["posts", "posts.comments"]);
    }

    #[test]
    fn test_nested_relations_are_relative() {
        let loads: Vec<EagerLoad> = QueryBuilder::<()>::new()
            .with(&["posts.comments.author", "posts.tags", "profile"])
            .eager_load;

        let nested = nested_relations(&loads, "posts");
        assert_eq!(names(&nested), vec!["comments", "comments.author", "tags"]);
        assert!(nested_relations(&loads, "profile").is_empty());
    }
}
