//! Relationship Registry - per model name to relation method mapping
//!
//! Every model declares its relations once, through the [`relations!`](crate::relations)
//! macro, as a map from the relation name to the method building the relation.
//! Each entry is stored behind the object-safe [`RelationDispatch`] trait so the
//! engine can run lazy loads, eager loads, owner touches and existence queries
//! for a relation known only by its name.

use std::any::TypeId;
use std::collections::BTreeMap;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::backends::DatabaseConnection;
use crate::error::{ModelError, OrmResult, RelationFrom};
use crate::model::Model;
use crate::query::{Boolean, QueryBuilder, QueryOperator, WhereClause};

use super::container::RelationValue;
use super::eager_loading::EagerLoad;
use super::queries_relationships::{can_use_exists, HasCallback, HasRequest};
use super::relation::{Cardinality, Relation, RelationshipType};

/// Related model a caller expects a relation to yield
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedRelated {
    pub type_id: TypeId,
    pub name: &'static str,
}

impl ExpectedRelated {
    pub fn of<R: Model>() -> Self {
        Self {
            type_id: TypeId::of::<R>(),
            name: R::model_name(),
        }
    }

    pub fn is<R: Model>(&self) -> bool {
        self.type_id == TypeId::of::<R>()
    }
}

/// What the engine wants done with a resolved relation
pub enum RelationStore<'a, M: Model> {
    /// Fetch the relation of one parent
    Lazy { parent: &'a M },
    /// Load the relation for a set of parents in one query
    Eager {
        models: &'a mut [M],
        load: &'a EagerLoad,
        nested: Vec<EagerLoad>,
    },
    /// Touch the related models of one parent
    TouchOwners { parent: &'a M },
}

/// Result of a [`RelationStore`] operation
#[derive(Debug)]
pub enum StoreOutcome {
    Value(RelationValue),
    Loaded,
    Touched(u64),
}

/// Object-safe view of a registered relation method
#[async_trait]
pub trait RelationDispatch<M: Model>: Send + Sync {
    fn kind(&self) -> RelationshipType;

    fn cardinality(&self) -> Cardinality;

    /// Model the relation yields
    fn related(&self) -> ExpectedRelated;

    /// Build the relation and run the store operation on it
    async fn dispatch(
        &self,
        name: &str,
        store: RelationStore<'_, M>,
        conn: &dyn DatabaseConnection,
    ) -> OrmResult<StoreOutcome>;

    /// Existence clause for `has` style queries on `outer`
    fn existence(&self, template: &M, outer: &QueryBuilder<M>, request: HasRequest) -> OrmResult<WhereClause>;
}

/// Relation method returning the relation directly
pub struct Direct;

/// Relation method returning an `OrmResult` of the relation
pub struct Checked;

/// Return type of a relation method
pub trait IntoRelationResult<M: Model, Marker> {
    type Relation: Relation<M>;

    fn into_relation_result(self) -> OrmResult<Self::Relation>;
}

impl<M: Model, Rel: Relation<M>> IntoRelationResult<M, Direct> for Rel {
    type Relation = Rel;

    fn into_relation_result(self) -> OrmResult<Rel> {
        Ok(self)
    }
}

impl<M: Model, Rel: Relation<M>> IntoRelationResult<M, Checked> for OrmResult<Rel> {
    type Relation = Rel;

    fn into_relation_result(self) -> OrmResult<Rel> {
        self
    }
}

type RelationMethod<M, Rel> = Box<dyn Fn(&M) -> OrmResult<Rel> + Send + Sync>;

struct RelationEntry<M: Model, Rel: Relation<M>> {
    method: RelationMethod<M, Rel>,
    _relation: PhantomData<fn() -> Rel>,
}

impl<M: Model, Rel: Relation<M>> RelationEntry<M, Rel> {
    async fn eager_load(
        &self,
        name: &str,
        models: &mut [M],
        load: &EagerLoad,
        nested: Vec<EagerLoad>,
        conn: &dyn DatabaseConnection,
    ) -> OrmResult<()> {
        let mut relation = (self.method)(&M::default())?.without_constraints();
        relation.add_eager_constraints(models);

        if let Some(constraint) = &load.constraint {
            let query = std::mem::take(&mut relation.core_mut().query);
            relation.core_mut().query = constraint.apply(query, name)?;
        }
        if !nested.is_empty() {
            let query = std::mem::take(&mut relation.core_mut().query);
            relation.core_mut().query = query.with_loads(nested);
        }

        relation.init_relation(models, name);
        let results = relation.get_eager(conn).await?;
        relation.match_models(models, results, name);
        Ok(())
    }
}

#[async_trait]
impl<M: Model, Rel: Relation<M>> RelationDispatch<M> for RelationEntry<M, Rel> {
    fn kind(&self) -> RelationshipType {
        Rel::KIND
    }

    fn cardinality(&self) -> Cardinality {
        Rel::CARDINALITY
    }

    fn related(&self) -> ExpectedRelated {
        ExpectedRelated::of::<Rel::Related>()
    }

    async fn dispatch(
        &self,
        name: &str,
        store: RelationStore<'_, M>,
        conn: &dyn DatabaseConnection,
    ) -> OrmResult<StoreOutcome> {
        match store {
            RelationStore::Lazy { parent } => {
                let relation = (self.method)(parent)?;
                Ok(StoreOutcome::Value(relation.get_results(conn).await?))
            }
            RelationStore::Eager { models, load, nested } => {
                self.eager_load(name, models, load, nested, conn).await?;
                Ok(StoreOutcome::Loaded)
            }
            RelationStore::TouchOwners { parent } => {
                let relation = (self.method)(parent)?;
                Ok(StoreOutcome::Touched(relation.touch(conn).await?))
            }
        }
    }

    fn existence(&self, template: &M, outer: &QueryBuilder<M>, mut request: HasRequest) -> OrmResult<WhereClause> {
        let relation = (self.method)(template)?.without_constraints();
        let base = relation.get_related().new_query().nested_below(outer.depth());

        let use_exists = can_use_exists(request.operator, request.count);
        let mut has_query = if use_exists {
            relation.relation_existence_query(base, outer)
        } else {
            relation.relation_existence_count_query(base, outer)
        };

        if let Some(next) = request.remaining.pop_front() {
            let (operator, count) = if request.remaining.is_empty() {
                (request.tail.operator, request.tail.count)
            } else {
                (QueryOperator::GreaterThanOrEqual, 1)
            };
            let nested = HasRequest {
                operator,
                count,
                boolean: Boolean::And,
                remaining: std::mem::take(&mut request.remaining),
                tail: request.tail,
            };
            has_query = has_query.add_has_request(&next, nested)?;
        } else {
            if let Some(expected) = request.tail.expected {
                if !expected.is::<Rel::Related>() {
                    return Err(ModelError::InvalidTemplateArgument(format!(
                        "The has() callback expects '{}' models but the relation on the '{}' model \
                         yields '{}' models",
                        expected.name,
                        M::model_name(),
                        Rel::Related::model_name()
                    )));
                }
            }
            if let Some(callback) = request.tail.callback {
                let callback = callback
                    .downcast::<HasCallback<Rel::Related>>()
                    .map_err(|_| ModelError::Runtime("Malformed has() callback".to_string()))?;
                let start = has_query.get_wheres().len();
                has_query = callback(has_query).group_wheres_from(start);
            }
        }

        // The relation's own wheres, left after stripping its constraints
        let start = has_query.get_wheres().len();
        has_query = has_query
            .merge_wheres(relation.get_query().get_wheres())
            .group_wheres_from(start);

        let query = Box::new(has_query.into_base());
        Ok(if use_exists {
            WhereClause::Exists {
                query,
                not: request.operator == QueryOperator::LessThan,
                boolean: request.boolean,
            }
        } else {
            WhereClause::Count {
                query,
                operator: request.operator,
                count: request.count,
                boolean: request.boolean,
            }
        })
    }
}

/// Relation name to relation method map of one model type
pub struct RelationRegistry<M: Model> {
    entries: BTreeMap<String, Box<dyn RelationDispatch<M>>>,
}

impl<M: Model> Default for RelationRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> std::fmt::Debug for RelationRegistry<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationRegistry")
            .field("model", &M::model_name())
            .field("relations", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<M: Model> RelationRegistry<M> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register `method` under `name`
    ///
    /// The method may return the relation or an `OrmResult` of it.
    pub fn relation<F, T, Marker>(mut self, name: &str, method: F) -> Self
    where
        F: Fn(&M) -> T + Send + Sync + 'static,
        T: IntoRelationResult<M, Marker>,
        Marker: 'static,
    {
        let entry = RelationEntry::<M, T::Relation> {
            method: Box::new(move |model| method(model).into_relation_result()),
            _relation: PhantomData,
        };
        self.entries.insert(name.to_string(), Box::new(entry));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Look up a relation, `from` tells the error how the name was obtained
    pub fn resolve(&self, name: &str, from: RelationFrom) -> OrmResult<&dyn RelationDispatch<M>> {
        self.entries
            .get(name)
            .map(|entry| &**entry)
            .ok_or_else(|| ModelError::relation_mapping_not_found(M::model_name(), name, from))
    }

    /// Registered relation names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Declare the relation registry of a model
///
/// Expands to a reference to a lazily built, process wide registry, meant as the
/// body of [`Model::relations`]:
///
/// ```ignore
/// fn relations() -> &'static RelationRegistry<Self> {
///     relations!(User {
///         "posts" => User::posts,
///         "roles" => User::roles,
///     })
/// }
/// ```
#[macro_export]
macro_rules! relations {
    ($model:ty { $($name:literal => $method:expr),* $(,)? }) => {{
        static REGISTRY: $crate::once_cell::sync::Lazy<$crate::relationships::RelationRegistry<$model>> =
            $crate::once_cell::sync::Lazy::new(|| {
                $crate::relationships::RelationRegistry::<$model>::new()
                    $(.relation($name, $method))*
            });
        &*REGISTRY
    }};
}

