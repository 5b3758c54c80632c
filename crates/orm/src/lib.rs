//! # tiny-orm: Relationships for Active Record Models
//!
//! Models describe their relations once, in a per model registry, and get lazy
//! loading by name, eager loading with nested paths and constraints, existence
//! queries (`has`, `where_has`), pivot table management for many-to-many
//! relations, owner touching and JSON serialization of the loaded relations.
//!
//! Queries are built as structured [`QueryBuilder`] values and executed by a
//! [`DatabaseConnection`]: PostgreSQL through sqlx, or the in-memory backend.

pub mod backends;
pub mod config;
pub mod error;
pub mod model;
pub mod query;
pub mod relationships;

#[doc(hidden)]
pub use once_cell;

// Re-export core traits and types
pub use backends::{attributes, Attributes, DatabaseConnection, DatabaseValue, MemoryConnection, PostgresConnection};
pub use config::DatabaseConfig;
pub use error::*;
pub use model::{AnyModel, CrudOperations, HasRelationships, Model, ModelBase};
pub use query::{QueryBuilder, QueryOperator};

/// Everything needed to define models and work with their relations
pub mod prelude {
    pub use crate::backends::{attributes, Attributes, DatabaseConnection, DatabaseValue, MemoryConnection};
    pub use crate::error::{ModelError, ModelResult, OrmError, OrmResult, RelationFrom};
    pub use crate::model::{CrudOperations, HasRelationships, Model, ModelBase};
    pub use crate::query::{OrderDirection, QueryBuilder, QueryOperator};
    pub use crate::relationships::{
        BelongsTo, BelongsToMany, ComparesRelatedModels, HasMany, HasOne, Pivot, PivotKeys, PivotModel, Relation, RelationProxies,
        RelationRegistry, RelationValue, SupportsDefaultModels,
    };
    pub use crate::relations;
}
