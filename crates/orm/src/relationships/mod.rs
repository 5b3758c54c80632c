//! Relationships Module - relation types, the per model relation registry,
//! eager loading and relationship existence queries

pub mod belongs_to;
pub mod belongs_to_many;
pub mod compares_related_models;
pub mod container;
pub mod default_models;
pub mod eager_loading;
pub mod has_many;
pub mod has_one;
pub mod has_one_or_many;
pub mod pivot;
pub mod pivot_table;
pub mod proxies;
pub mod queries_relationships;
pub mod registry;
pub mod relation;

pub use belongs_to::BelongsTo;
pub use belongs_to_many::{BelongsToMany, PivotKeys};
pub use compares_related_models::ComparesRelatedModels;
pub use container::{RelationValue, Relations};
pub use default_models::{DefaultModel, SupportsDefaultModels};
pub use eager_loading::{EagerConstraint, EagerLoad};
pub use has_many::HasMany;
pub use has_one::HasOne;
pub use has_one_or_many::{HasOneOrMany, HasOneOrManyRelation};
pub use pivot::{Pivot, PivotModel};
pub use pivot_table::SyncChanges;
pub use proxies::RelationProxies;
pub use queries_relationships::HasCallback;
pub use registry::{
    Checked, Direct, ExpectedRelated, IntoRelationResult, RelationDispatch, RelationRegistry, RelationStore,
    StoreOutcome,
};
pub use relation::{
    Cardinality, ManyRelation, OneRelation, PivotRelation, Relation, RelationCore, RelationshipType,
};
