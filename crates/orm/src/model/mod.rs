//! Model System - Modular model trait system for database entities
//!
//! This module provides a decomposed model system with focused traits for
//! different aspects of model functionality:
//!
//! - `core_trait`: Core Model trait definition and per-instance state
//! - `crud_operations`: Create, Read, Update, Delete operations
//! - `has_relationships`: Relation factories, loaded relations and serialization
//! - `any_model`: Type-erased models stored in relation containers
//! - `naming`: Naming conventions for tables, keys and relations

pub mod any_model;
pub mod core_trait;
pub mod crud_operations;
pub mod has_relationships;
pub mod naming;

// Re-export main types and traits for convenience
pub use any_model::AnyModel;
pub use core_trait::{Model, ModelBase};
pub use crud_operations::CrudOperations;
pub use has_relationships::HasRelationships;
