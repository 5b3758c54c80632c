//! Database Backend Abstractions
//!
//! Backends execute the structured [`QueryBuilder`](crate::query::QueryBuilder)
//! through the [`DatabaseConnection`] trait. PostgreSQL runs on sqlx, the memory
//! backend evaluates queries in process and records every statement.

pub mod core;
pub mod memory;
pub mod postgres;

// Re-export core traits and types
pub use core::*;
pub use memory::MemoryConnection;
pub use postgres::PostgresConnection;
