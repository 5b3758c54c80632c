//! Error types for the ORM
//!
//! Relationship errors carry structured fields (model, relation, origin of the
//! relation name) so host applications can render precise diagnostics without
//! parsing messages.

use thiserror::Error;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// How a relation name reached the registry lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationFrom {
    /// Name passed explicitly to `with`, `has` or a relation accessor
    Undefined,
    /// Name guessed by the `belongs_to` factory
    BelongsTo,
    /// Name guessed by the `belongs_to_many` factory
    BelongsToMany,
}

impl RelationFrom {
    /// Name of the factory method that guessed the relation name
    pub fn method_name(&self) -> &'static str {
        match self {
            RelationFrom::Undefined => "",
            RelationFrom::BelongsTo => "belongs_to",
            RelationFrom::BelongsToMany => "belongs_to_many",
        }
    }
}

/// Error types for ORM operations
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// Database connection or query error
    #[error("Database error: {0}")]
    Database(String),

    /// Model not found in database
    #[error("Record not found in table '{0}'")]
    NotFound(String),

    /// Primary key is missing or invalid
    #[error("Primary key is missing or invalid")]
    MissingPrimaryKey,

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Connection pool error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query building or execution error
    #[error("Query error: {0}")]
    Query(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Caller passed an argument the operation can not accept
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The "must already be loaded" accessor was used on a relation that was never resolved
    #[error("The '{relation}' relation is not loaded on the '{model}' model, eager load it with the with() method or use the lazy get_relation_value() accessor")]
    RelationNotLoaded { model: String, relation: String },

    /// The relation name does not exist in the model's relation registry
    #[error("{}", relation_mapping_message(.model, .relation, .from))]
    RelationMappingNotFound {
        model: String,
        relation: String,
        from: RelationFrom,
    },

    /// The requested related type or cardinality disagrees with the resolved relation
    #[error("Invalid template argument: {0}")]
    InvalidTemplateArgument(String),

    /// Guard for states the relation engine considers unreachable
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl ModelError {
    /// Build a `RelationNotLoaded` error
    pub fn relation_not_loaded(model: &str, relation: &str) -> Self {
        ModelError::RelationNotLoaded {
            model: model.to_string(),
            relation: relation.to_string(),
        }
    }

    /// Build a `RelationMappingNotFound` error
    pub fn relation_mapping_not_found(model: &str, relation: &str, from: RelationFrom) -> Self {
        ModelError::RelationMappingNotFound {
            model: model.to_string(),
            relation: relation.to_string(),
            from,
        }
    }

    /// Check if this error comes from the relation engine
    pub fn is_relation_error(&self) -> bool {
        matches!(
            self,
            ModelError::RelationNotLoaded { .. }
                | ModelError::RelationMappingNotFound { .. }
                | ModelError::InvalidTemplateArgument(_)
        )
    }
}

fn relation_mapping_message(model: &str, relation: &str, from: &RelationFrom) -> String {
    match from {
        RelationFrom::Undefined => format!(
            "The relationship mapping '{}' doesn't exist in the relation registry of the '{}' model",
            relation, model
        ),
        RelationFrom::BelongsTo | RelationFrom::BelongsToMany => format!(
            "Can not guess the relationship name for the '{method}' relation type, the guessed \
             relationship name is '{relation}' but it doesn't exist in the relation registry of \
             the '{model}' model, please pass the 'relation' argument to the '{method}' method \
             called from the '{model}' model",
            method = from.method_name(),
            relation = relation,
            model = model,
        ),
    }
}

// Convert from sqlx errors
impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ModelError::NotFound("unknown".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => ModelError::Connection(err.to_string()),
            other => ModelError::Database(other.to_string()),
        }
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_mapping_message_names_model_and_relation() {
        let err = ModelError::relation_mapping_not_found("User", "postz", RelationFrom::Undefined);
        let message = err.to_string();

        assert!(message.contains("'postz'"));
        assert!(message.contains("'User'"));
        assert!(err.is_relation_error());
    }

    #[test]
    fn test_guessed_mapping_message_points_to_factory() {
        let err = ModelError::relation_mapping_not_found("Post", "user", RelationFrom::BelongsTo);
        let message = err.to_string();

        assert!(message.contains("'belongs_to'"));
        assert!(message.contains("guessed relationship name is 'user'"));

        let err = ModelError::relation_mapping_not_found("User", "roles", RelationFrom::BelongsToMany);
        assert!(err.to_string().contains("'belongs_to_many'"));
    }

    #[test]
    fn test_not_loaded_carries_fields() {
        match ModelError::relation_not_loaded("User", "posts") {
            ModelError::RelationNotLoaded { model, relation } => {
                assert_eq!(model, "User");
                assert_eq!(relation, "posts");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
