//! Relationship existence queries
//!
//! `has` and `where_has` constrain a query to parents with (or without) related
//! rows, compiled as a correlated `EXISTS` sub-query or, when a count other than
//! "at least one" is asked for, as a correlated `COUNT(*)` compared to a number.
//! Dotted names walk nested relations, each hop becoming a sub-query of the
//! previous one.

use std::any::Any;
use std::collections::VecDeque;

use crate::error::{OrmResult, RelationFrom};
use crate::model::Model;
use crate::query::{Boolean, QueryBuilder, QueryOperator};

use super::registry::ExpectedRelated;

/// Boxed `where_has` callback for the related query
pub type HasCallback<R> = Box<dyn FnOnce(QueryBuilder<R>) -> QueryBuilder<R> + Send>;

/// Whether the comparison can be written as `[NOT] EXISTS`
pub(crate) fn can_use_exists(operator: QueryOperator, count: i64) -> bool {
    count == 1 && matches!(operator, QueryOperator::GreaterThanOrEqual | QueryOperator::LessThan)
}

/// Comparison and callback for the last relation of a dotted path
pub struct HasTail {
    pub(crate) operator: QueryOperator,
    pub(crate) count: i64,
    pub(crate) callback: Option<Box<dyn Any + Send>>,
    pub(crate) expected: Option<ExpectedRelated>,
}

/// One hop of an existence query
pub struct HasRequest {
    pub(crate) operator: QueryOperator,
    pub(crate) count: i64,
    pub(crate) boolean: Boolean,
    /// Relations still to walk after this one
    pub(crate) remaining: VecDeque<String>,
    pub(crate) tail: HasTail,
}

impl<M: Model> QueryBuilder<M> {
    /// Resolve `relation` on `M` and append its existence clause
    pub(crate) fn add_has_request(self, relation: &str, request: HasRequest) -> OrmResult<Self> {
        let entry = M::relations().resolve(relation, RelationFrom::Undefined)?;
        let clause = entry.existence(&M::default(), &self, request)?;
        Ok(self.add_where(clause))
    }

    fn has_internal(
        self,
        relation: &str,
        operator: QueryOperator,
        count: i64,
        boolean: Boolean,
        callback: Option<Box<dyn Any + Send>>,
        expected: Option<ExpectedRelated>,
    ) -> OrmResult<Self> {
        let mut segments: VecDeque<String> = relation.split('.').map(str::to_string).collect();
        let first = segments.pop_front().unwrap_or_default();

        if segments.is_empty() {
            let tail = HasTail {
                operator,
                count,
                callback,
                expected,
            };
            let request = HasRequest {
                operator,
                count,
                boolean,
                remaining: segments,
                tail,
            };
            return self.add_has_request(&first, request);
        }

        // A nested "doesn't have" negates the first hop, the rest ask for existence
        let doesnt_have = operator == QueryOperator::LessThan && count == 1;
        let tail = if doesnt_have {
            HasTail {
                operator: QueryOperator::GreaterThanOrEqual,
                count: 1,
                callback,
                expected,
            }
        } else {
            HasTail {
                operator,
                count,
                callback,
                expected,
            }
        };

        let request = HasRequest {
            operator: if doesnt_have {
                QueryOperator::LessThan
            } else {
                QueryOperator::GreaterThanOrEqual
            },
            count: 1,
            boolean,
            remaining: segments,
            tail,
        };
        self.add_has_request(&first, request)
    }

    /// Parents with at least one related row
    pub fn has(self, relation: &str) -> OrmResult<Self> {
        self.has_count(relation, QueryOperator::GreaterThanOrEqual, 1)
    }

    /// Parents whose related row count satisfies `operator count`
    pub fn has_count(self, relation: &str, operator: QueryOperator, count: i64) -> OrmResult<Self> {
        self.has_internal(relation, operator, count, Boolean::And, None, None)
    }

    pub fn or_has(self, relation: &str) -> OrmResult<Self> {
        self.has_internal(relation, QueryOperator::GreaterThanOrEqual, 1, Boolean::Or, None, None)
    }

    pub fn or_has_count(self, relation: &str, operator: QueryOperator, count: i64) -> OrmResult<Self> {
        self.has_internal(relation, operator, count, Boolean::Or, None, None)
    }

    /// Parents without any related row
    pub fn doesnt_have(self, relation: &str) -> OrmResult<Self> {
        self.has_internal(relation, QueryOperator::LessThan, 1, Boolean::And, None, None)
    }

    pub fn or_doesnt_have(self, relation: &str) -> OrmResult<Self> {
        self.has_internal(relation, QueryOperator::LessThan, 1, Boolean::Or, None, None)
    }

    /// General existence query, `callback` constrains the related query of the last hop
    pub fn has_related<R, F>(
        self,
        relation: &str,
        operator: QueryOperator,
        count: i64,
        boolean: Boolean,
        callback: F,
    ) -> OrmResult<Self>
    where
        R: Model,
        F: FnOnce(QueryBuilder<R>) -> QueryBuilder<R> + Send + 'static,
    {
        let callback: HasCallback<R> = Box::new(callback);
        self.has_internal(
            relation,
            operator,
            count,
            boolean,
            Some(Box::new(callback)),
            Some(ExpectedRelated::of::<R>()),
        )
    }

    /// Parents with at least one related row matching `callback`
    pub fn where_has<R, F>(self, relation: &str, callback: F) -> OrmResult<Self>
    where
        R: Model,
        F: FnOnce(QueryBuilder<R>) -> QueryBuilder<R> + Send + 'static,
    {
        self.has_related(relation, QueryOperator::GreaterThanOrEqual, 1, Boolean::And, callback)
    }

    /// Parents whose matching related row count satisfies `operator count`
    pub fn where_has_count<R, F>(
        self,
        relation: &str,
        callback: F,
        operator: QueryOperator,
        count: i64,
    ) -> OrmResult<Self>
    where
        R: Model,
        F: FnOnce(QueryBuilder<R>) -> QueryBuilder<R> + Send + 'static,
    {
        self.has_related(relation, operator, count, Boolean::And, callback)
    }

    pub fn or_where_has<R, F>(self, relation: &str, callback: F) -> OrmResult<Self>
    where
        R: Model,
        F: FnOnce(QueryBuilder<R>) -> QueryBuilder<R> + Send + 'static,
    {
        self.has_related(relation, QueryOperator::GreaterThanOrEqual, 1, Boolean::Or, callback)
    }

    /// Parents without a related row matching `callback`
    pub fn where_doesnt_have<R, F>(self, relation: &str, callback: F) -> OrmResult<Self>
    where
        R: Model,
        F: FnOnce(QueryBuilder<R>) -> QueryBuilder<R> + Send + 'static,
    {
        self.has_related(relation, QueryOperator::LessThan, 1, Boolean::And, callback)
    }

    pub fn or_where_doesnt_have<R, F>(self, relation: &str, callback: F) -> OrmResult<Self>
    where
        R: Model,
        F: FnOnce(QueryBuilder<R>) -> QueryBuilder<R> + Send + 'static,
    {
        self.has_related(relation, QueryOperator::LessThan, 1, Boolean::Or, callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exists_is_used_only_for_at_least_one_or_none() {
        assert!(can_use_exists(QueryOperator::GreaterThanOrEqual, 1));
        assert!(can_use_exists(QueryOperator::LessThan, 1));
        assert!(!can_use_exists(QueryOperator::GreaterThanOrEqual, 2));
        assert!(!can_use_exists(QueryOperator::Equal, 1));
        assert!(!can_use_exists(QueryOperator::GreaterThan, 0));
    }
}
