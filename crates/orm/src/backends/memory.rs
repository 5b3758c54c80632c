//! In-memory Backend Implementation
//!
//! Evaluates the structured query directly against rows held in memory: joins,
//! where clauses with `AND` binding tighter than `OR`, correlated `EXISTS` and
//! `COUNT` sub-queries, ordering, limits and aggregates. Every executed query is
//! recorded with its inlined SQL so tests can assert on the statements a
//! relation operation issued.
//!
//! Writes are not transactional: update and delete pick their rows on a
//! snapshot and apply the change afterwards.

use std::cmp::Ordering;
use std::iter;
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{OrmError, OrmResult};
use crate::query::{
    Aggregate, AggregateFunction, Boolean, JoinType, OrderDirection, QueryBuilder, QueryOperator, QueryType,
    WhereClause,
};

use super::core::*;

/// Rows of the from table and the joined tables, keyed by the name they are referenced by
type Frame = Vec<(String, Attributes)>;

/// Database held in process memory
#[derive(Debug, Default)]
pub struct MemoryConnection {
    tables: DashMap<String, Vec<Attributes>>,
    statements: Mutex<Vec<String>>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rows to a table, creating it when missing
    pub fn seed<I>(&self, table: &str, rows: I)
    where
        I: IntoIterator<Item = Attributes>,
    {
        self.tables.entry(table.to_string()).or_default().extend(rows);
    }

    /// Snapshot of a table's rows, empty for an unknown table
    pub fn rows(&self, table: &str) -> Vec<Attributes> {
        self.tables
            .get(table)
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }

    /// Inlined SQL of every statement executed so far
    pub fn statements(&self) -> Vec<String> {
        self.lock_statements().clone()
    }

    pub fn statement_count(&self) -> usize {
        self.lock_statements().len()
    }

    pub fn clear_statements(&self) {
        self.lock_statements().clear();
    }

    fn lock_statements(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.statements
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, query: &QueryBuilder) {
        self.lock_statements().push(query.to_sql());
    }

    fn run_select(&self, query: &QueryBuilder, outer: &[&Frame]) -> OrmResult<Vec<Attributes>> {
        if !query.groups.is_empty() {
            return Err(OrmError::Query("GROUP BY is not supported by the memory backend".to_string()));
        }

        let mut frames = self.matching_frames(query, outer)?;

        if let Some(aggregate) = &query.aggregate {
            let value = aggregate_value(aggregate, &frames, outer);
            return Ok(vec![attributes([("aggregate", value)])]);
        }

        if !query.orders.is_empty() {
            frames.sort_by(|a, b| {
                for (column, direction) in &query.orders {
                    let left = resolve(column, &chain(outer, a));
                    let right = resolve(column, &chain(outer, b));
                    let ordering = order_values(&left, &right);
                    let ordering = match direction {
                        OrderDirection::Asc => ordering,
                        OrderDirection::Desc => ordering.reverse(),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let mut rows: Vec<Attributes> = Vec::with_capacity(frames.len());
        for frame in &frames {
            let row = project(&query.columns, frame, outer);
            if !query.distinct || !rows.contains(&row) {
                rows.push(row);
            }
        }

        let offset = query.offset_value.unwrap_or(0).max(0) as usize;
        let limit = query.limit_count.map_or(usize::MAX, |limit| limit.max(0) as usize);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    /// Frames of the from table and joins that pass the where clauses
    fn matching_frames(&self, query: &QueryBuilder, outer: &[&Frame]) -> OrmResult<Vec<Frame>> {
        let reference = query.table_reference().to_string();
        let mut frames: Vec<Frame> = self
            .rows(query.get_table())
            .into_iter()
            .map(|row| vec![(reference.clone(), row)])
            .collect();

        for join in &query.joins {
            if join.join_type == JoinType::Right {
                return Err(OrmError::Query("RIGHT JOIN is not supported by the memory backend".to_string()));
            }

            let joined = self.rows(&join.table);
            let mut next = Vec::new();
            for frame in frames {
                let mut matched = false;
                for row in &joined {
                    let mut candidate = frame.clone();
                    candidate.push((join.reference().to_string(), row.clone()));

                    let on = chain(outer, &candidate);
                    let matches = join.on_conditions.iter().all(|(left, right)| {
                        resolve(left, &on).compare(&resolve(right, &on)) == Some(Ordering::Equal)
                    });
                    if matches {
                        next.push(candidate);
                        matched = true;
                    }
                }
                if !matched && join.join_type == JoinType::Left {
                    let mut candidate = frame;
                    candidate.push((join.reference().to_string(), Attributes::new()));
                    next.push(candidate);
                }
            }
            frames = next;
        }

        let mut matching = Vec::with_capacity(frames.len());
        for frame in frames {
            if self.eval_wheres(&query.wheres, &frame, outer)? {
                matching.push(frame);
            }
        }
        Ok(matching)
    }

    fn eval_wheres(&self, wheres: &[WhereClause], frame: &Frame, outer: &[&Frame]) -> OrmResult<bool> {
        if wheres.is_empty() {
            return Ok(true);
        }

        // AND groups separated by OR
        let mut any = false;
        let mut group = true;
        for (index, clause) in wheres.iter().enumerate() {
            if index > 0 && clause.boolean() == Boolean::Or {
                any |= group;
                group = true;
            }
            if group {
                group = self.eval_where(clause, frame, outer)?;
            }
        }
        Ok(any || group)
    }

    fn eval_where(&self, clause: &WhereClause, frame: &Frame, outer: &[&Frame]) -> OrmResult<bool> {
        let scopes = chain(outer, frame);

        match clause {
            WhereClause::Basic { column, operator, value, .. } => {
                Ok(compare_values(&resolve(column, &scopes), *operator, value))
            }
            WhereClause::In { column, values, not, .. } => {
                let left = resolve(column, &scopes);
                if left.is_null() {
                    return Ok(false);
                }
                let found = values
                    .iter()
                    .any(|value| value.compare(&left) == Some(Ordering::Equal));
                Ok(found != *not)
            }
            WhereClause::Null { column, not, .. } => Ok(resolve(column, &scopes).is_null() != *not),
            WhereClause::Column { first, operator, second, .. } => Ok(compare_values(
                &resolve(first, &scopes),
                *operator,
                &resolve(second, &scopes),
            )),
            WhereClause::Exists { query, not, .. } => {
                let exists = !self.run_select(query, &scopes)?.is_empty();
                Ok(exists != *not)
            }
            WhereClause::Count { query, operator, count, .. } => {
                let value = self
                    .run_select(query, &scopes)?
                    .into_iter()
                    .next()
                    .and_then(|mut row| row.remove("aggregate"))
                    .unwrap_or(DatabaseValue::Int64(0));
                Ok(compare_values(&value, *operator, &DatabaseValue::Int64(*count)))
            }
            WhereClause::Nested { query, .. } => self.eval_wheres(&query.wheres, frame, outer),
            WhereClause::Raw { .. } => Err(OrmError::Query(
                "Raw where clauses are not supported by the memory backend".to_string(),
            )),
        }
    }

    /// Indexes of the rows of the query's table matching its where clauses
    fn matching_indexes(&self, query: &QueryBuilder) -> OrmResult<Vec<usize>> {
        if !query.joins.is_empty() {
            return Err(OrmError::Query("Joins in write statements are not supported by the memory backend".to_string()));
        }

        let reference = query.table_reference().to_string();
        let mut indexes = Vec::new();
        for (index, row) in self.rows(query.get_table()).into_iter().enumerate() {
            let frame = vec![(reference.clone(), row)];
            if self.eval_wheres(&query.wheres, &frame, &[])? {
                indexes.push(index);
            }
        }
        Ok(indexes)
    }

    fn insert_rows(&self, query: &QueryBuilder) -> u64 {
        let rows: Vec<Attributes> = query
            .insert_rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|clause| (clause.column.clone(), clause.value.clone()))
                    .collect()
            })
            .collect();

        let count = rows.len() as u64;
        self.seed(query.get_table(), rows);
        count
    }
}

#[async_trait]
impl DatabaseConnection for MemoryConnection {
    async fn select(&self, query: &QueryBuilder) -> OrmResult<Vec<Attributes>> {
        self.record(query);
        self.run_select(query, &[])
    }

    async fn affecting_statement(&self, query: &QueryBuilder) -> OrmResult<u64> {
        self.record(query);

        match query.query_type {
            QueryType::Insert => Ok(self.insert_rows(query)),
            QueryType::Update => {
                let indexes = self.matching_indexes(query)?;
                if let Some(mut rows) = self.tables.get_mut(query.get_table()) {
                    for &index in &indexes {
                        if let Some(row) = rows.get_mut(index) {
                            for clause in &query.set_clauses {
                                row.insert(clause.column.clone(), clause.value.clone());
                            }
                        }
                    }
                }
                Ok(indexes.len() as u64)
            }
            QueryType::Delete => {
                let indexes = self.matching_indexes(query)?;
                if let Some(mut rows) = self.tables.get_mut(query.get_table()) {
                    for &index in indexes.iter().rev() {
                        if index < rows.len() {
                            rows.remove(index);
                        }
                    }
                }
                Ok(indexes.len() as u64)
            }
            QueryType::Select => Err(OrmError::Query(
                "A select query can not be run as an affecting statement".to_string(),
            )),
        }
    }

    async fn insert_get_id(&self, query: &QueryBuilder, key_name: &str) -> OrmResult<DatabaseValue> {
        self.record(query);

        let mut row: Attributes = query
            .insert_rows
            .first()
            .ok_or_else(|| OrmError::Query("Insert without values".to_string()))?
            .iter()
            .map(|clause| (clause.column.clone(), clause.value.clone()))
            .collect();

        let mut rows = self.tables.entry(query.get_table().to_string()).or_default();
        let id = match row.get(key_name) {
            Some(value) if !value.is_null() => value.clone(),
            _ => {
                let last = rows
                    .iter()
                    .filter_map(|existing| existing.get(key_name).and_then(DatabaseValue::as_i64))
                    .max()
                    .unwrap_or(0);
                DatabaseValue::Int64(last + 1)
            }
        };

        row.insert(key_name.to_string(), id.clone());
        rows.push(row);
        Ok(id)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Outer frames followed by the current one, innermost last
fn chain<'a>(outer: &[&'a Frame], frame: &'a Frame) -> Vec<&'a Frame> {
    outer.iter().copied().chain(iter::once(frame)).collect()
}

/// Value of a column; qualified names search the frames innermost first, plain
/// names only the innermost frame
fn resolve(column: &str, scopes: &[&Frame]) -> DatabaseValue {
    if let Some((reference, name)) = column.rsplit_once('.') {
        for frame in scopes.iter().rev() {
            if let Some((_, row)) = frame.iter().find(|(candidate, _)| candidate == reference) {
                return row.get(name).cloned().unwrap_or_default();
            }
        }
        return DatabaseValue::Null;
    }

    scopes
        .last()
        .and_then(|frame| frame.iter().find_map(|(_, row)| row.get(column)))
        .cloned()
        .unwrap_or_default()
}

fn compare_values(left: &DatabaseValue, operator: QueryOperator, right: &DatabaseValue) -> bool {
    match operator {
        QueryOperator::Like | QueryOperator::NotLike => {
            let (DatabaseValue::String(text), DatabaseValue::String(pattern)) = (left, right) else {
                return false;
            };
            let matched = like(text, pattern);
            if operator == QueryOperator::Like {
                matched
            } else {
                !matched
            }
        }
        _ => left
            .compare(right)
            .is_some_and(|ordering| operator.accepts(ordering)),
    }
}

/// SQL `LIKE` with `%` and `_` wildcards
fn like(text: &str, pattern: &str) -> bool {
    fn matches(text: &[char], pattern: &[char]) -> bool {
        match pattern.split_first() {
            None => text.is_empty(),
            Some(('%', rest)) => (0..=text.len()).any(|skip| matches(&text[skip..], rest)),
            Some(('_', rest)) => !text.is_empty() && matches(&text[1..], rest),
            Some((c, rest)) => text.first() == Some(c) && matches(&text[1..], rest),
        }
    }

    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    matches(&text, &pattern)
}

/// Ordering for ORDER BY, nulls first
fn order_values(left: &DatabaseValue, right: &DatabaseValue) -> Ordering {
    match (left.is_null(), right.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => left.compare(right).unwrap_or(Ordering::Equal),
    }
}

fn aggregate_value(aggregate: &Aggregate, frames: &[Frame], outer: &[&Frame]) -> DatabaseValue {
    if aggregate.function == AggregateFunction::Count && aggregate.column == "*" {
        return DatabaseValue::Int64(frames.len() as i64);
    }

    let values: Vec<DatabaseValue> = frames
        .iter()
        .map(|frame| resolve(&aggregate.column, &chain(outer, frame)))
        .filter(|value| !value.is_null())
        .collect();

    match aggregate.function {
        AggregateFunction::Count => DatabaseValue::Int64(values.len() as i64),
        AggregateFunction::Min => values
            .into_iter()
            .reduce(|a, b| if order_values(&b, &a) == Ordering::Less { b } else { a })
            .unwrap_or_default(),
        AggregateFunction::Max => values
            .into_iter()
            .reduce(|a, b| if order_values(&b, &a) == Ordering::Greater { b } else { a })
            .unwrap_or_default(),
        AggregateFunction::Sum if values.is_empty() => DatabaseValue::Null,
        AggregateFunction::Sum => {
            if values
                .iter()
                .all(|value| matches!(value, DatabaseValue::Int32(_) | DatabaseValue::Int64(_)))
            {
                DatabaseValue::Int64(values.iter().filter_map(DatabaseValue::as_i64).sum())
            } else {
                DatabaseValue::Float64(values.iter().filter_map(DatabaseValue::as_f64).sum())
            }
        }
        AggregateFunction::Avg if values.is_empty() => DatabaseValue::Null,
        AggregateFunction::Avg => {
            let sum: f64 = values.iter().filter_map(DatabaseValue::as_f64).sum();
            DatabaseValue::Float64(sum / values.len() as f64)
        }
    }
}

/// Build the selected row of a frame
fn project(columns: &[String], frame: &Frame, outer: &[&Frame]) -> Attributes {
    let mut row = Attributes::new();

    let merge_all = |row: &mut Attributes| {
        for (_, source) in frame {
            for (key, value) in source {
                row.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
    };

    if columns.is_empty() {
        merge_all(&mut row);
        return row;
    }

    let scopes = chain(outer, frame);
    for column in columns {
        if let Some(index) = column.to_ascii_lowercase().find(" as ") {
            let expression = column[..index].trim();
            let alias = column[index + 4..].trim();
            row.insert(alias.to_string(), resolve(expression, &scopes));
        } else if column == "*" {
            merge_all(&mut row);
        } else if let Some(reference) = column.strip_suffix(".*") {
            if let Some((_, source)) = frame.iter().find(|(candidate, _)| candidate == reference) {
                row.extend(source.iter().map(|(key, value)| (key.clone(), value.clone())));
            }
        } else {
            let key = column.rsplit('.').next().unwrap_or(column);
            row.insert(key.to_string(), resolve(column, &scopes));
        }
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryConnection {
        let conn = MemoryConnection::new();
        conn.seed(
            "users",
            vec![
                attributes([("id", DatabaseValue::Int64(1)), ("name", "ada".into())]),
                attributes([("id", DatabaseValue::Int64(2)), ("name", "grace".into())]),
                attributes([("id", DatabaseValue::Int64(3)), ("name", "linus".into())]),
            ],
        );
        conn.seed(
            "posts",
            vec![
                attributes([("id", 10i64), ("user_id", 1i64), ("votes", 5i64)]),
                attributes([("id", 11i64), ("user_id", 1i64), ("votes", 7i64)]),
                attributes([("id", 12i64), ("user_id", 2i64), ("votes", 1i64)]),
            ],
        );
        conn
    }

    #[tokio::test]
    async fn test_and_binds_tighter_than_or() {
        let conn = seeded();
        let query: QueryBuilder = QueryBuilder::new()
            .from("users")
            .where_eq("name", "ada")
            .where_eq("id", 2)
            .or_where_eq("name", "linus");

        let rows = conn.select(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], DatabaseValue::from("linus"));
    }

    #[tokio::test]
    async fn test_correlated_exists_and_count() {
        let conn = seeded();
        let posts: QueryBuilder = QueryBuilder::new()
            .from("posts")
            .where_column("users.id", QueryOperator::Equal, "posts.user_id");

        let with_posts = QueryBuilder::<()>::new()
            .from("users")
            .where_exists(posts.clone())
            .order_by("id");
        let ids: Vec<_> = conn
            .select(&with_posts)
            .await
            .unwrap()
            .into_iter()
            .map(|row| row["id"].clone())
            .collect();
        assert_eq!(ids, vec![DatabaseValue::Int64(1), DatabaseValue::Int64(2)]);

        let prolific = QueryBuilder::<()>::new().from("users").add_where(WhereClause::Count {
            query: Box::new(posts.select_count()),
            operator: QueryOperator::GreaterThanOrEqual,
            count: 2,
            boolean: Boolean::And,
        });
        let rows = conn.select(&prolific).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], DatabaseValue::from("ada"));
    }

    #[tokio::test]
    async fn test_join_projection_and_aliases() {
        let conn = seeded();
        let query: QueryBuilder = QueryBuilder::new()
            .from("posts")
            .select(&["posts.*", "users.name as author"])
            .join("users", "users.id", "posts.user_id")
            .order_by_desc("posts.votes")
            .limit(2);

        let rows = conn.select(&query).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], DatabaseValue::Int64(11));
        assert_eq!(rows[0]["author"], DatabaseValue::from("ada"));
        assert_eq!(rows[1]["votes"], DatabaseValue::Int64(5));
    }

    #[tokio::test]
    async fn test_writes_and_aggregates() {
        let conn = seeded();

        let id = conn
            .insert_get_id(
                &QueryBuilder::<()>::new()
                    .from("users")
                    .into_insert(vec![attributes([("name", "barbara")])]),
                "id",
            )
            .await
            .unwrap();
        assert_eq!(id, DatabaseValue::Int64(4));

        let updated = conn
            .affecting_statement(
                &QueryBuilder::<()>::new()
                    .from("posts")
                    .where_eq("user_id", 1)
                    .into_update(attributes([("votes", 0i64)])),
            )
            .await
            .unwrap();
        assert_eq!(updated, 2);

        let sum = conn
            .select(&QueryBuilder::<()>::new().from("posts").select_aggregate(AggregateFunction::Sum, "votes"))
            .await
            .unwrap();
        assert_eq!(sum[0]["aggregate"], DatabaseValue::Int64(1));

        let deleted = conn
            .affecting_statement(&QueryBuilder::<()>::new().from("posts").where_in("id", [10, 12]).into_delete())
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(conn.rows("posts").len(), 1);
        assert_eq!(conn.statement_count(), 4);
    }

    #[test]
    fn test_like_wildcards() {
        assert!(like("grace", "gr%"));
        assert!(like("grace", "_race"));
        assert!(like("grace", "%a%e"));
        assert!(!like("grace", "ada%"));
    }
}
