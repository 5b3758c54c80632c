//! PostgreSQL Backend Implementation
//!
//! This module provides the PostgreSQL implementation of [`DatabaseConnection`]
//! using sqlx as the underlying database driver. Queries are compiled with `$n`
//! placeholders and their parameters bound in order.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{Column, ConnectOptions, PgPool, Postgres, Row, TypeInfo, ValueRef};

use crate::config::DatabaseConfig;
use crate::error::{OrmError, OrmResult};
use crate::query::QueryBuilder;

use super::core::*;

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// PostgreSQL connection pool
#[derive(Debug, Clone)]
pub struct PostgresConnection {
    pool: PgPool,
}

impl PostgresConnection {
    /// Wrap an existing sqlx pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a pool from `config`
    pub async fn connect(config: &DatabaseConfig) -> OrmResult<Self> {
        config.validate()?;

        let mut options: sqlx::postgres::PgConnectOptions = config
            .url
            .parse()
            .map_err(|e| OrmError::Configuration(format!("Invalid PostgreSQL URL: {}", e)))?;
        if !config.log_statements {
            options = options.disable_statement_logging();
        }

        let mut pool_options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds));
        if let Some(idle_timeout) = config.idle_timeout_seconds {
            pool_options = pool_options.idle_timeout(Duration::from_secs(idle_timeout));
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| OrmError::Connection(format!("Failed to create PostgreSQL pool: {}", e)))?;

        tracing::info!(max_connections = config.max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn prepare<'q>(sql: &'q str, params: &[DatabaseValue]) -> OrmResult<PgQuery<'q>> {
        params
            .iter()
            .try_fold(sqlx::query(sql), |query, param| bind_database_value(query, param))
    }
}

#[async_trait]
impl DatabaseConnection for PostgresConnection {
    async fn select(&self, query: &QueryBuilder) -> OrmResult<Vec<Attributes>> {
        let (sql, params) = query.to_sql_with_params();
        let rows = Self::prepare(&sql, &params)?
            .fetch_all(&self.pool)
            .await
            .map_err(|e| OrmError::Query(format!("Query fetch failed: {}", e)))?;

        rows.iter().map(row_to_attributes).collect()
    }

    async fn affecting_statement(&self, query: &QueryBuilder) -> OrmResult<u64> {
        let (sql, params) = query.to_sql_with_params();
        let result = Self::prepare(&sql, &params)?
            .execute(&self.pool)
            .await
            .map_err(|e| OrmError::Query(format!("Query execution failed: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn insert_get_id(&self, query: &QueryBuilder, key_name: &str) -> OrmResult<DatabaseValue> {
        let (sql, params) = query.to_sql_with_params();
        let sql = format!("{} RETURNING {}", sql, key_name);
        let row = Self::prepare(&sql, &params)?
            .fetch_one(&self.pool)
            .await
            .map_err(|e| OrmError::Query(format!("Insert failed: {}", e)))?;

        postgres_value_to_database_value(&row, 0)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

fn row_to_attributes(row: &PgRow) -> OrmResult<Attributes> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(index, column)| Ok((column.name().to_string(), postgres_value_to_database_value(row, index)?)))
        .collect()
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'q>(query: PgQuery<'q>, value: &DatabaseValue) -> OrmResult<PgQuery<'q>> {
    match value {
        DatabaseValue::Null => Ok(query.bind(Option::<String>::None)),
        DatabaseValue::Bool(b) => Ok(query.bind(*b)),
        DatabaseValue::Int32(i) => Ok(query.bind(*i)),
        DatabaseValue::Int64(i) => Ok(query.bind(*i)),
        DatabaseValue::Float32(f) => Ok(query.bind(*f)),
        DatabaseValue::Float64(f) => Ok(query.bind(*f)),
        DatabaseValue::String(s) => Ok(query.bind(s.clone())),
        DatabaseValue::Bytes(b) => Ok(query.bind(b.clone())),
        DatabaseValue::Uuid(u) => Ok(query.bind(*u)),
        DatabaseValue::DateTime(dt) => Ok(query.bind(*dt)),
        DatabaseValue::Date(d) => Ok(query.bind(*d)),
        DatabaseValue::Time(t) => Ok(query.bind(*t)),
        DatabaseValue::Json(j) => Ok(query.bind(j.clone())),
        DatabaseValue::Array(_) => Err(OrmError::Query("Array parameters are not supported".to_string())),
    }
}

/// Convert a PostgreSQL column value to DatabaseValue
fn postgres_value_to_database_value(row: &PgRow, index: usize) -> OrmResult<DatabaseValue> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| OrmError::Query(format!("Failed to read column {}: {}", index, e)))?;
    if raw.is_null() {
        return Ok(DatabaseValue::Null);
    }

    let type_name = row.columns()[index].type_info().name();
    let err = |e: sqlx::Error| OrmError::Query(format!("Failed to decode {} value: {}", type_name, e));

    let value = match type_name {
        "BOOL" => DatabaseValue::Bool(row.try_get(index).map_err(err)?),
        "INT2" => DatabaseValue::Int32(row.try_get::<i16, _>(index).map_err(err)? as i32),
        "INT4" => DatabaseValue::Int32(row.try_get(index).map_err(err)?),
        "INT8" => DatabaseValue::Int64(row.try_get(index).map_err(err)?),
        "FLOAT4" => DatabaseValue::Float32(row.try_get(index).map_err(err)?),
        "FLOAT8" => DatabaseValue::Float64(row.try_get(index).map_err(err)?),
        "BYTEA" => DatabaseValue::Bytes(row.try_get(index).map_err(err)?),
        "UUID" => DatabaseValue::Uuid(row.try_get(index).map_err(err)?),
        "TIMESTAMPTZ" => DatabaseValue::DateTime(row.try_get(index).map_err(err)?),
        "TIMESTAMP" => {
            let value: chrono::NaiveDateTime = row.try_get(index).map_err(err)?;
            DatabaseValue::DateTime(value.and_utc())
        }
        "DATE" => DatabaseValue::Date(row.try_get(index).map_err(err)?),
        "TIME" => DatabaseValue::Time(row.try_get(index).map_err(err)?),
        "JSON" | "JSONB" => DatabaseValue::Json(row.try_get::<JsonValue, _>(index).map_err(err)?),
        _ => DatabaseValue::String(row.try_get(index).map_err(err)?),
    };

    Ok(value)
}
