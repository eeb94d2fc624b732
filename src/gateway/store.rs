//! Local relational store gateway
//!
//! Generic query/read/insert/update/delete against catalog entities backed
//! by Postgres. SQL is assembled with `QueryBuilder`: identifiers come only
//! from the static entity catalog and every value is a bound parameter.
//! Rows travel as `row_to_json` objects so the gateway needs no per-entity
//! row types.
//!
//! A connection is acquired from the pool per operation and released when
//! it drops, on every exit path. Absence on `read_one` is a normal empty
//! result; every other fault is categorized into [`BackendFailure`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use sqlx::error::ErrorKind;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};

use crate::catalog::EntityDef;
use crate::config::DatabaseConfig;
use crate::error::BackendFailure;
use crate::request::{EntityKey, EntityRecord};

/// Sort direction for collection queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderDirection {
    Ascending,
    Descending,
}

impl OrderDirection {
    fn sql(self) -> &'static str {
        match self {
            OrderDirection::Ascending => "ASC",
            OrderDirection::Descending => "DESC",
        }
    }
}

impl Default for OrderDirection {
    fn default() -> Self {
        OrderDirection::Descending
    }
}

/// Order-by clause applied to a collection query
#[derive(Debug, Clone, Copy)]
pub struct OrderBy {
    pub field: &'static str,
    pub direction: OrderDirection,
}

/// Single-field equality predicate
#[derive(Debug, Clone)]
pub struct QueryFilter {
    pub field: &'static str,
    pub value: JsonValue,
}

/// Typed access to the local store by catalog entity
#[async_trait]
pub trait LocalStoreGateway: Send + Sync {
    async fn query(
        &self,
        entity: &EntityDef,
        filter: Option<&QueryFilter>,
        order: OrderBy,
    ) -> Result<Vec<EntityRecord>, BackendFailure>;

    /// Key-based read restricted to a projection. `Ok(None)` means the row
    /// does not exist; that is not a failure.
    async fn read_one(
        &self,
        entity: &EntityDef,
        key: &EntityKey,
        projection: &[&str],
    ) -> Result<Option<EntityRecord>, BackendFailure>;

    /// Insert a row and return it as stored
    async fn insert(
        &self,
        entity: &EntityDef,
        payload: &EntityRecord,
    ) -> Result<EntityRecord, BackendFailure>;

    async fn update(
        &self,
        entity: &EntityDef,
        payload: &EntityRecord,
        key: &EntityKey,
    ) -> Result<(), BackendFailure>;

    async fn delete(&self, entity: &EntityDef, key: &EntityKey) -> Result<(), BackendFailure>;
}

/// Production gateway over a Postgres pool
#[derive(Clone, Debug)]
pub struct PgLocalStore {
    pool: PgPool,
}

impl PgLocalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using the connection string named by the configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = std::env::var(&config.connection_string_env).with_context(|| {
            format!(
                "Connection string env var {} is not set",
                config.connection_string_env
            )
        })?;
        let pool = PgPool::connect(&url)
            .await
            .context("Failed to connect to the local store")?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn table(entity: &EntityDef) -> String {
    format!(r#""{}"."{}""#, entity.namespace, entity.name)
}

fn push_columns(builder: &mut QueryBuilder<'static, Postgres>, fields: &[&str]) {
    let mut first = true;
    for field in fields {
        if !first {
            builder.push(", ");
        }
        first = false;
        builder.push(format!(r#""{field}""#));
    }
}

/// Bind a scalar JSON value as the matching SQL type
fn push_bind_value(builder: &mut QueryBuilder<'static, Postgres>, value: &JsonValue) {
    match value {
        JsonValue::Null => {
            builder.push_bind(Option::<String>::None);
        }
        JsonValue::Bool(flag) => {
            builder.push_bind(*flag);
        }
        JsonValue::Number(number) => {
            if let Some(int) = number.as_i64() {
                builder.push_bind(int);
            } else {
                builder.push_bind(number.as_f64().unwrap_or(0.0));
            }
        }
        JsonValue::String(text) => {
            builder.push_bind(text.clone());
        }
        other => {
            builder.push_bind(other.clone());
        }
    }
}

fn push_key_predicate(builder: &mut QueryBuilder<'static, Postgres>, key: &EntityKey) {
    builder.push(" WHERE ");
    let mut first = true;
    for (field, value) in key.iter() {
        if !first {
            builder.push(" AND ");
        }
        first = false;
        builder.push(format!(r#""{field}" = "#));
        push_bind_value(builder, value);
    }
}

fn build_select(
    entity: &EntityDef,
    filter: Option<&QueryFilter>,
    order: OrderBy,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT row_to_json(t) FROM (SELECT ");
    push_columns(&mut builder, entity.fields);
    builder.push(" FROM ");
    builder.push(table(entity));
    if let Some(filter) = filter {
        builder.push(format!(r#" WHERE "{}" = "#, filter.field));
        push_bind_value(&mut builder, &filter.value);
    }
    builder.push(format!(r#" ORDER BY "{}" {}"#, order.field, order.direction.sql()));
    builder.push(") t");
    builder
}

fn build_read_one(
    entity: &EntityDef,
    key: &EntityKey,
    projection: &[&str],
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT row_to_json(t) FROM (SELECT ");
    push_columns(&mut builder, projection);
    builder.push(" FROM ");
    builder.push(table(entity));
    push_key_predicate(&mut builder, key);
    builder.push(") t");
    builder
}

fn build_insert(entity: &EntityDef, payload: &EntityRecord) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("INSERT INTO ");
    builder.push(table(entity));
    builder.push(" AS t (");
    let fields: Vec<&str> = payload.keys().map(String::as_str).collect();
    push_columns(&mut builder, &fields);
    builder.push(") VALUES (");
    let mut first = true;
    for value in payload.values() {
        if !first {
            builder.push(", ");
        }
        first = false;
        push_bind_value(&mut builder, value);
    }
    builder.push(") RETURNING row_to_json(t)");
    builder
}

/// Returns None when the payload leaves nothing to set once key fields are
/// excluded.
fn build_update(
    entity: &EntityDef,
    payload: &EntityRecord,
    key: &EntityKey,
) -> Option<QueryBuilder<'static, Postgres>> {
    let updates: Vec<(&String, &JsonValue)> = payload
        .iter()
        .filter(|(field, _)| key.get(field).is_none())
        .collect();
    if updates.is_empty() {
        return None;
    }

    let mut builder = QueryBuilder::new("UPDATE ");
    builder.push(table(entity));
    builder.push(" SET ");
    let mut first = true;
    for (field, value) in updates {
        if !first {
            builder.push(", ");
        }
        first = false;
        builder.push(format!(r#""{field}" = "#));
        push_bind_value(&mut builder, value);
    }
    push_key_predicate(&mut builder, key);
    Some(builder)
}

fn build_delete(entity: &EntityDef, key: &EntityKey) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("DELETE FROM ");
    builder.push(table(entity));
    push_key_predicate(&mut builder, key);
    builder
}

/// Categorize a driver error, keeping the original as the cause
fn classify(context: &str, err: sqlx::Error) -> BackendFailure {
    let message = format!("{context}: {err}");
    match &err {
        sqlx::Error::Database(db) => match db.kind() {
            ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => BackendFailure::integrity(message).caused_by(err),
            _ => BackendFailure::unknown(message).caused_by(err),
        },
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => BackendFailure::connection(message).caused_by(err),
        sqlx::Error::RowNotFound => BackendFailure::not_found(message),
        _ => BackendFailure::unknown(message).caused_by(err),
    }
}

fn record_from_row(value: JsonValue) -> Result<EntityRecord, BackendFailure> {
    match value {
        JsonValue::Object(map) => Ok(map.into_iter().collect()),
        other => Err(BackendFailure::unknown(format!(
            "expected a row object from the store, got {other}"
        ))),
    }
}

#[async_trait]
impl LocalStoreGateway for PgLocalStore {
    async fn query(
        &self,
        entity: &EntityDef,
        filter: Option<&QueryFilter>,
        order: OrderBy,
    ) -> Result<Vec<EntityRecord>, BackendFailure> {
        debug!(entity = entity.name, "executing store query");
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|err| classify("acquiring store connection", err))?;

        let rows: Vec<JsonValue> = build_select(entity, filter, order)
            .build_query_scalar()
            .fetch_all(&mut *conn)
            .await
            .map_err(|err| classify("querying entity set", err))?;

        rows.into_iter().map(record_from_row).collect()
    }

    async fn read_one(
        &self,
        entity: &EntityDef,
        key: &EntityKey,
        projection: &[&str],
    ) -> Result<Option<EntityRecord>, BackendFailure> {
        debug!(entity = entity.name, "executing store read");
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|err| classify("acquiring store connection", err))?;

        let row: Option<JsonValue> = build_read_one(entity, key, projection)
            .build_query_scalar()
            .fetch_optional(&mut *conn)
            .await
            .map_err(|err| classify("reading entity", err))?;

        row.map(record_from_row).transpose()
    }

    async fn insert(
        &self,
        entity: &EntityDef,
        payload: &EntityRecord,
    ) -> Result<EntityRecord, BackendFailure> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|err| classify("acquiring store connection", err))?;

        let row: JsonValue = build_insert(entity, payload)
            .build_query_scalar()
            .fetch_one(&mut *conn)
            .await
            .map_err(|err| classify("inserting entity", err))?;

        info!(entity = entity.name, "inserted row");
        record_from_row(row)
    }

    async fn update(
        &self,
        entity: &EntityDef,
        payload: &EntityRecord,
        key: &EntityKey,
    ) -> Result<(), BackendFailure> {
        let Some(mut builder) = build_update(entity, payload, key) else {
            return Ok(());
        };

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|err| classify("acquiring store connection", err))?;

        builder
            .build()
            .execute(&mut *conn)
            .await
            .map_err(|err| classify("updating entity", err))?;

        info!(entity = entity.name, "updated row");
        Ok(())
    }

    async fn delete(&self, entity: &EntityDef, key: &EntityKey) -> Result<(), BackendFailure> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|err| classify("acquiring store connection", err))?;

        build_delete(entity, key)
            .build()
            .execute(&mut *conn)
            .await
            .map_err(|err| classify("deleting entity", err))?;

        info!(entity = entity.name, "deleted row");
        Ok(())
    }
}
