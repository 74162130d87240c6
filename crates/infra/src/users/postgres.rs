//! Postgres-backed user store.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | Condition | StoreError |
//! |------------|-----------|------------|
//! | Database | error carries a `HINT` | `Denied` (hint parsed into `AuthorizationHint`, message verbatim) |
//! | Database | code `23505` | `UniqueViolation` |
//! | Database | any other | `Unavailable` |
//! | ColumnDecode / Decode | N/A | `Corrupt` |
//! | anything else (pool closed, io, tls, timeout) | N/A | `Unavailable` |
//!
//! Stored procedures on the database side raise resource-level denials with
//! `RAISE EXCEPTION '...' USING HINT = 'forbidden'`; the hint is how those
//! decisions reach the API error envelope.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgDatabaseError, PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use forms_auth::UserStore;
use forms_core::{AuthorizationHint, StoreError, StoreResult, User, UserId};

const SCHEMA: &str = include_str!("../../migrations/0001_create_users.sql");

#[derive(Debug)]
struct UserRow {
    id: Uuid,
    handle: String,
    email: Option<String>,
    name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            handle: row.try_get("handle")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::from_uuid(row.id),
            handle: row.handle,
            email: row.email,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Postgres user table.
///
/// Uses the SQLx connection pool, which is `Send + Sync` and handles
/// concurrent checkouts. Uniqueness of `handle` is enforced by the schema.
#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: Arc<PgPool>,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_uri`.
    pub async fn connect(database_uri: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .connect(database_uri)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the `users` table if it does not exist.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    #[instrument(skip(self, email, name), err)]
    async fn upsert_by_external_id(
        &self,
        external_id: &str,
        email: Option<&str>,
        name: Option<&str>,
    ) -> StoreResult<User> {
        let row: UserRow = sqlx::query_as(
            r#"
            INSERT INTO users (id, handle, email, name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, now(), now())
            ON CONFLICT (handle) DO UPDATE
            SET email = COALESCE(EXCLUDED.email, users.email),
                name = COALESCE(EXCLUDED.name, users.name),
                updated_at = now()
            RETURNING id, handle, email, name, created_at, updated_at
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(external_id)
        .bind(email)
        .bind(name)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_by_external_id", e))?;

        Ok(row.into())
    }

    #[instrument(skip(self), err)]
    async fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, handle, email, name, created_at, updated_at
            FROM users
            WHERE handle = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_external_id", e))?;

        Ok(row.map(User::from))
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, handle, email, name, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_id", e))?;

        Ok(row.map(User::from))
    }
}

/// Translate a SQLx error into the store error model (see module docs).
pub fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let hint = db_err
                .try_downcast_ref::<PgDatabaseError>()
                .and_then(|pg| pg.hint())
                .map(AuthorizationHint::from_tag);
            if let Some(hint) = hint {
                return StoreError::denied(hint, db_err.message());
            }

            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("decode failure in {}: {}", operation, err))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Unavailable(format!("sqlx error in {}: {}", operation, err)),
    }
}
