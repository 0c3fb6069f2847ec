use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::auth::repo_types::{NewUser, User};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("a user with this email already exists")]
    Conflict,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// A row written by [`UserStore::insert`] that is not yet durable.
///
/// Dropping it without calling `commit` discards the row.
#[async_trait]
pub trait PendingUser: Send {
    fn user(&self) -> &User;
    async fn commit(self: Box<Self>) -> Result<User, StoreError>;
}

/// What the auth flows need from persistent user storage.
///
/// Every lookup ignores soft-deleted rows. `insert` must report a concurrent
/// email collision as [`StoreError::Conflict`].
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn insert(&self, user: NewUser) -> Result<Box<dyn PendingUser>, StoreError>;
    /// Returns `false` when no live row matched.
    async fn soft_delete(&self, id: i64) -> Result<bool, StoreError>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, created_at, updated_at, deleted_at";

fn insert_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Conflict,
        other => StoreError::Database(other),
    }
}

/// Insert held open in its own transaction; sqlx rolls back on drop.
struct PgPendingUser {
    tx: Transaction<'static, Postgres>,
    user: User,
}

#[async_trait]
impl PendingUser for PgPendingUser {
    fn user(&self) -> &User {
        &self.user
    }

    async fn commit(self: Box<Self>) -> Result<User, StoreError> {
        let PgPendingUser { tx, user } = *self;
        tx.commit().await.map_err(insert_error)?;
        Ok(user)
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE email = $1 AND deleted_at IS NULL
            "#
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE id = $1 AND deleted_at IS NULL
            "#
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> Result<Box<dyn PendingUser>, StoreError> {
        let mut tx = self.db.begin().await?;
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(insert_error)?;
        Ok(Box::new(PgPendingUser { tx, user: created }))
    }

    async fn soft_delete(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
               SET deleted_at = now(), updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE deleted_at IS NULL
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}
