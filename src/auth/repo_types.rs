use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use super::roles::Role;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,                           // unique user ID
    pub name: String,                      // display name
    pub email: String,                     // natural key among live rows
    #[serde(skip_serializing)]
    pub password_hash: String,             // Argon2 hash, not exposed in JSON
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>, // soft-delete marker
}

/// Fields the registration flow supplies; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}
