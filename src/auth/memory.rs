use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::auth::{
    repo::{PendingUser, StoreError, UserStore},
    repo_types::{NewUser, User},
};

/// Process-local [`UserStore`] with the same visibility and uniqueness rules
/// as the Postgres table.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    rows: Vec<User>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row, soft-deleted ones included.
    pub async fn raw_rows(&self) -> Vec<User> {
        self.inner.lock().await.rows.clone()
    }

    /// Admins are never created through registration; tests promote directly.
    pub async fn set_role(&self, id: i64, role: crate::auth::roles::Role) {
        let mut inner = self.inner.lock().await;
        if let Some(row) = inner.rows.iter_mut().find(|u| u.id == id) {
            row.role = role;
        }
    }
}

fn live(u: &User) -> bool {
    u.deleted_at.is_none()
}

fn email_taken(inner: &Inner, email: &str) -> bool {
    inner.rows.iter().any(|u| live(u) && u.email == email)
}

/// Nothing is stored until `commit`; the email is checked again there.
struct MemoryPendingUser {
    inner: Arc<Mutex<Inner>>,
    user: User,
}

#[async_trait]
impl PendingUser for MemoryPendingUser {
    fn user(&self) -> &User {
        &self.user
    }

    async fn commit(self: Box<Self>) -> Result<User, StoreError> {
        let MemoryPendingUser { inner, user } = *self;
        let mut inner = inner.lock().await;
        if email_taken(&inner, &user.email) {
            return Err(StoreError::Conflict);
        }
        inner.rows.push(user.clone());
        Ok(user)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rows
            .iter()
            .find(|u| live(u) && u.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rows
            .iter()
            .find(|u| live(u) && u.id == id)
            .cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<Box<dyn PendingUser>, StoreError> {
        let mut inner = self.inner.lock().await;
        if email_taken(&inner, &user.email) {
            return Err(StoreError::Conflict);
        }
        inner.next_id += 1;
        let now = OffsetDateTime::now_utc();
        let row = User {
            id: inner.next_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        Ok(Box::new(MemoryPendingUser {
            inner: self.inner.clone(),
            user: row,
        }))
    }

    async fn soft_delete(&self, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner
            .rows
            .iter_mut()
            .find(|u| live(u) && u.id == id)
        {
            Some(row) => {
                let now = OffsetDateTime::now_utc();
                row.deleted_at = Some(now);
                row.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rows
            .iter()
            .rev()
            .filter(|u| live(u))
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::roles::Role;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Test".into(),
            email: email.into(),
            password_hash: "$argon2id$fake".into(),
            role: Role::User,
        }
    }

    async fn add(store: &MemoryUserStore, email: &str) -> Result<User, StoreError> {
        store.insert(new_user(email)).await?.commit().await
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_rejects_duplicates() {
        let store = MemoryUserStore::new();
        let a = add(&store, "a@example.com").await.unwrap();
        let b = add(&store, "b@example.com").await.unwrap();
        assert_ne!(a.id, b.id);
        assert!(matches!(
            add(&store, "a@example.com").await,
            Err(StoreError::Conflict)
        ));
    }

    #[tokio::test]
    async fn email_match_is_case_sensitive() {
        let store = MemoryUserStore::new();
        add(&store, "a@example.com").await.unwrap();
        assert!(store.find_by_email("A@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn soft_deleted_rows_are_hidden_but_kept() {
        let store = MemoryUserStore::new();
        let a = add(&store, "a@example.com").await.unwrap();
        assert!(store.soft_delete(a.id).await.unwrap());
        assert!(!store.soft_delete(a.id).await.unwrap());

        assert!(store.find_by_email("a@example.com").await.unwrap().is_none());
        assert!(store.find_by_id(a.id).await.unwrap().is_none());
        assert!(store.list(10, 0).await.unwrap().is_empty());
        assert_eq!(store.raw_rows().await.len(), 1);

        // the email is free again among live rows
        let again = add(&store, "a@example.com").await.unwrap();
        assert_ne!(again.id, a.id);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_paginated() {
        let store = MemoryUserStore::new();
        for i in 0..5 {
            add(&store, &format!("u{i}@example.com")).await.unwrap();
        }
        let page = store.list(2, 1).await.unwrap();
        let emails: Vec<_> = page.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["u3@example.com", "u2@example.com"]);
    }

    #[tokio::test]
    async fn uncommitted_insert_leaves_nothing() {
        let store = MemoryUserStore::new();
        let pending = store.insert(new_user("a@example.com")).await.unwrap();
        assert_eq!(pending.user().email, "a@example.com");
        drop(pending);

        assert!(store.raw_rows().await.is_empty());
        assert!(store.find_by_email("a@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_commit_for_same_email_conflicts() {
        let store = MemoryUserStore::new();
        let first = store.insert(new_user("a@example.com")).await.unwrap();
        let second = store.insert(new_user("a@example.com")).await.unwrap();
        first.commit().await.unwrap();
        assert!(matches!(second.commit().await, Err(StoreError::Conflict)));
        assert_eq!(store.raw_rows().await.len(), 1);
    }
}
