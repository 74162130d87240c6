//! In-memory user store for tests/dev.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use forms_auth::UserStore;
use forms_core::{StoreError, StoreResult, User, UserId};

#[derive(Debug, Default)]
struct Inner {
    by_id: HashMap<UserId, User>,
    by_handle: HashMap<String, UserId>,
}

/// Process-local user table. The handle index plays the role of the unique
/// constraint; both maps change under one write lock.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    inner: RwLock<Inner>,
}

fn poisoned() -> StoreError {
    StoreError::unavailable("in-memory user store lock poisoned")
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a user (account deletion). Returns whether it existed.
    pub fn delete(&self, id: UserId) -> StoreResult<bool> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        match inner.by_id.remove(&id) {
            Some(user) => {
                inner.by_handle.remove(&user.handle);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn len(&self) -> StoreResult<usize> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.by_id.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn upsert_by_external_id(
        &self,
        external_id: &str,
        email: Option<&str>,
        name: Option<&str>,
    ) -> StoreResult<User> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        let now = Utc::now();

        if let Some(id) = inner.by_handle.get(external_id).copied() {
            let user = inner
                .by_id
                .get_mut(&id)
                .ok_or_else(|| StoreError::Corrupt(format!("dangling handle index for {id}")))?;
            if let Some(email) = email {
                user.email = Some(email.to_string());
            }
            if let Some(name) = name {
                user.name = Some(name.to_string());
            }
            user.updated_at = now;
            return Ok(user.clone());
        }

        let user = User {
            id: UserId::new(),
            handle: external_id.to_string(),
            email: email.map(str::to_string),
            name: name.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        inner.by_handle.insert(user.handle.clone(), user.id);
        inner.by_id.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_external_id(&self, external_id: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner
            .by_handle
            .get(external_id)
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.by_id.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_creates_then_updates_in_place() {
        let store = InMemoryUserStore::new();

        let first = store
            .upsert_by_external_id("ext1", Some("a@x"), Some("A"))
            .await
            .unwrap();
        let second = store
            .upsert_by_external_id("ext1", Some("b@x"), Some("B"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.email.as_deref(), Some("b@x"));
        assert_eq!(second.name.as_deref(), Some("B"));
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn absent_attributes_keep_stored_values() {
        let store = InMemoryUserStore::new();
        store
            .upsert_by_external_id("ext1", Some("a@x"), Some("A"))
            .await
            .unwrap();

        let user = store.upsert_by_external_id("ext1", None, None).await.unwrap();
        assert_eq!(user.email.as_deref(), Some("a@x"));
        assert_eq!(user.name.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn delete_removes_both_indexes() {
        let store = InMemoryUserStore::new();
        let user = store.upsert_by_external_id("ext1", None, None).await.unwrap();

        assert!(store.delete(user.id).unwrap());
        assert!(!store.delete(user.id).unwrap());
        assert_eq!(store.find_by_id(user.id).await.unwrap(), None);
        assert_eq!(store.find_by_external_id("ext1").await.unwrap(), None);
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn poisoned_lock_is_unavailable_everywhere() {
        let store = InMemoryUserStore::new();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.inner.write().unwrap();
            panic!("writer died holding the lock");
        }));

        assert!(matches!(store.len(), Err(StoreError::Unavailable(_))));
        assert!(matches!(store.is_empty(), Err(StoreError::Unavailable(_))));
        assert!(matches!(
            store.find_by_external_id("ext1").await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
