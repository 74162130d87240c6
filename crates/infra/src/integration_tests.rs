//! Integration tests for identity resolution over the in-memory store.
//!
//! Tests: ExternalIdentity → ensure_user → UserStore
//!
//! Verifies:
//! - Repeated logins converge on one record with a stable id
//! - Concurrent first logins for the same external id create one user
//! - Distinct external ids never share a record

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use forms_auth::{UserStore, ensure_user};
    use forms_core::ExternalIdentity;

    use crate::users::InMemoryUserStore;

    fn identity(external_id: &str, email: &str, name: &str) -> ExternalIdentity {
        ExternalIdentity {
            external_id: Some(external_id.to_string()),
            email: Some(email.to_string()),
            display_name: Some(name.to_string()),
        }
    }

    #[tokio::test]
    async fn repeated_login_updates_profile_and_keeps_id() {
        let store = InMemoryUserStore::new();

        let first = ensure_user(&store, &identity("ext1", "a@x", "A"))
            .await
            .unwrap();
        let second = ensure_user(&store, &identity("ext1", "b@x", "B"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.handle, "ext1");
        assert_eq!(second.email.as_deref(), Some("b@x"));
        assert_eq!(second.name.as_deref(), Some("B"));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn identity_without_email_keeps_stored_email() {
        let store = InMemoryUserStore::new();
        ensure_user(&store, &identity("ext1", "a@x", "A"))
            .await
            .unwrap();

        let bare = ExternalIdentity {
            external_id: Some("ext1".to_string()),
            ..Default::default()
        };
        let user = ensure_user(&store, &bare).await.unwrap();
        assert_eq!(user.email.as_deref(), Some("a@x"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_logins_converge() {
        let store: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    ensure_user(&store, &identity("ext1", "a@x", "A")).await
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for task in tasks {
            ids.insert(task.await.unwrap().unwrap().id);
        }
        assert_eq!(ids.len(), 1);

        let stored = store.find_by_external_id("ext1").await.unwrap().unwrap();
        assert!(ids.contains(&stored.id));
    }

    #[tokio::test]
    async fn distinct_external_ids_get_distinct_users() {
        let store = InMemoryUserStore::new();
        let a = ensure_user(&store, &identity("ext1", "a@x", "A"))
            .await
            .unwrap();
        let b = ensure_user(&store, &identity("ext2", "a@x", "A"))
            .await
            .unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(store.find_by_id(b.id).await.unwrap(), Some(b));
    }
}
