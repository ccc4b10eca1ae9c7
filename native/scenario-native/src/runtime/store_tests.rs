#[cfg(test)]
mod tests {
    use crate::runtime::{KeyPathStore, StoreError, StoreOp};
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_get_distinguishes_absent_from_null() {
        let store = KeyPathStore::new(json!({"user": {"nickname": null}}));
        assert_eq!(store.get("user.nickname").await.unwrap(), Some(Value::Null));
        assert_eq!(store.get("user.email").await.unwrap(), None);
        assert_eq!(
            store.get("user").await.unwrap(),
            Some(json!({"nickname": null}))
        );
    }

    #[tokio::test]
    async fn test_subscriber_sees_current_value_after_each_mutation() {
        let store = KeyPathStore::new(json!({"count": 0}));
        let mut sub = store.subscribe("count").await.unwrap();
        assert_eq!(sub.try_recv(), Some(Some(json!(0))));

        for n in 1..=3 {
            store.set("count", json!(n)).await.unwrap();
            assert_eq!(sub.try_recv(), Some(Some(json!(n))));
            assert_eq!(sub.try_recv(), None);
        }

        store.remove("count").await.unwrap();
        assert_eq!(sub.try_recv(), Some(None));
    }

    #[tokio::test]
    async fn test_ancestor_replacement_notifies_descendant_once() {
        let store = KeyPathStore::new(json!({"a": {"b": 1}}));
        let mut sub = store.subscribe("a.b").await.unwrap();
        assert_eq!(sub.try_recv(), Some(Some(json!(1))));

        store.set("a", json!({"b": 2, "c": 3})).await.unwrap();
        assert_eq!(sub.try_recv(), Some(Some(json!(2))));
        assert_eq!(sub.try_recv(), None);
    }

    #[tokio::test]
    async fn test_descendant_write_notifies_ancestor() {
        let store = KeyPathStore::empty();
        let mut sub = store.subscribe("user").await.unwrap();
        assert_eq!(sub.try_recv(), Some(None));

        store.set("user.profile.name", json!("Ada")).await.unwrap();
        assert_eq!(
            sub.try_recv(),
            Some(Some(json!({"profile": {"name": "Ada"}})))
        );
    }

    #[tokio::test]
    async fn test_unrelated_paths_are_not_notified() {
        let store = KeyPathStore::new(json!({"a": {"b": 1, "c": 1}}));
        let mut sub = store.subscribe("a.b").await.unwrap();
        sub.try_recv();

        store.set("a.c", json!(2)).await.unwrap();
        store.set("ab", json!(true)).await.unwrap();
        assert_eq!(sub.try_recv(), None);
    }

    #[tokio::test]
    async fn test_replace_all_swaps_tree() {
        let store = KeyPathStore::new(json!({"cart": {"items": [1]}}));
        let mut sub = store.subscribe("cart.items").await.unwrap();
        sub.try_recv();

        store.replace_all(json!({"user": "ada"})).await.unwrap();
        assert_eq!(sub.try_recv(), Some(None));
        assert_eq!(store.snapshot().await.unwrap(), json!({"user": "ada"}));
    }

    #[tokio::test]
    async fn test_remove_missing_path_still_notifies() {
        let store = KeyPathStore::empty();
        let mut sub = store.subscribe("session.token").await.unwrap();
        assert_eq!(sub.try_recv(), Some(None));

        let patch = store.remove("session").await.unwrap();
        assert_eq!(patch.old_value, None);
        assert_eq!(sub.try_recv(), Some(None));
    }

    #[tokio::test]
    async fn test_transaction_notifies_once() {
        let store = KeyPathStore::empty();
        let mut sub = store.subscribe("form").await.unwrap();
        sub.try_recv();

        let patches = store
            .transaction(vec![
                StoreOp::set("form.email", json!("a@b.c")).unwrap(),
                StoreOp::set("form.password", json!("secret")).unwrap(),
                StoreOp::remove("form.error").unwrap(),
            ])
            .await
            .unwrap();

        assert_eq!(patches.len(), 3);
        assert_eq!(
            sub.try_recv(),
            Some(Some(json!({"email": "a@b.c", "password": "secret"})))
        );
        assert_eq!(sub.try_recv(), None);
    }

    #[tokio::test]
    async fn test_failed_transaction_is_atomic() {
        let store = KeyPathStore::new(json!({"count": 1}));
        let mut sub = store.subscribe("").await.unwrap();
        sub.try_recv();

        let result = store
            .transaction(vec![
                StoreOp::set("name", json!("x")).unwrap(),
                StoreOp::set("count.nested", json!(2)).unwrap(),
            ])
            .await;

        assert!(matches!(result, Err(StoreError::TypeMismatch { .. })));
        assert_eq!(store.snapshot().await.unwrap(), json!({"count": 1}));
        assert_eq!(sub.try_recv(), None);
    }

    #[tokio::test]
    async fn test_merge_requires_object() {
        let store = KeyPathStore::new(json!({"tags": ["a"], "user": {"id": 1}}));
        assert!(store.merge("tags", json!({"x": 1})).await.is_err());
        assert!(store.merge("user", json!(5)).await.is_err());

        store.merge("user", json!({"name": "Ada"})).await.unwrap();
        assert_eq!(
            store.get("user").await.unwrap(),
            Some(json!({"id": 1, "name": "Ada"}))
        );
    }

    #[tokio::test]
    async fn test_invalid_path_is_rejected_before_dispatch() {
        let store = KeyPathStore::empty();
        let err = store.set("a..b", json!(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath { .. }));
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_released() {
        let store = KeyPathStore::empty();
        let sub = store.subscribe("x").await.unwrap();
        drop(sub);
        store.set("x", json!(1)).await.unwrap();
        assert_eq!(store.get("x").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_far_array_index_is_rejected_and_store_survives() {
        let store = KeyPathStore::new(json!({"list": [], "ok": true}));
        let err = store
            .set("list.18446744073709551615", json!(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IndexOutOfRange { .. }));

        assert_eq!(store.get("ok").await.unwrap(), Some(json!(true)));
        store.set("list.0", json!("a")).await.unwrap();
        assert_eq!(store.get("list").await.unwrap(), Some(json!(["a"])));
    }

    #[tokio::test]
    async fn test_failed_single_write_leaves_no_intermediates() {
        let store = KeyPathStore::new(json!({"list": [1]}));
        assert!(store.set("draft.items.5000", json!(1)).await.is_err());
        assert_eq!(store.snapshot().await.unwrap(), json!({"list": [1]}));
    }

    #[tokio::test]
    async fn test_update_plans_against_current_state() {
        let store = KeyPathStore::new(json!({"count": 2}));
        let patches = store
            .update(|state| {
                let next = state["count"].as_i64().unwrap_or(0) * 10;
                Ok(vec![StoreOp::set("count", json!(next))?])
            })
            .await
            .unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(store.get("count").await.unwrap(), Some(json!(20)));

        let empty = store.update(|_| Ok(Vec::new())).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_are_not_lost() {
        let store = KeyPathStore::new(json!({"count": 0}));
        let tasks: Vec<_> = (0..200)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .update(|state| {
                            let next = state["count"].as_i64().unwrap_or(0) + 1;
                            Ok(vec![StoreOp::set("count", json!(next))?])
                        })
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(store.get("count").await.unwrap(), Some(json!(200)));
    }
}
