#[cfg(test)]
mod tests {
    use crate::ir::{
        ActionDescriptor, ApiRequestDescriptor, Bindings, Callback, ComputeExpr,
        ComputeOperator, ConditionDescriptor, FeedbackKind, HttpMethod, NavigateKind,
        ResponseMapping, Schema, UiNode, ValueDescriptor,
    };
    use crate::runtime::{
        ActionExecutor, ApiCall, ApiHandler, EffectError, EffectHandlers, EffectKind,
        ExecutionContext, FeedbackHandler, KeyPathStore, NavigationHandler, NavigationRequest,
        RuntimeError, ScenarioSession,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct RecordingNavigation {
        calls: Arc<Mutex<Vec<NavigationRequest>>>,
    }

    #[async_trait]
    impl NavigationHandler for RecordingNavigation {
        async fn navigate(&self, request: NavigationRequest) -> Result<(), EffectError> {
            self.calls.lock().push(request);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingFeedback {
        calls: Arc<Mutex<Vec<(FeedbackKind, Value)>>>,
    }

    #[async_trait]
    impl FeedbackHandler for RecordingFeedback {
        async fn show(&self, kind: FeedbackKind, payload: Value) -> Result<(), EffectError> {
            self.calls.lock().push((kind, payload));
            Ok(())
        }
    }

    /// Answers every call with `response`, or fails when it is `None`.
    struct FixedApi {
        response: Option<Value>,
        calls: Arc<Mutex<Vec<ApiCall>>>,
    }

    #[async_trait]
    impl ApiHandler for FixedApi {
        async fn request(&self, call: ApiCall) -> Result<Value, EffectError> {
            self.calls.lock().push(call);
            match &self.response {
                Some(response) => Ok(response.clone()),
                None => Err(EffectError::new("503 Service Unavailable")
                    .with_details(json!({"status": 503}))),
            }
        }
    }

    fn set(path: &str, value: ValueDescriptor) -> ActionDescriptor {
        ActionDescriptor::StoreSet {
            path: path.to_string(),
            value,
        }
    }

    fn literal(value: Value) -> ValueDescriptor {
        ValueDescriptor::Literal(value)
    }

    fn push(target: &str) -> ActionDescriptor {
        ActionDescriptor::Navigate {
            kind: NavigateKind::Push,
            target: Some(literal(json!(target))),
            params: None,
        }
    }

    fn bind(name: &str, path: &str) -> Bindings {
        let mut bind = Bindings::new();
        bind.insert(name.to_string(), path.to_string());
        bind
    }

    fn api_request(endpoint: &str) -> ApiRequestDescriptor {
        ApiRequestDescriptor {
            endpoint: literal(json!(endpoint)),
            method: HttpMethod::Get,
            headers: BTreeMap::new(),
            body: None,
            on_success: None,
            on_error: None,
            response_mapping: None,
            awaited: true,
        }
    }

    #[tokio::test]
    async fn test_sequence_stops_at_failing_step() {
        let store = KeyPathStore::empty();
        let executor = ActionExecutor::new(EffectHandlers::new());
        let action = ActionDescriptor::Sequence {
            steps: vec![
                set("first", literal(json!(1))),
                push("Details"),
                set("third", literal(json!(3))),
            ],
        };

        let err = executor
            .execute(&action, &store, &ExecutionContext::new())
            .await
            .unwrap_err();

        assert_eq!(err.failed_step(), Some(2));
        assert!(matches!(
            err.root_cause(),
            RuntimeError::Dispatch(EffectKind::Navigation)
        ));
        assert_eq!(store.get("first").await.unwrap(), Some(json!(1)));
        assert_eq!(store.get("third").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_computed_increment_reads_current_value() {
        let store = KeyPathStore::new(json!({"count": 1}));
        let executor = ActionExecutor::default();
        let increment = set(
            "count",
            ValueDescriptor::Computed {
                expr: ComputeExpr::Binary {
                    operator: ComputeOperator::Add,
                    left: Box::new(ComputeExpr::Input { index: 0 }),
                    right: Box::new(ComputeExpr::Literal { value: json!(1) }),
                },
                inputs: vec![ValueDescriptor::StoreReference("count".to_string())],
            },
        );

        let ctx = ExecutionContext::new();
        executor.execute(&increment, &store, &ctx).await.unwrap();
        executor.execute(&increment, &store, &ctx).await.unwrap();
        assert_eq!(store.get("count").await.unwrap(), Some(json!(3)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_do_not_interleave() {
        let store = KeyPathStore::new(json!({"count": 0}));
        let executor = ActionExecutor::default();
        let increment = Arc::new(set(
            "count",
            ValueDescriptor::Computed {
                expr: ComputeExpr::Binary {
                    operator: ComputeOperator::Add,
                    left: Box::new(ComputeExpr::Input { index: 0 }),
                    right: Box::new(ComputeExpr::Literal { value: json!(1) }),
                },
                inputs: vec![ValueDescriptor::StoreReference("count".to_string())],
            },
        ));

        let tasks: Vec<_> = (0..200)
            .map(|_| {
                let store = store.clone();
                let executor = executor.clone();
                let increment = increment.clone();
                tokio::spawn(async move {
                    executor
                        .execute(&increment, &store, &ExecutionContext::new())
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(store.get("count").await.unwrap(), Some(json!(200)));
    }

    #[tokio::test]
    async fn test_merge_resolves_against_current_state() {
        let store = KeyPathStore::new(json!({"form": {"name": "Ada"}, "user": {"id": 7}}));
        let executor = ActionExecutor::default();
        let merge = ActionDescriptor::StoreMerge {
            path: "user".to_string(),
            value: BTreeMap::from([(
                "name".to_string(),
                ValueDescriptor::StoreReference("form.name".to_string()),
            )]),
        };
        executor
            .execute(&merge, &store, &ExecutionContext::new())
            .await
            .unwrap();
        assert_eq!(
            store.get("user").await.unwrap(),
            Some(json!({"id": 7, "name": "Ada"}))
        );
    }

    #[tokio::test]
    async fn test_conditional_takes_else_branch() {
        let store = KeyPathStore::new(json!({"loggedIn": false}));
        let navigation = RecordingNavigation::default();
        let executor =
            ActionExecutor::new(EffectHandlers::new().with_navigation(navigation.clone()));
        let action = ActionDescriptor::Conditional {
            condition: ConditionDescriptor::Truthy {
                value: ValueDescriptor::StoreReference("loggedIn".to_string()),
            },
            then: Box::new(push("Home")),
            otherwise: Some(Box::new(push("Login"))),
        };

        executor
            .execute(&action, &store, &ExecutionContext::new())
            .await
            .unwrap();

        let calls = navigation.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].target, Some(json!("Login")));
    }

    #[tokio::test]
    async fn test_response_mapping_lands_before_on_success() {
        let store = KeyPathStore::empty();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let executor = ActionExecutor::new(EffectHandlers::new().with_api(FixedApi {
            response: Some(json!({"data": {"name": "Ada"}})),
            calls: calls.clone(),
        }));

        let mut request = api_request("/profile");
        request.response_mapping = Some(ResponseMapping {
            target: "profile".to_string(),
            source: Some("data".to_string()),
        });
        request.on_success = Some(Callback {
            bind: bind("res", "0"),
            action: Box::new(ActionDescriptor::Sequence {
                steps: vec![
                    set(
                        "mapped",
                        ValueDescriptor::StoreReference("profile.name".to_string()),
                    ),
                    set(
                        "raw",
                        ValueDescriptor::PropReference("res.data.name".to_string()),
                    ),
                ],
            }),
        });

        executor
            .execute(
                &ActionDescriptor::ApiRequest(request),
                &store,
                &ExecutionContext::new(),
            )
            .await
            .unwrap();

        assert_eq!(calls.lock()[0].endpoint, "/profile");
        assert_eq!(store.get("mapped").await.unwrap(), Some(json!("Ada")));
        assert_eq!(store.get("raw").await.unwrap(), Some(json!("Ada")));
    }

    #[tokio::test]
    async fn test_api_failure_runs_on_error() {
        let store = KeyPathStore::empty();
        let executor = ActionExecutor::new(EffectHandlers::new().with_api(FixedApi {
            response: None,
            calls: Arc::default(),
        }));

        let mut request = api_request("/login");
        request.on_error = Some(Callback {
            bind: bind("err", "0"),
            action: Box::new(set(
                "error",
                ValueDescriptor::PropReference("err.message".to_string()),
            )),
        });

        executor
            .execute(
                &ActionDescriptor::ApiRequest(request),
                &store,
                &ExecutionContext::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            store.get("error").await.unwrap(),
            Some(json!("503 Service Unavailable"))
        );
    }

    #[tokio::test]
    async fn test_api_failure_without_on_error_is_effect_error() {
        let store = KeyPathStore::empty();
        let executor = ActionExecutor::new(EffectHandlers::new().with_api(FixedApi {
            response: None,
            calls: Arc::default(),
        }));

        let err = executor
            .execute(
                &ActionDescriptor::ApiRequest(api_request("/login")),
                &store,
                &ExecutionContext::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RuntimeError::Effect {
                kind: EffectKind::Api,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_fire_and_forget_request_completes_in_background() {
        let store = KeyPathStore::empty();
        let executor = ActionExecutor::new(EffectHandlers::new().with_api(FixedApi {
            response: Some(json!([1, 2, 3])),
            calls: Arc::default(),
        }));
        let mut sub = store.subscribe("items").await.unwrap();
        assert_eq!(sub.recv().await, Some(None));

        let mut request = api_request("/items");
        request.awaited = false;
        request.response_mapping = Some(ResponseMapping {
            target: "items".to_string(),
            source: None,
        });
        executor
            .execute(
                &ActionDescriptor::ApiRequest(request),
                &store,
                &ExecutionContext::new(),
            )
            .await
            .unwrap();

        let delivered = tokio::time::timeout(Duration::from_secs(5), sub.recv())
            .await
            .unwrap();
        assert_eq!(delivered, Some(Some(json!([1, 2, 3]))));
    }

    #[tokio::test]
    async fn test_session_trigger_binds_renderer_arguments() {
        let feedback = RecordingFeedback::default();
        let mut actions = BTreeMap::new();
        actions.insert(
            "main:root.0@renderItem:onPress".to_string(),
            ActionDescriptor::UiFeedback {
                kind: FeedbackKind::Toast,
                payload: ValueDescriptor::Object(BTreeMap::from([
                    (
                        "message".to_string(),
                        ValueDescriptor::PropReference("item.title".to_string()),
                    ),
                    (
                        "screen".to_string(),
                        ValueDescriptor::PropReference("screen".to_string()),
                    ),
                ])),
            },
        );
        let schema = Schema {
            key: "list".to_string(),
            version: "1.0.0".to_string(),
            build_number: None,
            main: UiNode::new("View"),
            components: BTreeMap::new(),
            stores: None,
            actions,
            metadata: BTreeMap::new(),
        };
        let session =
            ScenarioSession::start(schema, EffectHandlers::new().with_feedback(feedback.clone()));

        let reference = ValueDescriptor::ActionRef {
            id: "main:root.0@renderItem:onPress".to_string(),
            bind: bind("item", "0.item"),
        };
        session
            .trigger(
                &reference,
                json!({"screen": "Feed"}),
                &[json!({"item": {"title": "Hello"}, "index": 0})],
            )
            .await
            .unwrap();

        let calls = feedback.calls.lock();
        assert_eq!(
            calls[0],
            (
                FeedbackKind::Toast,
                json!({"message": "Hello", "screen": "Feed"})
            )
        );
    }

    #[tokio::test]
    async fn test_session_rejects_unknown_action() {
        let schema = Schema {
            key: "empty".to_string(),
            version: "1.0.0".to_string(),
            build_number: None,
            main: UiNode::new("View"),
            components: BTreeMap::new(),
            stores: Some(json!({"ready": true})),
            actions: BTreeMap::new(),
            metadata: BTreeMap::new(),
        };
        let session = ScenarioSession::start(schema, EffectHandlers::new());
        assert_eq!(session.store().get("ready").await.unwrap(), Some(json!(true)));
        let err = session
            .dispatch("nope", &Bindings::new(), json!({}), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownAction(id) if id == "nope"));
    }
}
