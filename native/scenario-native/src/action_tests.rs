#[cfg(test)]
mod tests {
    use crate::ir::{
        ActionDescriptor, ApiRequestDescriptor, ComputeExpr, ComputeOperator,
        ConditionDescriptor, FeedbackKind, HttpMethod, NavigateKind, ResponseMapping,
        SystemKind, ValueDescriptor,
    };
    use crate::parse::{compile_scenario, CompileOptions, CompileResult};
    use crate::runtime::{EffectHandlers, ScenarioSession};
    use crate::validate::{
        DiagnosticKind, ERR_ACTION_ARGUMENTS, ERR_UNRECOGNIZED_CALL, ERR_UNSUPPORTED_EXPRESSION,
        ERR_UNSUPPORTED_STATEMENT,
    };
    use serde_json::json;
    use std::collections::BTreeMap;

    fn compile(source: &str) -> CompileResult {
        compile_scenario(
            source,
            &CompileOptions {
                key: "actions".to_string(),
                ..Default::default()
            },
        )
    }

    /// Compiles `<Button onPress={handler} />` and returns its action.
    fn press_action(handler: &str) -> ActionDescriptor {
        let source = format!("export default () => <Button onPress={{{}}} />;", handler);
        let result = compile(&source);
        let mut schema = match result.into_schema() {
            Ok(schema) => schema,
            Err(failure) => panic!("compilation failed: {:#?}", failure.diagnostics),
        };
        schema.actions.remove("main:root:onPress").unwrap()
    }

    fn press_errors(handler: &str) -> CompileResult {
        compile(&format!("export default () => <Button onPress={{{}}} />;", handler))
    }

    fn store_ref(path: &str) -> ValueDescriptor {
        ValueDescriptor::StoreReference(path.to_string())
    }

    fn prop_ref(path: &str) -> ValueDescriptor {
        ValueDescriptor::PropReference(path.to_string())
    }

    fn literal(value: serde_json::Value) -> ValueDescriptor {
        ValueDescriptor::Literal(value)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STORE CALLS
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_increment_is_computed_over_one_store_reference() {
        assert_eq!(
            press_action("() => store.increment('cart.count')"),
            ActionDescriptor::StoreSet {
                path: "cart.count".to_string(),
                value: ValueDescriptor::Computed {
                    expr: ComputeExpr::Binary {
                        operator: ComputeOperator::Add,
                        left: Box::new(ComputeExpr::Input { index: 0 }),
                        right: Box::new(ComputeExpr::Literal { value: json!(1) }),
                    },
                    inputs: vec![store_ref("cart.count")],
                },
            }
        );
    }

    #[test]
    fn test_decrement_by_and_toggle() {
        let ActionDescriptor::StoreSet { value, .. } = press_action("() => store.decrement('n', 5)")
        else {
            panic!("expected store set");
        };
        let ValueDescriptor::Computed { expr, inputs } = value else {
            panic!("expected computed");
        };
        assert_eq!(inputs, vec![store_ref("n")]);
        assert!(matches!(
            expr,
            ComputeExpr::Binary {
                operator: ComputeOperator::Subtract,
                ..
            }
        ));

        assert_eq!(
            press_action("() => store.toggle('settings.dark')"),
            ActionDescriptor::StoreSet {
                path: "settings.dark".to_string(),
                value: ValueDescriptor::Computed {
                    expr: ComputeExpr::Not {
                        operand: Box::new(ComputeExpr::Input { index: 0 }),
                    },
                    inputs: vec![store_ref("settings.dark")],
                },
            }
        );
    }

    #[test]
    fn test_handler_parameters_bind_to_arguments() {
        let result = compile(
            r#"
            export default () => (
              <TextInput onChangeText={(text) => store.set('form.email', text)} />
            );
            "#,
        );
        let schema = result.into_schema().unwrap();
        let mut bind = BTreeMap::new();
        bind.insert("text".to_string(), "0".to_string());
        assert_eq!(
            schema.main.data["onChangeText"],
            ValueDescriptor::ActionRef {
                id: "main:root:onChangeText".to_string(),
                bind,
            }
        );
        assert_eq!(
            schema.actions["main:root:onChangeText"],
            ActionDescriptor::StoreSet {
                path: "form.email".to_string(),
                value: prop_ref("text"),
            }
        );
    }

    #[test]
    fn test_merge_requires_object() {
        assert_eq!(
            press_action("() => store.merge('user', { name: 'Ada', age: store.get('form.age') })"),
            ActionDescriptor::StoreMerge {
                path: "user".to_string(),
                value: BTreeMap::from([
                    ("age".to_string(), store_ref("form.age")),
                    ("name".to_string(), literal(json!("Ada"))),
                ]),
            }
        );

        let result = press_errors("() => store.merge('user', 3)");
        assert!(result.diagnostics.iter().any(|d| d.code == ERR_ACTION_ARGUMENTS));
    }

    #[test]
    fn test_store_path_must_be_literal() {
        let result = press_errors("() => store.set(store.get('target'), 1)");
        assert!(result.diagnostics.iter().any(|d| d.code == ERR_ACTION_ARGUMENTS));

        let result = press_errors("() => store.set('a', 1, 2)");
        assert!(result.diagnostics.iter().any(|d| d.code == ERR_ACTION_ARGUMENTS));
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CONTROL FLOW
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_if_else_lowers_to_conditional() {
        let action = press_action(
            r#"() => {
                if (store.get('session.token')) {
                    navigation.push('Home');
                } else {
                    navigation.modal('Login', { from: 'cart' });
                }
            }"#,
        );
        assert_eq!(
            action,
            ActionDescriptor::Conditional {
                condition: ConditionDescriptor::Truthy {
                    value: store_ref("session.token"),
                },
                then: Box::new(ActionDescriptor::Navigate {
                    kind: NavigateKind::Push,
                    target: Some(literal(json!("Home"))),
                    params: None,
                }),
                otherwise: Some(Box::new(ActionDescriptor::Navigate {
                    kind: NavigateKind::Modal,
                    target: Some(literal(json!("Login"))),
                    params: Some(literal(json!({"from": "cart"}))),
                })),
            }
        );
    }

    #[test]
    fn test_comparison_condition_without_else() {
        let action = press_action("() => { if (store.get('count') >= 10) ui.toast('max'); }");
        assert!(matches!(
            action,
            ActionDescriptor::Conditional {
                condition: ConditionDescriptor::Compare { .. },
                otherwise: None,
                ..
            }
        ));
    }

    #[test]
    fn test_logical_and_guards_action() {
        assert_eq!(
            press_action("() => store.get('ready') && navigation.pop()"),
            ActionDescriptor::Conditional {
                condition: ConditionDescriptor::Truthy {
                    value: store_ref("ready"),
                },
                then: Box::new(ActionDescriptor::Navigate {
                    kind: NavigateKind::Pop,
                    target: None,
                    params: None,
                }),
                otherwise: None,
            }
        );
    }

    #[test]
    fn test_statements_lower_to_sequence() {
        assert_eq!(
            press_action(
                r#"() => {
                    store.set('saved', true);
                    ui.toast({ message: 'Saved' });
                    system.haptic();
                }"#
            ),
            ActionDescriptor::Sequence {
                steps: vec![
                    ActionDescriptor::StoreSet {
                        path: "saved".to_string(),
                        value: literal(json!(true)),
                    },
                    ActionDescriptor::UiFeedback {
                        kind: FeedbackKind::Toast,
                        payload: literal(json!({"message": "Saved"})),
                    },
                    ActionDescriptor::System {
                        kind: SystemKind::Haptic,
                        payload: ValueDescriptor::null(),
                    },
                ],
            }
        );
    }

    #[test]
    fn test_loops_are_unsupported() {
        for handler in [
            "() => { for (const id of [1, 2]) { store.remove('a'); } }",
            "() => { while (true) { navigation.pop(); } }",
            "() => { try { navigation.pop(); } catch (e) {} }",
            "() => { const next = 1; store.set('a', next); }",
        ] {
            let result = press_errors(handler);
            let err = result
                .diagnostics
                .iter()
                .find(|d| d.code == ERR_UNSUPPORTED_STATEMENT)
                .unwrap_or_else(|| panic!("no error for {}", handler));
            assert_eq!(err.kind, DiagnosticKind::UnsupportedConstructError);
            assert!(result.schema.is_none());
        }
    }

    #[test]
    fn test_assignment_is_unsupported() {
        let result = press_errors("() => { counter = 1; }");
        let err = result
            .diagnostics
            .iter()
            .find(|d| d.code == ERR_UNSUPPORTED_EXPRESSION)
            .unwrap();
        assert_eq!(err.kind, DiagnosticKind::UnsupportedConstructError);
    }

    #[test]
    fn test_unrecognized_call_names_target() {
        let result = press_errors("() => analytics.track('tap')");
        let err = result
            .diagnostics
            .iter()
            .find(|d| d.code == ERR_UNRECOGNIZED_CALL)
            .unwrap();
        assert_eq!(err.kind, DiagnosticKind::ValidationError);
        assert!(err.message.contains("analytics.track"), "{}", err.message);

        let result = press_errors("() => store.frobnicate('a')");
        assert!(result.diagnostics.iter().any(|d| d.code == ERR_UNRECOGNIZED_CALL));

        let result = press_errors("() => alert('hi')");
        assert!(result.diagnostics.iter().any(|d| d.code == ERR_UNRECOGNIZED_CALL));
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // API REQUESTS
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_awaited_post_with_mapping_and_callbacks() {
        let action = press_action(
            r#"async () => {
                await api.post('/login', {
                    headers: { 'X-Client': 'ios' },
                    body: { email: store.get('form.email') },
                    mapping: { to: 'session', from: 'data.session' },
                    onSuccess: (res) => navigation.replace('Home', { id: res.user.id }),
                    onError: (err) => ui.alert({ message: err.message }),
                });
            }"#,
        );
        let ActionDescriptor::ApiRequest(request) = action else {
            panic!("expected api request, got {:?}", action);
        };
        assert_eq!(request.endpoint, literal(json!("/login")));
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.headers["X-Client"], literal(json!("ios")));
        assert_eq!(
            request.body,
            Some(ValueDescriptor::Object(BTreeMap::from([(
                "email".to_string(),
                store_ref("form.email")
            )])))
        );
        assert_eq!(
            request.response_mapping,
            Some(ResponseMapping {
                target: "session".to_string(),
                source: Some("data.session".to_string()),
            })
        );
        assert!(request.awaited);

        let on_success = request.on_success.unwrap();
        assert_eq!(on_success.bind["res"], "0");
        assert_eq!(
            *on_success.action,
            ActionDescriptor::Navigate {
                kind: NavigateKind::Replace,
                target: Some(literal(json!("Home"))),
                params: Some(ValueDescriptor::Object(BTreeMap::from([(
                    "id".to_string(),
                    prop_ref("res.user.id")
                )]))),
            }
        );

        let on_error = request.on_error.unwrap();
        assert_eq!(
            *on_error.action,
            ActionDescriptor::UiFeedback {
                kind: FeedbackKind::Alert,
                payload: ValueDescriptor::Object(BTreeMap::from([(
                    "message".to_string(),
                    prop_ref("err.message")
                )])),
            }
        );
    }

    #[test]
    fn test_fire_and_forget_get() {
        assert_eq!(
            press_action("() => api.get('/feed')"),
            ActionDescriptor::ApiRequest(ApiRequestDescriptor {
                endpoint: literal(json!("/feed")),
                method: HttpMethod::Get,
                headers: BTreeMap::new(),
                body: None,
                on_success: None,
                on_error: None,
                response_mapping: None,
                awaited: false,
            })
        );
    }

    #[test]
    fn test_generic_request_options() {
        let ActionDescriptor::ApiRequest(request) =
            press_action("() => api.request({ url: '/items/1', method: 'delete' })")
        else {
            panic!("expected api request");
        };
        assert_eq!(request.method, HttpMethod::Delete);
        assert_eq!(request.endpoint, literal(json!("/items/1")));
    }

    #[test]
    fn test_unknown_api_option() {
        let result = press_errors("() => api.get('/feed', { retries: 3 })");
        let err = result
            .diagnostics
            .iter()
            .find(|d| d.code == ERR_ACTION_ARGUMENTS)
            .unwrap();
        assert!(err.message.contains("retries"));
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // NAMED ACTIONS
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_named_action_is_inlined() {
        let result = compile(
            r#"
            export const actions = {
                reset: () => store.remove('cart'),
                checkout() {
                    actions.reset();
                    navigation.push('Done');
                },
            };
            export default () => <Button onPress={actions.checkout} />;
            "#,
        );
        let schema = result.into_schema().unwrap();
        assert_eq!(
            schema.actions["checkout"],
            ActionDescriptor::Sequence {
                steps: vec![
                    ActionDescriptor::StoreRemove {
                        path: "cart".to_string(),
                    },
                    ActionDescriptor::Navigate {
                        kind: NavigateKind::Push,
                        target: Some(literal(json!("Done"))),
                        params: None,
                    },
                ],
            }
        );
    }

    #[test]
    fn test_named_callback_keeps_its_parameters() {
        let result = compile(
            r#"
            export const actions = {
                remember: (res) => store.set('session', res.token),
            };
            export default () => (
              <Button onPress={() => api.post('/login', { onSuccess: actions.remember })} />
            );
            "#,
        );
        let schema = result.into_schema().unwrap();
        let ActionDescriptor::ApiRequest(request) = &schema.actions["main:root:onPress"] else {
            panic!("expected api request");
        };
        let on_success = request.on_success.as_ref().unwrap();
        assert_eq!(on_success.bind["res"], "0");
        assert_eq!(
            *on_success.action,
            ActionDescriptor::StoreSet {
                path: "session".to_string(),
                value: prop_ref("res.token"),
            }
        );
    }

    #[test]
    fn test_parameterized_named_action_cannot_be_inlined() {
        let result = compile(
            r#"
            export const actions = {
                select: (id) => store.set('selected', id),
            };
            export default () => <Button onPress={() => actions.select()} />;
            "#,
        );
        let err = result
            .diagnostics
            .iter()
            .find(|d| d.code == ERR_ACTION_ARGUMENTS)
            .unwrap();
        assert!(err.message.contains("actions.select"), "{}", err.message);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // COMPILE → RUN
    // ═══════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn test_compiled_counter_runs_in_session() {
        let schema = compile(
            r#"
            export const stores = { count: 0 };
            export default () => (
              <View>
                <Text>{store.get('count')}</Text>
                <Button text="+" onPress={() => store.increment('count')} />
              </View>
            );
            "#,
        )
        .into_schema()
        .unwrap();

        let on_press = schema.main.children[1].data["onPress"].clone();
        let session = ScenarioSession::start(schema, EffectHandlers::default());
        session.trigger(&on_press, json!({}), &[]).await.unwrap();
        session.trigger(&on_press, json!({}), &[]).await.unwrap();
        assert_eq!(session.store().get("count").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_compiled_input_handler_binds_event_argument() {
        let schema = compile(
            r#"
            export default () => (
              <TextInput onChangeText={(text) => store.set('form.email', text)} />
            );
            "#,
        )
        .into_schema()
        .unwrap();

        let on_change = schema.main.data["onChangeText"].clone();
        let session = ScenarioSession::start(schema, EffectHandlers::default());
        session
            .trigger(&on_change, json!({}), &[json!("ada@example.com")])
            .await
            .unwrap();
        assert_eq!(
            session.store().get("form.email").await.unwrap(),
            Some(json!("ada@example.com"))
        );
    }

    #[tokio::test]
    async fn test_named_action_receives_renderer_arguments() {
        let schema = compile(
            r#"
            export const actions = {
                select: (id) => store.set('selected', id),
            };
            export default () => <Button onPress={actions.select} />;
            "#,
        )
        .into_schema()
        .unwrap();

        let on_press = schema.main.data["onPress"].clone();
        let session = ScenarioSession::start(schema, EffectHandlers::default());
        session.trigger(&on_press, json!({}), &[json!(42)]).await.unwrap();
        assert_eq!(session.store().get("selected").await.unwrap(), Some(json!(42)));
    }
}
