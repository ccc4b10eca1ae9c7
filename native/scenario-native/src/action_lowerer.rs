//! Action Compiler
//!
//! Lowers event-handler bodies into [`ActionDescriptor`] trees. The handler
//! language is a fixed vocabulary of namespaced calls (`store.*`,
//! `navigation.*`, `api.*`, `ui.*`, `system.*`, `actions.*`) combined with
//! `if`/`else`, `?:`, `&&`, `||` and statement sequencing. Anything that
//! would need a general-purpose interpreter (loops, exceptions, local
//! variables, assignment) is rejected.

use oxc_ast::ast::{
    Argument, CallExpression, Expression, FormalParameters, FunctionBody, ObjectExpression,
    ObjectPropertyKind, Statement,
};
use oxc_span::{GetSpan, Span};
use oxc_syntax::operator::LogicalOperator;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::ir::{
    ActionDescriptor, ApiRequestDescriptor, Bindings, Callback, ComputeExpr, ComputeOperator,
    ConditionDescriptor, FeedbackKind, HttpMethod, NavigateKind, ResponseMapping, SystemKind,
    ValueDescriptor,
};
use crate::resolve::{callee_name, expression_kind, ComputeBuilder, LoweringContext, NamedAction};
use crate::runtime::key_path::KeyPath;
use crate::scope::{collect_argument_bindings, property_key_name, PropScope};
use crate::static_eval::{static_value, unwrap_expression};
use crate::validate::{
    DiagnosticKind, ERR_ACTION_ARGUMENTS, ERR_INVALID_STORE_PATH, ERR_UNKNOWN_ACTION_REF,
    ERR_UNRECOGNIZED_CALL, ERR_UNSUPPORTED_EXPRESSION, ERR_UNSUPPORTED_STATEMENT,
};

#[derive(Default)]
struct ApiOptions {
    endpoint: Option<ValueDescriptor>,
    method: Option<HttpMethod>,
    headers: BTreeMap<String, ValueDescriptor>,
    body: Option<ValueDescriptor>,
    on_success: Option<Callback>,
    on_error: Option<Callback>,
    response_mapping: Option<ResponseMapping>,
}

impl<'s> LoweringContext<'s> {
    /// Compiles one handler. Its parameters are bound positionally to the
    /// event arguments and shadow outer names inside the body.
    pub(crate) fn lower_handler(
        &mut self,
        params: &FormalParameters<'_>,
        body: &FunctionBody<'_>,
        scope: &PropScope,
        site: &str,
    ) -> (ActionDescriptor, Bindings) {
        let bind = collect_argument_bindings(params);
        let inner = scope.extend(bind.keys());
        let steps = self.lower_statements(&body.statements, &inner, site);
        (ActionDescriptor::sequence(steps), bind)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STATEMENTS
    // ═══════════════════════════════════════════════════════════════════════════

    fn lower_statements(
        &mut self,
        statements: &[Statement<'_>],
        scope: &PropScope,
        site: &str,
    ) -> Vec<ActionDescriptor> {
        let mut steps = Vec::new();
        for statement in statements {
            self.lower_statement(statement, scope, site, &mut steps);
        }
        steps
    }

    fn lower_statement(
        &mut self,
        statement: &Statement<'_>,
        scope: &PropScope,
        site: &str,
        out: &mut Vec<ActionDescriptor>,
    ) {
        match statement {
            Statement::ExpressionStatement(stmt) => {
                out.extend(self.lower_action_expression(&stmt.expression, scope, site, false));
            }
            Statement::BlockStatement(block) => {
                out.extend(self.lower_statements(&block.body, scope, site));
            }
            Statement::IfStatement(stmt) => {
                let condition = self.resolve_condition(&stmt.test, scope, site);
                let then = self.lower_branch(&stmt.consequent, scope, site);
                let otherwise = stmt
                    .alternate
                    .as_ref()
                    .map(|alternate| Box::new(self.lower_branch(alternate, scope, site)));
                out.push(ActionDescriptor::Conditional {
                    condition,
                    then: Box::new(then),
                    otherwise,
                });
            }
            Statement::ReturnStatement(ret) => {
                if let Some(argument) = &ret.argument {
                    out.extend(self.lower_action_expression(argument, scope, site, false));
                }
            }
            Statement::EmptyStatement(_) => {}
            other => self.error(
                DiagnosticKind::UnsupportedConstructError,
                ERR_UNSUPPORTED_STATEMENT,
                format!(
                    "Unsupported {} in an event handler; handlers may only contain \
                     action calls, if/else and blocks.",
                    statement_kind(other)
                ),
                other.span(),
                site,
            ),
        }
    }

    fn lower_branch(
        &mut self,
        statement: &Statement<'_>,
        scope: &PropScope,
        site: &str,
    ) -> ActionDescriptor {
        let mut steps = Vec::new();
        self.lower_statement(statement, scope, site, &mut steps);
        ActionDescriptor::sequence(steps)
    }

    fn lower_action_expression(
        &mut self,
        expr: &Expression<'_>,
        scope: &PropScope,
        site: &str,
        awaited: bool,
    ) -> Option<ActionDescriptor> {
        match unwrap_expression(expr) {
            Expression::AwaitExpression(inner) => {
                self.lower_action_expression(&inner.argument, scope, site, true)
            }
            Expression::CallExpression(call) => self.lower_call(call, scope, site, awaited),
            Expression::ConditionalExpression(cond) => {
                let condition = self.resolve_condition(&cond.test, scope, site);
                let then = self
                    .lower_action_expression(&cond.consequent, scope, site, awaited)
                    .unwrap_or_else(|| ActionDescriptor::sequence(Vec::new()));
                let otherwise = self
                    .lower_action_expression(&cond.alternate, scope, site, awaited)
                    .map(Box::new);
                Some(ActionDescriptor::Conditional {
                    condition,
                    then: Box::new(then),
                    otherwise,
                })
            }
            Expression::LogicalExpression(logical)
                if logical.operator != LogicalOperator::Coalesce =>
            {
                let test = self.resolve_condition(&logical.left, scope, site);
                let condition = match logical.operator {
                    LogicalOperator::And => test,
                    _ => ConditionDescriptor::Not {
                        condition: Box::new(test),
                    },
                };
                let then = self.lower_action_expression(&logical.right, scope, site, awaited)?;
                Some(ActionDescriptor::Conditional {
                    condition,
                    then: Box::new(then),
                    otherwise: None,
                })
            }
            Expression::SequenceExpression(seq) => {
                let steps = seq
                    .expressions
                    .iter()
                    .filter_map(|e| self.lower_action_expression(e, scope, site, awaited))
                    .collect();
                Some(ActionDescriptor::sequence(steps))
            }
            other => {
                let message = format!(
                    "Unsupported {} in an event handler: `{}`",
                    expression_kind(other),
                    self.source_text(other.span())
                );
                self.error(
                    DiagnosticKind::UnsupportedConstructError,
                    ERR_UNSUPPORTED_EXPRESSION,
                    message,
                    other.span(),
                    site,
                );
                None
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CALL VOCABULARY
    // ═══════════════════════════════════════════════════════════════════════════

    fn lower_call(
        &mut self,
        call: &CallExpression<'_>,
        scope: &PropScope,
        site: &str,
        awaited: bool,
    ) -> Option<ActionDescriptor> {
        let Some((namespace, method)) = callee_name(&call.callee) else {
            return self.unrecognized_call(call, site);
        };
        // A prop named like a namespace shadows it.
        if scope.resolve(&namespace).is_some() {
            return self.unrecognized_call(call, site);
        }
        match namespace.as_str() {
            "store" => self.lower_store_call(&method, call, scope, site),
            "navigation" => self.lower_navigation_call(&method, call, scope, site),
            "api" => self.lower_api_call(&method, call, scope, site, awaited),
            "ui" => {
                let kind = match method.as_str() {
                    "toast" => FeedbackKind::Toast,
                    "alert" => FeedbackKind::Alert,
                    "sheet" => FeedbackKind::Sheet,
                    "loading" => FeedbackKind::Loading,
                    _ => return self.unrecognized_call(call, site),
                };
                let payload = self.optional_payload(call, scope, site)?;
                Some(ActionDescriptor::UiFeedback { kind, payload })
            }
            "system" => {
                let kind = match method.as_str() {
                    "share" => SystemKind::Share,
                    "openUrl" => SystemKind::OpenUrl,
                    "haptic" => SystemKind::Haptic,
                    "clipboard" => SystemKind::Clipboard,
                    "requestPermission" => SystemKind::PermissionRequest,
                    _ => return self.unrecognized_call(call, site),
                };
                let payload = self.optional_payload(call, scope, site)?;
                Some(ActionDescriptor::System { kind, payload })
            }
            "actions" => {
                self.check_arity(call, 0, 0, site)?;
                let named = self.named_action(&method, call.span, site)?;
                if !named.bind.is_empty() {
                    self.argument_error(
                        format!(
                            "`actions.{}` takes parameters; attach it to an event attribute \
                             instead of calling it.",
                            method
                        ),
                        call.span,
                        site,
                    );
                    return None;
                }
                Some(named.action)
            }
            _ => self.unrecognized_call(call, site),
        }
    }

    fn lower_store_call(
        &mut self,
        method: &str,
        call: &CallExpression<'_>,
        scope: &PropScope,
        site: &str,
    ) -> Option<ActionDescriptor> {
        match method {
            "set" => {
                self.check_arity(call, 2, 2, site)?;
                let path = self.store_path_argument(call, 0, site)?;
                let value = self.argument(call, 1, site)?;
                let value = self.resolve_expression(value, scope, site);
                Some(ActionDescriptor::StoreSet { path, value })
            }
            "remove" => {
                self.check_arity(call, 1, 1, site)?;
                let path = self.store_path_argument(call, 0, site)?;
                Some(ActionDescriptor::StoreRemove { path })
            }
            "merge" => {
                self.check_arity(call, 2, 2, site)?;
                let path = self.store_path_argument(call, 0, site)?;
                let value = self.argument(call, 1, site)?;
                let resolved = self.resolve_expression(value, scope, site);
                match resolved.into_entries() {
                    Some(value) => Some(ActionDescriptor::StoreMerge { path, value }),
                    None => {
                        self.error(
                            DiagnosticKind::ValidationError,
                            ERR_ACTION_ARGUMENTS,
                            "The second argument of `store.merge` must be an object.",
                            value.span(),
                            site,
                        );
                        None
                    }
                }
            }
            "increment" | "decrement" => {
                self.check_arity(call, 1, 2, site)?;
                let path = self.store_path_argument(call, 0, site)?;
                let by = match call.arguments.get(1) {
                    Some(_) => {
                        let by = self.argument(call, 1, site)?;
                        self.resolve_expression(by, scope, site)
                    }
                    None => ValueDescriptor::Literal(Value::from(1)),
                };
                let operator = if method == "increment" {
                    ComputeOperator::Add
                } else {
                    ComputeOperator::Subtract
                };
                let mut builder = ComputeBuilder::default();
                let current = builder.absorb(ValueDescriptor::StoreReference(path.clone()));
                let by = builder.absorb(by);
                let value = builder.finish(ComputeExpr::Binary {
                    operator,
                    left: Box::new(current),
                    right: Box::new(by),
                });
                Some(ActionDescriptor::StoreSet { path, value })
            }
            "toggle" => {
                self.check_arity(call, 1, 1, site)?;
                let path = self.store_path_argument(call, 0, site)?;
                let mut builder = ComputeBuilder::default();
                let current = builder.absorb(ValueDescriptor::StoreReference(path.clone()));
                let value = builder.finish(ComputeExpr::Not {
                    operand: Box::new(current),
                });
                Some(ActionDescriptor::StoreSet { path, value })
            }
            _ => self.unrecognized_call(call, site),
        }
    }

    fn lower_navigation_call(
        &mut self,
        method: &str,
        call: &CallExpression<'_>,
        scope: &PropScope,
        site: &str,
    ) -> Option<ActionDescriptor> {
        let (kind, min, max) = match method {
            "push" => (NavigateKind::Push, 1, 2),
            "replace" => (NavigateKind::Replace, 1, 2),
            "modal" => (NavigateKind::Modal, 1, 2),
            "reset" => (NavigateKind::Reset, 1, 2),
            "popTo" => (NavigateKind::PopTo, 1, 1),
            "pop" => (NavigateKind::Pop, 0, 0),
            "dismissModal" => (NavigateKind::DismissModal, 0, 0),
            _ => return self.unrecognized_call(call, site),
        };
        self.check_arity(call, min, max, site)?;

        let mut resolved = Vec::with_capacity(call.arguments.len());
        for index in 0..call.arguments.len() {
            let argument = self.argument(call, index, site)?;
            resolved.push(self.resolve_expression(argument, scope, site));
        }
        let mut resolved = resolved.into_iter();
        Some(ActionDescriptor::Navigate {
            kind,
            target: resolved.next(),
            params: resolved.next(),
        })
    }

    fn lower_api_call(
        &mut self,
        method: &str,
        call: &CallExpression<'_>,
        scope: &PropScope,
        site: &str,
        awaited: bool,
    ) -> Option<ActionDescriptor> {
        let mut options = ApiOptions::default();
        if method == "request" {
            self.check_arity(call, 1, 1, site)?;
            let object = self.options_object(call, 0, site)?;
            self.lower_api_options(object, true, &mut options, scope, site)?;
        } else {
            let Some(http_method) =
                HttpMethod::parse(method).filter(|_| method == method.to_lowercase())
            else {
                return self.unrecognized_call(call, site);
            };
            self.check_arity(call, 1, 2, site)?;
            let endpoint = self.argument(call, 0, site)?;
            options.endpoint = Some(self.resolve_expression(endpoint, scope, site));
            options.method = Some(http_method);
            if call.arguments.len() > 1 {
                let object = self.options_object(call, 1, site)?;
                self.lower_api_options(object, false, &mut options, scope, site)?;
            }
        }

        let Some(endpoint) = options.endpoint else {
            self.error(
                DiagnosticKind::ValidationError,
                ERR_ACTION_ARGUMENTS,
                "`api.request` needs an `endpoint` (or `url`) option.",
                call.span,
                site,
            );
            return None;
        };
        Some(ActionDescriptor::ApiRequest(ApiRequestDescriptor {
            endpoint,
            method: options.method.unwrap_or(HttpMethod::Get),
            headers: options.headers,
            body: options.body,
            on_success: options.on_success,
            on_error: options.on_error,
            response_mapping: options.response_mapping,
            awaited,
        }))
    }

    fn lower_api_options(
        &mut self,
        object: &ObjectExpression<'_>,
        is_request: bool,
        options: &mut ApiOptions,
        scope: &PropScope,
        site: &str,
    ) -> Option<()> {
        let mut valid = true;
        for property in &object.properties {
            let ObjectPropertyKind::ObjectProperty(prop) = property else {
                self.argument_error("Spread is not allowed in api options.", property.span(), site);
                valid = false;
                continue;
            };
            let Some(key) = property_key_name(&prop.key).filter(|_| !prop.computed) else {
                self.argument_error("Api option keys must be static.", prop.span, site);
                valid = false;
                continue;
            };
            match key.as_str() {
                "endpoint" | "url" if is_request => {
                    options.endpoint = Some(self.resolve_expression(&prop.value, scope, site));
                }
                "method" if is_request => {
                    match static_value(&prop.value, &self.constants)
                        .as_ref()
                        .and_then(Value::as_str)
                        .and_then(HttpMethod::parse)
                    {
                        Some(method) => options.method = Some(method),
                        None => {
                            self.argument_error(
                                "`method` must be one of GET, POST, PUT, PATCH, DELETE.",
                                prop.value.span(),
                                site,
                            );
                            valid = false;
                        }
                    }
                }
                "headers" => {
                    let headers = self.resolve_expression(&prop.value, scope, site);
                    match headers.into_entries() {
                        Some(entries) => options.headers = entries,
                        None => {
                            self.argument_error(
                                "`headers` must be an object.",
                                prop.value.span(),
                                site,
                            );
                            valid = false;
                        }
                    }
                }
                "body" => options.body = Some(self.resolve_expression(&prop.value, scope, site)),
                "onSuccess" => options.on_success = self.lower_callback(&prop.value, scope, site),
                "onError" => options.on_error = self.lower_callback(&prop.value, scope, site),
                "mapping" => match unwrap_expression(&prop.value) {
                    Expression::ObjectExpression(mapping) => {
                        options.response_mapping = self.lower_mapping(mapping, site);
                    }
                    other => {
                        self.argument_error(
                            "`mapping` must be an object literal `{ to, from? }`.",
                            other.span(),
                            site,
                        );
                        valid = false;
                    }
                },
                other => {
                    self.argument_error(
                        format!("Unknown api option '{}'.", other),
                        prop.key.span(),
                        site,
                    );
                    valid = false;
                }
            }
        }
        valid.then_some(())
    }

    fn lower_mapping(
        &mut self,
        mapping: &ObjectExpression<'_>,
        site: &str,
    ) -> Option<ResponseMapping> {
        let mut target = None;
        let mut source = None;
        for property in &mapping.properties {
            let ObjectPropertyKind::ObjectProperty(prop) = property else {
                continue;
            };
            let key = property_key_name(&prop.key);
            let slot = match key.as_deref() {
                Some("to") => &mut target,
                Some("from") => &mut source,
                _ => {
                    self.argument_error("`mapping` accepts only `to` and `from`.", prop.span, site);
                    return None;
                }
            };
            let path = match static_value(&prop.value, &self.constants) {
                Some(Value::String(path)) => path,
                _ => {
                    self.argument_error(
                        "Mapping paths must be string literals.",
                        prop.value.span(),
                        site,
                    );
                    return None;
                }
            };
            if let Err(error) = KeyPath::parse(&path) {
                self.error(
                    DiagnosticKind::ValidationError,
                    ERR_INVALID_STORE_PATH,
                    error.to_string(),
                    prop.value.span(),
                    site,
                );
                return None;
            }
            *slot = Some(path);
        }
        match target {
            Some(target) => Some(ResponseMapping { target, source }),
            None => {
                self.argument_error("`mapping` needs a `to` store path.", mapping.span, site);
                None
            }
        }
    }

    /// `onSuccess` / `onError`: an inline function or a named action.
    fn lower_callback(
        &mut self,
        expr: &Expression<'_>,
        scope: &PropScope,
        site: &str,
    ) -> Option<Callback> {
        let (action, bind) = match unwrap_expression(expr) {
            Expression::ArrowFunctionExpression(arrow) => {
                self.lower_handler(&arrow.params, &arrow.body, scope, site)
            }
            Expression::FunctionExpression(func) => match &func.body {
                Some(body) => self.lower_handler(&func.params, body, scope, site),
                None => return None,
            },
            Expression::StaticMemberExpression(m) if is_actions_object(&m.object) => {
                let named = self.named_action(m.property.name.as_str(), m.span, site)?;
                (named.action, named.bind)
            }
            other => {
                self.argument_error(
                    "Callbacks must be a function or a named action (`actions.name`).",
                    other.span(),
                    site,
                );
                return None;
            }
        };
        Some(Callback {
            bind,
            action: Box::new(action),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ARGUMENT HELPERS
    // ═══════════════════════════════════════════════════════════════════════════

    fn named_action(&mut self, name: &str, span: Span, site: &str) -> Option<NamedAction> {
        if let Some(named) = self.named_actions.get(name) {
            return Some(named.clone());
        }
        self.error(
            DiagnosticKind::ValidationError,
            ERR_UNKNOWN_ACTION_REF,
            format!("`actions.{}` is not defined in the exported actions.", name),
            span,
            site,
        );
        None
    }

    fn unrecognized_call<T>(&mut self, call: &CallExpression<'_>, site: &str) -> Option<T> {
        let target = self.source_text(call.callee.span());
        self.error(
            DiagnosticKind::ValidationError,
            ERR_UNRECOGNIZED_CALL,
            format!("Unrecognized call `{}` in an event handler.", target),
            call.span,
            site,
        );
        None
    }

    fn check_arity(
        &mut self,
        call: &CallExpression<'_>,
        min: usize,
        max: usize,
        site: &str,
    ) -> Option<()> {
        let count = call.arguments.len();
        if (min..=max).contains(&count) {
            return Some(());
        }
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{} to {}", min, max)
        };
        let message = format!(
            "`{}` expects {} argument(s), got {}.",
            self.source_text(call.callee.span()),
            expected,
            count
        );
        self.argument_error(message, call.span, site);
        None
    }

    fn argument<'c, 'a>(
        &mut self,
        call: &'c CallExpression<'a>,
        index: usize,
        site: &str,
    ) -> Option<&'c Expression<'a>> {
        match call.arguments.get(index) {
            Some(argument) => match argument.as_expression() {
                Some(expr) => Some(expr),
                None => {
                    self.argument_error(
                        "Spread arguments are not supported.",
                        argument.span(),
                        site,
                    );
                    None
                }
            },
            None => None,
        }
    }

    fn options_object<'c, 'a>(
        &mut self,
        call: &'c CallExpression<'a>,
        index: usize,
        site: &str,
    ) -> Option<&'c ObjectExpression<'a>> {
        match call.arguments.get(index).and_then(Argument::as_expression).map(unwrap_expression) {
            Some(Expression::ObjectExpression(object)) => Some(object),
            _ => {
                let message = format!(
                    "Options of `{}` must be an object literal.",
                    self.source_text(call.callee.span())
                );
                self.argument_error(message, call.span, site);
                None
            }
        }
    }

    /// Feedback and system calls take one optional payload; absent is `null`.
    fn optional_payload(
        &mut self,
        call: &CallExpression<'_>,
        scope: &PropScope,
        site: &str,
    ) -> Option<ValueDescriptor> {
        self.check_arity(call, 0, 1, site)?;
        if call.arguments.is_empty() {
            return Some(ValueDescriptor::null());
        }
        let payload = self.argument(call, 0, site)?;
        Some(self.resolve_expression(payload, scope, site))
    }

    fn argument_error(&mut self, message: impl Into<String>, span: Span, site: &str) {
        self.error(
            DiagnosticKind::ValidationError,
            ERR_ACTION_ARGUMENTS,
            message,
            span,
            site,
        );
    }
}

fn statement_kind(statement: &Statement<'_>) -> &'static str {
    match statement {
        Statement::ForStatement(_)
        | Statement::ForInStatement(_)
        | Statement::ForOfStatement(_)
        | Statement::WhileStatement(_)
        | Statement::DoWhileStatement(_) => "loop",
        Statement::TryStatement(_) => "try/catch",
        Statement::ThrowStatement(_) => "throw",
        Statement::SwitchStatement(_) => "switch",
        Statement::VariableDeclaration(_) => "variable declaration",
        Statement::FunctionDeclaration(_) | Statement::ClassDeclaration(_) => "declaration",
        Statement::LabeledStatement(_)
        | Statement::BreakStatement(_)
        | Statement::ContinueStatement(_) => "control flow",
        _ => "statement",
    }
}

fn is_actions_object(expr: &Expression<'_>) -> bool {
    matches!(unwrap_expression(expr), Expression::Identifier(id) if id.name.as_str() == "actions")
}
