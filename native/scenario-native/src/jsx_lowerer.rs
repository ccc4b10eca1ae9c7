//! JSX Lowering for the Scenario Compiler
//!
//! Compiles one JSX element into a [`UiNode`]: catalog defaults, attribute
//! routing (`style` / `properties` / `data`), handler extraction and child
//! folding. Node paths (`root.0.1`) count element children in source order
//! and are used for generated action ids and diagnostics.

use lazy_static::lazy_static;
use oxc_ast::ast::{
    Expression, FormalParameters, FunctionBody, JSXAttributeItem, JSXAttributeName,
    JSXAttributeValue, JSXChild, JSXElement, JSXElementName, JSXMemberExpression,
    JSXMemberExpressionObject, Statement,
};
use oxc_span::{GetSpan, Span};
use regex::Regex;
use serde_json::Value;

use crate::catalog::{CatalogEntry, SPECIAL_PROPERTIES, UNIVERSAL_ATTRIBUTES};
use crate::ir::{UiNode, ValueDescriptor};
use crate::resolve::{ComputeBuilder, LoweringContext};
use crate::scope::{collect_argument_bindings, PropScope};
use crate::static_eval::unwrap_expression;
use crate::validate::{
    DiagnosticKind, ERR_CHILD_NOT_ALLOWED, ERR_STYLE_NOT_OBJECT, ERR_UNKNOWN_ACTION_REF,
    WARN_TEXT_DROPPED, WARN_UNKNOWN_ATTRIBUTE,
};

lazy_static! {
    static ref HANDLER_ATTRIBUTE: Regex = Regex::new(r"^on[A-Z]").unwrap();
}

enum ChildPiece {
    Text(ValueDescriptor),
    Node(UiNode),
}

// ═══════════════════════════════════════════════════════════════════════════════
// ELEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

impl<'s> LoweringContext<'s> {
    /// `owner` is `main` or a component name; `node_path` starts at `root`.
    pub fn lower_element(
        &mut self,
        element: &JSXElement<'_>,
        scope: &PropScope,
        owner: &str,
        node_path: &str,
    ) -> UiNode {
        let tag = tag_name(&element.opening_element.name);
        let site = format!("{}:{}", owner, node_path);
        let catalog = self.catalog;
        let declared = catalog.is_declared(&tag);
        let entry = catalog.lookup(&tag);

        let mut node = UiNode::new(tag);
        for (key, value) in &entry.default_style {
            node.style
                .insert(key.clone(), ValueDescriptor::Literal(value.clone()));
        }

        for item in &element.opening_element.attributes {
            match item {
                JSXAttributeItem::Attribute(attr) => {
                    let name = attribute_name(&attr.name);
                    let value = self.lower_attribute_value(
                        &name,
                        attr.value.as_ref(),
                        scope,
                        owner,
                        node_path,
                    );
                    self.place_attribute(&mut node, entry, declared, name, value, attr.span, &site);
                }
                JSXAttributeItem::SpreadAttribute(spread) => {
                    self.unsupported("spread attribute", spread.span, &site);
                }
            }
        }

        let mut pieces = Vec::new();
        let mut ordinal = 0;
        self.collect_children(
            &element.children,
            scope,
            owner,
            node_path,
            &mut ordinal,
            &mut pieces,
        );
        self.assemble_children(&mut node, entry, pieces, element.span, &site);

        node
    }

    fn lower_attribute_value(
        &mut self,
        name: &str,
        value: Option<&JSXAttributeValue<'_>>,
        scope: &PropScope,
        owner: &str,
        node_path: &str,
    ) -> ValueDescriptor {
        match value {
            // Shorthand boolean attribute: `<Switch disabled />`
            None => ValueDescriptor::Literal(Value::Bool(true)),
            Some(JSXAttributeValue::StringLiteral(s)) => {
                ValueDescriptor::Literal(Value::String(s.value.to_string()))
            }
            Some(JSXAttributeValue::Element(el)) => {
                let path = format!("{}@{}", node_path, name);
                ValueDescriptor::Element(Box::new(self.lower_element(el, scope, owner, &path)))
            }
            Some(JSXAttributeValue::Fragment(frag)) => {
                let site = format!("{}:{}", owner, node_path);
                self.unsupported("fragment as attribute value", frag.span, &site)
            }
            Some(JSXAttributeValue::ExpressionContainer(container)) => {
                match container.expression.as_expression() {
                    Some(expr) => {
                        self.lower_attribute_expression(name, expr, scope, owner, node_path)
                    }
                    None => ValueDescriptor::null(),
                }
            }
        }
    }

    fn lower_attribute_expression(
        &mut self,
        name: &str,
        expr: &Expression<'_>,
        scope: &PropScope,
        owner: &str,
        node_path: &str,
    ) -> ValueDescriptor {
        let site = format!("{}:{}", owner, node_path);
        match unwrap_expression(expr) {
            Expression::ArrowFunctionExpression(arrow) => self.lower_function_value(
                name,
                &arrow.params,
                &arrow.body,
                arrow.span,
                scope,
                owner,
                node_path,
            ),
            Expression::FunctionExpression(func) => match &func.body {
                Some(body) => self.lower_function_value(
                    name,
                    &func.params,
                    body,
                    func.span,
                    scope,
                    owner,
                    node_path,
                ),
                None => ValueDescriptor::null(),
            },
            Expression::JSXElement(el) => {
                let path = format!("{}@{}", node_path, name);
                ValueDescriptor::Element(Box::new(self.lower_element(el, scope, owner, &path)))
            }
            other => match named_action_reference(other, scope) {
                Some(id) => self.action_reference(id, other.span(), &site),
                None => self.resolve_expression(other, scope, &site),
            },
        }
    }

    /// Functions returning JSX become templates; functions on `on*`
    /// attributes are event handlers compiled into the action table.
    #[allow(clippy::too_many_arguments)]
    fn lower_function_value(
        &mut self,
        name: &str,
        params: &FormalParameters<'_>,
        body: &FunctionBody<'_>,
        span: Span,
        scope: &PropScope,
        owner: &str,
        node_path: &str,
    ) -> ValueDescriptor {
        if let Some(element) = returned_jsx(body) {
            let bind = collect_argument_bindings(params);
            let inner = scope.extend(bind.keys());
            let path = format!("{}@{}", node_path, name);
            let node = self.lower_element(element, &inner, owner, &path);
            return ValueDescriptor::Template {
                node: Box::new(node),
                bind,
            };
        }

        if !HANDLER_ATTRIBUTE.is_match(name) {
            let site = format!("{}:{}", owner, node_path);
            return self.unsupported("function value outside an event handler", span, &site);
        }

        let id = format!("{}:{}:{}", owner, node_path, name);
        let (action, bind) = self.lower_handler(params, body, scope, &id);
        self.actions.insert(id.clone(), action);
        ValueDescriptor::ActionRef { id, bind }
    }

    fn action_reference(&mut self, id: String, span: Span, site: &str) -> ValueDescriptor {
        if let Some(named) = self.named_actions.get(&id) {
            let bind = named.bind.clone();
            return ValueDescriptor::ActionRef { id, bind };
        }
        self.error(
            DiagnosticKind::ValidationError,
            ERR_UNKNOWN_ACTION_REF,
            format!("`actions.{}` is not defined in the exported actions.", id),
            span,
            site,
        );
        ValueDescriptor::null()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ATTRIBUTES
    // ═══════════════════════════════════════════════════════════════════════════

    #[allow(clippy::too_many_arguments)]
    fn place_attribute(
        &mut self,
        node: &mut UiNode,
        entry: &CatalogEntry,
        declared: bool,
        name: String,
        value: ValueDescriptor,
        span: Span,
        site: &str,
    ) {
        if name == "style" {
            self.merge_style(node, value, span, site);
            return;
        }

        let special = SPECIAL_PROPERTIES.contains(name.as_str());
        if declared
            && !special
            && !UNIVERSAL_ATTRIBUTES.contains(name.as_str())
            && !entry.known_properties.contains(&name)
        {
            self.warn(
                WARN_UNKNOWN_ATTRIBUTE,
                format!("Unknown attribute '{}' on <{}>.", name, node.node_type),
                span,
                site,
            );
        }

        if special {
            node.properties.insert(name, value);
        } else {
            node.data.insert(name, value);
        }
    }

    /// Later entries override earlier ones and the catalog defaults.
    fn merge_style(&mut self, node: &mut UiNode, value: ValueDescriptor, span: Span, site: &str) {
        match value {
            ValueDescriptor::Literal(Value::Null)
            | ValueDescriptor::Literal(Value::Bool(false)) => {}
            ValueDescriptor::Literal(Value::Array(items)) => {
                for item in items {
                    self.merge_style(node, ValueDescriptor::Literal(item), span, site);
                }
            }
            ValueDescriptor::Array(items) => {
                for item in items {
                    self.merge_style(node, item, span, site);
                }
            }
            other => match other.into_entries() {
                Some(entries) => node.style.extend(entries),
                None => self.error(
                    DiagnosticKind::ValidationError,
                    ERR_STYLE_NOT_OBJECT,
                    "The style attribute must be an object or an array of objects.",
                    span,
                    site,
                ),
            },
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CHILDREN
    // ═══════════════════════════════════════════════════════════════════════════

    fn collect_children(
        &mut self,
        children: &[JSXChild<'_>],
        scope: &PropScope,
        owner: &str,
        node_path: &str,
        ordinal: &mut usize,
        pieces: &mut Vec<ChildPiece>,
    ) {
        let site = format!("{}:{}", owner, node_path);
        for child in children {
            match child {
                JSXChild::Text(t) => {
                    if let Some(text) = normalize_jsx_text(t.value.as_str()) {
                        let text = ValueDescriptor::Literal(Value::String(text));
                        pieces.push(ChildPiece::Text(text));
                    }
                }
                JSXChild::Element(el) => {
                    let path = format!("{}.{}", node_path, ordinal);
                    *ordinal += 1;
                    pieces.push(ChildPiece::Node(self.lower_element(el, scope, owner, &path)));
                }
                JSXChild::Fragment(frag) => {
                    self.collect_children(&frag.children, scope, owner, node_path, ordinal, pieces);
                }
                JSXChild::ExpressionContainer(container) => {
                    // `{/* comment */}` has no expression
                    let Some(expr) = container.expression.as_expression() else {
                        continue;
                    };
                    match unwrap_expression(expr) {
                        Expression::JSXElement(el) => {
                            let path = format!("{}.{}", node_path, ordinal);
                            *ordinal += 1;
                            let node = self.lower_element(el, scope, owner, &path);
                            pieces.push(ChildPiece::Node(node));
                        }
                        Expression::JSXFragment(frag) => {
                            self.collect_children(
                                &frag.children,
                                scope,
                                owner,
                                node_path,
                                ordinal,
                                pieces,
                            );
                        }
                        other => {
                            let value = self.resolve_expression(other, scope, &site);
                            if value != ValueDescriptor::null() {
                                pieces.push(ChildPiece::Text(value));
                            }
                        }
                    }
                }
                JSXChild::Spread(spread) => {
                    self.unsupported("spread child", spread.span, &site);
                }
            }
        }
    }

    /// Text-only content folds into `properties.text`; in mixed content each
    /// text run becomes a `Text` leaf between the element children.
    fn assemble_children(
        &mut self,
        node: &mut UiNode,
        entry: &CatalogEntry,
        mut pieces: Vec<ChildPiece>,
        span: Span,
        site: &str,
    ) {
        let has_text = pieces.iter().any(|p| matches!(p, ChildPiece::Text(_)));
        if has_text && !entry.text_children {
            self.warn(
                WARN_TEXT_DROPPED,
                format!(
                    "Text inside <{}> is dropped; wrap it in <Text>.",
                    node.node_type
                ),
                span,
                site,
            );
            pieces.retain(|p| matches!(p, ChildPiece::Node(_)));
        }

        if pieces.iter().all(|p| matches!(p, ChildPiece::Text(_))) {
            let parts = pieces
                .into_iter()
                .filter_map(|p| match p {
                    ChildPiece::Text(value) => Some(value),
                    ChildPiece::Node(_) => None,
                })
                .collect();
            if let Some(text) = fold_text(parts, true, true) {
                node.properties.insert("text".to_string(), text);
            }
            return;
        }

        let mut run = Vec::new();
        let mut run_start = 0;
        for (index, piece) in pieces.into_iter().enumerate() {
            match piece {
                ChildPiece::Text(value) => {
                    if run.is_empty() {
                        run_start = index;
                    }
                    run.push(value);
                }
                ChildPiece::Node(child) => {
                    if !run.is_empty() {
                        let leading = run_start == 0;
                        if let Some(text) = fold_text(std::mem::take(&mut run), leading, false) {
                            self.push_child(node, entry, UiNode::text_leaf(text), span, site);
                        }
                    }
                    self.push_child(node, entry, child, span, site);
                }
            }
        }
        if !run.is_empty() {
            let leading = run_start == 0;
            if let Some(text) = fold_text(run, leading, true) {
                self.push_child(node, entry, UiNode::text_leaf(text), span, site);
            }
        }
    }

    fn push_child(
        &mut self,
        node: &mut UiNode,
        entry: &CatalogEntry,
        child: UiNode,
        span: Span,
        site: &str,
    ) {
        if !entry.allowed_children.allows(&child.node_type) {
            self.error(
                DiagnosticKind::ValidationError,
                ERR_CHILD_NOT_ALLOWED,
                format!(
                    "<{}> is not allowed inside <{}>.",
                    child.node_type, node.node_type
                ),
                span,
                site,
            );
        }
        node.children.push(child);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn tag_name(name: &JSXElementName<'_>) -> String {
    match name {
        JSXElementName::Identifier(id) => id.name.to_string(),
        JSXElementName::IdentifierReference(id) => id.name.to_string(),
        JSXElementName::NamespacedName(ns) => format!("{}:{}", ns.namespace.name, ns.name.name),
        JSXElementName::MemberExpression(me) => member_name(me),
        JSXElementName::ThisExpression(_) => "this".to_string(),
    }
}

fn member_name(me: &JSXMemberExpression<'_>) -> String {
    let object = match &me.object {
        JSXMemberExpressionObject::IdentifierReference(id) => id.name.to_string(),
        JSXMemberExpressionObject::MemberExpression(inner) => member_name(inner),
        _ => "unknown".to_string(),
    };
    format!("{}.{}", object, me.property.name)
}

fn attribute_name(name: &JSXAttributeName<'_>) -> String {
    match name {
        JSXAttributeName::Identifier(id) => id.name.to_string(),
        JSXAttributeName::NamespacedName(ns) => format!("{}:{}", ns.namespace.name, ns.name.name),
    }
}

/// `actions.name` when `actions` is not shadowed by a prop.
fn named_action_reference(expr: &Expression<'_>, scope: &PropScope) -> Option<String> {
    match expr {
        Expression::StaticMemberExpression(m) if scope.resolve("actions").is_none() => {
            match unwrap_expression(&m.object) {
                Expression::Identifier(id) if id.name.as_str() == "actions" => {
                    Some(m.property.name.to_string())
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// The element a function body evaluates to: `() => <X/>` or `{ return <X/> }`.
pub(crate) fn returned_jsx<'b, 'a>(body: &'b FunctionBody<'a>) -> Option<&'b JSXElement<'a>> {
    let returned = match &body.statements[..] {
        [Statement::ExpressionStatement(stmt)] => Some(&stmt.expression),
        [Statement::ReturnStatement(ret)] => ret.argument.as_ref(),
        _ => None,
    }?;
    match unwrap_expression(returned) {
        Expression::JSXElement(el) => Some(el),
        _ => None,
    }
}

/// Collapses whitespace runs to one space. Whitespace-only text spanning a
/// line break is layout and is dropped.
fn normalize_jsx_text(raw: &str) -> Option<String> {
    if raw.trim().is_empty() && raw.contains('\n') {
        return None;
    }
    let mut out = String::with_capacity(raw.len());
    let mut in_whitespace = false;
    for ch in raw.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push(' ');
            }
            in_whitespace = true;
        } else {
            out.push(ch);
            in_whitespace = false;
        }
    }
    (!out.is_empty()).then_some(out)
}

/// Joins text parts into one descriptor: a literal when everything is
/// static, the lone reference when there is exactly one, a `Concat` otherwise.
fn fold_text(
    parts: Vec<ValueDescriptor>,
    trim_start: bool,
    trim_end: bool,
) -> Option<ValueDescriptor> {
    let mut merged: Vec<ValueDescriptor> = Vec::new();
    for part in parts {
        if let (
            Some(ValueDescriptor::Literal(Value::String(prev))),
            ValueDescriptor::Literal(Value::String(next)),
        ) = (merged.last_mut(), &part)
        {
            prev.push_str(next);
            continue;
        }
        merged.push(part);
    }

    if trim_start {
        if let Some(ValueDescriptor::Literal(Value::String(first))) = merged.first_mut() {
            *first = first.trim_start().to_string();
        }
    }
    if trim_end {
        if let Some(ValueDescriptor::Literal(Value::String(last))) = merged.last_mut() {
            *last = last.trim_end().to_string();
        }
    }
    merged.retain(
        |part| !matches!(part, ValueDescriptor::Literal(Value::String(s)) if s.is_empty()),
    );

    match merged.len() {
        0 => None,
        1 => merged.pop(),
        _ => {
            let mut builder = ComputeBuilder::default();
            let parts = merged.into_iter().map(|part| builder.absorb(part)).collect();
            Some(builder.finish(crate::ir::ComputeExpr::Concat { parts }))
        }
    }
}
