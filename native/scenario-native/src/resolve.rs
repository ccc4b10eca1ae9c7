//! Expression Resolver
//!
//! Turns source expressions into [`ValueDescriptor`]s and
//! [`ConditionDescriptor`]s. Identifiers resolve, in order, against the prop
//! scope, then module constants. `store.get('path')` becomes a store
//! reference. Operators over references become `Computed` descriptors whose
//! inputs are deduplicated; operators over literals are folded at compile time.
//!
//! What the resolver cannot express is reported through the owning
//! [`LoweringContext`]: as an error in strict mode, or silently replaced by
//! `null` in lenient mode.

use oxc_ast::ast::{
    Argument, ArrayExpressionElement, CallExpression, Expression, ObjectExpression,
    ObjectPropertyKind,
};
use oxc_span::{GetSpan, Span};
use oxc_syntax::operator::{BinaryOperator, LogicalOperator, UnaryOperator};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::catalog::Catalog;
use crate::ir::{
    find_marker_key, is_marker_key, ActionDescriptor, Bindings, CompareOperator, ComputeExpr,
    ComputeOperator, ConditionDescriptor, ValueDescriptor,
};
use crate::runtime::evaluate::{compute, number_value};
use crate::runtime::key_path::KeyPath;
use crate::scope::{join_path, property_key_name, PropScope};
use crate::static_eval::{member, static_template, static_value, unwrap_expression};
use crate::validate::{
    Diagnostic, DiagnosticKind, LineIndex, ERR_ACTION_ARGUMENTS, ERR_INVALID_STORE_PATH,
    ERR_RESERVED_KEY, ERR_UNRESOLVED_IDENTIFIER, ERR_UNSUPPORTED_EXPRESSION,
};

/// How unresolvable input is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionMode {
    /// Unknown identifiers and unsupported constructs are compile errors.
    #[default]
    Strict,
    /// They resolve to `null`.
    Lenient,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOWERING CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// One entry of `export const actions`. `bind` maps its parameters to the
/// event arguments, exactly as for an inline handler.
#[derive(Debug, Clone)]
pub(crate) struct NamedAction {
    pub(crate) action: ActionDescriptor,
    pub(crate) bind: Bindings,
}

/// State shared by the element and action compilers for one source file.
pub struct LoweringContext<'s> {
    pub(crate) source: &'s str,
    line_index: LineIndex,
    pub(crate) mode: ResolutionMode,
    pub(crate) catalog: &'s Catalog,
    /// Module-level `const` declarations with static values.
    pub(crate) constants: BTreeMap<String, Value>,
    /// Entries of `export const actions`, available to `actions.name` references.
    pub(crate) named_actions: BTreeMap<String, NamedAction>,
    /// Every action that ends up in the schema, keyed by id.
    pub(crate) actions: BTreeMap<String, ActionDescriptor>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl<'s> LoweringContext<'s> {
    pub fn new(source: &'s str, mode: ResolutionMode, catalog: &'s Catalog) -> Self {
        Self {
            source,
            line_index: LineIndex::new(source),
            mode,
            catalog,
            constants: BTreeMap::new(),
            named_actions: BTreeMap::new(),
            actions: BTreeMap::new(),
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn report(&mut self, diagnostic: Diagnostic, span: Span, site: &str) {
        let location = self.line_index.locate(span.start);
        self.diagnostics
            .push(diagnostic.with_path(site.to_string()).at(location));
    }

    pub(crate) fn error(
        &mut self,
        kind: DiagnosticKind,
        code: &str,
        message: impl Into<String>,
        span: Span,
        site: &str,
    ) {
        self.report(Diagnostic::error(kind, code, message), span, site);
    }

    pub(crate) fn warn(&mut self, code: &str, message: impl Into<String>, span: Span, site: &str) {
        self.report(Diagnostic::warning(code, message), span, site);
    }

    pub(crate) fn source_text(&self, span: Span) -> &'s str {
        self.source
            .get(span.start as usize..span.end as usize)
            .unwrap_or_default()
    }

    pub(crate) fn unresolved(
        &mut self,
        name: &str,
        scope: &PropScope,
        span: Span,
        site: &str,
    ) -> ValueDescriptor {
        match self.mode {
            ResolutionMode::Strict => self.error(
                DiagnosticKind::UnresolvedReferenceError,
                ERR_UNRESOLVED_IDENTIFIER,
                format!(
                    "Unresolved identifier '{}'. In scope: [{}]",
                    name,
                    scope.names().join(", ")
                ),
                span,
                site,
            ),
            ResolutionMode::Lenient => {
                debug!(%name, %site, "unresolved identifier lowered to null")
            }
        }
        ValueDescriptor::null()
    }

    pub(crate) fn unsupported(&mut self, what: &str, span: Span, site: &str) -> ValueDescriptor {
        match self.mode {
            ResolutionMode::Strict => {
                let message = format!("Unsupported {}: `{}`", what, self.source_text(span));
                self.error(
                    DiagnosticKind::UnsupportedConstructError,
                    ERR_UNSUPPORTED_EXPRESSION,
                    message,
                    span,
                    site,
                );
            }
            ResolutionMode::Lenient => {
                debug!(%what, %site, "unsupported construct lowered to null")
            }
        }
        ValueDescriptor::null()
    }

    /// Object keys that collide with a descriptor marker would decode as a
    /// reference, so they are rejected in both modes.
    fn reserved_key(&mut self, key: &str, span: Span, site: &str) {
        self.error(
            DiagnosticKind::ValidationError,
            ERR_RESERVED_KEY,
            format!("Object key '{}' is reserved for value references", key),
            span,
            site,
        );
    }

    /// A compile-time value as a literal descriptor, unless it carries a marker key.
    fn literal(&mut self, value: Value, span: Span, site: &str) -> ValueDescriptor {
        if let Some(key) = find_marker_key(&value).map(str::to_string) {
            self.reserved_key(&key, span, site);
            return ValueDescriptor::null();
        }
        ValueDescriptor::Literal(value)
    }

    /// The literal store path passed as argument `index` of `call`.
    /// Reports and returns `None` when it is missing, dynamic or malformed.
    pub(crate) fn store_path_argument(
        &mut self,
        call: &CallExpression<'_>,
        index: usize,
        site: &str,
    ) -> Option<String> {
        let argument = call.arguments.get(index).and_then(Argument::as_expression);
        let path = match argument.map(unwrap_expression) {
            Some(Expression::StringLiteral(s)) => s.value.to_string(),
            Some(Expression::TemplateLiteral(t)) if t.expressions.is_empty() => {
                static_template(t).unwrap_or_default()
            }
            _ => {
                self.error(
                    DiagnosticKind::ValidationError,
                    ERR_ACTION_ARGUMENTS,
                    format!(
                        "Argument {} of `{}` must be a string literal store path.",
                        index + 1,
                        self.source_text(call.callee.span())
                    ),
                    call.span,
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
                call.span,
                site,
            );
            return None;
        }
        Some(path)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // VALUES
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn resolve_expression(
        &mut self,
        expr: &Expression<'_>,
        scope: &PropScope,
        site: &str,
    ) -> ValueDescriptor {
        match unwrap_expression(expr) {
            Expression::StringLiteral(s) => {
                ValueDescriptor::Literal(Value::String(s.value.to_string()))
            }
            Expression::NumericLiteral(n) => ValueDescriptor::Literal(number_value(n.value)),
            Expression::BooleanLiteral(b) => ValueDescriptor::Literal(Value::Bool(b.value)),
            Expression::NullLiteral(_) => ValueDescriptor::null(),
            Expression::Identifier(id) if id.name.as_str() == "undefined" => {
                ValueDescriptor::null()
            }
            Expression::TemplateLiteral(t) => match static_template(t) {
                Some(text) => ValueDescriptor::Literal(Value::String(text)),
                None => self.lower_computed(expr, scope, site),
            },
            Expression::ObjectExpression(obj) => self.resolve_object(obj, scope, site),
            Expression::ArrayExpression(arr) => {
                let mut items = Vec::with_capacity(arr.elements.len());
                for element in &arr.elements {
                    match element {
                        ArrayExpressionElement::SpreadElement(spread) => {
                            match static_value(&spread.argument, &self.constants) {
                                Some(Value::Array(inner)) => {
                                    let span = spread.span;
                                    for value in inner {
                                        items.push(self.literal(value, span, site));
                                    }
                                }
                                _ => {
                                    self.unsupported("array spread", spread.span, site);
                                }
                            }
                        }
                        ArrayExpressionElement::Elision(_) => items.push(ValueDescriptor::null()),
                        other => match other.as_expression() {
                            Some(item) => items.push(self.resolve_expression(item, scope, site)),
                            None => items.push(ValueDescriptor::null()),
                        },
                    }
                }
                ValueDescriptor::from_items(items)
            }
            Expression::Identifier(_)
            | Expression::StaticMemberExpression(_)
            | Expression::ComputedMemberExpression(_) => {
                match self.member_target(expr, scope, site) {
                    Some(MemberTarget::Constant(value)) => self.literal(value, expr.span(), site),
                    Some(target) => target.into_descriptor(),
                    None => ValueDescriptor::null(),
                }
            }
            Expression::CallExpression(call) if is_store_call(call, "get") => {
                match self.store_path_argument(call, 0, site) {
                    Some(path) => ValueDescriptor::StoreReference(path),
                    None => ValueDescriptor::null(),
                }
            }
            Expression::UnaryExpression(u)
                if u.operator == UnaryOperator::UnaryNegation
                    && matches!(unwrap_expression(&u.argument), Expression::NumericLiteral(_)) =>
            {
                match static_value(expr, &self.constants) {
                    Some(value) => ValueDescriptor::Literal(value),
                    None => ValueDescriptor::null(),
                }
            }
            Expression::BinaryExpression(_)
            | Expression::LogicalExpression(_)
            | Expression::ConditionalExpression(_)
            | Expression::UnaryExpression(_) => self.lower_computed(expr, scope, site),
            other => self.unsupported(expression_kind(other), other.span(), site),
        }
    }

    fn resolve_object(
        &mut self,
        obj: &ObjectExpression<'_>,
        scope: &PropScope,
        site: &str,
    ) -> ValueDescriptor {
        let mut entries = BTreeMap::new();
        for prop in &obj.properties {
            match prop {
                ObjectPropertyKind::ObjectProperty(p) if p.method => {
                    self.unsupported("object method", p.span, site);
                }
                ObjectPropertyKind::ObjectProperty(p) => {
                    let key = property_key_name(&p.key)
                        .unwrap_or_else(|| self.source_text(p.key.span()).to_string());
                    if is_marker_key(&key) {
                        self.reserved_key(&key, p.key.span(), site);
                        continue;
                    }
                    let value = self.resolve_expression(&p.value, scope, site);
                    entries.insert(key, value);
                }
                ObjectPropertyKind::SpreadProperty(spread) => {
                    match static_value(&spread.argument, &self.constants) {
                        Some(Value::Object(map)) => {
                            for (key, value) in map {
                                if is_marker_key(&key) {
                                    self.reserved_key(&key, spread.span, site);
                                    continue;
                                }
                                let value = self.literal(value, spread.span, site);
                                entries.insert(key, value);
                            }
                        }
                        _ => {
                            self.unsupported("object spread", spread.span, site);
                        }
                    }
                }
            }
        }
        ValueDescriptor::from_entries(entries)
    }

    /// Resolves identifier and member chains. Reports and returns `None` on failure.
    fn member_target(
        &mut self,
        expr: &Expression<'_>,
        scope: &PropScope,
        site: &str,
    ) -> Option<MemberTarget> {
        match unwrap_expression(expr) {
            Expression::Identifier(id) => {
                let name = id.name.as_str();
                if let Some(path) = scope.resolve(name) {
                    Some(MemberTarget::Prop(path.to_string()))
                } else if let Some(value) = self.constants.get(name) {
                    Some(MemberTarget::Constant(value.clone()))
                } else {
                    self.unresolved(name, scope, id.span, site);
                    None
                }
            }
            Expression::StaticMemberExpression(m) => {
                let base = self.member_target(&m.object, scope, site)?;
                Some(base.member(m.property.name.as_str()))
            }
            Expression::ComputedMemberExpression(m) => {
                let key = match unwrap_expression(&m.expression) {
                    Expression::StringLiteral(s) => s.value.to_string(),
                    Expression::NumericLiteral(n) if n.value >= 0.0 && n.value.fract() == 0.0 => {
                        (n.value as u64).to_string()
                    }
                    _ => {
                        self.unsupported("computed member with a dynamic key", m.span, site);
                        return None;
                    }
                };
                let base = self.member_target(&m.object, scope, site)?;
                Some(base.member(&key))
            }
            Expression::CallExpression(call) if is_store_call(call, "get") => self
                .store_path_argument(call, 0, site)
                .map(MemberTarget::Store),
            other => {
                self.unsupported(expression_kind(other), other.span(), site);
                None
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // COMPUTED
    // ═══════════════════════════════════════════════════════════════════════════

    fn lower_computed(
        &mut self,
        expr: &Expression<'_>,
        scope: &PropScope,
        site: &str,
    ) -> ValueDescriptor {
        let mut builder = ComputeBuilder::default();
        let tree = self.compute_tree(expr, scope, site, &mut builder);
        builder.finish(tree)
    }

    fn compute_tree(
        &mut self,
        expr: &Expression<'_>,
        scope: &PropScope,
        site: &str,
        builder: &mut ComputeBuilder,
    ) -> ComputeExpr {
        match unwrap_expression(expr) {
            Expression::BinaryExpression(b) => match compute_operator(b.operator) {
                Some(operator) => ComputeExpr::Binary {
                    operator,
                    left: Box::new(self.compute_tree(&b.left, scope, site, builder)),
                    right: Box::new(self.compute_tree(&b.right, scope, site, builder)),
                },
                None => {
                    let what = format!("operator '{}'", b.operator.as_str());
                    self.unsupported(&what, b.span, site);
                    null_expr()
                }
            },
            Expression::LogicalExpression(l) => ComputeExpr::Binary {
                operator: match l.operator {
                    LogicalOperator::And => ComputeOperator::And,
                    LogicalOperator::Or => ComputeOperator::Or,
                    LogicalOperator::Coalesce => ComputeOperator::Coalesce,
                },
                left: Box::new(self.compute_tree(&l.left, scope, site, builder)),
                right: Box::new(self.compute_tree(&l.right, scope, site, builder)),
            },
            Expression::UnaryExpression(u) => match u.operator {
                UnaryOperator::LogicalNot => ComputeExpr::Not {
                    operand: Box::new(self.compute_tree(&u.argument, scope, site, builder)),
                },
                UnaryOperator::UnaryNegation => ComputeExpr::Negate {
                    operand: Box::new(self.compute_tree(&u.argument, scope, site, builder)),
                },
                UnaryOperator::UnaryPlus => self.compute_tree(&u.argument, scope, site, builder),
                other => {
                    let what = format!("operator '{}'", other.as_str());
                    self.unsupported(&what, u.span, site);
                    null_expr()
                }
            },
            Expression::ConditionalExpression(c) => ComputeExpr::Conditional {
                test: Box::new(self.compute_tree(&c.test, scope, site, builder)),
                consequent: Box::new(self.compute_tree(&c.consequent, scope, site, builder)),
                alternate: Box::new(self.compute_tree(&c.alternate, scope, site, builder)),
            },
            Expression::TemplateLiteral(t) if !t.expressions.is_empty() => {
                let mut parts = Vec::new();
                for (index, quasi) in t.quasis.iter().enumerate() {
                    let text = quasi
                        .value
                        .cooked
                        .as_ref()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| quasi.value.raw.to_string());
                    if !text.is_empty() {
                        parts.push(ComputeExpr::Literal {
                            value: Value::String(text),
                        });
                    }
                    if let Some(expression) = t.expressions.get(index) {
                        parts.push(self.compute_tree(expression, scope, site, builder));
                    }
                }
                ComputeExpr::Concat { parts }
            }
            other => {
                let leaf = self.resolve_expression(other, scope, site);
                match leaf {
                    ValueDescriptor::Literal(_)
                    | ValueDescriptor::StoreReference(_)
                    | ValueDescriptor::PropReference(_)
                    | ValueDescriptor::Computed { .. } => builder.absorb(leaf),
                    _ => {
                        self.unsupported(
                            "non-literal object in a computed expression",
                            other.span(),
                            site,
                        );
                        null_expr()
                    }
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CONDITIONS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn resolve_condition(
        &mut self,
        expr: &Expression<'_>,
        scope: &PropScope,
        site: &str,
    ) -> ConditionDescriptor {
        match unwrap_expression(expr) {
            Expression::LogicalExpression(l) if l.operator == LogicalOperator::And => {
                let left = self.resolve_condition(&l.left, scope, site);
                let right = self.resolve_condition(&l.right, scope, site);
                ConditionDescriptor::All {
                    conditions: flatten_all(left, right),
                }
            }
            Expression::LogicalExpression(l) if l.operator == LogicalOperator::Or => {
                let left = self.resolve_condition(&l.left, scope, site);
                let right = self.resolve_condition(&l.right, scope, site);
                ConditionDescriptor::Any {
                    conditions: flatten_any(left, right),
                }
            }
            Expression::UnaryExpression(u) if u.operator == UnaryOperator::LogicalNot => {
                ConditionDescriptor::Not {
                    condition: Box::new(self.resolve_condition(&u.argument, scope, site)),
                }
            }
            Expression::BinaryExpression(b) => {
                let compare = match b.operator {
                    BinaryOperator::LessThan => Some(CompareOperator::LessThan),
                    BinaryOperator::LessEqualThan => Some(CompareOperator::LessOrEqual),
                    BinaryOperator::GreaterThan => Some(CompareOperator::GreaterThan),
                    BinaryOperator::GreaterEqualThan => Some(CompareOperator::GreaterOrEqual),
                    _ => None,
                };
                let equality = matches!(
                    b.operator,
                    BinaryOperator::Equality | BinaryOperator::StrictEquality
                );
                let inequality = matches!(
                    b.operator,
                    BinaryOperator::Inequality | BinaryOperator::StrictInequality
                );
                if !equality && !inequality && compare.is_none() {
                    return ConditionDescriptor::Truthy {
                        value: self.resolve_expression(expr, scope, site),
                    };
                }
                let left = self.resolve_expression(&b.left, scope, site);
                let right = self.resolve_expression(&b.right, scope, site);
                match compare {
                    Some(operator) => ConditionDescriptor::Compare {
                        operator,
                        left,
                        right,
                    },
                    None if equality => ConditionDescriptor::Equals { left, right },
                    None => ConditionDescriptor::NotEquals { left, right },
                }
            }
            Expression::CallExpression(call) if is_store_call(call, "has") => {
                ConditionDescriptor::Exists {
                    value: match self.store_path_argument(call, 0, site) {
                        Some(path) => ValueDescriptor::StoreReference(path),
                        None => ValueDescriptor::null(),
                    },
                }
            }
            _ => ConditionDescriptor::Truthy {
                value: self.resolve_expression(expr, scope, site),
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

enum MemberTarget {
    Prop(String),
    Store(String),
    Constant(Value),
}

impl MemberTarget {
    fn member(self, key: &str) -> Self {
        match self {
            MemberTarget::Prop(path) => MemberTarget::Prop(join_path(&path, key)),
            MemberTarget::Store(path) => MemberTarget::Store(join_path(&path, key)),
            MemberTarget::Constant(value) => MemberTarget::Constant(member(&value, key)),
        }
    }

    fn into_descriptor(self) -> ValueDescriptor {
        match self {
            MemberTarget::Prop(path) => ValueDescriptor::PropReference(path),
            MemberTarget::Store(path) => ValueDescriptor::StoreReference(path),
            MemberTarget::Constant(value) => ValueDescriptor::Literal(value),
        }
    }
}

/// Collects the inputs of one `Computed` descriptor. Equal references share
/// an index.
#[derive(Debug, Default)]
pub(crate) struct ComputeBuilder {
    inputs: Vec<ValueDescriptor>,
}

impl ComputeBuilder {
    fn input_index(&mut self, reference: ValueDescriptor) -> usize {
        match self.inputs.iter().position(|existing| *existing == reference) {
            Some(index) => index,
            None => {
                self.inputs.push(reference);
                self.inputs.len() - 1
            }
        }
    }

    /// Embeds a resolved descriptor, re-indexing the inputs of nested computeds.
    pub(crate) fn absorb(&mut self, descriptor: ValueDescriptor) -> ComputeExpr {
        match descriptor {
            ValueDescriptor::Literal(value) => ComputeExpr::Literal { value },
            reference @ ValueDescriptor::StoreReference(_) => ComputeExpr::Input {
                index: self.input_index(reference),
            },
            reference @ ValueDescriptor::PropReference(_) => ComputeExpr::Input {
                index: self.input_index(reference),
            },
            ValueDescriptor::Computed { expr, inputs } => {
                let indices: Vec<usize> = inputs
                    .into_iter()
                    .map(|input| self.input_index(input))
                    .collect();
                reindex(expr, &indices)
            }
            other => ComputeExpr::Literal {
                value: Value::from(other),
            },
        }
    }

    /// Input-free expressions are folded to a literal.
    pub(crate) fn finish(self, expr: ComputeExpr) -> ValueDescriptor {
        if self.inputs.is_empty() {
            ValueDescriptor::Literal(compute(&expr, &[]))
        } else {
            ValueDescriptor::Computed {
                expr,
                inputs: self.inputs,
            }
        }
    }
}

fn reindex(expr: ComputeExpr, indices: &[usize]) -> ComputeExpr {
    let boxed = |e: Box<ComputeExpr>| Box::new(reindex(*e, indices));
    match expr {
        ComputeExpr::Input { index } => ComputeExpr::Input {
            index: indices.get(index).copied().unwrap_or(index),
        },
        ComputeExpr::Literal { value } => ComputeExpr::Literal { value },
        ComputeExpr::Binary {
            operator,
            left,
            right,
        } => ComputeExpr::Binary {
            operator,
            left: boxed(left),
            right: boxed(right),
        },
        ComputeExpr::Not { operand } => ComputeExpr::Not {
            operand: boxed(operand),
        },
        ComputeExpr::Negate { operand } => ComputeExpr::Negate {
            operand: boxed(operand),
        },
        ComputeExpr::Conditional {
            test,
            consequent,
            alternate,
        } => ComputeExpr::Conditional {
            test: boxed(test),
            consequent: boxed(consequent),
            alternate: boxed(alternate),
        },
        ComputeExpr::Concat { parts } => ComputeExpr::Concat {
            parts: parts.into_iter().map(|p| reindex(p, indices)).collect(),
        },
    }
}

fn null_expr() -> ComputeExpr {
    ComputeExpr::Literal { value: Value::Null }
}

fn compute_operator(operator: BinaryOperator) -> Option<ComputeOperator> {
    Some(match operator {
        BinaryOperator::Addition => ComputeOperator::Add,
        BinaryOperator::Subtraction => ComputeOperator::Subtract,
        BinaryOperator::Multiplication => ComputeOperator::Multiply,
        BinaryOperator::Division => ComputeOperator::Divide,
        BinaryOperator::Remainder => ComputeOperator::Remainder,
        BinaryOperator::Equality | BinaryOperator::StrictEquality => ComputeOperator::Equals,
        BinaryOperator::Inequality | BinaryOperator::StrictInequality => {
            ComputeOperator::NotEquals
        }
        BinaryOperator::LessThan => ComputeOperator::LessThan,
        BinaryOperator::LessEqualThan => ComputeOperator::LessOrEqual,
        BinaryOperator::GreaterThan => ComputeOperator::GreaterThan,
        BinaryOperator::GreaterEqualThan => ComputeOperator::GreaterOrEqual,
        _ => return None,
    })
}

fn flatten_all(left: ConditionDescriptor, right: ConditionDescriptor) -> Vec<ConditionDescriptor> {
    let mut conditions = Vec::new();
    for condition in [left, right] {
        match condition {
            ConditionDescriptor::All { conditions: inner } => conditions.extend(inner),
            other => conditions.push(other),
        }
    }
    conditions
}

fn flatten_any(left: ConditionDescriptor, right: ConditionDescriptor) -> Vec<ConditionDescriptor> {
    let mut conditions = Vec::new();
    for condition in [left, right] {
        match condition {
            ConditionDescriptor::Any { conditions: inner } => conditions.extend(inner),
            other => conditions.push(other),
        }
    }
    conditions
}

/// `(namespace, method)` of a `namespace.method(...)` callee.
pub(crate) fn callee_name(callee: &Expression<'_>) -> Option<(String, String)> {
    match unwrap_expression(callee) {
        Expression::StaticMemberExpression(m) => match unwrap_expression(&m.object) {
            Expression::Identifier(id) => Some((id.name.to_string(), m.property.name.to_string())),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn is_store_call(call: &CallExpression<'_>, method: &str) -> bool {
    matches!(callee_name(&call.callee), Some((ns, m)) if ns == "store" && m == method)
}

pub(crate) fn expression_kind(expr: &Expression<'_>) -> &'static str {
    match expr {
        Expression::CallExpression(_) => "function call",
        Expression::NewExpression(_) => "constructor call",
        Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_) => {
            "function value"
        }
        Expression::AssignmentExpression(_) => "assignment",
        Expression::UpdateExpression(_) => "update expression",
        Expression::AwaitExpression(_) => "await expression",
        Expression::JSXElement(_) | Expression::JSXFragment(_) => "JSX in value position",
        Expression::ThisExpression(_) => "`this`",
        Expression::ClassExpression(_) => "class expression",
        Expression::SequenceExpression(_) => "comma expression",
        Expression::TaggedTemplateExpression(_) => "tagged template",
        Expression::RegExpLiteral(_) => "regular expression",
        Expression::BigIntLiteral(_) => "bigint literal",
        _ => "expression",
    }
}
