//! Static Expression Evaluator
//!
//! Evaluates expressions at compile time to plain JSON. Used for module-level
//! constants, the `stores` initial shape and `metadata`, which must all be
//! known before any element is compiled.

use oxc_ast::ast::{ArrayExpressionElement, Expression, ObjectPropertyKind, TemplateLiteral};
use oxc_syntax::operator::UnaryOperator;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::runtime::evaluate::number_value;
use crate::scope::property_key_name;

/// Strips parentheses and TypeScript-only wrappers (`as`, `satisfies`, `!`).
pub fn unwrap_expression<'b, 'a>(expr: &'b Expression<'a>) -> &'b Expression<'a> {
    match expr {
        Expression::ParenthesizedExpression(p) => unwrap_expression(&p.expression),
        Expression::TSAsExpression(e) => unwrap_expression(&e.expression),
        Expression::TSSatisfiesExpression(e) => unwrap_expression(&e.expression),
        Expression::TSNonNullExpression(e) => unwrap_expression(&e.expression),
        Expression::TSTypeAssertion(e) => unwrap_expression(&e.expression),
        other => other,
    }
}

/// Cooked text of a template literal without substitutions.
pub fn static_template(template: &TemplateLiteral<'_>) -> Option<String> {
    if !template.expressions.is_empty() {
        return None;
    }
    Some(
        template
            .quasis
            .iter()
            .map(|quasi| {
                quasi
                    .value
                    .cooked
                    .as_ref()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| quasi.value.raw.to_string())
            })
            .collect(),
    )
}

/// Try to evaluate an expression to a JSON value.
/// Returns None if any part depends on something not known at compile time.
pub fn static_value(expr: &Expression<'_>, constants: &BTreeMap<String, Value>) -> Option<Value> {
    match unwrap_expression(expr) {
        Expression::StringLiteral(s) => Some(Value::String(s.value.to_string())),
        Expression::NumericLiteral(n) => Some(number_value(n.value)),
        Expression::BooleanLiteral(b) => Some(Value::Bool(b.value)),
        Expression::NullLiteral(_) => Some(Value::Null),
        Expression::TemplateLiteral(t) => static_template(t).map(Value::String),
        Expression::UnaryExpression(u) if u.operator == UnaryOperator::UnaryNegation => {
            match static_value(&u.argument, constants)? {
                Value::Number(n) => n.as_f64().map(|f| number_value(-f)),
                _ => None,
            }
        }
        Expression::Identifier(id) if id.name.as_str() == "undefined" => Some(Value::Null),
        Expression::Identifier(id) => constants.get(id.name.as_str()).cloned(),
        Expression::ObjectExpression(obj) => {
            let mut map = Map::new();
            for prop in &obj.properties {
                match prop {
                    ObjectPropertyKind::ObjectProperty(p) if !p.method && !p.computed => {
                        let key = property_key_name(&p.key)?;
                        map.insert(key, static_value(&p.value, constants)?);
                    }
                    ObjectPropertyKind::SpreadProperty(spread) => {
                        match static_value(&spread.argument, constants)? {
                            Value::Object(entries) => map.extend(entries),
                            _ => return None,
                        }
                    }
                    _ => return None,
                }
            }
            Some(Value::Object(map))
        }
        Expression::ArrayExpression(arr) => {
            let mut items = Vec::with_capacity(arr.elements.len());
            for element in &arr.elements {
                match element {
                    ArrayExpressionElement::SpreadElement(spread) => {
                        match static_value(&spread.argument, constants)? {
                            Value::Array(inner) => items.extend(inner),
                            _ => return None,
                        }
                    }
                    ArrayExpressionElement::Elision(_) => items.push(Value::Null),
                    other => items.push(static_value(other.as_expression()?, constants)?),
                }
            }
            Some(Value::Array(items))
        }
        Expression::StaticMemberExpression(m) => {
            let object = static_value(&m.object, constants)?;
            Some(member(&object, m.property.name.as_str()))
        }
        Expression::ComputedMemberExpression(m) => {
            let object = static_value(&m.object, constants)?;
            let key = match static_value(&m.expression, constants)? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some(member(&object, &key))
        }
        _ => None,
    }
}

/// Missing members read as `null`.
pub(crate) fn member(object: &Value, key: &str) -> Value {
    match object {
        Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Null),
        Value::Array(items) => key
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i).cloned())
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}
