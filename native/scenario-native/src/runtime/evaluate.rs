//! Evaluation of value descriptors, computed expressions and conditions
//! against a store snapshot and the props in scope.
//!
//! Semantics follow the loose rules UI authors expect from the source
//! language: `null` counts as `0` in arithmetic, `+` concatenates when either
//! side is a string, and numbers with no fractional part come back as integers.
//! Arithmetic that cannot produce a finite number yields `null`.

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

use super::key_path::KeyPath;
use crate::ir::{
    Bindings, CompareOperator, ComputeExpr, ComputeOperator, ConditionDescriptor, ValueDescriptor,
};

/// Props visible to an executing action: the outer element's props plus the
/// handler parameters bound from the call arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionContext {
    props: Value,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            props: Value::Object(Map::new()),
        }
    }
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-object props are treated as empty.
    pub fn with_props(props: Value) -> Self {
        match props {
            Value::Object(_) => Self { props },
            _ => Self::default(),
        }
    }

    pub fn props(&self) -> &Value {
        &self.props
    }

    /// Extends the context with `bind` resolved against the positional `args`.
    /// Missing argument paths bind `null`.
    pub fn bind(&self, bind: &Bindings, args: &[Value]) -> Self {
        if bind.is_empty() {
            return self.clone();
        }
        let args = Value::Array(args.to_vec());
        let mut props = self.props.clone();
        if let Value::Object(map) = &mut props {
            for (name, path) in bind {
                let value = lookup(&args, path).unwrap_or(Value::Null);
                map.insert(name.clone(), value);
            }
        }
        Self { props }
    }

    fn prop(&self, path: &str) -> Option<Value> {
        lookup(&self.props, path)
    }
}

fn lookup(root: &Value, path: &str) -> Option<Value> {
    KeyPath::parse(path).ok()?.lookup(root).cloned()
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALUES
// ═══════════════════════════════════════════════════════════════════════════════

/// Resolves a descriptor to plain JSON. Action references, templates and
/// elements pass through in their marker encoding.
pub fn resolve_value(descriptor: &ValueDescriptor, store: &Value, ctx: &ExecutionContext) -> Value {
    match descriptor {
        ValueDescriptor::Literal(value) => value.clone(),
        ValueDescriptor::StoreReference(path) => lookup(store, path).unwrap_or(Value::Null),
        ValueDescriptor::PropReference(path) => ctx.prop(path).unwrap_or(Value::Null),
        ValueDescriptor::Computed { expr, inputs } => {
            let inputs: Vec<Value> = inputs
                .iter()
                .map(|input| resolve_value(input, store, ctx))
                .collect();
            compute(expr, &inputs)
        }
        ValueDescriptor::Object(entries) => Value::Object(
            entries
                .iter()
                .map(|(key, entry)| (key.clone(), resolve_value(entry, store, ctx)))
                .collect(),
        ),
        ValueDescriptor::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_value(item, store, ctx))
                .collect(),
        ),
        ValueDescriptor::ActionRef { .. }
        | ValueDescriptor::Template { .. }
        | ValueDescriptor::Element(_) => Value::from(descriptor.clone()),
    }
}

pub fn compute(expr: &ComputeExpr, inputs: &[Value]) -> Value {
    match expr {
        ComputeExpr::Input { index } => inputs.get(*index).cloned().unwrap_or(Value::Null),
        ComputeExpr::Literal { value } => value.clone(),
        ComputeExpr::Binary {
            operator,
            left,
            right,
        } => {
            let left = compute(left, inputs);
            match operator {
                ComputeOperator::And if !is_truthy(&left) => left,
                ComputeOperator::And => compute(right, inputs),
                ComputeOperator::Or if is_truthy(&left) => left,
                ComputeOperator::Or => compute(right, inputs),
                ComputeOperator::Coalesce if !left.is_null() => left,
                ComputeOperator::Coalesce => compute(right, inputs),
                _ => binary(*operator, &left, &compute(right, inputs)),
            }
        }
        ComputeExpr::Not { operand } => Value::Bool(!is_truthy(&compute(operand, inputs))),
        ComputeExpr::Negate { operand } => to_number(&compute(operand, inputs))
            .map(|n| number_value(-n))
            .unwrap_or(Value::Null),
        ComputeExpr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if is_truthy(&compute(test, inputs)) {
                compute(consequent, inputs)
            } else {
                compute(alternate, inputs)
            }
        }
        ComputeExpr::Concat { parts } => Value::String(
            parts
                .iter()
                .map(|part| display_string(&compute(part, inputs)))
                .collect(),
        ),
    }
}

fn binary(operator: ComputeOperator, left: &Value, right: &Value) -> Value {
    match operator {
        ComputeOperator::Add if left.is_string() || right.is_string() => {
            Value::String(format!("{}{}", display_string(left), display_string(right)))
        }
        ComputeOperator::Add => arithmetic(left, right, |a, b| Some(a + b)),
        ComputeOperator::Subtract => arithmetic(left, right, |a, b| Some(a - b)),
        ComputeOperator::Multiply => arithmetic(left, right, |a, b| Some(a * b)),
        ComputeOperator::Divide => arithmetic(left, right, |a, b| (b != 0.0).then(|| a / b)),
        ComputeOperator::Remainder => arithmetic(left, right, |a, b| (b != 0.0).then(|| a % b)),
        ComputeOperator::Equals => Value::Bool(loose_equals(left, right)),
        ComputeOperator::NotEquals => Value::Bool(!loose_equals(left, right)),
        ComputeOperator::LessThan => Value::Bool(compare(CompareOperator::LessThan, left, right)),
        ComputeOperator::LessOrEqual => {
            Value::Bool(compare(CompareOperator::LessOrEqual, left, right))
        }
        ComputeOperator::GreaterThan => {
            Value::Bool(compare(CompareOperator::GreaterThan, left, right))
        }
        ComputeOperator::GreaterOrEqual => {
            Value::Bool(compare(CompareOperator::GreaterOrEqual, left, right))
        }
        // Short-circuiting operators are handled by the caller.
        ComputeOperator::And | ComputeOperator::Or | ComputeOperator::Coalesce => Value::Null,
    }
}

fn arithmetic(left: &Value, right: &Value, op: impl Fn(f64, f64) -> Option<f64>) -> Value {
    match (to_number(left), to_number(right)) {
        (Some(a), Some(b)) => op(a, b).map(number_value).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Integral results become JSON integers so `1 + 1` stores `2`, not `2.0`.
pub fn number_value(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Value::from(n as i64);
    }
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse().ok()
            }
        }
        Value::Array(_) | Value::Object(_) => None,
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare(operator: CompareOperator, left: &Value, right: &Value) -> bool {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => match (to_number(left), to_number(right)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match operator {
        CompareOperator::LessThan => ordering == Ordering::Less,
        CompareOperator::LessOrEqual => ordering != Ordering::Greater,
        CompareOperator::GreaterThan => ordering == Ordering::Greater,
        CompareOperator::GreaterOrEqual => ordering != Ordering::Less,
    }
}

/// Text form used by concatenation: `null` renders empty.
pub fn display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
                (f as i64).to_string()
            }
            _ => n.to_string(),
        },
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONDITIONS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn evaluate_condition(
    condition: &ConditionDescriptor,
    store: &Value,
    ctx: &ExecutionContext,
) -> bool {
    match condition {
        ConditionDescriptor::Equals { left, right } => loose_equals(
            &resolve_value(left, store, ctx),
            &resolve_value(right, store, ctx),
        ),
        ConditionDescriptor::NotEquals { left, right } => !loose_equals(
            &resolve_value(left, store, ctx),
            &resolve_value(right, store, ctx),
        ),
        ConditionDescriptor::Compare {
            operator,
            left,
            right,
        } => compare(
            *operator,
            &resolve_value(left, store, ctx),
            &resolve_value(right, store, ctx),
        ),
        // Present and not null.
        ConditionDescriptor::Exists { value } => !resolve_value(value, store, ctx).is_null(),
        ConditionDescriptor::Truthy { value } => is_truthy(&resolve_value(value, store, ctx)),
        ConditionDescriptor::Not { condition } => !evaluate_condition(condition, store, ctx),
        ConditionDescriptor::All { conditions } => conditions
            .iter()
            .all(|c| evaluate_condition(c, store, ctx)),
        ConditionDescriptor::Any { conditions } => conditions
            .iter()
            .any(|c| evaluate_condition(c, store, ctx)),
    }
}
