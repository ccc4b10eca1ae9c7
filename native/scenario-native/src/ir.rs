//! Intermediate Representations for the Scenario Compiler
//!
//! The UI Node Tree and the Action Descriptor Tree are produced once per
//! compilation, persisted inside a [`Schema`] and replayed by the runtime.
//! Every map is a `BTreeMap` so that compiling the same source twice
//! serializes to the same bytes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Handler parameter name → path into the positional argument list
/// (`"0"`, `"0.item"`, ...).
pub type Bindings = BTreeMap<String, String>;

// ═══════════════════════════════════════════════════════════════════════════════
// UI NODE TREE
// ═══════════════════════════════════════════════════════════════════════════════

/// One compiled element. Empty maps and child lists are never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiNode {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub style: BTreeMap<String, ValueDescriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ValueDescriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, ValueDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<UiNode>,
}

impl UiNode {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            style: BTreeMap::new(),
            properties: BTreeMap::new(),
            data: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Synthetic text leaf used for text runs in mixed content.
    pub fn text_leaf(text: ValueDescriptor) -> Self {
        let mut node = Self::new("Text");
        node.properties.insert("text".to_string(), text);
        node
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALUE DESCRIPTORS
// ═══════════════════════════════════════════════════════════════════════════════

pub const STORE_MARKER: &str = "$store";
pub const PROP_MARKER: &str = "$prop";
pub const COMPUTED_MARKER: &str = "$computed";
pub const ACTION_MARKER: &str = "$action";
pub const TEMPLATE_MARKER: &str = "$template";
pub const ELEMENT_MARKER: &str = "$element";

const MARKER_KEYS: [&str; 6] = [
    STORE_MARKER,
    PROP_MARKER,
    COMPUTED_MARKER,
    ACTION_MARKER,
    TEMPLATE_MARKER,
    ELEMENT_MARKER,
];

/// Whether `key` would be read back as a descriptor marker.
pub fn is_marker_key(key: &str) -> bool {
    MARKER_KEYS.contains(&key)
}

/// The first marker key anywhere inside a literal JSON value.
pub fn find_marker_key(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) => map.iter().find_map(|(key, item)| {
            if is_marker_key(key) {
                Some(key.as_str())
            } else {
                find_marker_key(item)
            }
        }),
        Value::Array(items) => items.iter().find_map(find_marker_key),
        _ => None,
    }
}

/// A value that is either fixed at compile time or resolved at run time.
///
/// Serialized through `serde_json::Value` so that literals stay plain JSON
/// (`{"padding": 16}`) and references use `$`-prefixed marker objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Value", from = "Value")]
pub enum ValueDescriptor {
    Literal(Value),
    StoreReference(String),
    PropReference(String),
    Computed {
        expr: ComputeExpr,
        inputs: Vec<ValueDescriptor>,
    },
    /// Object with at least one non-literal entry.
    Object(BTreeMap<String, ValueDescriptor>),
    /// Array with at least one non-literal item.
    Array(Vec<ValueDescriptor>),
    ActionRef {
        id: String,
        bind: Bindings,
    },
    Template {
        node: Box<UiNode>,
        bind: Bindings,
    },
    Element(Box<UiNode>),
}

impl ValueDescriptor {
    pub fn null() -> Self {
        ValueDescriptor::Literal(Value::Null)
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, ValueDescriptor::Literal(_))
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            ValueDescriptor::Literal(v) => Some(v),
            _ => None,
        }
    }

    /// Builds an object descriptor, collapsing to a literal when every entry is one.
    pub fn from_entries(entries: BTreeMap<String, ValueDescriptor>) -> Self {
        if entries.values().all(ValueDescriptor::is_literal) {
            let map: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k, Value::from(v)))
                .collect();
            ValueDescriptor::Literal(Value::Object(map))
        } else {
            ValueDescriptor::Object(entries)
        }
    }

    /// Builds an array descriptor, collapsing to a literal when every item is one.
    pub fn from_items(items: Vec<ValueDescriptor>) -> Self {
        if items.iter().all(ValueDescriptor::is_literal) {
            ValueDescriptor::Literal(Value::Array(items.into_iter().map(Value::from).collect()))
        } else {
            ValueDescriptor::Array(items)
        }
    }

    /// Entries of an object-shaped descriptor, or `None` for anything else.
    pub fn into_entries(self) -> Option<BTreeMap<String, ValueDescriptor>> {
        match self {
            ValueDescriptor::Object(entries) => Some(entries),
            ValueDescriptor::Literal(Value::Object(map)) => Some(
                map.into_iter()
                    .map(|(k, v)| (k, ValueDescriptor::Literal(v)))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Store/prop references are the only descriptors allowed as computed inputs.
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            ValueDescriptor::StoreReference(_) | ValueDescriptor::PropReference(_)
        )
    }
}

impl From<ValueDescriptor> for Value {
    fn from(descriptor: ValueDescriptor) -> Self {
        match descriptor {
            ValueDescriptor::Literal(v) => v,
            ValueDescriptor::StoreReference(path) => marker(STORE_MARKER, Value::String(path)),
            ValueDescriptor::PropReference(path) => marker(PROP_MARKER, Value::String(path)),
            ValueDescriptor::Computed { expr, inputs } => {
                let mut map = Map::new();
                map.insert(
                    COMPUTED_MARKER.to_string(),
                    serde_json::to_value(expr).unwrap_or(Value::Null),
                );
                map.insert(
                    "inputs".to_string(),
                    Value::Array(inputs.into_iter().map(Value::from).collect()),
                );
                Value::Object(map)
            }
            ValueDescriptor::Object(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
            ValueDescriptor::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            ValueDescriptor::ActionRef { id, bind } => {
                let mut map = Map::new();
                map.insert(ACTION_MARKER.to_string(), Value::String(id));
                insert_bindings(&mut map, bind);
                Value::Object(map)
            }
            ValueDescriptor::Template { node, bind } => {
                let mut map = Map::new();
                map.insert(
                    TEMPLATE_MARKER.to_string(),
                    serde_json::to_value(*node).unwrap_or(Value::Null),
                );
                insert_bindings(&mut map, bind);
                Value::Object(map)
            }
            ValueDescriptor::Element(node) => marker(
                ELEMENT_MARKER,
                serde_json::to_value(*node).unwrap_or(Value::Null),
            ),
        }
    }
}

impl From<Value> for ValueDescriptor {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => decode_object(map),
            Value::Array(items) => {
                ValueDescriptor::from_items(items.into_iter().map(ValueDescriptor::from).collect())
            }
            scalar => ValueDescriptor::Literal(scalar),
        }
    }
}

fn marker(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

fn insert_bindings(map: &mut Map<String, Value>, bind: Bindings) {
    if !bind.is_empty() {
        let bind: Map<String, Value> = bind
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        map.insert("bind".to_string(), Value::Object(bind));
    }
}

fn decode_bindings(value: Option<&Value>) -> Bindings {
    value
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn decode_object(map: Map<String, Value>) -> ValueDescriptor {
    if map.len() == 1 {
        if let Some(Value::String(path)) = map.get(STORE_MARKER) {
            return ValueDescriptor::StoreReference(path.clone());
        }
        if let Some(Value::String(path)) = map.get(PROP_MARKER) {
            return ValueDescriptor::PropReference(path.clone());
        }
        if let Some(node) = map.get(ELEMENT_MARKER) {
            if let Ok(node) = serde_json::from_value::<UiNode>(node.clone()) {
                return ValueDescriptor::Element(Box::new(node));
            }
        }
    }

    if let (Some(expr), Some(Value::Array(inputs))) = (map.get(COMPUTED_MARKER), map.get("inputs"))
    {
        if let Ok(expr) = serde_json::from_value::<ComputeExpr>(expr.clone()) {
            return ValueDescriptor::Computed {
                expr,
                inputs: inputs.iter().cloned().map(ValueDescriptor::from).collect(),
            };
        }
    }

    if let Some(Value::String(id)) = map.get(ACTION_MARKER) {
        return ValueDescriptor::ActionRef {
            id: id.clone(),
            bind: decode_bindings(map.get("bind")),
        };
    }

    if let Some(node) = map.get(TEMPLATE_MARKER) {
        if let Ok(node) = serde_json::from_value::<UiNode>(node.clone()) {
            return ValueDescriptor::Template {
                node: Box::new(node),
                bind: decode_bindings(map.get("bind")),
            };
        }
    }

    ValueDescriptor::from_entries(
        map.into_iter()
            .map(|(k, v)| (k, ValueDescriptor::from(v)))
            .collect(),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPUTED EXPRESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Expression tree of a `Computed` descriptor. Inputs are referenced by index
/// into the descriptor's `inputs` list. No calls, no loops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ComputeExpr {
    Input {
        index: usize,
    },
    Literal {
        value: Value,
    },
    Binary {
        operator: ComputeOperator,
        left: Box<ComputeExpr>,
        right: Box<ComputeExpr>,
    },
    Not {
        operand: Box<ComputeExpr>,
    },
    Negate {
        operand: Box<ComputeExpr>,
    },
    Conditional {
        test: Box<ComputeExpr>,
        consequent: Box<ComputeExpr>,
        alternate: Box<ComputeExpr>,
    },
    Concat {
        parts: Vec<ComputeExpr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComputeOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Equals,
    NotEquals,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    And,
    Or,
    Coalesce,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONDITIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompareOperator {
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

/// Boolean expression over value descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConditionDescriptor {
    Equals {
        left: ValueDescriptor,
        right: ValueDescriptor,
    },
    NotEquals {
        left: ValueDescriptor,
        right: ValueDescriptor,
    },
    Compare {
        operator: CompareOperator,
        left: ValueDescriptor,
        right: ValueDescriptor,
    },
    Exists {
        value: ValueDescriptor,
    },
    Truthy {
        value: ValueDescriptor,
    },
    Not {
        condition: Box<ConditionDescriptor>,
    },
    All {
        conditions: Vec<ConditionDescriptor>,
    },
    Any {
        conditions: Vec<ConditionDescriptor>,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACTION DESCRIPTORS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NavigateKind {
    Push,
    Pop,
    Replace,
    Modal,
    DismissModal,
    PopTo,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeedbackKind {
    Toast,
    Alert,
    Sheet,
    Loading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SystemKind {
    Share,
    OpenUrl,
    Haptic,
    Clipboard,
    #[serde(rename = "permission-request")]
    PermissionRequest,
}

/// Declarative write of an API response into the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMapping {
    /// Store path receiving the value.
    pub target: String,
    /// Sub-path of the response to write; the whole response when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Continuation of an `ApiRequest`, with its parameters bound to the
/// response (or error) as argument `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Callback {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bind: Bindings,
    pub action: Box<ActionDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequestDescriptor {
    pub endpoint: ValueDescriptor,
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, ValueDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<ValueDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<Callback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<Callback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mapping: Option<ResponseMapping>,
    /// Awaited requests block the enclosing sequence; others are fire-and-forget.
    #[serde(default, skip_serializing_if = "is_false")]
    pub awaited: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ActionDescriptor {
    StoreSet {
        path: String,
        value: ValueDescriptor,
    },
    StoreRemove {
        path: String,
    },
    StoreMerge {
        path: String,
        value: BTreeMap<String, ValueDescriptor>,
    },
    Conditional {
        condition: ConditionDescriptor,
        then: Box<ActionDescriptor>,
        #[serde(rename = "else", default, skip_serializing_if = "Option::is_none")]
        otherwise: Option<Box<ActionDescriptor>>,
    },
    Sequence {
        steps: Vec<ActionDescriptor>,
    },
    Navigate {
        kind: NavigateKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<ValueDescriptor>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        params: Option<ValueDescriptor>,
    },
    ApiRequest(ApiRequestDescriptor),
    UiFeedback {
        kind: FeedbackKind,
        payload: ValueDescriptor,
    },
    System {
        kind: SystemKind,
        payload: ValueDescriptor,
    },
}

impl ActionDescriptor {
    /// Wraps several steps into a sequence, leaving a single step as is.
    pub fn sequence(mut steps: Vec<ActionDescriptor>) -> Self {
        if steps.len() == 1 {
            steps.remove(0)
        } else {
            ActionDescriptor::Sequence { steps }
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ActionDescriptor::StoreSet { .. } => "storeSet",
            ActionDescriptor::StoreRemove { .. } => "storeRemove",
            ActionDescriptor::StoreMerge { .. } => "storeMerge",
            ActionDescriptor::Conditional { .. } => "conditional",
            ActionDescriptor::Sequence { .. } => "sequence",
            ActionDescriptor::Navigate { .. } => "navigate",
            ActionDescriptor::ApiRequest(_) => "apiRequest",
            ActionDescriptor::UiFeedback { .. } => "uiFeedback",
            ActionDescriptor::System { .. } => "system",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PERSISTED SCHEMA
// ═══════════════════════════════════════════════════════════════════════════════

/// A compiled scenario. `build_number` is owned by the repository that
/// publishes the schema; the compiler always leaves it empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub key: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<u64>,
    pub main: UiNode,
    #[serde(default)]
    pub components: BTreeMap<String, UiNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stores: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub actions: BTreeMap<String, ActionDescriptor>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sparse_node_serialization() {
        let node = UiNode::new("View");
        assert_eq!(serde_json::to_value(&node).unwrap(), json!({"type": "View"}));
    }

    #[test]
    fn test_marker_objects_decode_to_references() {
        let value = json!({
            "a": {"$store": "user.name"},
            "b": {"$prop": "item.image"},
            "c": 3
        });
        let descriptor = ValueDescriptor::from(value.clone());
        let entries = descriptor.clone().into_entries().unwrap();
        assert_eq!(
            entries["a"],
            ValueDescriptor::StoreReference("user.name".to_string())
        );
        assert_eq!(
            entries["b"],
            ValueDescriptor::PropReference("item.image".to_string())
        );
        assert_eq!(Value::from(descriptor), value);
    }

    #[test]
    fn test_all_literal_object_collapses() {
        let mut entries = BTreeMap::new();
        entries.insert("padding".to_string(), ValueDescriptor::Literal(json!(16)));
        assert_eq!(
            ValueDescriptor::from_entries(entries),
            ValueDescriptor::Literal(json!({"padding": 16}))
        );
    }

    #[test]
    fn test_action_descriptor_wire_shape() {
        let action = ActionDescriptor::Conditional {
            condition: ConditionDescriptor::Exists {
                value: ValueDescriptor::StoreReference("token".to_string()),
            },
            then: Box::new(ActionDescriptor::Navigate {
                kind: NavigateKind::DismissModal,
                target: None,
                params: None,
            }),
            otherwise: None,
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "conditional",
                "condition": {"kind": "exists", "value": {"$store": "token"}},
                "then": {"type": "navigate", "kind": "dismissModal"}
            })
        );
        let back: ActionDescriptor = serde_json::from_value(value).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn test_system_permission_kind_name() {
        let value = serde_json::to_value(SystemKind::PermissionRequest).unwrap();
        assert_eq!(value, json!("permission-request"));
    }
}
