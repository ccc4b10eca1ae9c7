use crate::ir::{ActionDescriptor, Schema, UiNode, ValueDescriptor};

/// The NodeVisitor trait defines the single traversal mechanism for UI Node Trees.
///
/// Rules:
/// 1. Traversal order is fixed: style, properties, data, then children.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers call the matching `walk_*` function to continue traversal
///    unless pruning is intended.
///
/// `path` is the owner-qualified node path (`main:root.0.1`), the same path
/// used in diagnostics and generated action ids.
pub trait NodeVisitor {
    fn visit_schema(&mut self, schema: &Schema) {
        walk_schema(self, schema);
    }

    fn visit_node(&mut self, node: &UiNode, path: &str) {
        walk_node(self, node, path);
    }

    fn visit_value(&mut self, value: &ValueDescriptor, path: &str) {
        walk_value(self, value, path);
    }

    fn visit_action(&mut self, _id: &str, _action: &ActionDescriptor) {
        // Leaf by default
    }
}

pub fn walk_schema<V: NodeVisitor + ?Sized>(visitor: &mut V, schema: &Schema) {
    visitor.visit_node(&schema.main, "main:root");
    for (name, node) in &schema.components {
        visitor.visit_node(node, &format!("{}:root", name));
    }
    for (id, action) in &schema.actions {
        visitor.visit_action(id, action);
    }
}

pub fn walk_node<V: NodeVisitor + ?Sized>(visitor: &mut V, node: &UiNode, path: &str) {
    for value in node
        .style
        .values()
        .chain(node.properties.values())
        .chain(node.data.values())
    {
        visitor.visit_value(value, path);
    }
    for (index, child) in node.children.iter().enumerate() {
        visitor.visit_node(child, &format!("{}.{}", path, index));
    }
}

pub fn walk_value<V: NodeVisitor + ?Sized>(visitor: &mut V, value: &ValueDescriptor, path: &str) {
    match value {
        ValueDescriptor::Object(entries) => {
            for entry in entries.values() {
                visitor.visit_value(entry, path);
            }
        }
        ValueDescriptor::Array(items) => {
            for item in items {
                visitor.visit_value(item, path);
            }
        }
        ValueDescriptor::Template { node, .. } => visitor.visit_node(node, path),
        ValueDescriptor::Element(node) => visitor.visit_node(node, path),
        ValueDescriptor::Computed { inputs, .. } => {
            for input in inputs {
                visitor.visit_value(input, path);
            }
        }
        ValueDescriptor::Literal(_)
        | ValueDescriptor::StoreReference(_)
        | ValueDescriptor::PropReference(_)
        | ValueDescriptor::ActionRef { .. } => {}
    }
}
