use oxc_ast::ast::{BindingPattern, FormalParameters, PropertyKey};
use std::collections::BTreeMap;

use crate::ir::Bindings;

/// Names visible to an expression, each mapped to the prop path it reads.
///
/// Scopes are immutable and threaded through recursion; entering a template
/// or handler produces an extended copy, so inner bindings never leak out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropScope {
    bindings: BTreeMap<String, String>,
}

impl PropScope {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_bindings(bindings: Bindings) -> Self {
        Self { bindings }
    }

    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(String::as_str)
    }

    /// A new scope where each of `names` refers to the prop of the same name.
    /// Inner names shadow outer ones.
    pub fn extend<'n>(&self, names: impl IntoIterator<Item = &'n String>) -> PropScope {
        let mut bindings = self.bindings.clone();
        for name in names {
            bindings.insert(name.clone(), name.clone());
        }
        PropScope { bindings }
    }

    pub fn names(&self) -> Vec<&str> {
        self.bindings.keys().map(String::as_str).collect()
    }
}

pub fn join_path(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", base, segment)
    }
}

/// Static name of an object key (`a`, `'a'`, `1`); `None` for computed keys.
pub fn property_key_name(key: &PropertyKey<'_>) -> Option<String> {
    match key {
        PropertyKey::StaticIdentifier(id) => Some(id.name.to_string()),
        PropertyKey::StringLiteral(s) => Some(s.value.to_string()),
        PropertyKey::NumericLiteral(n) => Some(n.value.to_string()),
        _ => None,
    }
}

/// Collects every name bound by `pattern`, mapped to its path below `base`.
pub fn collect_pattern(pattern: &BindingPattern<'_>, base: &str, out: &mut Bindings) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => {
            out.insert(id.name.to_string(), base.to_string());
        }
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                if let Some(key) = property_key_name(&prop.key) {
                    collect_pattern(&prop.value, &join_path(base, &key), out);
                }
            }
            if let Some(rest) = &obj.rest {
                collect_pattern(&rest.argument, base, out);
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            for (index, elem) in arr.elements.iter().enumerate() {
                if let Some(pattern) = elem {
                    collect_pattern(pattern, &join_path(base, &index.to_string()), out);
                }
            }
        }
        _ => {}
    }
}

/// Handler and template parameters: each name maps to its path into the
/// positional argument list (`(item, index)` → `item: "0"`, `index: "1"`).
pub fn collect_argument_bindings(params: &FormalParameters<'_>) -> Bindings {
    let mut bind = Bindings::new();
    for (index, param) in params.items.iter().enumerate() {
        collect_pattern(&param.pattern, &index.to_string(), &mut bind);
    }
    bind
}

/// Component parameters: the first parameter is the props object, so
/// `(props)` maps `props` to the root and `({ title })` maps `title` to `title`.
pub fn collect_component_props(params: &FormalParameters<'_>) -> PropScope {
    let mut bindings = Bindings::new();
    if let Some(first) = params.items.first() {
        collect_pattern(&first.pattern, "", &mut bindings);
    }
    PropScope::from_bindings(bindings)
}
