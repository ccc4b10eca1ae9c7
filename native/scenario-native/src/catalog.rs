//! Element catalog: the tags the compiler knows, their default styles and
//! which children they accept.
//!
//! Tags missing from the catalog (user components, host-specific widgets) are
//! accepted as-is with no defaults and any children.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChildPolicy {
    Any,
    #[serde(rename = "none")]
    NoChildren,
    Only(Vec<String>),
}

impl ChildPolicy {
    pub fn allows(&self, tag: &str) -> bool {
        match self {
            ChildPolicy::Any => true,
            ChildPolicy::NoChildren => false,
            ChildPolicy::Only(tags) => tags.iter().any(|t| t == tag),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub default_style: Map<String, Value>,
    pub allowed_children: ChildPolicy,
    /// Whether bare text children are kept (folded into `properties.text`).
    pub text_children: bool,
    pub known_properties: BTreeSet<String>,
}

impl CatalogEntry {
    fn open() -> Self {
        Self {
            default_style: Map::new(),
            allowed_children: ChildPolicy::Any,
            text_children: false,
            known_properties: BTreeSet::new(),
        }
    }
}

/// A tag declared in the compiler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CustomTag {
    pub name: String,
    #[serde(default)]
    pub default_style: Map<String, Value>,
    #[serde(default = "default_children")]
    pub children: ChildPolicy,
    #[serde(default)]
    pub text: bool,
    #[serde(default)]
    pub properties: Vec<String>,
}

fn default_children() -> ChildPolicy {
    ChildPolicy::Any
}

lazy_static! {
    /// Attribute names routed to `properties`; everything else goes to `data`.
    pub static ref SPECIAL_PROPERTIES: HashSet<&'static str> =
        ["text", "source", "src", "uri", "value", "placeholder"].into_iter().collect();

    /// Accepted on every catalog tag without a warning.
    pub static ref UNIVERSAL_ATTRIBUTES: HashSet<&'static str> = [
        "key",
        "testID",
        "style",
        "accessibilityLabel",
        "accessibilityRole",
        "accessible",
        "hitSlop",
        "pointerEvents",
    ]
    .into_iter()
    .collect();

    static ref BUILTIN: BTreeMap<String, CatalogEntry> = builtin_entries();
}

fn entry(
    default_style: Value,
    allowed_children: ChildPolicy,
    text_children: bool,
    properties: &[&str],
) -> CatalogEntry {
    CatalogEntry {
        default_style: match default_style {
            Value::Object(map) => map,
            _ => Map::new(),
        },
        allowed_children,
        text_children,
        known_properties: properties.iter().map(|p| p.to_string()).collect(),
    }
}

fn builtin_entries() -> BTreeMap<String, CatalogEntry> {
    let touchable = [
        "onPress",
        "onLongPress",
        "onPressIn",
        "onPressOut",
        "disabled",
        "activeOpacity",
    ];
    let mut entries = BTreeMap::new();

    entries.insert(
        "View".to_string(),
        entry(json!({}), ChildPolicy::Any, false, &["onLayout"]),
    );
    entries.insert(
        "Text".to_string(),
        entry(
            json!({}),
            ChildPolicy::Only(vec!["Text".to_string()]),
            true,
            &["text", "numberOfLines", "ellipsizeMode", "selectable", "onPress"],
        ),
    );
    entries.insert(
        "Image".to_string(),
        entry(
            json!({}),
            ChildPolicy::NoChildren,
            false,
            &["source", "src", "uri", "resizeMode", "onLoad", "onError"],
        ),
    );
    entries.insert(
        "Button".to_string(),
        entry(
            json!({}),
            ChildPolicy::NoChildren,
            true,
            &["text", "title", "color", "onPress", "disabled"],
        ),
    );
    entries.insert(
        "Pressable".to_string(),
        entry(json!({}), ChildPolicy::Any, false, &touchable),
    );
    entries.insert(
        "TouchableOpacity".to_string(),
        entry(json!({}), ChildPolicy::Any, false, &touchable),
    );
    entries.insert(
        "TextInput".to_string(),
        entry(
            json!({}),
            ChildPolicy::NoChildren,
            false,
            &[
                "value",
                "placeholder",
                "onChangeText",
                "onSubmitEditing",
                "onFocus",
                "onBlur",
                "secureTextEntry",
                "keyboardType",
                "autoCapitalize",
                "autoFocus",
                "editable",
                "maxLength",
                "multiline",
            ],
        ),
    );
    entries.insert(
        "ScrollView".to_string(),
        entry(
            json!({}),
            ChildPolicy::Any,
            false,
            &[
                "horizontal",
                "contentContainerStyle",
                "showsVerticalScrollIndicator",
                "showsHorizontalScrollIndicator",
                "onScroll",
                "refreshing",
                "onRefresh",
            ],
        ),
    );
    entries.insert(
        "FlatList".to_string(),
        entry(
            json!({}),
            ChildPolicy::NoChildren,
            false,
            &[
                "data",
                "renderItem",
                "keyExtractor",
                "horizontal",
                "numColumns",
                "ListHeaderComponent",
                "ListFooterComponent",
                "ListEmptyComponent",
                "ItemSeparatorComponent",
                "onEndReached",
                "onEndReachedThreshold",
                "refreshing",
                "onRefresh",
                "contentContainerStyle",
            ],
        ),
    );
    entries.insert(
        "SafeAreaView".to_string(),
        entry(json!({"flex": 1}), ChildPolicy::Any, false, &[]),
    );
    entries.insert(
        "Switch".to_string(),
        entry(
            json!({}),
            ChildPolicy::NoChildren,
            false,
            &["value", "onValueChange", "disabled", "trackColor", "thumbColor"],
        ),
    );
    entries.insert(
        "ActivityIndicator".to_string(),
        entry(
            json!({}),
            ChildPolicy::NoChildren,
            false,
            &["size", "color", "animating"],
        ),
    );
    entries.insert(
        "Modal".to_string(),
        entry(
            json!({}),
            ChildPolicy::Any,
            false,
            &["visible", "animationType", "transparent", "onRequestClose", "onShow"],
        ),
    );

    entries
}

/// Lookup table consulted by the element compiler. Built once per run from
/// the built-in entries plus configured extensions.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: BTreeMap<String, CatalogEntry>,
    open: CatalogEntry,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN.clone(),
            open: CatalogEntry::open(),
        }
    }

    /// Adds or replaces entries. Later tags win.
    pub fn with_tags(mut self, tags: &[CustomTag]) -> Self {
        for tag in tags {
            self.entries.insert(
                tag.name.clone(),
                CatalogEntry {
                    default_style: tag.default_style.clone(),
                    allowed_children: tag.children.clone(),
                    text_children: tag.text,
                    known_properties: tag.properties.iter().cloned().collect(),
                },
            );
        }
        self
    }

    pub fn is_declared(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    /// The entry for `tag`, or the permissive entry for unknown tags.
    pub fn lookup(&self, tag: &str) -> &CatalogEntry {
        self.entries.get(tag).unwrap_or(&self.open)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_defaults() {
        let catalog = Catalog::builtin();
        assert_eq!(
            catalog.lookup("SafeAreaView").default_style.get("flex"),
            Some(&json!(1))
        );
        assert!(catalog.lookup("Text").text_children);
        assert!(!catalog.lookup("Image").allowed_children.allows("View"));
    }

    #[test]
    fn test_unknown_tag_is_open() {
        let catalog = Catalog::builtin();
        assert!(!catalog.is_declared("ProductCard"));
        assert_eq!(catalog.lookup("ProductCard").allowed_children, ChildPolicy::Any);
    }

    #[test]
    fn test_configured_tag_overrides_builtin() {
        let catalog = Catalog::builtin().with_tags(&[CustomTag {
            name: "View".to_string(),
            default_style: Map::new(),
            children: ChildPolicy::Only(vec!["Text".to_string()]),
            text: false,
            properties: vec![],
        }]);
        assert!(!catalog.lookup("View").allowed_children.allows("Image"));
    }
}
