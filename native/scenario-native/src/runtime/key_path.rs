use serde_json::{Map, Value};
use std::fmt;

use super::error::StoreError;

/// Largest number of `null` slots a single write may append before its index.
pub const MAX_ARRAY_GAP: usize = 1024;

/// Dot-separated address into the store. The empty path is the root.
///
/// `items[0].name` is accepted and normalized to `items.0.name`; numeric
/// segments index arrays, and are plain keys on objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(path: &str) -> Result<Self, StoreError> {
        let invalid = |reason: &str| StoreError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        if path.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for raw in path.split('.') {
            let (head, mut rest) = match raw.find('[') {
                Some(open) => (&raw[..open], &raw[open..]),
                None => (raw, ""),
            };
            if head.is_empty() && (rest.is_empty() || segments.is_empty()) {
                return Err(invalid("empty segment"));
            }
            if head.contains(']') {
                return Err(invalid("unbalanced brackets"));
            }
            if !head.is_empty() {
                segments.push(head.to_string());
            }
            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(|| invalid("unbalanced brackets"))?;
                let index = &rest[1..close];
                if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid("bracket index must be a non-negative integer"));
                }
                segments.push(index.to_string());
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(invalid("unexpected characters after bracket index"));
                }
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when one path is an ancestor of, descendant of, or equal to the other.
    pub fn is_related(&self, other: &KeyPath) -> bool {
        self.segments.starts_with(&other.segments) || other.segments.starts_with(&self.segments)
    }

    fn prefix(&self, depth: usize) -> String {
        self.segments[..=depth].join(".")
    }

    fn index_at(&self, depth: usize) -> Result<usize, StoreError> {
        self.segments[depth]
            .parse::<usize>()
            .map_err(|_| StoreError::TypeMismatch {
                path: self.prefix(depth),
                expected: "array index",
                found: "key",
            })
    }

    /// Index for a write into an array of `len` items. Writes may pad at most
    /// [`MAX_ARRAY_GAP`] `null` slots past the end.
    fn write_index(&self, depth: usize, len: usize) -> Result<usize, StoreError> {
        let index = self.index_at(depth)?;
        if index > len && index - len > MAX_ARRAY_GAP {
            return Err(StoreError::IndexOutOfRange {
                path: self.prefix(depth),
                index,
                len,
            });
        }
        Ok(index)
    }

    /// Sequential traversal; `None` when any segment is missing.
    pub fn lookup<'v>(&self, root: &'v Value) -> Option<&'v Value> {
        let mut current = root;
        for segment in &self.segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    fn lookup_mut<'v>(&self, root: &'v mut Value) -> Option<&'v mut Value> {
        let mut current = root;
        for segment in &self.segments {
            current = match current {
                Value::Object(map) => map.get_mut(segment)?,
                Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Writes `value`, creating missing intermediate containers. Returns the
    /// previous value at the path.
    pub fn set(&self, root: &mut Value, value: Value) -> Result<Option<Value>, StoreError> {
        let Some((last, parents)) = self.segments.split_last() else {
            return Ok(Some(std::mem::replace(root, value)));
        };

        let mut current = root;
        for (depth, segment) in parents.iter().enumerate() {
            if current.is_null() {
                *current = empty_container(segment);
            }
            current = match current {
                Value::Object(map) => map.entry(segment.clone()).or_insert(Value::Null),
                Value::Array(items) => {
                    let index = self.write_index(depth, items.len())?;
                    if index >= items.len() {
                        items.resize(index + 1, Value::Null);
                    }
                    &mut items[index]
                }
                other => return Err(self.mismatch(depth, other)),
            };
        }

        let depth = parents.len();
        if current.is_null() {
            *current = empty_container(last);
        }
        match current {
            Value::Object(map) => Ok(map.insert(last.clone(), value)),
            Value::Array(items) => {
                let index = self.write_index(depth, items.len())?;
                if index < items.len() {
                    return Ok(Some(std::mem::replace(&mut items[index], value)));
                }
                items.resize(index, Value::Null);
                items.push(value);
                Ok(None)
            }
            other => Err(self.mismatch(depth, other)),
        }
    }

    /// The container at `depth` (the first `depth` segments) is a scalar.
    fn mismatch(&self, depth: usize, found: &Value) -> StoreError {
        StoreError::TypeMismatch {
            path: if depth == 0 {
                String::new()
            } else {
                self.prefix(depth - 1)
            },
            expected: "object or array",
            found: type_name(found),
        }
    }

    /// Removes the value at the path. Removing the root resets it to `{}`.
    pub fn remove(&self, root: &mut Value) -> Result<Option<Value>, StoreError> {
        let Some((last, parents)) = self.segments.split_last() else {
            return Ok(Some(std::mem::replace(root, Value::Object(Map::new()))));
        };
        let parent_path = KeyPath {
            segments: parents.to_vec(),
        };
        let Some(parent) = parent_path.lookup_mut(root) else {
            return Ok(None);
        };
        match parent {
            Value::Object(map) => Ok(map.remove(last)),
            Value::Array(items) => {
                let index = self.index_at(self.segments.len() - 1)?;
                if index < items.len() {
                    Ok(Some(items.remove(index)))
                } else {
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }

    /// Shallow-merges `entries` into the object at the path, creating it when
    /// absent or null.
    pub fn merge(
        &self,
        root: &mut Value,
        entries: Map<String, Value>,
    ) -> Result<Option<Value>, StoreError> {
        let previous = self.lookup(root).cloned();
        match &previous {
            None | Some(Value::Null) => {
                self.set(root, Value::Object(entries))?;
            }
            Some(Value::Object(_)) => {
                if let Some(Value::Object(target)) = self.lookup_mut(root) {
                    for (key, value) in entries {
                        target.insert(key, value);
                    }
                }
            }
            Some(other) => {
                return Err(StoreError::TypeMismatch {
                    path: self.to_string(),
                    expected: "object",
                    found: type_name(other),
                })
            }
        }
        Ok(previous)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

fn empty_container(segment: &str) -> Value {
    if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
        Value::Array(Vec::new())
    } else {
        Value::Object(Map::new())
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(p: &str) -> KeyPath {
        KeyPath::parse(p).unwrap()
    }

    #[test]
    fn test_parse_normalizes_brackets() {
        assert_eq!(path("items[0].name"), path("items.0.name"));
        assert_eq!(path("grid[1][2]").segments(), &["grid", "1", "2"]);
        assert!(path("").is_root());
    }

    #[test]
    fn test_parse_rejects_malformed_paths() {
        assert!(KeyPath::parse("a..b").is_err());
        assert!(KeyPath::parse(".a").is_err());
        assert!(KeyPath::parse("a.").is_err());
        assert!(KeyPath::parse("a[x]").is_err());
        assert!(KeyPath::parse("a[1").is_err());
    }

    #[test]
    fn test_relation_is_symmetric_prefix() {
        assert!(path("a.b").is_related(&path("a")));
        assert!(path("a").is_related(&path("a.b.c")));
        assert!(path("").is_related(&path("x")));
        assert!(!path("a.b").is_related(&path("a.c")));
        assert!(!path("ab").is_related(&path("a")));
    }

    #[test]
    fn test_lookup_distinguishes_absent_from_null() {
        let root = json!({"a": null, "list": [1, 2]});
        assert_eq!(path("a").lookup(&root), Some(&Value::Null));
        assert_eq!(path("b").lookup(&root), None);
        assert_eq!(path("list.1").lookup(&root), Some(&json!(2)));
        assert_eq!(path("list.5").lookup(&root), None);
    }

    #[test]
    fn test_set_creates_intermediates() {
        let mut root = json!({});
        path("user.profile.name").set(&mut root, json!("Ada")).unwrap();
        path("tags.1").set(&mut root, json!("b")).unwrap();
        assert_eq!(
            root,
            json!({"user": {"profile": {"name": "Ada"}}, "tags": [null, "b"]})
        );
    }

    #[test]
    fn test_set_through_scalar_is_type_mismatch() {
        let mut root = json!({"count": 3});
        let err = path("count.value").set(&mut root, json!(1)).unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { ref path, .. } if path == "count"));
        assert_eq!(root, json!({"count": 3}));
    }

    #[test]
    fn test_set_rejects_far_array_index() {
        let mut root = json!({"list": [1]});
        let err = path("list.18446744073709551615")
            .set(&mut root, json!(1))
            .unwrap_err();
        let StoreError::IndexOutOfRange { path: at, index, len } = err else {
            panic!("expected out of range, got {:?}", err);
        };
        assert_eq!(at, "list.18446744073709551615");
        assert_eq!((index, len), (usize::MAX, 1));
        assert!(path("list.5000.name").set(&mut root, json!("x")).is_err());
        assert_eq!(root, json!({"list": [1]}));

        path("list.3").set(&mut root, json!(4)).unwrap();
        assert_eq!(root, json!({"list": [1, null, null, 4]}));
    }

    #[test]
    fn test_remove_from_array_and_object() {
        let mut root = json!({"list": [1, 2, 3], "a": {"b": 1}});
        assert_eq!(path("list.1").remove(&mut root).unwrap(), Some(json!(2)));
        assert_eq!(path("a.b").remove(&mut root).unwrap(), Some(json!(1)));
        assert_eq!(path("missing.x").remove(&mut root).unwrap(), None);
        assert_eq!(root, json!({"list": [1, 3], "a": {}}));
    }

    #[test]
    fn test_merge_rejects_non_object_target() {
        let mut root = json!({"a": [1]});
        let mut entries = Map::new();
        entries.insert("x".to_string(), json!(1));
        assert!(path("a").merge(&mut root, entries.clone()).is_err());
        path("b").merge(&mut root, entries).unwrap();
        assert_eq!(root["b"], json!({"x": 1}));
    }
}
