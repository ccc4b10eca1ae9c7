//! Finalize Module for the Scenario Compiler
//!
//! Assembles lowered parts into the persisted [`Schema`] and stamps the
//! compiler metadata. `buildNumber` is left empty for the repository.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::cache::compute_hash;
use crate::ir::{ActionDescriptor, Schema, UiNode};
use crate::parse::CompileOptions;

pub const COMPILER_ID: &str = concat!("scenario-native/", env!("CARGO_PKG_VERSION"));

/// Output of module lowering, before it becomes a schema.
#[derive(Debug, Clone)]
pub struct ScenarioParts {
    pub main: UiNode,
    pub components: BTreeMap<String, UiNode>,
    pub stores: Option<Value>,
    pub actions: BTreeMap<String, ActionDescriptor>,
    pub metadata: BTreeMap<String, Value>,
}

pub fn assemble_schema(parts: ScenarioParts, options: &CompileOptions, source: &str) -> Schema {
    let mut metadata = parts.metadata;
    metadata
        .entry("sourceHash".to_string())
        .or_insert_with(|| Value::String(compute_hash(source)));
    metadata.insert("compiler".to_string(), Value::String(COMPILER_ID.to_string()));

    Schema {
        key: schema_key(options),
        version: options.version.clone(),
        build_number: None,
        main: parts.main,
        components: parts.components,
        stores: parts.stores,
        actions: parts.actions,
        metadata,
    }
}

/// The configured key, else the file stem, else `main`.
fn schema_key(options: &CompileOptions) -> String {
    if !options.key.is_empty() {
        return options.key.clone();
    }
    options
        .file_path
        .as_deref()
        .and_then(|path| Path::new(path).file_stem())
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| "main".to_string())
}
