//! # Scenario Compiler & Runtime
//!
//! A scenario is a TSX module describing one screen. It is compiled once, at
//! publish time, into a [`Schema`]: a UI Node Tree plus a table of Action
//! Descriptors. Clients replay the schema through the [`runtime`]: a
//! key-path store owned by a single actor task, and an executor that turns
//! action descriptors into store mutations and effect dispatches.
//!
//! ## Compile-time invariants
//!
//! 1. **Closed IR**: every value is a [`ValueDescriptor`]; every behaviour is an
//!    [`ActionDescriptor`]. Nothing executable survives compilation.
//!
//! 2. **Resolution order**: identifiers resolve against the prop scope
//!    (handler/template/component parameters, innermost first), then module
//!    constants. Anything else is an `UnresolvedReferenceError` in strict mode
//!    and `null` in lenient mode.
//!
//! 3. **Deterministic output**: maps are ordered and generated action ids are
//!    `<owner>:<nodePath>:<attribute>`, so identical sources serialize to
//!    identical bytes.
//!
//! 4. **All-or-nothing**: diagnostics are batched; no schema is produced while
//!    any error exists.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod action_lowerer;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod discovery;
mod finalize;
pub mod ir;
mod jsx_lowerer;
pub mod logging;
mod parse;
pub mod registry;
mod resolve;
pub mod runtime;
mod scope;
mod static_eval;
pub mod validate;
pub mod visitor;

#[cfg(test)]
mod action_tests;

pub use catalog::{Catalog, CatalogEntry, ChildPolicy, CustomTag};
pub use config::{CompilerConfig, ConfigError};
pub use discovery::{compile_directory, find_scenario_files, CompiledFile, DiscoveryError};
pub use finalize::COMPILER_ID;
pub use ir::{
    ActionDescriptor, ApiRequestDescriptor, Bindings, Callback, CompareOperator, ComputeExpr,
    ComputeOperator, ConditionDescriptor, FeedbackKind, HttpMethod, NavigateKind,
    ResponseMapping, Schema, SystemKind, UiNode, ValueDescriptor,
};
pub use parse::{
    compile_scenario, compile_with_catalog, CompileFailure, CompileOptions, CompileResult,
};
pub use registry::{InMemoryScenarioRepository, RegistryError, ScenarioRepository};
pub use resolve::ResolutionMode;
pub use validate::{Diagnostic, DiagnosticKind, Severity};

/// JSON in, JSON out: `optionsJson` is a [`CompileOptions`] object (all
/// fields optional) and the result is a serialized [`CompileResult`].
#[cfg(feature = "napi")]
#[napi]
pub fn compile_scenario_native(
    source: String,
    options_json: Option<String>,
) -> napi::Result<String> {
    let options: CompileOptions = match options_json {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| napi::Error::from_reason(format!("Invalid compile options: {}", e)))?,
        None => CompileOptions::default(),
    };
    let result = compile_scenario(&source, &options);
    serde_json::to_string(&result).map_err(|e| napi::Error::from_reason(e.to_string()))
}

/// Compiles every scenario under `dir` with the settings in `config_path`
/// (`scenario.toml`; defaults when absent). Logging follows `log_filter`.
#[cfg(feature = "napi")]
#[napi]
pub fn compile_directory_native(dir: String, config_path: Option<String>) -> napi::Result<String> {
    let config = match config_path {
        Some(path) => CompilerConfig::load(path),
        None => Ok(CompilerConfig::default()),
    }
    .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    config.init_logging();

    let compiled = compile_directory(std::path::Path::new(&dir), &config)
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_string(&compiled).map_err(|e| napi::Error::from_reason(e.to_string()))
}
