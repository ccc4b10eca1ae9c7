use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::ir::{ActionDescriptor, Schema, ValueDescriptor};
use crate::runtime::key_path::KeyPath;
use crate::visitor::{walk_value, NodeVisitor};

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_SYNTAX: &str = "SD-ERR-SYNTAX-001";
pub const ERR_MISSING_MAIN: &str = "SD-ERR-ROOT-001";
pub const ERR_ROOT_NOT_ELEMENT: &str = "SD-ERR-ROOT-002";
pub const ERR_CHILD_NOT_ALLOWED: &str = "SD-ERR-CHILD-001";
pub const ERR_STYLE_NOT_OBJECT: &str = "SD-ERR-STYLE-001";
pub const ERR_UNRESOLVED_IDENTIFIER: &str = "SD-ERR-SCOPE-001";
pub const ERR_UNSUPPORTED_EXPRESSION: &str = "SD-ERR-EXPR-001";
pub const ERR_UNRECOGNIZED_CALL: &str = "SD-ERR-ACTION-001";
pub const ERR_ACTION_ARGUMENTS: &str = "SD-ERR-ACTION-002";
pub const ERR_UNSUPPORTED_STATEMENT: &str = "SD-ERR-ACTION-003";
pub const ERR_NOT_STATIC: &str = "SD-ERR-STATIC-001";
pub const ERR_INVALID_VERSION: &str = "SD-ERR-VERSION-001";
pub const ERR_UNKNOWN_ACTION_REF: &str = "SD-ERR-REF-001";
pub const ERR_INVALID_STORE_PATH: &str = "SD-ERR-PATH-001";
pub const ERR_RESERVED_KEY: &str = "SD-ERR-KEY-001";
pub const WARN_UNKNOWN_ATTRIBUTE: &str = "SD-WARN-ATTR-001";
pub const WARN_TEXT_DROPPED: &str = "SD-WARN-TEXT-001";
pub const WARN_IGNORED_STATEMENT: &str = "SD-WARN-STMT-001";

lazy_static! {
    static ref SEMVER_RE: Regex =
        Regex::new(r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)$").unwrap();
}

pub fn is_valid_version(version: &str) -> bool {
    SEMVER_RE.is_match(version)
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTICS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Compile-time error taxonomy. Warnings carry `Lint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    ValidationError,
    UnsupportedConstructError,
    UnresolvedReferenceError,
    Lint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub kind: DiagnosticKind,
    pub message: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            kind,
            message: message.into(),
            severity: Severity::Error,
            path: None,
            line: None,
            column: None,
        }
    }

    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(DiagnosticKind::Lint, code, message)
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.line = Some(location.line);
        self.column = Some(location.column);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

/// Maps byte offsets from oxc spans to 1-based line/column pairs.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (offset, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(offset as u32 + 1);
            }
        }
        Self { line_starts }
    }

    pub fn locate(&self, offset: u32) -> SourceLocation {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insert) => insert - 1,
        };
        SourceLocation {
            line: line as u32 + 1,
            column: offset - self.line_starts[line] + 1,
        }
    }
}

pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCHEMA VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Post-lowering checks on an assembled schema: every action reference must
/// resolve and every store path must be well formed.
pub fn validate_schema(schema: &Schema) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if !is_valid_version(&schema.version) {
        diagnostics.push(
            Diagnostic::error(
                DiagnosticKind::ValidationError,
                ERR_INVALID_VERSION,
                format!(
                    "Version \"{}\" is not of the form major.minor.patch.",
                    schema.version
                ),
            )
            .with_path(schema.key.clone()),
        );
    }

    let mut checker = ReferenceChecker {
        known: schema.actions.keys().cloned().collect(),
        diagnostics: &mut diagnostics,
    };
    checker.visit_schema(schema);

    diagnostics
}

struct ReferenceChecker<'d> {
    known: BTreeSet<String>,
    diagnostics: &'d mut Vec<Diagnostic>,
}

impl ReferenceChecker<'_> {
    fn check_path(&mut self, path: &str, owner: &str) {
        if let Err(error) = KeyPath::parse(path) {
            self.diagnostics.push(
                Diagnostic::error(
                    DiagnosticKind::ValidationError,
                    ERR_INVALID_STORE_PATH,
                    error.to_string(),
                )
                .with_path(owner.to_string()),
            );
        }
    }

    fn check_action(&mut self, id: &str, action: &ActionDescriptor) {
        match action {
            ActionDescriptor::StoreSet { path, value } => {
                self.check_path(path, id);
                self.visit_value(value, id);
            }
            ActionDescriptor::StoreRemove { path } => self.check_path(path, id),
            ActionDescriptor::StoreMerge { path, value } => {
                self.check_path(path, id);
                for entry in value.values() {
                    self.visit_value(entry, id);
                }
            }
            ActionDescriptor::Conditional {
                then, otherwise, ..
            } => {
                self.check_action(id, then);
                if let Some(otherwise) = otherwise {
                    self.check_action(id, otherwise);
                }
            }
            ActionDescriptor::Sequence { steps } => {
                for step in steps {
                    self.check_action(id, step);
                }
            }
            ActionDescriptor::ApiRequest(request) => {
                if let Some(mapping) = &request.response_mapping {
                    self.check_path(&mapping.target, id);
                }
                for callback in [&request.on_success, &request.on_error].into_iter().flatten() {
                    self.check_action(id, &callback.action);
                }
            }
            ActionDescriptor::Navigate { .. }
            | ActionDescriptor::UiFeedback { .. }
            | ActionDescriptor::System { .. } => {}
        }
    }
}

impl NodeVisitor for ReferenceChecker<'_> {
    fn visit_value(&mut self, value: &ValueDescriptor, path: &str) {
        match value {
            ValueDescriptor::ActionRef { id, .. } if !self.known.contains(id) => {
                self.diagnostics.push(
                    Diagnostic::error(
                        DiagnosticKind::ValidationError,
                        ERR_UNKNOWN_ACTION_REF,
                        format!("Action reference \"{}\" has no compiled action.", id),
                    )
                    .with_path(path.to_string()),
                );
            }
            ValueDescriptor::StoreReference(store_path) => self.check_path(store_path, path),
            _ => walk_value(self, value, path),
        }
    }

    fn visit_action(&mut self, id: &str, action: &ActionDescriptor) {
        self.check_action(id, action);
    }
}
