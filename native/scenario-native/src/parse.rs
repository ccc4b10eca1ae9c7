//! Compile Driver for Scenario Sources
//!
//! Parses one TSX module with oxc and lowers its top-level declarations:
//!
//! - `const NAME = <static value>` → module constant
//! - `export const stores = {...}` → initial store shape (must be static)
//! - `export const metadata = {...}` → schema metadata (must be static)
//! - `export const actions = { name: () => {...} }` → named actions
//! - `function Card(props) { return <View/> }` / `const Card = () => <View/>` → component
//! - `export default function Screen() { return <View/> }` → main tree
//!
//! Diagnostics are collected for the whole module. A schema is only produced
//! when no error was reported.

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    BindingPattern, Declaration, ExportDefaultDeclarationKind, Expression, FormalParameters,
    FunctionBody, ObjectPropertyKind, Statement, VariableDeclaration,
};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, debug_span};

use crate::catalog::Catalog;
use crate::finalize::{assemble_schema, ScenarioParts};
use crate::ir::{Schema, UiNode};
use crate::jsx_lowerer::returned_jsx;
use crate::resolve::{LoweringContext, NamedAction, ResolutionMode};
use crate::scope::{collect_component_props, property_key_name, PropScope};
use crate::static_eval::{static_value, unwrap_expression};
use crate::validate::{
    has_errors, validate_schema, Diagnostic, DiagnosticKind, ERR_ACTION_ARGUMENTS,
    ERR_MISSING_MAIN, ERR_NOT_STATIC, ERR_ROOT_NOT_ELEMENT, ERR_SYNTAX, WARN_IGNORED_STATEMENT,
};

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS & RESULTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    /// Schema key. Falls back to the file stem of `file_path`.
    pub key: String,
    pub version: String,
    pub mode: ResolutionMode,
    pub file_path: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            key: String::new(),
            version: "1.0.0".to_string(),
            mode: ResolutionMode::Strict,
            file_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub schema: Option<Schema>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileResult {
    pub fn has_errors(&self) -> bool {
        has_errors(&self.diagnostics)
    }

    pub fn into_schema(self) -> Result<Schema, CompileFailure> {
        match self.schema {
            Some(schema) if !has_errors(&self.diagnostics) => Ok(schema),
            _ => Err(CompileFailure {
                diagnostics: self.diagnostics,
            }),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error(
    "compilation failed with {} error(s): {}",
    error_count(.diagnostics),
    first_error(.diagnostics)
)]
pub struct CompileFailure {
    pub diagnostics: Vec<Diagnostic>,
}

fn error_count(diagnostics: &[Diagnostic]) -> usize {
    diagnostics.iter().filter(|d| d.is_error()).count()
}

fn first_error(diagnostics: &[Diagnostic]) -> &str {
    diagnostics
        .iter()
        .find(|d| d.is_error())
        .map(|d| d.message.as_str())
        .unwrap_or("unknown error")
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Compiles one scenario against the built-in catalog.
pub fn compile_scenario(source: &str, options: &CompileOptions) -> CompileResult {
    compile_with_catalog(source, options, &Catalog::builtin())
}

pub fn compile_with_catalog(
    source: &str,
    options: &CompileOptions,
    catalog: &Catalog,
) -> CompileResult {
    let _span = debug_span!(
        "compile_scenario",
        key = %options.key,
        file = options.file_path.as_deref().unwrap_or("<inline>")
    )
    .entered();

    let allocator = Allocator::default();
    let source_type = SourceType::default()
        .with_typescript(true)
        .with_jsx(true)
        .with_module(true);
    let ret = Parser::new(&allocator, source, source_type).parse();

    if !ret.errors.is_empty() {
        let diagnostics = ret
            .errors
            .iter()
            .map(|error| {
                Diagnostic::error(DiagnosticKind::ValidationError, ERR_SYNTAX, error.to_string())
            })
            .collect();
        debug!(errors = ret.errors.len(), "parse failed");
        return CompileResult {
            schema: None,
            diagnostics,
        };
    }

    let mut ctx = LoweringContext::new(source, options.mode, catalog);
    let module = collect_module(&mut ctx, &ret.program.body);
    let parts = lower_module(&mut ctx, module);

    let mut diagnostics = std::mem::take(&mut ctx.diagnostics);
    let schema = parts.map(|parts| assemble_schema(parts, options, source));
    if let Some(schema) = &schema {
        diagnostics.extend(validate_schema(schema));
    }

    let failed = has_errors(&diagnostics);
    debug!(
        diagnostics = diagnostics.len(),
        failed,
        "scenario compiled"
    );
    CompileResult {
        schema: if failed { None } else { schema },
        diagnostics,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODULE COLLECTION
// ═══════════════════════════════════════════════════════════════════════════════

struct FunctionItem<'b, 'a> {
    params: &'b FormalParameters<'a>,
    body: &'b FunctionBody<'a>,
    span: Span,
}

enum MainExport<'b, 'a> {
    Function(FunctionItem<'b, 'a>),
    Named(String, Span),
}

#[derive(Default)]
struct ModuleItems<'b, 'a> {
    constants: Vec<(String, &'b Expression<'a>)>,
    stores: Option<&'b Expression<'a>>,
    metadata: Option<&'b Expression<'a>>,
    actions: Option<&'b Expression<'a>>,
    components: Vec<(String, FunctionItem<'b, 'a>)>,
    main: Option<MainExport<'b, 'a>>,
}

fn function_item<'b, 'a>(expr: &'b Expression<'a>) -> Option<FunctionItem<'b, 'a>> {
    match unwrap_expression(expr) {
        Expression::ArrowFunctionExpression(arrow) => Some(FunctionItem {
            params: &arrow.params,
            body: &arrow.body,
            span: arrow.span,
        }),
        Expression::FunctionExpression(func) => func.body.as_ref().map(|body| FunctionItem {
            params: &func.params,
            body,
            span: func.span,
        }),
        _ => None,
    }
}

fn is_component_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

fn collect_module<'b, 'a>(
    ctx: &mut LoweringContext<'_>,
    body: &'b [Statement<'a>],
) -> ModuleItems<'b, 'a> {
    let mut items = ModuleItems::default();
    for statement in body {
        match statement {
            Statement::VariableDeclaration(decl) => collect_variables(ctx, decl, &mut items),
            Statement::FunctionDeclaration(func) => {
                collect_function(ctx, func, statement.span(), &mut items)
            }
            Statement::ExportNamedDeclaration(export) => match &export.declaration {
                Some(Declaration::VariableDeclaration(decl)) => {
                    collect_variables(ctx, decl, &mut items)
                }
                Some(Declaration::FunctionDeclaration(func)) => {
                    collect_function(ctx, func, export.span, &mut items)
                }
                Some(_) => {}
                None => ignored(ctx, "re-export", export.span),
            },
            Statement::ExportDefaultDeclaration(export) => {
                let main = match &export.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                        func.body.as_ref().map(|body| {
                            MainExport::Function(FunctionItem {
                                params: &func.params,
                                body,
                                span: func.span,
                            })
                        })
                    }
                    ExportDefaultDeclarationKind::Identifier(id) => {
                        Some(MainExport::Named(id.name.to_string(), id.span))
                    }
                    other => other
                        .as_expression()
                        .and_then(function_item)
                        .map(MainExport::Function),
                };
                if main.is_none() {
                    ctx.error(
                        DiagnosticKind::ValidationError,
                        ERR_MISSING_MAIN,
                        "The default export must be a component function.",
                        export.span,
                        "main",
                    );
                }
                items.main = main;
            }
            Statement::ImportDeclaration(_)
            | Statement::TSTypeAliasDeclaration(_)
            | Statement::TSInterfaceDeclaration(_)
            | Statement::TSEnumDeclaration(_)
            | Statement::TSModuleDeclaration(_)
            | Statement::EmptyStatement(_) => {}
            other => ignored(ctx, "top-level statement", other.span()),
        }
    }
    items
}

fn collect_variables<'b, 'a>(
    ctx: &mut LoweringContext<'_>,
    decl: &'b VariableDeclaration<'a>,
    items: &mut ModuleItems<'b, 'a>,
) {
    for declarator in &decl.declarations {
        let (BindingPattern::BindingIdentifier(id), Some(init)) = (&declarator.id, &declarator.init)
        else {
            ignored(ctx, "declaration", declarator.span);
            continue;
        };
        let name = id.name.to_string();
        match name.as_str() {
            "stores" => items.stores = Some(init),
            "metadata" => items.metadata = Some(init),
            "actions" => items.actions = Some(init),
            _ => match function_item(init) {
                Some(item) if is_component_name(&name) => items.components.push((name, item)),
                Some(_) => ignored(ctx, "helper function", declarator.span),
                None => items.constants.push((name, init)),
            },
        }
    }
}

fn collect_function<'b, 'a>(
    ctx: &mut LoweringContext<'_>,
    func: &'b oxc_ast::ast::Function<'a>,
    span: Span,
    items: &mut ModuleItems<'b, 'a>,
) {
    let name = func.id.as_ref().map(|id| id.name.to_string());
    match (name, &func.body) {
        (Some(name), Some(body)) if is_component_name(&name) => items.components.push((
            name,
            FunctionItem {
                params: &func.params,
                body,
                span: func.span,
            },
        )),
        _ => ignored(ctx, "helper function", span),
    }
}

fn ignored(ctx: &mut LoweringContext<'_>, what: &str, span: Span) {
    let text = ctx.source_text(span);
    let first_line = text.lines().next().unwrap_or_default();
    ctx.warn(
        WARN_IGNORED_STATEMENT,
        format!("Ignored {}: `{}`", what, first_line),
        span,
        "module",
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOWERING
// ═══════════════════════════════════════════════════════════════════════════════

/// Constants first, then the static exports, then named actions (so that
/// elements can reference them), then components and the main tree.
fn lower_module(
    ctx: &mut LoweringContext<'_>,
    module: ModuleItems<'_, '_>,
) -> Option<ScenarioParts> {
    for (name, init) in &module.constants {
        match static_value(init, &ctx.constants) {
            Some(value) => {
                ctx.constants.insert(name.clone(), value);
            }
            None => {
                let what = format!("non-static constant '{}'", name);
                ignored(ctx, &what, init.span());
            }
        }
    }

    let stores = module
        .stores
        .and_then(|init| static_object(ctx, "stores", init))
        .map(Value::Object);
    let metadata = module
        .metadata
        .and_then(|init| static_object(ctx, "metadata", init))
        .map(|map| map.into_iter().collect::<BTreeMap<_, _>>())
        .unwrap_or_default();

    if let Some(actions) = module.actions {
        lower_named_actions(ctx, actions);
    }

    let mut components = BTreeMap::new();
    for (name, item) in &module.components {
        if let Some(node) = lower_component(ctx, name, item) {
            components.insert(name.clone(), node);
        }
    }

    let main = match module.main {
        Some(MainExport::Function(item)) => lower_component(ctx, "main", &item),
        Some(MainExport::Named(name, span)) => match components.remove(&name) {
            Some(node) => Some(node),
            None => {
                ctx.error(
                    DiagnosticKind::ValidationError,
                    ERR_MISSING_MAIN,
                    format!(
                        "The default export '{}' is not a component declared in this file.",
                        name
                    ),
                    span,
                    "main",
                );
                None
            }
        },
        None => {
            if !ctx.diagnostics.iter().any(|d| d.code == ERR_MISSING_MAIN) {
                ctx.error(
                    DiagnosticKind::ValidationError,
                    ERR_MISSING_MAIN,
                    "A scenario must `export default` its main component.",
                    Span::new(0, 0),
                    "main",
                );
            }
            None
        }
    }?;

    debug!(
        components = components.len(),
        actions = ctx.actions.len(),
        constants = ctx.constants.len(),
        "module lowered"
    );

    Some(ScenarioParts {
        main,
        components,
        stores,
        actions: std::mem::take(&mut ctx.actions),
        metadata,
    })
}

fn static_object(
    ctx: &mut LoweringContext<'_>,
    name: &str,
    init: &Expression<'_>,
) -> Option<serde_json::Map<String, Value>> {
    match static_value(init, &ctx.constants) {
        Some(Value::Object(map)) => Some(map),
        _ => {
            ctx.error(
                DiagnosticKind::ValidationError,
                ERR_NOT_STATIC,
                format!("`{}` must be an object literal known at compile time.", name),
                init.span(),
                name,
            );
            None
        }
    }
}

fn lower_named_actions(ctx: &mut LoweringContext<'_>, init: &Expression<'_>) {
    let Expression::ObjectExpression(object) = unwrap_expression(init) else {
        ctx.error(
            DiagnosticKind::ValidationError,
            ERR_NOT_STATIC,
            "`actions` must be an object literal of handler functions.",
            init.span(),
            "actions",
        );
        return;
    };

    for property in &object.properties {
        let ObjectPropertyKind::ObjectProperty(prop) = property else {
            ctx.unsupported("spread in actions", property.span(), "actions");
            continue;
        };
        let Some(name) = property_key_name(&prop.key).filter(|_| !prop.computed) else {
            ctx.unsupported("computed action name", prop.key.span(), "actions");
            continue;
        };
        let site = format!("actions:{}", name);
        let Some(item) = function_item(&prop.value) else {
            ctx.error(
                DiagnosticKind::ValidationError,
                ERR_ACTION_ARGUMENTS,
                format!("Action '{}' must be a function.", name),
                prop.value.span(),
                &site,
            );
            continue;
        };
        let (action, bind) = ctx.lower_handler(item.params, item.body, &PropScope::empty(), &site);
        ctx.actions.insert(name.clone(), action.clone());
        ctx.named_actions.insert(name, NamedAction { action, bind });
    }
}

fn lower_component(
    ctx: &mut LoweringContext<'_>,
    owner: &str,
    item: &FunctionItem<'_, '_>,
) -> Option<UiNode> {
    let scope = collect_component_props(item.params);
    match returned_jsx(item.body) {
        Some(element) => Some(ctx.lower_element(element, &scope, owner, "root")),
        None => {
            ctx.error(
                DiagnosticKind::ValidationError,
                ERR_ROOT_NOT_ELEMENT,
                format!(
                    "Component '{}' must consist of a single `return <Element />`.",
                    owner
                ),
                item.span,
                &format!("{}:root", owner),
            );
            None
        }
    }
}
