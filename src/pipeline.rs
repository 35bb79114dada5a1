//! Compilation pipeline
//!
//! Each stage is a plain function of the previous stage's output plus the
//! shared diagnostics sink:
//!
//! ```text
//! source ─► lex/parse ─► widgets ─► state / context / ssr ─► imports
//!        ─► build_ir ─► generate
//! ```
//!
//! Units are independent; `compile_project` runs them on the rayon pool and
//! shares only the resolver.

#[cfg(feature = "napi")]
use napi_derive::napi;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::ast::CompilationUnit;
use crate::cache::content_hash;
use crate::codegen::{generate, ConfigError, GenConfig, GenerateOutput};
use crate::context::{analyze_context, ContextAnalysis};
use crate::diagnostics::{self, Diagnostic, DiagnosticKind, Diagnostics, SourceLocation};
use crate::discovery::{discover_sources, read_source, DiscoveryError};
use crate::ir::IrModule;
use crate::lowering::{default_module, lower_unit, ModuleTarget};
use crate::parse::parse_source;
use crate::resolver::{module_targets, FrameworkPackages, ImportResolver, ResolvedImport};
use crate::ssr::{analyze_ssr, SsrAnalysis};
use crate::state::{link_states, StateAnalysis};
use crate::widgets::{analyze_widgets, FunctionRecord, ImportRecord, WidgetRecord, WidgetTreeNode};

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS & REPORT
// ═══════════════════════════════════════════════════════════════════════════════

fn default_file_path() -> String {
    "input.dart".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeOptions {
    /// Used in every source location. Defaults to `input.dart`.
    #[serde(default = "default_file_path")]
    pub file_path: String,
    /// Treat a missing `main`/`runApp` as an error instead of a library unit.
    #[serde(default)]
    pub require_entry_point: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        AnalyzeOptions {
            file_path: default_file_path(),
            require_entry_point: false,
        }
    }
}

impl AnalyzeOptions {
    pub fn for_file(file_path: impl Into<String>) -> Self {
        AnalyzeOptions {
            file_path: file_path.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub file_path: String,
    /// SHA-256 of the source text.
    pub source_hash: String,
    pub ast: CompilationUnit,
    pub diagnostics: Vec<Diagnostic>,
    pub widgets: Vec<WidgetRecord>,
    pub functions: Vec<FunctionRecord>,
    pub imports: Vec<ImportRecord>,
    pub external_dependencies: Vec<String>,
    pub entry_point: Option<String>,
    pub root_widget: Option<String>,
    pub widget_tree: Vec<WidgetTreeNode>,
    pub state: StateAnalysis,
    pub context: ContextAnalysis,
    pub ssr: SsrAnalysis,
    /// Empty when analyzed without a resolver.
    pub resolved_imports: Vec<ResolvedImport>,
}

impl AnalysisReport {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub report: AnalysisReport,
    pub module: IrModule,
    pub output: GenerateOutput,
}

impl CompileResult {
    /// Analysis and generation diagnostics together.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.report
            .diagnostics
            .iter()
            .chain(self.output.errors.iter())
            .chain(self.output.warnings.iter())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledUnit {
    pub path: String,
    pub result: CompileResult,
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ═══════════════════════════════════════════════════════════════════════════════
// STAGES
// ═══════════════════════════════════════════════════════════════════════════════

pub fn analyze(source: &str, options: &AnalyzeOptions) -> AnalysisReport {
    run_analysis(source, options, None)
}

/// Like [`analyze`], also resolving every import through `resolver`.
pub fn analyze_with_resolver(
    source: &str,
    options: &AnalyzeOptions,
    resolver: &ImportResolver,
) -> AnalysisReport {
    run_analysis(source, options, Some(resolver))
}

fn run_analysis(source: &str, options: &AnalyzeOptions, resolver: Option<&ImportResolver>) -> AnalysisReport {
    let mut sink = Diagnostics::new();

    let (unit, parse_diagnostics) = parse_source(source, &options.file_path);
    sink.extend(parse_diagnostics);

    let widgets = analyze_widgets(&unit, options.require_entry_point, &mut sink);
    let state = link_states(&unit, &widgets, &mut sink);
    let context = analyze_context(&unit, &widgets, &mut sink);
    let ssr = analyze_ssr(&unit, &mut sink);
    let resolved_imports = match resolver {
        Some(resolver) => resolver.resolve_imports(&widgets.imports, &mut sink),
        None => Vec::new(),
    };

    log::debug!(
        "[Pipeline] analyzed {}: {} widget(s), {} diagnostic(s)",
        options.file_path,
        widgets.widgets.len(),
        sink.len()
    );

    AnalysisReport {
        file_path: options.file_path.clone(),
        source_hash: content_hash(source),
        ast: unit,
        diagnostics: sink.into_vec(),
        widgets: widgets.widgets,
        functions: widgets.functions,
        imports: widgets.imports,
        external_dependencies: widgets.external_dependencies,
        entry_point: widgets.entry_point,
        root_widget: widgets.root_widget,
        widget_tree: widgets.widget_tree,
        state,
        context,
        ssr,
        resolved_imports,
    }
}

/// Module targets for the report's imports. Without a resolver, framework
/// aliases still apply and everything else keeps its default module.
fn module_map(report: &AnalysisReport) -> HashMap<String, ModuleTarget> {
    let mut modules = module_targets(&report.resolved_imports);
    let framework = FrameworkPackages::default();
    for import in &report.imports {
        modules.entry(import.uri.clone()).or_insert_with(|| match framework.lookup(&import.uri) {
            Some(module) => ModuleTarget {
                module,
                is_framework: true,
            },
            None => ModuleTarget {
                module: default_module(&import.uri),
                is_framework: false,
            },
        });
    }
    modules
}

/// Lowers an analyzed unit. IR-stage findings are appended to the report.
pub fn build_ir(report: &mut AnalysisReport) -> IrModule {
    let modules = module_map(report);
    let mut sink = Diagnostics::new();
    let module = lower_unit(&report.ast, &modules, &report.external_dependencies, &mut sink);
    report.diagnostics.extend(sink.into_vec());
    module
}

/// Every stage for one unit, without import resolution.
pub fn compile(source: &str, options: &AnalyzeOptions, config: &GenConfig) -> Result<CompileResult, ConfigError> {
    finish(analyze(source, options), config)
}

pub fn compile_with_resolver(
    source: &str,
    options: &AnalyzeOptions,
    config: &GenConfig,
    resolver: &ImportResolver,
) -> Result<CompileResult, ConfigError> {
    finish(analyze_with_resolver(source, options, resolver), config)
}

fn finish(mut report: AnalysisReport, config: &GenConfig) -> Result<CompileResult, ConfigError> {
    let module = build_ir(&mut report);
    let output = generate(&module.declarations, config)?;
    Ok(CompileResult {
        report,
        module,
        output,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROJECTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Compiles every source unit under `root` in parallel. Paths in the result
/// are relative to `root` and sorted. A unit that cannot be read still gets
/// an entry, with a `WC-IO-001` error in its report.
pub fn compile_project(
    root: &Path,
    options: &AnalyzeOptions,
    config: &GenConfig,
    resolver: &ImportResolver,
) -> Result<Vec<CompiledUnit>, ProjectError> {
    config.validate()?;
    let sources = discover_sources(root)?;

    let mut units = sources
        .par_iter()
        .map(|path| -> Result<CompiledUnit, ProjectError> {
            let relative = path
                .strip_prefix(root)
                .unwrap_or(path.as_path())
                .to_string_lossy()
                .replace('\\', "/");
            let unit_options = AnalyzeOptions {
                file_path: relative.clone(),
                ..options.clone()
            };
            let result = match read_source(path) {
                Ok(source) => compile_with_resolver(&source, &unit_options, config, resolver)?,
                // An unreadable unit compiles as empty and carries the failure.
                Err(error) => {
                    log::warn!("[Pipeline] {}", error);
                    let mut result = compile_with_resolver("", &unit_options, config, resolver)?;
                    result.report.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::AnalysisError,
                        diagnostics::SOURCE_UNREADABLE,
                        error.to_string(),
                        SourceLocation::new(Arc::from(relative.as_str()), 1, 1),
                    ));
                    result
                }
            };
            Ok(CompiledUnit {
                path: relative,
                result,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    units.sort_by(|a, b| a.path.cmp(&b.path));
    log::debug!("[Pipeline] compiled {} unit(s) under {}", units.len(), root.display());
    Ok(units)
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn analyze_native(source: String, options: Option<serde_json::Value>) -> napi::Result<serde_json::Value> {
    let options: AnalyzeOptions = match options {
        Some(value) => serde_json::from_value(value).map_err(|e| napi::Error::from_reason(e.to_string()))?,
        None => AnalyzeOptions::default(),
    };
    let report = analyze(&source, &options);
    serde_json::to_value(report).map_err(|e| napi::Error::from_reason(e.to_string()))
}

#[cfg(feature = "napi")]
#[napi]
pub fn generate_native(ir_json: String, config: Option<serde_json::Value>) -> napi::Result<serde_json::Value> {
    let module = IrModule::from_json(&ir_json).map_err(|e| napi::Error::from_reason(e.to_string()))?;
    let config: GenConfig = match config {
        Some(value) => serde_json::from_value(value).map_err(|e| napi::Error::from_reason(e.to_string()))?,
        None => GenConfig::default(),
    };
    let output = generate(&module.declarations, &config).map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_value(output).map_err(|e| napi::Error::from_reason(e.to_string()))
}
