//! # Widget Compiler
//!
//! Compiles widget-style source units into ECMAScript modules.
//!
//! ## Stages
//!
//! 1. **Lexer** (`lexer`): source text to tokens. Unknown characters become
//!    error tokens; comments are kept as trivia.
//! 2. **Parser** (`parse`): tokens to an AST. Errors are recorded and the
//!    parser resynchronizes at the next statement or declaration boundary.
//! 3. **Analyzers** (`widgets`, `state`, `context`, `ssr`): read-only passes
//!    over the AST. Classification is by base-class name, so aliased or
//!    re-exported framework bases are not recognized.
//! 4. **IR Builder** (`lowering`): AST to the typed IR in `ir`.
//! 5. **Code Generators** (`codegen` and the `emit_*` modules): IR to module
//!    source. A failing declaration is skipped; the rest are still emitted.
//! 6. **Import Resolver** (`resolver`): framework aliases, local probing and
//!    the package cache, memoized per resolver instance.
//!
//! ## Diagnostics
//!
//! No stage aborts the run. Every finding is a `Diagnostic` with a stable
//! `WC-*` code; whether errors fail a build is up to the caller.

mod ast;
mod cache;
mod codegen;
mod context;
mod diagnostics;
mod discovery;
mod emit_class;
mod emit_expr;
mod emit_function;
mod emit_stmt;
mod ir;
mod lexer;
mod lowering;
mod parse;
mod pipeline;
mod resolver;
mod ssr;
mod state;
mod visitor;
mod widgets;

#[cfg(test)]
mod analysis_tests;
#[cfg(test)]
mod codegen_tests;
#[cfg(test)]
mod lexer_tests;
#[cfg(test)]
mod lowering_tests;
#[cfg(test)]
mod parse_tests;
#[cfg(test)]
mod pipeline_tests;
#[cfg(test)]
mod resolver_tests;

pub use ast::*;
pub use cache::{content_hash, CacheKey, CacheStats, ResolutionCache};
pub use codegen::{
    generate, AccessorPolicy, CodeGenError, ConfigError, FieldPolicy, GenConfig, GenerateOutput,
};
pub use context::{analyze_context, ConsumerRecord, ConsumerStatus, ContextAnalysis, ProviderRecord};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity, SourceLocation};
pub use discovery::{discover_sources, read_source, DiscoveryError};
pub use ir::*;
pub use lexer::{tokenize, Lexer, Token, TokenCategory, TokenKind};
pub use lowering::{default_module, lower_unit, ModuleTarget};
pub use parse::{parse, parse_source};
pub use pipeline::{
    analyze, analyze_with_resolver, build_ir, compile, compile_project, compile_with_resolver,
    AnalysisReport, AnalyzeOptions, CompileResult, CompiledUnit, ProjectError,
};
pub use resolver::{
    module_targets, FallbackStep, FileProbe, FrameworkPackages, FsProbe, ImportResolver, Resolution,
    ResolutionType, ResolvedImport, ResolverConfig,
};
pub use ssr::{analyze_ssr, Compatibility, SsrAnalysis, UnsafePattern};
pub use state::{link_states, StateAnalysis, StateLink};
pub use widgets::{
    analyze_widgets, FunctionRecord, ImportRecord, WidgetAnalysis, WidgetKind, WidgetRecord,
    WidgetTreeNode,
};

/// Diagnostic codes, for callers matching on specific findings.
pub mod codes {
    pub use crate::diagnostics::{
        CODEGEN_INDENT_UNBALANCED, CODEGEN_MALFORMED, CODEGEN_OUTPUT_MISSING_DECLARATION,
        CODEGEN_OUTPUT_SYNTAX, CODEGEN_UNSUPPORTED, CONTEXT_UNRESOLVED_CONSUMER, IMPORT_UNRESOLVED,
        IR_DUPLICATE_MAP_KEY, IR_DUPLICATE_NAMED_ARGUMENT, LEX_INTEGER_OVERFLOW, LEX_UNEXPECTED_CHARACTER,
        LEX_UNTERMINATED_COMMENT, LEX_UNTERMINATED_STRING, PARSE_INVALID_ASSIGNMENT,
        PARSE_NESTING_TOO_DEEP, PARSE_UNEXPECTED_TOKEN, PARSE_UNSUPPORTED_DECLARATION, SSR_GUARDED_GLOBAL,
        SOURCE_UNREADABLE, SSR_UNSAFE_GLOBAL, STATE_AMBIGUOUS_LINK, STATE_LINK_NOT_STATE, STATE_SET_STATE_OUTSIDE,
        STATE_UNLINKED, WIDGET_MISSING_ENTRY_POINT, WIDGET_MISSING_ROOT,
    };
}

#[cfg(feature = "napi")]
pub use pipeline::{analyze_native, generate_native};
