//! Diagnostics for the widget compiler
//!
//! Every stage reports findings as plain `Diagnostic` records appended to a
//! shared, append-only `Diagnostics` sink. Nothing in the pipeline aborts on a
//! finding; the caller decides what to do with errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const LEX_UNEXPECTED_CHARACTER: &str = "WC-LEX-001";
pub const LEX_UNTERMINATED_STRING: &str = "WC-LEX-002";
pub const LEX_UNTERMINATED_COMMENT: &str = "WC-LEX-003";
pub const LEX_INTEGER_OVERFLOW: &str = "WC-LEX-004";
pub const PARSE_UNEXPECTED_TOKEN: &str = "WC-PARSE-001";
pub const PARSE_UNSUPPORTED_DECLARATION: &str = "WC-PARSE-002";
pub const PARSE_INVALID_ASSIGNMENT: &str = "WC-PARSE-003";
pub const PARSE_NESTING_TOO_DEEP: &str = "WC-PARSE-004";
pub const WIDGET_MISSING_ENTRY_POINT: &str = "WC-WIDGET-001";
pub const WIDGET_MISSING_ROOT: &str = "WC-WIDGET-002";
pub const STATE_UNLINKED: &str = "WC-STATE-001";
pub const STATE_AMBIGUOUS_LINK: &str = "WC-STATE-002";
pub const STATE_LINK_NOT_STATE: &str = "WC-STATE-003";
pub const STATE_SET_STATE_OUTSIDE: &str = "WC-STATE-004";
pub const CONTEXT_UNRESOLVED_CONSUMER: &str = "WC-CTX-001";
pub const SSR_UNSAFE_GLOBAL: &str = "WC-SSR-001";
pub const SSR_GUARDED_GLOBAL: &str = "WC-SSR-002";
pub const IMPORT_UNRESOLVED: &str = "WC-IMPORT-001";
pub const SOURCE_UNREADABLE: &str = "WC-IO-001";
pub const IR_DUPLICATE_NAMED_ARGUMENT: &str = "WC-IR-001";
pub const IR_DUPLICATE_MAP_KEY: &str = "WC-IR-002";
pub const CODEGEN_UNSUPPORTED: &str = "WC-GEN-001";
pub const CODEGEN_MALFORMED: &str = "WC-GEN-002";
pub const CODEGEN_INDENT_UNBALANCED: &str = "WC-GEN-003";
pub const CODEGEN_OUTPUT_SYNTAX: &str = "WC-GEN-004";
pub const CODEGEN_OUTPUT_MISSING_DECLARATION: &str = "WC-GEN-005";

fn get_hint(code: &str) -> Option<&'static str> {
    match code {
        LEX_UNEXPECTED_CHARACTER => Some("Remove the character or move it into a string literal."),
        LEX_UNTERMINATED_STRING => Some("Close the string with the quote it was opened with."),
        LEX_UNTERMINATED_COMMENT => Some("Close the block comment with `*/`."),
        LEX_INTEGER_OVERFLOW => Some("Integer literals must fit in 64 bits; use a double literal instead."),
        PARSE_NESTING_TOO_DEEP => Some("Split the expression into local variables or helper widgets."),
        WIDGET_MISSING_ENTRY_POINT => Some("Declare `void main() { runApp(MyApp()); }`."),
        WIDGET_MISSING_ROOT => Some("Pass a widget constructor call to `runApp(...)`."),
        STATE_UNLINKED => Some("Return exactly one State subclass from `createState()`."),
        STATE_AMBIGUOUS_LINK => Some("`createState()` must always return the same State class."),
        STATE_LINK_NOT_STATE => Some("The class returned by `createState()` should extend `State<T>`."),
        CONTEXT_UNRESOLVED_CONSUMER => {
            Some("Wrap a widget above this one in the matching provider widget.")
        }
        SSR_UNSAFE_GLOBAL => Some("Guard browser globals with `kIsWeb` or move them out of `build`."),
        IMPORT_UNRESOLVED => Some("Check the import path or register a framework package alias."),
        SOURCE_UNREADABLE => Some("Check the file's permissions and that it is UTF-8 encoded."),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE LOCATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Immutable (file, line, column) triple attached to every node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub file: Arc<str>,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: Arc<str>, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }

    /// Location used for synthesized nodes that have no source counterpart.
    pub fn synthetic(file: &Arc<str>) -> Self {
        Self {
            file: file.clone(),
            line: 0,
            column: 0,
        }
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self {
            file: Arc::from(""),
            line: 0,
            column: 0,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    LexError,
    ParseError,
    AnalysisWarning,
    AnalysisError,
    CodeGenError,
    CodeGenWarning,
}

impl DiagnosticKind {
    pub fn default_severity(self) -> Severity {
        match self {
            DiagnosticKind::LexError
            | DiagnosticKind::ParseError
            | DiagnosticKind::AnalysisError
            | DiagnosticKind::CodeGenError => Severity::Error,
            DiagnosticKind::AnalysisWarning | DiagnosticKind::CodeGenWarning => Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    pub source_location: SourceLocation,
    #[serde(default)]
    pub hints: Vec<String>,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        code: &str,
        message: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Diagnostic {
            code: code.to_string(),
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            source_location: location,
            hints: get_hint(code).map(|h| vec![h.to_string()]).unwrap_or_default(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code,
            match self.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Info => "info",
            },
            self.message,
            self.source_location
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SINK
// ═══════════════════════════════════════════════════════════════════════════════

/// Append-only diagnostics sink shared by the stages of one compilation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.items.extend(diagnostics);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.kind == kind)
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
