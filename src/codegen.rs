//! Code generation
//!
//! Lowers IR declarations to ECMAScript module source. Every top-level
//! declaration is emitted into its own buffer: a `CodeGenError` discards
//! that buffer only and generation continues with the next declaration.
//! The per-node-kind emitters live in `emit_expr`, `emit_stmt`,
//! `emit_function` and `emit_class`; this module owns configuration, the
//! indentation-tracking writer and the final verification pass.

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::{BindingPattern, Declaration as JsDeclaration, Statement};
use oxc_parser::Parser;
use oxc_span::SourceType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use crate::cache::content_hash;
use crate::diagnostics::{self, Diagnostic, DiagnosticKind, SourceLocation};
use crate::ir::{DeclarationIR, ExportDecl, ImportDecl, IrId};

lazy_static! {
    static ref INDENT_RE: Regex = Regex::new(r"^[ \t]*$").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Where instance field initializers are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldPolicy {
    /// JS class field declarations.
    ClassFields,
    /// Assignments at the top of the constructor, after the super call.
    Constructor,
}

/// How getters and setters are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessorPolicy {
    /// `get x()` / `set x(v)`.
    Native,
    /// `getX()` / `setX(v)`.
    Explicit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenConfig {
    /// One indentation step. Defaults to two spaces.
    pub indent: String,
    pub field_initializers: FieldPolicy,
    pub accessors: AccessorPolicy,
    /// Prefix public (non-underscore) top-level declarations with `export`.
    pub export_public: bool,
    /// Re-parse the output and report syntax problems as warnings.
    pub verify_output: bool,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            field_initializers: FieldPolicy::ClassFields,
            accessors: AccessorPolicy::Native,
            export_public: false,
            verify_output: true,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("indentation must be spaces or tabs, got {0:?}")]
    InvalidIndent(String),
}

impl GenConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !INDENT_RE.is_match(&self.indent) {
            return Err(ConfigError::InvalidIndent(self.indent.clone()));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS & OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

/// An IR node the generators cannot lower. Aborts the enclosing top-level
/// declaration only.
#[derive(Debug, Clone, Error, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("cannot generate {node_kind} {node_id} in `{declaration}`: {message}")]
pub struct CodeGenError {
    pub code: String,
    pub node_id: IrId,
    pub node_kind: String,
    pub declaration: String,
    pub message: String,
    pub suggestion: String,
    pub location: SourceLocation,
}

impl CodeGenError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(
            DiagnosticKind::CodeGenError,
            &self.code,
            self.to_string(),
            self.location.clone(),
        )
        .with_hint(self.suggestion.clone())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOutput {
    pub code: String,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    /// SHA-256 of `code`, lowercase hex.
    pub fingerprint: String,
}

impl GenerateOutput {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WRITER
// ═══════════════════════════════════════════════════════════════════════════════

/// Line-oriented output buffer that tracks the indentation level.
#[derive(Debug)]
pub struct CodeWriter {
    unit: String,
    level: usize,
    underflow: bool,
    buffer: String,
}

impl CodeWriter {
    pub fn new(unit: &str) -> Self {
        Self::at_level(unit, 0)
    }

    pub fn at_level(unit: &str, level: usize) -> Self {
        Self {
            unit: unit.to_string(),
            level,
            underflow: false,
            buffer: String::new(),
        }
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn indent(&mut self) {
        self.level += 1;
    }

    pub fn dedent(&mut self) {
        match self.level.checked_sub(1) {
            Some(level) => self.level = level,
            None => self.underflow = true,
        }
    }

    pub fn indentation(&self) -> String {
        self.unit.repeat(self.level)
    }

    /// Writes one line at the current level. Continuation lines of a
    /// multi-line `text` keep their own indentation.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            self.buffer.push_str(&self.unit.repeat(self.level));
            self.buffer.push_str(text);
        }
        self.buffer.push('\n');
    }

    /// True when every dedent matched an indent since `level` was recorded.
    pub fn is_balanced_at(&self, level: usize) -> bool {
        !self.underflow && self.level == level
    }

    pub fn finish(self) -> String {
        self.buffer
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EMITTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-declaration emission state shared by the node emitters.
pub(crate) struct Emitter<'c> {
    pub(crate) config: &'c GenConfig,
    pub(crate) writer: CodeWriter,
    pub(crate) declaration: String,
    pub(crate) cascade_receivers: Vec<String>,
    pub(crate) catch_variables: Vec<String>,
    temp_counter: usize,
}

impl<'c> Emitter<'c> {
    pub(crate) fn new(config: &'c GenConfig, declaration: String) -> Self {
        Self {
            config,
            writer: CodeWriter::new(&config.indent),
            declaration,
            cascade_receivers: Vec::new(),
            catch_variables: Vec::new(),
            temp_counter: 0,
        }
    }

    /// Fresh temporary name, unique within the declaration.
    pub(crate) fn temp(&mut self, prefix: &str) -> String {
        let name = format!("_{}{}", prefix, self.temp_counter);
        self.temp_counter += 1;
        name
    }

    pub(crate) fn error(
        &self,
        code: &str,
        node_id: IrId,
        node_kind: &str,
        location: &SourceLocation,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> CodeGenError {
        CodeGenError {
            code: code.to_string(),
            node_id,
            node_kind: node_kind.to_string(),
            declaration: self.declaration.clone(),
            message: message.into(),
            suggestion: suggestion.into(),
            location: location.clone(),
        }
    }

    /// `header {`, indented body, then `closer`.
    pub(crate) fn braced_with<F>(&mut self, header: &str, closer: &str, body: F) -> Result<(), CodeGenError>
    where
        F: FnOnce(&mut Self) -> Result<(), CodeGenError>,
    {
        if header.is_empty() {
            self.writer.line("{");
        } else {
            self.writer.line(format!("{} {{", header));
        }
        self.writer.indent();
        let result = body(self);
        self.writer.dedent();
        result?;
        self.writer.line(closer);
        Ok(())
    }

    pub(crate) fn braced<F>(&mut self, header: &str, body: F) -> Result<(), CodeGenError>
    where
        F: FnOnce(&mut Self) -> Result<(), CodeGenError>,
    {
        self.braced_with(header, "}", body)
    }

    /// Renders a `{ ... }` block to a string for use inside an expression.
    /// The closing brace sits at the current level.
    pub(crate) fn capture_block<F>(&mut self, body: F) -> Result<String, CodeGenError>
    where
        F: FnOnce(&mut Self) -> Result<(), CodeGenError>,
    {
        let level = self.writer.level();
        let nested = CodeWriter::at_level(&self.config.indent, level + 1);
        let saved = std::mem::replace(&mut self.writer, nested);
        let result = body(self);
        let inner = std::mem::replace(&mut self.writer, saved);
        result?;
        Ok(format!("{{\n{}{}}}", inner.finish(), self.writer.indentation()))
    }

    pub(crate) fn export_prefix(&self, name: &str) -> &'static str {
        if self.config.export_public && !name.starts_with('_') {
            "export "
        } else {
            ""
        }
    }

    fn import(&mut self, import: &ImportDecl) {
        let module = js_string(&import.module);
        let line = match (&import.prefix, import.items.is_empty()) {
            (Some(prefix), _) => format!("import * as {} from {};", prefix, module),
            (None, false) => format!("import {{ {} }} from {};", import.items.join(", "), module),
            (None, true) => format!("import {};", module),
        };
        self.writer.line(line);
    }

    fn export(&mut self, export: &ExportDecl) {
        let module = js_string(&export.module);
        if export.show.is_empty() {
            self.writer.line(format!("export * from {};", module));
        } else {
            self.writer
                .line(format!("export {{ {} }} from {};", export.show.join(", "), module));
        }
    }

    pub(crate) fn declaration(&mut self, declaration: &DeclarationIR) -> Result<(), CodeGenError> {
        match declaration {
            DeclarationIR::Import(import) => {
                self.import(import);
                Ok(())
            }
            DeclarationIR::Export(export) => {
                self.export(export);
                Ok(())
            }
            DeclarationIR::Class(class) => {
                let export = self.export_prefix(&class.name);
                self.class(class, export)
            }
            DeclarationIR::Enum(e) => {
                let export = self.export_prefix(&e.name);
                self.enumeration(e, export);
                Ok(())
            }
            DeclarationIR::Function(function) => {
                let export = self.export_prefix(&function.name);
                self.function_declaration(function, export)
            }
            DeclarationIR::Variable(variable) => {
                let export = if variable.declarators.iter().all(|d| !d.name.starts_with('_')) {
                    self.export_prefix("")
                } else {
                    ""
                };
                let text = self.variable(variable)?;
                self.writer.line(format!("{}{};", export, text));
                Ok(())
            }
        }
    }
}

/// Double-quoted JS string literal.
pub(crate) fn js_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{2028}' || c == '\u{2029}' => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

/// Names a declaration binds at module level.
fn top_level_names(declaration: &DeclarationIR) -> Vec<String> {
    match declaration {
        DeclarationIR::Class(c) => vec![c.name.clone()],
        DeclarationIR::Function(f) => vec![f.name.clone()],
        DeclarationIR::Enum(e) => vec![e.name.clone()],
        DeclarationIR::Variable(v) => v.declarators.iter().map(|d| d.name.clone()).collect(),
        DeclarationIR::Import(_) | DeclarationIR::Export(_) => Vec::new(),
    }
}

pub fn generate(declarations: &[DeclarationIR], config: &GenConfig) -> Result<GenerateOutput, ConfigError> {
    config.validate()?;

    let mut code = String::new();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut expected_names = Vec::new();
    let mut previous_was_module_line = false;

    for declaration in declarations {
        let mut emitter = Emitter::new(config, declaration.name());
        let before = emitter.writer.level();
        if let Err(error) = emitter.declaration(declaration) {
            log::warn!("[CodeGen] {}", error);
            errors.push(error.to_diagnostic());
            continue;
        }
        if !emitter.writer.is_balanced_at(before) {
            errors.push(Diagnostic::new(
                DiagnosticKind::CodeGenError,
                diagnostics::CODEGEN_INDENT_UNBALANCED,
                format!("unbalanced indentation while generating `{}`", declaration.name()),
                declaration.location().clone(),
            ));
            continue;
        }

        let is_module_line = matches!(declaration, DeclarationIR::Import(_) | DeclarationIR::Export(_));
        if !code.is_empty() && !(is_module_line && previous_was_module_line) {
            code.push('\n');
        }
        previous_was_module_line = is_module_line;
        code.push_str(&emitter.writer.finish());
        expected_names.extend(top_level_names(declaration));
    }

    if config.verify_output {
        let file: Arc<str> = declarations
            .first()
            .map(|d| d.location().file.clone())
            .unwrap_or_else(|| Arc::from(""));
        warnings.extend(verify_output(&code, &expected_names, &file));
    }

    log::debug!(
        "[CodeGen] {} declarations, {} errors, {} warnings",
        declarations.len(),
        errors.len(),
        warnings.len()
    );
    let fingerprint = content_hash(&code);
    Ok(GenerateOutput {
        code,
        errors,
        warnings,
        fingerprint,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT VERIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Parses `code` as a module; reports syntax errors and expected top-level
/// bindings that the parsed program does not declare.
fn verify_output(code: &str, expected: &[String], file: &Arc<str>) -> Vec<Diagnostic> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true);
    let ret = Parser::new(&allocator, code, source_type).parse();

    if !ret.errors.is_empty() {
        return ret
            .errors
            .iter()
            .map(|e| {
                Diagnostic::new(
                    DiagnosticKind::CodeGenWarning,
                    diagnostics::CODEGEN_OUTPUT_SYNTAX,
                    format!("generated code does not parse: {}", e),
                    SourceLocation::synthetic(file),
                )
            })
            .collect();
    }

    let mut declared = HashSet::new();
    for stmt in &ret.program.body {
        collect_declared(stmt, &mut declared);
    }
    expected
        .iter()
        .filter(|name| !declared.contains(name.as_str()))
        .map(|name| {
            Diagnostic::new(
                DiagnosticKind::CodeGenWarning,
                diagnostics::CODEGEN_OUTPUT_MISSING_DECLARATION,
                format!("generated code does not declare `{}`", name),
                SourceLocation::synthetic(file),
            )
        })
        .collect()
}

fn collect_declared(stmt: &Statement, declared: &mut HashSet<String>) {
    match stmt {
        Statement::ClassDeclaration(class) => {
            if let Some(id) = &class.id {
                declared.insert(id.name.to_string());
            }
        }
        Statement::FunctionDeclaration(function) => {
            if let Some(id) = &function.id {
                declared.insert(id.name.to_string());
            }
        }
        Statement::VariableDeclaration(variable) => {
            for declarator in &variable.declarations {
                if let BindingPattern::BindingIdentifier(id) = &declarator.id {
                    declared.insert(id.name.to_string());
                }
            }
        }
        Statement::ExportNamedDeclaration(export) => match &export.declaration {
            Some(JsDeclaration::ClassDeclaration(class)) => {
                if let Some(id) = &class.id {
                    declared.insert(id.name.to_string());
                }
            }
            Some(JsDeclaration::FunctionDeclaration(function)) => {
                if let Some(id) = &function.id {
                    declared.insert(id.name.to_string());
                }
            }
            Some(JsDeclaration::VariableDeclaration(variable)) => {
                for declarator in &variable.declarations {
                    if let BindingPattern::BindingIdentifier(id) = &declarator.id {
                        declared.insert(id.name.to_string());
                    }
                }
            }
            _ => {}
        },
        _ => {}
    }
}
