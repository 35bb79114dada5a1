//! Function, method and parameter emitters
//!
//! Named parameters collapse into one destructured object parameter with an
//! empty-object default; call sites pass a matching object literal.

use crate::ast::MethodKind;
use crate::codegen::{AccessorPolicy, CodeGenError, Emitter};
use crate::diagnostics;
use crate::ir::*;

fn function_keyword(is_async: bool, is_generator: bool) -> &'static str {
    match (is_async, is_generator) {
        (false, false) => "function",
        (true, false) => "async function",
        (false, true) => "function*",
        (true, true) => "async function*",
    }
}

fn method_modifiers(is_async: bool, is_generator: bool) -> &'static str {
    match (is_async, is_generator) {
        (false, false) => "",
        (true, false) => "async ",
        (false, true) => "*",
        (true, true) => "async *",
    }
}

pub(crate) fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl Emitter<'_> {
    /// Declaration-site parameter list.
    pub(crate) fn parameters(&mut self, parameters: &[ParameterIR]) -> Result<String, CodeGenError> {
        let mut parts = Vec::with_capacity(parameters.len());
        let mut named = Vec::new();
        for parameter in parameters {
            let default = match &parameter.default_value {
                Some(value) => Some(self.expr(value)?),
                None => None,
            };
            match parameter.kind {
                ParameterKind::Positional => parts.push(parameter.name.clone()),
                ParameterKind::OptionalPositional => parts.push(format!(
                    "{} = {}",
                    parameter.name,
                    default.unwrap_or_else(|| "null".to_string())
                )),
                ParameterKind::Named => named.push(match (default, parameter.is_required) {
                    (Some(default), _) => format!("{} = {}", parameter.name, default),
                    (None, true) => parameter.name.clone(),
                    (None, false) => format!("{} = null", parameter.name),
                }),
            }
        }
        if !named.is_empty() {
            parts.push(format!("{{ {} }} = {{}}", named.join(", ")));
        }
        Ok(parts.join(", "))
    }

    /// Statements of a function body, without the surrounding braces.
    pub(crate) fn function_body(&mut self, body: &FunctionBodyIR) -> Result<(), CodeGenError> {
        match body {
            FunctionBodyIR::Block { statements } => self.statements(statements),
            FunctionBodyIR::Expression { expr } => {
                let text = self.expr(expr)?;
                self.writer.line(format!("return {};", text));
                Ok(())
            }
            FunctionBodyIR::Empty => Ok(()),
        }
    }

    pub(crate) fn function_declaration(&mut self, function: &FunctionDecl, export: &str) -> Result<(), CodeGenError> {
        let params = self.parameters(&function.parameters)?;
        let header = format!(
            "{}{} {}({})",
            export,
            function_keyword(function.is_async, function.is_generator),
            function.name,
            params
        );
        self.braced(&header, |e| e.function_body(&function.body))
    }

    /// Local functions become arrow-function constants so `this` stays
    /// lexical; generators keep the `function*` form.
    pub(crate) fn local_function(&mut self, function: &FunctionDecl) -> Result<(), CodeGenError> {
        if function.is_generator {
            return self.function_declaration(function, "");
        }
        let params = self.parameters(&function.parameters)?;
        let header = format!(
            "const {} = {}({}) =>",
            function.name,
            if function.is_async { "async " } else { "" },
            params
        );
        self.braced_with(&header, "};", |e| e.function_body(&function.body))
    }

    /// Class method, getter, setter or operator. Abstract members (no body)
    /// emit nothing.
    pub(crate) fn method(&mut self, method: &MethodDecl, is_static: bool) -> Result<(), CodeGenError> {
        if matches!(method.body, FunctionBodyIR::Empty) {
            return Ok(());
        }
        let explicit = self.config.accessors == AccessorPolicy::Explicit;
        let name = match method.kind {
            MethodKind::Method => method.name.clone(),
            MethodKind::Getter if explicit => format!("get{}", capitalize(&method.name)),
            MethodKind::Getter => format!("get {}", method.name),
            MethodKind::Setter if explicit => format!("set{}", capitalize(&method.name)),
            MethodKind::Setter => format!("set {}", method.name),
            MethodKind::Operator if method.name == "==" => "equals".to_string(),
            MethodKind::Operator => {
                return Err(self.error(
                    diagnostics::CODEGEN_UNSUPPORTED,
                    method.id,
                    "Operator",
                    &method.location,
                    format!("operator `{}` has no JS counterpart", method.name),
                    format!("Replace `operator {}` with a named method and call it explicitly.", method.name),
                ))
            }
        };
        let params = self.parameters(&method.parameters)?;
        let header = format!(
            "{}{}{}({})",
            if is_static { "static " } else { "" },
            method_modifiers(method.is_async, method.is_generator),
            name,
            params
        );
        self.braced(&header, |e| e.function_body(&method.body))
    }
}
