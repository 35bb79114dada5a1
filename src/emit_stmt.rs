//! Statement emitter

use crate::codegen::{CodeGenError, Emitter};
use crate::diagnostics;
use crate::emit_expr::type_check;
use crate::ir::*;

fn loop_keyword(mutability: Mutability) -> &'static str {
    match mutability {
        Mutability::Mutable => "let",
        Mutability::Final | Mutability::Const => "const",
    }
}

impl Emitter<'_> {
    pub(crate) fn statements(&mut self, statements: &[StatementIR]) -> Result<(), CodeGenError> {
        for statement in statements {
            self.statement(statement)?;
        }
        Ok(())
    }

    /// Body of a branch or loop, written inside braces the caller opened.
    fn branch(&mut self, body: &StatementIR) -> Result<(), CodeGenError> {
        match &body.kind {
            StatementKind::Block { statements } => self.statements(statements),
            _ => self.statement(body),
        }
    }

    /// `final`/`const` become `const` only when every declarator is
    /// initialized.
    pub(crate) fn variable(&mut self, variable: &VariableDeclIR) -> Result<String, CodeGenError> {
        let initialized = variable.declarators.iter().all(|d| d.initializer.is_some());
        let keyword = match variable.mutability {
            Mutability::Final | Mutability::Const if initialized => "const",
            _ => "let",
        };
        let mut parts = Vec::with_capacity(variable.declarators.len());
        for declarator in &variable.declarators {
            match &declarator.initializer {
                Some(init) => parts.push(format!("{} = {}", declarator.name, self.expr(init)?)),
                None => parts.push(declarator.name.clone()),
            }
        }
        Ok(format!("{} {}", keyword, parts.join(", ")))
    }

    fn for_init(&mut self, init: &StatementIR) -> Result<String, CodeGenError> {
        match &init.kind {
            StatementKind::Variable(variable) => self.variable(variable),
            StatementKind::Expression { expr } => self.expr(expr),
            StatementKind::Empty => Ok(String::new()),
            _ => Err(self.error(
                diagnostics::CODEGEN_UNSUPPORTED,
                init.id,
                "ForInit",
                &init.location,
                "for-loop initializer must be a declaration or expression",
                "Move the statement before the loop.",
            )),
        }
    }

    pub(crate) fn statement(&mut self, stmt: &StatementIR) -> Result<(), CodeGenError> {
        match &stmt.kind {
            StatementKind::Block { statements } => self.braced("", |e| e.statements(statements)),
            StatementKind::Expression { expr } => match &expr.kind {
                ExpressionKind::Cascade {
                    target,
                    sections,
                    is_null_aware,
                } => self.cascade_statement(target, sections, *is_null_aware),
                ExpressionKind::Throw { value } => {
                    let value = self.expr(value)?;
                    self.writer.line(format!("throw {};", value));
                    Ok(())
                }
                _ => {
                    let text = self.expr(expr)?;
                    self.writer.line(format!("{};", text));
                    Ok(())
                }
            },
            StatementKind::Variable(variable) => {
                let text = self.variable(variable)?;
                self.writer.line(format!("{};", text));
                Ok(())
            }
            StatementKind::Function(function) => self.local_function(function),
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.if_chain(condition, then_branch, else_branch.as_deref()),
            StatementKind::For {
                init,
                condition,
                updates,
                body,
            } => {
                let init = match init {
                    Some(init) => self.for_init(init)?,
                    None => String::new(),
                };
                let condition = match condition {
                    Some(c) => self.expr(c)?,
                    None => String::new(),
                };
                let mut update_parts = Vec::with_capacity(updates.len());
                for update in updates {
                    update_parts.push(self.expr(update)?);
                }
                let header = format!("for ({}; {}; {})", init, condition, update_parts.join(", "));
                self.braced(&header, |e| e.branch(body))
            }
            StatementKind::ForIn {
                variable,
                mutability,
                iterable,
                body,
                is_await,
            } => {
                let iterable = self.expr(iterable)?;
                let header = format!(
                    "for{} ({} {} of {})",
                    if *is_await { " await" } else { "" },
                    loop_keyword(*mutability),
                    variable,
                    iterable
                );
                self.braced(&header, |e| e.branch(body))
            }
            StatementKind::While { condition, body } => {
                let header = format!("while ({})", self.expr(condition)?);
                self.braced(&header, |e| e.branch(body))
            }
            StatementKind::DoWhile { body, condition } => {
                let condition = self.expr(condition)?;
                let closer = format!("}} while ({});", condition);
                self.braced_with("do", &closer, |e| e.branch(body))
            }
            StatementKind::Switch { subject, cases } => {
                let header = format!("switch ({})", self.expr(subject)?);
                self.braced(&header, |e| {
                    for case in cases {
                        e.switch_case(case)?;
                    }
                    Ok(())
                })
            }
            StatementKind::Return { value } => {
                match value {
                    Some(value) => {
                        let text = self.expr(value)?;
                        self.writer.line(format!("return {};", text));
                    }
                    None => self.writer.line("return;"),
                }
                Ok(())
            }
            StatementKind::Break { label } => {
                match label {
                    Some(label) => self.writer.line(format!("break {};", label)),
                    None => self.writer.line("break;"),
                }
                Ok(())
            }
            StatementKind::Continue { label } => {
                match label {
                    Some(label) => self.writer.line(format!("continue {};", label)),
                    None => self.writer.line("continue;"),
                }
                Ok(())
            }
            StatementKind::Yield { value, is_star } => {
                let text = self.expr(value)?;
                let keyword = if *is_star { "yield*" } else { "yield" };
                self.writer.line(format!("{} {};", keyword, text));
                Ok(())
            }
            StatementKind::Try {
                body,
                catches,
                finally,
            } => self.try_statement(body, catches, finally.as_deref()),
            StatementKind::Assert { condition, message } => {
                let condition = self.expr(condition)?;
                match message {
                    Some(message) => {
                        let message = self.expr(message)?;
                        self.writer
                            .line(format!("console.assert({}, {});", condition, message));
                    }
                    None => self.writer.line(format!("console.assert({});", condition)),
                }
                Ok(())
            }
            StatementKind::Rethrow => match self.catch_variables.last() {
                Some(variable) => {
                    let line = format!("throw {};", variable);
                    self.writer.line(line);
                    Ok(())
                }
                None => Err(self.error(
                    diagnostics::CODEGEN_MALFORMED,
                    stmt.id,
                    "Rethrow",
                    &stmt.location,
                    "`rethrow` outside a catch clause",
                    "Use `rethrow` only inside `catch`.",
                )),
            },
            StatementKind::Empty => {
                self.writer.line(";");
                Ok(())
            }
        }
    }

    fn if_chain(
        &mut self,
        condition: &ExpressionIR,
        then_branch: &StatementIR,
        else_branch: Option<&StatementIR>,
    ) -> Result<(), CodeGenError> {
        let condition = self.expr(condition)?;
        self.writer.line(format!("if ({}) {{", condition));
        self.writer.indent();
        let result = self.branch(then_branch);
        self.writer.dedent();
        result?;

        let mut next = else_branch;
        while let Some(branch) = next {
            match &branch.kind {
                StatementKind::If {
                    condition,
                    then_branch,
                    else_branch,
                } => {
                    let condition = self.expr(condition)?;
                    self.writer.line(format!("}} else if ({}) {{", condition));
                    self.writer.indent();
                    let result = self.branch(then_branch);
                    self.writer.dedent();
                    result?;
                    next = else_branch.as_deref();
                }
                _ => {
                    self.writer.line("} else {");
                    self.writer.indent();
                    let result = self.branch(branch);
                    self.writer.dedent();
                    result?;
                    next = None;
                }
            }
        }
        self.writer.line("}");
        Ok(())
    }

    /// Case bodies get their own block and an implicit `break` unless they
    /// end in a jump. Empty bodies fall through to the next label.
    fn switch_case(&mut self, case: &SwitchCaseIR) -> Result<(), CodeGenError> {
        let mut labels = Vec::with_capacity(case.patterns.len() + 1);
        for pattern in &case.patterns {
            labels.push(format!("case {}:", self.expr(pattern)?));
        }
        if case.is_default {
            labels.push("default:".to_string());
        }
        if case.body.is_empty() {
            for label in labels {
                self.writer.line(label);
            }
            return Ok(());
        }
        let last = labels.pop().unwrap_or_else(|| "default:".to_string());
        for label in labels {
            self.writer.line(label);
        }
        self.braced(&last, |e| {
            e.statements(&case.body)?;
            if !case.body.last().map_or(false, StatementIR::is_jump) {
                e.writer.line("break;");
            }
            Ok(())
        })
    }

    /// `on T catch` clauses become one `catch` with `instanceof` dispatch;
    /// an unmatched exception is rethrown.
    fn try_statement(
        &mut self,
        body: &[StatementIR],
        catches: &[CatchIR],
        finally: Option<&[StatementIR]>,
    ) -> Result<(), CodeGenError> {
        self.writer.line("try {");
        self.writer.indent();
        let result = self.statements(body);
        self.writer.dedent();
        result?;

        if !catches.is_empty() {
            let single_catch_all = catches.len() == 1 && catches[0].exception_type.is_none();
            let variable = match (&catches[0].exception, single_catch_all) {
                (Some(name), true) => name.clone(),
                _ => self.temp("e"),
            };
            self.writer.line(format!("}} catch ({}) {{", variable));
            self.writer.indent();
            self.catch_variables.push(variable.clone());
            let result = if single_catch_all {
                self.catch_body(&catches[0], &variable)
            } else {
                self.catch_dispatch(catches, &variable)
            };
            self.catch_variables.pop();
            self.writer.dedent();
            result?;
        }

        if let Some(finally) = finally {
            self.writer.line("} finally {");
            self.writer.indent();
            let result = self.statements(finally);
            self.writer.dedent();
            result?;
        }
        self.writer.line("}");
        Ok(())
    }

    fn catch_dispatch(&mut self, catches: &[CatchIR], variable: &str) -> Result<(), CodeGenError> {
        let mut opened = false;
        for catch in catches {
            match &catch.exception_type {
                Some(ty) => {
                    let check = type_check(ty, variable);
                    if opened {
                        self.writer.line(format!("}} else if ({}) {{", check));
                    } else {
                        self.writer.line(format!("if ({}) {{", check));
                        opened = true;
                    }
                    self.writer.indent();
                    let result = self.catch_body(catch, variable);
                    self.writer.dedent();
                    result?;
                }
                None if !opened => return self.catch_body(catch, variable),
                None => {
                    self.writer.line("} else {");
                    self.writer.indent();
                    let result = self.catch_body(catch, variable);
                    self.writer.dedent();
                    result?;
                    self.writer.line("}");
                    return Ok(());
                }
            }
        }
        self.writer.line("} else {");
        self.writer.indent();
        self.writer.line(format!("throw {};", variable));
        self.writer.dedent();
        self.writer.line("}");
        Ok(())
    }

    fn catch_body(&mut self, catch: &CatchIR, variable: &str) -> Result<(), CodeGenError> {
        if let Some(name) = &catch.exception {
            if name != variable {
                self.writer.line(format!("const {} = {};", name, variable));
            }
        }
        if let Some(stack) = &catch.stack_trace {
            self.writer
                .line(format!("const {0} = {1} == null ? null : {1}.stack;", stack, variable));
        }
        self.statements(&catch.body)
    }

    /// A cascade in statement position caches its target in a `const`.
    fn cascade_statement(
        &mut self,
        target: &ExpressionIR,
        sections: &[ExpressionIR],
        is_null_aware: bool,
    ) -> Result<(), CodeGenError> {
        let target = self.expr(target)?;
        let receiver = self.temp("c");
        self.writer.line(format!("const {} = {};", receiver, target));
        let sections = self.cascade_sections(&receiver, sections)?;
        if is_null_aware {
            let header = format!("if ({} != null)", receiver);
            return self.braced(&header, |e| {
                for section in &sections {
                    e.writer.line(format!("{};", section));
                }
                Ok(())
            });
        }
        for section in sections {
            self.writer.line(format!("{};", section));
        }
        Ok(())
    }
}
