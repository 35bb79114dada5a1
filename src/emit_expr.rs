//! Expression emitter
//!
//! Table-driven lowering of `ExpressionIR` to JS expressions. Operands are
//! parenthesized whenever they are compound, so emitted precedence never
//! depends on JS operator rules.

use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::ast::{AssignOp, BinaryOp, UnaryOp};
use crate::codegen::{js_string, AccessorPolicy, CodeGenError, Emitter};
use crate::emit_function::capitalize;
use crate::diagnostics;
use crate::ir::*;

lazy_static! {
    /// Functions with a direct JS counterpart.
    static ref BUILTIN_FUNCTIONS: HashMap<&'static str, &'static str> =
        [("print", "console.log"), ("identical", "Object.is")].into_iter().collect();

    /// Runtime checks for core types; `{}` stands for the tested value.
    static ref TYPE_CHECKS: HashMap<&'static str, &'static str> = [
        ("int", "Number.isInteger({})"),
        ("double", "typeof {} === \"number\""),
        ("num", "typeof {} === \"number\""),
        ("String", "typeof {} === \"string\""),
        ("bool", "typeof {} === \"boolean\""),
        ("List", "Array.isArray({})"),
        ("Map", "{} instanceof Map"),
        ("Set", "{} instanceof Set"),
        ("Function", "typeof {} === \"function\""),
        ("Object", "{} != null"),
        ("Null", "{} == null"),
        ("dynamic", "true"),
    ]
    .into_iter()
    .collect();
}

fn binary_symbol(op: BinaryOp, null_comparison: bool) -> &'static str {
    match op {
        BinaryOp::Eq if null_comparison => "==",
        BinaryOp::NotEq if null_comparison => "!=",
        BinaryOp::Eq => "===",
        BinaryOp::NotEq => "!==",
        other => other.symbol(),
    }
}

/// Runtime check that `value` holds an instance of `ty`.
pub(crate) fn type_check(ty: &TypeIR, value: &str) -> String {
    if ty.is_dynamic() || (ty.nullable && ty.name == "Object") {
        return "true".to_string();
    }
    let check = match TYPE_CHECKS.get(ty.name.as_str()) {
        Some(template) => template.replace("{}", value),
        None => format!("{} instanceof {}", value, ty.name),
    };
    if ty.nullable && ty.name != "Null" {
        format!("({} == null || {})", value, check)
    } else {
        check
    }
}

/// Expressions that can be evaluated twice without observable effects.
pub(crate) fn is_simple(expr: &ExpressionIR) -> bool {
    match &expr.kind {
        ExpressionKind::Identifier { .. } | ExpressionKind::Literal { .. } | ExpressionKind::CascadeReceiver => true,
        ExpressionKind::PropertyAccess {
            target,
            is_null_aware: false,
            ..
        } => is_simple(target),
        _ => false,
    }
}

fn needs_parens(expr: &ExpressionIR) -> bool {
    matches!(
        expr.kind,
        ExpressionKind::Binary { .. }
            | ExpressionKind::Unary { .. }
            | ExpressionKind::Assignment { .. }
            | ExpressionKind::Lambda { .. }
            | ExpressionKind::Await { .. }
            | ExpressionKind::Cast { .. }
            | ExpressionKind::TypeCheck { .. }
    )
}

fn template_text(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
        .replace('\r', "\\r")
}

fn double_literal(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        format!("{:?}", value)
    }
}

impl Emitter<'_> {
    pub(crate) fn expr(&mut self, expr: &ExpressionIR) -> Result<String, CodeGenError> {
        match &expr.kind {
            ExpressionKind::Literal { value } => Ok(match value {
                LiteralValue::String(s) => js_string(s),
                LiteralValue::Integer(i) => i.to_string(),
                LiteralValue::Double(d) => double_literal(*d),
                LiteralValue::Boolean(b) => b.to_string(),
                LiteralValue::Null => "null".to_string(),
            }),
            ExpressionKind::Identifier { name, .. } => Ok(name.clone()),
            ExpressionKind::Binary { left, op, right } => {
                let l = self.operand(left)?;
                let r = self.operand(right)?;
                if *op == BinaryOp::IntDiv {
                    return Ok(format!("Math.trunc({} / {})", l, r));
                }
                let null_comparison = left.is_null_literal() || right.is_null_literal();
                Ok(format!("{} {} {}", l, binary_symbol(*op, null_comparison), r))
            }
            ExpressionKind::Unary { op, operand, is_prefix } => {
                if matches!(op, UnaryOp::Increment | UnaryOp::Decrement) && self.is_explicit_accessor(operand) {
                    return Err(self.error(
                        diagnostics::CODEGEN_UNSUPPORTED,
                        expr.id,
                        expr.kind_name(),
                        &expr.location,
                        "increment through an explicit accessor",
                        "Write `x += 1` so the update becomes a getter and setter call.",
                    ));
                }
                let inner = self.operand(operand)?;
                if *is_prefix {
                    Ok(format!("{}{}", op.symbol(), inner))
                } else {
                    Ok(format!("{}{}", inner, op.symbol()))
                }
            }
            ExpressionKind::MethodCall {
                target,
                name,
                arguments,
                is_null_aware,
                ..
            } => {
                let args = self.arguments(arguments)?;
                match target {
                    None => {
                        let callee = BUILTIN_FUNCTIONS.get(name.as_str()).copied().unwrap_or(name.as_str());
                        Ok(format!("{}({})", callee, args))
                    }
                    Some(target) if *is_null_aware => {
                        self.guarded(target, |receiver| format!("{}.{}({})", receiver, name, args))
                    }
                    Some(target) => Ok(format!("{}.{}({})", self.receiver(target)?, name, args)),
                }
            }
            ExpressionKind::Invoke { callee, arguments } => {
                let callee = self.receiver(callee)?;
                let args = self.arguments(arguments)?;
                Ok(format!("{}({})", callee, args))
            }
            ExpressionKind::InstanceCreation {
                class_type,
                constructor,
                arguments,
                ..
            } => {
                let args = self.arguments(arguments)?;
                Ok(match constructor {
                    Some(constructor) => format!("{}.{}({})", class_type.name, constructor, args),
                    None => format!("new {}({})", class_type.name, args),
                })
            }
            ExpressionKind::PropertyAccess {
                target,
                name,
                is_null_aware,
                is_accessor,
            } => {
                let member = if *is_accessor && self.explicit_accessors() {
                    format!("get{}()", capitalize(name))
                } else {
                    name.clone()
                };
                if *is_null_aware {
                    self.guarded(target, |receiver| format!("{}.{}", receiver, member))
                } else {
                    Ok(format!("{}.{}", self.receiver(target)?, member))
                }
            }
            ExpressionKind::IndexAccess {
                target,
                index,
                is_null_aware,
            } => {
                let index = self.expr(index)?;
                let is_map = target.result_type.name == "Map";
                let access = move |receiver: &str| {
                    if is_map {
                        format!("{}.get({})", receiver, index)
                    } else {
                        format!("{}[{}]", receiver, index)
                    }
                };
                if *is_null_aware {
                    self.guarded(target, access)
                } else {
                    let receiver = self.receiver(target)?;
                    Ok(access(&receiver))
                }
            }
            ExpressionKind::Conditional {
                condition,
                then_expr,
                else_expr,
            } => Ok(format!(
                "({} ? {} : {})",
                self.operand(condition)?,
                self.operand(then_expr)?,
                self.operand(else_expr)?
            )),
            ExpressionKind::Lambda {
                parameters,
                body,
                is_async,
                is_generator,
                ..
            } => self.lambda(parameters, body, *is_async, *is_generator),
            ExpressionKind::ListLiteral { elements, is_const, .. } => {
                let items = self.collection_items(elements)?;
                Ok(freeze(format!("[{}]", items.join(", ")), *is_const))
            }
            ExpressionKind::SetLiteral { elements, is_const, .. } => {
                let items = self.collection_items(elements)?;
                let set = if items.is_empty() {
                    "new Set()".to_string()
                } else {
                    format!("new Set([{}])", items.join(", "))
                };
                Ok(freeze(set, *is_const))
            }
            ExpressionKind::MapLiteral { entries, is_const, .. } => {
                let items = self.collection_items(entries)?;
                let map = if items.is_empty() {
                    "new Map()".to_string()
                } else {
                    format!("new Map([{}])", items.join(", "))
                };
                Ok(freeze(map, *is_const))
            }
            ExpressionKind::Await { operand } => Ok(format!("await {}", self.operand(operand)?)),
            ExpressionKind::Cast { expr: inner, target_type } => self.cast(inner, target_type),
            ExpressionKind::TypeCheck {
                expr: inner,
                tested_type,
                negated,
            } => {
                let check = self.checked(inner, |value| type_check(tested_type, value))?;
                Ok(if *negated { format!("!({})", check) } else { check })
            }
            ExpressionKind::InterpolatedString { parts } => {
                let mut out = String::from("`");
                for part in parts {
                    match part {
                        StringPartIR::Text { value } => out.push_str(&template_text(value)),
                        StringPartIR::Expression { expr } => {
                            out.push_str("${");
                            out.push_str(&self.expr(expr)?);
                            out.push('}');
                        }
                    }
                }
                out.push('`');
                Ok(out)
            }
            ExpressionKind::Assignment {
                target,
                value,
                operator,
            } => self.assignment(expr, target, value, *operator),
            ExpressionKind::Cascade {
                target,
                sections,
                is_null_aware,
            } => {
                let target = self.expr(target)?;
                let receiver = self.temp("c");
                let sections = self.cascade_sections(&receiver, sections)?;
                let guard = if *is_null_aware {
                    format!("if ({0} == null) return {0}; ", receiver)
                } else {
                    String::new()
                };
                Ok(format!(
                    "(({0}) => {{ {1}{2}; return {0}; }})({3})",
                    receiver,
                    guard,
                    sections.join("; "),
                    target
                ))
            }
            ExpressionKind::CascadeReceiver => match self.cascade_receivers.last() {
                Some(receiver) => Ok(receiver.clone()),
                None => Err(self.error(
                    diagnostics::CODEGEN_MALFORMED,
                    expr.id,
                    expr.kind_name(),
                    &expr.location,
                    "cascade section used outside a cascade",
                    "Rebuild the IR from source; cascade sections must be rooted in a cascade.",
                )),
            },
            ExpressionKind::Throw { value } => Ok(format!("(() => {{ throw {}; }})()", self.expr(value)?)),
            // Null assertions are erased.
            ExpressionKind::NullAssert { operand } => self.expr(operand),
            ExpressionKind::Invalid { reason } => Err(self.error(
                diagnostics::CODEGEN_MALFORMED,
                expr.id,
                expr.kind_name(),
                &expr.location,
                reason.clone(),
                "Fix the syntax error reported for this location.",
            )),
        }
    }

    /// Operand of an operator; compound expressions are parenthesized.
    pub(crate) fn operand(&mut self, expr: &ExpressionIR) -> Result<String, CodeGenError> {
        let text = self.expr(expr)?;
        Ok(if needs_parens(expr) { format!("({})", text) } else { text })
    }

    fn explicit_accessors(&self) -> bool {
        self.config.accessors == AccessorPolicy::Explicit
    }

    /// `expr` reads a getter/setter that is emitted as `getX()`/`setX(v)`.
    fn is_explicit_accessor(&self, expr: &ExpressionIR) -> bool {
        self.explicit_accessors()
            && matches!(expr.kind, ExpressionKind::PropertyAccess { is_accessor: true, .. })
    }

    /// Receiver of a member access.
    fn receiver(&mut self, expr: &ExpressionIR) -> Result<String, CodeGenError> {
        let text = self.expr(expr)?;
        let bare_number = matches!(
            expr.kind,
            ExpressionKind::Literal {
                value: LiteralValue::Integer(_) | LiteralValue::Double(_)
            }
        );
        let wrap = needs_parens(expr)
            || bare_number
            || matches!(expr.kind, ExpressionKind::Lambda { .. } | ExpressionKind::Cascade { .. });
        Ok(if wrap { format!("({})", text) } else { text })
    }

    /// `(t == null ? null : access(t))`, through a temporary when `target`
    /// is not simple.
    fn guarded<F>(&mut self, target: &ExpressionIR, access: F) -> Result<String, CodeGenError>
    where
        F: FnOnce(&str) -> String,
    {
        let receiver = self.receiver(target)?;
        if is_simple(target) {
            return Ok(format!("({0} == null ? null : {1})", receiver, access(&receiver)));
        }
        let temp = self.temp("t");
        Ok(format!(
            "(({0}) => {0} == null ? null : {1})({2})",
            temp,
            access(&temp),
            receiver
        ))
    }

    /// Applies `check` to `value`, through a temporary when `value` is not
    /// simple.
    fn checked<F>(&mut self, value: &ExpressionIR, check: F) -> Result<String, CodeGenError>
    where
        F: FnOnce(&str) -> String,
    {
        let text = self.receiver(value)?;
        if is_simple(value) {
            return Ok(check(&text));
        }
        let temp = self.temp("t");
        Ok(format!("(({0}) => {1})({2})", temp, check(&temp), text))
    }

    fn cast(&mut self, value: &ExpressionIR, target_type: &TypeIR) -> Result<String, CodeGenError> {
        if target_type.is_dynamic() || (target_type.nullable && target_type.name == "Object") {
            return self.expr(value);
        }
        let message = js_string(&format!("value is not a {}", target_type));
        self.checked(value, |v| {
            format!(
                "({} ? {} : (() => {{ throw new TypeError({}); }})())",
                type_check(target_type, v),
                v,
                message
            )
        })
    }

    pub(crate) fn arguments(&mut self, arguments: &ArgumentsIR) -> Result<String, CodeGenError> {
        let mut parts = Vec::with_capacity(arguments.positional.len() + 1);
        for argument in &arguments.positional {
            parts.push(self.expr(argument)?);
        }
        if !arguments.named.is_empty() {
            let mut named = Vec::with_capacity(arguments.named.len());
            for (name, value) in &arguments.named {
                named.push(format!("{}: {}", name, self.expr(value)?));
            }
            parts.push(format!("{{ {} }}", named.join(", ")));
        }
        Ok(parts.join(", "))
    }

    fn collection_items(&mut self, elements: &[CollectionElementIR]) -> Result<Vec<String>, CodeGenError> {
        elements.iter().map(|e| self.collection_item(e)).collect()
    }

    fn collection_item(&mut self, element: &CollectionElementIR) -> Result<String, CodeGenError> {
        match element {
            CollectionElementIR::Expression { value } => self.expr(value),
            CollectionElementIR::Entry(entry) => {
                Ok(format!("[{}, {}]", self.expr(&entry.key)?, self.expr(&entry.value)?))
            }
            CollectionElementIR::Spread { value, is_null_aware } => {
                let inner = self.operand(value)?;
                Ok(if *is_null_aware {
                    format!("...({} ?? [])", inner)
                } else {
                    format!("...{}", inner)
                })
            }
            CollectionElementIR::If {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.operand(condition)?;
                let then = self.collection_item(then)?;
                let otherwise = match otherwise {
                    Some(o) => self.collection_item(o)?,
                    None => String::new(),
                };
                Ok(format!("...({} ? [{}] : [{}])", condition, then, otherwise))
            }
        }
    }

    fn lambda(
        &mut self,
        parameters: &[ParameterIR],
        body: &FunctionBodyIR,
        is_async: bool,
        is_generator: bool,
    ) -> Result<String, CodeGenError> {
        let params = self.parameters(parameters)?;
        if is_generator {
            let keyword = if is_async { "async function*" } else { "function*" };
            let block = self.capture_block(|e| e.function_body(body))?;
            return Ok(format!("({} ({}) {}).bind(this)", keyword, params, block));
        }
        let prefix = if is_async { "async " } else { "" };
        match body {
            FunctionBodyIR::Expression { expr } => {
                let text = self.expr(expr)?;
                Ok(format!("{}({}) => {}", prefix, params, text))
            }
            FunctionBodyIR::Block { statements } => {
                let block = self.capture_block(|e| e.statements(statements))?;
                Ok(format!("{}({}) => {}", prefix, params, block))
            }
            FunctionBodyIR::Empty => Ok(format!("{}({}) => {{}}", prefix, params)),
        }
    }

    pub(crate) fn cascade_sections(
        &mut self,
        receiver: &str,
        sections: &[ExpressionIR],
    ) -> Result<Vec<String>, CodeGenError> {
        self.cascade_receivers.push(receiver.to_string());
        let result = sections.iter().map(|s| self.expr(s)).collect();
        self.cascade_receivers.pop();
        result
    }

    fn assignment(
        &mut self,
        whole: &ExpressionIR,
        target: &ExpressionIR,
        value: &ExpressionIR,
        operator: AssignOp,
    ) -> Result<String, CodeGenError> {
        let value_text = self.expr(value)?;

        // Map index: `m[k] op= v` becomes `m.set(k, ...)`.
        if let ExpressionKind::IndexAccess {
            target: map,
            index,
            is_null_aware: false,
        } = &target.kind
        {
            if map.result_type.name == "Map" {
                let receiver = self.receiver(map)?;
                let key = self.expr(index)?;
                let current = format!("{}.get({})", receiver, key);
                let stored = combine(&current, operator, &value_text);
                return Ok(format!("{}.set({}, {})", receiver, key, stored));
            }
        }

        // Explicit accessor: `o.x op= v` becomes `o.setX(...)`.
        if let ExpressionKind::PropertyAccess {
            target: object,
            name,
            is_null_aware: false,
            ..
        } = &target.kind
        {
            if self.is_explicit_accessor(target) {
                if operator != AssignOp::Assign && !is_simple(object) {
                    return Err(self.error(
                        diagnostics::CODEGEN_UNSUPPORTED,
                        whole.id,
                        whole.kind_name(),
                        &whole.location,
                        "compound assignment through an accessor on a computed receiver",
                        "Store the receiver in a local variable before updating the accessor.",
                    ));
                }
                let receiver = self.receiver(object)?;
                let current = format!("{}.get{}()", receiver, capitalize(name));
                let stored = combine(&current, operator, &value_text);
                return Ok(format!("{}.set{}({})", receiver, capitalize(name), stored));
            }
        }

        let lhs = match &target.kind {
            ExpressionKind::PropertyAccess {
                target: object,
                name,
                is_null_aware: true,
                ..
            } => {
                if !is_simple(object) {
                    return Err(self.error(
                        diagnostics::CODEGEN_UNSUPPORTED,
                        whole.id,
                        whole.kind_name(),
                        &whole.location,
                        "null-aware assignment through a computed receiver",
                        "Store the receiver in a local variable before assigning through `?.`.",
                    ));
                }
                let receiver = self.receiver(object)?;
                let update = if self.is_explicit_accessor(target) {
                    let current = format!("{}.get{}()", receiver, capitalize(name));
                    let stored = combine(&current, operator, &value_text);
                    format!("{}.set{}({})", receiver, capitalize(name), stored)
                } else {
                    assign(&format!("{}.{}", receiver, name), operator, &value_text)
                };
                return Ok(format!("({} == null ? null : {})", receiver, update));
            }
            ExpressionKind::Identifier { .. }
            | ExpressionKind::PropertyAccess { .. }
            | ExpressionKind::IndexAccess { .. } => self.expr(target)?,
            _ => {
                return Err(self.error(
                    diagnostics::CODEGEN_MALFORMED,
                    whole.id,
                    whole.kind_name(),
                    &whole.location,
                    format!("cannot assign to {}", target.kind_name()),
                    "Assign to a variable, property or index.",
                ))
            }
        };
        Ok(assign(&lhs, operator, &value_text))
    }
}

fn freeze(text: String, is_const: bool) -> String {
    if is_const {
        format!("Object.freeze({})", text)
    } else {
        text
    }
}

/// `current op value`, for compound assignment through an accessor.
fn combine(current: &str, operator: AssignOp, value: &str) -> String {
    match operator {
        AssignOp::Assign => value.to_string(),
        AssignOp::Compound(BinaryOp::IntDiv) => format!("Math.trunc({} / ({}))", current, value),
        AssignOp::Compound(op) => format!("{} {} ({})", current, binary_symbol(op, false), value),
    }
}

fn assign(lhs: &str, operator: AssignOp, value: &str) -> String {
    match operator {
        AssignOp::Assign => format!("{} = {}", lhs, value),
        AssignOp::Compound(BinaryOp::IntDiv) => format!("{0} = Math.trunc({0} / ({1}))", lhs, value),
        AssignOp::Compound(op) => format!("{} {}= {}", lhs, op.symbol(), value),
    }
}
