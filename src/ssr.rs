//! SSR-Safety Analyzer
//!
//! Flags references to browser-only globals inside build-like methods. Only
//! build-like methods are scanned; a member of the enclosing class, a local
//! declaration or a parameter with the same name shadows the global. Guard
//! detection is syntactic.

use lazy_static::lazy_static;
use serde::Serialize;
use std::collections::HashSet;

use crate::ast::*;
use crate::diagnostics::{self, Diagnostic, DiagnosticKind, Diagnostics, Severity, SourceLocation};
use crate::visitor::{self, AstVisitor};
use crate::widgets::is_build_method;

lazy_static! {
    static ref BROWSER_GLOBALS: HashSet<&'static str> = [
        "window",
        "document",
        "localStorage",
        "sessionStorage",
        "navigator",
        "location",
        "history",
        "alert",
        "requestAnimationFrame",
        "indexedDB",
        "globalThis",
    ]
    .into_iter()
    .collect();

    static ref GUARD_FLAGS: HashSet<&'static str> =
        ["kIsWeb", "kIsBrowser", "isBrowser", "isClient"].into_iter().collect();
}

pub fn is_browser_global(name: &str) -> bool {
    BROWSER_GLOBALS.contains(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compatibility {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsafePattern {
    pub global: String,
    pub class_name: String,
    pub method: String,
    pub guarded: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SsrAnalysis {
    pub compatibility: Compatibility,
    pub unsafe_patterns: Vec<UnsafePattern>,
}

impl Default for SsrAnalysis {
    fn default() -> Self {
        Self {
            compatibility: Compatibility::High,
            unsafe_patterns: Vec::new(),
        }
    }
}

pub fn analyze_ssr(unit: &CompilationUnit, sink: &mut Diagnostics) -> SsrAnalysis {
    let mut patterns = Vec::new();

    for declaration in &unit.declarations {
        let Declaration::Class(class) = declaration else {
            continue;
        };
        // Bare references to the class's own members resolve to `this.x`.
        let members: HashSet<String> = class
            .fields()
            .flat_map(|f| f.declarators.iter().map(|d| d.name.clone()))
            .chain(class.methods().map(|m| m.name.clone()))
            .collect();
        for method in class.methods().filter(|m| is_build_method(&m.name)) {
            let mut scanner = GlobalScanner {
                scopes: vec![
                    members.clone(),
                    method.parameters.all().map(|p| p.name.clone()).collect(),
                ],
                guard_depth: 0,
                hits: Vec::new(),
            };
            visitor::walk_body(&mut scanner, &method.body);
            for (global, guarded, location) in scanner.hits {
                patterns.push(UnsafePattern {
                    global,
                    class_name: class.name.clone(),
                    method: method.name.clone(),
                    guarded,
                    location,
                });
            }
        }
    }

    let compatibility = if patterns.is_empty() {
        Compatibility::High
    } else if patterns.iter().all(|p| p.guarded) {
        Compatibility::Medium
    } else {
        Compatibility::Low
    };

    for pattern in &patterns {
        let diagnostic = if pattern.guarded {
            Diagnostic::new(
                DiagnosticKind::AnalysisWarning,
                diagnostics::SSR_GUARDED_GLOBAL,
                format!(
                    "guarded use of browser global `{}` in `{}.{}`",
                    pattern.global, pattern.class_name, pattern.method
                ),
                pattern.location.clone(),
            )
            .with_severity(Severity::Info)
        } else {
            Diagnostic::new(
                DiagnosticKind::AnalysisWarning,
                diagnostics::SSR_UNSAFE_GLOBAL,
                format!(
                    "browser global `{}` used in `{}.{}` is unavailable during server rendering",
                    pattern.global, pattern.class_name, pattern.method
                ),
                pattern.location.clone(),
            )
        };
        sink.push(diagnostic);
    }

    log::debug!(
        "[SSR] {}: {:?}, {} patterns",
        unit.file,
        compatibility,
        patterns.len()
    );
    SsrAnalysis {
        compatibility,
        unsafe_patterns: patterns,
    }
}

/// Whether `condition` protects its branch: it mentions a platform flag or
/// null-tests a browser global.
fn is_guard(condition: &Expr) -> bool {
    struct Mentions {
        found: bool,
    }
    impl AstVisitor for Mentions {
        fn visit_expr(&mut self, expr: &Expr) {
            match &expr.kind {
                ExprKind::Identifier(name) if GUARD_FLAGS.contains(name.as_str()) => self.found = true,
                ExprKind::Binary {
                    op: BinaryOp::Eq | BinaryOp::NotEq,
                    left,
                    right,
                } => {
                    let global_side = |e: &Expr| e.as_identifier().map_or(false, is_browser_global);
                    let null_side = |e: &Expr| matches!(e.kind, ExprKind::Literal(Literal::Null));
                    if (global_side(left) && null_side(right)) || (null_side(left) && global_side(right)) {
                        self.found = true;
                    }
                }
                _ => {}
            }
            visitor::walk_expr(self, expr);
        }
    }

    let mut mentions = Mentions { found: false };
    mentions.visit_expr(condition);
    mentions.found
}

struct GlobalScanner {
    scopes: Vec<HashSet<String>>,
    guard_depth: usize,
    hits: Vec<(String, bool, SourceLocation)>,
}

impl GlobalScanner {
    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn is_shadowed(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    fn record(&mut self, name: &str, location: &SourceLocation, guarded: bool) {
        if is_browser_global(name) && !self.is_shadowed(name) {
            self.hits
                .push((name.to_string(), guarded || self.guard_depth > 0, location.clone()));
        }
    }

    fn guarded<F: FnOnce(&mut Self)>(&mut self, guard: bool, f: F) {
        if guard {
            self.guard_depth += 1;
        }
        f(self);
        if guard {
            self.guard_depth -= 1;
        }
    }

    fn scoped<F: FnOnce(&mut Self)>(&mut self, names: HashSet<String>, f: F) {
        self.scopes.push(names);
        f(self);
        self.scopes.pop();
    }
}

impl AstVisitor for GlobalScanner {
    fn visit_block(&mut self, block: &Block) {
        self.scoped(HashSet::new(), |s| visitor::walk_block(s, block));
    }

    fn visit_variable(&mut self, variable: &VariableDeclaration) {
        for declarator in &variable.declarators {
            if let Some(initializer) = &declarator.initializer {
                self.visit_expr(initializer);
            }
            self.declare(&declarator.name);
        }
    }

    fn visit_function(&mut self, function: &FunctionDeclaration) {
        self.declare(&function.name);
        let names = function.parameters.all().map(|p| p.name.clone()).collect();
        self.scoped(names, |s| visitor::walk_function(s, function));
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let guard = is_guard(condition);
                self.guarded(guard, |s| {
                    s.visit_expr(condition);
                    s.visit_stmt(then_branch);
                });
                if let Some(else_branch) = else_branch {
                    self.visit_stmt(else_branch);
                }
            }
            StmtKind::ForIn {
                variable,
                iterable,
                body,
                ..
            } => {
                self.visit_expr(iterable);
                let names = [variable.clone()].into_iter().collect();
                self.scoped(names, |s| s.visit_stmt(body));
            }
            StmtKind::For { .. } => self.scoped(HashSet::new(), |s| visitor::walk_stmt(s, stmt)),
            StmtKind::Try {
                body,
                catches,
                finally,
            } => {
                self.visit_block(body);
                for catch in catches {
                    let names = catch
                        .exception
                        .iter()
                        .chain(catch.stack_trace.iter())
                        .cloned()
                        .collect();
                    self.scoped(names, |s| s.visit_block(&catch.body));
                }
                if let Some(finally) = finally {
                    self.visit_block(finally);
                }
            }
            _ => visitor::walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Identifier(name) => self.record(name, &expr.location, false),
            ExprKind::PropertyAccess {
                target,
                null_aware: true,
                ..
            } if target.as_identifier().map_or(false, is_browser_global) => {
                if let Some(name) = target.as_identifier() {
                    self.record(name, &target.location, true);
                }
            }
            ExprKind::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                let guard = is_guard(condition);
                self.guarded(guard, |s| {
                    s.visit_expr(condition);
                    s.visit_expr(then_expr);
                });
                self.visit_expr(else_expr);
            }
            ExprKind::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                let guard = is_guard(left);
                self.guarded(guard, |s| {
                    s.visit_expr(left);
                    s.visit_expr(right);
                });
            }
            ExprKind::Lambda { parameters, body } => {
                let names = parameters.all().map(|p| p.name.clone()).collect();
                self.scoped(names, |s| {
                    visitor::walk_parameters(s, parameters);
                    visitor::walk_body(s, body);
                });
            }
            _ => visitor::walk_expr(self, expr),
        }
    }
}
