//! State Analyzer
//!
//! Links every stateful widget to the State class its `createState()` returns
//! and counts `setState` call sites per State class. Link failures are
//! AnalysisErrors recorded in the report; nothing here aborts.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::ast::*;
use crate::diagnostics::{self, Diagnostic, DiagnosticKind, Diagnostics, SourceLocation};
use crate::visitor::{self, AstVisitor};
use crate::widgets::{constructor_call, WidgetAnalysis, WidgetKind};

pub const STATE_FACTORY: &str = "createState";
pub const STATE_TRIGGER: &str = "setState";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateLink {
    pub widget: String,
    pub state_class: String,
    /// The state class is declared in this unit.
    pub declared: bool,
    /// The state class extends `State`.
    pub extends_state: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateAnalysis {
    pub state_links: Vec<StateLink>,
    /// `setState` call sites per State class, sorted by class name.
    pub set_state_call_count: BTreeMap<String, usize>,
    pub errors: Vec<Diagnostic>,
}

impl StateAnalysis {
    pub fn link_for(&self, widget: &str) -> Option<&StateLink> {
        self.state_links.iter().find(|l| l.widget == widget)
    }
}

pub fn link_states(
    unit: &CompilationUnit,
    widgets: &WidgetAnalysis,
    sink: &mut Diagnostics,
) -> StateAnalysis {
    let mut analysis = StateAnalysis::default();
    let classes: Vec<&ClassDeclaration> = unit
        .declarations
        .iter()
        .filter_map(|d| match d {
            Declaration::Class(class) => Some(class),
            _ => None,
        })
        .collect();

    for record in widgets.widgets.iter().filter(|w| w.kind == WidgetKind::Stateful) {
        let Some(class) = classes.iter().find(|c| c.name == record.name) else {
            continue;
        };
        let created = class
            .find_method(STATE_FACTORY)
            .map(created_state_classes)
            .unwrap_or_default();

        if created.len() == 1 {
            let state_class = created.into_iter().next().unwrap_or_default();
            let target = widgets.widget(&state_class);
            let link = StateLink {
                widget: record.name.clone(),
                declared: target.is_some(),
                extends_state: target.map_or(false, |w| w.kind == WidgetKind::State),
                state_class,
                location: record.location.clone(),
            };
            if link.declared && !link.extends_state {
                sink.push(Diagnostic::new(
                    DiagnosticKind::AnalysisWarning,
                    diagnostics::STATE_LINK_NOT_STATE,
                    format!(
                        "`{}.{}` returns `{}`, which does not extend State",
                        link.widget, STATE_FACTORY, link.state_class
                    ),
                    link.location.clone(),
                ));
            }
            analysis.state_links.push(link);
            continue;
        }

        let error = if created.is_empty() {
            Diagnostic::new(
                DiagnosticKind::AnalysisError,
                diagnostics::STATE_UNLINKED,
                format!("stateful widget `{}` has no linked State class", record.name),
                record.location.clone(),
            )
        } else {
            let names: Vec<&str> = created.iter().map(String::as_str).collect();
            Diagnostic::new(
                DiagnosticKind::AnalysisError,
                diagnostics::STATE_AMBIGUOUS_LINK,
                format!(
                    "stateful widget `{}` links to multiple State classes: {}",
                    record.name,
                    names.join(", ")
                ),
                record.location.clone(),
            )
        };
        sink.push(error.clone());
        analysis.errors.push(error);
    }

    for class in &classes {
        let is_state = widgets
            .widget(&class.name)
            .map_or(false, |w| w.kind == WidgetKind::State);
        let mut counter = TriggerCounter { sites: Vec::new() };
        counter.visit_class(class);
        if is_state {
            analysis
                .set_state_call_count
                .insert(class.name.clone(), counter.sites.len());
            continue;
        }
        for location in counter.sites {
            sink.push(Diagnostic::new(
                DiagnosticKind::AnalysisWarning,
                diagnostics::STATE_SET_STATE_OUTSIDE,
                format!("`{}` called outside a State class (in `{}`)", STATE_TRIGGER, class.name),
                location,
            ));
        }
    }

    log::debug!(
        "[State] {}: {} links, {} errors",
        unit.file,
        analysis.state_links.len(),
        analysis.errors.len()
    );
    analysis
}

/// Distinct class names constructed by the `return` expressions (or arrow
/// body) of a `createState` method, looking through `?:` branches.
fn created_state_classes(method: &MethodDeclaration) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    match &method.body.kind {
        BodyKind::Arrow(expr) => collect_created(expr, &mut found),
        BodyKind::Block(block) => {
            let mut returns = ReturnCollector { found: &mut found };
            returns.visit_block(block);
        }
        BodyKind::Empty => {}
    }
    found
}

fn collect_created(expr: &Expr, found: &mut BTreeSet<String>) {
    match &expr.kind {
        ExprKind::Conditional {
            then_expr, else_expr, ..
        } => {
            collect_created(then_expr, found);
            collect_created(else_expr, found);
        }
        _ => {
            if let Some((name, _)) = constructor_call(expr) {
                found.insert(name);
            }
        }
    }
}

struct ReturnCollector<'a> {
    found: &'a mut BTreeSet<String>,
}

impl AstVisitor for ReturnCollector<'_> {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        if let StmtKind::Return(Some(value)) = &stmt.kind {
            collect_created(value, self.found);
            return;
        }
        visitor::walk_stmt(self, stmt);
    }

    // Returns inside nested functions belong to those functions.
    fn visit_function(&mut self, _function: &FunctionDeclaration) {}

    fn visit_expr(&mut self, _expr: &Expr) {}
}

struct TriggerCounter {
    sites: Vec<SourceLocation>,
}

impl AstVisitor for TriggerCounter {
    fn visit_expr(&mut self, expr: &Expr) {
        if let ExprKind::Call { callee, .. } = &expr.kind {
            let is_trigger = match &callee.kind {
                ExprKind::Identifier(name) => name == STATE_TRIGGER,
                ExprKind::PropertyAccess { target, name, .. } => {
                    name == STATE_TRIGGER && matches!(target.kind, ExprKind::This)
                }
                _ => false,
            };
            if is_trigger {
                self.sites.push(expr.location.clone());
            }
        }
        visitor::walk_expr(self, expr);
    }
}
