//! Context Analyzer
//!
//! Finds provider classes (inherited-widget subclasses) and consumer call
//! sites of the form `X.of(ctx)` / `X.maybeOf(ctx)`, then pairs each consumer
//! with the nearest enclosing provider in the static widget tree. Consumers
//! without a provider above them are reported as warnings.

use lazy_static::lazy_static;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::ast::*;
use crate::diagnostics::{self, Diagnostic, DiagnosticKind, Diagnostics, SourceLocation};
use crate::visitor::{self, AstVisitor};
use crate::widgets::{
    base_name, constructor_call, is_build_method, is_core_type, WidgetAnalysis, WidgetTreeNode,
};

lazy_static! {
    static ref PROVIDER_BASES: HashSet<&'static str> =
        ["InheritedWidget", "InheritedNotifier", "InheritedModel"].into_iter().collect();

    /// Contexts supplied by the framework itself; always above user widgets.
    static ref FRAMEWORK_CONTEXTS: HashSet<&'static str> = [
        "Theme",
        "MediaQuery",
        "Navigator",
        "Scaffold",
        "Localizations",
        "DefaultTextStyle",
        "Directionality",
        "Focus",
        "ScaffoldMessenger",
        "Overlay",
    ]
    .into_iter()
    .collect();
}

const CONSUMER_METHODS: &[&str] = &["of", "maybeOf"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRecord {
    pub name: String,
    pub base: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsumerStatus {
    Resolved,
    Framework,
    Unresolved,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerRecord {
    /// `X` in `X.of(ctx)`.
    pub context: String,
    pub method: String,
    pub enclosing_class: Option<String>,
    pub provider: Option<String>,
    pub status: ConsumerStatus,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextAnalysis {
    pub providers: Vec<ProviderRecord>,
    pub consumers: Vec<ConsumerRecord>,
    pub unresolved_accesses: Vec<ConsumerRecord>,
}

pub fn analyze_context(
    unit: &CompilationUnit,
    widgets: &WidgetAnalysis,
    sink: &mut Diagnostics,
) -> ContextAnalysis {
    let mut analysis = ContextAnalysis::default();

    for declaration in &unit.declarations {
        if let Declaration::Class(class) = declaration {
            if let Some(superclass) = &class.superclass {
                let base = base_name(&superclass.name);
                if PROVIDER_BASES.contains(base) {
                    analysis.providers.push(ProviderRecord {
                        name: class.name.clone(),
                        base: base.to_string(),
                        location: class.location.clone(),
                    });
                }
            }
        }
    }
    let provider_names: HashSet<&str> = analysis.providers.iter().map(|p| p.name.as_str()).collect();
    let parents = composition_parents(&widgets.widget_tree);

    for declaration in &unit.declarations {
        let Declaration::Class(class) = declaration else {
            continue;
        };
        let mut scanner = ConsumerScanner {
            enclosing: Vec::new(),
            sites: Vec::new(),
        };
        for method in class.methods().filter(|m| is_build_method(&m.name)) {
            scanner.visit_method(method);
        }
        // `of` lookups outside build methods (e.g. didChangeDependencies)
        // have no lexical widget ancestors of their own.
        for method in class.methods().filter(|m| !is_build_method(&m.name)) {
            let mut outside = ConsumerScanner {
                enclosing: Vec::new(),
                sites: Vec::new(),
            };
            outside.visit_method(method);
            scanner.sites.extend(outside.sites);
        }

        for site in scanner.sites {
            let mut record = ConsumerRecord {
                context: site.context.clone(),
                method: site.method,
                enclosing_class: Some(class.name.clone()),
                provider: None,
                status: ConsumerStatus::Unresolved,
                location: site.location,
            };
            if FRAMEWORK_CONTEXTS.contains(site.context.as_str()) {
                record.status = ConsumerStatus::Framework;
            } else if provider_names.contains(site.context.as_str()) {
                let above = ancestor_classes(&class.name, &parents);
                let found = site
                    .ancestors
                    .iter()
                    .rev()
                    .chain(above.iter())
                    .find(|name| **name == site.context);
                if let Some(found) = found {
                    record.provider = Some(found.to_string());
                    record.status = ConsumerStatus::Resolved;
                }
            }

            if record.status == ConsumerStatus::Unresolved {
                sink.push(Diagnostic::new(
                    DiagnosticKind::AnalysisWarning,
                    diagnostics::CONTEXT_UNRESOLVED_CONSUMER,
                    format!(
                        "`{}.{}` in `{}` has no enclosing `{}` provider",
                        record.context, record.method, class.name, record.context
                    ),
                    record.location.clone(),
                ));
                analysis.unresolved_accesses.push(record.clone());
            }
            analysis.consumers.push(record);
        }
    }

    log::debug!(
        "[Context] {}: {} providers, {} consumers, {} unresolved",
        unit.file,
        analysis.providers.len(),
        analysis.consumers.len(),
        analysis.unresolved_accesses.len()
    );
    analysis
}

/// For every widget name, the widgets above it where it is constructed:
/// enclosing constructor calls (nearest first), then the owning class.
fn composition_parents(tree: &[WidgetTreeNode]) -> HashMap<String, Vec<String>> {
    fn collect(
        path: &mut Vec<String>,
        node: &WidgetTreeNode,
        parents: &mut HashMap<String, Vec<String>>,
    ) {
        for child in &node.children {
            let entry = parents.entry(child.name.clone()).or_default();
            for above in path.iter().rev() {
                if !entry.contains(above) {
                    entry.push(above.clone());
                }
            }
            path.push(child.name.clone());
            collect(path, child, parents);
            path.pop();
        }
    }

    let mut parents = HashMap::new();
    for root in tree {
        let mut path = vec![root.name.clone()];
        collect(&mut path, root, &mut parents);
    }
    parents
}

/// Classes above `class` in the composition graph, nearest first.
fn ancestor_classes(class: &str, parents: &HashMap<String, Vec<String>>) -> Vec<String> {
    let mut order = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    seen.insert(class);
    queue.push_back(class);
    while let Some(current) = queue.pop_front() {
        for parent in parents.get(current).into_iter().flatten() {
            if seen.insert(parent.as_str()) {
                order.push(parent.clone());
                queue.push_back(parent.as_str());
            }
        }
    }
    order
}

struct ConsumerSite {
    context: String,
    method: String,
    /// Constructor calls lexically enclosing the site, outermost first.
    ancestors: Vec<String>,
    location: SourceLocation,
}

struct ConsumerScanner {
    enclosing: Vec<String>,
    sites: Vec<ConsumerSite>,
}

impl AstVisitor for ConsumerScanner {
    fn visit_expr(&mut self, expr: &Expr) {
        if let ExprKind::Call { callee, .. } = &expr.kind {
            if let ExprKind::PropertyAccess { target, name, .. } = &callee.kind {
                if let Some(context) = target.as_identifier() {
                    // `List.of(xs)` and friends are factory constructors.
                    if CONSUMER_METHODS.contains(&name.as_str()) && !is_core_type(context) {
                        self.sites.push(ConsumerSite {
                            context: context.to_string(),
                            method: name.clone(),
                            ancestors: self.enclosing.clone(),
                            location: expr.location.clone(),
                        });
                    }
                }
            }
        }
        match constructor_call(expr) {
            Some((name, _)) => {
                self.enclosing.push(name);
                visitor::walk_expr(self, expr);
                self.enclosing.pop();
            }
            None => visitor::walk_expr(self, expr),
        }
    }
}
