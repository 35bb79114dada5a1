//! Widget Analyzer
//!
//! Classifies declared classes by their superclass name, extracts their fields
//! and methods, finds the entry point and root widget, and builds a static
//! widget composition tree from `build`-like method bodies.
//!
//! Classification is name matching against a fixed table, not type
//! resolution: a base class reached through an alias or re-export is reported
//! as `other`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

use crate::ast::*;
use crate::diagnostics::{self, Diagnostic, DiagnosticKind, Diagnostics, SourceLocation};
use crate::visitor::{self, AstVisitor};

/// Name of the entry function.
pub const ENTRY_POINT: &str = "main";
/// Name of the application bootstrap call inside the entry function.
pub const BOOTSTRAP_CALL: &str = "runApp";

lazy_static! {
    static ref BUILD_METHOD_RE: Regex = Regex::new(r"^build([A-Z][A-Za-z0-9_$]*)?$").unwrap();
    static ref TYPE_NAME_RE: Regex = Regex::new(r"^_*[A-Z][A-Za-z0-9_$]*$").unwrap();

    static ref COMPONENT_BASES: HashSet<&'static str> = [
        "InheritedWidget",
        "InheritedNotifier",
        "InheritedModel",
        "ChangeNotifier",
        "RenderObjectWidget",
        "LeafRenderObjectWidget",
        "SingleChildRenderObjectWidget",
        "MultiChildRenderObjectWidget",
        "ProxyWidget",
        "ParentDataWidget",
        "Widget",
    ]
    .into_iter()
    .collect();

    /// Types every unit can name without importing them.
    static ref CORE_TYPES: HashSet<&'static str> = [
        "int", "double", "num", "String", "bool", "List", "Map", "Set", "Iterable", "Object",
        "Function", "Null", "Future", "Stream", "FutureOr", "DateTime", "Duration", "Exception",
        "Error", "StackTrace", "Type", "Symbol", "Record", "Never", "Comparable", "Iterator",
        "RegExp", "StringBuffer", "Uri", "BigInt", "MapEntry", "Enum", "Runes",
        "StateError", "ArgumentError", "RangeError", "FormatException", "UnimplementedError",
        "UnsupportedError", "AssertionError", "TypeError",
    ]
    .into_iter()
    .collect();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetKind {
    Stateless,
    Stateful,
    State,
    Component,
    Other,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetRecord {
    pub name: String,
    pub kind: WidgetKind,
    pub superclass: Option<String>,
    pub methods: Vec<String>,
    pub properties: Vec<String>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionRecord {
    pub name: String,
    pub parameters: Vec<String>,
    pub is_async: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    pub uri: String,
    pub prefix: Option<String>,
    pub show: Vec<String>,
    pub hide: Vec<String>,
    pub location: SourceLocation,
}

/// A constructor call found in a build-like body. Top-level nodes are the
/// declaring widget classes themselves.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetTreeNode {
    pub name: String,
    pub constructor: Option<String>,
    pub location: SourceLocation,
    pub children: Vec<WidgetTreeNode>,
}

impl WidgetTreeNode {
    /// Whether `name` occurs anywhere below this node.
    pub fn contains(&self, name: &str) -> bool {
        self.children
            .iter()
            .any(|child| child.name == name || child.contains(name))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetAnalysis {
    pub widgets: Vec<WidgetRecord>,
    pub functions: Vec<FunctionRecord>,
    pub imports: Vec<ImportRecord>,
    pub external_dependencies: Vec<String>,
    pub entry_point: Option<String>,
    pub root_widget: Option<String>,
    pub widget_tree: Vec<WidgetTreeNode>,
}

impl WidgetAnalysis {
    pub fn widget(&self, name: &str) -> Option<&WidgetRecord> {
        self.widgets.iter().find(|w| w.name == name)
    }
}

/// `State<Counter>` → `State`, `material.Widget` → `Widget`.
pub fn base_name(type_name: &str) -> &str {
    let without_args = type_name.split('<').next().unwrap_or(type_name);
    without_args
        .rsplit('.')
        .next()
        .unwrap_or(without_args)
        .trim_end_matches('?')
}

pub fn classify_superclass(superclass: Option<&str>) -> WidgetKind {
    match superclass.map(base_name) {
        Some("StatelessWidget") => WidgetKind::Stateless,
        Some("StatefulWidget") => WidgetKind::Stateful,
        Some("State") => WidgetKind::State,
        Some(name) if COMPONENT_BASES.contains(name) => WidgetKind::Component,
        _ => WidgetKind::Other,
    }
}

/// `build` or `build` followed by an upper-case suffix (`buildHeader`).
pub fn is_build_method(name: &str) -> bool {
    BUILD_METHOD_RE.is_match(name)
}

/// Core library types (`List`, `Map`, `DateTime`, ...) every unit can name.
pub fn is_core_type(name: &str) -> bool {
    CORE_TYPES.contains(name)
}

fn is_type_like(name: &str) -> bool {
    TYPE_NAME_RE.is_match(name) && name.chars().any(|c| c.is_ascii_lowercase())
}

/// Class name and optional constructor name when `expr` syntactically looks
/// like a constructor call: `Text('a')`, `Text.rich(..)`, `new A()`,
/// `const B()`, `material.Text(..)`. `X.of(..)`/`X.maybeOf(..)` are lookups.
pub fn constructor_call(expr: &Expr) -> Option<(String, Option<String>)> {
    match &expr.kind {
        ExprKind::New { ty, constructor, .. } => Some((base_name(&ty.name).to_string(), constructor.clone())),
        ExprKind::Call { callee, .. } => match &callee.kind {
            ExprKind::Identifier(name) if is_type_like(name) => Some((name.clone(), None)),
            ExprKind::PropertyAccess {
                target,
                name,
                null_aware: false,
            } => {
                let owner = target.as_identifier()?;
                if is_type_like(name) {
                    // prefixed: `material.Text(...)`
                    return Some((name.clone(), None));
                }
                if is_type_like(owner) && name != "of" && name != "maybeOf" {
                    return Some((owner.to_string(), Some(name.clone())));
                }
                None
            }
            _ => None,
        },
        _ => None,
    }
}

/// Runs the widget analysis over one unit, mirroring findings into `sink`.
pub fn analyze_widgets(
    unit: &CompilationUnit,
    require_entry_point: bool,
    sink: &mut Diagnostics,
) -> WidgetAnalysis {
    let mut analysis = WidgetAnalysis::default();
    let mut declared: HashSet<String> = HashSet::new();

    for declaration in &unit.declarations {
        match declaration {
            Declaration::Class(class) => {
                declared.insert(class.name.clone());
                analysis.widgets.push(widget_record(class));
                for parameter in &class.type_parameters {
                    declared.insert(parameter.name.clone());
                }
            }
            Declaration::Enum(e) => {
                declared.insert(e.name.clone());
            }
            Declaration::Function(function) => {
                analysis.functions.push(FunctionRecord {
                    name: function.name.clone(),
                    parameters: function.parameters.all().map(|p| p.name.clone()).collect(),
                    is_async: function.body.modifier.is_async(),
                    location: function.location.clone(),
                });
            }
            Declaration::Import(import) => analysis.imports.push(ImportRecord {
                uri: import.uri.clone(),
                prefix: import.prefix.clone(),
                show: import.show.clone(),
                hide: import.hide.clone(),
                location: import.location.clone(),
            }),
            Declaration::Variable(_) | Declaration::Export(_) => {}
        }
    }

    let mut collector = ExternalReferences {
        declared: &declared,
        found: BTreeSet::new(),
    };
    collector.visit_unit(unit);
    analysis.external_dependencies = collector.found.into_iter().collect();

    analysis.widget_tree = unit
        .declarations
        .iter()
        .filter_map(|d| match d {
            Declaration::Class(class) => build_tree(class),
            _ => None,
        })
        .collect();

    find_entry_point(unit, &mut analysis, require_entry_point, sink);

    log::debug!(
        "[Widgets] {}: {} classes, entry={:?}, root={:?}",
        unit.file,
        analysis.widgets.len(),
        analysis.entry_point,
        analysis.root_widget
    );
    analysis
}

fn widget_record(class: &ClassDeclaration) -> WidgetRecord {
    let superclass = class.superclass.as_ref().map(|s| s.name.clone());
    WidgetRecord {
        name: class.name.clone(),
        kind: classify_superclass(superclass.as_deref()),
        superclass,
        methods: class.methods().map(|m| m.name.clone()).collect(),
        properties: class
            .fields()
            .filter(|f| !f.is_static)
            .flat_map(|f| f.declarators.iter().map(|d| d.name.clone()))
            .collect(),
        location: class.location.clone(),
    }
}

fn find_entry_point(
    unit: &CompilationUnit,
    analysis: &mut WidgetAnalysis,
    require_entry_point: bool,
    sink: &mut Diagnostics,
) {
    let main = unit.declarations.iter().find_map(|d| match d {
        Declaration::Function(f) if f.name == ENTRY_POINT => Some(f),
        _ => None,
    });
    let Some(main) = main else {
        if require_entry_point {
            sink.push(Diagnostic::new(
                DiagnosticKind::AnalysisError,
                diagnostics::WIDGET_MISSING_ENTRY_POINT,
                format!("no `{}` function declared", ENTRY_POINT),
                SourceLocation::new(unit.file.clone(), 1, 1),
            ));
        }
        return;
    };

    analysis.entry_point = Some(main.name.clone());
    let mut finder = BootstrapFinder { root: None };
    finder.visit_function(main);
    match finder.root {
        Some(root) => analysis.root_widget = Some(root),
        None => sink.push(Diagnostic::new(
            DiagnosticKind::AnalysisWarning,
            diagnostics::WIDGET_MISSING_ROOT,
            format!("`{}` does not pass a widget to `{}`", ENTRY_POINT, BOOTSTRAP_CALL),
            main.location.clone(),
        )),
    }
}

/// Finds the first `runApp(<constructor call>)`.
struct BootstrapFinder {
    root: Option<String>,
}

impl AstVisitor for BootstrapFinder {
    fn visit_expr(&mut self, expr: &Expr) {
        if self.root.is_some() {
            return;
        }
        if let ExprKind::Call {
            callee, arguments, ..
        } = &expr.kind
        {
            if callee.as_identifier() == Some(BOOTSTRAP_CALL) {
                if let Some((name, _)) = arguments.first().and_then(|a| constructor_call(&a.value)) {
                    self.root = Some(name);
                    return;
                }
            }
        }
        visitor::walk_expr(self, expr);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WIDGET TREE
// ═══════════════════════════════════════════════════════════════════════════════

fn build_tree(class: &ClassDeclaration) -> Option<WidgetTreeNode> {
    let mut builder = TreeBuilder { stack: vec![Vec::new()] };
    let mut has_build = false;
    for method in class.methods().filter(|m| !m.is_static && is_build_method(&m.name)) {
        has_build = true;
        builder.visit_method(method);
    }
    if !has_build {
        return None;
    }
    Some(WidgetTreeNode {
        name: class.name.clone(),
        constructor: None,
        location: class.location.clone(),
        children: builder.stack.pop().unwrap_or_default(),
    })
}

/// Collects constructor calls; arguments of a call become its children.
struct TreeBuilder {
    stack: Vec<Vec<WidgetTreeNode>>,
}

impl AstVisitor for TreeBuilder {
    fn visit_expr(&mut self, expr: &Expr) {
        let Some((name, constructor)) = constructor_call(expr) else {
            visitor::walk_expr(self, expr);
            return;
        };
        self.stack.push(Vec::new());
        visitor::walk_expr(self, expr);
        let children = self.stack.pop().unwrap_or_default();
        if let Some(siblings) = self.stack.last_mut() {
            siblings.push(WidgetTreeNode {
                name,
                constructor,
                location: expr.location.clone(),
                children,
            });
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXTERNAL DEPENDENCIES
// ═══════════════════════════════════════════════════════════════════════════════

struct ExternalReferences<'a> {
    declared: &'a HashSet<String>,
    found: BTreeSet<String>,
}

impl ExternalReferences<'_> {
    fn note(&mut self, name: &str) {
        let name = base_name(name);
        if is_type_like(name) && !self.declared.contains(name) && !CORE_TYPES.contains(name) {
            self.found.insert(name.to_string());
        }
    }

    fn note_type(&mut self, ty: &TypeAnnotation) {
        self.note(&ty.name);
        for argument in &ty.arguments {
            self.note_type(argument);
        }
    }

    fn note_types(&mut self, types: &[TypeAnnotation]) {
        for ty in types {
            self.note_type(ty);
        }
    }
}

impl AstVisitor for ExternalReferences<'_> {
    fn visit_class(&mut self, class: &ClassDeclaration) {
        if let Some(superclass) = &class.superclass {
            self.note_type(superclass);
        }
        self.note_types(&class.mixins);
        self.note_types(&class.interfaces);
        visitor::walk_class(self, class);
    }

    fn visit_field(&mut self, field: &FieldDeclaration) {
        if let Some(ty) = &field.ty {
            self.note_type(ty);
        }
        visitor::walk_field(self, field);
    }

    fn visit_method(&mut self, method: &MethodDeclaration) {
        if let Some(ty) = &method.return_type {
            self.note_type(ty);
        }
        visitor::walk_method(self, method);
    }

    fn visit_function(&mut self, function: &FunctionDeclaration) {
        if let Some(ty) = &function.return_type {
            self.note_type(ty);
        }
        visitor::walk_function(self, function);
    }

    fn visit_variable(&mut self, variable: &VariableDeclaration) {
        if let Some(ty) = &variable.ty {
            self.note_type(ty);
        }
        visitor::walk_variable(self, variable);
    }

    fn visit_parameters(&mut self, parameters: &ParameterList) {
        for parameter in parameters.all() {
            if let Some(ty) = &parameter.ty {
                self.note_type(ty);
            }
        }
        visitor::walk_parameters(self, parameters);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Identifier(name) => self.note(name),
            ExprKind::New { ty, .. } => self.note_type(ty),
            ExprKind::As { ty, .. } | ExprKind::Is { ty, .. } => self.note_type(ty),
            ExprKind::Call { type_arguments, .. }
            | ExprKind::ListLiteral { type_arguments, .. }
            | ExprKind::MapLiteral { type_arguments, .. }
            | ExprKind::SetLiteral { type_arguments, .. } => self.note_types(type_arguments),
            ExprKind::PropertyAccess { target, name, .. } => {
                // `material.Text` names the type, not the prefix.
                if target.as_identifier().map_or(false, |t| !is_type_like(t)) && is_type_like(name) {
                    self.note(name);
                    return;
                }
            }
            _ => {}
        }
        visitor::walk_expr(self, expr);
    }
}
