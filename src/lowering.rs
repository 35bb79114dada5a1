//! IR Builder
//!
//! Lowers a parsed unit into the typed IR. Types are inferred syntactically
//! and interned per unit. Bare references to instance members are qualified
//! with `this`, lambdas record the variables they capture, and same-unit
//! calls of an unnamed factory become `Class.create(...)`.

use lazy_static::lazy_static;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::ast::*;
use crate::diagnostics::{self, Diagnostic, DiagnosticKind, Diagnostics, SourceLocation};
use crate::ir::*;
use crate::widgets::base_name;

/// Name of the static method an unnamed factory constructor lowers to.
pub const FACTORY_METHOD: &str = "create";

lazy_static! {
    /// Members inherited from framework base classes that bare identifiers
    /// may refer to.
    static ref INHERITED_MEMBERS: HashMap<&'static str, &'static [&'static str]> = {
        let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
        m.insert(
            "State",
            &[
                "setState", "widget", "context", "mounted", "initState", "dispose",
                "didChangeDependencies", "didUpdateWidget", "deactivate", "reassemble",
            ],
        );
        m.insert(
            "ChangeNotifier",
            &["notifyListeners", "addListener", "removeListener", "hasListeners", "dispose"],
        );
        m.insert("InheritedWidget", &["child", "updateShouldNotify"]);
        m.insert("InheritedNotifier", &["child", "notifier", "updateShouldNotify"]);
        m
    };
}

/// Where an import's module specifier points after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleTarget {
    pub module: String,
    pub is_framework: bool,
}

/// Module specifier used when no resolution is available: `.dart` sources
/// become `.js` modules.
pub fn default_module(uri: &str) -> String {
    match uri.strip_suffix(".dart") {
        Some(stem) => format!("{}.js", stem),
        None => uri.to_string(),
    }
}

/// Lowers `unit`. `modules` maps import/export URIs to their resolved
/// targets; `external` lists the type names the unit takes from imports.
pub fn lower_unit(
    unit: &CompilationUnit,
    modules: &HashMap<String, ModuleTarget>,
    external: &[String],
    sink: &mut Diagnostics,
) -> IrModule {
    let mut lowerer = Lowerer::new(unit, sink);
    let mut declarations = Vec::new();
    let mut remaining_external: BTreeSet<String> = external.iter().cloned().collect();
    for declaration in &unit.declarations {
        if let Declaration::Import(import) = declaration {
            for name in &import.show {
                remaining_external.remove(name);
            }
        }
    }
    let mut external_assigned = false;

    for declaration in &unit.declarations {
        let lowered = match declaration {
            Declaration::Import(import) => {
                let target = modules.get(&import.uri).cloned().unwrap_or_else(|| ModuleTarget {
                    module: default_module(&import.uri),
                    is_framework: false,
                });
                let mut items: Vec<String> = import.show.clone();
                if items.is_empty() && import.prefix.is_none() && target.is_framework && !external_assigned {
                    items = remaining_external.iter().cloned().collect();
                    external_assigned = true;
                }
                items.sort();
                DeclarationIR::Import(ImportDecl {
                    id: lowerer.id(),
                    uri: import.uri.clone(),
                    module: target.module,
                    prefix: import.prefix.clone(),
                    items,
                    is_framework: target.is_framework,
                    location: import.location.clone(),
                })
            }
            Declaration::Export(export) => {
                let module = modules
                    .get(&export.uri)
                    .map(|t| t.module.clone())
                    .unwrap_or_else(|| default_module(&export.uri));
                DeclarationIR::Export(ExportDecl {
                    id: lowerer.id(),
                    uri: export.uri.clone(),
                    module,
                    show: export.show.clone(),
                    location: export.location.clone(),
                })
            }
            Declaration::Class(class) => DeclarationIR::Class(lowerer.lower_class(class)),
            Declaration::Enum(e) => DeclarationIR::Enum(EnumDecl {
                id: lowerer.id(),
                name: e.name.clone(),
                values: e.values.iter().map(|v| v.name.clone()).collect(),
                location: e.location.clone(),
            }),
            Declaration::Function(function) => DeclarationIR::Function(lowerer.lower_function(function)),
            Declaration::Variable(variable) => DeclarationIR::Variable(lowerer.lower_variable(variable)),
        };
        declarations.push(lowered);
    }

    log::debug!(
        "[IR] {}: {} declarations, {} interned types",
        unit.file,
        declarations.len(),
        lowerer.types.len()
    );
    IrModule::new(&unit.file, declarations)
}

#[derive(Default)]
struct ClassInfo {
    superclass: Option<String>,
    /// Instance fields, getters and methods with their types.
    instance_members: HashMap<String, Arc<TypeIR>>,
    /// Instance members that are plain methods (need binding on tear-off).
    methods: HashSet<String>,
    /// Getters and setters, instance and static.
    accessors: HashSet<String>,
    static_members: HashMap<String, Arc<TypeIR>>,
    constructors: HashSet<String>,
    unnamed_factory: bool,
}

enum Binding {
    Local(Arc<TypeIR>),
    Instance { ty: Arc<TypeIR>, is_method: bool },
    Static { class: String, ty: Arc<TypeIR> },
    TopLevel(Arc<TypeIR>),
    Prefix,
    Type,
    Unknown,
}

struct Scope {
    vars: HashMap<String, Arc<TypeIR>>,
    depth: usize,
}

struct Lowerer<'a> {
    next_id: u32,
    types: TypeInterner,
    sink: &'a mut Diagnostics,
    classes: HashMap<String, ClassInfo>,
    top_level: HashMap<String, Arc<TypeIR>>,
    type_names: HashSet<String>,
    prefixes: HashSet<String>,
    scopes: Vec<Scope>,
    function_depth: usize,
    /// Open lambdas: their function depth and captured names.
    captures: Vec<(usize, BTreeSet<String>)>,
    current_class: Option<String>,
    in_static: bool,
    cascade_types: Vec<Arc<TypeIR>>,
}

fn is_type_like(name: &str) -> bool {
    name.trim_start_matches('_')
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_uppercase())
}

impl<'a> Lowerer<'a> {
    fn new(unit: &CompilationUnit, sink: &'a mut Diagnostics) -> Self {
        let mut lowerer = Lowerer {
            next_id: 0,
            types: TypeInterner::new(),
            sink,
            classes: HashMap::new(),
            top_level: HashMap::new(),
            type_names: HashSet::new(),
            prefixes: HashSet::new(),
            scopes: Vec::new(),
            function_depth: 0,
            captures: Vec::new(),
            current_class: None,
            in_static: false,
            cascade_types: Vec::new(),
        };
        lowerer.collect_unit_symbols(unit);
        lowerer
    }

    fn collect_unit_symbols(&mut self, unit: &CompilationUnit) {
        for declaration in &unit.declarations {
            match declaration {
                Declaration::Import(import) => {
                    if let Some(prefix) = &import.prefix {
                        self.prefixes.insert(prefix.clone());
                    }
                }
                Declaration::Class(class) => {
                    self.type_names.insert(class.name.clone());
                    let info = self.class_info(class);
                    self.classes.insert(class.name.clone(), info);
                }
                Declaration::Enum(e) => {
                    self.type_names.insert(e.name.clone());
                }
                Declaration::Function(function) => {
                    let ty = self.lower_optional_type(function.return_type.as_ref());
                    self.top_level.insert(function.name.clone(), ty);
                }
                Declaration::Variable(variable) => {
                    let ty = self.lower_optional_type(variable.ty.as_ref());
                    for declarator in &variable.declarators {
                        self.top_level.insert(declarator.name.clone(), ty.clone());
                    }
                }
                Declaration::Export(_) => {}
            }
        }
    }

    fn class_info(&mut self, class: &ClassDeclaration) -> ClassInfo {
        let mut info = ClassInfo {
            superclass: class.superclass.as_ref().map(|s| base_name(&s.name).to_string()),
            ..ClassInfo::default()
        };
        let function = self.types.named("Function");
        for member in &class.members {
            match member {
                ClassMember::Field(field) => {
                    let ty = self.lower_optional_type(field.ty.as_ref());
                    for declarator in &field.declarators {
                        let table = if field.is_static {
                            &mut info.static_members
                        } else {
                            &mut info.instance_members
                        };
                        table.insert(declarator.name.clone(), ty.clone());
                    }
                }
                ClassMember::Method(method) => {
                    let ty = match method.kind {
                        MethodKind::Getter | MethodKind::Setter => {
                            self.lower_optional_type(method.return_type.as_ref())
                        }
                        _ => function.clone(),
                    };
                    if matches!(method.kind, MethodKind::Getter | MethodKind::Setter) {
                        info.accessors.insert(method.name.clone());
                    }
                    if method.is_static {
                        info.static_members.insert(method.name.clone(), ty);
                    } else {
                        if method.kind == MethodKind::Method {
                            info.methods.insert(method.name.clone());
                        }
                        info.instance_members.insert(method.name.clone(), ty);
                    }
                }
                ClassMember::Constructor(constructor) => match &constructor.name {
                    Some(name) => {
                        info.constructors.insert(name.clone());
                    }
                    None => {
                        if constructor.is_factory {
                            info.unnamed_factory = true;
                        }
                    }
                },
            }
        }
        info
    }

    fn id(&mut self) -> IrId {
        let id = IrId(self.next_id);
        self.next_id += 1;
        id
    }

    fn make(&mut self, kind: ExpressionKind, result_type: Arc<TypeIR>, location: &SourceLocation) -> ExpressionIR {
        ExpressionIR {
            id: self.id(),
            result_type,
            location: location.clone(),
            kind,
        }
    }

    fn analysis_error(&mut self, code: &str, message: String, location: &SourceLocation) {
        self.sink.push(Diagnostic::new(
            DiagnosticKind::AnalysisError,
            code,
            message,
            location.clone(),
        ));
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SCOPES
    // ═══════════════════════════════════════════════════════════════════════════

    fn push_scope(&mut self) {
        self.scopes.push(Scope {
            vars: HashMap::new(),
            depth: self.function_depth,
        });
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str, ty: Arc<TypeIR>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.vars.insert(name.to_string(), ty);
        }
    }

    /// Enters a function body: new depth and a fresh scope.
    fn enter_function(&mut self) {
        self.function_depth += 1;
        self.push_scope();
    }

    fn exit_function(&mut self) {
        self.pop_scope();
        self.function_depth -= 1;
    }

    fn instance_member(&self, name: &str) -> Option<(Arc<TypeIR>, bool)> {
        let mut class_name = self.current_class.clone();
        let mut seen = HashSet::new();
        while let Some(current) = class_name {
            if !seen.insert(current.clone()) {
                break;
            }
            match self.classes.get(&current) {
                Some(info) => {
                    if let Some(ty) = info.instance_members.get(name) {
                        return Some((ty.clone(), info.methods.contains(name)));
                    }
                    class_name = info.superclass.clone();
                }
                None => {
                    let inherited = INHERITED_MEMBERS
                        .get(current.as_str())
                        .map_or(false, |members| members.contains(&name));
                    return if inherited {
                        Some((Arc::new(TypeIR::named("dynamic")), false))
                    } else {
                        None
                    };
                }
            }
        }
        None
    }

    /// Whether `name` resolves to a getter or setter of the current class or
    /// one of its superclasses declared in this unit.
    fn is_instance_accessor(&self, name: &str) -> bool {
        let mut class_name = self.current_class.clone();
        let mut seen = HashSet::new();
        while let Some(current) = class_name {
            if !seen.insert(current.clone()) {
                break;
            }
            let Some(info) = self.classes.get(&current) else {
                break;
            };
            if info.instance_members.contains_key(name) {
                return info.accessors.contains(name);
            }
            class_name = info.superclass.clone();
        }
        false
    }

    fn resolve(&mut self, name: &str) -> Binding {
        for scope in self.scopes.iter().rev() {
            if let Some(ty) = scope.vars.get(name) {
                let found_depth = scope.depth;
                let ty = ty.clone();
                for (depth, captured) in self.captures.iter_mut() {
                    if *depth > found_depth && found_depth > 0 {
                        captured.insert(name.to_string());
                    }
                }
                return Binding::Local(ty);
            }
        }
        if let Some(class) = self.current_class.clone() {
            if !self.in_static {
                if let Some((ty, is_method)) = self.instance_member(name) {
                    return Binding::Instance {
                        ty: self.types.intern((*ty).clone()),
                        is_method,
                    };
                }
            }
            if let Some(ty) = self.classes.get(&class).and_then(|c| c.static_members.get(name)) {
                return Binding::Static {
                    class,
                    ty: ty.clone(),
                };
            }
        }
        if let Some(ty) = self.top_level.get(name) {
            return Binding::TopLevel(ty.clone());
        }
        if self.prefixes.contains(name) {
            return Binding::Prefix;
        }
        if self.type_names.contains(name) || is_type_like(name) {
            return Binding::Type;
        }
        Binding::Unknown
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TYPES
    // ═══════════════════════════════════════════════════════════════════════════

    fn lower_type(&mut self, ty: &TypeAnnotation) -> Arc<TypeIR> {
        let arguments = ty.arguments.iter().map(|a| self.lower_type(a)).collect();
        self.types.intern(TypeIR {
            name: ty.name.clone(),
            arguments,
            nullable: ty.nullable,
        })
    }

    fn lower_optional_type(&mut self, ty: Option<&TypeAnnotation>) -> Arc<TypeIR> {
        match ty {
            Some(ty) => self.lower_type(ty),
            None => self.types.dynamic(),
        }
    }

    fn lower_type_list(&mut self, types: &[TypeAnnotation]) -> Vec<Arc<TypeIR>> {
        types.iter().map(|t| self.lower_type(t)).collect()
    }

    fn literal_type(&mut self, literal: &Literal) -> Arc<TypeIR> {
        let name = match literal {
            Literal::Int(_) => "int",
            Literal::Double(_) => "double",
            Literal::String(_) => "String",
            Literal::Bool(_) => "bool",
            Literal::Null => "Null",
        };
        self.types.named(name)
    }

    fn binary_type(&mut self, op: BinaryOp, left: &Arc<TypeIR>, right: &Arc<TypeIR>) -> Arc<TypeIR> {
        if op.is_comparison() || op.is_logical() {
            return self.types.named("bool");
        }
        match op {
            BinaryOp::IfNull => {
                if left.is_dynamic() {
                    right.clone()
                } else {
                    self.types.intern(TypeIR {
                        nullable: false,
                        ..(**left).clone()
                    })
                }
            }
            BinaryOp::IntDiv => self.types.named("int"),
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                match (left.name.as_str(), right.name.as_str()) {
                    ("String", _) if op == BinaryOp::Add => self.types.named("String"),
                    ("int", "int") if op != BinaryOp::Div => self.types.named("int"),
                    ("int" | "double" | "num", "int" | "double" | "num") => self.types.named("double"),
                    _ => self.types.dynamic(),
                }
            }
            _ => {
                if left.name == "int" && right.name == "int" {
                    self.types.named("int")
                } else {
                    self.types.dynamic()
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DECLARATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    fn lower_class(&mut self, class: &ClassDeclaration) -> ClassDecl {
        self.current_class = Some(class.name.clone());
        let mut decl = ClassDecl {
            id: self.id(),
            name: class.name.clone(),
            superclass: class.superclass.as_ref().map(|s| self.lower_type(s)),
            type_parameters: class.type_parameters.iter().map(|p| p.name.clone()).collect(),
            is_abstract: class.is_abstract,
            fields: Vec::new(),
            static_fields: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            static_methods: Vec::new(),
            location: class.location.clone(),
        };

        for member in &class.members {
            match member {
                ClassMember::Field(field) => {
                    self.in_static = field.is_static;
                    let lowered = self.lower_field(field);
                    if field.is_static {
                        decl.static_fields.extend(lowered);
                    } else {
                        decl.fields.extend(lowered);
                    }
                }
                ClassMember::Constructor(constructor) => {
                    self.in_static = constructor.is_factory;
                    let lowered = self.lower_constructor(constructor);
                    decl.constructors.push(lowered);
                }
                ClassMember::Method(method) => {
                    self.in_static = method.is_static;
                    let lowered = self.lower_method(method);
                    if method.is_static {
                        decl.static_methods.push(lowered);
                    } else {
                        decl.methods.push(lowered);
                    }
                }
            }
        }

        self.in_static = false;
        self.current_class = None;
        decl
    }

    fn lower_field(&mut self, field: &FieldDeclaration) -> Vec<FieldDecl> {
        let declared = field.ty.as_ref().map(|t| self.lower_type(t));
        let mutability = mutability(field.modifier);
        let mut fields = Vec::new();
        for declarator in &field.declarators {
            let initializer = declarator.initializer.as_ref().map(|e| self.lower_expr(e));
            let ty = declared
                .clone()
                .or_else(|| initializer.as_ref().map(|i| i.result_type.clone()))
                .unwrap_or_else(|| self.types.dynamic());
            fields.push(FieldDecl {
                id: self.id(),
                name: declarator.name.clone(),
                ty,
                initializer,
                mutability,
                is_late: field.is_late,
                location: declarator.location.clone(),
            });
        }
        fields
    }

    fn lower_constructor(&mut self, constructor: &ConstructorDeclaration) -> ConstructorDecl {
        let id = self.id();
        self.enter_function();
        let parameters = self.lower_parameters(&constructor.parameters);

        let mut initializers = Vec::new();
        for initializer in &constructor.initializers {
            let lowered = match initializer {
                ConstructorInitializer::Field { name, value, .. } => InitializerIR::Field {
                    name: name.clone(),
                    value: self.lower_expr(value),
                },
                ConstructorInitializer::Super {
                    constructor,
                    arguments,
                    ..
                } => InitializerIR::SuperCall {
                    constructor: constructor.clone(),
                    arguments: self.lower_arguments(arguments),
                },
                ConstructorInitializer::Redirect {
                    constructor,
                    arguments,
                    ..
                } => InitializerIR::Redirect {
                    constructor: constructor.clone(),
                    arguments: self.lower_arguments(arguments),
                },
                ConstructorInitializer::Assert {
                    condition, message, ..
                } => InitializerIR::Assert {
                    condition: self.lower_expr(condition),
                    message: message.as_ref().map(|m| self.lower_expr(m)),
                },
            };
            initializers.push(lowered);
        }

        let body = match &constructor.redirect_target {
            Some(target) => self.redirecting_factory_body(target, &parameters, &constructor.location),
            None => self.lower_body(&constructor.body),
        };
        self.exit_function();

        ConstructorDecl {
            id,
            name: constructor.name.clone(),
            kind: if constructor.is_factory {
                ConstructorKind::Factory
            } else {
                ConstructorKind::Generative
            },
            is_const: constructor.is_const,
            parameters,
            initializers,
            body,
            location: constructor.location.clone(),
        }
    }

    /// `factory A(x) = B;` forwards its parameters to `B(x)`.
    fn redirecting_factory_body(
        &mut self,
        target: &TypeAnnotation,
        parameters: &[ParameterIR],
        location: &SourceLocation,
    ) -> FunctionBodyIR {
        let (class_name, constructor) = match target.name.split_once('.') {
            Some((class, ctor)) if !is_type_like(ctor) => (class.to_string(), Some(ctor.to_string())),
            _ => (target.name.clone(), None),
        };
        let mut arguments = ArgumentsIR::default();
        for parameter in parameters {
            let ty = parameter.ty.clone();
            let value = self.make(
                ExpressionKind::Identifier {
                    name: parameter.name.clone(),
                    is_this: false,
                    is_super: false,
                    is_type_reference: false,
                },
                ty,
                &parameter.location,
            );
            match parameter.kind {
                ParameterKind::Named => {
                    arguments.named.insert(parameter.name.clone(), value);
                }
                _ => arguments.positional.push(value),
            }
        }
        let arguments_ty: Vec<Arc<TypeIR>> = target.arguments.iter().map(|a| self.lower_type(a)).collect();
        let class_type = self.types.generic(&class_name, arguments_ty);
        let constructor = self.creation_constructor(&class_name, constructor);
        let expr = self.make(
            ExpressionKind::InstanceCreation {
                class_type: class_type.clone(),
                constructor,
                arguments,
                is_const: false,
            },
            class_type,
            location,
        );
        FunctionBodyIR::Expression { expr }
    }

    fn lower_method(&mut self, method: &MethodDeclaration) -> MethodDecl {
        let id = self.id();
        let return_type = self.lower_optional_type(method.return_type.as_ref());
        self.enter_function();
        let parameters = self.lower_parameters(&method.parameters);
        let body = self.lower_body(&method.body);
        self.exit_function();
        MethodDecl {
            id,
            name: method.name.clone(),
            kind: method.kind,
            return_type,
            type_parameters: method.type_parameters.iter().map(|p| p.name.clone()).collect(),
            parameters,
            body,
            is_async: method.body.modifier.is_async(),
            is_generator: method.body.modifier.is_generator(),
            location: method.location.clone(),
        }
    }

    fn lower_function(&mut self, function: &FunctionDeclaration) -> FunctionDecl {
        let id = self.id();
        let return_type = self.lower_optional_type(function.return_type.as_ref());
        self.enter_function();
        let parameters = self.lower_parameters(&function.parameters);
        let body = self.lower_body(&function.body);
        self.exit_function();
        FunctionDecl {
            id,
            name: function.name.clone(),
            return_type,
            type_parameters: function.type_parameters.iter().map(|p| p.name.clone()).collect(),
            parameters,
            body,
            is_async: function.body.modifier.is_async(),
            is_generator: function.body.modifier.is_generator(),
            location: function.location.clone(),
        }
    }

    fn lower_variable(&mut self, variable: &VariableDeclaration) -> VariableDeclIR {
        let id = self.id();
        let declared = variable.ty.as_ref().map(|t| self.lower_type(t));
        let mut declarators = Vec::new();
        let mut inferred: Option<Arc<TypeIR>> = None;
        for declarator in &variable.declarators {
            let initializer = declarator.initializer.as_ref().map(|e| self.lower_expr(e));
            let ty = declared
                .clone()
                .or_else(|| initializer.as_ref().map(|i| i.result_type.clone()))
                .unwrap_or_else(|| self.types.dynamic());
            if inferred.is_none() {
                inferred = Some(ty.clone());
            }
            self.declare(&declarator.name, ty);
            declarators.push(DeclaratorIR {
                id: self.id(),
                name: declarator.name.clone(),
                initializer,
                location: declarator.location.clone(),
            });
        }
        VariableDeclIR {
            id,
            mutability: mutability(variable.modifier),
            is_late: variable.is_late,
            ty: inferred.unwrap_or_else(|| self.types.dynamic()),
            declarators,
            location: variable.location.clone(),
        }
    }

    /// Lowers and declares parameters in the current scope.
    fn lower_parameters(&mut self, list: &ParameterList) -> Vec<ParameterIR> {
        let groups = [
            (&list.positional, ParameterKind::Positional),
            (&list.optional_positional, ParameterKind::OptionalPositional),
            (&list.named, ParameterKind::Named),
        ];
        let mut parameters = Vec::new();
        for (group, kind) in groups {
            for parameter in group {
                let ty = match (&parameter.ty, parameter.form) {
                    (Some(ty), _) => self.lower_type(ty),
                    (None, ParameterForm::ThisField) => self
                        .instance_member(&parameter.name)
                        .map(|(ty, _)| self.types.intern((*ty).clone()))
                        .unwrap_or_else(|| self.types.dynamic()),
                    (None, _) => self.types.dynamic(),
                };
                let default_value = parameter.default_value.as_ref().map(|d| self.lower_expr(d));
                self.declare(&parameter.name, ty.clone());
                parameters.push(ParameterIR {
                    id: self.id(),
                    name: parameter.name.clone(),
                    ty,
                    kind,
                    is_required: kind == ParameterKind::Positional || parameter.is_required,
                    default_value,
                    form: parameter.form,
                    location: parameter.location.clone(),
                });
            }
        }
        parameters
    }

    fn lower_body(&mut self, body: &FunctionBody) -> FunctionBodyIR {
        match &body.kind {
            BodyKind::Block(block) => FunctionBodyIR::Block {
                statements: self.lower_statements(&block.statements),
            },
            BodyKind::Arrow(expr) => FunctionBodyIR::Expression {
                expr: self.lower_expr(expr),
            },
            BodyKind::Empty => FunctionBodyIR::Empty,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STATEMENTS
    // ═══════════════════════════════════════════════════════════════════════════

    fn lower_statements(&mut self, statements: &[Stmt]) -> Vec<StatementIR> {
        statements.iter().map(|s| self.lower_stmt(s)).collect()
    }

    fn lower_block(&mut self, block: &Block) -> Vec<StatementIR> {
        self.push_scope();
        let statements = self.lower_statements(&block.statements);
        self.pop_scope();
        statements
    }

    fn lower_stmt(&mut self, stmt: &Stmt) -> StatementIR {
        let kind = match &stmt.kind {
            StmtKind::Block(block) => StatementKind::Block {
                statements: self.lower_block(block),
            },
            StmtKind::Expression(expr) => StatementKind::Expression {
                expr: self.lower_expr(expr),
            },
            StmtKind::Variable(variable) => StatementKind::Variable(self.lower_variable(variable)),
            StmtKind::LocalFunction(function) => {
                let ty = self.types.named("Function");
                self.declare(&function.name, ty);
                StatementKind::Function(self.lower_function(function))
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => StatementKind::If {
                condition: self.lower_expr(condition),
                then_branch: Box::new(self.lower_scoped_stmt(then_branch)),
                else_branch: else_branch.as_ref().map(|e| Box::new(self.lower_scoped_stmt(e))),
            },
            StmtKind::For {
                init,
                condition,
                updates,
                body,
            } => {
                self.push_scope();
                let kind = StatementKind::For {
                    init: init.as_ref().map(|i| Box::new(self.lower_stmt(i))),
                    condition: condition.as_ref().map(|c| self.lower_expr(c)),
                    updates: updates.iter().map(|u| self.lower_expr(u)).collect(),
                    body: Box::new(self.lower_scoped_stmt(body)),
                };
                self.pop_scope();
                kind
            }
            StmtKind::ForIn {
                modifier,
                ty,
                variable,
                iterable,
                body,
                is_await,
            } => {
                let iterable = self.lower_expr(iterable);
                let element_type = match ty {
                    Some(ty) => self.lower_type(ty),
                    None => iterable
                        .result_type
                        .arguments
                        .first()
                        .cloned()
                        .unwrap_or_else(|| self.types.dynamic()),
                };
                self.push_scope();
                self.declare(variable, element_type);
                let body = Box::new(self.lower_stmt(body));
                self.pop_scope();
                StatementKind::ForIn {
                    variable: variable.clone(),
                    mutability: mutability(*modifier),
                    iterable,
                    body,
                    is_await: *is_await,
                }
            }
            StmtKind::While { condition, body } => StatementKind::While {
                condition: self.lower_expr(condition),
                body: Box::new(self.lower_scoped_stmt(body)),
            },
            StmtKind::DoWhile { body, condition } => StatementKind::DoWhile {
                body: Box::new(self.lower_scoped_stmt(body)),
                condition: self.lower_expr(condition),
            },
            StmtKind::Switch { subject, cases } => {
                let subject = self.lower_expr(subject);
                let cases = cases
                    .iter()
                    .map(|case| {
                        let patterns = case.patterns.iter().map(|p| self.lower_expr(p)).collect();
                        self.push_scope();
                        let body = self.lower_statements(&case.body);
                        self.pop_scope();
                        SwitchCaseIR {
                            patterns,
                            is_default: case.is_default,
                            body,
                        }
                    })
                    .collect();
                StatementKind::Switch { subject, cases }
            }
            StmtKind::Return(value) => StatementKind::Return {
                value: value.as_ref().map(|v| self.lower_expr(v)),
            },
            StmtKind::Break(label) => StatementKind::Break { label: label.clone() },
            StmtKind::Continue(label) => StatementKind::Continue { label: label.clone() },
            StmtKind::Yield { value, is_star } => StatementKind::Yield {
                value: self.lower_expr(value),
                is_star: *is_star,
            },
            StmtKind::Try {
                body,
                catches,
                finally,
            } => {
                let body = self.lower_block(body);
                let catches = catches
                    .iter()
                    .map(|catch| {
                        self.push_scope();
                        let dynamic = self.types.dynamic();
                        let exception_type = catch.on_type.as_ref().map(|t| self.lower_type(t));
                        if let Some(name) = &catch.exception {
                            let ty = exception_type.clone().unwrap_or_else(|| dynamic.clone());
                            self.declare(name, ty);
                        }
                        if let Some(name) = &catch.stack_trace {
                            let ty = self.types.named("StackTrace");
                            self.declare(name, ty);
                        }
                        let body = self.lower_block(&catch.body);
                        self.pop_scope();
                        CatchIR {
                            exception_type,
                            exception: catch.exception.clone(),
                            stack_trace: catch.stack_trace.clone(),
                            body,
                        }
                    })
                    .collect();
                let finally = finally.as_ref().map(|f| self.lower_block(f));
                StatementKind::Try {
                    body,
                    catches,
                    finally,
                }
            }
            StmtKind::Assert { condition, message } => StatementKind::Assert {
                condition: self.lower_expr(condition),
                message: message.as_ref().map(|m| self.lower_expr(m)),
            },
            StmtKind::Rethrow => StatementKind::Rethrow,
            StmtKind::Empty => StatementKind::Empty,
        };
        StatementIR {
            id: self.id(),
            location: stmt.location.clone(),
            kind,
        }
    }

    /// A branch body gets its own scope even when it is not a block.
    fn lower_scoped_stmt(&mut self, stmt: &Stmt) -> StatementIR {
        self.push_scope();
        let lowered = self.lower_stmt(stmt);
        self.pop_scope();
        lowered
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPRESSIONS
    // ═══════════════════════════════════════════════════════════════════════════

    fn identifier(&mut self, name: &str, ty: Arc<TypeIR>, is_type_reference: bool, location: &SourceLocation) -> ExpressionIR {
        self.make(
            ExpressionKind::Identifier {
                name: name.to_string(),
                is_this: false,
                is_super: false,
                is_type_reference,
            },
            ty,
            location,
        )
    }

    fn this_expr(&mut self, location: &SourceLocation) -> ExpressionIR {
        let ty = match self.current_class.clone() {
            Some(class) => self.types.named(&class),
            None => self.types.dynamic(),
        };
        self.make(
            ExpressionKind::Identifier {
                name: "this".to_string(),
                is_this: true,
                is_super: false,
                is_type_reference: false,
            },
            ty,
            location,
        )
    }

    fn lower_identifier(&mut self, name: &str, location: &SourceLocation) -> ExpressionIR {
        match self.resolve(name) {
            Binding::Local(ty) | Binding::TopLevel(ty) => self.identifier(name, ty, false, location),
            Binding::Instance { ty, is_method } => {
                let this = self.this_expr(location);
                let is_accessor = !is_method && self.is_instance_accessor(name);
                let access = self.make(
                    ExpressionKind::PropertyAccess {
                        target: Box::new(this),
                        name: name.to_string(),
                        is_null_aware: false,
                        is_accessor,
                    },
                    ty.clone(),
                    location,
                );
                if !is_method {
                    return access;
                }
                // Method tear-off keeps its receiver.
                let this = self.this_expr(location);
                self.make(
                    ExpressionKind::MethodCall {
                        target: Some(Box::new(access)),
                        name: "bind".to_string(),
                        arguments: ArgumentsIR {
                            positional: vec![this],
                            named: BTreeMap::new(),
                        },
                        type_arguments: Vec::new(),
                        is_null_aware: false,
                        is_cascade: false,
                    },
                    ty,
                    location,
                )
            }
            Binding::Static { class, ty } => {
                let class_ty = self.types.named(&class);
                let is_accessor = self.classes.get(&class).map_or(false, |c| c.accessors.contains(name));
                let owner = self.identifier(&class, class_ty, true, location);
                self.make(
                    ExpressionKind::PropertyAccess {
                        target: Box::new(owner),
                        name: name.to_string(),
                        is_null_aware: false,
                        is_accessor,
                    },
                    ty,
                    location,
                )
            }
            Binding::Type => {
                let ty = self.types.named("Type");
                self.identifier(name, ty, true, location)
            }
            Binding::Prefix | Binding::Unknown => {
                let ty = self.types.dynamic();
                self.identifier(name, ty, false, location)
            }
        }
    }

    fn lower_arguments(&mut self, arguments: &[Argument]) -> ArgumentsIR {
        let mut lowered = ArgumentsIR::default();
        for argument in arguments {
            let value = self.lower_expr(&argument.value);
            match &argument.name {
                Some(name) => {
                    if lowered.named.contains_key(name) {
                        self.analysis_error(
                            diagnostics::IR_DUPLICATE_NAMED_ARGUMENT,
                            format!("named argument `{}` is passed more than once", name),
                            &argument.location,
                        );
                        continue;
                    }
                    lowered.named.insert(name.clone(), value);
                }
                None => lowered.positional.push(value),
            }
        }
        lowered
    }

    /// Constructor name to call for `class_name` + written constructor:
    /// same-unit unnamed factories become `create`.
    fn creation_constructor(&self, class_name: &str, constructor: Option<String>) -> Option<String> {
        match constructor {
            Some(name) => Some(name),
            None => {
                let unnamed_factory = self.classes.get(class_name).map_or(false, |c| c.unnamed_factory);
                unnamed_factory.then(|| FACTORY_METHOD.to_string())
            }
        }
    }

    fn instance_creation(
        &mut self,
        class_name: &str,
        type_arguments: &[TypeAnnotation],
        constructor: Option<String>,
        arguments: &[Argument],
        is_const: bool,
        location: &SourceLocation,
    ) -> ExpressionIR {
        let type_arguments = self.lower_type_list(type_arguments);
        let class_type = self.types.generic(class_name, type_arguments);
        let constructor = self.creation_constructor(class_name, constructor);
        let arguments = self.lower_arguments(arguments);
        self.make(
            ExpressionKind::InstanceCreation {
                class_type: class_type.clone(),
                constructor,
                arguments,
                is_const,
            },
            class_type,
            location,
        )
    }

    fn method_call(
        &mut self,
        target: Option<ExpressionIR>,
        name: &str,
        arguments: &[Argument],
        type_arguments: &[TypeAnnotation],
        is_null_aware: bool,
        result_type: Arc<TypeIR>,
        location: &SourceLocation,
    ) -> ExpressionIR {
        let is_cascade = target
            .as_ref()
            .map_or(false, |t| matches!(t.kind, ExpressionKind::CascadeReceiver));
        let type_arguments = self.lower_type_list(type_arguments);
        let arguments = self.lower_arguments(arguments);
        self.make(
            ExpressionKind::MethodCall {
                target: target.map(Box::new),
                name: name.to_string(),
                arguments,
                type_arguments,
                is_null_aware,
                is_cascade,
            },
            result_type,
            location,
        )
    }

    fn lower_call(
        &mut self,
        callee: &Expr,
        type_arguments: &[TypeAnnotation],
        arguments: &[Argument],
        location: &SourceLocation,
    ) -> ExpressionIR {
        match &callee.kind {
            ExprKind::Identifier(name) => match self.resolve(name) {
                Binding::Type => self.instance_creation(name, type_arguments, None, arguments, false, location),
                Binding::Instance { ty: _, .. } => {
                    let this = self.this_expr(location);
                    let dynamic = self.types.dynamic();
                    self.method_call(Some(this), name, arguments, type_arguments, false, dynamic, location)
                }
                Binding::Static { class, .. } => {
                    let class_ty = self.types.named(&class);
                    let owner = self.identifier(&class, class_ty, true, location);
                    let dynamic = self.types.dynamic();
                    self.method_call(Some(owner), name, arguments, type_arguments, false, dynamic, location)
                }
                Binding::TopLevel(return_type) => {
                    self.method_call(None, name, arguments, type_arguments, false, return_type, location)
                }
                Binding::Local(_) | Binding::Prefix | Binding::Unknown => {
                    let dynamic = self.types.dynamic();
                    self.method_call(None, name, arguments, type_arguments, false, dynamic, location)
                }
            },
            ExprKind::PropertyAccess {
                target,
                name,
                null_aware,
            } => {
                if let Some(owner) = target.as_identifier() {
                    match self.resolve(owner) {
                        Binding::Type => {
                            let is_constructor = self
                                .classes
                                .get(owner)
                                .map_or(false, |c| c.constructors.contains(name.as_str()));
                            if is_constructor {
                                let owner = owner.to_string();
                                return self.instance_creation(
                                    &owner,
                                    type_arguments,
                                    Some(name.clone()),
                                    arguments,
                                    false,
                                    location,
                                );
                            }
                        }
                        Binding::Prefix if is_type_like(name) => {
                            let qualified = format!("{}.{}", owner, name);
                            return self.instance_creation(&qualified, type_arguments, None, arguments, false, location);
                        }
                        _ => {}
                    }
                }
                let target = self.lower_expr(target);
                let dynamic = self.types.dynamic();
                self.method_call(Some(target), name, arguments, type_arguments, *null_aware, dynamic, location)
            }
            ExprKind::Super => {
                // `super(...)` outside an initializer list is malformed.
                let dynamic = self.types.dynamic();
                self.make(
                    ExpressionKind::Invalid {
                        reason: "`super` is not callable here".to_string(),
                    },
                    dynamic,
                    location,
                )
            }
            _ => {
                let callee = self.lower_expr(callee);
                let arguments = self.lower_arguments(arguments);
                let dynamic = self.types.dynamic();
                self.make(
                    ExpressionKind::Invoke {
                        callee: Box::new(callee),
                        arguments,
                    },
                    dynamic,
                    location,
                )
            }
        }
    }

    fn lower_elements(&mut self, elements: &[CollectionElement], check_keys: bool) -> Vec<CollectionElementIR> {
        let mut seen_keys: Vec<LiteralValue> = Vec::new();
        let mut lowered = Vec::new();
        for element in elements {
            if check_keys {
                if let CollectionElement::MapEntry { key, .. } = element {
                    if let Some(value) = constant_key(key) {
                        if seen_keys.contains(&value) {
                            self.analysis_error(
                                diagnostics::IR_DUPLICATE_MAP_KEY,
                                "duplicate key in map literal".to_string(),
                                &key.location,
                            );
                            continue;
                        }
                        seen_keys.push(value);
                    }
                }
            }
            lowered.push(self.lower_element(element));
        }
        lowered
    }

    fn lower_element(&mut self, element: &CollectionElement) -> CollectionElementIR {
        match element {
            CollectionElement::Expr { expr } => CollectionElementIR::Expression {
                value: self.lower_expr(expr),
            },
            CollectionElement::MapEntry { key, value } => CollectionElementIR::Entry(MapEntryIR {
                key: self.lower_expr(key),
                value: self.lower_expr(value),
            }),
            CollectionElement::Spread { expr, null_aware } => CollectionElementIR::Spread {
                value: self.lower_expr(expr),
                is_null_aware: *null_aware,
            },
            CollectionElement::If {
                condition,
                then,
                otherwise,
            } => CollectionElementIR::If {
                condition: self.lower_expr(condition),
                then: Box::new(self.lower_element(then)),
                otherwise: otherwise.as_ref().map(|o| Box::new(self.lower_element(o))),
            },
        }
    }

    /// Element type argument, or the common type of plain elements.
    fn element_type(&mut self, type_arguments: &[TypeAnnotation], index: usize, elements: &[CollectionElementIR]) -> Arc<TypeIR> {
        if let Some(ty) = type_arguments.get(index) {
            return self.lower_type(ty);
        }
        let mut common: Option<Arc<TypeIR>> = None;
        for element in elements {
            let ty = match element {
                CollectionElementIR::Expression { value } => value.result_type.clone(),
                CollectionElementIR::Entry(entry) if index == 0 => entry.key.result_type.clone(),
                CollectionElementIR::Entry(entry) => entry.value.result_type.clone(),
                _ => return self.types.dynamic(),
            };
            match &common {
                None => common = Some(ty),
                Some(existing) if *existing == ty => {}
                Some(_) => return self.types.dynamic(),
            }
        }
        common.unwrap_or_else(|| self.types.dynamic())
    }

    fn lower_lambda(&mut self, parameters: &ParameterList, body: &FunctionBody, location: &SourceLocation) -> ExpressionIR {
        self.enter_function();
        self.captures.push((self.function_depth, BTreeSet::new()));
        let parameters = self.lower_parameters(parameters);
        let lowered_body = self.lower_body(body);
        let captured = self.captures.pop().map(|(_, c)| c).unwrap_or_default();
        self.exit_function();
        let ty = self.types.named("Function");
        self.make(
            ExpressionKind::Lambda {
                parameters,
                body: Box::new(lowered_body),
                is_async: body.modifier.is_async(),
                is_generator: body.modifier.is_generator(),
                captured,
            },
            ty,
            location,
        )
    }

    fn lower_expr(&mut self, expr: &Expr) -> ExpressionIR {
        let location = &expr.location;
        match &expr.kind {
            ExprKind::Literal(literal) => {
                let ty = self.literal_type(literal);
                let value = match literal {
                    Literal::Int(v) => LiteralValue::Integer(*v),
                    Literal::Double(v) => LiteralValue::Double(*v),
                    Literal::String(v) => LiteralValue::String(v.clone()),
                    Literal::Bool(v) => LiteralValue::Boolean(*v),
                    Literal::Null => LiteralValue::Null,
                };
                self.make(ExpressionKind::Literal { value }, ty, location)
            }
            ExprKind::StringInterpolation(parts) => {
                let parts = parts
                    .iter()
                    .map(|part| match part {
                        StringPart::Text { value } => StringPartIR::Text { value: value.clone() },
                        StringPart::Interpolation { expr } => StringPartIR::Expression {
                            expr: self.lower_expr(expr),
                        },
                    })
                    .collect();
                let ty = self.types.named("String");
                self.make(ExpressionKind::InterpolatedString { parts }, ty, location)
            }
            ExprKind::Identifier(name) => self.lower_identifier(name, location),
            ExprKind::This => self.this_expr(location),
            ExprKind::Super => {
                let ty = self.types.dynamic();
                self.make(
                    ExpressionKind::Identifier {
                        name: "super".to_string(),
                        is_this: false,
                        is_super: true,
                        is_type_reference: false,
                    },
                    ty,
                    location,
                )
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.lower_expr(left);
                let right = self.lower_expr(right);
                let ty = self.binary_type(*op, &left.result_type, &right.result_type);
                self.make(
                    ExpressionKind::Binary {
                        left: Box::new(left),
                        op: *op,
                        right: Box::new(right),
                    },
                    ty,
                    location,
                )
            }
            ExprKind::Unary { op, operand, prefix } => {
                let operand = self.lower_expr(operand);
                let ty = if *op == UnaryOp::Not {
                    self.types.named("bool")
                } else {
                    operand.result_type.clone()
                };
                self.make(
                    ExpressionKind::Unary {
                        op: *op,
                        operand: Box::new(operand),
                        is_prefix: *prefix,
                    },
                    ty,
                    location,
                )
            }
            ExprKind::NullAssert(operand) => {
                let operand = self.lower_expr(operand);
                let ty = self.types.intern(TypeIR {
                    nullable: false,
                    ..(*operand.result_type).clone()
                });
                self.make(
                    ExpressionKind::NullAssert {
                        operand: Box::new(operand),
                    },
                    ty,
                    location,
                )
            }
            ExprKind::Assign { op, target, value } => {
                let target = self.lower_expr(target);
                let value = self.lower_expr(value);
                let ty = value.result_type.clone();
                self.make(
                    ExpressionKind::Assignment {
                        target: Box::new(target),
                        value: Box::new(value),
                        operator: *op,
                    },
                    ty,
                    location,
                )
            }
            ExprKind::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                let condition = self.lower_expr(condition);
                let then_expr = self.lower_expr(then_expr);
                let else_expr = self.lower_expr(else_expr);
                let ty = if then_expr.result_type == else_expr.result_type {
                    then_expr.result_type.clone()
                } else {
                    self.types.dynamic()
                };
                self.make(
                    ExpressionKind::Conditional {
                        condition: Box::new(condition),
                        then_expr: Box::new(then_expr),
                        else_expr: Box::new(else_expr),
                    },
                    ty,
                    location,
                )
            }
            ExprKind::Call {
                callee,
                type_arguments,
                arguments,
            } => self.lower_call(callee, type_arguments, arguments, location),
            ExprKind::New {
                is_const,
                ty,
                constructor,
                arguments,
            } => self.instance_creation(&ty.name, &ty.arguments, constructor.clone(), arguments, *is_const, location),
            ExprKind::PropertyAccess {
                target,
                name,
                null_aware,
            } => {
                let target = self.lower_expr(target);
                let on_this = matches!(target.kind, ExpressionKind::Identifier { is_this: true, .. });
                let ty = if on_this {
                    self.instance_member(name)
                        .map(|(ty, _)| self.types.intern((*ty).clone()))
                        .unwrap_or_else(|| self.types.dynamic())
                } else if name == "length" {
                    self.types.named("int")
                } else {
                    self.types.dynamic()
                };
                let is_accessor = on_this && self.is_instance_accessor(name);
                self.make(
                    ExpressionKind::PropertyAccess {
                        target: Box::new(target),
                        name: name.clone(),
                        is_null_aware: *null_aware,
                        is_accessor,
                    },
                    ty,
                    location,
                )
            }
            ExprKind::Index {
                target,
                index,
                null_aware,
            } => {
                let target = self.lower_expr(target);
                let index = self.lower_expr(index);
                let ty = match target.result_type.name.as_str() {
                    "List" => target.result_type.arguments.first().cloned(),
                    "Map" => target.result_type.arguments.get(1).cloned(),
                    _ => None,
                }
                .unwrap_or_else(|| self.types.dynamic());
                self.make(
                    ExpressionKind::IndexAccess {
                        target: Box::new(target),
                        index: Box::new(index),
                        is_null_aware: *null_aware,
                    },
                    ty,
                    location,
                )
            }
            ExprKind::Cascade {
                target,
                sections,
                null_aware,
            } => {
                let target = self.lower_expr(target);
                let ty = target.result_type.clone();
                self.cascade_types.push(ty.clone());
                let sections = sections.iter().map(|s| self.lower_expr(s)).collect();
                self.cascade_types.pop();
                self.make(
                    ExpressionKind::Cascade {
                        target: Box::new(target),
                        sections,
                        is_null_aware: *null_aware,
                    },
                    ty,
                    location,
                )
            }
            ExprKind::CascadeReceiver => {
                let ty = self
                    .cascade_types
                    .last()
                    .cloned()
                    .unwrap_or_else(|| self.types.dynamic());
                self.make(ExpressionKind::CascadeReceiver, ty, location)
            }
            ExprKind::Lambda { parameters, body } => self.lower_lambda(parameters, body, location),
            ExprKind::ListLiteral {
                is_const,
                type_arguments,
                elements,
            } => {
                let elements = self.lower_elements(elements, false);
                let element_type = self.element_type(type_arguments, 0, &elements);
                let ty = self.types.generic("List", vec![element_type.clone()]);
                self.make(
                    ExpressionKind::ListLiteral {
                        elements,
                        element_type,
                        is_const: *is_const,
                    },
                    ty,
                    location,
                )
            }
            ExprKind::SetLiteral {
                is_const,
                type_arguments,
                elements,
            } => {
                let elements = self.lower_elements(elements, false);
                let element_type = self.element_type(type_arguments, 0, &elements);
                let ty = self.types.generic("Set", vec![element_type.clone()]);
                self.make(
                    ExpressionKind::SetLiteral {
                        elements,
                        element_type,
                        is_const: *is_const,
                    },
                    ty,
                    location,
                )
            }
            ExprKind::MapLiteral {
                is_const,
                type_arguments,
                elements,
            } => {
                let entries = self.lower_elements(elements, true);
                let key_type = self.element_type(type_arguments, 0, &entries);
                let value_type = self.element_type(type_arguments, 1, &entries);
                let ty = self
                    .types
                    .generic("Map", vec![key_type.clone(), value_type.clone()]);
                self.make(
                    ExpressionKind::MapLiteral {
                        entries,
                        key_type,
                        value_type,
                        is_const: *is_const,
                    },
                    ty,
                    location,
                )
            }
            ExprKind::Await(operand) => {
                let operand = self.lower_expr(operand);
                let ty = match operand.result_type.name.as_str() {
                    "Future" => operand.result_type.arguments.first().cloned(),
                    _ => None,
                }
                .unwrap_or_else(|| self.types.dynamic());
                self.make(
                    ExpressionKind::Await {
                        operand: Box::new(operand),
                    },
                    ty,
                    location,
                )
            }
            ExprKind::Throw(value) => {
                let value = self.lower_expr(value);
                let ty = self.types.named("Never");
                self.make(ExpressionKind::Throw { value: Box::new(value) }, ty, location)
            }
            ExprKind::As { expr, ty } => {
                let inner = self.lower_expr(expr);
                let target_type = self.lower_type(ty);
                self.make(
                    ExpressionKind::Cast {
                        expr: Box::new(inner),
                        target_type: target_type.clone(),
                    },
                    target_type,
                    location,
                )
            }
            ExprKind::Is { expr, ty, negated } => {
                let inner = self.lower_expr(expr);
                let tested_type = self.lower_type(ty);
                let bool_ty = self.types.named("bool");
                self.make(
                    ExpressionKind::TypeCheck {
                        expr: Box::new(inner),
                        tested_type,
                        negated: *negated,
                    },
                    bool_ty,
                    location,
                )
            }
            ExprKind::Error(text) => {
                let ty = self.types.dynamic();
                let reason = if text.is_empty() {
                    "malformed expression".to_string()
                } else {
                    format!("malformed expression near '{}'", text)
                };
                self.make(ExpressionKind::Invalid { reason }, ty, location)
            }
        }
    }
}

fn mutability(modifier: VarModifier) -> Mutability {
    match modifier {
        VarModifier::Final => Mutability::Final,
        VarModifier::Const => Mutability::Const,
        VarModifier::Var | VarModifier::Typed => Mutability::Mutable,
    }
}

/// Literal value of a constant map key, if it is one.
fn constant_key(key: &Expr) -> Option<LiteralValue> {
    match &key.kind {
        ExprKind::Literal(Literal::String(v)) => Some(LiteralValue::String(v.clone())),
        ExprKind::Literal(Literal::Int(v)) => Some(LiteralValue::Integer(*v)),
        ExprKind::Literal(Literal::Double(v)) => Some(LiteralValue::Double(*v)),
        ExprKind::Literal(Literal::Bool(v)) => Some(LiteralValue::Boolean(*v)),
        ExprKind::Literal(Literal::Null) => Some(LiteralValue::Null),
        _ => None,
    }
}
