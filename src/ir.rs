//! Typed intermediate representation
//!
//! The IR is a closed set of tagged variants built once from the syntax tree
//! and never mutated afterwards. It is a tree except for `Arc<TypeIR>`
//! references, which are interned and shared. Every expression carries a
//! unique id, a result type and a source location.
//!
//! The JSON form is versioned by `IR_SCHEMA_VERSION`. Fields documented as
//! optional default to `None`/empty when absent; every other field is
//! required and a missing one is a `SchemaError`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::ast::{AssignOp, BinaryOp, MethodKind, ParameterForm, UnaryOp};
use crate::diagnostics::SourceLocation;

pub const IR_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unsupported IR schema version {found} (expected {expected})")]
    VersionMismatch { expected: u32, found: u64 },
    #[error("IR document is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("malformed IR document: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IrId(pub u32);

impl fmt::Display for IrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Display name, generic arguments and nullability of a type reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeIR {
    pub name: String,
    /// Optional, defaults to no arguments.
    #[serde(default)]
    pub arguments: Vec<Arc<TypeIR>>,
    /// Optional, defaults to `false`.
    #[serde(default)]
    pub nullable: bool,
}

impl TypeIR {
    pub fn named(name: &str) -> Self {
        TypeIR {
            name: name.to_string(),
            arguments: Vec::new(),
            nullable: false,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.name == "dynamic"
    }
}

impl fmt::Display for TypeIR {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.arguments.is_empty() {
            let args: Vec<String> = self.arguments.iter().map(|a| a.to_string()).collect();
            write!(f, "<{}>", args.join(", "))?;
        }
        if self.nullable {
            write!(f, "?")?;
        }
        Ok(())
    }
}

/// Per-unit type table: structurally equal types share one `Arc`.
#[derive(Debug, Default)]
pub struct TypeInterner {
    table: HashMap<TypeIR, Arc<TypeIR>>,
}

impl TypeInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, ty: TypeIR) -> Arc<TypeIR> {
        if let Some(existing) = self.table.get(&ty) {
            return existing.clone();
        }
        let shared = Arc::new(ty.clone());
        self.table.insert(ty, shared.clone());
        shared
    }

    pub fn named(&mut self, name: &str) -> Arc<TypeIR> {
        self.intern(TypeIR::named(name))
    }

    pub fn generic(&mut self, name: &str, arguments: Vec<Arc<TypeIR>>) -> Arc<TypeIR> {
        self.intern(TypeIR {
            name: name.to_string(),
            arguments,
            nullable: false,
        })
    }

    pub fn dynamic(&mut self) -> Arc<TypeIR> {
        self.named("dynamic")
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionIR {
    pub id: IrId,
    pub result_type: Arc<TypeIR>,
    pub location: SourceLocation,
    pub kind: ExpressionKind,
}

/// Literal payload, one concrete representation per literal kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "literalKind", content = "value", rename_all = "lowercase")]
pub enum LiteralValue {
    String(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StringPartIR {
    Text { value: String },
    Expression { expr: ExpressionIR },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapEntryIR {
    pub key: ExpressionIR,
    pub value: ExpressionIR,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CollectionElementIR {
    Expression {
        value: ExpressionIR,
    },
    Entry(MapEntryIR),
    #[serde(rename_all = "camelCase")]
    Spread {
        value: ExpressionIR,
        is_null_aware: bool,
    },
    If {
        condition: ExpressionIR,
        then: Box<CollectionElementIR>,
        /// Optional.
        #[serde(default)]
        otherwise: Option<Box<CollectionElementIR>>,
    },
}

/// Positional arguments keep source order; named arguments are keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgumentsIR {
    pub positional: Vec<ExpressionIR>,
    pub named: BTreeMap<String, ExpressionIR>,
}

impl ArgumentsIR {
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExpressionIR> {
        self.positional.iter().chain(self.named.values())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ExpressionKind {
    Literal {
        value: LiteralValue,
    },
    #[serde(rename_all = "camelCase")]
    Identifier {
        name: String,
        is_this: bool,
        is_super: bool,
        is_type_reference: bool,
    },
    Binary {
        left: Box<ExpressionIR>,
        op: BinaryOp,
        right: Box<ExpressionIR>,
    },
    #[serde(rename_all = "camelCase")]
    Unary {
        op: UnaryOp,
        operand: Box<ExpressionIR>,
        is_prefix: bool,
    },
    #[serde(rename_all = "camelCase")]
    MethodCall {
        /// Optional; `None` for calls of top-level functions and locals.
        #[serde(default)]
        target: Option<Box<ExpressionIR>>,
        name: String,
        arguments: ArgumentsIR,
        #[serde(default)]
        type_arguments: Vec<Arc<TypeIR>>,
        is_null_aware: bool,
        is_cascade: bool,
    },
    /// Call of an arbitrary function-valued expression.
    Invoke {
        callee: Box<ExpressionIR>,
        arguments: ArgumentsIR,
    },
    /// `C(...)`, `new C.named(...)`, `const C()`. A named constructor is
    /// emitted as a static call.
    #[serde(rename_all = "camelCase")]
    InstanceCreation {
        class_type: Arc<TypeIR>,
        /// Optional; `None` for the unnamed constructor.
        #[serde(default)]
        constructor: Option<String>,
        arguments: ArgumentsIR,
        is_const: bool,
    },
    #[serde(rename_all = "camelCase")]
    PropertyAccess {
        target: Box<ExpressionIR>,
        name: String,
        is_null_aware: bool,
        /// `name` is a getter or setter declared in this unit.
        #[serde(default)]
        is_accessor: bool,
    },
    #[serde(rename_all = "camelCase")]
    IndexAccess {
        target: Box<ExpressionIR>,
        index: Box<ExpressionIR>,
        is_null_aware: bool,
    },
    #[serde(rename_all = "camelCase")]
    Conditional {
        condition: Box<ExpressionIR>,
        then_expr: Box<ExpressionIR>,
        else_expr: Box<ExpressionIR>,
    },
    #[serde(rename_all = "camelCase")]
    Lambda {
        parameters: Vec<ParameterIR>,
        body: Box<FunctionBodyIR>,
        is_async: bool,
        is_generator: bool,
        /// Free variables bound in an enclosing function, sorted.
        captured: BTreeSet<String>,
    },
    #[serde(rename_all = "camelCase")]
    ListLiteral {
        elements: Vec<CollectionElementIR>,
        element_type: Arc<TypeIR>,
        is_const: bool,
    },
    #[serde(rename_all = "camelCase")]
    MapLiteral {
        entries: Vec<CollectionElementIR>,
        key_type: Arc<TypeIR>,
        value_type: Arc<TypeIR>,
        is_const: bool,
    },
    #[serde(rename_all = "camelCase")]
    SetLiteral {
        elements: Vec<CollectionElementIR>,
        element_type: Arc<TypeIR>,
        is_const: bool,
    },
    Await {
        operand: Box<ExpressionIR>,
    },
    #[serde(rename_all = "camelCase")]
    Cast {
        expr: Box<ExpressionIR>,
        target_type: Arc<TypeIR>,
    },
    #[serde(rename_all = "camelCase")]
    TypeCheck {
        expr: Box<ExpressionIR>,
        tested_type: Arc<TypeIR>,
        negated: bool,
    },
    InterpolatedString {
        parts: Vec<StringPartIR>,
    },
    Assignment {
        target: Box<ExpressionIR>,
        value: Box<ExpressionIR>,
        operator: AssignOp,
    },
    /// Sections are rooted at `CascadeReceiver`.
    #[serde(rename_all = "camelCase")]
    Cascade {
        target: Box<ExpressionIR>,
        sections: Vec<ExpressionIR>,
        is_null_aware: bool,
    },
    CascadeReceiver,
    Throw {
        value: Box<ExpressionIR>,
    },
    NullAssert {
        operand: Box<ExpressionIR>,
    },
    /// Malformed source carried through; code generation fails the
    /// enclosing declaration.
    Invalid {
        reason: String,
    },
}

impl ExpressionIR {
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ExpressionKind::Literal { .. } => "Literal",
            ExpressionKind::Identifier { .. } => "Identifier",
            ExpressionKind::Binary { .. } => "Binary",
            ExpressionKind::Unary { .. } => "Unary",
            ExpressionKind::MethodCall { .. } => "MethodCall",
            ExpressionKind::Invoke { .. } => "Invoke",
            ExpressionKind::InstanceCreation { .. } => "InstanceCreation",
            ExpressionKind::PropertyAccess { .. } => "PropertyAccess",
            ExpressionKind::IndexAccess { .. } => "IndexAccess",
            ExpressionKind::Conditional { .. } => "Conditional",
            ExpressionKind::Lambda { .. } => "Lambda",
            ExpressionKind::ListLiteral { .. } => "ListLiteral",
            ExpressionKind::MapLiteral { .. } => "MapLiteral",
            ExpressionKind::SetLiteral { .. } => "SetLiteral",
            ExpressionKind::Await { .. } => "Await",
            ExpressionKind::Cast { .. } => "Cast",
            ExpressionKind::TypeCheck { .. } => "TypeCheck",
            ExpressionKind::InterpolatedString { .. } => "InterpolatedString",
            ExpressionKind::Assignment { .. } => "Assignment",
            ExpressionKind::Cascade { .. } => "Cascade",
            ExpressionKind::CascadeReceiver => "CascadeReceiver",
            ExpressionKind::Throw { .. } => "Throw",
            ExpressionKind::NullAssert { .. } => "NullAssert",
            ExpressionKind::Invalid { .. } => "Invalid",
        }
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(
            self.kind,
            ExpressionKind::Literal {
                value: LiteralValue::Null
            }
        )
    }

    pub fn identifier_name(&self) -> Option<&str> {
        match &self.kind {
            ExpressionKind::Identifier { name, .. } => Some(name),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FUNCTIONS & STATEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterKind {
    Positional,
    OptionalPositional,
    Named,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterIR {
    pub id: IrId,
    pub name: String,
    pub ty: Arc<TypeIR>,
    pub kind: ParameterKind,
    pub is_required: bool,
    /// Optional.
    #[serde(default)]
    pub default_value: Option<ExpressionIR>,
    pub form: ParameterForm,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FunctionBodyIR {
    Block { statements: Vec<StatementIR> },
    Expression { expr: ExpressionIR },
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementIR {
    pub id: IrId,
    pub location: SourceLocation,
    pub kind: StatementKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mutability {
    Mutable,
    Final,
    Const,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaratorIR {
    pub id: IrId,
    pub name: String,
    /// Optional.
    #[serde(default)]
    pub initializer: Option<ExpressionIR>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDeclIR {
    pub id: IrId,
    pub mutability: Mutability,
    pub is_late: bool,
    pub ty: Arc<TypeIR>,
    pub declarators: Vec<DeclaratorIR>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchCaseIR {
    pub patterns: Vec<ExpressionIR>,
    pub is_default: bool,
    pub body: Vec<StatementIR>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatchIR {
    /// Optional; `None` catches everything.
    #[serde(default)]
    pub exception_type: Option<Arc<TypeIR>>,
    #[serde(default)]
    pub exception: Option<String>,
    #[serde(default)]
    pub stack_trace: Option<String>,
    pub body: Vec<StatementIR>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StatementKind {
    Block {
        statements: Vec<StatementIR>,
    },
    Expression {
        expr: ExpressionIR,
    },
    Variable(VariableDeclIR),
    Function(FunctionDecl),
    #[serde(rename_all = "camelCase")]
    If {
        condition: ExpressionIR,
        then_branch: Box<StatementIR>,
        #[serde(default)]
        else_branch: Option<Box<StatementIR>>,
    },
    For {
        #[serde(default)]
        init: Option<Box<StatementIR>>,
        #[serde(default)]
        condition: Option<ExpressionIR>,
        updates: Vec<ExpressionIR>,
        body: Box<StatementIR>,
    },
    #[serde(rename_all = "camelCase")]
    ForIn {
        variable: String,
        mutability: Mutability,
        iterable: ExpressionIR,
        body: Box<StatementIR>,
        is_await: bool,
    },
    While {
        condition: ExpressionIR,
        body: Box<StatementIR>,
    },
    DoWhile {
        body: Box<StatementIR>,
        condition: ExpressionIR,
    },
    Switch {
        subject: ExpressionIR,
        cases: Vec<SwitchCaseIR>,
    },
    Return {
        #[serde(default)]
        value: Option<ExpressionIR>,
    },
    Break {
        #[serde(default)]
        label: Option<String>,
    },
    Continue {
        #[serde(default)]
        label: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Yield {
        value: ExpressionIR,
        is_star: bool,
    },
    Try {
        body: Vec<StatementIR>,
        catches: Vec<CatchIR>,
        #[serde(default)]
        finally: Option<Vec<StatementIR>>,
    },
    Assert {
        condition: ExpressionIR,
        #[serde(default)]
        message: Option<ExpressionIR>,
    },
    Rethrow,
    Empty,
}

impl StatementIR {
    /// Statements after which control never falls through.
    pub fn is_jump(&self) -> bool {
        match &self.kind {
            StatementKind::Return { .. }
            | StatementKind::Break { .. }
            | StatementKind::Continue { .. }
            | StatementKind::Rethrow => true,
            StatementKind::Expression { expr } => matches!(expr.kind, ExpressionKind::Throw { .. }),
            StatementKind::Block { statements } => statements.last().map_or(false, StatementIR::is_jump),
            _ => false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECLARATIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDecl {
    pub id: IrId,
    pub name: String,
    pub return_type: Arc<TypeIR>,
    #[serde(default)]
    pub type_parameters: Vec<String>,
    pub parameters: Vec<ParameterIR>,
    pub body: FunctionBodyIR,
    pub is_async: bool,
    pub is_generator: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDecl {
    pub id: IrId,
    pub name: String,
    pub ty: Arc<TypeIR>,
    #[serde(default)]
    pub initializer: Option<ExpressionIR>,
    pub mutability: Mutability,
    pub is_late: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConstructorKind {
    Generative,
    Factory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InitializerIR {
    Field {
        name: String,
        value: ExpressionIR,
    },
    SuperCall {
        #[serde(default)]
        constructor: Option<String>,
        arguments: ArgumentsIR,
    },
    Redirect {
        #[serde(default)]
        constructor: Option<String>,
        arguments: ArgumentsIR,
    },
    Assert {
        condition: ExpressionIR,
        #[serde(default)]
        message: Option<ExpressionIR>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructorDecl {
    pub id: IrId,
    /// Optional; `None` for the unnamed constructor.
    #[serde(default)]
    pub name: Option<String>,
    pub kind: ConstructorKind,
    pub is_const: bool,
    pub parameters: Vec<ParameterIR>,
    #[serde(default)]
    pub initializers: Vec<InitializerIR>,
    pub body: FunctionBodyIR,
    pub location: SourceLocation,
}

impl ConstructorDecl {
    pub fn is_unnamed_generative(&self) -> bool {
        self.name.is_none() && self.kind == ConstructorKind::Generative
    }

    pub fn redirect(&self) -> Option<(&Option<String>, &ArgumentsIR)> {
        self.initializers.iter().find_map(|i| match i {
            InitializerIR::Redirect {
                constructor,
                arguments,
            } => Some((constructor, arguments)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodDecl {
    pub id: IrId,
    pub name: String,
    pub kind: MethodKind,
    pub return_type: Arc<TypeIR>,
    #[serde(default)]
    pub type_parameters: Vec<String>,
    pub parameters: Vec<ParameterIR>,
    pub body: FunctionBodyIR,
    pub is_async: bool,
    pub is_generator: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDecl {
    pub id: IrId,
    pub name: String,
    /// Optional.
    #[serde(default)]
    pub superclass: Option<Arc<TypeIR>>,
    #[serde(default)]
    pub type_parameters: Vec<String>,
    pub is_abstract: bool,
    pub fields: Vec<FieldDecl>,
    pub static_fields: Vec<FieldDecl>,
    pub constructors: Vec<ConstructorDecl>,
    pub methods: Vec<MethodDecl>,
    pub static_methods: Vec<MethodDecl>,
    pub location: SourceLocation,
}

impl ClassDecl {
    pub fn has_unnamed_generative_constructor(&self) -> bool {
        self.constructors.iter().any(ConstructorDecl::is_unnamed_generative)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumDecl {
    pub id: IrId,
    pub name: String,
    pub values: Vec<String>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDecl {
    pub id: IrId,
    pub uri: String,
    /// Target module specifier after alias resolution.
    pub module: String,
    #[serde(default)]
    pub prefix: Option<String>,
    /// Names bound by this import, sorted.
    #[serde(default)]
    pub items: Vec<String>,
    pub is_framework: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDecl {
    pub id: IrId,
    pub uri: String,
    pub module: String,
    #[serde(default)]
    pub show: Vec<String>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DeclarationIR {
    Class(ClassDecl),
    Function(FunctionDecl),
    Variable(VariableDeclIR),
    Enum(EnumDecl),
    Import(ImportDecl),
    Export(ExportDecl),
}

impl DeclarationIR {
    /// Name used in diagnostics.
    pub fn name(&self) -> String {
        match self {
            DeclarationIR::Class(c) => c.name.clone(),
            DeclarationIR::Function(f) => f.name.clone(),
            DeclarationIR::Variable(v) => v
                .declarators
                .iter()
                .map(|d| d.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            DeclarationIR::Enum(e) => e.name.clone(),
            DeclarationIR::Import(i) => i.uri.clone(),
            DeclarationIR::Export(e) => e.uri.clone(),
        }
    }

    pub fn id(&self) -> IrId {
        match self {
            DeclarationIR::Class(c) => c.id,
            DeclarationIR::Function(f) => f.id,
            DeclarationIR::Variable(v) => v.id,
            DeclarationIR::Enum(e) => e.id,
            DeclarationIR::Import(i) => i.id,
            DeclarationIR::Export(e) => e.id,
        }
    }

    pub fn location(&self) -> &SourceLocation {
        match self {
            DeclarationIR::Class(c) => &c.location,
            DeclarationIR::Function(f) => &f.location,
            DeclarationIR::Variable(v) => &v.location,
            DeclarationIR::Enum(e) => &e.location,
            DeclarationIR::Import(i) => &i.location,
            DeclarationIR::Export(e) => &e.location,
        }
    }
}

/// The IR of one compilation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrModule {
    pub schema_version: u32,
    pub file: String,
    pub declarations: Vec<DeclarationIR>,
}

impl IrModule {
    pub fn new(file: &str, declarations: Vec<DeclarationIR>) -> Self {
        IrModule {
            schema_version: IR_SCHEMA_VERSION,
            file: file.to_string(),
            declarations,
        }
    }

    pub fn to_json(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let found = value
            .get("schemaVersion")
            .and_then(serde_json::Value::as_u64)
            .ok_or(SchemaError::MissingField("schemaVersion"))?;
        if found != u64::from(IR_SCHEMA_VERSION) {
            return Err(SchemaError::VersionMismatch {
                expected: IR_SCHEMA_VERSION,
                found,
            });
        }
        Ok(serde_json::from_value(value)?)
    }
}
