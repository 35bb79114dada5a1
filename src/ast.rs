//! Syntax tree produced by the parser.
//!
//! Nodes are created once per parse and never mutated. Malformed input still
//! produces nodes (`ExprKind::Error`), and every node carries a `NodeId` that is
//! unique within its compilation unit plus a `SourceLocation`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::diagnostics::SourceLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationUnit {
    pub file: Arc<str>,
    pub declarations: Vec<Declaration>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECLARATIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Declaration {
    Import(ImportDirective),
    Export(ExportDirective),
    Class(ClassDeclaration),
    Enum(EnumDeclaration),
    Function(FunctionDeclaration),
    Variable(VariableDeclaration),
}

impl Declaration {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Declaration::Import(d) => &d.location,
            Declaration::Export(d) => &d.location,
            Declaration::Class(d) => &d.location,
            Declaration::Enum(d) => &d.location,
            Declaration::Function(d) => &d.location,
            Declaration::Variable(d) => &d.location,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub name: String,
    pub arguments: Option<Vec<Argument>>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDirective {
    pub id: NodeId,
    pub uri: String,
    pub prefix: Option<String>,
    pub show: Vec<String>,
    pub hide: Vec<String>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDirective {
    pub id: NodeId,
    pub uri: String,
    pub show: Vec<String>,
    pub hide: Vec<String>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeParameter {
    pub name: String,
    pub bound: Option<TypeAnnotation>,
    pub location: SourceLocation,
}

/// A written type. `Function(...)` types keep only the `Function` name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeAnnotation {
    pub name: String,
    pub arguments: Vec<TypeAnnotation>,
    pub nullable: bool,
    pub location: SourceLocation,
}

impl TypeAnnotation {
    pub fn display(&self) -> String {
        let mut out = self.name.clone();
        if !self.arguments.is_empty() {
            let args: Vec<String> = self.arguments.iter().map(TypeAnnotation::display).collect();
            out.push('<');
            out.push_str(&args.join(", "));
            out.push('>');
        }
        if self.nullable {
            out.push('?');
        }
        out
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDeclaration {
    pub id: NodeId,
    pub name: String,
    pub is_abstract: bool,
    pub type_parameters: Vec<TypeParameter>,
    pub superclass: Option<TypeAnnotation>,
    pub mixins: Vec<TypeAnnotation>,
    pub interfaces: Vec<TypeAnnotation>,
    pub members: Vec<ClassMember>,
    pub annotations: Vec<Annotation>,
    pub doc: Option<String>,
    pub location: SourceLocation,
}

impl ClassDeclaration {
    pub fn methods(&self) -> impl Iterator<Item = &MethodDeclaration> {
        self.members.iter().filter_map(|m| match m {
            ClassMember::Method(method) => Some(method),
            _ => None,
        })
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDeclaration> {
        self.members.iter().filter_map(|m| match m {
            ClassMember::Field(field) => Some(field),
            _ => None,
        })
    }

    pub fn constructors(&self) -> impl Iterator<Item = &ConstructorDeclaration> {
        self.members.iter().filter_map(|m| match m {
            ClassMember::Constructor(ctor) => Some(ctor),
            _ => None,
        })
    }

    pub fn find_method(&self, name: &str) -> Option<&MethodDeclaration> {
        self.methods().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClassMember {
    Field(FieldDeclaration),
    Constructor(ConstructorDeclaration),
    Method(MethodDeclaration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VarModifier {
    Var,
    Final,
    Const,
    /// Only a type was written (`int x;`).
    Typed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDeclarator {
    pub id: NodeId,
    pub name: String,
    pub initializer: Option<Expr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDeclaration {
    pub id: NodeId,
    pub is_static: bool,
    pub is_late: bool,
    pub modifier: VarModifier,
    pub ty: Option<TypeAnnotation>,
    pub declarators: Vec<VariableDeclarator>,
    pub annotations: Vec<Annotation>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ConstructorInitializer {
    Field {
        name: String,
        value: Expr,
        location: SourceLocation,
    },
    Super {
        constructor: Option<String>,
        arguments: Vec<Argument>,
        location: SourceLocation,
    },
    Redirect {
        constructor: Option<String>,
        arguments: Vec<Argument>,
        location: SourceLocation,
    },
    Assert {
        condition: Expr,
        message: Option<Expr>,
        location: SourceLocation,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructorDeclaration {
    pub id: NodeId,
    pub class_name: String,
    /// `None` for the unnamed constructor.
    pub name: Option<String>,
    pub is_factory: bool,
    pub is_const: bool,
    pub parameters: ParameterList,
    pub initializers: Vec<ConstructorInitializer>,
    /// `factory A() = B;` target.
    pub redirect_target: Option<TypeAnnotation>,
    pub body: FunctionBody,
    pub annotations: Vec<Annotation>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MethodKind {
    Method,
    Getter,
    Setter,
    Operator,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodDeclaration {
    pub id: NodeId,
    pub name: String,
    pub kind: MethodKind,
    pub is_static: bool,
    pub return_type: Option<TypeAnnotation>,
    pub type_parameters: Vec<TypeParameter>,
    pub parameters: ParameterList,
    pub body: FunctionBody,
    pub annotations: Vec<Annotation>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    pub id: NodeId,
    pub name: String,
    pub return_type: Option<TypeAnnotation>,
    pub type_parameters: Vec<TypeParameter>,
    pub parameters: ParameterList,
    pub body: FunctionBody,
    pub annotations: Vec<Annotation>,
    pub doc: Option<String>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDeclaration {
    pub id: NodeId,
    pub modifier: VarModifier,
    pub is_late: bool,
    pub ty: Option<TypeAnnotation>,
    pub declarators: Vec<VariableDeclarator>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumValue {
    pub name: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumDeclaration {
    pub id: NodeId,
    pub name: String,
    pub values: Vec<EnumValue>,
    pub location: SourceLocation,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETERS & BODIES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterForm {
    Plain,
    /// `this.x`
    ThisField,
    /// `super.x`
    SuperForward,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub id: NodeId,
    pub name: String,
    pub ty: Option<TypeAnnotation>,
    pub default_value: Option<Expr>,
    pub is_required: bool,
    pub form: ParameterForm,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterList {
    pub positional: Vec<Parameter>,
    pub optional_positional: Vec<Parameter>,
    pub named: Vec<Parameter>,
}

impl ParameterList {
    pub fn all(&self) -> impl Iterator<Item = &Parameter> {
        self.positional
            .iter()
            .chain(self.optional_positional.iter())
            .chain(self.named.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AsyncModifier {
    Sync,
    Async,
    AsyncStar,
    SyncStar,
}

impl AsyncModifier {
    pub fn is_async(self) -> bool {
        matches!(self, AsyncModifier::Async | AsyncModifier::AsyncStar)
    }

    pub fn is_generator(self) -> bool {
        matches!(self, AsyncModifier::AsyncStar | AsyncModifier::SyncStar)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionBody {
    pub modifier: AsyncModifier,
    pub kind: BodyKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BodyKind {
    Block(Block),
    Arrow(Box<Expr>),
    /// Abstract / external members and `;`-terminated constructors.
    Empty,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: NodeId,
    pub statements: Vec<Stmt>,
    pub location: SourceLocation,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchCase {
    /// Empty for `default:`.
    pub patterns: Vec<Expr>,
    pub is_default: bool,
    pub body: Vec<Stmt>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatchClause {
    pub on_type: Option<TypeAnnotation>,
    pub exception: Option<String>,
    pub stack_trace: Option<String>,
    pub body: Block,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum StmtKind {
    Block(Block),
    Expression(Expr),
    Variable(VariableDeclaration),
    LocalFunction(FunctionDeclaration),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        updates: Vec<Expr>,
        body: Box<Stmt>,
    },
    ForIn {
        modifier: VarModifier,
        ty: Option<TypeAnnotation>,
        variable: String,
        iterable: Expr,
        body: Box<Stmt>,
        is_await: bool,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        condition: Expr,
    },
    Switch {
        subject: Expr,
        cases: Vec<SwitchCase>,
    },
    Return(Option<Expr>),
    Break(Option<String>),
    Continue(Option<String>),
    Yield {
        value: Expr,
        is_star: bool,
    },
    Try {
        body: Block,
        catches: Vec<CatchClause>,
        finally: Option<Block>,
    },
    Assert {
        condition: Expr,
        message: Option<Expr>,
    },
    Rethrow,
    Empty,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub location: SourceLocation,
}

impl Expr {
    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Identifier(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, ExprKind::Error(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
    IfNull,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

/// Binary operator table: source symbol, operator, precedence (higher binds
/// tighter). Unary operators sit above every entry.
pub const BINARY_OPERATORS: &[(&str, BinaryOp, u8)] = &[
    ("??", BinaryOp::IfNull, 1),
    ("||", BinaryOp::Or, 2),
    ("&&", BinaryOp::And, 3),
    ("==", BinaryOp::Eq, 4),
    ("!=", BinaryOp::NotEq, 4),
    ("<", BinaryOp::Lt, 4),
    (">", BinaryOp::Gt, 4),
    ("<=", BinaryOp::LtEq, 4),
    (">=", BinaryOp::GtEq, 4),
    ("|", BinaryOp::BitOr, 5),
    ("^", BinaryOp::BitXor, 6),
    ("&", BinaryOp::BitAnd, 7),
    ("<<", BinaryOp::Shl, 8),
    (">>", BinaryOp::Shr, 8),
    ("+", BinaryOp::Add, 9),
    ("-", BinaryOp::Sub, 9),
    ("*", BinaryOp::Mul, 10),
    ("/", BinaryOp::Div, 10),
    ("~/", BinaryOp::IntDiv, 10),
    ("%", BinaryOp::Mod, 10),
];

/// Precedence of `is` / `as`, shared with the comparison operators.
pub const TYPE_TEST_PRECEDENCE: u8 = 4;

impl BinaryOp {
    pub fn from_symbol(symbol: &str) -> Option<(BinaryOp, u8)> {
        BINARY_OPERATORS
            .iter()
            .find(|(s, _, _)| *s == symbol)
            .map(|(_, op, prec)| (*op, *prec))
    }

    pub fn symbol(self) -> &'static str {
        BINARY_OPERATORS
            .iter()
            .find(|(_, op, _)| *op == self)
            .map(|(s, _, _)| *s)
            .unwrap_or("?")
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::Gt
                | BinaryOp::LtEq
                | BinaryOp::GtEq
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
    Increment,
    Decrement,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Increment => "++",
            UnaryOp::Decrement => "--",
        }
    }
}

/// `=` or a compound operator (`+=`, `??=`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type", content = "operator")]
pub enum AssignOp {
    Assign,
    Compound(BinaryOp),
}

impl AssignOp {
    pub fn from_symbol(symbol: &str) -> Option<AssignOp> {
        if symbol == "=" {
            return Some(AssignOp::Assign);
        }
        let base = symbol.strip_suffix('=')?;
        if base.is_empty() || matches!(base, "=" | "!" | "<" | ">") {
            return None;
        }
        BinaryOp::from_symbol(base).map(|(op, _)| AssignOp::Compound(op))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum Literal {
    Int(i64),
    Double(f64),
    String(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StringPart {
    Text { value: String },
    Interpolation { expr: Expr },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Argument {
    pub name: Option<String>,
    pub value: Expr,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CollectionElement {
    Expr {
        expr: Expr,
    },
    MapEntry {
        key: Expr,
        value: Expr,
    },
    Spread {
        expr: Expr,
        null_aware: bool,
    },
    If {
        condition: Expr,
        then: Box<CollectionElement>,
        otherwise: Option<Box<CollectionElement>>,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum ExprKind {
    Literal(Literal),
    StringInterpolation(Vec<StringPart>),
    Identifier(String),
    This,
    Super,
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        prefix: bool,
    },
    NullAssert(Box<Expr>),
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        type_arguments: Vec<TypeAnnotation>,
        arguments: Vec<Argument>,
    },
    /// Explicit `new T(...)` / `const T.named(...)`.
    New {
        is_const: bool,
        ty: TypeAnnotation,
        constructor: Option<String>,
        arguments: Vec<Argument>,
    },
    PropertyAccess {
        target: Box<Expr>,
        name: String,
        null_aware: bool,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        null_aware: bool,
    },
    /// Each section is rooted at `CascadeReceiver`.
    Cascade {
        target: Box<Expr>,
        sections: Vec<Expr>,
        null_aware: bool,
    },
    CascadeReceiver,
    Lambda {
        parameters: ParameterList,
        body: FunctionBody,
    },
    ListLiteral {
        is_const: bool,
        type_arguments: Vec<TypeAnnotation>,
        elements: Vec<CollectionElement>,
    },
    MapLiteral {
        is_const: bool,
        type_arguments: Vec<TypeAnnotation>,
        elements: Vec<CollectionElement>,
    },
    SetLiteral {
        is_const: bool,
        type_arguments: Vec<TypeAnnotation>,
        elements: Vec<CollectionElement>,
    },
    Await(Box<Expr>),
    Throw(Box<Expr>),
    As {
        expr: Box<Expr>,
        ty: TypeAnnotation,
    },
    Is {
        expr: Box<Expr>,
        ty: TypeAnnotation,
        negated: bool,
    },
    /// Malformed expression kept so later stages can report it in context.
    Error(String),
}
