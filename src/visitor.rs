use crate::ast::*;

/// The AstVisitor trait is the single traversal mechanism over the syntax tree.
///
/// Rules:
/// 1. Traversal order is source order and fixed.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers call the matching `walk_*` function to continue traversal
///    unless pruning is intended.
pub trait AstVisitor {
    fn visit_unit(&mut self, unit: &CompilationUnit) {
        walk_unit(self, unit);
    }

    fn visit_declaration(&mut self, declaration: &Declaration) {
        walk_declaration(self, declaration);
    }

    fn visit_class(&mut self, class: &ClassDeclaration) {
        walk_class(self, class);
    }

    fn visit_field(&mut self, field: &FieldDeclaration) {
        walk_field(self, field);
    }

    fn visit_constructor(&mut self, constructor: &ConstructorDeclaration) {
        walk_constructor(self, constructor);
    }

    fn visit_method(&mut self, method: &MethodDeclaration) {
        walk_method(self, method);
    }

    fn visit_function(&mut self, function: &FunctionDeclaration) {
        walk_function(self, function);
    }

    fn visit_variable(&mut self, variable: &VariableDeclaration) {
        walk_variable(self, variable);
    }

    fn visit_parameters(&mut self, parameters: &ParameterList) {
        walk_parameters(self, parameters);
    }

    fn visit_body(&mut self, body: &FunctionBody) {
        walk_body(self, body);
    }

    fn visit_block(&mut self, block: &Block) {
        walk_block(self, block);
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    fn visit_argument(&mut self, argument: &Argument) {
        self.visit_expr(&argument.value);
    }

    fn visit_element(&mut self, element: &CollectionElement) {
        walk_element(self, element);
    }
}

pub fn walk_unit<V: AstVisitor + ?Sized>(visitor: &mut V, unit: &CompilationUnit) {
    for declaration in &unit.declarations {
        visitor.visit_declaration(declaration);
    }
}

pub fn walk_declaration<V: AstVisitor + ?Sized>(visitor: &mut V, declaration: &Declaration) {
    match declaration {
        Declaration::Class(class) => visitor.visit_class(class),
        Declaration::Function(function) => visitor.visit_function(function),
        Declaration::Variable(variable) => visitor.visit_variable(variable),
        Declaration::Import(_) | Declaration::Export(_) | Declaration::Enum(_) => {}
    }
}

pub fn walk_class<V: AstVisitor + ?Sized>(visitor: &mut V, class: &ClassDeclaration) {
    for member in &class.members {
        match member {
            ClassMember::Field(field) => visitor.visit_field(field),
            ClassMember::Constructor(constructor) => visitor.visit_constructor(constructor),
            ClassMember::Method(method) => visitor.visit_method(method),
        }
    }
}

pub fn walk_field<V: AstVisitor + ?Sized>(visitor: &mut V, field: &FieldDeclaration) {
    for declarator in &field.declarators {
        if let Some(initializer) = &declarator.initializer {
            visitor.visit_expr(initializer);
        }
    }
}

pub fn walk_constructor<V: AstVisitor + ?Sized>(
    visitor: &mut V,
    constructor: &ConstructorDeclaration,
) {
    visitor.visit_parameters(&constructor.parameters);
    for initializer in &constructor.initializers {
        match initializer {
            ConstructorInitializer::Field { value, .. } => visitor.visit_expr(value),
            ConstructorInitializer::Super { arguments, .. }
            | ConstructorInitializer::Redirect { arguments, .. } => {
                for argument in arguments {
                    visitor.visit_argument(argument);
                }
            }
            ConstructorInitializer::Assert {
                condition, message, ..
            } => {
                visitor.visit_expr(condition);
                if let Some(message) = message {
                    visitor.visit_expr(message);
                }
            }
        }
    }
    visitor.visit_body(&constructor.body);
}

pub fn walk_method<V: AstVisitor + ?Sized>(visitor: &mut V, method: &MethodDeclaration) {
    visitor.visit_parameters(&method.parameters);
    visitor.visit_body(&method.body);
}

pub fn walk_function<V: AstVisitor + ?Sized>(visitor: &mut V, function: &FunctionDeclaration) {
    visitor.visit_parameters(&function.parameters);
    visitor.visit_body(&function.body);
}

pub fn walk_variable<V: AstVisitor + ?Sized>(visitor: &mut V, variable: &VariableDeclaration) {
    for declarator in &variable.declarators {
        if let Some(initializer) = &declarator.initializer {
            visitor.visit_expr(initializer);
        }
    }
}

pub fn walk_parameters<V: AstVisitor + ?Sized>(visitor: &mut V, parameters: &ParameterList) {
    for parameter in parameters.all() {
        if let Some(default_value) = &parameter.default_value {
            visitor.visit_expr(default_value);
        }
    }
}

pub fn walk_body<V: AstVisitor + ?Sized>(visitor: &mut V, body: &FunctionBody) {
    match &body.kind {
        BodyKind::Block(block) => visitor.visit_block(block),
        BodyKind::Arrow(expr) => visitor.visit_expr(expr),
        BodyKind::Empty => {}
    }
}

pub fn walk_block<V: AstVisitor + ?Sized>(visitor: &mut V, block: &Block) {
    for stmt in &block.statements {
        visitor.visit_stmt(stmt);
    }
}

pub fn walk_stmt<V: AstVisitor + ?Sized>(visitor: &mut V, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::Block(block) => visitor.visit_block(block),
        StmtKind::Expression(expr) => visitor.visit_expr(expr),
        StmtKind::Variable(variable) => visitor.visit_variable(variable),
        StmtKind::LocalFunction(function) => visitor.visit_function(function),
        StmtKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            visitor.visit_expr(condition);
            visitor.visit_stmt(then_branch);
            if let Some(else_branch) = else_branch {
                visitor.visit_stmt(else_branch);
            }
        }
        StmtKind::For {
            init,
            condition,
            updates,
            body,
        } => {
            if let Some(init) = init {
                visitor.visit_stmt(init);
            }
            if let Some(condition) = condition {
                visitor.visit_expr(condition);
            }
            for update in updates {
                visitor.visit_expr(update);
            }
            visitor.visit_stmt(body);
        }
        StmtKind::ForIn { iterable, body, .. } => {
            visitor.visit_expr(iterable);
            visitor.visit_stmt(body);
        }
        StmtKind::While { condition, body } | StmtKind::DoWhile { body, condition } => {
            visitor.visit_expr(condition);
            visitor.visit_stmt(body);
        }
        StmtKind::Switch { subject, cases } => {
            visitor.visit_expr(subject);
            for case in cases {
                for pattern in &case.patterns {
                    visitor.visit_expr(pattern);
                }
                for stmt in &case.body {
                    visitor.visit_stmt(stmt);
                }
            }
        }
        StmtKind::Return(value) => {
            if let Some(value) = value {
                visitor.visit_expr(value);
            }
        }
        StmtKind::Yield { value, .. } => visitor.visit_expr(value),
        StmtKind::Try {
            body,
            catches,
            finally,
        } => {
            visitor.visit_block(body);
            for catch in catches {
                visitor.visit_block(&catch.body);
            }
            if let Some(finally) = finally {
                visitor.visit_block(finally);
            }
        }
        StmtKind::Assert { condition, message } => {
            visitor.visit_expr(condition);
            if let Some(message) = message {
                visitor.visit_expr(message);
            }
        }
        StmtKind::Break(_) | StmtKind::Continue(_) | StmtKind::Rethrow | StmtKind::Empty => {}
    }
}

pub fn walk_expr<V: AstVisitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::Literal(_)
        | ExprKind::Identifier(_)
        | ExprKind::This
        | ExprKind::Super
        | ExprKind::CascadeReceiver
        | ExprKind::Error(_) => {}
        ExprKind::StringInterpolation(parts) => {
            for part in parts {
                if let StringPart::Interpolation { expr } = part {
                    visitor.visit_expr(expr);
                }
            }
        }
        ExprKind::Binary { left, right, .. } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        ExprKind::Unary { operand, .. } => visitor.visit_expr(operand),
        ExprKind::NullAssert(inner)
        | ExprKind::Await(inner)
        | ExprKind::Throw(inner) => visitor.visit_expr(inner),
        ExprKind::Assign { target, value, .. } => {
            visitor.visit_expr(target);
            visitor.visit_expr(value);
        }
        ExprKind::Conditional {
            condition,
            then_expr,
            else_expr,
        } => {
            visitor.visit_expr(condition);
            visitor.visit_expr(then_expr);
            visitor.visit_expr(else_expr);
        }
        ExprKind::Call {
            callee, arguments, ..
        } => {
            visitor.visit_expr(callee);
            for argument in arguments {
                visitor.visit_argument(argument);
            }
        }
        ExprKind::New { arguments, .. } => {
            for argument in arguments {
                visitor.visit_argument(argument);
            }
        }
        ExprKind::PropertyAccess { target, .. } => visitor.visit_expr(target),
        ExprKind::Index { target, index, .. } => {
            visitor.visit_expr(target);
            visitor.visit_expr(index);
        }
        ExprKind::Cascade {
            target, sections, ..
        } => {
            visitor.visit_expr(target);
            for section in sections {
                visitor.visit_expr(section);
            }
        }
        ExprKind::Lambda { parameters, body } => {
            visitor.visit_parameters(parameters);
            visitor.visit_body(body);
        }
        ExprKind::ListLiteral { elements, .. }
        | ExprKind::MapLiteral { elements, .. }
        | ExprKind::SetLiteral { elements, .. } => {
            for element in elements {
                visitor.visit_element(element);
            }
        }
        ExprKind::As { expr, .. } | ExprKind::Is { expr, .. } => visitor.visit_expr(expr),
    }
}

pub fn walk_element<V: AstVisitor + ?Sized>(visitor: &mut V, element: &CollectionElement) {
    match element {
        CollectionElement::Expr { expr } | CollectionElement::Spread { expr, .. } => {
            visitor.visit_expr(expr)
        }
        CollectionElement::MapEntry { key, value } => {
            visitor.visit_expr(key);
            visitor.visit_expr(value);
        }
        CollectionElement::If {
            condition,
            then,
            otherwise,
        } => {
            visitor.visit_expr(condition);
            visitor.visit_element(then);
            if let Some(otherwise) = otherwise {
                visitor.visit_element(otherwise);
            }
        }
    }
}
