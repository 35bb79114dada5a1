//! Error-tolerant recursive-descent parser
//!
//! Turns a token stream into a `CompilationUnit`. The parser never stops at the
//! first problem: it records a diagnostic, synchronizes at `;`, `}` or the next
//! declaration keyword and keeps going. Every loop consumes at least one token
//! per iteration so malformed input always terminates.

use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::*;
use crate::diagnostics::{self, Diagnostic, DiagnosticKind, SourceLocation};
use crate::lexer::{decode_string_literal, LexErrorKind, Lexer, StringSegment, Token, TokenKind};

/// Parse a token stream (as produced by `tokenize`) into a syntax tree.
///
/// Lexical error tokens become `LexError` diagnostics, comments are dropped
/// (doc comments are attached to the following class or function).
pub fn parse(tokens: Vec<Token>) -> (CompilationUnit, Vec<Diagnostic>) {
    let mut parser = Parser::new(tokens);
    let unit = parser.parse_unit();
    log::debug!(
        "[Parse] {}: {} declarations, {} diagnostics",
        unit.file,
        unit.declarations.len(),
        parser.diagnostics.len()
    );
    (unit, parser.diagnostics)
}

/// Convenience wrapper: lex then parse.
pub fn parse_source(source: &str, file: &str) -> (CompilationUnit, Vec<Diagnostic>) {
    parse(Lexer::new(source, file).collect())
}

/// Deepest expression/statement nesting the parser descends into. Deeper
/// input is reported and skipped instead of exhausting the thread's stack.
pub const MAX_NESTING: usize = 96;

struct Parser {
    tokens: Vec<Token>,
    /// Doc comment text keyed by the index of the token it precedes.
    docs: HashMap<usize, String>,
    pos: usize,
    next_id: u32,
    file: Arc<str>,
    diagnostics: Vec<Diagnostic>,
    /// Current expression/statement nesting.
    depth: usize,
}

impl Parser {
    fn new(raw: Vec<Token>) -> Self {
        let file = raw
            .first()
            .map(|t| t.location.file.clone())
            .unwrap_or_else(|| Arc::from(""));
        let mut parser = Parser {
            tokens: Vec::new(),
            docs: HashMap::new(),
            pos: 0,
            next_id: 0,
            file,
            diagnostics: Vec::new(),
            depth: 0,
        };
        let (tokens, docs) = parser.significant_tokens(raw);
        parser.tokens = tokens;
        parser.docs = docs;
        parser
    }

    /// Drops trivia, reports lexical errors and guarantees a trailing `Eof`.
    fn significant_tokens(&mut self, raw: Vec<Token>) -> (Vec<Token>, HashMap<usize, String>) {
        let mut tokens = Vec::with_capacity(raw.len());
        let mut docs = HashMap::new();
        let mut pending_doc: Option<String> = None;

        for token in raw {
            match token.kind {
                TokenKind::Error => {
                    let (code, message) = match token.error {
                        Some(LexErrorKind::UnterminatedString) => {
                            (diagnostics::LEX_UNTERMINATED_STRING, "unterminated string literal".to_string())
                        }
                        Some(LexErrorKind::UnterminatedComment) => {
                            (diagnostics::LEX_UNTERMINATED_COMMENT, "unterminated block comment".to_string())
                        }
                        _ => (
                            diagnostics::LEX_UNEXPECTED_CHARACTER,
                            format!("unexpected character '{}'", token.text),
                        ),
                    };
                    self.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::LexError,
                        code,
                        message,
                        token.location.clone(),
                    ));
                }
                TokenKind::DocComment => {
                    let text = doc_text(&token.text);
                    pending_doc = Some(match pending_doc.take() {
                        Some(mut doc) => {
                            doc.push('\n');
                            doc.push_str(&text);
                            doc
                        }
                        None => text,
                    });
                }
                TokenKind::LineComment | TokenKind::BlockComment => {}
                _ => {
                    if token.error == Some(LexErrorKind::IntegerOverflow) {
                        self.diagnostics.push(Diagnostic::new(
                            DiagnosticKind::LexError,
                            diagnostics::LEX_INTEGER_OVERFLOW,
                            format!("integer literal '{}' does not fit in 64 bits", token.text),
                            token.location.clone(),
                        ));
                    }
                    if let Some(doc) = pending_doc.take() {
                        docs.insert(tokens.len(), doc);
                    }
                    tokens.push(token);
                }
            }
        }

        if tokens.last().map_or(true, |t| t.kind != TokenKind::Eof) {
            let location = tokens
                .last()
                .map(|t| t.location.clone())
                .unwrap_or_else(|| SourceLocation::synthetic(&self.file));
            let offset = tokens.last().map_or(0, Token::end_offset);
            tokens.push(Token {
                kind: TokenKind::Eof,
                text: String::new(),
                location,
                offset,
                error: None,
            });
        }
        (tokens, docs)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TOKEN CURSOR
    // ═══════════════════════════════════════════════════════════════════════════

    fn tok(&self, index: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[index.min(last)]
    }

    fn peek(&self) -> &Token {
        self.tok(self.pos)
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        self.tok(self.pos + ahead)
    }

    fn at(&self, text: &str) -> bool {
        self.peek().is(text)
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn loc(&self) -> SourceLocation {
        self.peek().location.clone()
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.at(text) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, text: &str) -> bool {
        if self.eat(text) {
            return true;
        }
        self.error_here(format!("expected '{}'", text));
        false
    }

    fn previous_is(&self, text: &str) -> bool {
        self.pos > 0 && self.tok(self.pos - 1).is(text)
    }

    /// True when token `index` starts exactly where the previous one ends.
    fn adjacent(&self, index: usize) -> bool {
        index > 0 && self.tok(index).offset == self.tok(index - 1).end_offset()
    }

    fn node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn error_here(&mut self, message: impl Into<String>) {
        let token = self.peek();
        let found = if token.kind == TokenKind::Eof {
            "end of input".to_string()
        } else {
            format!("'{}'", token.text)
        };
        let location = token.location.clone();
        self.diagnostics.push(Diagnostic::new(
            DiagnosticKind::ParseError,
            diagnostics::PARSE_UNEXPECTED_TOKEN,
            format!("{}, found {}", message.into(), found),
            location,
        ));
    }

    fn error_at(&mut self, code: &str, message: impl Into<String>, location: SourceLocation) {
        self.diagnostics.push(Diagnostic::new(
            DiagnosticKind::ParseError,
            code,
            message,
            location,
        ));
    }

    fn expect_identifier(&mut self) -> String {
        if self.peek().is_identifier() {
            return self.advance().text;
        }
        self.error_here("expected identifier");
        "<error>".to_string()
    }

    /// Identifier after `.`; keywords are accepted as member names.
    fn expect_member_name(&mut self) -> String {
        if matches!(self.peek().kind, TokenKind::Identifier | TokenKind::Keyword) {
            return self.advance().text;
        }
        self.error_here("expected member name");
        "<error>".to_string()
    }

    fn expr(&mut self, kind: ExprKind, location: SourceLocation) -> Expr {
        Expr {
            id: self.node_id(),
            kind,
            location,
        }
    }

    fn stmt(&mut self, kind: StmtKind, location: SourceLocation) -> Stmt {
        Stmt {
            id: self.node_id(),
            kind,
            location,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LOOKAHEAD
    // ═══════════════════════════════════════════════════════════════════════════

    /// Index just past a type starting at `i`, without consuming anything.
    fn scan_type(&self, mut i: usize) -> Option<usize> {
        let first = self.tok(i);
        if first.is("void") {
            i += 1;
        } else if first.is_identifier() {
            i += 1;
            if self.tok(i).is(".") && self.tok(i + 1).is_identifier() {
                i += 2;
            }
            if self.tok(i).is("<") {
                i = self.scan_type_arguments(i)?;
            }
        } else {
            return None;
        }
        if self.tok(i).is("?") && self.adjacent(i) {
            i += 1;
        }
        if self.tok(i).is_identifier() && self.tok(i).text == "Function" {
            i += 1;
            if self.tok(i).is("<") {
                i = self.scan_type_arguments(i)?;
            }
            if self.tok(i).is("(") {
                i = self.skip_balanced(i)?;
            }
            if self.tok(i).is("?") && self.adjacent(i) {
                i += 1;
            }
        }
        Some(i)
    }

    fn scan_type_arguments(&self, mut i: usize) -> Option<usize> {
        i += 1;
        loop {
            i = self.scan_type(i)?;
            if self.tok(i).is(",") {
                i += 1;
                continue;
            }
            if self.tok(i).is(">") {
                return Some(i + 1);
            }
            return None;
        }
    }

    /// `i` is on an opening bracket; returns the index after its partner.
    fn skip_balanced(&self, mut i: usize) -> Option<usize> {
        let mut depth = 0usize;
        loop {
            let token = self.tok(i);
            if token.kind == TokenKind::Eof {
                return None;
            }
            if token.is("(") || token.is("[") || token.is("{") {
                depth += 1;
            } else if token.is(")") || token.is("]") || token.is("}") {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            i += 1;
        }
    }

    fn is_body_start(&self, i: usize) -> bool {
        let token = self.tok(i);
        token.is("{")
            || token.is("=>")
            || (token.is_identifier() && matches!(token.text.as_str(), "async" | "sync"))
    }

    /// `(params) =>` or `(params) {` in expression position.
    fn is_lambda_start(&self) -> bool {
        match self.skip_balanced(self.pos) {
            Some(end) => self.is_body_start(end),
            None => false,
        }
    }

    /// `int x = ...`, `List<int> xs;`, `Widget? w,`
    fn is_typed_declaration_start(&self) -> bool {
        match self.scan_type(self.pos) {
            Some(end) => {
                self.tok(end).is_identifier()
                    && (self.tok(end + 1).is("=")
                        || self.tok(end + 1).is(";")
                        || self.tok(end + 1).is(","))
            }
            None => false,
        }
    }

    /// `name<T>(`: the `<...>` after `i` closes right before a `(`. Anything
    /// else (`List<int> name(`) reads `<...>` as type arguments of a return type.
    fn is_generic_name_at(&self, i: usize) -> bool {
        self.tok(i).is_identifier()
            && self.tok(i + 1).is("<")
            && self
                .scan_type_arguments(i + 1)
                .map_or(false, |end| self.tok(end).is("("))
    }

    /// `name(...) {` or `Type name<T>(...) =>` inside a block.
    fn is_local_function_start(&self) -> bool {
        let name_index = if self.peek().is_identifier()
            && (self.peek_at(1).is("(") || self.is_generic_name_at(self.pos))
        {
            self.pos
        } else {
            match self.scan_type(self.pos) {
                Some(end) if self.tok(end).is_identifier() => end,
                _ => return false,
            }
        };
        let mut i = name_index + 1;
        if self.tok(i).is("<") {
            match self.scan_type_arguments(i) {
                Some(end) => i = end,
                None => return false,
            }
        }
        if !self.tok(i).is("(") {
            return false;
        }
        match self.skip_balanced(i) {
            Some(end) => self.is_body_start(end),
            None => false,
        }
    }

    fn at_declaration_start(&self) -> bool {
        let token = self.peek();
        ["class", "abstract", "enum", "import", "export", "typedef", "library", "part", "mixin", "@"]
            .iter()
            .any(|kw| token.is(kw))
    }

    fn at_statement_start(&self) -> bool {
        let token = self.peek();
        [
            "if", "for", "while", "do", "switch", "return", "break", "continue", "try", "var",
            "final", "late", "assert", "rethrow",
        ]
        .iter()
        .any(|kw| token.is(kw))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SYNCHRONIZATION
    // ═══════════════════════════════════════════════════════════════════════════

    fn synchronize_declaration(&mut self) {
        let mut depth = 0i32;
        loop {
            if self.at_eof() || (depth == 0 && self.at_declaration_start()) {
                return;
            }
            let token = self.advance();
            if token.is("{") {
                depth += 1;
            } else if token.is("}") {
                depth -= 1;
                if depth <= 0 {
                    return;
                }
            } else if token.is(";") && depth == 0 {
                return;
            }
        }
    }

    fn synchronize_member(&mut self) {
        let mut depth = 0i32;
        loop {
            if self.at_eof() || (depth == 0 && self.at("}")) {
                return;
            }
            let token = self.advance();
            if token.is("{") {
                depth += 1;
            } else if token.is("}") {
                depth -= 1;
                if depth <= 0 {
                    return;
                }
            } else if token.is(";") && depth == 0 {
                return;
            }
        }
    }

    fn synchronize_statement(&mut self) {
        if self.previous_is(";") || self.previous_is("}") {
            return;
        }
        loop {
            if self.at_eof() || self.at("}") || self.at_statement_start() {
                return;
            }
            let token = self.advance();
            if token.is(";") {
                return;
            }
            if token.is("{") {
                let mut depth = 1;
                while depth > 0 && !self.at_eof() {
                    let inner = self.advance();
                    if inner.is("{") {
                        depth += 1;
                    } else if inner.is("}") {
                        depth -= 1;
                    }
                }
                return;
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DECLARATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    fn parse_unit(&mut self) -> CompilationUnit {
        let mut declarations = Vec::new();
        while !self.at_eof() {
            let start = self.pos;
            let before = self.diagnostics.len();
            match self.parse_declaration() {
                Some(declaration) => declarations.push(declaration),
                None => {
                    if self.pos == start && !self.at_eof() {
                        if self.diagnostics.len() == before {
                            self.error_here("expected declaration");
                        }
                        self.advance();
                    }
                    if self.diagnostics.len() > before {
                        self.synchronize_declaration();
                    }
                }
            }
        }
        CompilationUnit {
            file: self.file.clone(),
            declarations,
        }
    }

    fn parse_declaration(&mut self) -> Option<Declaration> {
        let doc = self.docs.get(&self.pos).cloned();
        let annotations = self.parse_annotations();
        let location = self.loc();

        if self.at("import") {
            return self.parse_import().map(Declaration::Import);
        }
        if self.at("export") {
            return self.parse_export().map(Declaration::Export);
        }
        if self.at("library") {
            while !self.at_eof() && !self.eat(";") {
                self.advance();
            }
            return None;
        }
        if self.at("part") || self.at("typedef") || self.at("mixin") {
            let keyword = self.advance().text;
            self.error_at(
                diagnostics::PARSE_UNSUPPORTED_DECLARATION,
                format!("'{}' declarations are not supported", keyword),
                location,
            );
            return None;
        }
        if self.at("abstract") || self.at("class") {
            return Some(Declaration::Class(self.parse_class(annotations, doc)));
        }
        if self.at("enum") {
            return Some(Declaration::Enum(self.parse_enum()));
        }
        if self.at("var") || self.at("final") || self.at("const") || self.at("late") {
            let variable = self.parse_variable_declaration()?;
            self.expect(";");
            return Some(Declaration::Variable(variable));
        }

        self.eat("external");
        let return_type = if self.peek().is_identifier()
            && (self.peek_at(1).is("(") || self.is_generic_name_at(self.pos))
        {
            None
        } else if self.scan_type(self.pos).is_some() {
            Some(self.parse_type())
        } else {
            self.error_here("expected declaration");
            return None;
        };

        let name_location = self.loc();
        let name = self.expect_identifier();
        if self.at("(") || self.at("<") {
            return Some(Declaration::Function(self.parse_function_rest(
                name,
                return_type,
                annotations,
                doc,
                location,
                false,
            )));
        }

        let declarators = self.parse_declarators_after_name(name, name_location);
        self.expect(";");
        Some(Declaration::Variable(VariableDeclaration {
            id: self.node_id(),
            modifier: VarModifier::Typed,
            is_late: false,
            ty: return_type,
            declarators,
            location,
        }))
    }

    fn parse_annotations(&mut self) -> Vec<Annotation> {
        let mut annotations = Vec::new();
        while self.at("@") {
            let location = self.loc();
            self.advance();
            let mut name = self.expect_identifier();
            while self.at(".") && self.peek_at(1).is_identifier() {
                self.advance();
                name.push('.');
                name.push_str(&self.advance().text);
            }
            let arguments = if self.at("(") {
                Some(self.parse_arguments())
            } else {
                None
            };
            annotations.push(Annotation {
                name,
                arguments,
                location,
            });
        }
        annotations
    }

    fn parse_uri(&mut self) -> Option<String> {
        if self.peek().kind == TokenKind::StringLiteral {
            let token = self.advance();
            return Some(
                decode_string_literal(&token.text)
                    .into_iter()
                    .map(|segment| match segment {
                        StringSegment::Text(text) => text,
                        StringSegment::Interpolation { source, .. } => source,
                    })
                    .collect(),
            );
        }
        self.error_here("expected URI string");
        None
    }

    fn parse_combinators(&mut self) -> (Vec<String>, Vec<String>) {
        let mut show = Vec::new();
        let mut hide = Vec::new();
        loop {
            let target = if self.at("show") {
                &mut show
            } else if self.at("hide") {
                &mut hide
            } else {
                break;
            };
            self.advance();
            loop {
                if !self.peek().is_identifier() {
                    let token = self.peek().clone();
                    self.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::ParseError,
                        diagnostics::PARSE_UNEXPECTED_TOKEN,
                        format!("expected identifier, found '{}'", token.text),
                        token.location,
                    ));
                    break;
                }
                target.push(self.advance().text);
                if !self.eat(",") {
                    break;
                }
            }
        }
        (show, hide)
    }

    fn parse_import(&mut self) -> Option<ImportDirective> {
        let location = self.loc();
        self.advance();
        let uri = self.parse_uri()?;
        self.eat("deferred");
        let prefix = if self.eat("as") {
            Some(self.expect_identifier())
        } else {
            None
        };
        let (show, hide) = self.parse_combinators();
        self.expect(";");
        Some(ImportDirective {
            id: self.node_id(),
            uri,
            prefix,
            show,
            hide,
            location,
        })
    }

    fn parse_export(&mut self) -> Option<ExportDirective> {
        let location = self.loc();
        self.advance();
        let uri = self.parse_uri()?;
        let (show, hide) = self.parse_combinators();
        self.expect(";");
        Some(ExportDirective {
            id: self.node_id(),
            uri,
            show,
            hide,
            location,
        })
    }

    fn parse_class(&mut self, annotations: Vec<Annotation>, doc: Option<String>) -> ClassDeclaration {
        let location = self.loc();
        let is_abstract = self.eat("abstract");
        self.expect("class");
        let name = self.expect_identifier();
        let type_parameters = self.parse_type_parameters();
        let superclass = if self.eat("extends") {
            Some(self.parse_type())
        } else {
            None
        };
        let mixins = if self.eat("with") {
            self.parse_type_list()
        } else {
            Vec::new()
        };
        let interfaces = if self.eat("implements") {
            self.parse_type_list()
        } else {
            Vec::new()
        };

        let mut members = Vec::new();
        if self.expect("{") {
            while !self.at("}") && !self.at_eof() {
                let start = self.pos;
                let before = self.diagnostics.len();
                match self.parse_member(&name) {
                    Some(member) => members.push(member),
                    None => {
                        if self.pos == start && self.diagnostics.len() == before {
                            self.error_here("expected class member");
                        }
                        self.synchronize_member();
                    }
                }
            }
            self.expect("}");
        }

        ClassDeclaration {
            id: self.node_id(),
            name,
            is_abstract,
            type_parameters,
            superclass,
            mixins,
            interfaces,
            members,
            annotations,
            doc,
            location,
        }
    }

    fn parse_type_list(&mut self) -> Vec<TypeAnnotation> {
        let mut types = vec![self.parse_type()];
        while self.eat(",") {
            types.push(self.parse_type());
        }
        types
    }

    fn parse_member(&mut self, class_name: &str) -> Option<ClassMember> {
        let annotations = self.parse_annotations();
        let location = self.loc();

        if self.eat("factory") {
            return Some(ClassMember::Constructor(self.parse_constructor(
                class_name,
                true,
                false,
                annotations,
                location,
            )));
        }

        let is_static = self.eat("static");
        self.eat("external");
        self.eat("covariant");

        let names_class = |parser: &Parser, at: usize| {
            parser.tok(at).is_identifier()
                && parser.tok(at).text == class_name
                && (parser.tok(at + 1).is("(") || parser.tok(at + 1).is("."))
        };
        if !is_static && self.at("const") && names_class(self, self.pos + 1) {
            self.advance();
            return Some(ClassMember::Constructor(self.parse_constructor(
                class_name,
                false,
                true,
                annotations,
                location,
            )));
        }
        if !is_static && names_class(self, self.pos) {
            return Some(ClassMember::Constructor(self.parse_constructor(
                class_name,
                false,
                false,
                annotations,
                location,
            )));
        }

        let is_late = self.eat("late");
        let modifier = if self.eat("var") {
            Some(VarModifier::Var)
        } else if self.eat("final") {
            Some(VarModifier::Final)
        } else if self.eat("const") {
            Some(VarModifier::Const)
        } else {
            None
        };

        if let Some(modifier) = modifier {
            let ty = match self.scan_type(self.pos) {
                Some(end) if self.tok(end).is_identifier() => Some(self.parse_type()),
                _ => None,
            };
            let declarators = self.parse_declarators();
            self.expect(";");
            return Some(ClassMember::Field(FieldDeclaration {
                id: self.node_id(),
                is_static,
                is_late,
                modifier,
                ty,
                declarators,
                annotations,
                location,
            }));
        }

        let untyped_accessor = (self.at("get") || self.at("set"))
            && self.peek_at(1).is_identifier()
            && (self.is_body_start(self.pos + 2) || self.peek_at(2).is("(") || self.peek_at(2).is(";"));
        let typed = !untyped_accessor
            && !(self.peek().is_identifier() && (self.peek_at(1).is("(") || self.is_generic_name_at(self.pos)))
            && match self.scan_type(self.pos) {
                Some(end) => self.tok(end).is_identifier() || self.tok(end).is("operator"),
                None => false,
            };
        let return_type = if typed { Some(self.parse_type()) } else { None };

        if (self.at("get") || self.at("set")) && self.peek_at(1).is_identifier() {
            let kind = if self.advance().text == "get" {
                MethodKind::Getter
            } else {
                MethodKind::Setter
            };
            let name = self.expect_identifier();
            let parameters = if kind == MethodKind::Setter {
                self.parse_parameter_list()
            } else {
                ParameterList::default()
            };
            let body = self.parse_function_body(false);
            return Some(ClassMember::Method(MethodDeclaration {
                id: self.node_id(),
                name,
                kind,
                is_static,
                return_type,
                type_parameters: Vec::new(),
                parameters,
                body,
                annotations,
                location,
            }));
        }

        if self.eat("operator") {
            let mut name = String::new();
            if self.eat("[") {
                self.expect("]");
                name.push_str("[]");
                if self.eat("=") {
                    name.push('=');
                }
            } else if self.at(">") && self.peek_at(1).is(">") && self.adjacent(self.pos + 1) {
                self.advance();
                self.advance();
                name.push_str(">>");
            } else if matches!(self.peek().kind, TokenKind::Operator) {
                name.push_str(&self.advance().text);
            } else {
                self.error_here("expected operator");
                return None;
            }
            let parameters = self.parse_parameter_list();
            let body = self.parse_function_body(false);
            return Some(ClassMember::Method(MethodDeclaration {
                id: self.node_id(),
                name,
                kind: MethodKind::Operator,
                is_static,
                return_type,
                type_parameters: Vec::new(),
                parameters,
                body,
                annotations,
                location,
            }));
        }

        if !self.peek().is_identifier() {
            self.error_here("expected class member");
            return None;
        }
        let name_location = self.loc();
        let name = self.advance().text;

        if self.at("(") || self.at("<") {
            let type_parameters = self.parse_type_parameters();
            let parameters = self.parse_parameter_list();
            let body = self.parse_function_body(false);
            return Some(ClassMember::Method(MethodDeclaration {
                id: self.node_id(),
                name,
                kind: MethodKind::Method,
                is_static,
                return_type,
                type_parameters,
                parameters,
                body,
                annotations,
                location,
            }));
        }

        let declarators = self.parse_declarators_after_name(name, name_location);
        self.expect(";");
        Some(ClassMember::Field(FieldDeclaration {
            id: self.node_id(),
            is_static,
            is_late,
            modifier: if return_type.is_some() {
                VarModifier::Typed
            } else {
                VarModifier::Var
            },
            ty: return_type,
            declarators,
            annotations,
            location,
        }))
    }

    fn parse_constructor(
        &mut self,
        class_name: &str,
        is_factory: bool,
        is_const: bool,
        annotations: Vec<Annotation>,
        location: SourceLocation,
    ) -> ConstructorDeclaration {
        let written = self.expect_identifier();
        if written != class_name && written != "<error>" {
            let location = self.tok(self.pos.saturating_sub(1)).location.clone();
            self.error_at(
                diagnostics::PARSE_UNEXPECTED_TOKEN,
                format!("constructor name '{}' does not match class '{}'", written, class_name),
                location,
            );
        }
        let name = if self.eat(".") {
            Some(self.expect_identifier())
        } else {
            None
        };
        let parameters = self.parse_parameter_list();

        let mut initializers = Vec::new();
        let mut redirect_target = None;
        let body = if is_factory && self.eat("=") {
            let mut target = self.parse_type();
            if self.eat(".") {
                target.name.push('.');
                target.name.push_str(&self.expect_identifier());
            }
            self.expect(";");
            redirect_target = Some(target);
            FunctionBody {
                modifier: AsyncModifier::Sync,
                kind: BodyKind::Empty,
            }
        } else {
            if self.eat(":") {
                loop {
                    if let Some(initializer) = self.parse_initializer() {
                        initializers.push(initializer);
                    }
                    if !self.eat(",") {
                        break;
                    }
                }
            }
            self.parse_function_body(false)
        };

        ConstructorDeclaration {
            id: self.node_id(),
            class_name: class_name.to_string(),
            name,
            is_factory,
            is_const,
            parameters,
            initializers,
            redirect_target,
            body,
            annotations,
            location,
        }
    }

    fn parse_initializer(&mut self) -> Option<ConstructorInitializer> {
        let location = self.loc();
        if self.eat("super") {
            let constructor = if self.eat(".") {
                Some(self.expect_identifier())
            } else {
                None
            };
            let arguments = self.parse_arguments();
            return Some(ConstructorInitializer::Super {
                constructor,
                arguments,
                location,
            });
        }
        if self.eat("this") {
            if self.eat(".") {
                let name = self.expect_identifier();
                if self.eat("=") {
                    let value = self.parse_conditional();
                    return Some(ConstructorInitializer::Field {
                        name,
                        value,
                        location,
                    });
                }
                let arguments = self.parse_arguments();
                return Some(ConstructorInitializer::Redirect {
                    constructor: Some(name),
                    arguments,
                    location,
                });
            }
            let arguments = self.parse_arguments();
            return Some(ConstructorInitializer::Redirect {
                constructor: None,
                arguments,
                location,
            });
        }
        if self.eat("assert") {
            self.expect("(");
            let condition = self.parse_expression();
            let message = if self.eat(",") && !self.at(")") {
                Some(self.parse_expression())
            } else {
                None
            };
            self.eat(",");
            self.expect(")");
            return Some(ConstructorInitializer::Assert {
                condition,
                message,
                location,
            });
        }
        if self.peek().is_identifier() {
            let name = self.advance().text;
            self.expect("=");
            let value = self.parse_conditional();
            return Some(ConstructorInitializer::Field {
                name,
                value,
                location,
            });
        }
        self.error_here("expected constructor initializer");
        None
    }

    fn parse_enum(&mut self) -> EnumDeclaration {
        let location = self.loc();
        self.advance();
        let name = self.expect_identifier();
        let mut values = Vec::new();
        if self.expect("{") {
            while self.peek().is_identifier() {
                let value_location = self.loc();
                values.push(EnumValue {
                    name: self.advance().text,
                    location: value_location,
                });
                if !self.eat(",") {
                    break;
                }
            }
            if self.at(";") {
                let member_location = self.loc();
                self.error_at(
                    diagnostics::PARSE_UNSUPPORTED_DECLARATION,
                    "enum members are not supported",
                    member_location,
                );
                self.advance();
                let mut depth = 0usize;
                while !self.at_eof() && !(depth == 0 && self.at("}")) {
                    let token = self.advance();
                    if token.is("{") {
                        depth += 1;
                    } else if token.is("}") {
                        depth = depth.saturating_sub(1);
                    }
                }
            }
            self.expect("}");
        }
        EnumDeclaration {
            id: self.node_id(),
            name,
            values,
            location,
        }
    }

    /// `var`/`final`/`const`/`late` declaration, without the trailing `;`.
    fn parse_variable_declaration(&mut self) -> Option<VariableDeclaration> {
        let location = self.loc();
        let is_late = self.eat("late");
        let modifier = if self.eat("var") {
            VarModifier::Var
        } else if self.eat("final") {
            VarModifier::Final
        } else if self.eat("const") {
            VarModifier::Const
        } else {
            VarModifier::Typed
        };
        let ty = match self.scan_type(self.pos) {
            Some(end) if self.tok(end).is_identifier() => Some(self.parse_type()),
            _ => None,
        };
        if modifier == VarModifier::Typed && ty.is_none() {
            self.error_here("expected type or variable name");
            return None;
        }
        let declarators = self.parse_declarators();
        Some(VariableDeclaration {
            id: self.node_id(),
            modifier,
            is_late,
            ty,
            declarators,
            location,
        })
    }

    fn parse_declarators(&mut self) -> Vec<VariableDeclarator> {
        let location = self.loc();
        let name = self.expect_identifier();
        self.parse_declarators_after_name(name, location)
    }

    fn parse_declarators_after_name(
        &mut self,
        name: String,
        location: SourceLocation,
    ) -> Vec<VariableDeclarator> {
        let mut declarators = Vec::new();
        let mut name = name;
        let mut location = location;
        loop {
            let initializer = if self.eat("=") {
                Some(self.parse_expression())
            } else {
                None
            };
            declarators.push(VariableDeclarator {
                id: self.node_id(),
                name,
                initializer,
                location,
            });
            if !self.eat(",") {
                break;
            }
            location = self.loc();
            name = self.expect_identifier();
        }
        declarators
    }

    fn parse_function_rest(
        &mut self,
        name: String,
        return_type: Option<TypeAnnotation>,
        annotations: Vec<Annotation>,
        doc: Option<String>,
        location: SourceLocation,
        local: bool,
    ) -> FunctionDeclaration {
        let type_parameters = self.parse_type_parameters();
        let parameters = self.parse_parameter_list();
        let body = self.parse_function_body(false);
        if local && matches!(body.kind, BodyKind::Empty) {
            self.error_here("expected function body");
        }
        FunctionDeclaration {
            id: self.node_id(),
            name,
            return_type,
            type_parameters,
            parameters,
            body,
            annotations,
            doc,
            location,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TYPES & PARAMETERS
    // ═══════════════════════════════════════════════════════════════════════════

    fn parse_type(&mut self) -> TypeAnnotation {
        let location = self.loc();
        let mut ty = if self.eat("void") {
            TypeAnnotation {
                name: "void".to_string(),
                arguments: Vec::new(),
                nullable: false,
                location: location.clone(),
            }
        } else {
            let mut name = self.expect_identifier();
            if self.at(".") && self.peek_at(1).is_identifier() {
                self.advance();
                name.push('.');
                name.push_str(&self.advance().text);
            }
            let arguments = if self.at("<") {
                self.parse_type_arguments()
            } else {
                Vec::new()
            };
            TypeAnnotation {
                name,
                arguments,
                nullable: false,
                location: location.clone(),
            }
        };
        if self.at("?") && self.adjacent(self.pos) {
            self.advance();
            ty.nullable = true;
        }
        if self.peek().is_identifier() && self.peek().text == "Function" {
            self.advance();
            if self.at("<") {
                self.parse_type_arguments();
            }
            if self.at("(") {
                if let Some(end) = self.skip_balanced(self.pos) {
                    self.pos = end;
                }
            }
            ty = TypeAnnotation {
                name: "Function".to_string(),
                arguments: Vec::new(),
                nullable: false,
                location,
            };
            if self.at("?") && self.adjacent(self.pos) {
                self.advance();
                ty.nullable = true;
            }
        }
        ty
    }

    fn parse_type_arguments(&mut self) -> Vec<TypeAnnotation> {
        self.expect("<");
        let mut arguments = Vec::new();
        loop {
            arguments.push(self.parse_type());
            if !self.eat(",") {
                break;
            }
        }
        self.expect(">");
        arguments
    }

    fn parse_type_parameters(&mut self) -> Vec<TypeParameter> {
        let mut parameters = Vec::new();
        if !self.eat("<") {
            return parameters;
        }
        loop {
            let location = self.loc();
            let name = self.expect_identifier();
            let bound = if self.eat("extends") {
                Some(self.parse_type())
            } else {
                None
            };
            parameters.push(TypeParameter {
                name,
                bound,
                location,
            });
            if !self.eat(",") {
                break;
            }
        }
        self.expect(">");
        parameters
    }

    fn parse_parameter_list(&mut self) -> ParameterList {
        let mut list = ParameterList::default();
        if !self.expect("(") {
            return list;
        }
        while !self.at(")") && !self.at_eof() {
            let start = self.pos;
            if self.eat("[") {
                while !self.at("]") && !self.at_eof() {
                    let before = self.pos;
                    list.optional_positional.push(self.parse_parameter(false));
                    if !self.eat(",") {
                        if self.pos == before {
                            self.advance();
                        }
                        break;
                    }
                }
                self.expect("]");
            } else if self.eat("{") {
                while !self.at("}") && !self.at_eof() {
                    let before = self.pos;
                    list.named.push(self.parse_parameter(true));
                    if !self.eat(",") {
                        if self.pos == before {
                            self.advance();
                        }
                        break;
                    }
                }
                self.expect("}");
            } else {
                list.positional.push(self.parse_parameter(false));
            }
            if !self.eat(",") {
                if self.pos == start {
                    self.advance();
                }
                break;
            }
        }
        self.expect(")");
        list
    }

    fn parse_parameter(&mut self, named: bool) -> Parameter {
        self.parse_annotations();
        let location = self.loc();
        let is_required = named && self.eat("required");
        self.eat("covariant");
        if !self.eat("final") {
            self.eat("var");
        }

        let starts_with_form = (self.at("this") || self.at("super")) && self.peek_at(1).is(".");
        let mut ty = None;
        if !starts_with_form {
            if let Some(end) = self.scan_type(self.pos) {
                let next = self.tok(end);
                if next.is_identifier() || ((next.is("this") || next.is("super")) && self.tok(end + 1).is(".")) {
                    ty = Some(self.parse_type());
                }
            }
        }

        let form = if self.at("this") && self.peek_at(1).is(".") {
            self.advance();
            self.advance();
            ParameterForm::ThisField
        } else if self.at("super") && self.peek_at(1).is(".") {
            self.advance();
            self.advance();
            ParameterForm::SuperForward
        } else {
            ParameterForm::Plain
        };
        let name = self.expect_identifier();

        if self.at("(") {
            if let Some(end) = self.skip_balanced(self.pos) {
                self.pos = end;
            }
            ty = Some(TypeAnnotation {
                name: "Function".to_string(),
                arguments: Vec::new(),
                nullable: self.eat("?"),
                location: location.clone(),
            });
        }

        let default_value = if self.eat("=") || (named && self.eat(":")) {
            Some(self.parse_expression())
        } else {
            None
        };

        Parameter {
            id: self.node_id(),
            name,
            ty,
            default_value,
            is_required,
            form,
            location,
        }
    }

    /// `lambda` bodies do not consume the `;` after an arrow expression.
    fn parse_function_body(&mut self, lambda: bool) -> FunctionBody {
        let modifier = if self.peek().is_identifier() && self.peek().text == "async" {
            self.advance();
            if self.eat("*") {
                AsyncModifier::AsyncStar
            } else {
                AsyncModifier::Async
            }
        } else if self.peek().is_identifier() && self.peek().text == "sync" && self.peek_at(1).is("*") {
            self.advance();
            self.advance();
            AsyncModifier::SyncStar
        } else {
            AsyncModifier::Sync
        };

        let kind = if self.eat("=>") {
            let expr = self.parse_expression();
            if !lambda {
                self.expect(";");
            }
            BodyKind::Arrow(Box::new(expr))
        } else if self.at("{") {
            BodyKind::Block(self.parse_block())
        } else if !lambda && self.eat(";") {
            BodyKind::Empty
        } else {
            self.error_here("expected function body");
            BodyKind::Empty
        };
        FunctionBody { modifier, kind }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STATEMENTS
    // ═══════════════════════════════════════════════════════════════════════════

    fn parse_block(&mut self) -> Block {
        let location = self.loc();
        let id = self.node_id();
        let mut statements = Vec::new();
        if self.expect("{") {
            while !self.at("}") && !self.at_eof() {
                let start = self.pos;
                let before = self.diagnostics.len();
                let statement = self.parse_statement();
                statements.push(statement);
                if self.pos == start {
                    self.advance();
                }
                if self.diagnostics.len() > before {
                    self.synchronize_statement();
                }
            }
            self.expect("}");
        }
        Block {
            id,
            statements,
            location,
        }
    }

    fn parse_statement(&mut self) -> Stmt {
        if self.depth >= MAX_NESTING {
            let location = self.too_deep();
            return self.stmt(StmtKind::Empty, location);
        }
        self.depth += 1;
        let stmt = self.parse_statement_inner();
        self.depth -= 1;
        stmt
    }

    fn parse_statement_inner(&mut self) -> Stmt {
        let location = self.loc();

        if self.at("{") {
            let block = self.parse_block();
            return self.stmt(StmtKind::Block(block), location);
        }
        if self.eat(";") {
            return self.stmt(StmtKind::Empty, location);
        }
        if self.eat("if") {
            self.expect("(");
            let condition = self.parse_expression();
            self.expect(")");
            let then_branch = Box::new(self.parse_statement());
            let else_branch = if self.eat("else") {
                Some(Box::new(self.parse_statement()))
            } else {
                None
            };
            return self.stmt(
                StmtKind::If {
                    condition,
                    then_branch,
                    else_branch,
                },
                location,
            );
        }
        if self.at("for") || (self.at("await") && self.peek_at(1).is("for")) {
            return self.parse_for();
        }
        if self.eat("while") {
            self.expect("(");
            let condition = self.parse_expression();
            self.expect(")");
            let body = Box::new(self.parse_statement());
            return self.stmt(StmtKind::While { condition, body }, location);
        }
        if self.eat("do") {
            let body = Box::new(self.parse_statement());
            self.expect("while");
            self.expect("(");
            let condition = self.parse_expression();
            self.expect(")");
            self.expect(";");
            return self.stmt(StmtKind::DoWhile { body, condition }, location);
        }
        if self.at("switch") {
            return self.parse_switch();
        }
        if self.eat("return") {
            let value = if self.at(";") {
                None
            } else {
                Some(self.parse_expression())
            };
            self.expect(";");
            return self.stmt(StmtKind::Return(value), location);
        }
        if self.at("break") || self.at("continue") {
            let is_break = self.advance().text == "break";
            let label = if self.peek().is_identifier() {
                Some(self.advance().text)
            } else {
                None
            };
            self.expect(";");
            let kind = if is_break {
                StmtKind::Break(label)
            } else {
                StmtKind::Continue(label)
            };
            return self.stmt(kind, location);
        }
        if self.at("try") {
            return self.parse_try();
        }
        if self.eat("assert") {
            self.expect("(");
            let condition = self.parse_expression();
            let message = if self.eat(",") && !self.at(")") {
                Some(self.parse_expression())
            } else {
                None
            };
            self.eat(",");
            self.expect(")");
            self.expect(";");
            return self.stmt(StmtKind::Assert { condition, message }, location);
        }
        if self.eat("rethrow") {
            self.expect(";");
            return self.stmt(StmtKind::Rethrow, location);
        }
        if self.peek().is_identifier() && self.peek().text == "yield" {
            self.advance();
            let is_star = self.eat("*");
            let value = self.parse_expression();
            self.expect(";");
            return self.stmt(StmtKind::Yield { value, is_star }, location);
        }
        let const_expression = self.at("const")
            && (self.peek_at(1).is("[")
                || self.peek_at(1).is("{")
                || self.peek_at(1).is("<")
                || self.peek_at(2).is("(")
                || self.peek_at(2).is("."));
        if self.at("var") || self.at("final") || self.at("late") || (self.at("const") && !const_expression) {
            return match self.parse_variable_declaration() {
                Some(variable) => {
                    self.expect(";");
                    self.stmt(StmtKind::Variable(variable), location)
                }
                None => self.stmt(StmtKind::Empty, location),
            };
        }
        if self.is_local_function_start() {
            let return_type = if self.peek().is_identifier()
                && (self.peek_at(1).is("(") || self.is_generic_name_at(self.pos))
            {
                None
            } else {
                Some(self.parse_type())
            };
            let name = self.expect_identifier();
            let function =
                self.parse_function_rest(name, return_type, Vec::new(), None, location.clone(), true);
            return self.stmt(StmtKind::LocalFunction(function), location);
        }
        if self.is_typed_declaration_start() {
            return match self.parse_variable_declaration() {
                Some(variable) => {
                    self.expect(";");
                    self.stmt(StmtKind::Variable(variable), location)
                }
                None => self.stmt(StmtKind::Empty, location),
            };
        }

        let expr = self.parse_expression();
        self.expect(";");
        self.stmt(StmtKind::Expression(expr), location)
    }

    fn parse_for(&mut self) -> Stmt {
        let location = self.loc();
        let is_await = self.eat("await");
        self.expect("for");
        self.expect("(");

        let save = self.pos;
        let modifier = if self.eat("var") {
            VarModifier::Var
        } else if self.eat("final") {
            VarModifier::Final
        } else {
            VarModifier::Typed
        };
        let ty = match self.scan_type(self.pos) {
            Some(end) if self.tok(end).is_identifier() && self.tok(end + 1).is("in") => {
                Some(self.parse_type())
            }
            _ => None,
        };
        if self.peek().is_identifier() && self.peek_at(1).is("in") {
            let variable = self.advance().text;
            self.advance();
            let iterable = self.parse_expression();
            self.expect(")");
            let body = Box::new(self.parse_statement());
            let modifier = if modifier == VarModifier::Typed && ty.is_none() {
                VarModifier::Var
            } else {
                modifier
            };
            return self.stmt(
                StmtKind::ForIn {
                    modifier,
                    ty,
                    variable,
                    iterable,
                    body,
                    is_await,
                },
                location,
            );
        }
        self.pos = save;

        let init = if self.at(";") {
            None
        } else {
            let init_location = self.loc();
            if self.at("var") || self.at("final") || self.is_typed_declaration_start() {
                self.parse_variable_declaration()
                    .map(|variable| Box::new(self.stmt(StmtKind::Variable(variable), init_location)))
            } else {
                let expr = self.parse_expression();
                Some(Box::new(self.stmt(StmtKind::Expression(expr), init_location)))
            }
        };
        self.expect(";");
        let condition = if self.at(";") {
            None
        } else {
            Some(self.parse_expression())
        };
        self.expect(";");
        let mut updates = Vec::new();
        while !self.at(")") && !self.at_eof() {
            updates.push(self.parse_expression());
            if !self.eat(",") {
                break;
            }
        }
        self.expect(")");
        let body = Box::new(self.parse_statement());
        self.stmt(
            StmtKind::For {
                init,
                condition,
                updates,
                body,
            },
            location,
        )
    }

    fn parse_switch(&mut self) -> Stmt {
        let location = self.loc();
        self.advance();
        self.expect("(");
        let subject = self.parse_expression();
        self.expect(")");
        let mut cases = Vec::new();
        if self.expect("{") {
            while !self.at("}") && !self.at_eof() {
                let case_location = self.loc();
                let (patterns, is_default) = if self.eat("case") {
                    (vec![self.parse_expression()], false)
                } else if self.eat("default") {
                    (Vec::new(), true)
                } else {
                    self.error_here("expected 'case' or 'default'");
                    self.advance();
                    continue;
                };
                self.expect(":");
                let mut body = Vec::new();
                while !self.at("case") && !self.at("default") && !self.at("}") && !self.at_eof() {
                    let start = self.pos;
                    let before = self.diagnostics.len();
                    body.push(self.parse_statement());
                    if self.pos == start {
                        self.advance();
                    }
                    if self.diagnostics.len() > before {
                        self.synchronize_statement();
                    }
                }
                cases.push(SwitchCase {
                    patterns,
                    is_default,
                    body,
                    location: case_location,
                });
            }
            self.expect("}");
        }
        self.stmt(StmtKind::Switch { subject, cases }, location)
    }

    fn parse_try(&mut self) -> Stmt {
        let location = self.loc();
        self.advance();
        let body = self.parse_block();
        let mut catches = Vec::new();
        loop {
            let catch_location = self.loc();
            let on_type = if self.peek().is_identifier() && self.peek().text == "on" {
                self.advance();
                Some(self.parse_type())
            } else if self.at("catch") {
                None
            } else {
                break;
            };
            let (exception, stack_trace) = if self.eat("catch") {
                self.expect("(");
                let exception = Some(self.expect_identifier());
                let stack_trace = if self.eat(",") {
                    Some(self.expect_identifier())
                } else {
                    None
                };
                self.expect(")");
                (exception, stack_trace)
            } else {
                (None, None)
            };
            let body = self.parse_block();
            catches.push(CatchClause {
                on_type,
                exception,
                stack_trace,
                body,
                location: catch_location,
            });
        }
        let finally = if self.eat("finally") {
            Some(self.parse_block())
        } else {
            None
        };
        if catches.is_empty() && finally.is_none() {
            self.error_here("expected 'catch', 'on' or 'finally'");
        }
        self.stmt(
            StmtKind::Try {
                body,
                catches,
                finally,
            },
            location,
        )
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPRESSIONS
    // ═══════════════════════════════════════════════════════════════════════════

    fn parse_expression(&mut self) -> Expr {
        if self.depth >= MAX_NESTING {
            let location = self.too_deep();
            return self.expr(ExprKind::Error("nesting too deep".to_string()), location);
        }
        self.depth += 1;
        let expr = self.parse_expression_inner();
        self.depth -= 1;
        expr
    }

    /// Reports nesting past `MAX_NESTING` and skips the construct at the
    /// cursor (a whole bracketed group when it starts with one).
    fn too_deep(&mut self) -> SourceLocation {
        let location = self.loc();
        self.error_at(
            diagnostics::PARSE_NESTING_TOO_DEEP,
            format!("nesting exceeds {} levels", MAX_NESTING),
            location.clone(),
        );
        let opens_group = self.at("(") || self.at("[") || self.at("{");
        match self.skip_balanced(self.pos) {
            Some(end) if opens_group => self.pos = end,
            _ => {
                self.advance();
            }
        }
        location
    }

    fn parse_expression_inner(&mut self) -> Expr {
        if self.at("throw") {
            let location = self.loc();
            self.advance();
            let value = self.parse_expression();
            return self.expr(ExprKind::Throw(Box::new(value)), location);
        }

        let location = self.loc();
        let target = self.parse_conditional();

        if let Some((op, width)) = self.assignment_operator() {
            let op_location = self.loc();
            for _ in 0..width {
                self.advance();
            }
            if !is_assignable(&target) {
                self.error_at(
                    diagnostics::PARSE_INVALID_ASSIGNMENT,
                    "invalid assignment target",
                    op_location,
                );
            }
            let value = self.parse_expression();
            return self.expr(
                ExprKind::Assign {
                    op,
                    target: Box::new(target),
                    value: Box::new(value),
                },
                location,
            );
        }

        if self.at("..") || self.at("?..") {
            return self.parse_cascade(target);
        }
        target
    }

    /// Assignment operator at the cursor and how many tokens it spans.
    fn assignment_operator(&self) -> Option<(AssignOp, usize)> {
        let token = self.peek();
        if token.kind != TokenKind::Operator {
            return None;
        }
        if token.text == ">" && self.peek_at(1).is(">=") && self.adjacent(self.pos + 1) {
            return Some((AssignOp::Compound(BinaryOp::Shr), 2));
        }
        AssignOp::from_symbol(&token.text).map(|op| (op, 1))
    }

    fn parse_cascade(&mut self, target: Expr) -> Expr {
        let location = target.location.clone();
        let null_aware = self.at("?..");
        let mut sections = Vec::new();
        while self.at("..") || self.at("?..") {
            let section_location = self.loc();
            self.advance();
            let receiver = self.expr(ExprKind::CascadeReceiver, section_location.clone());
            let mut section = if self.at("[") {
                self.advance();
                let index = self.parse_expression();
                self.expect("]");
                self.expr(
                    ExprKind::Index {
                        target: Box::new(receiver),
                        index: Box::new(index),
                        null_aware: false,
                    },
                    section_location.clone(),
                )
            } else {
                let name = self.expect_member_name();
                self.expr(
                    ExprKind::PropertyAccess {
                        target: Box::new(receiver),
                        name,
                        null_aware: false,
                    },
                    section_location.clone(),
                )
            };
            section = self.parse_selectors(section);
            if let Some((op, width)) = self.assignment_operator() {
                for _ in 0..width {
                    self.advance();
                }
                let value = self.parse_conditional();
                section = self.expr(
                    ExprKind::Assign {
                        op,
                        target: Box::new(section),
                        value: Box::new(value),
                    },
                    section_location,
                );
            }
            sections.push(section);
        }
        self.expr(
            ExprKind::Cascade {
                target: Box::new(target),
                sections,
                null_aware,
            },
            location,
        )
    }

    fn parse_conditional(&mut self) -> Expr {
        let condition = self.parse_binary(1);
        if !self.at("?") {
            return condition;
        }
        let location = condition.location.clone();
        self.advance();
        let then_expr = self.parse_expression();
        self.expect(":");
        let else_expr = self.parse_conditional();
        self.expr(
            ExprKind::Conditional {
                condition: Box::new(condition),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            location,
        )
    }

    /// Binary operator at the cursor: operator, precedence, token width.
    fn binary_operator(&self) -> Option<(BinaryOp, u8, usize)> {
        let token = self.peek();
        if token.kind != TokenKind::Operator {
            return None;
        }
        if token.text == ">" {
            let next = self.peek_at(1);
            if self.adjacent(self.pos + 1) {
                if next.is(">") {
                    return BinaryOp::from_symbol(">>").map(|(op, prec)| (op, prec, 2));
                }
                if next.is(">=") {
                    return None;
                }
            }
        }
        BinaryOp::from_symbol(&token.text).map(|(op, prec)| (op, prec, 1))
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Expr {
        let mut left = self.parse_unary();
        loop {
            if (self.at("is") || self.at("as")) && TYPE_TEST_PRECEDENCE >= min_precedence {
                let location = left.location.clone();
                let is_test = self.advance().text == "is";
                if is_test {
                    let negated = self.eat("!");
                    let ty = self.parse_type();
                    left = self.expr(
                        ExprKind::Is {
                            expr: Box::new(left),
                            ty,
                            negated,
                        },
                        location,
                    );
                } else {
                    let ty = self.parse_type();
                    left = self.expr(
                        ExprKind::As {
                            expr: Box::new(left),
                            ty,
                        },
                        location,
                    );
                }
                continue;
            }

            let Some((op, precedence, width)) = self.binary_operator() else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            for _ in 0..width {
                self.advance();
            }
            let right = self.parse_binary(precedence + 1);
            let location = left.location.clone();
            left = self.expr(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                location,
            );
        }
        left
    }

    /// Operand of a prefix operator; prefix chains count toward `MAX_NESTING`.
    fn parse_prefix_operand(&mut self) -> Expr {
        if self.depth >= MAX_NESTING {
            let location = self.too_deep();
            return self.expr(ExprKind::Error("nesting too deep".to_string()), location);
        }
        self.depth += 1;
        let operand = self.parse_unary();
        self.depth -= 1;
        operand
    }

    fn parse_unary(&mut self) -> Expr {
        let location = self.loc();
        let op = match self.peek().text.as_str() {
            "-" if self.peek().kind == TokenKind::Operator => Some(UnaryOp::Neg),
            "!" if self.peek().kind == TokenKind::Operator => Some(UnaryOp::Not),
            "~" if self.peek().kind == TokenKind::Operator => Some(UnaryOp::BitNot),
            "++" => Some(UnaryOp::Increment),
            "--" => Some(UnaryOp::Decrement),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_prefix_operand();
            return self.expr(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                    prefix: true,
                },
                location,
            );
        }
        if self.peek().is_identifier() && self.peek().text == "await" && self.starts_operand(self.pos + 1) {
            self.advance();
            let operand = self.parse_prefix_operand();
            return self.expr(ExprKind::Await(Box::new(operand)), location);
        }

        let primary = self.parse_primary();
        let mut expr = self.parse_selectors(primary);
        while self.at("++") || self.at("--") {
            let op = if self.advance().text == "++" {
                UnaryOp::Increment
            } else {
                UnaryOp::Decrement
            };
            let location = expr.location.clone();
            expr = self.expr(
                ExprKind::Unary {
                    op,
                    operand: Box::new(expr),
                    prefix: false,
                },
                location,
            );
        }
        expr
    }

    /// Whether token `i` can begin an operand (used to tell `await x` from a
    /// variable named `await`).
    fn starts_operand(&self, i: usize) -> bool {
        let token = self.tok(i);
        match token.kind {
            TokenKind::Identifier
            | TokenKind::IntLiteral
            | TokenKind::DoubleLiteral
            | TokenKind::StringLiteral
            | TokenKind::InterpolatedString => true,
            TokenKind::Keyword => ["this", "super", "new", "const", "true", "false", "null"]
                .iter()
                .any(|kw| token.text == *kw),
            TokenKind::Punctuation => token.is("(") || token.is("[") || token.is("{"),
            TokenKind::Operator => token.is("-") || token.is("!") || token.is("<"),
            _ => false,
        }
    }

    fn parse_selectors(&mut self, mut expr: Expr) -> Expr {
        loop {
            let location = expr.location.clone();
            if self.eat(".") {
                let name = self.expect_member_name();
                expr = self.expr(
                    ExprKind::PropertyAccess {
                        target: Box::new(expr),
                        name,
                        null_aware: false,
                    },
                    location,
                );
            } else if self.eat("?.") {
                let name = self.expect_member_name();
                expr = self.expr(
                    ExprKind::PropertyAccess {
                        target: Box::new(expr),
                        name,
                        null_aware: true,
                    },
                    location,
                );
            } else if self.at("?") && self.peek_at(1).is("[") && self.adjacent(self.pos) && self.adjacent(self.pos + 1) {
                self.advance();
                self.advance();
                let index = self.parse_expression();
                self.expect("]");
                expr = self.expr(
                    ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                        null_aware: true,
                    },
                    location,
                );
            } else if self.eat("[") {
                let index = self.parse_expression();
                self.expect("]");
                expr = self.expr(
                    ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                        null_aware: false,
                    },
                    location,
                );
            } else if self.at("(") {
                let arguments = self.parse_arguments();
                expr = self.expr(
                    ExprKind::Call {
                        callee: Box::new(expr),
                        type_arguments: Vec::new(),
                        arguments,
                    },
                    location,
                );
            } else if self.at("<")
                && self
                    .scan_type_arguments(self.pos)
                    .map_or(false, |end| self.tok(end).is("("))
            {
                let type_arguments = self.parse_type_arguments();
                let arguments = self.parse_arguments();
                expr = self.expr(
                    ExprKind::Call {
                        callee: Box::new(expr),
                        type_arguments,
                        arguments,
                    },
                    location,
                );
            } else if self.at("!") && self.adjacent(self.pos) && !self.peek_at(1).is("=") {
                self.advance();
                expr = self.expr(ExprKind::NullAssert(Box::new(expr)), location);
            } else {
                return expr;
            }
        }
    }

    fn parse_arguments(&mut self) -> Vec<Argument> {
        let mut arguments = Vec::new();
        if !self.expect("(") {
            return arguments;
        }
        while !self.at(")") && !self.at_eof() {
            let start = self.pos;
            let location = self.loc();
            let name = if self.peek().is_identifier() && self.peek_at(1).is(":") {
                let name = self.advance().text;
                self.advance();
                Some(name)
            } else {
                None
            };
            let value = self.parse_expression();
            arguments.push(Argument {
                name,
                value,
                location,
            });
            if !self.eat(",") {
                if self.pos == start {
                    self.advance();
                }
                break;
            }
        }
        self.expect(")");
        arguments
    }

    fn parse_primary(&mut self) -> Expr {
        let location = self.loc();
        let token = self.peek().clone();
        match token.kind {
            TokenKind::IntLiteral => {
                self.advance();
                // Hex literals up to 64 bits wrap into the signed range.
                let parsed = match token.text.strip_prefix("0x").or_else(|| token.text.strip_prefix("0X")) {
                    Some(hex) => u64::from_str_radix(hex, 16).ok().map(|v| v as i64),
                    None => token.text.parse::<i64>().ok(),
                };
                // Out-of-range literals were reported when the token was read.
                let value = parsed.unwrap_or_default();
                self.expr(ExprKind::Literal(Literal::Int(value)), location)
            }
            TokenKind::DoubleLiteral => {
                self.advance();
                let value = token.text.parse::<f64>().unwrap_or(0.0);
                self.expr(ExprKind::Literal(Literal::Double(value)), location)
            }
            TokenKind::StringLiteral | TokenKind::InterpolatedString => self.parse_strings(),
            TokenKind::Identifier => {
                self.advance();
                self.expr(ExprKind::Identifier(token.text), location)
            }
            TokenKind::Keyword => match token.text.as_str() {
                "true" | "false" => {
                    self.advance();
                    self.expr(ExprKind::Literal(Literal::Bool(token.text == "true")), location)
                }
                "null" => {
                    self.advance();
                    self.expr(ExprKind::Literal(Literal::Null), location)
                }
                "this" => {
                    self.advance();
                    self.expr(ExprKind::This, location)
                }
                "super" => {
                    self.advance();
                    self.expr(ExprKind::Super, location)
                }
                "new" => {
                    self.advance();
                    self.parse_new(false, location)
                }
                "const" => {
                    self.advance();
                    if self.at("[") || self.at("{") || self.at("<") {
                        self.parse_collection(true, location)
                    } else {
                        self.parse_new(true, location)
                    }
                }
                "throw" => self.parse_expression(),
                _ => self.primary_error(location),
            },
            TokenKind::Operator if token.text == "<" => self.parse_collection(false, location),
            TokenKind::Punctuation => match token.text.as_str() {
                "(" if self.is_lambda_start() => {
                    let parameters = self.parse_parameter_list();
                    let body = self.parse_function_body(true);
                    self.expr(ExprKind::Lambda { parameters, body }, location)
                }
                "(" => {
                    self.advance();
                    let inner = self.parse_expression();
                    self.expect(")");
                    inner
                }
                "[" | "{" => self.parse_collection(false, location),
                _ => self.primary_error(location),
            },
            _ => self.primary_error(location),
        }
    }

    /// Reports a missing expression. Structural closers are left in place so
    /// the enclosing construct can recover.
    fn primary_error(&mut self, location: SourceLocation) -> Expr {
        self.error_here("expected expression");
        let structural = [";", ")", "}", "]", ","].iter().any(|t| self.at(t)) || self.at_eof();
        let text = if structural {
            String::new()
        } else {
            self.advance().text
        };
        self.expr(ExprKind::Error(text), location)
    }

    fn parse_new(&mut self, is_const: bool, location: SourceLocation) -> Expr {
        let mut ty = self.parse_type();
        let mut constructor = None;
        if let Some((prefix, last)) = ty.name.rsplit_once('.') {
            if last.chars().next().map_or(false, |c| c.is_lowercase()) {
                constructor = Some(last.to_string());
                ty.name = prefix.to_string();
            }
        }
        if constructor.is_none() && self.eat(".") {
            constructor = Some(self.expect_identifier());
        }
        let arguments = self.parse_arguments();
        self.expr(
            ExprKind::New {
                is_const,
                ty,
                constructor,
                arguments,
            },
            location,
        )
    }

    fn parse_collection(&mut self, is_const: bool, location: SourceLocation) -> Expr {
        let type_arguments = if self.at("<") {
            self.parse_type_arguments()
        } else {
            Vec::new()
        };
        if self.eat("[") {
            let elements = self.parse_elements("]");
            return self.expr(
                ExprKind::ListLiteral {
                    is_const,
                    type_arguments,
                    elements,
                },
                location,
            );
        }
        if self.eat("{") {
            let elements = self.parse_elements("}");
            let has_entries = elements.iter().any(element_is_entry);
            let is_map = type_arguments.len() == 2
                || has_entries
                || (elements.is_empty() && type_arguments.len() != 1);
            let kind = if is_map {
                ExprKind::MapLiteral {
                    is_const,
                    type_arguments,
                    elements,
                }
            } else {
                ExprKind::SetLiteral {
                    is_const,
                    type_arguments,
                    elements,
                }
            };
            return self.expr(kind, location);
        }
        self.primary_error(location)
    }

    fn parse_elements(&mut self, close: &str) -> Vec<CollectionElement> {
        let mut elements = Vec::new();
        while !self.at(close) && !self.at_eof() {
            let start = self.pos;
            elements.push(self.parse_element());
            if !self.eat(",") {
                if self.pos == start {
                    self.advance();
                }
                break;
            }
        }
        self.expect(close);
        elements
    }

    fn parse_element(&mut self) -> CollectionElement {
        if self.at("...") || self.at("...?") {
            let null_aware = self.advance().text == "...?";
            let expr = self.parse_expression();
            return CollectionElement::Spread { expr, null_aware };
        }
        if self.eat("if") {
            self.expect("(");
            let condition = self.parse_expression();
            self.expect(")");
            let then = Box::new(self.parse_element());
            let otherwise = if self.eat("else") {
                Some(Box::new(self.parse_element()))
            } else {
                None
            };
            return CollectionElement::If {
                condition,
                then,
                otherwise,
            };
        }
        let expr = self.parse_expression();
        if self.eat(":") {
            let value = self.parse_expression();
            return CollectionElement::MapEntry { key: expr, value };
        }
        CollectionElement::Expr { expr }
    }

    /// Adjacent string literals concatenate; interpolations are parsed in
    /// place with locations relative to the literal.
    fn parse_strings(&mut self) -> Expr {
        let location = self.loc();
        let mut parts: Vec<StringPart> = Vec::new();
        while matches!(
            self.peek().kind,
            TokenKind::StringLiteral | TokenKind::InterpolatedString
        ) {
            let token = self.advance();
            for segment in decode_string_literal(&token.text) {
                match segment {
                    StringSegment::Text(text) => match parts.last_mut() {
                        Some(StringPart::Text { value }) => value.push_str(&text),
                        _ => parts.push(StringPart::Text { value: text }),
                    },
                    StringSegment::Interpolation { source, char_offset } => {
                        let expr = self.parse_embedded(&source, &token.location, char_offset);
                        parts.push(StringPart::Interpolation { expr });
                    }
                }
            }
        }

        if parts.iter().all(|p| matches!(p, StringPart::Text { .. })) {
            let value: String = parts
                .into_iter()
                .map(|p| match p {
                    StringPart::Text { value } => value,
                    StringPart::Interpolation { .. } => String::new(),
                })
                .collect();
            return self.expr(ExprKind::Literal(Literal::String(value)), location);
        }
        self.expr(ExprKind::StringInterpolation(parts), location)
    }

    fn parse_embedded(&mut self, source: &str, origin: &SourceLocation, char_offset: usize) -> Expr {
        let column = origin.column + char_offset as u32;
        let raw: Vec<Token> = Lexer::with_position(source, origin.file.clone(), origin.line, column).collect();
        let (tokens, docs) = self.significant_tokens(raw);

        let saved_tokens = std::mem::replace(&mut self.tokens, tokens);
        let saved_docs = std::mem::replace(&mut self.docs, docs);
        let saved_pos = std::mem::replace(&mut self.pos, 0);

        let expr = self.parse_expression();
        if !self.at_eof() {
            self.error_here("unexpected token in string interpolation");
        }

        self.tokens = saved_tokens;
        self.docs = saved_docs;
        self.pos = saved_pos;
        expr
    }
}

fn element_is_entry(element: &CollectionElement) -> bool {
    match element {
        CollectionElement::MapEntry { .. } => true,
        CollectionElement::If { then, .. } => element_is_entry(then),
        _ => false,
    }
}

fn is_assignable(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Identifier(_) | ExprKind::PropertyAccess { .. } | ExprKind::Index { .. }
    )
}

fn doc_text(comment: &str) -> String {
    if let Some(rest) = comment.strip_prefix("///") {
        return rest.trim().to_string();
    }
    comment
        .trim_start_matches("/**")
        .trim_end_matches("*/")
        .lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
