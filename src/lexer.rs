//! Lexer for the widget dialect
//!
//! Converts source text into `Token`s. The lexer is a pull-based iterator: it
//! never fails, unrecognized input becomes an `Error` token, comments are kept
//! as trivia tokens and the stream always ends with exactly one `Eof`.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::diagnostics::SourceLocation;

lazy_static! {
    /// Reserved words and built-in identifiers lexed as `Keyword`.
    /// Contextual words (`get`, `set`, `show`, `hide`, `on`, `async`, `sync`,
    /// `await`, `yield`, `of`) stay identifiers and are matched by text.
    static ref KEYWORDS: HashSet<&'static str> = [
        "abstract", "as", "assert", "break", "case", "catch", "class", "const", "continue",
        "covariant", "default", "do", "else", "enum", "export", "extends", "external",
        "factory", "false", "final", "finally", "for", "if", "implements", "import", "in",
        "is", "late", "library", "mixin", "new", "null", "operator", "part", "required",
        "rethrow", "return", "static", "super", "switch", "this", "throw", "true", "try",
        "typedef", "var", "void", "while", "with",
    ]
    .into_iter()
    .collect();
}

/// Operators ordered longest first so the scanner can take the first match.
/// No `>>` or `>>=`: nested type-argument closers stay separate tokens and
/// the parser joins adjacent `>`s.
const OPERATORS: &[&str] = &[
    "...?", "~/=", "<<=", "??=", "?..", "...", "==", "!=", "<=", ">=", "&&", "||", "??", "?.",
    "..", "=>", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "++", "--", "<<", "~/", "+",
    "-", "*", "/", "%", "<", ">", "=", "!", "~", "&", "|", "^", "?", ":", "@",
];

const PUNCTUATION: &[char] = &['(', ')', '{', '}', '[', ']', ',', ';', '.', '#'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenKind {
    Keyword,
    Identifier,
    IntLiteral,
    DoubleLiteral,
    StringLiteral,
    /// String literal containing `$name` or `${...}` segments.
    InterpolatedString,
    Operator,
    Punctuation,
    LineComment,
    BlockComment,
    DocComment,
    Error,
    Eof,
}

/// Coarse token category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenCategory {
    Keyword,
    Identifier,
    Literal,
    Operator,
    Punctuation,
    Comment,
    Error,
    EndOfInput,
}

impl TokenKind {
    pub fn category(self) -> TokenCategory {
        match self {
            TokenKind::Keyword => TokenCategory::Keyword,
            TokenKind::Identifier => TokenCategory::Identifier,
            TokenKind::IntLiteral
            | TokenKind::DoubleLiteral
            | TokenKind::StringLiteral
            | TokenKind::InterpolatedString => TokenCategory::Literal,
            TokenKind::Operator => TokenCategory::Operator,
            TokenKind::Punctuation => TokenCategory::Punctuation,
            TokenKind::LineComment | TokenKind::BlockComment | TokenKind::DocComment => {
                TokenCategory::Comment
            }
            TokenKind::Error => TokenCategory::Error,
            TokenKind::Eof => TokenCategory::EndOfInput,
        }
    }

    pub fn is_trivia(self) -> bool {
        self.category() == TokenCategory::Comment
    }
}

/// Why an `Error` token was produced. `IntegerOverflow` is the exception: it
/// rides on an `IntLiteral` token so the parser still sees an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LexErrorKind {
    UnexpectedCharacter,
    UnterminatedString,
    UnterminatedComment,
    IntegerOverflow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub location: SourceLocation,
    /// Byte offset of the first character.
    pub offset: usize,
    #[serde(default)]
    pub error: Option<LexErrorKind>,
}

impl Token {
    pub fn is(&self, text: &str) -> bool {
        matches!(
            self.kind,
            TokenKind::Keyword | TokenKind::Identifier | TokenKind::Operator | TokenKind::Punctuation
        ) && self.text == text
    }

    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Identifier
    }

    pub fn end_offset(&self) -> usize {
        self.offset + self.text.len()
    }
}

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(word)
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}

/// Pull-based lexer. Create a new one to restart from the beginning.
pub struct Lexer<'a> {
    source: &'a str,
    file: Arc<str>,
    cursor: usize,
    line: u32,
    column: u32,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, file: impl Into<Arc<str>>) -> Self {
        Self::with_position(source, file, 1, 1)
    }

    /// Lexer whose locations start at `line`/`column`, used for text embedded
    /// in a larger unit (string interpolations).
    pub fn with_position(
        source: &'a str,
        file: impl Into<Arc<str>>,
        line: u32,
        column: u32,
    ) -> Self {
        Self {
            source,
            file: file.into(),
            cursor: 0,
            line,
            column,
            finished: false,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.source[self.cursor..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.source[self.cursor..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.cursor += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn make(&self, kind: TokenKind, start: usize, location: SourceLocation) -> Token {
        Token {
            kind,
            text: self.source[start..self.cursor].to_string(),
            location,
            offset: start,
            error: None,
        }
    }

    fn make_error(
        &self,
        error: LexErrorKind,
        start: usize,
        location: SourceLocation,
    ) -> Token {
        let mut token = self.make(TokenKind::Error, start, location);
        token.error = Some(error);
        token
    }

    fn scan(&mut self) -> Token {
        self.skip_whitespace();
        let start = self.cursor;
        let location = SourceLocation::new(self.file.clone(), self.line, self.column);

        let ch = match self.peek_char() {
            Some(ch) => ch,
            None => {
                self.finished = true;
                return self.make(TokenKind::Eof, start, location);
            }
        };

        if ch == '/' && self.peek_nth(1) == Some('/') {
            return self.scan_line_comment(start, location);
        }
        if ch == '/' && self.peek_nth(1) == Some('*') {
            return self.scan_block_comment(start, location);
        }
        if ch == 'r' && matches!(self.peek_nth(1), Some('\'') | Some('"')) {
            self.bump();
            return self.scan_string(start, location, true);
        }
        if is_ident_start(ch) {
            while let Some(c) = self.peek_char() {
                if !is_ident_continue(c) {
                    break;
                }
                self.bump();
            }
            let word = &self.source[start..self.cursor];
            let kind = if is_keyword(word) {
                TokenKind::Keyword
            } else {
                TokenKind::Identifier
            };
            return self.make(kind, start, location);
        }
        if ch.is_ascii_digit() || (ch == '.' && self.peek_nth(1).map_or(false, |c| c.is_ascii_digit())) {
            return self.scan_number(start, location);
        }
        if ch == '\'' || ch == '"' {
            return self.scan_string(start, location, false);
        }

        let rest = &self.source[self.cursor..];
        if let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            for _ in 0..op.chars().count() {
                self.bump();
            }
            return self.make(TokenKind::Operator, start, location);
        }
        if PUNCTUATION.contains(&ch) {
            self.bump();
            return self.make(TokenKind::Punctuation, start, location);
        }

        self.bump();
        self.make_error(LexErrorKind::UnexpectedCharacter, start, location)
    }

    fn scan_line_comment(&mut self, start: usize, location: SourceLocation) -> Token {
        let is_doc = self.source[self.cursor..].starts_with("///");
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
        let kind = if is_doc {
            TokenKind::DocComment
        } else {
            TokenKind::LineComment
        };
        self.make(kind, start, location)
    }

    /// Block comments nest.
    fn scan_block_comment(&mut self, start: usize, location: SourceLocation) -> Token {
        let rest = &self.source[self.cursor..];
        let is_doc = rest.starts_with("/**") && !rest.starts_with("/**/");
        self.bump();
        self.bump();
        let mut depth = 1;
        while depth > 0 {
            match self.peek_char() {
                None => {
                    return self.make_error(LexErrorKind::UnterminatedComment, start, location)
                }
                Some('*') if self.peek_nth(1) == Some('/') => {
                    self.bump();
                    self.bump();
                    depth -= 1;
                }
                Some('/') if self.peek_nth(1) == Some('*') => {
                    self.bump();
                    self.bump();
                    depth += 1;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        let kind = if is_doc {
            TokenKind::DocComment
        } else {
            TokenKind::BlockComment
        };
        self.make(kind, start, location)
    }

    fn scan_number(&mut self, start: usize, location: SourceLocation) -> Token {
        if self.peek_char() == Some('0') && matches!(self.peek_nth(1), Some('x') | Some('X')) {
            self.bump();
            self.bump();
            while self.peek_char().map_or(false, |c| c.is_ascii_hexdigit()) {
                self.bump();
            }
            let mut token = self.make(TokenKind::IntLiteral, start, location);
            if u64::from_str_radix(&token.text[2..], 16).is_err() {
                token.error = Some(LexErrorKind::IntegerOverflow);
            }
            return token;
        }

        let mut is_double = false;
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek_char() == Some('.') && self.peek_nth(1).map_or(false, |c| c.is_ascii_digit()) {
            is_double = true;
            self.bump();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let sign_then_digit = matches!(self.peek_nth(1), Some('+') | Some('-'))
                && self.peek_nth(2).map_or(false, |c| c.is_ascii_digit());
            if sign_then_digit || self.peek_nth(1).map_or(false, |c| c.is_ascii_digit()) {
                is_double = true;
                self.bump();
                if sign_then_digit {
                    self.bump();
                }
                while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }
        if is_double {
            return self.make(TokenKind::DoubleLiteral, start, location);
        }
        let mut token = self.make(TokenKind::IntLiteral, start, location);
        if token.text.parse::<i64>().is_err() {
            token.error = Some(LexErrorKind::IntegerOverflow);
        }
        token
    }

    /// Scans a (possibly raw, possibly triple-quoted) string. The cursor is on
    /// the opening quote. `${...}` segments are skipped with brace counting so
    /// quotes and braces inside an interpolation do not end the literal.
    fn scan_string(&mut self, start: usize, location: SourceLocation, raw: bool) -> Token {
        let quote = match self.bump() {
            Some(q) => q,
            None => return self.make_error(LexErrorKind::UnterminatedString, start, location),
        };
        let triple = self.peek_char() == Some(quote) && self.peek_nth(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }
        let mut interpolated = false;

        loop {
            let ch = match self.peek_char() {
                Some(ch) => ch,
                None => return self.make_error(LexErrorKind::UnterminatedString, start, location),
            };
            if ch == '\n' && !triple {
                return self.make_error(LexErrorKind::UnterminatedString, start, location);
            }
            if ch == quote {
                if !triple {
                    self.bump();
                    break;
                }
                if self.peek_nth(1) == Some(quote) && self.peek_nth(2) == Some(quote) {
                    self.bump();
                    self.bump();
                    self.bump();
                    break;
                }
                self.bump();
                continue;
            }
            if ch == '\\' && !raw {
                self.bump();
                self.bump();
                continue;
            }
            if ch == '$' && !raw {
                match self.peek_nth(1) {
                    Some('{') => {
                        interpolated = true;
                        self.bump();
                        self.bump();
                        if !self.skip_interpolation() {
                            return self.make_error(
                                LexErrorKind::UnterminatedString,
                                start,
                                location,
                            );
                        }
                        continue;
                    }
                    Some(c) if is_ident_start(c) && c != '$' => {
                        interpolated = true;
                    }
                    _ => {}
                }
            }
            self.bump();
        }

        let kind = if interpolated {
            TokenKind::InterpolatedString
        } else {
            TokenKind::StringLiteral
        };
        self.make(kind, start, location)
    }

    /// Skips to the `}` closing an interpolation; returns false at end of input.
    fn skip_interpolation(&mut self) -> bool {
        let mut depth = 1;
        while let Some(ch) = self.peek_char() {
            match ch {
                '{' => {
                    depth += 1;
                    self.bump();
                }
                '}' => {
                    depth -= 1;
                    self.bump();
                    if depth == 0 {
                        return true;
                    }
                }
                '\'' | '"' => {
                    let start = self.cursor;
                    let location = SourceLocation::new(self.file.clone(), self.line, self.column);
                    if self.scan_string(start, location, false).kind == TokenKind::Error {
                        return false;
                    }
                }
                _ => {
                    self.bump();
                }
            }
        }
        false
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        Some(self.scan())
    }
}

/// Eagerly lex `source`; the result always ends with an `Eof` token.
pub fn tokenize(source: &str, file: &str) -> Vec<Token> {
    Lexer::new(source, file).collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// STRING LITERAL DECODING
// ═══════════════════════════════════════════════════════════════════════════════

/// A decoded piece of a string literal.
#[derive(Debug, Clone, PartialEq)]
pub enum StringSegment {
    Text(String),
    /// Interpolated source text with its offset (in chars) from the token start.
    Interpolation { source: String, char_offset: usize },
}

/// Decodes the lexeme of a string token into text and interpolation segments.
pub fn decode_string_literal(lexeme: &str) -> Vec<StringSegment> {
    let raw = lexeme.starts_with('r');
    let body_start = if raw { 1 } else { 0 };
    let chars: Vec<char> = lexeme.chars().collect();
    if chars.len() <= body_start {
        return Vec::new();
    }
    let quote = chars[body_start];
    let triple = chars.len() >= body_start + 6
        && chars[body_start + 1] == quote
        && chars[body_start + 2] == quote;
    let delim = if triple { 3 } else { 1 };
    let open = body_start + delim;
    let close = chars.len().saturating_sub(delim).max(open);

    let mut segments = Vec::new();
    let mut text = String::new();
    let mut i = open;
    while i < close {
        let c = chars[i];
        if raw {
            text.push(c);
            i += 1;
            continue;
        }
        if c == '\\' && i + 1 < close {
            let (decoded, consumed) = decode_escape(&chars[i + 1..close]);
            text.push_str(&decoded);
            i += 1 + consumed;
            continue;
        }
        if c == '$' && i + 1 < close {
            if chars[i + 1] == '{' {
                let mut depth = 1;
                let mut j = i + 2;
                while j < close {
                    match chars[j] {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    j += 1;
                }
                if !text.is_empty() {
                    segments.push(StringSegment::Text(std::mem::take(&mut text)));
                }
                segments.push(StringSegment::Interpolation {
                    source: chars[i + 2..j.min(close)].iter().collect(),
                    char_offset: i + 2,
                });
                i = j + 1;
                continue;
            }
            if is_ident_start(chars[i + 1]) && chars[i + 1] != '$' {
                let mut j = i + 1;
                while j < close && is_ident_continue(chars[j]) && chars[j] != '$' {
                    j += 1;
                }
                if !text.is_empty() {
                    segments.push(StringSegment::Text(std::mem::take(&mut text)));
                }
                segments.push(StringSegment::Interpolation {
                    source: chars[i + 1..j].iter().collect(),
                    char_offset: i + 1,
                });
                i = j;
                continue;
            }
        }
        text.push(c);
        i += 1;
    }
    if !text.is_empty() || segments.is_empty() {
        segments.push(StringSegment::Text(text));
    }
    segments
}

fn decode_escape(rest: &[char]) -> (String, usize) {
    let Some(&c) = rest.first() else {
        return ("\\".to_string(), 0);
    };
    match c {
        'n' => ("\n".to_string(), 1),
        't' => ("\t".to_string(), 1),
        'r' => ("\r".to_string(), 1),
        'b' => ("\u{8}".to_string(), 1),
        'f' => ("\u{c}".to_string(), 1),
        'v' => ("\u{b}".to_string(), 1),
        'x' if rest.len() >= 3 => {
            let hex: String = rest[1..3].iter().collect();
            match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                Some(ch) => (ch.to_string(), 3),
                None => ("x".to_string(), 1),
            }
        }
        'u' if rest.get(1) == Some(&'{') => {
            let end = rest.iter().position(|&c| c == '}').unwrap_or(rest.len());
            let hex: String = rest[2..end.max(2)].iter().collect();
            match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                Some(ch) => (ch.to_string(), (end + 1).min(rest.len())),
                None => ("u".to_string(), 1),
            }
        }
        'u' if rest.len() >= 5 => {
            let hex: String = rest[1..5].iter().collect();
            match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                Some(ch) => (ch.to_string(), 5),
                None => ("u".to_string(), 1),
            }
        }
        other => (other.to_string(), 1),
    }
}
