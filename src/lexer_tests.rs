#[cfg(test)]
mod tests {
    use crate::lexer::{tokenize, LexErrorKind, Lexer, TokenCategory, TokenKind};

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source, "test.dart").iter().map(|t| t.kind).collect()
    }

    fn texts(source: &str) -> Vec<String> {
        tokenize(source, "test.dart")
            .into_iter()
            .filter(|t| t.kind != TokenKind::Eof)
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_keywords_identifiers_and_literals() {
        assert_eq!(
            kinds("final count = 42;"),
            vec![
                TokenKind::Keyword,
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::IntLiteral,
                TokenKind::Punctuation,
                TokenKind::Eof,
            ]
        );
        assert_eq!(kinds("3.14")[0], TokenKind::DoubleLiteral);
        assert_eq!(kinds("1e10")[0], TokenKind::DoubleLiteral);
        assert_eq!(kinds("0xFF")[0], TokenKind::IntLiteral);
    }

    #[test]
    fn test_null_aware_and_cascade_operators() {
        assert_eq!(
            texts("a?.b ?? c; x ??= y; list..add(1)?..clear();"),
            vec![
                "a", "?.", "b", "??", "c", ";", "x", "??=", "y", ";", "list", "..", "add", "(",
                "1", ")", "?..", "clear", "(", ")", ";",
            ]
        );
    }

    #[test]
    fn test_interpolated_strings() {
        let tokens = tokenize(r#"'Hello $name' "${a + b}" 'plain'"#, "test.dart");
        assert_eq!(tokens[0].kind, TokenKind::InterpolatedString);
        assert_eq!(tokens[1].kind, TokenKind::InterpolatedString);
        assert_eq!(tokens[2].kind, TokenKind::StringLiteral);
    }

    #[test]
    fn test_raw_string_is_never_interpolated() {
        let tokens = tokenize(r"r'cost: $price'", "test.dart");
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].text, r"r'cost: $price'");
    }

    #[test]
    fn test_interpolation_may_contain_quotes_and_braces() {
        let tokens = tokenize(r#"'${map['key']} and ${ {1}.length }' x"#, "test.dart");
        assert_eq!(tokens[0].kind, TokenKind::InterpolatedString);
        assert_eq!(tokens[1].text, "x");
    }

    #[test]
    fn test_comments_are_retained_as_trivia() {
        let tokens = tokenize("// line\n/// doc\n/* block /* nested */ */ x", "test.dart");
        let comment_kinds: Vec<TokenKind> = tokens
            .iter()
            .filter(|t| t.kind.is_trivia())
            .map(|t| t.kind)
            .collect();
        assert_eq!(
            comment_kinds,
            vec![TokenKind::LineComment, TokenKind::DocComment, TokenKind::BlockComment]
        );
        assert_eq!(tokens[3].text, "x");
    }

    #[test]
    fn test_unexpected_character_becomes_error_token() {
        let tokens = tokenize("a ` b", "test.dart");
        assert_eq!(tokens[1].kind, TokenKind::Error);
        assert_eq!(tokens[1].error, Some(LexErrorKind::UnexpectedCharacter));
        assert_eq!(tokens[1].text, "`");
        // Lexing continues after the error.
        assert_eq!(tokens[2].text, "b");
        assert_eq!(tokens[3].kind, TokenKind::Eof);
    }

    #[test]
    fn test_unterminated_string_and_comment() {
        let tokens = tokenize("'abc\nx", "test.dart");
        assert_eq!(tokens[0].error, Some(LexErrorKind::UnterminatedString));

        let tokens = tokenize("/* never closed", "test.dart");
        assert_eq!(tokens[0].error, Some(LexErrorKind::UnterminatedComment));
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
    }

    #[test]
    fn test_integer_literal_overflow() {
        let tokens = tokenize("99999999999999999999 0x1FFFFFFFFFFFFFFFF 0xFFFFFFFFFFFFFFFF 42", "test.dart");
        assert_eq!(tokens[0].kind, TokenKind::IntLiteral);
        assert_eq!(tokens[0].error, Some(LexErrorKind::IntegerOverflow));
        assert_eq!(tokens[1].error, Some(LexErrorKind::IntegerOverflow));
        assert_eq!(tokens[2].error, None);
        assert_eq!(tokens[3].error, None);
    }

    #[test]
    fn test_locations_track_lines_and_columns() {
        let tokens = tokenize("class A {\n  int x;\n}", "widget.dart");
        let int_token = &tokens[3];
        assert_eq!(int_token.text, "int");
        assert_eq!(int_token.location.line, 2);
        assert_eq!(int_token.location.column, 3);
        assert_eq!(&*int_token.location.file, "widget.dart");
        assert_eq!(int_token.offset, 12);
    }

    #[test]
    fn test_lexer_stops_after_single_eof() {
        let mut lexer = Lexer::new("x", "test.dart");
        assert_eq!(lexer.next().map(|t| t.kind), Some(TokenKind::Identifier));
        assert_eq!(lexer.next().map(|t| t.kind), Some(TokenKind::Eof));
        assert!(lexer.next().is_none());
        assert!(lexer.next().is_none());
    }

    #[test]
    fn test_empty_source_yields_only_eof() {
        let tokens = tokenize("   \n\t ", "test.dart");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind.category(), TokenCategory::EndOfInput);
    }
}
