use proptest::prelude::*;
use widget_compiler::{compile, parse_source, tokenize, AnalyzeOptions, GenConfig, TokenKind};

fn widget_source() -> impl Strategy<Value = String> {
    (
        "[A-Z][a-z]{1,6}",
        prop::collection::vec(("[a-z]{1,6}", 0i64..1000), 0..4),
        "[a-zA-Z ]{0,12}",
    )
        .prop_map(|(name, fields, label)| {
            let fields: String = fields
                .iter()
                .enumerate()
                .map(|(i, (field, value))| format!("  int {}{} = {};\n", field, i, value))
                .collect();
            format!(
                "class {name} extends StatelessWidget {{\n{fields}  build(context) => Text('{label}', key: {name}Key());\n}}\n"
            )
        })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn lexer_terminates_with_single_eof(s in ".*") {
        let tokens = tokenize(&s, "prop.dart");
        let eofs = tokens.iter().filter(|t| t.kind == TokenKind::Eof).count();
        prop_assert_eq!(eofs, 1, "input={:?}", s);
        prop_assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));

        let mut previous = 0usize;
        for token in &tokens {
            prop_assert!(token.offset >= previous, "offset moved backwards in {:?}", s);
            prop_assert!(token.offset <= s.len());
            previous = token.offset;
        }
    }

    #[test]
    fn parser_never_panics(s in "[a-zA-Z0-9_(){}\\[\\];.,=+<>?!:'\" \n$-]{0,200}") {
        let (unit, _) = parse_source(&s, "prop.dart");
        prop_assert_eq!(&*unit.file, "prop.dart");
    }

    #[test]
    fn compile_is_deterministic(source in widget_source()) {
        let options = AnalyzeOptions::for_file("prop.dart");
        let config = GenConfig::default();
        let first = compile(&source, &options, &config).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let second = compile(&source, &options, &config).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(&first.output.code, &second.output.code);
        prop_assert_eq!(&first.output.fingerprint, &second.output.fingerprint);
        prop_assert!(first.output.errors.is_empty(), "{:?}", first.output.errors);
    }
}
