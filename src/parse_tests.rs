#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::diagnostics::{self, Diagnostic, DiagnosticKind};
    use crate::parse::parse_source;

    fn parse_ok(source: &str) -> CompilationUnit {
        let (unit, diagnostics) = parse_source(source, "test.dart");
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {:?}", diagnostics);
        unit
    }

    fn only_class(unit: &CompilationUnit) -> &ClassDeclaration {
        match unit.declarations.as_slice() {
            [Declaration::Class(class)] => class,
            other => panic!("expected one class, got {:?}", other),
        }
    }

    /// Initializer of the first declarator of the first top-level variable.
    fn initializer(unit: &CompilationUnit) -> &Expr {
        for declaration in &unit.declarations {
            if let Declaration::Variable(variable) = declaration {
                if let Some(init) = &variable.declarators[0].initializer {
                    return init;
                }
            }
        }
        panic!("no initialized top-level variable");
    }

    #[test]
    fn test_stateless_widget_class() {
        let unit = parse_ok("class Counter extends StatelessWidget { build(context) { return Text('Hi'); } }");
        let class = only_class(&unit);
        assert_eq!(class.name, "Counter");
        assert_eq!(class.superclass.as_ref().map(|s| s.name.as_str()), Some("StatelessWidget"));
        let methods: Vec<&str> = class.methods().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["build"]);
    }

    #[test]
    fn test_generic_superclass_keeps_arguments() {
        let unit = parse_ok("class _CounterState extends State<Counter> { int count = 0; }");
        let class = only_class(&unit);
        let superclass = class.superclass.as_ref().map(TypeAnnotation::display);
        assert_eq!(superclass.as_deref(), Some("State<Counter>"));
        assert_eq!(class.fields().count(), 1);
    }

    #[test]
    fn test_multiplicative_binds_tighter_than_additive() {
        let unit = parse_ok("var x = 1 + 2 * 3;");
        match &initializer(&unit).kind {
            ExprKind::Binary { op: BinaryOp::Add, right, .. } => {
                assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("expected addition, got {:?}", other),
        }
    }

    #[test]
    fn test_if_null_is_loosest_binary_operator() {
        let unit = parse_ok("var x = a ?? b || c;");
        match &initializer(&unit).kind {
            ExprKind::Binary { op: BinaryOp::IfNull, right, .. } => {
                assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Or, .. }));
            }
            other => panic!("expected ??, got {:?}", other),
        }
    }

    #[test]
    fn test_type_tests_and_casts() {
        let unit = parse_ok("var a = x is! String; var b = y as int;");
        let kinds: Vec<&ExprKind> = unit
            .declarations
            .iter()
            .filter_map(|d| match d {
                Declaration::Variable(v) => v.declarators[0].initializer.as_ref().map(|e| &e.kind),
                _ => None,
            })
            .collect();
        assert!(matches!(kinds[0], ExprKind::Is { negated: true, .. }));
        assert!(matches!(kinds[1], ExprKind::As { ty, .. } if ty.name == "int"));
    }

    #[test]
    fn test_cascade_sections() {
        let unit = parse_ok("var p = Paint()..color = red..strokeWidth = 2;");
        match &initializer(&unit).kind {
            ExprKind::Cascade { sections, null_aware, .. } => {
                assert_eq!(sections.len(), 2);
                assert!(!null_aware);
                assert!(sections
                    .iter()
                    .all(|s| matches!(s.kind, ExprKind::Assign { .. })));
            }
            other => panic!("expected cascade, got {:?}", other),
        }
    }

    #[test]
    fn test_null_aware_access() {
        let unit = parse_ok("var n = user?.name;");
        assert!(matches!(
            initializer(&unit).kind,
            ExprKind::PropertyAccess { null_aware: true, .. }
        ));
    }

    #[test]
    fn test_parameter_lists() {
        let unit = parse_ok("void f(int a, [int b = 1]) {} void g({required String c, int d = 2}) {}");
        let functions: Vec<&FunctionDeclaration> = unit
            .declarations
            .iter()
            .filter_map(|d| match d {
                Declaration::Function(f) => Some(f),
                _ => None,
            })
            .collect();
        assert_eq!(functions[0].parameters.positional.len(), 1);
        assert_eq!(functions[0].parameters.optional_positional.len(), 1);
        assert!(functions[0].parameters.optional_positional[0].default_value.is_some());

        let named = &functions[1].parameters.named;
        assert_eq!(named.len(), 2);
        assert!(named[0].is_required);
        assert!(!named[1].is_required);
        assert!(named[1].default_value.is_some());
    }

    #[test]
    fn test_constructor_forms() {
        let unit = parse_ok(
            "class Point {
               final int x;
               const Point(this.x, {super.key}) : assert(x >= 0);
               Point.origin() : this(0);
               factory Point.parse(String s) => Point(int.parse(s));
             }",
        );
        let class = only_class(&unit);
        let constructors: Vec<&ConstructorDeclaration> = class.constructors().collect();
        assert_eq!(constructors.len(), 3);

        let unnamed = constructors[0];
        assert!(unnamed.is_const);
        assert!(unnamed.name.is_none());
        assert_eq!(unnamed.parameters.positional[0].form, ParameterForm::ThisField);
        assert_eq!(unnamed.parameters.named[0].form, ParameterForm::SuperForward);
        assert!(matches!(unnamed.initializers[0], ConstructorInitializer::Assert { .. }));

        assert_eq!(constructors[1].name.as_deref(), Some("origin"));
        assert!(matches!(constructors[1].initializers[0], ConstructorInitializer::Redirect { .. }));

        assert!(constructors[2].is_factory);
        assert!(matches!(constructors[2].body.kind, BodyKind::Arrow(_)));
    }

    #[test]
    fn test_import_combinators() {
        let unit = parse_ok("import 'package:flutter/material.dart' show Text, Column; import 'util.dart' as u;");
        let imports: Vec<&ImportDirective> = unit
            .declarations
            .iter()
            .filter_map(|d| match d {
                Declaration::Import(i) => Some(i),
                _ => None,
            })
            .collect();
        assert_eq!(imports[0].uri, "package:flutter/material.dart");
        assert_eq!(imports[0].show, vec!["Text", "Column"]);
        assert_eq!(imports[1].prefix.as_deref(), Some("u"));
    }

    #[test]
    fn test_collection_literals() {
        let unit = parse_ok("const xs = <int>[1, ...rest, if (flag) 2]; var m = {'a': 1}; var s = {1, 2};");
        let initializers: Vec<&ExprKind> = unit
            .declarations
            .iter()
            .filter_map(|d| match d {
                Declaration::Variable(v) => v.declarators[0].initializer.as_ref().map(|e| &e.kind),
                _ => None,
            })
            .collect();
        match initializers[0] {
            ExprKind::ListLiteral { elements, type_arguments, .. } => {
                assert_eq!(elements.len(), 3);
                assert_eq!(type_arguments[0].name, "int");
                assert!(matches!(elements[1], CollectionElement::Spread { .. }));
                assert!(matches!(elements[2], CollectionElement::If { .. }));
            }
            other => panic!("expected list, got {:?}", other),
        }
        assert!(matches!(initializers[1], ExprKind::MapLiteral { .. }));
        assert!(matches!(initializers[2], ExprKind::SetLiteral { .. }));
    }

    #[test]
    fn test_string_interpolation_parts() {
        let unit = parse_ok("var greeting = 'Hello $name, ${count + 1}!';");
        match &initializer(&unit).kind {
            ExprKind::StringInterpolation(parts) => {
                let interpolations = parts
                    .iter()
                    .filter(|p| matches!(p, StringPart::Interpolation { .. }))
                    .count();
                assert_eq!(interpolations, 2);
            }
            other => panic!("expected interpolation, got {:?}", other),
        }
    }

    #[test]
    fn test_recovers_after_statement_error() {
        let (unit, diagnostics) = parse_source("void broken() { var = ; } void ok() {}", "test.dart");
        assert!(diagnostics.iter().any(|d| d.kind == DiagnosticKind::ParseError));
        let names: Vec<&str> = unit
            .declarations
            .iter()
            .filter_map(|d| match d {
                Declaration::Function(f) => Some(f.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["broken", "ok"]);
    }

    #[test]
    fn test_lex_errors_become_diagnostics() {
        let (unit, diagnostics) = parse_source("class A {}\n`\nclass B {}", "test.dart");
        let lex_errors: Vec<&Diagnostic> = diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::LexError)
            .collect();
        assert_eq!(lex_errors.len(), 1);
        assert_eq!(lex_errors[0].source_location.line, 2);
        assert_eq!(unit.declarations.len(), 2);
    }

    #[test]
    fn test_generic_return_types() {
        let unit = parse_ok(
            "List<int> g() { return [1]; }
             Future<void> main() async { runApp(MyApp()); }
             T first<T>(List<T> xs) => xs[0];",
        );
        let functions: Vec<&FunctionDeclaration> = unit
            .declarations
            .iter()
            .filter_map(|d| match d {
                Declaration::Function(f) => Some(f),
                _ => None,
            })
            .collect();
        let names: Vec<&str> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["g", "main", "first"]);

        let list = functions[0].return_type.as_ref().expect("return type");
        assert_eq!(list.name, "List");
        assert_eq!(list.arguments.len(), 1);
        assert_eq!(list.arguments[0].name, "int");
        assert_eq!(functions[1].return_type.as_ref().map(|t| t.name.as_str()), Some("Future"));
        assert_eq!(functions[2].return_type.as_ref().map(|t| t.name.as_str()), Some("T"));
        assert_eq!(functions[2].type_parameters.len(), 1);
    }

    #[test]
    fn test_generic_member_return_types() {
        let unit = parse_ok(
            "class Counter extends StatefulWidget {
               State<Counter> createState() => _CounterState();
               Map<String, int> get totals => {};
               List<T> twice<T>(T x) => [x, x];
             }",
        );
        let class = only_class(&unit);
        let methods: Vec<(&str, MethodKind)> = class.methods().map(|m| (m.name.as_str(), m.kind)).collect();
        assert_eq!(
            methods,
            vec![
                ("createState", MethodKind::Method),
                ("totals", MethodKind::Getter),
                ("twice", MethodKind::Method),
            ]
        );
        let create_state = class.find_method("createState").expect("createState");
        assert_eq!(create_state.return_type.as_ref().map(|t| t.name.as_str()), Some("State"));
    }

    #[test]
    fn test_generic_local_function() {
        let unit = parse_ok(
            "void main() {
               List<int> build() { return [1]; }
               pick<T>(T x) => x;
               print(pick(build()[0]));
             }",
        );
        let Some(Declaration::Function(main)) = unit.declarations.first() else {
            panic!("expected main, got {:?}", unit.declarations);
        };
        let BodyKind::Block(block) = &main.body.kind else {
            panic!("expected block body");
        };
        let locals: Vec<(&str, Option<&str>)> = block
            .statements
            .iter()
            .filter_map(|s| match &s.kind {
                StmtKind::LocalFunction(f) => Some((f.name.as_str(), f.return_type.as_ref().map(|t| t.name.as_str()))),
                _ => None,
            })
            .collect();
        assert_eq!(locals, vec![("build", Some("List")), ("pick", None)]);
    }

    #[test]
    fn test_deep_expression_nesting_is_reported() {
        let depth = 500;
        let source = format!("final x = {}1{};", "(".repeat(depth), ")".repeat(depth));
        let (unit, diagnostics) = parse_source(&source, "deep.dart");
        assert!(diagnostics
            .iter()
            .any(|d| d.code == diagnostics::PARSE_NESTING_TOO_DEEP && d.kind == DiagnosticKind::ParseError));
        assert_eq!(unit.declarations.len(), 1);
    }

    #[test]
    fn test_deep_block_nesting_is_reported() {
        let depth = 500;
        let source = format!("void main() {{ {}{} }} class After {{}}", "{".repeat(depth), "}".repeat(depth));
        let (unit, diagnostics) = parse_source(&source, "deep.dart");
        assert!(diagnostics.iter().any(|d| d.code == diagnostics::PARSE_NESTING_TOO_DEEP));
        assert!(unit
            .declarations
            .iter()
            .any(|d| matches!(d, Declaration::Class(c) if c.name == "After")));
    }

    #[test]
    fn test_nesting_below_limit_parses() {
        let source = format!("final x = {}1{};", "(".repeat(40), ")".repeat(40));
        parse_ok(&source);
    }

    #[test]
    fn test_integer_overflow_is_a_lex_error() {
        let (unit, diagnostics) = parse_source("final big = 99999999999999999999;", "test.dart");
        let overflow: Vec<&Diagnostic> = diagnostics
            .iter()
            .filter(|d| d.code == diagnostics::LEX_INTEGER_OVERFLOW)
            .collect();
        assert_eq!(overflow.len(), 1);
        assert_eq!(overflow[0].kind, DiagnosticKind::LexError);
        assert_eq!(unit.declarations.len(), 1);

        let (_, diagnostics) = parse_source("final max = 9223372036854775807; final mask = 0xFFFFFFFFFFFFFFFF;", "test.dart");
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {:?}", diagnostics);
    }

    #[test]
    fn test_node_ids_are_unique() {
        let unit = parse_ok("class A { int f(int x) => x + 1; } void main() { A().f(2); }");
        let json = serde_json::to_value(&unit).unwrap_or_default();
        let mut ids = Vec::new();
        collect_ids(&json, &mut ids);
        let count = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert!(count > 5);
        assert_eq!(ids.len(), count);
    }

    fn collect_ids(value: &serde_json::Value, out: &mut Vec<u64>) {
        match value {
            serde_json::Value::Object(map) => {
                if let Some(id) = map.get("id").and_then(serde_json::Value::as_u64) {
                    out.push(id);
                }
                map.values().for_each(|v| collect_ids(v, out));
            }
            serde_json::Value::Array(items) => items.iter().for_each(|v| collect_ids(v, out)),
            _ => {}
        }
    }
}
