#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use crate::diagnostics::{self, DiagnosticKind, Diagnostics};
    use crate::ir::*;
    use crate::lowering::{default_module, lower_unit, ModuleTarget, FACTORY_METHOD};
    use crate::parse::parse_source;
    use crate::widgets::analyze_widgets;

    fn lower(source: &str) -> (IrModule, Diagnostics) {
        lower_with(source, &HashMap::new())
    }

    fn lower_with(source: &str, modules: &HashMap<String, ModuleTarget>) -> (IrModule, Diagnostics) {
        let (unit, parse_diagnostics) = parse_source(source, "test.dart");
        assert!(parse_diagnostics.is_empty(), "{:?}", parse_diagnostics);
        let mut sink = Diagnostics::new();
        let widgets = analyze_widgets(&unit, false, &mut sink);
        let mut ir_sink = Diagnostics::new();
        let module = lower_unit(&unit, modules, &widgets.external_dependencies, &mut ir_sink);
        (module, ir_sink)
    }

    fn class<'m>(module: &'m IrModule, name: &str) -> &'m ClassDecl {
        module
            .declarations
            .iter()
            .find_map(|d| match d {
                DeclarationIR::Class(c) if c.name == name => Some(c),
                _ => None,
            })
            .unwrap_or_else(|| panic!("class {} not lowered", name))
    }

    fn variable_initializer<'m>(module: &'m IrModule, name: &str) -> &'m ExpressionIR {
        module
            .declarations
            .iter()
            .find_map(|d| match d {
                DeclarationIR::Variable(v) => v
                    .declarators
                    .iter()
                    .find(|decl| decl.name == name)
                    .and_then(|decl| decl.initializer.as_ref()),
                _ => None,
            })
            .unwrap_or_else(|| panic!("variable {} not lowered", name))
    }

    /// First expression object of the given kind tag, depth first.
    fn find_kind<'v>(value: &'v serde_json::Value, tag: &str) -> Option<&'v serde_json::Value> {
        match value {
            serde_json::Value::Object(map) => {
                if map.get("type").and_then(|t| t.as_str()) == Some(tag) {
                    return Some(value);
                }
                map.values().find_map(|v| find_kind(v, tag))
            }
            serde_json::Value::Array(items) => items.iter().find_map(|v| find_kind(v, tag)),
            _ => None,
        }
    }

    #[test]
    fn test_duplicate_named_argument_keeps_first() {
        let (module, diagnostics) = lower("var w = Text('a', style: 1, style: 2);");
        let errors: Vec<_> = diagnostics
            .iter()
            .filter(|d| d.code == diagnostics::IR_DUPLICATE_NAMED_ARGUMENT)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, DiagnosticKind::AnalysisError);

        match &variable_initializer(&module, "w").kind {
            ExpressionKind::InstanceCreation { arguments, .. } => {
                assert_eq!(arguments.positional.len(), 1);
                assert_eq!(arguments.named.len(), 1);
                assert_eq!(
                    arguments.named["style"].kind,
                    ExpressionKind::Literal {
                        value: LiteralValue::Integer(1)
                    }
                );
            }
            other => panic!("expected instance creation, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_constant_map_key_is_dropped() {
        let (module, diagnostics) = lower("var m = {'a': 1, 'a': 2, 'b': 3};");
        assert_eq!(
            diagnostics
                .iter()
                .filter(|d| d.code == diagnostics::IR_DUPLICATE_MAP_KEY)
                .count(),
            1
        );
        match &variable_initializer(&module, "m").kind {
            ExpressionKind::MapLiteral { entries, .. } => assert_eq!(entries.len(), 2),
            other => panic!("expected map literal, got {:?}", other),
        }
    }

    #[test]
    fn test_lambda_captures_are_sorted() {
        let (module, _) = lower("void main() { var b = 1; var a = 2; run((x) => b + a + x); }");
        let json = serde_json::to_value(&module).unwrap_or_default();
        let lambda = find_kind(&json, "lambda").expect("lambda");
        assert_eq!(lambda["captured"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_bare_member_references_are_qualified_with_this() {
        let (module, _) = lower("class Counter { int count = 0; void increment() { count++; } }");
        let method = &class(&module, "Counter").methods[0];
        let statements = match &method.body {
            FunctionBodyIR::Block { statements } => statements,
            other => panic!("expected block, got {:?}", other),
        };
        let operand = match &statements[0].kind {
            StatementKind::Expression { expr } => match &expr.kind {
                ExpressionKind::Unary { operand, .. } => operand,
                other => panic!("expected unary, got {:?}", other),
            },
            other => panic!("expected expression statement, got {:?}", other),
        };
        match &operand.kind {
            ExpressionKind::PropertyAccess { target, name, .. } => {
                assert_eq!(name, "count");
                assert!(matches!(target.kind, ExpressionKind::Identifier { is_this: true, .. }));
                assert_eq!(operand.result_type.name, "int");
            }
            other => panic!("expected this.count, got {:?}", other),
        }
    }

    #[test]
    fn test_unnamed_factory_is_called_through_create() {
        let (module, _) = lower(
            "class Logger {
               factory Logger() => Logger._internal();
               Logger._internal();
             }
             var log = Logger();",
        );
        let logger = class(&module, "Logger");
        assert_eq!(logger.constructors[0].kind, ConstructorKind::Factory);
        assert!(logger.constructors[0].name.is_none());
        assert!(!logger.has_unnamed_generative_constructor());

        match &variable_initializer(&module, "log").kind {
            ExpressionKind::InstanceCreation { constructor, .. } => {
                assert_eq!(constructor.as_deref(), Some(FACTORY_METHOD));
            }
            other => panic!("expected instance creation, got {:?}", other),
        }
    }

    #[test]
    fn test_named_constructor_call_is_instance_creation() {
        let (module, _) = lower("class P { P.origin(); } var p = P.origin();");
        match &variable_initializer(&module, "p").kind {
            ExpressionKind::InstanceCreation {
                class_type,
                constructor,
                ..
            } => {
                assert_eq!(class_type.name, "P");
                assert_eq!(constructor.as_deref(), Some("origin"));
            }
            other => panic!("expected instance creation, got {:?}", other),
        }
    }

    #[test]
    fn test_equal_types_share_one_allocation() {
        let (module, _) = lower("class A { int a = 0; int b = 1; List<int> c; List<int> d; }");
        let fields = &class(&module, "A").fields;
        assert!(Arc::ptr_eq(&fields[0].ty, &fields[1].ty));
        assert!(Arc::ptr_eq(&fields[2].ty, &fields[3].ty));
        assert_eq!(fields[2].ty.to_string(), "List<int>");
    }

    #[test]
    fn test_expression_ids_are_unique() {
        let (module, _) = lower("int twice(int x) => x * 2; var y = twice(3) + twice(4);");
        let json = serde_json::to_value(&module).unwrap_or_default();
        let mut ids = Vec::new();
        collect_ids(&json, &mut ids);
        let count = ids.len();
        ids.sort_unstable();
        ids.dedup();
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

    #[test]
    fn test_framework_import_binds_external_names() {
        let mut modules = HashMap::new();
        modules.insert(
            "package:flutter/material.dart".to_string(),
            ModuleTarget {
                module: "@flutterjs/material".to_string(),
                is_framework: true,
            },
        );
        let (module, _) = lower_with(
            "import 'package:flutter/material.dart';
             class Page extends StatelessWidget { build(context) => Text('x'); }",
            &modules,
        );
        match &module.declarations[0] {
            DeclarationIR::Import(import) => {
                assert_eq!(import.module, "@flutterjs/material");
                assert!(import.is_framework);
                assert!(import.items.contains(&"Text".to_string()));
                assert!(import.items.contains(&"StatelessWidget".to_string()));
            }
            other => panic!("expected import, got {:?}", other),
        }
    }

    #[test]
    fn test_default_module_rewrites_source_extension() {
        assert_eq!(default_module("utils/math.dart"), "utils/math.js");
        assert_eq!(default_module("lib.mjs"), "lib.mjs");
    }

    #[test]
    fn test_schema_version_is_checked() {
        let mismatch = IrModule::from_json(r#"{"schemaVersion": 99, "file": "a.dart", "declarations": []}"#);
        assert!(matches!(
            mismatch,
            Err(SchemaError::VersionMismatch {
                expected: IR_SCHEMA_VERSION,
                found: 99
            })
        ));

        let missing = IrModule::from_json(r#"{"file": "a.dart", "declarations": []}"#);
        assert!(matches!(missing, Err(SchemaError::MissingField("schemaVersion"))));

        let (module, _) = lower("class A { int f(int x) => x + 1; }");
        let json = module.to_json().expect("serialize");
        let restored = IrModule::from_json(&json).expect("deserialize");
        assert_eq!(restored, module);
    }
}
