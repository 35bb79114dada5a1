#[cfg(test)]
mod tests {
    use crate::cache::content_hash;
    use crate::codegen::{generate, AccessorPolicy, ConfigError, FieldPolicy, GenConfig, GenerateOutput};
    use crate::diagnostics::{self, DiagnosticKind};
    use crate::pipeline::{compile, AnalyzeOptions};

    fn js_with(source: &str, config: &GenConfig) -> GenerateOutput {
        compile(source, &AnalyzeOptions::for_file("test.dart"), config)
            .expect("valid config")
            .output
    }

    fn js(source: &str) -> String {
        let output = js_with(source, &GenConfig::default());
        assert!(output.errors.is_empty(), "unexpected errors: {:?}", output.errors);
        output.code
    }

    fn position(code: &str, needle: &str) -> usize {
        code.find(needle)
            .unwrap_or_else(|| panic!("`{}` not found in:\n{}", needle, code))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // CLASSES
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_widget_gets_forwarding_constructor() {
        let code = js("class Counter extends StatelessWidget { build(context) { return Text('Hi'); } }");
        assert!(code.contains("class Counter extends StatelessWidget {"));
        assert_eq!(code.matches("constructor(").count(), 1);
        assert!(code.contains("constructor(...args) {"));
        assert!(code.contains("super(...args);"));
        assert!(code.contains("return new Text(\"Hi\");"));
    }

    #[test]
    fn test_declared_unnamed_constructor_suppresses_synthesis() {
        let code = js("class Config { factory Config.load() => Config(); Config(); }");
        assert_eq!(code.matches("constructor(").count(), 1);
        assert!(code.contains("static load() {"));
        assert!(code.contains("return new Config();"));
    }

    #[test]
    fn test_unnamed_factory_becomes_static_create() {
        let code = js(
            "class Logger {
               factory Logger() => Logger._internal();
               Logger._internal();
             }
             var log = Logger();",
        );
        assert!(code.contains("static create() {"));
        assert!(code.contains("return Logger._internal();"));
        assert!(code.contains("Logger.create()"));
        // No unnamed generative constructor, so one is synthesized.
        assert!(code.contains("constructor() {"));
    }

    #[test]
    fn test_members_are_emitted_in_fixed_order() {
        let code = js(
            "class A {
               static int s = 1;
               void m() {}
               int f = 0;
               A();
               static void sm() {}
             }",
        );
        let field = position(&code, "\n  f = 0;");
        let constructor = position(&code, "\n  constructor() {");
        let method = position(&code, "\n  m() {");
        let static_field = position(&code, "\n  static s = 1;");
        let static_method = position(&code, "\n  static sm() {");
        assert!(field < constructor);
        assert!(constructor < method);
        assert!(method < static_field);
        assert!(static_field < static_method);
    }

    #[test]
    fn test_constructor_field_policy() {
        let config = GenConfig {
            field_initializers: FieldPolicy::Constructor,
            ..GenConfig::default()
        };
        let output = js_with("class A { int f = 0; }", &config);
        assert!(output.code.contains("constructor() {\n    this.f = 0;\n  }"));
        assert!(!output.code.contains("\n  f = 0;"));
    }

    #[test]
    fn test_named_generative_constructor_builds_instance() {
        let code = js("class P { int x; P.origin() : x = 0; }");
        assert!(code.contains("static origin() {"));
        assert!(code.contains("const _self = Object.create(P.prototype);"));
        assert!(code.contains("_self.x = 0;"));
        assert!(code.contains("return _self;"));
    }

    #[test]
    fn test_initializing_formals_and_super_forwarding() {
        let code = js("class Label extends Text { final String text; Label(this.text, {super.key}); }");
        assert!(code.contains("constructor(text, { key = null } = {}) {"));
        assert!(code.contains("super({ key: key });"));
        assert!(code.contains("this.text = text;"));
    }

    #[test]
    fn test_enum_is_frozen_object() {
        let code = js("enum Color { red, green }");
        assert!(code.contains("const Color = Object.freeze({"));
        assert!(code.contains("red: Object.freeze({ name: \"red\", index: 0 }),"));
        assert!(code.contains("green: Object.freeze({ name: \"green\", index: 1 }),"));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // FUNCTIONS & EXPRESSIONS
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_named_parameters_are_destructured() {
        let code = js(
            "void greet(String name, {required String greeting, int times = 1}) {}
             void main() { greet('a', greeting: 'hi'); }",
        );
        assert!(code.contains("function greet(name, { greeting, times = 1 } = {}) {"));
        assert!(code.contains("greet(\"a\", { greeting: \"hi\" });"));
    }

    #[test]
    fn test_cascade_uses_receiver_temporary() {
        let code = js("var p = Paint()..color = 1..width = 2;");
        assert!(code.contains("_c0.color = 1; _c0.width = 2; return _c0;"));
        assert!(code.contains("(new Paint())"));
    }

    #[test]
    fn test_null_aware_access_is_guarded() {
        let code = js("name(u) => u?.name;");
        assert!(code.contains("return (u == null ? null : u.name);"));
    }

    #[test]
    fn test_type_tests_use_runtime_checks() {
        let code = js("isInt(x) => x is int; notString(x) => x is! String; widget(x) => x is Widget;");
        assert!(code.contains("return Number.isInteger(x);"));
        assert!(code.contains("return !(typeof x === \"string\");"));
        assert!(code.contains("return x instanceof Widget;"));
    }

    #[test]
    fn test_interpolation_becomes_template_literal() {
        let code = js("greet(name) => 'Hello $name!';");
        assert!(code.contains("return `Hello ${name}!`;"));
    }

    #[test]
    fn test_print_maps_to_console() {
        let code = js("void main() { print('x'); }");
        assert!(code.contains("console.log(\"x\");"));
    }

    #[test]
    fn test_cascade_statement_caches_target() {
        let code = js("void reset(list) { list..add(1)..clear(); }");
        assert!(code.contains("const _c0 = list;\n  _c0.add(1);\n  _c0.clear();"));
    }

    #[test]
    fn test_switch_cases_break_unless_they_jump() {
        let code = js(
            "void f(x) {
               switch (x) {
                 case 1:
                   print('a');
                 case 2:
                   return;
                 default:
                   print('d');
               }
             }",
        );
        assert!(code.contains("switch (x) {"));
        assert!(code.contains("case 1: {"));
        assert!(code.contains("case 2: {"));
        assert!(code.contains("default: {"));
        assert_eq!(code.matches("break;").count(), 2);
    }

    #[test]
    fn test_typed_catch_clauses_dispatch_on_instanceof() {
        let code = js(
            "void f() {
               try { g(); } on FormatException catch (e) { print(e); } catch (e) { print('other'); }
             }",
        );
        assert!(code.contains("} catch (_e0) {"));
        assert!(code.contains("if (_e0 instanceof FormatException) {"));
        assert!(code.contains("const e = _e0;"));
        assert!(code.contains("} else {"));
    }

    #[test]
    fn test_explicit_accessor_policy() {
        let config = GenConfig {
            accessors: AccessorPolicy::Explicit,
            ..GenConfig::default()
        };
        let output = js_with(
            "class Box { int _v = 0; int get value => _v; set value(int v) { _v = v; } }",
            &config,
        );
        assert!(output.code.contains("getValue() {"));
        assert!(output.code.contains("setValue(v) {"));
        assert!(output.code.contains("this._v = v;"));

        let native = js("class Box { int _v = 0; int get value => _v; }");
        assert!(native.contains("get value() {"));
        assert!(native.contains("return this._v;"));
    }

    #[test]
    fn test_explicit_accessor_call_sites() {
        let config = GenConfig {
            accessors: AccessorPolicy::Explicit,
            ..GenConfig::default()
        };
        let output = js_with(
            "class Box {
               int _v = 0;
               int get value => _v;
               set value(int v) { _v = v; }
               int twice() => value * 2;
               void reset() { value = 0; this.value += 3; }
             }",
            &config,
        );
        assert!(output.errors.is_empty(), "unexpected errors: {:?}", output.errors);
        assert!(output.code.contains("return this.getValue() * 2;"));
        assert!(output.code.contains("this.setValue(0);"));
        assert!(output.code.contains("this.setValue(this.getValue() + (3));"));
        assert!(!output.code.contains("this.value"));

        let native = js("class Box { int _v = 0; int get value => _v; int twice() => value * 2; }");
        assert!(native.contains("return this.value * 2;"));
    }

    #[test]
    fn test_explicit_accessor_increment_is_rejected() {
        let config = GenConfig {
            accessors: AccessorPolicy::Explicit,
            ..GenConfig::default()
        };
        let output = js_with(
            "class Box { int _v = 0; int get value => _v; set value(int v) { _v = v; } void bump() { value++; } }",
            &config,
        );
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].code, diagnostics::CODEGEN_UNSUPPORTED);
    }

    #[test]
    fn test_generic_return_type_function() {
        let code = js("List<int> g() { return [1]; }");
        assert!(code.contains("function g() {"));
        assert!(!code.contains("function List"));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // FAILURE POLICY & CONFIGURATION
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_failing_declaration_is_skipped() {
        let output = js_with(
            "class Vec { operator +(other) => this; }
             class Other {}",
            &GenConfig::default(),
        );
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].code, diagnostics::CODEGEN_UNSUPPORTED);
        assert_eq!(output.errors[0].kind, DiagnosticKind::CodeGenError);
        assert!(!output.errors[0].hints.is_empty());
        assert!(!output.code.contains("class Vec"));
        assert!(output.code.contains("class Other"));
    }

    #[test]
    fn test_invalid_indent_is_rejected() {
        let config = GenConfig {
            indent: "ab".to_string(),
            ..GenConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidIndent("ab".to_string())));
        assert!(generate(&[], &config).is_err());
    }

    #[test]
    fn test_tab_indentation() {
        let config = GenConfig {
            indent: "\t".to_string(),
            ..GenConfig::default()
        };
        let output = js_with("void main() { print(1); }", &config);
        assert!(output.code.contains("function main() {\n\tconsole.log(1);\n}"));
    }

    #[test]
    fn test_indentation_is_balanced() {
        let code = js(
            "class Page extends StatelessWidget {
               build(context) {
                 if (flag) { for (var i = 0; i < 3; i++) { print(i); } }
                 return Column(children: [Text('a')]);
               }
             }",
        );
        assert!(code.ends_with("}\n"));
        let last_line = code.lines().last().unwrap_or_default();
        assert_eq!(last_line, "}");
        let opens = code.matches('{').count();
        let closes = code.matches('}').count();
        assert_eq!(opens, closes);
    }

    #[test]
    fn test_export_public_declarations() {
        let config = GenConfig {
            export_public: true,
            ..GenConfig::default()
        };
        let output = js_with("class Page {} class _Hidden {} void main() {}", &config);
        assert!(output.code.contains("export class Page {"));
        assert!(output.code.contains("\nclass _Hidden {"));
        assert!(output.code.contains("export function main() {"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let source = "class Counter extends StatefulWidget { createState() => _CounterState(); }
                      class _CounterState extends State<Counter> {
                        int count = 0;
                        build(context) => Text('$count', style: TextStyle(fontSize: 2, color: red));
                      }";
        let first = js_with(source, &GenConfig::default());
        let second = js_with(source, &GenConfig::default());
        assert_eq!(first.code, second.code);
        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(first.fingerprint, content_hash(&first.code));
        // Named arguments are emitted in key order.
        assert!(first.code.contains("{ color: red, fontSize: 2 }"));
    }

    #[test]
    fn test_valid_output_has_no_verification_warnings() {
        let output = js_with(
            "main(){ runApp(new MyApp()); }
             class MyApp extends StatelessWidget { build(context) => Container(); }",
            &GenConfig::default(),
        );
        assert!(output.errors.is_empty());
        assert!(output.warnings.is_empty(), "{:?}", output.warnings);
    }
}
