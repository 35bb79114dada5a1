#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use crate::cache::content_hash;
    use crate::codegen::{ConfigError, GenConfig};
    use crate::diagnostics::{self, DiagnosticKind};
    use crate::ir::DeclarationIR;
    use crate::pipeline::*;
    use crate::resolver::{ImportResolver, ResolutionType, ResolverConfig};
    use crate::ssr::Compatibility;
    use crate::widgets::WidgetKind;

    const COUNTER_APP: &str = "import 'package:flutter/material.dart';

void main() { runApp(new CounterApp()); }

class CounterApp extends StatefulWidget {
  createState() => _CounterAppState();
}

class _CounterAppState extends State<CounterApp> {
  int count = 0;

  void increment() {
    setState(() { count++; });
  }

  Widget build(BuildContext context) {
    return Column(children: [
      Text('Count: $count'),
      ElevatedButton(onPressed: increment, child: Text('+')),
    ]);
  }
}
";

    #[test]
    fn test_analysis_report_collects_every_stage() {
        let report = analyze(COUNTER_APP, &AnalyzeOptions::for_file("lib/main.dart"));

        assert_eq!(report.file_path, "lib/main.dart");
        assert_eq!(report.source_hash, content_hash(COUNTER_APP));
        assert_eq!(report.entry_point.as_deref(), Some("main"));
        assert_eq!(report.root_widget.as_deref(), Some("CounterApp"));
        let kinds: Vec<WidgetKind> = report.widgets.iter().map(|w| w.kind).collect();
        assert_eq!(kinds, vec![WidgetKind::Stateful, WidgetKind::State]);
        assert_eq!(report.state.state_links.len(), 1);
        assert_eq!(report.ssr.compatibility, Compatibility::High);
        assert_eq!(report.imports.len(), 1);
        assert!(report.resolved_imports.is_empty());
        assert!(report.external_dependencies.contains(&"ElevatedButton".to_string()));
        assert!(!report.has_errors(), "{:?}", report.diagnostics);
    }

    #[test]
    fn test_locations_use_configured_file_path() {
        let report = analyze("class A {\n  void f( {}\n}", &AnalyzeOptions::for_file("widgets/a.dart"));
        assert!(report.has_errors());
        assert!(report
            .diagnostics
            .iter()
            .all(|d| &*d.source_location.file == "widgets/a.dart"));
    }

    #[test]
    fn test_compile_end_to_end() {
        let result = compile(COUNTER_APP, &AnalyzeOptions::default(), &GenConfig::default()).expect("compile");
        let code = &result.output.code;

        assert!(code.starts_with("import { "));
        assert!(code.contains("from \"@flutterjs/material\";"));
        assert!(code.contains("class CounterApp extends StatefulWidget {"));
        assert!(code.contains("class _CounterAppState extends State {"));
        assert!(code.contains("this.setState(() => {"));
        assert!(code.contains("this.count++;"));
        assert!(code.contains("onPressed: this.increment.bind(this)"));
        assert!(code.contains("`Count: ${this.count}`"));
        assert!(result.output.errors.is_empty(), "{:?}", result.output.errors);
        assert!(result.output.warnings.is_empty(), "{:?}", result.output.warnings);

        let import = result
            .module
            .declarations
            .iter()
            .find_map(|d| match d {
                DeclarationIR::Import(i) => Some(i),
                _ => None,
            })
            .expect("import");
        assert!(import.is_framework);
        assert!(import.items.contains(&"Text".to_string()));
    }

    #[test]
    fn test_build_ir_appends_ir_diagnostics() {
        let mut report = analyze("var w = Text('a', key: 1, key: 2);", &AnalyzeOptions::default());
        assert!(!report.has_errors());
        let module = build_ir(&mut report);
        assert_eq!(module.declarations.len(), 1);
        assert!(report
            .diagnostics
            .iter()
            .any(|d| d.code == diagnostics::IR_DUPLICATE_NAMED_ARGUMENT));
    }

    #[test]
    fn test_unresolved_import_is_warning() {
        let dir = tempfile::tempdir().expect("tempdir");
        let resolver = ImportResolver::new(ResolverConfig::new(dir.path()));
        let report = analyze_with_resolver(
            "import 'package:flutter/widgets.dart';\nimport 'missing.dart';\nclass A {}",
            &AnalyzeOptions::default(),
            &resolver,
        );

        assert_eq!(report.resolved_imports.len(), 2);
        assert_eq!(
            report.resolved_imports[0].resolution.resolution_type,
            ResolutionType::Framework
        );
        let warning = report
            .diagnostics
            .iter()
            .find(|d| d.code == diagnostics::IMPORT_UNRESOLVED)
            .expect("warning");
        assert_eq!(warning.kind, DiagnosticKind::AnalysisWarning);
        assert_eq!(warning.source_location.line, 2);
        assert!(!report.has_errors());
    }

    #[test]
    fn test_compile_rejects_invalid_config() {
        let config = GenConfig {
            indent: "--".to_string(),
            ..GenConfig::default()
        };
        let result = compile("class A {}", &AnalyzeOptions::default(), &config);
        assert!(matches!(result, Err(ConfigError::InvalidIndent(_))));
    }

    #[test]
    fn test_compile_project_is_sorted_and_relative() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        fs::create_dir_all(root.join("lib/widgets")).expect("mkdir");
        fs::write(
            root.join("lib/widgets/button.dart"),
            "class Button extends StatelessWidget { build(context) => Text('b'); }",
        )
        .expect("write");
        fs::write(
            root.join("lib/main.dart"),
            "import 'widgets/button.dart';\nvoid main() { runApp(Button()); }",
        )
        .expect("write");
        fs::write(root.join("lib/notes.txt"), "not a source").expect("write");

        let resolver = ImportResolver::new(ResolverConfig::new(root));
        let units = compile_project(root, &AnalyzeOptions::default(), &GenConfig::default(), &resolver)
            .expect("compile project");

        let paths: Vec<&str> = units.iter().map(|u| u.path.as_str()).collect();
        assert_eq!(paths, vec!["lib/main.dart", "lib/widgets/button.dart"]);
        assert_eq!(units[0].result.report.file_path, "lib/main.dart");
        assert!(units[1].result.output.code.contains("class Button extends StatelessWidget {"));
    }

    #[test]
    fn test_compile_project_keeps_going_past_unreadable_unit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        fs::create_dir_all(root.join("lib")).expect("mkdir");
        fs::write(root.join("lib/bad.dart"), [0xff, 0xfe, 0x00, 0x80]).expect("write");
        fs::write(
            root.join("lib/good.dart"),
            "class Good extends StatelessWidget { build(context) => Text('g'); }",
        )
        .expect("write");

        let resolver = ImportResolver::new(ResolverConfig::new(root));
        let units = compile_project(root, &AnalyzeOptions::default(), &GenConfig::default(), &resolver)
            .expect("compile project");

        let paths: Vec<&str> = units.iter().map(|u| u.path.as_str()).collect();
        assert_eq!(paths, vec!["lib/bad.dart", "lib/good.dart"]);

        let bad = &units[0].result.report;
        let unreadable: Vec<_> = bad
            .diagnostics
            .iter()
            .filter(|d| d.code == diagnostics::SOURCE_UNREADABLE)
            .collect();
        assert_eq!(unreadable.len(), 1);
        assert_eq!(unreadable[0].kind, DiagnosticKind::AnalysisError);
        assert_eq!(&*unreadable[0].source_location.file, "lib/bad.dart");

        assert!(units[1].result.output.code.contains("class Good extends StatelessWidget {"));
        assert!(!units[1]
            .result
            .report
            .diagnostics
            .iter()
            .any(|d| d.code == diagnostics::SOURCE_UNREADABLE));
    }

    #[test]
    fn test_compile_project_reports_missing_root() {
        let missing = PathBuf::from("/definitely/not/here");
        let resolver = ImportResolver::new(ResolverConfig::new(&missing));
        let result = compile_project(&missing, &AnalyzeOptions::default(), &GenConfig::default(), &resolver);
        assert!(matches!(result, Err(ProjectError::Discovery(_))));
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: AnalyzeOptions = serde_json::from_str("{}").expect("options");
        assert_eq!(options, AnalyzeOptions::default());
        let options: AnalyzeOptions =
            serde_json::from_str(r#"{"filePath": "a.dart", "requireEntryPoint": true}"#).expect("options");
        assert_eq!(options.file_path, "a.dart");
        assert!(options.require_entry_point);
    }
}
