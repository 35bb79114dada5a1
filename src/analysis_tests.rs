#[cfg(test)]
mod tests {
    use crate::context::{analyze_context, ConsumerStatus};
    use crate::diagnostics::{self, DiagnosticKind, Diagnostics};
    use crate::parse::parse_source;
    use crate::ssr::{analyze_ssr, Compatibility};
    use crate::state::link_states;
    use crate::widgets::{analyze_widgets, WidgetKind};

    fn sink() -> Diagnostics {
        Diagnostics::new()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // WIDGETS
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_stateless_widget_without_entry_point() {
        let (unit, _) = parse_source(
            "class Counter extends StatelessWidget { build(context) { return Text('Hi'); } }",
            "counter.dart",
        );
        let mut diagnostics = sink();
        let analysis = analyze_widgets(&unit, false, &mut diagnostics);

        assert_eq!(analysis.widgets.len(), 1);
        let widget = &analysis.widgets[0];
        assert_eq!(widget.name, "Counter");
        assert_eq!(widget.kind, WidgetKind::Stateless);
        assert_eq!(widget.methods, vec!["build"]);
        assert_eq!(analysis.entry_point, None);
        assert_eq!(analysis.root_widget, None);
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn test_entry_point_and_root_widget() {
        let (unit, _) = parse_source(
            "main(){ runApp(new MyApp()); }
             class MyApp extends StatelessWidget { build(context) => Container(); }",
            "main.dart",
        );
        let analysis = analyze_widgets(&unit, true, &mut sink());
        assert_eq!(analysis.entry_point.as_deref(), Some("main"));
        assert_eq!(analysis.root_widget.as_deref(), Some("MyApp"));
    }

    #[test]
    fn test_missing_entry_point_is_error_only_when_required() {
        let (unit, _) = parse_source("class A extends StatelessWidget {}", "lib.dart");

        let mut relaxed = sink();
        analyze_widgets(&unit, false, &mut relaxed);
        assert!(!relaxed.has_errors());

        let mut strict = sink();
        analyze_widgets(&unit, true, &mut strict);
        assert!(strict
            .iter()
            .any(|d| d.code == diagnostics::WIDGET_MISSING_ENTRY_POINT && d.kind == DiagnosticKind::AnalysisError));
    }

    #[test]
    fn test_generic_superclass_is_stripped_before_classification() {
        let (unit, _) = parse_source(
            "class Home extends StatefulWidget {}
             class _HomeState extends State<Home> {}
             class Theme2 extends InheritedWidget {}
             class Plain {}",
            "home.dart",
        );
        let analysis = analyze_widgets(&unit, false, &mut sink());
        let kinds: Vec<WidgetKind> = analysis.widgets.iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![WidgetKind::Stateful, WidgetKind::State, WidgetKind::Component, WidgetKind::Other]
        );
    }

    #[test]
    fn test_aliased_base_is_not_recognized() {
        let (unit, _) = parse_source(
            "import 'base.dart' show StatelessWidget;
             class B extends MyStateless {}",
            "alias.dart",
        );
        let analysis = analyze_widgets(&unit, false, &mut sink());
        assert_eq!(analysis.widgets[0].kind, WidgetKind::Other);
    }

    #[test]
    fn test_widget_tree_from_build_bodies() {
        let (unit, _) = parse_source(
            "class Page extends StatelessWidget {
               build(context) {
                 return Column(children: [Header(), Text('body')]);
               }
             }",
            "page.dart",
        );
        let analysis = analyze_widgets(&unit, false, &mut sink());
        let page = analysis
            .widget_tree
            .iter()
            .find(|n| n.name == "Page")
            .expect("page node");
        assert_eq!(page.children.len(), 1);
        assert_eq!(page.children[0].name, "Column");
        assert!(page.contains("Header"));
        assert!(page.contains("Text"));
    }

    #[test]
    fn test_external_dependencies_are_sorted_and_exclude_declared() {
        let (unit, _) = parse_source(
            "class Page extends StatelessWidget {
               build(context) => Scaffold(body: Local(), appBar: AppBar());
             }
             class Local extends StatelessWidget {}",
            "page.dart",
        );
        let analysis = analyze_widgets(&unit, false, &mut sink());
        assert!(analysis.external_dependencies.contains(&"AppBar".to_string()));
        assert!(analysis.external_dependencies.contains(&"Scaffold".to_string()));
        assert!(!analysis.external_dependencies.contains(&"Local".to_string()));
        let mut sorted = analysis.external_dependencies.clone();
        sorted.sort();
        assert_eq!(sorted, analysis.external_dependencies);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // STATE
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_state_link_and_set_state_count() {
        let (unit, _) = parse_source(
            "class Counter extends StatefulWidget {
               createState() => _CounterState();
             }
             class _CounterState extends State<Counter> {
               int count = 0;
               void increment() { setState(() { count++; }); }
               void reset() { setState(() => count = 0); }
             }",
            "counter.dart",
        );
        let mut diagnostics = sink();
        let widgets = analyze_widgets(&unit, false, &mut diagnostics);
        let state = link_states(&unit, &widgets, &mut diagnostics);

        let link = state.link_for("Counter").expect("link");
        assert_eq!(link.state_class, "_CounterState");
        assert!(link.declared);
        assert!(link.extends_state);
        assert_eq!(state.set_state_call_count.get("_CounterState"), Some(&2));
        assert!(state.errors.is_empty());
    }

    #[test]
    fn test_every_stateful_widget_gets_a_link_or_one_error() {
        let (unit, _) = parse_source(
            "class Linked extends StatefulWidget { createState() => _LinkedState(); }
             class _LinkedState extends State<Linked> {}
             class Missing extends StatefulWidget {}
             class Ambiguous extends StatefulWidget {
               createState() { if (flag) { return AState(); } return BState(); }
             }
             class AState extends State<Ambiguous> {}
             class BState extends State<Ambiguous> {}",
            "state.dart",
        );
        let mut diagnostics = sink();
        let widgets = analyze_widgets(&unit, false, &mut diagnostics);
        let state = link_states(&unit, &widgets, &mut diagnostics);

        for widget in widgets.widgets.iter().filter(|w| w.kind == WidgetKind::Stateful) {
            let links = state.state_links.iter().filter(|l| l.widget == widget.name).count();
            let errors = state
                .errors
                .iter()
                .filter(|e| e.message.contains(&format!("`{}`", widget.name)))
                .count();
            assert_eq!(links + errors, 1, "widget {}", widget.name);
        }
        let codes: Vec<&str> = state.errors.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec![diagnostics::STATE_UNLINKED, diagnostics::STATE_AMBIGUOUS_LINK]);
        assert!(state.errors.iter().all(|e| e.kind == DiagnosticKind::AnalysisError));
    }

    #[test]
    fn test_generic_return_types_link_and_find_entry() {
        let (unit, parse_errors) = parse_source(
            "Future<void> main() async { runApp(MyApp()); }
             class MyApp extends StatelessWidget { Widget build(BuildContext context) => Counter(); }
             class Counter extends StatefulWidget {
               State<Counter> createState() => _CounterState();
             }
             class _CounterState extends State<Counter> {
               Widget build(BuildContext context) => Text('0');
             }",
            "main.dart",
        );
        assert!(parse_errors.is_empty(), "unexpected diagnostics: {:?}", parse_errors);
        let mut diagnostics = sink();
        let widgets = analyze_widgets(&unit, true, &mut diagnostics);
        assert_eq!(widgets.entry_point.as_deref(), Some("main"));
        assert_eq!(widgets.root_widget.as_deref(), Some("MyApp"));

        let state = link_states(&unit, &widgets, &mut diagnostics);
        let link = state.link_for("Counter").expect("link");
        assert_eq!(link.state_class, "_CounterState");
        assert!(state.errors.is_empty());
    }

    #[test]
    fn test_conditional_create_state_is_ambiguous() {
        let (unit, _) = parse_source(
            "class Toggle extends StatefulWidget { createState() => flag ? AState() : BState(); }
             class AState extends State<Toggle> {}
             class BState extends State<Toggle> {}",
            "toggle.dart",
        );
        let mut diagnostics = sink();
        let widgets = analyze_widgets(&unit, false, &mut diagnostics);
        let state = link_states(&unit, &widgets, &mut diagnostics);

        assert!(state.state_links.is_empty());
        let codes: Vec<&str> = state.errors.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec![diagnostics::STATE_AMBIGUOUS_LINK]);
        assert!(state.errors[0].message.contains("AState, BState"));
    }

    #[test]
    fn test_set_state_outside_state_class_warns() {
        let (unit, _) = parse_source(
            "class Helper { void poke() { setState(() {}); } }",
            "helper.dart",
        );
        let mut diagnostics = sink();
        let widgets = analyze_widgets(&unit, false, &mut diagnostics);
        link_states(&unit, &widgets, &mut diagnostics);
        assert!(diagnostics
            .iter()
            .any(|d| d.code == diagnostics::STATE_SET_STATE_OUTSIDE));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // CONTEXT
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_consumer_resolves_through_enclosing_provider() {
        let (unit, _) = parse_source(
            "class AppState extends InheritedWidget {}
             class App extends StatelessWidget {
               build(context) => AppState(child: Home());
             }
             class Home extends StatelessWidget {
               build(context) {
                 final state = AppState.of(context);
                 final theme = Theme.of(context);
                 return Text('x');
               }
             }
             class Orphan extends StatelessWidget {
               build(context) => Text(Settings.maybeOf(context));
             }",
            "app.dart",
        );
        let mut diagnostics = sink();
        let widgets = analyze_widgets(&unit, false, &mut diagnostics);
        let context = analyze_context(&unit, &widgets, &mut diagnostics);

        assert_eq!(context.providers.len(), 1);
        assert_eq!(context.providers[0].name, "AppState");

        let status = |name: &str| {
            context
                .consumers
                .iter()
                .find(|c| c.context == name)
                .map(|c| c.status)
        };
        assert_eq!(status("AppState"), Some(ConsumerStatus::Resolved));
        assert_eq!(status("Theme"), Some(ConsumerStatus::Framework));
        assert_eq!(status("Settings"), Some(ConsumerStatus::Unresolved));

        assert_eq!(context.unresolved_accesses.len(), 1);
        let warning = diagnostics
            .iter()
            .find(|d| d.code == diagnostics::CONTEXT_UNRESOLVED_CONSUMER)
            .expect("warning");
        assert_eq!(warning.kind, DiagnosticKind::AnalysisWarning);
    }

    #[test]
    fn test_core_type_factories_are_not_consumers() {
        let (unit, _) = parse_source(
            "class Tags extends StatelessWidget {
               build(context) {
                 final items = List.of(tags);
                 final unique = Set.of(items);
                 final copy = Map.of(index);
                 return Text(items.join(','));
               }
             }",
            "tags.dart",
        );
        let mut diagnostics = sink();
        let widgets = analyze_widgets(&unit, false, &mut diagnostics);
        let context = analyze_context(&unit, &widgets, &mut diagnostics);

        assert!(context.consumers.is_empty());
        assert!(context.unresolved_accesses.is_empty());
        assert!(!diagnostics
            .iter()
            .any(|d| d.code == diagnostics::CONTEXT_UNRESOLVED_CONSUMER));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SSR
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_browser_global_in_build_is_low_compatibility() {
        let (unit, _) = parse_source(
            "class Page extends StatelessWidget {
               build(context) {
                 final url = window.location;
                 return Text(url);
               }
             }",
            "page.dart",
        );
        let ssr = analyze_ssr(&unit, &mut sink());
        assert_eq!(ssr.compatibility, Compatibility::Low);
        assert_eq!(ssr.unsafe_patterns.len(), 1);
        let pattern = &ssr.unsafe_patterns[0];
        assert_eq!(pattern.global, "window");
        assert_eq!(pattern.location.line, 3);
    }

    #[test]
    fn test_only_build_methods_are_scanned() {
        let (unit, _) = parse_source(
            "class Page extends StatelessWidget {
               void open() { window.open('x'); }
               build(context) { return Text('ok'); }
             }",
            "page.dart",
        );
        let ssr = analyze_ssr(&unit, &mut sink());
        assert_eq!(ssr.compatibility, Compatibility::High);
        assert!(ssr.unsafe_patterns.is_empty());
    }

    #[test]
    fn test_guarded_and_shadowed_references() {
        let (unit, _) = parse_source(
            "class Page extends StatelessWidget {
               build(context) {
                 if (kIsWeb) { document.title = 'x'; }
                 final history = [];
                 history.add(1);
                 return Text('ok');
               }
             }",
            "page.dart",
        );
        let ssr = analyze_ssr(&unit, &mut sink());
        assert_eq!(ssr.compatibility, Compatibility::Medium);
        assert_eq!(ssr.unsafe_patterns.len(), 1);
        assert!(ssr.unsafe_patterns[0].guarded);
    }

    #[test]
    fn test_build_helper_methods_count_as_build() {
        let (unit, _) = parse_source(
            "class Page extends StatelessWidget {
               Widget buildHeader() => Text(localStorage.getItem('k'));
               Widget builder() => Text(localStorage.getItem('k'));
             }",
            "page.dart",
        );
        let ssr = analyze_ssr(&unit, &mut sink());
        let methods: Vec<&str> = ssr.unsafe_patterns.iter().map(|p| p.method.as_str()).collect();
        assert_eq!(methods, vec!["buildHeader"]);
    }

    #[test]
    fn test_class_members_shadow_browser_globals() {
        let (unit, _) = parse_source(
            "class Place extends StatelessWidget {
               final String location;
               Place(this.location);
               String history() => 'none';
               build(context) { return Text(location + history()); }
             }",
            "place.dart",
        );
        let mut diagnostics = sink();
        let ssr = analyze_ssr(&unit, &mut diagnostics);
        assert_eq!(ssr.compatibility, Compatibility::High);
        assert!(ssr.unsafe_patterns.is_empty());
        assert!(diagnostics.is_empty());
    }
}
