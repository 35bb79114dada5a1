#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::cache::CacheStats;
    use crate::discovery::discover_sources;
    use crate::resolver::*;

    /// In-memory file set that counts every probe.
    struct FakeFs {
        files: HashSet<PathBuf>,
        probes: AtomicUsize,
    }

    impl FakeFs {
        fn with_files(files: &[&str]) -> Arc<Self> {
            Arc::new(FakeFs {
                files: files.iter().map(PathBuf::from).collect(),
                probes: AtomicUsize::new(0),
            })
        }

        fn probes(&self) -> usize {
            self.probes.load(Ordering::SeqCst)
        }
    }

    impl FileProbe for FakeFs {
        fn is_file(&self, path: &Path) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.files.contains(path)
        }
    }

    fn config() -> ResolverConfig {
        ResolverConfig {
            project_root: PathBuf::from("/p"),
            search_roots: vec!["lib".to_string(), "src".to_string()],
            package_cache: None,
        }
    }

    fn items(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_framework_alias_wins_without_probing() {
        let fs = FakeFs::with_files(&[]);
        let resolver = ImportResolver::with_probe(config(), fs.clone());
        let resolution = resolver.resolve("package:flutter/material.dart", &[]);

        assert!(resolution.is_valid);
        assert_eq!(resolution.resolution_type, ResolutionType::Framework);
        assert_eq!(resolution.resolved.as_deref(), Some("@flutterjs/material"));
        assert_eq!(resolution.fallbacks.len(), 1);
        assert!(resolution.fallbacks[0].found);
        assert_eq!(fs.probes(), 0);
    }

    #[test]
    fn test_cached_result_is_identical_and_skips_probing() {
        let fs = FakeFs::with_files(&["/p/src/widgets/button.js"]);
        let resolver = ImportResolver::with_probe(config(), fs.clone());

        let first = resolver.resolve("widgets/button", &items(&["Button"]));
        let probes_after_first = fs.probes();
        assert!(probes_after_first > 0);

        let second = resolver.resolve("widgets/button", &items(&["Button"]));
        assert_eq!(first, second);
        assert_eq!(fs.probes(), probes_after_first);

        // Item order is part of the key.
        resolver.resolve("widgets/button", &items(&["Button", "Icon"]));
        assert!(fs.probes() > probes_after_first);
        assert_eq!(
            resolver.cache_stats(),
            CacheStats {
                resolved: 2,
                unresolved: 0
            }
        );
    }

    #[test]
    fn test_bare_specifier_fallback_order() {
        let fs = FakeFs::with_files(&[]);
        let resolver = ImportResolver::with_probe(config(), fs.clone());
        let resolution = resolver.resolve("widgets/button", &[]);

        let strategies: Vec<&str> = resolution
            .fallbacks
            .iter()
            .map(|s| s.strategy_tried.as_str())
            .collect();
        assert_eq!(
            strategies,
            vec![
                "framework",
                "search-root /p/lib/widgets/button/index.dart",
                "search-root /p/lib/widgets/button.dart",
                "search-root /p/lib/widgets/button/index.js",
                "search-root /p/lib/widgets/button.js",
                "search-root /p/src/widgets/button/index.dart",
                "search-root /p/src/widgets/button.dart",
                "search-root /p/src/widgets/button/index.js",
                "search-root /p/src/widgets/button.js",
                "package-cache",
            ]
        );
        let steps: Vec<u32> = resolution.fallbacks.iter().map(|s| s.step).collect();
        assert_eq!(steps, (1..=10).collect::<Vec<u32>>());
        assert_eq!(fs.probes(), 8);
    }

    #[test]
    fn test_local_hit_reports_actual_path() {
        let fs = FakeFs::with_files(&["/p/lib/widgets/button/index.dart"]);
        let resolver = ImportResolver::with_probe(config(), fs);
        let resolution = resolver.resolve("widgets/button", &[]);

        assert_eq!(resolution.resolution_type, ResolutionType::Local);
        assert_eq!(
            resolution.actual_path.as_deref(),
            Some("/p/lib/widgets/button/index.dart")
        );
        assert_eq!(resolution.fallbacks.len(), 2);
        assert!(resolution.fallbacks[1].found);
    }

    #[test]
    fn test_relative_specifier_tries_with_then_without_extension() {
        let fs = FakeFs::with_files(&["/p/utils/format"]);
        let resolver = ImportResolver::with_probe(config(), fs);
        let resolution = resolver.resolve("utils/format.dart", &[]);

        assert_eq!(resolution.resolution_type, ResolutionType::Local);
        assert_eq!(resolution.resolved.as_deref(), Some("utils/format.js"));
        let strategies: Vec<&str> = resolution
            .fallbacks
            .iter()
            .map(|s| s.strategy_tried.as_str())
            .collect();
        assert_eq!(
            strategies,
            vec!["framework", "local /p/utils/format.dart", "local /p/utils/format"]
        );
    }

    #[test]
    fn test_package_cache_is_last_resort() {
        let fs = FakeFs::with_files(&["/cache/http/lib/http.dart"]);
        let config = ResolverConfig {
            package_cache: Some(PathBuf::from("/cache")),
            ..config()
        };
        let resolver = ImportResolver::with_probe(config, fs);
        let resolution = resolver.resolve("package:http/http.dart", &[]);

        assert_eq!(resolution.resolution_type, ResolutionType::Cache);
        assert_eq!(resolution.actual_path.as_deref(), Some("/cache/http/lib/http.dart"));
        let last = resolution.fallbacks.last().expect("steps");
        assert_eq!(last.strategy_tried, "package-cache /cache/http/lib/http.dart");
        assert!(last.found);
    }

    #[test]
    fn test_unresolved_is_cached_separately() {
        let resolver = ImportResolver::with_probe(config(), FakeFs::with_files(&[]));
        let resolution = resolver.resolve("package:missing/missing.dart", &[]);

        assert!(!resolution.is_valid);
        assert_eq!(resolution.resolution_type, ResolutionType::Error);
        assert!(resolution.resolved.is_none());
        assert!(resolution.reason.contains("not found"));
        assert_eq!(
            resolution.fallbacks.last().map(|s| s.reason.as_str()),
            Some("no package cache configured")
        );
        assert_eq!(
            resolver.cache_stats(),
            CacheStats {
                resolved: 0,
                unresolved: 1
            }
        );

        resolver.clear_cache();
        assert_eq!(resolver.cache_stats(), CacheStats::default());
    }

    #[test]
    fn test_registered_alias_is_shared_between_clones() {
        let packages = FrameworkPackages::default();
        let resolver = ImportResolver::with_probe(config(), FakeFs::with_files(&[]))
            .with_framework_packages(packages.clone());
        packages.register("package:ui_kit/ui_kit.dart", "@acme/ui-kit");

        assert!(resolver.framework_packages().contains("package:ui_kit/ui_kit.dart"));
        let resolution = resolver.resolve("package:ui_kit/ui_kit.dart", &[]);
        assert_eq!(resolution.resolution_type, ResolutionType::Framework);
        assert_eq!(resolution.resolved.as_deref(), Some("@acme/ui-kit"));
    }

    #[test]
    fn test_relative_specifier_classification() {
        assert!(is_relative_specifier("./a"));
        assert!(is_relative_specifier("../a"));
        assert!(is_relative_specifier("/a"));
        assert!(is_relative_specifier("models/user.dart"));
        assert!(!is_relative_specifier("package:x/a.dart"));
        assert!(!is_relative_specifier("dart:core"));
        assert!(!is_relative_specifier("widgets/button"));
    }

    #[test]
    fn test_module_targets_keep_default_for_unresolved() {
        let resolver = ImportResolver::with_probe(config(), FakeFs::with_files(&[]));
        let imports = vec![
            ResolvedImport {
                uri: "dart:math".to_string(),
                items: Vec::new(),
                resolution: resolver.resolve("dart:math", &[]),
            },
            ResolvedImport {
                uri: "gone.dart".to_string(),
                items: Vec::new(),
                resolution: resolver.resolve("gone.dart", &[]),
            },
        ];
        let targets = module_targets(&imports);
        assert_eq!(targets["dart:math"].module, "@flutterjs/dart/math");
        assert!(targets["dart:math"].is_framework);
        assert_eq!(targets["gone.dart"].module, "gone.js");
        assert!(!targets["gone.dart"].is_framework);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // FILESYSTEM
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_real_filesystem_probe() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("lib")).expect("mkdir");
        fs::write(dir.path().join("helpers.dart"), "void help() {}").expect("write");
        fs::write(dir.path().join("lib/theme.dart"), "class Theme {}").expect("write");

        let resolver = ImportResolver::new(ResolverConfig::new(dir.path()));
        let relative = resolver.resolve("./helpers", &[]);
        assert_eq!(relative.resolution_type, ResolutionType::Local);
        assert_eq!(relative.fallbacks.len(), 2);

        let bare = resolver.resolve("package:app/theme.dart", &[]);
        assert_eq!(bare.resolution_type, ResolutionType::Local);
        assert!(bare
            .actual_path
            .as_deref()
            .map_or(false, |p| p.ends_with("theme.dart")));
    }

    #[test]
    fn test_discovery_skips_hidden_and_build_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        for sub in ["lib/widgets", "build", ".dart_tool", "node_modules/pkg"] {
            fs::create_dir_all(root.join(sub)).expect("mkdir");
        }
        for file in [
            "lib/main.dart",
            "lib/widgets/button.dart",
            "build/generated.dart",
            ".dart_tool/cache.dart",
            "node_modules/pkg/index.dart",
            "lib/README.md",
        ] {
            fs::write(root.join(file), "").expect("write");
        }

        let found: Vec<PathBuf> = discover_sources(root)
            .expect("discover")
            .into_iter()
            .map(|p| p.strip_prefix(root).unwrap_or(p.as_path()).to_path_buf())
            .collect();
        assert_eq!(
            found,
            vec![PathBuf::from("lib/main.dart"), PathBuf::from("lib/widgets/button.dart")]
        );
    }
}
