//! Import Resolver
//!
//! Resolution order is fixed:
//! 1. exact match in the framework-package alias table
//! 2. local probing (relative specifiers against the project root, bare
//!    specifiers across the search roots)
//! 3. the optional package cache
//!
//! Every attempt is recorded as a `FallbackStep`. Results, including the
//! fallback chain, are memoized per `(specifier, items)`.

use lazy_static::lazy_static;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::{CacheKey, CacheStats, ResolutionCache};
use crate::diagnostics::{self, Diagnostic, DiagnosticKind, Diagnostics};
use crate::lowering::{default_module, ModuleTarget};
use crate::widgets::ImportRecord;

pub const SOURCE_EXTENSION: &str = "dart";
/// Probed in order for every bare-specifier candidate.
pub const PROBE_EXTENSIONS: [&str; 2] = ["dart", "js"];

lazy_static! {
    static ref PACKAGE_SPECIFIER: Regex = Regex::new(r"^package:([A-Za-z0-9_]+)/(.+)$").unwrap();
    static ref SCHEME: Regex = Regex::new(r"^[a-z][a-z0-9+.-]*:").unwrap();
    static ref DEFAULT_ALIASES: Vec<(&'static str, &'static str)> = vec![
        ("package:flutter/material.dart", "@flutterjs/material"),
        ("package:flutter/widgets.dart", "@flutterjs/widgets"),
        ("package:flutter/cupertino.dart", "@flutterjs/cupertino"),
        ("package:flutter/foundation.dart", "@flutterjs/foundation"),
        ("package:flutter/services.dart", "@flutterjs/services"),
        ("package:flutter/painting.dart", "@flutterjs/painting"),
        ("dart:core", "@flutterjs/dart/core"),
        ("dart:async", "@flutterjs/dart/async"),
        ("dart:math", "@flutterjs/dart/math"),
        ("dart:convert", "@flutterjs/dart/convert"),
        ("dart:collection", "@flutterjs/dart/collection"),
    ];
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESULT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionType {
    Framework,
    Local,
    Cache,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackStep {
    pub step: u32,
    pub strategy_tried: String,
    pub found: bool,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub is_valid: bool,
    /// Module specifier the generated code should import.
    pub resolved: Option<String>,
    /// File the specifier was found at, for local and cache hits.
    pub actual_path: Option<String>,
    #[serde(rename = "type")]
    pub resolution_type: ResolutionType,
    pub reason: String,
    pub fallbacks: Vec<FallbackStep>,
}

/// Outcome for one import of a unit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedImport {
    pub uri: String,
    pub items: Vec<String>,
    pub resolution: Resolution,
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLABORATORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Filesystem access used while probing.
pub trait FileProbe: Send + Sync {
    fn is_file(&self, path: &Path) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl FileProbe for FsProbe {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Shared framework-package alias table. Clones share the same table.
#[derive(Debug, Clone)]
pub struct FrameworkPackages {
    table: Arc<RwLock<BTreeMap<String, String>>>,
}

impl Default for FrameworkPackages {
    fn default() -> Self {
        let table = DEFAULT_ALIASES
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        FrameworkPackages {
            table: Arc::new(RwLock::new(table)),
        }
    }
}

impl FrameworkPackages {
    pub fn lookup(&self, specifier: &str) -> Option<String> {
        self.table.read().get(specifier).cloned()
    }

    /// Adds or replaces an alias. Results already cached by a resolver are
    /// not revisited.
    pub fn register(&self, specifier: impl Into<String>, module: impl Into<String>) {
        self.table.write().insert(specifier.into(), module.into());
    }

    pub fn contains(&self, specifier: &str) -> bool {
        self.table.read().contains_key(specifier)
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

fn default_search_roots() -> Vec<String> {
    vec!["lib".to_string(), "src".to_string(), "packages".to_string()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverConfig {
    #[serde(default)]
    pub project_root: PathBuf,
    /// Tried in order for bare specifiers. Defaults to `lib`, `src`, `packages`.
    #[serde(default = "default_search_roots")]
    pub search_roots: Vec<String>,
    #[serde(default)]
    pub package_cache: Option<PathBuf>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            project_root: PathBuf::from("."),
            search_roots: default_search_roots(),
            package_cache: None,
        }
    }
}

impl ResolverConfig {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        ResolverConfig {
            project_root: project_root.into(),
            ..Default::default()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESOLVER
// ═══════════════════════════════════════════════════════════════════════════════

/// Relative specifiers name a file next to the project root: `./x`, `../x`,
/// `/x`, or a scheme-less path ending in the source extension.
pub fn is_relative_specifier(specifier: &str) -> bool {
    if SCHEME.is_match(specifier) {
        return false;
    }
    specifier.starts_with('.')
        || specifier.starts_with('/')
        || specifier.ends_with(&format!(".{}", SOURCE_EXTENSION))
}

struct Attempts {
    steps: Vec<FallbackStep>,
}

impl Attempts {
    fn record(&mut self, strategy: impl Into<String>, found: bool, reason: impl Into<String>) {
        let step = self.steps.len() as u32 + 1;
        self.steps.push(FallbackStep {
            step,
            strategy_tried: strategy.into(),
            found,
            reason: reason.into(),
        });
    }
}

pub struct ImportResolver {
    config: ResolverConfig,
    framework: FrameworkPackages,
    cache: ResolutionCache,
    probe: Arc<dyn FileProbe>,
}

impl ImportResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_probe(config, Arc::new(FsProbe))
    }

    pub fn with_probe(config: ResolverConfig, probe: Arc<dyn FileProbe>) -> Self {
        ImportResolver {
            config,
            framework: FrameworkPackages::default(),
            cache: ResolutionCache::new(),
            probe,
        }
    }

    /// Shares an existing alias table instead of the default one.
    pub fn with_framework_packages(mut self, framework: FrameworkPackages) -> Self {
        self.framework = framework;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn framework_packages(&self) -> &FrameworkPackages {
        &self.framework
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn resolve(&self, specifier: &str, items: &[String]) -> Resolution {
        let key = CacheKey::new(specifier, items);
        if let Some(hit) = self.cache.get(&key) {
            log::debug!("[Resolver] cache hit for '{}'", specifier);
            return hit;
        }
        let resolution = self.resolve_uncached(specifier);
        log::debug!(
            "[Resolver] '{}' -> {:?} after {} step(s)",
            specifier,
            resolution.resolution_type,
            resolution.fallbacks.len()
        );
        self.cache.insert(key, resolution)
    }

    fn resolve_uncached(&self, specifier: &str) -> Resolution {
        let mut attempts = Attempts { steps: Vec::new() };

        match self.framework.lookup(specifier) {
            Some(module) => {
                attempts.record("framework", true, format!("alias for {}", module));
                return Resolution {
                    is_valid: true,
                    resolved: Some(module),
                    actual_path: None,
                    resolution_type: ResolutionType::Framework,
                    reason: "framework package".to_string(),
                    fallbacks: attempts.steps,
                };
            }
            None => attempts.record("framework", false, "no framework alias"),
        }

        let local = if is_relative_specifier(specifier) {
            self.probe_relative(specifier, &mut attempts)
        } else {
            self.probe_search_roots(specifier, &mut attempts)
        };
        if let Some(path) = local {
            return Resolution {
                is_valid: true,
                resolved: Some(default_module(specifier)),
                actual_path: Some(path.to_string_lossy().into_owned()),
                resolution_type: ResolutionType::Local,
                reason: "local file".to_string(),
                fallbacks: attempts.steps,
            };
        }

        if let Some(path) = self.probe_package_cache(specifier, &mut attempts) {
            return Resolution {
                is_valid: true,
                resolved: Some(default_module(specifier)),
                actual_path: Some(path.to_string_lossy().into_owned()),
                resolution_type: ResolutionType::Cache,
                reason: "package cache".to_string(),
                fallbacks: attempts.steps,
            };
        }

        Resolution {
            is_valid: false,
            resolved: None,
            actual_path: None,
            resolution_type: ResolutionType::Error,
            reason: format!("'{}' not found after {} attempt(s)", specifier, attempts.steps.len()),
            fallbacks: attempts.steps,
        }
    }

    fn try_path(&self, path: PathBuf, strategy: &str, attempts: &mut Attempts) -> Option<PathBuf> {
        let found = self.probe.is_file(&path);
        let reason = if found { "file exists" } else { "no such file" };
        attempts.record(format!("{} {}", strategy, path.display()), found, reason);
        if found {
            Some(path)
        } else {
            None
        }
    }

    fn probe_relative(&self, specifier: &str, attempts: &mut Attempts) -> Option<PathBuf> {
        let root = &self.config.project_root;
        let extension = format!(".{}", SOURCE_EXTENSION);
        let (with_ext, without_ext) = match specifier.strip_suffix(&extension) {
            Some(stem) => (specifier.to_string(), stem.to_string()),
            None => (format!("{}{}", specifier, extension), specifier.to_string()),
        };
        self.try_path(root.join(&with_ext), "local", attempts)
            .or_else(|| self.try_path(root.join(&without_ext), "local", attempts))
    }

    /// `package:<pkg>/<path>` loses its prefix, then a trailing `.dart`.
    fn bare_path(specifier: &str) -> String {
        let path = match PACKAGE_SPECIFIER.captures(specifier) {
            Some(captures) => captures[2].to_string(),
            None => specifier.to_string(),
        };
        match path.strip_suffix(&format!(".{}", SOURCE_EXTENSION)) {
            Some(stem) => stem.to_string(),
            None => path,
        }
    }

    fn probe_search_roots(&self, specifier: &str, attempts: &mut Attempts) -> Option<PathBuf> {
        let path = Self::bare_path(specifier);
        for root in &self.config.search_roots {
            let base = self.config.project_root.join(root);
            for extension in PROBE_EXTENSIONS {
                let index = base.join(&path).join(format!("index.{}", extension));
                if let Some(found) = self.try_path(index, "search-root", attempts) {
                    return Some(found);
                }
                let file = base.join(format!("{}.{}", path, extension));
                if let Some(found) = self.try_path(file, "search-root", attempts) {
                    return Some(found);
                }
            }
        }
        None
    }

    fn probe_package_cache(&self, specifier: &str, attempts: &mut Attempts) -> Option<PathBuf> {
        let Some(cache) = &self.config.package_cache else {
            attempts.record("package-cache", false, "no package cache configured");
            return None;
        };
        let Some(captures) = PACKAGE_SPECIFIER.captures(specifier) else {
            attempts.record("package-cache", false, "not a package specifier");
            return None;
        };
        let path = cache.join(&captures[1]).join("lib").join(&captures[2]);
        self.try_path(path, "package-cache", attempts)
    }

    /// Resolves every import of a unit, reporting failures as warnings.
    pub fn resolve_imports(&self, imports: &[ImportRecord], sink: &mut Diagnostics) -> Vec<ResolvedImport> {
        imports
            .iter()
            .map(|import| {
                let resolution = self.resolve(&import.uri, &import.show);
                if !resolution.is_valid {
                    sink.push(Diagnostic::new(
                        DiagnosticKind::AnalysisWarning,
                        diagnostics::IMPORT_UNRESOLVED,
                        format!("Cannot resolve import '{}': {}", import.uri, resolution.reason),
                        import.location.clone(),
                    ));
                }
                ResolvedImport {
                    uri: import.uri.clone(),
                    items: import.show.clone(),
                    resolution,
                }
            })
            .collect()
    }
}

/// Module targets for the IR builder. Unresolved imports keep their
/// default module so generated code still names them.
pub fn module_targets(imports: &[ResolvedImport]) -> HashMap<String, ModuleTarget> {
    imports
        .iter()
        .map(|import| {
            let resolution = &import.resolution;
            let target = ModuleTarget {
                module: resolution
                    .resolved
                    .clone()
                    .unwrap_or_else(|| default_module(&import.uri)),
                is_framework: resolution.resolution_type == ResolutionType::Framework,
            };
            (import.uri.clone(), target)
        })
        .collect()
}
