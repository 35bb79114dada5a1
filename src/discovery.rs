//! Source discovery
//!
//! Recursively scans a project for widget source units. Hidden directories
//! and build output are skipped.

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use crate::resolver::SOURCE_EXTENSION;

const SKIPPED_DIRECTORIES: &[&str] = &["build", "node_modules", "target"];

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("cannot walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn is_skipped(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRECTORIES.contains(&name.as_ref())
}

fn is_source_file(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == SOURCE_EXTENSION)
}

/// All source units under `root`, sorted by path.
pub fn discover_sources(root: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut sources = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_entry(|e| !is_skipped(e)) {
        let entry = entry.map_err(|source| DiscoveryError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() && is_source_file(entry.path()) {
            sources.push(entry.into_path());
        }
    }
    sources.sort();
    log::debug!("[Discovery] {} source unit(s) under {}", sources.len(), root.display());
    Ok(sources)
}

pub fn read_source(path: &Path) -> Result<String, DiscoveryError> {
    std::fs::read_to_string(path).map_err(|source| DiscoveryError::Read {
        path: path.to_path_buf(),
        source,
    })
}
