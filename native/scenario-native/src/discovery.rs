//! Discovery Module for the Scenario Compiler
//!
//! Recursively scans a directory for scenario sources and compiles them as a
//! batch. Files are independent, so they are compiled in parallel.

use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::cache::IncrementalCache;
use crate::config::CompilerConfig;
use crate::parse::{compile_with_catalog, CompileOptions, CompileResult};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Scenario directory '{0}' does not exist")]
    MissingDirectory(PathBuf),

    #[error("Failed to read scenario '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledFile {
    pub path: PathBuf,
    pub result: CompileResult,
}

/// Recursively find all `.tsx` / `.jsx` files, in path order.
pub fn find_scenario_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "tsx" || ext == "jsx")
        })
        .collect();
    files.sort();
    files
}

/// Compiles every scenario under `dir`. Each schema key is the file stem.
pub fn compile_directory(
    dir: &Path,
    config: &CompilerConfig,
) -> Result<Vec<CompiledFile>, DiscoveryError> {
    if !dir.exists() {
        return Err(DiscoveryError::MissingDirectory(dir.to_path_buf()));
    }

    let files = find_scenario_files(dir);
    let catalog = config.catalog();
    let cache = config.cache_dir.as_ref().map(IncrementalCache::new);
    info!(dir = %dir.display(), files = files.len(), "compiling scenarios");

    files
        .par_iter()
        .map(|path| {
            let source = fs::read_to_string(path).map_err(|e| DiscoveryError::ReadError {
                path: path.clone(),
                source: e,
            })?;
            let path_str = path.to_string_lossy().to_string();
            let options = CompileOptions {
                file_path: Some(path_str.clone()),
                ..config.compile_options("")
            };

            if let Some(result) = cache.as_ref().and_then(|c| c.get(&path_str, &source, &options)) {
                return Ok(CompiledFile {
                    path: path.clone(),
                    result,
                });
            }

            let result = compile_with_catalog(&source, &options, &catalog);
            if result.has_errors() {
                warn!(
                    file = %path_str,
                    errors = result.diagnostics.len(),
                    "scenario failed to compile"
                );
            }
            if let Some(cache) = &cache {
                cache.set(&path_str, &source, &options, &result);
            }
            Ok(CompiledFile {
                path: path.clone(),
                result,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("scenario-discovery-{}-{}", name, std::process::id()));
        fs::remove_dir_all(&dir).ok();
        fs::create_dir_all(dir.join("nested")).unwrap();
        dir
    }

    #[test]
    fn test_finds_sources_sorted() {
        let dir = scratch_dir("find");
        fs::write(dir.join("b.tsx"), "").unwrap();
        fs::write(dir.join("nested/a.jsx"), "").unwrap();
        fs::write(dir.join("notes.md"), "").unwrap();

        let files = find_scenario_files(&dir);
        assert_eq!(files, vec![dir.join("b.tsx"), dir.join("nested/a.jsx")]);
    }

    #[test]
    fn test_compiles_directory_with_file_stem_keys() {
        let dir = scratch_dir("compile");
        fs::write(
            dir.join("home.tsx"),
            "export default function Home() { return <View><Text>Hi</Text></View>; }",
        )
        .unwrap();
        fs::write(dir.join("nested/broken.tsx"), "export default function () {").unwrap();

        let compiled = compile_directory(&dir, &CompilerConfig::default()).unwrap();
        assert_eq!(compiled.len(), 2);

        let home = compiled.iter().find(|f| f.path.ends_with("home.tsx")).unwrap();
        assert_eq!(home.result.schema.as_ref().unwrap().key, "home");

        let broken = compiled.iter().find(|f| f.path.ends_with("broken.tsx")).unwrap();
        assert!(broken.result.has_errors());
        assert!(broken.result.schema.is_none());
    }

    #[test]
    fn test_missing_directory() {
        let err = compile_directory(Path::new("/nonexistent/scenarios"), &CompilerConfig::default())
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::MissingDirectory(_)));
    }
}
