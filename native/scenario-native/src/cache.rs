use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::parse::{CompileOptions, CompileResult};

pub fn compute_hash(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    pub result: CompileResult,
}

/// On-disk cache of compile results, one JSON file per source path.
/// An entry is valid while the source and the options hash the same.
pub struct IncrementalCache {
    cache_dir: PathBuf,
}

impl IncrementalCache {
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).ok();
        }
        Self { cache_dir }
    }

    pub fn entry_hash(source: &str, options: &CompileOptions) -> String {
        let options = serde_json::to_string(options).unwrap_or_default();
        compute_hash(&format!("{}\u{0}{}", options, source))
    }

    /// `<stem>-<path hash>.json`, so equal stems in different folders never collide.
    fn entry_path(&self, file_path: &str) -> PathBuf {
        let stem = Path::new(file_path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("scenario");
        let digest = compute_hash(file_path);
        self.cache_dir.join(format!("{}-{}.json", stem, &digest[..16]))
    }

    pub fn get(
        &self,
        file_path: &str,
        source: &str,
        options: &CompileOptions,
    ) -> Option<CompileResult> {
        let cache_path = self.entry_path(file_path);
        let data = fs::read_to_string(&cache_path).ok()?;

        let entry: CacheEntry = match serde_json::from_str(&data) {
            Ok(e) => e,
            Err(e) => {
                warn!(file = %file_path, error = %e, "discarding corrupt cache entry");
                fs::remove_file(cache_path).ok();
                return None;
            }
        };

        if entry.hash == Self::entry_hash(source, options) {
            debug!(file = %file_path, "cache hit");
            Some(entry.result)
        } else {
            None
        }
    }

    pub fn set(
        &self,
        file_path: &str,
        source: &str,
        options: &CompileOptions,
        result: &CompileResult,
    ) {
        let cache_path = self.entry_path(file_path);
        let entry = CacheEntry {
            hash: Self::entry_hash(source, options),
            result: result.clone(),
        };

        if let Ok(data) = serde_json::to_string(&entry) {
            if let Err(e) = fs::write(&cache_path, data) {
                warn!(path = %cache_path.display(), error = %e, "failed to write cache entry");
            }
        }
    }
}
