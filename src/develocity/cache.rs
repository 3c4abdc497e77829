use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{RemedyLensError, Result};

use super::types::{Build, BuildModelName};

/// A build persisted together with the model set it was fetched with.
///
/// The entry is reusable without a re-fetch only while `build_models` covers
/// the currently requested model set; otherwise the pipeline refreshes the
/// build and overwrites the entry with the union of both sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedBuild {
    pub build_models: BTreeSet<BuildModelName>,
    pub build: Build,
}

impl CachedBuild {
    /// Whether the stored model set covers `requested` without a re-fetch.
    pub fn covers(&self, requested: &BTreeSet<BuildModelName>) -> bool {
        self.build_models.is_superset(requested)
    }
}

/// On-disk build cache, one JSON file per build id.
///
/// Files live under a two-level sharded layout keyed by the first two
/// characters of the id (`<cache-dir>/ab/abc123.json`) so directory lookups
/// stay cheap for large windows. Default location is the platform cache
/// directory, e.g. `~/.cache/remedylens/builds` on Linux.
///
/// Cache I/O failures are fatal for a run: a cache that silently returns
/// stale or partial data would corrupt incident detection downstream.
pub struct BuildCache {
    cache_dir: PathBuf,
}

impl BuildCache {
    /// Opens the cache at `cache_dir`, or at the default platform location.
    ///
    /// # Errors
    ///
    /// Returns an error if no cache directory can be determined or created.
    pub fn new(cache_dir: Option<PathBuf>) -> Result<Self> {
        let cache_dir = match cache_dir {
            Some(dir) => dir,
            None => dirs::cache_dir()
                .ok_or_else(|| RemedyLensError::Cache("No cache directory found".into()))?
                .join("remedylens")
                .join("builds"),
        };

        fs::create_dir_all(&cache_dir)?;
        debug!("Build cache at: {}", cache_dir.display());

        Ok(Self { cache_dir })
    }

    fn build_file(&self, id: &str) -> PathBuf {
        let shard = id.get(..2).unwrap_or(id);
        self.cache_dir.join(shard).join(format!("{id}.json"))
    }

    /// Reads the cached entry for a build id, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error on any I/O failure other than the file being absent,
    /// and on an entry that cannot be decoded.
    pub fn read(&self, id: &str) -> Result<Option<CachedBuild>> {
        let path = self.build_file(id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let cached = serde_json::from_str(&contents).map_err(|e| {
            RemedyLensError::Cache(format!(
                "Corrupt cache entry {}: {e}",
                path.display()
            ))
        })?;

        debug!("Cache hit for build {id}");
        Ok(Some(cached))
    }

    /// Persists an entry for a build id, creating shard directories as needed.
    pub fn write(&self, id: &str, entry: &CachedBuild) -> Result<()> {
        let path = self.build_file(id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_vec(entry)?)?;
        Ok(())
    }

    /// Removes every cached build.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be removed.
    pub fn clear(&self) -> Result<()> {
        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir)?;
            info!("Cache cleared: {}", self.cache_dir.display());
        } else {
            info!("No cache found at: {}", self.cache_dir.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::develocity::types::attribute_models;
    use tempfile::TempDir;

    fn create_build(id: &str) -> Build {
        Build {
            id: id.to_string(),
            available_at: 1_700_000_000_000,
            build_tool_type: "gradle".to_string(),
            build_tool_version: None,
            models: None,
        }
    }

    fn create_cache(dir: &TempDir) -> BuildCache {
        BuildCache::new(Some(dir.path().join("builds"))).unwrap()
    }

    #[test]
    fn test_read_missing_entry_returns_none() {
        let temp_dir = TempDir::new().unwrap();
        let cache = create_cache(&temp_dir);

        assert!(cache.read("nonexistent").unwrap().is_none());
    }

    #[test]
    fn test_write_and_read_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let cache = create_cache(&temp_dir);

        let entry = CachedBuild {
            build_models: attribute_models(),
            build: create_build("abc123def456"),
        };
        cache.write("abc123def456", &entry).unwrap();

        let reloaded = cache.read("abc123def456").unwrap().unwrap();
        assert_eq!(reloaded.build.id, "abc123def456");
        assert_eq!(reloaded.build_models, attribute_models());
    }

    #[test]
    fn test_entries_are_sharded_by_id_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let cache = create_cache(&temp_dir);

        let entry = CachedBuild {
            build_models: BTreeSet::new(),
            build: create_build("xyz789"),
        };
        cache.write("xyz789", &entry).unwrap();

        assert!(temp_dir
            .path()
            .join("builds")
            .join("xy")
            .join("xyz789.json")
            .exists());
    }

    #[test]
    fn test_corrupt_entry_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let cache = create_cache(&temp_dir);

        let shard = temp_dir.path().join("builds").join("ba");
        fs::create_dir_all(&shard).unwrap();
        fs::write(shard.join("bad123.json"), "not json").unwrap();

        let result = cache.read("bad123");
        assert!(matches!(result, Err(RemedyLensError::Cache(_))));
    }

    #[test]
    fn test_covers_superset_semantics() {
        let entry = CachedBuild {
            build_models: BTreeSet::from([
                BuildModelName::GradleAttributes,
                BuildModelName::MavenAttributes,
                BuildModelName::GradleProjects,
            ]),
            build: create_build("abc"),
        };

        assert!(entry.covers(&attribute_models()));
        assert!(!entry.covers(&BTreeSet::from([BuildModelName::MavenModules])));
    }

    #[test]
    fn test_clear_removes_all_entries() {
        let temp_dir = TempDir::new().unwrap();
        let cache = create_cache(&temp_dir);

        let entry = CachedBuild {
            build_models: BTreeSet::new(),
            build: create_build("abc123"),
        };
        cache.write("abc123", &entry).unwrap();
        cache.clear().unwrap();

        assert!(!temp_dir.path().join("builds").exists());
    }
}
