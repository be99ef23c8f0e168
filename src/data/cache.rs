use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::loader::{self, CleaningRules};
use super::model::Dataset;
use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Load-once cache of cleaned datasets
// ---------------------------------------------------------------------------

/// Memoization table: canonical source path → cleaned dataset.
///
/// A cached dataset is never mutated; sessions hold `Arc` clones of it.
/// Entries only change through [`invalidate`](Self::invalidate) or
/// [`reload`](Self::reload).
#[derive(Debug, Default)]
pub struct DatasetCache {
    rules: CleaningRules,
    entries: HashMap<PathBuf, Arc<Dataset>>,
}

impl DatasetCache {
    pub fn new(rules: CleaningRules) -> Self {
        Self {
            rules,
            entries: HashMap::new(),
        }
    }

    /// Return the cached dataset for `path`, loading it on first use.
    pub fn get_or_load(&mut self, path: &Path) -> Result<Arc<Dataset>, LoadError> {
        let key = cache_key(path)?;
        if let Some(ds) = self.entries.get(&key) {
            log::debug!("Dataset cache hit for {}", key.display());
            return Ok(Arc::clone(ds));
        }

        let ds = Arc::new(loader::load(&key, &self.rules)?);
        self.entries.insert(key, Arc::clone(&ds));
        Ok(ds)
    }

    /// Forget the cached dataset for `path`.  Returns whether one was cached.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        match cache_key(path) {
            Ok(key) => self.entries.remove(&key).is_some(),
            Err(_) => false,
        }
    }

    /// Drop any cached copy of `path` and load it again from disk.
    pub fn reload(&mut self, path: &Path) -> Result<Arc<Dataset>, LoadError> {
        self.invalidate(path);
        self.get_or_load(path)
    }

    /// Number of cached sources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn cache_key(path: &Path) -> Result<PathBuf, LoadError> {
    std::fs::canonicalize(path).map_err(|_| LoadError::NotFound(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn csv_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn second_lookup_reuses_the_loaded_dataset() {
        let file = csv_file("gender\nFemenino\nMasculino\n");
        let mut cache = DatasetCache::default();

        let first = cache.get_or_load(file.path()).unwrap();
        let second = cache.get_or_load(file.path()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn reload_picks_up_changes_on_disk() {
        let file = csv_file("gender\nFemenino\n");
        let mut cache = DatasetCache::default();
        let before = cache.get_or_load(file.path()).unwrap();
        assert_eq!(before.len(), 1);

        std::fs::write(file.path(), "gender\nFemenino\nOtro\n").unwrap();
        // still the memoized copy
        assert_eq!(cache.get_or_load(file.path()).unwrap().len(), 1);

        let after = cache.reload(file.path()).unwrap();
        assert_eq!(after.len(), 2);
        // sessions holding the old Arc keep an unchanged table
        assert_eq!(before.len(), 1);
    }

    #[test]
    fn invalidate_reports_whether_an_entry_existed() {
        let file = csv_file("gender\nFemenino\n");
        let mut cache = DatasetCache::default();
        assert!(!cache.invalidate(file.path()));
        cache.get_or_load(file.path()).unwrap();
        assert!(cache.invalidate(file.path()));
        assert!(cache.is_empty());
    }

    #[test]
    fn failed_loads_are_not_cached() {
        let mut cache = DatasetCache::default();
        let err = cache.get_or_load(Path::new("/no/such/followups.csv")).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
        assert!(cache.is_empty());
    }
}
