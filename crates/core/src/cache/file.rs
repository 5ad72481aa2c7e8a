//! JSON file cache backend.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::trace;

use super::{CacheBackend, CacheItem};
use crate::{Error, Result};

/// Cache stored as a JSON array, rewritten atomically on every change.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    items: RwLock<BTreeMap<String, CacheItem>>,
}

impl FileCache {
    /// Load the cache at `path`; a missing file is an empty cache.
    pub fn open(path: &Path) -> Result<Self> {
        let items = if path.exists() {
            let raw = fs::read_to_string(path).map_err(|e| Error::io(e, path, "read"))?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                let list: Vec<CacheItem> = serde_json::from_str(&raw).map_err(|e| {
                    Error::cache(format!("corrupt cache file {}: {e}", path.display()))
                })?;
                list.into_iter().map(|i| (i.id.clone(), i)).collect()
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            items: RwLock::new(items),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, items: &BTreeMap<String, CacheItem>) -> Result<()> {
        let list: Vec<&CacheItem> = items.values().collect();
        let data = serde_json::to_vec_pretty(&list)
            .map_err(|e| Error::cache(format!("failed to serialize cache: {e}")))?;

        let tmp_path = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp_path).map_err(|e| Error::io(e, &tmp_path, "create"))?;
        file.write_all(&data)
            .map_err(|e| Error::io(e, &tmp_path, "write"))?;
        file.sync_all()
            .map_err(|e| Error::io(e, &tmp_path, "sync"))?;

        fs::rename(&tmp_path, &self.path).map_err(|e| Error::io(e, &self.path, "rename"))?;
        trace!(path = %self.path.display(), entries = list.len(), "Wrote cache file");
        Ok(())
    }
}

impl CacheBackend for FileCache {
    fn get(&self, id: &str) -> Result<Option<CacheItem>> {
        Ok(self.items.read().get(id).cloned())
    }

    fn get_all(&self) -> Result<Vec<CacheItem>> {
        Ok(self.items.read().values().cloned().collect())
    }

    fn save(&self, item: CacheItem) -> Result<()> {
        let mut items = self.items.write();
        items.insert(item.id.clone(), item);
        self.persist(&items)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let mut items = self.items.write();
        if items.remove(id).is_none() {
            return Ok(false);
        }
        self.persist(&items)?;
        Ok(true)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
