//! JSON-file backed credential store
//!
//! The whole store is a single JSON object on disk. Every change rewrites
//! the file through a sibling temp file and a rename, so a crash mid-write
//! leaves the previous contents intact.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;
use tripdesk_core::ports::CredentialStore;
use tripdesk_domain::Result;

use crate::errors::storage_error;

#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileCredentialStore {
    /// Open the store at `path`, loading existing contents if the file exists.
    ///
    /// # Errors
    /// Returns [`TripdeskError::Storage`](tripdesk_domain::TripdeskError::Storage)
    /// if the file exists but cannot be read or is not a JSON object of strings.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let items = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| storage_error(&format!("read {}", path.display()), e))?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)
                    .map_err(|e| storage_error(&format!("parse {}", path.display()), e))?
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), entries = items.len(), "opened credential store");
        Ok(Self { path, items: Mutex::new(items) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let mut items = self.items.lock();
        let mut next = items.clone();
        change(&mut next);
        self.persist(&next)?;
        *items = next;
        Ok(())
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| storage_error(&format!("create {}", parent.display()), e))?;
        }

        let raw = serde_json::to_vec_pretty(items)
            .map_err(|e| storage_error("serialize credentials", e))?;
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, raw)
            .map_err(|e| storage_error(&format!("write {}", staging.display()), e))?;
        fs::rename(&staging, &self.path)
            .map_err(|e| storage_error(&format!("replace {}", self.path.display()), e))
    }
}

impl CredentialStore for FileCredentialStore {
    fn item(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.update(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        if !self.items.lock().contains_key(key) {
            return Ok(());
        }
        self.update(|items| {
            items.remove(key);
        })
    }

    fn clear(&self) -> Result<()> {
        self.update(BTreeMap::clear)
    }
}
