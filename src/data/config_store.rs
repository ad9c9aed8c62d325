//! Persisted per-view grid state.
//!
//! The store is the only owner of column configuration; the pipeline reads it
//! on mount and writes a full replacement document on every committed change.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::config::config::StorageConfig;
use crate::data::column_config::ColumnConfig;
use crate::data::sort_spec::ColumnSort;
use crate::utils::app_paths::AppPaths;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewKey {
    pub table: String,
    pub view: String,
}

impl ViewKey {
    pub fn new(table: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            view: view.into(),
        }
    }

    fn file_name(&self) -> String {
        let clean = |s: &str| -> String {
            s.chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
                .collect()
        };
        format!("{}.{}.json", clean(&self.table), clean(&self.view))
    }
}

/// Stored document for one grid view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedView {
    /// `None` until the view's columns have been configured once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnConfig>>,
    #[serde(default)]
    pub sort: Vec<ColumnSort>,
}

pub trait ConfigStore {
    fn load(&self, key: &ViewKey) -> Result<Option<PersistedView>>;

    /// Replaces the whole document for `key`
    fn save(&self, key: &ViewKey, view: &PersistedView) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    views: Mutex<HashMap<ViewKey, PersistedView>>,
    writes: Mutex<usize>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_view(self, key: ViewKey, view: PersistedView) -> Self {
        if let Ok(mut views) = self.views.lock() {
            views.insert(key, view);
        }
        self
    }

    /// Number of saves performed so far
    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|w| *w).unwrap_or(0)
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load(&self, key: &ViewKey) -> Result<Option<PersistedView>> {
        let views = self
            .views
            .lock()
            .map_err(|_| anyhow!("config store lock poisoned"))?;
        Ok(views.get(key).cloned())
    }

    fn save(&self, key: &ViewKey, view: &PersistedView) -> Result<()> {
        let mut views = self
            .views
            .lock()
            .map_err(|_| anyhow!("config store lock poisoned"))?;
        views.insert(key.clone(), view.clone());
        if let Ok(mut writes) = self.writes.lock() {
            *writes += 1;
        }
        Ok(())
    }
}

/// One pretty-printed JSON file per view inside a directory
#[derive(Debug, Clone)]
pub struct JsonFileConfigStore {
    dir: PathBuf,
}

impl JsonFileConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the platform data directory
    pub fn default_location() -> Result<Self> {
        let dir = AppPaths::column_config_dir().map_err(|e| anyhow!("{}", e))?;
        Ok(Self::new(dir))
    }

    /// Uses `[storage] config_dir` when set, the platform data directory otherwise
    pub fn from_config(storage: &StorageConfig) -> Result<Self> {
        match &storage.config_dir {
            Some(dir) => Ok(Self::new(dir.clone())),
            None => Self::default_location(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &ViewKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

impl ConfigStore for JsonFileConfigStore {
    fn load(&self, key: &ViewKey) -> Result<Option<PersistedView>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let view: PersistedView = serde_json::from_str(&content)?;
        debug!(target: "config_store", "Loaded view config from {:?}", path);
        Ok(Some(view))
    }

    fn save(&self, key: &ViewKey, view: &PersistedView) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(view)?;

        // Rename over the old file so readers never see a partial document
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &path)?;

        debug!(target: "config_store", "Saved view config to {:?}", path);
        Ok(())
    }
}
