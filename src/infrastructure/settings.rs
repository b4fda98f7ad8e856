//! Small persisted settings file and the prefetch warm flag built on it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::ports::WarmFlagPort;
use crate::infrastructure::config::{ConfigError, save_to_file};

/// Key of the flag recording that the startup prefetch completed.
pub const WARM_FLAG_KEY: &str = "prefetch.has_prefetched_assets";

const DEFAULT_NAMESPACE: &str = "general";

type Tables = BTreeMap<String, BTreeMap<String, bool>>;

fn split_key(key: &str) -> (&str, &str) {
    key.split_once('.').unwrap_or((DEFAULT_NAMESPACE, key))
}

/// Boolean settings stored as TOML tables, one table per key prefix.
///
/// `prefetch.has_prefetched_assets = true` is written as
///
/// ```toml
/// [prefetch]
/// has_prefetched_assets = true
/// ```
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SettingsStore {
    /// Creates a store over the TOML file at `path`; the file is created on first write.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Returns the settings file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Tables, ConfigError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Tables::new()),
            Err(e) => return Err(e.into()),
        };

        match toml::from_str(&content) {
            Ok(tables) => Ok(tables),
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Malformed settings file, starting empty");
                Ok(Tables::new())
            }
        }
    }

    async fn save(&self, tables: Tables) -> Result<(), ConfigError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || save_to_file(&path, &tables))
            .await
            .map_err(|e| ConfigError::Io(std::io::Error::other(e)))?
    }

    /// Reads a flag; a missing file or key reads as `false`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be read.
    pub async fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        let (namespace, name) = split_key(key);
        let _guard = self.lock.lock().await;
        let tables = self.load().await?;
        Ok(tables
            .get(namespace)
            .and_then(|table| table.get(name))
            .copied()
            .unwrap_or(false))
    }

    /// Sets a flag and persists the file atomically.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or written.
    pub async fn set_bool(&self, key: &str, value: bool) -> Result<(), ConfigError> {
        let (namespace, name) = split_key(key);
        let _guard = self.lock.lock().await;
        let mut tables = self.load().await?;
        tables
            .entry(namespace.to_string())
            .or_default()
            .insert(name.to_string(), value);
        self.save(tables).await
    }

    /// Removes a flag. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or written.
    pub async fn remove(&self, key: &str) -> Result<(), ConfigError> {
        let (namespace, name) = split_key(key);
        let _guard = self.lock.lock().await;
        let mut tables = self.load().await?;

        let Some(table) = tables.get_mut(namespace) else {
            return Ok(());
        };
        if table.remove(name).is_none() {
            return Ok(());
        }
        if table.is_empty() {
            tables.remove(namespace);
        }
        self.save(tables).await
    }
}

/// Persisted "startup prefetch done" flag.
#[derive(Debug)]
pub struct WarmFlag {
    settings: SettingsStore,
}

impl WarmFlag {
    /// Creates a flag backed by `settings`.
    #[must_use]
    pub fn new(settings: SettingsStore) -> Self {
        Self { settings }
    }

    /// Opens the flag stored in the settings file at `path`.
    #[must_use]
    pub fn at(path: PathBuf) -> Self {
        Self::new(SettingsStore::new(path))
    }
}

#[async_trait]
impl WarmFlagPort for WarmFlag {
    async fn is_warm(&self) -> bool {
        match self.settings.get_bool(WARM_FLAG_KEY).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to read warm flag, assuming cold");
                false
            }
        }
    }

    async fn mark_warm(&self) -> CacheResult<()> {
        self.settings
            .set_bool(WARM_FLAG_KEY, true)
            .await
            .map_err(|e| CacheError::storage(e.to_string()))?;
        debug!("Warm flag set");
        Ok(())
    }

    async fn reset(&self) -> CacheResult<()> {
        self.settings
            .remove(WARM_FLAG_KEY)
            .await
            .map_err(|e| CacheError::storage(e.to_string()))
    }
}
