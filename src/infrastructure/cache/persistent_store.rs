//! Directory-backed blob store for persistence across sessions.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use crate::domain::entities::CacheKey;
use crate::domain::errors::{CacheError, CacheResult};

const TEMP_SUFFIX: &str = "tmp";

/// Temp files younger than this may belong to a live writer sharing the
/// directory and are left alone on open.
pub const STALE_TEMP_AGE: Duration = Duration::from_secs(60 * 60);

/// Files and bytes currently held by a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreUsage {
    /// Number of committed entries.
    pub files: usize,
    /// Total size of committed entries.
    pub bytes: u64,
}

/// Content-keyed blob store, one file per key under a dedicated directory.
///
/// Writes go to a hidden temp file next to the target and are renamed into
/// place, so a reader never observes a partial file under a final key.
/// Reads, writes and evictions share `gate`; [`PersistentStore::clear`] takes
/// it exclusively.
#[derive(Debug)]
pub struct PersistentStore {
    root: PathBuf,
    extension: Option<String>,
    gate: RwLock<()>,
}

impl PersistentStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created.
    pub async fn open(root: PathBuf) -> CacheResult<Self> {
        Self::open_with_extension(root, None).await
    }

    /// Opens a store whose files carry a fixed extension (e.g. `mp4`).
    ///
    /// # Errors
    /// Returns error if the directory cannot be created.
    pub async fn open_with_extension(root: PathBuf, extension: Option<&str>) -> CacheResult<Self> {
        fs::create_dir_all(&root)
            .await
            .map_err(|e| CacheError::storage(format!("Failed to create cache dir: {e}")))?;

        let store = Self {
            root,
            extension: extension.map(str::to_string),
            gate: RwLock::new(()),
        };
        store.remove_stale_temp_files().await;

        Ok(store)
    }

    /// Returns the directory this store owns.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the final path for a key.
    #[must_use]
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        match &self.extension {
            Some(ext) => self.root.join(format!("{key}.{ext}")),
            None => self.root.join(key.as_str()),
        }
    }

    /// Returns a fresh temp path in the store directory for a key.
    ///
    /// Temp files are hidden and never reported by [`PersistentStore::usage`].
    #[must_use]
    pub fn temp_path(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(format!(".{key}.{}.{TEMP_SUFFIX}", uuid::Uuid::new_v4().simple()))
    }

    /// Checks whether a blob exists. I/O errors count as absent.
    pub async fn exists(&self, key: &CacheKey) -> bool {
        let _guard = self.gate.read().await;
        fs::try_exists(self.path_for(key)).await.unwrap_or(false)
    }

    /// Reads a blob. Any I/O error is treated as absence.
    pub async fn read(&self, key: &CacheKey) -> Option<Bytes> {
        let _guard = self.gate.read().await;
        let path = self.path_for(key);
        match fs::read(&path).await {
            Ok(bytes) => {
                trace!(key = %key, path = %path.display(), "Disk cache hit");
                Some(Bytes::from(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!(key = %key, "Disk cache miss");
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read cache file, treating as miss");
                None
            }
        }
    }

    /// Stores a blob atomically, replacing any previous value.
    ///
    /// # Errors
    /// Returns error if the temp file cannot be written or renamed.
    pub async fn write(&self, key: &CacheKey, bytes: &[u8]) -> CacheResult<()> {
        let _guard = self.gate.read().await;
        let temp = self.temp_path(key);

        if let Err(e) = write_file(&temp, bytes).await {
            discard(&temp).await;
            return Err(e);
        }

        let path = self.path_for(key);
        if let Err(e) = fs::rename(&temp, &path).await {
            discard(&temp).await;
            return Err(CacheError::storage(format!(
                "Failed to move cache file into place: {e}"
            )));
        }

        debug!(key = %key, path = %path.display(), size = bytes.len(), "Stored blob in disk cache");
        Ok(())
    }

    /// Atomically moves an already written file (see [`PersistentStore::temp_path`])
    /// into place under `key`.
    ///
    /// # Errors
    /// Returns error if the rename fails; the temp file is removed in that case.
    pub async fn commit_file(&self, key: &CacheKey, temp: &Path) -> CacheResult<PathBuf> {
        let _guard = self.gate.read().await;
        let path = self.path_for(key);

        if let Err(e) = fs::rename(temp, &path).await {
            discard(temp).await;
            return Err(CacheError::storage(format!(
                "Failed to move download into place: {e}"
            )));
        }

        debug!(key = %key, path = %path.display(), "Committed file to disk cache");
        Ok(path)
    }

    /// Deletes a temp file that will not be committed.
    pub async fn discard_temp(&self, temp: &Path) {
        discard(temp).await;
    }

    /// Removes a single blob.
    pub async fn evict(&self, key: &CacheKey) {
        let _guard = self.gate.read().await;
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => debug!(key = %key, "Evicted from disk cache"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(key = %key, error = %e, "Failed to evict from disk cache"),
        }
    }

    /// Deletes the whole store directory and recreates it empty.
    ///
    /// The directory is renamed aside before deletion, so the store is empty
    /// as soon as the rename succeeds.
    ///
    /// # Errors
    /// Returns error if the directory cannot be moved aside or recreated.
    pub async fn clear(&self) -> CacheResult<()> {
        let trash = {
            let _guard = self.gate.write().await;

            let trash = self.trash_path();
            match fs::rename(&self.root, &trash).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(CacheError::storage(format!(
                        "Failed to move cache dir aside: {e}"
                    )));
                }
            }

            fs::create_dir_all(&self.root)
                .await
                .map_err(|e| CacheError::storage(format!("Failed to recreate cache dir: {e}")))?;
            trash
        };

        match fs::remove_dir_all(&trash).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %trash.display(), error = %e, "Failed to delete old cache dir"),
        }

        debug!(root = %self.root.display(), "Cleared disk cache");
        Ok(())
    }

    /// Scans the directory and reports committed entries.
    pub async fn usage(&self) -> StoreUsage {
        let _guard = self.gate.read().await;
        let mut usage = StoreUsage::default();

        let Ok(mut entries) = fs::read_dir(&self.root).await else {
            return usage;
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            if is_temp_name(&entry.file_name().to_string_lossy()) {
                continue;
            }
            if let Ok(meta) = entry.metadata().await
                && meta.is_file()
            {
                usage.files += 1;
                usage.bytes += meta.len();
            }
        }

        usage
    }

    fn trash_path(&self) -> PathBuf {
        let name = self
            .root
            .file_name()
            .map_or_else(|| "cache".to_string(), |n| n.to_string_lossy().into_owned());
        self.root.with_file_name(format!(
            ".{name}.trash-{}",
            uuid::Uuid::new_v4().simple()
        ))
    }

    /// Deletes temp files left behind by a process that died mid-write.
    ///
    /// Only files untouched for [`STALE_TEMP_AGE`] are removed; another
    /// store or process may still be writing the newer ones.
    async fn remove_stale_temp_files(&self) {
        let Ok(mut entries) = fs::read_dir(&self.root).await else {
            return;
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            if !is_temp_name(&entry.file_name().to_string_lossy()) {
                continue;
            }
            let abandoned = entry
                .metadata()
                .await
                .and_then(|meta| meta.modified())
                .is_ok_and(|modified| is_stale(modified, SystemTime::now()));
            if abandoned {
                trace!(path = %entry.path().display(), "Removing stale temp file");
                discard(&entry.path()).await;
            }
        }
    }
}

fn is_stale(modified: SystemTime, now: SystemTime) -> bool {
    now.duration_since(modified)
        .is_ok_and(|age| age >= STALE_TEMP_AGE)
}

fn is_temp_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}

async fn write_file(path: &Path, bytes: &[u8]) -> CacheResult<()> {
    let mut file = fs::File::create(path)
        .await
        .map_err(|e| CacheError::storage(format!("Failed to create cache file: {e}")))?;

    file.write_all(bytes)
        .await
        .map_err(|e| CacheError::storage(format!("Failed to write cache file: {e}")))?;

    file.sync_all()
        .await
        .map_err(|e| CacheError::storage(format!("Failed to flush cache file: {e}")))?;

    Ok(())
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await
        && e.kind() != ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "Failed to remove temp file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn create_test_store() -> (PersistentStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = PersistentStore::open(temp_dir.path().join("covers"))
            .await
            .unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_open_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("nested").join("covers");

        let store = PersistentStore::open(root.clone()).await.unwrap();

        assert!(root.is_dir());
        assert_eq!(store.root(), root.as_path());
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (store, _temp) = create_test_store().await;
        let key = CacheKey::derive("https://example.com/1.jpg");

        store.write(&key, b"cover bytes").await.unwrap();

        assert!(store.exists(&key).await);
        assert_eq!(store.read(&key).await.unwrap(), Bytes::from_static(b"cover bytes"));
    }

    #[tokio::test]
    async fn test_miss() {
        let (store, _temp) = create_test_store().await;
        let key = CacheKey::derive("https://example.com/missing.jpg");

        assert!(!store.exists(&key).await);
        assert!(store.read(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_last_write_wins() {
        let (store, _temp) = create_test_store().await;
        let key = CacheKey::derive("https://example.com/1.jpg");

        store.write(&key, b"first").await.unwrap();
        store.write(&key, b"second").await.unwrap();

        assert_eq!(store.read(&key).await.unwrap(), Bytes::from_static(b"second"));
        assert_eq!(store.usage().await.files, 1);
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_files() {
        let (store, _temp) = create_test_store().await;
        let key = CacheKey::derive("https://example.com/1.jpg");

        store.write(&key, b"data").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(store.root())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![key.to_string()]);
    }

    fn age_file(path: &Path, age: Duration) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[tokio::test]
    async fn test_stale_temp_files_removed_on_open() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("covers");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join(".abc.1234.tmp"), b"partial").unwrap();
        std::fs::write(root.join("abc"), b"complete").unwrap();
        age_file(&root.join(".abc.1234.tmp"), STALE_TEMP_AGE + Duration::from_secs(60));

        let store = PersistentStore::open(root.clone()).await.unwrap();

        assert!(!root.join(".abc.1234.tmp").exists());
        assert_eq!(store.usage().await, StoreUsage { files: 1, bytes: 8 });
    }

    #[tokio::test]
    async fn test_reopen_keeps_pending_temp_file() {
        let (store, _temp) = create_test_store().await;
        let key = CacheKey::derive("https://example.com/clip");
        let temp = store.temp_path(&key);
        tokio::fs::write(&temp, b"streaming").await.unwrap();

        let _second = PersistentStore::open(store.root().to_path_buf())
            .await
            .unwrap();

        assert!(temp.exists());
        let path = store.commit_file(&key, &temp).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"streaming");
    }

    #[test]
    fn test_is_stale() {
        let now = SystemTime::now();

        assert!(!is_stale(now, now));
        assert!(!is_stale(now - Duration::from_secs(30), now));
        assert!(is_stale(now - STALE_TEMP_AGE, now));
        assert!(!is_stale(now + Duration::from_secs(5), now));
    }

    #[tokio::test]
    async fn test_extension_applied() {
        let temp_dir = TempDir::new().unwrap();
        let store = PersistentStore::open_with_extension(temp_dir.path().join("videos"), Some("mp4"))
            .await
            .unwrap();
        let key = CacheKey::derive("https://example.com/clip");

        store.write(&key, b"mp4").await.unwrap();

        assert!(store.path_for(&key).to_string_lossy().ends_with(".mp4"));
        assert!(store.path_for(&key).exists());
    }

    #[tokio::test]
    async fn test_commit_file() {
        let (store, _temp) = create_test_store().await;
        let key = CacheKey::derive("https://example.com/clip");
        let temp = store.temp_path(&key);
        tokio::fs::write(&temp, b"downloaded").await.unwrap();

        let path = store.commit_file(&key, &temp).await.unwrap();

        assert!(!temp.exists());
        assert_eq!(path, store.path_for(&key));
        assert_eq!(store.read(&key).await.unwrap(), Bytes::from_static(b"downloaded"));
    }

    #[tokio::test]
    async fn test_evict() {
        let (store, _temp) = create_test_store().await;
        let key = CacheKey::derive("https://example.com/1.jpg");

        store.write(&key, b"data").await.unwrap();
        store.evict(&key).await;
        assert!(!store.exists(&key).await);

        // Evicting a missing key is a no-op.
        store.evict(&key).await;
    }

    #[tokio::test]
    async fn test_clear() {
        let (store, temp) = create_test_store().await;
        let a = CacheKey::derive("https://example.com/a.jpg");
        let b = CacheKey::derive("https://example.com/b.jpg");

        store.write(&a, b"a").await.unwrap();
        store.write(&b, b"bb").await.unwrap();
        assert_eq!(store.usage().await, StoreUsage { files: 2, bytes: 3 });

        store.clear().await.unwrap();

        assert!(store.root().is_dir());
        assert_eq!(store.usage().await, StoreUsage::default());
        assert!(!store.exists(&a).await);

        // Only the recreated root remains next to it.
        let siblings = std::fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(siblings, 1);

        store.write(&a, b"again").await.unwrap();
        assert!(store.exists(&a).await);
    }

    #[tokio::test]
    async fn test_clear_concurrent_with_writes() {
        let (store, _temp) = create_test_store().await;
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let key = CacheKey::derive(&format!("https://example.com/{i}.jpg"));
                store.write(&key, b"payload").await
            }));
        }
        store.clear().await.unwrap();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Every surviving entry is complete.
        let usage = store.usage().await;
        assert_eq!(usage.bytes, usage.files as u64 * 7);
    }

    #[tokio::test]
    async fn test_read_of_directory_is_absent() {
        let (store, _temp) = create_test_store().await;
        let key = CacheKey::derive("https://example.com/dir");
        std::fs::create_dir_all(store.path_for(&key)).unwrap();

        assert!(store.read(&key).await.is_none());
    }
}
