use crate::cache::{CacheEntry, CacheKey};
use crate::error::CacheError;
use anyhow::Context;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

/// Flat directory of cache entries, one file per key.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// concurrent reader sees either the previous entry or the new one.
#[derive(Debug)]
pub struct CacheStore {
    root: PathBuf,
    next_temp: AtomicU64,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CacheStore {
            root: root.into(),
            next_temp: AtomicU64::new(0),
        }
    }

    /// Creates the cache root (and parents) if missing and removes temporary
    /// files left behind by interrupted writes.
    pub async fn open(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let store = CacheStore::new(root);
        fs::create_dir_all(&store.root)
            .await
            .with_context(|| format!("failed to create cache dir {}", store.root.display()))?;
        store.remove_stale_temp_files().await?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    /// Returns the stored entry, or `None` on a miss. Unreadable or corrupt
    /// entries count as misses; corrupt files stay on disk until the next `put`.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let path = self.entry_path(key);
        let document = match fs::read(&path).await {
            Ok(document) => document,
            Err(err) => {
                debug!("Cache miss for {} ({})", path.display(), err);
                return None;
            }
        };

        match CacheEntry::from_document(&document) {
            Ok(entry) => Some(entry),
            Err(source) => {
                let err = CacheError::Corrupt {
                    key: key.to_string(),
                    source,
                };
                warn!("Treating cache entry as missing: {}", err);
                None
            }
        }
    }

    /// Stores `body` under `key`, replacing any previous entry.
    pub async fn put(&self, key: &CacheKey, body: &str) -> Result<(), CacheError> {
        let document = CacheEntry::new(body)
            .to_document()
            .map_err(|source| CacheError::Encode {
                key: key.to_string(),
                source,
            })?;

        let path = self.entry_path(key);
        let temp_path = self.temp_path(key);

        if let Err(source) = replace_file(&temp_path, &path, &document).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(CacheError::Write {
                key: key.to_string(),
                source,
            });
        }

        debug!("Stored {} bytes in {}", document.len(), path.display());
        Ok(())
    }

    async fn remove_stale_temp_files(&self) -> anyhow::Result<()> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .with_context(|| format!("failed to list cache dir {}", self.root.display()))?;

        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            if !is_temp_file_name(&entry.file_name().to_string_lossy()) {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(err) => warn!(
                    "Failed to remove stale temp file {}: {}",
                    entry.path().display(),
                    err
                ),
            }
        }

        if removed > 0 {
            info!("Removed {} stale temp files from {}", removed, self.root.display());
        }
        Ok(())
    }

    fn temp_path(&self, key: &CacheKey) -> PathBuf {
        let seq = self.next_temp.fetch_add(1, Ordering::Relaxed);
        self.root
            .join(format!(".{}.{}.{}.tmp", key, std::process::id(), seq))
    }
}

fn is_temp_file_name(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(".tmp")
}

async fn replace_file(temp_path: &Path, path: &Path, contents: &[u8]) -> std::io::Result<()> {
    fs::write(temp_path, contents).await?;
    fs::rename(temp_path, path).await
}
