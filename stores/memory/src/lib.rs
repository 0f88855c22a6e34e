use anyhow::anyhow;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use filehash_core::derive::normalize;
use filehash_core::store::{AssetStore, ByteStream, FileStat, StoreResult};
use futures::stream;

#[derive(Debug, Clone)]
struct MemoryFile {
    data: Bytes,
    mtime: DateTime<Utc>,
}

/// An [`AssetStore`] keeping files in memory.
///
/// Directories are implicit: a path is a directory when some file lives
/// below it. `.` is always a directory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: DashMap<String, MemoryFile>,
}

impl MemoryStore {
    /// Creates a new, empty `MemoryStore`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `data` at `path` with the current time as modification time.
    pub fn insert(&self, path: &str, data: impl Into<Bytes>) {
        self.files.insert(
            normalize(path),
            MemoryFile {
                data: data.into(),
                mtime: Utc::now(),
            },
        );
    }

    /// Overrides the modification time reported by `stat`.
    pub fn set_mtime(&self, path: &str, mtime: DateTime<Utc>) -> StoreResult<()> {
        let mut file = self
            .files
            .get_mut(&normalize(path))
            .ok_or_else(|| not_found(path))?;
        file.mtime = mtime;
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<Bytes> {
        self.files.get(&normalize(path)).map(|f| f.data.clone())
    }

    /// All file paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }

    fn file(&self, path: &str) -> StoreResult<MemoryFile> {
        self.files
            .get(&normalize(path))
            .map(|f| f.value().clone())
            .ok_or_else(|| not_found(path))
    }

    fn has_dir(&self, path: &str) -> bool {
        let dir = normalize(path);
        if dir == "." {
            return true;
        }
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        self.files.iter().any(|e| e.key().starts_with(&prefix))
    }
}

fn not_found(path: &str) -> anyhow::Error {
    anyhow!("no such file: {path:?}")
}

#[async_trait::async_trait]
impl AssetStore for MemoryStore {
    async fn exists(&self, path: &str) -> StoreResult<bool> {
        Ok(self.files.contains_key(&normalize(path)) || self.has_dir(path))
    }

    async fn is_file(&self, path: &str) -> StoreResult<bool> {
        Ok(self.files.contains_key(&normalize(path)))
    }

    async fn is_dir(&self, path: &str) -> StoreResult<bool> {
        Ok(!self.files.contains_key(&normalize(path)) && self.has_dir(path))
    }

    /// Yields the file in two chunks to exercise incremental consumers.
    async fn open_read_stream(&self, path: &str) -> StoreResult<ByteStream> {
        let data = self.file(path)?.data;
        let mid = data.len() / 2;
        let chunks = vec![Ok(data.slice(..mid)), Ok(data.slice(mid..))];
        Ok(Box::new(stream::iter(chunks)))
    }

    async fn read_bytes(&self, path: &str) -> StoreResult<Bytes> {
        Ok(self.file(path)?.data)
    }

    async fn stat(&self, path: &str) -> StoreResult<FileStat> {
        let file = self.file(path)?;
        Ok(FileStat::new(file.data.len() as u64, file.mtime))
    }

    async fn copy(&self, from: &str, to: &str) -> StoreResult<()> {
        let file = self.file(from)?;
        self.files.insert(
            normalize(to),
            MemoryFile {
                data: file.data,
                mtime: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        self.files
            .remove(&normalize(path))
            .ok_or_else(|| not_found(path))?;
        Ok(())
    }

    async fn write_bytes(&self, path: &str, data: Bytes) -> StoreResult<()> {
        self.insert(path, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filehash_core::testutil::StoreTests;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        StoreTests::new(&store).run_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_paths_are_normalized() {
        let store = MemoryStore::new();
        store.insert("./css//a.css", "a");
        assert_eq!(store.paths(), ["css/a.css"]);
        assert!(store.is_dir("css/").await.unwrap());
        assert!(store.is_file("css/./a.css").await.unwrap());
        assert!(!store.exists("cs").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_mtime() {
        let store = MemoryStore::new();
        store.insert("a.css", "body{}");
        let mtime = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        store.set_mtime("a.css", mtime).unwrap();

        let stat = store.stat("a.css").await.unwrap();
        assert_eq!(stat.mtime, mtime);
        assert_eq!(stat.size, 6);
        assert!(store.set_mtime("missing.css", mtime).is_err());
    }
}
