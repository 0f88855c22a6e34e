use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, anyhow};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use filehash_core::store::{AssetStore, ByteStream, FileStat, StoreResult};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalStoreConfig {
    pub base_path: String,
}

/// An [`AssetStore`] over the local filesystem.
///
/// Relative paths are resolved against `base_path`; absolute paths are used
/// as they are.
#[derive(Debug, Clone)]
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        LocalStore {
            base_path: base_path.into(),
        }
    }

    pub fn create(config: LocalStoreConfig) -> Self {
        LocalStore {
            base_path: config.base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve_path(&self, path: &str) -> StoreResult<PathBuf> {
        if path.is_empty() {
            return Err(anyhow!("Invalid path: must not be empty."));
        }
        Ok(self.base_path.join(path))
    }

    async fn metadata(&self, path: &str) -> StoreResult<Option<std::fs::Metadata>> {
        let full_path = self.resolve_path(path)?;
        match tokio::fs::metadata(&full_path).await {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_parent(&self, full_path: &Path) -> StoreResult<()> {
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {parent:?}"))?;
        }
        Ok(())
    }
}

fn to_utc(time: std::io::Result<SystemTime>) -> Option<DateTime<Utc>> {
    time.ok().map(DateTime::<Utc>::from)
}

#[cfg(unix)]
fn file_stat(metadata: &std::fs::Metadata) -> FileStat {
    use std::os::unix::fs::MetadataExt;

    let mtime = to_utc(metadata.modified()).unwrap_or_default();
    FileStat {
        size: metadata.len(),
        mode: metadata.mode(),
        mtime,
        atime: to_utc(metadata.accessed()).unwrap_or(mtime),
        ctime: DateTime::from_timestamp(metadata.ctime(), metadata.ctime_nsec() as u32)
            .unwrap_or(mtime),
        birthtime: to_utc(metadata.created()),
        ino: metadata.ino(),
        dev: metadata.dev(),
        nlink: metadata.nlink(),
        uid: metadata.uid(),
        gid: metadata.gid(),
        blksize: metadata.blksize(),
        blocks: metadata.blocks(),
    }
}

#[cfg(not(unix))]
fn file_stat(metadata: &std::fs::Metadata) -> FileStat {
    let mtime = to_utc(metadata.modified()).unwrap_or_default();
    FileStat {
        atime: to_utc(metadata.accessed()).unwrap_or(mtime),
        birthtime: to_utc(metadata.created()),
        ..FileStat::new(metadata.len(), mtime)
    }
}

#[async_trait::async_trait]
impl AssetStore for LocalStore {
    async fn exists(&self, path: &str) -> StoreResult<bool> {
        let full_path = self.resolve_path(path)?;
        tokio::fs::try_exists(&full_path).await.map_err(Into::into)
    }

    async fn is_file(&self, path: &str) -> StoreResult<bool> {
        Ok(self.metadata(path).await?.is_some_and(|m| m.is_file()))
    }

    async fn is_dir(&self, path: &str) -> StoreResult<bool> {
        Ok(self.metadata(path).await?.is_some_and(|m| m.is_dir()))
    }

    async fn open_read_stream(&self, path: &str) -> StoreResult<ByteStream> {
        let full_path = self.resolve_path(path)?;
        let file = File::open(&full_path).await?;
        Ok(Box::new(ReaderStream::new(file)))
    }

    async fn read_bytes(&self, path: &str) -> StoreResult<Bytes> {
        let full_path = self.resolve_path(path)?;
        Ok(Bytes::from(tokio::fs::read(&full_path).await?))
    }

    async fn stat(&self, path: &str) -> StoreResult<FileStat> {
        let full_path = self.resolve_path(path)?;
        let metadata = tokio::fs::metadata(&full_path).await?;
        Ok(file_stat(&metadata))
    }

    async fn copy(&self, from: &str, to: &str) -> StoreResult<()> {
        let from_path = self.resolve_path(from)?;
        let to_path = self.resolve_path(to)?;
        self.create_parent(&to_path).await?;
        tokio::fs::copy(&from_path, &to_path).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        let full_path = self.resolve_path(path)?;
        match tokio::fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_bytes(&self, path: &str, data: Bytes) -> StoreResult<()> {
        let full_path = self.resolve_path(path)?;
        self.create_parent(&full_path).await?;
        tokio::fs::write(&full_path, &data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use filehash_core::testutil::StoreTests;
    use filehash_core::{FileGroup, GroupProcessor, Options, TemplateSetting};

    #[tokio::test]
    async fn test_local_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(temp_dir.path());
        StoreTests::new(&store).run_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_absolute_paths_bypass_base() {
        let temp_dir = tempfile::tempdir().unwrap();
        let absolute = temp_dir.path().join("abs.txt");
        let store = LocalStore::new("does-not-matter");

        let path = absolute.to_string_lossy();
        store.write_text(&path, "abs").await.unwrap();
        assert!(store.is_file(&path).await.unwrap());
        assert_eq!(std::fs::read_to_string(&absolute).unwrap(), "abs");
    }

    #[tokio::test]
    async fn test_stat_reports_mtime() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LocalStore::create(LocalStoreConfig {
            base_path: temp_dir.path().to_string_lossy().into_owned(),
        });
        store.write_text("a.css", "body{}").await.unwrap();

        let stat = store.stat("a.css").await.unwrap();
        let modified = std::fs::metadata(temp_dir.path().join("a.css"))
            .unwrap()
            .modified()
            .unwrap();
        assert_eq!(stat.mtime, DateTime::<Utc>::from(modified));
        assert_eq!(stat.size, 6);
    }

    #[tokio::test]
    async fn test_group_copy_onto_itself_keeps_content() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("a.css"), "a { }").unwrap();
        let store = Arc::new(LocalStore::new(temp_dir.path()));

        for keep in [true, false] {
            let options = Options {
                rename: TemplateSetting::Switch(false),
                keep,
                ..Options::default()
            };
            let processor = GroupProcessor::new(store.clone(), &options).unwrap();
            let group = FileGroup::new(["./a.css"]).with_dest(".");

            let report = processor.process(&group).await.unwrap();
            assert!(report.is_success());
            assert_eq!(
                std::fs::read_to_string(temp_dir.path().join("a.css")).unwrap(),
                "a { }",
                "keep = {keep}"
            );
        }
    }
}
