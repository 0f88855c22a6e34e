use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;

use crate::template::Vars;

pub type StoreResult<T, E = anyhow::Error> = std::result::Result<T, E>;

pub type ByteStream = Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send + Unpin + 'static>;

/// The file operations the fingerprinting pipeline needs from its host.
///
/// Paths are plain `/`-separated strings as produced by the path deriver;
/// each implementation decides how to anchor relative paths.
#[async_trait]
pub trait AssetStore: std::fmt::Debug + Send + Sync + 'static {
    async fn exists(&self, path: &str) -> StoreResult<bool>;

    /// `true` only for regular files (not directories).
    async fn is_file(&self, path: &str) -> StoreResult<bool>;

    async fn is_dir(&self, path: &str) -> StoreResult<bool>;

    async fn open_read_stream(&self, path: &str) -> StoreResult<ByteStream>;

    async fn read_bytes(&self, path: &str) -> StoreResult<Bytes>;

    async fn stat(&self, path: &str) -> StoreResult<FileStat>;

    /// Copies `from` to `to`, creating parent directories of `to` as needed.
    async fn copy(&self, from: &str, to: &str) -> StoreResult<()>;

    async fn delete(&self, path: &str) -> StoreResult<()>;

    /// Writes `data`, replacing any existing file and creating parent
    /// directories as needed.
    async fn write_bytes(&self, path: &str, data: Bytes) -> StoreResult<()>;

    async fn write_text(&self, path: &str, text: &str) -> StoreResult<()> {
        self.write_bytes(path, Bytes::copy_from_slice(text.as_bytes()))
            .await
    }

    async fn read_json(&self, path: &str) -> StoreResult<serde_json::Value> {
        let bytes = self.read_bytes(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// File metadata exposed to etag templates.
///
/// Fields the platform does not provide are zero (or `None` for
/// `birthtime`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub mode: u32,
    pub mtime: DateTime<Utc>,
    pub atime: DateTime<Utc>,
    pub ctime: DateTime<Utc>,
    pub birthtime: Option<DateTime<Utc>>,
    pub ino: u64,
    pub dev: u64,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
    pub blksize: u64,
    pub blocks: u64,
}

impl FileStat {
    /// A stat with only size and modification time set.
    pub fn new(size: u64, mtime: DateTime<Utc>) -> Self {
        Self {
            size,
            mode: 0,
            mtime,
            atime: mtime,
            ctime: mtime,
            birthtime: None,
            ino: 0,
            dev: 0,
            nlink: 1,
            uid: 0,
            gid: 0,
            blksize: 0,
            blocks: 0,
        }
    }

    pub fn to_vars(&self) -> Vars {
        let mut vars = Vars::new()
            .with("size", self.size)
            .with("mode", self.mode)
            .with("mtime", self.mtime)
            .with("atime", self.atime)
            .with("ctime", self.ctime)
            .with("ino", self.ino)
            .with("dev", self.dev)
            .with("nlink", self.nlink)
            .with("uid", self.uid)
            .with("gid", self.gid)
            .with("blksize", self.blksize)
            .with("blocks", self.blocks)
            .with("mtimeMs", self.mtime.timestamp_millis())
            .with("atimeMs", self.atime.timestamp_millis())
            .with("ctimeMs", self.ctime.timestamp_millis());
        if let Some(birthtime) = self.birthtime {
            vars.insert("birthtime", birthtime);
            vars.insert("birthtimeMs", birthtime.timestamp_millis());
        }
        vars
    }
}
