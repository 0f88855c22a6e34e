//! Test utilities for `AssetStore` implementations.
//!
//! # Usage
//!
//! In your store crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! filehash_core = { workspace = true, features = ["testutil"] }
//! ```
//!
//! In your test file:
//!
//! ```ignore
//! use filehash_core::testutil::StoreTests;
//!
//! #[tokio::test]
//! async fn test_my_store() {
//!     let store = MyStore::new(...);
//!     StoreTests::new(&store).run_all().await.unwrap();
//! }
//! ```

use std::sync::Mutex;

use bytes::Bytes;
use futures::StreamExt;
use rand::Rng;

use crate::store::{AssetStore, StoreResult};

/// Contract checks every `AssetStore` must pass.
pub struct StoreTests<'a, S> {
    store: &'a S,
    /// Prefix for test files to avoid conflicts
    prefix: String,
    written: Mutex<Vec<String>>,
}

impl<'a, S: AssetStore> StoreTests<'a, S> {
    pub fn new(store: &'a S) -> Self {
        let prefix = format!("_test_{}/", rand::rng().random::<u32>());
        Self::with_prefix(store, prefix)
    }

    pub fn with_prefix(store: &'a S, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            written: Mutex::new(Vec::new()),
        }
    }

    fn path(&self, name: &str) -> String {
        let path = format!("{}{}", self.prefix, name);
        if let Ok(mut written) = self.written.lock() {
            written.push(path.clone());
        }
        path
    }

    pub async fn run_all(&self) -> StoreResult<()> {
        self.test_write_read().await?;
        self.test_read_stream().await?;
        self.test_exists_and_kinds().await?;
        self.test_stat().await?;
        self.test_copy_creates_parents().await?;
        self.test_delete().await?;
        self.test_overwrite().await?;
        self.test_read_json().await?;
        self.test_missing_file_errors().await?;

        self.cleanup().await?;
        Ok(())
    }

    pub async fn test_write_read(&self) -> StoreResult<()> {
        let path = self.path("bytes_test.bin");
        let data = random_bytes(4096);

        self.store.write_bytes(&path, data.clone()).await?;
        let retrieved = self.store.read_bytes(&path).await?;
        assert_eq!(retrieved, data, "retrieved data should match original");
        Ok(())
    }

    pub async fn test_read_stream(&self) -> StoreResult<()> {
        let path = self.path("stream_test.bin");
        let data = random_bytes(1024 * 100);
        self.store.write_bytes(&path, data.clone()).await?;

        let mut stream = self.store.open_read_stream(&path).await?;
        let mut retrieved = Vec::new();
        while let Some(chunk) = stream.next().await {
            retrieved.extend_from_slice(&chunk?);
        }
        assert_eq!(retrieved.len(), data.len(), "stream data length should match");
        assert_eq!(retrieved, data.as_ref(), "stream data should match");
        Ok(())
    }

    pub async fn test_exists_and_kinds(&self) -> StoreResult<()> {
        let path = self.path("kinds/file.txt");
        let dir = format!("{}kinds", self.prefix);

        assert!(
            !self.store.exists(&path).await?,
            "file should not exist before creation"
        );
        self.store.write_text(&path, "kinds").await?;

        assert!(self.store.exists(&path).await?, "file should exist after creation");
        assert!(self.store.is_file(&path).await?);
        assert!(!self.store.is_dir(&path).await?);

        assert!(self.store.exists(&dir).await?, "parent should exist");
        assert!(self.store.is_dir(&dir).await?);
        assert!(!self.store.is_file(&dir).await?, "a directory is not a file");
        Ok(())
    }

    pub async fn test_stat(&self) -> StoreResult<()> {
        let path = self.path("stat_test.bin");
        self.store.write_bytes(&path, Bytes::from(vec![42u8; 12345])).await?;

        let stat = self.store.stat(&path).await?;
        assert_eq!(stat.size, 12345, "size should match data length");
        let vars = stat.to_vars();
        assert!(vars.get("mtime").is_some());
        assert!(vars.get("size").is_some());
        Ok(())
    }

    pub async fn test_copy_creates_parents(&self) -> StoreResult<()> {
        let from = self.path("copy_src.css");
        let to = self.path("deep/nested/copy_dst.css");
        self.store.write_text(&from, "body{}").await?;

        self.store.copy(&from, &to).await?;
        assert!(self.store.exists(&from).await?, "copy keeps the source");
        assert_eq!(self.store.read_bytes(&to).await?.as_ref(), b"body{}");
        Ok(())
    }

    pub async fn test_delete(&self) -> StoreResult<()> {
        let path = self.path("delete_test.bin");
        self.store.write_text(&path, "to be deleted").await?;
        assert!(self.store.exists(&path).await?, "file should exist before delete");

        self.store.delete(&path).await?;
        assert!(
            !self.store.exists(&path).await?,
            "file should not exist after delete"
        );
        Ok(())
    }

    pub async fn test_overwrite(&self) -> StoreResult<()> {
        let path = self.path("overwrite_test.txt");
        self.store.write_text(&path, "original content").await?;
        self.store.write_text(&path, "new").await?;

        let retrieved = self.store.read_bytes(&path).await?;
        assert_eq!(retrieved.as_ref(), b"new", "overwritten content should be new");
        assert_eq!(self.store.stat(&path).await?.size, 3);
        Ok(())
    }

    pub async fn test_read_json(&self) -> StoreResult<()> {
        let path = self.path("map.json");
        self.store.write_text(&path, r#"{"a.css": "a.1.css"}"#).await?;

        let value = self.store.read_json(&path).await?;
        assert_eq!(value["a.css"], "a.1.css");
        Ok(())
    }

    pub async fn test_missing_file_errors(&self) -> StoreResult<()> {
        let path = self.path("never_written.bin");
        assert!(self.store.read_bytes(&path).await.is_err());
        assert!(self.store.stat(&path).await.is_err());
        assert!(self.store.open_read_stream(&path).await.is_err());
        assert!(!self.store.is_file(&path).await?);
        assert!(!self.store.is_dir(&path).await?);
        Ok(())
    }

    pub async fn cleanup(&self) -> StoreResult<()> {
        let written = match self.written.lock() {
            Ok(written) => written.clone(),
            Err(_) => return Ok(()),
        };
        for path in written {
            if self.store.is_file(&path).await? {
                let _ = self.store.delete(&path).await;
            }
        }
        Ok(())
    }
}

/// Generate random bytes for testing.
pub fn random_bytes(len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    rand::rng().fill(&mut data[..]);
    Bytes::from(data)
}
