//! The archival worker's storage dependency (spec §1: "concrete ... blob-
//! store drivers" are an external collaborator, interfaced only). This
//! crate defines the narrow trait the worker needs and ships one driver,
//! `LocalFsBlobStore`, backed by `tokio::fs`.

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{RelayError, Result};

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>>;
    async fn put(&self, path: &str, data: &[u8]) -> Result<()>;
    /// Appends a single line (without its own trailing newline) to the
    /// object at `path`, creating it if absent (spec §4.7 step 4:
    /// "read-modify-write (append)").
    async fn append_jsonl(&self, path: &str, line: &[u8]) -> Result<()>;
}

pub struct LocalFsBlobStore {
    root: std::path::PathBuf,
}

impl LocalFsBlobStore {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        LocalFsBlobStore { root: root.into() }
    }

    fn full_path(&self, path: &str) -> std::path::PathBuf {
        self.root.join(path)
    }
}

fn io_err(e: std::io::Error) -> RelayError {
    RelayError::Storage(sqlx::Error::Io(e))
}

#[async_trait]
impl BlobStore for LocalFsBlobStore {
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let full = self.full_path(path);
        match tokio::fs::read(&full).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(e)),
        }
    }

    async fn put(&self, path: &str, data: &[u8]) -> Result<()> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(&full, data).await.map_err(io_err)
    }

    async fn append_jsonl(&self, path: &str, line: &[u8]) -> Result<()> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&full)
            .await
            .map_err(io_err)?;
        file.write_all(line).await.map_err(io_err)?;
        file.write_all(b"\n").await.map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = std::env::temp_dir().join(format!("clipcast-test-{}", std::process::id()));
        let store = LocalFsBlobStore::new(&dir);
        store.put("manifest.json", b"{}").await.unwrap();
        let data = store.get("manifest.json").await.unwrap();
        assert_eq!(data, Some(b"{}".to_vec()));
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn missing_object_returns_none() {
        let dir = std::env::temp_dir().join(format!("clipcast-test-missing-{}", std::process::id()));
        let store = LocalFsBlobStore::new(&dir);
        let data = store.get("events/2026-01-01/00.jsonl").await.unwrap();
        assert_eq!(data, None);
    }

    #[tokio::test]
    async fn append_jsonl_accumulates_lines() {
        let dir = std::env::temp_dir().join(format!("clipcast-test-append-{}", std::process::id()));
        let store = LocalFsBlobStore::new(&dir);
        store.append_jsonl("events/2026-01-01/00.jsonl", b"{\"a\":1}").await.unwrap();
        store.append_jsonl("events/2026-01-01/00.jsonl", b"{\"a\":2}").await.unwrap();
        let data = store.get("events/2026-01-01/00.jsonl").await.unwrap().unwrap();
        let text = String::from_utf8(data).unwrap();
        assert_eq!(text.lines().count(), 2);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
