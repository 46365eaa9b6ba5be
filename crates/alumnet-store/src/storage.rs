//! File storage under `<root>/<bucket>/<path>`.
//!
//! Objects are written by [`LocalBackend::upload`](crate::LocalBackend) and
//! served by the storage server, which reads through the same type so both
//! sides agree on path validation.

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::error::{BackendError, Result};

#[derive(Debug, Clone)]
pub struct ObjectStorage {
    root: PathBuf,
    public_url: String,
    max_size: usize,
}

impl ObjectStorage {
    pub fn new(root: PathBuf, public_url: &str, max_size: usize) -> Self {
        Self {
            root,
            public_url: public_url.trim_end_matches('/').to_string(),
            max_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/{bucket}/{path}", self.public_url)
    }

    /// Write an object, replacing any previous content at the same path.
    pub async fn put(&self, bucket: &str, path: &str, data: &[u8]) -> Result<String> {
        if data.is_empty() {
            return Err(BackendError::Storage("Empty object".into()));
        }
        if data.len() > self.max_size {
            return Err(BackendError::TooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let target = self.object_path(bucket, path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, data).await?;

        debug!(bucket, path, size = data.len(), "Stored object");
        Ok(self.public_url(bucket, path))
    }

    pub async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        let target = self.object_path(bucket, path)?;
        match fs::read(&target).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BackendError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve `bucket/path` below the root, rejecting anything that could
    /// escape it.
    pub fn object_path(&self, bucket: &str, path: &str) -> Result<PathBuf> {
        let bucket_ok = !bucket.is_empty()
            && bucket
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if !bucket_ok {
            return Err(BackendError::Storage(format!("Invalid bucket name: {bucket:?}")));
        }
        if path.is_empty() || path.contains('\\') {
            return Err(BackendError::Storage(format!("Invalid object path: {path:?}")));
        }

        let mut resolved = self.root.join(bucket);
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                _ => {
                    return Err(BackendError::Storage(format!(
                        "Path traversal detected in {path:?}"
                    )))
                }
            }
        }
        Ok(resolved)
    }
}
