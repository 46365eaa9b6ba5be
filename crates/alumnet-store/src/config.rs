//! Local backend configuration loaded from environment variables.

use std::path::PathBuf;

use directories::ProjectDirs;

use alumnet_shared::constants::{DEFAULT_HTTP_PORT, MAX_UPLOAD_SIZE};

use crate::error::{BackendError, Result};

#[derive(Debug, Clone)]
pub struct LocalBackendConfig {
    /// Directory holding `alumnet.db` and the `storage/` tree.
    /// Env: `ALUMNET_DATA_DIR`
    /// Default: the platform data directory (e.g. `~/.local/share/alumnet`).
    pub data_dir: PathBuf,

    /// Base URL under which the storage server publishes objects.
    /// Env: `ALUMNET_PUBLIC_URL`
    /// Default: `http://127.0.0.1:8080`
    pub public_url: String,

    /// Maximum upload size in bytes.
    /// Env: `ALUMNET_MAX_UPLOAD_SIZE`
    pub max_upload_size: usize,
}

impl LocalBackendConfig {
    /// Configuration rooted at an explicit directory.
    pub fn at(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            public_url: format!("http://127.0.0.1:{DEFAULT_HTTP_PORT}"),
            max_upload_size: MAX_UPLOAD_SIZE,
        }
    }

    /// Load configuration from environment variables, falling back to the
    /// platform data directory.
    pub fn from_env() -> Result<Self> {
        let data_dir = match std::env::var("ALUMNET_DATA_DIR") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => default_data_dir()?,
        };
        let mut config = Self::at(data_dir);

        if let Ok(url) = std::env::var("ALUMNET_PUBLIC_URL") {
            if !url.is_empty() {
                config.public_url = url.trim_end_matches('/').to_string();
            }
        }

        if let Ok(val) = std::env::var("ALUMNET_MAX_UPLOAD_SIZE") {
            match val.parse::<usize>() {
                Ok(n) => config.max_upload_size = n,
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid ALUMNET_MAX_UPLOAD_SIZE, using default")
                }
            }
        }

        Ok(config)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("alumnet.db")
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir.join("storage")
    }
}

/// Platform data directory:
/// - Linux:   `~/.local/share/alumnet`
/// - macOS:   `~/Library/Application Support/org.alumnet.alumnet`
/// - Windows: `{FOLDERID_RoamingAppData}\alumnet\alumnet\data`
pub fn default_data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("org", "alumnet", "alumnet").ok_or(BackendError::NoDataDir)?;
    Ok(dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_live_under_data_dir() {
        let config = LocalBackendConfig::at("/tmp/alumnet-test");
        assert_eq!(config.database_path(), PathBuf::from("/tmp/alumnet-test/alumnet.db"));
        assert_eq!(config.storage_dir(), PathBuf::from("/tmp/alumnet-test/storage"));
        assert_eq!(config.public_url, "http://127.0.0.1:8080");
        assert_eq!(config.max_upload_size, MAX_UPLOAD_SIZE);
    }
}
