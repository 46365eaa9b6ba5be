//! Server configuration loaded from environment variables.

use std::net::SocketAddr;

use alumnet_shared::constants::{APP_NAME, DEFAULT_HTTP_PORT};
use alumnet_store::{BackendError, LocalBackendConfig, ObjectStorage};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP API.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Human-readable name reported by `/info`.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Alumnet"`
    pub instance_name: String,

    /// Data directory shared with the local backend
    /// (`ALUMNET_DATA_DIR`, `ALUMNET_PUBLIC_URL`, `ALUMNET_MAX_UPLOAD_SIZE`).
    pub backend: LocalBackendConfig,
}

impl ServerConfig {
    pub fn new(backend: LocalBackendConfig) -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            instance_name: APP_NAME.to_string(),
            backend,
        }
    }

    /// Load configuration from environment variables, falling back to
    /// defaults. Fails only when no data directory can be determined.
    pub fn from_env() -> Result<Self, BackendError> {
        let mut config = Self::new(LocalBackendConfig::from_env()?);

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Ok(name) = std::env::var("INSTANCE_NAME") {
            if !name.trim().is_empty() {
                config.instance_name = name;
            }
        }

        Ok(config)
    }

    /// The object store the local backend writes uploads to.
    pub fn storage(&self) -> ObjectStorage {
        ObjectStorage::new(
            self.backend.storage_dir(),
            &self.backend.public_url,
            self.backend.max_upload_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_listen_on_the_public_url_port() {
        let config = ServerConfig::new(LocalBackendConfig::at("/tmp/alumnet-server-test"));
        assert_eq!(config.http_addr.port(), 8080);
        assert_eq!(config.instance_name, "Alumnet");
        assert_eq!(
            config.storage().root(),
            std::path::Path::new("/tmp/alumnet-server-test/storage")
        );
    }
}
