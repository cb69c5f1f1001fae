use thiserror::Error;

/// 1 GiB
pub const DEFAULT_QUOTA_BYTES: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub storage: StorageConfig,
    pub quota: QuotaConfig,
    /// Public base URL of this service, used to build share links
    pub public_url: String,
    /// Enables dangerous operations like purge. Must never be true in production.
    pub test_mode: bool,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding blobs
    pub local_storage_path: String,
}

#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// Quota ceiling for users without an explicit one
    pub default_total_space: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            data_dir: "./data".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_storage_path: "./files".to_string(),
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            default_total_space: DEFAULT_QUOTA_BYTES,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let local_storage_path =
            std::env::var("LOCAL_STORAGE_PATH").unwrap_or_else(|_| "./files".to_string());

        let default_total_space = std::env::var("DEFAULT_QUOTA_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_QUOTA_BYTES);

        let public_url =
            std::env::var("PUBLIC_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

        let test_mode = std::env::var("TEST_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50 * 1024 * 1024); // 50MB

        let config = Config {
            node: NodeConfig {
                bind_address,
                data_dir,
            },
            storage: StorageConfig { local_storage_path },
            quota: QuotaConfig {
                default_total_space,
            },
            public_url,
            test_mode,
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.public_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "PUBLIC_URL cannot be empty".to_string(),
            ));
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.quota.default_total_space == 0 {
            tracing::warn!("DEFAULT_QUOTA_BYTES is 0; new users will not be able to upload");
        }

        Ok(())
    }
}
