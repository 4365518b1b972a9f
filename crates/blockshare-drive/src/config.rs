//! Drive configuration.
//!
//! Defaults, then an optional TOML file, then `BLOCKSHARE_*` environment
//! variables (after loading `.env` if present).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use blockshare_core::{DriveError, NetworkDescriptor};
use blockshare_storage::{CompressionPolicy, PINATA_PIN_FILE_URL, PinataConfig, PinataCredentials};

use crate::gallery::DEFAULT_GATEWAY_URL;

pub const ENV_CONTRACT_ADDRESS: &str = "BLOCKSHARE_CONTRACT_ADDRESS";
pub const ENV_PINATA_JWT: &str = "BLOCKSHARE_PINATA_JWT";
pub const ENV_PINATA_API_KEY: &str = "BLOCKSHARE_PINATA_API_KEY";
pub const ENV_PINATA_SECRET_KEY: &str = "BLOCKSHARE_PINATA_SECRET_KEY";
pub const ENV_RPC_URL: &str = "BLOCKSHARE_RPC_URL";
pub const ENV_PRIVATE_KEY: &str = "BLOCKSHARE_PRIVATE_KEY";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("invalid config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

impl From<ConfigError> for DriveError {
    fn from(e: ConfigError) -> Self {
        DriveError::Unknown(e.to_string())
    }
}

/// Which network the registry contract lives on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkPreset {
    /// Local Hardhat node, chain 31337.
    #[default]
    Hardhat,
    Sepolia,
}

impl NetworkPreset {
    pub fn descriptor(&self) -> NetworkDescriptor {
        match self {
            Self::Hardhat => NetworkDescriptor::hardhat_local(),
            Self::Sepolia => NetworkDescriptor::sepolia(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinataSettings {
    pub endpoint: String,
    pub jwt: Option<String>,
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
}

impl Default for PinataSettings {
    fn default() -> Self {
        Self {
            endpoint: PINATA_PIN_FILE_URL.to_string(),
            jwt: None,
            api_key: None,
            secret_key: None,
        }
    }
}

impl PinataSettings {
    pub fn credentials(&self) -> Option<PinataCredentials> {
        PinataCredentials::from_parts(
            self.jwt.clone(),
            self.api_key.clone(),
            self.secret_key.clone(),
        )
    }

    /// Client configuration; missing credentials surface on the first pin.
    pub fn client_config(&self) -> PinataConfig {
        let config = PinataConfig::default().with_endpoint(self.endpoint.clone());
        match self.credentials() {
            Some(credentials) => config.with_credentials(credentials),
            None => config,
        }
    }
}

/// Everything needed to wire a [`Drive`](crate::Drive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub network: NetworkPreset,
    /// Overrides the preset's RPC endpoint.
    pub rpc_url: Option<String>,
    /// Registry contract; checked for format when the gateway is built.
    pub contract_address: Option<String>,
    /// Key for the headless wallet.
    pub private_key: Option<String>,
    pub pinata: PinataSettings,
    /// Content gateway used to dereference pointers.
    pub gateway_url: String,
    /// Account backend base URL.
    pub auth_url: String,
    /// Directory for the client state database.
    pub data_dir: PathBuf,
    pub compression: CompressionPolicy,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            network: NetworkPreset::default(),
            rpc_url: None,
            contract_address: None,
            private_key: None,
            pinata: PinataSettings::default(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            auth_url: blockshare_auth::DEFAULT_AUTH_BASE_URL.to_string(),
            data_dir: PathBuf::from(".blockshare"),
            compression: CompressionPolicy::default(),
        }
    }
}

impl DriveConfig {
    pub fn hardhat() -> Self {
        Self::default()
    }

    pub fn sepolia() -> Self {
        Self {
            network: NetworkPreset::Sepolia,
            ..Self::default()
        }
    }

    pub fn with_contract_address(mut self, address: impl Into<String>) -> Self {
        self.contract_address = Some(address.into());
        self
    }

    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    pub fn with_pinata_jwt(mut self, jwt: impl Into<String>) -> Self {
        self.pinata.jwt = Some(jwt.into());
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Load `path` (or defaults when `None`), then apply the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Ok(env_file) = dotenvy::dotenv() {
            debug!(path = %env_file.display(), "Loaded .env");
        }
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.merge_with_env();
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn merge_with_env(&mut self) {
        self.merge_with_vars(|key| std::env::var(key).ok());
    }

    /// Apply `BLOCKSHARE_*` overrides from `lookup`. Empty values are ignored.
    pub fn merge_with_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get(ENV_CONTRACT_ADDRESS) {
            self.contract_address = Some(v);
        }
        if let Some(v) = get(ENV_PINATA_JWT) {
            self.pinata.jwt = Some(v);
        }
        if let Some(v) = get(ENV_PINATA_API_KEY) {
            self.pinata.api_key = Some(v);
        }
        if let Some(v) = get(ENV_PINATA_SECRET_KEY) {
            self.pinata.secret_key = Some(v);
        }
        if let Some(v) = get(ENV_RPC_URL) {
            self.rpc_url = Some(v);
        }
        if let Some(v) = get(ENV_PRIVATE_KEY) {
            self.private_key = Some(v);
        }
    }

    /// The required network, with the RPC override applied.
    pub fn network_descriptor(&self) -> NetworkDescriptor {
        let descriptor = self.network.descriptor();
        match &self.rpc_url {
            Some(url) => descriptor.with_rpc_url(url.clone()),
            None => descriptor,
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("client.redb")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use blockshare_core::ChainId;

    #[test]
    fn test_toml_overrides_defaults() {
        let config: DriveConfig = toml::from_str(
            r#"
            network = "sepolia"
            contract_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"

            [pinata]
            jwt = "file-jwt"

            [compression]
            max_dimension = 1024
            "#,
        )
        .unwrap();

        assert_eq!(config.network, NetworkPreset::Sepolia);
        assert_eq!(config.network_descriptor().chain_id, ChainId(11_155_111));
        assert_eq!(config.pinata.endpoint, PINATA_PIN_FILE_URL);
        assert_eq!(config.compression.max_dimension, 1024);
        assert_eq!(config.compression.threshold_bytes, 1024 * 1024);
        assert_eq!(config.gateway_url, DEFAULT_GATEWAY_URL);
    }

    #[test]
    fn test_env_overrides_file() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_PINATA_JWT, "env-jwt"),
            (ENV_RPC_URL, "http://10.0.0.2:8545"),
            (ENV_CONTRACT_ADDRESS, "  "),
        ]);
        let mut config = DriveConfig::hardhat()
            .with_pinata_jwt("file-jwt")
            .with_contract_address("0xabc");
        config.merge_with_vars(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.pinata.jwt.as_deref(), Some("env-jwt"));
        assert_eq!(config.contract_address.as_deref(), Some("0xabc"));
        assert_eq!(
            config.network_descriptor().primary_rpc_url(),
            Some("http://10.0.0.2:8545")
        );
        assert_eq!(config.network_descriptor().chain_id, ChainId(31337));
    }

    #[test]
    fn test_pinata_credentials_from_settings() {
        let mut settings = PinataSettings::default();
        assert!(settings.credentials().is_none());
        assert!(settings.client_config().credentials.is_none());

        settings.api_key = Some("key".into());
        settings.secret_key = Some("secret".into());
        assert!(matches!(
            settings.credentials(),
            Some(PinataCredentials::KeyPair { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = DriveConfig::load_from_file(Path::new("/nonexistent/blockshare.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
