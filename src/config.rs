use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use wallet_keystore::KdfParams;

use crate::app_dir::{ENV_FILE, KEYSTORE_FILE, data_file};
use crate::backend::{LocalWallet, WalletBackends};
use crate::error::WalletError;

/// Prefix of all configuration environment variables, eg. `WALLET_KEYSTORE_PATH`.
pub const ENV_PREFIX: &str = "WALLET_";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Keystore file of the local backend; defaults to `keystore.json` in the user data dir
    pub keystore_path: Option<PathBuf>,
    /// Whether the local keystore backend is configured at all
    #[serde(default = "default_local_enabled")]
    pub local_enabled: bool,
    /// `tracing` filter directives, eg. `wallet_router=debug`
    pub log_filter: Option<String>,
    /// Log to this file instead of stderr
    pub log_file: Option<PathBuf>,
    /// Argon2 memory cost in KiB, used when creating a keystore
    pub kdf_memory_kib: Option<u32>,
    /// Argon2 iterations, used when creating a keystore
    pub kdf_iterations: Option<u32>,
    /// Argon2 parallelism, used when creating a keystore
    pub kdf_parallelism: Option<u32>,
}

fn default_local_enabled() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keystore_path: None,
            local_enabled: default_local_enabled(),
            log_filter: None,
            log_file: None,
            kdf_memory_kib: None,
            kdf_iterations: None,
            kdf_parallelism: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0}")]
    LoadError(String),
    #[error("Cannot determine keystore location: {0}")]
    KeystorePath(String),
}

impl Config {
    /// Loads the configuration from the environment, after reading the `.env` file from the
    /// user data directory if there is one. Variables already set in the environment win.
    pub fn load() -> Result<Self, ConfigError> {
        match data_file(ENV_FILE) {
            Ok(env_file_path) => {
                if let Err(err) = dotenvy::from_path(&env_file_path) {
                    tracing::debug!(
                        ?err,
                        path = ?env_file_path,
                        "No .env file loaded. Continuing with environment variables."
                    );
                } else {
                    tracing::info!(path = ?env_file_path, "Successfully loaded .env file");
                }
            }
            Err(err) => {
                tracing::warn!(?err, "Cannot locate .env file");
            }
        }

        envy::prefixed(ENV_PREFIX)
            .from_env::<Config>()
            .map_err(|e| ConfigError::LoadError(e.to_string()))
    }

    /// Builds the configuration from explicit `(name, value)` pairs, as if they were the
    /// process environment.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX)
            .from_iter(vars)
            .map_err(|e| ConfigError::LoadError(e.to_string()))
    }

    pub fn keystore_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.keystore_path {
            Some(path) => Ok(path.clone()),
            None => data_file(KEYSTORE_FILE)
                .map_err(|e| ConfigError::KeystorePath(e.to_string())),
        }
    }

    /// KDF settings for new keystores; unset values fall back to the Argon2 defaults.
    pub fn kdf_params(&self) -> KdfParams {
        let defaults = KdfParams::default();
        KdfParams {
            memory_kib: self.kdf_memory_kib.unwrap_or(defaults.memory_kib),
            iterations: self.kdf_iterations.unwrap_or(defaults.iterations),
            parallelism: self.kdf_parallelism.unwrap_or(defaults.parallelism),
        }
    }

    /// Opens the configured backends.
    ///
    /// Only the local keystore can be configured here; remote and hardware backends are
    /// attached by embedding applications through [`WalletBackends`].
    pub fn open_backends(&self) -> Result<WalletBackends, WalletError> {
        let mut backends = WalletBackends::new();
        if self.local_enabled {
            let path = self.keystore_path().map_err(WalletError::backend)?;
            tracing::debug!(path = ?path, "opening local keystore");
            backends = backends.with_local(Arc::new(LocalWallet::open(&path, self.kdf_params())?));
        }
        Ok(backends)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_vars(vars(&[])).expect("empty config should load");
        assert!(config.local_enabled);
        assert!(config.keystore_path.is_none());
        assert_eq!(config.kdf_params(), KdfParams::default());
    }

    #[test]
    fn test_config_from_prefixed_vars() {
        let config = Config::from_vars(vars(&[
            ("WALLET_KEYSTORE_PATH", "/tmp/keys.json"),
            ("WALLET_LOCAL_ENABLED", "false"),
            ("WALLET_KDF_ITERATIONS", "3"),
            ("OTHER_LOG_FILTER", "ignored"),
        ]))
        .expect("config should load");

        assert_eq!(config.keystore_path, Some(PathBuf::from("/tmp/keys.json")));
        assert!(!config.local_enabled);
        assert!(config.log_filter.is_none());
        assert_eq!(config.kdf_params().iterations, 3);
    }

    #[test]
    fn test_config_rejects_bad_numbers() {
        let result = Config::from_vars(vars(&[("WALLET_KDF_MEMORY_KIB", "lots")]));
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }

    #[test]
    fn test_open_backends_without_local() {
        let config = Config {
            local_enabled: false,
            ..Config::default()
        };
        let backends = config.open_backends().expect("no backends to open");
        assert!(backends.local.is_none());
    }

    #[test]
    fn test_open_backends_with_local_keystore() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config {
            keystore_path: Some(temp_dir.path().join("keystore.json")),
            kdf_memory_kib: Some(64),
            kdf_iterations: Some(1),
            ..Config::default()
        };
        let backends = config.open_backends().expect("open local keystore");
        assert!(backends.local.is_some());
        assert!(temp_dir.path().join("keystore.json").exists());
    }
}
