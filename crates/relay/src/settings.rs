use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use relay_core::{DEFAULT_API_BASE, DEFAULT_MIRROR_LIST_URL, DEFAULT_SEED_MIRROR, FetcherConfig};
use relay_platform::AppPaths;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed settings file {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelaySettings {
    #[serde(default = "default_true")]
    pub use_proxy: bool,

    #[serde(default)]
    pub ignore_tls_errors: bool,

    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,

    #[serde(default = "default_direct_timeout")]
    pub direct_timeout_secs: u64,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_seed_mirror")]
    pub seed_mirror: String,

    #[serde(default = "default_mirror_list_url")]
    pub mirror_list_url: Option<String>,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,
}

/// Command-line switches that take precedence over the settings file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub direct: bool,
    pub insecure: bool,
    pub workers: Option<usize>,
}

fn default_true() -> bool {
    true
}

fn default_max_workers() -> usize {
    3
}

fn default_request_timeout() -> u64 {
    8
}

fn default_operation_timeout() -> u64 {
    20
}

fn default_direct_timeout() -> u64 {
    30
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_seed_mirror() -> String {
    DEFAULT_SEED_MIRROR.to_string()
}

#[allow(clippy::unnecessary_wraps)]
fn default_mirror_list_url() -> Option<String> {
    Some(DEFAULT_MIRROR_LIST_URL.to_string())
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            use_proxy: true,
            ignore_tls_errors: false,
            max_workers: default_max_workers(),
            request_timeout_secs: default_request_timeout(),
            operation_timeout_secs: default_operation_timeout(),
            direct_timeout_secs: default_direct_timeout(),
            api_base: default_api_base(),
            seed_mirror: default_seed_mirror(),
            mirror_list_url: default_mirror_list_url(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
        }
    }
}

impl RelaySettings {
    /// Read settings from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SettingsError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Settings from the per-user settings file, or the defaults when there
    /// is no usable file. The error is handed back so the caller can report
    /// it once logging is up.
    pub fn load(paths: Option<&AppPaths>) -> (Self, Option<SettingsError>) {
        match paths.map(|paths| Self::load_from(&paths.settings_file())) {
            Some(Ok(settings)) => (settings, None),
            Some(Err(error)) => (Self::default(), Some(error)),
            None => (Self::default(), None),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn fetcher_config(&self, overrides: Overrides) -> FetcherConfig {
        let mut config = FetcherConfig {
            use_proxy: self.use_proxy,
            ignore_tls_errors: self.ignore_tls_errors,
            max_workers: self.max_workers,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            operation_timeout: Duration::from_secs(self.operation_timeout_secs),
            direct_timeout: Duration::from_secs(self.direct_timeout_secs),
            api_base: self.api_base.clone(),
            seed_mirror: self.seed_mirror.clone(),
            mirror_list_url: self.mirror_list_url.clone(),
            ..FetcherConfig::default()
        };

        if overrides.direct {
            config.use_proxy = false;
            config.mirror_list_url = None;
        }
        if overrides.insecure {
            config.ignore_tls_errors = true;
        }
        if let Some(workers) = overrides.workers {
            config.max_workers = workers;
        }
        config
    }
}
