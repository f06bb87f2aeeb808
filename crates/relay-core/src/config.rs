use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_SEED_MIRROR: &str = "https://gh-proxy.org/";
pub const DEFAULT_MIRROR_LIST_URL: &str = "https://api.akams.cn/github";

const DEFAULT_MAX_WORKERS: usize = 3;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(8);
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_DIRECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MIRROR_LIST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Race requests across forwarding mirrors instead of calling the API
    /// host directly.
    pub use_proxy: bool,
    pub ignore_tls_errors: bool,
    /// Upper bound on candidates in flight at once during a race.
    pub max_workers: usize,
    /// Budget for one candidate; must be shorter than `operation_timeout`.
    pub request_timeout: Duration,
    /// Budget for a whole raced call.
    pub operation_timeout: Duration,
    /// Budget for the single request made when racing is disabled.
    pub direct_timeout: Duration,
    pub api_base: String,
    pub seed_mirror: String,
    /// Optional service listing extra mirrors; `None` keeps only the seed.
    pub mirror_list_url: Option<String>,
    pub mirror_list_timeout: Duration,
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            use_proxy: true,
            ignore_tls_errors: false,
            max_workers: DEFAULT_MAX_WORKERS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            direct_timeout: DEFAULT_DIRECT_TIMEOUT,
            api_base: DEFAULT_API_BASE.to_string(),
            seed_mirror: DEFAULT_SEED_MIRROR.to_string(),
            mirror_list_url: Some(DEFAULT_MIRROR_LIST_URL.to_string()),
            mirror_list_timeout: DEFAULT_MIRROR_LIST_TIMEOUT,
            user_agent: format!("relay/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl FetcherConfig {
    /// A configuration that talks to the API host directly.
    #[must_use]
    pub fn direct() -> Self {
        Self {
            use_proxy: false,
            mirror_list_url: None,
            ..Self::default()
        }
    }

    /// Check the invariants the racer relies on.
    ///
    /// # Errors
    /// Returns an error when the worker capacity is zero, the per-candidate
    /// timeout is not strictly shorter than the operation timeout, or a base
    /// URL is not http(s).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.request_timeout >= self.operation_timeout {
            return Err(ConfigError::CandidateTimeoutTooLong {
                request: self.request_timeout,
                operation: self.operation_timeout,
            });
        }
        require_http("api_base", &self.api_base)?;
        require_http("seed_mirror", &self.seed_mirror)?;
        if let Some(url) = &self.mirror_list_url {
            require_http("mirror_list_url", url)?;
        }
        Ok(())
    }
}

fn require_http(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("https://") || value.starts_with("http://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::FetcherConfig;
    use crate::error::ConfigError;

    #[test]
    fn defaults_are_valid() {
        let config = FetcherConfig::default();

        assert!(config.use_proxy);
        assert!(!config.ignore_tls_errors);
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(8));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn direct_config_disables_racing_and_bootstrap() {
        let config = FetcherConfig::direct();

        assert!(!config.use_proxy);
        assert!(config.mirror_list_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_workers() {
        let config = FetcherConfig {
            max_workers: 0,
            ..FetcherConfig::default()
        };

        assert_eq!(config.validate(), Err(ConfigError::NoWorkers));
    }

    #[test]
    fn rejects_candidate_timeout_not_shorter_than_operation() {
        let config = FetcherConfig {
            request_timeout: Duration::from_secs(20),
            operation_timeout: Duration::from_secs(20),
            ..FetcherConfig::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::CandidateTimeoutTooLong { .. })
        ));
    }

    #[test]
    fn rejects_non_http_base() {
        let config = FetcherConfig {
            api_base: "ftp://api.example".to_string(),
            ..FetcherConfig::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl {
                field: "api_base",
                ..
            })
        ));
    }
}
