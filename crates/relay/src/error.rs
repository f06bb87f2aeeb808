use std::process::ExitCode;

use relay_core::FetchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to render output: {0}")]
    Render(#[from] serde_json::Error),

    #[error("settings error: {0}")]
    Settings(String),
}

impl CliError {
    /// 2 when the release does not exist, 3 when every source was down and a
    /// retry may succeed, 1 otherwise.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Fetch(error) if error.is_not_found() => ExitCode::from(2),
            Self::Fetch(error) if error.is_retryable() => ExitCode::from(3),
            _ => ExitCode::FAILURE,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::process::ExitCode;

    use relay_core::{ConfigError, FetchError};

    use super::CliError;

    #[test]
    fn exit_codes_follow_error_kind() {
        let not_found = CliError::Fetch(FetchError::NotFound {
            owner: "o".to_string(),
            repo: "r".to_string(),
            tag: "v9".to_string(),
        });
        let exhausted = CliError::Fetch(FetchError::ExhaustedSources {
            operation: "latest release",
            failures: Vec::new(),
            deadline_exceeded: true,
        });
        let config = CliError::Fetch(FetchError::Config(ConfigError::NoWorkers));

        assert_eq!(not_found.exit_code(), ExitCode::from(2));
        assert_eq!(exhausted.exit_code(), ExitCode::from(3));
        assert_eq!(config.exit_code(), ExitCode::FAILURE);
        assert_eq!(
            CliError::Settings("x".to_string()).exit_code(),
            ExitCode::FAILURE
        );
    }
}
