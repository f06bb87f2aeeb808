use std::time::Duration;

use thiserror::Error;

/// Why a single candidate failed inside a race. Never surfaced on its own;
/// collected into [`FetchError::ExhaustedSources`] for diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {0}")]
    HttpStatus(reqwest::StatusCode),

    /// A 404 carrying the API's own error body, so the origin itself
    /// answered. A bare 404 from a mirror is an [`AttemptError::HttpStatus`].
    #[error("HTTP 404 Not Found (reported by the API)")]
    NotFound,

    #[error("unreadable response body: {0}")]
    Body(String),

    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl AttemptError {
    pub fn transport_from<E>(error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::Transport(error.to_string())
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source_url: String,
    pub error: AttemptError,
}

impl std::fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.source_url, self.error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RaceError {
    #[error("no candidates to race")]
    NoCandidates,

    #[error("all {} candidate(s) failed", .failures.len())]
    Exhausted { failures: Vec<SourceFailure> },

    #[error(
        "race abandoned after {}ms with {} failure(s)",
        .elapsed.as_millis(),
        .failures.len()
    )]
    DeadlineExceeded {
        elapsed: Duration,
        failures: Vec<SourceFailure>,
    },
}

impl RaceError {
    #[must_use]
    pub fn failures(&self) -> &[SourceFailure] {
        match self {
            Self::NoCandidates => &[],
            Self::Exhausted { failures } | Self::DeadlineExceeded { failures, .. } => failures,
        }
    }

    #[must_use]
    pub fn into_failures(self) -> Vec<SourceFailure> {
        match self {
            Self::NoCandidates => Vec::new(),
            Self::Exhausted { failures } | Self::DeadlineExceeded { failures, .. } => failures,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("worker capacity must be at least 1")]
    NoWorkers,

    #[error(
        "per-candidate timeout ({}ms) must be shorter than the operation timeout ({}ms)",
        .request.as_millis(),
        .operation.as_millis()
    )]
    CandidateTimeoutTooLong {
        request: Duration,
        operation: Duration,
    },

    #[error("{field} must be an http(s) URL, got {value:?}")]
    InvalidUrl { field: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("release {tag} not found in {owner}/{repo}")]
    NotFound {
        owner: String,
        repo: String,
        tag: String,
    },

    #[error(
        "no successful source for {operation} ({})",
        describe_failures(.failures, .deadline_exceeded)
    )]
    ExhaustedSources {
        operation: &'static str,
        failures: Vec<SourceFailure>,
        deadline_exceeded: bool,
    },

    #[error("failed to parse {operation} response from {source_url}: {details}")]
    Parse {
        operation: &'static str,
        source_url: String,
        details: String,
    },

    #[error("page {page} of {owner}/{repo} repeats the previous page; the source ignored the page query")]
    RepeatedPage {
        owner: String,
        repo: String,
        page: u32,
    },

    #[error("no releases published for {owner}/{repo}")]
    NoReleases { owner: String, repo: String },

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl FetchError {
    pub(crate) fn parse(
        operation: &'static str,
        source_url: impl Into<String>,
        details: impl std::fmt::Display,
    ) -> Self {
        Self::Parse {
            operation,
            source_url: source_url.into(),
            details: details.to_string(),
        }
    }

    pub(crate) fn exhausted(operation: &'static str, race: RaceError) -> Self {
        let deadline_exceeded = matches!(race, RaceError::DeadlineExceeded { .. });
        Self::ExhaustedSources {
            operation,
            failures: race.into_failures(),
            deadline_exceeded,
        }
    }

    /// The requested release definitively does not exist (or the repository
    /// has no releases at all). Retrying will not help.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::NoReleases { .. })
    }

    /// Every source was unavailable; the caller may try again later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExhaustedSources { .. })
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn describe_failures(failures: &[SourceFailure], deadline_exceeded: &bool) -> String {
    let mut text = if failures.is_empty() {
        "no source answered".to_string()
    } else {
        failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    };
    if *deadline_exceeded {
        text.push_str("; deadline exceeded");
    }
    text
}
