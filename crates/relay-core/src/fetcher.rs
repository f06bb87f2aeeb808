use std::sync::Arc;

use log::{debug, info, warn};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::Deserialize;
use serde_json::Value;

use crate::config::FetcherConfig;
use crate::error::{AttemptError, FetchError, RaceError, SourceFailure};
use crate::model::{MirrorSnapshot, Release};
use crate::parse::{parse_release, parse_release_page};
use crate::race::{RaceOptions, race};
use crate::registry::ProxyRegistry;

const ACCEPT_HEADER: &str = "application/vnd.github.v3+json";

/// Page size used by the single-page prerelease scan.
pub const PRERELEASE_SCAN_PAGE_SIZE: u32 = 30;
/// Page size used when listing every release to find the latest stable one.
pub const DEFAULT_PAGE_SIZE: u32 = 30;
const MAX_PAGE_SIZE: u32 = 100;

/// Characters in a tag that would end or corrupt a URL path segment. `/` is
/// left alone; the API resolves slashed tags as written.
const TAG_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// One logical releases API request, independent of the host it is sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Latest,
    Tag(String),
    Page { per_page: u32, page: u32 },
}

impl Endpoint {
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Latest => "releases/latest".to_string(),
            Self::Tag(tag) => format!("releases/tags/{}", utf8_percent_encode(tag, TAG_SEGMENT)),
            Self::Page { .. } => "releases".to_string(),
        }
    }

    #[must_use]
    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Page { per_page, page } => {
                vec![("per_page", per_page.to_string()), ("page", page.to_string())]
            }
            Self::Latest | Self::Tag(_) => Vec::new(),
        }
    }

    /// Full URL on the canonical API host, query string included.
    #[must_use]
    pub fn canonical_url(&self, api_base: &str, owner: &str, repo: &str) -> String {
        let mut url = format!(
            "{}/repos/{owner}/{repo}/{}",
            api_base.trim_end_matches('/'),
            self.path()
        );
        let query = self.query();
        if !query.is_empty() {
            let pairs: Vec<String> = query
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            url.push('?');
            url.push_str(&pairs.join("&"));
        }
        url
    }

    fn operation(&self) -> &'static str {
        match self {
            Self::Latest => "latest release",
            Self::Tag(_) => "release by tag",
            Self::Page { .. } => "release listing",
        }
    }
}

/// A raw JSON body plus where it came from.
struct Fetched {
    body: Value,
    source_url: String,
    mirrors: MirrorSnapshot,
}

/// Resolves release metadata through racing mirrors or a direct request.
#[derive(Debug, Clone)]
pub struct ReleaseFetcher {
    client: reqwest::Client,
    config: FetcherConfig,
    registry: Option<Arc<ProxyRegistry>>,
}

impl ReleaseFetcher {
    /// Validate `config`, build the HTTP client and, when racing is enabled,
    /// initialize a mirror registry.
    ///
    /// # Errors
    /// Returns an error when the configuration is invalid or the HTTP client
    /// cannot be built. Mirror-list failures are not errors.
    pub async fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        config.validate()?;
        let client = build_client(&config)?;
        let registry = if config.use_proxy {
            Some(Arc::new(ProxyRegistry::initialize(&client, &config).await))
        } else {
            None
        };
        Ok(Self {
            client,
            config,
            registry,
        })
    }

    /// Build a fetcher around an existing registry, skipping mirror-list
    /// bootstrap. The registry is ignored when `config.use_proxy` is false.
    ///
    /// # Errors
    /// Returns an error when the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn with_registry(
        config: FetcherConfig,
        registry: Arc<ProxyRegistry>,
    ) -> Result<Self, FetchError> {
        config.validate()?;
        let client = build_client(&config)?;
        let registry = config.use_proxy.then_some(registry);
        Ok(Self {
            client,
            config,
            registry,
        })
    }

    #[must_use]
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> Option<&Arc<ProxyRegistry>> {
        self.registry.as_ref()
    }

    /// Fetch the repository's latest published release.
    ///
    /// # Errors
    /// Returns [`FetchError::ExhaustedSources`] when no source answered, or
    /// [`FetchError::Parse`] when the winning body is not a release.
    pub async fn latest_release(&self, owner: &str, repo: &str) -> Result<Release, FetchError> {
        info!("Fetching latest release of {owner}/{repo}");
        let endpoint = Endpoint::Latest;
        let fetched = self
            .fetch(&endpoint, owner, repo)
            .await
            .map_err(|race| FetchError::exhausted(endpoint.operation(), race))?;
        parse_single(&endpoint, owner, repo, &fetched)
    }

    /// Fetch the release for `tag`.
    ///
    /// # Errors
    /// Returns [`FetchError::NotFound`] when a reachable source answered 404,
    /// [`FetchError::ExhaustedSources`] when no source answered at all, or
    /// [`FetchError::Parse`] when the winning body is not a release.
    pub async fn release_by_tag(
        &self,
        owner: &str,
        repo: &str,
        tag: &str,
    ) -> Result<Release, FetchError> {
        info!("Fetching release {owner}/{repo}@{tag}");
        let endpoint = Endpoint::Tag(tag.to_string());
        let fetched = self.fetch(&endpoint, owner, repo).await.map_err(|race| {
            if race.failures().iter().any(|f| f.error.is_not_found()) {
                FetchError::NotFound {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                    tag: tag.to_string(),
                }
            } else {
                FetchError::exhausted(endpoint.operation(), race)
            }
        })?;
        parse_single(&endpoint, owner, repo, &fetched)
    }

    /// Return the first non-draft prerelease on the newest page of releases,
    /// or the newest release when that page has none. Older pages are never
    /// consulted.
    ///
    /// # Errors
    /// Returns [`FetchError::NoReleases`] when the page is empty, otherwise
    /// the same errors as [`ReleaseFetcher::latest_release`].
    pub async fn latest_prerelease(&self, owner: &str, repo: &str) -> Result<Release, FetchError> {
        info!("Scanning newest releases of {owner}/{repo} for a prerelease");
        let releases = self
            .fetch_page(owner, repo, PRERELEASE_SCAN_PAGE_SIZE, 1)
            .await?;
        pick_prerelease(releases).ok_or_else(|| FetchError::NoReleases {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    /// Fetch every release, page by page, until a short page signals the end.
    /// `page_size` is clamped to the API's 1..=100 range.
    ///
    /// # Errors
    /// Returns the first page failure; no partial listing is returned. A page
    /// that starts with the same release as the page before it (a source
    /// ignoring the query string) is [`FetchError::RepeatedPage`].
    pub async fn list_releases(
        &self,
        owner: &str,
        repo: &str,
        page_size: u32,
    ) -> Result<Vec<Release>, FetchError> {
        let per_page = page_size.clamp(1, MAX_PAGE_SIZE);
        info!("Listing releases of {owner}/{repo} ({per_page} per page)");

        let mut releases: Vec<Release> = Vec::new();
        let mut previous_first: Option<String> = None;
        let mut page = 1;
        loop {
            let batch = self.fetch_page(owner, repo, per_page, page).await?;
            let first = batch.first().map(|release| release.tag_name.clone());
            if first.is_some() && first == previous_first {
                warn!("Page {page} of {owner}/{repo} repeats page {}", page - 1);
                return Err(FetchError::RepeatedPage {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                    page,
                });
            }
            previous_first = first;
            let last_page = batch.len() < per_page as usize;
            debug!("Page {page} of {owner}/{repo} held {} release(s)", batch.len());
            releases.extend(batch);
            if last_page {
                break;
            }
            page += 1;
        }
        Ok(releases)
    }

    /// The most recently published release that is neither a prerelease nor
    /// a draft, searched across every page.
    ///
    /// # Errors
    /// Returns [`FetchError::NoReleases`] when no stable release exists, or
    /// any listing error.
    pub async fn latest_stable_release(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Release, FetchError> {
        let releases = self.list_releases(owner, repo, DEFAULT_PAGE_SIZE).await?;
        releases
            .into_iter()
            .filter(Release::is_stable)
            .max_by(|a, b| a.published_at.cmp(&b.published_at))
            .ok_or_else(|| FetchError::NoReleases {
                owner: owner.to_string(),
                repo: repo.to_string(),
            })
    }

    async fn fetch_page(
        &self,
        owner: &str,
        repo: &str,
        per_page: u32,
        page: u32,
    ) -> Result<Vec<Release>, FetchError> {
        let endpoint = Endpoint::Page { per_page, page };
        let fetched = self
            .fetch(&endpoint, owner, repo)
            .await
            .map_err(|race| FetchError::exhausted(endpoint.operation(), race))?;
        parse_release_page(owner, repo, &fetched.body, &fetched.mirrors)
            .map_err(|e| FetchError::parse(endpoint.operation(), fetched.source_url, e))
    }

    async fn fetch(
        &self,
        endpoint: &Endpoint,
        owner: &str,
        repo: &str,
    ) -> Result<Fetched, RaceError> {
        let canonical = endpoint.canonical_url(&self.config.api_base, owner, repo);
        match &self.registry {
            Some(registry) => self.fetch_raced(registry, &canonical).await,
            None => self.fetch_direct(&canonical).await,
        }
    }

    async fn fetch_direct(&self, url: &str) -> Result<Fetched, RaceError> {
        debug!("Requesting {url} directly");
        match get_json(&self.client, url, self.config.direct_timeout).await {
            Ok(body) => Ok(Fetched {
                body,
                source_url: url.to_string(),
                mirrors: MirrorSnapshot::default(),
            }),
            Err(error) => {
                warn!("Direct request to {url} failed: {error}");
                Err(RaceError::Exhausted {
                    failures: vec![SourceFailure {
                        source_url: url.to_string(),
                        error,
                    }],
                })
            }
        }
    }

    async fn fetch_raced(
        &self,
        registry: &ProxyRegistry,
        canonical: &str,
    ) -> Result<Fetched, RaceError> {
        let candidates = registry.ordered_candidates();
        debug!(
            "Racing {canonical} across {} mirror(s), {} at a time",
            candidates.len(),
            self.config.max_workers
        );

        let options = RaceOptions {
            capacity: self.config.max_workers,
            per_candidate_timeout: self.config.request_timeout,
            overall_timeout: self.config.operation_timeout,
        };
        let client = &self.client;
        let timeout = self.config.request_timeout;

        let outcome = race(&candidates, options, |mirror| {
            let url = format!("{mirror}{canonical}");
            async move { get_json(client, &url, timeout).await }
        })
        .await;

        match outcome {
            Ok(win) => {
                registry.mark_successful(&win.winner);
                Ok(Fetched {
                    body: win.value,
                    source_url: format!("{}{canonical}", win.winner),
                    mirrors: registry.snapshot(),
                })
            }
            Err(error) => {
                warn!("Every mirror failed for {canonical}: {error}");
                Err(error)
            }
        }
    }
}

fn build_client(config: &FetcherConfig) -> Result<reqwest::Client, FetchError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static(ACCEPT_HEADER),
    );

    reqwest::Client::builder()
        .default_headers(headers)
        .user_agent(config.user_agent.clone())
        .danger_accept_invalid_certs(config.ignore_tls_errors)
        .build()
        .map_err(FetchError::ClientBuild)
}

async fn get_json(
    client: &reqwest::Client,
    url: &str,
    timeout: std::time::Duration,
) -> Result<Value, AttemptError> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(AttemptError::transport_from)?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        let body = response.bytes().await.unwrap_or_default();
        return Err(if is_api_not_found(&body) {
            AttemptError::NotFound
        } else {
            AttemptError::HttpStatus(status)
        });
    }
    if !status.is_success() {
        return Err(AttemptError::HttpStatus(status));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(AttemptError::transport_from)?;
    serde_json::from_slice(&bytes).map_err(|e| AttemptError::Body(e.to_string()))
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

/// The API's 404 body is `{"message": "Not Found", ...}`; mirrors that fail
/// on their own answer with HTML or nothing.
fn is_api_not_found(body: &[u8]) -> bool {
    serde_json::from_slice::<ApiError>(body).is_ok_and(|error| error.message == "Not Found")
}

fn parse_single(
    endpoint: &Endpoint,
    owner: &str,
    repo: &str,
    fetched: &Fetched,
) -> Result<Release, FetchError> {
    parse_release(owner, repo, &fetched.body, &fetched.mirrors)
        .map_err(|e| FetchError::parse(endpoint.operation(), fetched.source_url.clone(), e))
}

fn pick_prerelease(releases: Vec<Release>) -> Option<Release> {
    let index = releases
        .iter()
        .position(|release| release.prerelease && !release.draft)
        .unwrap_or(0);
    releases.into_iter().nth(index)
}
