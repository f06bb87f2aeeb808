use std::sync::Arc;

use serde::Serialize;

/// Host every release download URL must resolve to.
pub const CANONICAL_DOWNLOAD_ORIGIN: &str = "https://github.com/";

/// Mirror base URLs in the affinity order that was current when a release
/// was parsed. Empty when the release was fetched without mirrors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorSnapshot(Arc<[String]>);

impl MirrorSnapshot {
    #[must_use]
    pub fn new(mirrors: Vec<String>) -> Self {
        Self(mirrors.into())
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    pub name: String,
    pub size: u64,
    pub download_url: String,
    pub content_type: String,
    pub download_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip)]
    pub(crate) mirrors: MirrorSnapshot,
}

impl Asset {
    /// Human-readable size using 1024-based units with two decimals.
    #[must_use]
    pub fn formatted_size(&self) -> String {
        format_size(self.size)
    }

    /// The SHA-256 hex digest published for this asset, lowercased.
    #[must_use]
    pub fn sha256(&self) -> Option<String> {
        parse_sha256_digest(self.digest.as_deref()?)
    }

    /// URLs to try when downloading this asset: each mirror from the snapshot
    /// as a forwarding prefix, then the canonical URL itself.
    #[must_use]
    pub fn download_candidates(&self) -> Vec<String> {
        self.mirrors
            .as_slice()
            .iter()
            .map(|mirror| format!("{mirror}{}", self.download_url))
            .chain(std::iter::once(self.download_url.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Release {
    pub owner: String,
    pub repo: String,
    pub tag_name: String,
    pub name: String,
    pub body: String,
    pub published_at: String,
    pub prerelease: bool,
    pub draft: bool,
    pub assets: Vec<Asset>,
    #[serde(skip)]
    pub(crate) mirrors: MirrorSnapshot,
}

impl Release {
    #[must_use]
    pub fn mirrors(&self) -> &MirrorSnapshot {
        &self.mirrors
    }

    #[must_use]
    pub fn is_stable(&self) -> bool {
        !self.prerelease && !self.draft
    }

    #[must_use]
    pub fn asset_by_name(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|asset| asset.name == name)
    }

    /// Assets whose file name ends with `extension`, in publication order.
    #[must_use]
    pub fn assets_by_extension(&self, extension: &str) -> Vec<&Asset> {
        self.assets
            .iter()
            .filter(|asset| asset.name.ends_with(extension))
            .collect()
    }

    #[must_use]
    pub fn source_zip_url(&self) -> String {
        self.source_archive_url("zip")
    }

    #[must_use]
    pub fn source_tar_url(&self) -> String {
        self.source_archive_url("tar.gz")
    }

    fn source_archive_url(&self, suffix: &str) -> String {
        format!(
            "{CANONICAL_DOWNLOAD_ORIGIN}{}/{}/archive/refs/tags/{}.{suffix}",
            self.owner, self.repo, self.tag_name
        )
    }
}

/// Strip any forwarding prefix in front of the canonical download URL.
///
/// `https://mirror.example/https://github.com/o/r/...` becomes
/// `https://github.com/o/r/...`; a URL that does not embed the canonical
/// origin is returned unchanged.
#[must_use]
pub fn canonicalize_download_url(raw: &str) -> &str {
    raw.find(CANONICAL_DOWNLOAD_ORIGIN)
        .map_or(raw, |start| &raw[start..])
}

#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

fn parse_sha256_digest(digest: &str) -> Option<String> {
    let (algorithm, hash) = digest.split_once(':')?;
    if !algorithm.eq_ignore_ascii_case("sha256") {
        return None;
    }
    if hash.len() != 64 || !hash.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    Some(hash.to_ascii_lowercase())
}
