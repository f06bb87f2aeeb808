use serde::Deserialize;
use serde_json::Value;

use crate::model::{Asset, MirrorSnapshot, Release, canonicalize_download_url};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Deserialize)]
struct RawAsset {
    name: String,
    size: u64,
    browser_download_url: String,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    download_count: Option<u64>,
    #[serde(default)]
    digest: Option<String>,
}

#[derive(Deserialize)]
struct RawRelease {
    tag_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    prerelease: bool,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    assets: Vec<RawAsset>,
}

impl RawAsset {
    fn into_asset(self, mirrors: &MirrorSnapshot) -> Asset {
        let download_url = canonicalize_download_url(&self.browser_download_url).to_string();
        Asset {
            name: self.name,
            size: self.size,
            download_url,
            content_type: self
                .content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            download_count: self.download_count.unwrap_or(0),
            digest: self.digest,
            mirrors: mirrors.clone(),
        }
    }
}

impl RawRelease {
    fn into_release(self, owner: &str, repo: &str, mirrors: &MirrorSnapshot) -> Release {
        Release {
            owner: owner.to_string(),
            repo: repo.to_string(),
            tag_name: self.tag_name,
            name: self.name.unwrap_or_default(),
            body: self.body.unwrap_or_default(),
            published_at: self.published_at.unwrap_or_default(),
            prerelease: self.prerelease,
            draft: self.draft,
            assets: self
                .assets
                .into_iter()
                .map(|asset| asset.into_asset(mirrors))
                .collect(),
            mirrors: mirrors.clone(),
        }
    }
}

/// Normalize one release object from the releases API.
///
/// # Errors
/// Returns an error when a required field (`tag_name`, or an asset's
/// `name`, `size`, or `browser_download_url`) is missing or has the wrong
/// type.
pub fn parse_release(
    owner: &str,
    repo: &str,
    value: &Value,
    mirrors: &MirrorSnapshot,
) -> Result<Release, serde_json::Error> {
    RawRelease::deserialize(value).map(|raw| raw.into_release(owner, repo, mirrors))
}

/// Normalize a page of the releases listing, keeping source order.
///
/// # Errors
/// Returns an error when the page is not an array or any entry fails to
/// parse.
pub fn parse_release_page(
    owner: &str,
    repo: &str,
    value: &Value,
    mirrors: &MirrorSnapshot,
) -> Result<Vec<Release>, serde_json::Error> {
    let raw = Vec::<RawRelease>::deserialize(value)?;
    Ok(raw
        .into_iter()
        .map(|release| release.into_release(owner, repo, mirrors))
        .collect())
}
