use log::info;
use semver::Version;

use crate::error::FetchError;
use crate::fetcher::ReleaseFetcher;
use crate::model::Release;

/// Which release line an update check follows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdateChannel {
    #[default]
    Stable,
    Prerelease,
}

#[derive(Debug, Clone)]
pub struct AvailableUpdate {
    pub current_version: String,
    pub latest_version: String,
    pub release: Release,
}

/// Look up the newest release on `channel` and report it when it is newer
/// than `current_version`.
///
/// One lookup per call; scheduling repeated checks is left to the caller.
///
/// # Errors
/// Propagates the fetcher's failure for the chosen channel.
pub async fn check_for_update(
    fetcher: &ReleaseFetcher,
    owner: &str,
    repo: &str,
    current_version: &str,
    channel: UpdateChannel,
) -> Result<Option<AvailableUpdate>, FetchError> {
    let release = match channel {
        UpdateChannel::Stable => fetcher.latest_release(owner, repo).await?,
        UpdateChannel::Prerelease => fetcher.latest_prerelease(owner, repo).await?,
    };

    let latest = strip_v(&release.tag_name).to_string();
    let current = strip_v(current_version).to_string();
    if is_newer_version(&latest, &current) {
        info!("Update available for {owner}/{repo}: {current} -> {latest}");
        Ok(Some(AvailableUpdate {
            current_version: current,
            latest_version: latest,
            release,
        }))
    } else {
        info!("{owner}/{repo} is up to date at {current}");
        Ok(None)
    }
}

/// Compare two version strings semver-aware, falling back to inequality
/// when either side is not a version at all.
#[must_use]
pub fn is_newer_version(latest: &str, current: &str) -> bool {
    let (latest, current) = (strip_v(latest), strip_v(current));
    match (lenient_semver(latest), lenient_semver(current)) {
        (Some(latest), Some(current)) => latest > current,
        _ => latest != current,
    }
}

fn strip_v(version: &str) -> &str {
    let trimmed = version.trim();
    trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed)
}

/// Parse `1`, `1.2` and `1.2.3` (with optional `-pre`/`+build` suffix).
fn lenient_semver(version: &str) -> Option<Version> {
    if let Ok(parsed) = Version::parse(version) {
        return Some(parsed);
    }

    let split_at = version.find(['-', '+']).unwrap_or(version.len());
    let (core, suffix) = version.split_at(split_at);
    let numbers: Vec<u64> = core
        .split('.')
        .map(|part| part.parse().ok())
        .collect::<Option<_>>()?;

    let padded = match numbers.as_slice() {
        [major] => format!("{major}.0.0{suffix}"),
        [major, minor] => format!("{major}.{minor}.0{suffix}"),
        _ => return None,
    };
    Version::parse(&padded).ok()
}
