use std::fmt::Write as _;

use relay_core::{Asset, AvailableUpdate, Release};
use serde_json::json;

/// Multi-line summary of one release, optionally limited to assets ending
/// with `ext`.
pub fn release_summary(release: &Release, ext: Option<&str>) -> String {
    let mut out = String::new();
    let title = if release.name.is_empty() {
        release.tag_name.as_str()
    } else {
        release.name.as_str()
    };
    let _ = writeln!(
        out,
        "{}/{} {} ({title})",
        release.owner, release.repo, release.tag_name
    );
    if !release.published_at.is_empty() {
        let _ = writeln!(out, "published: {}", release.published_at);
    }

    let mut flags = Vec::new();
    if release.prerelease {
        flags.push("prerelease");
    }
    if release.draft {
        flags.push("draft");
    }
    if !flags.is_empty() {
        let _ = writeln!(out, "flags: {}", flags.join(", "));
    }

    let assets: Vec<&Asset> = match ext {
        Some(ext) => release.assets_by_extension(ext),
        None => release.assets.iter().collect(),
    };
    if assets.is_empty() {
        out.push_str("assets: none\n");
    } else {
        out.push_str("assets:\n");
        for asset in assets {
            let _ = writeln!(
                out,
                "  {}  {}  {} download(s)",
                asset.name,
                asset.formatted_size(),
                asset.download_count
            );
            let _ = writeln!(out, "    {}", asset.download_url);
            if let Some(sha256) = asset.sha256() {
                let _ = writeln!(out, "    sha256 {sha256}");
            }
        }
    }

    let _ = writeln!(out, "source: {}", release.source_zip_url());
    let _ = write!(out, "        {}", release.source_tar_url());
    out
}

/// One line per release: tag, publication date and flags.
pub fn release_list(releases: &[Release]) -> String {
    releases
        .iter()
        .map(|release| {
            let mut line = format!("{}\t{}", release.tag_name, release.published_at);
            if release.prerelease {
                line.push_str("\tprerelease");
            }
            if release.draft {
                line.push_str("\tdraft");
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn update_summary(current: &str, update: Option<&AvailableUpdate>) -> String {
    match update {
        Some(update) => format!(
            "update available: {} -> {} ({})",
            update.current_version,
            update.latest_version,
            update.release.tag_name
        ),
        None => format!("up to date ({current})"),
    }
}

pub fn update_json(current: &str, update: Option<&AvailableUpdate>) -> serde_json::Value {
    match update {
        Some(update) => json!({
            "update_available": true,
            "current_version": update.current_version,
            "latest_version": update.latest_version,
            "release": update.release,
        }),
        None => json!({
            "update_available": false,
            "current_version": current,
        }),
    }
}
