//! Forwarding mirror registry with last-success affinity.
//!
//! The candidate list is fixed once initialization finishes, so reads take
//! no lock. The affinity hint is a single atomic index.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info, warn};
use serde::Deserialize;

use crate::config::FetcherConfig;
use crate::model::MirrorSnapshot;

const NO_AFFINITY: usize = usize::MAX;
const MIRROR_LIST_OK: i64 = 200;

#[derive(Debug)]
pub struct ProxyRegistry {
    mirrors: Vec<String>,
    positions: HashMap<String, usize>,
    last_good: AtomicUsize,
}

#[derive(Deserialize)]
struct MirrorList {
    code: i64,
    #[serde(default)]
    data: Vec<MirrorNode>,
}

#[derive(Deserialize)]
struct MirrorNode {
    #[serde(default)]
    url: String,
}

impl ProxyRegistry {
    /// Build a registry from explicit mirror base URLs. Entries are
    /// normalized to end in `/` and deduplicated, keeping first occurrence.
    #[must_use]
    pub fn with_mirrors<I, S>(mirrors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Vec::new();
        let mut positions = HashMap::new();
        for mirror in mirrors {
            let normalized = normalize_base(mirror.as_ref());
            if normalized.len() <= 1 || positions.contains_key(&normalized) {
                continue;
            }
            positions.insert(normalized.clone(), list.len());
            list.push(normalized);
        }

        Self {
            mirrors: list,
            positions,
            last_good: AtomicUsize::new(NO_AFFINITY),
        }
    }

    /// Seed the registry with the static fallback mirror, then try to extend
    /// it from the configured mirror-list service. A failing or malformed
    /// list response is logged and ignored; the seed always survives.
    pub async fn initialize(client: &reqwest::Client, config: &FetcherConfig) -> Self {
        let mut mirrors = vec![config.seed_mirror.clone()];

        if let Some(list_url) = &config.mirror_list_url {
            match fetch_mirror_list(client, list_url, config).await {
                Ok(extra) => {
                    info!("Loaded {} mirror(s) from {list_url}", extra.len());
                    mirrors.extend(extra);
                }
                Err(error) => warn!("Mirror list unavailable, using seed only: {error}"),
            }
        }

        Self::with_mirrors(mirrors)
    }

    /// Every mirror, rotated so the last successful one comes first.
    #[must_use]
    pub fn ordered_candidates(&self) -> Vec<String> {
        let start = match self.last_good.load(Ordering::Acquire) {
            NO_AFFINITY => 0,
            index => index,
        };
        self.mirrors[start..]
            .iter()
            .chain(&self.mirrors[..start])
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> MirrorSnapshot {
        MirrorSnapshot::new(self.ordered_candidates())
    }

    /// Record `url` as the preferred mirror for the next call. Unknown URLs
    /// are ignored. Concurrent calls race benignly: the last store wins.
    pub fn mark_successful(&self, url: &str) {
        let key = normalize_base(url);
        if let Some(&index) = self.positions.get(&key) {
            self.last_good.store(index, Ordering::Release);
            debug!("Mirror affinity set to {key}");
        }
    }

    #[must_use]
    pub fn last_successful(&self) -> Option<&str> {
        match self.last_good.load(Ordering::Acquire) {
            NO_AFFINITY => None,
            index => self.mirrors.get(index).map(String::as_str),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }
}

async fn fetch_mirror_list(
    client: &reqwest::Client,
    list_url: &str,
    config: &FetcherConfig,
) -> Result<Vec<String>, String> {
    let response = client
        .get(list_url)
        .timeout(config.mirror_list_timeout)
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;

    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| format!("failed to read body: {e}"))?;

    parse_mirror_list(&body, &config.seed_mirror)
}

fn parse_mirror_list(body: &[u8], seed_mirror: &str) -> Result<Vec<String>, String> {
    let list: MirrorList =
        serde_json::from_slice(body).map_err(|e| format!("unexpected schema: {e}"))?;
    if list.code != MIRROR_LIST_OK {
        return Err(format!("service answered code {}", list.code));
    }

    let seed = normalize_base(seed_mirror);
    Ok(list
        .data
        .into_iter()
        .map(|node| normalize_base(&node.url))
        .filter(|url| url.starts_with("https://") && *url != seed)
        .collect())
}

fn normalize_base(url: &str) -> String {
    format!("{}/", url.trim().trim_end_matches('/'))
}
