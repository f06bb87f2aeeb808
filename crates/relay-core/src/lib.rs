//! Release metadata retrieval for relay.
//!
//! This crate holds everything below the command line:
//! - The release/asset domain model and its JSON normalization.
//! - A mirror registry that remembers the last mirror that answered.
//! - A bounded concurrent racer that sends one request to several mirrors and
//!   keeps the first success.
//! - The release fetcher tying those together, plus update checking.

mod config;
mod error;
mod fetcher;
mod model;
mod parse;
mod race;
mod registry;
mod update;

/// Engine construction options and their defaults.
pub use config::{
    DEFAULT_API_BASE, DEFAULT_MIRROR_LIST_URL, DEFAULT_SEED_MIRROR, FetcherConfig,
};
/// Failure taxonomy for attempts, races, configuration, and public calls.
pub use error::{AttemptError, ConfigError, FetchError, RaceError, SourceFailure};
/// Release fetching operations and request descriptors.
pub use fetcher::{DEFAULT_PAGE_SIZE, Endpoint, PRERELEASE_SCAN_PAGE_SIZE, ReleaseFetcher};
/// Normalized release records.
pub use model::{
    Asset, CANONICAL_DOWNLOAD_ORIGIN, MirrorSnapshot, Release, canonicalize_download_url,
};
/// Raw API response normalization.
pub use parse::{parse_release, parse_release_page};
/// Generic first-success racing.
pub use race::{RaceOptions, RaceWin, race};
/// Mirror candidates and affinity.
pub use registry::ProxyRegistry;
/// Update discovery on top of the fetcher.
pub use update::{AvailableUpdate, UpdateChannel, check_for_update, is_newer_version};
