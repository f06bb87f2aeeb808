use std::fmt;
use std::str::FromStr;

use clap::{Parser, Subcommand, ValueEnum};
use relay_core::{DEFAULT_PAGE_SIZE, UpdateChannel};

use crate::settings::Overrides;

#[derive(Debug, Parser)]
#[command(
    name = "relay",
    version,
    about = "Look up GitHub release metadata, racing forwarding mirrors when the API is slow"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Call the API host directly instead of racing mirrors
    #[arg(long, global = true)]
    pub direct: bool,

    /// Accept invalid TLS certificates
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Mirrors queried at once
    #[arg(long, global = true, value_name = "N")]
    pub workers: Option<usize>,

    /// Print JSON instead of a summary
    #[arg(long, global = true)]
    pub json: bool,

    /// Only show assets whose name ends with this suffix
    #[arg(long, global = true, value_name = "SUFFIX")]
    pub ext: Option<String>,

    /// Log to stderr as well as the log file
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Latest published release
    Latest { repo: RepoRef },
    /// Release for a specific tag
    Tag { repo: RepoRef, tag: String },
    /// Newest prerelease on the first page of releases
    Prerelease { repo: RepoRef },
    /// Most recently published non-prerelease, non-draft release
    Stable { repo: RepoRef },
    /// Every release, newest first
    List {
        repo: RepoRef,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        per_page: u32,
    },
    /// Report whether a newer release than `--current` exists
    Check {
        repo: RepoRef,
        #[arg(long)]
        current: String,
        #[arg(long, value_enum, default_value_t = Channel::Stable)]
        channel: Channel,
    },
    /// Show the settings file, or write one with defaults
    Settings {
        #[arg(long)]
        init: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Channel {
    Stable,
    Prerelease,
}

impl From<Channel> for UpdateChannel {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Stable => UpdateChannel::Stable,
            Channel::Prerelease => UpdateChannel::Prerelease,
        }
    }
}

/// `owner/repo` as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl FromStr for RepoRef {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim().trim_end_matches('/');
        let trimmed = trimmed
            .strip_prefix("https://github.com/")
            .unwrap_or(trimmed);
        match trimmed.split_once('/') {
            Some((owner, repo))
                if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
            {
                Ok(Self {
                    owner: owner.to_string(),
                    repo: repo.trim_end_matches(".git").to_string(),
                })
            }
            _ => Err(format!("expected OWNER/REPO, got {value:?}")),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            direct: self.direct,
            insecure: self.insecure,
            workers: self.workers,
        }
    }
}
