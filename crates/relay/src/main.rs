mod cli;
mod error;
mod logging;
mod output;
mod settings;

use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};
use relay_core::{ReleaseFetcher, check_for_update};
use relay_platform::AppPaths;

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::settings::RelaySettings;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let paths = AppPaths::new().ok();
    let (settings, settings_error) = RelaySettings::load(paths.as_ref());

    logging::init_logging(
        paths.as_ref(),
        cli.verbose,
        settings.debug_logging,
        settings.max_log_size_bytes,
    );
    if let Some(e) = settings_error {
        warn!("Using default settings: {e}");
        eprintln!("warning: {e}; using default settings");
    }

    match run(cli, &settings, paths.as_ref()).await {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            e.exit_code()
        }
    }
}

async fn run(
    cli: Cli,
    settings: &RelaySettings,
    paths: Option<&AppPaths>,
) -> Result<String, CliError> {
    let overrides = cli.overrides();
    let connect = || ReleaseFetcher::new(settings.fetcher_config(overrides));

    let release = match cli.command {
        Command::Settings { init } => return settings_command(settings, paths, init),
        Command::Latest { repo } => {
            connect()
                .await?
                .latest_release(&repo.owner, &repo.repo)
                .await?
        }
        Command::Tag { repo, tag } => {
            connect()
                .await?
                .release_by_tag(&repo.owner, &repo.repo, &tag)
                .await?
        }
        Command::Prerelease { repo } => {
            connect()
                .await?
                .latest_prerelease(&repo.owner, &repo.repo)
                .await?
        }
        Command::Stable { repo } => {
            connect()
                .await?
                .latest_stable_release(&repo.owner, &repo.repo)
                .await?
        }
        Command::List { repo, per_page } => {
            let releases = connect()
                .await?
                .list_releases(&repo.owner, &repo.repo, per_page)
                .await?;
            info!("Listed {} release(s) of {repo}", releases.len());
            return if cli.json {
                Ok(serde_json::to_string_pretty(&releases)?)
            } else {
                Ok(output::release_list(&releases))
            };
        }
        Command::Check {
            repo,
            current,
            channel,
        } => {
            let fetcher = connect().await?;
            let update =
                check_for_update(&fetcher, &repo.owner, &repo.repo, &current, channel.into())
                    .await?;
            return if cli.json {
                Ok(serde_json::to_string_pretty(&output::update_json(
                    &current,
                    update.as_ref(),
                ))?)
            } else {
                Ok(output::update_summary(&current, update.as_ref()))
            };
        }
    };

    if cli.json {
        Ok(serde_json::to_string_pretty(&release)?)
    } else {
        Ok(output::release_summary(&release, cli.ext.as_deref()))
    }
}

fn settings_command(
    settings: &RelaySettings,
    paths: Option<&AppPaths>,
    init: bool,
) -> Result<String, CliError> {
    let paths = paths.ok_or_else(|| CliError::Settings("no config directory".to_string()))?;
    let path = paths.settings_file();

    if init {
        if path.exists() {
            return Err(CliError::Settings(format!(
                "{} already exists",
                path.display()
            )));
        }
        RelaySettings::default()
            .save_to(&path)
            .map_err(|e| CliError::Settings(format!("failed to write {}: {e}", path.display())))?;
        info!("Wrote default settings to {}", path.display());
        return Ok(format!("wrote {}", path.display()));
    }

    Ok(format!(
        "{}\n{}",
        path.display(),
        serde_json::to_string_pretty(settings)?
    ))
}
