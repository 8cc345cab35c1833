use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use drive_projection::config::ProjectConfig;
use drive_projection::drive_service::drive_client::{DriveClient, StaticToken};
use drive_projection::log_appender::{parse_level, setup_logging};
use drive_projection::projection::{BatchReport, ProjectionSession};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

fn cli() -> Command {
    Command::new("drive-projection")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Project a cloud drive listing into an in-memory filesystem")
        .arg(
            Arg::new("token")
                .long("token")
                .env("DRIVE_ACCESS_TOKEN")
                .required(true)
                .hide_env_values(true)
                .help("OAuth access token for the drive API"),
        )
        .arg(
            Arg::new("config-dir")
                .long("config-dir")
                .value_parser(value_parser!(PathBuf))
                .help("Directory holding settings.json and logs"),
        )
        .arg(
            Arg::new("expand")
                .long("expand")
                .action(ArgAction::Append)
                .value_name("FOLDER_ID")
                .help("Expand a projected folder by remote id"),
        )
        .arg(
            Arg::new("depth")
                .long("depth")
                .value_parser(value_parser!(u32))
                .default_value("0")
                .help("Expand this many levels of folders below the root"),
        )
}

fn folder_ids(report: &BatchReport) -> Vec<String> {
    report
        .mapped
        .iter()
        .filter(|entry| entry.record.is_folder())
        .map(|entry| entry.record.id.clone())
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let project_config = match matches.get_one::<PathBuf>("config-dir") {
        Some(dir) => ProjectConfig::from_dir(dir),
        None => ProjectConfig::new(),
    }
    .context("Failed to load configuration")?;

    setup_logging(
        &project_config.data_dir,
        parse_level(&project_config.settings.log_level),
    )
    .context("Failed to setup logging")?;

    let token = matches
        .get_one::<String>("token")
        .context("Missing access token")?;
    let client = Arc::new(DriveClient::new(Arc::new(StaticToken::new(token.as_str()))));
    let session = ProjectionSession::new(client, project_config.settings.projection.clone());

    let cancel = session.cancellation_token().clone();
    ctrlc::set_handler(move || cancel.cancel()).context("Failed to install Ctrl-C handler")?;

    let root_report = session
        .initialize()
        .await
        .context("Failed to project drive root")?;

    let mut frontier = folder_ids(&root_report);
    let depth = matches.get_one::<u32>("depth").copied().unwrap_or(0);
    for level in 0..depth {
        info!("🔍 Expanding level {} ({} folders)", level + 1, frontier.len());
        let mut next = Vec::new();
        for id in frontier {
            match session.expand_folder(&id).await {
                Ok(report) => next.extend(folder_ids(&report)),
                Err(e) if e.is_cancelled() => return Err(e).context("Expansion cancelled"),
                Err(e) => warn!("⚠️ Could not expand {}: {}", id, e),
            }
        }
        frontier = next;
    }

    for id in matches.get_many::<String>("expand").into_iter().flatten() {
        if let Err(e) = session.expand_folder(id).await {
            warn!("⚠️ Could not expand {}: {}", id, e);
        }
    }

    println!("{}", session.vfs().tree()?);
    println!(
        "{} mapped, {} pending",
        session.table().mapped_len(),
        session.table().pending_len()
    );
    Ok(())
}
