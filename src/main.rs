use std::{env, path::PathBuf};

use anyhow::{bail, Context};
use colored::Colorize;
use fcnamecolor_core::{Config, FcNameColor, PlayerIdentity, PluginEvent, RemoteError, StoreError};
use fcnamecolor_impls::{JsonFileStore, LodestoneClient};
use log::{error, info, warn};
use thiserror::Error;
use tokio::runtime::{self, Runtime};

mod logging;
mod preview;

const DEFAULT_CONFIG_PATH: &str = "fcnamecolor.json";

/// Drives the engine from the console: logs in, waits for the fetch, and previews nameplates.
struct Host {
    engine: FcNameColor<LodestoneClient>,
    runtime: Runtime,
}

#[derive(Debug, Error)]
enum HostError {
    #[error("Could not build the async runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("Could not create the lodestone client: {0}")]
    Client(#[from] RemoteError),

    #[error("Could not open the cache document: {0}")]
    Store(#[from] StoreError),
}

impl Host {
    fn new() -> Result<Self, HostError> {
        info!("Building async runtime...");
        let runtime = runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("fcnamecolor-async")
            .build()?;

        let config_path = env::var("FCNC_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let lodestone_url = env::var("FCNC_LODESTONE_URL")
            .unwrap_or_else(|_| LodestoneClient::DEFAULT_BASE_URL.to_string());

        info!("Using lodestone at {}", lodestone_url);
        let client = LodestoneClient::new(&lodestone_url)?;

        info!("Opening {}...", config_path.display());
        let store = JsonFileStore::new(config_path);
        let engine = runtime.block_on(FcNameColor::new(Config::default(), client, store))?;

        Ok(Self { engine, runtime })
    }

    fn run(&self, login: PlayerIdentity, players: Vec<PlayerIdentity>) -> anyhow::Result<()> {
        self.engine.login(login.clone());
        self.wait_for_fetch()?;

        let snapshot = self.engine.snapshot();
        info!(
            "{} members in the own free company, {} tracked free companies",
            snapshot.own_member_count(),
            snapshot.tracked_count()
        );

        preview::run(&self.engine, &login, &players);

        // Background refreshes may still be running, save what we have before exiting
        self.runtime
            .block_on(self.engine.context().store.persist())
            .context("Could not save the cache document")
    }

    /// Prints events as chat lines until the own free company is known or fetching gave up.
    fn wait_for_fetch(&self) -> anyhow::Result<()> {
        let mut retried = false;

        loop {
            let Some(event) = self.engine.wait_for_event() else {
                bail!("The engine stopped before the fetch finished");
            };

            info!("{}", chat_line(&event));

            match event {
                PluginEvent::FetchFinished { .. } | PluginEvent::NotInFreeCompany => return Ok(()),
                PluginEvent::RetryScheduled { .. } => retried = true,
                PluginEvent::FetchFailed { .. } if retried => {
                    warn!("Continuing with cached data only");
                    return Ok(());
                }
                _ => {}
            }
        }
    }
}

impl HostError {
    fn hint(&self) -> String {
        match self {
            HostError::Runtime(_) => "This error is fatal, and should not happen.".to_string(),
            HostError::Client(_) => "Check that FCNC_LODESTONE_URL is a valid http(s) url.".to_string(),
            HostError::Store(_) => "The cache document could not be read. Fix or delete the file at FCNC_CONFIG_PATH and try again.".to_string(),
        }
    }
}

/// How the add-on would word an event in the chat window
fn chat_line(event: &PluginEvent) -> String {
    let text = match event {
        PluginEvent::FirstTimeSetupStarted => {
            "First-time setup - Fetching FC members from Lodestone. Plugin will work once this is done.".to_string()
        }
        PluginEvent::FirstTimeSetupFinished { members } => {
            format!("First-time setup finished. Fetched {} members.", members)
        }
        PluginEvent::FetchStarted => "Fetching FC members...".to_string(),
        PluginEvent::FetchFinished { members, .. } => format!("Fetched {} FC members.", members),
        PluginEvent::NotInFreeCompany => "You are not in a Free Company.".to_string(),
        PluginEvent::FetchFailed { error } => format!("Something went wrong: {}", error),
        PluginEvent::RetryScheduled { after } => {
            format!("Retrying in {} seconds.", after.as_secs())
        }
        PluginEvent::GuildRefreshed { guild_id, members } => {
            format!("Updated {} ({} members).", guild_id, members)
        }
        PluginEvent::GuildRefreshFailed { guild_id, error } => {
            format!("Could not update {}: {}", guild_id, error)
        }
        PluginEvent::GuildAdded { name, group, .. } => {
            format!("Added {} to group {}.", name, group)
        }
        PluginEvent::GuildSearchFailed { guild_id, .. } => {
            format!("Could not find a Free Company with ID {}.", guild_id)
        }
    };

    format!("[FCNameColor]: {}", text)
}

/// Parses `Name Surname@World`
fn parse_identity(arg: &str) -> anyhow::Result<PlayerIdentity> {
    let (name, world) = arg
        .rsplit_once('@')
        .with_context(|| format!("Expected Name@World, got \"{}\"", arg))?;

    if name.trim().is_empty() || world.trim().is_empty() {
        bail!("Expected Name@World, got \"{}\"", arg);
    }

    Ok(PlayerIdentity::new(name.trim(), world.trim()))
}

fn parse_args() -> anyhow::Result<(PlayerIdentity, Vec<PlayerIdentity>)> {
    let mut args = env::args().skip(1);

    let login = args
        .next()
        .context("Usage: fcnamecolor <Name@World> [Name@World ...]")?;
    let login = parse_identity(&login)?;
    let players = args.map(|a| parse_identity(&a)).collect::<anyhow::Result<_>>()?;

    Ok((login, players))
}

fn main() -> anyhow::Result<()> {
    logging::init_logger()?;

    let (login, players) = parse_args()?;

    match Host::new() {
        Ok(host) => {
            info!("Initialized successfully.");
            host.run(login, players)
        }
        Err(error) => {
            error!("{} Read the error below to troubleshoot the issue.", "FC Name Color failed to start!".bold().red());
            error!("{}", error);
            error!("{}", format!("Hint: {}", error.hint()).dimmed().italic());

            Err(error.into())
        }
    }
}
