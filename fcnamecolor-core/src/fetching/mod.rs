use std::{sync::Arc, time::Duration};

use log::{debug, info};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    Generation, GuildId, GuildRecord, GuildSummary, PlayerIdentity, PlayerKey, PluginContext,
    PluginEvent, RemoteError, RemoteResult, RosterClient, StaleSession, StoreError,
};

mod queue;
mod roster;
mod worker;

pub use queue::*;
pub use roster::*;
pub use worker::*;

pub type JobSender = UnboundedSender<Job>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Character {0} was not found on the lodestone")]
    CharacterNotFound(PlayerKey),

    #[error("Free company {0} was not found on the lodestone")]
    GuildNotFound(GuildId),

    #[error("Page {page} of {guild_id} failed: {source}")]
    PartialPage {
        guild_id: GuildId,
        page: u32,
        source: RemoteError,
    },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Stale(#[from] StaleSession),
}

/// Errors returned to the user when a command can't be carried out
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Please wait {} seconds before reloading", .0.as_secs().max(1))]
    Cooldown(Duration),

    #[error("No character is logged in")]
    NoSession,

    #[error("There is no group called {0}")]
    UnknownGroup(String),

    #[error("Group {0} is built in and can't be removed")]
    ReservedGroup(String),

    #[error("Free company {0} was not found")]
    GuildNotFound(GuildId),

    #[error("Lookup failed: {0}")]
    Remote(#[from] RemoteError),

    #[error("Failed to save: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Stale(#[from] StaleSession),
}

pub trait RemoteResultExt<T> {
    /// Replaces [RemoteError::NotFound] with a more specific error
    fn not_found_or(self, error: FetchError) -> Result<T, FetchError>;
}

impl<T> RemoteResultExt<T> for RemoteResult<T> {
    fn not_found_or(self, error: FetchError) -> Result<T, FetchError> {
        self.map_err(|e| match e {
            RemoteError::NotFound => error,
            e => FetchError::Remote(e),
        })
    }
}

/// A unit of work for the fetch pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    FetchOwnGuild {
        generation: Generation,
    },
    RetryOwnGuild {
        generation: Generation,
        after: Duration,
    },
    RefreshTracked {
        generation: Generation,
    },
    FetchGuild {
        generation: Generation,
        guild_id: GuildId,
    },
}

/// Entry point of the fetch pipeline. Every method returns without waiting on the network,
/// except [Orchestrator::search_and_add_guild] which needs the search result.
pub struct Orchestrator<C> {
    context: PluginContext,
    client: Arc<C>,
    worker: Arc<FetchWorker<C>>,
    _queue: TaskQueue,
}

impl<C> Orchestrator<C>
where
    C: RosterClient,
{
    /// Must be called from within a tokio runtime.
    pub fn new(context: &PluginContext, client: Arc<C>) -> Self {
        let (sender, receiver) = TaskQueue::channel();
        let worker = Arc::new(FetchWorker::new(context, client.clone(), sender));
        let queue = TaskQueue::spawn(worker.clone(), receiver);

        Self {
            context: context.clone(),
            client,
            worker,
            _queue: queue,
        }
    }

    /// Starts a new session. Cached rosters of the character are usable immediately,
    /// and a fetch of the own free company is queued.
    pub fn login(&self, identity: PlayerIdentity) -> Generation {
        let context = &self.context;
        let key = identity.key();

        info!("Logged in as {}", key);

        let generation = context.session.begin(identity);

        context.store.activate(key);
        context.skip_cache.clear();

        self.worker.enqueue(Job::FetchOwnGuild { generation });
        generation
    }

    /// Queues a fetch of the own free company, unless one happened too recently.
    pub fn reload(&self) -> Result<(), CommandError> {
        let context = &self.context;
        let generation = context.session.generation();

        if context.session.identity_for(generation).is_none() {
            return Err(CommandError::NoSession);
        }

        let status = context.session.status();
        if status.is_cooling_down() {
            return Err(CommandError::Cooldown(status.cooldown_remaining()));
        }

        debug!("Manual reload requested");
        self.worker.enqueue(Job::FetchOwnGuild { generation });

        Ok(())
    }

    /// Looks up a free company, tracks it under the given group, and queues a fetch of its members.
    pub async fn search_and_add_guild(
        &self,
        guild_id: GuildId,
        group: &str,
    ) -> Result<GuildSummary, CommandError> {
        let context = &self.context;
        let generation = context.session.generation();

        let identity = context
            .session
            .identity_for(generation)
            .ok_or(CommandError::NoSession)?;

        if context.store.read(|d| d.group(group).is_none()) {
            return Err(CommandError::UnknownGroup(group.to_string()));
        }

        context
            .session
            .update_status_for(generation, |s| s.searching_fc_error = false);

        let summary = match self.client.fetch_guild(&guild_id).await {
            Ok(summary) => summary,
            Err(e) => {
                context
                    .session
                    .update_status_for(generation, |s| s.searching_fc_error = true);

                context.emit(PluginEvent::GuildSearchFailed {
                    guild_id: guild_id.clone(),
                    error: e.to_string(),
                });

                return Err(match e {
                    RemoteError::NotFound => CommandError::GuildNotFound(guild_id),
                    e => CommandError::Remote(e),
                });
            }
        };

        let key = identity.key();
        context.store.commit(&context.session, generation, |d| {
            if !d.guilds.contains_key(&summary.id) {
                let record = GuildRecord::placeholder(
                    summary.id.clone(),
                    summary.name.clone(),
                    summary.world.clone(),
                );

                d.guilds.insert(summary.id.clone(), record);
            }

            if d.own_guild_id(&key) != Some(&summary.id) {
                d.track_guild(&summary.id);
            }

            d.assign(&key, &summary.id, group);
        })?;

        context.skip_cache.clear();
        context.store.persist().await?;

        info!(
            "Added {} ({}) to group {}",
            summary.name, summary.id, group
        );

        context.emit(PluginEvent::GuildAdded {
            guild_id: summary.id.clone(),
            name: summary.name.clone(),
            group: group.to_string(),
        });

        self.worker.enqueue(Job::FetchGuild {
            generation,
            guild_id: summary.id.clone(),
        });

        Ok(summary)
    }
}
