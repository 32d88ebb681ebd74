use std::sync::Arc;

use chrono::Utc;
use crossbeam::atomic::AtomicCell;
use log::{debug, error, info, warn};
use tokio::time::sleep;

use crate::{
    Generation, GuildId, GuildRecord, PluginContext, PluginEvent, RefreshState, RosterClient,
    SessionState, StaleSession,
};

use super::{fetch_roster, FetchError, Job, JobSender, RemoteResultExt};

/// How the own free company fetch ended
#[derive(Debug)]
enum OwnGuild {
    Fetched { guild_id: GuildId, members: usize },
    NotInFreeCompany,
}

/// Executes the jobs of the fetch pipeline.
///
/// Every job carries the session generation it was created under. Results for an older
/// generation are dropped at the store, so a late answer never lands in a newer session.
pub struct FetchWorker<C> {
    context: PluginContext,
    client: Arc<C>,
    jobs: JobSender,
    /// The generation whose background refresh is running, 0 if none
    refreshing: AtomicCell<Generation>,
    setup_pending: AtomicCell<bool>,
}

impl<C> FetchWorker<C>
where
    C: RosterClient,
{
    pub fn new(context: &PluginContext, client: Arc<C>, jobs: JobSender) -> Self {
        Self {
            setup_pending: AtomicCell::new(context.store.is_first_time()),
            context: context.clone(),
            client,
            jobs,
            refreshing: Default::default(),
        }
    }

    pub fn enqueue(&self, job: Job) {
        if self.jobs.send(job).is_err() {
            debug!("Task queue is closed, dropping job");
        }
    }

    pub async fn run(&self, job: Job) {
        match job {
            Job::FetchOwnGuild { generation } => self.fetch_own_guild(generation).await,
            Job::RetryOwnGuild { generation, after } => {
                sleep(after).await;

                if self.context.session.is_current(generation) {
                    debug!("Retrying failed fetch");
                    self.fetch_own_guild(generation).await
                }
            }
            Job::RefreshTracked { generation } => self.refresh_tracked(generation).await,
            Job::FetchGuild {
                generation,
                guild_id,
            } => self.fetch_guild(generation, guild_id).await,
        }
    }

    async fn fetch_own_guild(&self, generation: Generation) {
        let context = &self.context;
        let cooldown = context.config.cooldown;

        let started = context.session.update_status_for(generation, |s| {
            s.loading = true;
            s.start_cooldown(cooldown);
        });

        if !started {
            debug!("Discarding fetch of a previous session");
            return;
        }

        let first_time = self.setup_pending.load();
        if first_time {
            context.emit(PluginEvent::FirstTimeSetupStarted);
        }

        info!("Fetching data");
        context.emit(PluginEvent::FetchStarted);

        match self.try_fetch_own_guild(generation).await {
            Ok(OwnGuild::Fetched { guild_id, members }) => {
                context.skip_cache.clear();
                self.finish(generation, false);

                info!("Finished fetching data. Fetched {} members.", members);
                context.emit(PluginEvent::FetchFinished { guild_id, members });

                if first_time && self.setup_pending.swap(false) {
                    context.emit(PluginEvent::FirstTimeSetupFinished { members });
                }

                self.enqueue(Job::RefreshTracked { generation });
            }
            Ok(OwnGuild::NotInFreeCompany) => {
                context.skip_cache.clear();
                self.finish(generation, true);

                info!("Player is not in an FC.");
                context.emit(PluginEvent::NotInFreeCompany);

                self.enqueue(Job::RefreshTracked { generation });
            }
            Err(FetchError::Stale(_)) => debug!("Discarding fetch of a previous session"),
            Err(error) => {
                context.skip_cache.clear();
                self.handle_error(generation, error);
            }
        }
    }

    async fn try_fetch_own_guild(&self, generation: Generation) -> Result<OwnGuild, FetchError> {
        let context = &self.context;
        let identity = context
            .session
            .identity_for(generation)
            .ok_or(StaleSession)?;
        let key = identity.key();

        let character_id = match context.store.character_id(&key) {
            Some(id) => id,
            None => {
                self.set_state(generation, SessionState::ResolvingIdentity);
                debug!("Fetching character ID of {}", key);

                let id = self
                    .client
                    .resolve_character_id(&identity.name, &identity.world)
                    .await
                    .not_found_or(FetchError::CharacterNotFound(key.clone()))?;

                context.store.commit(&context.session, generation, |d| {
                    d.player_ids.insert(key.clone(), id.clone());
                })?;

                id
            }
        };

        self.set_state(generation, SessionState::ResolvingOwnGuild);
        debug!("Fetching FC ID via character page");

        let guild = self
            .client
            .fetch_character_guild(&character_id)
            .await
            .not_found_or(FetchError::CharacterNotFound(key.clone()))?;

        let Some(guild) = guild else {
            context.store.commit(&context.session, generation, |d| {
                d.player_guilds.remove(&key);
            })?;
            self.persist().await;

            return Ok(OwnGuild::NotInFreeCompany);
        };

        self.set_state(generation, SessionState::FetchingOwnMembers);
        let members = fetch_roster(self.client.as_ref(), &guild.id).await?;

        let record = GuildRecord {
            id: guild.id.clone(),
            name: guild.name,
            world: identity.world.clone(),
            last_updated: Utc::now(),
            members,
        };
        let count = record.members.len();

        context.store.commit(&context.session, generation, move |d| {
            d.player_guilds.insert(key, record.id.clone());
            d.guilds.insert(record.id.clone(), record);
        })?;
        self.persist().await;

        Ok(OwnGuild::Fetched {
            guild_id: guild.id,
            members: count,
        })
    }

    fn finish(&self, generation: Generation, not_in_fc: bool) {
        self.context.session.update_status_for(generation, |s| {
            s.state = SessionState::Ready;
            s.loading = false;
            s.error = false;
            s.not_in_fc = not_in_fc;
        });
        self.context.session.release_retry(generation);
    }

    /// Flags the error and schedules the single automatic retry, if it wasn't used yet.
    fn handle_error(&self, generation: Generation, error: FetchError) {
        let context = &self.context;
        let cooldown = context.config.error_cooldown();

        warn!("Fetching data failed: {}", error);

        let flagged = context.session.update_status_for(generation, |s| {
            s.state = SessionState::Error;
            s.error = true;
            s.loading = false;
            s.start_cooldown(cooldown);
        });

        if !flagged {
            return;
        }

        context.emit(PluginEvent::FetchFailed {
            error: error.to_string(),
        });

        if context.session.claim_retry(generation) {
            debug!("Retrying in {:?}", cooldown);
            context.emit(PluginEvent::RetryScheduled { after: cooldown });

            self.enqueue(Job::RetryOwnGuild {
                generation,
                after: cooldown,
            });
        } else {
            debug!("Automatic retry was already used, waiting for a reload");
        }
    }

    /// Refreshes stale tracked guilds one at a time, waiting before each request.
    async fn refresh_tracked(&self, generation: Generation) {
        if !self.claim_refresh(generation) {
            debug!("Background refresh is already running");
            return;
        }

        let context = &self.context;
        let Some(identity) = context.session.identity_for(generation) else {
            self.release_refresh(generation);
            return;
        };

        let key = identity.key();
        let own_guild = context.store.own_guild_id(&key);
        let guild_ids: Vec<GuildId> = context.store.read(|d| {
            d.group_assignments
                .get(&key)
                .map(|a| {
                    a.keys()
                        .filter(|id| Some(*id) != own_guild.as_ref())
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        });

        self.set_refresh_state(generation, RefreshState::Scheduling);

        for guild_id in guild_ids {
            if !context.session.is_current(generation) {
                break;
            }

            let existing = context.store.guild(&guild_id);
            let is_fresh = existing
                .as_ref()
                .is_some_and(|r| !r.is_stale(Utc::now(), context.config.stale_after_chrono()));

            if is_fresh {
                debug!("{} was refreshed recently, skipping", guild_id);
                continue;
            }

            sleep(context.config.refresh_delay).await;

            if !context.session.is_current(generation) {
                break;
            }

            self.set_refresh_state(generation, RefreshState::Refreshing(guild_id.clone()));

            let result = self.refresh_guild(generation, &guild_id, existing).await;
            if matches!(result, Err(FetchError::Stale(_))) {
                break;
            }

            // Cleared before the event goes out, so listeners see the final state
            context.skip_cache.clear();

            match result {
                Ok(members) => {
                    info!("Refreshed {}, {} members", guild_id, members);
                    context.emit(PluginEvent::GuildRefreshed { guild_id, members });
                }
                Err(e) => {
                    warn!("Failed to refresh {}: {}", guild_id, e);
                    context.emit(PluginEvent::GuildRefreshFailed {
                        guild_id,
                        error: e.to_string(),
                    });
                }
            }

            self.set_refresh_state(generation, RefreshState::Scheduling);
        }

        self.set_refresh_state(generation, RefreshState::Idle);
        self.release_refresh(generation);
    }

    /// Fetches a single guild right away, used after a guild was added
    async fn fetch_guild(&self, generation: Generation, guild_id: GuildId) {
        let context = &self.context;
        let existing = context.store.guild(&guild_id);

        let result = self.refresh_guild(generation, &guild_id, existing).await;
        if matches!(result, Err(FetchError::Stale(_))) {
            debug!("Discarding fetch of {} for a previous session", guild_id);
            return;
        }

        context.skip_cache.clear();

        match result {
            Ok(members) => {
                info!("Fetched {} members of {}", members, guild_id);
                context.emit(PluginEvent::GuildRefreshed { guild_id, members });
            }
            Err(e) => {
                warn!("Failed to fetch {}: {}", guild_id, e);
                context.emit(PluginEvent::GuildRefreshFailed {
                    guild_id,
                    error: e.to_string(),
                });
            }
        }
    }

    /// Fetches a guild's full roster and replaces the cached record
    async fn refresh_guild(
        &self,
        generation: Generation,
        guild_id: &GuildId,
        existing: Option<GuildRecord>,
    ) -> Result<usize, FetchError> {
        let context = &self.context;

        let (name, world) = match existing {
            Some(record) if !record.world.is_empty() => (record.name, record.world),
            _ => {
                let summary = self
                    .client
                    .fetch_guild(guild_id)
                    .await
                    .not_found_or(FetchError::GuildNotFound(guild_id.clone()))?;

                (summary.name, summary.world)
            }
        };

        let members = fetch_roster(self.client.as_ref(), guild_id).await?;
        let record = GuildRecord {
            id: guild_id.clone(),
            name,
            world,
            last_updated: Utc::now(),
            members,
        };
        let count = record.members.len();

        context.store.commit(&context.session, generation, move |d| {
            d.guilds.insert(record.id.clone(), record);
        })?;
        self.persist().await;

        Ok(count)
    }

    async fn persist(&self) {
        if let Err(e) = self.context.store.persist().await {
            error!("Failed to save the cache document: {}", e);
        }
    }

    fn set_state(&self, generation: Generation, state: SessionState) {
        self.context
            .session
            .update_status_for(generation, |s| s.state = state);
    }

    fn set_refresh_state(&self, generation: Generation, refresh: RefreshState) {
        self.context
            .session
            .update_status_for(generation, |s| s.refresh = refresh);
    }

    /// A newer session takes over from a refresh still winding down for an older one
    fn claim_refresh(&self, generation: Generation) -> bool {
        loop {
            let current = self.refreshing.load();

            if current == generation {
                return false;
            }

            if self
                .refreshing
                .compare_exchange(current, generation)
                .is_ok()
            {
                return true;
            }
        }
    }

    fn release_refresh(&self, generation: Generation) {
        let _ = self.refreshing.compare_exchange(generation, 0);
    }
}
