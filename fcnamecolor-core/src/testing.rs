use std::time::{Duration, Instant};

use async_trait::async_trait;
use crossbeam::atomic::AtomicCell;
use dashmap::DashMap;

use crate::{
    CharacterGuild, CharacterId, Config, EventReceiver, GuildId, GuildSummary, MemberRecord,
    MembersPage, PluginEvent, RemoteError, RemoteResult, RosterClient,
};

/// Short timings so pipeline tests finish quickly
pub fn test_config() -> Config {
    Config {
        cooldown: Duration::from_millis(20),
        error_cooldown_multiplier: 2,
        stale_after: Duration::from_secs(60 * 60),
        refresh_delay: Duration::from_millis(10),
    }
}

/// Polls for an event matching the predicate, skipping others.
/// Polling keeps the runtime free to run the pipeline on a single thread.
pub async fn wait_for<F>(events: &EventReceiver, predicate: F) -> PluginEvent
where
    F: Fn(&PluginEvent) -> bool,
{
    let started = Instant::now();

    loop {
        while let Ok(event) = events.try_recv() {
            if predicate(&event) {
                return event;
            }
        }

        if started.elapsed() > Duration::from_secs(5) {
            panic!("timed out waiting for event");
        }

        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// Drains every event received so far
pub fn drain(events: &EventReceiver) -> Vec<PluginEvent> {
    events.try_iter().collect()
}

/// An in-memory lodestone that counts requests
#[derive(Default)]
pub struct MockRosterClient {
    characters: DashMap<(String, String), CharacterId>,
    character_guilds: DashMap<CharacterId, Option<CharacterGuild>>,
    guilds: DashMap<GuildId, (GuildSummary, Vec<MembersPage>)>,
    failing_pages: DashMap<(GuildId, u32), RemoteError>,
    calls: DashMap<&'static str, usize>,
    page_requests: DashMap<GuildId, usize>,
    latency: AtomicCell<Option<Duration>>,
}

impl MockRosterClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_character(&self, name: &str, world: &str, id: &str) {
        self.characters
            .insert((name.to_string(), world.to_string()), id.to_string());
    }

    /// Sets the free company shown on a character's page, `None` if they aren't in one
    pub fn set_character_guild(&self, character_id: &str, guild: Option<(&str, &str)>) {
        let guild = guild.map(|(id, name)| CharacterGuild {
            id: id.to_string(),
            name: name.to_string(),
        });

        self.character_guilds.insert(character_id.to_string(), guild);
    }

    /// Adds a guild whose members all fit on one page
    pub fn add_guild(&self, id: &str, name: &str, world: &str, members: &[&str]) {
        let page = MembersPage {
            members: members
                .iter()
                .map(|name| MemberRecord {
                    id: format!("{id}-{name}"),
                    name: name.to_string(),
                })
                .collect(),
            total_pages: 1,
        };

        self.insert_guild(id, name, world, vec![page]);
    }

    /// Adds a guild with `pages` pages of `per_page` members, named "Member {page}-{index}"
    pub fn add_paged_guild(&self, id: &str, name: &str, world: &str, pages: u32, per_page: usize) {
        let pages = (1..=pages)
            .map(|page| MembersPage {
                members: (0..per_page)
                    .map(|i| MemberRecord {
                        id: format!("{id}-{page}-{i}"),
                        name: format!("Member {page}-{i}"),
                    })
                    .collect(),
                total_pages: pages,
            })
            .collect();

        self.insert_guild(id, name, world, pages);
    }

    pub fn fail_page(&self, id: &str, page: u32, error: RemoteError) {
        self.failing_pages.insert((id.to_string(), page), error);
    }

    /// Delays every response, to let tests race a login against a fetch
    pub fn set_latency(&self, latency: Duration) {
        self.latency.store(Some(latency));
    }

    /// How many times a trait method was called
    pub fn calls(&self, method: &str) -> usize {
        self.calls.get(method).map(|c| *c).unwrap_or_default()
    }

    pub fn page_requests(&self, id: &str) -> usize {
        self.page_requests.get(id).map(|c| *c).unwrap_or_default()
    }

    fn insert_guild(&self, id: &str, name: &str, world: &str, pages: Vec<MembersPage>) {
        let summary = GuildSummary {
            id: id.to_string(),
            name: name.to_string(),
            world: world.to_string(),
        };

        self.guilds.insert(id.to_string(), (summary, pages));
    }

    async fn request(&self, method: &'static str) {
        *self.calls.entry(method).or_default() += 1;

        if let Some(latency) = self.latency.load() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl RosterClient for MockRosterClient {
    async fn resolve_character_id(&self, name: &str, world: &str) -> RemoteResult<CharacterId> {
        self.request("resolve_character_id").await;

        self.characters
            .get(&(name.to_string(), world.to_string()))
            .map(|id| id.clone())
            .ok_or(RemoteError::NotFound)
    }

    async fn fetch_character_guild(
        &self,
        character_id: &CharacterId,
    ) -> RemoteResult<Option<CharacterGuild>> {
        self.request("fetch_character_guild").await;

        self.character_guilds
            .get(character_id)
            .map(|guild| guild.clone())
            .ok_or(RemoteError::NotFound)
    }

    async fn fetch_guild(&self, guild_id: &GuildId) -> RemoteResult<GuildSummary> {
        self.request("fetch_guild").await;

        self.guilds
            .get(guild_id)
            .map(|guild| guild.0.clone())
            .ok_or(RemoteError::NotFound)
    }

    async fn fetch_members_page(&self, guild_id: &GuildId, page: u32) -> RemoteResult<MembersPage> {
        self.request("fetch_members_page").await;
        *self.page_requests.entry(guild_id.clone()).or_default() += 1;

        if let Some(error) = self.failing_pages.get(&(guild_id.clone(), page)) {
            return Err(error.clone());
        }

        let guild = self.guilds.get(guild_id).ok_or(RemoteError::NotFound)?;

        page.checked_sub(1)
            .and_then(|index| guild.1.get(index as usize))
            .cloned()
            .ok_or(RemoteError::NotFound)
    }
}
