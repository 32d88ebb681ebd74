use std::sync::Arc;

use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::{
    CharacterId, Configuration, Generation, GuildId, GuildRecord, Persistence, PlayerKey,
    RosterSnapshot, SessionContext, StoreResult,
};

/// Returned when a write was captured under a session that is no longer active
#[derive(Debug, Error)]
#[error("Result belongs to a previous session and was discarded")]
pub struct StaleSession;

struct Inner {
    document: Configuration,
    active_player: Option<PlayerKey>,
    revision: u64,
}

/// The authoritative cache of roster data.
///
/// All writes go through one lock, which also publishes a fresh [RosterSnapshot] before it is
/// released. Readers on the render thread only ever clone the current snapshot.
pub struct RosterStore {
    inner: Mutex<Inner>,
    snapshot: RwLock<Arc<RosterSnapshot>>,
    persistence: Arc<dyn Persistence>,
    save_lock: tokio::sync::Mutex<()>,
    first_time: bool,
}

impl RosterStore {
    /// Loads the document, migrating it if needed
    pub async fn open(persistence: Arc<dyn Persistence>) -> StoreResult<Self> {
        let loaded = persistence.load().await?;
        let first_time = loaded.is_none();

        let mut document = loaded.unwrap_or_default();
        let migrated = document.migrate();

        if first_time {
            info!("No cached rosters found, starting from scratch");
        }

        let snapshot = RosterSnapshot::empty(&document, 0);
        let store = Self {
            inner: Mutex::new(Inner {
                document,
                active_player: None,
                revision: 0,
            }),
            snapshot: RwLock::new(Arc::new(snapshot)),
            persistence,
            save_lock: Default::default(),
            first_time,
        };

        if migrated {
            store.persist().await?;
        }

        Ok(store)
    }

    /// True if there was no saved document when the store was opened
    pub fn is_first_time(&self) -> bool {
        self.first_time
    }

    /// Returns the current snapshot. Cheap enough to call on every nameplate update.
    pub fn snapshot(&self) -> Arc<RosterSnapshot> {
        self.snapshot.read().clone()
    }

    /// Switches the snapshot to another character, using whatever is cached for it.
    pub fn activate(&self, player: PlayerKey) {
        let mut inner = self.inner.lock();

        debug!("Activating cached rosters for {}", player);
        inner.active_player = Some(player);
        self.publish(&mut inner);
    }

    /// Reads from the document without publishing anything
    pub fn read<F, R>(&self, read: F) -> R
    where
        F: FnOnce(&Configuration) -> R,
    {
        read(&self.inner.lock().document)
    }

    /// Mutates the document and publishes a new snapshot
    pub fn update<F, R>(&self, update: F) -> R
    where
        F: FnOnce(&mut Configuration) -> R,
    {
        let mut inner = self.inner.lock();
        let result = update(&mut inner.document);

        self.publish(&mut inner);
        result
    }

    /// Like `update`, but discards the write if the session moved on since `generation`.
    pub fn commit<F, R>(
        &self,
        session: &SessionContext,
        generation: Generation,
        update: F,
    ) -> Result<R, StaleSession>
    where
        F: FnOnce(&mut Configuration) -> R,
    {
        let mut inner = self.inner.lock();

        if !session.is_current(generation) {
            return Err(StaleSession);
        }

        let result = update(&mut inner.document);

        self.publish(&mut inner);
        Ok(result)
    }

    /// Saves a copy of the current document. Saves never interleave.
    pub async fn persist(&self) -> StoreResult<()> {
        let _guard = self.save_lock.lock().await;
        let document = self.inner.lock().document.clone();

        self.persistence.save(&document).await
    }

    pub fn character_id(&self, player: &PlayerKey) -> Option<CharacterId> {
        self.read(|d| d.player_ids.get(player).cloned())
    }

    pub fn own_guild_id(&self, player: &PlayerKey) -> Option<GuildId> {
        self.read(|d| d.own_guild_id(player).cloned())
    }

    pub fn guild(&self, guild_id: &GuildId) -> Option<GuildRecord> {
        self.read(|d| d.guilds.get(guild_id).cloned())
    }

    pub fn document(&self) -> Configuration {
        self.read(|d| d.clone())
    }

    fn publish(&self, inner: &mut Inner) {
        inner.revision += 1;

        let snapshot = RosterSnapshot::build(
            &inner.document,
            inner.active_player.as_ref(),
            inner.revision,
        );

        *self.snapshot.write() = Arc::new(snapshot);
    }
}
