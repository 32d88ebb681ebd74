use std::time::{Duration, Instant};

use crossbeam::atomic::AtomicCell;
use parking_lot::{Mutex, RwLock};

use crate::{GuildId, PlayerIdentity};

/// Incremented on every login. Work captured under an older generation is discarded.
pub type Generation = u64;

/// Where the own-guild fetch currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    ResolvingIdentity,
    ResolvingOwnGuild,
    FetchingOwnMembers,
    Ready,
    Error,
}

/// Where the background refresh of tracked guilds currently is
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RefreshState {
    #[default]
    Idle,
    Scheduling,
    Refreshing(GuildId),
}

/// Flags surfaced to the user interface
#[derive(Debug, Clone, Default)]
pub struct FetchStatus {
    pub state: SessionState,
    pub refresh: RefreshState,
    pub loading: bool,
    pub error: bool,
    pub not_in_fc: bool,
    pub searching_fc_error: bool,
    cooldown_until: Option<Instant>,
    retry_scheduled: bool,
}

impl FetchStatus {
    /// Time left until a manual reload is allowed again
    pub fn cooldown_remaining(&self) -> Duration {
        self.cooldown_until
            .map(|until| until.saturating_duration_since(Instant::now()))
            .unwrap_or_default()
    }

    pub fn is_cooling_down(&self) -> bool {
        !self.cooldown_remaining().is_zero()
    }

    pub fn start_cooldown(&mut self, duration: Duration) {
        self.cooldown_until = Some(Instant::now() + duration);
    }
}

/// The state of the logged in character, shared by the fetch pipeline and the classifier.
#[derive(Default)]
pub struct SessionContext {
    generation: AtomicCell<Generation>,
    identity: RwLock<Option<PlayerIdentity>>,
    status: Mutex<FetchStatus>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new session for the given character, invalidating all in-flight work.
    pub fn begin(&self, identity: PlayerIdentity) -> Generation {
        let mut current = self.identity.write();
        let generation = self.generation.fetch_add(1) + 1;

        *current = Some(identity);
        *self.status.lock() = FetchStatus::default();

        generation
    }

    pub fn generation(&self) -> Generation {
        self.generation.load()
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation.load() == generation
    }

    pub fn identity(&self) -> Option<PlayerIdentity> {
        self.identity.read().clone()
    }

    /// Returns the identity only if the given generation is still the active one
    pub fn identity_for(&self, generation: Generation) -> Option<PlayerIdentity> {
        let identity = self.identity.read();

        if self.is_current(generation) {
            identity.clone()
        } else {
            None
        }
    }

    pub fn status(&self) -> FetchStatus {
        self.status.lock().clone()
    }

    pub fn update_status<F, R>(&self, update: F) -> R
    where
        F: FnOnce(&mut FetchStatus) -> R,
    {
        update(&mut self.status.lock())
    }

    /// Same as `update_status`, but only if the generation is still current.
    pub fn update_status_for<F>(&self, generation: Generation, update: F) -> bool
    where
        F: FnOnce(&mut FetchStatus),
    {
        let mut status = self.status.lock();

        if !self.is_current(generation) {
            return false;
        }

        update(&mut status);
        true
    }

    /// Marks that the automatic retry for this generation has been used.
    /// Returns false if it was used already.
    pub fn claim_retry(&self, generation: Generation) -> bool {
        let mut status = self.status.lock();

        if !self.is_current(generation) || status.retry_scheduled {
            return false;
        }

        status.retry_scheduled = true;
        true
    }

    /// Makes the automatic retry available again after a successful fetch
    pub fn release_retry(&self, generation: Generation) {
        self.update_status_for(generation, |s| s.retry_scheduled = false);
    }
}
