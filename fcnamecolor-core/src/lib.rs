use crossbeam::channel::unbounded;
use log::trace;
use std::sync::Arc;

mod commands;
mod config;
mod document;
mod events;
mod fetching;
mod hook;
mod nameplate;
mod persistence;
mod remote;
mod roster;
mod session;
mod skip_cache;
mod util;

#[cfg(test)]
mod testing;

pub mod implementors;
pub use config::*;
pub use document::*;
pub use events::*;
pub use fetching::*;
pub use hook::*;
pub use implementors::*;
pub use nameplate::*;
pub use persistence::*;
pub use remote::*;
pub use roster::*;
pub use session::*;
pub use skip_cache::*;
pub use util::*;

/// The FC Name Color engine, tying together roster fetching, caching, and nameplate styling.
pub struct FcNameColor<C> {
    context: PluginContext,
    orchestrator: Orchestrator<C>,
    classifier: Arc<Classifier>,

    event_receiver: EventReceiver,
}

/// A type passed to various components of the engine, to access shared state and emit events.
#[derive(Clone)]
pub struct PluginContext {
    pub config: Config,
    pub session: Arc<SessionContext>,
    pub store: Arc<RosterStore>,
    pub skip_cache: Arc<SkipCache>,

    event_sender: EventSender,
}

impl<C> FcNameColor<C>
where
    C: RosterClient,
{
    /// Opens the cache document and starts the fetch pipeline.
    /// Must be called from within a tokio runtime.
    pub async fn new<P>(config: Config, client: C, persistence: P) -> StoreResult<Self>
    where
        P: Persistence,
    {
        let (event_sender, event_receiver) = unbounded();
        let store = RosterStore::open(Arc::new(persistence)).await?;

        let context = PluginContext {
            config,
            session: Default::default(),
            store: Arc::new(store),
            skip_cache: Default::default(),
            event_sender,
        };

        let classifier = Arc::new(Classifier::new(&context.store, &context.skip_cache));
        let orchestrator = Orchestrator::new(&context, Arc::new(client));

        Ok(Self {
            context,
            orchestrator,
            classifier,
            event_receiver,
        })
    }

    /// Starts a session for a character that just logged in.
    pub fn login(&self, identity: PlayerIdentity) -> Generation {
        self.orchestrator.login(identity)
    }

    /// Fetches the own free company again, if the cooldown allows it.
    pub fn reload(&self) -> Result<(), CommandError> {
        self.orchestrator.reload()
    }

    /// Searches for a free company by id and tracks it under a color group.
    pub async fn add_guild(&self, guild_id: GuildId, group: &str) -> Result<GuildSummary, CommandError> {
        self.orchestrator.search_and_add_guild(guild_id, group).await
    }

    /// Returns which guild a player belongs to, if any.
    pub fn lookup(&self, name: &str, world: &str) -> Option<Membership> {
        self.context.store.snapshot().membership(name, world)
    }

    pub fn status(&self) -> FetchStatus {
        self.context.session.status()
    }

    pub fn snapshot(&self) -> Arc<RosterSnapshot> {
        self.context.store.snapshot()
    }

    pub fn classifier(&self) -> Arc<Classifier> {
        self.classifier.clone()
    }

    /// Subscribes the classifier to a nameplate host until the guard is dropped.
    pub fn attach(&self, host: &Arc<dyn NamePlateHost>) -> HookGuard {
        HookGuard::attach(host, self.classifier.clone())
    }

    /// Receive events from the engine. Returns `None` once the engine is gone.
    pub fn wait_for_event(&self) -> Option<PluginEvent> {
        self.event_receiver.recv().ok()
    }

    pub fn events(&self) -> EventReceiver {
        self.event_receiver.clone()
    }

    pub fn context(&self) -> &PluginContext {
        &self.context
    }
}

impl PluginContext {
    pub fn emit(&self, event: PluginEvent) {
        if self.event_sender.send(event).is_err() {
            trace!("No one is listening for events");
        }
    }

    /// Creates a context around the given persistence, returning the receiving end of its events.
    /// Only used in tests.
    #[cfg(test)]
    pub async fn with_persistence(
        config: &Config,
        persistence: Arc<dyn Persistence>,
    ) -> (Self, EventReceiver) {
        let (event_sender, event_receiver) = unbounded();
        let store = RosterStore::open(persistence)
            .await
            .expect("store opens");

        let context = Self {
            config: config.clone(),
            session: Default::default(),
            store: Arc::new(store),
            skip_cache: Default::default(),
            event_sender,
        };

        (context, event_receiver)
    }
}
