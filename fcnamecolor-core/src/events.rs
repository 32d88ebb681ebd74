use std::time::Duration;

use crossbeam::channel::{Receiver, Sender};

use crate::GuildId;

pub type EventSender = Sender<PluginEvent>;
pub type EventReceiver = Receiver<PluginEvent>;

/// Describes the events that can be emitted by the plugin.
/// The host decides how to surface them, for example as chat messages.
#[derive(Debug, Clone, PartialEq)]
pub enum PluginEvent {
    /// Nothing was cached yet, the first fetch is starting.
    FirstTimeSetupStarted,
    /// The first fetch finished.
    FirstTimeSetupFinished {
        /// How many members the own free company has.
        members: usize,
    },
    /// A fetch of the own free company started.
    FetchStarted,
    /// The own free company was fetched and cached.
    FetchFinished { guild_id: GuildId, members: usize },
    /// The logged in character is not in a free company.
    NotInFreeCompany,
    /// Fetching the own free company failed.
    FetchFailed { error: String },
    /// The failed fetch will be tried again.
    RetryScheduled {
        /// How long until the retry.
        after: Duration,
    },
    /// A tracked free company's roster was refreshed.
    GuildRefreshed { guild_id: GuildId, members: usize },
    /// A tracked free company's roster could not be refreshed.
    GuildRefreshFailed { guild_id: GuildId, error: String },
    /// A free company was found and is now tracked.
    GuildAdded {
        guild_id: GuildId,
        name: String,
        group: String,
    },
    /// Searching for a free company to track failed.
    GuildSearchFailed { guild_id: GuildId, error: String },
}
