use async_trait::async_trait;
use thiserror::Error;

use crate::{CharacterId, GuildId, MemberRecord};

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The lookup service answered, but the character or guild does not exist
    #[error("Resource was not found")]
    NotFound,

    #[error("Failed to fetch resource: {0}")]
    FetchError(String),

    #[error("Failed to parse resource: {0}")]
    ParseError(String),

    #[error("{0}")]
    Other(String),
}

/// The free company listed on a character's page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterGuild {
    pub id: GuildId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildSummary {
    pub id: GuildId,
    pub name: String,
    pub world: String,
}

/// One page of a free company's member list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembersPage {
    pub members: Vec<MemberRecord>,
    /// How many pages the member list has in total
    pub total_pages: u32,
}

/// Represents a type that can look up characters and free companies on the lodestone.
///
/// Every call is a single network request. Nothing is retried, that is up to the caller.
#[async_trait]
pub trait RosterClient
where
    Self: 'static + Send + Sync,
{
    /// Searches for a character by exact name on a world
    async fn resolve_character_id(&self, name: &str, world: &str) -> RemoteResult<CharacterId>;

    /// Returns the free company of a character, or `None` if they aren't in one
    async fn fetch_character_guild(
        &self,
        character_id: &CharacterId,
    ) -> RemoteResult<Option<CharacterGuild>>;

    async fn fetch_guild(&self, guild_id: &GuildId) -> RemoteResult<GuildSummary>;

    /// Fetches one page of members, starting at page 1
    async fn fetch_members_page(&self, guild_id: &GuildId, page: u32)
        -> RemoteResult<MembersPage>;
}
