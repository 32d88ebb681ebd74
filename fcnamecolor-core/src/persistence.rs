use async_trait::async_trait;
use thiserror::Error;

use crate::Configuration;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Document could not be (de)serialized: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

/// Represents a place the cache document can be loaded from and saved to.
///
/// Writers are serialized by the roster store, implementations don't need to guard against
/// concurrent saves.
#[async_trait]
pub trait Persistence
where
    Self: 'static + Send + Sync,
{
    /// Loads the document, returning `None` if nothing was saved yet.
    async fn load(&self) -> StoreResult<Option<Configuration>>;

    /// Replaces the stored document.
    async fn save(&self, document: &Configuration) -> StoreResult<()>;
}
