use async_trait::async_trait;
use crossbeam::atomic::AtomicCell;
use parking_lot::Mutex;

use crate::{Configuration, Persistence, StoreResult};

/// Keeps the document in memory. Useful for embedding and tests.
#[derive(Default)]
pub struct MemoryPersistence {
    document: Mutex<Option<Configuration>>,
    save_count: AtomicCell<usize>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts out with an already saved document
    pub fn with_document(document: Configuration) -> Self {
        Self {
            document: Mutex::new(Some(document)),
            save_count: Default::default(),
        }
    }

    /// Returns the last saved document
    pub fn document(&self) -> Option<Configuration> {
        self.document.lock().clone()
    }

    /// How many times the document was saved
    pub fn save_count(&self) -> usize {
        self.save_count.load()
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn load(&self) -> StoreResult<Option<Configuration>> {
        Ok(self.document.lock().clone())
    }

    async fn save(&self, document: &Configuration) -> StoreResult<()> {
        *self.document.lock() = Some(document.clone());
        self.save_count.fetch_add(1);

        Ok(())
    }
}
