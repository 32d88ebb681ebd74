use dashmap::DashSet;
use parking_lot::RwLock;

use crate::ObjectId;

/// Proof of which cache epoch a classification started in.
/// Taken before reading the roster snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipTicket(u64);

/// Session-scoped set of nameplates known not to need styling.
///
/// There is no expiry. The set is cleared whenever roster data changes, and an insert that
/// raced with a clear is dropped, so an entry never outlives the roster it was derived from.
#[derive(Default)]
pub struct SkipCache {
    ids: DashSet<ObjectId>,
    epoch: RwLock<u64>,
}

impl SkipCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticket(&self) -> SkipTicket {
        SkipTicket(*self.epoch.read())
    }

    pub fn contains(&self, object_id: ObjectId) -> bool {
        self.ids.contains(&object_id)
    }

    /// Adds an object if no clear happened since the ticket was taken.
    /// Returns true if the object was newly added.
    pub fn add(&self, object_id: ObjectId, ticket: SkipTicket) -> bool {
        let epoch = self.epoch.read();

        if *epoch != ticket.0 {
            return false;
        }

        self.ids.insert(object_id)
    }

    pub fn clear(&self) {
        let mut epoch = self.epoch.write();

        *epoch += 1;
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
