use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use dashmap::DashMap;
use log::{debug, error};

use crate::{Classifier, FrameState, Id, NamePlateUpdate, ObjectTable};

pub type HandlerId = Id<Box<dyn NamePlateHandler>>;

/// Receives every nameplate before it is drawn.
pub trait NamePlateHandler
where
    Self: Send + Sync,
{
    fn on_update(&self, update: &mut NamePlateUpdate, frame: &FrameState, objects: &dyn ObjectTable);
}

/// Something that emits nameplate updates, usually the game's nameplate hook.
pub trait NamePlateHost
where
    Self: Send + Sync,
{
    fn subscribe(&self, handler: Arc<dyn NamePlateHandler>) -> HandlerId;
    fn unsubscribe(&self, id: HandlerId);
}

/// Keeps a handler subscribed for as long as it lives.
pub struct HookGuard {
    host: Arc<dyn NamePlateHost>,
    id: HandlerId,
}

impl HookGuard {
    pub fn attach(host: &Arc<dyn NamePlateHost>, handler: Arc<dyn NamePlateHandler>) -> Self {
        let id = host.subscribe(handler);
        debug!("Subscribed nameplate handler {}", id);

        Self {
            host: host.clone(),
            id,
        }
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        self.host.unsubscribe(self.id);
        debug!("Unsubscribed nameplate handler {}", self.id);
    }
}

/// A [NamePlateHost] that forwards updates to every subscribed handler.
///
/// A panicking handler is contained, and the nameplate is drawn as it was before any
/// handler touched it.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<HandlerId, Arc<dyn NamePlateHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn dispatch(&self, update: &mut NamePlateUpdate, frame: &FrameState, objects: &dyn ObjectTable) {
        // Handlers are cloned out so none of them runs while a shard is locked
        let handlers: Vec<_> = self.handlers.iter().map(|h| h.value().clone()).collect();

        if handlers.is_empty() {
            return;
        }

        let original = update.clone();
        let result = catch_unwind(AssertUnwindSafe(|| {
            for handler in &handlers {
                handler.on_update(&mut *update, frame, objects);
            }
        }));

        if result.is_err() {
            error!(
                "Nameplate handler panicked on {}, leaving it as is",
                original.object_id
            );
            *update = original;
        }
    }
}

impl NamePlateHost for HandlerRegistry {
    fn subscribe(&self, handler: Arc<dyn NamePlateHandler>) -> HandlerId {
        let id = HandlerId::new();
        self.handlers.insert(id, handler);

        id
    }

    fn unsubscribe(&self, id: HandlerId) {
        self.handlers.remove(&id);
    }
}

impl NamePlateHandler for Classifier {
    fn on_update(&self, update: &mut NamePlateUpdate, frame: &FrameState, objects: &dyn ObjectTable) {
        self.process(update, frame, objects);
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::{HandlerRegistry, HookGuard, NamePlateHandler, NamePlateHost};
    use crate::{FrameState, NamePlateUpdate, ObjectId, ObjectTable, PlayerCharacter};

    struct NoObjects;

    impl ObjectTable for NoObjects {
        fn player(&self, _: ObjectId) -> Option<PlayerCharacter> {
            None
        }
    }

    struct Rename;

    impl NamePlateHandler for Rename {
        fn on_update(&self, update: &mut NamePlateUpdate, _: &FrameState, _: &dyn ObjectTable) {
            update.name = "Renamed".into();
        }
    }

    struct Explode;

    impl NamePlateHandler for Explode {
        fn on_update(&self, update: &mut NamePlateUpdate, _: &FrameState, _: &dyn ObjectTable) {
            update.name = "Half done".into();
            panic!("handler failed");
        }
    }

    #[test]
    fn guard_unsubscribes_on_drop() {
        let registry = Arc::new(HandlerRegistry::new());
        let host: Arc<dyn NamePlateHost> = registry.clone();

        let guard = HookGuard::attach(&host, Arc::new(Rename));
        assert_eq!(registry.len(), 1);

        let mut update = NamePlateUpdate::player(7, "Bryn", "BLADE");
        registry.dispatch(&mut update, &FrameState::default(), &NoObjects);
        assert_eq!(update.name.text_value(), "Renamed");

        drop(guard);
        assert!(registry.is_empty());
    }

    #[test]
    fn panic_discards_changes_of_every_handler() {
        let registry = Arc::new(HandlerRegistry::new());
        let host: Arc<dyn NamePlateHost> = registry.clone();
        let _rename = HookGuard::attach(&host, Arc::new(Rename));
        let _explode = HookGuard::attach(&host, Arc::new(Explode));

        let mut update = NamePlateUpdate::player(7, "Bryn", "BLADE");
        registry.dispatch(&mut update, &FrameState::default(), &NoObjects);

        assert_eq!(update.name.text_value(), "Bryn");
        assert_eq!(update.free_company.text_value(), "BLADE");
    }

    #[test]
    fn empty_registry_leaves_nameplate_untouched() {
        let registry = HandlerRegistry::new();

        let mut update = NamePlateUpdate::player(7, "Bryn", "BLADE");
        registry.dispatch(&mut update, &FrameState::default(), &NoObjects);

        assert_eq!(update.name.text_value(), "Bryn");
    }

    #[test]
    fn panicking_handler_leaves_nameplate_untouched() {
        let registry = Arc::new(HandlerRegistry::new());
        let host: Arc<dyn NamePlateHost> = registry.clone();
        let _guard = HookGuard::attach(&host, Arc::new(Explode));

        let mut update = NamePlateUpdate::player(7, "Bryn", "BLADE");
        registry.dispatch(&mut update, &FrameState::default(), &NoObjects);

        assert_eq!(update.name.text_value(), "Bryn");
    }
}
