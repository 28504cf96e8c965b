//! Shared fixtures for unit tests.

use std::sync::Arc;

use parking_lot::Mutex;
use sqlstore_bus::EventBus;
use sqlstore_settings::StoreSettings;
use tempfile::TempDir;

use crate::handlers::playlist::{PlaylistCreated, PlaylistDeleted, PlaylistUpdated};
use crate::handlers::star::{DashboardStarred, DashboardUnstarred};
use crate::store::SqlStore;

/// Names and starred payloads of every event published, in order.
#[derive(Clone, Default)]
pub(crate) struct Recorded {
    names: Arc<Mutex<Vec<&'static str>>>,
    starred: Arc<Mutex<Vec<DashboardStarred>>>,
}

impl Recorded {
    pub(crate) fn events(&self) -> Vec<&'static str> {
        self.names.lock().clone()
    }

    pub(crate) fn starred(&self) -> Vec<DashboardStarred> {
        self.starred.lock().clone()
    }

    fn subscribe(&self, bus: &EventBus) {
        let (names, starred) = (self.names.clone(), self.starred.clone());
        bus.add_listener(move |e: &DashboardStarred| {
            names.lock().push("DashboardStarred");
            starred.lock().push(*e);
            Ok(())
        });
        let names = self.names.clone();
        bus.add_listener(move |_: &DashboardUnstarred| {
            names.lock().push("DashboardUnstarred");
            Ok(())
        });
        let names = self.names.clone();
        bus.add_listener(move |_: &PlaylistCreated| {
            names.lock().push("PlaylistCreated");
            Ok(())
        });
        let names = self.names.clone();
        bus.add_listener(move |_: &PlaylistUpdated| {
            names.lock().push("PlaylistUpdated");
            Ok(())
        });
        let names = self.names.clone();
        bus.add_listener(move |_: &PlaylistDeleted| {
            names.lock().push("PlaylistDeleted");
            Ok(())
        });
    }
}

/// A file-backed store with the schema in place and an event bus that
/// records what it publishes.
pub(crate) fn recording_store() -> (TempDir, SqlStore, Recorded) {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = StoreSettings::default();
    settings.database.path = "test.db".into();
    settings.database.pool_size = 2;

    let bus = Arc::new(EventBus::new());
    let recorded = Recorded::default();
    recorded.subscribe(&bus);

    let store = SqlStore::open(&settings, dir.path(), bus).unwrap();
    (dir, store, recorded)
}
