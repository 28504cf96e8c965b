//! Command and query handlers for the bundled entities.
//!
//! Each entity module adds its operations to [`SqlStore`] as methods taking
//! a [`Context`](crate::context::Context), so they compose inside
//! [`SqlStore::in_transaction_with`], and exposes a `register` function that
//! wires them into a [`HandlerRegistry`].

pub mod playlist;
pub mod star;

use std::sync::Arc;

use sqlstore_bus::HandlerRegistry;
use tracing::info;

use crate::store::SqlStore;

/// Register every bundled handler against `store`.
pub fn register_all(registry: &mut HandlerRegistry, store: Arc<SqlStore>) {
    star::register(registry, &store);
    playlist::register(registry, &store);
    info!(handlers = registry.len(), "sql handlers registered");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::recording_store;

    #[test]
    fn registers_every_request_type() {
        let (_dir, store, _rec) = recording_store();
        let mut registry = HandlerRegistry::new();
        register_all(&mut registry, Arc::new(store));

        assert_eq!(registry.len(), 10);
        assert!(registry.has_handler::<star::StarDashboardCommand>());
        assert!(registry.has_handler::<playlist::GetPlaylistItemsByIdQuery>());
    }
}
