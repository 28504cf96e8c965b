//! In-process event bus.
//!
//! Listeners subscribe to a concrete event type. Publishing calls the
//! listeners for the event's payload type in registration order and stops
//! at the first one that fails.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::errors::Result;
use crate::event::{Event, Publisher};

type BoxedListener = Arc<dyn Fn(&dyn Any) -> Result<()> + Send + Sync>;

/// Event bus keyed by payload type.
///
/// Listeners may be added after the bus has been shared, so a store can be
/// built with the bus before every subscriber exists.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<TypeId, Vec<BoxedListener>>>,
}

impl EventBus {
    /// Create a bus with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events whose payload is an `E`.
    pub fn add_listener<E, F>(&self, listener: F)
    where
        E: Any,
        F: Fn(&E) -> Result<()> + Send + Sync + 'static,
    {
        let boxed: BoxedListener = Arc::new(move |payload: &dyn Any| {
            match payload.downcast_ref::<E>() {
                Some(event) => listener(event),
                None => Ok(()),
            }
        });
        self.listeners
            .write()
            .entry(TypeId::of::<E>())
            .or_default()
            .push(boxed);
    }

    /// Number of listeners subscribed to `E`.
    pub fn listener_count<E: Any>(&self) -> usize {
        self.listeners
            .read()
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }
}

impl Publisher for EventBus {
    fn publish(&self, event: &Event) -> Result<()> {
        // Clone the listener list so listeners may subscribe more listeners.
        let listeners = self
            .listeners
            .read()
            .get(&event.payload_type_id())
            .cloned()
            .unwrap_or_default();

        trace!(event = event.type_name(), listeners = listeners.len(), "publishing");

        let payload: &dyn Any = event.payload();
        for listener in &listeners {
            listener(payload)?;
        }
        Ok(())
    }
}
