//! Command/query handler registry.
//!
//! Each request type has at most one handler. Requests are dispatched by
//! `&mut` so query handlers can fill in their `result` field, mirroring the
//! request/response structs the store handlers define.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use tracing::{debug, warn};

use crate::errors::{BusError, Result};
use crate::event::short_type_name;

type BoxedHandler = Box<dyn Fn(&mut dyn Any) -> Result<()> + Send + Sync>;

struct Entry {
    name: &'static str,
    handler: BoxedHandler,
}

/// Registry mapping request types to handlers.
///
/// Built once at startup and passed explicitly to callers.
pub struct HandlerRegistry {
    handlers: HashMap<TypeId, Entry>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register the handler for request type `Q`.
    ///
    /// A second registration for the same type replaces the first.
    pub fn add_handler<Q, F>(&mut self, handler: F)
    where
        Q: Any,
        F: Fn(&mut Q) -> Result<()> + Send + Sync + 'static,
    {
        let name = short_type_name::<Q>();
        let boxed: BoxedHandler = Box::new(move |request: &mut dyn Any| {
            match request.downcast_mut::<Q>() {
                Some(request) => handler(request),
                None => Err(BusError::NoHandler(name)),
            }
        });
        let previous = self.handlers.insert(
            TypeId::of::<Q>(),
            Entry {
                name,
                handler: boxed,
            },
        );
        if previous.is_some() {
            warn!(request = name, "handler replaced");
        }
    }

    /// Dispatch a request to its handler.
    pub fn dispatch<Q: Any>(&self, request: &mut Q) -> Result<()> {
        let Some(entry) = self.handlers.get(&TypeId::of::<Q>()) else {
            return Err(BusError::NoHandler(short_type_name::<Q>()));
        };
        debug!(request = entry.name, "dispatching");
        (entry.handler)(request)
    }

    /// Whether a handler is registered for `Q`.
    pub fn has_handler<Q: Any>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<Q>())
    }

    /// Names of all registered request types (sorted).
    pub fn request_types(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.values().map(|e| e.name).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
