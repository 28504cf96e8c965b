//! Opaque event payloads and the publishing collaborator.

use std::any::{Any, TypeId};
use std::fmt;

use crate::errors::Result;

/// Something happened that downstream subscribers should learn about.
///
/// The payload is type-erased so the store never needs to know the concrete
/// event types of the handlers built on top of it. Listeners recover the
/// payload with [`Event::downcast_ref`].
pub struct Event {
    type_name: &'static str,
    payload: Box<dyn Any + Send + Sync>,
}

impl Event {
    /// Wrap a payload.
    pub fn new<T>(payload: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            type_name: short_type_name::<T>(),
            payload: Box::new(payload),
        }
    }

    /// Short type name of the payload, for logging.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// `TypeId` of the payload.
    pub fn payload_type_id(&self) -> TypeId {
        self.payload.as_ref().type_id()
    }

    /// Borrow the payload as `T`, if that is its type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// Whether the payload is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.payload.is::<T>()
    }

    pub(crate) fn payload(&self) -> &(dyn Any + Send + Sync) {
        self.payload.as_ref()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Last path segment of `T`'s type name (`a::b::Starred` → `Starred`).
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Receives events once their transaction has committed.
///
/// Invoked once per queued event, in the order the events were recorded.
/// Failures are reported back but never undo the commit.
pub trait Publisher: Send + Sync {
    /// Deliver one event.
    fn publish(&self, event: &Event) -> Result<()>;
}

/// Publisher that accepts and discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPublisher;

impl Publisher for NoopPublisher {
    fn publish(&self, _event: &Event) -> Result<()> {
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
