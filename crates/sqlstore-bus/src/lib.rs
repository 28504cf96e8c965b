//! # sqlstore-bus
//!
//! Command/query dispatch and post-commit event publishing for `sqlstore`.
//!
//! Nothing in here is process-global. Both registries are built once at
//! startup and handed to whoever needs them:
//!
//! - **[`HandlerRegistry`]**: one handler per command/query type, dispatched
//!   by `&mut` so handlers can write their result back into the request.
//! - **[`EventBus`]**: any number of listeners per event type. It is the
//!   default [`Publisher`] handed to the store.
//! - **[`Event`]**: opaque payload queued on a session and published only
//!   after its transaction commits.

#![deny(unsafe_code)]

pub mod errors;
pub mod event;
pub mod event_bus;
pub mod registry;

pub use errors::{BusError, Result};
pub use event::{Event, NoopPublisher, Publisher};
pub use event_bus::EventBus;
pub use registry::HandlerRegistry;
