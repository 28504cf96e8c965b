//! Error types for command dispatch and event publishing.

use thiserror::Error;

/// Errors raised while dispatching a request or publishing an event.
#[derive(Debug, Error)]
pub enum BusError {
    /// No handler is registered for the request type.
    #[error("no handler registered for {0}")]
    NoHandler(&'static str),

    /// The handler ran and failed.
    #[error("handler failed: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A listener rejected a published event.
    #[error("listener failed for {event}: {message}")]
    Listener {
        /// Type name of the event being published.
        event: &'static str,
        /// What the listener reported.
        message: String,
    },
}

impl BusError {
    /// Wrap any error returned from inside a handler.
    pub fn handler<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Handler(Box::new(err))
    }
}

/// Convenience type alias for bus results.
pub type Result<T> = std::result::Result<T, BusError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_handler_display() {
        let err = BusError::NoHandler("GetUserStarsQuery");
        assert_eq!(err.to_string(), "no handler registered for GetUserStarsQuery");
    }

    #[test]
    fn listener_display() {
        let err = BusError::Listener {
            event: "PlaylistDeleted",
            message: "subscriber gone".into(),
        };
        assert_eq!(
            err.to_string(),
            "listener failed for PlaylistDeleted: subscriber gone"
        );
    }

    #[test]
    fn handler_keeps_source() {
        let io = std::io::Error::other("disk full");
        let err = BusError::handler(io);
        assert!(err.to_string().contains("disk full"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
