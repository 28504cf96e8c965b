//! Execution context threaded through store calls.
//!
//! A [`Context`] optionally carries an open session. Store methods that
//! receive a context with a bound session run on that session instead of
//! opening a second transaction, so composed operations commit or roll back
//! together and a transaction never waits on its own locks.

use std::time::{Duration, Instant};

use crate::errors::{Result, StoreError};
use crate::session::DbSession;

/// Per-call execution context.
#[derive(Debug, Default)]
pub struct Context<'a> {
    session: Option<&'a mut DbSession>,
    deadline: Option<Instant>,
}

impl Context<'static> {
    /// Empty context: no bound session, no deadline.
    pub fn background() -> Self {
        Self::default()
    }
}

impl<'a> Context<'a> {
    /// Child context with `session` bound.
    pub fn with_session(session: &'a mut DbSession) -> Self {
        Self {
            session: Some(session),
            deadline: None,
        }
    }

    /// Set an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// A fresh background context sharing nothing with this one.
    ///
    /// Lock-contention retries run on a detached context, so the caller's
    /// deadline does not apply to them.
    pub fn detached(&self) -> Context<'static> {
        Context::background()
    }

    /// The bound session, if any.
    pub fn session_mut(&mut self) -> Option<&mut DbSession> {
        self.session.as_deref_mut()
    }

    /// Whether a session is bound.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail with [`StoreError::DeadlineExceeded`] once the deadline has passed.
    pub fn check_deadline(&self) -> Result<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(StoreError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}
