//! Transactional executor.
//!
//! Runs a unit of work inside `BEGIN`/`COMMIT`, rolls back on failure,
//! retries lock contention a bounded number of times, and publishes the
//! session's queued events only after a successful commit.
//!
//! Only lock contention is retried: it is the one failure known to leave
//! nothing applied, so running the unit of work again cannot double-apply
//! a side effect. Everything else surfaces to the caller unchanged.

use std::thread;

use sqlstore_bus::Event;
use tracing::{error, info, warn};

use crate::context::Context;
use crate::errors::{Result, StoreError};
use crate::session::DbSession;
use crate::store::SqlStore;

/// How a single attempt ended.
enum Attempt<T> {
    /// Committed, or failed in a way that must not be retried.
    Finished(Result<T>),
    /// Rolled back after lock contention; safe to run again.
    Contended(StoreError),
}

impl SqlStore {
    /// Run `work` inside a transaction.
    ///
    /// If `ctx` already carries a session, `work` runs on it directly and
    /// the owner of that session decides whether to commit. Otherwise a new
    /// session is opened with `BEGIN`, and:
    ///
    /// - `work` succeeds → `COMMIT`, then every queued event is published in
    ///   record order. Publish failures are logged and do not change the
    ///   result.
    /// - `work` reports lock contention and retries remain → `ROLLBACK`,
    ///   sleep, and run again on a fresh session and a detached context.
    /// - any other failure → `ROLLBACK` and return the failure unchanged.
    ///
    /// A failing rollback is reported together with the failure that caused
    /// it. A failing commit is returned as-is.
    pub fn run_in_transaction<T, F>(&self, ctx: &mut Context<'_>, mut work: F) -> Result<T>
    where
        F: FnMut(&mut DbSession) -> Result<T>,
    {
        if let Some(sess) = ctx.session_mut() {
            return work(sess);
        }

        let mut retry = 0;
        let mut outcome = self.attempt(ctx, &mut work, retry);
        loop {
            match outcome {
                Attempt::Finished(result) => return result,
                Attempt::Contended(err) => {
                    info!(error = %err, retry, "database locked, sleeping then retrying");
                    thread::sleep(self.retry_settings().retry_delay());
                    retry += 1;
                    // Retries run detached from the caller's deadline.
                    let mut detached = ctx.detached();
                    outcome = self.attempt(&mut detached, &mut work, retry);
                }
            }
        }
    }

    /// Same as [`run_in_transaction`](Self::run_in_transaction).
    pub fn with_transactional_db_session<T, F>(&self, ctx: &mut Context<'_>, work: F) -> Result<T>
    where
        F: FnMut(&mut DbSession) -> Result<T>,
    {
        self.run_in_transaction(ctx, work)
    }

    /// Run `work` in a transaction on a background context.
    pub fn in_transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: FnMut(&mut DbSession) -> Result<T>,
    {
        self.run_in_transaction(&mut Context::background(), work)
    }

    /// Run `f` in a transaction, handing it a context with the transaction's
    /// session bound.
    ///
    /// Store calls made with that context join the transaction: they commit
    /// together, and a failure in any of them rolls back all of them.
    pub fn in_transaction_with<T, F>(&self, ctx: &mut Context<'_>, mut f: F) -> Result<T>
    where
        F: FnMut(&mut Context<'_>) -> Result<T>,
    {
        self.run_in_transaction(ctx, |sess| f(&mut Context::with_session(sess)))
    }

    fn attempt<T, F>(&self, ctx: &mut Context<'_>, work: &mut F, retry: u32) -> Attempt<T>
    where
        F: FnMut(&mut DbSession) -> Result<T>,
    {
        let mut sess = match self.resolve_or_create(ctx, true) {
            Ok(sess) => sess,
            Err(err) => return Attempt::Finished(Err(err)),
        };

        let value = match work(&mut *sess) {
            Ok(value) => value,
            Err(err) => {
                let retryable = retry < self.retry_settings().max_retries
                    && self.dialect().is_lock_contention(&err);
                if let Err(rollback) = sess.rollback() {
                    warn!(error = %err, rollback_error = %rollback, "rollback failed");
                    return Attempt::Finished(Err(StoreError::rollback_failed(err, rollback)));
                }
                return if retryable {
                    Attempt::Contended(err)
                } else {
                    Attempt::Finished(Err(err))
                };
            }
        };

        if let Err(err) = sess.commit() {
            return Attempt::Finished(Err(err));
        }

        let events = sess.take_events();
        drop(sess);
        self.publish_events(events);
        Attempt::Finished(Ok(value))
    }

    fn publish_events(&self, events: Vec<Event>) {
        for event in events {
            if let Err(err) = self.publisher().publish(&event) {
                error!(
                    event = event.type_name(),
                    error = %err,
                    "failed to publish event after commit"
                );
            }
        }
    }
}
