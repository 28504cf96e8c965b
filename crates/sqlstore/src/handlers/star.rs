//! Dashboard stars.

use std::collections::BTreeSet;
use std::sync::Arc;

use rusqlite::params;
use serde::Serialize;
use sqlstore_bus::HandlerRegistry;

use crate::context::Context;
use crate::errors::{Result, StoreError};
use crate::store::SqlStore;

/// Star a dashboard for a user.
#[derive(Clone, Copy, Debug)]
pub struct StarDashboardCommand {
    /// Starring user.
    pub user_id: i64,
    /// Starred dashboard.
    pub dashboard_id: i64,
}

/// Remove a user's star from a dashboard.
#[derive(Clone, Copy, Debug)]
pub struct UnstarDashboardCommand {
    /// Starring user.
    pub user_id: i64,
    /// Starred dashboard.
    pub dashboard_id: i64,
}

/// Whether a user starred a dashboard.
#[derive(Clone, Copy, Debug, Default)]
pub struct IsStarredByUserQuery {
    /// User to check.
    pub user_id: i64,
    /// Dashboard to check.
    pub dashboard_id: i64,
    /// Filled in by the handler.
    pub result: bool,
}

/// All dashboards a user starred.
#[derive(Clone, Debug, Default)]
pub struct GetUserStarsQuery {
    /// User to list stars for.
    pub user_id: i64,
    /// Filled in by the handler.
    pub result: BTreeSet<i64>,
}

/// Published after a star is committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStarred {
    /// Starring user.
    pub user_id: i64,
    /// Starred dashboard.
    pub dashboard_id: i64,
}

/// Published after a star removal is committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardUnstarred {
    /// Starring user.
    pub user_id: i64,
    /// Previously starred dashboard.
    pub dashboard_id: i64,
}

fn validate(user_id: i64, dashboard_id: i64) -> Result<()> {
    if user_id == 0 || dashboard_id == 0 {
        return Err(StoreError::Validation(
            "user id and dashboard id are required".into(),
        ));
    }
    Ok(())
}

impl SqlStore {
    /// Star a dashboard. Starring twice is a [`StoreError::Conflict`].
    pub fn star_dashboard(&self, ctx: &mut Context<'_>, cmd: &StarDashboardCommand) -> Result<()> {
        validate(cmd.user_id, cmd.dashboard_id)?;

        self.run_in_transaction(ctx, |sess| {
            let inserted = sess.insert_id(
                "star",
                "INSERT INTO star (user_id, dashboard_id) VALUES (?1, ?2)",
                params![cmd.user_id, cmd.dashboard_id],
            );
            match inserted {
                Err(e) if sess.dialect().is_unique_violation(&e) => {
                    return Err(StoreError::Conflict(format!(
                        "dashboard {} already starred by user {}",
                        cmd.dashboard_id, cmd.user_id
                    )));
                }
                Err(e) => return Err(e),
                Ok(_) => {}
            }

            sess.publish_after_commit(DashboardStarred {
                user_id: cmd.user_id,
                dashboard_id: cmd.dashboard_id,
            });
            Ok(())
        })
    }

    /// Remove a star. Returns whether a star existed.
    pub fn unstar_dashboard(
        &self,
        ctx: &mut Context<'_>,
        cmd: &UnstarDashboardCommand,
    ) -> Result<bool> {
        validate(cmd.user_id, cmd.dashboard_id)?;

        self.run_in_transaction(ctx, |sess| {
            let removed = sess.exec(
                "DELETE FROM star WHERE user_id = ?1 AND dashboard_id = ?2",
                params![cmd.user_id, cmd.dashboard_id],
            )?;
            if removed > 0 {
                sess.publish_after_commit(DashboardUnstarred {
                    user_id: cmd.user_id,
                    dashboard_id: cmd.dashboard_id,
                });
            }
            Ok(removed > 0)
        })
    }

    /// Whether `user_id` starred `dashboard_id`.
    pub fn is_starred_by_user(
        &self,
        ctx: &mut Context<'_>,
        user_id: i64,
        dashboard_id: i64,
    ) -> Result<bool> {
        self.with_db_session(ctx, |sess| {
            let hit = sess.query_opt(
                "SELECT 1 FROM star WHERE user_id = ?1 AND dashboard_id = ?2",
                params![user_id, dashboard_id],
                |row| row.get::<_, i64>(0),
            )?;
            Ok(hit.is_some())
        })
    }

    /// Dashboards starred by `user_id`.
    pub fn get_user_stars(&self, ctx: &mut Context<'_>, user_id: i64) -> Result<BTreeSet<i64>> {
        self.with_db_session(ctx, |sess| {
            let ids = sess.query_map(
                "SELECT dashboard_id FROM star WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )?;
            Ok(ids.into_iter().collect())
        })
    }
}

/// Register the star handlers.
pub fn register(registry: &mut HandlerRegistry, store: &Arc<SqlStore>) {
    let s = store.clone();
    registry.add_handler(move |cmd: &mut StarDashboardCommand| {
        Ok(s.star_dashboard(&mut Context::background(), cmd)?)
    });

    let s = store.clone();
    registry.add_handler(move |cmd: &mut UnstarDashboardCommand| {
        let _ = s.unstar_dashboard(&mut Context::background(), cmd)?;
        Ok(())
    });

    let s = store.clone();
    registry.add_handler(move |q: &mut IsStarredByUserQuery| {
        q.result = s.is_starred_by_user(&mut Context::background(), q.user_id, q.dashboard_id)?;
        Ok(())
    });

    let s = store.clone();
    registry.add_handler(move |q: &mut GetUserStarsQuery| {
        q.result = s.get_user_stars(&mut Context::background(), q.user_id)?;
        Ok(())
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
