//! Playlists and their items.
//!
//! A playlist and its items are always written in one transaction. Items
//! are replaced wholesale on update and renumbered from 1 in the order
//! given.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::{Row, params};
use serde::Serialize;
use sqlstore_bus::HandlerRegistry;
use tracing::debug;

use crate::context::Context;
use crate::errors::{Result, StoreError};
use crate::session::DbSession;
use crate::store::SqlStore;

/// A stored playlist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    /// Row id.
    pub id: i64,
    /// Owning organization.
    pub org_id: i64,
    /// Display name.
    pub name: String,
    /// Rotation interval, e.g. `"5m"`.
    pub interval: String,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 time of the last update.
    pub updated_at: String,
}

/// A stored playlist entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    /// Row id.
    pub id: i64,
    /// Owning playlist.
    pub playlist_id: i64,
    /// Entry kind, e.g. `"dashboard_by_id"`.
    #[serde(rename = "type")]
    pub item_type: String,
    /// Kind-specific value.
    pub value: String,
    /// Position within the playlist.
    pub order: i64,
    /// Display title.
    pub title: String,
}

/// An entry as supplied by a create or update command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaylistItemInput {
    /// Entry kind.
    pub item_type: String,
    /// Kind-specific value.
    pub value: String,
    /// Position. Ignored on update.
    pub order: i64,
    /// Display title.
    pub title: String,
}

/// Create a playlist with its items.
#[derive(Clone, Debug, Default)]
pub struct CreatePlaylistCommand {
    /// Owning organization.
    pub org_id: i64,
    /// Display name.
    pub name: String,
    /// Rotation interval.
    pub interval: String,
    /// Entries, stored with the order they carry.
    pub items: Vec<PlaylistItemInput>,
    /// Filled in by the handler.
    pub result: Option<Playlist>,
}

/// Rename a playlist and replace its items.
#[derive(Clone, Debug, Default)]
pub struct UpdatePlaylistCommand {
    /// Playlist to update.
    pub id: i64,
    /// Owning organization; must match.
    pub org_id: i64,
    /// New name.
    pub name: String,
    /// New interval.
    pub interval: String,
    /// New entries, renumbered from 1.
    pub items: Vec<PlaylistItemInput>,
    /// Filled in by the handler.
    pub result: Option<Playlist>,
}

/// Delete a playlist and its items.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeletePlaylistCommand {
    /// Playlist to delete.
    pub id: i64,
    /// Owning organization; must match.
    pub org_id: i64,
}

/// Look a playlist up by id.
#[derive(Clone, Debug, Default)]
pub struct GetPlaylistByIdQuery {
    /// Playlist id.
    pub id: i64,
    /// Filled in by the handler; `None` when absent.
    pub result: Option<Playlist>,
}

/// List an organization's playlists.
#[derive(Clone, Debug, Default)]
pub struct SearchPlaylistsQuery {
    /// Organization to list.
    pub org_id: i64,
    /// Optional `LIKE` pattern on the name.
    pub name: Option<String>,
    /// Maximum rows; 0 means no limit.
    pub limit: u32,
    /// Filled in by the handler.
    pub result: Vec<Playlist>,
}

/// List the entries of a playlist.
#[derive(Clone, Debug, Default)]
pub struct GetPlaylistItemsByIdQuery {
    /// Playlist id.
    pub playlist_id: i64,
    /// Filled in by the handler, ordered by position.
    pub result: Vec<PlaylistItem>,
}

/// Published after a playlist is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistCreated {
    /// New playlist id.
    pub id: i64,
    /// Owning organization.
    pub org_id: i64,
}

/// Published after a playlist is updated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistUpdated {
    /// Playlist id.
    pub id: i64,
    /// Owning organization.
    pub org_id: i64,
}

/// Published after a playlist is deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistDeleted {
    /// Deleted playlist id.
    pub id: i64,
    /// Owning organization.
    pub org_id: i64,
}

const PLAYLIST_COLUMNS: &str = "id, org_id, name, interval, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, playlist_id, type, value, sort_order, title";

fn map_playlist(row: &Row<'_>) -> rusqlite::Result<Playlist> {
    Ok(Playlist {
        id: row.get(0)?,
        org_id: row.get(1)?,
        name: row.get(2)?,
        interval: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn map_item(row: &Row<'_>) -> rusqlite::Result<PlaylistItem> {
    Ok(PlaylistItem {
        id: row.get(0)?,
        playlist_id: row.get(1)?,
        item_type: row.get(2)?,
        value: row.get(3)?,
        order: row.get(4)?,
        title: row.get(5)?,
    })
}

fn require_id(id: i64, what: &str) -> Result<()> {
    if id == 0 {
        return Err(StoreError::Validation(format!("{what} is required")));
    }
    Ok(())
}

fn insert_item(sess: &DbSession, playlist_id: i64, item: &PlaylistItemInput, order: i64) -> Result<()> {
    let _ = sess.insert_id(
        "playlist_item",
        "INSERT INTO playlist_item (playlist_id, type, value, sort_order, title)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![playlist_id, item.item_type, item.value, order, item.title],
    )?;
    Ok(())
}

fn find_playlist(sess: &DbSession, id: i64) -> Result<Option<Playlist>> {
    sess.query_opt(
        &format!("SELECT {PLAYLIST_COLUMNS} FROM playlist WHERE id = ?1"),
        params![id],
        map_playlist,
    )
}

impl SqlStore {
    /// Create a playlist and its items.
    pub fn create_playlist(
        &self,
        ctx: &mut Context<'_>,
        cmd: &CreatePlaylistCommand,
    ) -> Result<Playlist> {
        self.run_in_transaction(ctx, |sess| {
            let now = Utc::now().to_rfc3339();
            let id = sess.insert_id(
                "playlist",
                "INSERT INTO playlist (org_id, name, interval, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![cmd.org_id, cmd.name, cmd.interval, now],
            )?;
            for item in &cmd.items {
                insert_item(sess, id, item, item.order)?;
            }
            debug!(playlist_id = id, items = cmd.items.len(), "playlist created");

            sess.publish_after_commit(PlaylistCreated {
                id,
                org_id: cmd.org_id,
            });
            Ok(Playlist {
                id,
                org_id: cmd.org_id,
                name: cmd.name.clone(),
                interval: cmd.interval.clone(),
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    /// Rename a playlist and replace its items.
    ///
    /// [`StoreError::NotFound`] when no playlist has this id in this org.
    pub fn update_playlist(
        &self,
        ctx: &mut Context<'_>,
        cmd: &UpdatePlaylistCommand,
    ) -> Result<Playlist> {
        require_id(cmd.id, "playlist id")?;

        self.run_in_transaction(ctx, |sess| {
            let now = Utc::now().to_rfc3339();
            let updated = sess.exec(
                "UPDATE playlist SET name = ?1, interval = ?2, updated_at = ?3
                 WHERE id = ?4 AND org_id = ?5",
                params![cmd.name, cmd.interval, now, cmd.id, cmd.org_id],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("playlist {}", cmd.id)));
            }

            let _ = sess.exec(
                "DELETE FROM playlist_item WHERE playlist_id = ?1",
                params![cmd.id],
            )?;
            for (position, item) in (1_i64..).zip(&cmd.items) {
                insert_item(sess, cmd.id, item, position)?;
            }

            sess.publish_after_commit(PlaylistUpdated {
                id: cmd.id,
                org_id: cmd.org_id,
            });
            find_playlist(sess, cmd.id)?
                .ok_or_else(|| StoreError::Internal(format!("playlist {} vanished", cmd.id)))
        })
    }

    /// Delete a playlist and its items. Returns whether it existed.
    pub fn delete_playlist(&self, ctx: &mut Context<'_>, cmd: &DeletePlaylistCommand) -> Result<bool> {
        require_id(cmd.id, "playlist id")?;

        self.run_in_transaction(ctx, |sess| {
            let removed = sess.exec(
                "DELETE FROM playlist WHERE id = ?1 AND org_id = ?2",
                params![cmd.id, cmd.org_id],
            )?;
            if removed == 0 {
                return Ok(false);
            }
            let _ = sess.exec(
                "DELETE FROM playlist_item WHERE playlist_id = ?1",
                params![cmd.id],
            )?;
            sess.publish_after_commit(PlaylistDeleted {
                id: cmd.id,
                org_id: cmd.org_id,
            });
            Ok(true)
        })
    }

    /// Playlist by id, if any.
    pub fn get_playlist(&self, ctx: &mut Context<'_>, id: i64) -> Result<Option<Playlist>> {
        require_id(id, "playlist id")?;
        self.with_db_session(ctx, |sess| find_playlist(sess, id))
    }

    /// Playlists of `org_id`, optionally filtered by a `LIKE` pattern on the
    /// name. A `limit` of 0 returns every match.
    pub fn search_playlists(
        &self,
        ctx: &mut Context<'_>,
        org_id: i64,
        name: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Playlist>> {
        // SQLite treats a negative LIMIT as no limit.
        let limit = if limit == 0 { -1 } else { i64::from(limit) };
        self.with_db_session(ctx, |sess| match name.filter(|n| !n.is_empty()) {
            Some(pattern) => sess.query_map(
                &format!(
                    "SELECT {PLAYLIST_COLUMNS} FROM playlist
                     WHERE org_id = ?1 AND name LIKE ?2 ORDER BY id LIMIT ?3"
                ),
                params![org_id, pattern, limit],
                map_playlist,
            ),
            None => sess.query_map(
                &format!(
                    "SELECT {PLAYLIST_COLUMNS} FROM playlist
                     WHERE org_id = ?1 ORDER BY id LIMIT ?2"
                ),
                params![org_id, limit],
                map_playlist,
            ),
        })
    }

    /// Entries of a playlist, by position.
    pub fn get_playlist_items(
        &self,
        ctx: &mut Context<'_>,
        playlist_id: i64,
    ) -> Result<Vec<PlaylistItem>> {
        require_id(playlist_id, "playlist id")?;
        self.with_db_session(ctx, |sess| {
            sess.query_map(
                &format!(
                    "SELECT {ITEM_COLUMNS} FROM playlist_item
                     WHERE playlist_id = ?1 ORDER BY sort_order, id"
                ),
                params![playlist_id],
                map_item,
            )
        })
    }
}

/// Register the playlist handlers.
pub fn register(registry: &mut HandlerRegistry, store: &Arc<SqlStore>) {
    let s = store.clone();
    registry.add_handler(move |cmd: &mut CreatePlaylistCommand| {
        cmd.result = Some(s.create_playlist(&mut Context::background(), cmd)?);
        Ok(())
    });

    let s = store.clone();
    registry.add_handler(move |cmd: &mut UpdatePlaylistCommand| {
        cmd.result = Some(s.update_playlist(&mut Context::background(), cmd)?);
        Ok(())
    });

    let s = store.clone();
    registry.add_handler(move |cmd: &mut DeletePlaylistCommand| {
        let _ = s.delete_playlist(&mut Context::background(), cmd)?;
        Ok(())
    });

    let s = store.clone();
    registry.add_handler(move |q: &mut GetPlaylistByIdQuery| {
        q.result = s.get_playlist(&mut Context::background(), q.id)?;
        Ok(())
    });

    let s = store.clone();
    registry.add_handler(move |q: &mut SearchPlaylistsQuery| {
        q.result =
            s.search_playlists(&mut Context::background(), q.org_id, q.name.as_deref(), q.limit)?;
        Ok(())
    });

    let s = store.clone();
    registry.add_handler(move |q: &mut GetPlaylistItemsByIdQuery| {
        q.result = s.get_playlist_items(&mut Context::background(), q.playlist_id)?;
        Ok(())
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
