use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use hope_types::models::Leaf;
use hope_types::placement::leaf_position;

use crate::Database;
use crate::models::NewLeaf;

const LEAF_COLUMNS: &str =
    "id, campaign_id, author_name, message, is_public, position_x, position_y, created_at";

impl Database {
    /// Inserts a leaf at the next spiral position and bumps the campaign's
    /// leaf_count.
    ///
    /// The spiral index comes from `leaf_seq`, which only grows: deleted leaves
    /// keep their slot, so a new leaf never lands on a live one. Reading and
    /// bumping the sequence happen in one transaction.
    /// Returns `None` when the campaign does not exist.
    pub fn insert_leaf(&self, campaign_id: &str, new: &NewLeaf<'_>) -> Result<Option<Leaf>> {
        self.transaction(|conn| {
            let seq: Option<i64> = conn
                .query_row("SELECT leaf_seq FROM campaigns WHERE id = ?1", [campaign_id], |row| row.get(0))
                .optional()?;
            let Some(seq) = seq else {
                return Ok(None);
            };

            let position = leaf_position(u64::try_from(seq).unwrap_or(0));
            conn.execute(
                "INSERT INTO leaves (id, campaign_id, author_name, message, is_public, position_x, position_y)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    new.id,
                    campaign_id,
                    new.author_name,
                    new.message,
                    new.is_public,
                    position.x,
                    position.y,
                ],
            )?;
            conn.execute(
                "UPDATE campaigns SET leaf_count = leaf_count + 1, leaf_seq = leaf_seq + 1 WHERE id = ?1",
                [campaign_id],
            )?;

            query_leaf(conn, new.id)
        })
    }

    /// Live leaves of a campaign in creation order.
    pub fn list_leaves(&self, campaign_id: &str, public_only: bool) -> Result<Vec<Leaf>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM leaves WHERE campaign_id = ?1 AND deleted_at IS NULL AND (?2 = 0 OR is_public = 1)
                 ORDER BY created_at ASC, rowid ASC",
                LEAF_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![campaign_id, public_only], map_leaf)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn set_leaf_visibility(&self, id: &str, is_public: bool) -> Result<Option<Leaf>> {
        self.transaction(|conn| {
            conn.execute("UPDATE leaves SET is_public = ?1 WHERE id = ?2 AND deleted_at IS NULL", rusqlite::params![is_public, id])?;
            query_leaf(conn, id)
        })
    }

    /// Marks a leaf deleted and decrements its campaign's leaf_count.
    pub fn delete_leaf(&self, id: &str) -> Result<bool> {
        self.transaction(|conn| {
            let campaign_id: Option<String> = conn
                .query_row(
                    "SELECT campaign_id FROM leaves WHERE id = ?1 AND deleted_at IS NULL",
                    [id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(campaign_id) = campaign_id else {
                return Ok(false);
            };

            conn.execute("UPDATE leaves SET deleted_at = datetime('now') WHERE id = ?1", [id])?;
            conn.execute(
                "UPDATE campaigns SET leaf_count = MAX(leaf_count - 1, 0) WHERE id = ?1",
                [&campaign_id],
            )?;
            Ok(true)
        })
    }
}

fn map_leaf(row: &Row<'_>) -> rusqlite::Result<Leaf> {
    Ok(Leaf {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        author_name: row.get(2)?,
        message: row.get(3)?,
        is_public: row.get(4)?,
        position_x: row.get(5)?,
        position_y: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn query_leaf(conn: &Connection, id: &str) -> Result<Option<Leaf>> {
    let sql = format!("SELECT {} FROM leaves WHERE id = ?1 AND deleted_at IS NULL", LEAF_COLUMNS);
    Ok(conn.query_row(&sql, [id], map_leaf).optional()?)
}
