use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use hope_types::models::{Commitment, CommitmentStatus};

use super::enum_column;
use crate::Database;
use crate::models::NewCommitment;

const COMMITMENT_COLUMNS: &str = "id, campaign_id, email, supporter_name, tier, amount_cents, status, source, \
     checkout_session_id, subscription_id, created_at";

impl Database {
    pub fn insert_commitment(&self, new: &NewCommitment<'_>) -> Result<Commitment> {
        self.transaction(|conn| {
            conn.execute(
                "INSERT INTO commitments (id, campaign_id, email, supporter_name, tier, amount_cents, source)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    new.id,
                    new.campaign_id,
                    new.email.map(str::to_lowercase),
                    new.supporter_name,
                    new.tier,
                    new.amount_cents,
                    new.source.as_str(),
                ],
            )?;
            query_commitment(conn, "id", new.id)?
                .ok_or_else(|| anyhow::anyhow!("commitment {} vanished after insert", new.id))
        })
    }

    pub fn get_commitment(&self, id: &str) -> Result<Option<Commitment>> {
        self.with_conn(|conn| query_commitment(conn, "id", id))
    }

    pub fn attach_checkout_session(&self, id: &str, session_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE commitments SET checkout_session_id = ?1 WHERE id = ?2",
                (session_id, id),
            )?;
            Ok(())
        })
    }

    /// Drops a commitment that never reached the payments provider.
    pub fn delete_pending_commitment(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM commitments WHERE id = ?1 AND status = ?2",
                (id, CommitmentStatus::Pending.as_str()),
            )?;
            Ok(())
        })
    }

    /// Activates the commitment behind a completed checkout session.
    ///
    /// The first activation also increments the campaign's supporter_count in
    /// the same transaction; repeated deliveries of the same event are no-ops.
    pub fn activate_commitment(&self, session_id: &str, subscription_id: Option<&str>) -> Result<Option<Commitment>> {
        self.transaction(|conn| {
            let Some(commitment) = query_commitment(conn, "checkout_session_id", session_id)? else {
                return Ok(None);
            };
            if commitment.status != CommitmentStatus::Pending {
                return Ok(Some(commitment));
            }

            conn.execute(
                "UPDATE commitments SET status = ?1, subscription_id = COALESCE(?2, subscription_id) WHERE id = ?3",
                rusqlite::params![CommitmentStatus::Active.as_str(), subscription_id, &commitment.id],
            )?;
            conn.execute(
                "UPDATE campaigns SET supporter_count = supporter_count + 1 WHERE id = ?1",
                [&commitment.campaign_id],
            )?;

            query_commitment(conn, "id", &commitment.id)
        })
    }

    pub fn cancel_subscription_commitments(&self, subscription_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE commitments SET status = ?1 WHERE subscription_id = ?2",
                (CommitmentStatus::Canceled.as_str(), subscription_id),
            )?)
        })
    }

    pub fn set_commitment_status(&self, id: &str, status: CommitmentStatus) -> Result<Option<Commitment>> {
        self.transaction(|conn| {
            conn.execute("UPDATE commitments SET status = ?1 WHERE id = ?2", (status.as_str(), id))?;
            query_commitment(conn, "id", id)
        })
    }

    pub fn list_commitments_for_email(&self, email: &str) -> Result<Vec<Commitment>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM commitments WHERE email = ?1 ORDER BY created_at DESC, rowid DESC",
                COMMITMENT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([email.trim().to_lowercase()], map_commitment)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn map_commitment(row: &Row<'_>) -> rusqlite::Result<Commitment> {
    Ok(Commitment {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        email: row.get(2)?,
        supporter_name: row.get(3)?,
        tier: row.get(4)?,
        amount_cents: row.get(5)?,
        status: enum_column(row, 6)?,
        source: enum_column(row, 7)?,
        checkout_session_id: row.get(8)?,
        subscription_id: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn query_commitment(conn: &Connection, column: &str, value: &str) -> Result<Option<Commitment>> {
    let sql = format!("SELECT {} FROM commitments WHERE {} = ?1", COMMITMENT_COLUMNS, column);
    Ok(conn.query_row(&sql, [value], map_commitment).optional()?)
}
