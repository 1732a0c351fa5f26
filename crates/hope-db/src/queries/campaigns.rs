use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use hope_types::ident::CampaignRef;
use hope_types::models::{Campaign, CampaignStatus, MemberRole};

use super::{enum_column, update_columns};
use crate::Database;
use crate::models::{ClaimOutcome, NewCampaign};

pub(crate) const CAMPAIGN_COLUMNS: &str = "id, slug, patient_name, title, story, status, monthly_goal_cents, \
     leaf_count, supporter_count, patient_email, sanctuary_claimed, sanctuary_claimed_by, \
     sanctuary_start_date, created_at";

impl Database {
    /// Inserts a campaign. `None` when the slug is already taken.
    pub fn create_campaign(&self, new: &NewCampaign<'_>) -> Result<Option<Campaign>> {
        self.transaction(|conn| {
            if query_campaign(conn, "slug", new.slug)?.is_some() {
                return Ok(None);
            }
            conn.execute(
                "INSERT INTO campaigns (id, slug, patient_name, title, story, status, monthly_goal_cents, patient_email)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    new.id,
                    new.slug,
                    new.patient_name,
                    new.title,
                    new.story,
                    new.status.as_str(),
                    new.monthly_goal_cents,
                    new.patient_email,
                ],
            )?;

            query_campaign(conn, "id", new.id)
        })
    }

    pub fn get_campaign_by_id(&self, id: &str) -> Result<Option<Campaign>> {
        self.with_conn(|conn| query_campaign(conn, "id", id))
    }

    pub fn get_campaign_by_slug(&self, slug: &str) -> Result<Option<Campaign>> {
        self.with_conn(|conn| query_campaign(conn, "slug", slug))
    }

    /// Resolves an id-or-slug reference.
    pub fn get_campaign(&self, reference: CampaignRef<'_>) -> Result<Option<Campaign>> {
        match reference {
            CampaignRef::Id(id) => self.get_campaign_by_id(id),
            CampaignRef::Slug(slug) => self.get_campaign_by_slug(slug),
        }
    }

    /// All campaigns, newest first, optionally restricted to one status.
    pub fn list_campaigns(&self, status: Option<CampaignStatus>) -> Result<Vec<Campaign>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM campaigns WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at DESC, rowid DESC",
                CAMPAIGN_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([status.map(CampaignStatus::as_str)], map_campaign)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Applies allow-listed column changes. `None` when the campaign does not exist.
    pub fn update_campaign(&self, id: &str, changes: &[(&'static str, Value)]) -> Result<Option<Campaign>> {
        self.transaction(|conn| {
            if !changes.is_empty() {
                update_columns(conn, "campaigns", &[("id", id)], changes, false)?;
            }
            query_campaign(conn, "id", id)
        })
    }

    /// Deletes a campaign together with its leaves, commitments and Sanctuary records.
    pub fn delete_campaign(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM campaigns WHERE id = ?1", [id])? > 0))
    }

    /// Claims the Sanctuary for `user_id` starting on `start_date` and makes
    /// them the campaign's patient member, in one transaction.
    pub fn claim_sanctuary(&self, campaign_id: &str, user_id: &str, start_date: NaiveDate) -> Result<ClaimOutcome> {
        self.transaction(|conn| {
            let Some(campaign) = query_campaign(conn, "id", campaign_id)? else {
                return Ok(ClaimOutcome::CampaignMissing);
            };
            if campaign.sanctuary_claimed {
                return Ok(ClaimOutcome::AlreadyClaimed);
            }

            conn.execute(
                "UPDATE campaigns
                 SET sanctuary_claimed = 1, sanctuary_claimed_by = ?1, sanctuary_start_date = ?2
                 WHERE id = ?3",
                rusqlite::params![user_id, start_date, campaign_id],
            )?;
            conn.execute(
                "INSERT INTO memberships (id, campaign_id, user_id, role) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(campaign_id, user_id) DO UPDATE SET role = excluded.role",
                rusqlite::params![
                    Uuid::new_v4().to_string(),
                    campaign_id,
                    user_id,
                    MemberRole::Patient.as_str(),
                ],
            )?;

            let claimed = query_campaign(conn, "id", campaign_id)?
                .ok_or_else(|| anyhow::anyhow!("campaign {} vanished during claim", campaign_id))?;
            Ok(ClaimOutcome::Claimed(claimed))
        })
    }
}

pub(crate) fn map_campaign(row: &Row<'_>) -> rusqlite::Result<Campaign> {
    Ok(Campaign {
        id: row.get(0)?,
        slug: row.get(1)?,
        patient_name: row.get(2)?,
        title: row.get(3)?,
        story: row.get(4)?,
        status: enum_column(row, 5)?,
        monthly_goal_cents: row.get(6)?,
        leaf_count: row.get(7)?,
        supporter_count: row.get(8)?,
        patient_email: row.get(9)?,
        sanctuary_claimed: row.get(10)?,
        sanctuary_claimed_by: row.get(11)?,
        sanctuary_start_date: row.get(12)?,
        created_at: row.get(13)?,
    })
}

/// `column` is always a literal from this crate.
pub(crate) fn query_campaign(conn: &Connection, column: &str, value: &str) -> Result<Option<Campaign>> {
    let sql = format!("SELECT {} FROM campaigns WHERE {} = ?1", CAMPAIGN_COLUMNS, column);
    Ok(conn.query_row(&sql, [value], map_campaign).optional()?)
}
