use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use hope_types::models::{BridgeCampaign, BridgeOutreach, BridgeStatus};

use super::enum_column;
use crate::Database;
use crate::models::{NewBridge, NewOutreach};

const BRIDGE_COLUMNS: &str =
    "id, slug, gofundme_url, patient_name, organizer_name, campaign_id, status, created_at";
const OUTREACH_COLUMNS: &str =
    "id, bridge_campaign_id, channel, message, outcome, created_by, created_at";

impl Database {
    // -- Bridge campaigns --

    /// Inserts a bridge campaign. `None` when the slug is already taken.
    pub fn create_bridge(&self, new: &NewBridge<'_>) -> Result<Option<BridgeCampaign>> {
        self.transaction(|conn| {
            if query_bridge(conn, "slug", new.slug)?.is_some() {
                return Ok(None);
            }
            conn.execute(
                "INSERT INTO bridge_campaigns (id, slug, gofundme_url, patient_name, organizer_name)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![new.id, new.slug, new.gofundme_url, new.patient_name, new.organizer_name],
            )?;
            query_bridge(conn, "id", new.id)
        })
    }

    pub fn get_bridge_by_id(&self, id: &str) -> Result<Option<BridgeCampaign>> {
        self.with_conn(|conn| query_bridge(conn, "id", id))
    }

    pub fn get_bridge_by_slug(&self, slug: &str) -> Result<Option<BridgeCampaign>> {
        self.with_conn(|conn| query_bridge(conn, "slug", slug))
    }

    pub fn list_bridges(&self) -> Result<Vec<BridgeCampaign>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM bridge_campaigns ORDER BY created_at DESC, rowid DESC",
                BRIDGE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_bridge)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Points a bridge at one of our campaigns and marks it linked.
    pub fn link_bridge(&self, id: &str, campaign_id: &str) -> Result<Option<BridgeCampaign>> {
        self.transaction(|conn| {
            conn.execute(
                "UPDATE bridge_campaigns SET campaign_id = ?1, status = ?2 WHERE id = ?3",
                rusqlite::params![campaign_id, BridgeStatus::Linked.as_str(), id],
            )?;
            query_bridge(conn, "id", id)
        })
    }

    // -- Outreach --

    /// Records an outreach attempt. A bridge still in `prospect` moves to `contacted`.
    pub fn insert_outreach(&self, new: &NewOutreach<'_>) -> Result<BridgeOutreach> {
        self.transaction(|conn| {
            conn.execute(
                "INSERT INTO bridge_outreach (id, bridge_campaign_id, channel, message, outcome, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    new.id,
                    new.bridge_campaign_id,
                    new.channel,
                    new.message,
                    new.outcome,
                    new.created_by,
                ],
            )?;
            conn.execute(
                "UPDATE bridge_campaigns SET status = ?1 WHERE id = ?2 AND status = ?3",
                rusqlite::params![
                    BridgeStatus::Contacted.as_str(),
                    new.bridge_campaign_id,
                    BridgeStatus::Prospect.as_str(),
                ],
            )?;

            let sql = format!("SELECT {} FROM bridge_outreach WHERE id = ?1", OUTREACH_COLUMNS);
            Ok(conn.query_row(&sql, [new.id], map_outreach)?)
        })
    }

    pub fn list_outreach(&self, bridge_campaign_id: &str) -> Result<Vec<BridgeOutreach>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM bridge_outreach WHERE bridge_campaign_id = ?1 ORDER BY created_at DESC, rowid DESC",
                OUTREACH_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([bridge_campaign_id], map_outreach)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn map_bridge(row: &Row<'_>) -> rusqlite::Result<BridgeCampaign> {
    Ok(BridgeCampaign {
        id: row.get(0)?,
        slug: row.get(1)?,
        gofundme_url: row.get(2)?,
        patient_name: row.get(3)?,
        organizer_name: row.get(4)?,
        campaign_id: row.get(5)?,
        status: enum_column(row, 6)?,
        created_at: row.get(7)?,
    })
}

fn map_outreach(row: &Row<'_>) -> rusqlite::Result<BridgeOutreach> {
    Ok(BridgeOutreach {
        id: row.get(0)?,
        bridge_campaign_id: row.get(1)?,
        channel: row.get(2)?,
        message: row.get(3)?,
        outcome: row.get(4)?,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn query_bridge(conn: &Connection, column: &str, value: &str) -> Result<Option<BridgeCampaign>> {
    let sql = format!("SELECT {} FROM bridge_campaigns WHERE {} = ?1", BRIDGE_COLUMNS, column);
    Ok(conn.query_row(&sql, [value], map_bridge).optional()?)
}

#[cfg(test)]
mod tests {
    use crate::models::{NewBridge, NewOutreach};
    use crate::queries::test_util::{campaign, db};
    use hope_types::models::BridgeStatus;

    fn bridge(db: &crate::Database) -> hope_types::models::BridgeCampaign {
        db.create_bridge(&NewBridge {
            id: "b1",
            slug: "help-jane",
            gofundme_url: "https://www.gofundme.com/f/help-jane",
            patient_name: "Jane",
            organizer_name: Some("Alex"),
        })
        .unwrap()
        .unwrap()
    }

    #[test]
    fn bridges_start_as_prospects() {
        let db = db();
        let created = bridge(&db);
        assert_eq!(created.status, BridgeStatus::Prospect);
        assert!(created.campaign_id.is_none());
        assert_eq!(db.get_bridge_by_slug("help-jane").unwrap().unwrap(), created);
    }

    #[test]
    fn outreach_moves_prospect_to_contacted_once() {
        let db = db();
        bridge(&db);

        let first = NewOutreach {
            id: "o1",
            bridge_campaign_id: "b1",
            channel: "email",
            message: Some("Hi Alex"),
            outcome: None,
            created_by: "admin",
        };
        db.insert_outreach(&first).unwrap();
        assert_eq!(db.get_bridge_by_id("b1").unwrap().unwrap().status, BridgeStatus::Contacted);

        let campaign = campaign(&db, "jane");
        db.link_bridge("b1", &campaign.id).unwrap();
        db.insert_outreach(&NewOutreach { id: "o2", ..first }).unwrap();

        let linked = db.get_bridge_by_id("b1").unwrap().unwrap();
        assert_eq!(linked.status, BridgeStatus::Linked);
        assert_eq!(linked.campaign_id.as_deref(), Some(campaign.id.as_str()));
        assert_eq!(db.list_outreach("b1").unwrap().len(), 2);
    }

    #[test]
    fn linking_unknown_bridge_returns_none() {
        let db = db();
        let campaign = campaign(&db, "jane");
        assert!(db.link_bridge("missing", &campaign.id).unwrap().is_none());
    }
}
