use anyhow::Result;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params_from_iter};
use serde_json::{Map, Value as Json};
use uuid::Uuid;

use hope_types::models::{MemberRole, Membership, SanctuaryDay};
use hope_types::sanctuary::{FieldKind, SanctuaryResource};

use super::{enum_column, update_columns};
use crate::Database;

/// A Sanctuary record as returned to clients: column name -> JSON value.
pub type Record = Map<String, Json>;

const MEMBERSHIP_SELECT: &str = "SELECT m.id, m.campaign_id, m.user_id, u.email, m.role, m.created_at
     FROM memberships m JOIN users u ON u.id = m.user_id";

impl Database {
    // -- Memberships --

    pub fn get_membership(&self, campaign_id: &str, user_id: &str) -> Result<Option<Membership>> {
        self.with_conn(|conn| query_membership(conn, campaign_id, user_id))
    }

    /// Adds a member, keeping the existing role when they already belong.
    pub fn add_membership(&self, campaign_id: &str, user_id: &str, role: MemberRole) -> Result<Membership> {
        self.transaction(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO memberships (id, campaign_id, user_id, role) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![Uuid::new_v4().to_string(), campaign_id, user_id, role.as_str()],
            )?;
            query_membership(conn, campaign_id, user_id)?
                .ok_or_else(|| anyhow::anyhow!("membership for {} vanished after insert", user_id))
        })
    }

    pub fn list_memberships(&self, campaign_id: &str) -> Result<Vec<Membership>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE m.campaign_id = ?1 ORDER BY m.created_at ASC, m.rowid ASC", MEMBERSHIP_SELECT);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([campaign_id], map_membership)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Guided days --

    /// Marks a guided day complete, replacing any earlier reflection.
    pub fn complete_sanctuary_day(
        &self,
        campaign_id: &str,
        day_number: u32,
        reflection: Option<&str>,
    ) -> Result<SanctuaryDay> {
        self.transaction(|conn| {
            conn.execute(
                "INSERT INTO sanctuary_days (campaign_id, day_number, reflection) VALUES (?1, ?2, ?3)
                 ON CONFLICT(campaign_id, day_number)
                 DO UPDATE SET reflection = excluded.reflection, completed_at = datetime('now')",
                rusqlite::params![campaign_id, day_number, reflection],
            )?;
            Ok(conn.query_row(
                "SELECT campaign_id, day_number, reflection, completed_at
                 FROM sanctuary_days WHERE campaign_id = ?1 AND day_number = ?2",
                rusqlite::params![campaign_id, day_number],
                map_day,
            )?)
        })
    }

    pub fn list_sanctuary_days(&self, campaign_id: &str) -> Result<Vec<SanctuaryDay>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT campaign_id, day_number, reflection, completed_at
                 FROM sanctuary_days WHERE campaign_id = ?1 ORDER BY day_number ASC",
            )?;
            let rows = stmt
                .query_map([campaign_id], map_day)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Records (journal, tasks, medications, appointments, symptom logs) --

    pub fn list_records(&self, resource: SanctuaryResource, campaign_id: &str) -> Result<Vec<Record>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM {} WHERE campaign_id = ?1 ORDER BY {} DESC, rowid DESC",
                record_columns(resource).join(", "),
                resource.table(),
                resource.order_column()
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([campaign_id], |row| map_record(resource, row))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Inserts a record. `values` hold allow-listed columns only; omitted
    /// columns take their schema defaults.
    pub fn insert_record(
        &self,
        resource: SanctuaryResource,
        campaign_id: &str,
        author_id: &str,
        values: &[(&'static str, Value)],
    ) -> Result<Record> {
        let id = Uuid::new_v4().to_string();
        self.transaction(|conn| {
            let mut columns = vec!["id", "campaign_id", "author_id"];
            columns.extend(values.iter().map(|(column, _)| *column));
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();

            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                resource.table(),
                columns.join(", "),
                placeholders.join(", ")
            );
            let params = [
                Value::Text(id.clone()),
                Value::Text(campaign_id.to_string()),
                Value::Text(author_id.to_string()),
            ]
            .into_iter()
            .chain(values.iter().map(|(_, value)| value.clone()));
            conn.execute(&sql, params_from_iter(params))?;

            query_record(conn, resource, campaign_id, &id)?
                .ok_or_else(|| anyhow::anyhow!("{} {} vanished after insert", resource.table(), id))
        })
    }

    /// Applies allow-listed changes to a record of this campaign.
    /// `None` when no such record exists.
    pub fn update_record(
        &self,
        resource: SanctuaryResource,
        campaign_id: &str,
        item_id: &str,
        changes: &[(&'static str, Value)],
    ) -> Result<Option<Record>> {
        self.transaction(|conn| {
            let filters = [("id", item_id), ("campaign_id", campaign_id)];
            if update_columns(conn, resource.table(), &filters, changes, true)? == 0 {
                return Ok(None);
            }
            query_record(conn, resource, campaign_id, item_id)
        })
    }

    pub fn delete_record(&self, resource: SanctuaryResource, campaign_id: &str, item_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let sql = format!("DELETE FROM {} WHERE id = ?1 AND campaign_id = ?2", resource.table());
            Ok(conn.execute(&sql, [item_id, campaign_id])? > 0)
        })
    }
}

fn record_columns(resource: SanctuaryResource) -> Vec<&'static str> {
    let mut columns = vec!["id", "campaign_id", "author_id"];
    columns.extend(resource.fields().iter().map(|f| f.name));
    columns.extend(["created_at", "updated_at"]);
    columns
}

fn map_record(resource: SanctuaryResource, row: &Row<'_>) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (idx, name) in record_columns(resource).into_iter().enumerate() {
        let kind = resource.field(name).map(|f| f.kind).unwrap_or(FieldKind::Text);
        let value = match row.get_ref(idx)? {
            ValueRef::Null => Json::Null,
            ValueRef::Integer(i) if kind == FieldKind::Bool => Json::Bool(i != 0),
            ValueRef::Integer(i) => Json::from(i),
            ValueRef::Real(f) => Json::from(f),
            ValueRef::Text(t) => Json::String(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(_) => Json::Null,
        };
        record.insert(name.to_string(), value);
    }
    Ok(record)
}

fn query_record(
    conn: &Connection,
    resource: SanctuaryResource,
    campaign_id: &str,
    id: &str,
) -> Result<Option<Record>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?1 AND campaign_id = ?2",
        record_columns(resource).join(", "),
        resource.table()
    );
    Ok(conn
        .query_row(&sql, [id, campaign_id], |row| map_record(resource, row))
        .optional()?)
}

fn map_membership(row: &Row<'_>) -> rusqlite::Result<Membership> {
    Ok(Membership {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        user_id: row.get(2)?,
        email: row.get(3)?,
        role: enum_column(row, 4)?,
        created_at: row.get(5)?,
    })
}

fn query_membership(conn: &Connection, campaign_id: &str, user_id: &str) -> Result<Option<Membership>> {
    let sql = format!("{} WHERE m.campaign_id = ?1 AND m.user_id = ?2", MEMBERSHIP_SELECT);
    Ok(conn.query_row(&sql, [campaign_id, user_id], map_membership).optional()?)
}

fn map_day(row: &Row<'_>) -> rusqlite::Result<SanctuaryDay> {
    Ok(SanctuaryDay {
        campaign_id: row.get(0)?,
        day_number: row.get(1)?,
        reflection: row.get(2)?,
        completed_at: row.get(3)?,
    })
}
