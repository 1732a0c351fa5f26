pub mod bridge;
pub mod campaigns;
pub mod commitments;
pub mod leaves;
pub mod sanctuary;
pub mod users;

use std::str::FromStr;

use anyhow::Result;
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, Row, params_from_iter};

/// Reads a TEXT column holding one of the `hope_types` text enums.
pub(crate) fn enum_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// `UPDATE table SET ... WHERE ...` over a dynamic column set.
///
/// Column and filter names must come from static allow-lists; only values are
/// bound as parameters. Returns the number of rows changed.
pub(crate) fn update_columns(
    conn: &Connection,
    table: &str,
    filters: &[(&str, &str)],
    changes: &[(&'static str, Value)],
    touch_updated_at: bool,
) -> Result<usize> {
    let mut assignments: Vec<String> = changes
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
        .collect();
    if touch_updated_at {
        assignments.push("updated_at = datetime('now')".to_string());
    }

    let conditions: Vec<String> = filters
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{} = ?{}", column, changes.len() + i + 1))
        .collect();

    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        table,
        assignments.join(", "),
        conditions.join(" AND ")
    );

    let params = changes
        .iter()
        .map(|(_, value)| value.clone())
        .chain(filters.iter().map(|(_, value)| Value::Text((*value).to_string())));

    Ok(conn.execute(&sql, params_from_iter(params))?)
}

#[cfg(test)]
pub(crate) mod test_util {
    use hope_types::models::{Campaign, CampaignStatus, User};

    use crate::Database;
    use crate::models::NewCampaign;

    pub fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    pub fn campaign(db: &Database, slug: &str) -> Campaign {
        let id = uuid::Uuid::new_v4().to_string();
        db.create_campaign(&NewCampaign {
            id: &id,
            slug,
            patient_name: "Jane Doe",
            title: None,
            story: None,
            status: CampaignStatus::Active,
            monthly_goal_cents: Some(50_000),
            patient_email: Some("jane@example.com"),
        })
        .unwrap()
        .unwrap()
    }

    pub fn user(db: &Database, email: &str) -> User {
        db.find_or_create_user(email, false).unwrap()
    }
}
