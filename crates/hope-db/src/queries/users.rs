use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use hope_types::models::{Role, User};

use super::enum_column;
use crate::Database;

const USER_COLUMNS: &str = "id, email, role, created_at";

impl Database {
    // -- Users --

    /// Looks a user up by e-mail, creating a member account on first sign-in.
    /// `admin` promotes the account; roles are never demoted here.
    pub fn find_or_create_user(&self, email: &str, admin: bool) -> Result<User> {
        let email = email.trim().to_lowercase();
        self.transaction(|conn| {
            if let Some(user) = query_user(conn, "email", &email)? {
                if admin && user.role != Role::Admin {
                    conn.execute(
                        "UPDATE users SET role = ?1 WHERE id = ?2",
                        (Role::Admin.as_str(), &user.id),
                    )?;
                    return Ok(User { role: Role::Admin, ..user });
                }
                return Ok(user);
            }

            let id = Uuid::new_v4().to_string();
            let role = if admin { Role::Admin } else { Role::Member };
            conn.execute(
                "INSERT INTO users (id, email, role) VALUES (?1, ?2, ?3)",
                (&id, &email, role.as_str()),
            )?;

            query_user(conn, "id", &id)?
                .ok_or_else(|| anyhow::anyhow!("user {} vanished after insert", id))
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Magic links --

    pub fn insert_magic_link(&self, token_hash: &str, email: &str, expires_at: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO magic_links (token_hash, email, expires_at) VALUES (?1, ?2, ?3)",
                (token_hash, email.trim().to_lowercase(), expires_at),
            )?;
            Ok(())
        })
    }

    /// Marks a magic link used and returns its e-mail.
    /// Unknown, already used and expired links all yield `None`.
    pub fn consume_magic_link(&self, token_hash: &str, now: i64) -> Result<Option<String>> {
        self.transaction(|conn| {
            let link: Option<(String, i64, Option<i64>)> = conn
                .query_row(
                    "SELECT email, expires_at, used_at FROM magic_links WHERE token_hash = ?1",
                    [token_hash],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            match link {
                Some((email, expires_at, None)) if expires_at > now => {
                    conn.execute(
                        "UPDATE magic_links SET used_at = ?1 WHERE token_hash = ?2",
                        (now, token_hash),
                    )?;
                    Ok(Some(email))
                }
                _ => Ok(None),
            }
        })
    }
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        role: enum_column(row, 2)?,
        created_at: row.get(3)?,
    })
}

/// `column` is always a literal from this module.
fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
    Ok(conn.query_row(&sql, [value], map_user).optional()?)
}
