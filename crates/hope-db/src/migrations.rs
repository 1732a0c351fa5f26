use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (campaigns, leaves, auth)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE,
                role        TEXT NOT NULL DEFAULT 'member',
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE magic_links (
                token_hash  TEXT PRIMARY KEY,
                email       TEXT NOT NULL,
                expires_at  INTEGER NOT NULL,
                used_at     INTEGER,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE campaigns (
                id                   TEXT PRIMARY KEY,
                slug                 TEXT NOT NULL UNIQUE,
                patient_name         TEXT NOT NULL,
                title                TEXT,
                story                TEXT,
                status               TEXT NOT NULL DEFAULT 'draft',
                monthly_goal_cents   INTEGER,
                leaf_count           INTEGER NOT NULL DEFAULT 0,
                supporter_count      INTEGER NOT NULL DEFAULT 0,
                patient_email        TEXT,
                sanctuary_claimed    INTEGER NOT NULL DEFAULT 0,
                sanctuary_claimed_by TEXT REFERENCES users(id) ON DELETE SET NULL,
                sanctuary_start_date TEXT,
                created_at           TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE leaves (
                id           TEXT PRIMARY KEY,
                campaign_id  TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                author_name  TEXT NOT NULL,
                message      TEXT NOT NULL,
                is_public    INTEGER NOT NULL DEFAULT 1,
                position_x   INTEGER NOT NULL,
                position_y   INTEGER NOT NULL,
                created_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_leaves_campaign ON leaves(campaign_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (bridge, commitments)");
        conn.execute_batch(
            "
            CREATE TABLE bridge_campaigns (
                id              TEXT PRIMARY KEY,
                slug            TEXT NOT NULL UNIQUE,
                gofundme_url    TEXT NOT NULL,
                patient_name    TEXT NOT NULL,
                organizer_name  TEXT,
                campaign_id     TEXT REFERENCES campaigns(id) ON DELETE SET NULL,
                status          TEXT NOT NULL DEFAULT 'prospect',
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE bridge_outreach (
                id                  TEXT PRIMARY KEY,
                bridge_campaign_id  TEXT NOT NULL REFERENCES bridge_campaigns(id) ON DELETE CASCADE,
                channel             TEXT NOT NULL,
                message             TEXT,
                outcome             TEXT,
                created_by          TEXT NOT NULL,
                created_at          TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_outreach_bridge ON bridge_outreach(bridge_campaign_id);

            CREATE TABLE commitments (
                id                   TEXT PRIMARY KEY,
                campaign_id          TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                email                TEXT,
                supporter_name       TEXT,
                tier                 TEXT NOT NULL,
                amount_cents         INTEGER NOT NULL,
                status               TEXT NOT NULL DEFAULT 'pending',
                source               TEXT NOT NULL DEFAULT 'direct',
                checkout_session_id  TEXT UNIQUE,
                subscription_id      TEXT,
                created_at           TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_commitments_subscription ON commitments(subscription_id);
            CREATE INDEX idx_commitments_email ON commitments(email);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    if version < 3 {
        info!("Running migration v3 (sanctuary)");
        conn.execute_batch(
            "
            CREATE TABLE memberships (
                id           TEXT PRIMARY KEY,
                campaign_id  TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                user_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                role         TEXT NOT NULL,
                created_at   TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(campaign_id, user_id)
            );

            CREATE TABLE sanctuary_days (
                campaign_id   TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                day_number    INTEGER NOT NULL,
                reflection    TEXT,
                completed_at  TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (campaign_id, day_number)
            );

            CREATE TABLE journal_entries (
                id           TEXT PRIMARY KEY,
                campaign_id  TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                author_id    TEXT NOT NULL,
                title        TEXT,
                body         TEXT NOT NULL,
                mood         TEXT,
                created_at   TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE tasks (
                id           TEXT PRIMARY KEY,
                campaign_id  TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                author_id    TEXT NOT NULL,
                title        TEXT NOT NULL,
                notes        TEXT,
                due_date     TEXT,
                completed    INTEGER NOT NULL DEFAULT 0,
                created_at   TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE medications (
                id           TEXT PRIMARY KEY,
                campaign_id  TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                author_id    TEXT NOT NULL,
                name         TEXT NOT NULL,
                dosage       TEXT,
                frequency    TEXT,
                notes        TEXT,
                active       INTEGER NOT NULL DEFAULT 1,
                created_at   TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE appointments (
                id            TEXT PRIMARY KEY,
                campaign_id   TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                author_id     TEXT NOT NULL,
                title         TEXT NOT NULL,
                provider      TEXT,
                location      TEXT,
                scheduled_at  TEXT NOT NULL,
                notes         TEXT,
                created_at    TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE symptom_logs (
                id           TEXT PRIMARY KEY,
                campaign_id  TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                author_id    TEXT NOT NULL,
                symptom      TEXT NOT NULL,
                severity     INTEGER,
                notes        TEXT,
                logged_at    TEXT,
                created_at   TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            INSERT INTO schema_version (version) VALUES (3);
            ",
        )?;
    }

    if version < 4 {
        info!("Running migration v4 (soft-deleted leaves)");
        conn.execute_batch(
            "
            ALTER TABLE campaigns ADD COLUMN leaf_seq INTEGER NOT NULL DEFAULT 0;
            UPDATE campaigns SET leaf_seq = (SELECT COUNT(*) FROM leaves WHERE leaves.campaign_id = campaigns.id);
            ALTER TABLE leaves ADD COLUMN deleted_at TEXT;

            INSERT INTO schema_version (version) VALUES (4);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 4);
    }

    #[test]
    fn every_sanctuary_table_exists() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();

        for resource in hope_types::sanctuary::SanctuaryResource::ALL {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [resource.table()],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "{}", resource.table());
        }
    }
}
