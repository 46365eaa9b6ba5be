//! v001 -- Document tables.
//!
//! Every application table has the same shape: a UUID primary key and the
//! row itself as a JSON object. Hot filter columns get expression indexes.

use rusqlite::Connection;

use crate::query::Table;

const INDEX_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_messages_receiver
    ON messages(json_extract(data, '$.receiver_id'), json_extract(data, '$.read'));

CREATE INDEX IF NOT EXISTS idx_messages_sender
    ON messages(json_extract(data, '$.sender_id'));

CREATE INDEX IF NOT EXISTS idx_notifications_user
    ON notifications(json_extract(data, '$.user_id'), json_extract(data, '$.created_at'));

CREATE INDEX IF NOT EXISTS idx_connections_requester
    ON connections(json_extract(data, '$.requester_id'));

CREATE INDEX IF NOT EXISTS idx_connections_addressee
    ON connections(json_extract(data, '$.addressee_id'));

CREATE INDEX IF NOT EXISTS idx_events_starts_at
    ON events(json_extract(data, '$.starts_at'));
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    for table in Table::ALL {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id   TEXT PRIMARY KEY NOT NULL,   -- UUID
                data TEXT NOT NULL                -- JSON object, includes id and created_at
            );"
        ))?;
    }
    conn.execute_batch(INDEX_SQL)
}
