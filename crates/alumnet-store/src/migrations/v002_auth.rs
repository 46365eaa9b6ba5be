//! v002 -- Accounts and sessions for the local auth stand-in.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    user_id       TEXT PRIMARY KEY NOT NULL,  -- UUID, equals profiles.id
    email         TEXT NOT NULL UNIQUE,       -- lowercased
    password_salt TEXT NOT NULL,              -- hex, 16 bytes
    password_hash TEXT NOT NULL,              -- hex, BLAKE3 derive_key output
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    token      TEXT PRIMARY KEY NOT NULL,
    user_id    TEXT NOT NULL,
    expires_at TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES accounts(user_id) ON DELETE CASCADE
);

-- The session this installation is currently signed in with.
CREATE TABLE IF NOT EXISTS local_session (
    id    INTEGER PRIMARY KEY CHECK (id = 1),
    token TEXT NOT NULL
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
