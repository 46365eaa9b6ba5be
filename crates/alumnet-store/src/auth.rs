//! Accounts and sessions for the local auth stand-in.
//!
//! Passwords are stored as a salted BLAKE3 derived key. Session tokens are
//! opaque random strings with a fixed lifetime; the token this installation
//! is signed in with is remembered in `local_session` so a restart can pick
//! the session back up.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use alumnet_shared::constants::SESSION_TTL_SECS;
use alumnet_shared::timefmt;
use alumnet_shared::types::UserId;

use crate::backend::AuthSession;
use crate::database::Database;
use crate::error::{BackendError, Result};

const PASSWORD_KDF_CONTEXT: &str = "alumnet-password-v1";
const MIN_PASSWORD_LEN: usize = 8;

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(salt: &[u8], password: &str) -> String {
    let mut material = Vec::with_capacity(salt.len() + password.len());
    material.extend_from_slice(salt);
    material.extend_from_slice(password.as_bytes());
    hex::encode(blake3::derive_key(PASSWORD_KDF_CONTEXT, &material))
}

fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl Database {
    pub fn create_account(&self, email: &str, password: &str) -> Result<UserId> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(BackendError::Unauthorized("A valid email is required".into()));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(BackendError::Unauthorized(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        let user_id = UserId(Uuid::new_v4());

        self.conn()
            .execute(
                "INSERT INTO accounts (user_id, email, password_salt, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user_id.to_string(),
                    email,
                    hex::encode(salt),
                    hash_password(&salt, password),
                    timefmt::format(&Utc::now()),
                ],
            )
            .map_err(|e| match BackendError::from_write(e) {
                BackendError::Conflict(_) => BackendError::Conflict("Email already registered".into()),
                other => other,
            })?;

        Ok(user_id)
    }

    pub fn verify_credentials(&self, email: &str, password: &str) -> Result<UserId> {
        let invalid = || BackendError::Unauthorized("Invalid login credentials".into());

        let found: Option<(String, String, String)> = self
            .conn()
            .query_row(
                "SELECT user_id, password_salt, password_hash FROM accounts WHERE email = ?1",
                params![normalize_email(email)],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let (user_id, salt_hex, expected) = found.ok_or_else(invalid)?;
        let salt = hex::decode(&salt_hex).map_err(|_| invalid())?;
        if hash_password(&salt, password) != expected {
            return Err(invalid());
        }
        Ok(UserId::parse(&user_id)?)
    }

    /// Issue a session for `user_id` and make it this installation's current
    /// session.
    pub fn create_session(&self, user_id: UserId, now: DateTime<Utc>) -> Result<AuthSession> {
        let session = AuthSession {
            user_id,
            access_token: new_token(),
            expires_at: now + Duration::seconds(SESSION_TTL_SECS),
        };
        self.conn().execute(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![
                session.access_token,
                user_id.to_string(),
                timefmt::format(&session.expires_at),
            ],
        )?;
        self.conn().execute(
            "INSERT OR REPLACE INTO local_session (id, token) VALUES (1, ?1)",
            params![session.access_token],
        )?;
        Ok(session)
    }

    pub fn find_session(&self, token: &str) -> Result<Option<AuthSession>> {
        let found: Option<(String, String)> = self
            .conn()
            .query_row(
                "SELECT user_id, expires_at FROM sessions WHERE token = ?1",
                params![token],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match found {
            Some((user_id, expires_at)) => Ok(Some(AuthSession {
                user_id: UserId::parse(&user_id)?,
                access_token: token.to_string(),
                expires_at: timefmt::parse(&expires_at)?,
            })),
            None => Ok(None),
        }
    }

    /// The remembered session, if it still exists and has not expired.
    pub fn persisted_session(&self, now: DateTime<Utc>) -> Result<Option<AuthSession>> {
        let token: Option<String> = self
            .conn()
            .query_row("SELECT token FROM local_session WHERE id = 1", [], |row| row.get(0))
            .optional()?;

        let Some(token) = token else {
            return Ok(None);
        };
        Ok(self.find_session(&token)?.filter(|s| !s.is_expired(now)))
    }

    /// Forget the current session and revoke its token.
    pub fn clear_session(&self) -> Result<()> {
        self.conn().execute(
            "DELETE FROM sessions WHERE token IN (SELECT token FROM local_session WHERE id = 1)",
            [],
        )?;
        self.conn().execute("DELETE FROM local_session", [])?;
        Ok(())
    }

    /// Replace the current session with a fresh one for the same user.
    pub fn refresh_session(&self, now: DateTime<Utc>) -> Result<AuthSession> {
        let token: Option<String> = self
            .conn()
            .query_row("SELECT token FROM local_session WHERE id = 1", [], |row| row.get(0))
            .optional()?;
        let current = match token {
            Some(token) => self.find_session(&token)?,
            None => None,
        }
        .ok_or_else(|| BackendError::Unauthorized("No session to refresh".into()))?;

        self.conn().execute(
            "DELETE FROM sessions WHERE token = ?1",
            params![current.access_token],
        )?;
        self.create_session(current.user_id, now)
    }
}
