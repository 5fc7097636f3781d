//! Session issuance and validation.
//!
//! Sessions live in the `sessions` table. A row is valid while `is_active` is
//! set and the current time is before `expires_at`. Rows are never deleted by
//! normal flow: logout and expiry detection only clear `is_active`.
//!
//! Every operation has a `*_at` form taking an explicit `now` and working on a
//! borrowed connection, plus an async form on the pool that uses the current
//! UTC time.

use chrono::{Duration, NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::{debug, info};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

use crate::config::DbPool;
use crate::db::with_conn;
use crate::errors::ApiError;
use crate::models::{NewSession, SessionRecord, SessionRole};
use crate::schema::sessions;

pub const SESSION_DURATION_DAYS: i64 = 7;
pub const SESSION_DURATION_SECONDS: i64 = SESSION_DURATION_DAYS * 24 * 60 * 60;
const TOKEN_LENGTH: usize = 48;

/// Who a new session is issued for.
#[derive(Debug, Clone)]
pub struct Subject {
    pub username: String,
    pub user_id: Option<i32>,
}

pub fn session_lifetime() -> Duration {
    Duration::days(SESSION_DURATION_DAYS)
}

pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

// thread_rng is a CSPRNG seeded from the OS
pub fn generate_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

pub struct SessionService;

impl SessionService {
    pub fn issue_at(
        conn: &mut SqliteConnection,
        role: SessionRole,
        subject: &Subject,
        now: NaiveDateTime,
    ) -> QueryResult<String> {
        let token = generate_token();
        let new_session = NewSession {
            session_id: token.clone(),
            username: subject.username.clone(),
            user_type: role.as_str().to_string(),
            user_id: subject.user_id,
            created_at: now,
            expires_at: now + session_lifetime(),
            is_active: true,
        };

        diesel::insert_into(sessions::table)
            .values(&new_session)
            .execute(conn)?;

        info!("Issued {} session for {}", role.as_str(), subject.username);
        Ok(token)
    }

    fn find_active(
        conn: &mut SqliteConnection,
        token: &str,
        role: SessionRole,
    ) -> QueryResult<Option<SessionRecord>> {
        sessions::table
            .filter(sessions::session_id.eq(token))
            .filter(sessions::user_type.eq(role.as_str()))
            .filter(sessions::is_active.eq(true))
            .select(SessionRecord::as_select())
            .first(conn)
            .optional()
    }

    fn deactivate(conn: &mut SqliteConnection, row_id: i32) -> QueryResult<usize> {
        diesel::update(sessions::table.find(row_id))
            .set(sessions::is_active.eq(false))
            .execute(conn)
    }

    /// Returns the session when it is active and unexpired. An active row
    /// found past its expiry is flipped to inactive before returning `None`.
    /// Never changes the expiry.
    pub fn validate_at(
        conn: &mut SqliteConnection,
        token: &str,
        role: SessionRole,
        now: NaiveDateTime,
    ) -> QueryResult<Option<SessionRecord>> {
        let record = match Self::find_active(conn, token, role)? {
            Some(record) => record,
            None => return Ok(None),
        };

        if record.is_valid_at(now) {
            return Ok(Some(record));
        }

        Self::deactivate(conn, record.id)?;
        debug!("Session {} for {} expired at {}", record.id, record.username, record.expires_at);
        Ok(None)
    }

    /// Pushes the expiry of a still-valid session to `now + 7 days`. Missing,
    /// inactive, or already expired sessions are left alone (an expired one
    /// is deactivated, as in `validate_at`).
    pub fn refresh_at(
        conn: &mut SqliteConnection,
        token: &str,
        role: SessionRole,
        now: NaiveDateTime,
    ) -> QueryResult<Option<SessionRecord>> {
        let record = match Self::validate_at(conn, token, role, now)? {
            Some(record) => record,
            None => return Ok(None),
        };

        let expires_at = now + session_lifetime();
        diesel::update(sessions::table.find(record.id))
            .set(sessions::expires_at.eq(expires_at))
            .execute(conn)?;

        Ok(Some(SessionRecord { expires_at, ..record }))
    }

    /// Clears `is_active` on the row of that role. Missing or already
    /// inactive tokens are a successful no-op. Returns whether a row changed.
    pub fn logout_at(conn: &mut SqliteConnection, token: &str, role: SessionRole) -> QueryResult<bool> {
        let changed = diesel::update(
            sessions::table
                .filter(sessions::session_id.eq(token))
                .filter(sessions::user_type.eq(role.as_str()))
                .filter(sessions::is_active.eq(true)),
        )
        .set(sessions::is_active.eq(false))
        .execute(conn)?;

        if changed > 0 {
            info!("Closed {} session", role.as_str());
        }
        Ok(changed > 0)
    }

    /// Admin space first, then user space.
    pub fn resolve_at(
        conn: &mut SqliteConnection,
        admin_token: Option<&str>,
        user_token: Option<&str>,
        now: NaiveDateTime,
    ) -> QueryResult<Option<SessionRecord>> {
        if let Some(token) = admin_token {
            if let Some(record) = Self::validate_at(conn, token, SessionRole::Admin, now)? {
                return Ok(Some(record));
            }
        }
        if let Some(token) = user_token {
            return Self::validate_at(conn, token, SessionRole::User, now);
        }
        Ok(None)
    }

    pub async fn issue(pool: &DbPool, role: SessionRole, subject: Subject) -> Result<String, ApiError> {
        with_conn(pool, move |conn| Ok(Self::issue_at(conn, role, &subject, now())?)).await
    }

    pub async fn validate(
        pool: &DbPool,
        token: &str,
        role: SessionRole,
    ) -> Result<Option<SessionRecord>, ApiError> {
        let token = token.to_string();
        with_conn(pool, move |conn| Ok(Self::validate_at(conn, &token, role, now())?)).await
    }

    pub async fn refresh(
        pool: &DbPool,
        token: &str,
        role: SessionRole,
    ) -> Result<Option<SessionRecord>, ApiError> {
        let token = token.to_string();
        with_conn(pool, move |conn| Ok(Self::refresh_at(conn, &token, role, now())?)).await
    }

    pub async fn logout(pool: &DbPool, token: &str, role: SessionRole) -> Result<bool, ApiError> {
        let token = token.to_string();
        with_conn(pool, move |conn| Ok(Self::logout_at(conn, &token, role)?)).await
    }

    pub async fn resolve(
        pool: &DbPool,
        admin_token: Option<String>,
        user_token: Option<String>,
    ) -> Result<Option<SessionRecord>, ApiError> {
        with_conn(pool, move |conn| {
            Ok(Self::resolve_at(conn, admin_token.as_deref(), user_token.as_deref(), now())?)
        })
        .await
    }
}
