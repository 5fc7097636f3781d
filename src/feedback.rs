use chrono::{Duration, NaiveDateTime};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::info;

use crate::config::DbPool;
use crate::db::with_conn;
use crate::errors::ApiError;
use crate::models::{ContactForm, Feedback, NewFeedback};
use crate::schema::feedback;
use crate::session::now;

pub const FEEDBACK_RETENTION_DAYS: i64 = 30;

impl ContactForm {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// Subject and phone are folded into the stored message body.
    pub fn composed_message(&self) -> String {
        format!(
            "Subject: {}\nPhone: {}\n\nMessage:\n{}",
            self.subject.trim(),
            self.phone.trim(),
            self.message.trim()
        )
    }
}

pub struct FeedbackService;

impl FeedbackService {
    pub fn submit_with(conn: &mut SqliteConnection, form: &ContactForm, now: NaiveDateTime) -> Result<Feedback, ApiError> {
        let name = form.full_name();
        let email = form.email.trim().to_string();
        if name.is_empty() || email.is_empty() || form.message.trim().is_empty() {
            return Err(ApiError::ValidationError("Name, email and message are required".to_string()));
        }

        let entry = diesel::insert_into(feedback::table)
            .values(&NewFeedback {
                name,
                email,
                message: form.composed_message(),
                created_at: now,
            })
            .returning(Feedback::as_returning())
            .get_result(conn)?;

        info!("Feedback {} received from {}", entry.id, entry.email);
        Ok(entry)
    }

    pub fn list_with(conn: &mut SqliteConnection) -> QueryResult<Vec<Feedback>> {
        feedback::table
            .order((feedback::created_at.desc(), feedback::id.desc()))
            .select(Feedback::as_select())
            .load(conn)
    }

    pub fn find_with(conn: &mut SqliteConnection, feedback_id: i32) -> Result<Feedback, ApiError> {
        feedback::table
            .find(feedback_id)
            .select(Feedback::as_select())
            .first(conn)
            .optional()?
            .ok_or_else(|| ApiError::NotFoundError("Feedback not found".to_string()))
    }

    pub fn delete_with(conn: &mut SqliteConnection, feedback_id: i32) -> Result<(), ApiError> {
        let removed = diesel::delete(feedback::table.find(feedback_id)).execute(conn)?;
        if removed == 0 {
            return Err(ApiError::NotFoundError("Feedback not found".to_string()));
        }
        Ok(())
    }

    /// Deletes entries older than the retention window. Returns the count removed.
    pub fn clear_old_with(conn: &mut SqliteConnection, now: NaiveDateTime) -> QueryResult<usize> {
        let cutoff = now - Duration::days(FEEDBACK_RETENTION_DAYS);
        let removed = diesel::delete(feedback::table.filter(feedback::created_at.lt(cutoff))).execute(conn)?;
        if removed > 0 {
            info!("Cleared {} feedback entries older than {}", removed, cutoff);
        }
        Ok(removed)
    }

    pub async fn submit(pool: &DbPool, form: ContactForm) -> Result<Feedback, ApiError> {
        with_conn(pool, move |conn| Self::submit_with(conn, &form, now())).await
    }

    pub async fn list(pool: &DbPool) -> Result<Vec<Feedback>, ApiError> {
        with_conn(pool, |conn| Ok(Self::list_with(conn)?)).await
    }

    pub async fn get(pool: &DbPool, feedback_id: i32) -> Result<Feedback, ApiError> {
        with_conn(pool, move |conn| Self::find_with(conn, feedback_id)).await
    }

    pub async fn delete(pool: &DbPool, feedback_id: i32) -> Result<(), ApiError> {
        with_conn(pool, move |conn| Self::delete_with(conn, feedback_id)).await
    }

    pub async fn clear_old(pool: &DbPool) -> Result<usize, ApiError> {
        with_conn(pool, |conn| Ok(Self::clear_old_with(conn, now())?)).await
    }
}
