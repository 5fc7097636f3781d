//! Cookie transport for the two credential spaces.

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse};

use crate::config::DbPool;
use crate::errors::ApiError;
use crate::models::{SessionRecord, SessionRole};
use crate::session::{SessionService, SESSION_DURATION_SECONDS};

pub const ADMIN_COOKIE: &str = "session_id";
pub const USER_COOKIE: &str = "user_session_id";

pub const ADMIN_LOGIN_PATH: &str = "/auth/login";
pub const USER_LOGIN_PATH: &str = "/auth/user/login";

pub fn cookie_name(role: SessionRole) -> &'static str {
    match role {
        SessionRole::Admin => ADMIN_COOKIE,
        SessionRole::User => USER_COOKIE,
    }
}

// TODO: mark secure once the shop is only reachable over HTTPS
pub fn session_cookie(role: SessionRole, token: String) -> Cookie<'static> {
    Cookie::build(cookie_name(role), token)
        .path("/")
        .http_only(true)
        .max_age(CookieDuration::seconds(SESSION_DURATION_SECONDS))
        .same_site(SameSite::Lax)
        .secure(false)
        .finish()
}

pub fn removal_cookie(role: SessionRole) -> Cookie<'static> {
    let mut cookie = Cookie::build(cookie_name(role), "").path("/").finish();
    cookie.make_removal();
    cookie
}

pub fn token_from(req: &HttpRequest, role: SessionRole) -> Option<String> {
    req.cookie(cookie_name(role))
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn current_admin(req: &HttpRequest, pool: &DbPool) -> Result<Option<SessionRecord>, ApiError> {
    match token_from(req, SessionRole::Admin) {
        Some(token) => SessionService::validate(pool, &token, SessionRole::Admin).await,
        None => Ok(None),
    }
}

pub async fn current_user(req: &HttpRequest, pool: &DbPool) -> Result<Option<SessionRecord>, ApiError> {
    match token_from(req, SessionRole::User) {
        Some(token) => SessionService::validate(pool, &token, SessionRole::User).await,
        None => Ok(None),
    }
}

pub async fn current_session(req: &HttpRequest, pool: &DbPool) -> Result<Option<SessionRecord>, ApiError> {
    let admin_token = token_from(req, SessionRole::Admin);
    let user_token = token_from(req, SessionRole::User);
    if admin_token.is_none() && user_token.is_none() {
        return Ok(None);
    }
    SessionService::resolve(pool, admin_token, user_token).await
}

/// For API-style endpoints: a missing admin session is a 401.
pub async fn require_admin(req: &HttpRequest, pool: &DbPool) -> Result<SessionRecord, ApiError> {
    current_admin(req, pool)
        .await?
        .ok_or_else(|| ApiError::AuthError("Unauthorized".to_string()))
}

/// For API-style endpoints: the user session and the user id it is bound to.
pub async fn require_user(req: &HttpRequest, pool: &DbPool) -> Result<(SessionRecord, i32), ApiError> {
    let record = current_user(req, pool)
        .await?
        .ok_or_else(|| ApiError::AuthError("User not logged in".to_string()))?;
    let user_id = record
        .user_id
        .ok_or_else(|| ApiError::AuthError("User not logged in".to_string()))?;
    Ok((record, user_id))
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location.to_string()))
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie(SessionRole::User, "abc".to_string());
        assert_eq!(cookie.name(), USER_COOKIE);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.max_age(), Some(CookieDuration::days(7)));
    }

    #[test]
    fn test_token_from_reads_the_right_cookie() {
        let req = TestRequest::default()
            .cookie(Cookie::new(ADMIN_COOKIE, "admin-token"))
            .cookie(Cookie::new(USER_COOKIE, ""))
            .to_http_request();
        assert_eq!(token_from(&req, SessionRole::Admin).as_deref(), Some("admin-token"));
        assert_eq!(token_from(&req, SessionRole::User), None);
    }

    #[test]
    fn test_removal_cookie_expires_immediately() {
        let cookie = removal_cookie(SessionRole::Admin);
        assert_eq!(cookie.name(), ADMIN_COOKIE);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
    }
}
