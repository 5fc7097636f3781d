use bcrypt::{hash, verify};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;
use log::{debug, error, info, warn};

use crate::config::{AppConfig, DbPool};
use crate::db::with_conn;
use crate::errors::ApiError;
use crate::models::*;
use crate::schema::{admins, users};
use crate::session::{now, SessionService, Subject};

pub struct AuthService;

impl AuthService {
    pub fn hash_password(password: &str, cost: u32) -> Result<String, ApiError> {
        hash(password, cost).map_err(|e| {
            error!("Failed to hash password: {}", e);
            ApiError::InternalError("Failed to hash password".to_string())
        })
    }

    /// A stored hash bcrypt cannot parse counts as a mismatch.
    pub fn verify_password(password: &str, hash: &str) -> bool {
        match verify(password, hash) {
            Ok(valid) => valid,
            Err(e) => {
                warn!("Failed to verify password against stored hash: {}", e);
                false
            }
        }
    }

    /// Creates the configured admin when the table is empty. Returns whether
    /// an admin was created.
    pub fn ensure_admin_with(conn: &mut SqliteConnection, config: &AppConfig) -> Result<bool, ApiError> {
        let existing = admins::table
            .select(admins::username)
            .first::<String>(conn)
            .optional()?;

        if let Some(username) = existing {
            debug!("Admin user already exists: {}", username);
            return Ok(false);
        }

        let new_admin = NewAdmin {
            username: config.admin_username.clone(),
            password: Self::hash_password(&config.admin_password, config.bcrypt_cost)?,
        };
        diesel::insert_into(admins::table)
            .values(&new_admin)
            .execute(conn)?;

        info!("Default admin user {} created", config.admin_username);
        Ok(true)
    }

    pub async fn ensure_admin(pool: &DbPool, config: &AppConfig) -> Result<bool, ApiError> {
        let config = config.clone();
        with_conn(pool, move |conn| Self::ensure_admin_with(conn, &config)).await
    }

    /// Checks admin credentials and issues an admin session token.
    pub async fn admin_login(pool: &DbPool, form: AdminLoginForm) -> Result<String, ApiError> {
        debug!("Admin login attempt for: {}", form.username);

        let admin = with_conn(pool, move |conn| {
            let admin = admins::table
                .filter(admins::username.eq(&form.username))
                .select(Admin::as_select())
                .first(conn)
                .optional()?;
            Ok(admin.filter(|a| Self::verify_password(&form.password, &a.password)))
        })
        .await?;

        let admin = admin.ok_or_else(|| ApiError::AuthError("Invalid username or password".to_string()))?;
        let subject = Subject { username: admin.username, user_id: None };
        SessionService::issue(pool, SessionRole::Admin, subject).await
    }

    /// Checks customer credentials and issues a user session bound to the user id.
    pub async fn user_login(pool: &DbPool, form: UserLoginForm) -> Result<String, ApiError> {
        debug!("User login attempt for: {}", form.email);

        let email = form.email.trim().to_string();
        let user = with_conn(pool, move |conn| {
            let user = UserService::find_by_email_with(conn, &email)?;
            Ok(user.filter(|u| Self::verify_password(&form.password, &u.password)))
        })
        .await?;

        let user = user.ok_or_else(|| ApiError::AuthError("Invalid email or password".to_string()))?;
        let subject = Subject { username: user.email, user_id: Some(user.id) };
        SessionService::issue(pool, SessionRole::User, subject).await
    }

    pub async fn signup(pool: &DbPool, form: SignupForm, cost: u32) -> Result<User, ApiError> {
        if form.password != form.confirm_password {
            return Err(ApiError::ValidationError("Passwords do not match".to_string()));
        }

        let email = form.email.trim().to_string();
        let name = form.name.trim().to_string();
        if email.is_empty() || !email.contains('@') {
            return Err(ApiError::ValidationError("A valid email address is required".to_string()));
        }
        if name.is_empty() {
            return Err(ApiError::ValidationError("Name is required".to_string()));
        }
        if form.password.is_empty() {
            return Err(ApiError::ValidationError("Password is required".to_string()));
        }

        with_conn(pool, move |conn| {
            if UserService::find_by_email_with(conn, &email)?.is_some() {
                debug!("Signup failed: email already exists {}", email);
                return Err(duplicate_email());
            }

            let timestamp = now();
            let new_user = NewUser {
                name,
                email,
                password: Self::hash_password(&form.password, cost)?,
                whatsapp: non_empty(form.whatsapp.as_deref()),
                created_at: Some(timestamp),
                updated_at: Some(timestamp),
            };

            let user = diesel::insert_into(users::table)
                .values(&new_user)
                .returning(User::as_returning())
                .get_result(conn)
                .map_err(|e| match e {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => duplicate_email(),
                    other => {
                        error!("Failed to create user: {}", other);
                        ApiError::DatabaseError(other.to_string())
                    }
                })?;

            info!("Created new user with ID: {}", user.id);
            Ok(user)
        })
        .await
    }
}

fn duplicate_email() -> ApiError {
    ApiError::ValidationError("User with this email already exists".to_string())
}

pub struct UserService;

impl UserService {
    pub fn find_by_email_with(conn: &mut SqliteConnection, email_addr: &str) -> Result<Option<User>, ApiError> {
        Ok(users::table
            .filter(users::email.eq(email_addr))
            .select(User::as_select())
            .first(conn)
            .optional()?)
    }

    pub async fn get_user_by_id(id: i32, pool: &DbPool) -> Result<User, ApiError> {
        with_conn(pool, move |conn| {
            users::table
                .find(id)
                .select(User::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| {
                    debug!("User not found with ID {}", id);
                    ApiError::NotFoundError("User not found".to_string())
                })
        })
        .await
    }

    pub async fn list_users(pool: &DbPool) -> Result<Vec<User>, ApiError> {
        with_conn(pool, |conn| {
            Ok(users::table
                .order(users::id)
                .select(User::as_select())
                .load(conn)?)
        })
        .await
    }

    pub async fn update_profile(
        user_id: i32,
        form: ProfileUpdateForm,
        pool: &DbPool,
    ) -> Result<User, ApiError> {
        let name = form.name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::ValidationError("Name is required".to_string()));
        }
        let whatsapp = non_empty(form.whatsapp.as_deref());

        with_conn(pool, move |conn| {
            let updated = diesel::update(users::table.find(user_id))
                .set((
                    users::name.eq(name),
                    users::whatsapp.eq(whatsapp),
                    users::updated_at.eq(Some(now())),
                ))
                .returning(User::as_returning())
                .get_result(conn)
                .optional()?;

            updated.ok_or_else(|| ApiError::NotFoundError("User not found".to_string()))
        })
        .await
    }
}
