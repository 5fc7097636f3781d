use actix_web::web;
use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sqlite::SqliteConnection;
use log::{debug, error, info};

use crate::config::{DbPool, DB_INIT_SQL};
use crate::errors::ApiError;

// Applied to every pooled connection when it is opened
#[derive(Debug, Clone, Copy)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000; PRAGMA journal_mode = WAL;",
        )
        .map_err(r2d2::Error::QueryError)
    }
}

/// Builds the process-wide pool. Constructed once in `main` and handed to
/// every request through `web::Data`.
pub fn init_pool(database_url: &str) -> Result<DbPool, r2d2::PoolError> {
    info!("Opening SQLite database at {}", database_url);
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    r2d2::Pool::builder()
        .connection_customizer(Box::new(SqlitePragmas))
        .build(manager)
}

pub fn init_schema(pool: &DbPool) -> Result<(), ApiError> {
    let mut conn = pool.get().map_err(|e| {
        error!("Failed to get database connection: {}", e);
        ApiError::DatabaseError(e.to_string())
    })?;
    conn.batch_execute(DB_INIT_SQL).map_err(|e| {
        error!("Failed to execute database initialization script: {}", e);
        ApiError::DatabaseError(e.to_string())
    })?;
    debug!("Database schema verified");
    Ok(())
}

/// Runs `f` on the blocking pool with a connection checked out for exactly
/// the duration of the closure. The connection goes back to the pool on every
/// exit path, errors and panics included.
pub async fn with_conn<F, T>(pool: &DbPool, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    web::block(move || {
        let mut conn = pool.get().map_err(|e| {
            error!("Failed to get database connection: {}", e);
            ApiError::DatabaseError(e.to_string())
        })?;
        f(&mut conn)
    })
    .await
    .map_err(|e| {
        error!("Database operation error: {}", e);
        ApiError::DatabaseError(e.to_string())
    })?
}
