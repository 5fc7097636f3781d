use diesel::r2d2::{self, ConnectionManager};
use diesel::sqlite::SqliteConnection;
use log::{info, warn};
use std::env;
use std::path::PathBuf;

// Type aliases
pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

const DEFAULT_ADMIN_PASSWORD: &str = "change-me-now";

// Schema applied on every start; every statement is idempotent
pub const DB_INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS admins (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username VARCHAR(50) UNIQUE NOT NULL,
    password VARCHAR(255) NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR(100) NOT NULL,
    email VARCHAR(100) UNIQUE NOT NULL,
    password VARCHAR(255) NOT NULL,
    whatsapp VARCHAR(20),
    created_at TIMESTAMP,
    updated_at TIMESTAMP
);

CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR(100) NOT NULL,
    description TEXT,
    price DOUBLE NOT NULL,
    category VARCHAR(50) NOT NULL,
    status VARCHAR(20) NOT NULL DEFAULT 'Available',
    gender VARCHAR(10),
    image_url VARCHAR(255),
    images TEXT,
    sizes TEXT
);

CREATE TABLE IF NOT EXISTS user_favourites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (user_id, product_id)
);

CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id VARCHAR(255) UNIQUE NOT NULL,
    username VARCHAR(100) NOT NULL,
    user_type VARCHAR(20) NOT NULL,
    user_id INTEGER,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    expires_at TIMESTAMP NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS feedback (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR(100) NOT NULL,
    email VARCHAR(100) NOT NULL,
    message TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_sessions_lookup ON sessions (session_id, user_type, is_active);
CREATE INDEX IF NOT EXISTS idx_products_category ON products (category);
"#;

// Config
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub analytics_dir: PathBuf,
    pub max_file_size: usize, // In bytes
    pub bcrypt_cost: u32,
    pub admin_username: String,
    pub admin_password: String,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            database_url: "jubair_boot_house.db".to_string(),
            upload_dir: PathBuf::from("static/uploads"),
            analytics_dir: PathBuf::from("analytics"),
            max_file_size: 5 * 1024 * 1024,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            admin_username: "admin".to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let database_url = match env::var("DATABASE_URL") {
            Ok(val) => val.trim_start_matches("sqlite://").to_string(),
            Err(_) => {
                info!("DATABASE_URL not set, using {}", defaults.database_url);
                defaults.database_url
            }
        };

        let admin_password = match env::var("ADMIN_PASSWORD") {
            Ok(val) => val,
            Err(e) => {
                warn!("Failed to load ADMIN_PASSWORD: {}", e);
                warn!("Using default admin password - THIS IS NOT SECURE FOR PRODUCTION!");
                defaults.admin_password
            }
        };

        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT").unwrap_or(defaults.port),
            database_url,
            upload_dir: env::var("UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir),
            analytics_dir: env::var("ANALYTICS_DIR").map(PathBuf::from).unwrap_or(defaults.analytics_dir),
            max_file_size: parse_var("MAX_FILE_SIZE").unwrap_or(defaults.max_file_size),
            bcrypt_cost: parse_var("BCRYPT_COST").unwrap_or(defaults.bcrypt_cost),
            admin_username: env::var("ADMIN_USERNAME").unwrap_or(defaults.admin_username),
            admin_password,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_file: env::var("LOG_FILE").ok().filter(|v| !v.is_empty()).map(PathBuf::from),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.admin_password == DEFAULT_ADMIN_PASSWORD {
            warn!("Using default admin password is not secure for production!");
        }

        if self.port == 0 {
            return Err("PORT must be between 1 and 65535".to_string());
        }

        if self.max_file_size == 0 {
            return Err("MAX_FILE_SIZE must be positive".to_string());
        }

        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err("BCRYPT_COST must be between 4 and 31".to_string());
        }

        if self.admin_username.trim().is_empty() {
            return Err("ADMIN_USERNAME must not be empty".to_string());
        }

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Invalid {} value {:?}, using default", key, raw);
            None
        }
    }
}
