// Library half of the shop backend; the binary in main.rs only wires it up

pub mod analytics;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod errors;
pub mod favourites;
pub mod feedback;
pub mod handlers;
pub mod lists;
pub mod logger;
pub mod middleware;
pub mod models;
pub mod schema;
pub mod services;
pub mod session;
pub mod uploads;

// Re-export common types
pub use crate::config::AppConfig;
pub use crate::config::DbPool;
pub use crate::errors::ApiError;
pub use crate::session::SessionService;
