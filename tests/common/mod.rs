#![allow(dead_code)]

use actix_web::cookie::Cookie;
use diesel::prelude::*;
use tempfile::TempDir;

use jubair_boot_house::analytics::AnalyticsStore;
use jubair_boot_house::auth::{ADMIN_COOKIE, USER_COOKIE};
use jubair_boot_house::config::{AppConfig, DbPool};
use jubair_boot_house::db::{init_pool, init_schema};
use jubair_boot_house::models::{NewProduct, NewUser, SessionRole};
use jubair_boot_house::schema::{products, users};
use jubair_boot_house::services::AuthService;
use jubair_boot_house::session::{now, SessionService, Subject};
use jubair_boot_house::uploads::UploadStore;

pub const ADMIN_PASSWORD: &str = "boots-and-laces";
pub const USER_PASSWORD: &str = "walk-a-mile";

pub struct TestEnv {
    pub dir: TempDir,
    pub pool: DbPool,
    pub config: AppConfig,
    pub uploads: UploadStore,
    pub analytics: AnalyticsStore,
}

pub fn setup() -> TestEnv {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = AppConfig {
        database_url: dir.path().join("shop.db").to_string_lossy().into_owned(),
        upload_dir: dir.path().join("uploads"),
        analytics_dir: dir.path().join("analytics"),
        max_file_size: 1024,
        bcrypt_cost: 4,
        admin_username: "owner".to_string(),
        admin_password: ADMIN_PASSWORD.to_string(),
        ..AppConfig::default()
    };

    let pool = init_pool(&config.database_url).expect("pool");
    init_schema(&pool).expect("schema");
    {
        let mut conn = pool.get().expect("conn");
        AuthService::ensure_admin_with(&mut conn, &config).expect("seed admin");
    }

    let uploads = UploadStore::new(config.upload_dir.clone(), config.max_file_size);
    let analytics = AnalyticsStore::new(config.analytics_dir.clone());
    TestEnv { dir, pool, config, uploads, analytics }
}

/// Builds the service with the same route table and app data as the binary.
macro_rules! test_app {
    ($env:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($env.pool.clone()))
                .app_data(actix_web::web::Data::new($env.config.clone()))
                .app_data(actix_web::web::Data::new($env.uploads.clone()))
                .app_data(actix_web::web::Data::new($env.analytics.clone()))
                .configure(jubair_boot_house::handlers::configure),
        )
        .await
    };
}

impl TestEnv {
    pub fn insert_user(&self, name: &str, email: &str) -> i32 {
        let mut conn = self.pool.get().expect("conn");
        diesel::insert_into(users::table)
            .values(&NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password: AuthService::hash_password(USER_PASSWORD, 4).expect("hash"),
                whatsapp: None,
                created_at: Some(now()),
                updated_at: Some(now()),
            })
            .returning(users::id)
            .get_result(&mut conn)
            .expect("insert user")
    }

    pub fn insert_product(&self, name: &str, category: &str, images: Option<&str>) -> i32 {
        let mut conn = self.pool.get().expect("conn");
        diesel::insert_into(products::table)
            .values(&NewProduct {
                name: name.to_string(),
                description: Some(format!("{} description", name)),
                price: 75.0,
                category: category.to_string(),
                status: "Available".to_string(),
                gender: None,
                image_url: None,
                images: images.map(str::to_string),
                sizes: Some(r#"["8","9"]"#.to_string()),
            })
            .returning(products::id)
            .get_result(&mut conn)
            .expect("insert product")
    }

    pub async fn admin_cookie(&self) -> Cookie<'static> {
        let subject = Subject { username: "owner".to_string(), user_id: None };
        let token = SessionService::issue(&self.pool, SessionRole::Admin, subject)
            .await
            .expect("admin session");
        Cookie::new(ADMIN_COOKIE, token)
    }

    pub async fn user_cookie(&self, user_id: i32, email: &str) -> Cookie<'static> {
        let subject = Subject { username: email.to_string(), user_id: Some(user_id) };
        let token = SessionService::issue(&self.pool, SessionRole::User, subject)
            .await
            .expect("user session");
        Cookie::new(USER_COOKIE, token)
    }
}

pub fn location(resp: &actix_web::dev::ServiceResponse) -> String {
    resp.headers()
        .get(actix_web::http::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
