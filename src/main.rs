use actix_files::Files;
use actix_web::{web, App, HttpServer};
use log::{error, info, warn};

use jubair_boot_house::analytics::AnalyticsStore;
use jubair_boot_house::catalog::ProductService;
use jubair_boot_house::config::AppConfig;
use jubair_boot_house::db::{init_pool, init_schema};
use jubair_boot_house::handlers::configure;
use jubair_boot_house::logger::setup_logger;
use jubair_boot_house::middleware::RequestLogger;
use jubair_boot_house::services::AuthService;
use jubair_boot_house::uploads::{UploadStore, UPLOADS_URL_PREFIX};

fn startup_error(msg: impl std::fmt::Display) -> std::io::Error {
    error!("{}", msg);
    std::io::Error::new(std::io::ErrorKind::Other, msg.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = AppConfig::from_env();
    setup_logger(&config);

    info!("Starting Jubair Boot House server");

    config
        .validate()
        .map_err(|e| startup_error(format!("Invalid configuration: {}", e)))?;

    let pool = init_pool(&config.database_url)
        .map_err(|e| startup_error(format!("Failed to create database pool: {}", e)))?;
    info!("Database connection pool created successfully");

    init_schema(&pool).map_err(|e| startup_error(format!("Failed to initialize database schema: {}", e)))?;
    info!("Database schema initialized successfully");

    match AuthService::ensure_admin(&pool, &config).await {
        Ok(true) => info!("Seeded admin account {}", config.admin_username),
        Ok(false) => {}
        Err(e) => warn!("Failed to seed admin account: {}", e),
    }

    let uploads = UploadStore::new(config.upload_dir.clone(), config.max_file_size);
    uploads
        .ensure_dir()
        .map_err(|e| startup_error(format!("Failed to prepare uploads directory: {}", e)))?;
    let analytics = AnalyticsStore::new(config.analytics_dir.clone());

    if let Err(e) = ProductService::backfill_gender(&pool, &analytics).await {
        warn!("Gender backfill failed: {}", e);
    }

    let host = config.host.clone();
    let port = config.port;
    info!("Starting HTTP server on {}:{}", host, port);

    let config_data = web::Data::new(config);
    let uploads_data = web::Data::new(uploads);
    let analytics_data = web::Data::new(analytics);

    HttpServer::new(move || {
        App::new()
            .wrap(RequestLogger)
            .app_data(web::Data::new(pool.clone()))
            .app_data(config_data.clone())
            .app_data(uploads_data.clone())
            .app_data(analytics_data.clone())
            .service(Files::new(UPLOADS_URL_PREFIX, uploads_data.dir().to_path_buf()))
            .configure(configure)
    })
    .bind((host.as_str(), port))?
    .workers(2)
    .keep_alive(std::time::Duration::from_secs(75))
    .shutdown_timeout(30)
    .run()
    .await
}
