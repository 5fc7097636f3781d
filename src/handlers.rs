use actix_multipart::form::{tempfile::TempFile, text::Text, MultipartForm};
use actix_web::cookie::Cookie;
use actix_web::http::header;
use actix_web::{delete, get, post, web, HttpRequest, HttpResponse, Responder};
use log::{debug, error, info, warn};
use serde_json::json;

use crate::analytics::{build_report, AnalyticsStore};
use crate::auth::{
    current_admin, current_session, current_user, redirect, removal_cookie, require_admin, require_user,
    session_cookie, token_from, ADMIN_LOGIN_PATH, USER_LOGIN_PATH,
};
use crate::catalog::{ProductFields, ProductService};
use crate::config::{AppConfig, DbPool};
use crate::errors::ApiError;
use crate::favourites::FavouriteService;
use crate::feedback::FeedbackService;
use crate::models::*;
use crate::services::{AuthService, UserService};
use crate::session::SessionService;
use crate::uploads::UploadStore;

pub const DASHBOARD_PATH: &str = "/products/admin/dashboard";

fn redirect_with(location: &str, cookie: Cookie<'static>) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location.to_string()))
        .cookie(cookie)
        .finish()
}

#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

// Admin auth

#[get("/auth/login")]
async fn admin_login_page(req: HttpRequest, pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    if current_admin(&req, &pool).await?.is_some() {
        return Ok(redirect(DASHBOARD_PATH));
    }
    Ok(HttpResponse::Ok().json(json!({ "page": "admin_login", "logged_in": false })))
}

#[post("/auth/login")]
async fn admin_login(
    pool: web::Data<DbPool>,
    form: web::Form<AdminLoginForm>,
) -> Result<HttpResponse, ApiError> {
    let token = AuthService::admin_login(&pool, form.into_inner()).await?;
    Ok(redirect_with(DASHBOARD_PATH, session_cookie(SessionRole::Admin, token)))
}

#[get("/auth/logout")]
async fn admin_logout(req: HttpRequest, pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    if let Some(token) = token_from(&req, SessionRole::Admin) {
        SessionService::logout(&pool, &token, SessionRole::Admin).await?;
    }
    Ok(redirect_with("/", removal_cookie(SessionRole::Admin)))
}

#[get("/auth/setup")]
async fn setup_admin(pool: web::Data<DbPool>, config: web::Data<AppConfig>) -> Result<HttpResponse, ApiError> {
    let created = AuthService::ensure_admin(&pool, &config).await?;
    let message = if created { "Admin user created" } else { "Admin user already exists" };
    Ok(HttpResponse::Ok().json(json!({ "success": true, "created": created, "message": message })))
}

// User auth

#[get("/auth/user/login")]
async fn user_login_page(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    query: web::Query<UserLoginPageQuery>,
) -> Result<HttpResponse, ApiError> {
    if current_user(&req, &pool).await?.is_some() {
        return Ok(redirect("/"));
    }
    let query = query.into_inner();
    Ok(HttpResponse::Ok().json(json!({
        "page": "user_login",
        "signup_success": query.signup.as_deref() == Some("success"),
        "prefill_email": query.email.unwrap_or_default(),
    })))
}

#[post("/auth/user/login")]
async fn user_login(pool: web::Data<DbPool>, form: web::Form<UserLoginForm>) -> Result<HttpResponse, ApiError> {
    let form = form.into_inner();
    let email = form.email.trim().to_string();
    match AuthService::user_login(&pool, form).await {
        Ok(token) => Ok(redirect_with("/", session_cookie(SessionRole::User, token))),
        Err(ApiError::AuthError(msg)) => {
            warn!("User login failed for {}", email);
            Ok(HttpResponse::Unauthorized().json(json!({
                "success": false,
                "error": msg,
                "prefill_email": email,
            })))
        }
        Err(e) => Err(e),
    }
}

#[post("/auth/user/signup")]
async fn user_signup(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    form: web::Form<SignupForm>,
) -> Result<HttpResponse, ApiError> {
    let user = AuthService::signup(&pool, form.into_inner(), config.bcrypt_cost).await?;
    let query = serde_urlencoded::to_string([("signup", "success"), ("email", user.email.as_str())])
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(redirect(&format!("{}?{}", USER_LOGIN_PATH, query)))
}

#[get("/auth/user/logout")]
async fn user_logout(req: HttpRequest, pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    if let Some(token) = token_from(&req, SessionRole::User) {
        SessionService::logout(&pool, &token, SessionRole::User).await?;
    }
    Ok(redirect_with("/", removal_cookie(SessionRole::User)))
}

#[get("/auth/session/status")]
async fn session_status(req: HttpRequest, pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    let record = match current_session(&req, &pool).await? {
        Some(record) => record,
        None => return Ok(HttpResponse::Ok().json(SessionStatus::logged_out())),
    };

    let role = record.role();
    if let Some(role) = role {
        SessionService::refresh(&pool, &record.session_id, role).await?;
    }

    let username = match (role, record.user_id) {
        (Some(SessionRole::User), Some(user_id)) => match UserService::get_user_by_id(user_id, &pool).await {
            Ok(user) => user.display_name(),
            Err(_) => record.username.split('@').next().unwrap_or_default().to_string(),
        },
        _ => record.username.clone(),
    };

    Ok(HttpResponse::Ok().json(SessionStatus {
        logged_in: true,
        user_type: role,
        username: Some(username),
        user_id: record.user_id,
    }))
}

// Profile and favourites

async fn profile_page(req: HttpRequest, pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    let user_id = match current_user(&req, &pool).await?.and_then(|r| r.user_id) {
        Some(id) => id,
        None => return Ok(redirect(USER_LOGIN_PATH)),
    };

    let user = match UserService::get_user_by_id(user_id, &pool).await {
        Ok(user) => user,
        Err(ApiError::NotFoundError(_)) => return Ok(redirect(USER_LOGIN_PATH)),
        Err(e) => return Err(e),
    };
    let favourites: Vec<ProductView> = FavouriteService::products_for(&pool, user_id)
        .await?
        .into_iter()
        .map(ProductView::from)
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "display_name": user.display_name(),
        "user": user,
        "favourite_count": favourites.len(),
        "favourites": favourites,
    })))
}

#[get("/auth/user/favourites")]
async fn user_favourites(req: HttpRequest, pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    profile_page(req, pool).await
}

#[get("/auth/user/profile")]
async fn user_profile(req: HttpRequest, pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    profile_page(req, pool).await
}

#[post("/auth/user/profile/update")]
async fn update_profile(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    form: web::Form<ProfileUpdateForm>,
) -> Result<HttpResponse, ApiError> {
    let (_, user_id) = require_user(&req, &pool).await?;
    let user = UserService::update_profile(user_id, form.into_inner(), &pool).await?;
    info!("User {} updated their profile", user_id);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Profile updated", "user": user })))
}

#[post("/auth/user/favourites/add/{product_id}")]
async fn add_favourite(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let (_, user_id) = require_user(&req, &pool).await?;
    let product_id = path.into_inner();
    FavouriteService::add(&pool, user_id, product_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Product added to favourites" })))
}

#[delete("/auth/user/favourites/remove/{product_id}")]
async fn remove_favourite(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let (_, user_id) = require_user(&req, &pool).await?;
    let product_id = path.into_inner();
    FavouriteService::remove(&pool, user_id, product_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Product removed from favourites" })))
}

#[get("/auth/user/favourites/check/{product_id}")]
async fn check_favourite(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let user_id = match current_user(&req, &pool).await?.and_then(|r| r.user_id) {
        Some(id) => id,
        None => {
            return Ok(HttpResponse::Ok().json(json!({
                "is_favourited": false,
                "message": "User not logged in",
            })))
        }
    };
    let is_favourited = FavouriteService::is_favourited(&pool, user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "is_favourited": is_favourited })))
}

#[get("/auth/admin/users")]
async fn list_users(req: HttpRequest, pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    if current_admin(&req, &pool).await?.is_none() {
        return Ok(redirect(ADMIN_LOGIN_PATH));
    }
    let users = UserService::list_users(&pool).await?;
    debug!("Listed {} users", users.len());
    Ok(HttpResponse::Ok().json(json!({ "total": users.len(), "users": users })))
}

// Catalog

#[get("/products/")]
async fn catalog(
    pool: web::Data<DbPool>,
    analytics: web::Data<AnalyticsStore>,
    query: web::Query<CatalogQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = ProductService::catalog(&pool, &analytics, query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[get("/products/{id:\\d+}")]
async fn product_detail(pool: web::Data<DbPool>, path: web::Path<i32>) -> Result<HttpResponse, ApiError> {
    let detail = ProductService::detail(&pool, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[get("/products/admin/dashboard")]
async fn dashboard(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    query: web::Query<DashboardQuery>,
) -> Result<HttpResponse, ApiError> {
    if current_admin(&req, &pool).await?.is_none() {
        return Ok(redirect(ADMIN_LOGIN_PATH));
    }
    let dashboard = ProductService::dashboard(&pool, query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(dashboard))
}

/// Multipart body of the add and edit product forms.
#[derive(MultipartForm)]
pub struct ProductForm {
    name: Option<Text<String>>,
    description: Option<Text<String>>,
    price: Option<Text<String>>,
    category: Option<Text<String>>,
    status: Option<Text<String>>,
    product_status: Option<Text<String>>,
    gender: Option<Text<String>>,
    image_url: Option<Text<String>>,
    sizes: Vec<Text<String>>,
    images: Vec<TempFile>,
    images_to_remove: Option<Text<String>>,
}

fn text(field: &Option<Text<String>>) -> Option<String> {
    field.as_ref().map(|t| t.0.clone())
}

impl ProductForm {
    fn fields(&self) -> ProductFields {
        ProductFields {
            name: text(&self.name).unwrap_or_default(),
            description: text(&self.description),
            price: text(&self.price).unwrap_or_default(),
            category: text(&self.category).unwrap_or_default(),
            status: non_empty(text(&self.product_status).as_deref())
                .or_else(|| text(&self.status))
                .unwrap_or_else(|| ProductStatus::Available.as_str().to_string()),
            gender: text(&self.gender),
            image_url: text(&self.image_url),
            sizes: self.sizes.iter().map(|s| s.0.clone()).collect(),
        }
    }

    fn images_to_remove(&self) -> Vec<String> {
        text(&self.images_to_remove)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Copies every named upload into the store. On failure the files already
/// copied are removed again.
async fn store_uploads(uploads: &UploadStore, files: Vec<TempFile>) -> Result<Vec<String>, ApiError> {
    let uploads = uploads.clone();
    web::block(move || {
        let mut saved = Vec::new();
        for file in files {
            let named = file.file_name.as_deref().map_or(false, |n| !n.trim().is_empty());
            if !named || file.size == 0 {
                continue;
            }
            match uploads.save_file(file.file.path(), file.file_name.as_deref(), file.size) {
                Ok(path) => saved.push(path),
                Err(e) => {
                    discard(&uploads, &saved);
                    return Err(e);
                }
            }
        }
        Ok(saved)
    })
    .await
    .map_err(|e| {
        error!("Upload processing error: {}", e);
        ApiError::InternalError(e.to_string())
    })?
}

fn discard(uploads: &UploadStore, paths: &[String]) {
    for path in paths {
        uploads.remove(path);
    }
}

#[post("/products/admin/add")]
async fn add_product(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    uploads: web::Data<UploadStore>,
    MultipartForm(form): MultipartForm<ProductForm>,
) -> Result<HttpResponse, ApiError> {
    if current_admin(&req, &pool).await?.is_none() {
        return Ok(redirect(ADMIN_LOGIN_PATH));
    }

    let input = form.fields().validate()?;
    let images = store_uploads(&uploads, form.images).await?;

    if let Err(e) = ProductService::create(&pool, input, images.clone()).await {
        discard(&uploads, &images);
        return Err(e);
    }
    Ok(redirect(DASHBOARD_PATH))
}

#[post("/products/admin/edit/{id}")]
async fn edit_product(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    uploads: web::Data<UploadStore>,
    path: web::Path<i32>,
    MultipartForm(form): MultipartForm<ProductForm>,
) -> Result<HttpResponse, ApiError> {
    if current_admin(&req, &pool).await?.is_none() {
        return Ok(redirect(ADMIN_LOGIN_PATH));
    }

    let product_id = path.into_inner();
    ProductService::get(&pool, product_id).await?;
    let input = form.fields().validate()?;
    let to_remove = form.images_to_remove();
    let new_images = store_uploads(&uploads, form.images).await?;

    if let Err(e) = ProductService::update(&pool, &uploads, product_id, input, to_remove, new_images.clone()).await {
        discard(&uploads, &new_images);
        return Err(e);
    }
    Ok(redirect(DASHBOARD_PATH))
}

#[delete("/products/admin/remove-image/{id}")]
async fn remove_product_image(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    uploads: web::Data<UploadStore>,
    path: web::Path<i32>,
    query: web::Query<RemoveImageQuery>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req, &pool).await?;
    let remaining =
        ProductService::remove_image(&pool, &uploads, path.into_inner(), query.into_inner().image_path).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Image removed successfully",
        "remaining_images": remaining,
    })))
}

#[delete("/products/admin/delete/{id}")]
async fn delete_product(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    uploads: web::Data<UploadStore>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req, &pool).await?;
    ProductService::delete(&pool, &uploads, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Product deleted successfully" })))
}

#[post("/products/admin/update-status/{id}")]
async fn update_product_status(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    form: web::Form<StatusForm>,
) -> Result<HttpResponse, ApiError> {
    if current_admin(&req, &pool).await?.is_none() {
        return Ok(redirect(ADMIN_LOGIN_PATH));
    }
    let status = form.status.parse::<ProductStatus>().map_err(ApiError::ValidationError)?;
    ProductService::update_status(&pool, path.into_inner(), status).await?;
    Ok(redirect(DASHBOARD_PATH))
}

#[get("/products/admin/analytics")]
async fn product_analytics(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    analytics: web::Data<AnalyticsStore>,
) -> Result<HttpResponse, ApiError> {
    if current_admin(&req, &pool).await?.is_none() {
        return Ok(redirect(ADMIN_LOGIN_PATH));
    }
    let products = ProductService::all(&pool).await?;
    let favourite_counts = FavouriteService::counts(&pool).await?;
    let report = build_report(&products, &analytics.load_search_stats(), &favourite_counts);
    Ok(HttpResponse::Ok().json(report))
}

// Feedback

#[post("/contact")]
async fn submit_contact(pool: web::Data<DbPool>, form: web::Form<ContactForm>) -> Result<HttpResponse, ApiError> {
    FeedbackService::submit(&pool, form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Thank you for your message. We will get back to you soon.",
    })))
}

#[get("/admin/feedback")]
async fn feedback_list(req: HttpRequest, pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    if current_admin(&req, &pool).await?.is_none() {
        return Ok(redirect(ADMIN_LOGIN_PATH));
    }
    let entries = FeedbackService::list(&pool).await?;
    Ok(HttpResponse::Ok().json(json!({ "total": entries.len(), "feedback": entries })))
}

#[delete("/admin/feedback/clear-old")]
async fn feedback_clear_old(req: HttpRequest, pool: web::Data<DbPool>) -> Result<HttpResponse, ApiError> {
    require_admin(&req, &pool).await?;
    let deleted = FeedbackService::clear_old(&pool).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "deleted_count": deleted })))
}

#[get("/admin/feedback/{id:\\d+}")]
async fn feedback_detail(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req, &pool).await?;
    let entry = FeedbackService::get(&pool, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(entry))
}

#[delete("/admin/feedback/{id:\\d+}")]
async fn feedback_delete(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req, &pool).await?;
    FeedbackService::delete(&pool, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Feedback deleted" })))
}

// Legacy paths

#[get("/catalog")]
async fn catalog_redirect() -> HttpResponse {
    redirect("/products/")
}

#[get("/admin/dashboard")]
async fn admin_dashboard_redirect() -> HttpResponse {
    redirect(DASHBOARD_PATH)
}

#[get("/admin/users")]
async fn admin_users_redirect() -> HttpResponse {
    redirect("/auth/admin/users")
}

/// Route table shared by the binary and the integration tests. Expects
/// `DbPool`, `AppConfig`, `UploadStore` and `AnalyticsStore` as app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        .service(admin_login_page)
        .service(admin_login)
        .service(admin_logout)
        .service(setup_admin)
        .service(user_login_page)
        .service(user_login)
        .service(user_signup)
        .service(user_logout)
        .service(session_status)
        .service(user_favourites)
        .service(user_profile)
        .service(update_profile)
        .service(add_favourite)
        .service(remove_favourite)
        .service(check_favourite)
        .service(list_users)
        .service(catalog)
        .service(dashboard)
        .service(add_product)
        .service(edit_product)
        .service(remove_product_image)
        .service(delete_product)
        .service(update_product_status)
        .service(product_analytics)
        .service(product_detail)
        .service(submit_contact)
        .service(feedback_list)
        .service(feedback_clear_old)
        .service(feedback_detail)
        .service(feedback_delete)
        .service(catalog_redirect)
        .service(admin_dashboard_redirect)
        .service(admin_users_redirect);
}
