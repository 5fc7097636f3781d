use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::lists;

pub const CATEGORIES: [&str; 6] = ["Sports", "Casual", "Formal", "Boots", "Sneakers", "Sandals"];
pub const SIZES: [&str; 7] = ["6", "7", "8", "9", "10", "11", "12"];

/// Which credential space a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionRole {
    Admin,
    User,
}

impl SessionRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionRole::Admin => "admin",
            SessionRole::User => "user",
        }
    }
}

impl FromStr for SessionRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(SessionRole::Admin),
            "user" => Ok(SessionRole::User),
            other => Err(format!("unknown session role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProductStatus {
    #[serde(rename = "Available")]
    Available,
    #[serde(rename = "Out of Stock")]
    OutOfStock,
}

impl ProductStatus {
    pub const ALL: [ProductStatus; 2] = [ProductStatus::Available, ProductStatus::OutOfStock];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Available => "Available",
            ProductStatus::OutOfStock => "Out of Stock",
        }
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Available" => Ok(ProductStatus::Available),
            "Out of Stock" => Ok(ProductStatus::OutOfStock),
            other => Err(format!("Invalid status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Male" => Ok(Gender::Male),
            "Female" => Ok(Gender::Female),
            other => Err(format!("Invalid gender: {}", other)),
        }
    }
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = crate::schema::admins)]
pub struct Admin {
    pub id: i32,
    pub username: String,
    pub password: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::admins)]
pub struct NewAdmin {
    pub username: String,
    pub password: String,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub whatsapp: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl User {
    /// Name shown in the header; falls back to the local part of the email.
    pub fn display_name(&self) -> String {
        if !self.name.trim().is_empty() {
            return self.name.clone();
        }
        self.email.split('@').next().unwrap_or_default().to_string()
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub whatsapp: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::products)]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: String,
    pub status: String,
    pub gender: Option<String>,
    pub image_url: Option<String>,
    pub images: Option<String>,
    pub sizes: Option<String>,
}

impl Product {
    /// Uploaded images only; the primary `image_url` is not repeated here.
    pub fn images_list(&self) -> Vec<String> {
        lists::decode(self.images.as_deref())
    }

    pub fn sizes_list(&self) -> Vec<String> {
        lists::decode(self.sizes.as_deref())
    }
}

/// Product as sent to clients, with list columns decoded.
#[derive(Serialize, Debug, Clone)]
pub struct ProductView {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: String,
    pub status: String,
    pub gender: Option<String>,
    pub image_url: Option<String>,
    pub images: Vec<String>,
    pub sizes: Vec<String>,
}

impl From<Product> for ProductView {
    fn from(p: Product) -> Self {
        let images = p.images_list();
        let sizes = p.sizes_list();
        ProductView {
            id: p.id,
            name: p.name,
            description: p.description,
            price: p.price,
            category: p.category,
            status: p.status,
            gender: p.gender,
            image_url: p.image_url,
            images,
            sizes,
        }
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::products)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: String,
    pub status: String,
    pub gender: Option<String>,
    pub image_url: Option<String>,
    pub images: Option<String>,
    pub sizes: Option<String>,
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = crate::schema::user_favourites)]
pub struct UserFavourite {
    pub id: i32,
    pub user_id: i32,
    pub product_id: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::user_favourites)]
pub struct NewUserFavourite {
    pub user_id: i32,
    pub product_id: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = crate::schema::sessions)]
pub struct SessionRecord {
    pub id: i32,
    #[serde(skip_serializing)]
    pub session_id: String,
    pub username: String,
    pub user_type: String,
    pub user_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub is_active: bool,
}

impl SessionRecord {
    pub fn role(&self) -> Option<SessionRole> {
        self.user_type.parse().ok()
    }

    pub fn is_valid_at(&self, now: NaiveDateTime) -> bool {
        self.is_active && now < self.expires_at
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::sessions)]
pub struct NewSession {
    pub session_id: String,
    pub username: String,
    pub user_type: String,
    pub user_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub is_active: bool,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = crate::schema::feedback)]
pub struct Feedback {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub message: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::feedback)]
pub struct NewFeedback {
    pub name: String,
    pub email: String,
    pub message: String,
    pub created_at: NaiveDateTime,
}

// Validated product fields shared by add and edit
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: String,
    pub status: ProductStatus,
    pub gender: Option<Gender>,
    pub image_url: Option<String>,
    pub sizes: Vec<String>,
}

// DTOs
#[derive(Deserialize, Debug)]
pub struct AdminLoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct UserLoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub whatsapp: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ProfileUpdateForm {
    pub name: String,
    pub whatsapp: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct ContactForm {
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub subject: String,
    pub message: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct CatalogQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct DashboardQuery {
    pub show_add: Option<bool>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct StatusForm {
    pub status: String,
}

#[derive(Deserialize, Debug)]
pub struct RemoveImageQuery {
    pub image_path: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct UserLoginPageQuery {
    pub signup: Option<String>,
    pub email: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct SessionStatus {
    pub logged_in: bool,
    pub user_type: Option<SessionRole>,
    pub username: Option<String>,
    pub user_id: Option<i32>,
}

impl SessionStatus {
    pub fn logged_out() -> Self {
        SessionStatus {
            logged_in: false,
            user_type: None,
            username: None,
            user_id: None,
        }
    }
}

/// Trims a query or form value and drops it when blank.
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(images: Option<&str>, sizes: Option<&str>) -> Product {
        Product {
            id: 1,
            name: "Chelsea Boot".to_string(),
            description: None,
            price: 89.5,
            category: "Boots".to_string(),
            status: "Available".to_string(),
            gender: None,
            image_url: Some("/static/main.jpg".to_string()),
            images: images.map(str::to_string),
            sizes: sizes.map(str::to_string),
        }
    }

    #[test]
    fn test_product_lists_tolerate_garbage() {
        let p = product(Some("not json"), Some(r#"{"a": 1}"#));
        assert!(p.images_list().is_empty());
        assert!(p.sizes_list().is_empty());
    }

    #[test]
    fn test_product_view_decodes_lists() {
        let p = product(Some(r#"["/static/uploads/a.png"]"#), Some(r#"["8","9"]"#));
        let view = ProductView::from(p);
        assert_eq!(view.images, vec!["/static/uploads/a.png".to_string()]);
        assert_eq!(view.sizes, vec!["8".to_string(), "9".to_string()]);
        assert_eq!(view.image_url.as_deref(), Some("/static/main.jpg"));
    }

    #[test]
    fn test_status_and_gender_parse() {
        assert_eq!("Out of Stock".parse::<ProductStatus>(), Ok(ProductStatus::OutOfStock));
        assert!("Sold".parse::<ProductStatus>().is_err());
        assert_eq!(" Female ".parse::<Gender>(), Ok(Gender::Female));
        assert!("admin".parse::<SessionRole>().is_ok());
        assert!("guest".parse::<SessionRole>().is_err());
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let user = User {
            id: 3,
            name: "  ".to_string(),
            email: "sara@example.com".to_string(),
            password: String::new(),
            whatsapp: None,
            created_at: None,
            updated_at: None,
        };
        assert_eq!(user.display_name(), "sara");
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  ")), None);
        assert_eq!(non_empty(Some(" Boots ")), Some("Boots".to_string()));
        assert_eq!(non_empty(None), None);
    }
}
