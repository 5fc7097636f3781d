use actix_web::web;
use diesel::prelude::*;
use diesel::sql_types::{Bool, Nullable};
use diesel::sqlite::{Sqlite, SqliteConnection};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::analytics::AnalyticsStore;
use crate::config::DbPool;
use crate::db::with_conn;
use crate::errors::ApiError;
use crate::lists;
use crate::models::*;
use crate::schema::products;
use crate::uploads::UploadStore;

const RELATED_LIMIT: i64 = 4;
const NEWEST_LIMIT: i64 = 12;

type ProductFilter = Box<dyn BoxableExpression<products::table, Sqlite, SqlType = Nullable<Bool>>>;

/// Raw product fields as submitted by the admin forms.
#[derive(Debug, Default, Clone)]
pub struct ProductFields {
    pub name: String,
    pub description: Option<String>,
    pub price: String,
    pub category: String,
    pub status: String,
    pub gender: Option<String>,
    pub image_url: Option<String>,
    pub sizes: Vec<String>,
}

impl ProductFields {
    pub fn validate(self) -> Result<ProductInput, ApiError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::ValidationError("Product name is required".to_string()));
        }

        let price: f64 = self
            .price
            .trim()
            .parse()
            .map_err(|_| ApiError::ValidationError(format!("Invalid price: {}", self.price)))?;
        if !price.is_finite() || price < 0.0 {
            return Err(ApiError::ValidationError(format!("Invalid price: {}", self.price)));
        }

        let category = self.category.trim().to_string();
        if !CATEGORIES.contains(&category.as_str()) {
            return Err(ApiError::ValidationError(format!("Unknown category: {}", category)));
        }

        let status = self.status.parse::<ProductStatus>().map_err(ApiError::ValidationError)?;
        let gender = match non_empty(self.gender.as_deref()) {
            Some(g) => Some(g.parse::<Gender>().map_err(ApiError::ValidationError)?),
            None => None,
        };

        let mut seen = HashSet::new();
        let sizes = self
            .sizes
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();

        Ok(ProductInput {
            name,
            description: non_empty(self.description.as_deref()),
            price,
            category,
            status,
            gender,
            image_url: non_empty(self.image_url.as_deref()),
            sizes,
        })
    }
}

#[derive(Serialize, Debug)]
pub struct CatalogPage {
    pub products: Vec<ProductView>,
    pub categories: Vec<String>,
    pub current_search: Option<String>,
    pub current_category: Option<String>,
    pub current_status: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct ProductDetail {
    pub product: ProductView,
    pub related_products: Vec<ProductView>,
}

#[derive(Serialize, Debug)]
pub struct Dashboard {
    pub products: Vec<ProductView>,
    pub total_products: usize,
    pub available_products: usize,
    pub out_of_stock: usize,
    pub category_stats: BTreeMap<String, usize>,
    pub categories: Vec<&'static str>,
    pub sizes: Vec<&'static str>,
    pub statuses: Vec<&'static str>,
    pub show_add: bool,
    pub current_search: Option<String>,
    pub current_category: Option<String>,
    pub current_status: Option<String>,
}

fn contains_pattern(term: &str) -> String {
    format!("%{}%", term)
}

// LIKE is case-insensitive for ASCII in SQLite
fn any_field_matches(term: &str) -> ProductFilter {
    let pattern = contains_pattern(term);
    Box::new(
        products::name
            .like(pattern.clone())
            .nullable()
            .or(products::description.like(pattern.clone()))
            .or(products::category.like(pattern).nullable()),
    )
}

fn any_token_matches(tokens: &[String]) -> Option<ProductFilter> {
    tokens
        .iter()
        .map(|token| any_field_matches(token))
        .reduce(|acc, next| -> ProductFilter { Box::new(acc.or(next)) })
}

/// Splits search text into tokens, treating `/` and `-` as separators.
pub fn search_tokens(raw: &str) -> Vec<String> {
    raw.replace(['/', '-'], " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn filtered(category: Option<&str>, status: Option<&str>) -> products::BoxedQuery<'static, Sqlite> {
    let mut query = products::table.into_boxed();
    if let Some(category) = category {
        query = query.filter(products::category.like(contains_pattern(category)));
    }
    if let Some(status) = status {
        query = query.filter(products::status.eq(status.to_string()));
    }
    query
}

pub struct ProductService;

impl ProductService {
    /// Catalog lookup. With search text the match widens in steps: the whole
    /// text against name, description and category; then any single token;
    /// then every product of the requested category, or the newest products.
    pub fn search_with(
        conn: &mut SqliteConnection,
        search: Option<&str>,
        category: Option<&str>,
        status: Option<&str>,
    ) -> QueryResult<Vec<Product>> {
        let raw = match search.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => raw,
            None => {
                return filtered(category, status)
                    .order(products::id)
                    .select(Product::as_select())
                    .load(conn);
            }
        };

        let found = filtered(category, status)
            .filter(any_field_matches(raw))
            .order(products::id)
            .select(Product::as_select())
            .load(conn)?;
        if !found.is_empty() {
            return Ok(found);
        }

        let tokens = search_tokens(raw);
        if let Some(token_filter) = any_token_matches(&tokens) {
            let found = filtered(category, status)
                .filter(token_filter)
                .order(products::id)
                .select(Product::as_select())
                .load(conn)?;
            if !found.is_empty() {
                return Ok(found);
            }
        }

        debug!("No direct match for {:?}, falling back to related products", raw);
        match category {
            Some(category) => filtered(Some(category), None)
                .order(products::id)
                .select(Product::as_select())
                .load(conn),
            None => products::table
                .order(products::id.desc())
                .limit(NEWEST_LIMIT)
                .select(Product::as_select())
                .load(conn),
        }
    }

    pub fn categories_with(conn: &mut SqliteConnection) -> QueryResult<Vec<String>> {
        let categories = products::table
            .select(products::category)
            .distinct()
            .order(products::category)
            .load::<String>(conn)?;
        Ok(categories.into_iter().filter(|c| !c.trim().is_empty()).collect())
    }

    pub async fn catalog(
        pool: &DbPool,
        analytics: &AnalyticsStore,
        query: CatalogQuery,
    ) -> Result<CatalogPage, ApiError> {
        let search = non_empty(query.search.as_deref());
        let category = non_empty(query.category.as_deref());
        let status = non_empty(query.status.as_deref());

        let page = with_conn(pool, move |conn| {
            let products = Self::search_with(conn, search.as_deref(), category.as_deref(), status.as_deref())?;
            debug!("Found {} products in catalog", products.len());

            Ok(CatalogPage {
                products: products.into_iter().map(ProductView::from).collect(),
                categories: Self::categories_with(conn)?,
                current_search: search,
                current_category: category,
                current_status: status,
            })
        })
        .await?;

        // Counted after the connection is back in the pool
        if page.current_search.is_some() && !page.products.is_empty() {
            let ids: Vec<i32> = page.products.iter().map(|p| p.id).collect();
            let analytics = analytics.clone();
            if let Err(e) = web::block(move || analytics.increment_search_counts(&ids)).await {
                warn!("Search count update failed: {}", e);
            }
        }
        Ok(page)
    }

    pub fn find_with(conn: &mut SqliteConnection, product_id: i32) -> Result<Product, ApiError> {
        products::table
            .find(product_id)
            .select(Product::as_select())
            .first(conn)
            .optional()?
            .ok_or_else(|| {
                debug!("Product with ID {} not found", product_id);
                ApiError::NotFoundError("Product not found".to_string())
            })
    }

    pub async fn get(pool: &DbPool, product_id: i32) -> Result<Product, ApiError> {
        with_conn(pool, move |conn| Self::find_with(conn, product_id)).await
    }

    pub async fn detail(pool: &DbPool, product_id: i32) -> Result<ProductDetail, ApiError> {
        with_conn(pool, move |conn| {
            let product = Self::find_with(conn, product_id)?;
            let related = products::table
                .filter(products::category.eq(&product.category))
                .filter(products::id.ne(product.id))
                .order(products::id)
                .limit(RELATED_LIMIT)
                .select(Product::as_select())
                .load(conn)?;

            Ok(ProductDetail {
                product: product.into(),
                related_products: related.into_iter().map(ProductView::from).collect(),
            })
        })
        .await
    }

    pub async fn all(pool: &DbPool) -> Result<Vec<Product>, ApiError> {
        with_conn(pool, |conn| {
            Ok(products::table
                .order(products::id)
                .select(Product::as_select())
                .load(conn)?)
        })
        .await
    }

    pub async fn dashboard(pool: &DbPool, query: DashboardQuery) -> Result<Dashboard, ApiError> {
        let search = non_empty(query.search.as_deref());
        let category = non_empty(query.category.as_deref());
        let status = non_empty(query.status.as_deref());
        let show_add = query.show_add.unwrap_or(false);

        let (s, c, st) = (search.clone(), category.clone(), status.clone());
        let products = with_conn(pool, move |conn| {
            let mut q = products::table.into_boxed();
            if let Some(search) = s {
                q = q.filter(products::name.like(contains_pattern(&search)));
            }
            if let Some(category) = c {
                q = q.filter(products::category.eq(category));
            }
            if let Some(status) = st {
                q = q.filter(products::status.eq(status));
            }
            Ok(q.order(products::id).select(Product::as_select()).load(conn)?)
        })
        .await?;

        let available = ProductStatus::Available.as_str();
        let out = ProductStatus::OutOfStock.as_str();
        let mut category_stats = BTreeMap::new();
        for p in &products {
            *category_stats.entry(p.category.clone()).or_insert(0) += 1;
        }

        Ok(Dashboard {
            total_products: products.len(),
            available_products: products.iter().filter(|p| p.status == available).count(),
            out_of_stock: products.iter().filter(|p| p.status == out).count(),
            category_stats,
            products: products.into_iter().map(ProductView::from).collect(),
            categories: CATEGORIES.to_vec(),
            sizes: SIZES.to_vec(),
            statuses: ProductStatus::ALL.iter().map(|s| s.as_str()).collect(),
            show_add,
            current_search: search,
            current_category: category,
            current_status: status,
        })
    }

    pub async fn create(pool: &DbPool, input: ProductInput, images: Vec<String>) -> Result<Product, ApiError> {
        with_conn(pool, move |conn| {
            let new_product = NewProduct {
                name: input.name,
                description: input.description,
                price: input.price,
                category: input.category,
                status: input.status.as_str().to_string(),
                gender: input.gender.map(|g| g.as_str().to_string()),
                image_url: input.image_url,
                images: lists::encode(&images),
                sizes: lists::encode(&input.sizes),
            };

            let product = diesel::insert_into(products::table)
                .values(&new_product)
                .returning(Product::as_returning())
                .get_result(conn)?;

            info!("Created product {} ({})", product.id, product.name);
            Ok(product)
        })
        .await
    }

    /// Applies an admin edit in one transaction: field changes, removal of
    /// the listed images, then the new uploads appended. Files of removed
    /// images are deleted after the commit.
    pub async fn update(
        pool: &DbPool,
        uploads: &UploadStore,
        product_id: i32,
        input: ProductInput,
        images_to_remove: Vec<String>,
        new_images: Vec<String>,
    ) -> Result<Product, ApiError> {
        let (product, removed) = with_conn(pool, move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let current = Self::find_with(conn, product_id)?;

                let mut images = current.images_list();
                let mut removed = Vec::new();
                for path in &images_to_remove {
                    if let Some(pos) = images.iter().position(|img| img == path) {
                        removed.push(images.remove(pos));
                    }
                }
                images.extend(new_images);

                let gender = input
                    .gender
                    .map(|g| g.as_str().to_string())
                    .or(current.gender);

                let product = diesel::update(products::table.find(product_id))
                    .set((
                        products::name.eq(input.name),
                        products::description.eq(input.description),
                        products::price.eq(input.price),
                        products::category.eq(input.category),
                        products::status.eq(input.status.as_str()),
                        products::gender.eq(gender),
                        products::image_url.eq(input.image_url),
                        products::images.eq(lists::encode(&images)),
                        products::sizes.eq(lists::encode(&input.sizes)),
                    ))
                    .returning(Product::as_returning())
                    .get_result(conn)?;

                Ok((product, removed))
            })
        })
        .await?;

        for path in &removed {
            uploads.remove(path);
        }
        info!("Updated product {} ({} images removed)", product.id, removed.len());
        Ok(product)
    }

    /// Drops one image from the product's list and deletes its file.
    /// Returns how many images remain.
    pub async fn remove_image(
        pool: &DbPool,
        uploads: &UploadStore,
        product_id: i32,
        image_path: String,
    ) -> Result<usize, ApiError> {
        let path = image_path.clone();
        let remaining = with_conn(pool, move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let product = Self::find_with(conn, product_id)?;
                let mut images = product.images_list();
                let pos = images
                    .iter()
                    .position(|img| *img == path)
                    .ok_or_else(|| ApiError::NotFoundError("Image not found in product".to_string()))?;
                images.remove(pos);

                diesel::update(products::table.find(product_id))
                    .set(products::images.eq(lists::encode(&images)))
                    .execute(conn)?;
                Ok(images.len())
            })
        })
        .await?;

        uploads.remove(&image_path);
        debug!("Image removed from product {}. Remaining images: {}", product_id, remaining);
        Ok(remaining)
    }

    pub async fn delete(pool: &DbPool, uploads: &UploadStore, product_id: i32) -> Result<(), ApiError> {
        let product = with_conn(pool, move |conn| {
            let product = Self::find_with(conn, product_id)?;
            diesel::delete(products::table.find(product_id)).execute(conn)?;
            Ok(product)
        })
        .await?;

        for path in product.images_list() {
            uploads.remove(&path);
        }
        info!("Deleted product {} ({})", product.id, product.name);
        Ok(())
    }

    pub async fn update_status(pool: &DbPool, product_id: i32, status: ProductStatus) -> Result<(), ApiError> {
        with_conn(pool, move |conn| {
            let changed = diesel::update(products::table.find(product_id))
                .set(products::status.eq(status.as_str()))
                .execute(conn)?;
            if changed == 0 {
                return Err(ApiError::NotFoundError("Product not found".to_string()));
            }
            Ok(())
        })
        .await
    }

    /// Copies gender tags from the legacy side document into the column for
    /// products that have none yet. Returns how many products were updated.
    pub fn backfill_gender_with(
        conn: &mut SqliteConnection,
        gender_map: &BTreeMap<String, String>,
    ) -> Result<usize, ApiError> {
        let mut updated = 0;
        for (id, tag) in gender_map {
            let (id, gender) = match (id.parse::<i32>(), tag.parse::<Gender>()) {
                (Ok(id), Ok(gender)) => (id, gender),
                _ => {
                    warn!("Skipping gender map entry {:?} -> {:?}", id, tag);
                    continue;
                }
            };
            updated += diesel::update(
                products::table
                    .filter(products::id.eq(id))
                    .filter(products::gender.is_null()),
            )
            .set(products::gender.eq(gender.as_str()))
            .execute(conn)?;
        }
        if updated > 0 {
            info!("Backfilled gender for {} products", updated);
        }
        Ok(updated)
    }

    pub async fn backfill_gender(pool: &DbPool, analytics: &AnalyticsStore) -> Result<usize, ApiError> {
        let gender_map = analytics.load_gender_map();
        if gender_map.is_empty() {
            return Ok(0);
        }
        with_conn(pool, move |conn| Self::backfill_gender_with(conn, &gender_map)).await
    }
}
