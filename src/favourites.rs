use chrono::NaiveDateTime;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;
use log::{debug, info};
use std::collections::HashMap;

use crate::config::DbPool;
use crate::db::with_conn;
use crate::errors::ApiError;
use crate::models::{NewUserFavourite, Product};
use crate::schema::{products, user_favourites};
use crate::session::now;

pub struct FavouriteService;

impl FavouriteService {
    pub fn add_with(
        conn: &mut SqliteConnection,
        user_id: i32,
        product_id: i32,
        now: NaiveDateTime,
    ) -> Result<(), ApiError> {
        let product_exists = products::table
            .find(product_id)
            .select(products::id)
            .first::<i32>(conn)
            .optional()?
            .is_some();
        if !product_exists {
            return Err(ApiError::NotFoundError("Product not found".to_string()));
        }

        diesel::insert_into(user_favourites::table)
            .values(&NewUserFavourite { user_id, product_id, created_at: now })
            .execute(conn)
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    ApiError::ConflictError("Product already in favourites".to_string())
                }
                other => other.into(),
            })?;

        info!("User {} favourited product {}", user_id, product_id);
        Ok(())
    }

    pub fn remove_with(conn: &mut SqliteConnection, user_id: i32, product_id: i32) -> Result<(), ApiError> {
        let removed = diesel::delete(
            user_favourites::table
                .filter(user_favourites::user_id.eq(user_id))
                .filter(user_favourites::product_id.eq(product_id)),
        )
        .execute(conn)?;

        if removed == 0 {
            return Err(ApiError::NotFoundError("Product not in favourites".to_string()));
        }
        debug!("User {} removed product {} from favourites", user_id, product_id);
        Ok(())
    }

    pub fn is_favourited_with(conn: &mut SqliteConnection, user_id: i32, product_id: i32) -> QueryResult<bool> {
        diesel::select(diesel::dsl::exists(
            user_favourites::table
                .filter(user_favourites::user_id.eq(user_id))
                .filter(user_favourites::product_id.eq(product_id)),
        ))
        .get_result(conn)
    }

    /// Favourited products, most recently added first.
    pub fn products_for_with(conn: &mut SqliteConnection, user_id: i32) -> QueryResult<Vec<Product>> {
        user_favourites::table
            .inner_join(products::table)
            .filter(user_favourites::user_id.eq(user_id))
            .order((user_favourites::created_at.desc(), user_favourites::id.desc()))
            .select(Product::as_select())
            .load(conn)
    }

    pub fn counts_with(conn: &mut SqliteConnection) -> QueryResult<HashMap<i32, i64>> {
        let rows = user_favourites::table
            .group_by(user_favourites::product_id)
            .select((user_favourites::product_id, count_star()))
            .load::<(i32, i64)>(conn)?;
        Ok(rows.into_iter().collect())
    }

    pub async fn add(pool: &DbPool, user_id: i32, product_id: i32) -> Result<(), ApiError> {
        with_conn(pool, move |conn| Self::add_with(conn, user_id, product_id, now())).await
    }

    pub async fn remove(pool: &DbPool, user_id: i32, product_id: i32) -> Result<(), ApiError> {
        with_conn(pool, move |conn| Self::remove_with(conn, user_id, product_id)).await
    }

    pub async fn is_favourited(pool: &DbPool, user_id: i32, product_id: i32) -> Result<bool, ApiError> {
        with_conn(pool, move |conn| Ok(Self::is_favourited_with(conn, user_id, product_id)?)).await
    }

    pub async fn products_for(pool: &DbPool, user_id: i32) -> Result<Vec<Product>, ApiError> {
        with_conn(pool, move |conn| Ok(Self::products_for_with(conn, user_id)?)).await
    }

    pub async fn counts(pool: &DbPool) -> Result<HashMap<i32, i64>, ApiError> {
        with_conn(pool, |conn| Ok(Self::counts_with(conn)?)).await
    }
}
