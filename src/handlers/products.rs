use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    cache::{product_list_key, PRODUCT_LIST_PREFIX},
    error::ApiError,
    middleware::{current_user, CurrentUser},
    models::{CreateProduct, Product, Sale, SingleSaleRequest, UpdateProduct, Vehicle},
    state::AppState,
    stock,
};

type AuthHeader = Option<TypedHeader<Authorization<Bearer>>>;

/// Non-staff actors only see products they registered; staff see everything
/// that is not soft-deleted.
async fn scoped_product(
    state: &AppState,
    user: &CurrentUser,
    product_id: Uuid,
) -> Result<Product, ApiError> {
    let product = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE id = $1 AND deleted = false",
    )
    .bind(product_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("Product"))?;

    if !user.can_view_all() && product.created_by != Some(user.id) {
        return Err(ApiError::NotFound("Product"));
    }

    Ok(product)
}

pub async fn list_products(
    State(state): State<AppState>,
    bearer: AuthHeader,
) -> Result<Json<Value>, ApiError> {
    let user = current_user(&state.db, &state.config.jwt_secret, bearer).await?;

    let cache_key = product_list_key(user.id);
    if let Some(cached) = state.cache.get(&cache_key) {
        return Ok(Json(cached));
    }

    let products = if user.can_view_all() {
        sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE deleted = false ORDER BY name",
        )
        .fetch_all(&state.db)
        .await?
    } else {
        sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE created_by = $1 AND deleted = false ORDER BY name",
        )
        .bind(user.id)
        .fetch_all(&state.db)
        .await?
    };

    let body = serde_json::to_value(&products).map_err(ApiError::internal)?;
    state.cache.set(cache_key, body.clone());

    Ok(Json(body))
}

pub async fn create_product(
    State(state): State<AppState>,
    bearer: AuthHeader,
    Json(body): Json<CreateProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let user = current_user(&state.db, &state.config.jwt_secret, bearer).await?;
    user.require_staff()?;

    if body.quantity < 0 {
        return Err(ApiError::Validation("quantity cannot be negative".to_string()));
    }

    let mut tx = state.db.begin().await?;

    let product = sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (name, description, brand, part_number, price, quantity, quantity_in_store, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $6, $7)
        RETURNING *
        "#,
    )
    .bind(&body.name)
    .bind(&body.description)
    .bind(&body.brand)
    .bind(&body.part_number)
    .bind(body.price)
    .bind(body.quantity)
    .bind(user.id)
    .fetch_one(&mut *tx)
    .await?;

    for vehicle_id in &body.vehicle_ids {
        sqlx::query("INSERT INTO product_vehicles (product_id, vehicle_id) VALUES ($1, $2)")
            .bind(product.id)
            .bind(vehicle_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    state.cache.invalidate(PRODUCT_LIST_PREFIX);

    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn get_product(
    State(state): State<AppState>,
    bearer: AuthHeader,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Product>, ApiError> {
    let user = current_user(&state.db, &state.config.jwt_secret, bearer).await?;
    let product = scoped_product(&state, &user, product_id).await?;
    Ok(Json(product))
}

pub async fn update_product(
    State(state): State<AppState>,
    bearer: AuthHeader,
    Path(product_id): Path<Uuid>,
    Json(body): Json<UpdateProduct>,
) -> Result<Json<Product>, ApiError> {
    let user = current_user(&state.db, &state.config.jwt_secret, bearer).await?;
    user.require_staff()?;

    if matches!(body.quantity, Some(q) if q < 0) {
        return Err(ApiError::Validation("quantity cannot be negative".to_string()));
    }

    let product = sqlx::query_as::<_, Product>(
        r#"
        UPDATE products
        SET name = COALESCE($1, name),
            description = COALESCE($2, description),
            brand = COALESCE($3, brand),
            part_number = COALESCE($4, part_number),
            price = COALESCE($5, price),
            quantity = COALESCE($6, quantity),
            updated_at = NOW()
        WHERE id = $7 AND deleted = false
        RETURNING *
        "#,
    )
    .bind(&body.name)
    .bind(&body.description)
    .bind(&body.brand)
    .bind(&body.part_number)
    .bind(body.price)
    .bind(body.quantity)
    .bind(product_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("Product"))?;

    state.cache.invalidate(PRODUCT_LIST_PREFIX);

    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    bearer: AuthHeader,
    Path(product_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let user = current_user(&state.db, &state.config.jwt_secret, bearer).await?;
    user.require_staff()?;

    let result = sqlx::query(
        "UPDATE products SET deleted = true, updated_at = NOW() WHERE id = $1 AND deleted = false",
    )
    .bind(product_id)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Product"));
    }

    state.cache.invalidate(PRODUCT_LIST_PREFIX);

    Ok(StatusCode::NO_CONTENT)
}

#[derive(serde::Deserialize)]
pub struct CreateVehicle {
    pub name: String,
}

pub async fn list_vehicles(
    State(state): State<AppState>,
    bearer: AuthHeader,
) -> Result<Json<Vec<Vehicle>>, ApiError> {
    current_user(&state.db, &state.config.jwt_secret, bearer).await?;

    let vehicles =
        sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicles ORDER BY name")
            .fetch_all(&state.db)
            .await?;

    Ok(Json(vehicles))
}

pub async fn create_vehicle(
    State(state): State<AppState>,
    bearer: AuthHeader,
    Json(body): Json<CreateVehicle>,
) -> Result<(StatusCode, Json<Vehicle>), ApiError> {
    let user = current_user(&state.db, &state.config.jwt_secret, bearer).await?;
    user.require_staff()?;

    if body.name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".to_string()));
    }

    let vehicle = sqlx::query_as::<_, Vehicle>(
        "INSERT INTO vehicles (name) VALUES ($1) RETURNING *",
    )
    .bind(body.name.trim())
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(vehicle)))
}

/// Single-line sale against one product.
///
/// The stock pre-check runs against a row locked for the whole transaction,
/// so two simultaneous sales of the last unit cannot both pass: the second
/// request waits on the lock and then sees the decremented quantity.
pub async fn sell_product(
    State(state): State<AppState>,
    bearer: AuthHeader,
    Path(product_id): Path<Uuid>,
    Json(body): Json<SingleSaleRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user = current_user(&state.db, &state.config.jwt_secret, bearer).await?;

    if body.quantity_sold <= 0 {
        return Err(ApiError::Validation(
            "quantity_sold must be a positive integer".to_string(),
        ));
    }

    let mut tx = state.db.begin().await?;

    let product = stock::lock_product(&mut tx, product_id).await?;
    if body.quantity_sold > product.quantity {
        return Err(ApiError::InsufficientStock);
    }

    let price_per_unit = body.price_per_unit.unwrap_or(product.price);
    if price_per_unit < rust_decimal::Decimal::ZERO {
        return Err(ApiError::Validation(
            "price_per_unit cannot be negative".to_string(),
        ));
    }
    let total_amount = Sale::compute_total(body.quantity_sold, price_per_unit);

    let sale = sqlx::query_as::<_, Sale>(
        r#"
        INSERT INTO sales (product_id, quantity_sold, price_per_unit, total_amount, created_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(product_id)
    .bind(body.quantity_sold)
    .bind(price_per_unit)
    .bind(total_amount)
    .bind(user.id)
    .fetch_one(&mut *tx)
    .await?;

    let product = stock::apply_stock_change(&mut tx, product_id, body.quantity_sold, total_amount).await?;

    tx.commit().await?;
    state.cache.invalidate(PRODUCT_LIST_PREFIX);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Sale recorded successfully",
            "sale": sale,
            "new_stock": product.quantity,
        })),
    ))
}
