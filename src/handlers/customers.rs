use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::current_user,
    models::{CreateCustomer, Customer, CustomerPayment},
    state::AppState,
};

type AuthHeader = Option<TypedHeader<Authorization<Bearer>>>;

pub async fn list_customers(
    State(state): State<AppState>,
    bearer: AuthHeader,
) -> Result<Json<Vec<Customer>>, ApiError> {
    current_user(&state.db, &state.config.jwt_secret, bearer).await?;

    let customers = sqlx::query_as::<_, Customer>("SELECT * FROM customers ORDER BY name")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(customers))
}

pub async fn create_customer(
    State(state): State<AppState>,
    bearer: AuthHeader,
    Json(body): Json<CreateCustomer>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    current_user(&state.db, &state.config.jwt_secret, bearer).await?;

    if body.name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".to_string()));
    }

    let customer = sqlx::query_as::<_, Customer>(
        "INSERT INTO customers (name, email, phone) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(body.name.trim())
    .bind(&body.email)
    .bind(&body.phone)
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn get_customer(
    State(state): State<AppState>,
    bearer: AuthHeader,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<Customer>, ApiError> {
    current_user(&state.db, &state.config.jwt_secret, bearer).await?;

    let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
        .bind(customer_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("Customer"))?;

    Ok(Json(customer))
}

/// Records a repayment against the customer's outstanding balance.
pub async fn record_payment(
    State(state): State<AppState>,
    bearer: AuthHeader,
    Path(customer_id): Path<Uuid>,
    Json(body): Json<CustomerPayment>,
) -> Result<Json<Customer>, ApiError> {
    current_user(&state.db, &state.config.jwt_secret, bearer).await?;

    if body.amount <= Decimal::ZERO {
        return Err(ApiError::Validation("amount must be positive".to_string()));
    }

    let customer = sqlx::query_as::<_, Customer>(
        r#"
        UPDATE customers
        SET remaining_balance = remaining_balance - $1
        WHERE id = $2
        RETURNING *
        "#,
    )
    .bind(body.amount)
    .bind(customer_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(ApiError::NotFound("Customer"))?;

    Ok(Json(customer))
}
