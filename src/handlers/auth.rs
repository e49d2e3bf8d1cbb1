use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::{
    database::Database,
    error::ApiError,
    models::{CreateUser, LoginRequest, User, UserResponse},
    state::AppState,
    utils::{create_token, hash_password, verify_password},
};

pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<CreateUser>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::Validation(
            "username and password are required".to_string(),
        ));
    }

    let taken = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM users WHERE username = $1 OR email = $2",
    )
    .bind(&body.username)
    .bind(&body.email)
    .fetch_one(&state.db)
    .await?;

    if taken > 0 {
        return Err(ApiError::Conflict(
            "Username or email already exists".to_string(),
        ));
    }

    let password_hash = hash_password(&body.password).map_err(ApiError::internal)?;
    let user = create_user_in_db(&state.db, &body, &password_hash).await?;

    let token = create_token(
        user.id,
        user.email.clone(),
        user.is_staff,
        &state.config.jwt_secret,
    )
    .map_err(ApiError::internal)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "user": UserResponse::from(user), "token": token })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate_user(&state.db, &body.username, &body.password)
        .await
        .map_err(|_| ApiError::Validation("Invalid credentials".to_string()))?;

    let token = create_token(
        user.id,
        user.email.clone(),
        user.is_staff,
        &state.config.jwt_secret,
    )
    .map_err(ApiError::internal)?;

    Ok(Json(json!({ "token": token })))
}

async fn authenticate_user(
    db: &Database,
    username: &str,
    password: &str,
) -> Result<User, sqlx::Error> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_one(db)
        .await?;

    if verify_password(password, &user.password_hash).unwrap_or(false) {
        Ok(user)
    } else {
        Err(sqlx::Error::RowNotFound)
    }
}

async fn create_user_in_db(
    db: &Database,
    user_data: &CreateUser,
    password_hash: &str,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, password_hash, first_name, last_name)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(&user_data.username)
    .bind(&user_data.email)
    .bind(password_hash)
    .bind(&user_data.first_name)
    .bind(&user_data.last_name)
    .fetch_one(db)
    .await
}
