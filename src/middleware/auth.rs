use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{database::Database, error::ApiError, models::User, utils::verify_token};

/// The authenticated actor for the current request.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Staff actors see every product and sale, not just their own.
    pub is_staff: bool,
}

impl CurrentUser {
    pub fn can_view_all(&self) -> bool {
        self.is_staff
    }

    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.is_staff {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

/// Resolves the bearer token from the Authorization header into a user row.
///
/// Missing header, bad token, or a token for a deleted user all map to 401.
pub async fn current_user(
    db: &Database,
    jwt_secret: &str,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<CurrentUser, ApiError> {
    let TypedHeader(auth) = bearer.ok_or(ApiError::Unauthorized)?;

    let claims = verify_token(auth.token(), jwt_secret).map_err(|_| ApiError::Unauthorized)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Unauthorized)?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    Ok(CurrentUser {
        id: user.id,
        username: user.username,
        email: user.email,
        is_staff: user.is_staff,
    })
}
