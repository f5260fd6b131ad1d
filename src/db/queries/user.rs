use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use sqlx::PgPool;

use crate::api::auth::Claims;
use crate::db::models::user::{UpdateProfile, UserProfile};
use crate::utils::api_response::{ApiResponse, ErrorCode};

async fn fetch_profile(pool: &PgPool, user_id: uuid::Uuid) -> Result<UserProfile, ApiResponse<()>> {
    sqlx::query_as::<_, UserProfile>(
        r#"
        SELECT id, full_name, department, role, created_at, updated_at
        FROM user_profiles
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(ApiResponse::<()>::db_error)?
    .ok_or_else(|| {
        ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            ErrorCode::NotFound,
            "Profile not found",
            None,
        )
    })
}

/// Returns the caller's own profile.
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Caller's profile", body = UserProfile),
        (status = 404, description = "Profile not found")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn get_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<UserProfile>, ApiResponse<()>> {
    let user_id = claims.user_id()?;
    let profile = fetch_profile(&pool, user_id).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Profile retrieved",
        profile,
    ))
}

/// Updates the caller's own display name and department. Role changes go
/// through database administration, not this endpoint.
#[utoipa::path(
    patch,
    path = "/users/me",
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = UserProfile),
        (status = 404, description = "Profile not found")
    ),
    tag = "Users",
    security(("bearerAuth" = []))
)]
pub async fn update_me(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfile>,
) -> Result<ApiResponse<UserProfile>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let updated = sqlx::query_as::<_, UserProfile>(
        r#"
        UPDATE user_profiles
        SET full_name = COALESCE($1, full_name),
            department = COALESCE($2, department),
            updated_at = NOW()
        WHERE id = $3
        RETURNING id, full_name, department, role, created_at, updated_at
        "#,
    )
    .bind(payload.full_name)
    .bind(payload.department)
    .bind(user_id)
    .fetch_optional(&pool)
    .await
    .map_err(ApiResponse::<()>::db_error)?
    .ok_or_else(|| {
        ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            ErrorCode::NotFound,
            "Profile not found",
            None,
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Profile updated",
        updated,
    ))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(get_me, update_me),
    components(schemas(UserProfile, UpdateProfile)),
    tags(
        (name = "Users", description = "Profile endpoints")
    )
)]
pub struct UserDoc;
