use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Extension, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};
use moka::sync::Cache;
use serde_json::json;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::api::auth::Claims;
use crate::config::Config;
use crate::domain::policy::{Actor, RoleSet};
use crate::utils::api_response::{ApiResponse, ErrorCode};

/// ✅ Resolved-actor cache using `moka`. Role/profile changes take effect
/// within the TTL without a per-request database hit.
pub type ActorCache = Arc<Cache<Uuid, Actor>>;

pub fn create_actor_cache() -> ActorCache {
    Arc::new(
        Cache::builder()
            .time_to_live(Duration::from_secs(600)) // TTL = 10 minutes
            .build(),
    )
}

/// ✅ **JWT Middleware** (Handles Token Authentication)
pub async fn jwt_middleware(mut req: Request<Body>, next: Next) -> Result<Response, Response> {
    let auth_header = req.headers().get("Authorization").ok_or_else(|| {
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            ErrorCode::Unauthorized,
            "Missing Authorization header",
            None,
        )
        .into_response()
    })?;

    let token_str = auth_header.to_str().map_err(|_| {
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized,
            "Invalid Authorization header format",
            None,
        )
        .into_response()
    })?;

    let token = token_str.strip_prefix("Bearer ").ok_or_else(|| {
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized,
            "Invalid token format (missing 'Bearer ' prefix)",
            None,
        )
        .into_response()
    })?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(Config::get().jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        // Expired sessions get a distinct code so the frontend can redirect
        // to sign-in instead of showing a generic failure toast.
        let (code, message) = match e.kind() {
            ErrorKind::ExpiredSignature => {
                (ErrorCode::AuthExpired, "Session expired, please sign in again")
            }
            _ => (ErrorCode::Unauthorized, "Invalid token"),
        };
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            code,
            message,
            Some(json!({ "error": e.to_string() })),
        )
        .into_response()
    })?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    email: String,
    full_name: String,
    department: String,
    role: String,
}

/// ✅ **Actor Middleware**: resolves the caller's profile + role set and
/// attaches it as an `Actor` extension, cached via `moka`.
pub async fn actor_middleware(
    State(pool): State<PgPool>,
    Extension(cache): Extension<ActorCache>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let claims = req.extensions().get::<Claims>().cloned().ok_or_else(|| {
        error!("Missing JWT claims in request");
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            ErrorCode::Unauthorized,
            "Missing JWT claims in request",
            None,
        )
        .into_response()
    })?;

    let user_id: Uuid = claims.sub.parse().map_err(|_| {
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            ErrorCode::Unauthorized,
            "Invalid user ID format in JWT claims",
            None,
        )
        .into_response()
    })?;

    if let Some(actor) = cache.get(&user_id) {
        req.extensions_mut().insert(actor);
        return Ok(next.run(req).await);
    }

    let row = sqlx::query_as::<_, ProfileRow>(
        r#"
        SELECT u.email, p.full_name, p.department, p.role
        FROM users u
        JOIN user_profiles p ON p.id = u.id
        WHERE u.id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        error!("Failed to load actor profile: {e}");
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InternalError,
            "Failed to load user profile",
            Some(json!({ "error": e.to_string() })),
        )
        .into_response()
    })?
    .ok_or_else(|| {
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            ErrorCode::Unauthorized,
            "No profile exists for this account",
            None,
        )
        .into_response()
    })?;

    let actor = Actor {
        user_id,
        email: row.email,
        full_name: row.full_name,
        department: row.department,
        roles: RoleSet::parse(&row.role),
    };

    cache.insert(user_id, actor.clone());
    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}
