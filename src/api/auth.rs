use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Extension, Json, Router,
};
use bcrypt::{hash, verify, DEFAULT_COST};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::Config;
use crate::utils::api_response::{ApiResponse, ErrorCode};

/// Represents a request to register a new account.
#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// Login email address
    pub email: String,
    /// Account password
    pub password: String,
    /// Display name shown on requests the user files
    pub full_name: String,
    /// Department the user belongs to
    pub department: String,
}

/// Represents a successful registration response.
#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
}

/// JWT Claims used for authentication.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject - User ID as String
    pub sub: String,
    /// Login email of the authenticated user
    pub email: String,
    /// Expiration timestamp (UNIX TIME)
    pub exp: usize,
}

impl Claims {
    /// Converts `sub` (user ID) to `Uuid`, or returns a descriptive error.
    pub fn user_id(&self) -> Result<Uuid, ApiResponse<()>> {
        self.sub.parse::<Uuid>().map_err(|_| {
            ApiResponse::error(
                StatusCode::BAD_REQUEST,
                ErrorCode::Unauthorized,
                "Invalid user ID format in token",
                None,
            )
        })
    }
}

/// Represents a request to log in.
#[derive(Serialize, Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Email for authentication
    pub email: String,
    /// Password for authentication
    pub password: String,
}

/// Represents a successful login response returning a JWT token.
#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub role: String,
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: Uuid,
    password_hash: String,
    role: String,
}

/// Handles user login.
///
/// # Returns
/// * `200 OK` - Returns a JWT token if authentication is successful.
/// * `401 Unauthorized` - If credentials are incorrect.
/// * `500 Internal Server Error` - If a database or token generation error occurs.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body(
        content = LoginRequest,
        description = "User login details",
    ),
    responses(
        (status = 200, description = "Successful login", body = LoginResponse),
        (status = 401, description = "Invalid email or password"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn login(
    State(pool): State<PgPool>,
    Json(payload): Json<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>, ApiResponse<()>> {
    let config = Config::get();

    let user = sqlx::query_as::<_, CredentialRow>(
        r#"
        SELECT u.id, u.password_hash, p.role
        FROM users u
        JOIN user_profiles p ON p.id = u.id
        WHERE u.email = $1
        "#,
    )
    .bind(&payload.email)
    .fetch_optional(&pool)
    .await
    .map_err(ApiResponse::<()>::db_error)?;

    let Some(user) = user else {
        warn!("❌ Login attempt for non-existent account: {}", payload.email);
        return Err(ApiResponse::error(
            StatusCode::UNAUTHORIZED,
            ErrorCode::Unauthorized,
            "Invalid email or password",
            None,
        ));
    };

    match verify(&payload.password, &user.password_hash) {
        Ok(true) => {
            let claims = Claims {
                sub: user.id.to_string(),
                email: payload.email.clone(),
                exp: chrono::Utc::now().timestamp() as usize + 36000, // 10 hour expiration
            };
            let token = encode(
                &Header::default(),
                &claims,
                &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            )
            .map_err(|e| {
                ApiResponse::<()>::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::InternalError,
                    "Token generation failed",
                    Some(json!({ "error": e.to_string() })),
                )
            })?;

            info!("✅ Login successful for {}", payload.email);
            Ok(ApiResponse::success(
                StatusCode::OK,
                "Login successful",
                LoginResponse { token, role: user.role },
            ))
        }
        Ok(false) => {
            warn!("❌ Invalid password attempt for {}", payload.email);
            Err(ApiResponse::error(
                StatusCode::UNAUTHORIZED,
                ErrorCode::Unauthorized,
                "Invalid email or password",
                None,
            ))
        }
        Err(e) => {
            error!("❌ Password verification error: {e}");
            Err(ApiResponse::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::InternalError,
                "Password verification error",
                Some(json!({ "error": e.to_string() })),
            ))
        }
    }
}

/// Handles user registration.
///
/// Creates the login row and its profile in a single transaction so a
/// failed profile insert never leaves an orphan account. New accounts
/// start with the `requester` role.
///
/// # Returns
/// * `201 Created` - If registration is successful.
/// * `409 Conflict` - If the email is already taken.
/// * `500 Internal Server Error` - If a database error occurs.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    tag = "Authentication",
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn register(
    State(pool): State<PgPool>,
    Json(payload): Json<RegisterRequest>,
) -> Result<ApiResponse<RegisterResponse>, ApiResponse<()>> {
    let password_hash = hash(&payload.password, DEFAULT_COST).map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InternalError,
            "Password hashing failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let mut tx = pool.begin().await.map_err(ApiResponse::<()>::db_error)?;

    let user_id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO users (email, password_hash) VALUES ($1, $2) RETURNING id",
    )
    .bind(&payload.email)
    .bind(&password_hash)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if let Some(db_err) = e.as_database_error() {
            if db_err.code().map(|code| code == "23505").unwrap_or(false) {
                return ApiResponse::<()>::error(
                    StatusCode::CONFLICT,
                    ErrorCode::Conflict,
                    "Email already registered",
                    None,
                );
            }
        }
        ApiResponse::<()>::db_error(e)
    })?;

    sqlx::query(
        r#"
        INSERT INTO user_profiles (id, full_name, department, role)
        VALUES ($1, $2, $3, 'requester')
        "#,
    )
    .bind(user_id)
    .bind(&payload.full_name)
    .bind(&payload.department)
    .execute(&mut *tx)
    .await
    .map_err(ApiResponse::<()>::db_error)?;

    tx.commit().await.map_err(ApiResponse::<()>::db_error)?;

    info!("✅ Registered new account: {}", payload.email);
    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Account created",
        RegisterResponse { message: "Account registered".into() },
    ))
}

/// Represents a request to change a user's password.
#[derive(Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Handles a password change by the authenticated user.
///
/// The user must provide their **current password** for verification.
/// The target account is always the caller's own, taken from the JWT.
///
/// # Returns
/// * `200 OK` - If the password was successfully updated.
/// * `401 Unauthorized` - If the old password is incorrect.
/// * `404 Not Found` - If the account no longer exists.
/// * `500 Internal Server Error` - If hashing or database operations fail.
#[utoipa::path(
    post,
    path = "/auth/change_password",
    tag = "Authentication",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password updated successfully"),
        (status = 401, description = "Old password incorrect"),
        (status = 404, description = "Account does not exist"),
        (status = 500, description = "Internal Server Error")
    ),
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn change_password(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let password_hash = sqlx::query_scalar::<_, String>(
        "SELECT password_hash FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await
    .map_err(ApiResponse::<()>::db_error)?
    .ok_or_else(|| {
        ApiResponse::<()>::error(StatusCode::NOT_FOUND, ErrorCode::NotFound, "User not found", None)
    })?;

    let is_valid = verify(&payload.old_password, &password_hash).unwrap_or(false);
    if !is_valid {
        return Err(ApiResponse::error(
            StatusCode::UNAUTHORIZED,
            ErrorCode::Unauthorized,
            "Incorrect old password",
            None,
        ));
    }

    let new_password_hash = hash(&payload.new_password, DEFAULT_COST).map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InternalError,
            "Password hashing failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
        .bind(&new_password_hash)
        .bind(user_id)
        .execute(&pool)
        .await
        .map_err(ApiResponse::<()>::db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Password updated successfully",
        (),
    ))
}

/// Registers the public authentication routes.
///
/// # Routes
/// - `POST /auth/register` → Register a new account.
/// - `POST /auth/login` → Authenticate and return a JWT token.
pub fn auth_routes() -> Router<PgPool> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Registers the **protected** authentication routes.
///
/// # Routes
/// - `POST /auth/change_password` → Change the caller's own password
///   (requires the old password).
pub fn secure_auth_routes() -> Router<PgPool> {
    Router::new().route("/auth/change_password", post(change_password))
}

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::openapi::Components;
use utoipa::Modify;
use utoipa::OpenApi;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut components = openapi.components.clone().unwrap_or(Components::default());

        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );

        openapi.components = Some(components);
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(login, register, change_password),
    components(
        schemas(
            LoginRequest, LoginResponse,
            RegisterRequest, RegisterResponse,
            ChangePasswordRequest
        )
    ),
    tags(
        (name = "Authentication", description = "User Auth Endpoints")
    ),
    modifiers(&SecurityAddon)
)]
pub struct AuthDoc;
