use axum::{
    extract::{Extension, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use chrono::Utc;
use serde_json::json;
use sqlx::types::Json as Jsonb;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::error;
use uuid::Uuid;

use crate::config::Config;
use crate::db::models::request::{
    CompletedUpdate, ConfirmedDateUpdate, DashboardStats, LineItem, ListParams, NewPoRequest,
    PoRequest, PriorityEntry, PriorityParams, ReviewDecision, SortKey, SortOrder, UpdatePoRequest,
};
use crate::domain::policy::{Actor, Visibility};
use crate::domain::{lifecycle, validate, views};
use crate::utils::api_response::{ApiResponse, ErrorCode};
use crate::utils::notification;
use crate::utils::spreadsheet::{self, ImportError};

/// Builds the visibility-scoped base query for the caller. Admins see every
/// live request; everyone else only sees rows where both the customer and the
/// requesting department match their own department.
fn scoped_query(actor: &Actor, params: &ListParams) -> QueryBuilder<'static, Postgres> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT * FROM requests WHERE deleted_at IS NULL");

    if let Visibility::Department(dept) = actor.visibility() {
        builder.push(" AND customer = ");
        builder.push_bind(dept.clone());
        builder.push(" AND requesting_dept = ");
        builder.push_bind(dept);
    }

    if let Some(q) = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{q}%");
        builder.push(" AND (customer ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR requesting_dept ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR requester_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR so_number ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }

    if let Some(rt) = params.request_type {
        builder.push(" AND request_type = ");
        builder.push_bind(rt);
    }
    if let Some(status) = params.status {
        builder.push(" AND status = ");
        builder.push_bind(status);
    }
    if let Some(completed) = params.completed {
        builder.push(" AND completed = ");
        builder.push_bind(completed);
    }
    if let Some(priority) = params.priority {
        builder.push(" AND priority = ");
        builder.push_bind(priority);
    }

    let sort = params.sort.unwrap_or(SortKey::CreatedAt);
    let order = params.order.unwrap_or_default();
    builder.push(" ORDER BY ");
    builder.push(sort.column()); // whitelisted column names only
    builder.push(match order {
        SortOrder::Asc => " ASC",
        SortOrder::Desc => " DESC",
    });
    if sort != SortKey::CreatedAt {
        builder.push(", created_at DESC");
    }

    builder
}

async fn fetch_scoped(
    pool: &PgPool,
    actor: &Actor,
    params: &ListParams,
) -> Result<Vec<PoRequest>, ApiResponse<()>> {
    scoped_query(actor, params)
        .build_query_as::<PoRequest>()
        .fetch_all(pool)
        .await
        .map_err(ApiResponse::<()>::db_error)
}

/// Fetches a single live request by id; soft-deleted rows are invisible.
async fn fetch_request(pool: &PgPool, request_id: Uuid) -> Result<PoRequest, ApiResponse<()>> {
    sqlx::query_as::<_, PoRequest>("SELECT * FROM requests WHERE id = $1 AND deleted_at IS NULL")
        .bind(request_id)
        .fetch_optional(pool)
        .await
        .map_err(ApiResponse::<()>::db_error)?
        .ok_or_else(|| {
            ApiResponse::<()>::error(
                StatusCode::NOT_FOUND,
                ErrorCode::NotFound,
                "Request not found",
                None,
            )
        })
}

#[utoipa::path(
    post,
    path = "/requests",
    request_body = NewPoRequest,
    responses(
        (status = 201, description = "Change request created", body = PoRequest),
        (status = 422, description = "Validation failed"),
        (status = 403, description = "Profile has no department"),
        (status = 500, description = "Failed to insert request")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn create_request(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<NewPoRequest>,
) -> Result<ApiResponse<PoRequest>, ApiResponse<()>> {
    let today = Utc::now().date_naive();
    let normalized =
        validate::validate_new_request(&payload, &actor, today).map_err(ApiResponse::<()>::from)?;

    let created = sqlx::query_as::<_, PoRequest>(
        r#"
        INSERT INTO requests (
            request_type, category_of_request, priority, request_date,
            so_number, customer, requesting_dept, requester_id, requester_name,
            factory_shipment_date, desired_shipment_date, shipping_method,
            items, reason_for_request, request_details, status, completed
        )
        VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9,
            $10, $11, $12, $13, $14, $15, $16, $17
        )
        RETURNING *
        "#,
    )
    .bind(normalized.request_type)
    .bind(normalized.category_of_request)
    .bind(normalized.priority)
    .bind(normalized.request_date)
    .bind(normalized.so_number)
    .bind(normalized.customer)
    .bind(normalized.requesting_dept)
    .bind(normalized.requester_id)
    .bind(normalized.requester_name)
    .bind(normalized.factory_shipment_date)
    .bind(normalized.desired_shipment_date)
    .bind(normalized.shipping_method)
    .bind(Jsonb(normalized.items))
    .bind(normalized.reason_for_request)
    .bind(normalized.request_details)
    .bind(normalized.status)
    .bind(normalized.completed)
    .fetch_one(&pool)
    .await
    .map_err(ApiResponse::<()>::db_error)?;

    // Notification delivery never blocks or fails the create.
    notification::spawn_request_notifications(pool.clone(), created.clone());

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Change request created",
        created,
    ))
}

#[utoipa::path(
    get,
    path = "/requests",
    params(ListParams),
    responses(
        (status = 200, description = "Visible requests", body = Vec<PoRequest>),
        (status = 500, description = "Database error")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn list_requests(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<ListParams>,
) -> Result<ApiResponse<Vec<PoRequest>>, ApiResponse<()>> {
    let requests = fetch_scoped(&pool, &actor, &params).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Requests retrieved",
        requests,
    ))
}

#[utoipa::path(
    get,
    path = "/requests/{request_id}",
    params(("request_id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request found", body = PoRequest),
        (status = 403, description = "Request outside the caller's visibility"),
        (status = 404, description = "Request not found")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn get_request(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    Path(request_id): Path<Uuid>,
) -> Result<ApiResponse<PoRequest>, ApiResponse<()>> {
    let request = fetch_request(&pool, request_id).await?;

    if !actor.can_view(&request) {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            ErrorCode::AuthorizationError,
            "You do not have access to this request",
            None,
        ));
    }

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Request retrieved",
        request,
    ))
}

#[utoipa::path(
    patch,
    path = "/requests/{request_id}",
    params(("request_id" = Uuid, Path, description = "Request ID")),
    request_body = UpdatePoRequest,
    responses(
        (status = 200, description = "Request updated", body = PoRequest),
        (status = 403, description = "Only the owner may edit, and only while pending"),
        (status = 404, description = "Request not found"),
        (status = 422, description = "Edit would blank a required field or empty the item list")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn update_request(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<UpdatePoRequest>,
) -> Result<ApiResponse<PoRequest>, ApiResponse<()>> {
    let existing = fetch_request(&pool, request_id).await?;

    if !actor.can_edit(&existing) {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            ErrorCode::AuthorizationError,
            "Only the requester can edit, and only while the request is pending",
            None,
        ));
    }

    // Creation rules hold for edits too: no blanking required fields, no
    // item-bearing category left with an empty item list.
    validate::validate_update(&existing, &payload).map_err(ApiResponse::<()>::from)?;

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("UPDATE requests SET updated_at = NOW()");

    if let Some(customer) = payload.customer {
        builder.push(", customer = ");
        builder.push_bind(customer);
    }
    if let Some(so_number) = payload.so_number {
        builder.push(", so_number = ");
        builder.push_bind(so_number);
    }
    if let Some(date) = payload.factory_shipment_date {
        builder.push(", factory_shipment_date = ");
        builder.push_bind(date);
    }
    if let Some(date) = payload.desired_shipment_date {
        builder.push(", desired_shipment_date = ");
        builder.push_bind(date);
    }
    if let Some(category) = payload.category_of_request {
        builder.push(", category_of_request = ");
        builder.push_bind(category);
    }
    if let Some(priority) = payload.priority {
        builder.push(", priority = ");
        builder.push_bind(priority);
    }
    if let Some(method) = payload.shipping_method {
        builder.push(", shipping_method = ");
        builder.push_bind(method);
    }

    // Itemless categories always store an empty list, even if items were sent.
    let effective_category = payload
        .category_of_request
        .unwrap_or(existing.category_of_request);
    if effective_category.is_itemless() {
        builder.push(", items = '[]'::jsonb");
    } else if let Some(items) = payload.items {
        builder.push(", items = ");
        builder.push_bind(Jsonb(items));
    }

    if let Some(reason) = payload.reason_for_request {
        builder.push(", reason_for_request = ");
        builder.push_bind(reason);
    }
    if let Some(details) = payload.request_details {
        builder.push(", request_details = ");
        builder.push_bind(details);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(request_id);
    builder.push(" AND deleted_at IS NULL RETURNING *");

    let updated = builder
        .build_query_as::<PoRequest>()
        .fetch_one(&pool)
        .await
        .map_err(ApiResponse::<()>::db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Request updated",
        updated,
    ))
}

#[utoipa::path(
    patch,
    path = "/requests/{request_id}/review",
    params(("request_id" = Uuid, Path, description = "Request ID")),
    request_body = ReviewDecision,
    responses(
        (status = 200, description = "Review recorded", body = PoRequest),
        (status = 403, description = "Caller cannot review"),
        (status = 409, description = "Request already finalized"),
        (status = 422, description = "Review details missing")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn review_request(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    Path(request_id): Path<Uuid>,
    Json(decision): Json<ReviewDecision>,
) -> Result<ApiResponse<PoRequest>, ApiResponse<()>> {
    let existing = fetch_request(&pool, request_id).await?;

    let bridge = Config::bridge_account();
    let outcome = lifecycle::apply_review(
        &actor,
        bridge.as_deref(),
        &existing,
        &decision,
        Utc::now(),
    )
    .map_err(ApiResponse::<()>::from)?;

    let updated = sqlx::query_as::<_, PoRequest>(
        r#"
        UPDATE requests
        SET feasibility = $1,
            status = $2,
            review_details = $3,
            reviewer_id = $4,
            reviewer_name = $5,
            reviewing_dept = $6,
            reviewed_at = $7,
            updated_at = NOW()
        WHERE id = $8 AND deleted_at IS NULL
        RETURNING *
        "#,
    )
    .bind(outcome.feasibility)
    .bind(outcome.status)
    .bind(outcome.review_details)
    .bind(outcome.reviewer_id)
    .bind(outcome.reviewer_name)
    .bind(outcome.reviewing_dept)
    .bind(outcome.reviewed_at)
    .bind(request_id)
    .fetch_one(&pool)
    .await
    .map_err(ApiResponse::<()>::db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Review recorded",
        updated,
    ))
}

#[utoipa::path(
    delete,
    path = "/requests/{request_id}",
    params(("request_id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request deleted"),
        (status = 403, description = "Caller cannot delete this request"),
        (status = 404, description = "Request not found")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn delete_request(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    Path(request_id): Path<Uuid>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let existing = fetch_request(&pool, request_id).await?;

    let delete_disabled = Config::get().requester_delete_disabled;
    if !actor.can_delete(&existing, delete_disabled) {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            ErrorCode::AuthorizationError,
            "You are not allowed to delete this request",
            None,
        ));
    }

    sqlx::query("UPDATE requests SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(request_id)
        .execute(&pool)
        .await
        .map_err(ApiResponse::<()>::db_error)?;

    Ok(ApiResponse::success(StatusCode::OK, "Request deleted", ()))
}

#[utoipa::path(
    patch,
    path = "/requests/{request_id}/completed",
    params(("request_id" = Uuid, Path, description = "Request ID")),
    request_body = CompletedUpdate,
    responses(
        (status = 200, description = "Completed flag updated", body = PoRequest),
        (status = 403, description = "Admins only"),
        (status = 404, description = "Request not found")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn set_completed(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<CompletedUpdate>,
) -> Result<ApiResponse<PoRequest>, ApiResponse<()>> {
    if !actor.can_toggle_completed() {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            ErrorCode::AuthorizationError,
            "Only admins can change the completed flag",
            None,
        ));
    }

    // Existence check keeps 404 distinct from the permission error above.
    fetch_request(&pool, request_id).await?;

    let updated = sqlx::query_as::<_, PoRequest>(
        r#"
        UPDATE requests
        SET completed = $1, updated_at = NOW()
        WHERE id = $2 AND deleted_at IS NULL
        RETURNING *
        "#,
    )
    .bind(payload.completed)
    .bind(request_id)
    .fetch_one(&pool)
    .await
    .map_err(ApiResponse::<()>::db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Completed flag updated",
        updated,
    ))
}

#[utoipa::path(
    patch,
    path = "/requests/{request_id}/confirmed-date",
    params(("request_id" = Uuid, Path, description = "Request ID")),
    request_body = ConfirmedDateUpdate,
    responses(
        (status = 200, description = "Confirmed shipment date set", body = PoRequest),
        (status = 403, description = "Reviewers and admins only"),
        (status = 404, description = "Request not found")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn set_confirmed_date(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<ConfirmedDateUpdate>,
) -> Result<ApiResponse<PoRequest>, ApiResponse<()>> {
    if !actor.can_set_confirmed_date(Config::bridge_account().as_deref()) {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            ErrorCode::AuthorizationError,
            "Only reviewers or admins can confirm a shipment date",
            None,
        ));
    }

    fetch_request(&pool, request_id).await?;

    let updated = sqlx::query_as::<_, PoRequest>(
        r#"
        UPDATE requests
        SET confirmed_shipment_date = $1,
            leadtime = COALESCE($2, leadtime),
            updated_at = NOW()
        WHERE id = $3 AND deleted_at IS NULL
        RETURNING *
        "#,
    )
    .bind(payload.confirmed_shipment_date)
    .bind(payload.leadtime)
    .bind(request_id)
    .fetch_one(&pool)
    .await
    .map_err(ApiResponse::<()>::db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Confirmed shipment date set",
        updated,
    ))
}

#[utoipa::path(
    get,
    path = "/requests/stats",
    responses(
        (status = 200, description = "Dashboard counters", body = DashboardStats),
        (status = 500, description = "Database error")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn request_stats(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
) -> Result<ApiResponse<DashboardStats>, ApiResponse<()>> {
    let requests = fetch_scoped(&pool, &actor, &ListParams::default()).await?;
    let stats = DashboardStats::compute(&requests);
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Stats computed",
        stats,
    ))
}

#[utoipa::path(
    get,
    path = "/requests/priority",
    params(PriorityParams),
    responses(
        (status = 200, description = "Requests needing attention", body = Vec<PriorityEntry>),
        (status = 500, description = "Database error")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn priority_requests(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<PriorityParams>,
) -> Result<ApiResponse<Vec<PriorityEntry>>, ApiResponse<()>> {
    let requests = fetch_scoped(&pool, &actor, &ListParams::default()).await?;

    let sort = params.sort.unwrap_or(SortKey::FactoryShipmentDate);
    let order = params.order.unwrap_or(SortOrder::Asc);
    let limit = params.limit.unwrap_or(views::PRIORITY_QUEUE_LIMIT);

    let today = Utc::now().date_naive();
    let entries: Vec<PriorityEntry> = views::priority_queue(&requests, sort, order, limit)
        .into_iter()
        .map(|r| views::priority_entry(r, today))
        .collect();

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Priority queue computed",
        entries,
    ))
}

#[utoipa::path(
    get,
    path = "/requests/export",
    params(ListParams),
    responses(
        (status = 200, description = "CSV report of visible requests"),
        (status = 500, description = "Report generation failed")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn export_requests(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiResponse<()>> {
    let requests = fetch_scoped(&pool, &actor, &params).await?;

    let bytes = spreadsheet::write_report(&requests).map_err(|e| {
        error!("Report generation failed: {e}");
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InternalError,
            "Report generation failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
        .header(
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"po_requests.csv\"",
        )
        .body(bytes.into())
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::InternalError,
                "Failed to build response",
                Some(json!({ "error": e.to_string() })),
            )
        })
}

#[utoipa::path(
    post,
    path = "/requests/import-items",
    request_body(content_type = "multipart/form-data", description = "CSV file of line items"),
    responses(
        (status = 200, description = "Parsed line items", body = Vec<LineItem>),
        (status = 422, description = "No parseable rows in the uploaded file"),
        (status = 400, description = "Missing file field")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn import_items(
    Extension(_actor): Extension<Actor>,
    mut multipart: Multipart,
) -> Result<ApiResponse<Vec<LineItem>>, ApiResponse<()>> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::BAD_REQUEST,
                ErrorCode::ValidationError,
                "Malformed multipart upload",
                Some(json!({ "error": e.to_string() })),
            )
        })?
        .ok_or_else(|| {
            ApiResponse::<()>::error(
                StatusCode::BAD_REQUEST,
                ErrorCode::ValidationError,
                "Missing file field in upload",
                None,
            )
        })?;

    let data = field.bytes().await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError,
            "Failed to read uploaded file",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let items = spreadsheet::parse_line_items(&data).map_err(|e| {
        let message = match &e {
            ImportError::NoValidRows => "The file contains no valid item rows",
            ImportError::Csv(_) => "The file could not be parsed as CSV",
        };
        ApiResponse::<()>::error(
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::ValidationError,
            message,
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Line items parsed",
        items,
    ))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        create_request,
        list_requests,
        get_request,
        update_request,
        review_request,
        delete_request,
        set_completed,
        set_confirmed_date,
        request_stats,
        priority_requests,
        export_requests,
        import_items
    ),
    components(
        schemas(
            PoRequest, NewPoRequest, UpdatePoRequest, ReviewDecision,
            CompletedUpdate, ConfirmedDateUpdate, DashboardStats,
            PriorityEntry, LineItem
        )
    ),
    tags(
        (name = "Requests", description = "Purchase order change request endpoints")
    )
)]
pub struct RequestDoc;
