use axum::{
    routing::{get, patch, post},
    Router,
};
use sqlx::PgPool;

use crate::db::queries::requests::*;

pub fn request_routes() -> Router<PgPool> {
    Router::new()
        .route("/requests", post(create_request))
        .route("/requests", get(list_requests))
        .route("/requests/stats", get(request_stats))
        .route("/requests/priority", get(priority_requests))
        .route("/requests/export", get(export_requests))
        .route("/requests/import-items", post(import_items))
        .route(
            "/requests/{request_id}",
            get(get_request).patch(update_request).delete(delete_request),
        )
        .route("/requests/{request_id}/review", patch(review_request))
        .route("/requests/{request_id}/completed", patch(set_completed))
        .route(
            "/requests/{request_id}/confirmed-date",
            patch(set_confirmed_date),
        )
}
