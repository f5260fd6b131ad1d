//! Outbound email notifications via the Resend HTTP API.
//!
//! Everything here is best-effort: a notification failure must never fail or
//! roll back the write that triggered it. Callers either spawn these
//! functions fire-and-forget or log-and-swallow the error themselves.

use serde_json::json;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::models::request::{PoRequest, Priority};

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// Result type for notification operations
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors that can occur in notification operations
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Email dispatch failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, sqlx::FromRow)]
struct Recipient {
    email: String,
    full_name: String,
}

async fn all_recipients(pool: &PgPool) -> NotificationResult<Vec<Recipient>> {
    let recipients = sqlx::query_as::<_, Recipient>(
        "SELECT u.email, p.full_name FROM users u JOIN user_profiles p ON p.id = u.id",
    )
    .fetch_all(pool)
    .await?;
    Ok(recipients)
}

/// Send one personalized email per recipient. Without an API key configured
/// the message is logged instead, so local setups keep working.
async fn send_to_all<F>(pool: &PgPool, subject: &str, body_for: F) -> NotificationResult<usize>
where
    F: Fn(&str) -> String,
{
    let recipients = all_recipients(pool).await?;
    if recipients.is_empty() {
        warn!("no recipients for notification '{subject}'");
        return Ok(0);
    }

    let config = Config::get();
    let Some(api_key) = config.resend_api_key.as_deref() else {
        info!(
            subject,
            recipients = recipients.len(),
            "RESEND_API_KEY not set; notification logged only"
        );
        return Ok(0);
    };

    let client = reqwest::Client::new();
    let mut sent = 0;
    for recipient in &recipients {
        let result = client
            .post(RESEND_ENDPOINT)
            .bearer_auth(api_key)
            .json(&json!({
                "from": config.notify_from,
                "to": [recipient.email],
                "subject": subject,
                "text": body_for(&recipient.full_name),
            }))
            .send()
            .await
            .and_then(|resp| resp.error_for_status());

        match result {
            Ok(_) => sent += 1,
            // One bad address must not stop the rest of the fan-out.
            Err(e) => warn!(email = %recipient.email, "email dispatch failed: {e}"),
        }
    }
    info!(subject, sent, "notification dispatched");
    Ok(sent)
}

fn request_link(request: &PoRequest) -> String {
    format!("{}/requests/{}", Config::get().app_url, request.id)
}

/// Alert for a newly filed urgent request.
pub async fn notify_urgent_request(pool: &PgPool, request: &PoRequest) -> NotificationResult<usize> {
    let link = request_link(request);
    let subject = "[URGENT] New urgent PO change request";
    send_to_all(pool, subject, |name| {
        format!(
            "Hello {name},\n\n\
             An urgent PO change request has been filed.\n\n\
             - Requester: {}\n- Customer: {}\n- SO number: {}\n- Priority: urgent\n\n\
             Please review it as soon as possible:\n{link}\n",
            request.requester_name,
            request.customer,
            request.so_number.as_deref().unwrap_or("-"),
        )
    })
    .await
}

/// Routine alert for any newly filed request.
pub async fn notify_new_request(pool: &PgPool, request: &PoRequest) -> NotificationResult<usize> {
    let link = request_link(request);
    let subject = "[Notice] New PO change request";
    send_to_all(pool, subject, |name| {
        let so_line = request
            .so_number
            .as_deref()
            .map(|so| format!("- SO number: {so}\n"))
            .unwrap_or_default();
        format!(
            "Hello {name},\n\n\
             A PO change request has been filed.\n\n\
             - Requester: {}\n- Customer: {}\n{so_line}- Priority: {:?}\n\n\
             Please review it here:\n{link}\n",
            request.requester_name, request.customer, request.priority,
        )
    })
    .await
}

/// Fire-and-forget dispatch after a successful insert. Urgent requests get
/// the louder template.
pub fn spawn_request_notifications(pool: PgPool, request: PoRequest) {
    tokio::spawn(async move {
        let result = if request.priority == Priority::Urgent {
            notify_urgent_request(&pool, &request).await
        } else {
            notify_new_request(&pool, &request).await
        };
        if let Err(e) = result {
            warn!(request_id = %request.id, "request notification failed: {e}");
        }
    });
}

/// Scheduled digest of requests still waiting for review. Returns the number
/// of pending requests found so the caller can log it.
pub async fn pending_review_reminder(pool: &PgPool) -> NotificationResult<usize> {
    let pending = sqlx::query_as::<_, PoRequest>(
        "SELECT * FROM requests WHERE status = 'pending' AND deleted_at IS NULL ORDER BY created_at ASC",
    )
    .fetch_all(pool)
    .await?;

    if pending.is_empty() {
        return Ok(0);
    }

    let listed: String = pending
        .iter()
        .take(5)
        .enumerate()
        .map(|(i, r)| {
            let so = r
                .so_number
                .as_deref()
                .map(|s| format!("SO: {s} | "))
                .unwrap_or_default();
            let urgent = if r.priority == Priority::Urgent {
                " | [URGENT]"
            } else {
                ""
            };
            format!(
                "{}. {so}Customer: {} | Requester: {}{urgent}\n",
                i + 1,
                r.customer,
                r.requester_name
            )
        })
        .collect();
    let overflow = if pending.len() > 5 {
        format!("... and {} more\n", pending.len() - 5)
    } else {
        String::new()
    };
    let total = pending.len();
    let app_url = Config::get().app_url.clone();

    let subject = "[Notice] PO change requests awaiting review";
    send_to_all(pool, subject, |name| {
        format!(
            "Hello {name},\n\n\
             {total} PO change request(s) are still waiting for review.\n\n\
             {listed}{overflow}\n\
             Please review them here:\n{app_url}\n"
        )
    })
    .await?;

    Ok(total)
}
