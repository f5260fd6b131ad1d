//! State transitions driven by reviewer decisions.
//!
//! `status` is a deterministic function of `feasibility`; every write site
//! goes through `status_for` instead of repeating the mapping inline.
//! Approved and Rejected are terminal for the feasibility dimension:
//! corrections require a new request, never a transition back to Pending.

use chrono::{DateTime, Utc};

use crate::db::models::request::{Feasibility, PoRequest, RequestStatus, ReviewDecision};
use crate::domain::policy::Actor;
use crate::domain::{EngineError, EngineResult};

/// Pure feasibility → status mapping.
pub fn status_for(feasibility: Option<Feasibility>) -> RequestStatus {
    match feasibility {
        Some(Feasibility::Approved) => RequestStatus::Approved,
        Some(Feasibility::Rejected) => RequestStatus::Rejected,
        Some(Feasibility::Pending) | None => RequestStatus::Pending,
    }
}

/// Fields the persistence layer writes back after a successful review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub feasibility: Feasibility,
    pub status: RequestStatus,
    pub review_details: String,
    pub reviewer_id: uuid::Uuid,
    pub reviewer_name: String,
    pub reviewing_dept: String,
    pub reviewed_at: DateTime<Utc>,
}

/// Compute the next (feasibility, status) pair for a reviewer decision.
///
/// Fails with `Authorization` when the caller lacks reviewer capability and
/// `Validation` when the review details are blank. Re-applying the identical
/// decision to an already-reviewed request is an idempotent success; moving a
/// request out of a terminal feasibility is an `InvalidTransition`.
pub fn apply_review(
    actor: &Actor,
    bridge: Option<&str>,
    request: &PoRequest,
    decision: &ReviewDecision,
    now: DateTime<Utc>,
) -> EngineResult<ReviewOutcome> {
    if !actor.can_review(bridge) {
        return Err(EngineError::Authorization(
            "Only reviewers or admins can set feasibility".to_string(),
        ));
    }

    if decision.review_details.trim().is_empty() {
        return Err(EngineError::Validation(
            "Review details are required before a decision".to_string(),
        ));
    }

    match request.feasibility {
        Some(current @ (Feasibility::Approved | Feasibility::Rejected))
            if current != decision.feasibility =>
        {
            return Err(EngineError::InvalidTransition(format!(
                "Request already {current:?}; file a new request instead of reversing the decision"
            )));
        }
        _ => {}
    }

    Ok(ReviewOutcome {
        feasibility: decision.feasibility,
        status: status_for(Some(decision.feasibility)),
        review_details: decision.review_details.trim().to_string(),
        reviewer_id: actor.user_id,
        reviewer_name: actor.full_name.clone(),
        reviewing_dept: actor.department.clone(),
        reviewed_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::request::{Priority, RequestCategory, RequestType};
    use crate::domain::policy::RoleSet;
    use chrono::NaiveDate;
    use sqlx::types::Json;
    use uuid::Uuid;

    fn reviewer() -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            email: "rev@example.com".into(),
            full_name: "Reviewer".into(),
            department: "SCM".into(),
            roles: RoleSet::parse("reviewer"),
        }
    }

    fn requester_only() -> Actor {
        Actor {
            roles: RoleSet::parse("requester"),
            ..reviewer()
        }
    }

    fn pending_request() -> PoRequest {
        PoRequest {
            id: Uuid::new_v4(),
            request_type: RequestType::ExistingOrderChange,
            category_of_request: RequestCategory::ScheduleChange,
            priority: Priority::Normal,
            request_date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            so_number: Some("SO-2001".into()),
            customer: "Sales".into(),
            requesting_dept: "Sales".into(),
            requester_id: Uuid::new_v4(),
            requester_name: "Req".into(),
            factory_shipment_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            desired_shipment_date: None,
            confirmed_shipment_date: None,
            leadtime: None,
            shipping_method: None,
            items: Json(vec![]),
            reason_for_request: "customer_request".into(),
            request_details: "push out two weeks".into(),
            feasibility: None,
            review_details: None,
            reviewing_dept: None,
            reviewer_id: None,
            reviewer_name: None,
            reviewed_at: None,
            status: RequestStatus::Pending,
            completed: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn decision(feasibility: Feasibility, details: &str) -> ReviewDecision {
        ReviewDecision {
            feasibility,
            review_details: details.into(),
        }
    }

    #[test]
    fn status_follows_feasibility() {
        assert_eq!(status_for(Some(Feasibility::Approved)), RequestStatus::Approved);
        assert_eq!(status_for(Some(Feasibility::Rejected)), RequestStatus::Rejected);
        assert_eq!(status_for(Some(Feasibility::Pending)), RequestStatus::Pending);
        assert_eq!(status_for(None), RequestStatus::Pending);
    }

    #[test]
    fn approval_stamps_reviewer_fields() {
        let actor = reviewer();
        let now = Utc::now();
        let out = apply_review(
            &actor,
            None,
            &pending_request(),
            &decision(Feasibility::Approved, "schedule works"),
            now,
        )
        .unwrap();

        assert_eq!(out.status, RequestStatus::Approved);
        assert_eq!(out.feasibility, Feasibility::Approved);
        assert_eq!(out.reviewer_id, actor.user_id);
        assert_eq!(out.reviewing_dept, "SCM");
        assert_eq!(out.reviewed_at, now);
    }

    #[test]
    fn blank_review_details_is_a_validation_error() {
        let err = apply_review(
            &reviewer(),
            None,
            &pending_request(),
            &decision(Feasibility::Rejected, "   "),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn non_reviewer_is_rejected() {
        let err = apply_review(
            &requester_only(),
            None,
            &pending_request(),
            &decision(Feasibility::Approved, "looks fine"),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Authorization(_)));
    }

    #[test]
    fn bridge_account_may_review() {
        let actor = requester_only();
        let out = apply_review(
            &actor,
            Some("rev@example.com"),
            &pending_request(),
            &decision(Feasibility::Approved, "ok"),
            Utc::now(),
        );
        assert!(out.is_ok());
    }

    #[test]
    fn terminal_states_cannot_be_reversed() {
        let mut request = pending_request();
        request.feasibility = Some(Feasibility::Approved);
        request.status = RequestStatus::Approved;

        let err = apply_review(
            &reviewer(),
            None,
            &request,
            &decision(Feasibility::Rejected, "changed my mind"),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition(_)));

        // Re-applying the identical decision is idempotent.
        let again = apply_review(
            &reviewer(),
            None,
            &request,
            &decision(Feasibility::Approved, "still fine"),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(again.status, RequestStatus::Approved);
    }
}
