//! Authorization policy: pure predicates over (actor, request, action).
//!
//! The policy never mutates state and never touches the database; the
//! handlers own enforcement, this module owns the rules.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::request::{PoRequest, RequestStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleTag {
    Requester,
    Reviewer,
    Admin,
}

impl RoleTag {
    fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "requester" => Some(RoleTag::Requester),
            "reviewer" => Some(RoleTag::Reviewer),
            "admin" => Some(RoleTag::Admin),
            _ => None,
        }
    }
}

/// Set of role tags parsed from the comma-joined profile `role` column.
/// Unknown tags are dropped rather than rejected; a profile written by an
/// older frontend must not lock its owner out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoleSet(BTreeSet<RoleTag>);

impl RoleSet {
    pub fn parse(raw: &str) -> Self {
        RoleSet(raw.split(',').filter_map(RoleTag::parse).collect())
    }

    pub fn contains(&self, tag: RoleTag) -> bool {
        self.0.contains(&tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<RoleTag> for RoleSet {
    fn from_iter<I: IntoIterator<Item = RoleTag>>(iter: I) -> Self {
        RoleSet(iter.into_iter().collect())
    }
}

/// Row-listing scope derived from the actor's roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Admins see every non-deleted request.
    All,
    /// Everyone else sees requests whose customer and requesting department
    /// both match their own department.
    Department(String),
}

/// The authenticated caller as the policy sees it: identity, profile facts
/// and parsed role set. Built once per request by the actor middleware.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub department: String,
    pub roles: RoleSet,
}

impl Actor {
    /// The single named exception: one configured account holds requester and
    /// reviewer capability regardless of its stored tags.
    fn is_bridge_account(&self, bridge: Option<&str>) -> bool {
        bridge.is_some_and(|b| b.eq_ignore_ascii_case(&self.email))
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(RoleTag::Admin)
    }

    pub fn is_reviewer(&self, bridge: Option<&str>) -> bool {
        self.roles.contains(RoleTag::Reviewer) || self.is_admin() || self.is_bridge_account(bridge)
    }

    pub fn is_requester(&self, bridge: Option<&str>) -> bool {
        self.roles.contains(RoleTag::Requester) || self.is_bridge_account(bridge)
    }

    /// Any authenticated user with a resolved department may create requests.
    pub fn can_create(&self) -> bool {
        !self.department.trim().is_empty()
    }

    /// Owner-only, and only while the request has not been reviewed.
    pub fn can_edit(&self, request: &PoRequest) -> bool {
        request.requester_id == self.user_id && request.status == RequestStatus::Pending
    }

    /// Same ownership rule as editing, plus a deployment-level policy flag
    /// that can restrict deletion to admins.
    pub fn can_delete(&self, request: &PoRequest, delete_disabled: bool) -> bool {
        if delete_disabled && !self.is_admin() {
            return false;
        }
        self.can_edit(request)
    }

    pub fn can_review(&self, bridge: Option<&str>) -> bool {
        self.is_reviewer(bridge)
    }

    pub fn can_toggle_completed(&self) -> bool {
        self.is_admin()
    }

    pub fn can_set_confirmed_date(&self, bridge: Option<&str>) -> bool {
        self.is_reviewer(bridge)
    }

    pub fn visibility(&self) -> Visibility {
        if self.is_admin() {
            Visibility::All
        } else {
            Visibility::Department(self.department.clone())
        }
    }

    /// Read check for a single fetched row, consistent with `visibility`.
    pub fn can_view(&self, request: &PoRequest) -> bool {
        match self.visibility() {
            Visibility::All => true,
            Visibility::Department(dept) => {
                request.customer == dept && request.requesting_dept == dept
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::request::{
        Priority, RequestCategory, RequestStatus, RequestType,
    };
    use chrono::{NaiveDate, Utc};
    use sqlx::types::Json;

    fn actor(roles: &str, department: &str) -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            email: "user@example.com".into(),
            full_name: "Test User".into(),
            department: department.into(),
            roles: RoleSet::parse(roles),
        }
    }

    fn request(requester_id: Uuid, status: RequestStatus) -> PoRequest {
        PoRequest {
            id: Uuid::new_v4(),
            request_type: RequestType::ExistingOrderChange,
            category_of_request: RequestCategory::ProductAddition,
            priority: Priority::Normal,
            request_date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            so_number: Some("SO-1001".into()),
            customer: "Sales".into(),
            requesting_dept: "Sales".into(),
            requester_id,
            requester_name: "Test User".into(),
            factory_shipment_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            desired_shipment_date: None,
            confirmed_shipment_date: None,
            leadtime: None,
            shipping_method: None,
            items: Json(vec![]),
            reason_for_request: "customer_request".into(),
            request_details: "details".into(),
            feasibility: None,
            review_details: None,
            reviewing_dept: None,
            reviewer_id: None,
            reviewer_name: None,
            reviewed_at: None,
            status,
            completed: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn role_set_parses_comma_joined_tags() {
        let roles = RoleSet::parse("reviewer, requester");
        assert!(roles.contains(RoleTag::Requester));
        assert!(roles.contains(RoleTag::Reviewer));
        assert!(!roles.contains(RoleTag::Admin));
    }

    #[test]
    fn role_set_drops_unknown_tags() {
        let roles = RoleSet::parse("manager,requester,");
        assert!(roles.contains(RoleTag::Requester));
        assert!(!roles.contains(RoleTag::Admin));
    }

    #[test]
    fn admin_tag_implies_reviewer_capability() {
        let a = actor("admin", "Ops");
        assert!(a.is_reviewer(None));
        assert!(a.is_admin());
    }

    #[test]
    fn bridge_account_gets_both_capabilities() {
        let a = actor("", "Ops");
        assert!(!a.is_reviewer(None));
        assert!(!a.is_requester(None));
        assert!(a.is_reviewer(Some("user@example.com")));
        assert!(a.is_requester(Some("USER@example.com")));
    }

    #[test]
    fn edit_requires_ownership_and_pending_status() {
        let a = actor("requester", "Sales");
        let own_pending = request(a.user_id, RequestStatus::Pending);
        let own_approved = request(a.user_id, RequestStatus::Approved);
        let other_pending = request(Uuid::new_v4(), RequestStatus::Pending);

        assert!(a.can_edit(&own_pending));
        assert!(!a.can_edit(&own_approved));
        assert!(!a.can_edit(&other_pending));
    }

    #[test]
    fn reviewer_role_does_not_grant_edit_of_foreign_rows() {
        let a = actor("reviewer,admin", "Ops");
        let foreign = request(Uuid::new_v4(), RequestStatus::Pending);
        assert!(!a.can_edit(&foreign));
        assert!(!a.can_delete(&foreign, false));
    }

    #[test]
    fn delete_policy_flag_blocks_non_admins() {
        let a = actor("requester", "Sales");
        let own = request(a.user_id, RequestStatus::Pending);
        assert!(a.can_delete(&own, false));
        assert!(!a.can_delete(&own, true));

        let admin = actor("admin", "Sales");
        let own_by_admin = request(admin.user_id, RequestStatus::Pending);
        assert!(admin.can_delete(&own_by_admin, true));
    }

    #[test]
    fn create_requires_resolved_department() {
        assert!(actor("requester", "Sales").can_create());
        assert!(!actor("requester", "  ").can_create());
    }

    #[test]
    fn visibility_scopes_by_department_for_non_admins() {
        let a = actor("requester", "Sales");
        assert_eq!(a.visibility(), Visibility::Department("Sales".into()));
        assert_eq!(actor("admin", "Sales").visibility(), Visibility::All);

        let mut foreign = request(Uuid::new_v4(), RequestStatus::Pending);
        foreign.customer = "Logistics".into();
        foreign.requesting_dept = "Logistics".into();
        assert!(!a.can_view(&foreign));
        assert!(actor("admin", "Ops").can_view(&foreign));
    }

    #[test]
    fn completed_toggle_is_admin_only() {
        assert!(actor("admin", "Ops").can_toggle_completed());
        assert!(!actor("reviewer", "Ops").can_toggle_completed());
    }
}
