//! Creation-time validation. Rules fail fast, in a fixed order, each with a
//! distinct message so the form can point at the offending field.

use chrono::NaiveDate;

use crate::db::models::request::{
    LineItem, NewPoRequest, PoRequest, RequestCategory, RequestStatus, RequestType,
    UpdatePoRequest,
};
use crate::domain::policy::Actor;
use crate::domain::{EngineError, EngineResult};

/// Normalized insert payload: the draft plus every derived field the table
/// requires, ready for the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRequest {
    pub request_type: RequestType,
    pub category_of_request: RequestCategory,
    pub priority: crate::db::models::request::Priority,
    pub request_date: NaiveDate,
    pub so_number: Option<String>,
    pub customer: String,
    pub requesting_dept: String,
    pub requester_id: uuid::Uuid,
    pub requester_name: String,
    pub factory_shipment_date: NaiveDate,
    pub desired_shipment_date: Option<NaiveDate>,
    pub shipping_method: Option<String>,
    pub items: Vec<LineItem>,
    pub reason_for_request: String,
    pub request_details: String,
    pub status: RequestStatus,
    pub completed: bool,
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Validate a draft and fill in the derived fields.
pub fn validate_new_request(
    draft: &NewPoRequest,
    actor: &Actor,
    today: NaiveDate,
) -> EngineResult<NormalizedRequest> {
    if draft.customer.trim().is_empty() {
        return Err(EngineError::Validation("Customer is required".to_string()));
    }

    if draft.request_type == RequestType::ExistingOrderChange && blank(&draft.so_number) {
        return Err(EngineError::Validation(
            "SO number is required for existing order changes".to_string(),
        ));
    }

    if draft.request_type == RequestType::ExistingOrderChange
        && draft.category_of_request == RequestCategory::ShippingMethodChange
        && blank(&draft.shipping_method)
    {
        return Err(EngineError::Validation(
            "Shipping method is required for shipping method changes".to_string(),
        ));
    }

    if draft.request_details.trim().is_empty() {
        return Err(EngineError::Validation(
            "Request details are required".to_string(),
        ));
    }

    if !draft.category_of_request.is_itemless() && draft.items.is_empty() {
        return Err(EngineError::Validation(
            "At least one line item is required for this category".to_string(),
        ));
    }

    // New orders have no prior schedule; the desired date seeds the current one.
    let factory_shipment_date = match draft.request_type {
        RequestType::NewOrderAddition => draft
            .desired_shipment_date
            .or(draft.factory_shipment_date),
        RequestType::ExistingOrderChange => draft.factory_shipment_date,
    }
    .ok_or_else(|| EngineError::Validation("Shipment date is required".to_string()))?;

    if actor.department.trim().is_empty() {
        return Err(EngineError::Validation(
            "Your profile has no department set; update it before submitting requests"
                .to_string(),
        ));
    }

    let items = if draft.category_of_request.is_itemless() {
        Vec::new()
    } else {
        draft.items.clone()
    };

    Ok(NormalizedRequest {
        request_type: draft.request_type,
        category_of_request: draft.category_of_request,
        priority: draft.priority,
        request_date: today,
        so_number: draft.so_number.as_deref().map(|s| s.trim().to_string()),
        customer: draft.customer.trim().to_string(),
        requesting_dept: actor.department.clone(),
        requester_id: actor.user_id,
        requester_name: actor.full_name.clone(),
        factory_shipment_date,
        desired_shipment_date: draft.desired_shipment_date,
        shipping_method: draft.shipping_method.clone(),
        items,
        reason_for_request: draft.reason_for_request.clone(),
        request_details: draft.request_details.trim().to_string(),
        status: RequestStatus::Pending,
        completed: false,
    })
}

/// Validate a partial edit against the row it would produce. The creation
/// rules hold for the lifetime of the request, not just at insert: a patch
/// may not blank a required field or steer an item-bearing category to an
/// empty item list.
pub fn validate_update(existing: &PoRequest, patch: &UpdatePoRequest) -> EngineResult<()> {
    if patch
        .customer
        .as_deref()
        .is_some_and(|c| c.trim().is_empty())
    {
        return Err(EngineError::Validation("Customer is required".to_string()));
    }

    if existing.request_type == RequestType::ExistingOrderChange
        && patch
            .so_number
            .as_deref()
            .is_some_and(|s| s.trim().is_empty())
    {
        return Err(EngineError::Validation(
            "SO number is required for existing order changes".to_string(),
        ));
    }

    if patch
        .request_details
        .as_deref()
        .is_some_and(|d| d.trim().is_empty())
    {
        return Err(EngineError::Validation(
            "Request details are required".to_string(),
        ));
    }

    let effective_category = patch
        .category_of_request
        .unwrap_or(existing.category_of_request);
    if !effective_category.is_itemless() {
        let effective_items_empty = match &patch.items {
            Some(items) => items.is_empty(),
            None => existing.items.0.is_empty(),
        };
        if effective_items_empty {
            return Err(EngineError::Validation(
                "At least one line item is required for this category".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::request::Priority;
    use crate::domain::policy::RoleSet;
    use chrono::Utc;
    use sqlx::types::Json;
    use uuid::Uuid;

    fn actor(department: &str) -> Actor {
        Actor {
            user_id: Uuid::new_v4(),
            email: "req@example.com".into(),
            full_name: "Requester".into(),
            department: department.into(),
            roles: RoleSet::parse("requester"),
        }
    }

    fn draft() -> NewPoRequest {
        NewPoRequest {
            request_type: RequestType::ExistingOrderChange,
            category_of_request: RequestCategory::ProductAddition,
            priority: Priority::Normal,
            customer: "Acme Corp".into(),
            so_number: Some("SO-3001".into()),
            factory_shipment_date: NaiveDate::from_ymd_opt(2026, 9, 15),
            desired_shipment_date: None,
            shipping_method: None,
            items: vec![LineItem {
                item_code: "IB-100".into(),
                item_name: "Widget".into(),
                quantity: 5,
            }],
            reason_for_request: "customer_request".into(),
            request_details: "add five widgets".into(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 29).unwrap()
    }

    #[test]
    fn valid_draft_normalizes() {
        let out = validate_new_request(&draft(), &actor("Sales"), today()).unwrap();
        assert_eq!(out.status, RequestStatus::Pending);
        assert!(!out.completed);
        assert_eq!(out.request_date, today());
        assert_eq!(out.requesting_dept, "Sales");
        assert_eq!(out.items.len(), 1);
    }

    #[test]
    fn missing_so_number_gets_the_specific_error() {
        let mut d = draft();
        d.so_number = Some("  ".into());
        let err = validate_new_request(&d, &actor("Sales"), today()).unwrap_err();
        assert_eq!(
            err,
            EngineError::Validation("SO number is required for existing order changes".into())
        );
    }

    #[test]
    fn shipping_method_required_only_for_shipping_method_change() {
        let mut d = draft();
        d.category_of_request = RequestCategory::ShippingMethodChange;
        d.shipping_method = None;
        let err = validate_new_request(&d, &actor("Sales"), today()).unwrap_err();
        assert!(matches!(err, EngineError::Validation(msg) if msg.contains("Shipping method")));
    }

    #[test]
    fn schedule_change_needs_no_items() {
        let mut d = draft();
        d.category_of_request = RequestCategory::ScheduleChange;
        d.items = vec![];
        let out = validate_new_request(&d, &actor("Sales"), today()).unwrap();
        assert!(out.items.is_empty());
    }

    #[test]
    fn itemless_categories_drop_stray_items() {
        let mut d = draft();
        d.category_of_request = RequestCategory::ShippingMethodChange;
        d.shipping_method = Some("air".into());
        let out = validate_new_request(&d, &actor("Sales"), today()).unwrap();
        assert!(out.items.is_empty());
    }

    #[test]
    fn item_categories_require_items() {
        let mut d = draft();
        d.items = vec![];
        let err = validate_new_request(&d, &actor("Sales"), today()).unwrap_err();
        assert!(matches!(err, EngineError::Validation(msg) if msg.contains("line item")));
    }

    #[test]
    fn request_details_always_required() {
        let mut d = draft();
        d.category_of_request = RequestCategory::ScheduleChange;
        d.items = vec![];
        d.request_details = " ".into();
        let err = validate_new_request(&d, &actor("Sales"), today()).unwrap_err();
        assert!(matches!(err, EngineError::Validation(msg) if msg.contains("Request details")));
    }

    #[test]
    fn missing_department_is_a_distinct_error() {
        let err = validate_new_request(&draft(), &actor(""), today()).unwrap_err();
        assert!(matches!(err, EngineError::Validation(msg) if msg.contains("department")));
    }

    #[test]
    fn new_order_seeds_shipment_date_from_desired() {
        let mut d = draft();
        d.request_type = RequestType::NewOrderAddition;
        d.so_number = None;
        d.factory_shipment_date = None;
        d.desired_shipment_date = NaiveDate::from_ymd_opt(2026, 10, 1);
        let out = validate_new_request(&d, &actor("Sales"), today()).unwrap();
        assert_eq!(
            out.factory_shipment_date,
            NaiveDate::from_ymd_opt(2026, 10, 1).unwrap()
        );
    }

    #[test]
    fn new_order_without_so_number_is_fine() {
        let mut d = draft();
        d.request_type = RequestType::NewOrderAddition;
        d.so_number = None;
        d.desired_shipment_date = NaiveDate::from_ymd_opt(2026, 10, 1);
        assert!(validate_new_request(&d, &actor("Sales"), today()).is_ok());
    }

    fn stored(category: RequestCategory, items: Vec<LineItem>) -> PoRequest {
        PoRequest {
            id: Uuid::new_v4(),
            request_type: RequestType::ExistingOrderChange,
            category_of_request: category,
            priority: Priority::Normal,
            request_date: today(),
            so_number: Some("SO-3001".into()),
            customer: "Acme Corp".into(),
            requesting_dept: "Sales".into(),
            requester_id: Uuid::new_v4(),
            requester_name: "Requester".into(),
            factory_shipment_date: NaiveDate::from_ymd_opt(2026, 9, 15).unwrap(),
            desired_shipment_date: None,
            confirmed_shipment_date: None,
            leadtime: None,
            shipping_method: None,
            items: Json(items),
            reason_for_request: "customer_request".into(),
            request_details: "details".into(),
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

    fn empty_patch() -> UpdatePoRequest {
        UpdatePoRequest {
            customer: None,
            so_number: None,
            factory_shipment_date: None,
            desired_shipment_date: None,
            category_of_request: None,
            priority: None,
            shipping_method: None,
            items: None,
            reason_for_request: None,
            request_details: None,
        }
    }

    #[test]
    fn update_cannot_move_to_item_category_without_items() {
        // Schedule changes legitimately carry no items; switching category
        // must not leave an item-bearing request with an empty list.
        let existing = stored(RequestCategory::ScheduleChange, vec![]);
        let mut patch = empty_patch();
        patch.category_of_request = Some(RequestCategory::ProductAddition);

        let err = validate_update(&existing, &patch).unwrap_err();
        assert!(matches!(err, EngineError::Validation(msg) if msg.contains("line item")));

        patch.items = Some(vec![LineItem {
            item_code: "IB-100".into(),
            item_name: "Widget".into(),
            quantity: 5,
        }]);
        assert!(validate_update(&existing, &patch).is_ok());
    }

    #[test]
    fn update_cannot_empty_items_of_item_category() {
        let existing = stored(
            RequestCategory::ProductAddition,
            vec![LineItem {
                item_code: "IB-100".into(),
                item_name: "Widget".into(),
                quantity: 5,
            }],
        );
        let mut patch = empty_patch();
        patch.items = Some(vec![]);
        let err = validate_update(&existing, &patch).unwrap_err();
        assert!(matches!(err, EngineError::Validation(msg) if msg.contains("line item")));
    }

    #[test]
    fn update_rejects_blank_required_fields() {
        let existing = stored(RequestCategory::ScheduleChange, vec![]);

        let mut patch = empty_patch();
        patch.customer = Some("  ".into());
        assert_eq!(
            validate_update(&existing, &patch).unwrap_err(),
            EngineError::Validation("Customer is required".into())
        );

        let mut patch = empty_patch();
        patch.request_details = Some("".into());
        assert_eq!(
            validate_update(&existing, &patch).unwrap_err(),
            EngineError::Validation("Request details are required".into())
        );

        let mut patch = empty_patch();
        patch.so_number = Some(" ".into());
        assert_eq!(
            validate_update(&existing, &patch).unwrap_err(),
            EngineError::Validation("SO number is required for existing order changes".into())
        );
    }

    #[test]
    fn update_leaving_fields_untouched_is_fine() {
        let existing = stored(RequestCategory::ScheduleChange, vec![]);
        let mut patch = empty_patch();
        patch.priority = Some(Priority::Urgent);
        assert!(validate_update(&existing, &patch).is_ok());
    }
}
