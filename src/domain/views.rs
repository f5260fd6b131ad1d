//! Derived read-only projections over a request set: dashboard counters, the
//! priority queue, days-left / urgency banding and text search. Pure
//! functions; callers fetch the (already scoped) rows and project here.

use chrono::NaiveDate;
use std::cmp::Ordering;

use crate::db::models::request::{
    DashboardStats, PoRequest, PriorityEntry, RequestStatus, SortKey, SortOrder, UrgencyLevel,
};

/// Default display window of the dashboard priority queue.
pub const PRIORITY_QUEUE_LIMIT: usize = 5;

impl DashboardStats {
    pub fn compute(requests: &[PoRequest]) -> Self {
        DashboardStats {
            total: requests.len(),
            pending: requests
                .iter()
                .filter(|r| r.status == RequestStatus::Pending)
                .count(),
            approved: requests
                .iter()
                .filter(|r| r.status == RequestStatus::Approved)
                .count(),
            completed: requests.iter().filter(|r| r.completed).count(),
        }
    }
}

/// Whole days until the shipment date. Both operands are calendar dates, so
/// this matches midnight-truncated arithmetic exactly: today → 0, tomorrow →
/// 1, yesterday → -1 (overdue).
pub fn days_left(shipment_date: NaiveDate, today: NaiveDate) -> i64 {
    (shipment_date - today).num_days()
}

impl UrgencyLevel {
    /// Banding drives dashboard highlighting; thresholds are inclusive.
    pub fn from_days_left(days: i64) -> Self {
        if days <= 5 {
            UrgencyLevel::Urgent
        } else if days <= 10 {
            UrgencyLevel::Normal
        } else {
            UrgencyLevel::Low
        }
    }
}

fn compare_by_key(a: &PoRequest, b: &PoRequest, key: SortKey) -> Ordering {
    match key {
        SortKey::FactoryShipmentDate => a.factory_shipment_date.cmp(&b.factory_shipment_date),
        SortKey::RequestDate => a.request_date.cmp(&b.request_date),
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        SortKey::SoNumber => a.so_number.cmp(&b.so_number),
        SortKey::Customer => a.customer.cmp(&b.customer),
        SortKey::Priority => a.priority.rank().cmp(&b.priority.rank()),
    }
}

/// Requests still needing attention: not rejected, not completed, sorted by
/// the selected key (shipment date ascending by default) with the most
/// recently created row winning ties, capped to the display window.
pub fn priority_queue<'a>(
    requests: &'a [PoRequest],
    sort: SortKey,
    order: SortOrder,
    limit: usize,
) -> Vec<&'a PoRequest> {
    let mut queue: Vec<&PoRequest> = requests
        .iter()
        .filter(|r| !r.completed && r.status != RequestStatus::Rejected)
        .collect();

    queue.sort_by(|a, b| {
        let cmp = compare_by_key(a, b, sort);
        let cmp = match order {
            SortOrder::Asc => cmp,
            SortOrder::Desc => cmp.reverse(),
        };
        cmp.then(b.created_at.cmp(&a.created_at))
    });

    queue.truncate(limit);
    queue
}

/// Project a queue row into its dashboard shape with urgency precomputed.
pub fn priority_entry(request: &PoRequest, today: NaiveDate) -> PriorityEntry {
    let days = days_left(request.factory_shipment_date, today);
    PriorityEntry {
        id: request.id,
        urgency: UrgencyLevel::from_days_left(days),
        so_number: request.so_number.clone(),
        customer: request.customer.clone(),
        category_of_request: request.category_of_request,
        shipment_date: request.factory_shipment_date,
        days_left: days,
        status: request.status,
        priority: request.priority,
    }
}

/// Case-insensitive substring match over the fixed search field set. An empty
/// query matches everything.
///
/// This is the reference definition of search; the ILIKE clauses the list
/// endpoints push into SQL must cover exactly this field set.
pub fn matches_search(request: &PoRequest, query: &str) -> bool {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return true;
    }
    let fields = [
        Some(request.customer.as_str()),
        Some(request.requesting_dept.as_str()),
        Some(request.requester_name.as_str()),
        request.so_number.as_deref(),
    ];
    fields
        .into_iter()
        .flatten()
        .any(|f| f.to_lowercase().contains(&q))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::request::{
        Priority, RequestCategory, RequestType,
    };
    use chrono::{Duration, TimeZone, Utc};
    use sqlx::types::Json;
    use uuid::Uuid;

    fn base_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 29).unwrap()
    }

    fn request(status: RequestStatus, completed: bool, ship_offset_days: i64) -> PoRequest {
        PoRequest {
            id: Uuid::new_v4(),
            request_type: RequestType::ExistingOrderChange,
            category_of_request: RequestCategory::ProductAddition,
            priority: Priority::Normal,
            request_date: base_date(),
            so_number: Some("SO-100".into()),
            customer: "Acme Corp".into(),
            requesting_dept: "Sales".into(),
            requester_id: Uuid::new_v4(),
            requester_name: "Req".into(),
            factory_shipment_date: base_date() + Duration::days(ship_offset_days),
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
            completed,
            created_at: Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap(),
            deleted_at: None,
        }
    }

    #[test]
    fn stats_scenario_from_mixed_statuses() {
        let requests = vec![
            request(RequestStatus::Pending, false, 1),
            request(RequestStatus::Pending, false, 2),
            request(RequestStatus::Approved, true, 3),
            request(RequestStatus::Rejected, false, 4),
        ];
        let stats = DashboardStats::compute(&requests);
        assert_eq!(
            stats,
            DashboardStats {
                total: 4,
                pending: 2,
                approved: 1,
                completed: 1
            }
        );
    }

    #[test]
    fn days_left_boundaries() {
        let today = base_date();
        assert_eq!(days_left(today, today), 0);
        assert_eq!(days_left(today + Duration::days(5), today), 5);
        assert_eq!(days_left(today - Duration::days(1), today), -1);
    }

    #[test]
    fn urgency_banding_thresholds() {
        assert_eq!(UrgencyLevel::from_days_left(5), UrgencyLevel::Urgent);
        assert_eq!(UrgencyLevel::from_days_left(6), UrgencyLevel::Normal);
        assert_eq!(UrgencyLevel::from_days_left(10), UrgencyLevel::Normal);
        assert_eq!(UrgencyLevel::from_days_left(11), UrgencyLevel::Low);
        assert_eq!(UrgencyLevel::from_days_left(-3), UrgencyLevel::Urgent);
    }

    #[test]
    fn queue_sorts_by_shipment_date_ascending_by_default() {
        let requests = vec![
            request(RequestStatus::Pending, false, 2),
            request(RequestStatus::Pending, false, 20),
            request(RequestStatus::Pending, false, 1),
        ];
        let queue = priority_queue(
            &requests,
            SortKey::FactoryShipmentDate,
            SortOrder::Asc,
            PRIORITY_QUEUE_LIMIT,
        );
        let offsets: Vec<i64> = queue
            .iter()
            .map(|r| days_left(r.factory_shipment_date, base_date()))
            .collect();
        assert_eq!(offsets, vec![1, 2, 20]);
    }

    #[test]
    fn queue_excludes_rejected_and_completed() {
        let requests = vec![
            request(RequestStatus::Rejected, false, 1),
            request(RequestStatus::Approved, true, 2),
            request(RequestStatus::Pending, false, 3),
        ];
        let queue = priority_queue(
            &requests,
            SortKey::FactoryShipmentDate,
            SortOrder::Asc,
            PRIORITY_QUEUE_LIMIT,
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].status, RequestStatus::Pending);
    }

    #[test]
    fn queue_caps_to_display_window() {
        let requests: Vec<PoRequest> = (0..8)
            .map(|i| request(RequestStatus::Pending, false, i))
            .collect();
        let queue = priority_queue(&requests, SortKey::FactoryShipmentDate, SortOrder::Asc, 5);
        assert_eq!(queue.len(), 5);
    }

    #[test]
    fn queue_ties_break_by_newest_created_first() {
        let mut older = request(RequestStatus::Pending, false, 3);
        older.created_at = Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap();
        older.customer = "Older".into();
        let mut newer = request(RequestStatus::Pending, false, 3);
        newer.created_at = Utc.with_ymd_and_hms(2026, 8, 15, 9, 0, 0).unwrap();
        newer.customer = "Newer".into();

        let requests = vec![older, newer];
        let queue = priority_queue(
            &requests,
            SortKey::FactoryShipmentDate,
            SortOrder::Asc,
            PRIORITY_QUEUE_LIMIT,
        );
        assert_eq!(queue[0].customer, "Newer");
    }

    #[test]
    fn queue_sorts_by_priority_rank() {
        let mut urgent = request(RequestStatus::Pending, false, 10);
        urgent.priority = Priority::Urgent;
        let mut low = request(RequestStatus::Pending, false, 1);
        low.priority = Priority::Low;
        let normal = request(RequestStatus::Pending, false, 5);

        let requests = vec![low.clone(), normal, urgent];
        let queue = priority_queue(&requests, SortKey::Priority, SortOrder::Asc, 5);
        assert_eq!(queue[0].priority, Priority::Urgent);
        assert_eq!(queue[2].priority, Priority::Low);
    }

    #[test]
    fn search_is_case_insensitive_over_fixed_fields() {
        let r = request(RequestStatus::Pending, false, 1);
        assert!(matches_search(&r, "acme"));
        assert!(matches_search(&r, "SALES"));
        assert!(matches_search(&r, "so-100"));
        assert!(!matches_search(&r, "other co"));
        assert!(matches_search(&r, ""));
    }

    #[test]
    fn priority_entry_carries_urgency() {
        let r = request(RequestStatus::Pending, false, 4);
        let entry = priority_entry(&r, base_date());
        assert_eq!(entry.days_left, 4);
        assert_eq!(entry.urgency, UrgencyLevel::Urgent);
    }
}
