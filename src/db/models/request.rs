// src/db/models/request.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Whether the request touches an existing purchase order or asks for a new one.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "request_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    ExistingOrderChange,
    NewOrderAddition,
}

/// Categories mirror the request form. Schedule and shipping-method changes
/// carry no line items; every other category requires at least one.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "request_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestCategory {
    ProductAddition,
    MaterialAddition,
    ProductRemoval,
    MaterialRemoval,
    ItemCodeChange,
    ScheduleChange,
    ShippingMethodChange,
}

impl RequestCategory {
    /// Schedule-only / shipping-method-only changes do not reference items.
    pub fn is_itemless(self) -> bool {
        matches!(
            self,
            RequestCategory::ScheduleChange | RequestCategory::ShippingMethodChange
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "priority_level", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Urgent,
    Normal,
    Low,
}

impl Priority {
    /// Sort rank: urgent requests come first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Urgent => 0,
            Priority::Normal => 1,
            Priority::Low => 2,
        }
    }
}

/// Reviewer's approve-or-reject judgment, distinct from workflow `status`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "feasibility_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Feasibility {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    InReview,
    Approved,
    Rejected,
    Completed,
}

/// One (item code, item name, quantity-delta) tuple. Quantity may be negative
/// or zero; it is a delta against the order, not an absolute count.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, ToSchema)]
pub struct LineItem {
    pub item_code: String,
    pub item_name: String,
    pub quantity: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, ToSchema)]
pub struct PoRequest {
    pub id: Uuid,
    pub request_type: RequestType,
    pub category_of_request: RequestCategory,
    pub priority: Priority,
    pub request_date: NaiveDate,
    pub so_number: Option<String>,
    pub customer: String,
    pub requesting_dept: String,
    pub requester_id: Uuid,
    pub requester_name: String,
    /// Current shipment date the request is measured against. For new-order
    /// requests this is seeded from the desired date at creation.
    pub factory_shipment_date: NaiveDate,
    pub desired_shipment_date: Option<NaiveDate>,
    /// Set by the reviewing department once a schedule is committed.
    pub confirmed_shipment_date: Option<NaiveDate>,
    pub leadtime: Option<i32>,
    pub shipping_method: Option<String>,
    #[schema(value_type = Vec<LineItem>)]
    pub items: Json<Vec<LineItem>>,
    pub reason_for_request: String,
    pub request_details: String,
    pub feasibility: Option<Feasibility>,
    pub review_details: Option<String>,
    pub reviewing_dept: Option<String>,
    pub reviewer_id: Option<Uuid>,
    pub reviewer_name: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub status: RequestStatus,
    /// Admin-controlled flag, independent of `status`.
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Draft submitted by a requester. Party and bookkeeping fields are derived
/// server-side from the authenticated actor.
#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct NewPoRequest {
    pub request_type: RequestType,
    pub category_of_request: RequestCategory,
    pub priority: Priority,
    pub customer: String,
    #[serde(default)]
    pub so_number: Option<String>,
    #[serde(default)]
    pub factory_shipment_date: Option<NaiveDate>,
    #[serde(default)]
    pub desired_shipment_date: Option<NaiveDate>,
    #[serde(default)]
    pub shipping_method: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    pub reason_for_request: String,
    pub request_details: String,
}

/// Owner-editable subset. Review fields are deliberately absent; those go
/// through the review endpoint.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePoRequest {
    pub customer: Option<String>,
    pub so_number: Option<String>,
    pub factory_shipment_date: Option<NaiveDate>,
    pub desired_shipment_date: Option<NaiveDate>,
    pub category_of_request: Option<RequestCategory>,
    pub priority: Option<Priority>,
    pub shipping_method: Option<String>,
    pub items: Option<Vec<LineItem>>,
    pub reason_for_request: Option<String>,
    pub request_details: Option<String>,
}

/// Reviewer verdict on a request.
#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct ReviewDecision {
    pub feasibility: Feasibility,
    pub review_details: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CompletedUpdate {
    pub completed: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmedDateUpdate {
    pub confirmed_shipment_date: NaiveDate,
    #[serde(default)]
    pub leadtime: Option<i32>,
}

/// Sortable columns, whitelisted so user input never reaches SQL directly.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    RequestDate,
    FactoryShipmentDate,
    CreatedAt,
    SoNumber,
    Customer,
    Priority,
}

impl SortKey {
    pub fn column(self) -> &'static str {
        match self {
            SortKey::RequestDate => "request_date",
            SortKey::FactoryShipmentDate => "factory_shipment_date",
            SortKey::CreatedAt => "created_at",
            SortKey::SoNumber => "so_number",
            SortKey::Customer => "customer",
            SortKey::Priority => "priority",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Query parameters accepted by the list/export endpoints.
#[derive(Debug, Deserialize, Default, IntoParams)]
pub struct ListParams {
    /// Case-insensitive substring search over customer, requesting
    /// department, requester name and SO number.
    pub q: Option<String>,
    pub request_type: Option<RequestType>,
    pub status: Option<RequestStatus>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub sort: Option<SortKey>,
    pub order: Option<SortOrder>,
}

#[derive(Debug, Deserialize, Default, IntoParams)]
pub struct PriorityParams {
    pub sort: Option<SortKey>,
    pub order: Option<SortOrder>,
    /// Display window size; the remainder is reachable via the full list.
    pub limit: Option<usize>,
}

/// Dashboard counters over the caller's visible, non-deleted request set.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, ToSchema)]
pub struct DashboardStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub completed: usize,
}

/// Urgency banding derived from days-left until shipment.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Urgent,
    Normal,
    Low,
}

/// One row of the "needs attention" queue shown on the dashboard.
#[derive(Debug, Serialize, ToSchema)]
pub struct PriorityEntry {
    pub id: Uuid,
    pub urgency: UrgencyLevel,
    pub so_number: Option<String>,
    pub customer: String,
    pub category_of_request: RequestCategory,
    pub shipment_date: NaiveDate,
    pub days_left: i64,
    pub status: RequestStatus,
    pub priority: Priority,
}
