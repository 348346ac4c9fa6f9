use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Display, EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Annual,
    Sick,
    Casual,
    Unpaid,
}

impl LeaveType {
    /// Types that draw from a balance; unpaid leave is loss of pay instead.
    pub const TRACKED: [LeaveType; 3] = [LeaveType::Annual, LeaveType::Sick, LeaveType::Casual];

    pub fn is_tracked(self) -> bool {
        self != LeaveType::Unpaid
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveRequest {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-07", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[schema(example = "sick")]
    pub leave_type: String,
    pub half_day: bool,
    /// working days charged for this request
    #[schema(example = 3.0)]
    pub days: f64,
    pub reason: Option<String>,
    #[schema(example = "pending")]
    pub status: String,
    pub recipient_id: Option<u64>,
    pub reviewed_by: Option<u64>,
    pub review_note: Option<String>,
    #[schema(example = "2026-01-01T00:00:00Z", value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveBalance {
    pub employee_id: u64,
    #[schema(example = "annual")]
    pub leave_type: String,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 15.0)]
    pub allocated: f64,
    #[schema(example = 3.0)]
    pub used: f64,
    #[schema(example = 12.0)]
    pub balance: f64,
}
