use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Late,
    HalfDay,
    Leave,
}

/// Shared by attendance, leave and travel expense records.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumString, AsRefStr)]
pub enum AttendanceSource {
    #[strum(serialize = "self")]
    SelfService,
    #[strum(serialize = "request")]
    Request,
    #[strum(serialize = "leave")]
    Leave,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Attendance {
    pub id: u64,
    pub employee_id: u64,
    #[schema(example = "2026-10-19", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "09:12:00", value_type = Option<String>)]
    pub check_in: Option<NaiveTime>,
    #[schema(example = "18:03:00", value_type = Option<String>)]
    pub check_out: Option<NaiveTime>,
    #[schema(example = 8.85)]
    pub worked_hours: Option<f64>,
    #[schema(example = "present")]
    pub status: String,
    #[schema(example = "approved")]
    pub approval_status: String,
    #[schema(example = "self")]
    pub source: String,
    pub recipient_id: Option<u64>,
    pub reason: Option<String>,
    pub leave_id: Option<u64>,
    pub reviewed_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}
