use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ExpenseStatus {
    Pending,
    Approved,
    Rejected,
    Reimbursed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExpenseCategory {
    Travel,
    Lodging,
    Meals,
    LocalConveyance,
    Other,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct TravelExpense {
    pub id: u64,
    pub employee_id: u64,
    #[schema(example = "Client workshop")]
    pub purpose: String,
    #[schema(example = "Chattogram")]
    pub destination: String,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[schema(example = 12500.0)]
    pub total_amount: f64,
    #[schema(example = "pending")]
    pub status: String,
    pub recipient_id: Option<u64>,
    pub reviewed_by: Option<u64>,
    pub review_note: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct TravelExpenseItem {
    pub id: u64,
    pub expense_id: u64,
    #[schema(example = "lodging")]
    pub category: String,
    pub description: String,
    pub amount: f64,
    #[schema(value_type = String, format = "date")]
    pub expense_date: NaiveDate,
    /// path or URL of the stored receipt
    pub receipt_ref: Option<String>,
}
