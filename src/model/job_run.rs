use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct JobRun {
    pub id: u64,
    #[schema(example = "leave_allocation")]
    pub job_name: String,
    #[schema(example = "2026-10")]
    pub period: String,
    pub affected: u64,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub completed_at: Option<DateTime<Utc>>,
}
