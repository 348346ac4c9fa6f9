use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GoalStatus {
    NotStarted,
    InProgress,
    Completed,
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Open,
    Done,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Goal {
    pub id: u64,
    pub employee_id: u64,
    pub title: String,
    pub description: Option<String>,
    #[schema(example = "2026-H2")]
    pub period: String,
    #[schema(example = 40)]
    pub weight: i32,
    #[schema(example = 50)]
    pub progress: i32,
    #[schema(example = "in_progress")]
    pub status: String,
    #[schema(value_type = Option<String>, format = "date")]
    pub due_date: Option<NaiveDate>,
    pub created_by: u64,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct GoalTask {
    pub id: u64,
    pub goal_id: u64,
    pub title: String,
    #[schema(example = "open")]
    pub status: String,
    #[schema(value_type = Option<String>, format = "date")]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Feedback {
    pub id: u64,
    pub employee_id: u64,
    pub reviewer_id: u64,
    #[schema(example = "2026-H2")]
    pub period: String,
    #[schema(example = 4)]
    pub rating: i32,
    pub comments: Option<String>,
}
