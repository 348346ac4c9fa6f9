use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum PayrollStatus {
    Draft,
    Finalized,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Payroll {
    pub id: u64,
    pub employee_id: u64,
    /// first day of the pay month
    #[schema(example = "2026-09-01", value_type = String, format = "date")]
    pub month: NaiveDate,
    pub working_days: f64,
    pub payable_days: f64,
    pub basic: f64,
    pub hra: f64,
    pub special_allowance: f64,
    pub other_allowance: f64,
    pub bonus: f64,
    pub gross: f64,
    pub pf: f64,
    pub esi: f64,
    pub professional_tax: f64,
    pub tds: f64,
    pub other_deductions: f64,
    pub total_deductions: f64,
    pub net_salary: f64,
    #[schema(example = "draft")]
    pub status: String,
}
