use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Monthly salary components for one employee.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct SalaryStructure {
    pub employee_id: u64,
    #[schema(example = 15000.0)]
    pub basic: f64,
    #[schema(example = 6000.0)]
    pub hra: f64,
    #[schema(example = 4000.0)]
    pub special_allowance: f64,
    #[schema(example = 1000.0)]
    pub other_allowance: f64,
}
