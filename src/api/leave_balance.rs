use actix_web::{HttpResponse, web};
use chrono::{Datelike, Local};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::leave::{LeaveBalance, LeaveType},
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BalanceQuery {
    /// Defaults to the current year
    #[param(example = 2026)]
    pub year: Option<i32>,
}

#[derive(Deserialize, ToSchema)]
pub struct AdjustBalance {
    #[schema(example = "annual")]
    pub leave_type: LeaveType,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 12.5)]
    pub balance: f64,
}

fn validate_adjustment(body: &AdjustBalance) -> ApiResult<()> {
    if !body.leave_type.is_tracked() {
        return Err(ApiError::bad_request("Unpaid leave has no balance"));
    }
    if !body.balance.is_finite() || body.balance < 0.0 {
        return Err(ApiError::bad_request("balance must be zero or more"));
    }
    if !(2000..=2100).contains(&body.year) {
        return Err(ApiError::bad_request("year is out of range"));
    }
    Ok(())
}

async fn balances_for(pool: &MySqlPool, employee_id: u64, year: i32) -> ApiResult<Vec<LeaveBalance>> {
    let rows = sqlx::query_as::<_, LeaveBalance>(
        r#"
        SELECT employee_id, leave_type, year, allocated, used, balance
        FROM leave_balances
        WHERE employee_id = ? AND year = ?
        ORDER BY leave_type
        "#,
    )
    .bind(employee_id)
    .bind(year)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[utoipa::path(
    get,
    path = "/api/leave/balance/me",
    params(BalanceQuery),
    responses(
        (status = 200, description = "Own leave balances", body = [LeaveBalance]),
        (status = 403, description = "No employee profile")
    ),
    tag = "Leave",
    security(("bearer_auth" = []))
)]
pub async fn my_balance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<BalanceQuery>,
) -> ApiResult {
    let employee_id = auth.require_employee_profile()?;
    let year = query.year.unwrap_or_else(|| Local::now().year());
    Ok(HttpResponse::Ok().json(balances_for(pool.get_ref(), employee_id, year).await?))
}

#[utoipa::path(
    get,
    path = "/api/leave/balance/{employee_id}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        BalanceQuery
    ),
    responses(
        (status = 200, description = "Leave balances", body = [LeaveBalance]),
        (status = 403, description = "Forbidden")
    ),
    tag = "Leave",
    security(("bearer_auth" = []))
)]
pub async fn employee_balance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    query: web::Query<BalanceQuery>,
) -> ApiResult {
    let employee_id = path.into_inner();
    auth.require_access_to(employee_id)?;
    let year = query.year.unwrap_or_else(|| Local::now().year());
    Ok(HttpResponse::Ok().json(balances_for(pool.get_ref(), employee_id, year).await?))
}

/// Manual correction by HR; creates the row when missing.
#[utoipa::path(
    put,
    path = "/api/leave/balance/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body = AdjustBalance,
    responses(
        (status = 200, description = "Balance adjusted"),
        (status = 400, description = "Invalid balance"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Leave",
    security(("bearer_auth" = []))
)]
pub async fn adjust_balance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<AdjustBalance>,
) -> ApiResult {
    auth.require_hr_or_admin()?;
    validate_adjustment(&body)?;
    let employee_id = path.into_inner();

    crate::api::employee::fetch_employee(pool.get_ref(), employee_id).await?;

    sqlx::query(
        r#"
        INSERT INTO leave_balances (employee_id, leave_type, year, balance)
        VALUES (?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE balance = VALUES(balance)
        "#,
    )
    .bind(employee_id)
    .bind(body.leave_type.as_ref())
    .bind(body.year)
    .bind(body.balance)
    .execute(pool.get_ref())
    .await?;

    info!(
        employee_id,
        leave_type = %body.leave_type,
        year = body.year,
        balance = body.balance,
        by = auth.user_id,
        "Leave balance adjusted"
    );

    Ok(HttpResponse::Ok().json(json!({ "message": "Leave balance updated" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjust(leave_type: LeaveType, balance: f64) -> AdjustBalance {
        AdjustBalance {
            leave_type,
            year: 2026,
            balance,
        }
    }

    #[test]
    fn adjustments_are_validated() {
        assert!(validate_adjustment(&adjust(LeaveType::Annual, 0.0)).is_ok());
        assert!(validate_adjustment(&adjust(LeaveType::Sick, 4.5)).is_ok());
        assert!(validate_adjustment(&adjust(LeaveType::Unpaid, 1.0)).is_err());
        assert!(validate_adjustment(&adjust(LeaveType::Casual, -1.0)).is_err());
    }
}
