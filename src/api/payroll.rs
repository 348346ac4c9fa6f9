use std::collections::HashSet;

use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySql, MySqlPool};
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::employee::fetch_employee,
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::{
        attendance::ApprovalStatus,
        employee::{Employee, EmployeeStatus},
        leave::{LeaveStatus, LeaveType},
        payroll::{Payroll, PayrollStatus},
        salary::SalaryStructure,
    },
    utils::{
        calendar::{load_holidays, month_bounds, month_key, parse_month, working_days},
        db_utils::{SqlFilter, bind_query_as, bind_query_scalar, page_bounds},
        payroll_calc::{PayBreakdown, PayInputs, compute},
    },
};

pub(crate) const PAYROLL_COLUMNS: &str = "id, employee_id, month, working_days, payable_days, basic, hra, \
     special_allowance, other_allowance, bonus, gross, pf, esi, professional_tax, tds, \
     other_deductions, total_deductions, net_salary, status";

#[derive(Deserialize, ToSchema)]
pub struct CreatePayroll {
    #[schema(example = 1001)]
    pub employee_id: u64,

    #[schema(example = "2026-09")]
    pub month: String,

    #[schema(example = 5000.0)]
    pub bonus: Option<f64>,

    #[schema(example = 2000.0)]
    pub deductions: Option<f64>,
}

#[derive(Deserialize, ToSchema)]
pub struct RunPayroll {
    #[schema(example = "2026-09")]
    pub month: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdatePayroll {
    #[schema(example = 6000.0)]
    pub bonus: Option<f64>,

    #[schema(example = 2500.0)]
    pub deductions: Option<f64>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct PayrollQuery {
    #[schema(example = 1)]
    pub page: Option<u32>,

    #[schema(example = 10)]
    pub per_page: Option<u32>,

    #[schema(example = 1001)]
    pub employee_id: Option<u64>,

    #[schema(example = "2026-09")]
    pub month: Option<String>,

    #[schema(example = "draft")]
    pub status: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedPayrollResponse {
    pub data: Vec<Payroll>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct PayrollRunOutcome {
    #[schema(example = "2026-09")]
    pub month: String,
    pub created: u64,
    /// already generated for this month
    pub skipped: u64,
}

fn validate_adjustments(bonus: Option<f64>, deductions: Option<f64>) -> ApiResult<()> {
    let bad = [bonus, deductions]
        .into_iter()
        .flatten()
        .any(|v| !v.is_finite() || v < 0.0);
    if bad {
        return Err(ApiError::bad_request("bonus and deductions must be zero or more"));
    }
    Ok(())
}

/// Working days of an unpaid leave that fall inside the month.
pub fn unpaid_days_in_month(
    leaves: &[(NaiveDate, NaiveDate, bool)],
    month_days: &[NaiveDate],
) -> f64 {
    leaves
        .iter()
        .map(|(start, end, half_day)| {
            let days = month_days.iter().filter(|d| *d >= start && *d <= end).count() as f64;
            if *half_day { days.min(1.0) * 0.5 } else { days }
        })
        .sum()
}

/// Days the employee was expected at work: the month's working days inside
/// their employment window.
pub fn employed_days(month_days: &[NaiveDate], employee: &Employee) -> Vec<NaiveDate> {
    month_days
        .iter()
        .copied()
        .filter(|d| *d >= employee.hire_date)
        .filter(|d| employee.termination_date.is_none_or(|t| *d <= t))
        .collect()
}

pub fn absent_before(
    expected: &[NaiveDate],
    cutoff: NaiveDate,
    recorded: &HashSet<NaiveDate>,
) -> f64 {
    expected
        .iter()
        .filter(|d| **d <= cutoff && !recorded.contains(d))
        .count() as f64
}

pub(crate) async fn fetch_salary<'c, E>(
    executor: E,
    employee_id: u64,
) -> Result<Option<SalaryStructure>, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = MySql>,
{
    sqlx::query_as::<_, SalaryStructure>(
        r#"
        SELECT employee_id, basic, hra, special_allowance, other_allowance
        FROM salary_structures WHERE employee_id = ?
        "#,
    )
    .bind(employee_id)
    .fetch_optional(executor)
    .await
}

async fn fetch_payroll(pool: &MySqlPool, id: u64) -> ApiResult<Payroll> {
    sqlx::query_as::<_, Payroll>(&format!("SELECT {PAYROLL_COLUMNS} FROM payroll WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Payroll not found"))
}

/// Computes one employee's figures for `month` from salary, attendance and leave.
async fn compute_for(
    pool: &MySqlPool,
    employee_id: u64,
    month: NaiveDate,
    bonus: f64,
    other_deductions: f64,
) -> ApiResult<PayBreakdown> {
    let employee = fetch_employee(pool, employee_id).await?;
    let structure = fetch_salary(pool, employee_id)
        .await?
        .ok_or_else(|| ApiError::bad_request("Employee has no salary structure"))?;

    let (first, last) = month_bounds(month);
    let holidays = load_holidays(pool, first, last).await?;
    let month_days = working_days(first, last, &holidays);
    let expected = employed_days(&month_days, &employee);

    let recorded: HashSet<NaiveDate> = sqlx::query_scalar::<_, NaiveDate>(
        r#"
        SELECT date FROM attendance
        WHERE employee_id = ? AND date BETWEEN ? AND ? AND approval_status = ?
        "#,
    )
    .bind(employee_id)
    .bind(first)
    .bind(last)
    .bind(ApprovalStatus::Approved.as_ref())
    .fetch_all(pool)
    .await?
    .into_iter()
    .collect();

    let unpaid = sqlx::query_as::<_, (NaiveDate, NaiveDate, bool)>(
        r#"
        SELECT start_date, end_date, half_day FROM leave_requests
        WHERE employee_id = ? AND leave_type = ? AND status = ?
          AND start_date <= ? AND end_date >= ?
        "#,
    )
    .bind(employee_id)
    .bind(LeaveType::Unpaid.as_ref())
    .bind(LeaveStatus::Approved.as_ref())
    .bind(last)
    .bind(first)
    .fetch_all(pool)
    .await?;

    let cutoff = last.min(Local::now().date_naive());
    let inputs = PayInputs {
        working_days: month_days.len() as f64,
        unpaid_leave_days: unpaid_days_in_month(&unpaid, &expected),
        // Days outside the employment window are unpaid as well.
        absent_days: absent_before(&expected, cutoff, &recorded)
            + (month_days.len() - expected.len()) as f64,
        bonus,
        other_deductions,
    };

    Ok(compute(&structure, &inputs))
}

/// Generates a draft payroll; an existing one for the month is a conflict.
pub(crate) async fn generate_payroll(
    pool: &MySqlPool,
    employee_id: u64,
    month: NaiveDate,
    bonus: f64,
    other_deductions: f64,
) -> ApiResult<u64> {
    let exists = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM payroll WHERE employee_id = ? AND month = ?",
    )
    .bind(employee_id)
    .bind(month)
    .fetch_one(pool)
    .await?;
    if exists > 0 {
        return Err(ApiError::conflict(format!(
            "Payroll for {} already exists",
            month_key(month)
        )));
    }

    let pay = compute_for(pool, employee_id, month, bonus, other_deductions).await?;

    let id = sqlx::query(
        r#"
        INSERT INTO payroll
        (employee_id, month, working_days, payable_days, basic, hra, special_allowance,
         other_allowance, bonus, gross, pf, esi, professional_tax, tds, other_deductions,
         total_deductions, net_salary, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(month)
    .bind(pay.working_days)
    .bind(pay.payable_days)
    .bind(pay.basic)
    .bind(pay.hra)
    .bind(pay.special_allowance)
    .bind(pay.other_allowance)
    .bind(pay.bonus)
    .bind(pay.gross)
    .bind(pay.pf)
    .bind(pay.esi)
    .bind(pay.professional_tax)
    .bind(pay.tds)
    .bind(pay.other_deductions)
    .bind(pay.total_deductions)
    .bind(pay.net_salary)
    .bind(PayrollStatus::Draft.as_ref())
    .execute(pool)
    .await?
    .last_insert_id();

    Ok(id)
}

/// Generates payroll for every active employee with a salary structure.
pub(crate) async fn run_for_month(pool: &MySqlPool, month: NaiveDate) -> ApiResult<PayrollRunOutcome> {
    let employee_ids = sqlx::query_scalar::<_, u64>(
        r#"
        SELECT e.id FROM employees e
        JOIN salary_structures s ON s.employee_id = e.id
        WHERE e.status = ?
        ORDER BY e.id
        "#,
    )
    .bind(EmployeeStatus::Active.as_ref())
    .fetch_all(pool)
    .await?;

    let mut outcome = PayrollRunOutcome {
        month: month_key(month),
        ..Default::default()
    };

    for employee_id in employee_ids {
        match generate_payroll(pool, employee_id, month, 0.0, 0.0).await {
            Ok(_) => outcome.created += 1,
            Err(ApiError::Conflict(_)) => outcome.skipped += 1,
            Err(e) => {
                warn!(employee_id, error = %e, "Payroll generation failed");
                return Err(e);
            }
        }
    }

    Ok(outcome)
}

#[utoipa::path(
    post,
    path = "/api/payroll",
    request_body = CreatePayroll,
    responses(
        (status = 201, description = "Payroll created", body = Object, example = json!({
            "message": "Payroll created", "id": 1
        })),
        (status = 400, description = "No salary structure or malformed month"),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Payroll already exists for that month")
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
#[instrument(name = "payroll_create", skip_all, fields(employee_id = payload.employee_id, month = %payload.month))]
pub async fn create_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreatePayroll>,
) -> ApiResult {
    auth.require_hr_or_admin()?;
    validate_adjustments(payload.bonus, payload.deductions)?;
    let month = parse_month(&payload.month)?;

    let id = generate_payroll(
        pool.get_ref(),
        payload.employee_id,
        month,
        payload.bonus.unwrap_or(0.0),
        payload.deductions.unwrap_or(0.0),
    )
    .await?;

    info!(id, "Payroll created");
    Ok(HttpResponse::Created().json(json!({ "message": "Payroll created", "id": id })))
}

#[utoipa::path(
    post,
    path = "/api/payroll/run",
    request_body = RunPayroll,
    responses(
        (status = 200, description = "Payroll generated for all eligible employees", body = PayrollRunOutcome),
        (status = 400, description = "Malformed month"),
        (status = 403, description = "HR/Admin only")
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
#[instrument(name = "payroll_run", skip_all, fields(month = %payload.month))]
pub async fn run_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<RunPayroll>,
) -> ApiResult {
    auth.require_hr_or_admin()?;
    let month = parse_month(&payload.month)?;

    let outcome = run_for_month(pool.get_ref(), month).await?;
    info!(created = outcome.created, skipped = outcome.skipped, "Payroll run finished");

    Ok(HttpResponse::Ok().json(outcome))
}

#[utoipa::path(
    put,
    path = "/api/payroll/{payroll_id}",
    params(("payroll_id" = u64, Path, description = "Payroll ID")),
    request_body = UpdatePayroll,
    responses(
        (status = 200, description = "Payroll recomputed", body = Payroll),
        (status = 400, description = "Payroll is finalized"),
        (status = 404, description = "Payroll not found")
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn update_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdatePayroll>,
) -> ApiResult {
    auth.require_hr_or_admin()?;
    validate_adjustments(payload.bonus, payload.deductions)?;
    let id = path.into_inner();

    let current = fetch_payroll(pool.get_ref(), id).await?;
    if current.status != PayrollStatus::Draft.as_ref() {
        return Err(ApiError::bad_request("Only draft payroll can be updated"));
    }

    let pay = compute_for(
        pool.get_ref(),
        current.employee_id,
        current.month,
        payload.bonus.unwrap_or(current.bonus),
        payload.deductions.unwrap_or(current.other_deductions),
    )
    .await?;

    let result = sqlx::query(
        r#"
        UPDATE payroll SET
            working_days = ?, payable_days = ?, basic = ?, hra = ?, special_allowance = ?,
            other_allowance = ?, bonus = ?, gross = ?, pf = ?, esi = ?, professional_tax = ?,
            tds = ?, other_deductions = ?, total_deductions = ?, net_salary = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(pay.working_days)
    .bind(pay.payable_days)
    .bind(pay.basic)
    .bind(pay.hra)
    .bind(pay.special_allowance)
    .bind(pay.other_allowance)
    .bind(pay.bonus)
    .bind(pay.gross)
    .bind(pay.pf)
    .bind(pay.esi)
    .bind(pay.professional_tax)
    .bind(pay.tds)
    .bind(pay.other_deductions)
    .bind(pay.total_deductions)
    .bind(pay.net_salary)
    .bind(id)
    .bind(PayrollStatus::Draft.as_ref())
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        // finalized between the read and the write
        return Err(ApiError::bad_request("Only draft payroll can be updated"));
    }

    Ok(HttpResponse::Ok().json(fetch_payroll(pool.get_ref(), id).await?))
}

#[utoipa::path(
    put,
    path = "/api/payroll/{payroll_id}/finalize",
    params(("payroll_id" = u64, Path, description = "Payroll ID")),
    responses(
        (status = 200, description = "Payroll finalized"),
        (status = 400, description = "Already finalized"),
        (status = 404, description = "Payroll not found")
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn finalize_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();

    let result = sqlx::query(
        "UPDATE payroll SET status = ?, finalized_at = NOW() WHERE id = ? AND status = ?",
    )
    .bind(PayrollStatus::Finalized.as_ref())
    .bind(id)
    .bind(PayrollStatus::Draft.as_ref())
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        fetch_payroll(pool.get_ref(), id).await?;
        return Err(ApiError::bad_request("Payroll is already finalized"));
    }

    info!(id, by = auth.user_id, "Payroll finalized");
    Ok(HttpResponse::Ok().json(json!({ "message": "Payroll finalized", "id": id })))
}

#[utoipa::path(
    get,
    path = "/api/payroll/{payroll_id}",
    params(("payroll_id" = u64, Path, description = "Payroll ID")),
    responses(
        (status = 200, description = "Payroll found", body = Payroll),
        (status = 404, description = "Payroll not found")
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn get_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult {
    auth.require_hr_or_admin()?;
    let payroll = fetch_payroll(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(payroll))
}

#[utoipa::path(
    get,
    path = "/api/payroll",
    params(PayrollQuery),
    responses(
        (status = 200, description = "Paginated payroll list", body = PaginatedPayrollResponse),
        (status = 403, description = "HR/Admin only")
    ),
    tag = "Payroll",
    security(("bearer_auth" = []))
)]
pub async fn list_payrolls(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollQuery>,
) -> ApiResult {
    auth.require_hr_or_admin()?;
    let bounds = page_bounds(query.page, query.per_page, 10);

    let month = query.month.as_deref().map(parse_month).transpose()?;

    let mut filter = SqlFilter::new();
    filter
        .eq("employee_id", query.employee_id)
        .eq("month", month)
        .eq("status", query.status.clone());
    let where_sql = filter.where_sql();

    let total = bind_query_scalar(
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM payroll{where_sql}")),
        &filter.values,
    )
    .fetch_one(pool.get_ref())
    .await?;

    let sql = format!(
        "SELECT {PAYROLL_COLUMNS} FROM payroll{where_sql} ORDER BY month DESC, employee_id LIMIT ? OFFSET ?"
    );
    let data = bind_query_as(sqlx::query_as::<_, Payroll>(&sql), &filter.values)
        .bind(bounds.per_page)
        .bind(bounds.offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(PaginatedPayrollResponse {
        data,
        page: bounds.page,
        per_page: bounds.per_page,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
    }

    fn employee(hire: NaiveDate, terminated: Option<NaiveDate>) -> Employee {
        Employee {
            id: 1,
            employee_code: "EMP-001".into(),
            first_name: "Ada".into(),
            last_name: "Khan".into(),
            email: "ada@example.com".into(),
            phone: None,
            department_id: 1,
            job_title_id: 1,
            manager_id: None,
            hire_date: hire,
            status: "active".into(),
            termination_date: terminated,
            termination_reason: None,
        }
    }

    #[test]
    fn unpaid_leave_is_clipped_to_the_month() {
        let month_days = vec![d(1), d(2), d(5), d(6)];
        let leaves = vec![
            (NaiveDate::from_ymd_opt(2026, 9, 28).unwrap(), d(1), false),
            (d(6), d(6), true),
        ];
        assert_eq!(unpaid_days_in_month(&leaves, &month_days), 1.5);
    }

    #[test]
    fn absences_stop_at_the_cutoff() {
        let expected = vec![d(1), d(2), d(5), d(6)];
        let recorded: HashSet<_> = [d(1)].into_iter().collect();
        assert_eq!(absent_before(&expected, d(5), &recorded), 2.0);
    }

    #[test]
    fn employment_window_limits_expected_days() {
        let month_days = vec![d(1), d(2), d(5), d(6), d(7)];
        let mid_month = employee(d(5), Some(d(6)));
        assert_eq!(employed_days(&month_days, &mid_month), vec![d(5), d(6)]);

        let veteran = employee(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), None);
        assert_eq!(employed_days(&month_days, &veteran).len(), 5);
    }

    #[test]
    fn negative_adjustments_are_rejected() {
        assert!(validate_adjustments(Some(10.0), None).is_ok());
        assert!(validate_adjustments(None, Some(-1.0)).is_err());
    }
}
