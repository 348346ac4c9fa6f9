use actix_web::{HttpResponse, web};
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::{MySql, MySqlPool};
use tracing::{debug, info, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::{auth::AuthUser, password::MIN_PASSWORD_LEN, password::hash_password, username_registry},
    error::{ApiError, ApiResult},
    model::{
        employee::{Employee, EmployeeStatus},
        leave::{LeaveStatus, LeaveType},
        role::Role,
    },
    utils::db_utils::{SqlFilter, bind_query_as, bind_query_scalar, build_update_sql, execute_update, page_bounds},
};

const EMPLOYEE_COLUMNS: &str = "id, employee_code, first_name, last_name, email, phone, department_id, \
     job_title_id, manager_id, hire_date, status, termination_date, termination_reason";

/// Columns HR may change through the generic update endpoint.
const UPDATABLE_COLUMNS: &[&str] = &[
    "employee_code",
    "first_name",
    "last_name",
    "email",
    "phone",
    "department_id",
    "job_title_id",
    "manager_id",
    "hire_date",
];

#[derive(Deserialize, ToSchema)]
pub struct CreateLogin {
    #[schema(example = "jdoe")]
    pub username: String,
    pub password: String,
    /// 2 = hr, 3 = employee; admin may also grant 1
    #[schema(example = 3)]
    pub role_id: Option<u8>,
}

#[derive(Deserialize, ToSchema)]
pub struct SalaryInput {
    #[schema(example = 15000.0)]
    pub basic: f64,
    #[schema(example = 6000.0)]
    pub hra: Option<f64>,
    #[schema(example = 4000.0)]
    pub special_allowance: Option<f64>,
    #[schema(example = 0.0)]
    pub other_allowance: Option<f64>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "John")]
    pub first_name: String,
    #[schema(example = "Doe")]
    pub last_name: String,
    #[schema(example = "john@email.com", format = "email")]
    pub email: String,
    pub phone: Option<String>,
    #[schema(example = 1)]
    pub department_id: u64,
    #[schema(example = 2)]
    pub job_title_id: u64,
    pub manager_id: Option<u64>,
    #[schema(example = "2026-01-01", value_type = String, format = "date")]
    pub hire_date: NaiveDate,
    /// Optional login account linked to the new employee
    pub login: Option<CreateLogin>,
    /// Optional initial salary structure
    pub salary: Option<SalaryInput>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department_id: Option<u64>,
    pub job_title_id: Option<u64>,
    /// active or terminated
    pub status: Option<String>,
    /// Search by name or email
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 10)]
    pub total: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct TerminateEmployee {
    #[schema(example = "2026-10-31", value_type = String, format = "date")]
    pub termination_date: NaiveDate,
    #[schema(example = "Resigned")]
    pub reason: Option<String>,
}

fn validate_create(payload: &CreateEmployee) -> ApiResult<()> {
    if payload.employee_code.trim().is_empty()
        || payload.first_name.trim().is_empty()
        || payload.last_name.trim().is_empty()
    {
        return Err(ApiError::bad_request(
            "employee_code, first_name and last_name are required",
        ));
    }
    if !payload.email.contains('@') {
        return Err(ApiError::bad_request("email is invalid"));
    }
    if let Some(salary) = &payload.salary {
        validate_salary(salary)?;
    }
    Ok(())
}

fn validate_salary(salary: &SalaryInput) -> ApiResult<()> {
    let parts = [
        Some(salary.basic),
        salary.hra,
        salary.special_allowance,
        salary.other_allowance,
    ];
    if salary.basic <= 0.0 || parts.iter().flatten().any(|v| *v < 0.0 || !v.is_finite()) {
        return Err(ApiError::bad_request(
            "basic must be positive and allowances non-negative",
        ));
    }
    Ok(())
}

/// Which role a caller may grant to a new login.
fn grantable_role(caller: &AuthUser, requested: Option<u8>) -> ApiResult<Role> {
    let role = match requested {
        None => Role::Employee,
        Some(id) => Role::from_id(id).ok_or_else(|| ApiError::bad_request("Unknown role_id"))?,
    };
    match role {
        Role::Employee | Role::Hr => Ok(role),
        Role::Admin if caller.role == Role::Admin => Ok(role),
        _ => Err(ApiError::forbidden("Not allowed to grant this role")),
    }
}

pub(crate) async fn fetch_employee<'c, E>(executor: E, employee_id: u64) -> ApiResult<Employee>
where
    E: sqlx::Executor<'c, Database = MySql>,
{
    sqlx::query_as::<_, Employee>(&format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?"))
        .bind(employee_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found"))
}

pub(crate) async fn upsert_salary<'c, E>(
    executor: E,
    employee_id: u64,
    salary: &SalaryInput,
) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'c, Database = MySql>,
{
    sqlx::query(
        r#"
        INSERT INTO salary_structures (employee_id, basic, hra, special_allowance, other_allowance)
        VALUES (?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            basic = VALUES(basic),
            hra = VALUES(hra),
            special_allowance = VALUES(special_allowance),
            other_allowance = VALUES(other_allowance)
        "#,
    )
    .bind(employee_id)
    .bind(salary.basic)
    .bind(salary.hra.unwrap_or(0.0))
    .bind(salary.special_allowance.unwrap_or(0.0))
    .bind(salary.other_allowance.unwrap_or(0.0))
    .execute(executor)
    .await?;
    Ok(())
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employee",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Object, example = json!({
            "message": "Employee created successfully", "id": 12
        })),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Duplicate code, email or username")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
#[instrument(name = "employee_create", skip_all, fields(code = %payload.employee_code))]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> ApiResult {
    auth.require_hr_or_admin()?;
    validate_create(&payload)?;

    // Everything fallible outside the database happens before BEGIN.
    let login = match &payload.login {
        Some(login) => {
            let username = username_registry::normalize(&login.username);
            if username.is_empty() || login.password.len() < MIN_PASSWORD_LEN {
                return Err(ApiError::bad_request(format!(
                    "login needs a username and a password of at least {MIN_PASSWORD_LEN} characters"
                )));
            }
            let role = grantable_role(&auth, login.role_id)?;
            if !username_registry::is_available(&username, pool.get_ref()).await? {
                return Err(ApiError::conflict("Username already taken"));
            }
            let hashed = hash_password(&login.password).map_err(|e| {
                tracing::error!(error = %e, "Password hashing failed");
                ApiError::Internal
            })?;
            Some((username, hashed, role))
        }
        None => None,
    };

    let mut tx = pool.begin().await?;

    let employee_id = sqlx::query(
        r#"
        INSERT INTO employees
        (employee_code, first_name, last_name, email, phone, department_id, job_title_id, manager_id, hire_date)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_code.trim())
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(payload.email.trim())
    .bind(payload.phone.as_deref())
    .bind(payload.department_id)
    .bind(payload.job_title_id)
    .bind(payload.manager_id)
    .bind(payload.hire_date)
    .execute(&mut *tx)
    .await?
    .last_insert_id();

    if let Some((username, hashed, role)) = &login {
        sqlx::query("INSERT INTO users (username, password, role_id, employee_id) VALUES (?, ?, ?, ?)")
            .bind(username)
            .bind(hashed)
            .bind(role.id())
            .bind(employee_id)
            .execute(&mut *tx)
            .await?;
    }

    if let Some(salary) = &payload.salary {
        upsert_salary(&mut *tx, employee_id, salary).await?;
    }

    let year = Local::now().year();
    for leave_type in LeaveType::TRACKED {
        sqlx::query(
            "INSERT INTO leave_balances (employee_id, leave_type, year) VALUES (?, ?, ?)",
        )
        .bind(employee_id)
        .bind(leave_type.as_ref())
        .bind(year)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    if let Some((username, _, _)) = &login {
        username_registry::mark_taken(username).await;
    }

    info!(employee_id, with_login = login.is_some(), "Employee created");

    Ok(HttpResponse::Created().json(json!({
        "message": "Employee created successfully",
        "id": employee_id
    })))
}

#[utoipa::path(
    get,
    path = "/api/employee",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> ApiResult {
    auth.require_hr_or_admin()?;

    let bounds = page_bounds(query.page, query.per_page, 20);

    let mut filter = SqlFilter::new();
    filter
        .eq("department_id", query.department_id)
        .eq("job_title_id", query.job_title_id)
        .eq("status", query.status.clone());

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let like = format!("%{}%", search);
        filter.push(
            "(first_name LIKE ? OR last_name LIKE ? OR email LIKE ?)",
            vec![like.clone().into(), like.clone().into(), like.into()],
        );
    }
    let where_sql = filter.where_sql();

    let count_sql = format!("SELECT COUNT(*) FROM employees{}", where_sql);
    debug!(sql = %count_sql, "Counting employees");
    let total = bind_query_scalar(sqlx::query_scalar::<_, i64>(&count_sql), &filter.values)
        .fetch_one(pool.get_ref())
        .await?;

    let data_sql = format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees{} ORDER BY id DESC LIMIT ? OFFSET ?",
        where_sql
    );
    let employees = bind_query_as(sqlx::query_as::<_, Employee>(&data_sql), &filter.values)
        .bind(bounds.per_page)
        .bind(bounds.offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page: bounds.page,
        per_page: bounds.per_page,
        total,
    }))
}

#[utoipa::path(
    get,
    path = "/api/employee/me",
    responses(
        (status = 200, description = "Own employee profile", body = Employee),
        (status = 403, description = "No employee profile")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_my_profile(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult {
    let employee_id = auth.require_employee_profile()?;
    let employee = fetch_employee(pool.get_ref(), employee_id).await?;
    Ok(HttpResponse::Ok().json(employee))
}

#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult {
    let employee_id = path.into_inner();
    auth.require_access_to(employee_id)?;

    let employee = fetch_employee(pool.get_ref(), employee_id).await?;
    Ok(HttpResponse::Ok().json(employee))
}

/// Partial update from a JSON object
#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body(content = Object, description = "Any subset of the updatable employee columns"),
    responses(
        (status = 200, description = "Employee updated"),
        (status = 400, description = "Unknown or invalid field"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> ApiResult {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();

    let update = build_update_sql("employees", &body, UPDATABLE_COLUMNS, "id", employee_id)?;

    // rows_affected is 0 both for a missing id and for an unchanged row.
    fetch_employee(pool.get_ref(), employee_id).await?;
    execute_update(pool.get_ref(), &update).await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Employee updated successfully" })))
}

#[utoipa::path(
    delete,
    path = "/api/employee/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    let result = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Employee not found"));
    }

    info!(employee_id, "Employee deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

/// Terminate an employee and close every open door in one transaction.
#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}/terminate",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body = TerminateEmployee,
    responses(
        (status = 200, description = "Employee terminated"),
        (status = 400, description = "Already terminated"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
#[instrument(name = "employee_terminate", skip(auth, pool, body), fields(by = auth.user_id))]
pub async fn terminate_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<TerminateEmployee>,
) -> ApiResult {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();
    let reason = super::optional_text(&body.reason, 500)?;

    let mut tx = pool.begin().await?;

    let status = sqlx::query_scalar::<_, String>("SELECT status FROM employees WHERE id = ? FOR UPDATE")
        .bind(employee_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Employee not found"))?;

    if status == EmployeeStatus::Terminated.as_ref() {
        return Err(ApiError::bad_request("Employee is already terminated"));
    }

    sqlx::query(
        "UPDATE employees SET status = ?, termination_date = ?, termination_reason = ? WHERE id = ?",
    )
    .bind(EmployeeStatus::Terminated.as_ref())
    .bind(body.termination_date)
    .bind(reason)
    .bind(employee_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE refresh_tokens rt
        JOIN users u ON u.id = rt.user_id
        SET rt.revoked = 1
        WHERE u.employee_id = ?
        "#,
    )
    .bind(employee_id)
    .execute(&mut *tx)
    .await?;

    let deactivated = sqlx::query("UPDATE users SET is_active = 0 WHERE employee_id = ?")
        .bind(employee_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let closed_leaves = sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?, review_note = 'Employee terminated', reviewed_by = ?, reviewed_at = NOW()
        WHERE employee_id = ? AND status = ?
        "#,
    )
    .bind(LeaveStatus::Rejected.as_ref())
    .bind(auth.user_id)
    .bind(employee_id)
    .bind(LeaveStatus::Pending.as_ref())
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;

    info!(employee_id, deactivated, closed_leaves, "Employee terminated");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Employee terminated",
        "deactivated_users": deactivated,
        "rejected_leave_requests": closed_leaves
    })))
}

#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}/salary",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Salary structure", body = SalaryStructure),
        (status = 404, description = "No salary structure")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_salary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult {
    let employee_id = path.into_inner();
    auth.require_access_to(employee_id)?;

    let salary = crate::api::payroll::fetch_salary(pool.get_ref(), employee_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No salary structure for this employee"))?;

    Ok(HttpResponse::Ok().json(salary))
}

#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}/salary",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body = SalaryInput,
    responses(
        (status = 200, description = "Salary structure saved"),
        (status = 400, description = "Invalid amounts"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn put_salary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<SalaryInput>,
) -> ApiResult {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();
    validate_salary(&body)?;

    fetch_employee(pool.get_ref(), employee_id).await?;
    upsert_salary(pool.get_ref(), employee_id, &body).await?;

    info!(employee_id, by = auth.user_id, "Salary structure saved");
    Ok(HttpResponse::Ok().json(json!({ "message": "Salary structure saved" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::auth::tests::user;

    fn salary(basic: f64, hra: Option<f64>) -> SalaryInput {
        SalaryInput {
            basic,
            hra,
            special_allowance: None,
            other_allowance: None,
        }
    }

    #[test]
    fn salary_amounts_are_validated() {
        assert!(validate_salary(&salary(15_000.0, Some(5_000.0))).is_ok());
        assert!(validate_salary(&salary(0.0, None)).is_err());
        assert!(validate_salary(&salary(15_000.0, Some(-1.0))).is_err());
        assert!(validate_salary(&salary(f64::NAN, None)).is_err());
    }

    #[test]
    fn only_admins_grant_admin() {
        let hr = user(Role::Hr, 2, None);
        let admin = user(Role::Admin, 1, None);

        assert_eq!(grantable_role(&hr, None).unwrap(), Role::Employee);
        assert_eq!(grantable_role(&hr, Some(2)).unwrap(), Role::Hr);
        assert!(matches!(grantable_role(&hr, Some(1)), Err(ApiError::Forbidden(_))));
        assert_eq!(grantable_role(&admin, Some(1)).unwrap(), Role::Admin);
        assert!(grantable_role(&admin, Some(4)).is_err());
        assert!(matches!(grantable_role(&admin, Some(9)), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn update_allow_list_excludes_status() {
        assert!(!UPDATABLE_COLUMNS.contains(&"status"));
        assert!(!UPDATABLE_COLUMNS.contains(&"id"));
    }
}
