use std::collections::HashSet;

use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySqlConnection, MySqlPool};
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::{ApiError, ApiResult},
    model::attendance::{ApprovalStatus, Attendance, AttendanceSource, AttendanceStatus},
    model::role::Role,
    utils::{
        calendar::{load_holidays, month_bounds, month_key, parse_month, working_days},
        db_utils::{SqlFilter, bind_query_as, bind_query_scalar, page_bounds},
        payroll_calc::round2,
    },
};

const ATTENDANCE_COLUMNS: &str = "id, employee_id, date, check_in, check_out, worked_hours, status, \
     approval_status, source, recipient_id, reason, leave_id, reviewed_by, created_at";

#[derive(Deserialize, ToSchema)]
pub struct AttendanceRequest {
    #[schema(example = "2026-10-15", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "09:05:00", value_type = String)]
    pub login_time: NaiveTime,
    #[schema(example = "18:00:00", value_type = String)]
    pub logout_time: NaiveTime,
    /// HR or admin user who should review this request
    pub recipient_id: Option<u64>,
    #[schema(example = "Forgot to check in")]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateRangeQuery {
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    pub employee_id: Option<u64>,
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
    /// present, late, half_day or leave
    pub status: Option<String>,
    /// pending, approved or rejected
    pub approval_status: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<Attendance>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SummaryQuery {
    /// Defaults to the caller's own employee record
    pub employee_id: Option<u64>,
    /// YYYY-MM, defaults to the current month
    #[param(example = "2026-10")]
    pub month: Option<String>,
}

#[derive(Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct AttendanceSummary {
    pub employee_id: u64,
    #[schema(example = "2026-10")]
    pub month: String,
    pub working_days: u32,
    pub present: u32,
    pub late: u32,
    pub half_day: u32,
    pub leave: u32,
    /// working days so far with no approved record
    pub absent: u32,
    pub total_worked_hours: f64,
}

pub fn check_in_status(at: NaiveTime, office_start: NaiveTime) -> AttendanceStatus {
    if at > office_start {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

pub fn worked_hours(check_in: NaiveTime, check_out: NaiveTime) -> f64 {
    let seconds = (check_out - check_in).num_seconds().max(0);
    round2(seconds as f64 / 3600.0)
}

/// Status once the day is closed; short days become half days.
pub fn status_after_checkout(current: &str, hours: f64, half_day_hours: f64) -> String {
    let is_open_day = current == AttendanceStatus::Present.as_ref()
        || current == AttendanceStatus::Late.as_ref();
    if is_open_day && hours < half_day_hours {
        AttendanceStatus::HalfDay.to_string()
    } else {
        current.to_string()
    }
}

fn validate_regularization(req: &AttendanceRequest, today: NaiveDate) -> ApiResult<()> {
    if req.date > today {
        return Err(ApiError::bad_request("Cannot request attendance for a future date"));
    }
    if req.logout_time <= req.login_time {
        return Err(ApiError::bad_request("logout_time must be after login_time"));
    }
    Ok(())
}

/// Counts approved records per status over the month's elapsed working days.
pub fn summarize(
    employee_id: u64,
    month: NaiveDate,
    month_working_days: &[NaiveDate],
    elapsed_working_days: &[NaiveDate],
    records: &[Attendance],
) -> AttendanceSummary {
    let mut summary = AttendanceSummary {
        employee_id,
        month: month_key(month),
        working_days: month_working_days.len() as u32,
        ..Default::default()
    };

    let approved: Vec<&Attendance> = records
        .iter()
        .filter(|r| r.approval_status == ApprovalStatus::Approved.as_ref())
        .collect();

    for record in &approved {
        match record.status.parse::<AttendanceStatus>() {
            Ok(AttendanceStatus::Present) => summary.present += 1,
            Ok(AttendanceStatus::Late) => summary.late += 1,
            Ok(AttendanceStatus::HalfDay) => summary.half_day += 1,
            Ok(AttendanceStatus::Leave) => summary.leave += 1,
            Err(_) => warn!(id = record.id, status = %record.status, "Unknown attendance status"),
        }
        summary.total_worked_hours += record.worked_hours.unwrap_or(0.0);
    }
    summary.total_worked_hours = round2(summary.total_worked_hours);

    let recorded: HashSet<NaiveDate> = approved.iter().map(|r| r.date).collect();
    summary.absent = absent_days(elapsed_working_days, &recorded) as u32;
    summary
}

pub fn absent_days(working: &[NaiveDate], recorded: &HashSet<NaiveDate>) -> usize {
    working.iter().filter(|d| !recorded.contains(d)).count()
}

/// Attendance already on file for one day of an approved leave.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DayRecord {
    pub id: u64,
    pub date: NaiveDate,
    pub approval_status: String,
}

/// Approved rows stay as they are. Pending or rejected rows are taken over
/// by the leave, and days with no row get a new one.
#[derive(Debug, Default, PartialEq)]
pub struct LeaveDayPlan {
    pub insert: Vec<NaiveDate>,
    pub take_over: Vec<u64>,
}

pub fn plan_leave_days(days: &[NaiveDate], existing: &[DayRecord]) -> LeaveDayPlan {
    let mut plan = LeaveDayPlan::default();
    for day in days {
        match existing.iter().find(|r| r.date == *day) {
            None => plan.insert.push(*day),
            Some(r) if r.approval_status == ApprovalStatus::Approved.as_ref() => {}
            Some(r) => plan.take_over.push(r.id),
        }
    }
    plan
}

/// Records an approved `leave` row for each leave day without approved attendance.
pub(crate) async fn synthesize_leave_days(
    conn: &mut MySqlConnection,
    employee_id: u64,
    leave_id: u64,
    days: &[NaiveDate],
) -> Result<u64, sqlx::Error> {
    let (Some(first), Some(last)) = (days.first(), days.last()) else {
        return Ok(0);
    };

    let existing = sqlx::query_as::<_, DayRecord>(
        "SELECT id, date, approval_status FROM attendance \
         WHERE employee_id = ? AND date BETWEEN ? AND ? FOR UPDATE",
    )
    .bind(employee_id)
    .bind(first)
    .bind(last)
    .fetch_all(&mut *conn)
    .await?;

    let plan = plan_leave_days(days, &existing);

    for id in &plan.take_over {
        sqlx::query(
            r#"
            UPDATE attendance
            SET status = ?, approval_status = ?, source = ?, leave_id = ?,
                check_in = NULL, check_out = NULL, worked_hours = NULL
            WHERE id = ?
            "#,
        )
        .bind(AttendanceStatus::Leave.as_ref())
        .bind(ApprovalStatus::Approved.as_ref())
        .bind(AttendanceSource::Leave.as_ref())
        .bind(leave_id)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    }

    for day in &plan.insert {
        sqlx::query(
            r#"
            INSERT INTO attendance (employee_id, date, status, approval_status, source, leave_id)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(employee_id)
        .bind(day)
        .bind(AttendanceStatus::Leave.as_ref())
        .bind(ApprovalStatus::Approved.as_ref())
        .bind(AttendanceSource::Leave.as_ref())
        .bind(leave_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok((plan.insert.len() + plan.take_over.len()) as u64)
}

/// Only rows a leave wrote (or took over) go away when it is revoked;
/// attendance the employee recorded independently stays.
pub fn written_by_leave(source: &str, row_leave_id: Option<u64>, leave_id: u64) -> bool {
    source == AttendanceSource::Leave.as_ref() && row_leave_id == Some(leave_id)
}

pub(crate) async fn remove_leave_days(
    conn: &mut MySqlConnection,
    leave_id: u64,
) -> Result<u64, sqlx::Error> {
    let rows = sqlx::query_as::<_, (u64, String, Option<u64>)>(
        "SELECT id, source, leave_id FROM attendance WHERE leave_id = ? FOR UPDATE",
    )
    .bind(leave_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut removed = 0;
    for (id, source, row_leave) in rows {
        if !written_by_leave(&source, row_leave, leave_id) {
            continue;
        }
        removed += sqlx::query("DELETE FROM attendance WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
    }
    Ok(removed)
}

async fn fetch_attendance(pool: &MySqlPool, id: u64) -> ApiResult<Attendance> {
    sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Attendance record not found"))
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    responses(
        (status = 200, description = "Checked in successfully", body = Object, example = json!({
            "message": "Checked in successfully", "status": "present"
        })),
        (status = 400, description = "Already checked in today", body = Object, example = json!({
            "error": "Already checked in today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult {
    let employee_id = auth.require_employee_profile()?;
    let now = Local::now().naive_local();
    let status = check_in_status(now.time(), config.office_start_time);

    let result = sqlx::query(
        r#"
        INSERT INTO attendance (employee_id, date, check_in, status, approval_status, source)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(now.date())
    .bind(now.time())
    .bind(status.as_ref())
    .bind(ApprovalStatus::Approved.as_ref())
    .bind(AttendanceSource::SelfService.as_ref())
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => Ok(HttpResponse::Ok().json(json!({
            "message": "Checked in successfully",
            "status": status.as_ref()
        }))),
        // Duplicate check-in for same day
        Err(e) if crate::db::is_duplicate_key(&e) => {
            Err(ApiError::bad_request("Already checked in today"))
        }
        Err(e) => {
            tracing::error!(error = %e, employee_id, "Check-in failed");
            Err(ApiError::Internal)
        }
    }
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    responses(
        (status = 200, description = "Checked out successfully", body = Object, example = json!({
            "message": "Checked out successfully", "worked_hours": 8.5, "status": "present"
        })),
        (status = 400, description = "No active check-in found for today"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> ApiResult {
    let employee_id = auth.require_employee_profile()?;
    let now = Local::now().naive_local();

    let open = sqlx::query_as::<_, (u64, Option<NaiveTime>, String)>(
        r#"
        SELECT id, check_in, status FROM attendance
        WHERE employee_id = ? AND date = ? AND check_in IS NOT NULL AND check_out IS NULL
        "#,
    )
    .bind(employee_id)
    .bind(now.date())
    .fetch_optional(pool.get_ref())
    .await?;

    let Some((id, Some(check_in), status)) = open else {
        return Err(ApiError::bad_request("No active check-in found for today"));
    };

    let hours = worked_hours(check_in, now.time());
    let status = status_after_checkout(&status, hours, config.half_day_hours);

    let result = sqlx::query(
        "UPDATE attendance SET check_out = ?, worked_hours = ?, status = ? WHERE id = ? AND check_out IS NULL",
    )
    .bind(now.time())
    .bind(hours)
    .bind(&status)
    .bind(id)
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("No active check-in found for today"));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked out successfully",
        "worked_hours": hours,
        "status": status
    })))
}

/// Regularization request for a missed day
#[utoipa::path(
    post,
    path = "/api/attendance/request",
    request_body = AttendanceRequest,
    responses(
        (status = 201, description = "Request submitted for approval"),
        (status = 400, description = "Invalid date, times or recipient"),
        (status = 409, description = "A record already exists for that day")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(name = "attendance_request", skip_all, fields(user = auth.user_id, date = %body.date))]
pub async fn request_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    body: web::Json<AttendanceRequest>,
) -> ApiResult {
    let employee_id = auth.require_employee_profile()?;
    validate_regularization(&body, Local::now().date_naive())?;
    let reason = super::optional_text(&body.reason, 500)?;
    super::validate_recipient(pool.get_ref(), body.recipient_id).await?;

    let exists = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM attendance WHERE employee_id = ? AND date = ?",
    )
    .bind(employee_id)
    .bind(body.date)
    .fetch_one(pool.get_ref())
    .await?;
    if exists > 0 {
        return Err(ApiError::conflict("Attendance already recorded for this date"));
    }

    let hours = worked_hours(body.login_time, body.logout_time);
    let status = check_in_status(body.login_time, config.office_start_time);
    let status = status_after_checkout(status.as_ref(), hours, config.half_day_hours);

    let id = sqlx::query(
        r#"
        INSERT INTO attendance
        (employee_id, date, check_in, check_out, worked_hours, status, approval_status, source, recipient_id, reason)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(body.date)
    .bind(body.login_time)
    .bind(body.logout_time)
    .bind(hours)
    .bind(&status)
    .bind(ApprovalStatus::Pending.as_ref())
    .bind(AttendanceSource::Request.as_ref())
    .bind(body.recipient_id)
    .bind(reason)
    .execute(pool.get_ref())
    .await?
    .last_insert_id();

    info!(id, "Attendance regularization submitted");
    Ok(HttpResponse::Created().json(json!({
        "message": "Attendance request submitted",
        "id": id
    })))
}

#[utoipa::path(
    get,
    path = "/api/attendance/me",
    params(DateRangeQuery),
    responses((status = 200, description = "Own attendance records", body = [Attendance])),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DateRangeQuery>,
) -> ApiResult {
    let employee_id = auth.require_employee_profile()?;

    let mut filter = SqlFilter::new();
    filter
        .eq("employee_id", Some(employee_id))
        .gte("date", query.from)
        .lte("date", query.to);

    let sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance{} ORDER BY date DESC LIMIT 366",
        filter.where_sql()
    );
    let rows = bind_query_as(sqlx::query_as::<_, Attendance>(&sql), &filter.values)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Paginated attendance list", body = AttendanceListResponse),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> ApiResult {
    auth.require_hr_or_admin()?;
    let bounds = page_bounds(query.page, query.per_page, 20);

    let mut filter = SqlFilter::new();
    filter
        .eq("employee_id", query.employee_id)
        .gte("date", query.from)
        .lte("date", query.to)
        .eq("status", query.status.clone())
        .eq("approval_status", query.approval_status.clone());
    let where_sql = filter.where_sql();

    let total = bind_query_scalar(
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM attendance{where_sql}")),
        &filter.values,
    )
    .fetch_one(pool.get_ref())
    .await?;

    let sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance{where_sql} ORDER BY date DESC, id DESC LIMIT ? OFFSET ?"
    );
    let data = bind_query_as(sqlx::query_as::<_, Attendance>(&sql), &filter.values)
        .bind(bounds.per_page)
        .bind(bounds.offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        data,
        page: bounds.page,
        per_page: bounds.per_page,
        total,
    }))
}

/// Requests waiting on the caller
#[utoipa::path(
    get,
    path = "/api/attendance/pending",
    responses(
        (status = 200, description = "Pending attendance requests", body = [Attendance]),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn pending_attendance(auth: AuthUser, pool: web::Data<MySqlPool>) -> ApiResult {
    auth.require_hr_or_admin()?;

    let mut filter = SqlFilter::new();
    filter.eq("approval_status", Some(ApprovalStatus::Pending.as_ref()));
    if auth.role == Role::Admin {
        filter.push("(recipient_id = ? OR recipient_id IS NULL)", vec![auth.user_id.into()]);
    } else {
        filter.eq("recipient_id", Some(auth.user_id));
    }

    let sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance{} ORDER BY date ASC",
        filter.where_sql()
    );
    let rows = bind_query_as(sqlx::query_as::<_, Attendance>(&sql), &filter.values)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(rows))
}

async fn review(
    auth: &AuthUser,
    pool: &MySqlPool,
    id: u64,
    decision: ApprovalStatus,
) -> ApiResult {
    let record = fetch_attendance(pool, id).await?;
    auth.require_reviewer(record.recipient_id)?;

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET approval_status = ?, reviewed_by = ?, reviewed_at = NOW()
        WHERE id = ? AND approval_status = ?
        "#,
    )
    .bind(decision.as_ref())
    .bind(auth.user_id)
    .bind(id)
    .bind(ApprovalStatus::Pending.as_ref())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("Only pending attendance can be reviewed"));
    }

    info!(id, decision = %decision, by = auth.user_id, "Attendance reviewed");
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Attendance {}", decision),
        "id": id
    })))
}

#[utoipa::path(
    put,
    path = "/api/attendance/{attendance_id}/approve",
    params(("attendance_id" = u64, Path, description = "Attendance ID")),
    responses(
        (status = 200, description = "Attendance approved"),
        (status = 400, description = "Not pending"),
        (status = 403, description = "Not the assigned reviewer"),
        (status = 404, description = "Attendance record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn approve_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult {
    review(&auth, pool.get_ref(), path.into_inner(), ApprovalStatus::Approved).await
}

#[utoipa::path(
    put,
    path = "/api/attendance/{attendance_id}/reject",
    params(("attendance_id" = u64, Path, description = "Attendance ID")),
    responses(
        (status = 200, description = "Attendance rejected"),
        (status = 400, description = "Not pending"),
        (status = 403, description = "Not the assigned reviewer"),
        (status = 404, description = "Attendance record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn reject_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult {
    review(&auth, pool.get_ref(), path.into_inner(), ApprovalStatus::Rejected).await
}

#[utoipa::path(
    get,
    path = "/api/attendance/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Monthly attendance summary", body = AttendanceSummary),
        (status = 400, description = "Malformed month"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn attendance_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SummaryQuery>,
) -> ApiResult {
    let employee_id = match query.employee_id {
        Some(id) => id,
        None => auth.require_employee_profile()?,
    };
    auth.require_access_to(employee_id)?;

    let today = Local::now().date_naive();
    let month = match query.month.as_deref() {
        Some(raw) => parse_month(raw)?,
        None => today,
    };
    let (first, last) = month_bounds(month);

    let holidays = load_holidays(pool.get_ref(), first, last).await?;
    let month_days = working_days(first, last, &holidays);
    let elapsed: Vec<NaiveDate> = month_days.iter().copied().filter(|d| *d <= today).collect();

    let records = sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE employee_id = ? AND date BETWEEN ? AND ?"
    ))
    .bind(employee_id)
    .bind(first)
    .bind(last)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(summarize(employee_id, first, &month_days, &elapsed, &records)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
    }

    fn record(day: u32, status: AttendanceStatus, approval: ApprovalStatus, hours: f64) -> Attendance {
        Attendance {
            id: day as u64,
            employee_id: 7,
            date: d(day),
            check_in: None,
            check_out: None,
            worked_hours: Some(hours),
            status: status.to_string(),
            approval_status: approval.to_string(),
            source: AttendanceSource::SelfService.to_string(),
            recipient_id: None,
            reason: None,
            leave_id: None,
            reviewed_by: None,
            created_at: None,
        }
    }

    #[test]
    fn late_only_after_office_start() {
        let start = t(9, 30);
        assert_eq!(check_in_status(t(9, 30), start), AttendanceStatus::Present);
        assert_eq!(check_in_status(t(9, 31), start), AttendanceStatus::Late);
    }

    #[test]
    fn short_days_become_half_days() {
        assert_eq!(worked_hours(t(9, 0), t(12, 30)), 3.5);
        assert_eq!(status_after_checkout("present", 3.5, 4.0), "half_day");
        assert_eq!(status_after_checkout("late", 8.0, 4.0), "late");
        assert_eq!(status_after_checkout("leave", 0.0, 4.0), "leave");
    }

    #[test]
    fn checkout_before_checkin_counts_zero() {
        assert_eq!(worked_hours(t(10, 0), t(9, 0)), 0.0);
    }

    #[test]
    fn regularization_rules() {
        let today = d(19);
        let mut req = AttendanceRequest {
            date: d(15),
            login_time: t(9, 0),
            logout_time: t(18, 0),
            recipient_id: None,
            reason: None,
        };
        assert!(validate_regularization(&req, today).is_ok());

        req.date = d(20);
        assert!(validate_regularization(&req, today).is_err());

        req.date = d(15);
        req.logout_time = t(9, 0);
        assert!(validate_regularization(&req, today).is_err());
    }

    #[test]
    fn summary_counts_approved_records_only() {
        let month_days: Vec<_> = [1, 2, 5, 6, 7].into_iter().map(d).collect();
        let elapsed = month_days[..4].to_vec();
        let records = vec![
            record(1, AttendanceStatus::Present, ApprovalStatus::Approved, 8.0),
            record(2, AttendanceStatus::Late, ApprovalStatus::Approved, 7.5),
            record(5, AttendanceStatus::Present, ApprovalStatus::Pending, 8.0),
            record(6, AttendanceStatus::Leave, ApprovalStatus::Approved, 0.0),
        ];

        let summary = summarize(7, d(1), &month_days, &elapsed, &records);

        assert_eq!(summary.month, "2026-10");
        assert_eq!(summary.working_days, 5);
        assert_eq!(summary.present, 1);
        assert_eq!(summary.late, 1);
        assert_eq!(summary.leave, 1);
        // the 5th is still pending, so it counts as absent
        assert_eq!(summary.absent, 1);
        assert_eq!(summary.total_worked_hours, 15.5);
    }

    fn on_file(id: u64, day: u32, approval: ApprovalStatus) -> DayRecord {
        DayRecord {
            id,
            date: d(day),
            approval_status: approval.to_string(),
        }
    }

    #[test]
    fn leave_fills_missing_days_and_keeps_approved_ones() {
        let days = [d(12), d(13), d(14)];
        let existing = [on_file(1, 13, ApprovalStatus::Approved)];

        let plan = plan_leave_days(&days, &existing);
        assert_eq!(plan.insert, vec![d(12), d(14)]);
        assert!(plan.take_over.is_empty());
    }

    #[test]
    fn leave_takes_over_rejected_and_pending_requests() {
        // a rejected regularization must not leave the day counted as absent
        let days = [d(5), d(6)];
        let existing = [
            on_file(40, 5, ApprovalStatus::Rejected),
            on_file(41, 6, ApprovalStatus::Pending),
        ];

        let plan = plan_leave_days(&days, &existing);
        assert!(plan.insert.is_empty());
        assert_eq!(plan.take_over, vec![40, 41]);
    }

    #[test]
    fn revoking_leave_removes_only_its_own_rows() {
        assert!(written_by_leave("leave", Some(9), 9));
        assert!(!written_by_leave("leave", Some(8), 9));
        assert!(!written_by_leave("self", Some(9), 9));
        assert!(!written_by_leave("request", None, 9));
    }
}
