use actix_web::{HttpResponse, web};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{MySqlConnection, MySqlPool};
use tracing::{debug, info, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::attendance::{remove_leave_days, synthesize_leave_days},
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::leave::{LeaveRequest, LeaveStatus, LeaveType},
    utils::{
        calendar::{load_holidays, working_days},
        db_utils::{SqlFilter, bind_query_as, bind_query_scalar, page_bounds},
        leave_rules::{check_balance, check_overlap, deduct, requested_days},
    },
};

const LEAVE_COLUMNS: &str = "id, employee_id, start_date, end_date, leave_type, half_day, days, reason, \
     status, recipient_id, reviewed_by, review_note, created_at";

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-07", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "sick")]
    pub leave_type: LeaveType, // enum ensures Swagger dropdown
    #[serde(default)]
    pub half_day: bool,
    #[schema(example = "Fever")]
    pub reason: Option<String>,
    /// HR or admin user who should review this request
    pub recipient_id: Option<u64>,
}

#[derive(Deserialize, ToSchema)]
pub struct RejectLeave {
    #[schema(example = "Team is short-staffed that week")]
    pub reason: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LeaveFilter {
    #[schema(example = 1)]
    pub page: Option<u32>,
    #[schema(example = 10)]
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    #[schema(example = "pending")]
    pub status: Option<String>,
    #[schema(example = "annual")]
    pub leave_type: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

/// What a cancel request does to a leave.
#[derive(Debug, PartialEq, Eq)]
enum CancelAction {
    /// pending leave; nothing to undo
    Withdraw,
    /// approved leave; balance and attendance are restored
    Revoke,
}

fn cancel_action(auth: &AuthUser, leave: &LeaveRequest) -> ApiResult<CancelAction> {
    let is_owner = auth.employee_id == Some(leave.employee_id);
    if !is_owner && !auth.is_hr_or_admin() {
        return Err(ApiError::forbidden("Not allowed to cancel this leave"));
    }

    match leave.status.parse::<LeaveStatus>() {
        Ok(LeaveStatus::Pending) => Ok(CancelAction::Withdraw),
        Ok(LeaveStatus::Approved) if auth.is_hr_or_admin() => Ok(CancelAction::Revoke),
        Ok(LeaveStatus::Approved) => Err(ApiError::forbidden(
            "Approved leave can only be cancelled by HR/Admin",
        )),
        _ => Err(ApiError::bad_request(format!(
            "Leave is already {}",
            leave.status
        ))),
    }
}

fn parse_leave_type(leave: &LeaveRequest) -> ApiResult<LeaveType> {
    leave.leave_type.parse::<LeaveType>().map_err(|_| {
        tracing::error!(id = leave.id, leave_type = %leave.leave_type, "Unknown leave type in database");
        ApiError::Internal
    })
}

async fn lock_leave(conn: &mut MySqlConnection, id: u64) -> ApiResult<LeaveRequest> {
    sqlx::query_as::<_, LeaveRequest>(&format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ? FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| ApiError::not_found("Leave not found"))
}

/// Apply for leave
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body = CreateLeave,
    responses(
        (status = 201, description = "Leave created", body = Object, example = json!({
            "message": "Leave request submitted", "id": 1, "days": 3.0
        })),
        (status = 400, description = "Invalid range or insufficient balance"),
        (status = 403, description = "No employee profile"),
        (status = 409, description = "Overlaps an existing leave")
    ),
    tag = "Leave",
    security(("bearer_auth" = []))
)]
#[instrument(name = "leave_apply", skip_all, fields(user = auth.user_id, leave_type = %payload.leave_type))]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeave>,
) -> ApiResult {
    let employee_id = auth.require_employee_profile()?;
    let reason = super::optional_text(&payload.reason, 500)?;

    let holidays = load_holidays(pool.get_ref(), payload.start_date, payload.end_date).await?;
    let days = requested_days(payload.start_date, payload.end_date, payload.half_day, &holidays)?;

    super::validate_recipient(pool.get_ref(), payload.recipient_id).await?;

    let active = sqlx::query_as::<_, (NaiveDate, NaiveDate)>(
        r#"
        SELECT start_date, end_date FROM leave_requests
        WHERE employee_id = ? AND status IN (?, ?) AND start_date <= ? AND end_date >= ?
        "#,
    )
    .bind(employee_id)
    .bind(LeaveStatus::Pending.as_ref())
    .bind(LeaveStatus::Approved.as_ref())
    .bind(payload.end_date)
    .bind(payload.start_date)
    .fetch_all(pool.get_ref())
    .await?;

    check_overlap((payload.start_date, payload.end_date), &active)?;

    if payload.leave_type.is_tracked() {
        let year = payload.start_date.year();
        let balance = sqlx::query_scalar::<_, f64>(
            "SELECT balance FROM leave_balances WHERE employee_id = ? AND leave_type = ? AND year = ?",
        )
        .bind(employee_id)
        .bind(payload.leave_type.as_ref())
        .bind(year)
        .fetch_optional(pool.get_ref())
        .await?
        .unwrap_or(0.0);

        let pending: f64 = sqlx::query_scalar::<_, f64>(
            r#"
            SELECT days FROM leave_requests
            WHERE employee_id = ? AND leave_type = ? AND status = ? AND YEAR(start_date) = ?
            "#,
        )
        .bind(employee_id)
        .bind(payload.leave_type.as_ref())
        .bind(LeaveStatus::Pending.as_ref())
        .bind(year)
        .fetch_all(pool.get_ref())
        .await?
        .into_iter()
        .sum();

        debug!(balance, pending, days, "Checking leave balance");
        check_balance(days, balance, pending)?;
    }

    let id = sqlx::query(
        r#"
        INSERT INTO leave_requests
        (employee_id, start_date, end_date, leave_type, half_day, days, reason, status, recipient_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.leave_type.as_ref())
    .bind(payload.half_day)
    .bind(days)
    .bind(reason)
    .bind(LeaveStatus::Pending.as_ref())
    .bind(payload.recipient_id)
    .execute(pool.get_ref())
    .await?
    .last_insert_id();

    info!(id, employee_id, days, "Leave request submitted");

    Ok(HttpResponse::Created().json(json!({
        "message": "Leave request submitted",
        "id": id,
        "days": days
    })))
}

/// Approve leave, deduct the balance and write leave attendance in one transaction.
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(("leave_id" = u64, Path, description = "Leave ID")),
    responses(
        (status = 200, description = "Leave approved"),
        (status = 400, description = "Not pending or insufficient balance"),
        (status = 403, description = "Not the assigned reviewer"),
        (status = 404, description = "Leave not found")
    ),
    tag = "Leave",
    security(("bearer_auth" = []))
)]
#[instrument(name = "leave_approve", skip(auth, pool), fields(by = auth.user_id))]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult {
    auth.require_hr_or_admin()?;
    let leave_id = path.into_inner();

    let mut tx = pool.begin().await?;

    let leave = lock_leave(&mut tx, leave_id).await?;
    auth.require_reviewer(leave.recipient_id)?;

    if leave.status != LeaveStatus::Pending.as_ref() {
        return Err(ApiError::bad_request("Only pending leave can be approved"));
    }

    let leave_type = parse_leave_type(&leave)?;
    if leave_type.is_tracked() {
        let year = leave.start_date.year();
        let balance = sqlx::query_scalar::<_, f64>(
            r#"
            SELECT balance FROM leave_balances
            WHERE employee_id = ? AND leave_type = ? AND year = ?
            FOR UPDATE
            "#,
        )
        .bind(leave.employee_id)
        .bind(leave_type.as_ref())
        .bind(year)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            ApiError::bad_request(format!("No {leave_type} leave balance for {year}"))
        })?;

        let remaining = deduct(balance, leave.days)?;

        sqlx::query(
            r#"
            UPDATE leave_balances SET balance = ?, used = used + ?
            WHERE employee_id = ? AND leave_type = ? AND year = ?
            "#,
        )
        .bind(remaining)
        .bind(leave.days)
        .bind(leave.employee_id)
        .bind(leave_type.as_ref())
        .bind(year)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        "UPDATE leave_requests SET status = ?, reviewed_by = ?, reviewed_at = NOW() WHERE id = ?",
    )
    .bind(LeaveStatus::Approved.as_ref())
    .bind(auth.user_id)
    .bind(leave_id)
    .execute(&mut *tx)
    .await?;

    let holidays = load_holidays(&mut *tx, leave.start_date, leave.end_date).await?;
    let days = working_days(leave.start_date, leave.end_date, &holidays);
    let synthesized = synthesize_leave_days(&mut tx, leave.employee_id, leave_id, &days).await?;

    tx.commit().await?;

    info!(leave_id, employee_id = leave.employee_id, synthesized, "Leave approved");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave approved",
        "id": leave_id,
        "attendance_days": synthesized
    })))
}

#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(("leave_id" = u64, Path, description = "Leave ID")),
    request_body(content = RejectLeave, description = "Optional rejection reason"),
    responses(
        (status = 200, description = "Leave rejected"),
        (status = 400, description = "Not pending"),
        (status = 403, description = "Not the assigned reviewer"),
        (status = 404, description = "Leave not found")
    ),
    tag = "Leave",
    security(("bearer_auth" = []))
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: Option<web::Json<RejectLeave>>,
) -> ApiResult {
    auth.require_hr_or_admin()?;
    let leave_id = path.into_inner();
    let note = match &body {
        Some(b) => super::optional_text(&b.reason, 500)?,
        None => None,
    };

    let recipient = sqlx::query_scalar::<_, Option<u64>>(
        "SELECT recipient_id FROM leave_requests WHERE id = ?",
    )
    .bind(leave_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("Leave not found"))?;
    auth.require_reviewer(recipient)?;

    let result = sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?, reviewed_by = ?, reviewed_at = NOW(), review_note = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(LeaveStatus::Rejected.as_ref())
    .bind(auth.user_id)
    .bind(note)
    .bind(leave_id)
    .bind(LeaveStatus::Pending.as_ref())
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("Only pending leave can be rejected"));
    }

    info!(leave_id, by = auth.user_id, "Leave rejected");
    Ok(HttpResponse::Ok().json(json!({ "message": "Leave rejected", "id": leave_id })))
}

/// Owners withdraw pending leave; HR/Admin may also revoke approved leave.
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/cancel",
    params(("leave_id" = u64, Path, description = "Leave ID")),
    responses(
        (status = 200, description = "Leave cancelled"),
        (status = 400, description = "Already rejected or cancelled"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave not found")
    ),
    tag = "Leave",
    security(("bearer_auth" = []))
)]
#[instrument(name = "leave_cancel", skip(auth, pool), fields(by = auth.user_id))]
pub async fn cancel_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult {
    let leave_id = path.into_inner();
    let mut tx = pool.begin().await?;

    let leave = lock_leave(&mut tx, leave_id).await?;
    let action = cancel_action(&auth, &leave)?;

    let mut restored_days = 0.0;
    let mut removed_attendance = 0;

    if action == CancelAction::Revoke {
        let leave_type = parse_leave_type(&leave)?;
        if leave_type.is_tracked() {
            sqlx::query(
                r#"
                UPDATE leave_balances
                SET balance = balance + ?, used = GREATEST(used - ?, 0)
                WHERE employee_id = ? AND leave_type = ? AND year = ?
                "#,
            )
            .bind(leave.days)
            .bind(leave.days)
            .bind(leave.employee_id)
            .bind(leave_type.as_ref())
            .bind(leave.start_date.year())
            .execute(&mut *tx)
            .await?;
            restored_days = leave.days;
        }
        removed_attendance = remove_leave_days(&mut tx, leave_id).await?;
    }

    sqlx::query(
        "UPDATE leave_requests SET status = ?, reviewed_by = ?, reviewed_at = NOW() WHERE id = ?",
    )
    .bind(LeaveStatus::Cancelled.as_ref())
    .bind(auth.user_id)
    .bind(leave_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(leave_id, ?action, restored_days, removed_attendance, "Leave cancelled");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave cancelled",
        "id": leave_id,
        "restored_days": restored_days
    })))
}

async fn list_with_filter(
    pool: &MySqlPool,
    filter: &SqlFilter,
    page: Option<u32>,
    per_page: Option<u32>,
) -> ApiResult<LeaveListResponse> {
    let bounds = page_bounds(page, per_page, 10);
    let where_sql = filter.where_sql();

    let total = bind_query_scalar(
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM leave_requests{where_sql}")),
        &filter.values,
    )
    .fetch_one(pool)
    .await?;

    let sql = format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests{where_sql} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
    );
    let data = bind_query_as(sqlx::query_as::<_, LeaveRequest>(&sql), &filter.values)
        .bind(bounds.per_page)
        .bind(bounds.offset)
        .fetch_all(pool)
        .await?;

    Ok(LeaveListResponse {
        data,
        page: bounds.page,
        per_page: bounds.per_page,
        total,
    })
}

#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated list of leaves", body = LeaveListResponse),
        (status = 403, description = "HR/Admin only")
    ),
    tag = "Leave",
    security(("bearer_auth" = []))
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> ApiResult {
    auth.require_hr_or_admin()?;

    let mut filter = SqlFilter::new();
    filter
        .eq("employee_id", query.employee_id)
        .eq("status", query.status.clone())
        .eq("leave_type", query.leave_type.clone());

    let response = list_with_filter(pool.get_ref(), &filter, query.page, query.per_page).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[utoipa::path(
    get,
    path = "/api/leave/me",
    params(LeaveFilter),
    responses((status = 200, description = "Own leave requests", body = LeaveListResponse)),
    tag = "Leave",
    security(("bearer_auth" = []))
)]
pub async fn my_leaves(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> ApiResult {
    let employee_id = auth.require_employee_profile()?;

    let mut filter = SqlFilter::new();
    filter
        .eq("employee_id", Some(employee_id))
        .eq("status", query.status.clone())
        .eq("leave_type", query.leave_type.clone());

    let response = list_with_filter(pool.get_ref(), &filter, query.page, query.per_page).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "Leave ID")),
    responses(
        (status = 200, description = "Leave found", body = LeaveRequest),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave not found")
    ),
    tag = "Leave",
    security(("bearer_auth" = []))
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult {
    let leave = sqlx::query_as::<_, LeaveRequest>(&format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ?"
    ))
    .bind(path.into_inner())
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("Leave not found"))?;

    auth.require_access_to(leave.employee_id)?;
    Ok(HttpResponse::Ok().json(leave))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::auth::tests::user;
    use crate::model::role::Role;

    fn leave(employee_id: u64, status: LeaveStatus) -> LeaveRequest {
        LeaveRequest {
            id: 1,
            employee_id,
            start_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 11, 3).unwrap(),
            leave_type: "annual".into(),
            half_day: false,
            days: 2.0,
            reason: None,
            status: status.to_string(),
            recipient_id: None,
            reviewed_by: None,
            review_note: None,
            created_at: None,
        }
    }

    #[test]
    fn owner_withdraws_only_pending_leave() {
        let owner = user(Role::Employee, 10, Some(100));

        assert_eq!(
            cancel_action(&owner, &leave(100, LeaveStatus::Pending)).unwrap(),
            CancelAction::Withdraw
        );
        assert!(matches!(
            cancel_action(&owner, &leave(100, LeaveStatus::Approved)),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            cancel_action(&owner, &leave(100, LeaveStatus::Rejected)),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn strangers_cannot_cancel() {
        let other = user(Role::Employee, 11, Some(101));
        assert!(matches!(
            cancel_action(&other, &leave(100, LeaveStatus::Pending)),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn hr_revokes_approved_leave() {
        let hr = user(Role::Hr, 2, None);
        assert_eq!(
            cancel_action(&hr, &leave(100, LeaveStatus::Approved)).unwrap(),
            CancelAction::Revoke
        );
        assert!(cancel_action(&hr, &leave(100, LeaveStatus::Cancelled)).is_err());
    }

    #[test]
    fn stored_leave_type_is_parsed() {
        let mut l = leave(1, LeaveStatus::Pending);
        assert_eq!(parse_leave_type(&l).unwrap(), LeaveType::Annual);
        l.leave_type = "maternity".into();
        assert!(parse_leave_type(&l).is_err());
    }
}
