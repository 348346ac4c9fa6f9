use actix_web::{HttpResponse, web};
use chrono::{Datelike, Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::model::holiday::Holiday;

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HolidayQuery {
    /// Calendar year, defaults to the current one
    pub year: Option<i32>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateHoliday {
    #[schema(example = "2026-12-25", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "Christmas")]
    pub name: String,
}

#[utoipa::path(
    get,
    path = "/api/holiday",
    params(HolidayQuery),
    responses((status = 200, body = [Holiday])),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn list_holidays(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<HolidayQuery>,
) -> ApiResult {
    let year = query.year.unwrap_or_else(|| Local::now().year());

    let rows = sqlx::query_as::<_, Holiday>(
        "SELECT id, holiday_date, name FROM holidays WHERE YEAR(holiday_date) = ? ORDER BY holiday_date",
    )
    .bind(year)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    post,
    path = "/api/holiday",
    request_body = CreateHoliday,
    responses(
        (status = 201, description = "Holiday created"),
        (status = 409, description = "A holiday already exists on that date")
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn create_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<CreateHoliday>,
) -> ApiResult {
    auth.require_hr_or_admin()?;

    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }

    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM holidays WHERE holiday_date = ?")
        .bind(body.date)
        .fetch_one(pool.get_ref())
        .await?;
    if exists > 0 {
        return Err(ApiError::conflict("A holiday already exists on that date"));
    }

    let result = sqlx::query("INSERT INTO holidays (holiday_date, name) VALUES (?, ?)")
        .bind(body.date)
        .bind(name)
        .execute(pool.get_ref())
        .await?;

    Ok(HttpResponse::Created().json(json!({
        "id": result.last_insert_id(),
        "message": "Holiday created"
    })))
}

#[utoipa::path(
    delete,
    path = "/api/holiday/{holiday_id}",
    params(("holiday_id" = u64, Path, description = "Holiday ID")),
    responses(
        (status = 200, description = "Holiday deleted"),
        (status = 404, description = "Holiday not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn delete_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult {
    auth.require_hr_or_admin()?;

    let result = sqlx::query("DELETE FROM holidays WHERE id = ?")
        .bind(path.into_inner())
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Holiday not found"));
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Holiday deleted" })))
}
